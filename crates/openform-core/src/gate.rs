//! Submission Gate
//!
//! The fixed-order state machine governing whether a public submission is
//! accepted: rate check, form lookup, status check, schema validation,
//! single-response enforcement, response-limit enforcement, persist,
//! dedupe-marker write. Every terminal rejection short-circuits the
//! remaining steps; nothing is written before the persist step.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::model::{Form, Response};
use crate::schema::CompiledSchema;
use crate::store::{FormStore, KvStore, ResponseStore};
use crate::{FormError, Result};

/// KV-window throttling and dedupe-marker settings.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Submissions allowed per window per submitter-IP per form.
    pub limit: u32,
    /// Fixed window length in seconds.
    pub window_secs: u64,
    /// Lifetime of the single-response dedupe marker. Long but finite, so
    /// the deterrent eventually lapses.
    pub dedupe_ttl_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            window_secs: 60,
            dedupe_ttl_secs: 30 * 24 * 3600,
        }
    }
}

/// Gate over the public submission path.
pub struct SubmissionGate {
    forms: Arc<dyn FormStore>,
    responses: Arc<dyn ResponseStore>,
    /// Rate/dedupe collaborator. Absent only in embedded/test setups; the
    /// gate fails open on rate and dedupe checks without it.
    kv: Option<Arc<dyn KvStore>>,
    config: RateLimitConfig,
}

impl SubmissionGate {
    pub fn new(
        forms: Arc<dyn FormStore>,
        responses: Arc<dyn ResponseStore>,
        kv: Option<Arc<dyn KvStore>>,
    ) -> Self {
        Self {
            forms,
            responses,
            kv,
            config: RateLimitConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RateLimitConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one submission through the gate.
    ///
    /// `submitter` is the caller-supplied submitter identity (IP). The
    /// single-response check keyed on it is an advisory, best-effort
    /// deterrent, not a security guarantee.
    pub async fn submit(
        &self,
        slug: &str,
        submitter: &str,
        payload: &serde_json::Map<String, Value>,
    ) -> Result<Response> {
        // 1. Rate check. Never touches the relational store.
        if !self.check_rate(slug, submitter).await? {
            warn!(slug, submitter, "submission throttled");
            return Err(FormError::RateLimited);
        }

        // 2. Form lookup.
        let form = self
            .forms
            .find_by_slug_or_id(slug)
            .await?
            .ok_or(FormError::NotFound)?;

        // 3. Status check.
        if !form.is_open() {
            debug!(slug = %form.slug, "submission to closed form rejected");
            return Err(FormError::Closed);
        }

        // 4. Schema validation against the form's current fields.
        let normalized = CompiledSchema::compile(&form.fields).validate(payload)?;

        // 5. Single-response enforcement (advisory, IP-keyed).
        let enforce_single = !form.design.allow_multiple_responses;
        if enforce_single && self.has_submitted(&form, submitter).await? {
            debug!(slug = %form.slug, "duplicate submission rejected");
            return Err(FormError::AlreadySubmitted);
        }

        // 6. Response-limit enforcement. Check-then-act: concurrent
        // submissions near the cap may transiently exceed it.
        if let Some(limit) = form.design.response_limit {
            if limit > 0 {
                let count = self.responses.count_by_form(&form.slug).await?;
                if count >= u64::from(limit) {
                    debug!(slug = %form.slug, limit, "response limit reached");
                    return Err(FormError::LimitReached);
                }
            }
        }

        // 7. Persist. Storage failure is fatal and propagates unretried.
        let response = Response::create(&form.id, &form.slug, normalized);
        if let Err(e) = self.responses.insert(&response).await {
            error!(slug = %form.slug, error = %e, "response insert failed");
            return Err(e);
        }

        // 8. Record the dedupe marker, only when step 5 applied.
        if enforce_single {
            self.mark_submitted(&form, submitter).await?;
        }

        info!(slug = %form.slug, response_id = %response.id, "response accepted");
        Ok(response)
    }

    /// Fixed-window KV counter: N submissions per window per IP+form.
    /// Fails open when no KV collaborator is configured.
    async fn check_rate(&self, slug: &str, submitter: &str) -> Result<bool> {
        let kv = match &self.kv {
            Some(kv) => kv,
            None => return Ok(true),
        };

        // A zero-width window would divide by zero; treat it as 1s.
        let window_secs = self.config.window_secs.max(1);
        let window = chrono::Utc::now().timestamp() as u64 / window_secs;
        let key = format!("rate_limit:{submitter}:{slug}:{window}");

        let count: u32 = match kv.get(&key).await? {
            Some(v) => v.parse().unwrap_or(0),
            None => 0,
        };
        if count >= self.config.limit {
            return Ok(false);
        }

        kv.put(&key, &(count + 1).to_string(), window_secs * 2)
            .await?;
        Ok(true)
    }

    async fn has_submitted(&self, form: &Form, submitter: &str) -> Result<bool> {
        let kv = match &self.kv {
            Some(kv) => kv,
            None => return Ok(false),
        };
        let key = format!("submitted:{}:{submitter}", form.slug);
        Ok(kv.get(&key).await?.is_some())
    }

    async fn mark_submitted(&self, form: &Form, submitter: &str) -> Result<()> {
        if let Some(kv) = &self.kv {
            let key = format!("submitted:{}:{submitter}", form.slug);
            kv.put(&key, "true", self.config.dedupe_ttl_secs).await?;
        }
        Ok(())
    }
}
