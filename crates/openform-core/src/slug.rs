//! Slug Allocator
//!
//! Derives a URL-safe unique identifier from a human title, probing the
//! form store and retrying with numeric suffixes on collision.
//!
//! The probe-then-insert sequence is not atomic: two concurrent creates
//! with the identical title can both observe no conflict and then both
//! write. Stores with a unique slug constraint report the loser as
//! [`crate::FormError::Conflict`]; callers may retry allocation on that.

use crate::store::FormStore;
use crate::Result;

/// Lower-case the title, collapse every run of non-alphanumerics into a
/// single hyphen and strip edge hyphens. Empty results fall back to
/// `"form"`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        "form".to_string()
    } else {
        slug
    }
}

/// Probe the store for an unused slug: `base`, `base-1`, `base-2`, …
pub async fn allocate(store: &dyn FormStore, title: &str) -> Result<String> {
    let base = slugify(title);
    let mut slug = base.clone();
    let mut counter = 0u32;

    while store.find_by_slug(&slug).await?.is_some() {
        counter += 1;
        slug = format!("{base}-{counter}");
    }

    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Form;
    use crate::store::InMemoryFormStore;

    #[test]
    fn test_slugify_collapses_runs_and_trims() {
        assert_eq!(slugify("Event Registration 2024"), "event-registration-2024");
        assert_eq!(slugify("  --Hello,   World!--  "), "hello-world");
        assert_eq!(slugify("Café & Bar"), "caf-bar");
    }

    #[test]
    fn test_slugify_empty_falls_back() {
        assert_eq!(slugify(""), "form");
        assert_eq!(slugify("!!!"), "form");
    }

    #[tokio::test]
    async fn test_allocate_appends_numeric_suffixes_in_sequence() {
        let store = InMemoryFormStore::new();

        let first = allocate(&store, "My Survey").await.unwrap();
        assert_eq!(first, "my-survey");
        store
            .insert(&Form::create("My Survey", &first, vec![]))
            .await
            .unwrap();

        let second = allocate(&store, "My Survey").await.unwrap();
        assert_eq!(second, "my-survey-1");
        store
            .insert(&Form::create("My Survey", &second, vec![]))
            .await
            .unwrap();

        let third = allocate(&store, "My Survey").await.unwrap();
        assert_eq!(third, "my-survey-2");
    }
}
