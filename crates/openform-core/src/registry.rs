//! Field Type Registry
//!
//! The single source of truth for how each field kind behaves: whether it
//! carries submission data, the primitive shape of an accepted value,
//! whether it supports an options list, and whether it is eligible for
//! categorical stats. Every other module consults this table instead of
//! re-deriving classifications ad hoc.

use crate::model::FieldType;

/// Primitive shape of an accepted submission value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueShape {
    /// A single string.
    Single,
    /// An array of strings.
    Many,
    /// A boolean.
    Flag,
}

impl FieldType {
    /// Display-only types (`description`, `image`, `success_link`) are
    /// never required, never part of the payload, and never rendered as
    /// response columns.
    pub fn is_data_bearing(self) -> bool {
        !matches!(
            self,
            FieldType::Description | FieldType::Image | FieldType::SuccessLink
        )
    }

    /// Shape of the value the submission validator accepts after coercion.
    pub fn shape(self) -> ValueShape {
        match self {
            FieldType::Checkbox => ValueShape::Flag,
            FieldType::CheckboxGroup => ValueShape::Many,
            FieldType::Text
            | FieldType::Textarea
            | FieldType::Email
            | FieldType::Phone
            | FieldType::Number
            | FieldType::Date
            | FieldType::Time
            | FieldType::Select
            | FieldType::Radio
            | FieldType::File
            | FieldType::Image
            | FieldType::Description
            | FieldType::SuccessLink => ValueShape::Single,
        }
    }

    /// Whether the field carries an admin-authored options list.
    pub fn supports_options(self) -> bool {
        matches!(
            self,
            FieldType::Select | FieldType::Radio | FieldType::CheckboxGroup
        )
    }

    /// Eligible for tally-based stats aggregation.
    pub fn is_categorical(self) -> bool {
        matches!(
            self,
            FieldType::Radio | FieldType::Select | FieldType::CheckboxGroup | FieldType::Checkbox
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_only_types_bear_no_data() {
        assert!(!FieldType::Description.is_data_bearing());
        assert!(!FieldType::Image.is_data_bearing());
        assert!(!FieldType::SuccessLink.is_data_bearing());
        assert!(FieldType::Text.is_data_bearing());
        assert!(FieldType::File.is_data_bearing());
    }

    #[test]
    fn test_value_shapes() {
        assert_eq!(FieldType::Checkbox.shape(), ValueShape::Flag);
        assert_eq!(FieldType::CheckboxGroup.shape(), ValueShape::Many);
        assert_eq!(FieldType::Email.shape(), ValueShape::Single);
        assert_eq!(FieldType::Number.shape(), ValueShape::Single);
    }

    #[test]
    fn test_categorical_set() {
        for t in [
            FieldType::Radio,
            FieldType::Select,
            FieldType::CheckboxGroup,
            FieldType::Checkbox,
        ] {
            assert!(t.is_categorical());
        }
        assert!(!FieldType::Text.is_categorical());
        assert!(!FieldType::File.is_categorical());
    }

    #[test]
    fn test_option_bearing_set() {
        assert!(FieldType::Select.supports_options());
        assert!(FieldType::Radio.supports_options());
        assert!(FieldType::CheckboxGroup.supports_options());
        assert!(!FieldType::Checkbox.supports_options());
        assert!(!FieldType::Text.supports_options());
    }
}
