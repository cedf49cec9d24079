// Option-bag validation
//
// Every resource declares two static schemas: the pre-boot schema (fields
// legal before the guest boots, with required marking) and the post-boot
// schema (the usually smaller set the API accepts as updates on a running
// microVM). The validator checks an option bag against one of them.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Primitive type expected for a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Str,
    Bool,
    /// Integer >= 0
    NonNegInt,
    /// Integer >= 1
    PosInt,
    /// List of strings
    StrList,
    /// Any JSON value, passed through unchecked
    Opaque,
}

impl FieldType {
    pub(crate) fn describe(self) -> &'static str {
        match self {
            FieldType::Str => "a string",
            FieldType::Bool => "a boolean",
            FieldType::NonNegInt => "a non-negative integer",
            FieldType::PosInt => "a positive integer",
            FieldType::StrList => "a list of strings",
            FieldType::Opaque => "any value",
        }
    }

    pub(crate) fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::Str => value.is_string(),
            FieldType::Bool => value.is_boolean(),
            FieldType::NonNegInt => value.as_u64().is_some(),
            FieldType::PosInt => value.as_u64().is_some_and(|n| n > 0),
            FieldType::StrList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            FieldType::Opaque => true,
        }
    }
}

/// One field of a resource schema
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
        }
    }
}

/// A schema is a static table of field specs
pub type Schema = &'static [FieldSpec];

/// Validate an option bag against a schema.
///
/// Rejects unknown keys and type mismatches. When `check_required` is set
/// (first construction of a resource, pre-boot), every required field must be
/// present.
pub fn validate(options: &Map<String, Value>, schema: Schema, check_required: bool) -> Result<()> {
    if check_required {
        for spec in schema.iter().filter(|s| s.required) {
            if !options.contains_key(spec.name) {
                return Err(Error::invalid_option(
                    spec.name,
                    "required option is missing",
                ));
            }
        }
    }

    for (key, value) in options {
        let spec = schema.iter().find(|s| s.name == key.as_str()).ok_or_else(|| {
            Error::invalid_option(key.as_str(), "not accepted for this resource in the current state")
        })?;
        if !spec.ty.matches(value) {
            return Err(Error::invalid_option(
                key.as_str(),
                format!("expected {}", spec.ty.describe()),
            ));
        }
    }

    Ok(())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    const SCHEMA: Schema = &[
        FieldSpec::required("path", FieldType::Str),
        FieldSpec::optional("size", FieldType::PosInt),
    ];

    proptest! {
        #[test]
        fn prop_valid_bags_pass(path in ".*", size in 1u64..) {
            let mut options = Map::new();
            options.insert("path".to_string(), json!(path));
            options.insert("size".to_string(), json!(size));
            prop_assert!(validate(&options, SCHEMA, true).is_ok());
        }

        #[test]
        fn prop_unknown_keys_fail(key in "[a-z_]{1,16}") {
            prop_assume!(key != "path" && key != "size");
            let mut options = Map::new();
            options.insert("path".to_string(), json!("/x"));
            options.insert(key, json!("y"));
            prop_assert!(validate(&options, SCHEMA, true).is_err());
        }

        #[test]
        fn prop_zero_never_positive(size in Just(0u64)) {
            let mut options = Map::new();
            options.insert("path".to_string(), json!("/x"));
            options.insert("size".to_string(), json!(size));
            prop_assert!(validate(&options, SCHEMA, true).is_err());
        }
    }
}
