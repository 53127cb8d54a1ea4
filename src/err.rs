use thiserror::Error;

use crate::emit::EmitState;

pub type SchemaResult<T> = std::result::Result<T, SchemaError>;
pub type PackResult<T> = std::result::Result<T, PackError>;
pub type EmitResult<T> = std::result::Result<T, EmitError>;

/// Errors detected while resolving templates, keywords and levels.
///
/// These are raised once, before any provider is registered, and abort the setup of the
/// provider being initialized. They are never produced on the emission path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("template `{template}` is defined more than once")]
    DuplicateTemplate { template: String },

    #[error("template `{template}` declares field `{field}` more than once")]
    DuplicateField { template: String, field: String },

    #[error("template `{template}`, field `{field}`: unknown input type `{in_type}`")]
    UnknownInType {
        template: String,
        field: String,
        in_type: String,
    },

    #[error("template `{template}`, field `{field}`: count field `{count}` does not exist")]
    UnknownCountField {
        template: String,
        field: String,
        count: String,
    },

    #[error(
        "template `{template}`, field `{field}`: count field `{count}` must appear before the field it sizes"
    )]
    CountFieldOutOfOrder {
        template: String,
        field: String,
        count: String,
    },

    #[error(
        "template `{template}`, field `{field}`: count field `{count}` is not an integer scalar"
    )]
    CountFieldNotInteger {
        template: String,
        field: String,
        count: String,
    },

    #[error("template `{template}`, field `{field}`: `{in_type}` cannot be used as an array element")]
    UnsupportedArrayElement {
        template: String,
        field: String,
        in_type: String,
    },

    #[error("template `{template}`, field `{field}`: `{in_type}` needs a count field")]
    MissingCount {
        template: String,
        field: String,
        in_type: String,
    },

    #[error("size override refers to unknown field `{template}.{field}`")]
    UnknownOverride { template: String, field: String },

    #[error("size override on `{template}.{field}` which is not an array or struct")]
    OverrideOnScalar { template: String, field: String },

    #[error("event `{event}` references unknown template `{template}`")]
    UnknownTemplate { event: String, template: String },

    #[error("unknown keyword `{keyword}`")]
    UnknownKeyword { keyword: String },

    #[error("unknown level `{level}`")]
    UnknownLevel { level: String },

    #[error("keyword `{keyword}` has an invalid mask `{mask}`")]
    InvalidMask { keyword: String, mask: String },
}

/// Errors produced while serializing a single event payload.
///
/// A pack error only ever drops the event being written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PackError {
    #[error("failed to allocate a {requested} byte payload buffer")]
    AllocationFailed { requested: usize },

    #[error("payload size arithmetic overflowed")]
    Overflow,

    #[error("payload of {size} bytes exceeds the configured maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("template `{template}` expects {expected} values, got {found}")]
    ArityMismatch {
        template: String,
        expected: usize,
        found: usize,
    },

    #[error("field `{field}` expects a {expected} value, got {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("field `{field}` is used as a count but holds {value}")]
    InvalidCount { field: String, value: i128 },

    #[error("field `{field}` needs {need} bytes but the value only has {have}")]
    ValueTooShort {
        field: String,
        need: usize,
        have: usize,
    },
}

/// Errors surfaced to the caller of an event writer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("failed to write event `{event}`: {source}")]
    WriteFault {
        event: String,
        #[source]
        source: PackError,
    },
}

impl EmitError {
    pub fn state(&self) -> EmitState {
        match self {
            EmitError::WriteFault { .. } => EmitState::Failed,
        }
    }

    pub fn pack_error(&self) -> &PackError {
        match self {
            EmitError::WriteFault { source, .. } => source,
        }
    }
}
