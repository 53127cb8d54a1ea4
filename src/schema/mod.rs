//! Event schema model.
//!
//! A schema is the declarative description of providers, their events, the templates
//! those events carry and the keyword vocabulary. It is consumed once at startup:
//! - `types`: the serde-facing input (what a manifest compiler or hand-written JSON produces)
//! - `resolve`: turns template definitions into immutable [`Template`] values with concrete
//!   wire kinds, count links and an inline size estimate
//!
//! Nothing in here runs on the emission path.

mod resolve;
mod types;

pub use resolve::{
    CountRef, DEFAULT_STRING_ALLOWANCE, ElementSize, Field, ResolveOptions, SizeOverrides,
    Template, TemplateSet, WireKind, resolve,
};
pub use types::*;
