//! Domain logic for generation job orchestration.
//!
//! This crate has no I/O: it holds the status state machine, the output
//! normalizer, webhook signature primitives and cost attribution so that
//! the persistence, provider and HTTP layers can all share them.

pub mod cost;
pub mod error;
pub mod normalize;
pub mod report;
pub mod signature;
pub mod status;
pub mod types;
