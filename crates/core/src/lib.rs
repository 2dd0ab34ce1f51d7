//! Shared domain types for the toolz workspace.
//!
//! This crate has zero internal dependencies so that the VCS client, the
//! worker infrastructure, the pipelines and the API server can all use it.

pub mod error;
pub mod identity;
pub mod naming;
pub mod refs;
pub mod timing;
pub mod types;
