//! Client side of the remote VCS management service.
//!
//! [`VcsService`] is the contract the pipelines call into. Two backends
//! implement it:
//!
//! - [`rest::RestVcsClient`] talks to a Bitbucket Server compatible REST API.
//! - [`memory::InMemoryVcs`] keeps everything in process and records every
//!   call, for dry runs and tests.
//!
//! Every operation takes the [`Identity`](toolz_core::identity::Identity) it
//! runs as; [`Session`] bundles a service with one identity.

pub mod error;
pub mod memory;
pub mod rest;
pub mod service;

pub use error::{VcsError, VcsResult};
pub use service::{impersonate, Session, VcsService};
