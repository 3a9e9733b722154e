//! `opsdesk` - Role-gated record collections for a small operations dashboard
//!
//! This library provides the persistence and access-control core behind the
//! dashboard: backend stores, positional collection repositories, the role
//! policy, sessions, and work assignments.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod assignment;
pub mod cli;
pub mod collection;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod policy;
pub mod record;
pub mod repository;
pub mod session;
pub mod store;

pub use assignment::{Assignment, AssignmentStatus, AssignmentView, DeletionPolicy};
pub use collection::{CollectionKind, CollectionSpec};
pub use config::Config;
pub use dashboard::Dashboard;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use policy::{AccessPolicy, Capability, CapabilitySet, Role};
pub use record::{FieldValue, Record};
pub use repository::CollectionRepository;
pub use session::{Identity, LastAccess, Session};
pub use store::{BackendStore, ReadOutcome};
