//! # Docker Cron Testing Utils
//!
//! Shared test doubles for the workspace crates:
//!
//! - **InMemoryContainerSource**: container listing, lifecycle events, creation, deletion and logs
//! - **RecordingScheduler**: records registrations and returns scripted fire-time predictions
//! - **RecordingBackend**: records executed commands and scripts stop/remove outcomes
//! - **ContainerBuilder**: builds `ContainerInfo` values with labels and mounts
//!
//! ```toml
//! [dev-dependencies]
//! docker-cron-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod mocks;

pub use builders::*;
pub use mocks::*;
