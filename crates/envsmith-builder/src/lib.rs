//! # envsmith-builder
//!
//! Materializes named environments from manifests.
//!
//! Handles:
//! - **Resolver**: the narrow seam to an external package resolver, plus a
//!   conda-compatible implementation.
//! - **Store**: on-disk layout of environments and their records.
//! - **Cache**: per-build transient download caches, always evicted.
//! - **Lock**: advisory lock serializing builds.
//! - **Builder**: the all-or-nothing `build` operation.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod builder;
pub mod cache;
pub mod lock;
pub mod record;
pub mod resolver;
pub mod store;

pub use self::builder::{BuildOptions, EnvironmentBuilder};
pub use self::record::{ActivationDescriptor, Environment, EnvironmentRecord};
pub use self::store::EnvironmentStore;
