//! # envsmith-runtime
//!
//! Runs entry points inside materialized environments.
//!
//! Handles:
//! - **Activation**: the immutable variable overlay handed to the child.
//! - **Entry**: resolving commands and modules against that overlay.
//! - **Isolation**: optional namespace restrictions applied before exec.
//! - **Supervisor**: spawning, signal forwarding, and exit status mapping.
//! - **Executor**: the `run` operation tying them together.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod activation;
pub mod entry;
pub mod executor;
pub mod isolation;
pub mod supervisor;

pub use self::activation::ActivationContext;
pub use self::entry::EntryPoint;
pub use self::executor::{RunRequest, ScopedExecutor};
pub use self::isolation::Isolation;
pub use self::supervisor::{ChildExit, ChildSlot};
