//! # Marten VM runtime
//!
//! The embedder-facing layer over `marten-vm-core`: a builder that wires the
//! compiler collaborator and console sink into a fresh context, a macrotask
//! event loop that drains microtasks between jobs, and the module-cache
//! loader contract.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod builder;
pub mod event_loop;
pub mod module_loader;

pub use builder::RuntimeBuilder;
pub use event_loop::EventLoop;
pub use module_loader::{ModuleLoader, ModuleResolver, StaticResolver};
