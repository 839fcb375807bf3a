//! # Marten VM reachability oracle
//!
//! The collector itself is an external collaborator; this crate fixes the
//! interfaces the VM consumes:
//!
//! - [`GcRef`] — shared handles rooted at the runtime (contexts, atom table,
//!   microtask queue, VM stack). Cycles are expected and are the collector's
//!   problem, not the handle's.
//! - [`Trace`] — the reachability interface a collector walks.
//! - [`WeakSlot`] / [`EphemeronTable`] / [`FinalizationRegistryData`] — weak
//!   references that never keep their target alive, with dead-entry sweeping
//!   for `WeakRef`, `WeakMap`/`WeakSet`, and `FinalizationRegistry`.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod ephemeron;
pub mod finalization;
pub mod handle;
pub mod weak;

pub use ephemeron::EphemeronTable;
pub use finalization::FinalizationRegistryData;
pub use handle::{GcRef, ObjectId, Trace, WeakGc};
pub use weak::WeakSlot;
