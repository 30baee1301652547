//! Source instrumentation: function discovery and tracking-call injection

pub mod engine;
pub mod identify;
pub mod inventory;

pub use engine::{InstrumentedSource, Instrumenter, DEFAULT_RUNTIME_SPECIFIER};
pub use identify::FunctionKind;
pub use inventory::{FunctionRecord, InventoryStore, StaticInventory};
