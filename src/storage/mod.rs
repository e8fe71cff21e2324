pub mod engine;
pub mod memory;

pub use engine::{Filter, FindMany, Model, NestedWrite, Persistable, WriteData};
pub use memory::{MemoryTable, TableStats};
