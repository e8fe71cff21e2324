pub mod error;
pub mod types;
pub mod value;

pub use error::{InvalidInput, Result, SeedError, StoreError};
pub use types::{Actor, Role};
pub use value::{Fields, Value, fields_to_json};
