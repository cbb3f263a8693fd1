pub mod error;
pub mod value;

pub use error::{Result, SoftDeleteError};
pub use value::{EntityId, EntityRef, FieldValue};
