pub mod memory;

pub use memory::{InMemoryDriver, TrackedChange};
