pub mod cache;
pub mod resolver;
pub mod rule;

pub use cache::{InMemoryMetadataCache, MetadataCache};
pub use resolver::MetadataResolver;
pub use rule::{ResolutionRule, RuleMap};
