/// Engine tuning knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeConfig {
    /// Prefix for metadata cache keys, letting several engines share one
    /// store.
    pub cache_namespace: String,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            cache_namespace: "softcascade".to_string(),
        }
    }
}

impl CascadeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.cache_namespace = namespace.into();
        self
    }
}
