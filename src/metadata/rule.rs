use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::mapping::{AssociationKind, DeletionPolicy};

/// One resolved soft-delete consequence, derived from a policy-bearing
/// association and cached under the entity type whose deletion triggers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRule {
    /// Entity declaring the association (the side holding the reference or
    /// owning the join collection).
    pub owner_entity: String,
    /// Declared property on the owner.
    pub owner_property: String,
    /// Entity whose deletion fires the rule.
    pub target_entity: String,
    /// Property on the target pointing back, when bidirectional.
    pub target_inverse_property: Option<String>,
    /// Soft-delete timestamp field declared by the target mapping; present
    /// for `Cascade` rules only.
    pub target_soft_delete_field: Option<String>,
    pub kind: AssociationKind,
    pub unidirectional: bool,
    pub policy: DeletionPolicy,
}

impl ResolutionRule {
    /// Bucket-local key: the target-side property name, falling back to the
    /// declaring property when the association has no inverse.
    pub fn bucket_key(&self) -> &str {
        self.target_inverse_property
            .as_deref()
            .unwrap_or(&self.owner_property)
    }
}

/// Per-entity rule bucket, keyed by `ResolutionRule::bucket_key`. `BTreeMap`
/// keeps the serialized payload deterministic, which makes concurrent
/// idempotent cache writes converge byte-for-byte.
pub type RuleMap = BTreeMap<String, ResolutionRule>;

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(inverse: Option<&str>) -> ResolutionRule {
        ResolutionRule {
            owner_entity: "post".to_string(),
            owner_property: "author".to_string(),
            target_entity: "user".to_string(),
            target_inverse_property: inverse.map(str::to_string),
            target_soft_delete_field: None,
            kind: AssociationKind::ManyToOne,
            unidirectional: inverse.is_none(),
            policy: DeletionPolicy::Nullify,
        }
    }

    #[test]
    fn bucket_key_prefers_the_inverse_property() {
        assert_eq!(rule(Some("posts")).bucket_key(), "posts");
    }

    #[test]
    fn bucket_key_falls_back_to_the_declaring_property() {
        assert_eq!(rule(None).bucket_key(), "author");
    }
}
