use std::fmt;

use serde::{Deserialize, Serialize};

use super::policy::DeletionPolicy;

/// Cardinality of an association property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssociationKind {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl AssociationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneToOne => "ONE_TO_ONE",
            Self::ManyToOne => "MANY_TO_ONE",
            Self::OneToMany => "ONE_TO_MANY",
            Self::ManyToMany => "MANY_TO_MANY",
        }
    }

    /// Single-valued on the declaring side; the shapes `Nullify` and
    /// `Cascade` operate on.
    pub fn is_to_one(&self) -> bool {
        matches!(self, Self::OneToOne | Self::ManyToOne)
    }
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One association property of an entity mapping, with its optional deletion
/// policy.
///
/// Side ownership follows the usual ORM convention: declaring `mapped_by`
/// makes a side non-owning, declaring `inversed_by` (or neither) keeps it
/// owning. An association with neither is unidirectional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationDescriptor {
    name: String,
    kind: AssociationKind,
    target_entity: String,
    inversed_by: Option<String>,
    mapped_by: Option<String>,
    policy: Option<DeletionPolicy>,
}

impl AssociationDescriptor {
    fn new(name: impl Into<String>, kind: AssociationKind, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            target_entity: target.into(),
            inversed_by: None,
            mapped_by: None,
            policy: None,
        }
    }

    pub fn one_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, AssociationKind::OneToOne, target)
    }

    pub fn many_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, AssociationKind::ManyToOne, target)
    }

    pub fn one_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, AssociationKind::OneToMany, target)
    }

    pub fn many_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, AssociationKind::ManyToMany, target)
    }

    /// Names the inverse property on the target; declared on the owning side.
    pub fn inversed_by(mut self, property: impl Into<String>) -> Self {
        self.inversed_by = Some(property.into());
        self
    }

    /// Names the owning property on the target; makes this side non-owning.
    pub fn mapped_by(mut self, property: impl Into<String>) -> Self {
        self.mapped_by = Some(property.into());
        self
    }

    pub fn on_delete(mut self, policy: DeletionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AssociationKind {
        self.kind
    }

    pub fn target_entity(&self) -> &str {
        &self.target_entity
    }

    pub fn policy(&self) -> Option<DeletionPolicy> {
        self.policy
    }

    pub fn is_owning_side(&self) -> bool {
        self.mapped_by.is_none()
    }

    pub fn is_unidirectional(&self) -> bool {
        self.inversed_by.is_none() && self.mapped_by.is_none()
    }

    /// Name of the corresponding property on the target entity, when the
    /// association is bidirectional.
    pub fn inverse_property(&self) -> Option<&str> {
        if self.is_owning_side() {
            self.inversed_by.as_deref()
        } else {
            self.mapped_by.as_deref()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_by_makes_a_side_non_owning() {
        let owning = AssociationDescriptor::many_to_many("tags", "tag").inversed_by("posts");
        let inverse = AssociationDescriptor::many_to_many("posts", "post").mapped_by("tags");
        assert!(owning.is_owning_side());
        assert!(!inverse.is_owning_side());
    }

    #[test]
    fn unidirectional_means_neither_side_is_named() {
        let plain = AssociationDescriptor::many_to_one("author", "user");
        assert!(plain.is_unidirectional());
        assert!(plain.is_owning_side());
        assert!(
            !AssociationDescriptor::many_to_one("author", "user")
                .inversed_by("posts")
                .is_unidirectional()
        );
    }

    #[test]
    fn inverse_property_follows_the_declared_side() {
        let owning = AssociationDescriptor::many_to_many("tags", "tag").inversed_by("posts");
        assert_eq!(owning.inverse_property(), Some("posts"));

        let inverse = AssociationDescriptor::many_to_many("posts", "post").mapped_by("tags");
        assert_eq!(inverse.inverse_property(), Some("tags"));

        let plain = AssociationDescriptor::many_to_one("author", "user");
        assert_eq!(plain.inverse_property(), None);
    }

    #[test]
    fn to_one_kinds_are_single_valued() {
        assert!(AssociationKind::OneToOne.is_to_one());
        assert!(AssociationKind::ManyToOne.is_to_one());
        assert!(!AssociationKind::OneToMany.is_to_one());
        assert!(!AssociationKind::ManyToMany.is_to_one());
    }
}
