use thiserror::Error;

/// Errors raised by mapping validation, metadata resolution and cascade
/// execution. Validation variants name the declaring entity and property so a
/// schema author can locate the offending association from the message alone.
#[derive(Error, Debug)]
pub enum SoftDeleteError {
    #[error("unsupported association for a soft-delete policy on {entity}.{property}: {reason}")]
    AssociationTypeNotSupported {
        entity: String,
        property: String,
        reason: String,
    },

    #[error("association target '{target}' referenced by {entity}.{property} is not registered")]
    AssociationTargetNotFound {
        entity: String,
        property: String,
        target: String,
    },

    #[error("cascade target '{target}' of {entity}.{property} is not soft-deletable")]
    TargetNotSoftDeletable {
        entity: String,
        property: String,
        target: String,
    },

    #[error("cascade target '{target}' of {entity}.{property} declares an empty soft-delete field")]
    TargetSoftDeleteFieldEmpty {
        entity: String,
        property: String,
        target: String,
    },

    #[error("many-to-many soft-delete policy must be declared on the owning side: {entity}.{property}")]
    ManyToManyNotOnOwningSide { entity: String, property: String },

    #[error("unknown deletion policy '{0}'")]
    UnknownDeletionPolicy(String),

    #[error("no accessor for {entity}.{property}: {message}")]
    AccessorNotFound {
        entity: String,
        property: String,
        message: String,
    },

    #[error("mapping error: {0}")]
    Mapping(String),

    #[error("metadata cache error: {0}")]
    Cache(String),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("lock error: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, SoftDeleteError>;

impl<T> From<std::sync::PoisonError<T>> for SoftDeleteError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}
