use iam_reconcile_policy::PolicyError;
use thiserror::Error;

/// Errors returned by [`CloudProvider`](crate::provider::CloudProvider)
/// implementations.
///
/// The variants a reconciler branches on (`NotFound`, `AlreadyExists`,
/// `OwnedByOther`) are data as much as they are failures; everything else is
/// passed through with context.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The named resource does not exist.
    #[error("resource not found")]
    NotFound,

    /// A resource with this name already exists (typically a create race).
    #[error("resource already exists")]
    AlreadyExists,

    /// The name exists but belongs to another account.
    #[error("resource name is owned by another account")]
    OwnedByOther,

    /// The provider rejected the call because a quota or cap was hit.
    #[error("provider limit exceeded: {0}")]
    LimitExceeded(String),

    /// The provider refused to delete the active policy version.
    #[error("deletion of active policy version rejected: {0}")]
    ActiveVersionDeletion(String),

    /// The provider returned a document this crate cannot parse.
    #[error("malformed policy document from provider")]
    InvalidDocument(#[from] PolicyError),

    /// Timeouts, throttling, and 5xx-class responses. Safe to retry.
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Anything else the provider reported.
    #[error("provider call failed: {0}")]
    Other(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors surfaced by the reconcilers.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Version creation was still rejected after eviction. Indicates the
    /// provider's versioning rules changed out from under us.
    #[error("policy version limit still exceeded for {name} after eviction")]
    VersionLimit {
        name: String,
        #[source]
        source: ProviderError,
    },

    /// Eviction selected the active version and the provider rejected the
    /// delete. A reconciler bug; surfaced, never retried.
    #[error("attempted deletion of the active policy version of {name}")]
    ActiveVersionDeletion {
        name: String,
        #[source]
        source: ProviderError,
    },

    /// The bucket name exists under someone else's account. Retrying cannot
    /// change ownership.
    #[error("bucket {name} already exists and is owned by another account")]
    BucketOwnedByOther { name: String },

    /// Transient provider failure. The reconciler does not retry internally;
    /// re-invoke the operation.
    #[error("transient provider failure during {operation}")]
    Transient {
        operation: String,
        #[source]
        source: ProviderError,
    },

    /// A desired-state document failed to canonicalize.
    #[error("invalid policy document for {name}")]
    Policy {
        name: String,
        #[source]
        source: PolicyError,
    },

    /// Non-transient provider failure.
    #[error("provider call failed during {operation}")]
    Provider {
        operation: String,
        #[source]
        source: ProviderError,
    },
}

impl ReconcileError {
    /// Wrap a provider failure, keeping transient failures distinguishable
    /// so callers can apply their own retry policy.
    pub(crate) fn from_provider(operation: impl Into<String>, source: ProviderError) -> Self {
        let operation = operation.into();
        match source {
            ProviderError::Transient(_) => Self::Transient { operation, source },
            _ => Self::Provider { operation, source },
        }
    }

    pub(crate) fn policy(name: impl Into<String>, source: PolicyError) -> Self {
        Self::Policy {
            name: name.into(),
            source,
        }
    }

    /// True when the failure is worth retrying from the caller's side.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Result type for reconciler operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification_survives_wrapping() {
        let err = ReconcileError::from_provider(
            "get_role",
            ProviderError::Transient("throttled".to_string()),
        );
        assert!(err.is_transient());

        let err = ReconcileError::from_provider("get_role", ProviderError::NotFound);
        assert!(!err.is_transient());
    }

    #[test]
    fn errors_render_with_context() {
        let err = ReconcileError::BucketOwnedByOther {
            name: "shared-bucket".to_string(),
        };
        assert!(err.to_string().contains("shared-bucket"));
    }
}
