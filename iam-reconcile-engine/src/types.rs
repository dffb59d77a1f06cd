use chrono::{DateTime, Utc};
use iam_reconcile_policy::{PolicyDigest, PolicyDocument};

/// Desired state for one resource, as handed to [`Reconciler::ensure`].
///
/// [`Reconciler::ensure`]: crate::reconcile::Reconciler::ensure
#[derive(Debug, Clone)]
pub enum ResourceSpec {
    Role {
        name: String,
        trust_policy: PolicyDocument,
        description: Option<String>,
    },
    ManagedPolicy {
        name: String,
        document: PolicyDocument,
        description: Option<String>,
    },
    InlinePolicy {
        role_name: String,
        policy_name: String,
        document: PolicyDocument,
    },
    Bucket {
        name: String,
        region: String,
    },
}

impl ResourceSpec {
    /// The provider-unique name being reconciled.
    pub fn name(&self) -> &str {
        match self {
            Self::Role { name, .. }
            | Self::ManagedPolicy { name, .. }
            | Self::Bucket { name, .. } => name,
            Self::InlinePolicy { policy_name, .. } => policy_name,
        }
    }
}

/// Outcome of one `ensure_*` call.
///
/// `created` and `updated` are mutually exclusive; both false is a true
/// no-op, meaning actual state already matched desired state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationResult {
    created: bool,
    updated: bool,
    resource: String,
}

impl ReconciliationResult {
    pub(crate) fn created(resource: impl Into<String>) -> Self {
        Self {
            created: true,
            updated: false,
            resource: resource.into(),
        }
    }

    pub(crate) fn updated(resource: impl Into<String>) -> Self {
        Self {
            created: false,
            updated: true,
            resource: resource.into(),
        }
    }

    pub(crate) fn unchanged(resource: impl Into<String>) -> Self {
        Self {
            created: false,
            updated: false,
            resource: resource.into(),
        }
    }

    pub fn was_created(&self) -> bool {
        self.created
    }

    pub fn was_updated(&self) -> bool {
        self.updated
    }

    /// Neither created nor updated: actual state already matched.
    pub fn is_noop(&self) -> bool {
        !self.created && !self.updated
    }

    /// Provider identifier of the reconciled resource (ARN for AWS IAM
    /// resources, name for buckets and inline policies).
    pub fn resource(&self) -> &str {
        &self.resource
    }
}

/// A role as the provider records it.
///
/// Attachment and inline-policy state are fetched through their own provider
/// operations so that fetching a role stays a single call.
#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    /// Provider-unique identifier (ARN for AWS).
    pub identifier: String,
    pub trust_policy: PolicyDocument,
    pub description: Option<String>,
}

/// A managed policy as the provider records it, without version documents.
#[derive(Debug, Clone)]
pub struct ManagedPolicyMeta {
    pub name: String,
    /// Provider-unique identifier (ARN for AWS).
    pub identifier: String,
    /// Version identifier of the currently active version.
    pub active_version_id: String,
}

/// One version of a managed policy.
#[derive(Debug, Clone)]
pub struct ManagedPolicyVersion {
    pub version_id: String,
    /// Digest of the version's canonical document.
    pub digest: PolicyDigest,
    pub is_active: bool,
    pub create_date: DateTime<Utc>,
}

/// Result of probing a bucket name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketProbe {
    /// No bucket with this name is visible.
    NotFound,
    /// The bucket exists in the caller's account.
    OwnedByCaller,
    /// The name is taken by another account.
    OwnedByOther,
}

/// Providers may hold at most this many versions of a managed policy.
pub const MAX_POLICY_VERSIONS: usize = 5;

#[cfg(test)]
mod tests {
    use super::*;
    use iam_reconcile_policy::service_trust_policy;

    #[test]
    fn result_flags_are_mutually_exclusive() {
        assert!(ReconciliationResult::created("arn:x").was_created());
        assert!(!ReconciliationResult::created("arn:x").was_updated());
        assert!(ReconciliationResult::updated("arn:x").was_updated());
        assert!(ReconciliationResult::unchanged("arn:x").is_noop());
    }

    #[test]
    fn spec_name_resolves_per_variant() {
        let spec = ResourceSpec::Role {
            name: "svc-exec".to_string(),
            trust_policy: service_trust_policy("lambda.amazonaws.com"),
            description: None,
        };
        assert_eq!(spec.name(), "svc-exec");

        let spec = ResourceSpec::InlinePolicy {
            role_name: "svc-exec".to_string(),
            policy_name: "inline-s3".to_string(),
            document: service_trust_policy("lambda.amazonaws.com"),
        };
        assert_eq!(spec.name(), "inline-s3");
    }
}
