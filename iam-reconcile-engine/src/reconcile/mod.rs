//! The reconcilers.
//!
//! [`Reconciler`] holds a [`CloudProvider`] and the configuration, and
//! exposes one `ensure_*` operation per resource kind. Each operation lives
//! in its own file: `role`, `managed_policy` (version eviction included),
//! `inline_policy`, `attachment`, `bucket`, `teardown`, and `stack` for the
//! composite flow.

mod attachment;
mod bucket;
mod inline_policy;
mod managed_policy;
mod role;
mod stack;
mod teardown;

pub use stack::{AccessStackOutcome, AccessStackSpec};

use crate::error::ReconcileResult;
use crate::provider::CloudProvider;
use crate::types::{ReconciliationResult, ResourceSpec, MAX_POLICY_VERSIONS};
use crate::waiter::PropagationWaiter;

/// Engine configuration, passed in explicitly rather than read from the
/// environment.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Managed-policy version ceiling the provider enforces.
    pub max_policy_versions: usize,

    /// Post-mutation delay policy.
    pub waiter: PropagationWaiter,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_policy_versions: MAX_POLICY_VERSIONS,
            waiter: PropagationWaiter::default(),
        }
    }
}

impl ReconcilerConfig {
    /// Zero-duration waits, for tests against an in-memory provider.
    pub fn without_waits() -> Self {
        Self {
            waiter: PropagationWaiter::disabled(),
            ..Self::default()
        }
    }
}

/// Reconciles desired resource state against a cloud provider.
///
/// Holds no resource state of its own; the provider is the system of record
/// and every operation re-derives truth from it.
pub struct Reconciler<P: CloudProvider> {
    pub(crate) provider: P,
    pub(crate) config: ReconcilerConfig,
}

impl<P: CloudProvider> Reconciler<P> {
    /// Reconciler with the default configuration (provider version cap,
    /// conventional propagation delay).
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, ReconcilerConfig::default())
    }

    pub fn with_config(provider: P, config: ReconcilerConfig) -> Self {
        Self { provider, config }
    }

    /// The provider this reconciler operates against.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Converge one resource to its desired state.
    ///
    /// Dispatches to the matching `ensure_*` operation; the per-kind methods
    /// are also public for callers that know the kind statically.
    pub async fn ensure(&self, spec: &ResourceSpec) -> ReconcileResult<ReconciliationResult> {
        match spec {
            ResourceSpec::Role {
                name,
                trust_policy,
                description,
            } => {
                self.ensure_role(name, trust_policy, description.as_deref())
                    .await
            }
            ResourceSpec::ManagedPolicy {
                name,
                document,
                description,
            } => {
                self.ensure_managed_policy(name, document, description.as_deref())
                    .await
            }
            ResourceSpec::InlinePolicy {
                role_name,
                policy_name,
                document,
            } => {
                self.ensure_inline_policy(role_name, policy_name, document)
                    .await
            }
            ResourceSpec::Bucket { name, region } => self.ensure_bucket(name, region).await,
        }
    }
}
