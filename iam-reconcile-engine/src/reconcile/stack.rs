//! `ensure_access_stack`: the composite bucket + policy + role + attachment
//! flow.
//!
//! The sequence is not atomic. A partial failure leaves the applied steps in
//! place; re-running the whole flow converges because each step is
//! independently idempotent.

use crate::error::ReconcileResult;
use crate::provider::CloudProvider;
use crate::types::ReconciliationResult;
use iam_reconcile_policy::{bucket_access_policy, PolicyDocument};
use log::info;

/// Desired state for a complete access stack: a bucket, a managed policy
/// scoped to that bucket, a role trusted by a service, and the attachment
/// binding them.
#[derive(Debug, Clone)]
pub struct AccessStackSpec {
    pub bucket_name: String,
    pub region: String,
    pub policy_name: String,
    pub role_name: String,
    pub trust_policy: PolicyDocument,
    pub description: Option<String>,
}

/// Per-resource outcomes of one [`ensure_access_stack`] pass.
///
/// [`ensure_access_stack`]: super::Reconciler::ensure_access_stack
#[derive(Debug, Clone)]
pub struct AccessStackOutcome {
    pub bucket: ReconciliationResult,
    pub policy: ReconciliationResult,
    pub role: ReconciliationResult,
    /// True when this pass made the attachment (false when it already
    /// existed).
    pub attached: bool,
}

impl<P: CloudProvider> super::Reconciler<P> {
    /// Converge the full stack: bucket, bucket-scoped managed policy, role,
    /// attachment, in dependency order with propagation waits between the
    /// dependent steps.
    pub async fn ensure_access_stack(
        &self,
        spec: &AccessStackSpec,
    ) -> ReconcileResult<AccessStackOutcome> {
        let bucket = self.ensure_bucket(&spec.bucket_name, &spec.region).await?;

        let document = bucket_access_policy(&spec.bucket_name);
        let policy = self
            .ensure_managed_policy(&spec.policy_name, &document, spec.description.as_deref())
            .await?;

        let role = self
            .ensure_role(
                &spec.role_name,
                &spec.trust_policy,
                spec.description.as_deref(),
            )
            .await?;

        let attached = self
            .attach_managed_policy_to_role(&spec.role_name, policy.resource())
            .await?;

        info!(
            "access stack for {} converged (bucket {}, policy {}, role {})",
            spec.role_name,
            outcome_word(&bucket),
            outcome_word(&policy),
            outcome_word(&role),
        );
        Ok(AccessStackOutcome {
            bucket,
            policy,
            role,
            attached,
        })
    }
}

fn outcome_word(result: &ReconciliationResult) -> &'static str {
    if result.was_created() {
        "created"
    } else if result.was_updated() {
        "updated"
    } else {
        "unchanged"
    }
}
