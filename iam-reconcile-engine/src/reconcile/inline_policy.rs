//! `ensure_inline_policy`: converge a policy embedded directly on a role.
//!
//! Inline policies have no versions and no independent identifier; put
//! overwrites in place, so the only decision is whether the stored document
//! already matches.

use crate::error::{ReconcileError, ReconcileResult};
use crate::provider::CloudProvider;
use crate::types::ReconciliationResult;
use iam_reconcile_policy::PolicyDocument;
use log::{debug, info};

impl<P: CloudProvider> super::Reconciler<P> {
    /// Ensure `role_name` carries an inline policy `policy_name` equal to
    /// `document`.
    ///
    /// `created` is reported only when no inline policy of that name existed
    /// before the call.
    pub async fn ensure_inline_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &PolicyDocument,
    ) -> ReconcileResult<ReconciliationResult> {
        let existing = self
            .provider
            .get_inline_policy(role_name, policy_name)
            .await
            .map_err(|err| ReconcileError::from_provider("get_inline_policy", err))?;

        let existed = match existing {
            Some(current) => {
                let matches = document
                    .canonically_equal(&current)
                    .map_err(|err| ReconcileError::policy(policy_name, err))?;
                if matches {
                    debug!("inline policy {policy_name} on role {role_name} already matches");
                    return Ok(ReconciliationResult::unchanged(policy_name));
                }
                true
            }
            None => false,
        };

        self.provider
            .put_inline_policy(role_name, policy_name, document)
            .await
            .map_err(|err| ReconcileError::from_provider("put_inline_policy", err))?;
        info!("put inline policy {policy_name} on role {role_name}");

        if existed {
            Ok(ReconciliationResult::updated(policy_name))
        } else {
            Ok(ReconciliationResult::created(policy_name))
        }
    }
}
