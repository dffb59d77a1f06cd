//! `attach_managed_policy_to_role`: duplicate-free policy attachment.

use crate::error::{ProviderError, ReconcileError, ReconcileResult};
use crate::provider::CloudProvider;
use crate::waiter::PropagationKind;
use log::{debug, info};

impl<P: CloudProvider> super::Reconciler<P> {
    /// Attach a managed policy to a role unless it is already attached.
    ///
    /// Returns `true` when a new attachment was made, `false` when the
    /// policy was already attached (in which case no mutating call is
    /// issued at all).
    pub async fn attach_managed_policy_to_role(
        &self,
        role_name: &str,
        policy_identifier: &str,
    ) -> ReconcileResult<bool> {
        let attached = self
            .provider
            .list_attached_policies(role_name)
            .await
            .map_err(|err| ReconcileError::from_provider("list_attached_policies", err))?;
        if attached.iter().any(|arn| arn == policy_identifier) {
            debug!("policy {policy_identifier} already attached to role {role_name}");
            return Ok(false);
        }

        match self.provider.attach_policy(role_name, policy_identifier).await {
            Ok(()) => {
                info!("attached policy {policy_identifier} to role {role_name}");
                self.config.waiter.wait(PropagationKind::Attachment, 0).await;
                Ok(true)
            }
            // A concurrent caller attached it between our list and attach.
            Err(ProviderError::AlreadyExists) => Ok(false),
            Err(err) => Err(ReconcileError::from_provider("attach_policy", err)),
        }
    }
}
