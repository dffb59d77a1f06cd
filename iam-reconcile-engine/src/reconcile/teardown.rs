//! Teardown operations, idempotent in the same sense as the `ensure_*`
//! family: tearing down a resource that is already gone is a no-op, not an
//! error.

use crate::error::{ProviderError, ReconcileError, ReconcileResult};
use crate::provider::CloudProvider;
use log::{debug, info};

impl<P: CloudProvider> super::Reconciler<P> {
    /// Delete a role along with everything the provider requires to be
    /// removed first: managed-policy attachments, then inline policies, then
    /// the role itself.
    ///
    /// Returns `true` when the role existed and was deleted, `false` when it
    /// was already gone.
    pub async fn teardown_role(&self, role_name: &str) -> ReconcileResult<bool> {
        let role = self
            .provider
            .get_role(role_name)
            .await
            .map_err(|err| ReconcileError::from_provider("get_role", err))?;
        if role.is_none() {
            debug!("role {role_name} already gone");
            return Ok(false);
        }

        let attached = self
            .provider
            .list_attached_policies(role_name)
            .await
            .map_err(|err| ReconcileError::from_provider("list_attached_policies", err))?;
        for identifier in &attached {
            match self.provider.detach_policy(role_name, identifier).await {
                Ok(()) | Err(ProviderError::NotFound) => {}
                Err(err) => return Err(ReconcileError::from_provider("detach_policy", err)),
            }
        }

        let inline = self
            .provider
            .list_inline_policies(role_name)
            .await
            .map_err(|err| ReconcileError::from_provider("list_inline_policies", err))?;
        for policy_name in &inline {
            match self
                .provider
                .delete_inline_policy(role_name, policy_name)
                .await
            {
                Ok(()) | Err(ProviderError::NotFound) => {}
                Err(err) => {
                    return Err(ReconcileError::from_provider("delete_inline_policy", err))
                }
            }
        }

        match self.provider.delete_role(role_name).await {
            Ok(()) => {
                info!("deleted role {role_name}");
                Ok(true)
            }
            // A concurrent teardown beat us to the final delete.
            Err(ProviderError::NotFound) => Ok(false),
            Err(err) => Err(ReconcileError::from_provider("delete_role", err)),
        }
    }

    /// Delete a managed policy: every non-active version first, then the
    /// policy itself.
    ///
    /// Returns `true` when the policy existed and was deleted, `false` when
    /// it was already gone.
    pub async fn delete_managed_policy(&self, identifier: &str) -> ReconcileResult<bool> {
        let versions = match self.provider.list_policy_versions(identifier).await {
            Ok(versions) => versions,
            Err(ProviderError::NotFound) => {
                debug!("managed policy {identifier} already gone");
                return Ok(false);
            }
            Err(err) => return Err(ReconcileError::from_provider("list_policy_versions", err)),
        };

        for version in versions.iter().filter(|version| !version.is_active) {
            match self
                .provider
                .delete_policy_version(identifier, &version.version_id)
                .await
            {
                Ok(()) | Err(ProviderError::NotFound) => {}
                Err(err) => {
                    return Err(ReconcileError::from_provider("delete_policy_version", err))
                }
            }
        }

        match self.provider.delete_policy(identifier).await {
            Ok(()) => {
                info!("deleted managed policy {identifier}");
                Ok(true)
            }
            Err(ProviderError::NotFound) => Ok(false),
            Err(err) => Err(ReconcileError::from_provider("delete_policy", err)),
        }
    }
}
