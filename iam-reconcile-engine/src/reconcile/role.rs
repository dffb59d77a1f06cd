//! `ensure_role`: converge a role and its trust relationship.

use crate::error::{ProviderError, ReconcileError, ReconcileResult};
use crate::provider::CloudProvider;
use crate::types::{ReconciliationResult, Role};
use crate::waiter::PropagationKind;
use iam_reconcile_policy::PolicyDocument;
use log::{debug, info};

impl<P: CloudProvider> super::Reconciler<P> {
    /// Ensure the named role exists with the given trust policy.
    ///
    /// Creates the role when it is missing, updates the trust policy in
    /// place when the canonical forms differ, and does nothing otherwise.
    /// Losing a create race to a concurrent caller lands in the update
    /// branch rather than failing.
    pub async fn ensure_role(
        &self,
        name: &str,
        trust_policy: &PolicyDocument,
        description: Option<&str>,
    ) -> ReconcileResult<ReconciliationResult> {
        let existing = self
            .provider
            .get_role(name)
            .await
            .map_err(|err| ReconcileError::from_provider("get_role", err))?;

        let role = match existing {
            Some(role) => role,
            None => match self.provider.create_role(name, trust_policy, description).await {
                Ok(role) => {
                    info!("created role {name}");
                    // Dependent calls (attachments, inline puts) can race
                    // the control plane's replication of a fresh role.
                    self.config.waiter.wait(PropagationKind::Role, 0).await;
                    return Ok(ReconciliationResult::created(role.identifier));
                }
                Err(ProviderError::AlreadyExists) => {
                    debug!("lost create race for role {name}, reconciling the winner");
                    self.refetch_role(name).await?
                }
                Err(err) => return Err(ReconcileError::from_provider("create_role", err)),
            },
        };

        let matches = trust_policy
            .canonically_equal(&role.trust_policy)
            .map_err(|err| ReconcileError::policy(name, err))?;
        if matches {
            debug!("role {name} trust policy already matches");
            return Ok(ReconciliationResult::unchanged(role.identifier));
        }

        self.provider
            .update_role_trust_policy(name, trust_policy)
            .await
            .map_err(|err| ReconcileError::from_provider("update_role_trust_policy", err))?;
        info!("updated trust policy of role {name}");
        self.config.waiter.wait(PropagationKind::Role, 0).await;
        Ok(ReconciliationResult::updated(role.identifier))
    }

    /// Fetch a role that a concurrent caller just created. A miss here means
    /// the read replica has not caught up; that is a transient failure, not
    /// an absent role.
    async fn refetch_role(&self, name: &str) -> ReconcileResult<Role> {
        match self.provider.get_role(name).await {
            Ok(Some(role)) => Ok(role),
            Ok(None) => Err(ReconcileError::from_provider(
                "get_role",
                ProviderError::Transient(format!(
                    "role {name} exists but is not yet visible to reads"
                )),
            )),
            Err(err) => Err(ReconcileError::from_provider("get_role", err)),
        }
    }
}
