//! `ensure_managed_policy`: converge a versioned managed policy.
//!
//! The provider caps versions per policy and refuses to delete the active
//! one. Before adding a version, the reconciler evicts oldest non-active
//! versions until the count is strictly below the cap, which also corrects
//! any drift introduced out of band.

use crate::error::{ProviderError, ReconcileError, ReconcileResult};
use crate::provider::CloudProvider;
use crate::types::{ManagedPolicyMeta, ManagedPolicyVersion, ReconciliationResult};
use crate::waiter::PropagationKind;
use iam_reconcile_policy::PolicyDocument;
use log::{debug, info};

impl<P: CloudProvider> super::Reconciler<P> {
    /// Ensure the named managed policy exists with `document` as its active
    /// version.
    ///
    /// The returned result carries the policy identifier; `updated` means a
    /// new version was created and made active.
    pub async fn ensure_managed_policy(
        &self,
        name: &str,
        document: &PolicyDocument,
        description: Option<&str>,
    ) -> ReconcileResult<ReconciliationResult> {
        let desired_digest = document
            .digest()
            .map_err(|err| ReconcileError::policy(name, err))?;

        let existing = self
            .provider
            .get_policy(name)
            .await
            .map_err(|err| ReconcileError::from_provider("get_policy", err))?;

        let meta = match existing {
            Some(meta) => meta,
            None => match self.provider.create_policy(name, document, description).await {
                Ok(identifier) => {
                    info!("created managed policy {name}");
                    self.config.waiter.wait(PropagationKind::Policy, 0).await;
                    return Ok(ReconciliationResult::created(identifier));
                }
                Err(ProviderError::AlreadyExists) => {
                    debug!("lost create race for policy {name}, reconciling the winner");
                    self.refetch_policy(name).await?
                }
                Err(err) => return Err(ReconcileError::from_provider("create_policy", err)),
            },
        };

        let mut versions = self
            .provider
            .list_policy_versions(&meta.identifier)
            .await
            .map_err(|err| ReconcileError::from_provider("list_policy_versions", err))?;

        let active_matches = versions
            .iter()
            .any(|version| version.is_active && version.digest == desired_digest);
        if active_matches {
            debug!("managed policy {name} already carries the desired document");
            return Ok(ReconciliationResult::unchanged(meta.identifier));
        }

        // FIFO eviction: oldest non-active versions go first, looping so an
        // over-cap policy converges in one pass.
        versions.sort_by(|a, b| a.create_date.cmp(&b.create_date));
        while versions.len() >= self.config.max_policy_versions {
            let index = versions
                .iter()
                .position(|version| !version.is_active)
                .ok_or_else(|| {
                    // Unreachable while the provider keeps exactly one
                    // version active; kept as a hard stop rather than a
                    // delete call aimed at the active version.
                    ReconcileError::ActiveVersionDeletion {
                        name: name.to_string(),
                        source: ProviderError::Other(
                            "every retained version is marked active".to_string(),
                        ),
                    }
                })?;
            let evicted: ManagedPolicyVersion = versions.remove(index);
            debug!(
                "evicting version {} of managed policy {name}",
                evicted.version_id
            );
            self.provider
                .delete_policy_version(&meta.identifier, &evicted.version_id)
                .await
                .map_err(|err| match err {
                    ProviderError::ActiveVersionDeletion(_) => {
                        ReconcileError::ActiveVersionDeletion {
                            name: name.to_string(),
                            source: err,
                        }
                    }
                    other => ReconcileError::from_provider("delete_policy_version", other),
                })?;
        }

        self.provider
            .create_policy_version(&meta.identifier, document, true)
            .await
            .map_err(|err| match err {
                ProviderError::LimitExceeded(_) => ReconcileError::VersionLimit {
                    name: name.to_string(),
                    source: err,
                },
                other => ReconcileError::from_provider("create_policy_version", other),
            })?;
        info!("created new active version of managed policy {name}");
        self.config.waiter.wait(PropagationKind::Policy, 0).await;
        Ok(ReconciliationResult::updated(meta.identifier))
    }

    /// Fetch policy metadata a concurrent caller just created; a miss is a
    /// replication lag, reported as transient.
    async fn refetch_policy(&self, name: &str) -> ReconcileResult<ManagedPolicyMeta> {
        match self.provider.get_policy(name).await {
            Ok(Some(meta)) => Ok(meta),
            Ok(None) => Err(ReconcileError::from_provider(
                "get_policy",
                ProviderError::Transient(format!(
                    "policy {name} exists but is not yet visible to reads"
                )),
            )),
            Err(err) => Err(ReconcileError::from_provider("get_policy", err)),
        }
    }
}
