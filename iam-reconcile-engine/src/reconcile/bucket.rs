//! `ensure_bucket`: converge a storage bucket.
//!
//! The one resource here with a global namespace: a name held by another
//! account is a hard failure, while "already exists and owned by me" is the
//! normal idempotent outcome.

use crate::error::{ProviderError, ReconcileError, ReconcileResult};
use crate::provider::CloudProvider;
use crate::types::{BucketProbe, ReconciliationResult};
use crate::waiter::PropagationKind;
use log::{debug, info};

impl<P: CloudProvider> super::Reconciler<P> {
    /// Ensure the named bucket exists in `region` under the caller's
    /// account.
    pub async fn ensure_bucket(
        &self,
        name: &str,
        region: &str,
    ) -> ReconcileResult<ReconciliationResult> {
        let probe = self
            .provider
            .bucket_exists(name)
            .await
            .map_err(|err| ReconcileError::from_provider("bucket_exists", err))?;

        match probe {
            BucketProbe::OwnedByCaller => {
                debug!("bucket {name} already exists");
                return Ok(ReconciliationResult::unchanged(name));
            }
            BucketProbe::OwnedByOther => {
                return Err(ReconcileError::BucketOwnedByOther {
                    name: name.to_string(),
                });
            }
            BucketProbe::NotFound => {}
        }

        match self.provider.create_bucket(name, region).await {
            Ok(()) => {
                info!("created bucket {name} in {region}");
                self.config.waiter.wait(PropagationKind::Bucket, 0).await;
                Ok(ReconciliationResult::created(name))
            }
            // A concurrent caller created it under our account first; the
            // desired state holds either way.
            Err(ProviderError::AlreadyExists) => {
                debug!("lost create race for bucket {name}, already owned by caller");
                Ok(ReconciliationResult::unchanged(name))
            }
            Err(ProviderError::OwnedByOther) => Err(ReconcileError::BucketOwnedByOther {
                name: name.to_string(),
            }),
            Err(err) => Err(ReconcileError::from_provider("create_bucket", err)),
        }
    }
}
