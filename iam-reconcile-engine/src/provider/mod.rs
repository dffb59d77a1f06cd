//! The boundary between the reconcilers and a cloud control plane.
//!
//! [`CloudProvider`] is the complete set of identity and storage operations
//! the engine needs. [`aws::AwsProvider`] implements it over the AWS SDK;
//! [`memory::MemoryProvider`] implements it in process for tests and
//! simulations.

pub mod aws;
pub mod memory;

use crate::error::ProviderResult;
use crate::types::{BucketProbe, ManagedPolicyMeta, ManagedPolicyVersion, Role};
use async_trait::async_trait;
use iam_reconcile_policy::PolicyDocument;

/// Cloud identity/storage operations, one method per control-plane call.
///
/// Implementations translate their transport's failures into
/// [`ProviderError`](crate::error::ProviderError) variants; the reconcilers
/// branch on `NotFound` and `AlreadyExists` rather than treating them as
/// failures.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Fetch a role, `None` when it does not exist.
    async fn get_role(&self, name: &str) -> ProviderResult<Option<Role>>;

    /// Create a role with the given trust policy.
    async fn create_role(
        &self,
        name: &str,
        trust_policy: &PolicyDocument,
        description: Option<&str>,
    ) -> ProviderResult<Role>;

    /// Replace an existing role's trust policy.
    async fn update_role_trust_policy(
        &self,
        name: &str,
        trust_policy: &PolicyDocument,
    ) -> ProviderResult<()>;

    /// Delete a role. The role must have no attachments or inline policies.
    async fn delete_role(&self, name: &str) -> ProviderResult<()>;

    /// Fetch managed-policy metadata by name, `None` when it does not exist.
    async fn get_policy(&self, name: &str) -> ProviderResult<Option<ManagedPolicyMeta>>;

    /// Create a managed policy; the document becomes the active version.
    /// Returns the new policy's identifier.
    async fn create_policy(
        &self,
        name: &str,
        document: &PolicyDocument,
        description: Option<&str>,
    ) -> ProviderResult<String>;

    /// All versions of a managed policy, digests included.
    async fn list_policy_versions(
        &self,
        identifier: &str,
    ) -> ProviderResult<Vec<ManagedPolicyVersion>>;

    /// Add a version. With `set_active` the new version becomes the active
    /// one, demoting the previous active version.
    async fn create_policy_version(
        &self,
        identifier: &str,
        document: &PolicyDocument,
        set_active: bool,
    ) -> ProviderResult<()>;

    /// Delete one non-active version.
    async fn delete_policy_version(
        &self,
        identifier: &str,
        version_id: &str,
    ) -> ProviderResult<()>;

    /// Delete a managed policy. Non-active versions must be gone first.
    async fn delete_policy(&self, identifier: &str) -> ProviderResult<()>;

    /// Fetch an inline policy document, `None` when the role has no inline
    /// policy of that name.
    async fn get_inline_policy(
        &self,
        role_name: &str,
        policy_name: &str,
    ) -> ProviderResult<Option<PolicyDocument>>;

    /// Create or overwrite an inline policy on a role.
    async fn put_inline_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &PolicyDocument,
    ) -> ProviderResult<()>;

    /// Names of the role's inline policies.
    async fn list_inline_policies(&self, role_name: &str) -> ProviderResult<Vec<String>>;

    /// Delete one inline policy from a role.
    async fn delete_inline_policy(&self, role_name: &str, policy_name: &str)
        -> ProviderResult<()>;

    /// Identifiers of the managed policies attached to a role.
    async fn list_attached_policies(&self, role_name: &str) -> ProviderResult<Vec<String>>;

    /// Attach a managed policy to a role.
    async fn attach_policy(&self, role_name: &str, identifier: &str) -> ProviderResult<()>;

    /// Detach a managed policy from a role.
    async fn detach_policy(&self, role_name: &str, identifier: &str) -> ProviderResult<()>;

    /// Probe a bucket name.
    async fn bucket_exists(&self, name: &str) -> ProviderResult<BucketProbe>;

    /// Create a bucket in the given region.
    async fn create_bucket(&self, name: &str, region: &str) -> ProviderResult<()>;
}
