//! In-memory [`CloudProvider`] for tests and simulations.
//!
//! Behaves like the real control plane where the reconcilers care: duplicate
//! creates fail with `AlreadyExists`, the version cap is enforced, deleting
//! the active version is rejected, and deletes of missing resources report
//! `NotFound`. One-shot stale reads can be injected to simulate losing a
//! create race against a concurrent caller.

use crate::error::{ProviderError, ProviderResult};
use crate::provider::CloudProvider;
use crate::types::{
    BucketProbe, ManagedPolicyMeta, ManagedPolicyVersion, Role, MAX_POLICY_VERSIONS,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use iam_reconcile_policy::{PolicyDigest, PolicyDocument};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

const ACCOUNT_ID: &str = "123456789012";

#[derive(Debug, Clone)]
struct RoleRecord {
    identifier: String,
    trust_policy: PolicyDocument,
    description: Option<String>,
    attached: BTreeSet<String>,
    inline: BTreeMap<String, PolicyDocument>,
}

#[derive(Debug, Clone)]
struct VersionRecord {
    version_id: String,
    digest: PolicyDigest,
    is_active: bool,
    create_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct PolicyRecord {
    name: String,
    identifier: String,
    versions: Vec<VersionRecord>,
    next_version: u64,
}

impl PolicyRecord {
    fn active_version_id(&self) -> Option<&str> {
        self.versions
            .iter()
            .find(|version| version.is_active)
            .map(|version| version.version_id.as_str())
    }
}

#[derive(Debug, Default)]
struct InnerState {
    roles: HashMap<String, RoleRecord>,
    policies: HashMap<String, PolicyRecord>,
    buckets: HashMap<String, String>,
    foreign_buckets: HashSet<String>,
    stale_role_reads: HashSet<String>,
    stale_policy_reads: HashSet<String>,
    stale_bucket_reads: HashSet<String>,
    clock: i64,
}

impl InnerState {
    /// Monotonic timestamps so version age is unambiguous.
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        DateTime::from_timestamp(self.clock, 0).unwrap_or_default()
    }

    fn role_mut(&mut self, name: &str) -> ProviderResult<&mut RoleRecord> {
        self.roles.get_mut(name).ok_or(ProviderError::NotFound)
    }

    fn policy_by_identifier(&self, identifier: &str) -> ProviderResult<&PolicyRecord> {
        self.policies
            .values()
            .find(|policy| policy.identifier == identifier)
            .ok_or(ProviderError::NotFound)
    }

    fn policy_by_identifier_mut(&mut self, identifier: &str) -> ProviderResult<&mut PolicyRecord> {
        self.policies
            .values_mut()
            .find(|policy| policy.identifier == identifier)
            .ok_or(ProviderError::NotFound)
    }
}

/// HashMap-backed provider. Cloning shares the underlying state, so a clone
/// handed to a second task acts as a second caller against the same account.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    inner: Arc<RwLock<InnerState>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, InnerState> {
        self.inner.read().expect("acquire shared read access")
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, InnerState> {
        self.inner.write().expect("acquire exclusive write access")
    }

    /// Make the next `get_role` for `name` miss, as a read replica that has
    /// not seen a concurrent create would.
    pub fn simulate_stale_role_read(&self, name: &str) {
        self.write_state().stale_role_reads.insert(name.to_string());
    }

    /// Make the next `get_policy` for `name` miss.
    pub fn simulate_stale_policy_read(&self, name: &str) {
        self.write_state()
            .stale_policy_reads
            .insert(name.to_string());
    }

    /// Make the next `bucket_exists` for `name` report not-found.
    pub fn simulate_stale_bucket_read(&self, name: &str) {
        self.write_state()
            .stale_bucket_reads
            .insert(name.to_string());
    }

    /// Seed a bucket owned by a different account.
    pub fn add_foreign_bucket(&self, name: &str) {
        self.write_state().foreign_buckets.insert(name.to_string());
    }

    fn role_identifier(name: &str) -> String {
        format!("arn:aws:iam::{ACCOUNT_ID}:role/{name}")
    }

    fn policy_identifier(name: &str) -> String {
        format!("arn:aws:iam::{ACCOUNT_ID}:policy/{name}")
    }
}

#[async_trait]
impl CloudProvider for MemoryProvider {
    async fn get_role(&self, name: &str) -> ProviderResult<Option<Role>> {
        let mut state = self.write_state();
        if state.stale_role_reads.remove(name) {
            return Ok(None);
        }
        Ok(state.roles.get(name).map(|record| Role {
            name: name.to_string(),
            identifier: record.identifier.clone(),
            trust_policy: record.trust_policy.clone(),
            description: record.description.clone(),
        }))
    }

    async fn create_role(
        &self,
        name: &str,
        trust_policy: &PolicyDocument,
        description: Option<&str>,
    ) -> ProviderResult<Role> {
        let mut state = self.write_state();
        if state.roles.contains_key(name) {
            return Err(ProviderError::AlreadyExists);
        }
        let identifier = Self::role_identifier(name);
        state.roles.insert(
            name.to_string(),
            RoleRecord {
                identifier: identifier.clone(),
                trust_policy: trust_policy.clone(),
                description: description.map(str::to_string),
                attached: BTreeSet::new(),
                inline: BTreeMap::new(),
            },
        );
        Ok(Role {
            name: name.to_string(),
            identifier,
            trust_policy: trust_policy.clone(),
            description: description.map(str::to_string),
        })
    }

    async fn update_role_trust_policy(
        &self,
        name: &str,
        trust_policy: &PolicyDocument,
    ) -> ProviderResult<()> {
        let mut state = self.write_state();
        let record = state.role_mut(name)?;
        record.trust_policy = trust_policy.clone();
        Ok(())
    }

    async fn delete_role(&self, name: &str) -> ProviderResult<()> {
        let mut state = self.write_state();
        let record = state.roles.get(name).ok_or(ProviderError::NotFound)?;
        if !record.attached.is_empty() || !record.inline.is_empty() {
            return Err(ProviderError::Other(format!(
                "role {name} still has attached or inline policies"
            )));
        }
        state.roles.remove(name);
        Ok(())
    }

    async fn get_policy(&self, name: &str) -> ProviderResult<Option<ManagedPolicyMeta>> {
        let mut state = self.write_state();
        if state.stale_policy_reads.remove(name) {
            return Ok(None);
        }
        let Some(record) = state.policies.get(name) else {
            return Ok(None);
        };
        let active_version_id = record
            .active_version_id()
            .ok_or_else(|| {
                ProviderError::Other(format!("policy {name} has no active version"))
            })?
            .to_string();
        Ok(Some(ManagedPolicyMeta {
            name: record.name.clone(),
            identifier: record.identifier.clone(),
            active_version_id,
        }))
    }

    async fn create_policy(
        &self,
        name: &str,
        document: &PolicyDocument,
        _description: Option<&str>,
    ) -> ProviderResult<String> {
        let digest = document.digest()?;
        let mut state = self.write_state();
        if state.policies.contains_key(name) {
            return Err(ProviderError::AlreadyExists);
        }
        let create_date = state.tick();
        let identifier = Self::policy_identifier(name);
        state.policies.insert(
            name.to_string(),
            PolicyRecord {
                name: name.to_string(),
                identifier: identifier.clone(),
                versions: vec![VersionRecord {
                    version_id: "v1".to_string(),
                    digest,
                    is_active: true,
                    create_date,
                }],
                next_version: 2,
            },
        );
        Ok(identifier)
    }

    async fn list_policy_versions(
        &self,
        identifier: &str,
    ) -> ProviderResult<Vec<ManagedPolicyVersion>> {
        let state = self.read_state();
        let record = state.policy_by_identifier(identifier)?;
        Ok(record
            .versions
            .iter()
            .map(|version| ManagedPolicyVersion {
                version_id: version.version_id.clone(),
                digest: version.digest.clone(),
                is_active: version.is_active,
                create_date: version.create_date,
            })
            .collect())
    }

    async fn create_policy_version(
        &self,
        identifier: &str,
        document: &PolicyDocument,
        set_active: bool,
    ) -> ProviderResult<()> {
        let digest = document.digest()?;
        let mut state = self.write_state();
        let create_date = state.tick();
        let record = state.policy_by_identifier_mut(identifier)?;
        if record.versions.len() >= MAX_POLICY_VERSIONS {
            return Err(ProviderError::LimitExceeded(format!(
                "policy {identifier} already has {MAX_POLICY_VERSIONS} versions"
            )));
        }
        let version_id = format!("v{}", record.next_version);
        record.next_version += 1;
        if set_active {
            for version in &mut record.versions {
                version.is_active = false;
            }
        }
        record.versions.push(VersionRecord {
            version_id,
            digest,
            is_active: set_active,
            create_date,
        });
        Ok(())
    }

    async fn delete_policy_version(
        &self,
        identifier: &str,
        version_id: &str,
    ) -> ProviderResult<()> {
        let mut state = self.write_state();
        let record = state.policy_by_identifier_mut(identifier)?;
        let index = record
            .versions
            .iter()
            .position(|version| version.version_id == version_id)
            .ok_or(ProviderError::NotFound)?;
        if record.versions[index].is_active {
            return Err(ProviderError::ActiveVersionDeletion(format!(
                "{version_id} is the active version of {identifier}"
            )));
        }
        record.versions.remove(index);
        Ok(())
    }

    async fn delete_policy(&self, identifier: &str) -> ProviderResult<()> {
        let mut state = self.write_state();
        if state
            .roles
            .values()
            .any(|role| role.attached.contains(identifier))
        {
            return Err(ProviderError::Other(format!(
                "policy {identifier} is still attached to a role"
            )));
        }
        let record = state.policy_by_identifier(identifier)?;
        if record.versions.len() > 1 {
            return Err(ProviderError::Other(format!(
                "policy {identifier} still has non-active versions"
            )));
        }
        let name = record.name.clone();
        state.policies.remove(&name);
        Ok(())
    }

    async fn get_inline_policy(
        &self,
        role_name: &str,
        policy_name: &str,
    ) -> ProviderResult<Option<PolicyDocument>> {
        let state = self.read_state();
        Ok(state
            .roles
            .get(role_name)
            .and_then(|record| record.inline.get(policy_name))
            .cloned())
    }

    async fn put_inline_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &PolicyDocument,
    ) -> ProviderResult<()> {
        let mut state = self.write_state();
        let record = state.role_mut(role_name)?;
        record
            .inline
            .insert(policy_name.to_string(), document.clone());
        Ok(())
    }

    async fn list_inline_policies(&self, role_name: &str) -> ProviderResult<Vec<String>> {
        let state = self.read_state();
        let record = state.roles.get(role_name).ok_or(ProviderError::NotFound)?;
        Ok(record.inline.keys().cloned().collect())
    }

    async fn delete_inline_policy(
        &self,
        role_name: &str,
        policy_name: &str,
    ) -> ProviderResult<()> {
        let mut state = self.write_state();
        let record = state.role_mut(role_name)?;
        record
            .inline
            .remove(policy_name)
            .map(|_| ())
            .ok_or(ProviderError::NotFound)
    }

    async fn list_attached_policies(&self, role_name: &str) -> ProviderResult<Vec<String>> {
        let state = self.read_state();
        let record = state.roles.get(role_name).ok_or(ProviderError::NotFound)?;
        Ok(record.attached.iter().cloned().collect())
    }

    async fn attach_policy(&self, role_name: &str, identifier: &str) -> ProviderResult<()> {
        let mut state = self.write_state();
        state.policy_by_identifier(identifier)?;
        let record = state.role_mut(role_name)?;
        record.attached.insert(identifier.to_string());
        Ok(())
    }

    async fn detach_policy(&self, role_name: &str, identifier: &str) -> ProviderResult<()> {
        let mut state = self.write_state();
        let record = state.role_mut(role_name)?;
        if !record.attached.remove(identifier) {
            return Err(ProviderError::NotFound);
        }
        Ok(())
    }

    async fn bucket_exists(&self, name: &str) -> ProviderResult<BucketProbe> {
        let mut state = self.write_state();
        if state.stale_bucket_reads.remove(name) {
            return Ok(BucketProbe::NotFound);
        }
        if state.buckets.contains_key(name) {
            Ok(BucketProbe::OwnedByCaller)
        } else if state.foreign_buckets.contains(name) {
            Ok(BucketProbe::OwnedByOther)
        } else {
            Ok(BucketProbe::NotFound)
        }
    }

    async fn create_bucket(&self, name: &str, region: &str) -> ProviderResult<()> {
        let mut state = self.write_state();
        if state.buckets.contains_key(name) {
            return Err(ProviderError::AlreadyExists);
        }
        if state.foreign_buckets.contains(name) {
            return Err(ProviderError::OwnedByOther);
        }
        state.buckets.insert(name.to_string(), region.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iam_reconcile_policy::{bucket_access_policy, service_trust_policy};

    #[tokio::test]
    async fn duplicate_role_create_is_rejected() {
        let provider = MemoryProvider::new();
        let trust = service_trust_policy("lambda.amazonaws.com");
        provider.create_role("r", &trust, None).await.unwrap();
        let err = provider.create_role("r", &trust, None).await.unwrap_err();
        assert!(matches!(err, ProviderError::AlreadyExists));
    }

    #[tokio::test]
    async fn version_cap_is_enforced() {
        let provider = MemoryProvider::new();
        let arn = provider
            .create_policy("p", &bucket_access_policy("b0"), None)
            .await
            .unwrap();
        for i in 1..MAX_POLICY_VERSIONS {
            provider
                .create_policy_version(&arn, &bucket_access_policy(&format!("b{i}")), true)
                .await
                .unwrap();
        }
        let err = provider
            .create_policy_version(&arn, &bucket_access_policy("overflow"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::LimitExceeded(_)));
    }

    #[tokio::test]
    async fn active_version_cannot_be_deleted() {
        let provider = MemoryProvider::new();
        let arn = provider
            .create_policy("p", &bucket_access_policy("b"), None)
            .await
            .unwrap();
        let err = provider.delete_policy_version(&arn, "v1").await.unwrap_err();
        assert!(matches!(err, ProviderError::ActiveVersionDeletion(_)));
    }

    #[tokio::test]
    async fn stale_role_read_fires_once() {
        let provider = MemoryProvider::new();
        let trust = service_trust_policy("lambda.amazonaws.com");
        provider.create_role("r", &trust, None).await.unwrap();
        provider.simulate_stale_role_read("r");
        assert!(provider.get_role("r").await.unwrap().is_none());
        assert!(provider.get_role("r").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_role_requires_a_clean_role() {
        let provider = MemoryProvider::new();
        let trust = service_trust_policy("lambda.amazonaws.com");
        provider.create_role("r", &trust, None).await.unwrap();
        let arn = provider
            .create_policy("p", &bucket_access_policy("b"), None)
            .await
            .unwrap();
        provider.attach_policy("r", &arn).await.unwrap();
        assert!(provider.delete_role("r").await.is_err());
        provider.detach_policy("r", &arn).await.unwrap();
        provider.delete_role("r").await.unwrap();
    }
}
