//! [`CloudProvider`] over the AWS SDK.
//!
//! One IAM, one S3, and one STS client. Failures are classified by service
//! error code into the [`ProviderError`] taxonomy; policy documents coming
//! back from IAM are URL-encoded JSON and are decoded before parsing.

use crate::error::{ProviderError, ProviderResult};
use crate::provider::CloudProvider;
use crate::types::{BucketProbe, ManagedPolicyMeta, ManagedPolicyVersion, Role};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_iam::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_iam::Client as IamClient;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client as S3Client;
use aws_sdk_sts::Client as StsClient;
use chrono::{DateTime, Utc};
use iam_reconcile_policy::PolicyDocument;
use log::debug;
use percent_encoding::percent_decode_str;
use tokio::sync::OnceCell;

const US_EAST_1: &str = "us-east-1";

/// AWS implementation of [`CloudProvider`].
pub struct AwsProvider {
    iam: IamClient,
    s3: S3Client,
    sts: StsClient,
    account_id: OnceCell<String>,
}

impl AwsProvider {
    pub fn new(iam: IamClient, s3: S3Client, sts: StsClient) -> Self {
        Self {
            iam,
            s3,
            sts,
            account_id: OnceCell::new(),
        }
    }

    /// Build clients from the default credential and region chain.
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::new(
            IamClient::new(&config),
            S3Client::new(&config),
            StsClient::new(&config),
        )
    }

    /// Caller account id, fetched once per provider instance.
    async fn account_id(&self) -> ProviderResult<&str> {
        self.account_id
            .get_or_try_init(|| async {
                let response = self
                    .sts
                    .get_caller_identity()
                    .send()
                    .await
                    .map_err(|err| classify("get_caller_identity", &err))?;
                response.account.ok_or_else(|| {
                    ProviderError::Other(
                        "get_caller_identity returned no account id".to_string(),
                    )
                })
            })
            .await
            .map(String::as_str)
    }

    /// Managed-policy ARNs are derived from the caller account, the same way
    /// callers that never stored the ARN reconstruct it.
    async fn policy_arn(&self, name: &str) -> ProviderResult<String> {
        Ok(policy_arn_for(self.account_id().await?, name))
    }

    async fn fetch_version_document(
        &self,
        identifier: &str,
        version_id: &str,
    ) -> ProviderResult<PolicyDocument> {
        let response = self
            .iam
            .get_policy_version()
            .policy_arn(identifier)
            .version_id(version_id)
            .send()
            .await
            .map_err(|err| classify("get_policy_version", &err))?;
        let encoded = response
            .policy_version
            .and_then(|version| version.document)
            .ok_or_else(|| {
                ProviderError::Other(format!(
                    "get_policy_version returned no document for {identifier} {version_id}"
                ))
            })?;
        decode_document(&encoded)
    }
}

#[async_trait]
impl CloudProvider for AwsProvider {
    async fn get_role(&self, name: &str) -> ProviderResult<Option<Role>> {
        let response = match self.iam.get_role().role_name(name).send().await {
            Ok(response) => response,
            Err(err) if is_not_found(&err) => {
                debug!("role {name} does not exist");
                return Ok(None);
            }
            Err(err) => return Err(classify("get_role", &err)),
        };
        let role = response
            .role
            .ok_or_else(|| ProviderError::Other(format!("get_role returned no role for {name}")))?;
        let encoded = role.assume_role_policy_document.ok_or_else(|| {
            ProviderError::Other(format!("role {name} has no trust policy document"))
        })?;
        Ok(Some(Role {
            name: role.role_name,
            identifier: role.arn,
            trust_policy: decode_document(&encoded)?,
            description: role.description,
        }))
    }

    async fn create_role(
        &self,
        name: &str,
        trust_policy: &PolicyDocument,
        description: Option<&str>,
    ) -> ProviderResult<Role> {
        let trust_json = trust_policy.canonicalize()?.json().to_string();
        let response = self
            .iam
            .create_role()
            .role_name(name)
            .assume_role_policy_document(&trust_json)
            .set_description(description.map(str::to_string))
            .send()
            .await
            .map_err(|err| classify("create_role", &err))?;
        let role = response.role.ok_or_else(|| {
            ProviderError::Other(format!("create_role returned no role for {name}"))
        })?;
        Ok(Role {
            name: role.role_name,
            identifier: role.arn,
            trust_policy: trust_policy.clone(),
            description: description.map(str::to_string),
        })
    }

    async fn update_role_trust_policy(
        &self,
        name: &str,
        trust_policy: &PolicyDocument,
    ) -> ProviderResult<()> {
        let trust_json = trust_policy.canonicalize()?.json().to_string();
        self.iam
            .update_assume_role_policy()
            .role_name(name)
            .policy_document(trust_json)
            .send()
            .await
            .map_err(|err| classify("update_assume_role_policy", &err))?;
        Ok(())
    }

    async fn delete_role(&self, name: &str) -> ProviderResult<()> {
        self.iam
            .delete_role()
            .role_name(name)
            .send()
            .await
            .map_err(|err| classify("delete_role", &err))?;
        Ok(())
    }

    async fn get_policy(&self, name: &str) -> ProviderResult<Option<ManagedPolicyMeta>> {
        let arn = self.policy_arn(name).await?;
        let response = match self.iam.get_policy().policy_arn(&arn).send().await {
            Ok(response) => response,
            Err(err) if is_not_found(&err) => {
                debug!("managed policy {name} does not exist");
                return Ok(None);
            }
            Err(err) => return Err(classify("get_policy", &err)),
        };
        let policy = response.policy.ok_or_else(|| {
            ProviderError::Other(format!("get_policy returned no policy for {arn}"))
        })?;
        let active_version_id = policy.default_version_id.ok_or_else(|| {
            ProviderError::Other(format!("policy {arn} has no default version id"))
        })?;
        Ok(Some(ManagedPolicyMeta {
            name: policy.policy_name.unwrap_or_else(|| name.to_string()),
            identifier: policy.arn.unwrap_or(arn),
            active_version_id,
        }))
    }

    async fn create_policy(
        &self,
        name: &str,
        document: &PolicyDocument,
        description: Option<&str>,
    ) -> ProviderResult<String> {
        let policy_json = document.canonicalize()?.json().to_string();
        let response = self
            .iam
            .create_policy()
            .policy_name(name)
            .policy_document(policy_json)
            .set_description(description.map(str::to_string))
            .send()
            .await
            .map_err(|err| classify("create_policy", &err))?;
        match response.policy.and_then(|policy| policy.arn) {
            Some(arn) => Ok(arn),
            None => self.policy_arn(name).await,
        }
    }

    async fn list_policy_versions(
        &self,
        identifier: &str,
    ) -> ProviderResult<Vec<ManagedPolicyVersion>> {
        // The cap keeps this to a single page. The list response carries no
        // documents, so each version costs one extra fetch for its digest.
        let response = self
            .iam
            .list_policy_versions()
            .policy_arn(identifier)
            .send()
            .await
            .map_err(|err| classify("list_policy_versions", &err))?;

        let mut versions = Vec::new();
        for version in response.versions() {
            let version_id = version
                .version_id()
                .ok_or_else(|| {
                    ProviderError::Other(format!("policy version of {identifier} has no id"))
                })?
                .to_string();
            let document = self.fetch_version_document(identifier, &version_id).await?;
            let digest = document.digest()?;
            versions.push(ManagedPolicyVersion {
                version_id,
                digest,
                is_active: version.is_default_version(),
                create_date: to_chrono(version.create_date()),
            });
        }
        Ok(versions)
    }

    async fn create_policy_version(
        &self,
        identifier: &str,
        document: &PolicyDocument,
        set_active: bool,
    ) -> ProviderResult<()> {
        let policy_json = document.canonicalize()?.json().to_string();
        self.iam
            .create_policy_version()
            .policy_arn(identifier)
            .policy_document(policy_json)
            .set_as_default(set_active)
            .send()
            .await
            .map_err(|err| classify("create_policy_version", &err))?;
        Ok(())
    }

    async fn delete_policy_version(
        &self,
        identifier: &str,
        version_id: &str,
    ) -> ProviderResult<()> {
        self.iam
            .delete_policy_version()
            .policy_arn(identifier)
            .version_id(version_id)
            .send()
            .await
            .map_err(|err| {
                // DeleteConflict here means the version is the active one.
                if err.code() == Some("DeleteConflict") {
                    ProviderError::ActiveVersionDeletion(format!(
                        "delete_policy_version {identifier} {version_id}: {err:?}"
                    ))
                } else {
                    classify("delete_policy_version", &err)
                }
            })?;
        Ok(())
    }

    async fn delete_policy(&self, identifier: &str) -> ProviderResult<()> {
        self.iam
            .delete_policy()
            .policy_arn(identifier)
            .send()
            .await
            .map_err(|err| classify("delete_policy", &err))?;
        Ok(())
    }

    async fn get_inline_policy(
        &self,
        role_name: &str,
        policy_name: &str,
    ) -> ProviderResult<Option<PolicyDocument>> {
        let response = match self
            .iam
            .get_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) if is_not_found(&err) => return Ok(None),
            Err(err) => return Err(classify("get_role_policy", &err)),
        };
        decode_document(&response.policy_document).map(Some)
    }

    async fn put_inline_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &PolicyDocument,
    ) -> ProviderResult<()> {
        let policy_json = document.canonicalize()?.json().to_string();
        self.iam
            .put_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .policy_document(policy_json)
            .send()
            .await
            .map_err(|err| classify("put_role_policy", &err))?;
        Ok(())
    }

    async fn list_inline_policies(&self, role_name: &str) -> ProviderResult<Vec<String>> {
        let response = self
            .iam
            .list_role_policies()
            .role_name(role_name)
            .send()
            .await
            .map_err(|err| classify("list_role_policies", &err))?;
        Ok(response.policy_names)
    }

    async fn delete_inline_policy(
        &self,
        role_name: &str,
        policy_name: &str,
    ) -> ProviderResult<()> {
        self.iam
            .delete_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .send()
            .await
            .map_err(|err| classify("delete_role_policy", &err))?;
        Ok(())
    }

    async fn list_attached_policies(&self, role_name: &str) -> ProviderResult<Vec<String>> {
        let response = self
            .iam
            .list_attached_role_policies()
            .role_name(role_name)
            .send()
            .await
            .map_err(|err| classify("list_attached_role_policies", &err))?;
        Ok(response
            .attached_policies()
            .iter()
            .filter_map(|attached| attached.policy_arn().map(str::to_string))
            .collect())
    }

    async fn attach_policy(&self, role_name: &str, identifier: &str) -> ProviderResult<()> {
        self.iam
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(identifier)
            .send()
            .await
            .map_err(|err| classify("attach_role_policy", &err))?;
        Ok(())
    }

    async fn detach_policy(&self, role_name: &str, identifier: &str) -> ProviderResult<()> {
        self.iam
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(identifier)
            .send()
            .await
            .map_err(|err| classify("detach_role_policy", &err))?;
        Ok(())
    }

    async fn bucket_exists(&self, name: &str) -> ProviderResult<BucketProbe> {
        match self.s3.head_bucket().bucket(name).send().await {
            Ok(_) => Ok(BucketProbe::OwnedByCaller),
            Err(err) => {
                if let SdkError::ServiceError(context) = &err {
                    if context.err().is_not_found()
                        || context.raw().status().as_u16() == 404
                    {
                        return Ok(BucketProbe::NotFound);
                    }
                    // HeadBucket reports a foreign owner as a bare 403.
                    if context.raw().status().as_u16() == 403 {
                        return Ok(BucketProbe::OwnedByOther);
                    }
                }
                Err(classify("head_bucket", &err))
            }
        }
    }

    async fn create_bucket(&self, name: &str, region: &str) -> ProviderResult<()> {
        let mut request = self.s3.create_bucket().bucket(name);
        // us-east-1 is the one region that must not carry a location
        // constraint.
        if region != US_EAST_1 {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        match request.send().await {
            Ok(_) => {
                debug!("created bucket {name} in {region}");
                Ok(())
            }
            Err(err) => {
                if let SdkError::ServiceError(context) = &err {
                    if context.err().is_bucket_already_owned_by_you() {
                        return Err(ProviderError::AlreadyExists);
                    }
                    if context.err().is_bucket_already_exists() {
                        return Err(ProviderError::OwnedByOther);
                    }
                }
                Err(classify("create_bucket", &err))
            }
        }
    }
}

fn policy_arn_for(account: &str, name: &str) -> String {
    format!("arn:aws:iam::{account}:policy/{name}")
}

fn is_not_found<E>(err: &SdkError<E>) -> bool
where
    E: ProvideErrorMetadata + std::fmt::Debug,
{
    matches!(
        err.code(),
        Some("NoSuchEntity" | "NoSuchEntityException" | "NotFoundException")
    )
}

/// AWS returns IAM policy documents as URL-encoded JSON.
fn decode_document(encoded: &str) -> ProviderResult<PolicyDocument> {
    let decoded = percent_decode_str(encoded).decode_utf8().map_err(|err| {
        ProviderError::Other(format!("policy document is not valid UTF-8: {err}"))
    })?;
    Ok(PolicyDocument::from_json(&decoded)?)
}

fn to_chrono(value: Option<&aws_sdk_iam::primitives::DateTime>) -> DateTime<Utc> {
    value
        .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
        .unwrap_or_default()
}

/// Map a service error code onto the provider taxonomy. Codes mirror the
/// strings the IAM and S3 control planes actually send.
fn classify<E>(operation: &'static str, err: &SdkError<E>) -> ProviderError
where
    E: ProvideErrorMetadata + std::fmt::Debug,
{
    if matches!(
        err,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_)
    ) {
        return ProviderError::Transient(format!("{operation}: {err:?}"));
    }
    let server_error = matches!(
        err,
        SdkError::ServiceError(context) if context.raw().status().is_server_error()
    );
    let detail = format!("{operation}: {err:?}");
    if server_error {
        return ProviderError::Transient(detail);
    }
    match err.code() {
        Some("NoSuchEntity" | "NoSuchEntityException" | "NoSuchBucket" | "NotFoundException") => {
            ProviderError::NotFound
        }
        Some("EntityAlreadyExists" | "EntityAlreadyExistsException") => {
            ProviderError::AlreadyExists
        }
        Some("LimitExceeded" | "LimitExceededException") => {
            ProviderError::LimitExceeded(detail)
        }
        Some(
            "Throttling" | "ThrottlingException" | "RequestLimitExceeded" | "ServiceFailure"
            | "ServiceUnavailable" | "InternalFailure" | "InternalError" | "RequestTimeout"
            | "SlowDown",
        ) => ProviderError::Transient(detail),
        _ => ProviderError::Other(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_arns_follow_the_iam_scheme() {
        assert_eq!(
            policy_arn_for("123456789012", "exec-policy"),
            "arn:aws:iam::123456789012:policy/exec-policy"
        );
    }

    #[test]
    fn decodes_url_encoded_documents() {
        let encoded = "%7B%22Version%22%3A%222012-10-17%22%2C%22Statement%22%3A%5B%7B%22Effect%22%3A%22Allow%22%2C%22Action%22%3A%22s3%3AGetObject%22%2C%22Resource%22%3A%22%2A%22%7D%5D%7D";
        let doc = decode_document(encoded).unwrap();
        assert_eq!(doc.statements().len(), 1);
    }

    #[test]
    fn plain_json_documents_also_decode() {
        let plain = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":"s3:GetObject","Resource":"*"}]}"#;
        let doc = decode_document(plain).unwrap();
        assert_eq!(doc.statements().len(), 1);
    }

    #[test]
    fn smithy_timestamps_convert() {
        let dt = aws_sdk_iam::primitives::DateTime::from_secs(1_700_000_000);
        let converted = to_chrono(Some(&dt));
        assert_eq!(converted.timestamp(), 1_700_000_000);
    }
}
