//! Resource-name composition and validation.
//!
//! Naming is caller territory: reconcilers take finished names and never
//! consult the environment. These helpers build the conventional
//! `prefix + owner + account + region` names and random policy-name
//! suffixes, and validate bucket names against the S3 rules before a create
//! is attempted.

use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

#[allow(clippy::unwrap_used)]
static NON_ALPHANUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new("[^A-Za-z0-9]+").unwrap());

#[allow(clippy::unwrap_used)]
static BUCKET_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").unwrap());

/// Lowercase an owner string and strip everything that is not a letter or
/// digit.
pub fn sanitize_owner(owner: &str) -> String {
    NON_ALPHANUMERIC.replace_all(owner, "").to_lowercase()
}

/// Conventional bucket name: prefix, sanitized owner, account id, region
/// with its separators removed.
pub fn bucket_name(prefix: &str, owner: &str, account: &str, region: &str) -> String {
    format!(
        "{}{}{}{}",
        prefix.to_lowercase(),
        sanitize_owner(owner),
        account,
        region.replace('-', "")
    )
}

/// 32-character random hex suffix.
pub fn unique_suffix() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Policy name that will not collide with previous runs.
pub fn unique_policy_name(prefix: &str) -> String {
    format!("{}{}", prefix, unique_suffix())
}

/// S3 bucket-name rules: 3-63 characters, lowercase letters, digits, dots,
/// hyphens, starting and ending alphanumeric, no consecutive dots.
pub fn is_valid_bucket_name(name: &str) -> bool {
    BUCKET_NAME.is_match(name) && !name.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_punctuation_and_case() {
        assert_eq!(sanitize_owner("Jane.Doe+test@example.org"), "janedoetestexampleorg");
        assert_eq!(sanitize_owner("team-42"), "team42");
    }

    #[test]
    fn bucket_name_compacts_region() {
        let name = bucket_name("aimodelshare", "Jane Doe", "123456789012", "us-east-2");
        assert_eq!(name, "aimodelsharejanedoe123456789012useast2");
        assert!(is_valid_bucket_name(&name));
    }

    #[test]
    fn unique_policy_names_differ_between_calls() {
        let a = unique_policy_name("execpolicy");
        let b = unique_policy_name("execpolicy");
        assert_ne!(a, b);
        assert!(a.starts_with("execpolicy"));
        assert_eq!(a.len(), "execpolicy".len() + 32);
    }

    #[test]
    fn bucket_name_rules() {
        assert!(is_valid_bucket_name("my-bucket-01"));
        assert!(is_valid_bucket_name("abc"));
        assert!(!is_valid_bucket_name("ab"));
        assert!(!is_valid_bucket_name("My-Bucket"));
        assert!(!is_valid_bucket_name("-leading-dash"));
        assert!(!is_valid_bucket_name("trailing-dash-"));
        assert!(!is_valid_bucket_name("double..dot"));
        assert!(!is_valid_bucket_name(&"x".repeat(64)));
    }
}
