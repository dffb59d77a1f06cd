//! Canonical form and content digest of a policy document.
//!
//! The canonical form is JSON with object keys sorted, compact separators,
//! order-insensitive lists sorted and deduplicated, and the statement list
//! itself sorted. Every representation of the same logical policy reduces to
//! the same bytes, so the SHA-256 of those bytes is a stable equality token.

use crate::document::PolicyDocument;
use crate::error::{PolicyError, PolicyResult};
use crate::statement::Statement;
use aws_lc_rs::digest::{digest, SHA256};
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};

/// Hex-encoded SHA-256 of a canonical policy serialization.
///
/// An equality token, not a security boundary.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PolicyDigest(String);

impl PolicyDigest {
    fn of(bytes: &[u8]) -> Self {
        let hash = digest(&SHA256, bytes);
        Self(hash.as_ref().iter().map(|b| format!("{b:02x}")).collect())
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl Display for PolicyDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl Debug for PolicyDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "PolicyDigest({})", self.0)
    }
}

/// The canonical serialization of a document plus its digest.
///
/// Derived on demand, never stored alongside the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPolicy {
    json: String,
    digest: PolicyDigest,
}

impl CanonicalPolicy {
    pub fn json(&self) -> &str {
        &self.json
    }

    pub fn digest(&self) -> &PolicyDigest {
        &self.digest
    }

    pub fn into_digest(self) -> PolicyDigest {
        self.digest
    }
}

pub(crate) fn canonicalize(doc: &PolicyDocument) -> PolicyResult<CanonicalPolicy> {
    // Normalize each statement, then order the statement list by its own
    // serialized form so statement order stops mattering.
    let mut keyed: Vec<(String, Statement)> = Vec::with_capacity(doc.statement.len());
    for statement in &doc.statement {
        let normalized = statement.normalized();
        let key = serde_json::to_value(&normalized)
            .map_err(PolicyError::Serialize)?
            .to_string();
        keyed.push((key, normalized));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.dedup_by(|a, b| a.0 == b.0);

    let normalized = PolicyDocument {
        version: doc.version,
        id: doc.id.clone(),
        statement: keyed.into_iter().map(|(_, statement)| statement).collect(),
    };

    // serde_json maps are BTreeMap-backed, so Value rendering is key-sorted
    // and compact: the same shape as the classic
    // json.dumps(sort_keys=True, separators=(',', ':')).
    let json = serde_json::to_value(&normalized)
        .map_err(PolicyError::Serialize)?
        .to_string();
    let digest = PolicyDigest::of(json.as_bytes());

    Ok(CanonicalPolicy { json, digest })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{allow_statement, service_trust_policy};
    use crate::effect::Effect;
    use proptest::prelude::*;

    #[test]
    fn canonical_form_is_key_sorted_and_compact() {
        let doc = service_trust_policy("lambda.amazonaws.com");
        let canonical = doc.canonicalize().unwrap();
        assert_eq!(
            canonical.json(),
            concat!(
                "{\"Statement\":[{\"Action\":\"sts:AssumeRole\",\"Effect\":\"Allow\",",
                "\"Principal\":{\"Service\":\"lambda.amazonaws.com\"}}],",
                "\"Version\":\"2012-10-17\"}"
            )
        );
    }

    #[test]
    fn key_order_does_not_matter() {
        let a = PolicyDocument::from_json(
            r#"{"Version": "2012-10-17", "Statement": [{"Effect": "Allow", "Action": "s3:GetObject", "Resource": "*"}]}"#,
        )
        .unwrap();
        let b = PolicyDocument::from_json(
            r#"{"Statement": [{"Resource": "*", "Action": "s3:GetObject", "Effect": "Allow"}], "Version": "2012-10-17"}"#,
        )
        .unwrap();
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
    }

    #[test]
    fn action_list_order_does_not_matter() {
        let a = PolicyDocument::from_statement(allow_statement(
            ["s3:GetObject", "s3:PutObject"],
            ["arn:aws:s3:::b/*"],
        ));
        let b = PolicyDocument::from_statement(allow_statement(
            ["s3:PutObject", "s3:GetObject"],
            ["arn:aws:s3:::b/*"],
        ));
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
    }

    #[test]
    fn bare_string_and_singleton_list_are_equal() {
        let a = PolicyDocument::from_json(
            r#"{"Version": "2012-10-17", "Statement": [{"Effect": "Allow", "Action": "s3:GetObject", "Resource": "*"}]}"#,
        )
        .unwrap();
        let b = PolicyDocument::from_json(
            r#"{"Version": "2012-10-17", "Statement": [{"Effect": "Allow", "Action": ["s3:GetObject"], "Resource": ["*"]}]}"#,
        )
        .unwrap();
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
    }

    #[test]
    fn statement_order_does_not_matter() {
        let s1 = allow_statement(["s3:GetObject"], ["*"]);
        let s2 = allow_statement(["s3:PutObject"], ["*"]);
        let a = PolicyDocument::from_statements(vec![s1.clone(), s2.clone()]);
        let b = PolicyDocument::from_statements(vec![s2, s1]);
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
    }

    #[test]
    fn different_actions_give_different_digests() {
        let a = PolicyDocument::from_statement(allow_statement(["s3:GetObject"], ["*"]));
        let b = PolicyDocument::from_statement(allow_statement(["s3:PutObject"], ["*"]));
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }

    #[test]
    fn different_effects_give_different_digests() {
        let allow = PolicyDocument::from_statement(
            Statement::new(Effect::Allow, "s3:GetObject").with_resource("*"),
        );
        let deny = PolicyDocument::from_statement(
            Statement::new(Effect::Deny, "s3:GetObject").with_resource("*"),
        );
        assert_ne!(allow.digest().unwrap(), deny.digest().unwrap());
    }

    #[test]
    fn duplicate_statements_collapse() {
        let s = allow_statement(["s3:GetObject"], ["*"]);
        let once = PolicyDocument::from_statements(vec![s.clone()]);
        let twice = PolicyDocument::from_statements(vec![s.clone(), s]);
        assert_eq!(once.digest().unwrap(), twice.digest().unwrap());
    }

    #[test]
    fn digest_is_hex_sha256() {
        let doc = service_trust_policy("ec2.amazonaws.com");
        let digest = doc.digest().unwrap();
        assert_eq!(digest.as_hex().len(), 64);
        assert!(digest.as_hex().chars().all(|c| c.is_ascii_hexdigit()));
    }

    fn action_strategy() -> impl Strategy<Value = String> {
        "[a-z]{2,6}:[A-Z][a-zA-Z]{2,10}"
    }

    proptest! {
        #[test]
        fn digest_is_permutation_invariant(
            actions in proptest::collection::vec(action_strategy(), 1..6),
        ) {
            let mut reversed = actions.clone();
            reversed.reverse();
            let a = PolicyDocument::from_statement(
                Statement::new(Effect::Allow, crate::StringList::from(actions))
                    .with_resource("*"),
            );
            let b = PolicyDocument::from_statement(
                Statement::new(Effect::Allow, crate::StringList::from(reversed))
                    .with_resource("*"),
            );
            prop_assert_eq!(a.digest().unwrap(), b.digest().unwrap());
        }

        #[test]
        fn extra_action_changes_digest(
            actions in proptest::collection::vec(action_strategy(), 1..5),
        ) {
            let mut extended = actions.clone();
            extended.push("zzz:NeverGenerated".to_string());
            let a = PolicyDocument::from_statement(
                Statement::new(Effect::Allow, crate::StringList::from(actions))
                    .with_resource("*"),
            );
            let b = PolicyDocument::from_statement(
                Statement::new(Effect::Allow, crate::StringList::from(extended))
                    .with_resource("*"),
            );
            prop_assert_ne!(a.digest().unwrap(), b.digest().unwrap());
        }
    }
}
