//! Typed IAM policy documents with deterministic canonicalization.
//!
//! A [`PolicyDocument`] is the structured form of an IAM policy: a statement
//! list with typed effect, action, resource, principal, and condition fields.
//! Two documents that differ only in key order, whitespace, or the order of
//! semantically unordered lists canonicalize to the same byte string and
//! therefore the same [`PolicyDigest`]. Reconcilers compare digests to decide
//! whether a resource needs an update at all.
//!
//! ```
//! use iam_reconcile_policy::{allow_statement, PolicyDocument};
//!
//! let doc = PolicyDocument::from_statement(allow_statement(
//!     ["s3:GetObject", "s3:PutObject"],
//!     ["arn:aws:s3:::my-bucket/*"],
//! ));
//! let canonical = doc.canonicalize().unwrap();
//! assert_eq!(canonical.digest().to_string().len(), 64);
//! ```

mod builder;
mod canonical;
mod document;
mod effect;
mod error;
mod serutil;
mod statement;

pub use builder::{allow_statement, bucket_access_policy, service_trust_policy};
pub use canonical::{CanonicalPolicy, PolicyDigest};
pub use document::{PolicyDocument, PolicyVersion};
pub use effect::Effect;
pub use error::{PolicyError, PolicyResult};
pub use serutil::StringList;
pub use statement::{ConditionMap, Principal, Statement};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_types_compose() {
        let doc = bucket_access_policy("example-bucket");
        assert_eq!(doc.version(), PolicyVersion::V2012);
        assert!(doc.statements().iter().all(|s| s.effect() == Effect::Allow));
    }
}
