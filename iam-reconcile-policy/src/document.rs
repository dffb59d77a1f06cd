use crate::canonical::{self, CanonicalPolicy, PolicyDigest};
use crate::error::{PolicyError, PolicyResult};
use crate::statement::Statement;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Policy language version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyVersion {
    #[serde(rename = "2008-10-17")]
    V2008,

    #[default]
    #[serde(rename = "2012-10-17")]
    V2012,
}

impl Display for PolicyVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::V2008 => f.write_str("2008-10-17"),
            Self::V2012 => f.write_str("2012-10-17"),
        }
    }
}

/// A complete policy document: version, optional id, statement list.
///
/// Parsing accepts the wire convention of a single statement object in place
/// of a one-element list; serialization always emits a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub(crate) version: PolicyVersion,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<String>,

    #[serde(deserialize_with = "one_or_many_statements")]
    pub(crate) statement: Vec<Statement>,
}

fn one_or_many_statements<'de, D>(deserializer: D) -> Result<Vec<Statement>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Box<Statement>),
        Many(Vec<Statement>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(statement) => vec![*statement],
        OneOrMany::Many(statements) => statements,
    })
}

impl PolicyDocument {
    pub fn new(version: PolicyVersion, statements: Vec<Statement>) -> Self {
        Self {
            version,
            id: None,
            statement: statements,
        }
    }

    /// Document with the current policy language version and one statement.
    pub fn from_statement(statement: Statement) -> Self {
        Self::from_statements(vec![statement])
    }

    /// Document with the current policy language version.
    pub fn from_statements(statements: Vec<Statement>) -> Self {
        Self::new(PolicyVersion::default(), statements)
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn version(&self) -> PolicyVersion {
        self.version
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statement
    }

    /// Parse from JSON text.
    pub fn from_json(json: &str) -> PolicyResult<Self> {
        serde_json::from_str(json).map_err(PolicyError::Parse)
    }

    /// Serialize to compact JSON in declaration order. Not the canonical
    /// form; use [`PolicyDocument::canonicalize`] for comparisons.
    pub fn to_json(&self) -> PolicyResult<String> {
        serde_json::to_string(self).map_err(PolicyError::Serialize)
    }

    /// Normalized serialization plus content digest.
    pub fn canonicalize(&self) -> PolicyResult<CanonicalPolicy> {
        canonical::canonicalize(self)
    }

    /// Digest of the canonical form.
    pub fn digest(&self) -> PolicyResult<PolicyDigest> {
        Ok(self.canonicalize()?.into_digest())
    }

    /// True when both documents canonicalize to the same bytes.
    pub fn canonically_equal(&self, other: &Self) -> PolicyResult<bool> {
        Ok(self.canonicalize()?.json() == other.canonicalize()?.json())
    }
}

impl FromStr for PolicyDocument {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_json(s)
    }
}

impl Display for PolicyDocument {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let json = serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?;
        f.write_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Effect;

    #[test]
    fn parses_single_statement_object() {
        let json = r#"{
            "Version": "2012-10-17",
            "Statement": {"Effect": "Allow", "Action": "s3:ListBucket", "Resource": "*"}
        }"#;
        let doc: PolicyDocument = json.parse().unwrap();
        assert_eq!(doc.statements().len(), 1);
    }

    #[test]
    fn parses_statement_list() {
        let json = r#"{
            "Version": "2012-10-17",
            "Statement": [
                {"Effect": "Allow", "Action": "s3:GetObject", "Resource": "*"},
                {"Effect": "Deny", "Action": "s3:DeleteBucket", "Resource": "*"}
            ]
        }"#;
        let doc: PolicyDocument = json.parse().unwrap();
        assert_eq!(doc.statements().len(), 2);
        assert_eq!(doc.statements()[1].effect(), Effect::Deny);
    }

    #[test]
    fn rejects_unknown_document_fields() {
        let json = r#"{"Version": "2012-10-17", "Statement": [], "Extra": 1}"#;
        assert!(PolicyDocument::from_json(json).is_err());
    }

    #[test]
    fn rejects_unknown_version() {
        let json = r#"{"Version": "2020-01-01", "Statement": []}"#;
        assert!(PolicyDocument::from_json(json).is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let doc = PolicyDocument::from_statement(
            Statement::new(Effect::Allow, "sts:AssumeRole")
                .with_principal(crate::Principal::service("lambda.amazonaws.com")),
        );
        let parsed = PolicyDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn display_renders_pretty_json() {
        let doc = PolicyDocument::from_statement(
            Statement::new(Effect::Allow, "s3:GetObject").with_resource("*"),
        );
        let rendered = doc.to_string();
        assert!(rendered.contains("\"Version\": \"2012-10-17\""));
    }
}
