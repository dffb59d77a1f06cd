//! Serde support for the IAM JSON convention of collapsing singleton lists.
//!
//! On the wire, `"Action": "s3:GetObject"` and `"Action": ["s3:GetObject"]`
//! are the same policy. [`StringList`] parses both shapes and serializes a
//! single element back to the bare-string form.

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Formatter, Result as FmtResult};

/// A string field that may appear on the wire as a string or a list of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StringList(Vec<String>);

impl StringList {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.0.iter().any(|s| s == value)
    }

    /// Copy with elements sorted and deduplicated. Element order in these
    /// fields carries no meaning, so the normalized form is the comparison
    /// form.
    pub fn normalized(&self) -> Self {
        let mut values = self.0.clone();
        values.sort_unstable();
        values.dedup();
        Self(values)
    }
}

impl From<&str> for StringList {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for StringList {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<String>> for StringList {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

impl<const N: usize> From<[&str; N]> for StringList {
    fn from(values: [&str; N]) -> Self {
        Self(values.iter().map(|s| (*s).to_string()).collect())
    }
}

impl FromIterator<String> for StringList {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a StringList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for StringList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.len() == 1 {
            serializer.serialize_str(&self.0[0])
        } else {
            self.0.serialize(serializer)
        }
    }
}

struct StringListVisitor;

impl<'de> Visitor<'de> for StringListVisitor {
    type Value = StringList;

    fn expecting(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("a string or a list of strings")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(StringList(vec![value.to_string()]))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
        Ok(StringList(vec![value]))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut values = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(value) = access.next_element::<String>()? {
            values.push(value);
        }
        Ok(StringList(values))
    }
}

impl<'de> Deserialize<'de> for StringList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(StringListVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_string() {
        let list: StringList = serde_json::from_str("\"s3:GetObject\"").unwrap();
        assert_eq!(list.as_slice(), ["s3:GetObject".to_string()]);
    }

    #[test]
    fn parses_list() {
        let list: StringList = serde_json::from_str("[\"a\",\"b\"]").unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn singleton_serializes_as_bare_string() {
        let list = StringList::from("sts:AssumeRole");
        assert_eq!(serde_json::to_string(&list).unwrap(), "\"sts:AssumeRole\"");
    }

    #[test]
    fn multiple_serialize_as_list() {
        let list = StringList::from(["a", "b"]);
        assert_eq!(serde_json::to_string(&list).unwrap(), "[\"a\",\"b\"]");
    }

    #[test]
    fn normalized_sorts_and_dedupes() {
        let list = StringList::from(["s3:PutObject", "s3:GetObject", "s3:PutObject"]);
        assert_eq!(
            list.normalized().as_slice(),
            ["s3:GetObject".to_string(), "s3:PutObject".to_string()]
        );
    }

    #[test]
    fn rejects_non_string_elements() {
        assert!(serde_json::from_str::<StringList>("[1,2]").is_err());
    }
}
