use crate::effect::Effect;
use crate::serutil::StringList;
use serde::de::{self, MapAccess, Visitor};
use serde::de::value::MapAccessDeserializer;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt::{Formatter, Result as FmtResult};

/// Condition block: operator -> condition key -> values.
///
/// `BTreeMap` keeps operator and key order stable, which the canonical form
/// relies on.
pub type ConditionMap = BTreeMap<String, BTreeMap<String, StringList>>;

/// The principal a statement applies to.
///
/// On the wire this is either the wildcard string `"*"` or a map from
/// principal kind (`AWS`, `Service`, `Federated`, ...) to one or more
/// identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Any principal (`"*"`).
    Wildcard,

    /// Principals scoped by kind.
    Scoped(BTreeMap<String, StringList>),
}

impl Principal {
    /// Principal for a service, e.g. `lambda.amazonaws.com`.
    pub fn service(identifier: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert("Service".to_string(), StringList::from(identifier.into()));
        Self::Scoped(map)
    }

    /// Principal for an AWS account or IAM entity ARN.
    pub fn aws(identifier: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert("AWS".to_string(), StringList::from(identifier.into()));
        Self::Scoped(map)
    }

    fn normalized(&self) -> Self {
        match self {
            Self::Wildcard => Self::Wildcard,
            Self::Scoped(map) => Self::Scoped(
                map.iter()
                    .map(|(kind, ids)| (kind.clone(), ids.normalized()))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Wildcard => serializer.serialize_str("*"),
            Self::Scoped(map) => map.serialize(serializer),
        }
    }
}

struct PrincipalVisitor;

impl<'de> Visitor<'de> for PrincipalVisitor {
    type Value = Principal;

    fn expecting(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("\"*\" or a map of principal kinds to identifiers")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        if value == "*" {
            Ok(Principal::Wildcard)
        } else {
            Err(E::invalid_value(de::Unexpected::Str(value), &self))
        }
    }

    fn visit_map<A: MapAccess<'de>>(self, access: A) -> Result<Self::Value, A::Error> {
        let map = BTreeMap::deserialize(MapAccessDeserializer::new(access))?;
        Ok(Principal::Scoped(map))
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PrincipalVisitor)
    }
}

/// A single policy statement.
///
/// The field set is the grammar the reconcilers produce and compare: `Sid`,
/// `Effect`, `Principal`, `Action`, `Resource`, `Condition`. Documents using
/// other statement fields fail to parse rather than losing information
/// silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct Statement {
    #[serde(skip_serializing_if = "Option::is_none")]
    sid: Option<String>,

    effect: Effect,

    #[serde(skip_serializing_if = "Option::is_none")]
    principal: Option<Principal>,

    action: StringList,

    #[serde(skip_serializing_if = "Option::is_none")]
    resource: Option<StringList>,

    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<ConditionMap>,
}

impl Statement {
    pub fn new(effect: Effect, action: impl Into<StringList>) -> Self {
        Self {
            sid: None,
            effect,
            principal: None,
            action: action.into(),
            resource: None,
            condition: None,
        }
    }

    #[must_use]
    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<StringList>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    #[must_use]
    pub fn with_condition(
        mut self,
        operator: impl Into<String>,
        key: impl Into<String>,
        values: impl Into<StringList>,
    ) -> Self {
        self.condition
            .get_or_insert_with(BTreeMap::new)
            .entry(operator.into())
            .or_default()
            .insert(key.into(), values.into());
        self
    }

    pub fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn action(&self) -> &StringList {
        &self.action
    }

    pub fn resource(&self) -> Option<&StringList> {
        self.resource.as_ref()
    }

    pub fn condition(&self) -> Option<&ConditionMap> {
        self.condition.as_ref()
    }

    /// Copy with every order-insensitive list sorted and deduplicated.
    pub(crate) fn normalized(&self) -> Self {
        Self {
            sid: self.sid.clone(),
            effect: self.effect,
            principal: self.principal.as_ref().map(Principal::normalized),
            action: self.action.normalized(),
            resource: self.resource.as_ref().map(StringList::normalized),
            condition: self.condition.as_ref().map(|condition| {
                condition
                    .iter()
                    .map(|(operator, keys)| {
                        let keys = keys
                            .iter()
                            .map(|(key, values)| (key.clone(), values.normalized()))
                            .collect();
                        (operator.clone(), keys)
                    })
                    .collect()
            }),
        }
    }
}
