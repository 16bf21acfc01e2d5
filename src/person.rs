use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identifier of a person inside a [`crate::RelationStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub String);

impl PersonId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random v4 id, used for persons created by the engine or the editing operations.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PersonId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PersonId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "M" => Some(Self::Male),
            "F" => Some(Self::Female),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Male => Self::Female,
            Self::Female => Self::Male,
        }
    }
}

// Unknown gender tokens are treated as "undefined" rather than rejected.
fn deserialize_gender<'de, D>(deserializer: D) -> Result<Option<Gender>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Gender::from_token))
}

/// Free-form card attributes. Only `gender` is interpreted by the layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    #[serde(
        default,
        deserialize_with = "deserialize_gender",
        skip_serializing_if = "Option::is_none"
    )]
    pub gender: Option<Gender>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl Attributes {
    pub fn with_gender(gender: Gender) -> Self {
        Self {
            gender: Some(gender),
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// JavaScript-style truthiness of an attribute value.
    pub fn is_truthy(&self, key: &str) -> bool {
        match self.fields.get(key) {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(serde_json::Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }
}

/// By-id references to relatives. Ids are weak: they are resolved through the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father: Option<PersonId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother: Option<PersonId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spouses: Vec<PersonId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PersonId>,
}

impl Relations {
    /// Father, mother, spouses and children in that order.
    pub fn all_ids(&self) -> impl Iterator<Item = &PersonId> {
        self.father
            .iter()
            .chain(self.mother.iter())
            .chain(self.spouses.iter())
            .chain(self.children.iter())
    }

    pub fn parent(&self, gender: Gender) -> Option<&PersonId> {
        match gender {
            Gender::Male => self.father.as_ref(),
            Gender::Female => self.mother.as_ref(),
        }
    }

    pub fn parent_slot(&mut self, gender: Gender) -> &mut Option<PersonId> {
        match gender {
            Gender::Male => &mut self.father,
            Gender::Female => &mut self.mother,
        }
    }

    pub fn is_parent(&self, id: &PersonId) -> bool {
        self.father.as_ref() == Some(id) || self.mother.as_ref() == Some(id)
    }

    /// The parent that is not `id`, when `id` is one of the parents.
    pub fn other_parent(&self, id: &PersonId) -> Option<&PersonId> {
        if self.father.as_ref() == Some(id) {
            self.mother.as_ref()
        } else {
            self.father.as_ref()
        }
    }

    /// Drops every reference to `id`.
    pub fn scrub(&mut self, id: &PersonId) {
        if self.father.as_ref() == Some(id) {
            self.father = None;
        }
        if self.mother.as_ref() == Some(id) {
            self.mother = None;
        }
        self.spouses.retain(|s| s != id);
        self.children.retain(|c| c != id);
    }

    /// Rewrites every reference to `from` into `to`, without creating duplicates.
    pub fn replace(&mut self, from: &PersonId, to: &PersonId) {
        if self.father.as_ref() == Some(from) {
            self.father = Some(to.clone());
        }
        if self.mother.as_ref() == Some(from) {
            self.mother = Some(to.clone());
        }
        for list in [&mut self.spouses, &mut self.children] {
            if list.contains(from) {
                list.retain(|id| id != from);
                if !list.contains(to) {
                    list.push(to.clone());
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelType {
    Father,
    Mother,
    Spouse,
    Son,
    Daughter,
}

impl RelType {
    pub fn is_child(self) -> bool {
        matches!(self, Self::Son | Self::Daughter)
    }

    pub fn is_parent(self) -> bool {
        matches!(self, Self::Father | Self::Mother)
    }
}

/// Marker on a person materialized by the "add relative" editing mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRelative {
    pub rel_type: RelType,
    pub label: String,
    pub rel_id: PersonId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_parent_id: Option<PersonId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    #[serde(default)]
    pub data: Attributes,
    #[serde(default)]
    pub rels: Relations,
    /// Synthetic "missing parent" placeholder created by the layout.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub to_add: bool,
    #[serde(
        default,
        rename = "_new_rel_data",
        skip_serializing_if = "Option::is_none"
    )]
    pub new_relative: Option<NewRelative>,
}

impl Person {
    pub fn new(id: impl Into<PersonId>) -> Self {
        Self {
            id: id.into(),
            data: Attributes::default(),
            rels: Relations::default(),
            to_add: false,
            new_relative: None,
        }
    }

    /// Fresh person with a generated id and no attributes.
    pub fn empty() -> Self {
        Self::new(PersonId::generate())
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.data.gender = Some(gender);
        self
    }

    pub fn with_rels(mut self, rels: Relations) -> Self {
        self.rels = rels;
        self
    }

    pub fn gender(&self) -> Option<Gender> {
        self.data.gender
    }

    pub fn is_male(&self) -> bool {
        self.data.gender == Some(Gender::Male)
    }

    /// Either kind of engine- or editor-created stand-in.
    pub fn is_provisional(&self) -> bool {
        self.to_add || self.new_relative.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_family_chart_records() {
        let raw = r#"{"id":"a","data":{"gender":"F","first name":"Ann","alive":true},
            "rels":{"father":"f","spouses":["s"],"children":["c1","c2"]}}"#;
        let person: Person = serde_json::from_str(raw).expect("parse");
        assert_eq!(person.gender(), Some(Gender::Female));
        assert_eq!(person.rels.father, Some(PersonId::from("f")));
        assert_eq!(person.rels.children.len(), 2);
        assert!(person.data.is_truthy("alive"));
        assert!(!person.data.is_truthy("missing"));
        assert!(!person.is_provisional());
    }

    #[test]
    fn unknown_gender_is_undefined() {
        let person: Person =
            serde_json::from_str(r#"{"id":"x","data":{"gender":"?"}}"#).expect("parse");
        assert_eq!(person.gender(), None);
    }

    #[test]
    fn replace_does_not_duplicate() {
        let mut rels = Relations {
            spouses: vec!["a".into(), "b".into()],
            ..Relations::default()
        };
        rels.replace(&"a".into(), &"b".into());
        assert_eq!(rels.spouses, vec![PersonId::from("b")]);
    }
}
