use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// `extras` key whose value is lifted to [`Record::publisher_hierarchy`].
pub const PUBLISHER_HIERARCHY_KEY: &str = "publisher_hierarchy";

/// Organization fields that never appear in a persisted organization.
pub const HIDDEN_ORGANIZATION_FIELDS: [&str; 2] = ["timeline", "city"];

/// Read an explicit `null` the same way as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Text form of an identifier-like value: strings verbatim, numbers and
/// other scalars as JSON text, `null` and empty strings as absent.
fn identifier_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ── Organization ──────────────────────────────────────────────────────────────

/// Publisher entity owning zero or more catalog records.
///
/// Only `id` and `title` are interpreted; every other descriptive field
/// (`name`, `type`, `image_url`, `approval_status`, ...) is carried through
/// untouched in `attributes`. Serialization always omits
/// [`HIDDEN_ORGANIZATION_FIELDS`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Organization {
    /// Stable organization identifier.
    pub id: String,
    /// Display title; `null` reads as empty.
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    /// Auxiliary descriptive fields.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl Organization {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Attributes that survive persistence (everything but the hidden fields).
    pub fn visible_attributes(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.attributes
            .iter()
            .filter(|(key, _)| !HIDDEN_ORGANIZATION_FIELDS.contains(&key.as_str()))
    }
}

impl Serialize for Organization {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let visible: Vec<(&String, &Value)> = self.visible_attributes().collect();
        let mut map = serializer.serialize_map(Some(visible.len() + 2))?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("title", &self.title)?;
        for (key, value) in visible {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ── Record parts ──────────────────────────────────────────────────────────────

/// One `{key, value}` pair from a record's `extras` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extra {
    #[serde(default, deserialize_with = "null_as_default")]
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

/// A group or tag reference attached to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Reference {
    /// Identity used when counting distinct references: `id`, else `name`,
    /// in text form.
    pub fn key(&self) -> Option<String> {
        self.id
            .as_ref()
            .and_then(identifier_text)
            .or_else(|| self.name.as_ref().and_then(identifier_text))
    }
}

// ── Record ────────────────────────────────────────────────────────────────────

/// A single dataset entry within a catalog snapshot.
///
/// Each optional field is either present with a value or absent; consumers
/// decide what absence means for them. Unknown fields are kept in `fields`
/// so a record persisted in a delta is the record that was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique dataset identifier.
    pub id: String,
    /// Owning organization. One without a usable `id` reads as absent.
    #[serde(
        default,
        deserialize_with = "deserialize_organization",
        skip_serializing_if = "Option::is_none"
    )]
    pub organization: Option<Organization>,
    /// Resource entries; only the length is used downstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<Value>>,
    /// Free-form key/value pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Vec<Extra>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<Reference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Reference>>,
    /// Lifted from `extras` by the normalizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_hierarchy: Option<String>,
    /// Every other field of the raw record.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// `organization` is kept only when it is an object with a string or numeric
/// `id`; anything else (null, a bare string, a missing or empty id) is absent.
fn deserialize_organization<'de, D>(deserializer: D) -> Result<Option<Organization>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(Value::Object(mut map)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let id = match map.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Ok(None),
    };
    map.insert("id".to_string(), Value::String(id));
    Organization::deserialize(Value::Object(map))
        .map(Some)
        .map_err(D::Error::custom)
}

impl Record {
    /// A bare record with no optional fields.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            organization: None,
            resources: None,
            extras: None,
            groups: None,
            tags: None,
            publisher_hierarchy: None,
            fields: Map::new(),
        }
    }

    /// Identifier of the owning organization, if any.
    pub fn organization_id(&self) -> Option<&str> {
        self.organization.as_ref().map(|org| org.id.as_str())
    }

    /// Number of resources; an absent list counts as zero.
    pub fn resource_count(&self) -> u64 {
        self.resources.as_ref().map_or(0, |r| r.len() as u64)
    }

    /// Value of the first `extras` entry with the given key.
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extras
            .as_ref()?
            .iter()
            .find(|extra| extra.key == key)
            .map(|extra| &extra.value)
    }

    /// Look up an uninterpreted top-level field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
