//! ActivityPub wire messages
//!
//! Follow, Accept and Undo envelopes plus actor, key and collection
//! documents. Fields that peers send in more than one shape are modelled as
//! explicit sum types.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::AppError;

pub const ACTIVITY_STREAMS_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";
pub const SECURITY_CONTEXT: &str = "https://w3id.org/security/v1";

/// Media type for ActivityPub documents
pub const ACTIVITY_JSON: &str = "application/activity+json";

/// `@context` for actor and key documents
pub fn actor_context() -> serde_json::Value {
    serde_json::json!([ACTIVITY_STREAMS_CONTEXT, SECURITY_CONTEXT])
}

fn activity_context() -> serde_json::Value {
    serde_json::Value::String(ACTIVITY_STREAMS_CONTEXT.to_string())
}

/// Returns the first non-whitespace byte of a raw JSON value.
fn leading_byte(raw: &RawValue) -> Option<u8> {
    raw.get().bytes().find(|b| !b.is_ascii_whitespace())
}

/// A link that peers send either as a string or as an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LinkValue {
    Bare(String),
    /// Never empty when decoded
    List(Vec<String>),
}

impl LinkValue {
    /// The bare string, or the first element of a list.
    pub fn primary(&self) -> &str {
        match self {
            LinkValue::Bare(link) => link,
            LinkValue::List(links) => links.first().map_or("", String::as_str),
        }
    }
}

impl<'de> Deserialize<'de> for LinkValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;

        if leading_byte(&raw) == Some(b'[') {
            let links: Vec<String> = serde_json::from_str(raw.get()).map_err(de::Error::custom)?;
            if links.is_empty() {
                return Err(de::Error::custom("link list must not be empty"));
            }
            Ok(LinkValue::List(links))
        } else {
            serde_json::from_str(raw.get())
                .map(LinkValue::Bare)
                .map_err(de::Error::custom)
        }
    }
}

/// An activity object: a link, or an embedded document kept verbatim.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ObjectValue {
    Link(String),
    Embedded(Box<RawValue>),
}

impl ObjectValue {
    /// Wrap already-encoded JSON so it is re-emitted byte for byte.
    pub fn embedded_raw(json: &str) -> Result<Self, AppError> {
        RawValue::from_string(json.to_string())
            .map(ObjectValue::Embedded)
            .map_err(|e| AppError::Validation(format!("invalid embedded object: {}", e)))
    }

    /// Encode `value` as an embedded object.
    pub fn embed<T: Serialize>(value: &T) -> Result<Self, AppError> {
        serde_json::value::to_raw_value(value)
            .map(ObjectValue::Embedded)
            .map_err(|e| AppError::Internal(e.into()))
    }

    /// Activity type of an embedded object; `None` for links.
    pub fn embedded_type(&self) -> Result<Option<String>, AppError> {
        match self {
            ObjectValue::Link(_) => Ok(None),
            ObjectValue::Embedded(raw) => {
                let header: ActivityHeader = decode_activity(raw.get().as_bytes())?;
                Ok(Some(header.kind))
            }
        }
    }

    /// Decode an embedded object. Links are a validation error.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        match self {
            ObjectValue::Link(link) => Err(AppError::Validation(format!(
                "expected an embedded object, got link {}",
                link
            ))),
            ObjectValue::Embedded(raw) => decode_activity(raw.get().as_bytes()),
        }
    }
}

impl<'de> Deserialize<'de> for ObjectValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;

        match leading_byte(&raw) {
            Some(b'{') => Ok(ObjectValue::Embedded(raw)),
            Some(b'"') => serde_json::from_str(raw.get())
                .map(ObjectValue::Link)
                .map_err(de::Error::custom),
            _ => Err(de::Error::custom(
                "object must be a link or an embedded document",
            )),
        }
    }
}

/// Decode a JSON activity, reporting malformed input as a validation error.
pub fn decode_activity<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("malformed activity: {}", e)))
}

/// Just enough of an activity to dispatch on
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityHeader {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<LinkValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<LinkValue>,
}

impl Follow {
    pub fn new(id: String, actor: String, target: String) -> Self {
        Self {
            context: Some(activity_context()),
            kind: "Follow".to_string(),
            id: Some(id),
            actor,
            object: Some(LinkValue::Bare(target.clone())),
            to: Some(LinkValue::Bare(target)),
        }
    }

    /// The followed actor: `to` when present, else `object`.
    pub fn target(&self) -> Option<&str> {
        self.to
            .as_ref()
            .or(self.object.as_ref())
            .map(LinkValue::primary)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accept {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub actor: String,
    pub object: ObjectValue,
}

impl Accept {
    pub fn new(id: String, actor: String, object: ObjectValue) -> Self {
        Self {
            context: Some(activity_context()),
            kind: "Accept".to_string(),
            id: Some(id),
            actor,
            object,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Undo {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub actor: String,
    pub object: ObjectValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<LinkValue>,
}

impl Undo {
    pub fn new(id: String, actor: String, follow: &Follow) -> Result<Self, AppError> {
        Ok(Self {
            context: Some(activity_context()),
            kind: "Undo".to_string(),
            id: Some(id),
            actor,
            object: ObjectValue::embed(follow)?,
            to: follow.to.clone(),
        })
    }
}

/// `publicKey` block of actor and key documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyDocument {
    pub id: String,
    pub owner: String,
    pub public_key_pem: String,
}

/// Actor document, served for local accounts and fetched for remote ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorDocument {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub preferred_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub inbox: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbox: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub following: Option<String>,
    pub public_key: PublicKeyDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discoverable: Option<bool>,
}

impl ActorDocument {
    /// Authority of the actor id, with port when explicit.
    pub fn host(&self) -> Result<String, AppError> {
        let parsed = url::Url::parse(&self.id)
            .map_err(|e| AppError::Validation(format!("invalid actor id {}: {}", self.id, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| AppError::Validation(format!("actor id has no host: {}", self.id)))?;
        Ok(match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }
}

/// Served at the key id so verifiers can fetch just the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainKeyDocument {
    #[serde(rename = "@context")]
    pub context: serde_json::Value,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub preferred_username: String,
    pub public_key: PublicKeyDocument,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedCollection {
    #[serde(rename = "@context")]
    pub context: serde_json::Value,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub total_items: usize,
    pub ordered_items: Vec<String>,
}

impl OrderedCollection {
    pub fn new(id: String, items: Vec<String>) -> Self {
        Self {
            context: activity_context(),
            id,
            kind: "OrderedCollection".to_string(),
            total_items: items.len(),
            ordered_items: items,
        }
    }
}
