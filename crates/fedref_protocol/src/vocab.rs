/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Typed view over decoded ActivityStreams documents.
//!
//! Remote servers send loosely shaped JSON-LD: most properties may be a bare IRI, an embedded
//! object, a `Link`, or an array of any of those. [`decode`] only checks that the bytes are a
//! JSON object; [`resolve`] then maps it onto one closed variant of [`Vocab`] or refuses it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document is not a json object")]
    NotAnObject,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("document has no type")]
    MissingType,
    #[error("type {0} is not supported")]
    Unsupported(String),
    #[error("{kind} document is missing {field}")]
    Incomplete { kind: String, field: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorKind {
    Application,
    Group,
    Organization,
    Person,
    Service,
}

impl ActorKind {
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "Application" => Some(Self::Application),
            "Group" => Some(Self::Group),
            "Organization" => Some(Self::Organization),
            "Person" => Some(Self::Person),
            "Service" => Some(Self::Service),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "Application",
            Self::Group => "Group",
            Self::Organization => "Organization",
            Self::Person => "Person",
            Self::Service => "Service",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Article,
    Document,
    Image,
    Video,
    Note,
    Page,
    Event,
    Place,
    Profile,
}

impl ObjectKind {
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "Article" => Some(Self::Article),
            "Document" => Some(Self::Document),
            "Image" => Some(Self::Image),
            "Video" => Some(Self::Video),
            "Note" => Some(Self::Note),
            "Page" => Some(Self::Page),
            "Event" => Some(Self::Event),
            "Place" => Some(Self::Place),
            "Profile" => Some(Self::Profile),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Article => "Article",
            Self::Document => "Document",
            Self::Image => "Image",
            Self::Video => "Video",
            Self::Note => "Note",
            Self::Page => "Page",
            Self::Event => "Event",
            Self::Place => "Place",
            Self::Profile => "Profile",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionKind {
    Collection,
    OrderedCollection,
    CollectionPage,
    OrderedCollectionPage,
}

impl CollectionKind {
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "Collection" => Some(Self::Collection),
            "OrderedCollection" => Some(Self::OrderedCollection),
            "CollectionPage" => Some(Self::CollectionPage),
            "OrderedCollectionPage" => Some(Self::OrderedCollectionPage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collection => "Collection",
            Self::OrderedCollection => "OrderedCollection",
            Self::CollectionPage => "CollectionPage",
            Self::OrderedCollectionPage => "OrderedCollectionPage",
        }
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, Self::OrderedCollection | Self::OrderedCollectionPage)
    }
}

/// A custom emoji referenced from a `tag` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmojiTag {
    pub id: String,
    /// Shortcode without the surrounding colons.
    pub shortcode: String,
    pub icon_url: String,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionTag {
    pub href: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub url: String,
    pub media_type: Option<String>,
    pub name: Option<String>,
    pub blurhash: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActorDocument {
    pub kind: ActorKind,
    pub id: String,
    pub preferred_username: String,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub url: Option<String>,
    pub inbox: Option<String>,
    pub outbox: Option<String>,
    pub followers: Option<String>,
    pub following: Option<String>,
    pub featured: Option<String>,
    pub shared_inbox: Option<String>,
    pub public_key_id: Option<String>,
    pub public_key_pem: Option<String>,
    pub icon_url: Option<String>,
    pub image_url: Option<String>,
    pub manually_approves_followers: bool,
    pub discoverable: Option<bool>,
    pub also_known_as: Vec<String>,
    pub emojis: Vec<EmojiTag>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDocument {
    pub kind: ObjectKind,
    pub id: String,
    pub url: Option<String>,
    pub attributed_to: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub sensitive: bool,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub in_reply_to: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub attachments: Vec<AttachmentRef>,
    pub mentions: Vec<MentionTag>,
    pub emojis: Vec<EmojiTag>,
    pub hashtags: Vec<String>,
    /// The document as received, for handlers that interpret more than this view.
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionItem {
    Iri(String),
    Embedded { id: String, type_name: Option<String> },
}

impl CollectionItem {
    pub fn id(&self) -> &str {
        match self {
            Self::Iri(id) => id,
            Self::Embedded { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDocument {
    pub kind: CollectionKind,
    pub id: String,
    pub total_items: Option<u64>,
    pub items: Vec<CollectionItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Vocab {
    Actor(ActorDocument),
    Object(ObjectDocument),
    Collection(CollectionDocument),
}

impl Vocab {
    pub fn type_name(&self) -> &'static str {
        match self {
            Vocab::Actor(a) => a.kind.as_str(),
            Vocab::Object(o) => o.kind.as_str(),
            Vocab::Collection(c) => c.kind.as_str(),
        }
    }
}

pub fn decode(bytes: &[u8]) -> Result<Value, DecodeError> {
    let v: Value = serde_json::from_slice(bytes)?;
    if !v.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    Ok(v)
}

pub fn resolve(doc: &Value) -> Result<Vocab, ResolveError> {
    let map = doc.as_object().ok_or(ResolveError::MissingType)?;
    let type_name = type_name(map).ok_or(ResolveError::MissingType)?;

    if let Some(kind) = ActorKind::from_type_name(&type_name) {
        return actor_document(kind, map).map(Vocab::Actor);
    }
    if let Some(kind) = ObjectKind::from_type_name(&type_name) {
        return object_document(kind, map, doc).map(Vocab::Object);
    }
    if let Some(kind) = CollectionKind::from_type_name(&type_name) {
        return collection_document(kind, map).map(Vocab::Collection);
    }
    Err(ResolveError::Unsupported(type_name))
}

fn actor_document(kind: ActorKind, map: &Map<String, Value>) -> Result<ActorDocument, ResolveError> {
    let id = str_field(map, "id").ok_or_else(|| incomplete(kind.as_str(), "id"))?;
    let preferred_username = str_field(map, "preferredUsername")
        .ok_or_else(|| incomplete(kind.as_str(), "preferredUsername"))?;

    let public_key = map.get("publicKey").and_then(first_object);
    let shared_inbox = map
        .get("endpoints")
        .and_then(|e| e.as_object())
        .and_then(|e| str_field(e, "sharedInbox"));

    Ok(ActorDocument {
        kind,
        id,
        preferred_username,
        name: str_field(map, "name"),
        summary: str_field(map, "summary"),
        url: map.get("url").and_then(link_href),
        inbox: map.get("inbox").and_then(iri),
        outbox: map.get("outbox").and_then(iri),
        followers: map.get("followers").and_then(iri),
        following: map.get("following").and_then(iri),
        featured: map.get("featured").and_then(iri),
        shared_inbox,
        public_key_id: public_key.and_then(|k| str_field(k, "id")),
        public_key_pem: public_key.and_then(|k| str_field(k, "publicKeyPem")),
        icon_url: map.get("icon").and_then(image_href),
        image_url: map.get("image").and_then(image_href),
        manually_approves_followers: map
            .get("manuallyApprovesFollowers")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        discoverable: map.get("discoverable").and_then(|v| v.as_bool()),
        also_known_as: map
            .get("alsoKnownAs")
            .map(|v| each(v).filter_map(iri).collect())
            .unwrap_or_default(),
        emojis: map
            .get("tag")
            .map(|v| each(v).filter_map(emoji_tag).collect())
            .unwrap_or_default(),
    })
}

fn object_document(
    kind: ObjectKind,
    map: &Map<String, Value>,
    raw: &Value,
) -> Result<ObjectDocument, ResolveError> {
    let id = str_field(map, "id").ok_or_else(|| incomplete(kind.as_str(), "id"))?;
    let attributed_to = map
        .get("attributedTo")
        .and_then(|v| each(v).find_map(iri))
        .ok_or_else(|| incomplete(kind.as_str(), "attributedTo"))?;

    let mut mentions = Vec::new();
    let mut emojis = Vec::new();
    let mut hashtags = Vec::new();
    if let Some(tags) = map.get("tag") {
        for tag in each(tags) {
            let Some(t) = tag.as_object() else { continue };
            match type_name(t).as_deref() {
                Some("Mention") => {
                    if let Some(href) = str_field(t, "href") {
                        mentions.push(MentionTag {
                            href,
                            name: str_field(t, "name").unwrap_or_default(),
                        });
                    }
                }
                Some("Emoji") => emojis.extend(emoji_tag(tag)),
                Some("Hashtag") => {
                    if let Some(name) = str_field(t, "name") {
                        hashtags.push(name.trim_start_matches('#').to_ascii_lowercase());
                    }
                }
                _ => {}
            }
        }
    }

    Ok(ObjectDocument {
        kind,
        id,
        url: map.get("url").and_then(link_href),
        attributed_to,
        content: str_field(map, "content"),
        summary: str_field(map, "summary"),
        sensitive: map.get("sensitive").and_then(|v| v.as_bool()).unwrap_or(false),
        published: str_field(map, "published"),
        updated: str_field(map, "updated"),
        in_reply_to: map.get("inReplyTo").and_then(|v| each(v).find_map(iri)),
        to: map.get("to").map(|v| each(v).filter_map(iri).collect()).unwrap_or_default(),
        cc: map.get("cc").map(|v| each(v).filter_map(iri).collect()).unwrap_or_default(),
        attachments: map
            .get("attachment")
            .map(|v| each(v).filter_map(attachment_ref).collect())
            .unwrap_or_default(),
        mentions,
        emojis,
        hashtags,
        raw: raw.clone(),
    })
}

fn collection_document(
    kind: CollectionKind,
    map: &Map<String, Value>,
) -> Result<CollectionDocument, ResolveError> {
    let id = str_field(map, "id").ok_or_else(|| incomplete(kind.as_str(), "id"))?;
    let items_key = if kind.is_ordered() { "orderedItems" } else { "items" };
    // A collection that only links to its first page has nothing listed inline.
    let items = map
        .get(items_key)
        .ok_or_else(|| incomplete(kind.as_str(), items_key))?;

    let items = each(items)
        .filter_map(|item| match item {
            Value::String(s) if !s.trim().is_empty() => Some(CollectionItem::Iri(s.trim().to_string())),
            Value::Object(m) => str_field(m, "id").map(|id| CollectionItem::Embedded {
                id,
                type_name: type_name(m),
            }),
            _ => None,
        })
        .collect();

    Ok(CollectionDocument {
        kind,
        id,
        total_items: map.get("totalItems").and_then(|v| v.as_u64()),
        items,
    })
}

fn emoji_tag(v: &Value) -> Option<EmojiTag> {
    let t = v.as_object()?;
    if type_name(t).as_deref() != Some("Emoji") {
        return None;
    }
    let id = str_field(t, "id")?;
    let shortcode = str_field(t, "name")?.trim_matches(':').to_string();
    if shortcode.is_empty() {
        return None;
    }
    let icon_url = t.get("icon").and_then(image_href)?;
    Some(EmojiTag {
        id,
        shortcode,
        icon_url,
        updated: str_field(t, "updated"),
    })
}

fn attachment_ref(v: &Value) -> Option<AttachmentRef> {
    match v {
        Value::String(url) if !url.trim().is_empty() => Some(AttachmentRef {
            url: url.trim().to_string(),
            media_type: None,
            name: None,
            blurhash: None,
            width: None,
            height: None,
        }),
        Value::Object(map) => {
            // Mastodon profile fields also live under `attachment`.
            if type_name(map).as_deref() == Some("PropertyValue") {
                return None;
            }
            let url = map.get("url").and_then(link_href).or_else(|| str_field(map, "href"))?;
            Some(AttachmentRef {
                url,
                media_type: str_field(map, "mediaType"),
                name: str_field(map, "name"),
                blurhash: str_field(map, "blurhash"),
                width: map.get("width").and_then(|w| w.as_u64()).map(|w| w as u32),
                height: map.get("height").and_then(|h| h.as_u64()).map(|h| h as u32),
            })
        }
        _ => None,
    }
}

fn incomplete(kind: &str, field: &'static str) -> ResolveError {
    ResolveError::Incomplete {
        kind: kind.to_string(),
        field,
    }
}

/// `type` may be a string or an array; in the array case the first recognised name wins.
fn type_name(map: &Map<String, Value>) -> Option<String> {
    match map.get("type")? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Array(arr) => {
            let names: Vec<&str> = arr.iter().filter_map(|v| v.as_str()).collect();
            names
                .iter()
                .find(|n| {
                    ActorKind::from_type_name(n).is_some()
                        || ObjectKind::from_type_name(n).is_some()
                        || CollectionKind::from_type_name(n).is_some()
                })
                .or_else(|| names.first())
                .map(|s| s.to_string())
        }
        _ => None,
    }
}

fn str_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn each(v: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match v {
        Value::Array(arr) => Box::new(arr.iter()),
        Value::Null => Box::new(std::iter::empty()),
        other => Box::new(std::iter::once(other)),
    }
}

fn first_object(v: &Value) -> Option<&Map<String, Value>> {
    each(v).find_map(|v| v.as_object())
}

fn iri(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Object(m) => str_field(m, "id").or_else(|| str_field(m, "href")),
        _ => None,
    }
}

/// `url` as a string, a `Link`, or a list of links (an html link is preferred).
fn link_href(v: &Value) -> Option<String> {
    match v {
        Value::Array(arr) => arr
            .iter()
            .find(|l| {
                l.get("mediaType").and_then(|m| m.as_str()) == Some("text/html")
            })
            .and_then(link_href)
            .or_else(|| arr.iter().find_map(link_href)),
        Value::Object(m) => str_field(m, "href").or_else(|| m.get("url").and_then(link_href)),
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn image_href(v: &Value) -> Option<String> {
    match v {
        Value::Array(arr) => arr.iter().find_map(image_href),
        Value::Object(m) => m.get("url").and_then(link_href).or_else(|| str_field(m, "href")),
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_person_with_nested_fields() {
        let doc = json!({
            "@context": ["https://www.w3.org/ns/activitystreams"],
            "id": "https://remote.example/users/bob",
            "type": "Person",
            "preferredUsername": "bob",
            "name": "Bob :wave:",
            "inbox": "https://remote.example/users/bob/inbox",
            "followers": "https://remote.example/users/bob/followers",
            "following": "https://remote.example/users/bob/following",
            "featured": "https://remote.example/users/bob/collections/featured",
            "endpoints": { "sharedInbox": "https://remote.example/inbox" },
            "publicKey": { "id": "https://remote.example/users/bob#main-key", "publicKeyPem": "PEM" },
            "icon": { "type": "Image", "url": "https://remote.example/avatar.png" },
            "url": [
                { "type": "Link", "mediaType": "application/json", "href": "https://remote.example/x" },
                { "type": "Link", "mediaType": "text/html", "href": "https://remote.example/@bob" }
            ],
            "tag": [{
                "id": "https://remote.example/emojis/wave",
                "type": "Emoji",
                "name": ":wave:",
                "icon": { "type": "Image", "url": "https://remote.example/wave.png" }
            }]
        });
        let Vocab::Actor(actor) = resolve(&doc).unwrap() else {
            panic!("expected actor");
        };
        assert_eq!(actor.kind, ActorKind::Person);
        assert_eq!(actor.preferred_username, "bob");
        assert_eq!(actor.url.as_deref(), Some("https://remote.example/@bob"));
        assert_eq!(actor.shared_inbox.as_deref(), Some("https://remote.example/inbox"));
        assert_eq!(actor.icon_url.as_deref(), Some("https://remote.example/avatar.png"));
        assert_eq!(actor.emojis.len(), 1);
        assert_eq!(actor.emojis[0].shortcode, "wave");
    }

    #[test]
    fn rejects_unknown_and_unconstructible_types() {
        let tombstone = json!({ "id": "https://remote.example/1", "type": "Tombstone" });
        assert_eq!(
            resolve(&tombstone),
            Err(ResolveError::Unsupported("Tombstone".to_string()))
        );

        let orphan_note = json!({ "id": "https://remote.example/2", "type": "Note", "content": "hi" });
        assert!(matches!(
            resolve(&orphan_note),
            Err(ResolveError::Incomplete { field: "attributedTo", .. })
        ));

        assert_eq!(resolve(&json!({ "id": "x" })), Err(ResolveError::MissingType));
    }

    #[test]
    fn note_tags_split_into_mentions_emojis_hashtags() {
        let doc = json!({
            "id": "https://remote.example/notes/1",
            "type": ["Note"],
            "attributedTo": [{ "type": "Person", "id": "https://remote.example/users/bob" }],
            "inReplyTo": "https://other.example/notes/9",
            "attachment": [
                { "type": "Document", "mediaType": "image/png", "url": "https://remote.example/a.png", "name": "alt" },
                { "type": "PropertyValue", "name": "x", "value": "y" }
            ],
            "tag": [
                { "type": "Mention", "href": "https://other.example/users/amy", "name": "@amy@other.example" },
                { "type": "Hashtag", "name": "#Rust", "href": "https://remote.example/tags/rust" },
                { "type": "Emoji", "id": "https://remote.example/emojis/1", "name": ":blob:", "icon": { "url": "https://remote.example/blob.png" } }
            ]
        });
        let Vocab::Object(note) = resolve(&doc).unwrap() else {
            panic!("expected object");
        };
        assert_eq!(note.attributed_to, "https://remote.example/users/bob");
        assert_eq!(note.in_reply_to.as_deref(), Some("https://other.example/notes/9"));
        assert_eq!(note.attachments.len(), 1);
        assert_eq!(note.attachments[0].name.as_deref(), Some("alt"));
        assert_eq!(note.mentions[0].href, "https://other.example/users/amy");
        assert_eq!(note.hashtags, vec!["rust".to_string()]);
        assert_eq!(note.emojis[0].shortcode, "blob");
    }

    #[test]
    fn ordered_collection_items_accept_iris_and_embedded_objects() {
        let doc = json!({
            "id": "https://remote.example/users/bob/collections/featured",
            "type": "OrderedCollection",
            "totalItems": 2,
            "orderedItems": [
                "https://remote.example/notes/1",
                { "id": "https://remote.example/notes/2", "type": "Note" },
                { "type": "Note" }
            ]
        });
        let Vocab::Collection(c) = resolve(&doc).unwrap() else {
            panic!("expected collection");
        };
        let ids: Vec<&str> = c.items.iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["https://remote.example/notes/1", "https://remote.example/notes/2"]);

        let paged = json!({ "id": "https://remote.example/c", "type": "OrderedCollection", "first": "https://remote.example/c?page=1" });
        assert!(resolve(&paged).is_err());
    }

    #[test]
    fn decode_requires_an_object() {
        assert!(matches!(decode(b"[1,2]"), Err(DecodeError::NotAnObject)));
        assert!(matches!(decode(b"{nope"), Err(DecodeError::Json(_))));
        assert!(decode(br#"{"type":"Note"}"#).is_ok());
    }
}
