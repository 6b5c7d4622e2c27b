/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Scripted collaborators for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use crate::config::DerefConfig;
use crate::deref::Dereferencer;
use crate::media::LocalMediaPipeline;
use crate::model::{Emoji, MediaAttachment, Mention, RemoteActor, RemoteObject};
use crate::social_db::SocialDb;
use crate::store::Store;
use crate::transport::{webfinger_url, Transport, TransportController};

pub const LOCAL_HOST: &str = "local.example";

#[derive(Clone)]
enum Canned {
    Body(Bytes),
    Fail(String),
}

#[derive(Default)]
struct Script {
    responses: HashMap<String, Canned>,
    delays: HashMap<String, Duration>,
    calls: HashMap<String, usize>,
}

/// Serves canned bodies keyed by URL and counts every request.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<Script>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub fn add_json(&self, uri: &str, doc: Value) {
        self.script()
            .responses
            .insert(uri.to_string(), Canned::Body(Bytes::from(doc.to_string())));
    }

    pub fn add_bytes(&self, uri: &str, body: Vec<u8>) {
        self.script()
            .responses
            .insert(uri.to_string(), Canned::Body(Bytes::from(body)));
    }

    pub fn add_failure(&self, uri: &str, msg: &str) {
        self.script()
            .responses
            .insert(uri.to_string(), Canned::Fail(msg.to_string()));
    }

    /// Handle discovery for `username@asked_domain`, answering with `subject_domain`.
    pub fn add_finger(&self, username: &str, asked_domain: &str, subject_domain: &str, actor_uri: &str) {
        self.add_json(
            &webfinger_url(username, asked_domain),
            json!({
                "subject": format!("acct:{username}@{subject_domain}"),
                "links": [
                    { "rel": "self", "type": "application/activity+json", "href": actor_uri }
                ]
            }),
        );
    }

    pub fn set_delay(&self, uri: &str, delay: Duration) {
        self.script().delays.insert(uri.to_string(), delay);
    }

    pub fn calls(&self, uri: &str) -> usize {
        self.script().calls.get(uri).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.script().calls.values().sum()
    }

    async fn serve(&self, uri: &str) -> Result<Bytes> {
        let (canned, delay) = {
            let mut s = self.script();
            *s.calls.entry(uri.to_string()).or_insert(0) += 1;
            (s.responses.get(uri).cloned(), s.delays.get(uri).copied())
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        match canned {
            Some(Canned::Body(b)) => Ok(b),
            Some(Canned::Fail(msg)) => Err(anyhow!("{msg}")),
            None => Err(anyhow!("GET {uri}: http 404")),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn dereference(&self, uri: &str) -> Result<Bytes> {
        self.serve(uri).await
    }

    async fn dereference_media(&self, uri: &str) -> Result<Bytes> {
        self.serve(uri).await
    }

    async fn finger(&self, username: &str, domain: &str) -> Result<Bytes> {
        self.serve(&webfinger_url(username, domain)).await
    }
}

pub struct MockController(pub Arc<MockTransport>);

#[async_trait]
impl TransportController for MockController {
    async fn transport_for(&self, _requester: &str) -> Result<Arc<dyn Transport>> {
        Ok(self.0.clone())
    }
}

pub fn temp_db() -> (TempDir, Arc<SocialDb>) {
    let dir = tempfile::tempdir().unwrap();
    let db = SocialDb::open(dir.path().join("fedref.sqlite")).unwrap();
    (dir, Arc::new(db))
}

pub struct Harness {
    pub _dir: TempDir,
    pub db: Arc<SocialDb>,
    pub transport: Arc<MockTransport>,
    pub deref: Dereferencer,
}

pub fn harness() -> Harness {
    harness_with(DerefConfig::for_host(LOCAL_HOST))
}

pub fn harness_with(cfg: DerefConfig) -> Harness {
    let (dir, db) = temp_db();
    build(dir, db.clone(), db, cfg)
}

/// Harness whose engine writes through [`FailingPins`] while tests still read `db` directly.
pub fn harness_failing_pins(fail_pin: bool, fail_unpin: bool) -> Harness {
    let (dir, db) = temp_db();
    let store: Arc<dyn Store> = Arc::new(FailingPins {
        inner: db.clone(),
        fail_pin,
        fail_unpin,
    });
    build(dir, db, store, DerefConfig::for_host(LOCAL_HOST))
}

fn build(dir: TempDir, db: Arc<SocialDb>, store: Arc<dyn Store>, cfg: DerefConfig) -> Harness {
    let transport = MockTransport::new();
    let media = LocalMediaPipeline::new(dir.path().to_path_buf(), store.clone());
    let deref = Dereferencer::new(
        Arc::new(cfg),
        store,
        Arc::new(MockController(transport.clone())),
        Arc::new(media),
    );
    Harness {
        _dir: dir,
        db,
        transport,
        deref,
    }
}

/// Delegates to `SocialDb`, failing pin writes (`pinned_at_ms > 0`) or unpin writes on demand.
pub struct FailingPins {
    pub inner: Arc<SocialDb>,
    pub fail_pin: bool,
    pub fail_unpin: bool,
}

#[async_trait]
impl Store for FailingPins {
    async fn get_actor_by_id(&self, id: &str) -> Result<Option<RemoteActor>> {
        self.inner.get_actor_by_id(id).await
    }
    async fn get_actor_by_uri(&self, uri: &str) -> Result<Option<RemoteActor>> {
        self.inner.get_actor_by_uri(uri).await
    }
    async fn get_actor_by_url(&self, url: &str) -> Result<Option<RemoteActor>> {
        self.inner.get_actor_by_url(url).await
    }
    async fn get_actor_by_username_domain(&self, username: &str, domain: &str) -> Result<Option<RemoteActor>> {
        self.inner.get_actor_by_username_domain(username, domain).await
    }
    async fn put_actor(&self, actor: &RemoteActor) -> Result<()> {
        self.inner.put_actor(actor).await
    }
    async fn update_actor(&self, actor: &RemoteActor) -> Result<()> {
        self.inner.update_actor(actor).await
    }
    async fn get_object_by_id(&self, id: &str) -> Result<Option<RemoteObject>> {
        self.inner.get_object_by_id(id).await
    }
    async fn get_object_by_uri(&self, uri: &str) -> Result<Option<RemoteObject>> {
        self.inner.get_object_by_uri(uri).await
    }
    async fn get_object_by_url(&self, url: &str) -> Result<Option<RemoteObject>> {
        self.inner.get_object_by_url(url).await
    }
    async fn put_object(&self, object: &RemoteObject) -> Result<()> {
        self.inner.put_object(object).await
    }
    async fn update_object(&self, object: &RemoteObject) -> Result<()> {
        self.inner.update_object(object).await
    }
    async fn set_object_pinned_at(&self, object_id: &str, pinned_at_ms: i64) -> Result<()> {
        if (pinned_at_ms > 0 && self.fail_pin) || (pinned_at_ms == 0 && self.fail_unpin) {
            return Err(anyhow!("disk full"));
        }
        self.inner.set_object_pinned_at(object_id, pinned_at_ms).await
    }
    async fn pinned_objects(&self, account_id: &str) -> Result<Vec<RemoteObject>> {
        self.inner.pinned_objects(account_id).await
    }
    async fn get_emoji_by_id(&self, id: &str) -> Result<Option<Emoji>> {
        self.inner.get_emoji_by_id(id).await
    }
    async fn get_emoji_by_uri(&self, uri: &str) -> Result<Option<Emoji>> {
        self.inner.get_emoji_by_uri(uri).await
    }
    async fn put_emoji(&self, emoji: &Emoji) -> Result<()> {
        self.inner.put_emoji(emoji).await
    }
    async fn put_mention(&self, mention: &Mention) -> Result<()> {
        self.inner.put_mention(mention).await
    }
    async fn get_mention(&self, id: &str) -> Result<Option<Mention>> {
        self.inner.get_mention(id).await
    }
    async fn put_media(&self, media: &MediaAttachment) -> Result<()> {
        self.inner.put_media(media).await
    }
    async fn get_media(&self, id: &str) -> Result<Option<MediaAttachment>> {
        self.inner.get_media(id).await
    }
    async fn is_domain_blocked(&self, host: &str) -> Result<bool> {
        self.inner.is_domain_blocked(host).await
    }
    async fn put_domain_block(&self, domain: &str) -> Result<()> {
        self.inner.put_domain_block(domain).await
    }
}

pub fn person_json(uri: &str, username: &str) -> Value {
    json!({
        "@context": ["https://www.w3.org/ns/activitystreams", "https://w3id.org/security/v1"],
        "id": uri,
        "type": "Person",
        "preferredUsername": username,
        "name": username,
        "inbox": format!("{uri}/inbox"),
        "outbox": format!("{uri}/outbox"),
        "followers": format!("{uri}/followers"),
        "following": format!("{uri}/following"),
        "publicKey": {
            "id": format!("{uri}#main-key"),
            "owner": uri,
            "publicKeyPem": "-----BEGIN PUBLIC KEY-----\nMIIB\n-----END PUBLIC KEY-----\n"
        }
    })
}

pub fn note_json(uri: &str, author: &str) -> Value {
    json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "id": uri,
        "type": "Note",
        "attributedTo": author,
        "content": "<p>hello</p>",
        "published": "2024-05-01T12:00:00Z",
        "to": ["https://www.w3.org/ns/activitystreams#Public"]
    })
}

pub fn emoji_tag(uri: &str, shortcode: &str, image: &str) -> Value {
    json!({
        "id": uri,
        "type": "Emoji",
        "name": format!(":{shortcode}:"),
        "icon": { "type": "Image", "mediaType": "image/png", "url": image }
    })
}

/// A valid 1x1 RGBA PNG.
pub fn png_bytes() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ]
}
