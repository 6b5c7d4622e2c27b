/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Params, Transaction};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::ids::now_ms;
use crate::model::{Emoji, MediaAttachment, Mention, RemoteActor, RemoteObject};
use crate::store::{AlreadyExists, Store};

#[derive(Clone)]
pub struct SocialDb {
    path: PathBuf,
}

impl SocialDb {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let conn = Connection::open(&path).with_context(|| format!("open db: {}", path.display()))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS actors (
              id TEXT PRIMARY KEY,
              uri TEXT NOT NULL UNIQUE,
              url TEXT NULL,
              username TEXT NOT NULL,
              domain TEXT NOT NULL,
              fetched_at_ms INTEGER NOT NULL,
              actor_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS actors_url ON actors(url);
            CREATE INDEX IF NOT EXISTS actors_handle ON actors(username COLLATE NOCASE, domain COLLATE NOCASE);

            CREATE TABLE IF NOT EXISTS objects (
              id TEXT PRIMARY KEY,
              uri TEXT NOT NULL UNIQUE,
              url TEXT NULL,
              account_id TEXT NOT NULL,
              created_at_ms INTEGER NOT NULL,
              pinned_at_ms INTEGER NOT NULL DEFAULT 0,
              object_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS objects_url ON objects(url);
            CREATE INDEX IF NOT EXISTS objects_pinned ON objects(account_id, pinned_at_ms);

            CREATE TABLE IF NOT EXISTS emojis (
              id TEXT PRIMARY KEY,
              uri TEXT NOT NULL UNIQUE,
              shortcode TEXT NOT NULL,
              domain TEXT NOT NULL,
              emoji_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS mentions (
              id TEXT PRIMARY KEY,
              object_id TEXT NOT NULL,
              target_account_uri TEXT NOT NULL,
              mention_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS mentions_object ON mentions(object_id);

            CREATE TABLE IF NOT EXISTS media_items (
              id TEXT PRIMARY KEY,
              remote_url TEXT NOT NULL,
              account_id TEXT NOT NULL,
              created_at_ms INTEGER NOT NULL,
              media_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS domain_blocks (
              domain TEXT PRIMARY KEY,
              created_at_ms INTEGER NOT NULL
            );
            "#,
        )
        .context("init schema")?;
        Ok(Self { path })
    }

    fn conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .with_context(|| format!("open db: {}", self.path.display()))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    fn json_row<T: DeserializeOwned>(&self, sql: &str, p: impl Params) -> Result<Option<T>> {
        let conn = self.conn()?;
        let body: Option<String> = conn.query_row(sql, p, |r| r.get(0)).optional()?;
        body.map(|b| serde_json::from_str(&b).context("decode row json"))
            .transpose()
    }

    pub fn actor_by_id(&self, id: &str) -> Result<Option<RemoteActor>> {
        self.json_row("SELECT actor_json FROM actors WHERE id=?1", params![id])
    }

    pub fn actor_by_uri(&self, uri: &str) -> Result<Option<RemoteActor>> {
        self.json_row("SELECT actor_json FROM actors WHERE uri=?1", params![uri])
    }

    pub fn actor_by_url(&self, url: &str) -> Result<Option<RemoteActor>> {
        self.json_row(
            "SELECT actor_json FROM actors WHERE url=?1 ORDER BY fetched_at_ms DESC LIMIT 1",
            params![url],
        )
    }

    pub fn actor_by_username_domain(&self, username: &str, domain: &str) -> Result<Option<RemoteActor>> {
        self.json_row(
            r#"
            SELECT actor_json FROM actors
            WHERE username=?1 COLLATE NOCASE AND domain=?2 COLLATE NOCASE
            ORDER BY fetched_at_ms DESC
            LIMIT 1
            "#,
            params![username, domain],
        )
    }

    pub fn insert_actor(&self, actor: &RemoteActor) -> Result<()> {
        let body = serde_json::to_string(actor)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO actors(id, uri, url, username, domain, fetched_at_ms, actor_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                actor.id,
                actor.uri,
                actor.url,
                actor.username,
                actor.domain,
                actor.fetched_at_ms,
                body
            ],
        )
        .map_err(|e| conflict_or(e, "actor", &actor.uri))?;
        Ok(())
    }

    pub fn replace_actor(&self, actor: &RemoteActor) -> Result<()> {
        let body = serde_json::to_string(actor)?;
        let conn = self.conn()?;
        let n = conn
            .execute(
                "UPDATE actors SET uri=?2, url=?3, username=?4, domain=?5, fetched_at_ms=?6, actor_json=?7 WHERE id=?1",
                params![
                    actor.id,
                    actor.uri,
                    actor.url,
                    actor.username,
                    actor.domain,
                    actor.fetched_at_ms,
                    body
                ],
            )
            .map_err(|e| conflict_or(e, "actor", &actor.uri))?;
        if n == 0 {
            anyhow::bail!("update actor {}: no such row", actor.id);
        }
        Ok(())
    }

    pub fn object_by_id(&self, id: &str) -> Result<Option<RemoteObject>> {
        self.json_row("SELECT object_json FROM objects WHERE id=?1", params![id])
    }

    pub fn object_by_uri(&self, uri: &str) -> Result<Option<RemoteObject>> {
        self.json_row("SELECT object_json FROM objects WHERE uri=?1", params![uri])
    }

    pub fn object_by_url(&self, url: &str) -> Result<Option<RemoteObject>> {
        self.json_row(
            "SELECT object_json FROM objects WHERE url=?1 ORDER BY created_at_ms DESC LIMIT 1",
            params![url],
        )
    }

    pub fn insert_object(&self, object: &RemoteObject) -> Result<()> {
        let body = serde_json::to_string(object)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO objects(id, uri, url, account_id, created_at_ms, pinned_at_ms, object_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                object.id,
                object.uri,
                object.url,
                object.account_id,
                object.created_at_ms,
                object.pinned_at_ms,
                body
            ],
        )
        .map_err(|e| conflict_or(e, "object", &object.uri))?;
        upsert_mentions(&tx, &object.mentions)?;
        tx.commit().context("commit object insert")?;
        Ok(())
    }

    pub fn replace_object(&self, object: &RemoteObject) -> Result<()> {
        let body = serde_json::to_string(object)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let n = tx
            .execute(
                "UPDATE objects SET uri=?2, url=?3, account_id=?4, created_at_ms=?5, pinned_at_ms=?6, object_json=?7 WHERE id=?1",
                params![
                    object.id,
                    object.uri,
                    object.url,
                    object.account_id,
                    object.created_at_ms,
                    object.pinned_at_ms,
                    body
                ],
            )
            .map_err(|e| conflict_or(e, "object", &object.uri))?;
        if n == 0 {
            anyhow::bail!("update object {}: no such row", object.id);
        }
        upsert_mentions(&tx, &object.mentions)?;
        tx.commit().context("commit object update")?;
        Ok(())
    }

    pub fn set_pinned_at(&self, object_id: &str, pinned_at_ms: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let body: Option<String> = tx
            .query_row(
                "SELECT object_json FROM objects WHERE id=?1",
                params![object_id],
                |r| r.get(0),
            )
            .optional()?;
        let Some(body) = body else {
            anyhow::bail!("pin object {object_id}: no such row");
        };
        let mut object: RemoteObject = serde_json::from_str(&body).context("decode object row")?;
        object.pinned_at_ms = pinned_at_ms;
        tx.execute(
            "UPDATE objects SET pinned_at_ms=?2, object_json=?3 WHERE id=?1",
            params![object_id, pinned_at_ms, serde_json::to_string(&object)?],
        )?;
        tx.commit().context("commit pin")?;
        Ok(())
    }

    pub fn pinned_by_account(&self, account_id: &str) -> Result<Vec<RemoteObject>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT object_json FROM objects WHERE account_id=?1 AND pinned_at_ms > 0 ORDER BY pinned_at_ms DESC",
        )?;
        let rows = stmt.query_map(params![account_id], |r| r.get::<_, String>(0))?;
        let mut out = Vec::new();
        for body in rows {
            out.push(serde_json::from_str(&body?).context("decode object row")?);
        }
        Ok(out)
    }

    pub fn emoji_by_id(&self, id: &str) -> Result<Option<Emoji>> {
        self.json_row("SELECT emoji_json FROM emojis WHERE id=?1", params![id])
    }

    pub fn emoji_by_uri(&self, uri: &str) -> Result<Option<Emoji>> {
        self.json_row("SELECT emoji_json FROM emojis WHERE uri=?1", params![uri])
    }

    pub fn insert_emoji(&self, emoji: &Emoji) -> Result<()> {
        let body = serde_json::to_string(emoji)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO emojis(id, uri, shortcode, domain, emoji_json) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![emoji.id, emoji.uri, emoji.shortcode, emoji.domain, body],
        )
        .map_err(|e| conflict_or(e, "emoji", &emoji.uri))?;
        Ok(())
    }

    pub fn upsert_mention(&self, mention: &Mention) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        upsert_mentions(&tx, std::slice::from_ref(mention))?;
        tx.commit()?;
        Ok(())
    }

    pub fn mention_by_id(&self, id: &str) -> Result<Option<Mention>> {
        self.json_row("SELECT mention_json FROM mentions WHERE id=?1", params![id])
    }

    pub fn upsert_media(&self, media: &MediaAttachment) -> Result<()> {
        let body = serde_json::to_string(media)?;
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO media_items(id, remote_url, account_id, created_at_ms, media_json)
            VALUES (?1, ?2, ?3, COALESCE((SELECT created_at_ms FROM media_items WHERE id=?1), ?4), ?5)
            "#,
            params![media.id, media.remote_url, media.account_id, now_ms(), body],
        )?;
        Ok(())
    }

    pub fn media_by_id(&self, id: &str) -> Result<Option<MediaAttachment>> {
        self.json_row("SELECT media_json FROM media_items WHERE id=?1", params![id])
    }

    pub fn domain_blocked(&self, host: &str) -> Result<bool> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT 1 FROM domain_blocks WHERE domain=?1")?;
        for candidate in domain_and_parents(host) {
            if stmt.exists(params![candidate])? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn add_domain_block(&self, domain: &str) -> Result<()> {
        let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
        if domain.is_empty() {
            anyhow::bail!("empty domain");
        }
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO domain_blocks(domain, created_at_ms) VALUES (?1, ?2)",
            params![domain, now_ms()],
        )?;
        Ok(())
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SocialDb) -> Result<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .context("db task failed")?
    }
}

fn upsert_mentions(tx: &Transaction<'_>, mentions: &[Mention]) -> Result<()> {
    for m in mentions.iter().filter(|m| !m.id.is_empty()) {
        tx.execute(
            "INSERT OR REPLACE INTO mentions(id, object_id, target_account_uri, mention_json) VALUES (?1, ?2, ?3, ?4)",
            params![m.id, m.object_id, m.target_account_uri, serde_json::to_string(m)?],
        )?;
    }
    Ok(())
}

fn conflict_or(e: rusqlite::Error, kind: &'static str, uri: &str) -> anyhow::Error {
    match e {
        rusqlite::Error::SqliteFailure(f, _) if f.code == rusqlite::ErrorCode::ConstraintViolation => {
            AlreadyExists {
                kind,
                uri: uri.to_string(),
            }
            .into()
        }
        other => anyhow::Error::new(other).context(format!("write {kind} {uri}")),
    }
}

/// `a.b.example` -> `a.b.example`, `b.example`, `example`.
fn domain_and_parents(host: &str) -> Vec<String> {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    let mut out = Vec::new();
    let mut rest = host.as_str();
    while !rest.is_empty() {
        out.push(rest.to_string());
        match rest.split_once('.') {
            Some((_, parent)) => rest = parent,
            None => break,
        }
    }
    out
}

#[async_trait]
impl Store for SocialDb {
    async fn get_actor_by_id(&self, id: &str) -> Result<Option<RemoteActor>> {
        let id = id.to_string();
        self.blocking(move |db| db.actor_by_id(&id)).await
    }

    async fn get_actor_by_uri(&self, uri: &str) -> Result<Option<RemoteActor>> {
        let uri = uri.to_string();
        self.blocking(move |db| db.actor_by_uri(&uri)).await
    }

    async fn get_actor_by_url(&self, url: &str) -> Result<Option<RemoteActor>> {
        let url = url.to_string();
        self.blocking(move |db| db.actor_by_url(&url)).await
    }

    async fn get_actor_by_username_domain(&self, username: &str, domain: &str) -> Result<Option<RemoteActor>> {
        let (username, domain) = (username.to_string(), domain.to_string());
        self.blocking(move |db| db.actor_by_username_domain(&username, &domain))
            .await
    }

    async fn put_actor(&self, actor: &RemoteActor) -> Result<()> {
        let actor = actor.clone();
        self.blocking(move |db| db.insert_actor(&actor)).await
    }

    async fn update_actor(&self, actor: &RemoteActor) -> Result<()> {
        let actor = actor.clone();
        self.blocking(move |db| db.replace_actor(&actor)).await
    }

    async fn get_object_by_id(&self, id: &str) -> Result<Option<RemoteObject>> {
        let id = id.to_string();
        self.blocking(move |db| db.object_by_id(&id)).await
    }

    async fn get_object_by_uri(&self, uri: &str) -> Result<Option<RemoteObject>> {
        let uri = uri.to_string();
        self.blocking(move |db| db.object_by_uri(&uri)).await
    }

    async fn get_object_by_url(&self, url: &str) -> Result<Option<RemoteObject>> {
        let url = url.to_string();
        self.blocking(move |db| db.object_by_url(&url)).await
    }

    async fn put_object(&self, object: &RemoteObject) -> Result<()> {
        let object = object.clone();
        self.blocking(move |db| db.insert_object(&object)).await
    }

    async fn update_object(&self, object: &RemoteObject) -> Result<()> {
        let object = object.clone();
        self.blocking(move |db| db.replace_object(&object)).await
    }

    async fn set_object_pinned_at(&self, object_id: &str, pinned_at_ms: i64) -> Result<()> {
        let object_id = object_id.to_string();
        self.blocking(move |db| db.set_pinned_at(&object_id, pinned_at_ms))
            .await
    }

    async fn pinned_objects(&self, account_id: &str) -> Result<Vec<RemoteObject>> {
        let account_id = account_id.to_string();
        self.blocking(move |db| db.pinned_by_account(&account_id)).await
    }

    async fn get_emoji_by_id(&self, id: &str) -> Result<Option<Emoji>> {
        let id = id.to_string();
        self.blocking(move |db| db.emoji_by_id(&id)).await
    }

    async fn get_emoji_by_uri(&self, uri: &str) -> Result<Option<Emoji>> {
        let uri = uri.to_string();
        self.blocking(move |db| db.emoji_by_uri(&uri)).await
    }

    async fn put_emoji(&self, emoji: &Emoji) -> Result<()> {
        let emoji = emoji.clone();
        self.blocking(move |db| db.insert_emoji(&emoji)).await
    }

    async fn put_mention(&self, mention: &Mention) -> Result<()> {
        let mention = mention.clone();
        self.blocking(move |db| db.upsert_mention(&mention)).await
    }

    async fn get_mention(&self, id: &str) -> Result<Option<Mention>> {
        let id = id.to_string();
        self.blocking(move |db| db.mention_by_id(&id)).await
    }

    async fn put_media(&self, media: &MediaAttachment) -> Result<()> {
        let media = media.clone();
        self.blocking(move |db| db.upsert_media(&media)).await
    }

    async fn get_media(&self, id: &str) -> Result<Option<MediaAttachment>> {
        let id = id.to_string();
        self.blocking(move |db| db.media_by_id(&id)).await
    }

    async fn is_domain_blocked(&self, host: &str) -> Result<bool> {
        let host = host.to_string();
        self.blocking(move |db| db.domain_blocked(&host)).await
    }

    async fn put_domain_block(&self, domain: &str) -> Result<()> {
        let domain = domain.to_string();
        self.blocking(move |db| db.add_domain_block(&domain)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::is_already_exists;

    fn actor(id: &str, uri: &str) -> RemoteActor {
        RemoteActor {
            id: id.into(),
            uri: uri.into(),
            username: "Bob".into(),
            domain: "remote.example".into(),
            fetched_at_ms: 10,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn duplicate_uri_is_reported_as_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        let db = SocialDb::open(dir.path().join("t.sqlite")).unwrap();
        db.put_actor(&actor("A1", "https://remote.example/users/bob")).await.unwrap();
        let err = db
            .put_actor(&actor("A2", "https://remote.example/users/bob"))
            .await
            .unwrap_err();
        assert!(is_already_exists(&err), "{err:#}");

        let found = db
            .get_actor_by_username_domain("bob", "REMOTE.example")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, "A1");
    }

    #[tokio::test]
    async fn object_insert_carries_mentions_and_pins() {
        let dir = tempfile::tempdir().unwrap();
        let db = SocialDb::open(dir.path().join("t.sqlite")).unwrap();
        let mention = Mention {
            id: "M1".into(),
            object_id: "O1".into(),
            target_account_uri: "https://other.example/users/amy".into(),
            ..Default::default()
        };
        let object = RemoteObject {
            id: "O1".into(),
            uri: "https://remote.example/notes/1".into(),
            account_id: "A1".into(),
            mention_ids: vec!["M1".into()],
            mentions: vec![mention.clone()],
            ..Default::default()
        };
        db.put_object(&object).await.unwrap();
        assert_eq!(db.get_mention("M1").await.unwrap(), Some(mention));

        db.set_object_pinned_at("O1", 99).await.unwrap();
        let pinned = db.pinned_objects("A1").await.unwrap();
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned[0].pinned_at_ms, 99);
        assert_eq!(pinned[0].mention_ids, vec!["M1".to_string()]);

        db.set_object_pinned_at("O1", 0).await.unwrap();
        assert!(db.pinned_objects("A1").await.unwrap().is_empty());
        assert!(db.set_object_pinned_at("missing", 1).await.is_err());
    }

    #[tokio::test]
    async fn domain_blocks_cover_subdomains() {
        let dir = tempfile::tempdir().unwrap();
        let db = SocialDb::open(dir.path().join("t.sqlite")).unwrap();
        db.put_domain_block("Bad.Example").await.unwrap();
        assert!(db.is_domain_blocked("bad.example").await.unwrap());
        assert!(db.is_domain_blocked("media.bad.example").await.unwrap());
        assert!(!db.is_domain_blocked("notbad.example").await.unwrap());
        assert_eq!(
            domain_and_parents("a.b.example"),
            vec!["a.b.example", "b.example", "example"]
        );
    }
}
