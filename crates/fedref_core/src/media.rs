/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::Uri;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::ids::{new_id, now_ms};
use crate::model::MediaAttachment;
use crate::store::Store;

/// Produces the media bytes; run at most once, from `load_attachment`.
pub type MediaSource = Box<dyn FnOnce() -> BoxFuture<'static, Result<Bytes>> + Send>;

#[derive(Debug, Clone, Default)]
pub struct MediaInfo {
    pub account_id: String,
    pub object_id: Option<String>,
    pub remote_url: String,
    pub content_type: Option<String>,
    pub description: Option<String>,
    pub blurhash: Option<String>,
    pub avatar: bool,
    pub header: bool,
}

#[async_trait]
pub trait ProcessingMedia: Send + Sync {
    fn attachment_id(&self) -> &str;
    /// Waits until the attachment is fully processed and stored.
    async fn load_attachment(&self) -> Result<MediaAttachment>;
}

#[async_trait]
pub trait MediaPipeline: Send + Sync {
    async fn preprocess(&self, source: MediaSource, info: MediaInfo) -> Result<Box<dyn ProcessingMedia>>;
}

pub fn media_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("media")
}

/// Stores media files under `data_dir/media/`.
pub struct LocalMediaPipeline {
    data_dir: PathBuf,
    store: Arc<dyn Store>,
}

impl LocalMediaPipeline {
    pub fn new(data_dir: PathBuf, store: Arc<dyn Store>) -> Self {
        Self { data_dir, store }
    }
}

#[async_trait]
impl MediaPipeline for LocalMediaPipeline {
    async fn preprocess(&self, source: MediaSource, info: MediaInfo) -> Result<Box<dyn ProcessingMedia>> {
        Ok(Box::new(LocalProcessing {
            id: new_id(),
            dir: media_dir(&self.data_dir),
            store: self.store.clone(),
            info,
            state: Mutex::new(State::Pending(source)),
        }))
    }
}

enum State {
    Pending(MediaSource),
    Done(MediaAttachment),
    Failed(String),
}

struct LocalProcessing {
    id: String,
    dir: PathBuf,
    store: Arc<dyn Store>,
    info: MediaInfo,
    state: Mutex<State>,
}

impl LocalProcessing {
    async fn process(&self, source: MediaSource) -> Result<MediaAttachment> {
        let bytes = source()
            .await
            .with_context(|| format!("fetch media {}", self.info.remote_url))?;
        if bytes.is_empty() {
            return Err(anyhow!("empty media body from {}", self.info.remote_url));
        }

        let path = self.dir.join(&self.id);
        let want_blurhash = self.info.blurhash.is_none();
        let (dims, blurhash) = tokio::task::spawn_blocking({
            let dir = self.dir.clone();
            let path = path.clone();
            let bytes = bytes.clone();
            move || -> Result<_> {
                std::fs::create_dir_all(&dir).context("create media dir")?;
                std::fs::write(&path, &bytes).with_context(|| format!("write media {path:?}"))?;
                let dims = probe_image_dimensions(&bytes);
                let blurhash = if want_blurhash && dims.is_some() {
                    compute_blurhash(&bytes)
                } else {
                    None
                };
                Ok((dims, blurhash))
            }
        })
        .await
        .context("media task failed")??;

        let attachment = MediaAttachment {
            id: self.id.clone(),
            remote_url: self.info.remote_url.clone(),
            account_id: self.info.account_id.clone(),
            object_id: self.info.object_id.clone(),
            file_path: Some(path.to_string_lossy().into_owned()),
            content_type: Some(content_type_for(&self.info)),
            size: bytes.len() as u64,
            width: dims.map(|d| d.0),
            height: dims.map(|d| d.1),
            description: self.info.description.clone(),
            blurhash: self.info.blurhash.clone().or(blurhash),
            avatar: self.info.avatar,
            header: self.info.header,
            created_at_ms: now_ms(),
        };
        self.store
            .put_media(&attachment)
            .await
            .with_context(|| format!("store media {}", attachment.id))?;
        debug!(id = %attachment.id, url = %attachment.remote_url, size = attachment.size, "media stored");
        Ok(attachment)
    }
}

#[async_trait]
impl ProcessingMedia for LocalProcessing {
    fn attachment_id(&self) -> &str {
        &self.id
    }

    async fn load_attachment(&self) -> Result<MediaAttachment> {
        let mut state = self.state.lock().await;
        let current = std::mem::replace(&mut *state, State::Failed("processing interrupted".to_string()));
        match current {
            State::Done(a) => {
                *state = State::Done(a.clone());
                Ok(a)
            }
            State::Failed(e) => {
                *state = State::Failed(e.clone());
                Err(anyhow!(e))
            }
            State::Pending(source) => {
                let res = self.process(source).await;
                *state = match &res {
                    Ok(a) => State::Done(a.clone()),
                    Err(e) => State::Failed(format!("{e:#}")),
                };
                res
            }
        }
    }
}

fn content_type_for(info: &MediaInfo) -> String {
    if let Some(ct) = info.content_type.as_deref().filter(|s| !s.trim().is_empty()) {
        return ct.to_string();
    }
    let path = info
        .remote_url
        .parse::<Uri>()
        .ok()
        .map(|u| u.path().to_string())
        .unwrap_or_default();
    mime_guess::from_path(path)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

pub fn probe_image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    probe_png(bytes)
        .or_else(|| probe_gif(bytes))
        .or_else(|| probe_jpeg(bytes))
        .or_else(|| probe_webp(bytes))
        .filter(|(w, h)| *w > 0 && *h > 0)
}

fn probe_png(b: &[u8]) -> Option<(u32, u32)> {
    if b.len() < 24 || &b[0..8] != b"\x89PNG\r\n\x1a\n" {
        return None;
    }
    let w = u32::from_be_bytes(b[16..20].try_into().ok()?);
    let h = u32::from_be_bytes(b[20..24].try_into().ok()?);
    Some((w, h))
}

fn probe_gif(b: &[u8]) -> Option<(u32, u32)> {
    if b.len() < 10 || (&b[0..6] != b"GIF87a" && &b[0..6] != b"GIF89a") {
        return None;
    }
    let w = u16::from_le_bytes([b[6], b[7]]) as u32;
    let h = u16::from_le_bytes([b[8], b[9]]) as u32;
    Some((w, h))
}

/// Walks JPEG segments up to the first baseline or progressive frame header.
fn probe_jpeg(b: &[u8]) -> Option<(u32, u32)> {
    if b.len() < 4 || b[0] != 0xFF || b[1] != 0xD8 {
        return None;
    }
    let mut i = 2usize;
    loop {
        while *b.get(i)? != 0xFF {
            i += 1;
        }
        while *b.get(i)? == 0xFF {
            i += 1;
        }
        let marker = *b.get(i)?;
        i += 1;
        if marker == 0xD9 || marker == 0xDA {
            return None;
        }
        let len = u16::from_be_bytes([*b.get(i)?, *b.get(i + 1)?]) as usize;
        if len < 2 {
            return None;
        }
        if marker == 0xC0 || marker == 0xC2 {
            let h = u16::from_be_bytes([*b.get(i + 3)?, *b.get(i + 4)?]) as u32;
            let w = u16::from_be_bytes([*b.get(i + 5)?, *b.get(i + 6)?]) as u32;
            return Some((w, h));
        }
        i += len;
    }
}

fn probe_webp(b: &[u8]) -> Option<(u32, u32)> {
    if b.len() < 30 || &b[0..4] != b"RIFF" || &b[8..12] != b"WEBP" {
        return None;
    }
    let mut i = 12usize;
    while i + 8 <= b.len() {
        let chunk = &b[i..i + 4];
        let size = u32::from_le_bytes(b[i + 4..i + 8].try_into().ok()?) as usize;
        i += 8;
        let data = b.get(i..i.checked_add(size)?)?;
        if chunk == b"VP8X" && data.len() >= 10 {
            let w = u32::from_le_bytes([data[4], data[5], data[6], 0]) + 1;
            let h = u32::from_le_bytes([data[7], data[8], data[9], 0]) + 1;
            return Some((w, h));
        }
        i += size + (size % 2);
    }
    None
}

fn compute_blurhash(bytes: &[u8]) -> Option<String> {
    const MAX_DIM: u32 = 256;
    let img = image::load_from_memory(bytes).ok()?;
    let img = if img.width() > MAX_DIM || img.height() > MAX_DIM {
        img.thumbnail(MAX_DIM, MAX_DIM)
    } else {
        img
    };
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let pixels = rgba.into_raw();
    match std::panic::catch_unwind(|| blurhash::encode(4, 3, w, h, &pixels)) {
        Ok(Ok(hash)) => Some(hash),
        Ok(Err(_)) => None,
        Err(_) => {
            warn!(w, h, "blurhash encode panicked; skipping");
            None
        }
    }
}
