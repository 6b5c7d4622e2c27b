/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Remote actor/object resolution.
//!
//! Entry points are [`Dereferencer::resolve_actor`], [`Dereferencer::resolve_object`],
//! [`Dereferencer::update_actor`] and [`Dereferencer::enrich_object`]. Every operation takes the
//! caller's cancellation token; cancelling it aborts the network call in progress and
//! surfaces as [`DerefError::Cancelled`].

mod actor;
mod emoji;
mod enrich;
mod featured;
mod object;


pub use emoji::emojis_changed;

use fedref_protocol::Vocab;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::blocklist::Blocklist;
use crate::config::DerefConfig;
use crate::error::{DerefError, DerefResult};
use crate::handshake::Handshakes;
use crate::inflight::InFlight;
use crate::media::MediaPipeline;
use crate::model::{Emoji, MediaAttachment};
use crate::store::Store;
use crate::transport::{Transport, TransportController};

pub struct Dereferencer {
    cfg: Arc<DerefConfig>,
    store: Arc<dyn Store>,
    transports: Arc<dyn TransportController>,
    media: Arc<dyn MediaPipeline>,
    blocklist: Blocklist,
    // One table per media kind so avatar and header fetches never contend.
    avatars: InFlight<MediaAttachment>,
    headers: InFlight<MediaAttachment>,
    attachments: InFlight<MediaAttachment>,
    emojis: InFlight<Emoji>,
    handshakes: Handshakes,
}

impl Dereferencer {
    pub fn new(
        cfg: Arc<DerefConfig>,
        store: Arc<dyn Store>,
        transports: Arc<dyn TransportController>,
        media: Arc<dyn MediaPipeline>,
    ) -> Self {
        let blocklist = Blocklist::new(cfg.blocked_patterns(), store.clone());
        Self {
            cfg,
            store,
            transports,
            media,
            blocklist,
            avatars: InFlight::new(),
            headers: InFlight::new(),
            attachments: InFlight::new(),
            emojis: InFlight::new(),
            handshakes: Handshakes::default(),
        }
    }

    pub fn config(&self) -> &DerefConfig {
        &self.cfg
    }

    /// Whether `requester` is currently dereferencing the actor at `uri`.
    pub fn is_handshaking(&self, requester: &str, uri: &str) -> bool {
        self.handshakes.is_handshaking(requester, uri)
    }

    async fn transport(&self, requester: &str) -> DerefResult<Arc<dyn Transport>> {
        self.transports
            .transport_for(requester)
            .await
            .map_err(DerefError::internal)
    }

    /// GET + decode + type resolution.
    async fn fetch_vocab(
        &self,
        transport: &dyn Transport,
        uri: &str,
        cancel: &CancellationToken,
    ) -> DerefResult<(Value, Vocab)> {
        let body = net(cancel, transport.dereference(uri)).await?;
        let raw = fedref_protocol::decode(&body)?;
        let vocab = fedref_protocol::resolve(&raw)?;
        Ok((raw, vocab))
    }
}

pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = DerefResult<T>>,
) -> DerefResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DerefError::Cancelled),
        res = fut => res,
    }
}

/// Store call; failures are internal.
pub(crate) async fn db<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> DerefResult<T> {
    cancellable(cancel, async { fut.await.map_err(DerefError::internal) }).await
}

/// Network call; failures are transport errors.
pub(crate) async fn net<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> DerefResult<T> {
    cancellable(cancel, async { fut.await.map_err(DerefError::transport) }).await
}
