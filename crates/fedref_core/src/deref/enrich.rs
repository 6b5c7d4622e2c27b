/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use futures_util::future::FutureExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{cancellable, db, Dereferencer};
use crate::error::{DerefError, DerefResult};
use crate::ids::{new_id, now_ms};
use crate::inflight::InFlight;
use crate::media::{MediaInfo, MediaSource};
use crate::model::{ActorLocator, MediaAttachment, RemoteActor, RemoteObject};
use crate::transport::Transport;

impl Dereferencer {
    /// Fetches and processes one remote media file, at most once per URL at a time.
    pub(super) async fn fetch_media(
        &self,
        registry: &InFlight<MediaAttachment>,
        transport: &Arc<dyn Transport>,
        info: MediaInfo,
        cancel: &CancellationToken,
    ) -> DerefResult<MediaAttachment> {
        let key = info.remote_url.clone();
        let media = self.media.clone();
        let transport = transport.clone();
        registry
            .run(&key, cancel, move || {
                async move {
                    let source: MediaSource = {
                        let url = info.remote_url.clone();
                        Box::new(move || async move { transport.dereference_media(&url).await }.boxed())
                    };
                    let processing = media
                        .preprocess(source, info)
                        .await
                        .map_err(DerefError::internal)?;
                    processing
                        .load_attachment()
                        .await
                        .map_err(DerefError::transport)
                }
                .boxed()
            })
            .await
    }

    /// Re-runs dependency enrichment on an already stored object and saves the result.
    pub async fn enrich_object(
        &self,
        requester: &str,
        mut object: RemoteObject,
        include_parent: bool,
        cancel: &CancellationToken,
    ) -> DerefResult<RemoteObject> {
        let transport = self.transport(requester).await?;
        self.populate_object(requester, &transport, &mut object, include_parent, cancel)
            .await?;
        object.fetched_at_ms = now_ms();
        db(cancel, self.store.update_object(&object)).await?;
        Ok(object)
    }

    /// Resolves attachments, emojis, mentions and (optionally) the reply parent. Individual
    /// failures are logged and skipped; only blocking and cancellation abort.
    pub(super) async fn populate_object(
        &self,
        requester: &str,
        transport: &Arc<dyn Transport>,
        object: &mut RemoteObject,
        include_parent: bool,
        cancel: &CancellationToken,
    ) -> DerefResult<()> {
        cancellable(cancel, self.blocklist.check_uri(&object.uri)).await?;

        self.populate_attachments(transport, object, cancel).await?;

        if !object.emojis.is_empty() {
            let placeholders = std::mem::take(&mut object.emojis);
            let resolved = self.resolve_emojis(transport, placeholders, cancel).await?;
            object.emoji_ids = resolved.iter().map(|e| e.id.clone()).collect();
            object.emojis = resolved;
        }

        self.populate_mentions(requester, object, cancel).await?;
        self.populate_parent(requester, object, include_parent, cancel)
            .await
    }

    async fn populate_attachments(
        &self,
        transport: &Arc<dyn Transport>,
        object: &mut RemoteObject,
        cancel: &CancellationToken,
    ) -> DerefResult<()> {
        if object.attachments.is_empty() {
            return Ok(());
        }
        let mut loaded = Vec::with_capacity(object.attachments.len());
        for placeholder in std::mem::take(&mut object.attachments) {
            if !placeholder.id.is_empty() {
                loaded.push(placeholder);
                continue;
            }
            let info = MediaInfo {
                account_id: object.account_id.clone(),
                object_id: Some(object.id.clone()),
                remote_url: placeholder.remote_url.clone(),
                content_type: placeholder.content_type.clone(),
                description: placeholder.description.clone(),
                blurhash: placeholder.blurhash.clone(),
                ..Default::default()
            };
            match self.fetch_media(&self.attachments, transport, info, cancel).await {
                Ok(a) => loaded.push(a),
                Err(DerefError::Cancelled) => return Err(DerefError::Cancelled),
                Err(e) => warn!(uri = %object.uri, url = %placeholder.remote_url, "skipping attachment: {e:#}"),
            }
        }
        object.attachment_ids = loaded.iter().map(|a| a.id.clone()).collect();
        object.attachments = loaded;
        Ok(())
    }

    async fn populate_mentions(
        &self,
        requester: &str,
        object: &mut RemoteObject,
        cancel: &CancellationToken,
    ) -> DerefResult<()> {
        if object.mentions.is_empty() {
            return Ok(());
        }
        let mut resolved = Vec::with_capacity(object.mentions.len());
        for mut mention in std::mem::take(&mut object.mentions) {
            if !mention.id.is_empty() && mention.target_account_id.is_some() {
                resolved.push(mention);
                continue;
            }
            let target = match self
                .mention_target(requester, &mention.target_account_uri, cancel)
                .await
            {
                Ok(t) => t,
                Err(DerefError::Cancelled) => return Err(DerefError::Cancelled),
                Err(e) => {
                    warn!(uri = %object.uri, target = %mention.target_account_uri, "skipping mention: {e:#}");
                    continue;
                }
            };
            mention.id = new_id();
            mention.object_id = object.id.clone();
            mention.origin_account_id = object.account_id.clone();
            mention.origin_account_uri = object.account_uri.clone();
            mention.target_account_id = Some(target.id.clone());
            mention.target_account_url = target.url.clone();
            if mention.name_string.is_empty() {
                mention.name_string = target.handle();
            }
            mention.created_at_ms = now_ms();
            resolved.push(mention);
        }
        object.mention_ids = resolved.iter().map(|m| m.id.clone()).collect();
        object.mentions = resolved;
        Ok(())
    }

    /// Local store first (by URI, then URL), remote resolution second.
    async fn mention_target(
        &self,
        requester: &str,
        uri: &str,
        cancel: &CancellationToken,
    ) -> DerefResult<RemoteActor> {
        if let Some(a) = db(cancel, self.store.get_actor_by_uri(uri)).await? {
            return Ok(a);
        }
        if let Some(a) = db(cancel, self.store.get_actor_by_url(uri)).await? {
            return Ok(a);
        }
        self.resolve_actor_boxed(requester, ActorLocator::Uri(uri.to_string()), false, cancel)
            .await
    }

    async fn populate_parent(
        &self,
        requester: &str,
        object: &mut RemoteObject,
        include_parent: bool,
        cancel: &CancellationToken,
    ) -> DerefResult<()> {
        let Some(parent_uri) = object.in_reply_to_uri.clone() else {
            return Ok(());
        };
        if object.in_reply_to_id.is_some() {
            return Ok(());
        }

        let parent = match db(cancel, self.store.get_object_by_uri(&parent_uri)).await? {
            Some(p) => Some(p),
            None if include_parent => {
                // Parents of parents are not followed from here.
                match self
                    .resolve_object_boxed(requester, parent_uri.clone(), false, false, cancel)
                    .await
                {
                    Ok((p, _)) => Some(p),
                    Err(DerefError::Cancelled) => return Err(DerefError::Cancelled),
                    Err(e) => {
                        warn!(uri = %object.uri, parent = %parent_uri, "could not resolve parent: {e:#}");
                        None
                    }
                }
            }
            None => None,
        };
        if let Some(p) = parent {
            debug!(uri = %object.uri, parent = %p.uri, "linked reply parent");
            object.in_reply_to_id = Some(p.id);
            object.in_reply_to_account_id = Some(p.account_id);
        }
        Ok(())
    }
}
