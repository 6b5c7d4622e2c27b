/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use fedref_protocol::Vocab;
use futures_util::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::emoji::emojis_changed;
use super::{cancellable, db, Dereferencer};
use crate::convert::actor_from_document;
use crate::error::{DerefError, DerefResult};
use crate::ids::{host_from_url, new_id, now_ms};
use crate::media::MediaInfo;
use crate::model::{needs_refresh, ActorLocator, MediaAttachment, RemoteActor};
use crate::store::is_already_exists;
use crate::transport::Transport;
use crate::webfinger::canonicalize;

#[derive(Clone, Copy)]
enum ProfileMedia {
    Avatar,
    Header,
}

impl Dereferencer {
    pub async fn resolve_actor(
        &self,
        requester: &str,
        locator: &ActorLocator,
        force: bool,
        cancel: &CancellationToken,
    ) -> DerefResult<RemoteActor> {
        self.resolve_actor_boxed(requester, locator.clone(), force, cancel)
            .await
    }

    /// Re-enriches a stored actor if it is stale or `force` is set.
    pub async fn update_actor(
        &self,
        requester: &str,
        actor: RemoteActor,
        force: bool,
        cancel: &CancellationToken,
    ) -> DerefResult<RemoteActor> {
        if actor.is_local()
            || !needs_refresh(actor.fetched_at_ms, now_ms(), self.cfg.stale_after(), force)
        {
            return Ok(actor);
        }
        self.enrich_actor(requester, actor, cancel).await
    }

    pub(super) fn resolve_actor_boxed<'a>(
        &'a self,
        requester: &'a str,
        locator: ActorLocator,
        force: bool,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, DerefResult<RemoteActor>> {
        async move {
            match self.lookup_actor(&locator, cancel).await? {
                // A failed refresh keeps the stored copy; the next stale lookup retries.
                Some(actor) => match self.update_actor(requester, actor.clone(), force, cancel).await {
                    Ok(fresh) => Ok(fresh),
                    Err(DerefError::Cancelled) => Err(DerefError::Cancelled),
                    Err(e) => {
                        warn!(uri = %actor.uri, retryable = e.is_retryable_later(), "refresh failed, using stored actor: {e:#}");
                        Ok(actor)
                    }
                },
                None => {
                    let placeholder = self.placeholder_actor(&locator)?;
                    debug!(%locator, "actor not known locally, fetching");
                    self.enrich_actor(requester, placeholder, cancel).await
                }
            }
        }
        .boxed()
    }

    async fn lookup_actor(
        &self,
        locator: &ActorLocator,
        cancel: &CancellationToken,
    ) -> DerefResult<Option<RemoteActor>> {
        match locator {
            ActorLocator::Uri(uri) => {
                if let Some(a) = db(cancel, self.store.get_actor_by_uri(uri)).await? {
                    return Ok(Some(a));
                }
                db(cancel, self.store.get_actor_by_url(uri)).await
            }
            ActorLocator::Handle { username, domain } => {
                let domain = if self.cfg.is_local_host(domain) { "" } else { domain.as_str() };
                db(cancel, self.store.get_actor_by_username_domain(username, domain)).await
            }
        }
    }

    /// Bare record to enrich on first contact. Local identities are never fetched.
    fn placeholder_actor(&self, locator: &ActorLocator) -> DerefResult<RemoteActor> {
        match locator {
            ActorLocator::Uri(uri) => {
                let host = host_from_url(uri)
                    .ok_or_else(|| DerefError::NotRetrievable(format!("no host in {uri}")))?;
                if self.cfg.is_local_host(&host) {
                    return Err(DerefError::NotRetrievable(format!("local actor {uri} not found")));
                }
                Ok(RemoteActor {
                    uri: uri.clone(),
                    domain: host,
                    ..Default::default()
                })
            }
            ActorLocator::Handle { username, domain } => {
                if self.cfg.is_local_host(domain) {
                    return Err(DerefError::NotRetrievable(format!(
                        "local account {username} not found"
                    )));
                }
                Ok(RemoteActor {
                    username: username.clone(),
                    domain: domain.to_ascii_lowercase(),
                    ..Default::default()
                })
            }
        }
    }

    pub(super) async fn enrich_actor(
        &self,
        requester: &str,
        mut actor: RemoteActor,
        cancel: &CancellationToken,
    ) -> DerefResult<RemoteActor> {
        if actor.is_local() {
            return Ok(actor);
        }
        if actor.is_instance() && actor.created_at_ms > 0 {
            return Ok(actor);
        }

        if !actor.uri.is_empty() {
            cancellable(cancel, self.blocklist.check_uri(&actor.uri)).await?;
        }
        cancellable(cancel, self.blocklist.check_host(&actor.domain)).await?;

        let transport = self.transport(requester).await?;

        let had_username = !actor.username.is_empty();
        if had_username {
            actor = self.canonicalize_before_fetch(&*transport, actor, cancel).await?;
        }

        let _handshake = self.handshakes.begin(requester, &actor.uri);
        let (_, vocab) = self.fetch_vocab(&*transport, &actor.uri, cancel).await?;
        let doc = match vocab {
            Vocab::Actor(doc) => doc,
            other => {
                return Err(DerefError::WrongType {
                    expected: "actor",
                    got: other.type_name().to_string(),
                })
            }
        };

        // Redirects: the fetched id is authoritative, and may already be stored.
        if doc.id != actor.uri {
            cancellable(cancel, self.blocklist.check_uri(&doc.id)).await?;
            if actor.id.is_empty() {
                if let Some(known) = db(cancel, self.store.get_actor_by_uri(&doc.id)).await? {
                    actor = known;
                }
            }
        }

        let is_new = actor.id.is_empty();
        let mut latest = actor_from_document(&doc);
        latest.id = if is_new { new_id() } else { actor.id.clone() };
        if had_username {
            latest.domain = actor.domain.clone();
        } else {
            self.canonicalize_after_fetch(&*transport, &mut latest, cancel)
                .await?;
        }

        self.refresh_profile_media(&transport, &actor, &mut latest, ProfileMedia::Avatar, cancel)
            .await?;
        self.refresh_profile_media(&transport, &actor, &mut latest, ProfileMedia::Header, cancel)
            .await?;

        let previous = self.load_emojis(&actor.emoji_ids, cancel).await?;
        let placeholders = std::mem::take(&mut latest.emojis);
        let resolved = self.resolve_emojis(&transport, placeholders, cancel).await?;
        if emojis_changed(&previous, &resolved) {
            latest.emoji_ids = resolved.iter().map(|e| e.id.clone()).collect();
            latest.emojis = resolved;
        } else {
            latest.emoji_ids = actor.emoji_ids.clone();
            latest.emojis = previous;
        }

        let now = now_ms();
        latest.fetched_at_ms = now;
        latest.updated_at_ms = now;
        if is_new {
            latest.created_at_ms = now;
            let put = cancellable(cancel, async { Ok(self.store.put_actor(&latest).await) }).await?;
            match put {
                Ok(()) => info!(uri = %latest.uri, handle = %latest.handle(), "stored new remote actor"),
                Err(e) if is_already_exists(&e) => {
                    debug!(uri = %latest.uri, "actor inserted concurrently, using stored row");
                    return db(cancel, self.store.get_actor_by_uri(&latest.uri))
                        .await?
                        .ok_or_else(|| DerefError::internal(e));
                }
                Err(e) => return Err(DerefError::internal(e)),
            }
        } else {
            latest.created_at_ms = if actor.created_at_ms > 0 { actor.created_at_ms } else { now };
            db(cancel, self.store.update_actor(&latest)).await?;
        }

        // Only once stored: reconciling resolves objects whose author is this actor.
        if let Some(featured) = latest.featured_collection_uri.clone() {
            self.reconcile_featured(requester, &transport, &latest, &featured, cancel)
                .await?;
        }
        Ok(latest)
    }

    /// Corrects domain and URI from handle discovery. Fatal only when no URI is known.
    async fn canonicalize_before_fetch(
        &self,
        transport: &dyn Transport,
        mut actor: RemoteActor,
        cancel: &CancellationToken,
    ) -> DerefResult<RemoteActor> {
        let found = cancellable(cancel, async {
            Ok(canonicalize(transport, &actor.username, &actor.domain).await)
        })
        .await?;
        let canonical = match found {
            Ok(c) => c,
            Err(e) if actor.uri.is_empty() => return Err(DerefError::transport(e)),
            Err(e) => {
                warn!(uri = %actor.uri, "handle discovery failed, using known uri: {e:#}");
                return Ok(actor);
            }
        };

        if !canonical.domain.eq_ignore_ascii_case(&actor.domain) {
            debug!(
                handle = %actor.handle(),
                canonical = %canonical.domain,
                "handle points to another domain"
            );
            if let Some(known) = db(
                cancel,
                self.store
                    .get_actor_by_username_domain(&actor.username, &canonical.domain),
            )
            .await?
            {
                if known.id != actor.id {
                    actor = known;
                }
            }
        }

        actor.domain = canonical.domain;
        actor.uri = canonical.uri;
        cancellable(cancel, self.blocklist.check_uri(&actor.uri)).await?;
        cancellable(cancel, self.blocklist.check_host(&actor.domain)).await?;
        Ok(actor)
    }

    /// Asks the host of the fetched id (not the requested host) who owns the handle.
    async fn canonicalize_after_fetch(
        &self,
        transport: &dyn Transport,
        latest: &mut RemoteActor,
        cancel: &CancellationToken,
    ) -> DerefResult<()> {
        let id_host = host_from_url(&latest.uri).unwrap_or_default();
        let found = cancellable(cancel, async {
            Ok(canonicalize(transport, &latest.username, &id_host).await)
        })
        .await?;
        match found {
            Ok(c) if c.uri == latest.uri => {
                cancellable(cancel, self.blocklist.check_host(&c.domain)).await?;
                latest.domain = c.domain;
            }
            Ok(c) => {
                warn!(uri = %latest.uri, claimed = %c.uri, "handle discovery names another actor");
                latest.domain = id_host;
            }
            Err(e) => {
                warn!(uri = %latest.uri, "handle discovery failed: {e:#}");
                latest.domain = id_host;
            }
        }
        Ok(())
    }

    async fn refresh_profile_media(
        &self,
        transport: &Arc<dyn Transport>,
        previous: &RemoteActor,
        latest: &mut RemoteActor,
        kind: ProfileMedia,
        cancel: &CancellationToken,
    ) -> DerefResult<()> {
        let (old_url, old_id) = match kind {
            ProfileMedia::Avatar => (&previous.avatar_remote_url, &previous.avatar_media_attachment_id),
            ProfileMedia::Header => (&previous.header_remote_url, &previous.header_media_attachment_id),
        };
        let new_url = match kind {
            ProfileMedia::Avatar => latest.avatar_remote_url.clone(),
            ProfileMedia::Header => latest.header_remote_url.clone(),
        };

        let (url, id) = match new_url {
            None => (None, None),
            Some(url) if old_url.as_deref() == Some(url.as_str()) && old_id.is_some() => {
                (Some(url), old_id.clone())
            }
            Some(url) => {
                let info = MediaInfo {
                    account_id: latest.id.clone(),
                    remote_url: url.clone(),
                    avatar: matches!(kind, ProfileMedia::Avatar),
                    header: matches!(kind, ProfileMedia::Header),
                    ..Default::default()
                };
                let registry = match kind {
                    ProfileMedia::Avatar => &self.avatars,
                    ProfileMedia::Header => &self.headers,
                };
                match self.fetch_media(registry, transport, info, cancel).await {
                    Ok(MediaAttachment { id, .. }) => (Some(url), Some(id)),
                    Err(DerefError::Cancelled) => return Err(DerefError::Cancelled),
                    Err(e) => {
                        warn!(uri = %latest.uri, %url, "keeping previous profile media: {e:#}");
                        (old_url.clone(), old_id.clone())
                    }
                }
            }
        };

        match kind {
            ProfileMedia::Avatar => {
                latest.avatar_remote_url = url;
                latest.avatar_media_attachment_id = id;
            }
            ProfileMedia::Header => {
                latest.header_remote_url = url;
                latest.header_media_attachment_id = id;
            }
        }
        Ok(())
    }
}
