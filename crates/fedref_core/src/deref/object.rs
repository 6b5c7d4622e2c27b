/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use fedref_protocol::Vocab;
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{cancellable, db, Dereferencer};
use crate::convert::object_from_document;
use crate::error::{DerefError, DerefResult};
use crate::ids::{host_from_url, new_id_from_time, now_ms};
use crate::model::{ActorLocator, RemoteObject};
use crate::store::is_already_exists;

impl Dereferencer {
    /// Returns the stored object, fetching and storing it first when unknown.
    ///
    /// With `refetch` set, a known object is fetched again and returned alongside the fresh
    /// document, but storage is left untouched. The document is `None` whenever no fetch
    /// happened.
    pub async fn resolve_object(
        &self,
        requester: &str,
        uri: &str,
        refetch: bool,
        include_parent: bool,
        cancel: &CancellationToken,
    ) -> DerefResult<(RemoteObject, Option<Value>)> {
        self.resolve_object_boxed(requester, uri.to_string(), refetch, include_parent, cancel)
            .await
    }

    pub(super) fn resolve_object_boxed<'a>(
        &'a self,
        requester: &'a str,
        uri: String,
        refetch: bool,
        include_parent: bool,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, DerefResult<(RemoteObject, Option<Value>)>> {
        async move {
            let mut existing = db(cancel, self.store.get_object_by_uri(&uri)).await?;
            if existing.is_none() {
                existing = db(cancel, self.store.get_object_by_url(&uri)).await?;
            }
            if let Some(found) = &existing {
                if !refetch {
                    return Ok((found.clone(), None));
                }
            }

            let host = host_from_url(&uri)
                .ok_or_else(|| DerefError::NotRetrievable(format!("no host in {uri}")))?;
            if self.cfg.is_local_host(&host) {
                return existing
                    .map(|o| (o, None))
                    .ok_or_else(|| DerefError::NotRetrievable(format!("local object {uri} not found")));
            }
            cancellable(cancel, self.blocklist.check_host(&host)).await?;

            let transport = self.transport(requester).await?;
            let (raw, vocab) = self.fetch_vocab(&*transport, &uri, cancel).await?;
            let doc = match vocab {
                Vocab::Object(doc) => doc,
                other => {
                    return Err(DerefError::WrongType {
                        expected: "object",
                        got: other.type_name().to_string(),
                    })
                }
            };

            if let Some(found) = existing {
                return Ok((found, Some(raw)));
            }

            if doc.id != uri {
                let id_host = cancellable(cancel, self.blocklist.check_uri(&doc.id)).await?;
                if self.cfg.is_local_host(&id_host) {
                    return Err(DerefError::NotRetrievable(format!(
                        "{uri} claims local id {}",
                        doc.id
                    )));
                }
                if let Some(found) = db(cancel, self.store.get_object_by_uri(&doc.id)).await? {
                    return Ok((found, Some(raw)));
                }
            }

            let author = self
                .resolve_actor_boxed(
                    requester,
                    ActorLocator::Uri(doc.attributed_to.clone()),
                    false,
                    cancel,
                )
                .await?;

            let now = now_ms();
            let mut object = object_from_document(&doc, &author, now);
            object.id = new_id_from_time(object.created_at_ms);
            object.fetched_at_ms = now;
            self.populate_object(requester, &transport, &mut object, include_parent, cancel)
                .await?;

            let put = cancellable(cancel, async { Ok(self.store.put_object(&object).await) }).await?;
            match put {
                Ok(()) => {
                    debug!(uri = %object.uri, id = %object.id, "stored remote object");
                    Ok((object, Some(raw)))
                }
                Err(e) if is_already_exists(&e) => {
                    debug!(uri = %object.uri, "object inserted concurrently, using stored row");
                    let winner = db(cancel, self.store.get_object_by_uri(&object.uri))
                        .await?
                        .ok_or_else(|| DerefError::internal(e))?;
                    Ok((winner, Some(raw)))
                }
                Err(e) => Err(DerefError::internal(e)),
            }
        }
        .boxed()
    }
}
