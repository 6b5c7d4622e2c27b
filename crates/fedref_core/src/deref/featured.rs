/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use fedref_protocol::{CollectionKind, Vocab};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{db, Dereferencer};
use crate::error::{DerefError, DerefResult};
use crate::ids::{host_from_url, now_ms};
use crate::model::RemoteActor;
use crate::transport::Transport;

impl Dereferencer {
    /// Syncs the actor's pinned objects with its featured collection.
    ///
    /// Unreadable collections and unresolvable items are skipped; a failed unpin is an error.
    pub(super) async fn reconcile_featured(
        &self,
        requester: &str,
        transport: &Arc<dyn Transport>,
        account: &RemoteActor,
        collection_uri: &str,
        cancel: &CancellationToken,
    ) -> DerefResult<()> {
        let vocab = match self.fetch_vocab(&**transport, collection_uri, cancel).await {
            Ok((_, v)) => v,
            Err(DerefError::Cancelled) => return Err(DerefError::Cancelled),
            Err(e) => {
                warn!(account = %account.uri, collection = %collection_uri, "featured collection unavailable: {e:#}");
                return Ok(());
            }
        };
        let collection = match vocab {
            Vocab::Collection(c) if c.kind == CollectionKind::OrderedCollection => c,
            other => {
                let e = DerefError::WrongType {
                    expected: "OrderedCollection",
                    got: other.type_name().to_string(),
                };
                warn!(account = %account.uri, collection = %collection_uri, "{e}");
                return Ok(());
            }
        };

        // Entries on other hosts could pin somebody else's posts.
        let collection_host = host_from_url(collection_uri);
        let listed: Vec<String> = collection
            .items
            .iter()
            .map(|item| item.id().to_string())
            .filter(|id| host_from_url(id).is_some() && host_from_url(id) == collection_host)
            .collect();
        let mut listed_uris: HashSet<String> = listed.iter().cloned().collect();

        let was_pinned = db(cancel, self.store.pinned_objects(&account.id)).await?;

        let now = now_ms();
        for uri in &listed {
            let object = match self
                .resolve_object_boxed(requester, uri.clone(), false, false, cancel)
                .await
            {
                Ok((o, _)) => o,
                Err(DerefError::Cancelled) => return Err(DerefError::Cancelled),
                Err(e) => {
                    warn!(account = %account.uri, %uri, retryable = e.is_retryable_later(), "skipping featured item: {e:#}");
                    continue;
                }
            };
            listed_uris.insert(object.uri.clone());

            if object.pinned_at_ms > 0 {
                continue;
            }
            if object.account_id != account.id {
                debug!(account = %account.uri, %uri, "featured item belongs to another account");
                continue;
            }
            if object.is_boost() {
                continue;
            }
            match db(cancel, self.store.set_object_pinned_at(&object.id, now)).await {
                Ok(()) => {}
                Err(DerefError::Cancelled) => return Err(DerefError::Cancelled),
                Err(e) => warn!(account = %account.uri, %uri, "could not pin: {e:#}"),
            }
        }

        for old in was_pinned {
            if listed_uris.contains(&old.uri) {
                continue;
            }
            db(cancel, self.store.set_object_pinned_at(&old.id, 0)).await?;
            debug!(account = %account.uri, uri = %old.uri, "unpinned");
        }
        Ok(())
    }
}
