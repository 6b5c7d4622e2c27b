/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use fedref_protocol::{ActorDocument, ActorKind, EmojiTag, ObjectDocument};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::ids::host_from_url;
use crate::model::{Emoji, MediaAttachment, Mention, RemoteActor, RemoteObject};

/// Builds the local actor model; `id`, timestamps and media ids are left to the caller.
pub fn actor_from_document(doc: &ActorDocument) -> RemoteActor {
    RemoteActor {
        uri: doc.id.clone(),
        url: doc.url.clone(),
        username: doc.preferred_username.clone(),
        domain: host_from_url(&doc.id).unwrap_or_default(),
        display_name: doc.name.clone(),
        note: doc.summary.clone(),
        actor_type: Some(doc.kind),
        inbox_uri: doc.inbox.clone(),
        outbox_uri: doc.outbox.clone(),
        shared_inbox_uri: doc.shared_inbox.clone(),
        followers_uri: doc.followers.clone(),
        following_uri: doc.following.clone(),
        featured_collection_uri: doc.featured.clone(),
        public_key_uri: doc.public_key_id.clone(),
        public_key_pem: doc.public_key_pem.clone(),
        avatar_remote_url: doc.icon_url.clone(),
        header_remote_url: doc.image_url.clone(),
        emojis: doc.emojis.iter().map(emoji_placeholder).collect(),
        locked: doc.manually_approves_followers,
        bot: matches!(doc.kind, ActorKind::Service | ActorKind::Application),
        discoverable: doc.discoverable.unwrap_or(false),
        also_known_as: doc.also_known_as.clone(),
        ..Default::default()
    }
}

/// Builds the local object model with placeholder attachments, mentions and emojis.
pub fn object_from_document(doc: &ObjectDocument, author: &RemoteActor, now_ms: i64) -> RemoteObject {
    let created_at_ms = doc.published.as_deref().and_then(parse_timestamp_ms).unwrap_or(now_ms);
    let updated_at_ms = doc
        .updated
        .as_deref()
        .and_then(parse_timestamp_ms)
        .unwrap_or(created_at_ms);

    let attachments = doc
        .attachments
        .iter()
        .map(|a| MediaAttachment {
            remote_url: a.url.clone(),
            account_id: author.id.clone(),
            content_type: a.media_type.clone(),
            description: a.name.clone(),
            blurhash: a.blurhash.clone(),
            width: a.width,
            height: a.height,
            ..Default::default()
        })
        .collect();

    let mentions = doc
        .mentions
        .iter()
        .map(|m| Mention {
            origin_account_id: author.id.clone(),
            origin_account_uri: author.uri.clone(),
            target_account_uri: m.href.clone(),
            name_string: m.name.clone(),
            ..Default::default()
        })
        .collect();

    RemoteObject {
        uri: doc.id.clone(),
        url: doc.url.clone(),
        account_id: author.id.clone(),
        account_uri: author.uri.clone(),
        object_type: Some(doc.kind),
        content: doc.content.clone(),
        summary: doc.summary.clone(),
        sensitive: doc.sensitive,
        created_at_ms,
        updated_at_ms,
        in_reply_to_uri: doc.in_reply_to.clone(),
        attachments,
        mentions,
        emojis: doc.emojis.iter().map(emoji_placeholder).collect(),
        ..Default::default()
    }
}

pub fn emoji_placeholder(tag: &EmojiTag) -> Emoji {
    Emoji {
        uri: tag.id.clone(),
        shortcode: tag.shortcode.clone(),
        domain: host_from_url(&tag.id).unwrap_or_default(),
        image_remote_url: tag.icon_url.clone(),
        image_updated_at: tag.updated.clone(),
        ..Default::default()
    }
}

pub fn parse_timestamp_ms(s: &str) -> Option<i64> {
    let t = OffsetDateTime::parse(s.trim(), &Rfc3339).ok()?;
    Some((t.unix_timestamp_nanos() / 1_000_000) as i64)
}
