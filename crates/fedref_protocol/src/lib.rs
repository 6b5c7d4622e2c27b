/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod jrd;
pub mod vocab;

pub use jrd::{Jrd, JrdLink};
pub use vocab::{
    decode, resolve, ActorDocument, ActorKind, AttachmentRef, CollectionDocument, CollectionItem,
    CollectionKind, DecodeError, EmojiTag, MentionTag, ObjectDocument, ObjectKind, ResolveError,
    Vocab,
};

pub const ACTIVITY_JSON: &str = "application/activity+json";
pub const LD_JSON_AS: &str =
    "application/ld+json; profile=\"https://www.w3.org/ns/activitystreams\"";
pub const AS_PUBLIC: &str = "https://www.w3.org/ns/activitystreams#Public";
