/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod blocklist;
pub mod config;
pub mod convert;
pub mod deref;
pub mod error;
pub mod handshake;
pub mod http_retry;
pub mod http_sig;
pub mod ids;
pub mod inflight;
pub mod media;
pub mod model;
pub mod social_db;
pub mod store;
pub mod transport;
pub mod webfinger;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::DerefConfig;
pub use deref::Dereferencer;
pub use error::{DerefError, DerefResult};
pub use model::{ActorLocator, Emoji, MediaAttachment, Mention, RemoteActor, RemoteObject};
pub use store::Store;
