/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::sync::Arc;

use fedref_protocol::{DecodeError, ResolveError};

pub type DerefResult<T> = Result<T, DerefError>;

/// Terminal outcome of a resolution.
///
/// Cloneable so that a single in-flight media result can be handed to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DerefError {
    /// Local identity, or known to be absent: never goes to the network.
    #[error("not retrievable: {0}")]
    NotRetrievable(String),
    #[error("domain is blocked: {0}")]
    Blocked(String),
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    #[error("wrong type: expected {expected}, got {got}")]
    WrongType { expected: &'static str, got: String },
    #[error("transport: {0:#}")]
    Transport(Arc<anyhow::Error>),
    #[error("internal: {0:#}")]
    Internal(Arc<anyhow::Error>),
    #[error("cancelled")]
    Cancelled,
}

impl DerefError {
    pub fn internal(e: impl Into<anyhow::Error>) -> Self {
        Self::Internal(Arc::new(e.into()))
    }

    pub fn transport(e: impl Into<anyhow::Error>) -> Self {
        Self::Transport(Arc::new(e.into()))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Failures that a later enrichment pass may get past.
    pub fn is_retryable_later(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Internal(_))
    }
}

impl From<ResolveError> for DerefError {
    fn from(e: ResolveError) -> Self {
        Self::UnsupportedType(e.to_string())
    }
}

impl From<DecodeError> for DerefError {
    fn from(e: DecodeError) -> Self {
        Self::UnsupportedType(format!("undecodable document: {e}"))
    }
}
