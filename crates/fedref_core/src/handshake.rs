/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Pairs = HashMap<(String, String), usize>;

/// Actor URIs currently being dereferenced, per requester.
#[derive(Clone, Default)]
pub struct Handshakes {
    pairs: Arc<Mutex<Pairs>>,
}

impl Handshakes {
    pub fn begin(&self, requester: &str, uri: &str) -> HandshakeGuard {
        let key = (requester.to_string(), uri.to_string());
        *self.lock().entry(key.clone()).or_insert(0) += 1;
        HandshakeGuard {
            pairs: self.pairs.clone(),
            key,
        }
    }

    pub fn is_handshaking(&self, requester: &str, uri: &str) -> bool {
        self.lock()
            .contains_key(&(requester.to_string(), uri.to_string()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Pairs> {
        self.pairs.lock().unwrap_or_else(|p| p.into_inner())
    }
}

pub struct HandshakeGuard {
    pairs: Arc<Mutex<Pairs>>,
    key: (String, String),
}

impl Drop for HandshakeGuard {
    fn drop(&mut self) {
        let mut pairs = self.pairs.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(n) = pairs.get_mut(&self.key) {
            *n -= 1;
            if *n == 0 {
                pairs.remove(&self.key);
            }
        }
    }
}
