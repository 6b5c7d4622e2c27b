/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use http::Uri;
use rand::{rngs::OsRng, RngCore};

pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

pub fn new_id() -> String {
    new_id_from_time(now_ms())
}

/// Sortable id: 12 hex digits of milliseconds followed by 7 random bytes.
pub fn new_id_from_time(ms: i64) -> String {
    let ms = (ms.max(0) as u64) & 0xffff_ffff_ffff;
    let mut b = [0u8; 7];
    OsRng.fill_bytes(&mut b);
    format!("{ms:012x}{}", hex::encode(b))
}

pub fn host_from_url(url: &str) -> Option<String> {
    let uri: Uri = url.trim().parse().ok()?;
    uri.host().map(|h| h.to_ascii_lowercase())
}
