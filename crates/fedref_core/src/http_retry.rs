/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{anyhow, Result};
use rand::{thread_rng, Rng};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Sends the request built by `build`, retrying connection errors, 429 and 5xx with jittered
/// exponential backoff. The last response is returned as-is, whatever its status.
pub async fn send_with_retry<F>(mut build: F, attempts: u32) -> Result<Response>
where
    F: FnMut() -> RequestBuilder,
{
    let max_attempts = attempts.clamp(1, 5);
    let mut backoff = Duration::from_millis(200);
    let mut last_err = None;
    for attempt in 1..=max_attempts {
        let last = attempt == max_attempts;
        match build().send().await {
            Ok(resp) if should_retry_status(resp.status()) && !last => {
                debug!(status = %resp.status(), attempt, url = %resp.url(), "retrying request");
            }
            Ok(resp) => return Ok(resp),
            Err(e) if last => return Err(e.into()),
            Err(e) => {
                debug!(attempt, "request failed, retrying: {e}");
                last_err = Some(e);
            }
        }
        tokio::time::sleep(with_jitter(backoff)).await;
        backoff = backoff.saturating_mul(2).min(MAX_BACKOFF);
    }
    Err(last_err
        .map(Into::into)
        .unwrap_or_else(|| anyhow!("no attempts made")))
}

pub fn should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn with_jitter(base: Duration) -> Duration {
    base + Duration::from_millis(thread_rng().gen_range(0..=200))
}
