/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{anyhow, Context, Result};
use fedref_protocol::Jrd;

use crate::ids::host_from_url;
use crate::transport::Transport;

/// What a server asserts about `user@domain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonical {
    pub domain: String,
    pub uri: String,
}

pub fn parse_canonical(body: &[u8]) -> Result<Canonical> {
    let jrd = Jrd::parse(body).context("decode jrd")?;
    let (_, domain) = jrd
        .subject_acct()
        .ok_or_else(|| anyhow!("jrd subject is not an acct: {:?}", jrd.subject))?;
    let uri = jrd
        .self_actor_link()
        .ok_or_else(|| anyhow!("jrd for {} has no activitypub self link", jrd.subject))?;
    if host_from_url(uri).is_none() {
        return Err(anyhow!("jrd self link is not a url: {uri}"));
    }
    Ok(Canonical {
        domain,
        uri: uri.to_string(),
    })
}

pub async fn canonicalize(transport: &dyn Transport, username: &str, domain: &str) -> Result<Canonical> {
    let body = transport
        .finger(username, domain)
        .await
        .with_context(|| format!("webfinger {username}@{domain}"))?;
    parse_canonical(&body).with_context(|| format!("webfinger {username}@{domain}"))
}
