/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::{header::ACCEPT, HeaderMap, HeaderValue, Uri};
use std::sync::Arc;

use crate::config::{DerefConfig, RequesterKey};
use crate::http_retry::send_with_retry;
use crate::http_sig::sign_get;

pub const AS_ACCEPT: &str =
    "application/activity+json, application/ld+json; profile=\"https://www.w3.org/ns/activitystreams\"";
const JRD_ACCEPT: &str = "application/jrd+json, application/json";

/// Non-2xx answer from a remote server.
#[derive(Debug, thiserror::Error)]
#[error("GET {url}: http {status}")]
pub struct HttpStatusError {
    pub url: String,
    pub status: u16,
}

/// Authenticated GETs on behalf of one local requester.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn dereference(&self, uri: &str) -> Result<Bytes>;
    async fn dereference_media(&self, uri: &str) -> Result<Bytes>;
    /// Handle discovery request for `acct:{username}@{domain}`; returns the raw JRD.
    async fn finger(&self, username: &str, domain: &str) -> Result<Bytes>;
}

#[async_trait]
pub trait TransportController: Send + Sync {
    async fn transport_for(&self, requester: &str) -> Result<Arc<dyn Transport>>;
}

pub fn webfinger_url(username: &str, domain: &str) -> String {
    let resource = format!("acct:{username}@{domain}");
    format!(
        "https://{domain}/.well-known/webfinger?resource={}",
        urlencoding::encode(&resource)
    )
}

pub struct HttpTransportController {
    http: reqwest::Client,
    cfg: Arc<DerefConfig>,
}

impl HttpTransportController {
    pub fn new(cfg: Arc<DerefConfig>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.http_timeout())
            .user_agent(cfg.user_agent())
            .build()
            .context("build http client")?;
        Ok(Self { http, cfg })
    }
}

#[async_trait]
impl TransportController for HttpTransportController {
    async fn transport_for(&self, requester: &str) -> Result<Arc<dyn Transport>> {
        let key = if requester.is_empty() {
            None
        } else {
            let key = self
                .cfg
                .requesters
                .get(requester)
                .with_context(|| format!("no signing key configured for requester {requester}"))?;
            Some(key.clone())
        };
        Ok(Arc::new(HttpTransport {
            http: self.http.clone(),
            key,
            attempts: self.cfg.retry_attempts(),
        }))
    }
}

pub struct HttpTransport {
    http: reqwest::Client,
    key: Option<RequesterKey>,
    attempts: u32,
}

impl HttpTransport {
    async fn get(&self, url: &str, accept: &'static str) -> Result<Bytes> {
        let uri: Uri = url.parse().with_context(|| format!("bad url: {url}"))?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        if let Some(key) = &self.key {
            sign_get(key, &uri, &mut headers).with_context(|| format!("sign GET {url}"))?;
        }

        let resp = send_with_retry(|| self.http.get(url).headers(headers.clone()), self.attempts)
            .await
            .with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(HttpStatusError {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }
        resp.bytes().await.with_context(|| format!("read body of {url}"))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn dereference(&self, uri: &str) -> Result<Bytes> {
        self.get(uri, AS_ACCEPT).await
    }

    async fn dereference_media(&self, uri: &str) -> Result<Bytes> {
        self.get(uri, "*/*").await
    }

    async fn finger(&self, username: &str, domain: &str) -> Result<Bytes> {
        self.get(&webfinger_url(username, domain), JRD_ACCEPT).await
    }
}
