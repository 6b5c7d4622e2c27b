/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! draft-cavage HTTP signatures for outgoing GETs.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use http::{header::HeaderName, HeaderMap, HeaderValue, Method, Uri};
use rsa::{
    pkcs1v15::SigningKey,
    pkcs8::DecodePrivateKey,
    signature::{RandomizedSigner, SignatureEncoding},
    RsaPrivateKey,
};
use sha2::Sha256;

use crate::config::RequesterKey;

pub const SIGNED_GET_HEADERS: &[&str] = &["(request-target)", "host", "date"];

pub fn build_signing_string(method: &Method, uri: &Uri, headers: &HeaderMap, signed_headers: &[&str]) -> Result<String> {
    let mut lines = Vec::with_capacity(signed_headers.len());
    for name in signed_headers {
        let name = name.to_ascii_lowercase();
        if name == "(request-target)" {
            let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
            lines.push(format!(
                "(request-target): {} {target}",
                method.as_str().to_ascii_lowercase()
            ));
            continue;
        }
        let header = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("bad signed header name: {name}"))?;
        let value = headers
            .get(&header)
            .ok_or_else(|| anyhow!("missing signed header: {name}"))?
            .to_str()
            .with_context(|| format!("invalid header value for {name}"))?;
        lines.push(format!("{name}: {}", value.trim()));
    }
    Ok(lines.join("\n"))
}

/// Adds `Host`/`Date` when absent and a `Signature` header over `SIGNED_GET_HEADERS`.
pub fn sign_get(key: &RequesterKey, uri: &Uri, headers: &mut HeaderMap) -> Result<()> {
    if !headers.contains_key(http::header::DATE) {
        let date = httpdate::fmt_http_date(std::time::SystemTime::now());
        headers.insert(http::header::DATE, HeaderValue::from_str(&date).context("set Date")?);
    }
    if !headers.contains_key(http::header::HOST) {
        let auth = uri
            .authority()
            .ok_or_else(|| anyhow!("cannot sign request without host: {uri}"))?;
        headers.insert(
            http::header::HOST,
            HeaderValue::from_str(auth.as_str()).context("set Host")?,
        );
    }

    let signing_string = build_signing_string(&Method::GET, uri, headers, SIGNED_GET_HEADERS)?;
    let private_key = RsaPrivateKey::from_pkcs8_pem(&key.private_key_pem)
        .context("parse private key pem")?;
    let signing_key = SigningKey::<Sha256>::new(private_key);
    let signature = signing_key.sign_with_rng(&mut rand::rngs::OsRng, signing_string.as_bytes());

    let value = format!(
        "keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{}\",signature=\"{}\"",
        key.key_id,
        SIGNED_GET_HEADERS.join(" "),
        B64.encode(signature.to_bytes())
    );
    headers.insert(
        HeaderName::from_static("signature"),
        HeaderValue::from_str(&value).context("set Signature")?,
    );
    Ok(())
}
