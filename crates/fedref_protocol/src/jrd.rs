/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::{Deserialize, Serialize};

use crate::{ACTIVITY_JSON, LD_JSON_AS};

/// WebFinger JSON Resource Descriptor (RFC 7033).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jrd {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub links: Vec<JrdLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JrdLink {
    #[serde(default)]
    pub rel: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl Jrd {
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// `acct:user@domain` subject split into its parts.
    pub fn subject_acct(&self) -> Option<(String, String)> {
        let acct = self.subject.trim();
        let acct = acct.strip_prefix("acct:").unwrap_or(acct);
        let acct = acct.trim_start_matches('@');
        let (user, domain) = acct.split_once('@')?;
        if user.is_empty() || domain.is_empty() || domain.contains('@') {
            return None;
        }
        Some((user.to_string(), domain.to_ascii_lowercase()))
    }

    /// The `self` link pointing at an ActivityStreams actor document.
    pub fn self_actor_link(&self) -> Option<&str> {
        self.links
            .iter()
            .filter(|l| l.rel == "self")
            .find(|l| {
                let Some(t) = l.media_type.as_deref() else {
                    return false;
                };
                let t = t.trim();
                t == ACTIVITY_JSON || t == LD_JSON_AS || t.starts_with("application/ld+json")
            })
            .and_then(|l| l.href.as_deref())
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mastodon_style_jrd() {
        let body = br#"{
            "subject": "acct:Bob@Remote.Example",
            "aliases": ["https://remote.example/@bob"],
            "links": [
                {"rel": "http://webfinger.net/rel/profile-page", "type": "text/html", "href": "https://remote.example/@bob"},
                {"rel": "self", "type": "application/activity+json", "href": "https://remote.example/users/bob"},
                {"rel": "http://ostatus.org/schema/1.0/subscribe", "template": "https://remote.example/authorize_interaction?uri={uri}"}
            ]
        }"#;
        let jrd = Jrd::parse(body).unwrap();
        assert_eq!(
            jrd.subject_acct(),
            Some(("Bob".to_string(), "remote.example".to_string()))
        );
        assert_eq!(jrd.self_actor_link(), Some("https://remote.example/users/bob"));
    }

    #[test]
    fn ld_json_profile_counts_as_actor_link() {
        let jrd = Jrd {
            subject: "acct:amy@other.example".into(),
            aliases: vec![],
            links: vec![JrdLink {
                rel: "self".into(),
                media_type: Some(LD_JSON_AS.into()),
                href: Some("https://other.example/u/amy".into()),
            }],
        };
        assert_eq!(jrd.self_actor_link(), Some("https://other.example/u/amy"));
    }

    #[test]
    fn missing_self_link_or_bad_subject() {
        let jrd = Jrd {
            subject: "https://remote.example/users/bob".into(),
            ..Default::default()
        };
        assert_eq!(jrd.subject_acct(), None);
        assert_eq!(jrd.self_actor_link(), None);
    }
}
