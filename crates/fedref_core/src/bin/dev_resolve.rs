/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Context;
use fedref_core::media::LocalMediaPipeline;
use fedref_core::social_db::SocialDb;
use fedref_core::transport::HttpTransportController;
use fedref_core::{ActorLocator, DerefConfig, Dereferencer};
use std::env;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const USAGE: &str = "usage: dev_resolve <config.json> actor <uri|@user@domain> [--force]\n       dev_resolve <config.json> object <uri> [--refetch] [--parent]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (Some(cfg_path), Some(kind), Some(target)) = (args.first(), args.get(1), args.get(2)) else {
        anyhow::bail!(USAGE);
    };
    let flag = |name: &str| args.iter().skip(3).any(|a| a == name);

    let cfg = Arc::new(DerefConfig::load(cfg_path)?);
    let data_dir = cfg.data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("create data dir {}", data_dir.display()))?;
    let db = Arc::new(SocialDb::open(data_dir.join("fedref.sqlite"))?);
    let transports = Arc::new(HttpTransportController::new(cfg.clone())?);
    let media = Arc::new(LocalMediaPipeline::new(data_dir.clone(), db.clone()));
    let deref = Dereferencer::new(cfg, db, transports, media);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    let out = match kind.as_str() {
        "actor" => {
            let locator = ActorLocator::parse(target)
                .with_context(|| format!("not an actor uri or handle: {target}"))?;
            let actor = deref
                .resolve_actor("", &locator, flag("--force"), &cancel)
                .await?;
            serde_json::to_value(&actor)?
        }
        "object" => {
            let (object, raw) = deref
                .resolve_object("", target, flag("--refetch"), flag("--parent"), &cancel)
                .await?;
            serde_json::json!({ "object": object, "document": raw })
        }
        _ => anyhow::bail!(USAGE),
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
