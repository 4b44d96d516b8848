// SPDX-License-Identifier: MIT OR Apache-2.0
//! The ODIN gateway binary: loads configuration, wires up the
//! [`odin_pipeline::PipelineState`], and serves its Axum router.
//!
//! Everything this binary does beyond "load config, build state, bind a
//! listener" belongs to the router itself — this is deliberately the
//! smallest possible wiring, not a full server framework.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use odin_config::{load_config, validate_config, OdinConfig, StorageBackendKind};
use odin_envelope::EnvelopeVerifier;
use odin_keystore::Keystore;
use odin_reload::{DynamicReloader, FileAssetSource};
use odin_storage::{FileLedger, LocalFsStorage, MemoryLedger, MemoryStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::var("ODIN_CONFIG_PATH").ok();
    let config = load_config(config_path.as_deref().map(Path::new)).context("load config")?;
    for warning in validate_config(&config).context("validate config")? {
        tracing::warn!(%warning, "configuration warning");
    }

    let state = Arc::new(build_state(config).await?);
    let app = odin_pipeline::build_router(state);

    let addr = std::env::var("ODIN_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, "odin gateway listening");
    axum::serve(listener, app).await.context("serve")?;
    Ok(())
}

async fn build_state(config: OdinConfig) -> Result<odin_pipeline::PipelineState> {
    let keystore = match &config.keystore_path {
        Some(path) => Keystore::ensure_file(Path::new(path)).context("load keystore")?,
        None => {
            let mut ks = Keystore::new();
            ks.insert(odin_keystore::Keypair::generate("k1"));
            ks
        }
    };

    let mut reloader = DynamicReloader::new(Duration::from_secs(config.dynamic_ttl_s));
    if let Some(policy_source) = &config.policy_source {
        reloader = reloader.with_policy_source(Arc::new(FileAssetSource::new(policy_source)));
    }
    if let Some(maps_dir) = &config.sft_maps_dir {
        for entry in std::fs::read_dir(maps_dir)
            .with_context(|| format!("read sft_maps_dir {maps_dir}"))?
        {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            reloader
                .register_sft_map(stem.to_string(), Arc::new(FileAssetSource::new(path.clone())))
                .await;
        }
    }

    let (storage, ledger): (Arc<dyn Storage>, Arc<dyn odin_storage::Ledger>) =
        match config.storage_backend {
            StorageBackendKind::Memory => (
                Arc::new(MemoryStorage::new()),
                Arc::new(MemoryLedger::new()),
            ),
            StorageBackendKind::LocalFs | StorageBackendKind::ObjectStore => {
                std::fs::create_dir_all(&config.data_dir).context("create data_dir")?;
                let ledger_path = Path::new(&config.data_dir).join("ledger.jsonl");
                (
                    Arc::new(LocalFsStorage::new(config.data_dir.clone())),
                    Arc::new(FileLedger::open(ledger_path).await.context("open ledger")?),
                )
            }
        };

    let verifier = EnvelopeVerifier::new(Duration::from_secs(5));

    Ok(odin_pipeline::PipelineState::new(
        config, keystore, reloader, storage, ledger, verifier,
    ))
}
