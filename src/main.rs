use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use clap::Parser;

mod app;
mod auth;
mod cli;
mod config;
mod eid;
mod pins;
mod records;
mod search;
mod services;
mod snapshot;
mod storage;
#[cfg(test)]
mod tests;

use app::{AppError, SyncEngine, SyncOptions, Vault};
use auth::LocalAuth;
use cli::Command;
use config::Config;
use eid::Eid;
use services::{AuthService, CaptioningClient, LocalBlobStore, LocalStore, Session};
use storage::BackendLocal;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = cli::Args::parse();
    let base_path = config::base_path();
    let config = Config::load_with(&base_path);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(run(args, config))
}

async fn run(args: cli::Args, config: Config) -> anyhow::Result<()> {
    let storage = BackendLocal::new(config.base_path())?;
    let auth = LocalAuth::new(storage.clone());

    match args.command {
        Command::Login { principal, token } => {
            auth.login(&principal, &token)?;
            println!("signed in as {principal}");
            Ok(())
        }

        Command::Logout => {
            auth.logout()?;
            println!("signed out");
            Ok(())
        }

        command => {
            let session = auth.session().await?.ok_or(AppError::NotSignedIn)?;
            let vault = build_vault(&config, &session, storage)?;
            dispatch(command, vault, &config).await
        }
    }
}

fn build_vault(config: &Config, session: &Session, storage: BackendLocal) -> anyhow::Result<Vault> {
    let base = PathBuf::from(config.base_path());

    let store = Arc::new(LocalStore::load(&base)?);
    let blobs = Arc::new(LocalBlobStore::new(&base.join("blobs"))?);

    let token = if config.captioning.token.is_empty() {
        &session.token
    } else {
        &config.captioning.token
    };
    let captioner = Arc::new(CaptioningClient::new(&config.captioning.base_url, token));

    Ok(Vault::new(
        &session.principal_id,
        store,
        blobs,
        captioner,
        Arc::new(storage),
        Duration::from_millis(config.semantic_debounce_ms),
    ))
}

async fn dispatch(command: Command, vault: Vault, config: &Config) -> anyhow::Result<()> {
    match command {
        Command::Login { .. } | Command::Logout => unreachable!(),

        Command::Add { file } => {
            let bytes = std::fs::read(&file)?;
            let filename = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload.bin")
                .to_string();

            let mut record = vault.add_photo(bytes, &filename).await?;
            record.embedding = None; // hundreds of floats, useless in terminal output
            println!("{}", serde_json::to_string_pretty(&record).unwrap());
            Ok(())
        }

        Command::Note { body } => {
            let record = vault.add_note(&body).await?;
            println!("{}", serde_json::to_string_pretty(&record).unwrap());
            Ok(())
        }

        Command::Search { query, no_semantic } => {
            vault.bootstrap().await?;
            let mut results = vault.search(&query, !no_semantic).await;
            for record in &mut results {
                record.embedding = None;
            }
            println!("{}", serde_json::to_string_pretty(&results).unwrap());
            Ok(())
        }

        Command::Delete { id, yes } => {
            if !yes {
                match inquire::prompt_confirmation(format!("Delete record {id}?")) {
                    Ok(true) => {}
                    Ok(false) => return Ok(()),
                    Err(err) => bail!("An error occurred: {}", err),
                }
            }

            vault.delete(&Eid::from(id.as_str())).await?;
            println!("deleted {id}");
            Ok(())
        }

        Command::Pin { id } => {
            vault.bootstrap().await?;
            if vault.pin(&Eid::from(id.as_str()))? {
                println!("pinned {id}");
            } else {
                println!("{id} was already pinned");
            }
            Ok(())
        }

        Command::Unpin { id } => {
            if vault.unpin(&Eid::from(id.as_str()))? {
                println!("unpinned {id}");
            } else {
                println!("{id} was not pinned");
            }
            Ok(())
        }

        Command::Reembed { id } => {
            vault.reembed(&Eid::from(id.as_str())).await?;
            println!("embedding updated for {id}");
            Ok(())
        }

        Command::Sync => run_sync(vault, config).await,
    }
}

async fn run_sync(vault: Vault, config: &Config) -> anyhow::Result<()> {
    // the CLI daemon is always "visible"; the flag exists for embedding
    // contexts that background themselves
    let (_foreground_tx, foreground_rx) = tokio::sync::watch::channel(true);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let opts = SyncOptions {
        new_records_interval: Duration::from_secs(config.new_records_poll_secs),
        enrichment_interval: Duration::from_secs(config.enrichment_poll_secs),
    };

    let engine = SyncEngine::new(
        vault.owner(),
        vault.record_store(),
        vault.snapshot(),
        foreground_rx,
        shutdown_rx,
        opts,
    );
    let handle = tokio::spawn(engine.run());

    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("shutting down");
    vault.cancel_pending_search();
    let _ = shutdown_tx.send(true);
    handle.await??;

    Ok(())
}
