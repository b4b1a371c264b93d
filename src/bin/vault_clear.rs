//! Wipe every vault record and stored file.
//!
//! Uses `DATA_DIR` and `VAULT_STORE` like the server. Run with `--yes` to
//! skip the confirmation prompt.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use session_vault::config::{Config, StoreBackend};
use session_vault::secrets::SessionStore;
use session_vault::vault::{open_store, FileStore, VaultService};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn confirmed() -> anyhow::Result<bool> {
    if std::env::args().skip(1).any(|a| a == "--yes" || a == "-y") {
        return Ok(true);
    }
    print!("Delete ALL vault records and files? Type 'yes' to continue: ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "session_vault=info,vault_clear=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (data_dir, backend) = Config::storage_from_env()?;
    if backend == StoreBackend::Memory {
        warn!("VAULT_STORE=memory holds nothing between runs; only stored files will be removed");
    }
    if !confirmed()? {
        info!("Aborted");
        return Ok(());
    }

    info!("Clearing vault data in {}", data_dir.display());
    let store = open_store(backend, &data_dir)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open vault store: {}", e))?;
    // Signing and session settings are irrelevant for a wipe.
    let mut base = Config::new(data_dir);
    base.store_backend = backend;
    let files = Arc::new(FileStore::new(
        base.files_dir(),
        &base.url_signing_secret,
        base.max_upload_bytes,
    ));
    let sessions = Arc::new(SessionStore::new(Duration::from_secs(1)));
    let vault = VaultService::new(store, files, sessions, base.signed_url_ttl);

    let report = vault.clear_all().await?;
    info!(
        "Cleared {} vault_items, {} password_items and {} stored files",
        report.documents, report.passwords, report.files
    );
    Ok(())
}
