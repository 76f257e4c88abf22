use anyhow::{ensure, Result};
use clap::{Parser, Subcommand};
use pashusewa_core::{telemetry, FileSessionStore, Navigator, Route, SessionController};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::runtime::Runtime;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "xtask", version, about = "Automation helpers for PashuSewa")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in, restart, and log out against a throwaway session store.
    Smoke,
}

fn main() -> Result<()> {
    telemetry::init_tracing(telemetry::env_filter("info"))?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Smoke => smoke_test(),
    }
}

fn smoke_test() -> Result<()> {
    let runtime = Runtime::new()?;
    let temp_dir = TempDir::new()?;

    runtime.block_on(async {
        let store = Arc::new(FileSessionStore::in_dir(temp_dir.path()));
        let controller = SessionController::new(store.clone());
        controller.ready().await;
        let mut navigator = Navigator::start(&controller.current());
        ensure!(navigator.current() == &Route::Login, "expected login screen");

        controller.login("smoke-token", "smoke-user", false).await;
        navigator.on_session_change(&controller.current());
        ensure!(navigator.current() == &Route::Homepage, "expected homepage");
        drop(controller);

        let controller = SessionController::new(store.clone());
        controller.ready().await;
        let restored = controller.current();
        ensure!(restored.is_authenticated, "session was not restored");
        info!(user_id = ?restored.user_id, "session restored after restart");

        controller.logout().await;
        navigator.on_session_change(&controller.current());
        ensure!(navigator.current() == &Route::Login, "expected login after logout");
        ensure!(store.load().await?.is_empty(), "store not cleared");
        info!("smoke test passed");
        Ok::<(), anyhow::Error>(())
    })
}
