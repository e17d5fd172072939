use anyhow::Context;
use clap::{Parser, Subcommand};
use statekeeper_cgi::{handle, CgiRequest};
use statekeeper_core::SessionConfig;
use statekeeper_session::{FileSessionStore, SessionStore};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `debug` or `statekeeper_session=trace`
const LOG_ENV: &str = "STATEKEEPER_LOG";

#[derive(Parser, Debug, Default)]
#[command(
    name = "statekeeper",
    about = "File-backed session demo. Without a subcommand, serves one CGI request."
)]
struct Args {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stored sessions
    List,
    /// Delete expired sessions
    Sweep,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the CGI response.
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        // Servers may pass an ISINDEX-style query as argv; it is not meant for us.
        Err(e) if std::env::var_os("GATEWAY_INTERFACE").is_some() => {
            debug!(error = %e, "Ignoring command line under CGI");
            Args::default()
        }
        Err(e) => e.exit(),
    };

    let config = SessionConfig::resolve(args.config.as_deref()).context("Configuration error")?;
    debug!(?config, "Resolved configuration");
    let store = FileSessionStore::from_config(&config);

    match args.command {
        None => serve(&store, &config).await,
        Some(Command::List) => list(&store).await,
        Some(Command::Sweep) => sweep(&store).await,
    }
}

async fn serve(store: &FileSessionStore, config: &SessionConfig) -> anyhow::Result<()> {
    let mut request = CgiRequest::from_env();
    if let Err(e) = request.read_body(tokio::io::stdin()).await {
        warn!(error = %e, "Failed to read request body, continuing without it");
    }

    let response = match handle(&request, store, config).await {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "Cannot serve request");
            return Err(e).context("Failed to handle request");
        }
    };

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(response.to_cgi_string().as_bytes())
        .await
        .context("Failed to write response")?;
    stdout.flush().await.context("Failed to flush response")?;
    Ok(())
}

async fn list(store: &FileSessionStore) -> anyhow::Result<()> {
    let sessions = store
        .list()
        .await
        .with_context(|| format!("Failed to list {}", store.dir().display()))?;

    for session in &sessions {
        let keys = session
            .keys
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "{}  {}  age={}s  keys={}{}",
            session.id,
            session.modified.to_rfc3339(),
            session.age.as_secs(),
            keys,
            if session.expired { "  expired" } else { "" }
        );
    }

    info!("{} sessions in {}", sessions.len(), store.dir().display());
    Ok(())
}

async fn sweep(store: &FileSessionStore) -> anyhow::Result<()> {
    let removed = store
        .cleanup_expired()
        .await
        .with_context(|| format!("Failed to sweep {}", store.dir().display()))?;
    println!("Removed {removed} expired sessions");
    Ok(())
}
