//! Session CLI
//!
//! Command-line client for an authenticated API:
//! 1. Signs in or up against the credential-issuing service
//! 2. Persists the session token in a local directory
//! 3. Sends API requests through the authenticated pipeline, which refreshes
//!    an expired session and retries transparently
//! 4. Signs out, revoking the session

mod cli;
mod config;
mod error;
mod metrics;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use session_auth::{AuthApi, FileStorage, SignInCredentials, SignUpCredentials, TokenStore};
use session_pipeline::{AuthenticatedClient, spawn_refresh_task};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::{ApiRequest, ReqwestTransport, Transport};

use crate::cli::{Cli, Command};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs to stderr with LOG_LEVEL / RUST_LOG support; stdout is for output
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Cli::parse();
    let prometheus = metrics::install_recorder().context("failed to install metrics recorder")?;

    let config_path = Config::resolve_path(args.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let storage_dir = config.storage_dir()?;

    info!(
        auth_url = %config.auth.url,
        api_url = %config.api.url,
        storage_dir = %storage_dir.display(),
        proactive_refresh = config.refresh.proactive,
        "configuration loaded"
    );

    let client = build_client(&config, storage_dir)?;

    let refresher = (config.refresh.proactive && args.command.uses_session()).then(|| {
        spawn_refresh_task(
            Arc::clone(client.coordinator()),
            config.refresh.interval(),
            config.refresh.threshold(),
        )
    });

    let result = run(&client, args.command).await;

    if let Some(handle) = refresher {
        handle.abort();
    }
    if args.metrics {
        eprint!("{}", prometheus.render());
    }
    result
}

/// Wire the transports, token store, credential issuer and pipeline.
fn build_client(config: &Config, storage_dir: std::path::PathBuf) -> Result<AuthenticatedClient> {
    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    let auth_transport = ReqwestTransport::new(http.clone(), config.auth.url.as_str())
        .with_timeout(config.api_timeout());
    let api_transport =
        ReqwestTransport::new(http, config.api.url.as_str()).with_timeout(config.api_timeout());

    let store = TokenStore::new(Arc::new(FileStorage::new(storage_dir)));
    let issuer = Arc::new(AuthApi::new(Arc::new(auth_transport)));

    Ok(AuthenticatedClient::new(
        Arc::new(api_transport),
        store,
        issuer,
    ))
}

/// Run one command, then let any background revocation finish before exit.
async fn run(client: &AuthenticatedClient, command: Command) -> Result<()> {
    let result = dispatch(client, command).await;
    client.finish_revocations().await;
    result
}

async fn dispatch(client: &AuthenticatedClient, command: Command) -> Result<()> {
    match command {
        Command::SignIn {
            identifier,
            password,
        } => {
            let identifier = identifier
                .into_identifier()
                .ok_or(error::Error::MissingIdentifier)?;
            let password =
                config::resolve_password(password.as_deref()).ok_or(error::Error::MissingPassword)?;
            let credentials = SignInCredentials {
                identifier,
                password,
            };
            let user = client.sign_in(&credentials).await.context("sign-in failed")?;
            match user {
                Some(user) => println!("signed in as {}", user.id),
                None => println!("signed in"),
            }
        }
        Command::SignUp { email, password } => {
            let password =
                config::resolve_password(password.as_deref()).ok_or(error::Error::MissingPassword)?;
            let credentials = SignUpCredentials { email, password };
            let user = client.sign_up(&credentials).await.context("sign-up failed")?;
            match user {
                Some(user) => println!("signed up as {}", user.id),
                None => println!("signed up"),
            }
        }
        Command::SignOut => {
            if !client.is_authenticated() {
                warn!("no stored session");
            }
            client.sign_out().await;
            println!("signed out");
        }
        Command::Status => match client.session() {
            Some(token) if token.is_expired() => {
                println!("session: present (access credential expired, refreshes on next request)");
            }
            Some(token) => {
                println!(
                    "session: present ({}, expires in {}s)",
                    session_auth::token::capitalize(&token.token_type),
                    token.secs_until_expiry()
                );
            }
            None => println!("session: none"),
        },
        Command::Refresh => {
            let token = client.refresh().await.context("refresh failed")?;
            println!("refreshed, expires in {}s", token.secs_until_expiry());
        }
        Command::Get { path } => {
            let response = client
                .send(ApiRequest::get(path.as_str()))
                .await
                .with_context(|| format!("GET {path} failed"))?;
            println!("{}", response.status);
            println!("{}", response.text());
            if !response.is_success() {
                anyhow::bail!("GET {path} returned {}", response.status);
            }
        }
    }
    Ok(())
}
