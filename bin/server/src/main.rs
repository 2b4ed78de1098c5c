use std::process::ExitCode;
use std::sync::Arc;

use oauth_gate_server::{
    app::{self, AuthMode},
    auth::{AuthGate, OidcClient},
    config::ServerConfig,
    error::StartupError,
    home,
};
use rootcause::prelude::Report;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            tracing::error!(error = %report, "oauth-gate stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Report<StartupError>> {
    let config = ServerConfig::from_env().map_err(configuration)?;
    tracing::info!("Loaded configuration");

    let paths = config.gate.paths().map_err(configuration)?;

    let auth = match config.oauth.provider_config(&paths.callback_path()) {
        Ok(provider_config) => {
            let codec = config.session.codec().map_err(configuration)?;
            let key = config.session.cookie_key().map_err(configuration)?;

            tracing::info!(issuer = provider_config.issuer_url(), "Discovering OIDC provider...");
            let client = OidcClient::discover(
                &provider_config,
                config.gate.provider_timeout(),
                config.gate.signing_keys_refresh(),
            )
            .await
            .map_err(|e| StartupError::Provider {
                details: e.to_string(),
            })?;
            client.signing_keys().clone().spawn_refresher();

            if !config.session.secure_cookies {
                tracing::warn!("Session cookies are sent without the Secure flag");
            }

            AuthMode::Enforced(Arc::new(AuthGate::new(
                Arc::new(client),
                codec,
                key,
                paths.clone(),
                config.session.secure_cookies,
            )))
        }
        Err(e) if e.is_absent() => {
            tracing::warn!(error = %e, "Authentication is disabled");
            AuthMode::Disabled
        }
        Err(e) => return Err(configuration(e).into()),
    };

    tracing::info!(enforced = auth.is_enforced(), "Assembling gateway");
    let router = app::assemble(home::router(&paths), auth, &paths);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .map_err(|e| StartupError::Bind {
            address: config.bind_address.clone(),
            details: e.to_string(),
        })?;

    tracing::info!("listening on http://{}", config.bind_address);

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StartupError::Serve {
            details: e.to_string(),
        })?;

    tracing::info!("Server shut down");
    Ok(())
}

fn configuration(error: oauth_gate_server::error::ConfigurationError) -> StartupError {
    StartupError::Configuration {
        details: error.to_string(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
