//! Green-Sys admin console.
//!
//! Restores or opens a session against the configured backend and reports how
//! each path given on the command line would be routed.

use std::env;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use greensys_admin::config::Config;
use greensys_admin::router::Navigation;
use greensys_admin::session::LoginOutcome;
use greensys_admin::App;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Green-Sys admin client");
    tracing::info!("API base URL: {}", config.api_base_url);
    tracing::info!("Token path: {:?}", config.token_path);

    let app = App::new(config)?;
    let mut flags = app.start().await;

    if !flags.is_authenticated {
        if let (Ok(username), Ok(password)) =
            (env::var("GREENSYS_USERNAME"), env::var("GREENSYS_PASSWORD"))
        {
            match app.session.login(&username, &password).await {
                LoginOutcome::Success => {}
                LoginOutcome::Inactive | LoginOutcome::Error => {
                    if let Some(error) = app.session.last_error().await {
                        tracing::warn!("Sign-in failed: {}", error);
                    }
                }
            }
            flags = app.session.flags().await;
        }
    }

    if let Some(user) = app.session.user().await {
        tracing::info!("Signed in as {} ({})", user.username, user.role.as_str());
    } else {
        tracing::info!("No active session");
    }

    for path in env::args().skip(1) {
        let (route, decision) = app.router.navigate(&path, &flags);
        match &decision {
            Navigation::Proceed => tracing::info!("{} -> {}", path, route.name),
            Navigation::NotFound => tracing::info!("{} -> not found", path),
            _ => tracing::info!(
                "{} -> redirect to {}",
                path,
                decision.location().unwrap_or_default()
            ),
        }
    }

    app.shutdown().await;
    Ok(())
}
