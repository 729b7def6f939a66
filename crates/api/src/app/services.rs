//! Shared application services: stores, the token resolver and the
//! deployment settings handlers need.

use anyhow::Context;
use chrono::Duration;

use bookshelf_auth::DEFAULT_COST;
use bookshelf_infra::{Authenticator, Models};

use crate::config::Config;

/// Per-deployment knobs read by handlers.
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: String,
    pub auth_token_ttl: Duration,
    pub activation_token_ttl: Duration,
    pub bcrypt_cost: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            auth_token_ttl: Duration::hours(24),
            activation_token_ttl: Duration::hours(72),
            bcrypt_cost: DEFAULT_COST,
        }
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            environment: config.env.clone(),
            auth_token_ttl: config.auth_token_ttl,
            activation_token_ttl: config.activation_token_ttl,
            bcrypt_cost: config.bcrypt_cost,
        }
    }
}

#[derive(Clone)]
pub struct AppServices {
    pub models: Models,
    pub authenticator: Authenticator,
    pub settings: Settings,
}

impl AppServices {
    pub fn new(models: Models, settings: Settings) -> Self {
        let authenticator = models.authenticator();
        Self {
            models,
            authenticator,
            settings,
        }
    }
}

/// Wire stores from configuration: Postgres when a DSN is configured,
/// in-memory otherwise.
pub async fn build_services(config: &Config) -> anyhow::Result<AppServices> {
    let models = match &config.db {
        Some(db) => {
            let models = Models::postgres(db)
                .await
                .context("failed to initialise database")?;
            tracing::info!("using postgres stores");
            models
        }
        None => {
            tracing::warn!("BOOKSHELF_DB_DSN not set; using in-memory stores (data is lost on exit)");
            Models::in_memory()
        }
    };

    Ok(AppServices::new(models, Settings::from(config)))
}
