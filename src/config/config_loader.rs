use anyhow::{Context, Result};
use url::Url;

use super::config_model::{Alerts, Database, DotEnvyConfig, MpesaConfig, Server};

pub const DEFAULT_MPESA_API_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
pub const DEFAULT_MPESA_UTC_OFFSET_HOURS: i32 = 3;
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_DATABASE_CONNECTION_TIMEOUT: u64 = 30;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let server = Server {
        port: required("SERVER_PORT")?
            .parse()
            .context("SERVER_PORT is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: match optional("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .context("DATABASE_MAX_CONNECTIONS is invalid")?,
            None => DEFAULT_DATABASE_MAX_CONNECTIONS,
        },
        connection_timeout: match optional("DATABASE_CONNECTION_TIMEOUT") {
            Some(raw) => raw
                .parse()
                .context("DATABASE_CONNECTION_TIMEOUT is invalid")?,
            None => DEFAULT_DATABASE_CONNECTION_TIMEOUT,
        },
    };

    let mpesa = MpesaConfig {
        consumer_key: required("MPESA_CONSUMER_KEY")?,
        consumer_secret: required("MPESA_CONSUMER_SECRET")?,
        shortcode: required("MPESA_SHORTCODE")?,
        passkey: required("MPESA_PASSKEY")?,
        callback_base_url: required("BASE_URL")?,
        api_base_url: optional("MPESA_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_MPESA_API_BASE_URL.to_string()),
        utc_offset_hours: match optional("MPESA_UTC_OFFSET_HOURS") {
            Some(raw) => raw
                .parse()
                .context("MPESA_UTC_OFFSET_HOURS is invalid")?,
            None => DEFAULT_MPESA_UTC_OFFSET_HOURS,
        },
    };
    mpesa.utc_offset()?;

    let alerts = Alerts {
        unreconciled_webhook_url: optional("DISCORD_UNRECONCILED_WEBHOOK_URL")
            .map(|raw| Url::parse(&raw))
            .transpose()
            .context("DISCORD_UNRECONCILED_WEBHOOK_URL is invalid")?,
    };

    Ok(DotEnvyConfig {
        server,
        database,
        mpesa,
        alerts,
    })
}

fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("{key} is invalid"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
