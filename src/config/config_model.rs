use anyhow::{Context, Result, bail};
use chrono::FixedOffset;
use url::Url;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub database: Database,
    pub mpesa: MpesaConfig,
    pub alerts: Alerts,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    /// MiB
    pub body_limit: u64,
    /// Seconds
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection
    pub connection_timeout: u64,
}

/// Daraja credentials and endpoints, injected into the gateway client and the
/// initiation use case at construction.
#[derive(Clone)]
pub struct MpesaConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub passkey: String,
    /// Public base URL of this service; the callback URL is built from it.
    pub callback_base_url: String,
    pub api_base_url: String,
    /// Offset of the gateway's local clock (East Africa Time is +3).
    pub utc_offset_hours: i32,
}

impl MpesaConfig {
    pub fn utc_offset(&self) -> Result<FixedOffset> {
        let hours = self.utc_offset_hours;
        if !(-23..=23).contains(&hours) {
            bail!("utc offset out of range: {hours}");
        }
        FixedOffset::east_opt(hours * 3600)
            .with_context(|| format!("utc offset out of range: {hours}"))
    }
}

impl std::fmt::Debug for MpesaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpesaConfig")
            .field("shortcode", &self.shortcode)
            .field("callback_base_url", &self.callback_base_url)
            .field("api_base_url", &self.api_base_url)
            .field("utc_offset_hours", &self.utc_offset_hours)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Alerts {
    pub unreconciled_webhook_url: Option<Url>,
}
