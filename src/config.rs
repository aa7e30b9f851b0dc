use serde::Deserialize;
use sha2::{Digest, Sha256};

pub const DEFAULT_WHATSAPP_API_BASE_URL: &str = "https://graph.facebook.com/v19.0";
pub const DEFAULT_ONESIGNAL_API_URL: &str = "https://onesignal.com/api/v1/notifications";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Shared secret for the cron endpoint. `None` leaves the endpoint open.
    pub cron_secret: Option<String>,
    /// Link attached to staff push notifications.
    pub app_public_url: Option<String>,
    pub whatsapp_token: Option<String>,
    pub whatsapp_phone_number_id: Option<String>,
    pub whatsapp_api_base_url: String,
    pub onesignal_app_id: Option<String>,
    pub onesignal_rest_api_key: Option<String>,
    pub onesignal_api_url: String,
}

/// Reads an optional variable, treating blank values as unset.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn http_url_var(name: &str, default: &str) -> anyhow::Result<String> {
    let url = optional_var(name).unwrap_or_else(|| default.to_string());
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}

/// Scheme, host and port of a database URL, without credentials or path.
fn database_target(database_url: &str) -> String {
    match url::Url::parse(database_url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or("localhost");
            match parsed.port() {
                Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
                None => format!("{}://{}", parsed.scheme(), host),
            }
        }
        Err(_) => "<unparseable url>".to_string(),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .or_else(|_| std::env::var("DB_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DATABASE_URL or DB_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            cron_secret: optional_var("CRON_SECRET"),
            app_public_url: optional_var("APP_PUBLIC_URL"),
            whatsapp_token: optional_var("WHATSAPP_TOKEN"),
            whatsapp_phone_number_id: optional_var("WHATSAPP_PHONE_NUMBER_ID"),
            whatsapp_api_base_url: http_url_var(
                "WHATSAPP_API_BASE_URL",
                DEFAULT_WHATSAPP_API_BASE_URL,
            )?,
            onesignal_app_id: optional_var("ONESIGNAL_APP_ID"),
            onesignal_rest_api_key: optional_var("ONESIGNAL_REST_API_KEY"),
            onesignal_api_url: http_url_var("ONESIGNAL_API_URL", DEFAULT_ONESIGNAL_API_URL)?,
        };

        // Log what was loaded (without sensitive values)
        tracing::debug!("Database: {}", database_target(&config.database_url));
        tracing::debug!("Server Port: {}", config.port);
        match config.cron_secret_fingerprint() {
            Some(fp) => tracing::info!("Cron secret configured (fingerprint {})", fp),
            None => tracing::warn!("CRON_SECRET not set: reminder endpoint accepts any caller"),
        }
        if config.whatsapp_token.is_none() || config.whatsapp_phone_number_id.is_none() {
            tracing::warn!("WhatsApp credentials missing: reminder sends will fail");
        }
        if config.onesignal_app_id.is_none() || config.onesignal_rest_api_key.is_none() {
            tracing::warn!("OneSignal credentials missing: staff push notifications will fail");
        }

        Ok(config)
    }

    /// Short SHA-256 fingerprint of the cron secret, safe to log.
    pub fn cron_secret_fingerprint(&self) -> Option<String> {
        self.cron_secret.as_ref().map(|secret| {
            let digest = Sha256::digest(secret.as_bytes());
            hex::encode(&digest[..4])
        })
    }
}
