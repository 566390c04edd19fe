//! Application configuration loaded from environment variables.

use crate::errors::{AppError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Upper bound on pooled SQLite connections
    pub db_max_connections: u32,
    /// Superuser seeded at startup when both e-mail and token are set
    pub superuser_email: Option<String>,
    pub superuser_token: Option<String>,
    /// OAuth bearer token used for the Google Sheets / Drive APIs
    pub google_access_token: Option<String>,
    /// Account that gets writer access to exported reports
    pub google_share_email: Option<String>,
    pub sheets_api_url: String,
    pub drive_api_url: String,
    /// Timeout for outbound HTTP calls
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./charity_fund.db".to_string()),
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| AppError::Config("Invalid API_PORT".to_string()))?,
            db_max_connections: env_var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| AppError::Config("Invalid DB_MAX_CONNECTIONS".to_string()))?,
            superuser_email: env_var("SUPERUSER_EMAIL").ok(),
            superuser_token: env_var("SUPERUSER_TOKEN").ok(),
            google_access_token: env_var("GOOGLE_ACCESS_TOKEN").ok(),
            google_share_email: env_var("GOOGLE_SHARE_EMAIL").ok(),
            sheets_api_url: env_var("SHEETS_API_URL")
                .unwrap_or_else(|_| "https://sheets.googleapis.com/v4".to_string()),
            drive_api_url: env_var("DRIVE_API_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com/drive/v3".to_string()),
            http_timeout_secs: env_var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| AppError::Config("Invalid HTTP_TIMEOUT_SECS".to_string()))?,
        })
    }

    /// Seeded superuser credentials, if both halves are configured.
    pub fn superuser(&self) -> Option<(&str, &str)> {
        match (&self.superuser_email, &self.superuser_token) {
            (Some(email), Some(token)) => Some((email.as_str(), token.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
impl Config {
    /// Configuration for tests: one in-memory connection, no Google access.
    pub fn for_tests() -> Self {
        Config {
            database_url: "sqlite::memory:".to_string(),
            api_port: 0,
            db_max_connections: 1,
            superuser_email: None,
            superuser_token: None,
            google_access_token: None,
            google_share_email: None,
            sheets_api_url: "http://127.0.0.1:9/v4".to_string(),
            drive_api_url: "http://127.0.0.1:9/drive/v3".to_string(),
            http_timeout_secs: 1,
        }
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing env var: {key}")))
}
