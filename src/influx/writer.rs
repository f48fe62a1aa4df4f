//! Trait abstraction for database writes to enable testing

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::config::InfluxConfig;
use crate::error::{BridgeError, Result};

/// Trait for writing line protocol to the database
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LineWriter: Send + Sync {
    /// Write one line protocol point
    async fn write_line(&self, line: &str) -> Result<()>;
}

/// InfluxDB 1.x `/write` endpoint client
///
/// With `reuse_client` one HTTP client (and its connection pool) serves every
/// write; otherwise a fresh client is built for each packet.
pub struct HttpLineWriter {
    url: String,
    database: String,
    user: String,
    password: String,
    timeout: Duration,
    client: Option<reqwest::Client>,
}

impl HttpLineWriter {
    /// Create a writer from the InfluxDB settings
    ///
    /// # Errors
    ///
    /// Returns error if the shared HTTP client cannot be built.
    pub fn new(config: &InfluxConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = if config.reuse_client {
            Some(build_client(timeout)?)
        } else {
            None
        };

        Ok(Self {
            url: write_url(&config.host, config.port),
            database: config.dbname.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            timeout,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LineWriter for HttpLineWriter {
    async fn write_line(&self, line: &str) -> Result<()> {
        let client = match &self.client {
            Some(client) => client.clone(),
            None => build_client(self.timeout)?,
        };

        let response = client
            .post(&self.url)
            .query(&[
                ("db", self.database.as_str()),
                ("u", self.user.as_str()),
                ("p", self.password.as_str()),
            ])
            .body(line.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Write(format!("{}: {}", status, body.trim())));
        }

        debug!("Wrote line to {}", self.database);
        Ok(())
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// `http://host:port/write`, bracketing bare IPv6 addresses
fn write_url(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("http://[{}]:{}/write", host, port)
    } else {
        format!("http://{}:{}/write", host, port)
    }
}
