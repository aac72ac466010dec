//! Registration of the provisioned database with the Exoquic control plane.
//!
//! The payload carries the replication password, so it is only ever sent to
//! the configured endpoint and never logged.

use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::{Config, Error, Result};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const SKIPPED: &str = "Skipping Exoquic cloud registration (no API key provided).\n";

/// Body of the registration request.
#[derive(Debug, Serialize)]
pub struct RegistrationPayload<'a> {
    pub host: &'a str,
    pub port: String,
    pub database: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub replication_slot: &'a str,
    pub publication: &'a str,
    pub api_key: &'a str,
}

impl<'a> RegistrationPayload<'a> {
    pub fn new(config: &'a Config, api_key: &'a str) -> Self {
        Self {
            host: &config.postgres.host,
            port: config.postgres.port.to_string(),
            database: &config.postgres.database,
            username: &config.replication.user,
            password: &config.replication.password,
            replication_slot: &config.replication.slot_name,
            publication: &config.replication.publication,
            api_key,
        }
    }
}

pub struct RegistrationClient {
    http: reqwest::Client,
    url: String,
}

impl RegistrationClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    /// Posts the payload. Only `200 OK` and `201 Created` count as success.
    pub async fn register(&self, payload: &RegistrationPayload<'_>) -> Result<()> {
        debug!(url = %self.url, "Sending registration request");

        let response = self
            .http
            .post(&self.url)
            .header("x-api-key", payload.api_key)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Registration {
                status: status.as_u16(),
                body,
            });
        }

        info!(status = status.as_u16(), "Registered database with Exoquic");
        Ok(())
    }
}

/// Registers the database when an API key is configured; otherwise returns
/// the skip notice without touching the network.
pub async fn register_with_cloud(config: &Config) -> Result<String> {
    let Some(api_key) = config.cloud.api_key.as_deref() else {
        info!("No API key configured, skipping cloud registration");
        return Ok(SKIPPED.to_string());
    };

    let client = RegistrationClient::new(config.registration_url())?;
    client
        .register(&RegistrationPayload::new(config, api_key))
        .await?;

    Ok("Successfully registered database with Exoquic.\n".to_string())
}
