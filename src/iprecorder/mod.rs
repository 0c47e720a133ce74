//! Online-IP recording.
//!
//! # Responsibilities
//! - Receive the online users drained from a node's limiter
//! - Forward them to the panel or to an external recorder

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use thiserror::Error;

use crate::config::IpRecorderConfig;
use crate::panel::{ControlPlane, OnlineUser, PanelError};

/// Errors returned by an IP recorder.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("panel: {0}")]
    Panel(#[from] PanelError),

    #[error("recorder request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("recorder returned status {0}")]
    Status(u16),
}

/// Destination for online-IP reports.
#[async_trait]
pub trait IpRecorder: Send + Sync {
    async fn sync_ips(&self, tag: &str, users: &[OnlineUser]) -> Result<(), RecorderError>;
}

/// Reports online users to the panel's alive endpoint.
pub struct PanelRecorder {
    panel: Arc<dyn ControlPlane>,
}

impl PanelRecorder {
    pub fn new(panel: Arc<dyn ControlPlane>) -> Self {
        Self { panel }
    }
}

#[async_trait]
impl IpRecorder for PanelRecorder {
    async fn sync_ips(&self, _tag: &str, users: &[OnlineUser]) -> Result<(), RecorderError> {
        self.panel.report_online_users(users).await?;
        Ok(())
    }
}

#[derive(Serialize)]
struct RecordRequest<'a> {
    tag: &'a str,
    users: &'a [OnlineUser],
}

/// Posts online users as JSON to an external recorder.
pub struct HttpRecorder {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl HttpRecorder {
    pub fn new(config: &IpRecorderConfig) -> Result<Self, RecorderError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            url: config.url.clone(),
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl IpRecorder for HttpRecorder {
    async fn sync_ips(&self, tag: &str, users: &[OnlineUser]) -> Result<(), RecorderError> {
        let response = self
            .http
            .post(&self.url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .json(&RecordRequest { tag, users })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RecorderError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
