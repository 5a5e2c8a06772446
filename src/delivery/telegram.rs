use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::DeliveryChannel;

const PARSE_MODE: &str = "Markdown";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    link_preview_options: LinkPreviewOptions,
}

#[derive(Debug, Serialize)]
struct LinkPreviewOptions {
    is_disabled: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Bot API client used to post into a chat or channel.
pub struct TelegramClient {
    client: Client,
    api_url: String,
}

impl TelegramClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_url: format!("{}/bot{}", base_url.trim_end_matches('/'), token),
        })
    }
}

#[async_trait]
impl DeliveryChannel for TelegramClient {
    async fn send(&self, destination: &str, text: &str) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: destination,
            text,
            parse_mode: PARSE_MODE,
            link_preview_options: LinkPreviewOptions { is_disabled: true },
        };

        let response = self
            .client
            .post(format!("{}/sendMessage", self.api_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // Errors come back as JSON too; fall back to the raw body when not.
        let api_response: Option<ApiResponse> = serde_json::from_str(&body).ok();
        match api_response {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(ApiResponse {
                description: Some(description),
                ..
            }) => Err(AppError::Telegram(description)),
            Some(_) => Err(AppError::Telegram(format!("HTTP {}", status))),
            None => Err(anyhow::anyhow!("Unexpected Telegram response: HTTP {}: {}", status, body).into()),
        }
    }
}
