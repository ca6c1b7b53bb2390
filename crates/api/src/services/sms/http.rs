//! JSON client for an HTTP SMS gateway.
//!
//! `POST {base_url}/send` with the recipient, template and named arguments.
//! Any 2xx answer means the gateway accepted the message.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

use super::{MessageArg, SmsError, SmsSender};

#[derive(Clone)]
pub struct HttpSmsSender {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSmsSender {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    recipient: &'a str,
    template_id: &'a str,
    args: BTreeMap<&'a str, &'a str>,
}

#[async_trait]
impl SmsSender for HttpSmsSender {
    async fn send(
        &self,
        recipient: &str,
        template_id: &str,
        args: &[MessageArg],
    ) -> Result<(), SmsError> {
        let body = SendRequest {
            recipient,
            template_id,
            args: args
                .iter()
                .map(|arg| (arg.name.as_str(), arg.value.as_str()))
                .collect(),
        };

        let mut request = self.http.post(format!("{}/send", self.base_url)).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(classify_transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, body))
    }
}

fn classify_transport(err: reqwest::Error) -> SmsError {
    if err.is_timeout() {
        SmsError::Timeout
    } else {
        SmsError::Failed(err.into())
    }
}

/// 4xx means the gateway refused this message; anything else may pass on retry.
fn classify_status(status: StatusCode, body: String) -> SmsError {
    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        SmsError::Timeout
    } else if status.is_client_error() {
        SmsError::Rejected(format!("{}: {}", status.as_u16(), body))
    } else {
        SmsError::Failed(anyhow::anyhow!("gateway error {}: {}", status.as_u16(), body))
    }
}
