//! The newer SmartHome cloud endpoint: access-token login and HMAC-SHA256
//! signed JSON request envelopes (spec §6 "Cloud client").

use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use crate::crypto::hmac_sha256;
use crate::error::{ApiError, AuthError, Error, Result};

use super::region::smarthome_base_url;

const SIGN_KEY: &[u8] = b"meicloud";

pub struct SmartHomeCloud {
    client: Client,
    base_url: &'static str,
    account: String,
    password: String,
    access_token: Option<String>,
}

impl SmartHomeCloud {
    pub fn new(account: String, password: String) -> Self {
        Self {
            client: Client::new(),
            base_url: smarthome_base_url(),
            account,
            password,
            access_token: None,
        }
    }

    fn url(&self, path: &str) -> Url {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'));
        Url::parse(&url).expect("base_url and endpoint paths are compile-time constants")
    }

    pub async fn login(&mut self) -> Result<()> {
        let body = json!({
            "account": self.account,
            "password": self.password,
        });
        let resp = self.api_request("/mj/user/login", &body).await?;
        let token = resp
            .get("accessToken")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Auth(AuthError::CredentialsRejected))?;
        self.access_token = Some(token.to_string());
        Ok(())
    }

    async fn api_request(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let url = self.url(endpoint);
        let serialized = serde_json::to_vec(body)?;

        let mut sign_input = Vec::with_capacity(endpoint.len() + serialized.len());
        sign_input.extend_from_slice(endpoint.as_bytes());
        sign_input.extend_from_slice(&serialized);
        let signature = hex::encode(hmac_sha256(SIGN_KEY, &sign_input));

        let mut request = self.client.post(url).json(body).header("sign", signature);
        if let Some(token) = &self.access_token {
            request = request.header("accessToken", token.clone());
        }

        let response = request.send().await?;
        let envelope: Value = response.json().await?;

        let code = envelope.get("code").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            return Err(Error::Api(ApiError {
                code: code.to_string(),
                msg: envelope
                    .get("msg")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }));
        }

        Ok(envelope.get("data").cloned().unwrap_or(Value::Null))
    }
}
