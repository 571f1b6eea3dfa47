//! The legacy NetHome+ cloud endpoint: two-step login (resolve login id,
//! then log in with a SHA-256-hashed password) and SHA-256 request signing
//! (spec §4.5 "Cloud client").

use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::crypto::{sha256_hex, NETHOME_SIGN_KEY};
use crate::error::{ApiError, AuthError, Error, Result};

use super::region::{nethome_region, RegionConfig};

/// `clientType`/`format`/`language` values every NetHome+ request carries
/// (spec §4.5). `src` isn't disambiguated any further by spec.md beyond its
/// presence in the envelope; the official app sends its own numeric app id
/// there, so `api_request` reuses `RegionConfig::app_id` for it too.
const CLIENT_TYPE: u8 = 1;
const FORMAT: u8 = 2;
const LANGUAGE: &str = "en_US";

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default, rename = "errorCode")]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    result: Value,
}

pub struct NetHomePlusCloud {
    region: RegionConfig,
    client: Client,
    login_account: String,
    login_password: String,
    session_id: Option<String>,
}

impl NetHomePlusCloud {
    pub fn new(region: &str, account: Option<String>, password: Option<String>) -> Result<Self> {
        let cfg = nethome_region(region)
            .ok_or_else(|| Error::Auth(AuthError::MissingCredentials))?;
        Ok(Self {
            login_account: account.unwrap_or_else(|| cfg.login_account.to_string()),
            login_password: password.unwrap_or_else(|| cfg.login_password.to_string()),
            region: cfg,
            client: Client::new(),
            session_id: None,
        })
    }

    fn url(&self, path: &str) -> Url {
        let url = format!("{}/{}", self.region.base_url.trim_end_matches('/'), path.trim_start_matches('/'));
        Url::parse(&url).expect("region base_url and endpoint paths are compile-time constants")
    }

    /// Two-step login: resolve the numeric login id for the account, then
    /// authenticate with `SHA-256(login_id + SHA-256(password))`.
    pub async fn login(&mut self) -> Result<()> {
        let login_id_body = json!({ "loginAccount": self.login_account });
        let login_id_resp = self.api_request("/v1/user/login/id/get", &login_id_body).await?;
        let login_id = login_id_resp
            .get("loginId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Auth(AuthError::CredentialsRejected))?
            .to_string();

        let password_hash = sha256_hex(format!("{login_id}{}", sha256_hex(self.login_password.as_bytes())).as_bytes());

        let login_body = json!({
            "loginAccount": self.login_account,
            "password": password_hash,
        });
        let login_resp = self.api_request("/v1/user/login", &login_body).await?;
        let session_id = login_resp
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Auth(AuthError::CredentialsRejected))?;

        self.session_id = Some(session_id.to_string());
        Ok(())
    }

    /// Exchange a device's UDP-ID for its per-device AES token and key.
    ///
    /// The response carries every token the account has ever issued as a
    /// `tokenlist` array, not a single pair keyed to the request; match the
    /// entry whose `udpId` is the one we asked for.
    pub async fn get_token(&self, udp_id_hex: &str) -> Result<(String, String)> {
        let body = json!({ "udpid": udp_id_hex });
        let resp = self.api_request("/v1/iot/secure/getToken", &body).await?;
        parse_token_response(&resp, udp_id_hex)
    }

    /// Every request carries the same envelope: `appId`, `clientType`,
    /// `format`, `language`, `src`, `stamp`, and (once logged in)
    /// `sessionId`, followed by `sign = SHA-256(url_path + sorted_form_body +
    /// sign_key)` computed over that full body (spec §4.5).
    async fn api_request(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let url = self.url(endpoint);
        let mut request_body = body.clone();
        if let Some(obj) = request_body.as_object_mut() {
            obj.insert("appId".into(), json!(self.region.app_id));
            obj.insert("clientType".into(), json!(CLIENT_TYPE));
            obj.insert("format".into(), json!(FORMAT));
            obj.insert("language".into(), json!(LANGUAGE));
            obj.insert("src".into(), json!(self.region.app_id));
            obj.insert("stamp".into(), json!(Utc::now().format("%Y%m%d%H%M%S").to_string()));
            if let Some(session_id) = &self.session_id {
                obj.insert("sessionId".into(), json!(session_id));
            }
            obj.insert("sign".into(), json!(sign_request(endpoint, &request_body)));
        }

        let response = self.client.post(url).json(&request_body).send().await?;
        let envelope: ApiEnvelope = response.json().await?;

        match envelope.error_code.as_deref() {
            None | Some("0") => Ok(envelope.result),
            Some(code) => Err(Error::Api(ApiError {
                code: code.to_string(),
                msg: envelope.msg.unwrap_or_default(),
            })),
        }
    }
}

/// `SHA-256(url_path + sorted_form_body + sign_key)`, where `sorted_form_body`
/// is every field of `body` serialized as `key=value` pairs in ascending key
/// order and concatenated with no separator (spec §4.5).
fn sign_request(url_path: &str, body: &Value) -> String {
    let obj = body.as_object().expect("request body is always a JSON object");
    let mut pairs: Vec<(&String, &Value)> = obj.iter().collect();
    pairs.sort_by_key(|(k, _)| k.as_str());

    let mut sorted_form_body = String::new();
    for (key, value) in pairs {
        let value_str = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        sorted_form_body.push_str(key);
        sorted_form_body.push('=');
        sorted_form_body.push_str(&value_str);
    }

    let mut sign_input = String::with_capacity(url_path.len() + sorted_form_body.len() + NETHOME_SIGN_KEY.len());
    sign_input.push_str(url_path);
    sign_input.push_str(&sorted_form_body);
    sign_input.push_str(&String::from_utf8_lossy(NETHOME_SIGN_KEY));
    sha256_hex(sign_input.as_bytes())
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceToken {
    pub token: String,
    pub key: String,
}

/// The account's full `tokenlist` is returned on every call; pick the entry
/// matching the UDP-ID we asked about.
fn parse_token_response(resp: &Value, udp_id_hex: &str) -> Result<(String, String)> {
    let entry = resp
        .get("tokenlist")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find(|entry| entry.get("udpId").and_then(Value::as_str).is_some_and(|id| id.eq_ignore_ascii_case(udp_id_hex)))
        .ok_or_else(|| Error::Auth(AuthError::CredentialsRejected))?;

    let token = entry.get("token").and_then(Value::as_str).unwrap_or_default().to_string();
    let key = entry.get("key").and_then(Value::as_str).unwrap_or_default().to_string();
    Ok((token, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_matches_requested_udpid() {
        let resp = json!({
            "tokenlist": [
                { "udpId": "aaaa", "token": "tok-a", "key": "key-a" },
                { "udpId": "4fbe0d4139de99dd88a0285e14657045", "token": "tok-b", "key": "key-b" },
            ]
        });
        let (token, key) = parse_token_response(&resp, "4fbe0d4139de99dd88a0285e14657045").unwrap();
        assert_eq!(token, "tok-b");
        assert_eq!(key, "key-b");
    }

    #[test]
    fn token_response_rejects_unknown_udpid() {
        let resp = json!({ "tokenlist": [{ "udpId": "aaaa", "token": "tok-a", "key": "key-a" }] });
        assert!(parse_token_response(&resp, "bbbb").is_err());
    }

    #[test]
    fn sign_request_is_order_independent_and_matches_manual_computation() {
        let body_a = json!({ "b": "2", "a": "1" });
        let body_b = json!({ "a": "1", "b": "2" });
        assert_eq!(sign_request("/v1/user/login", &body_a), sign_request("/v1/user/login", &body_b));

        let expected = sha256_hex(
            format!("/v1/user/logina=1b=2{}", String::from_utf8_lossy(NETHOME_SIGN_KEY)).as_bytes(),
        );
        assert_eq!(sign_request("/v1/user/login", &body_a), expected);
    }

    #[test]
    fn login_password_hash_mixes_in_login_id() {
        let login_id = "1000123456";
        let password = "hunter2";
        let expected = sha256_hex(format!("{login_id}{}", sha256_hex(password.as_bytes())).as_bytes());
        // Same formula used inline in `login()`; guards against regressing to
        // a bare `SHA-256(password)`.
        assert_ne!(expected, sha256_hex(password.as_bytes()));
    }
}
