// # UniFi Gateway IP Source
//
// This crate discovers the gateway's public IPv4 address from a UniFi
// controller.
//
// ## Flow
//
// 1. `POST /api/login` with `{"username", "password"}`
// 2. Collect every session cookie from the login response
// 3. `GET /api/s/default/stat/health` with those cookies
// 4. Pull `wan_ip` out of the status payload
//
// ## TLS
//
// Controllers on the LAN usually present self-signed certificates, so the
// client for this source accepts certificates that do not chain to a trusted
// root. Use it for the controller only.
//
// ## Extraction
//
// The status payload is not a documented schema. The source first decodes
// `data[].wan_ip` as JSON and falls back to scanning the raw body for a
// `"wan_ip": "a.b.c.d"` pair.

use ddns_core::config::{HttpConfig, UnifiConfig};
use ddns_core::traits::IpSource;
use ddns_core::{Error, Result};

use regex::Regex;
use reqwest::StatusCode;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, SET_COOKIE};
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::sync::LazyLock;
use std::time::Duration;

/// Login endpoint, relative to the controller base URL
const LOGIN_PATH: &str = "/api/login";

/// Site health endpoint, relative to the controller base URL
const HEALTH_PATH: &str = "/api/s/default/stat/health";

/// Fallback pattern for the WAN IP in an unstructured status body
static WAN_IP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""wan_ip"\s*:\s*"(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})""#)
        .expect("WAN IP pattern is valid")
});

/// UniFi controller IP source
///
/// Stateless: every call to [`IpSource::current`] logs in again and reads
/// the health endpoint once. There is no logout and no retry.
pub struct UnifiGatewaySource {
    /// Controller base URL (e.g. "https://192.168.1.1")
    base_url: String,

    /// Controller login name
    username: String,

    /// Controller password
    /// ⚠️ NEVER log this value
    password: String,

    /// HTTP client (accepts self-signed certificates)
    client: reqwest::Client,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for UnifiGatewaySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiGatewaySource")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

#[derive(serde::Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct HealthResponse {
    #[serde(default)]
    data: Vec<HealthSubsystem>,
}

#[derive(Deserialize)]
struct HealthSubsystem {
    #[serde(default)]
    wan_ip: Option<String>,
}

impl UnifiGatewaySource {
    /// Create a new UniFi IP source
    ///
    /// # Parameters
    ///
    /// - `base_url`: Controller URL including scheme (e.g. "https://192.168.1.1")
    /// - `username` / `password`: Controller credentials
    /// - `timeout`: Per-request timeout
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            client,
        })
    }

    /// Create a source from the validated configuration
    pub fn from_config(unifi: &UnifiConfig, http: &HttpConfig) -> Result<Self> {
        Self::new(
            unifi.base_url(),
            unifi.username.clone(),
            unifi.password.clone(),
            http.timeout(),
        )
    }

    /// Log in and return the `Cookie` header value for the session
    async fn login(&self) -> Result<Option<HeaderValue>> {
        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        tracing::debug!("Logging in to UniFi controller at {}", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await
            .map_err(|e| Error::http(format!("Login request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => {
                    Error::rate_limited(format!("Controller throttled login. Status: {}", status))
                }
                _ => Error::auth(format!("Controller rejected login. Status: {}", status)),
            });
        }

        let cookie = cookie_header(response.headers());
        if cookie.is_none() {
            tracing::warn!("Controller login returned no session cookies");
        }
        Ok(cookie)
    }

    /// Fetch the raw health payload with the session cookies attached
    async fn fetch_health(&self, cookie: Option<HeaderValue>) -> Result<String> {
        let url = format!("{}{}", self.base_url, HEALTH_PATH);

        let mut request = self.client.get(&url);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("Status request failed: {}", e)))?;

        let status = response.status();
        match status.as_u16() {
            200..=299 => {}
            401 | 403 => {
                return Err(Error::auth(format!(
                    "Controller rejected session cookies. Status: {}",
                    status
                )));
            }
            _ => {
                return Err(Error::http(format!("Status request returned {}", status)));
            }
        }

        response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read status response: {}", e)))
    }
}

#[async_trait::async_trait]
impl IpSource for UnifiGatewaySource {
    async fn current(&self) -> Result<Ipv4Addr> {
        let cookie = self.login().await?;
        let body = self.fetch_health(cookie).await?;
        let ip = extract_wan_ip(&body)?;

        tracing::debug!("Controller reports WAN IP {}", ip);
        Ok(ip)
    }

    fn source_name(&self) -> &'static str {
        "unifi"
    }
}

/// Build a `Cookie` header value from a response's `Set-Cookie` headers
///
/// Keeps the `name=value` part of every cookie, in header order, joined
/// with `;`. Attributes (`Path`, `HttpOnly`, ...) are dropped. Values are
/// forwarded byte for byte, so cookies with non-ASCII bytes survive.
///
/// Returns `None` when the response set no cookies.
pub fn cookie_header(headers: &HeaderMap) -> Option<HeaderValue> {
    let pairs: Vec<&[u8]> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.as_bytes().split(|b| *b == b';').next())
        .map(<[u8]>::trim_ascii)
        .filter(|pair| pair.contains(&b'='))
        .collect();

    if pairs.is_empty() {
        return None;
    }

    // Every byte comes from a valid header value, so the join is valid too.
    HeaderValue::from_bytes(&pairs.join(&b';')).ok()
}

/// Extract the WAN IP from a health payload
///
/// Structured decoding of `data[].wan_ip` wins; the regex scan covers
/// payloads that are not the expected JSON shape.
pub fn extract_wan_ip(body: &str) -> Result<Ipv4Addr> {
    if let Ok(health) = serde_json::from_str::<HealthResponse>(body) {
        let decoded = health
            .data
            .iter()
            .filter_map(|subsystem| subsystem.wan_ip.as_deref())
            .find_map(|ip| ip.trim().parse::<Ipv4Addr>().ok());

        if let Some(ip) = decoded {
            return Ok(ip);
        }
    }

    let mut invalid = None;
    for captures in WAN_IP_PATTERN.captures_iter(body) {
        let candidate = &captures[1];
        match candidate.parse::<Ipv4Addr>() {
            Ok(ip) => return Ok(ip),
            Err(_) => {
                invalid.get_or_insert_with(|| candidate.to_string());
            }
        }
    }

    Err(match invalid {
        Some(value) => Error::extraction(format!(
            "wan_ip value '{}' is not a valid IPv4 address",
            value
        )),
        None => Error::extraction("no wan_ip field in status response"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HEALTH_BODY: &str = r#"{
        "meta": { "rc": "ok" },
        "data": [
            { "subsystem": "wlan", "num_user": 4 },
            { "subsystem": "wan", "wan_ip" : "203.0.113.7", "gw_name": "USG" }
        ]
    }"#;

    fn source(server: &MockServer) -> UnifiGatewaySource {
        UnifiGatewaySource::new(server.uri(), "admin", "secret", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_extract_structured() {
        assert_eq!(
            extract_wan_ip(HEALTH_BODY).unwrap(),
            Ipv4Addr::new(203, 0, 113, 7)
        );
    }

    #[test]
    fn test_extract_from_unstructured_text() {
        let body = r#"garbage before {"wan_ip" : "198.51.100.9"} trailing, not json"#;
        assert_eq!(
            extract_wan_ip(body).unwrap(),
            Ipv4Addr::new(198, 51, 100, 9)
        );
    }

    #[test]
    fn test_extract_tolerates_whitespace_variants() {
        for body in [
            r#""wan_ip":"192.0.2.1""#,
            r#""wan_ip" : "192.0.2.1""#,
            "\"wan_ip\"\n\t:  \"192.0.2.1\"",
        ] {
            assert_eq!(extract_wan_ip(body).unwrap(), Ipv4Addr::new(192, 0, 2, 1));
        }
    }

    #[test]
    fn test_extract_missing_field_is_error() {
        let err = extract_wan_ip(r#"{"data":[{"subsystem":"wan"}]}"#).unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
        assert!(err.to_string().contains("no wan_ip"));
    }

    #[test]
    fn test_extract_rejects_out_of_range_octets() {
        let err = extract_wan_ip(r#""wan_ip" : "999.1.1.1""#).unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
        assert!(err.to_string().contains("999.1.1.1"));
    }

    #[test]
    fn test_cookie_header_keeps_name_value_pairs() {
        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("unifises=abc123; Path=/; Secure; HttpOnly"),
        );
        headers.append(SET_COOKIE, HeaderValue::from_static("csrf_token=xyz789; Path=/"));
        headers.append(SET_COOKIE, HeaderValue::from_static("theme=dark"));

        assert_eq!(
            cookie_header(&headers).unwrap().as_bytes(),
            b"unifises=abc123;csrf_token=xyz789;theme=dark"
        );
    }

    #[test]
    fn test_cookie_header_empty_without_cookies() {
        assert!(cookie_header(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_cookie_header_keeps_non_ascii_cookies() {
        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_bytes(b"unifises=caf\xe9; Path=/").unwrap(),
        );
        headers.append(SET_COOKIE, HeaderValue::from_static("csrf_token=xyz789; Path=/"));

        assert_eq!(
            cookie_header(&headers).unwrap().as_bytes(),
            b"unifises=caf\xe9;csrf_token=xyz789"
        );
    }

    #[test]
    fn test_password_not_exposed_in_debug() {
        let source = UnifiGatewaySource::new(
            "https://192.168.1.1",
            "admin",
            "super_secret_pw",
            Duration::from_secs(5),
        )
        .unwrap();

        let debug_str = format!("{:?}", source);
        assert!(!debug_str.contains("super_secret_pw"));
        assert!(debug_str.contains("UnifiGatewaySource"));
    }

    #[tokio::test]
    async fn test_forwards_every_login_cookie() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/login"))
            .and(body_json(json!({ "username": "admin", "password": "secret" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .append_header("Set-Cookie", "unifises=abc123; Path=/; HttpOnly")
                    .append_header("Set-Cookie", "csrf_token=xyz789; Path=/"),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/s/default/stat/health"))
            .and(header("Cookie", "unifises=abc123;csrf_token=xyz789"))
            .respond_with(ResponseTemplate::new(200).set_body_string(HEALTH_BODY))
            .expect(1)
            .mount(&server)
            .await;

        let ip = source(&server).current().await.unwrap();
        assert_eq!(ip, Ipv4Addr::new(203, 0, 113, 7));
    }

    #[tokio::test]
    async fn test_no_cookie_header_without_session_cookies() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/s/default/stat/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string(HEALTH_BODY))
            .mount(&server)
            .await;

        source(&server).current().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let health = requests
            .iter()
            .find(|r| r.url.path() == "/api/s/default/stat/health")
            .unwrap();
        assert!(health.headers.get("cookie").is_none());
    }

    #[tokio::test]
    async fn test_login_rejected_is_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"meta":{"rc":"error"}}"#))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/s/default/stat/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string(HEALTH_BODY))
            .expect(0)
            .mount(&server)
            .await;

        let err = source(&server).current().await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[tokio::test]
    async fn test_status_body_without_wan_ip_is_extraction_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(ResponseTemplate::new(200).append_header("Set-Cookie", "unifises=abc"))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/s/default/stat/health"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"data":[{"subsystem":"wan","status":"error"}]}"#),
            )
            .mount(&server)
            .await;

        let err = source(&server).current().await.unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[tokio::test]
    async fn test_expired_session_is_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(ResponseTemplate::new(200).append_header("Set-Cookie", "unifises=abc"))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/s/default/stat/health"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = source(&server).current().await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[tokio::test]
    async fn test_unreachable_controller_is_http_error() {
        // Nothing listens on port 1
        let source = UnifiGatewaySource::new(
            "http://127.0.0.1:1",
            "admin",
            "secret",
            Duration::from_secs(2),
        )
        .unwrap();
        let err = source.current().await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
