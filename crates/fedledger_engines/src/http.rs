#![forbid(unsafe_code)]

use std::io::Read;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use fedledger_kernel_contracts::CollaboratorError;
use url::Url;

pub const CONNECT_TIMEOUT_MS_DEFAULT: u64 = 3_000;
pub const REQUEST_TIMEOUT_MS_DEFAULT: u64 = 10_000;
pub const RESPONSE_BODY_MAX_BYTES: u64 = 16 * 1024 * 1024;

const USER_AGENT: &str = concat!("fedledger/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl BasicAuth {
    fn header_value(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!("Basic {}", BASE64_STANDARD.encode(raw.as_bytes()))
    }
}

/// Where and how to reach one collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpEndpointConfig {
    pub endpoint: Url,
    pub bearer_token: Option<String>,
    pub basic_auth: Option<BasicAuth>,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl HttpEndpointConfig {
    pub fn new(endpoint: &str) -> Result<Self, String> {
        let trimmed = endpoint.trim();
        let endpoint =
            Url::parse(trimmed).map_err(|err| format!("invalid endpoint '{trimmed}': {err}"))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(format!(
                "invalid endpoint '{trimmed}': scheme must be http or https"
            ));
        }
        if endpoint.cannot_be_a_base() {
            return Err(format!("invalid endpoint '{trimmed}': must be a base url"));
        }
        Ok(Self {
            endpoint,
            bearer_token: None,
            basic_auth: None,
            connect_timeout_ms: CONNECT_TIMEOUT_MS_DEFAULT,
            request_timeout_ms: REQUEST_TIMEOUT_MS_DEFAULT,
        })
    }

    pub fn with_timeouts(mut self, connect_timeout_ms: u64, request_timeout_ms: u64) -> Self {
        self.connect_timeout_ms = connect_timeout_ms;
        self.request_timeout_ms = request_timeout_ms;
        self
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token;
        self
    }

    pub fn with_basic_auth(mut self, auth: Option<BasicAuth>) -> Self {
        self.basic_auth = auth;
        self
    }

    /// Appends percent-encoded path segments to the configured base.
    pub fn url_for(&self, segments: &[&str]) -> Result<Url, CollaboratorError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| CollaboratorError::transport("endpoint cannot be a base url"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn authorize(&self, req: ureq::Request) -> ureq::Request {
        if let Some(token) = self.bearer_token.as_ref() {
            return req.set("authorization", &format!("Bearer {token}"));
        }
        if let Some(auth) = self.basic_auth.as_ref() {
            return req.set("authorization", &auth.header_value());
        }
        req
    }
}

pub(crate) fn build_http_agent(config: &HttpEndpointConfig) -> ureq::Agent {
    let connect = Duration::from_millis(config.connect_timeout_ms.max(100));
    let request = Duration::from_millis(config.request_timeout_ms.max(100));
    ureq::AgentBuilder::new()
        .timeout_connect(connect)
        .timeout_read(request)
        .timeout_write(request)
        .user_agent(USER_AGENT)
        .build()
}

/// Maps a failed call; non-2xx replies keep the collaborator's raw body.
pub(crate) fn collaborator_error_from_ureq(err: ureq::Error) -> CollaboratorError {
    match err {
        ureq::Error::Status(status, resp) => {
            let body = resp.into_string().unwrap_or_default();
            CollaboratorError::status(status, body)
        }
        ureq::Error::Transport(transport) => collaborator_error_from_transport(transport),
    }
}

fn collaborator_error_from_transport(transport: ureq::Transport) -> CollaboratorError {
    let combined = format!("{:?} {}", transport.kind(), transport);
    match classify_transport_error_kind(&combined) {
        "timeout" => CollaboratorError::timeout(combined),
        _ => CollaboratorError::transport(combined),
    }
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    }
}

/// Reads a successful reply, treating anything outside 2xx as a status error.
pub(crate) fn read_success_body(resp: ureq::Response) -> Result<Vec<u8>, CollaboratorError> {
    let status = resp.status();
    let mut body = Vec::new();
    resp.into_reader()
        .take(RESPONSE_BODY_MAX_BYTES)
        .read_to_end(&mut body)
        .map_err(|err| CollaboratorError::transport(format!("reading response body: {err}")))?;
    if !(200..=299).contains(&status) {
        return Err(CollaboratorError::status(
            status,
            String::from_utf8_lossy(&body).into_owned(),
        ));
    }
    Ok(body)
}
