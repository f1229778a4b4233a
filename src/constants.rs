use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

// Server-side pagination defaults for the message list
pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

pub const API_PREFIX: &str = "api";
pub const EMAIL_RESOURCE: &str = "email";
pub const MESSAGE_RESOURCE: &str = "message";
pub const MESSAGES_SEGMENT: &str = "messages";
pub const ATTACHMENT_SEGMENT: &str = "attachment";

pub const APP_DIR_NAME: &str = "secmail";
pub const SESSION_FILE_NAME: &str = "session.json";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const CONFIG_ENV_VAR: &str = "SECMAIL_CONFIG";

/// Local part plus domain, lowercase, as handed out by the server.
pub const ADDRESS_PATTERN: &str = r"^[a-z0-9]+@[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)*$";

pub const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("user-agent", concat!("secmail-client-rs/", env!("CARGO_PKG_VERSION"))),
    ("accept", "application/json"),
    ("accept-language", "en-US,en;q=0.5"),
];

pub const ATTACHMENT_HEADERS: &[(&str, &str)] = &[("accept", "*/*")];

pub fn default_headers() -> HeaderMap {
    build_headers(DEFAULT_HEADERS, &[])
}

/// Header map from `base` with `extras` layered on top. Later entries replace
/// earlier ones; pairs that are not valid header syntax are skipped.
pub fn build_headers(base: &[(&str, &str)], extras: &[(&str, &str)]) -> HeaderMap {
    base.iter()
        .chain(extras)
        .filter_map(|(name, value)| {
            Some((
                HeaderName::from_bytes(name.as_bytes()).ok()?,
                HeaderValue::from_str(value).ok()?,
            ))
        })
        .fold(HeaderMap::new(), |mut headers, (name, value)| {
            headers.insert(name, value);
            headers
        })
}
