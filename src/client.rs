use crate::config::Config;
use crate::constants::*;
use crate::error::{Error, Result};
use crate::models::{MailboxSession, Message, MessagePage, MessageSummary};
use regex::Regex;
use reqwest::{Client, ClientBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

/// What a request is about, for mapping "gone" statuses.
#[derive(Debug, Clone, Copy)]
enum Scope<'a> {
    Address(&'a str),
    Message(&'a str),
}

impl Scope<'_> {
    fn is_gone(&self, status: StatusCode) -> bool {
        match self {
            Scope::Address(_) => status == StatusCode::NOT_FOUND || status == StatusCode::GONE,
            // 404 here means the message is missing, not that the address died
            Scope::Message(_) => status == StatusCode::GONE,
        }
    }

    fn describe(&self) -> String {
        match self {
            Scope::Address(addr) => format!("address {addr}"),
            Scope::Message(id) => format!("message {id}"),
        }
    }
}

/// Async client for the secmail REST API.
#[derive(Debug, Clone)]
pub struct SecmailClient {
    base_url: Url,
    client: Client,
    address_re: Regex,
}

impl SecmailClient {
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("invalid base url {:?}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "base url {:?} cannot carry a path",
                config.base_url
            )));
        }

        let mut builder = ClientBuilder::new()
            .timeout(config.timeout())
            .default_headers(default_headers());

        if let Some(proxy) = &config.proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(proxy).map_err(Error::Http)?);
        }

        let client = builder.build().map_err(Error::Http)?;
        let address_re = Regex::new(ADDRESS_PATTERN).map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            base_url,
            client,
            address_re,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Check that `address` has the shape the server hands out.
    pub fn validate_address(&self, address: &str) -> Result<()> {
        if self.address_re.is_match(address) {
            Ok(())
        } else {
            Err(Error::InvalidAddress(address.to_string()))
        }
    }

    /// Allocate a new disposable address.
    pub async fn create_address(&self) -> Result<MailboxSession> {
        let url = self.endpoint(&[EMAIL_RESOURCE])?;
        tracing::debug!(%url, "creating address");
        let resp = self.client.post(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status { status, body });
        }
        read_json(resp).await
    }

    /// Look up an address; fails with `SessionExpired` once the server forgot it.
    pub async fn get_address(&self, address: &str) -> Result<MailboxSession> {
        self.validate_address(address)?;
        let url = self.endpoint(&[EMAIL_RESOURCE, address])?;
        tracing::debug!(%url, "validating address");
        let resp = self.client.get(url).send().await?;
        let resp = check_status(resp, Scope::Address(address)).await?;
        read_json(resp).await
    }

    /// Fetch one page of the inbox for `address`.
    pub async fn list_messages(&self, address: &str, page: u32, size: u32) -> Result<MessagePage> {
        self.validate_address(address)?;
        let url = self.endpoint(&[EMAIL_RESOURCE, address, MESSAGES_SEGMENT])?;
        tracing::debug!(%url, page, size, "listing messages");
        let resp = self
            .client
            .get(url)
            .query(&[("page", page), ("size", size)])
            .send()
            .await?;
        let resp = check_status(resp, Scope::Address(address)).await?;
        let body = resp.text().await?;
        if body.trim_start().starts_with('[') {
            return Err(Error::MalformedResponse(
                "message list is a bare array, expected {\"messages\": [...]}".into(),
            ));
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch a full message by id.
    pub async fn get_message(&self, message_id: &str) -> Result<Message> {
        let url = self.endpoint(&[MESSAGE_RESOURCE, message_id])?;
        tracing::debug!(%url, "fetching message");
        let resp = self.client.get(url).send().await?;
        let resp = check_status(resp, Scope::Message(message_id)).await?;
        read_json(resp).await
    }

    /// Download the raw bytes of an attachment.
    pub async fn download_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>> {
        let url = self.endpoint(&[MESSAGE_RESOURCE, message_id, ATTACHMENT_SEGMENT, attachment_id])?;
        tracing::debug!(%url, "downloading attachment");
        let resp = self
            .client
            .get(url)
            .headers(build_headers(DEFAULT_HEADERS, ATTACHMENT_HEADERS))
            .send()
            .await?;
        let resp = check_status(resp, Scope::Message(message_id)).await?;
        let bytes = resp.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// Delete an address and everything received on it.
    pub async fn delete_address(&self, address: &str) -> Result<()> {
        self.validate_address(address)?;
        let url = self.endpoint(&[EMAIL_RESOURCE, address])?;
        tracing::debug!(%url, "deleting address");
        let resp = self.client.delete(url).send().await?;
        check_status(resp, Scope::Address(address)).await?;
        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("base url {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .push(API_PREFIX)
            .extend(segments);
        Ok(url)
    }
}

async fn check_status(resp: Response, scope: Scope<'_>) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if scope.is_gone(status) {
        return Err(Error::SessionExpired {
            resource: scope.describe(),
        });
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Status { status, body })
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let body = resp.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// One-shot inbox check without a store.
pub async fn check_inbox(address: &str, config: &Config) -> Result<Vec<MessageSummary>> {
    let client = SecmailClient::new(config)?;
    let page = client
        .list_messages(address, DEFAULT_PAGE, config.page_size)
        .await?;
    Ok(page.messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const ADDR: &str = "abcd123456@example.com";

    fn client_for(server: &Server) -> SecmailClient {
        let cfg = Config {
            base_url: server.url(),
            ..Config::default()
        };
        SecmailClient::new(&cfg).unwrap()
    }

    #[test]
    fn rejects_bad_base_url() {
        let cfg = Config {
            base_url: "not a url".into(),
            ..Config::default()
        };
        assert!(matches!(SecmailClient::new(&cfg), Err(Error::Config(_))));
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let cfg = Config {
            base_url: "https://mail.example.com/secmail/".into(),
            ..Config::default()
        };
        let client = SecmailClient::new(&cfg).unwrap();
        let url = client.endpoint(&[EMAIL_RESOURCE, ADDR, MESSAGES_SEGMENT]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://mail.example.com/secmail/api/email/abcd123456@example.com/messages"
        );

        let url = client.endpoint(&[MESSAGE_RESOURCE, "a/b c"]).unwrap();
        assert_eq!(url.path(), "/secmail/api/message/a%2Fb%20c");
    }

    #[test]
    fn validates_address_shape() {
        let client = SecmailClient::new(&Config::default()).unwrap();
        assert!(client.validate_address(ADDR).is_ok());
        assert!(client.validate_address("ABC@example.com").is_err());
        assert!(client.validate_address("abc@example.com/../x").is_err());
        assert!(client.validate_address("").is_err());
    }

    #[tokio::test]
    async fn create_address_parses_session() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/email")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"address":"{ADDR}","expiresAt":"2030-01-01T00:00:00Z"}}"#))
            .create_async()
            .await;

        let session = client_for(&server).create_address().await.unwrap();
        assert_eq!(session.address, ADDR);
        assert_eq!(session.expires_at.to_rfc3339(), "2030-01-01T00:00:00+00:00");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_address_surfaces_server_errors() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/email")
            .with_status(500)
            .with_body(r#"{"error":"Failed to create email"}"#)
            .create_async()
            .await;

        let err = client_for(&server).create_address().await.unwrap_err();
        match err {
            Error::Status { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert!(body.contains("Failed to create email"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_messages_sends_pagination() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", format!("/api/email/{ADDR}/messages").as_str())
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "2".into()),
                Matcher::UrlEncoded("size".into(), "5".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"messages":[{"id":"m1","from":"a@x.io","subject":"hello","receivedAt":"2030-01-01T00:00:00Z"}],"total":6,"page":2,"size":5}"#,
            )
            .create_async()
            .await;

        let page = client_for(&server).list_messages(ADDR, 2, 5).await.unwrap();
        assert_eq!(page.messages.len(), 1);
        assert_eq!(page.messages[0].subject, "hello");
        assert_eq!(page.total, 6);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn list_messages_maps_gone_and_not_found() {
        let mut server = Server::new_async().await;
        let path = format!("/api/email/{ADDR}/messages");
        server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_status(410)
            .with_body(r#"{"error":"Email address has expired"}"#)
            .create_async()
            .await;
        let err = client_for(&server).list_messages(ADDR, 1, 20).await.unwrap_err();
        assert!(err.is_gone());

        let mut server = Server::new_async().await;
        server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        let err = client_for(&server).list_messages(ADDR, 1, 20).await.unwrap_err();
        assert!(err.is_gone());
    }

    #[tokio::test]
    async fn list_messages_rejects_bare_array() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", format!("/api/email/{ADDR}/messages").as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"id":"m1"}]"#)
            .create_async()
            .await;

        let err = client_for(&server).list_messages(ADDR, 1, 20).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn invalid_address_never_hits_the_network() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = client_for(&server)
            .list_messages("../admin", 1, 20)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn message_not_found_is_not_gone() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/message/m404")
            .with_status(404)
            .with_body(r#"{"error":"Message not found"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/message/m410")
            .with_status(410)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.get_message("m404").await.unwrap_err();
        assert!(matches!(err, Error::Status { status, .. } if status == StatusCode::NOT_FOUND));
        let err = client.get_message("m410").await.unwrap_err();
        assert!(err.is_gone());
    }

    #[tokio::test]
    async fn download_attachment_returns_bytes() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/message/m1/attachment/a1")
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body(vec![0u8, 1, 2, 255])
            .create_async()
            .await;

        let bytes = client_for(&server)
            .download_attachment("m1", "a1")
            .await
            .unwrap();
        assert_eq!(bytes, vec![0u8, 1, 2, 255]);
    }

    #[tokio::test]
    async fn delete_address_accepts_no_content() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", format!("/api/email/{ADDR}").as_str())
            .with_status(204)
            .create_async()
            .await;

        client_for(&server).delete_address(ADDR).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let cfg = Config {
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
            ..Config::default()
        };
        let err = SecmailClient::new(&cfg)
            .unwrap()
            .get_address(ADDR)
            .await
            .unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn check_inbox_returns_first_page() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", format!("/api/email/{ADDR}/messages").as_str())
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_status(200)
            .with_body(r#"{"messages":[],"total":0,"page":1,"size":20}"#)
            .create_async()
            .await;

        let cfg = Config {
            base_url: server.url(),
            ..Config::default()
        };
        let messages = check_inbox(ADDR, &cfg).await.unwrap();
        assert!(messages.is_empty());
    }
}
