//! Azure Queue Storage provider implementation using the HTTP REST API.
//!
//! Requests go straight to the queue service endpoint rather than through an
//! SDK, which keeps the provider small and lets tests run it against a mock
//! HTTP server.
//!
//! ## Authentication
//!
//! - **Shared Key**: every request is signed with HMAC-SHA256 over the
//!   canonical string-to-sign, using the decoded account key
//! - **Shared Access Signature**: the pre-signed token is appended to the
//!   query string and no `Authorization` header is sent
//!
//! ## Message Text
//!
//! Message text travels inside `<MessageText>`. With
//! [`MessageEncoding::Base64`] the UTF-8 text is base64-encoded; with
//! [`MessageEncoding::Text`] it is XML-escaped.
//!
//! ## Example
//!
//! ```no_run
//! use storage_queue::providers::AzureQueueProvider;
//! use storage_queue::{MessageEncoding, StorageConnectionString};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connection = StorageConnectionString::parse("UseDevelopmentStorage=true")?;
//! let provider =
//!     AzureQueueProvider::new(connection, MessageEncoding::Base64, Duration::from_secs(30))?;
//! # Ok(())
//! # }
//! ```

use crate::backend::{
    LeasedMessage, PeekedMessage, ProviderType, QueueBackend, SentMessage, UpdateReceipt,
};
use crate::config::{MessageEncoding, QueueConfiguration};
use crate::connection::{AccountKey, StorageConnectionString, StorageCredentials};
use crate::error::{QueueError, SerializationError};
use crate::message::{MessageId, PopReceipt, QueueName};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client as HttpClient, Method, StatusCode};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use url::Url;

#[cfg(test)]
#[path = "azure_tests.rs"]
mod tests;

/// REST API version sent with every request
pub const API_VERSION: &str = "2021-08-06";

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
const POP_RECEIPT_HEADER: &str = "x-ms-popreceipt";
const TIME_NEXT_VISIBLE_HEADER: &str = "x-ms-time-next-visible";
const ERROR_CODE_HEADER: &str = "x-ms-error-code";

// ============================================================================
// Error Types
// ============================================================================

/// Azure Queue Storage specific errors
#[derive(Debug, thiserror::Error)]
pub enum AzureError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Storage service error: {status} {code} - {message}")]
    ServiceError {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Message not found or receipt expired: {0}")]
    MessageNotFound(String),

    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] SerializationError),
}

impl AzureError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Authentication(_) => false,
            Self::NetworkError(_) => true,
            Self::Timeout(_) => true,
            Self::ServiceError { status, .. } => *status >= 500 || *status == 429,
            Self::MessageNotFound(_) => false,
            Self::ConfigurationError(_) => false,
            Self::SerializationError(_) => false,
        }
    }

    /// Map Azure error to QueueError
    pub fn to_queue_error(self) -> QueueError {
        match self {
            Self::Authentication(message) => QueueError::AuthenticationFailed { message },
            Self::NetworkError(message) => QueueError::ConnectionFailed { message },
            Self::Timeout(duration) => QueueError::Timeout { duration },
            Self::ServiceError {
                status,
                code,
                message,
            } => QueueError::Provider {
                provider: ProviderType::AzureQueueStorage.to_string(),
                code,
                status,
                message,
            },
            Self::MessageNotFound(message_id) => QueueError::MessageNotFound { message_id },
            Self::ConfigurationError(message) => {
                QueueError::Configuration(crate::error::ConfigurationError::Invalid {
                    key: "connection_string".to_string(),
                    message,
                })
            }
            Self::SerializationError(error) => QueueError::Serialization(error),
        }
    }
}

impl From<AzureError> for QueueError {
    fn from(error: AzureError) -> Self {
        error.to_queue_error()
    }
}

// ============================================================================
// Shared Key Signing
// ============================================================================

type HmacSha256 = Hmac<Sha256>;

/// Headers of a request that take part in the Shared Key signature
#[derive(Debug)]
struct SignedContent<'a> {
    content_length: usize,
    content_type: Option<&'a str>,
}

/// Shared Key signer for request authentication
///
/// String-to-sign layout:
/// 1. Verb and the twelve standard header slots, one per line
/// 2. `x-ms-*` headers, lower-cased and sorted, as `name:value`
/// 3. Canonicalized resource: `/{account}{path}` followed by one
///    `\nname:value` line per query parameter, names lower-cased and sorted
///
/// ## References
///
/// - [Authorize with Shared Key](https://learn.microsoft.com/rest/api/storageservices/authorize-with-shared-key)
#[derive(Clone)]
struct SharedKeySigner {
    account_name: String,
    key: AccountKey,
}

impl SharedKeySigner {
    fn new(account_name: String, key: AccountKey) -> Self {
        Self { account_name, key }
    }

    /// Build the `Authorization` header value for a request
    fn authorization(
        &self,
        method: &Method,
        url: &Url,
        content: &SignedContent<'_>,
        ms_headers: &BTreeMap<String, String>,
    ) -> Result<String, AzureError> {
        let string_to_sign = self.string_to_sign(method, url, content, ms_headers);
        let signature = self.sign(&string_to_sign)?;
        Ok(format!("SharedKey {}:{}", self.account_name, signature))
    }

    fn string_to_sign(
        &self,
        method: &Method,
        url: &Url,
        content: &SignedContent<'_>,
        ms_headers: &BTreeMap<String, String>,
    ) -> String {
        // Zero length is signed as an empty slot
        let content_length = if content.content_length == 0 {
            String::new()
        } else {
            content.content_length.to_string()
        };

        let mut canonical_headers = String::new();
        for (name, value) in ms_headers {
            canonical_headers.push_str(&name.to_ascii_lowercase());
            canonical_headers.push(':');
            canonical_headers.push_str(value.trim());
            canonical_headers.push('\n');
        }

        format!(
            "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}{}",
            method.as_str(),
            content_length,
            content.content_type.unwrap_or_default(),
            canonical_headers,
            self.canonicalized_resource(url)
        )
    }

    fn canonicalized_resource(&self, url: &Url) -> String {
        let mut resource = format!("/{}{}", self.account_name, url.path());

        let mut parameters: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in url.query_pairs() {
            parameters
                .entry(name.to_ascii_lowercase())
                .or_default()
                .push(value.into_owned());
        }

        for (name, mut values) in parameters {
            values.sort();
            resource.push('\n');
            resource.push_str(&name);
            resource.push(':');
            resource.push_str(&values.join(","));
        }

        resource
    }

    fn sign(&self, string_to_sign: &str) -> Result<String, AzureError> {
        let mut mac = HmacSha256::new_from_slice(self.key.as_bytes())
            .map_err(|e| AzureError::ConfigurationError(format!("Unusable account key: {}", e)))?;
        mac.update(string_to_sign.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

// ============================================================================
// Azure Queue Storage Provider
// ============================================================================

/// Raw outcome of a request the caller accepted
struct AzureResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

/// Azure Queue Storage provider implementation
///
/// The provider is stateless apart from its HTTP connection pool and can be
/// shared across async tasks.
pub struct AzureQueueProvider {
    http_client: HttpClient,
    endpoint: Url,
    signer: Option<SharedKeySigner>,
    sas_token: Option<String>,
    encoding: MessageEncoding,
    request_timeout: Duration,
}

impl AzureQueueProvider {
    /// Create a provider for a parsed connection string
    ///
    /// `request_timeout` bounds every HTTP round trip.
    pub fn new(
        connection: StorageConnectionString,
        encoding: MessageEncoding,
        request_timeout: Duration,
    ) -> Result<Self, AzureError> {
        let (signer, sas_token) = match connection.credentials() {
            StorageCredentials::SharedKey { account_name, key } => (
                Some(SharedKeySigner::new(account_name.clone(), key.clone())),
                None,
            ),
            StorageCredentials::SharedAccessSignature(token) => (None, Some(token.clone())),
        };

        let http_client = HttpClient::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AzureError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: connection.queue_endpoint().clone(),
            signer,
            sas_token,
            encoding,
            request_timeout,
        })
    }

    /// Create a provider from service configuration
    pub fn from_configuration(config: &QueueConfiguration) -> Result<Self, QueueError> {
        let connection = StorageConnectionString::parse(&config.connection_string)?;
        Ok(Self::new(
            connection,
            config.message_encoding,
            config.cancellation_timeout(),
        )?)
    }

    /// Queue service endpoint requests are sent to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build the URL for a queue resource
    fn resource_url(
        &self,
        queue: &QueueName,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Url, AzureError> {
        let mut url = self.endpoint.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                AzureError::ConfigurationError(format!(
                    "Queue endpoint '{}' cannot carry a path",
                    self.endpoint
                ))
            })?;
            path.pop_if_empty().push(queue.as_str());
            for segment in segments {
                path.push(segment);
            }
        }

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }

        if let Some(token) = &self.sas_token {
            let combined = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{}&{}", existing, token),
                _ => token.clone(),
            };
            url.set_query(Some(&combined));
        }

        Ok(url)
    }

    /// Make an HTTP request to the queue service
    ///
    /// Statuses in `accepted` are returned to the caller; any other status is
    /// turned into an error from the response body.
    async fn make_request(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
        accepted: &[StatusCode],
    ) -> Result<AzureResponse, AzureError> {
        let body = body.unwrap_or_default();
        let content_type = (!body.is_empty()).then_some(XML_CONTENT_TYPE);

        let mut ms_headers = BTreeMap::new();
        ms_headers.insert(
            "x-ms-date".to_string(),
            Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        );
        ms_headers.insert("x-ms-version".to_string(), API_VERSION.to_string());

        let mut request = self.http_client.request(method.clone(), url.clone());

        if let Some(signer) = &self.signer {
            let content = SignedContent {
                content_length: body.len(),
                content_type,
            };
            let authorization = signer.authorization(&method, &url, &content, &ms_headers)?;
            request = request.header(reqwest::header::AUTHORIZATION, authorization);
        }

        for (name, value) in &ms_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        if let Some(content_type) = content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }

        if method == Method::PUT || method == Method::POST {
            request = request.header(CONTENT_LENGTH, body.len());
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AzureError::Timeout(self.request_timeout)
            } else if e.is_connect() {
                AzureError::NetworkError(format!("Connection failed: {}", e))
            } else {
                AzureError::NetworkError(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let response_body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                AzureError::Timeout(self.request_timeout)
            } else {
                AzureError::NetworkError(format!("Failed to read response body: {}", e))
            }
        })?;

        tracing::debug!(
            method = %method,
            path = url.path(),
            status = status.as_u16(),
            "Queue service request completed"
        );

        if !accepted.contains(&status) {
            return Err(parse_error_response(&response_body, &headers, status));
        }

        Ok(AzureResponse {
            status,
            headers,
            body: response_body,
        })
    }

    fn encode_text(&self, text: &str) -> String {
        match self.encoding {
            MessageEncoding::Base64 => STANDARD.encode(text.as_bytes()),
            MessageEncoding::Text => quick_xml::escape::escape(text).into_owned(),
        }
    }

    fn decode_text(&self, text: &str) -> Result<String, SerializationError> {
        match self.encoding {
            MessageEncoding::Base64 => {
                let bytes = STANDARD
                    .decode(text.trim())
                    .map_err(|e| SerializationError::InvalidBase64 {
                        message: e.to_string(),
                    })?;
                String::from_utf8(bytes).map_err(|_| SerializationError::InvalidUtf8)
            }
            MessageEncoding::Text => Ok(text.to_string()),
        }
    }

    fn message_body(&self, text: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><QueueMessage><MessageText>{}</MessageText></QueueMessage>",
            self.encode_text(text)
        )
    }
}

impl fmt::Debug for AzureQueueProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureQueueProvider")
            .field("endpoint", &self.endpoint.as_str())
            .field(
                "credentials",
                &if self.signer.is_some() {
                    "SharedKey(<redacted>)"
                } else {
                    "SharedAccessSignature(<redacted>)"
                },
            )
            .field("encoding", &self.encoding)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[async_trait]
impl QueueBackend for AzureQueueProvider {
    async fn queue_exists(&self, queue: &QueueName) -> Result<bool, QueueError> {
        let url = self.resource_url(queue, &[], &[("comp", "metadata".to_string())])?;
        let response = self
            .make_request(Method::GET, url, None, &[StatusCode::OK, StatusCode::NOT_FOUND])
            .await?;
        Ok(response.status == StatusCode::OK)
    }

    async fn create_queue_if_not_exists(&self, queue: &QueueName) -> Result<bool, QueueError> {
        let url = self.resource_url(queue, &[], &[])?;
        let response = self
            .make_request(
                Method::PUT,
                url,
                None,
                &[StatusCode::CREATED, StatusCode::NO_CONTENT, StatusCode::CONFLICT],
            )
            .await?;

        let created = response.status == StatusCode::CREATED;
        if response.status == StatusCode::CONFLICT {
            tracing::debug!(queue = %queue, "Queue already exists with different metadata");
        }
        Ok(created)
    }

    async fn send_message(
        &self,
        queue: &QueueName,
        text: &str,
    ) -> Result<SentMessage, QueueError> {
        let url = self.resource_url(queue, &["messages"], &[])?;
        let response = self
            .make_request(
                Method::POST,
                url,
                Some(self.message_body(text)),
                &[StatusCode::CREATED],
            )
            .await?;

        let mut entries = parse_message_list(&response.body)?;
        if entries.is_empty() {
            return Err(malformed("Put Message response contained no message").into());
        }
        Ok(entries.remove(0).into_sent()?)
    }

    async fn peek_messages(
        &self,
        queue: &QueueName,
        max_messages: u32,
    ) -> Result<Vec<PeekedMessage>, QueueError> {
        let url = self.resource_url(
            queue,
            &["messages"],
            &[
                ("peekonly", "true".to_string()),
                ("numofmessages", max_messages.to_string()),
            ],
        )?;
        let response = self
            .make_request(Method::GET, url, None, &[StatusCode::OK])
            .await?;

        let mut peeked = Vec::new();
        for entry in parse_message_list(&response.body)? {
            let text = self.decode_text(entry.message_text.as_deref().unwrap_or_default())?;
            peeked.push(PeekedMessage {
                id: entry.message_id()?,
                body: text,
                dequeue_count: entry.dequeue_count(),
            });
        }
        Ok(peeked)
    }

    async fn receive_messages(
        &self,
        queue: &QueueName,
        max_messages: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<LeasedMessage>, QueueError> {
        let url = self.resource_url(
            queue,
            &["messages"],
            &[
                ("numofmessages", max_messages.to_string()),
                ("visibilitytimeout", visibility_timeout.as_secs().to_string()),
            ],
        )?;
        let response = self
            .make_request(Method::GET, url, None, &[StatusCode::OK])
            .await?;

        let mut leased = Vec::new();
        for entry in parse_message_list(&response.body)? {
            let text = self.decode_text(entry.message_text.as_deref().unwrap_or_default())?;
            leased.push(LeasedMessage {
                id: entry.message_id()?,
                receipt: entry.pop_receipt()?,
                body: text,
                dequeue_count: entry.dequeue_count(),
                next_visible_at: entry.time_next_visible()?,
            });
        }
        Ok(leased)
    }

    async fn delete_message(
        &self,
        queue: &QueueName,
        id: &MessageId,
        receipt: &PopReceipt,
    ) -> Result<StatusCode, QueueError> {
        let url = self.resource_url(
            queue,
            &["messages", id.as_str()],
            &[("popreceipt", receipt.to_string())],
        )?;
        let response = self
            .make_request(
                Method::DELETE,
                url,
                None,
                &[
                    StatusCode::NO_CONTENT,
                    StatusCode::NOT_FOUND,
                    StatusCode::BAD_REQUEST,
                ],
            )
            .await?;

        if response.status != StatusCode::NO_CONTENT {
            let code = error_code(&response.body, &response.headers)
                .unwrap_or_else(|| "Unknown".to_string());
            tracing::warn!(
                queue = %queue,
                message_id = %id,
                status = response.status.as_u16(),
                error_code = %code,
                "Message was not deleted"
            );
        }
        Ok(response.status)
    }

    async fn update_message(
        &self,
        queue: &QueueName,
        id: &MessageId,
        receipt: &PopReceipt,
        body: Option<&str>,
        visibility_timeout: Duration,
    ) -> Result<UpdateReceipt, QueueError> {
        let url = self.resource_url(
            queue,
            &["messages", id.as_str()],
            &[
                ("popreceipt", receipt.to_string()),
                ("visibilitytimeout", visibility_timeout.as_secs().to_string()),
            ],
        )?;
        let response = self
            .make_request(
                Method::PUT,
                url,
                body.map(|text| self.message_body(text)),
                &[StatusCode::NO_CONTENT],
            )
            .await
            .map_err(|e| receipt_error(e, id))?;

        Ok(parse_update_headers(&response.headers)?)
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::AzureQueueStorage
    }
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Fields of one `<QueueMessage>` element
#[derive(Debug, Default)]
struct MessageEntry {
    message_id: Option<String>,
    insertion_time: Option<String>,
    expiration_time: Option<String>,
    pop_receipt: Option<String>,
    time_next_visible: Option<String>,
    dequeue_count: Option<String>,
    message_text: Option<String>,
}

impl MessageEntry {
    /// Record a field value; message text is kept verbatim, metadata is trimmed
    fn set(&mut self, field: &[u8], value: String) {
        let metadata = || Some(value.trim().to_string());
        match field {
            b"MessageId" => self.message_id = metadata(),
            b"InsertionTime" => self.insertion_time = metadata(),
            b"ExpirationTime" => self.expiration_time = metadata(),
            b"PopReceipt" => self.pop_receipt = metadata(),
            b"TimeNextVisible" => self.time_next_visible = metadata(),
            b"DequeueCount" => self.dequeue_count = metadata(),
            b"MessageText" => self.message_text = Some(value),
            _ => {}
        }
    }

    fn message_id(&self) -> Result<MessageId, SerializationError> {
        let id = required(&self.message_id, "MessageId")?;
        MessageId::new(id).map_err(|e| malformed(e.to_string()))
    }

    fn pop_receipt(&self) -> Result<PopReceipt, SerializationError> {
        let receipt = required(&self.pop_receipt, "PopReceipt")?;
        PopReceipt::new(receipt).map_err(|e| malformed(e.to_string()))
    }

    fn time_next_visible(&self) -> Result<DateTime<Utc>, SerializationError> {
        parse_http_date(required(&self.time_next_visible, "TimeNextVisible")?)
    }

    fn dequeue_count(&self) -> u32 {
        self.dequeue_count
            .as_deref()
            .and_then(|c| c.trim().parse().ok())
            .unwrap_or(0)
    }

    fn into_sent(self) -> Result<SentMessage, SerializationError> {
        Ok(SentMessage {
            id: self.message_id()?,
            receipt: self.pop_receipt()?,
            inserted_at: parse_http_date(required(&self.insertion_time, "InsertionTime")?)?,
            expires_at: parse_http_date(required(&self.expiration_time, "ExpirationTime")?)?,
            next_visible_at: self.time_next_visible()?,
        })
    }
}

/// Parse a `<QueueMessagesList>` response
fn parse_message_list(xml: &str) -> Result<Vec<MessageEntry>, SerializationError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    // Whitespace in <MessageText> is payload
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut entries = Vec::new();
    let mut current: Option<MessageEntry> = None;
    let mut field: Option<Vec<u8>> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"QueueMessage" => current = Some(MessageEntry::default()),
                name if current.is_some() => field = Some(name.to_vec()),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if let Some(entry) = current.as_mut() {
                    entry.set(e.name().as_ref(), String::new());
                }
            }
            Ok(Event::Text(e)) => {
                if let (Some(entry), Some(name)) = (current.as_mut(), field.as_deref()) {
                    let text = e
                        .unescape()
                        .map_err(|e| malformed(format!("Failed to parse XML: {}", e)))?;
                    entry.set(name, text.into_owned());
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"QueueMessage" {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed(format!("XML parsing error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

/// Read the receipt and visibility issued by an Update Message call
fn parse_update_headers(headers: &HeaderMap) -> Result<UpdateReceipt, SerializationError> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| malformed(format!("Update response is missing {}", name)))
    };

    let receipt = PopReceipt::new(header(POP_RECEIPT_HEADER)?).map_err(|e| malformed(e.to_string()))?;
    let next_visible_at = parse_http_date(&header(TIME_NEXT_VISIBLE_HEADER)?)?;

    Ok(UpdateReceipt {
        receipt,
        next_visible_at,
    })
}

/// Extract the service error code from an error response
fn error_code(xml: &str, headers: &HeaderMap) -> Option<String> {
    parse_error_body(xml).0.or_else(|| {
        headers
            .get(ERROR_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    })
}

/// Read `<Error><Code>` and `<Error><Message>` from an error body
fn parse_error_body(xml: &str) -> (Option<String>, Option<String>) {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut error_code = None;
    let mut error_message = None;
    let mut in_error = false;
    let mut in_code = false;
    let mut in_message = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Error" => in_error = true,
                b"Code" if in_error => in_code = true,
                b"Message" if in_error => in_message = true,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_code {
                    error_code = e.unescape().ok().map(|s| s.into_owned());
                    in_code = false;
                } else if in_message {
                    error_message = e.unescape().ok().map(|s| s.into_owned());
                    in_message = false;
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Error" => {
                in_error = false;
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    (error_code, error_message)
}

/// Map an unaccepted response to an error
fn parse_error_response(xml: &str, headers: &HeaderMap, status: StatusCode) -> AzureError {
    let (_, message) = parse_error_body(xml);
    let code = error_code(xml, headers).unwrap_or_else(|| "Unknown".to_string());
    let message = message
        .map(|m| m.lines().next().unwrap_or_default().to_string())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

    match code.as_str() {
        "AuthenticationFailed"
        | "AuthorizationFailure"
        | "AuthorizationPermissionMismatch"
        | "InvalidAuthenticationInfo" => AzureError::Authentication(format!("{}: {}", code, message)),
        _ if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN => {
            AzureError::Authentication(format!("{}: {}", code, message))
        }
        _ => AzureError::ServiceError {
            status: status.as_u16(),
            code,
            message,
        },
    }
}

/// Map a rejected receipt on update to `MessageNotFound`
///
/// Only a 404 or a 400 carrying `PopReceiptMismatch` means the message or its
/// lease is gone; any other 400 stays a service error.
fn receipt_error(error: AzureError, id: &MessageId) -> AzureError {
    match error {
        AzureError::ServiceError { status: 404, .. } => AzureError::MessageNotFound(id.to_string()),
        AzureError::ServiceError { status: 400, ref code, .. } if code == "PopReceiptMismatch" => {
            AzureError::MessageNotFound(id.to_string())
        }
        other => other,
    }
}

fn parse_http_date(value: &str) -> Result<DateTime<Utc>, SerializationError> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| malformed(format!("Invalid date '{}': {}", value, e)))
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, SerializationError> {
    value
        .as_deref()
        .ok_or_else(|| malformed(format!("{} not found in response", name)))
}

fn malformed(message: impl Into<String>) -> SerializationError {
    SerializationError::MalformedResponse {
        message: message.into(),
    }
}
