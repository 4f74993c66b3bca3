//! Common test utilities for storage-queue integration tests
//!
//! This module provides:
//! - Connection strings pointing at a mock queue service
//! - Builders for the XML bodies and headers the queue service returns
//! - Provider and service constructors wired to a mock server

use base64::{engine::general_purpose::STANDARD, Engine};
use std::time::Duration;
use storage_queue::{
    AzureQueueProvider, MessageEncoding, QueueConfiguration, QueueService,
    StorageConnectionString,
};
use wiremock::{MockServer, ResponseTemplate};

pub const ACCOUNT: &str = "devaccount";
pub const ACCOUNT_KEY: &str = "a2V5LWZvci10ZXN0aW5nLW9ubHk=";
pub const HTTP_DATE: &str = "Fri, 26 Jun 2015 23:39:12 GMT";

/// Install a test log subscriber once; controlled by `RUST_LOG`
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Shared Key connection string for the mock server
pub fn connection_string(server: &MockServer) -> String {
    format!(
        "DefaultEndpointsProtocol=http;AccountName={};AccountKey={};QueueEndpoint={}/{}",
        ACCOUNT,
        ACCOUNT_KEY,
        server.uri(),
        ACCOUNT
    )
}

/// SAS connection string for the mock server
#[allow(dead_code)]
pub fn sas_connection_string(server: &MockServer) -> String {
    format!(
        "QueueEndpoint={}/{};SharedAccessSignature=sv=2021-08-06&sig=c2lnbmF0dXJl",
        server.uri(),
        ACCOUNT
    )
}

/// Path of a queue resource on the mock server
pub fn queue_path(queue: &str, rest: &str) -> String {
    if rest.is_empty() {
        format!("/{}/{}", ACCOUNT, queue)
    } else {
        format!("/{}/{}/{}", ACCOUNT, queue, rest)
    }
}

#[allow(dead_code)]
pub fn provider(server: &MockServer) -> AzureQueueProvider {
    let connection = StorageConnectionString::parse(&connection_string(server)).unwrap();
    AzureQueueProvider::new(connection, MessageEncoding::Base64, Duration::from_secs(5)).unwrap()
}

#[allow(dead_code)]
pub fn service(server: &MockServer) -> QueueService {
    QueueService::new(QueueConfiguration::new(connection_string(server))).unwrap()
}

pub fn encode(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// A message as it appears in a list response
pub struct ListedMessage<'a> {
    pub id: &'a str,
    pub receipt: &'a str,
    pub text: &'a str,
}

/// `<QueueMessagesList>` body with base64 message text
pub fn message_list_xml(messages: &[ListedMessage<'_>]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?><QueueMessagesList>");
    for message in messages {
        xml.push_str(&format!(
            "<QueueMessage>\
             <MessageId>{}</MessageId>\
             <InsertionTime>{date}</InsertionTime>\
             <ExpirationTime>{date}</ExpirationTime>\
             <PopReceipt>{}</PopReceipt>\
             <TimeNextVisible>{date}</TimeNextVisible>\
             <DequeueCount>1</DequeueCount>\
             <MessageText>{}</MessageText>\
             </QueueMessage>",
            message.id,
            message.receipt,
            encode(message.text),
            date = HTTP_DATE
        ));
    }
    xml.push_str("</QueueMessagesList>");
    xml
}

/// `<Error>` body the service returns on failure
#[allow(dead_code)]
pub fn error_xml(code: &str, message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?><Error><Code>{}</Code><Message>{}\nRequestId:00000000-0000-0000-0000-000000000000</Message></Error>",
        code, message
    )
}

/// 204 response of a successful Update Message call
#[allow(dead_code)]
pub fn update_response(receipt: &str) -> ResponseTemplate {
    ResponseTemplate::new(204)
        .insert_header("x-ms-popreceipt", receipt)
        .insert_header("x-ms-time-next-visible", HTTP_DATE)
}

/// 200 response carrying a message list
pub fn list_response(messages: &[ListedMessage<'_>]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/xml")
        .set_body_string(message_list_xml(messages))
}
