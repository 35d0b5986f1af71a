//! Message dispatcher: delay, media fetch, send, and log.
//!
//! A send is all-or-nothing from the log's point of view: the record is
//! appended only after the transport accepted the message, and any earlier
//! failure aborts without touching the log.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use tracing::{error, info};

use chatgate_types::error::DispatchError;
use chatgate_types::message::{
    DEFAULT_DOCUMENT_FILE_NAME, DEFAULT_DOCUMENT_MIMETYPE, MessageContent, NewMessageRecord,
    OutboundPayload, SendReceipt,
};

use crate::media::MediaFetcher;
use crate::repository::message::MessageLog;
use crate::session::registry::SessionHandle;
use crate::transport::TransportConnection;

/// Log timestamp layout, e.g. `17/10/2026, 09:05:00`.
const TIMESTAMP_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

/// Format `at` in the fixed `offset` zone for a message record.
pub fn format_timestamp(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format(TIMESTAMP_FORMAT).to_string()
}

/// Sends messages through live sessions and records each successful send.
///
/// Generic over `MessageLog` and `MediaFetcher` (chatgate-core never depends
/// on chatgate-infra).
pub struct MessageDispatcher<L: MessageLog, M: MediaFetcher> {
    log: L,
    fetcher: M,
    offset: FixedOffset,
}

impl<L: MessageLog, M: MediaFetcher> MessageDispatcher<L, M> {
    pub fn new(log: L, fetcher: M, offset: FixedOffset) -> Self {
        Self {
            log,
            fetcher,
            offset,
        }
    }

    /// Build a dispatcher stamping records `offset_minutes` from UTC.
    ///
    /// Out-of-range offsets fall back to UTC.
    pub fn with_offset_minutes(log: L, fetcher: M, offset_minutes: i32) -> Self {
        let offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        Self::new(log, fetcher, offset)
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Send `content` to `destination` through `session` after `delay`.
    pub async fn send<T: TransportConnection>(
        &self,
        session: &SessionHandle<T>,
        destination: &str,
        content: MessageContent,
        delay: Duration,
    ) -> Result<SendReceipt, DispatchError> {
        let kind = content_kind(&content);
        match self.try_send(session, destination, content, delay).await {
            Ok(receipt) => {
                info!(
                    session_id = %session.id(),
                    receiver = %destination,
                    kind,
                    message_id = %receipt.message_id,
                    "Message sent"
                );
                Ok(receipt)
            }
            Err(e) => {
                error!(
                    session_id = %session.id(),
                    receiver = %destination,
                    kind,
                    error = %e,
                    "Message dispatch failed"
                );
                Err(e)
            }
        }
    }

    async fn try_send<T: TransportConnection>(
        &self,
        session: &SessionHandle<T>,
        destination: &str,
        content: MessageContent,
        delay: Duration,
    ) -> Result<SendReceipt, DispatchError> {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let text = content.log_text().to_string();
        let link = content.media_url().unwrap_or_default().to_string();
        let payload = self.build_payload(content).await?;

        let connection = session.connection();
        let receipt = connection.send(destination, payload).await?;

        // Identity is read after the send; it may have changed since creation.
        let identity = connection.identity().unwrap_or_default();
        let record = NewMessageRecord {
            phone: identity.id,
            name: identity.name.unwrap_or_default(),
            receiver: destination.to_string(),
            text,
            link,
            timestamp: format_timestamp(Utc::now(), self.offset),
        };
        self.log.append(&record).await?;

        Ok(receipt)
    }

    async fn build_payload(&self, content: MessageContent) -> Result<OutboundPayload, DispatchError> {
        Ok(match content {
            MessageContent::Text { body } => OutboundPayload::Text { text: body },
            MessageContent::Document {
                url,
                mimetype,
                file_name,
                ..
            } => OutboundPayload::Document {
                data: self.fetcher.fetch(&url).await?,
                mimetype: mimetype.unwrap_or_else(|| DEFAULT_DOCUMENT_MIMETYPE.to_string()),
                file_name: file_name.unwrap_or_else(|| DEFAULT_DOCUMENT_FILE_NAME.to_string()),
            },
            MessageContent::Image { url, caption } => OutboundPayload::Image {
                data: self.fetcher.fetch(&url).await?,
                caption: caption.unwrap_or_default(),
            },
        })
    }
}

fn content_kind(content: &MessageContent) -> &'static str {
    match content {
        MessageContent::Text { .. } => "text",
        MessageContent::Document { .. } => "document",
        MessageContent::Image { .. } => "image",
    }
}
