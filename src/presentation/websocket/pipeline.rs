//! Delivery Pipeline
//!
//! validate -> membership check -> persist -> fan-out. Persist and fan-out
//! are serialized per chat.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::connection::ConnectionHandle;
use super::error::{CapacityError, DeliveryError};
use super::messages::ServerFrame;
use super::registry::Registry;
use crate::config::HubSettings;
use crate::domain::{ChatId, MembershipStore, Message, MessageDraft, MessageStore};
use crate::infrastructure::metrics;

/// Outcome of handing a persisted message to the chat's subscribers.
#[derive(Debug, Default)]
pub struct FanOutReport {
    pub delivered: usize,
    pub dropped: usize,
    /// Subscribers whose queue was full
    pub saturated: Vec<Arc<ConnectionHandle>>,
}

/// A persisted message and what happened when it was fanned out.
#[derive(Debug)]
pub struct Delivery {
    pub message: Message,
    pub report: FanOutReport,
}

pub struct DeliveryPipeline {
    membership: Arc<dyn MembershipStore>,
    store: Arc<dyn MessageStore>,
    chat_locks: DashMap<ChatId, Arc<Mutex<()>>>,
    persist_timeout: Duration,
    max_content_length: usize,
}

impl DeliveryPipeline {
    pub fn new(
        membership: Arc<dyn MembershipStore>,
        store: Arc<dyn MessageStore>,
        settings: &HubSettings,
    ) -> Self {
        Self {
            membership,
            store,
            chat_locks: DashMap::new(),
            persist_timeout: settings.persist_timeout(),
            max_content_length: settings.max_content_length,
        }
    }

    /// Content checks with no side effects.
    pub fn validate(&self, draft: &MessageDraft) -> Result<(), DeliveryError> {
        if draft.content.trim().is_empty() {
            return Err(DeliveryError::EmptyContent);
        }
        if draft.content.chars().count() > self.max_content_length {
            return Err(DeliveryError::ContentTooLong {
                max: self.max_content_length,
            });
        }
        Ok(())
    }

    /// Validate, persist and fan out one message.
    ///
    /// Only members reach the per-chat lock. Under it, persistence and
    /// fan-out run one submission at a time, so subscribers see a chat's
    /// messages in persistence order. Other chats are not blocked.
    ///
    /// A write that has been handed to the store is never abandoned: the
    /// store bounds its own latency, and once it returns the message is
    /// fanned out.
    pub async fn submit(&self, draft: MessageDraft, registry: &Registry) -> Result<Delivery, DeliveryError> {
        self.validate(&draft)?;
        self.check_membership(&draft).await?;

        let result = {
            let lock = self.chat_lock(&draft.chat_id);
            let _guard = lock.lock().await;

            self.persist(&draft).await.map(|message| {
                let report = self.fan_out(&message, registry);
                Delivery { message, report }
            })
        };
        self.release_chat_lock(&draft.chat_id);

        result
    }

    fn chat_lock(&self, chat_id: &ChatId) -> Arc<Mutex<()>> {
        Arc::clone(&self.chat_locks.entry(chat_id.clone()).or_default())
    }

    /// Drop the chat's lock entry once nobody holds or waits on it.
    fn release_chat_lock(&self, chat_id: &ChatId) {
        self.chat_locks
            .remove_if(chat_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn check_membership(&self, draft: &MessageDraft) -> Result<(), DeliveryError> {
        let lookup = self.membership.is_member(draft.sender_id, &draft.chat_id);
        match timeout(self.persist_timeout, lookup).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(DeliveryError::NotAMember),
            Ok(Err(e)) => Err(DeliveryError::Persistence(e.to_string())),
            Err(_) => Err(DeliveryError::Persistence(format!(
                "membership lookup timed out after {:?}",
                self.persist_timeout
            ))),
        }
    }

    async fn persist(&self, draft: &MessageDraft) -> Result<Message, DeliveryError> {
        let started = Instant::now();
        let result = self.store.persist(draft).await;
        let elapsed = started.elapsed();
        metrics::record_persist_duration(elapsed.as_secs_f64());

        if elapsed > self.persist_timeout {
            tracing::warn!(
                chat_id = %draft.chat_id,
                elapsed_ms = elapsed.as_millis() as u64,
                "Message store exceeded its time budget"
            );
        }

        result.map_err(|e| DeliveryError::Persistence(e.to_string()))
    }

    fn fan_out(&self, message: &Message, registry: &Registry) -> FanOutReport {
        let mut report = FanOutReport::default();

        for conn in registry.subscribers_of(&message.chat_id) {
            if conn.user_id() == message.sender_id {
                continue;
            }
            match conn.try_enqueue(ServerFrame::MessageCreate(message.clone())) {
                Ok(()) => report.delivered += 1,
                Err(CapacityError::Full) => {
                    tracing::warn!(
                        message_id = message.id,
                        chat_id = %message.chat_id,
                        user_id = %conn.user_id(),
                        connection_id = conn.id(),
                        "Outbound queue full, message dropped for subscriber"
                    );
                    report.dropped += 1;
                    report.saturated.push(conn);
                }
                Err(CapacityError::Closed) => {
                    tracing::debug!(
                        message_id = message.id,
                        connection_id = conn.id(),
                        "Subscriber closed during fan-out"
                    );
                    report.dropped += 1;
                }
            }
        }

        metrics::record_fan_out(report.delivered, report.dropped);
        report
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.chat_locks.len()
    }
}
