//! Session Manager
//!
//! The long-lived coordinator in front of the registry and the delivery
//! pipeline. Connects and disconnects sessions, accepts submissions and
//! applies the overflow policy to slow subscribers.

use std::slice;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::timeout;

use super::connection::{ConnectionHandle, Outbox};
use super::error::DeliveryError;
use super::pipeline::{Delivery, DeliveryPipeline};
use super::registry::Registry;
use crate::application::services::MembershipNotifier;
use crate::config::{HubSettings, OverflowPolicy};
use crate::domain::{ChatId, MembershipStore, Message, MessageDraft, MessageStore, UserId};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

pub struct Hub {
    registry: Arc<Registry>,
    pipeline: Arc<DeliveryPipeline>,
    membership: Arc<dyn MembershipStore>,
    settings: HubSettings,
}

impl Hub {
    pub fn new(
        membership: Arc<dyn MembershipStore>,
        store: Arc<dyn MessageStore>,
        settings: HubSettings,
    ) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            pipeline: Arc::new(DeliveryPipeline::new(membership.clone(), store, &settings)),
            membership,
            settings,
        }
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    /// Register a new session for an authenticated user.
    ///
    /// The user's chats are read after the connection is registered, so a
    /// membership change that lands in between is picked up either by the
    /// read or by the notification. A previous session of the same user is
    /// closed.
    pub async fn connect(&self, user_id: UserId) -> Result<(Arc<ConnectionHandle>, Outbox), AppError> {
        let (handle, outbox) = ConnectionHandle::new(user_id, self.settings.outbound_queue_capacity);

        if let Some(previous) = self.registry.add_connection(handle.clone()) {
            tracing::info!(
                user_id = %user_id,
                connection_id = previous.id(),
                "Previous connection superseded"
            );
        }

        let chats = match timeout(self.settings.persist_timeout(), self.membership.chats_of(user_id)).await {
            Ok(Ok(chats)) => chats,
            Ok(Err(e)) => {
                self.disconnect(&handle);
                return Err(e);
            }
            Err(_) => {
                self.disconnect(&handle);
                return Err(AppError::Unavailable("membership lookup timed out".into()));
            }
        };

        let subscribed = self.registry.subscribe_to_chats(user_id, &chats);
        if let Err(e) = handle.mark_active() {
            tracing::debug!(connection_id = handle.id(), error = %e, "Superseded while connecting");
        }
        metrics::set_hub_connections(self.registry.connection_count());

        tracing::info!(
            user_id = %user_id,
            connection_id = handle.id(),
            chats = subscribed,
            "Connection registered"
        );

        Ok((handle, outbox))
    }

    /// Unregister a session and close it. Safe to call more than once and
    /// for connections that were already superseded.
    pub fn disconnect(&self, handle: &ConnectionHandle) {
        let removed = self
            .registry
            .remove_connection(handle.user_id(), handle.id())
            .is_some();
        handle.close();
        metrics::set_hub_connections(self.registry.connection_count());

        if removed {
            tracing::info!(
                user_id = %handle.user_id(),
                connection_id = handle.id(),
                "Connection unregistered"
            );
        }
    }

    /// Submission entry point shared by WebSocket and HTTP senders.
    ///
    /// The pipeline runs on its own task, so a caller that goes away mid
    /// write does not stop a message that is being persisted from being
    /// fanned out.
    pub async fn submit(&self, draft: MessageDraft) -> Result<Message, DeliveryError> {
        let chat_id = draft.chat_id.clone();
        let sender_id = draft.sender_id;

        let pipeline = Arc::clone(&self.pipeline);
        let registry = Arc::clone(&self.registry);
        let outcome = tokio::spawn(async move { pipeline.submit(draft, &registry).await })
            .await
            .unwrap_or_else(|e| Err(DeliveryError::Persistence(format!("delivery task failed: {e}"))));

        match outcome {
            Ok(Delivery { message, report }) => {
                metrics::record_submission("persisted");
                tracing::debug!(
                    message_id = message.id,
                    chat_id = %chat_id,
                    user_id = %sender_id,
                    delivered = report.delivered,
                    dropped = report.dropped,
                    "Message delivered"
                );

                if self.settings.overflow_policy == OverflowPolicy::Disconnect {
                    for slow in &report.saturated {
                        tracing::warn!(
                            user_id = %slow.user_id(),
                            connection_id = slow.id(),
                            "Disconnecting slow subscriber"
                        );
                        self.disconnect(slow);
                    }
                }

                Ok(message)
            }
            Err(e) => {
                metrics::record_submission(e.outcome());
                tracing::debug!(chat_id = %chat_id, user_id = %sender_id, error = %e, "Submission refused");
                Err(e)
            }
        }
    }

    /// Subscribe every listed user that is online to the chat. Returns how
    /// many new subscriptions were made.
    pub fn subscribe_members(&self, chat_id: &ChatId, user_ids: &[UserId]) -> usize {
        let added: usize = user_ids
            .iter()
            .map(|&user_id| self.registry.subscribe_to_chats(user_id, slice::from_ref(chat_id)))
            .sum();

        tracing::debug!(chat_id = %chat_id, subscribed = added, "Membership change applied");
        added
    }

    /// Close every session, e.g. on shutdown.
    pub fn close_all(&self) -> usize {
        let closed = self.registry.drain().len();
        metrics::set_hub_connections(0);
        tracing::info!(connections = closed, "All connections closed");
        closed
    }

    /// Users currently subscribed to a chat.
    pub fn subscribers_of(&self, chat_id: &ChatId) -> Vec<UserId> {
        self.registry
            .subscribers_of(chat_id)
            .iter()
            .map(|conn| conn.user_id())
            .collect()
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.registry.is_connected(user_id)
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }

    pub fn registry_is_consistent(&self) -> bool {
        self.registry.is_consistent()
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[async_trait]
impl MembershipNotifier for Hub {
    async fn notify_membership_change(&self, chat_id: &ChatId, user_ids: &[UserId]) {
        self.subscribe_members(chat_id, user_ids);
    }
}
