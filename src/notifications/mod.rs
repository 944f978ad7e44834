use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::Client;
use serde::{Deserialize, Serialize};
use slog::{info, Logger};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A notification delivered to one user's inbox.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub link: Option<EntityLink>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: Uuid, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: title.into(),
            message: message.into(),
            link: None,
            read: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_link(mut self, link: EntityLink) -> Self {
        self.link = Some(link);
        self
    }
}

/// Entity the notification points at, for deep-linking in the caller UI.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "entity", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityLink {
    Order(Uuid),
    Negotiation(Uuid),
    ProductionTracking(Uuid),
    RevisionRequest(Uuid),
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Notification dispatch interface. Injected into each workflow engine so
/// tests can substitute a recording double; dispatch failures must never
/// fail the workflow transition that triggered them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Redis-backed notifier keeping a per-user sorted-set inbox, scored by
/// creation time and trimmed to the most recent entries.
#[derive(Clone)]
pub struct RedisNotifier {
    redis: Arc<Client>,
    logger: Logger,
}

impl RedisNotifier {
    pub fn new(redis: Arc<Client>, logger: Logger) -> Self {
        Self { redis, logger }
    }

    fn user_key(user_id: Uuid) -> String {
        format!("notifications:user:{}", user_id)
    }
}

#[async_trait]
impl Notifier for RedisNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        let mut conn = self.redis.get_async_connection().await?;
        let json = serde_json::to_string(&notification)?;
        let user_key = Self::user_key(notification.user_id);

        redis::pipe()
            .atomic()
            .zadd(&user_key, &json, notification.created_at.timestamp())
            .zremrangebyrank(&user_key, 0, -1001)
            .query_async::<_, ()>(&mut conn)
            .await?;

        info!(self.logger, "Notification sent";
            "user_id" => notification.user_id.to_string(),
            "title" => notification.title,
        );
        Ok(())
    }
}

/// In-memory notifier; default fallback when Redis is unavailable and the
/// recording double used by the workflow tests.
#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }

    pub async fn sent_to(&self, user_id: Uuid) -> Vec<Notification> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sent.write().await.push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_notifier_records_per_user() {
        let notifier = InMemoryNotifier::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        notifier
            .send(Notification::new(alice, "New offer", "5.00 / 10 days"))
            .await
            .unwrap();
        notifier
            .send(
                Notification::new(bob, "Offer accepted", "Order confirmed")
                    .with_link(EntityLink::Order(Uuid::new_v4())),
            )
            .await
            .unwrap();

        assert_eq!(notifier.sent().await.len(), 2);
        let to_alice = notifier.sent_to(alice).await;
        assert_eq!(to_alice.len(), 1);
        assert_eq!(to_alice[0].title, "New offer");
    }
}
