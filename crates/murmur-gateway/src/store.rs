use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use uuid::Uuid;

use murmur_db::Database;
use murmur_db::models::format_timestamp;
use murmur_types::models::{ChatMessage, User};

use crate::error::StoreError;

/// Durable users and messages, as seen by the gateway.
///
/// Implementations provide their own atomicity for single writes and for the
/// bulk seen-update; the gateway never spans a transaction across calls.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    /// Persist a new unread message and return the stored record, with both
    /// participants' display names resolved.
    async fn create_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        body: &str,
    ) -> Result<ChatMessage, StoreError>;

    /// Mark every unread `sender_id -> receiver_id` message as seen.
    /// Returns how many messages changed.
    async fn update_many_seen(&self, sender_id: Uuid, receiver_id: Uuid)
    -> Result<usize, StoreError>;

    /// Both directions between two users, oldest first.
    async fn find_conversation(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> Result<Vec<ChatMessage>, StoreError>;
}

/// [`MessageStore`] over the SQLite database. Every call runs on the
/// blocking pool so a slow disk never stalls other connections.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        Ok(tokio::task::spawn_blocking(move || f(&db)).await??)
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        self.blocking(move |db| {
            db.get_user_by_id(&user_id.to_string())?
                .map(|row| row.into_model())
                .transpose()
        })
        .await
    }

    async fn create_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        body: &str,
    ) -> Result<ChatMessage, StoreError> {
        let body = body.to_string();
        // Insert and read-back share one blocking job, so once started the
        // write completes even if the calling task is dropped.
        self.blocking(move |db| {
            let id = Uuid::new_v4().to_string();
            let created_at = format_timestamp(chrono::Utc::now());
            db.insert_message(
                &id,
                &sender_id.to_string(),
                &receiver_id.to_string(),
                &body,
                &created_at,
            )?;

            db.get_message(&id)?
                .ok_or_else(|| anyhow!("Message {} missing right after insert", id))?
                .into_model()
        })
        .await
    }

    async fn update_many_seen(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
    ) -> Result<usize, StoreError> {
        self.blocking(move |db| db.mark_seen(&sender_id.to_string(), &receiver_id.to_string()))
            .await
    }

    async fn find_conversation(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        self.blocking(move |db| {
            db.get_conversation(&user_a.to_string(), &user_b.to_string())?
                .into_iter()
                .map(|row| row.into_model())
                .collect()
        })
        .await
    }
}
