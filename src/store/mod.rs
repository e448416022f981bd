mod memory;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Match, Message, MessageRequest, RequestStatus, Signal, User};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Fails with Conflict when email or phone is already taken.
    async fn insert_user(&self, user: &User) -> AppResult<()>;
    /// Saves the whole row back; NotFound when the id does not exist,
    /// Conflict when the update would steal someone else's contact.
    async fn update_user(&self, user: &User) -> AppResult<()>;
    async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    /// Matches either contact field, the way login lookups work.
    async fn user_by_contact(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> AppResult<Option<User>>;
    async fn user_by_verification_token(&self, token: &str) -> AppResult<Option<User>>;
    /// Everyone except `id`, newest-first.
    async fn users_except(&self, id: Uuid) -> AppResult<Vec<User>>;
    async fn users_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<User>>;
    async fn count_users(&self) -> AppResult<i64>;
}

#[async_trait]
pub trait SignalStore: Send + Sync + 'static {
    async fn insert_signal(&self, signal: &Signal) -> AppResult<()>;
    /// Received, newest-first.
    async fn signals_to(&self, user: Uuid) -> AppResult<Vec<Signal>>;
    /// Sent, newest-first.
    async fn signals_from(&self, user: Uuid) -> AppResult<Vec<Signal>>;
    async fn reverse_signal_exists(
        &self,
        from: Uuid,
        to: Uuid,
        adjective: &str,
    ) -> AppResult<bool>;
    async fn count_sent_since(&self, user: Uuid, since: DateTime<Utc>) -> AppResult<i64>;
}

#[async_trait]
pub trait MatchStore: Send + Sync + 'static {
    /// Insert-if-absent on the canonical pair; returns the row that holds the
    /// pair afterwards, which is the existing one when the pair already
    /// matched. Losing the insert race is not an error.
    async fn upsert_match(&self, candidate: &Match) -> AppResult<Match>;
    /// Pair order does not matter.
    async fn match_between(&self, a: Uuid, b: Uuid) -> AppResult<Option<Match>>;
    async fn matches_involving(&self, user: Uuid) -> AppResult<Vec<Match>>;
    async fn count_matches_involving(&self, user: Uuid) -> AppResult<i64>;
}

#[async_trait]
pub trait RequestStore: Send + Sync + 'static {
    /// Insert-if-absent on the ordered (from, to) pair; returns the surviving
    /// row, whatever its status.
    async fn upsert_request(&self, candidate: &MessageRequest) -> AppResult<MessageRequest>;
    async fn request_by_id(&self, id: Uuid) -> AppResult<Option<MessageRequest>>;
    /// Flips a still-pending request to `status`. False means the row was
    /// missing or no longer pending.
    async fn resolve_request(&self, id: Uuid, status: RequestStatus) -> AppResult<bool>;
    async fn requests_to(
        &self,
        user: Uuid,
        status: Option<RequestStatus>,
    ) -> AppResult<Vec<MessageRequest>>;
    async fn requests_from(&self, user: Uuid) -> AppResult<Vec<MessageRequest>>;
    async fn accepted_requests_involving(&self, user: Uuid) -> AppResult<Vec<MessageRequest>>;
    /// Accepted in either direction.
    async fn accepted_request_exists(&self, a: Uuid, b: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    async fn insert_message(&self, message: &Message) -> AppResult<()>;
    /// Both directions between `a` and `b`, oldest-first.
    async fn conversation(&self, a: Uuid, b: Uuid) -> AppResult<Vec<Message>>;
    /// Marks unread messages from `from` to `to` as read; returns how many
    /// rows changed, so calling it twice is harmless.
    async fn mark_read(&self, from: Uuid, to: Uuid, at: DateTime<Utc>) -> AppResult<u64>;
}

/// The one storage seam the rest of the app sees. Both backends implement
/// every sub-trait, so the blanket impl below is the only impl needed.
pub trait Store: UserStore + SignalStore + MatchStore + RequestStore + MessageStore {}

impl<T> Store for T where
    T: UserStore + SignalStore + MatchStore + RequestStore + MessageStore
{
}

pub type DynStore = Arc<dyn Store>;
