use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::pair_key;
use crate::error::{AppError, AppResult};
use crate::models::{Match, Message, MessageRequest, RequestStatus, Signal, User};
use crate::store::{MatchStore, MessageStore, RequestStore, SignalStore, UserStore};

/// Process-local backend: demo mode and the fixture for domain tests. One
/// lock over all collections makes the insert-if-absent operations atomic
/// without any further machinery.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    signals: Vec<Signal>,
    matches: Vec<Match>,
    requests: Vec<MessageRequest>,
    messages: Vec<Message>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn contact_taken(users: &[User], candidate: &User) -> bool {
    users.iter().any(|u| {
        u.id != candidate.id
            && ((candidate.email.is_some() && u.email == candidate.email)
                || (candidate.phone.is_some() && u.phone == candidate.phone))
    })
}

fn newest_first<T, K: Ord>(items: &mut [T], key: impl Fn(&T) -> K) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if contact_taken(&inner.users, user) {
            return Err(AppError::Conflict("Phone or email already exists".to_owned()));
        }
        inner.users.push(user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if contact_taken(&inner.users, user) {
            return Err(AppError::Conflict("Phone or email already exists".to_owned()));
        }
        match inner.users.iter_mut().find(|u| u.id == user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(())
            }
            None => Err(AppError::not_found("User not found")),
        }
    }

    async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn user_by_contact(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> AppResult<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .iter()
            .find(|u| {
                (email.is_some() && u.email.as_deref() == email)
                    || (phone.is_some() && u.phone.as_deref() == phone)
            })
            .cloned())
    }

    async fn user_by_verification_token(&self, token: &str) -> AppResult<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .iter()
            .find(|u| u.email_verification_token.as_deref() == Some(token))
            .cloned())
    }

    async fn users_except(&self, id: Uuid) -> AppResult<Vec<User>> {
        let inner = self.inner.lock().await;
        let mut users: Vec<User> = inner.users.iter().filter(|u| u.id != id).cloned().collect();
        newest_first(&mut users, |u| (u.created_at, u.id));
        Ok(users)
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn count_users(&self) -> AppResult<i64> {
        let inner = self.inner.lock().await;
        Ok(inner.users.len() as i64)
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn insert_signal(&self, signal: &Signal) -> AppResult<()> {
        self.inner.lock().await.signals.push(signal.clone());
        Ok(())
    }

    async fn signals_to(&self, user: Uuid) -> AppResult<Vec<Signal>> {
        let inner = self.inner.lock().await;
        let mut signals: Vec<Signal> = inner
            .signals
            .iter()
            .filter(|s| s.to_user_id == user)
            .cloned()
            .collect();
        newest_first(&mut signals, |s| (s.created_at, s.id));
        Ok(signals)
    }

    async fn signals_from(&self, user: Uuid) -> AppResult<Vec<Signal>> {
        let inner = self.inner.lock().await;
        let mut signals: Vec<Signal> = inner
            .signals
            .iter()
            .filter(|s| s.from_user_id == user)
            .cloned()
            .collect();
        newest_first(&mut signals, |s| (s.created_at, s.id));
        Ok(signals)
    }

    async fn reverse_signal_exists(
        &self,
        from: Uuid,
        to: Uuid,
        adjective: &str,
    ) -> AppResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner
            .signals
            .iter()
            .any(|s| s.from_user_id == from && s.to_user_id == to && s.adjective == adjective))
    }

    async fn count_sent_since(&self, user: Uuid, since: DateTime<Utc>) -> AppResult<i64> {
        let inner = self.inner.lock().await;
        Ok(inner
            .signals
            .iter()
            .filter(|s| s.from_user_id == user && s.created_at >= since)
            .count() as i64)
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn upsert_match(&self, candidate: &Match) -> AppResult<Match> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner
            .matches
            .iter()
            .find(|m| m.user_lo == candidate.user_lo && m.user_hi == candidate.user_hi)
        {
            return Ok(existing.clone());
        }
        inner.matches.push(candidate.clone());
        Ok(candidate.clone())
    }

    async fn match_between(&self, a: Uuid, b: Uuid) -> AppResult<Option<Match>> {
        let (lo, hi) = pair_key(a, b);
        let inner = self.inner.lock().await;
        Ok(inner
            .matches
            .iter()
            .find(|m| m.user_lo == lo && m.user_hi == hi)
            .cloned())
    }

    async fn matches_involving(&self, user: Uuid) -> AppResult<Vec<Match>> {
        let inner = self.inner.lock().await;
        let mut matches: Vec<Match> = inner
            .matches
            .iter()
            .filter(|m| m.involves(user))
            .cloned()
            .collect();
        newest_first(&mut matches, |m| (m.created_at, m.id));
        Ok(matches)
    }

    async fn count_matches_involving(&self, user: Uuid) -> AppResult<i64> {
        let inner = self.inner.lock().await;
        Ok(inner.matches.iter().filter(|m| m.involves(user)).count() as i64)
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn upsert_request(&self, candidate: &MessageRequest) -> AppResult<MessageRequest> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.requests.iter().find(|r| {
            r.from_user_id == candidate.from_user_id && r.to_user_id == candidate.to_user_id
        }) {
            return Ok(existing.clone());
        }
        inner.requests.push(candidate.clone());
        Ok(candidate.clone())
    }

    async fn request_by_id(&self, id: Uuid) -> AppResult<Option<MessageRequest>> {
        let inner = self.inner.lock().await;
        Ok(inner.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn resolve_request(&self, id: Uuid, status: RequestStatus) -> AppResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner
            .requests
            .iter_mut()
            .find(|r| r.id == id && r.status == RequestStatus::Pending)
        {
            Some(request) => {
                request.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn requests_to(
        &self,
        user: Uuid,
        status: Option<RequestStatus>,
    ) -> AppResult<Vec<MessageRequest>> {
        let inner = self.inner.lock().await;
        let mut requests: Vec<MessageRequest> = inner
            .requests
            .iter()
            .filter(|r| r.to_user_id == user && status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        newest_first(&mut requests, |r| (r.created_at, r.id));
        Ok(requests)
    }

    async fn requests_from(&self, user: Uuid) -> AppResult<Vec<MessageRequest>> {
        let inner = self.inner.lock().await;
        let mut requests: Vec<MessageRequest> = inner
            .requests
            .iter()
            .filter(|r| r.from_user_id == user)
            .cloned()
            .collect();
        newest_first(&mut requests, |r| (r.created_at, r.id));
        Ok(requests)
    }

    async fn accepted_requests_involving(&self, user: Uuid) -> AppResult<Vec<MessageRequest>> {
        let inner = self.inner.lock().await;
        let mut requests: Vec<MessageRequest> = inner
            .requests
            .iter()
            .filter(|r| {
                r.status == RequestStatus::Accepted
                    && (r.from_user_id == user || r.to_user_id == user)
            })
            .cloned()
            .collect();
        newest_first(&mut requests, |r| (r.created_at, r.id));
        Ok(requests)
    }

    async fn accepted_request_exists(&self, a: Uuid, b: Uuid) -> AppResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.requests.iter().any(|r| {
            r.status == RequestStatus::Accepted
                && ((r.from_user_id == a && r.to_user_id == b)
                    || (r.from_user_id == b && r.to_user_id == a))
        }))
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert_message(&self, message: &Message) -> AppResult<()> {
        self.inner.lock().await.messages.push(message.clone());
        Ok(())
    }

    async fn conversation(&self, a: Uuid, b: Uuid) -> AppResult<Vec<Message>> {
        let inner = self.inner.lock().await;
        let mut messages: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| {
                (m.from_user_id == a && m.to_user_id == b)
                    || (m.from_user_id == b && m.to_user_id == a)
            })
            .cloned()
            .collect();
        messages.sort_by_key(|m| (m.created_at, m.id));
        Ok(messages)
    }

    async fn mark_read(&self, from: Uuid, to: Uuid, at: DateTime<Utc>) -> AppResult<u64> {
        let mut inner = self.inner.lock().await;
        let mut flipped = 0;
        for message in inner
            .messages
            .iter_mut()
            .filter(|m| m.from_user_id == from && m.to_user_id == to && !m.read)
        {
            message.read = true;
            message.read_at = Some(at);
            flipped += 1;
        }
        Ok(flipped)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::{Gender, UserStatus};

    fn user(email: &str, phone: Option<&str>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::now_v7(),
            name: "Test".to_owned(),
            gender: Gender::Other,
            college: "NIT Trichy".to_owned(),
            year: "1st Year".to_owned(),
            age: 19,
            skills: Vec::new(),
            image_url: String::new(),
            phone: phone.map(str::to_owned),
            email: Some(email.to_owned()),
            status: UserStatus::Active,
            is_premium: false,
            premium_expires_at: None,
            email_verified: false,
            email_verification_token: None,
            email_verification_expires: None,
            otp: None,
            otp_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn duplicate_contacts_conflict() {
        let store = MemoryStore::new();
        store.insert_user(&user("a@x.com", None)).await.unwrap();

        let err = store.insert_user(&user("a@x.com", None)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // updates cannot steal an existing contact either
        let mut second = user("b@x.com", Some("111"));
        store.insert_user(&second).await.unwrap();
        second.email = Some("a@x.com".to_owned());
        let err = store.update_user(&second).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn listings_come_back_newest_first() {
        let store = MemoryStore::new();
        let base = Utc::now();
        let viewer = user("v@x.com", None);
        store.insert_user(&viewer).await.unwrap();

        let mut ids = Vec::new();
        for i in 0..3 {
            let mut u = user(&format!("u{i}@x.com"), None);
            u.created_at = base + Duration::seconds(i);
            store.insert_user(&u).await.unwrap();
            ids.push(u.id);
        }

        let listed = store.users_except(viewer.id).await.unwrap();
        let got: Vec<Uuid> = listed.iter().map(|u| u.id).collect();
        ids.reverse();
        assert_eq!(got, ids);
    }
}
