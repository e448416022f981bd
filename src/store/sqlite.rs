use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use crate::domain::pair_key;
use crate::error::{AppError, AppResult};
use crate::models::{
    Gender, Match, Message, MessageRequest, RequestStatus, Signal, User, UserStatus,
};
use crate::store::{MatchStore, MessageStore, RequestStore, SignalStore, UserStore};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    gender TEXT NOT NULL,
    college TEXT NOT NULL,
    year TEXT NOT NULL,
    age INTEGER NOT NULL,
    skills TEXT NOT NULL DEFAULT '[]',
    image_url TEXT NOT NULL DEFAULT '',
    phone TEXT UNIQUE,
    email TEXT UNIQUE,
    status TEXT NOT NULL DEFAULT 'active',
    is_premium INTEGER NOT NULL DEFAULT 0,
    premium_expires_at TEXT,
    email_verified INTEGER NOT NULL DEFAULT 0,
    email_verification_token TEXT,
    email_verification_expires TEXT,
    otp TEXT,
    otp_expires TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS signals (
    id TEXT PRIMARY KEY,
    from_user_id TEXT NOT NULL REFERENCES users(id),
    to_user_id TEXT NOT NULL REFERENCES users(id),
    adjective TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_signals_to ON signals (to_user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_signals_from ON signals (from_user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_signals_reverse ON signals (from_user_id, to_user_id, adjective);

CREATE TABLE IF NOT EXISTS matches (
    id TEXT PRIMARY KEY,
    user_lo TEXT NOT NULL REFERENCES users(id),
    user_hi TEXT NOT NULL REFERENCES users(id),
    adjective TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (user_lo, user_hi)
);

CREATE TABLE IF NOT EXISTS message_requests (
    id TEXT PRIMARY KEY,
    from_user_id TEXT NOT NULL REFERENCES users(id),
    to_user_id TEXT NOT NULL REFERENCES users(id),
    adjective TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    UNIQUE (from_user_id, to_user_id)
);
CREATE INDEX IF NOT EXISTS idx_requests_to ON message_requests (to_user_id, status);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    from_user_id TEXT NOT NULL REFERENCES users(id),
    to_user_id TEXT NOT NULL REFERENCES users(id),
    text TEXT NOT NULL,
    read INTEGER NOT NULL DEFAULT 0,
    read_at TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_pair ON messages (from_user_id, to_user_id, created_at);
";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> AppResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect(url)
            .await?;
        Self::from_pool(pool).await
    }

    /// Wraps an existing pool, creating the schema if needed. Tests hand in
    /// single-connection `sqlite::memory:` pools here.
    pub async fn from_pool(pool: SqlitePool) -> AppResult<Self> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }
}

fn parse_uuid(s: &str) -> AppResult<Uuid> {
    Ok(Uuid::parse_str(s)?)
}

fn corrupt(what: &str, value: &str) -> AppError {
    AppError::Internal(anyhow::anyhow!("unexpected {what} in row: {value:?}"))
}

/// Unique-index violations mean a contact is already taken; everything else
/// stays an internal error.
fn map_unique(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("Phone or email already exists".to_owned())
        }
        _ => err.into(),
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    gender: String,
    college: String,
    year: String,
    age: i64,
    skills: String,
    image_url: String,
    phone: Option<String>,
    email: Option<String>,
    status: String,
    is_premium: bool,
    premium_expires_at: Option<DateTime<Utc>>,
    email_verified: bool,
    email_verification_token: Option<String>,
    email_verification_expires: Option<DateTime<Utc>>,
    otp: Option<String>,
    otp_expires: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AppResult<User> {
        Ok(User {
            id: parse_uuid(&self.id)?,
            name: self.name,
            gender: Gender::from_str(&self.gender)
                .ok_or_else(|| corrupt("gender", &self.gender))?,
            college: self.college,
            year: self.year,
            age: self.age,
            skills: serde_json::from_str(&self.skills)?,
            image_url: self.image_url,
            phone: self.phone,
            email: self.email,
            status: UserStatus::from_str(&self.status)
                .ok_or_else(|| corrupt("status", &self.status))?,
            is_premium: self.is_premium,
            premium_expires_at: self.premium_expires_at,
            email_verified: self.email_verified,
            email_verification_token: self.email_verification_token,
            email_verification_expires: self.email_verification_expires,
            otp: self.otp,
            otp_expires: self.otp_expires,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn rows_into_users(rows: Vec<UserRow>) -> AppResult<Vec<User>> {
    rows.into_iter().map(UserRow::into_user).collect()
}

type SignalRow = (String, String, String, String, DateTime<Utc>);

fn into_signal((id, from, to, adjective, created_at): SignalRow) -> AppResult<Signal> {
    Ok(Signal {
        id: parse_uuid(&id)?,
        from_user_id: parse_uuid(&from)?,
        to_user_id: parse_uuid(&to)?,
        adjective,
        created_at,
    })
}

type MatchRow = (String, String, String, String, DateTime<Utc>);

fn into_match((id, lo, hi, adjective, created_at): MatchRow) -> AppResult<Match> {
    Ok(Match {
        id: parse_uuid(&id)?,
        user_lo: parse_uuid(&lo)?,
        user_hi: parse_uuid(&hi)?,
        adjective,
        created_at,
    })
}

type RequestRow = (String, String, String, String, String, DateTime<Utc>);

fn into_request((id, from, to, adjective, status, created_at): RequestRow) -> AppResult<MessageRequest> {
    Ok(MessageRequest {
        id: parse_uuid(&id)?,
        from_user_id: parse_uuid(&from)?,
        to_user_id: parse_uuid(&to)?,
        adjective,
        status: RequestStatus::from_str(&status).ok_or_else(|| corrupt("status", &status))?,
        created_at,
    })
}

type MessageRow = (
    String,
    String,
    String,
    String,
    bool,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
);

fn into_message(
    (id, from, to, text, read, read_at, created_at): MessageRow,
) -> AppResult<Message> {
    Ok(Message {
        id: parse_uuid(&id)?,
        from_user_id: parse_uuid(&from)?,
        to_user_id: parse_uuid(&to)?,
        text,
        read,
        read_at,
        created_at,
    })
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn insert_user(&self, user: &User) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO users (id,name,gender,college,year,age,skills,image_url,phone,email,\
             status,is_premium,premium_expires_at,email_verified,email_verification_token,\
             email_verification_expires,otp,otp_expires,created_at,updated_at) \
             VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)",
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(user.gender.as_str())
        .bind(&user.college)
        .bind(&user.year)
        .bind(user.age)
        .bind(serde_json::to_string(&user.skills)?)
        .bind(&user.image_url)
        .bind(&user.phone)
        .bind(&user.email)
        .bind(user.status.as_str())
        .bind(user.is_premium)
        .bind(user.premium_expires_at)
        .bind(user.email_verified)
        .bind(&user.email_verification_token)
        .bind(user.email_verification_expires)
        .bind(&user.otp)
        .bind(user.otp_expires)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique)?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET name=?,gender=?,college=?,year=?,age=?,skills=?,image_url=?,\
             phone=?,email=?,status=?,is_premium=?,premium_expires_at=?,email_verified=?,\
             email_verification_token=?,email_verification_expires=?,otp=?,otp_expires=?,\
             updated_at=? WHERE id=?",
        )
        .bind(&user.name)
        .bind(user.gender.as_str())
        .bind(&user.college)
        .bind(&user.year)
        .bind(user.age)
        .bind(serde_json::to_string(&user.skills)?)
        .bind(&user.image_url)
        .bind(&user.phone)
        .bind(&user.email)
        .bind(user.status.as_str())
        .bind(user.is_premium)
        .bind(user.premium_expires_at)
        .bind(user.email_verified)
        .bind(&user.email_verification_token)
        .bind(user.email_verification_expires)
        .bind(&user.otp)
        .bind(user.otp_expires)
        .bind(user.updated_at)
        .bind(user.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_unique)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User not found"));
        }
        Ok(())
    }

    async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id=?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn user_by_contact(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> AppResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT * FROM users \
             WHERE (?1 IS NOT NULL AND email=?1) OR (?2 IS NOT NULL AND phone=?2) LIMIT 1",
        )
        .bind(email)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn user_by_verification_token(&self, token: &str) -> AppResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT * FROM users WHERE email_verification_token=?")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn users_except(&self, id: Uuid) -> AppResult<Vec<User>> {
        let rows: Vec<UserRow> =
            sqlx::query_as("SELECT * FROM users WHERE id<>? ORDER BY created_at DESC, id DESC")
                .bind(id.to_string())
                .fetch_all(&self.pool)
                .await?;
        rows_into_users(rows)
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!("SELECT * FROM users WHERE id IN ({placeholders})");
        let mut query = sqlx::query_as::<_, UserRow>(&sql);
        for id in ids {
            query = query.bind(id.to_string());
        }
        rows_into_users(query.fetch_all(&self.pool).await?)
    }

    async fn count_users(&self) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl SignalStore for SqliteStore {
    async fn insert_signal(&self, signal: &Signal) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO signals (id,from_user_id,to_user_id,adjective,created_at) \
             VALUES (?,?,?,?,?)",
        )
        .bind(signal.id.to_string())
        .bind(signal.from_user_id.to_string())
        .bind(signal.to_user_id.to_string())
        .bind(&signal.adjective)
        .bind(signal.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn signals_to(&self, user: Uuid) -> AppResult<Vec<Signal>> {
        let rows: Vec<SignalRow> = sqlx::query_as(
            "SELECT id,from_user_id,to_user_id,adjective,created_at FROM signals \
             WHERE to_user_id=? ORDER BY created_at DESC, id DESC",
        )
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(into_signal).collect()
    }

    async fn signals_from(&self, user: Uuid) -> AppResult<Vec<Signal>> {
        let rows: Vec<SignalRow> = sqlx::query_as(
            "SELECT id,from_user_id,to_user_id,adjective,created_at FROM signals \
             WHERE from_user_id=? ORDER BY created_at DESC, id DESC",
        )
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(into_signal).collect()
    }

    async fn reverse_signal_exists(
        &self,
        from: Uuid,
        to: Uuid,
        adjective: &str,
    ) -> AppResult<bool> {
        Ok(sqlx::query_as::<_, ()>(
            "SELECT 1 FROM signals WHERE from_user_id=? AND to_user_id=? AND adjective=? LIMIT 1",
        )
        .bind(from.to_string())
        .bind(to.to_string())
        .bind(adjective)
        .fetch_optional(&self.pool)
        .await?
        .is_some())
    }

    async fn count_sent_since(&self, user: Uuid, since: DateTime<Utc>) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM signals WHERE from_user_id=? AND created_at>=?",
        )
        .bind(user.to_string())
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[async_trait]
impl MatchStore for SqliteStore {
    async fn upsert_match(&self, candidate: &Match) -> AppResult<Match> {
        sqlx::query(
            "INSERT INTO matches (id,user_lo,user_hi,adjective,created_at) VALUES (?,?,?,?,?) \
             ON CONFLICT (user_lo,user_hi) DO NOTHING",
        )
        .bind(candidate.id.to_string())
        .bind(candidate.user_lo.to_string())
        .bind(candidate.user_hi.to_string())
        .bind(&candidate.adjective)
        .bind(candidate.created_at)
        .execute(&self.pool)
        .await?;

        // read back whichever row won, ours or an earlier one
        self.match_between(candidate.user_lo, candidate.user_hi)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("match row missing after upsert")))
    }

    async fn match_between(&self, a: Uuid, b: Uuid) -> AppResult<Option<Match>> {
        let (lo, hi) = pair_key(a, b);
        let row: Option<MatchRow> = sqlx::query_as(
            "SELECT id,user_lo,user_hi,adjective,created_at FROM matches \
             WHERE user_lo=? AND user_hi=?",
        )
        .bind(lo.to_string())
        .bind(hi.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(into_match).transpose()
    }

    async fn matches_involving(&self, user: Uuid) -> AppResult<Vec<Match>> {
        let rows: Vec<MatchRow> = sqlx::query_as(
            "SELECT id,user_lo,user_hi,adjective,created_at FROM matches \
             WHERE user_lo=?1 OR user_hi=?1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(into_match).collect()
    }

    async fn count_matches_involving(&self, user: Uuid) -> AppResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM matches WHERE user_lo=?1 OR user_hi=?1")
                .bind(user.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[async_trait]
impl RequestStore for SqliteStore {
    async fn upsert_request(&self, candidate: &MessageRequest) -> AppResult<MessageRequest> {
        sqlx::query(
            "INSERT INTO message_requests (id,from_user_id,to_user_id,adjective,status,created_at) \
             VALUES (?,?,?,?,?,?) ON CONFLICT (from_user_id,to_user_id) DO NOTHING",
        )
        .bind(candidate.id.to_string())
        .bind(candidate.from_user_id.to_string())
        .bind(candidate.to_user_id.to_string())
        .bind(&candidate.adjective)
        .bind(candidate.status.as_str())
        .bind(candidate.created_at)
        .execute(&self.pool)
        .await?;

        let row: Option<RequestRow> = sqlx::query_as(
            "SELECT id,from_user_id,to_user_id,adjective,status,created_at \
             FROM message_requests WHERE from_user_id=? AND to_user_id=?",
        )
        .bind(candidate.from_user_id.to_string())
        .bind(candidate.to_user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(into_request).transpose()?.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("request row missing after upsert"))
        })
    }

    async fn request_by_id(&self, id: Uuid) -> AppResult<Option<MessageRequest>> {
        let row: Option<RequestRow> = sqlx::query_as(
            "SELECT id,from_user_id,to_user_id,adjective,status,created_at \
             FROM message_requests WHERE id=?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(into_request).transpose()
    }

    async fn resolve_request(&self, id: Uuid, status: RequestStatus) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE message_requests SET status=? WHERE id=? AND status='pending'")
                .bind(status.as_str())
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn requests_to(
        &self,
        user: Uuid,
        status: Option<RequestStatus>,
    ) -> AppResult<Vec<MessageRequest>> {
        let rows: Vec<RequestRow> = sqlx::query_as(
            "SELECT id,from_user_id,to_user_id,adjective,status,created_at \
             FROM message_requests WHERE to_user_id=?1 AND (?2 IS NULL OR status=?2) \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user.to_string())
        .bind(status.map(RequestStatus::as_str))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(into_request).collect()
    }

    async fn requests_from(&self, user: Uuid) -> AppResult<Vec<MessageRequest>> {
        let rows: Vec<RequestRow> = sqlx::query_as(
            "SELECT id,from_user_id,to_user_id,adjective,status,created_at \
             FROM message_requests WHERE from_user_id=? ORDER BY created_at DESC, id DESC",
        )
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(into_request).collect()
    }

    async fn accepted_requests_involving(&self, user: Uuid) -> AppResult<Vec<MessageRequest>> {
        let rows: Vec<RequestRow> = sqlx::query_as(
            "SELECT id,from_user_id,to_user_id,adjective,status,created_at \
             FROM message_requests WHERE status='accepted' AND (from_user_id=?1 OR to_user_id=?1) \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(into_request).collect()
    }

    async fn accepted_request_exists(&self, a: Uuid, b: Uuid) -> AppResult<bool> {
        Ok(sqlx::query_as::<_, ()>(
            "SELECT 1 FROM message_requests WHERE status='accepted' \
             AND ((from_user_id=?1 AND to_user_id=?2) OR (from_user_id=?2 AND to_user_id=?1)) \
             LIMIT 1",
        )
        .bind(a.to_string())
        .bind(b.to_string())
        .fetch_optional(&self.pool)
        .await?
        .is_some())
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn insert_message(&self, message: &Message) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO messages (id,from_user_id,to_user_id,text,read,read_at,created_at) \
             VALUES (?,?,?,?,?,?,?)",
        )
        .bind(message.id.to_string())
        .bind(message.from_user_id.to_string())
        .bind(message.to_user_id.to_string())
        .bind(&message.text)
        .bind(message.read)
        .bind(message.read_at)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn conversation(&self, a: Uuid, b: Uuid) -> AppResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id,from_user_id,to_user_id,text,read,read_at,created_at FROM messages \
             WHERE (from_user_id=?1 AND to_user_id=?2) OR (from_user_id=?2 AND to_user_id=?1) \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(a.to_string())
        .bind(b.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(into_message).collect()
    }

    async fn mark_read(&self, from: Uuid, to: Uuid, at: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE messages SET read=1, read_at=? \
             WHERE from_user_id=? AND to_user_id=? AND read=0",
        )
        .bind(at)
        .bind(from.to_string())
        .bind(to.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, SubsecRound};

    use super::*;

    async fn test_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteStore::from_pool(pool).await.unwrap()
    }

    fn user(email: &str) -> User {
        // millisecond precision survives the TEXT column exactly
        let now = Utc::now().trunc_subsecs(3);
        User {
            id: Uuid::now_v7(),
            name: "Aarav".to_owned(),
            gender: Gender::Male,
            college: "IIT Bombay".to_owned(),
            year: "3rd Year".to_owned(),
            age: 21,
            skills: vec!["Guitar".to_owned(), "Photography".to_owned()],
            image_url: "https://example.com/a.jpg".to_owned(),
            phone: None,
            email: Some(email.to_owned()),
            status: UserStatus::Active,
            is_premium: true,
            premium_expires_at: Some(now + Duration::days(30)),
            email_verified: false,
            email_verification_token: Some("deadbeef".to_owned()),
            email_verification_expires: Some(now + Duration::hours(24)),
            otp: Some("123456".to_owned()),
            otp_expires: Some(now + Duration::minutes(10)),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn users_round_trip_including_json_skills() {
        let store = test_store().await;
        let u = user("aarav@iitb.ac.in");
        store.insert_user(&u).await.unwrap();

        let loaded = store.user_by_id(u.id).await.unwrap().unwrap();
        assert_eq!(loaded.email, u.email);
        assert_eq!(loaded.skills, u.skills);
        assert_eq!(loaded.status, UserStatus::Active);
        assert_eq!(loaded.premium_expires_at, u.premium_expires_at);
        assert_eq!(loaded.created_at, u.created_at);

        let by_contact = store
            .user_by_contact(Some("aarav@iitb.ac.in"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_contact.id, u.id);

        let by_token = store
            .user_by_verification_token("deadbeef")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_token.id, u.id);

        assert!(store.user_by_contact(None, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_contacts_map_to_conflict() {
        let store = test_store().await;
        store.insert_user(&user("same@x.com")).await.unwrap();

        let err = store.insert_user(&user("same@x.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let mut other = user("other@x.com");
        store.insert_user(&other).await.unwrap();
        other.email = Some("same@x.com".to_owned());
        let err = store.update_user(&other).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = store.update_user(&user("ghost@x.com")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_match_upserts_leave_one_row() {
        let store = test_store().await;
        let a = user("a@x.com");
        let b = user("b@x.com");
        store.insert_user(&a).await.unwrap();
        store.insert_user(&b).await.unwrap();

        let (lo, hi) = pair_key(a.id, b.id);
        let now = Utc::now().trunc_subsecs(3);
        let candidate = |adjective: &str| Match {
            id: Uuid::now_v7(),
            user_lo: lo,
            user_hi: hi,
            adjective: adjective.to_owned(),
            created_at: now,
        };

        let charming = candidate("Charming");
        let cute = candidate("Cute");
        let (first, second) = tokio::join!(
            store.upsert_match(&charming),
            store.upsert_match(&cute),
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(first.id, second.id);
        assert_eq!(store.count_matches_involving(a.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn request_upsert_and_guarded_resolve() {
        let store = test_store().await;
        let a = user("a@x.com");
        let b = user("b@x.com");
        store.insert_user(&a).await.unwrap();
        store.insert_user(&b).await.unwrap();

        let now = Utc::now().trunc_subsecs(3);
        let request = MessageRequest {
            id: Uuid::now_v7(),
            from_user_id: a.id,
            to_user_id: b.id,
            adjective: "Funny".to_owned(),
            status: RequestStatus::Pending,
            created_at: now,
        };
        let winner = store.upsert_request(&request).await.unwrap();
        assert_eq!(winner.id, request.id);

        let duplicate = MessageRequest {
            id: Uuid::now_v7(),
            ..request.clone()
        };
        let winner = store.upsert_request(&duplicate).await.unwrap();
        assert_eq!(winner.id, request.id);

        assert!(
            store
                .resolve_request(request.id, RequestStatus::Accepted)
                .await
                .unwrap()
        );
        // already resolved, the guard refuses a second flip
        assert!(
            !store
                .resolve_request(request.id, RequestStatus::Declined)
                .await
                .unwrap()
        );
        let loaded = store.request_by_id(request.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RequestStatus::Accepted);

        assert!(store.accepted_request_exists(b.id, a.id).await.unwrap());
        assert_eq!(store.accepted_requests_involving(b.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn signals_order_newest_first_and_count_respects_since() {
        let store = test_store().await;
        let a = user("a@x.com");
        let b = user("b@x.com");
        store.insert_user(&a).await.unwrap();
        store.insert_user(&b).await.unwrap();

        let base = Utc::now().trunc_subsecs(3);
        for (i, adjective) in ["Bold", "Cool", "Warm"].iter().enumerate() {
            let signal = Signal {
                id: Uuid::now_v7(),
                from_user_id: a.id,
                to_user_id: b.id,
                adjective: (*adjective).to_owned(),
                created_at: base + Duration::seconds(i as i64),
            };
            store.insert_signal(&signal).await.unwrap();
        }

        let received = store.signals_to(b.id).await.unwrap();
        let adjectives: Vec<&str> = received.iter().map(|s| s.adjective.as_str()).collect();
        assert_eq!(adjectives, ["Warm", "Cool", "Bold"]);

        assert!(store.reverse_signal_exists(a.id, b.id, "Cool").await.unwrap());
        assert!(!store.reverse_signal_exists(b.id, a.id, "Cool").await.unwrap());

        let since = base + Duration::seconds(1);
        assert_eq!(store.count_sent_since(a.id, since).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn mark_read_touches_one_direction_once() {
        let store = test_store().await;
        let a = user("a@x.com");
        let b = user("b@x.com");
        store.insert_user(&a).await.unwrap();
        store.insert_user(&b).await.unwrap();

        let base = Utc::now().trunc_subsecs(3);
        let message = |from: Uuid, to: Uuid, text: &str, offset: i64| Message {
            id: Uuid::now_v7(),
            from_user_id: from,
            to_user_id: to,
            text: text.to_owned(),
            read: false,
            read_at: None,
            created_at: base + Duration::seconds(offset),
        };
        store.insert_message(&message(a.id, b.id, "hi", 0)).await.unwrap();
        store.insert_message(&message(b.id, a.id, "hey", 1)).await.unwrap();
        store.insert_message(&message(a.id, b.id, "how are you", 2)).await.unwrap();

        assert_eq!(store.mark_read(a.id, b.id, base).await.unwrap(), 2);
        assert_eq!(store.mark_read(a.id, b.id, base).await.unwrap(), 0);

        let thread = store.conversation(a.id, b.id).await.unwrap();
        let texts: Vec<&str> = thread.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["hi", "hey", "how are you"]);
        assert!(thread[0].read && thread[2].read);
        assert!(!thread[1].read);
        assert_eq!(thread[0].read_at, Some(base));
    }
}
