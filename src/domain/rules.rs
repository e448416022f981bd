//! The interaction rules, implemented once against the storage traits so the
//! SQLite and in-memory backends cannot drift apart.

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use crate::domain::pair_key;
use crate::error::{AppError, AppResult};
use crate::models::{Match, Message, MessageRequest, RequestStatus, Signal, User};
use crate::store::Store;

/// Vibes a non-premium user may send per local calendar day.
pub const DAILY_FREE_SIGNALS: i64 = 10;
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Start of the current calendar day in the server's timezone, as UTC.
/// The daily counter resets at local midnight, not at a rolling 24h mark.
pub fn start_of_local_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let local = now.with_timezone(&Local);
    let midnight = local.date_naive().and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        // a DST gap exactly at midnight; count nothing rather than guess
        .unwrap_or(local)
        .with_timezone(&Utc)
}

/// Premium counts only while unexpired. A missing expiry means a plan that
/// never lapses.
pub fn effective_premium(user: &User, now: DateTime<Utc>) -> bool {
    user.is_premium && user.premium_expires_at.is_none_or(|expires| expires > now)
}

/// Gate the HTTP layer calls before recording a vibe. The ledger itself
/// accepts any append; the cap is the caller's concern.
pub async fn ensure_can_send(
    store: &dyn Store,
    sender: &User,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if effective_premium(sender, now) {
        return Ok(());
    }
    let sent = store
        .count_sent_since(sender.id, start_of_local_day(now))
        .await?;
    if sent >= DAILY_FREE_SIGNALS {
        return Err(AppError::forbidden(
            "Daily vibe limit reached. Upgrade to premium for unlimited vibes.",
        ));
    }
    Ok(())
}

/// Appends a vibe and detects a mutual match: the recipient must have sent
/// the sender the identical adjective (case-sensitive) at any point in the
/// past. Returns the match when one exists for the pair afterwards; an
/// earlier match for the same pair is returned unchanged, whatever its
/// adjective.
pub async fn record_signal(
    store: &dyn Store,
    from: Uuid,
    to: Uuid,
    adjective: &str,
    now: DateTime<Utc>,
) -> AppResult<(Signal, Option<Match>)> {
    let adjective = adjective.trim();
    if adjective.is_empty() {
        return Err(AppError::validation("toUserId and adjective are required"));
    }
    if from == to {
        return Err(AppError::validation("Cannot send a vibe to yourself"));
    }
    if store.user_by_id(from).await?.is_none() || store.user_by_id(to).await?.is_none() {
        return Err(AppError::not_found("User not found"));
    }

    let signal = Signal {
        id: Uuid::now_v7(),
        from_user_id: from,
        to_user_id: to,
        adjective: adjective.to_owned(),
        created_at: now,
    };
    store.insert_signal(&signal).await?;

    let matched = if store.reverse_signal_exists(to, from, adjective).await? {
        let (user_lo, user_hi) = pair_key(from, to);
        let candidate = Match {
            id: Uuid::now_v7(),
            user_lo,
            user_hi,
            adjective: adjective.to_owned(),
            created_at: now,
        };
        let winner = store.upsert_match(&candidate).await?;
        if winner.id == candidate.id {
            tracing::info!(match_id = %winner.id, adjective, "mutual adjective, match created");
        }
        Some(winner)
    } else {
        None
    };

    Ok((signal, matched))
}

pub async fn signals_received_by(store: &dyn Store, user: Uuid) -> AppResult<Vec<Signal>> {
    store.signals_to(user).await
}

pub async fn signals_sent_by(store: &dyn Store, user: Uuid) -> AppResult<Vec<Signal>> {
    store.signals_from(user).await
}

pub async fn count_sent_today(
    store: &dyn Store,
    user: Uuid,
    now: DateTime<Utc>,
) -> AppResult<i64> {
    store.count_sent_since(user, start_of_local_day(now)).await
}

/// Creates a message request, or hands back the existing one for this
/// ordered pair in whatever state it is. The bool is true when this call
/// created the row.
pub async fn create_request(
    store: &dyn Store,
    from: Uuid,
    to: Uuid,
    adjective: &str,
    now: DateTime<Utc>,
) -> AppResult<(MessageRequest, bool)> {
    let adjective = adjective.trim();
    if adjective.is_empty() {
        return Err(AppError::validation("toUserId and adjective are required"));
    }
    if from == to {
        return Err(AppError::validation(
            "Cannot send a message request to yourself",
        ));
    }
    if store.user_by_id(from).await?.is_none() || store.user_by_id(to).await?.is_none() {
        return Err(AppError::not_found("User not found"));
    }

    let candidate = MessageRequest {
        id: Uuid::now_v7(),
        from_user_id: from,
        to_user_id: to,
        adjective: adjective.to_owned(),
        status: RequestStatus::Pending,
        created_at: now,
    };
    let winner = store.upsert_request(&candidate).await?;
    let created = winner.id == candidate.id;
    Ok((winner, created))
}

/// Recipient accepts or declines a pending request. Terminal states stay
/// terminal; the recipient check comes first so a stranger probing an id
/// learns nothing about its state.
pub async fn respond(
    store: &dyn Store,
    request_id: Uuid,
    by: Uuid,
    decision: RequestStatus,
) -> AppResult<MessageRequest> {
    if decision == RequestStatus::Pending {
        return Err(AppError::validation("Status must be accepted or declined"));
    }

    let Some(request) = store.request_by_id(request_id).await? else {
        return Err(AppError::not_found("Request not found"));
    };
    if request.to_user_id != by {
        return Err(AppError::forbidden(
            "Only the recipient can respond to a request",
        ));
    }
    if request.status != RequestStatus::Pending {
        return Err(AppError::Conflict("Request already resolved".to_owned()));
    }
    if !store.resolve_request(request_id, decision).await? {
        // someone else resolved it between our read and write
        return Err(AppError::Conflict("Request already resolved".to_owned()));
    }

    Ok(MessageRequest {
        status: decision,
        ..request
    })
}

/// Two users may message once they matched or once either side's request was
/// accepted. Nothing revokes eligibility.
pub async fn is_eligible_to_message(store: &dyn Store, a: Uuid, b: Uuid) -> AppResult<bool> {
    if store.match_between(a, b).await?.is_some() {
        return Ok(true);
    }
    store.accepted_request_exists(a, b).await
}

pub async fn send_message(
    store: &dyn Store,
    from: Uuid,
    to: Uuid,
    text: &str,
    now: DateTime<Utc>,
) -> AppResult<Message> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::validation("toUserId and text are required"));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::validation(
            "Message text must be at most 1000 characters",
        ));
    }
    if !is_eligible_to_message(store, from, to).await? {
        return Err(AppError::forbidden("Cannot send message to this user"));
    }

    let message = Message {
        id: Uuid::now_v7(),
        from_user_id: from,
        to_user_id: to,
        text: text.to_owned(),
        read: false,
        read_at: None,
        created_at: now,
    };
    store.insert_message(&message).await?;
    Ok(message)
}

/// Full thread between the viewer and one other user, oldest-first. Gated by
/// the same eligibility rule as sending.
pub async fn conversation(
    store: &dyn Store,
    viewer: Uuid,
    other: Uuid,
) -> AppResult<Vec<Message>> {
    if !is_eligible_to_message(store, viewer, other).await? {
        return Err(AppError::forbidden("Cannot access this conversation"));
    }
    store.conversation(viewer, other).await
}

/// Marks everything `other` sent to `recipient` as read. Idempotent; returns
/// the number of rows that actually flipped.
pub async fn mark_read(
    store: &dyn Store,
    recipient: Uuid,
    other: Uuid,
    now: DateTime<Utc>,
) -> AppResult<u64> {
    store.mark_read(other, recipient, now).await
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::{Gender, UserStatus};
    use crate::store::{MatchStore, MemoryStore, MessageStore, UserStore};

    fn user(name: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::now_v7(),
            name: name.to_owned(),
            gender: Gender::Other,
            college: "IIT Delhi".to_owned(),
            year: "2nd Year".to_owned(),
            age: 20,
            skills: vec!["Music".to_owned()],
            image_url: String::new(),
            phone: None,
            email: Some(format!("{}@example.com", name.to_lowercase())),
            status: UserStatus::Active,
            is_premium: false,
            premium_expires_at: None,
            email_verified: true,
            email_verification_token: None,
            email_verification_expires: None,
            otp: None,
            otp_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn seeded(names: &[&str]) -> (MemoryStore, Vec<User>) {
        let store = MemoryStore::new();
        let mut users = Vec::new();
        for name in names {
            let u = user(name);
            store.insert_user(&u).await.unwrap();
            users.push(u);
        }
        (store, users)
    }

    #[tokio::test]
    async fn mutual_adjective_creates_exactly_one_match() {
        let (store, users) = seeded(&["Aarav", "Diya"]).await;
        let (a, d) = (users[0].id, users[1].id);
        let now = Utc::now();

        let (_, matched) = record_signal(&store, a, d, "Charming", now).await.unwrap();
        assert!(matched.is_none());

        let (_, matched) = record_signal(&store, d, a, "Charming", now).await.unwrap();
        let first = matched.expect("reciprocal signal should match");

        // repeating either side lands on the same row
        let (_, matched) = record_signal(&store, a, d, "Charming", now).await.unwrap();
        assert_eq!(matched.unwrap().id, first.id);
        assert_eq!(store.matches_involving(a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn adjectives_must_agree_exactly() {
        let (store, users) = seeded(&["Aarav", "Diya"]).await;
        let (a, d) = (users[0].id, users[1].id);
        let now = Utc::now();

        record_signal(&store, a, d, "Charming", now).await.unwrap();
        let (_, matched) = record_signal(&store, d, a, "Cute", now).await.unwrap();
        assert!(matched.is_none());

        // case matters
        let (_, matched) = record_signal(&store, d, a, "charming", now).await.unwrap();
        assert!(matched.is_none());
    }

    #[tokio::test]
    async fn second_mutual_adjective_keeps_the_original_match() {
        let (store, users) = seeded(&["Aarav", "Diya"]).await;
        let (a, d) = (users[0].id, users[1].id);
        let now = Utc::now();

        record_signal(&store, a, d, "Cute", now).await.unwrap();
        let (_, matched) = record_signal(&store, d, a, "Cute", now).await.unwrap();
        let original = matched.unwrap();

        record_signal(&store, a, d, "Warm", now).await.unwrap();
        let (_, matched) = record_signal(&store, d, a, "Warm", now).await.unwrap();
        let kept = matched.unwrap();
        assert_eq!(kept.id, original.id);
        assert_eq!(kept.adjective, "Cute");
    }

    #[tokio::test]
    async fn signals_validate_their_endpoints() {
        let (store, users) = seeded(&["Aarav"]).await;
        let a = users[0].id;
        let now = Utc::now();

        let err = record_signal(&store, a, a, "Bold", now).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = record_signal(&store, a, Uuid::now_v7(), "Bold", now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = record_signal(&store, a, a, "   ", now).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn the_cap_stops_the_eleventh_vibe_but_not_the_ledger() {
        let (store, users) = seeded(&["Aarav", "Diya"]).await;
        let (sender, target) = (users[0].clone(), users[1].id);
        let now = Utc::now();

        for _ in 0..DAILY_FREE_SIGNALS {
            ensure_can_send(&store, &sender, now).await.unwrap();
            record_signal(&store, sender.id, target, "Bold", now)
                .await
                .unwrap();
        }

        let err = ensure_can_send(&store, &sender, now).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        // the ledger itself still appends when called directly
        record_signal(&store, sender.id, target, "Bold", now)
            .await
            .unwrap();
        assert_eq!(
            count_sent_today(&store, sender.id, now).await.unwrap(),
            DAILY_FREE_SIGNALS + 1
        );
    }

    #[tokio::test]
    async fn premium_lifts_the_cap_until_it_expires() {
        let (store, users) = seeded(&["Aarav", "Diya"]).await;
        let mut sender = users[0].clone();
        let target = users[1].id;
        let now = Utc::now();

        for _ in 0..DAILY_FREE_SIGNALS {
            record_signal(&store, sender.id, target, "Bold", now)
                .await
                .unwrap();
        }

        sender.is_premium = true;
        sender.premium_expires_at = Some(now + Duration::days(30));
        ensure_can_send(&store, &sender, now).await.unwrap();

        sender.premium_expires_at = Some(now - Duration::days(1));
        let err = ensure_can_send(&store, &sender, now).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        sender.premium_expires_at = None;
        ensure_can_send(&store, &sender, now).await.unwrap();
    }

    #[tokio::test]
    async fn the_daily_counter_resets_at_local_midnight() {
        let (store, users) = seeded(&["Aarav", "Diya"]).await;
        let (a, d) = (users[0].id, users[1].id);
        let now = Utc::now();
        let midnight = start_of_local_day(now);

        record_signal(&store, a, d, "Bold", midnight - Duration::minutes(1))
            .await
            .unwrap();
        record_signal(&store, a, d, "Bold", midnight + Duration::minutes(1))
            .await
            .unwrap();

        assert_eq!(count_sent_today(&store, a, now).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn requests_are_idempotent_per_ordered_pair() {
        let (store, users) = seeded(&["Aarav", "Diya"]).await;
        let (a, d) = (users[0].id, users[1].id);
        let now = Utc::now();

        let (first, created) = create_request(&store, a, d, "Cute", now).await.unwrap();
        assert!(created);

        let (again, created) = create_request(&store, a, d, "Warm", now).await.unwrap();
        assert!(!created);
        assert_eq!(again.id, first.id);
        assert_eq!(again.adjective, "Cute");

        // the opposite direction is its own request
        let (reverse, created) = create_request(&store, d, a, "Cute", now).await.unwrap();
        assert!(created);
        assert_ne!(reverse.id, first.id);
    }

    #[tokio::test]
    async fn only_the_recipient_resolves_a_request_and_only_once() {
        let (store, users) = seeded(&["Aarav", "Diya", "Kabir"]).await;
        let (a, d, k) = (users[0].id, users[1].id, users[2].id);
        let now = Utc::now();

        let (request, _) = create_request(&store, a, d, "Cute", now).await.unwrap();

        let err = respond(&store, request.id, k, RequestStatus::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = respond(&store, request.id, a, RequestStatus::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = respond(&store, Uuid::now_v7(), d, RequestStatus::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let resolved = respond(&store, request.id, d, RequestStatus::Declined)
            .await
            .unwrap();
        assert_eq!(resolved.status, RequestStatus::Declined);

        let err = respond(&store, request.id, d, RequestStatus::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn eligibility_comes_from_a_match_or_an_accepted_request() {
        let (store, users) = seeded(&["Aarav", "Diya", "Kabir", "Zara"]).await;
        let (a, d, k, z) = (users[0].id, users[1].id, users[2].id, users[3].id);
        let now = Utc::now();

        assert!(!is_eligible_to_message(&store, a, d).await.unwrap());

        // via mutual vibe
        record_signal(&store, a, d, "Cool", now).await.unwrap();
        record_signal(&store, d, a, "Cool", now).await.unwrap();
        assert!(is_eligible_to_message(&store, a, d).await.unwrap());
        assert!(is_eligible_to_message(&store, d, a).await.unwrap());

        // via accepted request, checked from both sides
        let (request, _) = create_request(&store, a, k, "Funny", now).await.unwrap();
        assert!(!is_eligible_to_message(&store, a, k).await.unwrap());
        respond(&store, request.id, k, RequestStatus::Accepted)
            .await
            .unwrap();
        assert!(is_eligible_to_message(&store, k, a).await.unwrap());

        // declined opens nothing
        let (request, _) = create_request(&store, a, z, "Funny", now).await.unwrap();
        respond(&store, request.id, z, RequestStatus::Declined)
            .await
            .unwrap();
        assert!(!is_eligible_to_message(&store, a, z).await.unwrap());
    }

    #[tokio::test]
    async fn a_forbidden_send_leaves_the_conversation_untouched() {
        let (store, users) = seeded(&["Aarav", "Diya"]).await;
        let (a, d) = (users[0].id, users[1].id);
        let now = Utc::now();

        let err = send_message(&store, a, d, "hey", now).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(store.conversation(a, d).await.unwrap().is_empty());

        let err = conversation(&store, a, d).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn messages_validate_their_text() {
        let (store, users) = seeded(&["Aarav", "Diya"]).await;
        let (a, d) = (users[0].id, users[1].id);
        let now = Utc::now();
        record_signal(&store, a, d, "Cool", now).await.unwrap();
        record_signal(&store, d, a, "Cool", now).await.unwrap();

        let err = send_message(&store, a, d, "   ", now).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let long = "x".repeat(MAX_MESSAGE_CHARS + 1);
        let err = send_message(&store, a, d, &long, now).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let exact = "x".repeat(MAX_MESSAGE_CHARS);
        send_message(&store, a, d, &exact, now).await.unwrap();

        let sent = send_message(&store, a, d, "  hi  ", now).await.unwrap();
        assert_eq!(sent.text, "hi");
    }

    #[tokio::test]
    async fn conversations_read_oldest_first_and_mark_read_is_idempotent() {
        let (store, users) = seeded(&["Aarav", "Diya"]).await;
        let (a, d) = (users[0].id, users[1].id);
        let now = Utc::now();
        record_signal(&store, a, d, "Cool", now).await.unwrap();
        record_signal(&store, d, a, "Cool", now).await.unwrap();

        send_message(&store, a, d, "first", now).await.unwrap();
        send_message(&store, d, a, "second", now + Duration::seconds(1))
            .await
            .unwrap();
        send_message(&store, a, d, "third", now + Duration::seconds(2))
            .await
            .unwrap();

        let thread = conversation(&store, d, a).await.unwrap();
        let texts: Vec<&str> = thread.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);

        // Diya reads Aarav's two messages; Aarav's own view stays unread
        let flipped = mark_read(&store, d, a, now + Duration::seconds(3))
            .await
            .unwrap();
        assert_eq!(flipped, 2);
        let flipped = mark_read(&store, d, a, now + Duration::seconds(4))
            .await
            .unwrap();
        assert_eq!(flipped, 0);

        let thread = conversation(&store, a, d).await.unwrap();
        assert!(thread.iter().filter(|m| m.from_user_id == a).all(|m| m.read));
        assert!(thread.iter().filter(|m| m.from_user_id == d).all(|m| !m.read));
    }
}
