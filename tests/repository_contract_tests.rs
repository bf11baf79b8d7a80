use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use shiken_server::{
    auth::JwtService,
    config::Config,
    errors::AppResult,
    models::domain::{
        session_token::{generate_token, hash_token},
        SessionToken, User, UserRole,
    },
    repositories::{SessionTokenRepository, UserRepository},
    services::AuthService,
};

/// In-process stand-in for the shared session store. Mutations happen
/// under one write lock, which gives the same per-key atomicity the Mongo
/// implementation gets from single-document operations.
struct InMemorySessionTokenRepository {
    records: Arc<RwLock<HashMap<String, SessionToken>>>,
}

impl InMemorySessionTokenRepository {
    fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl SessionTokenRepository for InMemorySessionTokenRepository {
    async fn save(&self, token: SessionToken) -> AppResult<SessionToken> {
        let mut records = self.records.write().await;
        // Supersede any previous session for the same account.
        records.retain(|_, existing| existing.email != token.email);
        records.insert(token.token_hash.clone(), token.clone());
        Ok(token)
    }

    async fn find_by_token_hash(&self, hash: &str) -> AppResult<Option<SessionToken>> {
        let mut records = self.records.write().await;
        match records.get(hash) {
            Some(token) if token.is_expired() => {
                records.remove(hash);
                Ok(None)
            }
            other => Ok(other.cloned()),
        }
    }

    async fn consume_by_token_hash(&self, hash: &str) -> AppResult<Option<SessionToken>> {
        let mut records = self.records.write().await;
        Ok(records.remove(hash))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<SessionToken>> {
        let records = self.records.read().await;
        Ok(records.values().find(|t| t.email == email).cloned())
    }

    async fn delete_by_token_hash(&self, hash: &str) -> AppResult<()> {
        let mut records = self.records.write().await;
        records.remove(hash);
        Ok(())
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemoryUserRepository {
    fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn seed(&self, user: User) {
        self.users.write().await.insert(user.email.clone(), user);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> AppResult<User> {
        let mut users = self.users.write().await;
        users.insert(user.email.clone(), user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(email).cloned())
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        Ok(())
    }
}

fn session_record(email: &str, raw_token: &str, ttl_hours: i64) -> SessionToken {
    SessionToken::new(
        hash_token(raw_token),
        "user123".to_string(),
        email.to_string(),
        "johndoe".to_string(),
        vec![UserRole::User],
        ttl_hours,
    )
}

#[actix_web::test]
async fn test_rotation_invalidates_previous_token() {
    let repo = InMemorySessionTokenRepository::new();

    let first = session_record("john@example.com", "token-a", 168);
    let first_hash = first.token_hash.clone();
    repo.save(first).await.unwrap();

    let second = session_record("john@example.com", "token-b", 168);
    let second_hash = second.token_hash.clone();
    repo.save(second).await.unwrap();

    assert!(repo.find_by_token_hash(&first_hash).await.unwrap().is_none());
    assert!(repo
        .find_by_token_hash(&second_hash)
        .await
        .unwrap()
        .is_some());
}

#[actix_web::test]
async fn test_rotation_does_not_cross_accounts() {
    let repo = InMemorySessionTokenRepository::new();

    let john = session_record("john@example.com", "token-a", 168);
    let jane = session_record("jane@example.com", "token-b", 168);
    let john_hash = john.token_hash.clone();

    repo.save(john).await.unwrap();
    repo.save(jane).await.unwrap();

    assert!(repo.find_by_token_hash(&john_hash).await.unwrap().is_some());
}

#[actix_web::test]
async fn test_expired_record_reads_as_absent() {
    let repo = InMemorySessionTokenRepository::new();

    let stale = session_record("john@example.com", "token-a", -1);
    let hash = stale.token_hash.clone();
    repo.save(stale).await.unwrap();

    assert!(repo.find_by_token_hash(&hash).await.unwrap().is_none());
    // The cleanup delete removed it entirely.
    assert!(repo.records.read().await.is_empty());
}

#[actix_web::test]
async fn test_consume_returns_record_exactly_once() {
    let repo = InMemorySessionTokenRepository::new();

    let record = session_record("john@example.com", "token-a", 168);
    let hash = record.token_hash.clone();
    repo.save(record).await.unwrap();

    assert!(repo.consume_by_token_hash(&hash).await.unwrap().is_some());
    assert!(repo.consume_by_token_hash(&hash).await.unwrap().is_none());
}

#[actix_web::test]
async fn test_delete_is_idempotent() {
    let repo = InMemorySessionTokenRepository::new();

    assert!(repo.delete_by_token_hash("never-existed").await.is_ok());

    let record = session_record("john@example.com", "token-a", 168);
    let hash = record.token_hash.clone();
    repo.save(record).await.unwrap();

    assert!(repo.delete_by_token_hash(&hash).await.is_ok());
    assert!(repo.delete_by_token_hash(&hash).await.is_ok());
}

#[actix_web::test]
async fn test_concurrent_refresh_has_exactly_one_winner() {
    let users = Arc::new(InMemoryUserRepository::new());
    let password_hash = bcrypt::hash("Str0ng!pass", 4).unwrap();
    users
        .seed(User::new(
            "John",
            "Doe",
            "johndoe",
            "john@example.com",
            &password_hash,
        ))
        .await;

    let sessions = Arc::new(InMemorySessionTokenRepository::new());
    let raw_token = generate_token();
    sessions
        .save(session_record("john@example.com", &raw_token, 168))
        .await
        .unwrap();

    let config = Config::test_config();
    let service = AuthService::new(
        users,
        sessions,
        JwtService::new(&config.jwt_secret, 1),
        config.session_ttl_hours,
    );

    let (first, second) = tokio::join!(service.refresh(&raw_token), service.refresh(&raw_token));

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one concurrent refresh may succeed");

    let loser = if first.is_err() { first } else { second };
    match loser {
        Err(err) => assert_eq!(err.error_code(), "UNAUTHORIZED"),
        Ok(_) => unreachable!(),
    }
}
