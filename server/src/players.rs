//! Player accounts: registration, lookup, sign-in and the leaderboard.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::persistence::{
    generate_id, now_timestamp, PersistenceError, Persistence, Player, PlayerFilter,
    PlayerRepository,
};

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("Invalid username or password")]
    BadCredentials,
    #[error("Password hashing failed: {0}")]
    Hash(String),
    #[error("Persistence error: {0}")]
    Persistence(PersistenceError),
}

impl From<PersistenceError> for PlayerError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Persistence(other),
        }
    }
}

/// Hash a password with argon2id.
pub fn hash_password(password: &str) -> Result<String, PlayerError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PlayerError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Check `password` against a stored argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub struct Players<D: Persistence> {
    store: Arc<D>,
}

impl<D: Persistence> Players<D> {
    pub fn new(store: Arc<D>) -> Self {
        Self { store }
    }

    /// Create an account. Fails with `Conflict` if the username or the
    /// email is already registered.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Player, PlayerError> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() {
            return Err(PlayerError::Invalid("username is empty".to_string()));
        }
        if email.is_empty() {
            return Err(PlayerError::Invalid("email is empty".to_string()));
        }
        if password.is_empty() {
            return Err(PlayerError::Invalid("password is empty".to_string()));
        }

        let repo = self.store.players();
        if repo
            .count_players(&PlayerFilter::by_username(username))
            .await?
            > 0
        {
            return Err(PlayerError::Conflict(format!(
                "username {username:?} is taken"
            )));
        }
        if repo.count_players(&PlayerFilter::by_email(email)).await? > 0 {
            return Err(PlayerError::Conflict(format!(
                "email {email:?} is already registered"
            )));
        }

        let player = Player {
            id: generate_id(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
            rating: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            total_games: 0,
            created_at: now_timestamp(),
        };
        // The UNIQUE constraint still catches a concurrent registration.
        repo.insert_player(&player).await?;
        tracing::info!(player_id = %player.id, username = %player.username, "Player registered");
        Ok(player)
    }

    /// The player whose username (or email, if `login` contains `@`) and
    /// password match.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<Player, PlayerError> {
        let login = login.trim();
        let filter = if login.contains('@') {
            PlayerFilter::by_email(login)
        } else {
            PlayerFilter::by_username(login)
        };
        let player = self
            .store
            .players()
            .find_player(&filter)
            .await?
            .ok_or(PlayerError::BadCredentials)?;
        if !verify_password(password, &player.password_hash) {
            tracing::debug!(login, "Rejected sign-in");
            return Err(PlayerError::BadCredentials);
        }
        Ok(player)
    }

    pub async fn find(&self, filter: &PlayerFilter) -> Result<Option<Player>, PlayerError> {
        Ok(self.store.players().find_player(filter).await?)
    }

    /// Players by rating, highest first.
    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<Player>, PlayerError> {
        Ok(self.store.players().leaderboard(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::sqlite::{Database, SqlitePersistence};

    async fn players() -> (Database, Players<SqlitePersistence>) {
        let db = Database::new_in_memory().await.unwrap();
        let players = Players::new(Arc::new(SqlitePersistence::from_database(&db)));
        (db, players)
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-hash"));
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let (_db, players) = players().await;
        let alice = players
            .register("alice", "alice@example.com", "s3cret")
            .await
            .unwrap();
        assert_eq!(alice.rating, 0);
        assert_ne!(alice.password_hash, "s3cret");

        let signed_in = players.authenticate("alice", "s3cret").await.unwrap();
        assert_eq!(signed_in.id, alice.id);
        assert!(matches!(
            players.authenticate("alice", "wrong").await,
            Err(PlayerError::BadCredentials)
        ));
        assert!(matches!(
            players.authenticate("bob", "s3cret").await,
            Err(PlayerError::BadCredentials)
        ));

        let by_email = players
            .authenticate("alice@example.com", "s3cret")
            .await
            .unwrap();
        assert_eq!(by_email.id, alice.id);

        let found = players.find(&PlayerFilter::by_id(&alice.id)).await.unwrap();
        assert_eq!(found.map(|p| p.username), Some("alice".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let (_db, players) = players().await;
        players.register("alice", "a@example.com", "pw").await.unwrap();
        let err = players
            .register(" alice ", "other@example.com", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, PlayerError::Conflict(_)));
        assert!(matches!(
            players.register("", "x@example.com", "pw").await,
            Err(PlayerError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let (_db, players) = players().await;
        let alice = players.register("alice", "shared@example.com", "pw").await.unwrap();
        let err = players
            .register("bob", " shared@example.com ", "other")
            .await
            .unwrap_err();
        assert!(matches!(err, PlayerError::Conflict(_)));
        assert!(matches!(
            players.register("bob", "  ", "pw").await,
            Err(PlayerError::Invalid(_))
        ));

        // Signing in by email still finds exactly one account.
        let signed_in = players.authenticate("shared@example.com", "pw").await.unwrap();
        assert_eq!(signed_in.id, alice.id);
        assert!(players.find(&PlayerFilter::by_username("bob")).await.unwrap().is_none());
    }
}
