use color_eyre::Result;

use crate::db::models::UserRecord;
use crate::db::{hash_password, verify_password, Db};
use crate::names::MIN_PASSWORD_LENGTH;

// ---------------------------------------------------------------------------
// AccountRepository trait (the service defines the abstraction it needs)
// ---------------------------------------------------------------------------

#[cfg_attr(test, mockall::automock)]
pub trait AccountRepository: Send + Sync {
    /// The user with this email and their stored password hash.
    fn credentials(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<(UserRecord, String)>>> + Send;

    fn stored_hash(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<String>>> + Send;

    /// Replaces the hash and clears the change-login flag.
    fn store_hash(
        &self,
        user_id: i64,
        password_hash: &str,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;
}

impl AccountRepository for Db {
    async fn credentials(&self, email: &str) -> Result<Option<(UserRecord, String)>> {
        self.find_credentials(email).await
    }

    async fn stored_hash(&self, user_id: i64) -> Result<Option<String>> {
        self.password_hash(user_id).await
    }

    async fn store_hash(&self, user_id: i64, password_hash: &str) -> Result<bool> {
        self.set_password_hash(user_id, password_hash).await
    }
}

// ---------------------------------------------------------------------------
// Outcome enums
// ---------------------------------------------------------------------------

pub enum LoginOutcome {
    Success(UserRecord),
    /// Unknown email or wrong password.
    InvalidCredentials,
    EmptyFields,
}

pub enum ChangePasswordOutcome {
    Success,
    EmptyFields,
    WeakPassword,
    IncorrectPassword,
    UnknownUser,
}

// ---------------------------------------------------------------------------
// AuthService
// ---------------------------------------------------------------------------

pub struct AuthService<R: AccountRepository = Db> {
    repo: R,
}

impl<R: AccountRepository + Clone> Clone for AuthService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
        }
    }
}

impl<R: AccountRepository> AuthService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// `email` is expected trimmed and lowercased.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        if email.is_empty() || password.is_empty() {
            return Ok(LoginOutcome::EmptyFields);
        }

        let Some((user, hash)) = self.repo.credentials(email).await? else {
            return Ok(LoginOutcome::InvalidCredentials);
        };

        if !verify_password(password, &hash) {
            tracing::info!("failed login for user_id={}", user.id);
            return Ok(LoginOutcome::InvalidCredentials);
        }

        tracing::info!("user logged in: id={}", user.id);
        Ok(LoginOutcome::Success(user))
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<ChangePasswordOutcome> {
        if current_password.is_empty() || new_password.is_empty() {
            return Ok(ChangePasswordOutcome::EmptyFields);
        }

        if new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Ok(ChangePasswordOutcome::WeakPassword);
        }

        let Some(stored) = self.repo.stored_hash(user_id).await? else {
            return Ok(ChangePasswordOutcome::UnknownUser);
        };

        if !verify_password(current_password, &stored) {
            return Ok(ChangePasswordOutcome::IncorrectPassword);
        }

        let new_hash = hash_password(new_password)?;
        if !self.repo.store_hash(user_id, &new_hash).await? {
            return Ok(ChangePasswordOutcome::UnknownUser);
        }

        tracing::info!("password changed for user_id={user_id}");
        Ok(ChangePasswordOutcome::Success)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::models::Role;

    fn user() -> UserRecord {
        UserRecord {
            id: 1,
            email: "test@example.com".to_string(),
            user_name: "Test".to_string(),
            class_code: Some("10A".to_string()),
            status: Role::Student,
            avatar: None,
            change_login: true,
        }
    }

    // ----- login tests -----

    #[tokio::test]
    async fn login_success_returns_user() {
        let hash = hash_password("password123").unwrap();
        let mut mock = MockAccountRepository::new();
        mock.expect_credentials()
            .withf(|email| email == "test@example.com")
            .returning(move |_| {
                let hash = hash.clone();
                Box::pin(async move { Ok(Some((user(), hash))) })
            });

        let svc = AuthService::new(mock);
        let outcome = svc.login("test@example.com", "password123").await.unwrap();

        assert!(matches!(outcome, LoginOutcome::Success(ref u) if u.id == 1 && u.change_login));
    }

    #[tokio::test]
    async fn login_wrong_password_returns_invalid_credentials() {
        let hash = hash_password("password123").unwrap();
        let mut mock = MockAccountRepository::new();
        mock.expect_credentials().returning(move |_| {
            let hash = hash.clone();
            Box::pin(async move { Ok(Some((user(), hash))) })
        });

        let svc = AuthService::new(mock);
        let outcome = svc.login("test@example.com", "wrong").await.unwrap();

        assert!(matches!(outcome, LoginOutcome::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_unknown_email_returns_invalid_credentials() {
        let mut mock = MockAccountRepository::new();
        mock.expect_credentials()
            .returning(|_| Box::pin(async { Ok(None) }));

        let svc = AuthService::new(mock);
        let outcome = svc.login("nobody@example.com", "password").await.unwrap();

        assert!(matches!(outcome, LoginOutcome::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_empty_fields_skips_lookup() {
        let mut mock = MockAccountRepository::new();
        mock.expect_credentials().never();

        let svc = AuthService::new(mock);
        let outcome = svc.login("", "password").await.unwrap();
        assert!(matches!(outcome, LoginOutcome::EmptyFields));
    }

    // ----- change_password tests -----

    #[tokio::test]
    async fn change_password_empty_fields_returns_empty_fields() {
        let svc = AuthService::new(MockAccountRepository::new());
        let outcome = svc.change_password(1, "", "newpassword").await.unwrap();
        assert!(matches!(outcome, ChangePasswordOutcome::EmptyFields));

        let svc = AuthService::new(MockAccountRepository::new());
        let outcome = svc.change_password(1, "old", "").await.unwrap();
        assert!(matches!(outcome, ChangePasswordOutcome::EmptyFields));
    }

    #[tokio::test]
    async fn change_password_short_returns_weak_password() {
        let svc = AuthService::new(MockAccountRepository::new());
        let outcome = svc.change_password(1, "oldpassword", "short").await.unwrap();
        assert!(matches!(outcome, ChangePasswordOutcome::WeakPassword));
    }

    #[tokio::test]
    async fn change_password_success_stores_new_hash() {
        let hash = hash_password("oldpassword").unwrap();
        let mut mock = MockAccountRepository::new();
        mock.expect_stored_hash().returning(move |_| {
            let hash = hash.clone();
            Box::pin(async move { Ok(Some(hash)) })
        });
        mock.expect_store_hash()
            .withf(|id, hash| *id == 1 && verify_password("newpassword", hash))
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(true) }));

        let svc = AuthService::new(mock);
        let outcome = svc
            .change_password(1, "oldpassword", "newpassword")
            .await
            .unwrap();
        assert!(matches!(outcome, ChangePasswordOutcome::Success));
    }

    #[tokio::test]
    async fn change_password_incorrect_returns_incorrect() {
        let hash = hash_password("oldpassword").unwrap();
        let mut mock = MockAccountRepository::new();
        mock.expect_stored_hash().returning(move |_| {
            let hash = hash.clone();
            Box::pin(async move { Ok(Some(hash)) })
        });
        mock.expect_store_hash().never();

        let svc = AuthService::new(mock);
        let outcome = svc
            .change_password(1, "notmypassword", "newpassword")
            .await
            .unwrap();
        assert!(matches!(outcome, ChangePasswordOutcome::IncorrectPassword));
    }

    #[tokio::test]
    async fn change_password_unknown_user() {
        let mut mock = MockAccountRepository::new();
        mock.expect_stored_hash()
            .returning(|_| Box::pin(async { Ok(None) }));

        let svc = AuthService::new(mock);
        let outcome = svc
            .change_password(99, "oldpassword", "newpassword")
            .await
            .unwrap();
        assert!(matches!(outcome, ChangePasswordOutcome::UnknownUser));
    }
}
