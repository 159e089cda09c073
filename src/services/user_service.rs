use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::get_config;
use crate::dto::user_dto::{RegisterPayload, UpdateProfilePayload};
use crate::error::{Error, Result};
use crate::models::user::User;
use crate::services::mailer_service::MailerService;
use crate::utils::{crypto, token};

pub const MAX_LOGIN_ATTEMPTS: i32 = 5;
pub const LOCKOUT_MINUTES: i64 = 60;
pub const MAX_LOCKOUTS: i32 = 3;
pub const RESET_TOKEN_TTL_MINUTES: i64 = 60;

const RESET_TOKEN_LENGTH: usize = 48;

const USER_COLUMNS: &str = "id, email, password_hash, name, privacy_consent, marketing_consent, \
     login_attempts, locked_until, lockout_count, is_banned, reset_token, \
     reset_token_expires_at, is_deleted, deleted_at, created_at, updated_at";

/// What a failed login should do to the account counters.
#[derive(Debug, PartialEq, Eq)]
struct FailedAttemptOutcome {
    attempts: i32,
    lock: bool,
    lockouts: i32,
    ban: bool,
}

/// Five failures lock the account for an hour; the third lockout bans
/// it until a password reset.
fn assess_failed_attempt(current_attempts: i32, current_lockouts: i32) -> FailedAttemptOutcome {
    let attempts = current_attempts + 1;
    if attempts < MAX_LOGIN_ATTEMPTS {
        return FailedAttemptOutcome {
            attempts,
            lock: false,
            lockouts: current_lockouts,
            ban: false,
        };
    }
    let lockouts = current_lockouts + 1;
    FailedAttemptOutcome {
        attempts: 0,
        lock: true,
        lockouts,
        ban: lockouts >= MAX_LOCKOUTS,
    }
}

/// Two registrations can race the duplicate pre-check; a unique
/// violation from the insert is still the duplicate-email 400, never
/// a masked server error.
fn map_registration_error(e: sqlx::Error) -> Error {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::BadRequest(
            "An account with this email already exists".to_string(),
        ),
        other => Error::internal("Failed to create account", other),
    }
}

#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
    mailer: MailerService,
}

impl UserService {
    pub fn new(pool: PgPool, mailer: MailerService) -> Self {
        Self { pool, mailer }
    }

    pub async fn register(&self, payload: &RegisterPayload) -> Result<User> {
        if !payload.privacy_consent {
            return Err(Error::BadRequest("Privacy consent is required".to_string()));
        }

        let taken = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE email = $1 AND is_deleted = FALSE",
        )
        .bind(&payload.email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::internal("Failed to create account", e))?;
        if taken > 0 {
            return Err(Error::BadRequest(
                "An account with this email already exists".to_string(),
            ));
        }

        let password_hash = crypto::hash_password(&payload.password)
            .map_err(|e| Error::internal("Failed to create account", e))?;

        let sql = format!(
            "INSERT INTO users (email, password_hash, name, privacy_consent, marketing_consent) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&payload.email)
            .bind(&password_hash)
            .bind(&payload.name)
            .bind(payload.privacy_consent)
            .bind(payload.marketing_consent)
            .fetch_one(&self.pool)
            .await
            .map_err(map_registration_error)?;

        info!(user_id = %user.id, "Account registered");
        Ok(user)
    }

    /// Login failures are reported identically whether the email is
    /// unknown or the password wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let user = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| Error::Unauthorized("Invalid email or password".to_string()))?;

        if user.is_banned {
            return Err(Error::Forbidden(
                "Account locked. Reset your password to regain access.".to_string(),
            ));
        }
        if let Some(locked_until) = user.locked_until {
            if locked_until > Utc::now() {
                return Err(Error::Forbidden(
                    "Account temporarily locked after failed login attempts. Try again later."
                        .to_string(),
                ));
            }
        }

        let password_ok = crypto::verify_password(password, &user.password_hash)
            .map_err(|e| Error::internal("Failed to verify credentials", e))?;
        if !password_ok {
            self.record_failed_attempt(&user).await?;
            return Err(Error::Unauthorized("Invalid email or password".to_string()));
        }

        if user.login_attempts > 0 {
            sqlx::query("UPDATE users SET login_attempts = 0, updated_at = NOW() WHERE id = $1")
                .bind(user.id)
                .execute(&self.pool)
                .await
                .map_err(|e| Error::internal("Failed to verify credentials", e))?;
        }

        token::issue_session_token(user.id)
    }

    async fn record_failed_attempt(&self, user: &User) -> Result<()> {
        let outcome = assess_failed_attempt(user.login_attempts, user.lockout_count);
        if outcome.lock {
            let locked_until = Utc::now() + Duration::minutes(LOCKOUT_MINUTES);
            sqlx::query(
                "UPDATE users SET login_attempts = $2, locked_until = $3, lockout_count = $4, \
                 is_banned = $5, updated_at = NOW() WHERE id = $1",
            )
            .bind(user.id)
            .bind(outcome.attempts)
            .bind(locked_until)
            .bind(outcome.lockouts)
            .bind(outcome.ban)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::internal("Failed to verify credentials", e))?;
            warn!(user_id = %user.id, banned = outcome.ban, "Account locked after failed logins");
        } else {
            sqlx::query("UPDATE users SET login_attempts = $2, updated_at = NOW() WHERE id = $1")
                .bind(user.id)
                .bind(outcome.attempts)
                .execute(&self.pool)
                .await
                .map_err(|e| Error::internal("Failed to verify credentials", e))?;
        }
        Ok(())
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<User> {
        let sql = format!(
            "SELECT {} FROM users WHERE id = $1 AND is_deleted = FALSE",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::internal("Failed to retrieve profile", e))?
            .ok_or_else(|| Error::NotFound("Account not found".to_string()))
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        payload: &UpdateProfilePayload,
    ) -> Result<User> {
        let sql = format!(
            "UPDATE users SET name = COALESCE($2, name), \
             marketing_consent = COALESCE($3, marketing_consent), updated_at = NOW() \
             WHERE id = $1 AND is_deleted = FALSE RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .bind(&payload.name)
            .bind(payload.marketing_consent)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::internal("Failed to update profile", e))?
            .ok_or_else(|| Error::NotFound("Account not found".to_string()))
    }

    /// Soft-deletes the account and its offers in one transaction so
    /// orphaned listings never stay publicly visible.
    pub async fn soft_delete(&self, user_id: Uuid) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::internal("Failed to delete account", e))?;

        let deleted = sqlx::query(
            "UPDATE users SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::internal("Failed to delete account", e))?;
        if deleted.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| Error::internal("Failed to delete account", e))?;
            return Err(Error::NotFound("Account not found".to_string()));
        }

        sqlx::query(
            "UPDATE offers SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW() \
             WHERE user_id = $1 AND is_deleted = FALSE",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::internal("Failed to delete account", e))?;

        tx.commit()
            .await
            .map_err(|e| Error::internal("Failed to delete account", e))?;

        info!(user_id = %user_id, "Account soft-deleted");
        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let user = self.get_profile(user_id).await?;

        let current_ok = crypto::verify_password(current_password, &user.password_hash)
            .map_err(|e| Error::internal("Failed to change password", e))?;
        if !current_ok {
            return Err(Error::BadRequest(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = crypto::hash_password(new_password)
            .map_err(|e| Error::internal("Failed to change password", e))?;
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(&password_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::internal("Failed to change password", e))?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Always succeeds from the caller's point of view so the route
    /// reveals nothing about which emails have accounts.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let Some(user) = self.find_by_email(email).await? else {
            return Ok(());
        };

        let reset_token = token::generate_reset_token(RESET_TOKEN_LENGTH);
        let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
        sqlx::query(
            "UPDATE users SET reset_token = $2, reset_token_expires_at = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(user.id)
        .bind(&reset_token)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::internal("Failed to process reset request", e))?;

        let reset_link = format!(
            "{}/reset-password?token={}",
            get_config().cors_uri,
            reset_token
        );
        if let Err(e) = self.mailer.send_password_reset(&user.email, &reset_link).await {
            // Still answer 200: a transport error must not reveal
            // whether the account exists.
            error!(user_id = %user.id, error = %e, "Failed to deliver reset mail");
        }

        Ok(())
    }

    /// Consuming a valid token also clears every lockout flag, which
    /// is the documented way out of a banned account.
    pub async fn confirm_password_reset(&self, reset_token: &str, new_password: &str) -> Result<()> {
        let sql = format!(
            "SELECT {} FROM users WHERE reset_token = $1 AND reset_token_expires_at > NOW() \
             AND is_deleted = FALSE",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(reset_token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::internal("Failed to reset password", e))?
            .ok_or_else(|| Error::BadRequest("Invalid or expired reset token".to_string()))?;

        let password_hash = crypto::hash_password(new_password)
            .map_err(|e| Error::internal("Failed to reset password", e))?;
        sqlx::query(
            "UPDATE users SET password_hash = $2, reset_token = NULL, \
             reset_token_expires_at = NULL, login_attempts = 0, locked_until = NULL, \
             lockout_count = 0, is_banned = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(user.id)
        .bind(&password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::internal("Failed to reset password", e))?;

        info!(user_id = %user.id, "Password reset completed");
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE email = $1 AND is_deleted = FALSE",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::internal("Failed to verify credentials", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_below_the_threshold_only_count_up() {
        let outcome = assess_failed_attempt(2, 0);

        assert_eq!(
            outcome,
            FailedAttemptOutcome {
                attempts: 3,
                lock: false,
                lockouts: 0,
                ban: false,
            }
        );
    }

    #[test]
    fn fifth_failure_locks_and_resets_the_counter() {
        let outcome = assess_failed_attempt(4, 0);

        assert_eq!(
            outcome,
            FailedAttemptOutcome {
                attempts: 0,
                lock: true,
                lockouts: 1,
                ban: false,
            }
        );
    }

    #[test]
    fn third_lockout_bans_the_account() {
        let outcome = assess_failed_attempt(4, 2);

        assert!(outcome.lock);
        assert!(outcome.ban);
        assert_eq!(outcome.lockouts, 3);
    }

    #[test]
    fn lockouts_beyond_the_ban_threshold_stay_banned() {
        let outcome = assess_failed_attempt(4, 5);

        assert!(outcome.ban);
    }

    #[derive(Debug)]
    struct DuplicateKeyError;

    impl std::fmt::Display for DuplicateKeyError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("duplicate key value violates unique constraint \"idx_users_email_active\"")
        }
    }

    impl std::error::Error for DuplicateKeyError {}

    impl sqlx::error::DatabaseError for DuplicateKeyError {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint \"idx_users_email_active\""
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn racing_registrations_report_the_email_as_taken() {
        let err = map_registration_error(sqlx::Error::Database(Box::new(DuplicateKeyError)));

        assert!(matches!(
            err,
            Error::BadRequest(msg) if msg == "An account with this email already exists"
        ));
    }

    #[test]
    fn non_conflict_insert_failures_stay_masked() {
        let err = map_registration_error(sqlx::Error::PoolTimedOut);

        assert!(matches!(err, Error::Internal(msg) if msg == "Failed to create account"));
    }

    #[test]
    fn deleted_accounts_release_their_email() {
        let ddl = include_str!("../../migrations/20250712093000_users.sql");

        assert!(!ddl.contains("email TEXT NOT NULL UNIQUE"));
        assert!(ddl.contains(
            "CREATE UNIQUE INDEX idx_users_email_active ON users (email) WHERE is_deleted = FALSE;"
        ));
    }
}
