use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use color_eyre::{eyre::OptionExt, Result};

use super::models::{
    ImportReport, NewUser, Role, RosterEntry, SelfUpdate, UserFilter, UserRecord, UserUpdate,
    Write,
};
use super::{is_unique_violation, Db};

const USER_COLUMNS: &str = "id, email, user_name, class_code, status, avatar, change_login";

impl Db {
    /// Returns `None` when the email is already registered.
    pub async fn create_user(&self, user: &NewUser) -> Result<Option<i64>> {
        let password_hash = hash_password(&user.password)?;

        let inserted = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO users (email, password_hash, user_name, class_code, status, avatar, change_login)
               VALUES (?, ?, ?, ?, ?, ?, FALSE)
               RETURNING id"#,
        )
        .bind(&user.email)
        .bind(&password_hash)
        .bind(&user.user_name)
        .bind(&user.class_code)
        .bind(user.role.code())
        .bind(&user.avatar)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(id) => {
                tracing::info!("new user created: id={id}, email={}", user.email);
                Ok(Some(id))
            }
            Err(e) => {
                let report = color_eyre::Report::from(e);
                if is_unique_violation(&report) {
                    Ok(None)
                } else {
                    Err(report)
                }
            }
        }
    }

    /// A new password forces the user to change it at next login.
    pub async fn update_user(&self, update: &UserUpdate) -> Result<Write> {
        let password_hash = update.password.as_deref().map(hash_password).transpose()?;

        let result = sqlx::query(
            r#"UPDATE users SET
                   email = ?,
                   user_name = ?,
                   class_code = ?,
                   status = ?,
                   avatar = ?,
                   password_hash = COALESCE(?, password_hash),
                   change_login = CASE WHEN ? IS NULL THEN change_login ELSE TRUE END
               WHERE id = ?"#,
        )
        .bind(&update.email)
        .bind(&update.user_name)
        .bind(&update.class_code)
        .bind(update.role.code())
        .bind(&update.avatar)
        .bind(&password_hash)
        .bind(&password_hash)
        .bind(update.id)
        .execute(&self.pool)
        .await;

        written(result)
    }

    /// Only the supplied fields change; setting a password clears the
    /// change-login flag.
    pub async fn update_self(&self, update: &SelfUpdate) -> Result<Write> {
        let password_hash = update.password.as_deref().map(hash_password).transpose()?;

        let result = sqlx::query(
            r#"UPDATE users SET
                   email = COALESCE(?, email),
                   avatar = COALESCE(?, avatar),
                   password_hash = COALESCE(?, password_hash),
                   change_login = CASE WHEN ? IS NULL THEN change_login ELSE FALSE END
               WHERE id = ?"#,
        )
        .bind(&update.email)
        .bind(&update.avatar)
        .bind(&password_hash)
        .bind(&password_hash)
        .bind(update.id)
        .execute(&self.pool)
        .await;

        written(result)
    }

    pub async fn delete_user(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            tracing::info!("user deleted: id={id}");
        }
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_user(&self, id: i64) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn list_users(&self, filter: &UserFilter) -> Result<Vec<UserRecord>> {
        let users = sqlx::query_as::<_, UserRecord>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users
               WHERE (?1 IS NULL OR id = ?1)
                 AND (?2 IS NULL OR class_code = ?2)
                 AND (?3 IS NULL OR status = ?3)
               ORDER BY user_name COLLATE NOCASE, id"#
        ))
        .bind(filter.id)
        .bind(&filter.class_code)
        .bind(filter.role)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn class_codes(&self) -> Result<Vec<String>> {
        let codes = sqlx::query_scalar::<_, String>(
            r#"SELECT DISTINCT class_code FROM users
               WHERE class_code IS NOT NULL AND TRIM(class_code) <> ''
               ORDER BY class_code"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(codes)
    }

    /// Inserts each roster line as a student sharing one initial password.
    /// Lines whose email is taken are counted as skipped.
    pub async fn import_students(
        &self,
        entries: &[RosterEntry],
        password: &str,
    ) -> Result<ImportReport> {
        let password_hash = hash_password(password)?;
        let mut report = ImportReport::default();
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            let result = sqlx::query(
                r#"INSERT INTO users (email, password_hash, user_name, class_code, status, change_login)
                   VALUES (?, ?, ?, ?, ?, TRUE)"#,
            )
            .bind(&entry.email)
            .bind(&password_hash)
            .bind(&entry.user_name)
            .bind(&entry.class_code)
            .bind(Role::Student.code())
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => report.inserted += 1,
                Err(e) => {
                    let report_err = color_eyre::Report::from(e);
                    report.skipped += 1;
                    if is_unique_violation(&report_err) {
                        report
                            .errors
                            .push(format!("Line {}: {} already exists", entry.line, entry.email));
                    } else {
                        tracing::warn!("roster line {} not imported: {report_err}", entry.line);
                        report
                            .errors
                            .push(format!("Line {}: could not be imported", entry.line));
                    }
                }
            }
        }

        tx.commit().await?;
        tracing::info!(
            "roster import finished: inserted={}, skipped={}",
            report.inserted,
            report.skipped
        );
        Ok(report)
    }

    /// The user and stored hash for a login attempt.
    pub async fn find_credentials(&self, email: &str) -> Result<Option<(UserRecord, String)>> {
        let Some(user) = self.find_user_by_email(email).await? else {
            return Ok(None);
        };
        let hash = self.password_hash(user.id).await?.ok_or_eyre("user vanished during login")?;
        Ok(Some((user, hash)))
    }

    pub async fn password_hash(&self, id: i64) -> Result<Option<String>> {
        let hash = sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hash)
    }

    pub async fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE users SET password_hash = ?, change_login = FALSE WHERE id = ?")
                .bind(password_hash)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn teacher_emails_for_class(&self, class_code: &str) -> Result<Vec<String>> {
        let emails = sqlx::query_scalar::<_, String>(
            "SELECT email FROM users WHERE class_code = ? AND status = ? ORDER BY id",
        )
        .bind(class_code)
        .bind(Role::Teacher.code())
        .fetch_all(&self.pool)
        .await?;
        Ok(emails)
    }

    pub async fn staff_emails(&self) -> Result<Vec<String>> {
        let emails = sqlx::query_scalar::<_, String>(
            "SELECT email FROM users WHERE status IN (?, ?) ORDER BY id",
        )
        .bind(Role::Teacher.code())
        .bind(Role::Admin.code())
        .fetch_all(&self.pool)
        .await?;
        Ok(emails)
    }
}

fn written(result: std::result::Result<sqlx::sqlite::SqliteQueryResult, sqlx::Error>) -> Result<Write> {
    match result {
        Ok(done) if done.rows_affected() == 0 => Ok(Write::NotFound),
        Ok(_) => Ok(Write::Done),
        Err(e) => {
            let report = color_eyre::Report::from(e);
            if is_unique_violation(&report) {
                Ok(Write::Duplicate)
            } else {
                Err(report)
            }
        }
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();
    std::thread::Builder::new()
        .stack_size(4 * 1024 * 1024)
        .spawn(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|h| h.to_string())
                .map_err(|e| color_eyre::eyre::eyre!("failed to hash password: {e}"))
        })?
        .join()
        .map_err(|_| color_eyre::eyre::eyre!("hash thread panicked"))?
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let password = password.to_string();
    let hash = hash.to_string();
    std::thread::Builder::new()
        .stack_size(4 * 1024 * 1024)
        .spawn(move || {
            let Ok(parsed) = PasswordHash::new(&hash) else {
                return false;
            };
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .map(|h| h.join().unwrap_or(false))
        .unwrap_or(false)
}
