use color_eyre::Result;

use crate::db::models::UserRecord;
use crate::db::Db;
use crate::email::ResendEmailSender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[cfg_attr(test, mockall::automock)]
pub trait EmailSender: Send + Sync {
    /// Whether a mail API key is configured.
    fn is_enabled(&self) -> bool;

    fn send(&self, email: OutgoingEmail) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Who gets told about what.
#[cfg_attr(test, mockall::automock)]
pub trait RecipientDirectory: Send + Sync {
    fn user(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = Result<Option<UserRecord>>> + Send;

    fn user_by_email(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<UserRecord>>> + Send;

    fn class_teachers(
        &self,
        class_code: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;

    fn staff(&self) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

impl RecipientDirectory for Db {
    async fn user(&self, id: i64) -> Result<Option<UserRecord>> {
        self.find_user(id).await
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        self.find_user_by_email(email).await
    }

    async fn class_teachers(&self, class_code: &str) -> Result<Vec<String>> {
        self.teacher_emails_for_class(class_code).await
    }

    async fn staff(&self) -> Result<Vec<String>> {
        self.staff_emails().await
    }
}

const SUBMITTED_TEMPLATE: &str = r#"<h2>Work submitted</h2>
<p>{{USER_NAME}} ({{CLASS_CODE}}) has submitted answers for activity {{ACTIVITY_ID}}.</p>
<p>Status: {{STATUS}}</p>
<p>Submitted at {{TIMESTAMP}}.</p>"#;

const RESET_TEMPLATE: &str = r#"<h2>Password reset request</h2>
<p>{{USER_NAME}} ({{EMAIL}}, class {{CLASS_CODE}}) has asked for their password to be reset.</p>
<p>Requested at {{TIMESTAMP}}.</p>"#;

const WELCOME_TEMPLATE: &str = r#"<h2>Welcome, {{USER_NAME}}</h2>
<p>An account has been created for {{EMAIL}}.</p>
<p>Sign in at <a href="{{API}}">{{API}}</a>.</p>"#;

/// Replaces `{{KEY}}` placeholders with HTML-escaped values.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |body, (key, value)| {
        body.replace(&format!("{{{{{key}}}}}"), &escape_html(value))
    })
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Best-effort notifications. Failures are logged and never reach the caller.
pub struct Notifier<R: RecipientDirectory = Db, E: EmailSender = ResendEmailSender> {
    directory: R,
    email: E,
    api_base: String,
}

impl<R: RecipientDirectory + Clone, E: EmailSender + Clone> Clone for Notifier<R, E> {
    fn clone(&self) -> Self {
        Self {
            directory: self.directory.clone(),
            email: self.email.clone(),
            api_base: self.api_base.clone(),
        }
    }
}

impl<R: RecipientDirectory, E: EmailSender> Notifier<R, E> {
    pub fn new(directory: R, email: E, api_base: String) -> Self {
        Self {
            directory,
            email,
            api_base,
        }
    }

    /// Tells the student's class teachers about a submission.
    /// Returns whether an email went out.
    pub async fn answers_submitted(&self, student_id: i64, activity_id: i64, status: &str) -> bool {
        let result = self.try_answers_submitted(student_id, activity_id, status).await;
        settle("submission", result)
    }

    /// Forwards a reset request to every teacher and admin.
    pub async fn password_reset_requested(&self, email: &str) -> bool {
        let result = self.try_password_reset_requested(email).await;
        settle("password reset", result)
    }

    pub async fn welcome(&self, email: &str, user_name: &str) -> bool {
        let html = render(
            WELCOME_TEMPLATE,
            &[
                ("USER_NAME", user_name),
                ("EMAIL", email),
                ("API", self.api_base.as_str()),
            ],
        );
        let result = self
            .deliver(OutgoingEmail {
                to: vec![email.to_string()],
                subject: "Your coursework account".to_string(),
                html,
            })
            .await;

        settle("welcome", result)
    }

    async fn try_answers_submitted(
        &self,
        student_id: i64,
        activity_id: i64,
        status: &str,
    ) -> Result<bool> {
        let Some(student) = self.directory.user(student_id).await? else {
            return Ok(false);
        };
        let Some(class_code) = student.class_code.as_deref().filter(|c| !c.is_empty()) else {
            return Ok(false);
        };
        let teachers = self.directory.class_teachers(class_code).await?;
        if teachers.is_empty() {
            tracing::debug!("no teachers for class {class_code}, submission not announced");
            return Ok(false);
        }

        let activity = activity_id.to_string();
        let html = render(
            SUBMITTED_TEMPLATE,
            &[
                ("USER_NAME", student.user_name.as_str()),
                ("CLASS_CODE", class_code),
                ("ACTIVITY_ID", activity.as_str()),
                ("STATUS", status),
                ("TIMESTAMP", timestamp().as_str()),
            ],
        );
        self.deliver(OutgoingEmail {
            to: teachers,
            subject: format!("Work submitted - {}", student.user_name),
            html,
        })
        .await
    }

    async fn try_password_reset_requested(&self, email: &str) -> Result<bool> {
        let Some(user) = self.directory.user_by_email(email).await? else {
            tracing::info!("password reset requested for unknown email");
            return Ok(false);
        };
        let staff = self.directory.staff().await?;
        if staff.is_empty() {
            tracing::warn!("no teachers or admins to receive the reset request");
            return Ok(false);
        }

        let html = render(
            RESET_TEMPLATE,
            &[
                ("USER_NAME", user.user_name.as_str()),
                ("EMAIL", user.email.as_str()),
                ("CLASS_CODE", user.class_code.as_deref().unwrap_or("N/A")),
                ("TIMESTAMP", timestamp().as_str()),
            ],
        );
        self.deliver(OutgoingEmail {
            to: staff,
            subject: format!("Password Reset Request - {}", user.user_name),
            html,
        })
        .await
    }

    async fn deliver(&self, email: OutgoingEmail) -> Result<bool> {
        if !self.email.is_enabled() {
            tracing::debug!("email disabled, skipping '{}'", email.subject);
            return Ok(false);
        }
        self.email.send(email).await?;
        Ok(true)
    }
}

fn timestamp() -> String {
    crate::dates::now().format(crate::dates::FORMAT).to_string()
}

fn settle(kind: &str, result: Result<bool>) -> bool {
    result.unwrap_or_else(|e| {
        tracing::warn!("{kind} notification failed: {e}");
        false
    })
}
