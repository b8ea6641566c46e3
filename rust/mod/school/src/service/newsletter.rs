use tracing::info;

use eduforall_core::{new_id, now_rfc3339};
use eduforall_sql::{Row, Value};

use crate::mail::{self, Email};
use crate::model::{Newsletter, SubscribeOutcome};
use crate::service::{SchoolError, SchoolService};
use crate::validate;

const WELCOME_SUBJECT: &str = "Welcome to EduForAll Newsletter";
const WELCOME_BODY: &str = "Thank you for subscribing to our newsletter! You will receive \
updates about our latest courses and learning opportunities.";

fn newsletter_from_row(row: &Row) -> Result<Newsletter, SchoolError> {
    let text = |col: &str| {
        row.get_str(col)
            .map(str::to_string)
            .ok_or_else(|| SchoolError::Internal(format!("newsletter row missing {}", col)))
    };
    Ok(Newsletter {
        id: text("id")?,
        email: text("email")?,
        active: row.get_i64("active").unwrap_or(0) != 0,
        subscribed_at: text("subscribed_at")?,
        updated_at: text("updated_at")?,
    })
}

impl SchoolService {
    /// Subscribe an email, reactivating a previous subscription if there is
    /// one. The welcome mail is sent in the background and may fail silently.
    pub fn subscribe(&self, email: &str) -> Result<SubscribeOutcome, SchoolError> {
        let email = validate::normalize_email(email);
        if !validate::is_valid_email(&email) {
            return Err(SchoolError::InvalidEmail);
        }

        let id = new_id();
        let now = now_rfc3339();
        let affected = self.sql.exec(
            "INSERT INTO newsletters (id, email, active, subscribed_at, updated_at)
             VALUES (?1, ?2, 1, ?3, ?3)
             ON CONFLICT(email) DO UPDATE SET active = 1, updated_at = excluded.updated_at
             WHERE newsletters.active = 0",
            &[
                Value::Text(id.clone()),
                Value::Text(email.clone()),
                Value::Text(now),
            ],
        )?;
        if affected == 0 {
            return Err(SchoolError::AlreadySubscribed);
        }

        let subscription = self
            .find_newsletter(&email)?
            .ok_or_else(|| SchoolError::Internal("subscription vanished after upsert".into()))?;
        let reactivated = subscription.id != id;
        info!(email = %email, reactivated, "newsletter subscription");

        mail::send_in_background(
            self.mailer.clone(),
            Email {
                to: email,
                subject: WELCOME_SUBJECT.into(),
                body: WELCOME_BODY.into(),
            },
        );

        Ok(SubscribeOutcome {
            subscription,
            reactivated,
        })
    }

    /// Deactivate a subscription. The record is kept.
    pub fn unsubscribe(&self, email: &str) -> Result<(), SchoolError> {
        let email = validate::normalize_email(email);
        let affected = self.sql.exec(
            "UPDATE newsletters SET active = 0, updated_at = ?1 WHERE email = ?2",
            &[Value::Text(now_rfc3339()), Value::Text(email.clone())],
        )?;
        if affected == 0 {
            return Err(SchoolError::NotFound("Email not found".into()));
        }
        info!(email = %email, "newsletter unsubscribe");
        Ok(())
    }

    pub fn find_newsletter(&self, email: &str) -> Result<Option<Newsletter>, SchoolError> {
        let rows = self.sql.query(
            "SELECT id, email, active, subscribed_at, updated_at FROM newsletters WHERE email = ?1",
            &[Value::Text(validate::normalize_email(email))],
        )?;
        rows.first().map(newsletter_from_row).transpose()
    }
}
