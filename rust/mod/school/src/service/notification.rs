use eduforall_core::{new_id, now_rfc3339};
use eduforall_sql::{Statement, Value};

use crate::model::{Identity, Notification, NotificationType, Party};
use crate::service::{SchoolError, SchoolService};

const SELECT_NOTIFICATION: &str =
    "SELECT json_set(data, '$.related_course_id', related_course_id) AS data FROM notifications";

impl SchoolService {
    /// Build the insert for a new unread notification. Callers batch it with
    /// the write that triggered it.
    pub(crate) fn notification_statement(
        recipient: Party,
        notification_type: NotificationType,
        title: String,
        message: String,
        related_course_id: Option<String>,
    ) -> Result<(Notification, Statement), SchoolError> {
        let now = now_rfc3339();
        let notification = Notification {
            id: new_id(),
            recipient,
            notification_type,
            title,
            message,
            is_read: false,
            related_course_id,
            created_at: now.clone(),
        };
        let stmt = Self::insert_statement(
            "notifications",
            &notification.id,
            &notification,
            &[
                (
                    notification.recipient.role.id_column(),
                    Value::Text(notification.recipient.id.clone()),
                ),
                (
                    "related_course_id",
                    Value::opt_text(notification.related_course_id.as_deref()),
                ),
                ("is_read", Value::Integer(0)),
                ("created_at", Value::Text(now)),
            ],
        )?;
        Ok((notification, stmt))
    }

    /// Notifications addressed to the identity, newest first.
    pub fn list_notifications(
        &self,
        who: &dyn Identity,
        unread_only: bool,
    ) -> Result<Vec<Notification>, SchoolError> {
        let mut sql = format!(
            "{} WHERE {} = ?1",
            SELECT_NOTIFICATION,
            who.role().id_column()
        );
        if unread_only {
            sql.push_str(" AND is_read = 0");
        }
        sql.push_str(" ORDER BY created_at DESC, id");
        self.query_records(&sql, &[Value::Text(who.id().to_string())])
    }

    pub fn unread_notification_count(&self, who: &dyn Identity) -> Result<usize, SchoolError> {
        let sql = format!(
            "SELECT COUNT(*) AS cnt FROM notifications WHERE {} = ?1 AND is_read = 0",
            who.role().id_column()
        );
        self.count(&sql, &[Value::Text(who.id().to_string())])
    }

    /// Mark one notification read. Only the recipient may do this.
    pub fn mark_notification_read(
        &self,
        who: &dyn Identity,
        id: &str,
    ) -> Result<Notification, SchoolError> {
        let sql = format!(
            "{} WHERE id = ?1 AND {} = ?2",
            SELECT_NOTIFICATION,
            who.role().id_column()
        );
        let mut notification: Notification = self
            .query_records(
                &sql,
                &[Value::Text(id.to_string()), Value::Text(who.id().to_string())],
            )?
            .pop()
            .ok_or_else(|| SchoolError::NotFound("Notification not found".into()))?;

        if !notification.is_read {
            notification.is_read = true;
            let stmt = Self::update_statement(
                "notifications",
                id,
                &notification,
                &[("is_read", Value::Integer(1))],
            )?;
            self.run(&stmt)?;
        }
        Ok(notification)
    }
}
