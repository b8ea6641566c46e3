use tracing::info;

use eduforall_core::{new_id, now_rfc3339};
use eduforall_sql::Value;

use crate::model::{Identity, Message, NotificationType, Party, Role, SendMessage};
use crate::service::{SchoolError, SchoolService};

impl SchoolService {
    /// Send a message to the other party of an enrollment and notify them.
    pub fn send_message(
        &self,
        sender: &dyn Identity,
        enrollment_id: &str,
        input: SendMessage,
    ) -> Result<Message, SchoolError> {
        let enrollment = self
            .get_enrollment(enrollment_id)?
            .ok_or_else(|| SchoolError::NotFound("Enrollment not found".into()))?;

        let is_party = match sender.role() {
            Role::Student => enrollment.student_id == sender.id(),
            Role::Mentor => enrollment.mentor_id.as_deref() == Some(sender.id()),
        };
        if !is_party {
            return Err(SchoolError::Forbidden(
                "You are not part of this enrollment".into(),
            ));
        }

        let body = input.body.trim();
        if body.is_empty() {
            return Err(SchoolError::EmptyBody);
        }
        let subject = input.subject.trim().to_string();

        let mentor_id = enrollment
            .mentor_id
            .clone()
            .ok_or_else(|| SchoolError::Validation("This enrollment has no mentor".into()))?;
        let (receiver, title) = match sender.role() {
            Role::Student => (
                Party::mentor(mentor_id.clone()),
                format!("Message from {}", sender.first_name()),
            ),
            Role::Mentor => (
                Party::student(enrollment.student_id.clone()),
                format!("Message from Mentor {}", sender.first_name()),
            ),
        };

        let now = now_rfc3339();
        let message = Message {
            id: new_id(),
            enrollment_id: enrollment.id.clone(),
            sender: Party {
                role: sender.role(),
                id: sender.id().to_string(),
            },
            receiver: receiver.clone(),
            subject: subject.clone(),
            body: body.to_string(),
            is_read: false,
            sent_at: now.clone(),
        };
        let insert = Self::insert_statement(
            "messages",
            &message.id,
            &message,
            &[
                ("enrollment_id", Value::Text(message.enrollment_id.clone())),
                ("student_id", Value::Text(enrollment.student_id.clone())),
                ("mentor_id", Value::Text(mentor_id)),
                ("receiver_role", Value::Text(receiver.role.as_str().into())),
                ("is_read", Value::Integer(0)),
                ("created_at", Value::Text(now)),
            ],
        )?;

        let preview = if subject.is_empty() {
            "New message".to_string()
        } else {
            subject
        };
        let (_, notify) = Self::notification_statement(
            receiver,
            NotificationType::Message,
            title,
            preview,
            Some(enrollment.course_id.clone()),
        )?;

        self.sql.exec_batch(&[insert, notify])?;

        info!(
            message = %message.id,
            enrollment = %enrollment.id,
            from = %message.sender.role,
            "message sent"
        );
        Ok(message)
    }

    /// Messages received by the identity, newest first.
    pub fn list_messages(
        &self,
        who: &dyn Identity,
        unread_only: bool,
    ) -> Result<Vec<Message>, SchoolError> {
        let mut sql = format!(
            "SELECT data FROM messages WHERE {} = ?1 AND receiver_role = ?2",
            who.role().id_column()
        );
        if unread_only {
            sql.push_str(" AND is_read = 0");
        }
        sql.push_str(" ORDER BY created_at DESC, id");
        self.query_records(&sql, &received_by(who))
    }

    /// The whole conversation of an enrollment, oldest first.
    pub fn enrollment_messages(
        &self,
        who: &dyn Identity,
        enrollment_id: &str,
    ) -> Result<Vec<Message>, SchoolError> {
        let enrollment = self.visible_enrollment(who, enrollment_id)?;
        self.query_records(
            "SELECT data FROM messages WHERE enrollment_id = ?1 ORDER BY created_at, id",
            &[Value::Text(enrollment.id)],
        )
    }

    pub fn unread_message_count(&self, who: &dyn Identity) -> Result<usize, SchoolError> {
        let sql = format!(
            "SELECT COUNT(*) AS cnt FROM messages
             WHERE {} = ?1 AND receiver_role = ?2 AND is_read = 0",
            who.role().id_column()
        );
        self.count(&sql, &received_by(who))
    }

    /// Mark a received message read.
    pub fn mark_message_read(&self, who: &dyn Identity, id: &str) -> Result<Message, SchoolError> {
        let mut message: Message = self
            .get_record("messages", id)?
            .filter(|m: &Message| m.receiver.role == who.role() && m.receiver.id == who.id())
            .ok_or_else(|| SchoolError::NotFound("Message not found".into()))?;

        if !message.is_read {
            message.is_read = true;
            let stmt = Self::update_statement(
                "messages",
                id,
                &message,
                &[("is_read", Value::Integer(1))],
            )?;
            self.run(&stmt)?;
        }
        Ok(message)
    }
}

fn received_by(who: &dyn Identity) -> [Value; 2] {
    [
        Value::Text(who.id().to_string()),
        Value::Text(who.role().as_str().into()),
    ]
}
