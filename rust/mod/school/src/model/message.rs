use serde::{Deserialize, Serialize};

use super::Role;

/// One side of a conversation or the addressee of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub role: Role,
    pub id: String,
}

impl Party {
    pub fn student(id: impl Into<String>) -> Self {
        Self {
            role: Role::Student,
            id: id.into(),
        }
    }

    pub fn mentor(id: impl Into<String>) -> Self {
        Self {
            role: Role::Mentor,
            id: id.into(),
        }
    }
}

/// A message between the student and the mentor of an enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub enrollment_id: String,
    pub sender: Party,
    pub receiver: Party,
    #[serde(default)]
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub is_read: bool,
    pub sent_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SendMessage {
    pub subject: String,
    pub body: String,
}
