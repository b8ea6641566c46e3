use serde::{Deserialize, Serialize};

use crate::password;

/// Which identity table an account lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Mentor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Mentor => "mentor",
        }
    }

    /// Parse a form value. Case-insensitive, surrounding whitespace ignored.
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "mentor" => Some(Role::Mentor),
            _ => None,
        }
    }

    /// SQL table holding accounts of this role.
    pub(crate) fn table(&self) -> &'static str {
        match self {
            Role::Student => "students",
            Role::Mentor => "mentors",
        }
    }

    /// Foreign-key column referencing an account of this role.
    pub(crate) fn id_column(&self) -> &'static str {
        match self {
            Role::Student => "student_id",
            Role::Mentor => "mentor_id",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that can authenticate: a student or a mentor.
pub trait Identity {
    fn id(&self) -> &str;
    fn role(&self) -> Role;
    fn first_name(&self) -> &str;
    fn last_name(&self) -> &str;
    fn email(&self) -> &str;
    fn password_hash(&self) -> &str;

    /// "First Last".
    fn display_name(&self) -> String {
        format!("{} {}", self.first_name(), self.last_name())
    }

    /// One-way comparison of a raw password against the stored hash.
    fn check_password(&self, raw: &str) -> bool {
        password::verify_password(raw, self.password_hash())
    }
}

/// A learner account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    /// Argon2id PHC string. Never exposed through the API.
    pub password_hash: String,
    pub created_at: String,
}

/// A mentor account. Mentors guide enrollments and author courses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mentor {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    /// Argon2id PHC string. Never exposed through the API.
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expertise: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub created_at: String,
}

impl Identity for Student {
    fn id(&self) -> &str {
        &self.id
    }
    fn role(&self) -> Role {
        Role::Student
    }
    fn first_name(&self) -> &str {
        &self.first_name
    }
    fn last_name(&self) -> &str {
        &self.last_name
    }
    fn email(&self) -> &str {
        &self.email
    }
    fn password_hash(&self) -> &str {
        &self.password_hash
    }
}

impl Identity for Mentor {
    fn id(&self) -> &str {
        &self.id
    }
    fn role(&self) -> Role {
        Role::Mentor
    }
    fn first_name(&self) -> &str {
        &self.first_name
    }
    fn last_name(&self) -> &str {
        &self.last_name
    }
    fn email(&self) -> &str {
        &self.email
    }
    fn password_hash(&self) -> &str {
        &self.password_hash
    }
}

/// A loaded account of either role.
#[derive(Debug, Clone)]
pub enum Account {
    Student(Student),
    Mentor(Mentor),
}

impl Account {
    fn inner(&self) -> &dyn Identity {
        match self {
            Account::Student(s) => s,
            Account::Mentor(m) => m,
        }
    }

    pub fn as_student(&self) -> Option<&Student> {
        match self {
            Account::Student(s) => Some(s),
            Account::Mentor(_) => None,
        }
    }

    pub fn as_mentor(&self) -> Option<&Mentor> {
        match self {
            Account::Mentor(m) => Some(m),
            Account::Student(_) => None,
        }
    }

    /// Public view without the password hash.
    pub fn profile(&self) -> Profile {
        let (expertise, bio, phone_number, created_at) = match self {
            Account::Student(s) => (None, None, s.phone_number.clone(), s.created_at.clone()),
            Account::Mentor(m) => (
                m.expertise.clone(),
                m.bio.clone(),
                m.phone_number.clone(),
                m.created_at.clone(),
            ),
        };
        Profile {
            id: self.id().to_string(),
            role: self.role(),
            name: self.display_name(),
            first_name: self.first_name().to_string(),
            last_name: self.last_name().to_string(),
            email: self.email().to_string(),
            phone_number,
            expertise,
            bio,
            created_at,
        }
    }
}

impl Identity for Account {
    fn id(&self) -> &str {
        self.inner().id()
    }
    fn role(&self) -> Role {
        self.inner().role()
    }
    fn first_name(&self) -> &str {
        self.inner().first_name()
    }
    fn last_name(&self) -> &str {
        self.inner().last_name()
    }
    fn email(&self) -> &str {
        self.inner().email()
    }
    fn password_hash(&self) -> &str {
        self.inner().password_hash()
    }
}

/// Account data safe to return to clients.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: String,
    pub role: Role,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expertise: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub created_at: String,
}

/// Registration form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    pub confirm_password: String,
    pub role: String,
    /// Mentors only.
    pub expertise: Option<String>,
    /// Mentors only.
    pub bio: Option<String>,
}

/// Login form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub role: String,
    pub remember_me: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_is_lenient() {
        assert_eq!(Role::parse(" Student "), Some(Role::Student));
        assert_eq!(Role::parse("MENTOR"), Some(Role::Mentor));
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn profile_hides_password_hash() {
        let account = Account::Mentor(Mentor {
            id: "m1".into(),
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: "grace@x.com".into(),
            phone_number: "555".into(),
            password_hash: "$argon2id$secret".into(),
            expertise: Some("Compilers".into()),
            bio: None,
            created_at: "2026-01-01T00:00:00Z".into(),
        });
        let json = serde_json::to_value(account.profile()).unwrap();
        assert_eq!(json["name"], "Grace Hopper");
        assert_eq!(json["role"], "mentor");
        assert_eq!(json["expertise"], "Compilers");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("bio").is_none());
    }
}
