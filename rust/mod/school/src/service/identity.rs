use chrono::Utc;
use tracing::info;

use eduforall_core::{new_id, now_rfc3339};
use eduforall_sql::Value;

use crate::model::{
    Account, FlashLevel, Identity, LoginInput, Mentor, Profile, RegisterInput, Role, Session,
    SessionEnd, Student,
};
use crate::password::{self, MIN_PASSWORD_LEN};
use crate::service::{SchoolError, SchoolService};
use crate::validate;

impl SchoolService {
    /// Create an account and log it in.
    ///
    /// The email's uniqueness is decided by the insert itself, so two
    /// concurrent registrations cannot both succeed.
    pub fn register(
        &self,
        session: &mut Session,
        input: RegisterInput,
    ) -> Result<Account, SchoolError> {
        if session.is_authenticated() {
            return self.current_user(session);
        }

        let first_name = input.first_name.trim().to_string();
        let last_name = input.last_name.trim().to_string();
        let email = input.email.trim().to_string();
        let phone_number = input.phone_number.trim().to_string();

        if !validate::all_present(&[
            &first_name,
            &last_name,
            &email,
            &phone_number,
            &input.password,
            &input.confirm_password,
            &input.role,
        ]) {
            return Err(SchoolError::Validation(
                "Please fill in all required fields".into(),
            ));
        }
        let role = Role::parse(&input.role)
            .ok_or_else(|| SchoolError::Validation("Invalid role selected".into()))?;
        if input.password != input.confirm_password {
            return Err(SchoolError::Validation("Passwords do not match".into()));
        }
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SchoolError::Validation(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LEN
            )));
        }
        if !validate::is_valid_email(&email) {
            return Err(SchoolError::Validation(
                "Please enter a valid email address".into(),
            ));
        }

        let password_hash = password::hash_password(&input.password)
            .map_err(|e| SchoolError::Internal(format!("password hashing failed: {}", e)))?;
        let now = now_rfc3339();
        let id = new_id();

        let account = match role {
            Role::Student => Account::Student(Student {
                id,
                first_name,
                last_name,
                email,
                phone_number,
                password_hash,
                created_at: now,
            }),
            Role::Mentor => Account::Mentor(Mentor {
                id,
                first_name,
                last_name,
                email,
                phone_number,
                password_hash,
                expertise: validate::non_blank(input.expertise.as_deref()),
                bio: validate::non_blank(input.bio.as_deref()),
                created_at: now,
            }),
        };

        let indexes = [
            ("email", Value::Text(account.email().to_string())),
            ("created_at", Value::Text(account.profile().created_at)),
        ];
        let stmt = match &account {
            Account::Student(s) => Self::insert_statement(role.table(), &s.id, s, &indexes)?,
            Account::Mentor(m) => Self::insert_statement(role.table(), &m.id, m, &indexes)?,
        };
        self.run(&stmt).map_err(|e| {
            if e.is_unique_violation() {
                SchoolError::DuplicateEmail(role)
            } else {
                SchoolError::from(e)
            }
        })?;

        info!(role = %role, id = %account.id(), "registered account");
        session.establish(&account, false, Utc::now());
        session.push_flash(
            FlashLevel::Success,
            "Account created successfully! Welcome to EduForAll!",
        );
        Ok(account)
    }

    /// Check credentials and log the account in.
    ///
    /// Unknown email and wrong password produce the same error after the
    /// same amount of hashing work.
    pub fn login(&self, session: &mut Session, input: LoginInput) -> Result<Account, SchoolError> {
        if session.is_authenticated() {
            return self.current_user(session);
        }

        let email = input.email.trim();
        if !validate::all_present(&[email, &input.password, &input.role]) {
            return Err(SchoolError::Validation("Please fill in all fields".into()));
        }
        let role = Role::parse(&input.role)
            .ok_or_else(|| SchoolError::Validation("Invalid role selected".into()))?;

        let account = match role {
            Role::Student => self
                .find_record::<Student>("students", "email", email)?
                .map(Account::Student),
            Role::Mentor => self
                .find_record::<Mentor>("mentors", "email", email)?
                .map(Account::Mentor),
        };
        let account = match account {
            Some(a) if a.check_password(&input.password) => a,
            Some(_) => return Err(SchoolError::InvalidCredentials),
            None => {
                password::verify_missing_account(&input.password);
                return Err(SchoolError::InvalidCredentials);
            }
        };

        session.establish(&account, input.remember_me, Utc::now());
        session.push_flash(
            FlashLevel::Success,
            format!("Welcome back, {}!", account.first_name()),
        );
        info!(role = %role, id = %account.id(), remember_me = input.remember_me, "login");
        Ok(account)
    }

    /// Clear all session state.
    pub fn logout(&self, session: &mut Session) {
        if let Some(id) = &session.user_id {
            info!(id = %id, "logout");
        }
        session.flush(SessionEnd::LoggedOut);
        session.push_flash(FlashLevel::Success, "You have been logged out successfully");
    }

    /// Resolve the logged-in account. A session pointing at a deleted
    /// account is flushed.
    pub fn current_user(&self, session: &mut Session) -> Result<Account, SchoolError> {
        let (Some(user_id), Some(role)) = (session.user_id.clone(), session.user_role) else {
            return Err(SchoolError::Unauthenticated("Please log in first".into()));
        };
        if !session.is_authenticated() {
            return Err(SchoolError::Unauthenticated("Please log in first".into()));
        }

        match self.get_account(role, &user_id)? {
            Some(account) => Ok(account),
            None => {
                session.flush(SessionEnd::LoggedOut);
                session.push_flash(FlashLevel::Error, "User not found. Please log in again");
                Err(SchoolError::Unauthenticated(
                    "User not found. Please log in again".into(),
                ))
            }
        }
    }

    pub fn require_student(&self, session: &mut Session) -> Result<Student, SchoolError> {
        match self.current_user(session) {
            Ok(Account::Student(s)) => Ok(s),
            Ok(Account::Mentor(_)) => {
                Err(SchoolError::Forbidden("Please log in as a student".into()))
            }
            Err(SchoolError::Unauthenticated(_)) => Err(SchoolError::Unauthenticated(
                "Please log in as a student".into(),
            )),
            Err(e) => Err(e),
        }
    }

    pub fn require_mentor(&self, session: &mut Session) -> Result<Mentor, SchoolError> {
        match self.current_user(session) {
            Ok(Account::Mentor(m)) => Ok(m),
            Ok(Account::Student(_)) => {
                Err(SchoolError::Forbidden("Please log in as a mentor".into()))
            }
            Err(SchoolError::Unauthenticated(_)) => Err(SchoolError::Unauthenticated(
                "Please log in as a mentor".into(),
            )),
            Err(e) => Err(e),
        }
    }

    pub fn get_account(&self, role: Role, id: &str) -> Result<Option<Account>, SchoolError> {
        Ok(match role {
            Role::Student => self.get_record::<Student>("students", id)?.map(Account::Student),
            Role::Mentor => self.get_record::<Mentor>("mentors", id)?.map(Account::Mentor),
        })
    }

    pub fn get_mentor(&self, id: &str) -> Result<Option<Mentor>, SchoolError> {
        self.get_record("mentors", id)
    }

    /// All mentors, for the enrollment form.
    pub fn list_mentors(&self) -> Result<Vec<Profile>, SchoolError> {
        let mentors: Vec<Mentor> =
            self.query_records("SELECT data FROM mentors ORDER BY created_at, id", &[])?;
        Ok(mentors
            .into_iter()
            .map(|m| Account::Mentor(m).profile())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionState;
    use crate::service::testing::*;

    fn login_form(email: &str, password: &str, role: &str) -> LoginInput {
        LoginInput {
            email: email.into(),
            password: password.into(),
            role: role.into(),
            remember_me: false,
        }
    }

    #[test]
    fn register_then_login() {
        let svc = service();
        for role in ["student", "mentor"] {
            let email = format!("{}@x.com", role);
            let mut s = session();
            let account = svc
                .register(&mut s, register_form(role, &email, "pw123456"))
                .unwrap();
            assert_eq!(s.state(), SessionState::Authenticated);
            assert_eq!(s.user_role, Some(account.role()));

            let mut fresh = session();
            let logged_in = svc
                .login(&mut fresh, login_form(&email, "pw123456", role))
                .unwrap();
            assert_eq!(logged_in.id(), account.id());
            assert_eq!(fresh.user_role.map(|r| r.as_str()), Some(role));
            assert_eq!(fresh.user_email.as_deref(), Some(email.as_str()));
            assert!(fresh.is_authenticated());
            assert!(!fresh.remember_me);
        }
    }

    #[test]
    fn stored_password_is_hashed() {
        let svc = service();
        let account = register(&svc, "student", "a@x.com");
        assert_ne!(account.password_hash(), "pw123456");
        assert!(account.check_password("pw123456"));
        assert!(!account.check_password("pw1234567"));
    }

    #[test]
    fn login_failures_are_indistinguishable() {
        let svc = service();
        register(&svc, "student", "a@x.com");

        let wrong_password = svc
            .login(&mut session(), login_form("a@x.com", "nope-nope", "student"))
            .unwrap_err();
        let unknown_email = svc
            .login(&mut session(), login_form("b@x.com", "pw123456", "student"))
            .unwrap_err();
        // Right credentials, wrong role table.
        let wrong_role = svc
            .login(&mut session(), login_form("a@x.com", "pw123456", "mentor"))
            .unwrap_err();

        for err in [&wrong_password, &unknown_email, &wrong_role] {
            assert!(matches!(err, SchoolError::InvalidCredentials));
            assert_eq!(err.to_string(), "Invalid email or password");
        }
    }

    #[test]
    fn login_validation() {
        let svc = service();
        let err = svc
            .login(&mut session(), login_form("", "pw", "student"))
            .unwrap_err();
        assert!(matches!(err, SchoolError::Validation(_)));
        let err = svc
            .login(&mut session(), login_form("a@x.com", "pw", "admin"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid role selected");
    }

    #[test]
    fn remember_me_selects_long_session() {
        let svc = service();
        register(&svc, "mentor", "m@x.com");
        let mut s = session();
        let mut form = login_form("m@x.com", "pw123456", "mentor");
        form.remember_me = true;
        svc.login(&mut s, form).unwrap();
        assert!(s.remember_me);
    }

    #[test]
    fn register_validation() {
        let svc = service();
        let cases = [
            ({
                let mut f = register_form("student", "a@x.com", "pw123456");
                f.phone_number = " ".into();
                f
            }, "Please fill in all required fields"),
            (register_form("teacher", "a@x.com", "pw123456"), "Invalid role selected"),
            ({
                let mut f = register_form("student", "a@x.com", "pw123456");
                f.confirm_password = "pw654321".into();
                f
            }, "Passwords do not match"),
            (register_form("student", "a@x.com", "pw123"), "Password must be at least 6 characters long"),
            (register_form("student", "not-an-email", "pw123456"), "Please enter a valid email address"),
        ];
        for (form, message) in cases {
            let err = svc.register(&mut session(), form).unwrap_err();
            assert!(matches!(err, SchoolError::Validation(_)), "{err:?}");
            assert_eq!(err.to_string(), message);
        }
    }

    #[test]
    fn duplicate_email_is_per_role() {
        let svc = service();
        register(&svc, "student", "a@x.com");

        let err = svc
            .register(&mut session(), register_form("student", "a@x.com", "pw123456"))
            .unwrap_err();
        assert!(matches!(err, SchoolError::DuplicateEmail(Role::Student)));

        // Same email in the other role table is fine.
        svc.register(&mut session(), register_form("mentor", "a@x.com", "pw123456"))
            .unwrap();
    }

    #[test]
    fn mentor_fields_are_kept() {
        let svc = service();
        let mut form = register_form("mentor", "m@x.com", "pw123456");
        form.bio = Some("  ".into());
        let account = svc.register(&mut session(), form).unwrap();
        let mentor = account.as_mentor().unwrap();
        assert_eq!(mentor.expertise.as_deref(), Some("Mathematics"));
        assert_eq!(mentor.bio, None);
    }

    #[test]
    fn logout_clears_everything() {
        let svc = service();
        let mut s = session();
        svc.register(&mut s, register_form("student", "a@x.com", "pw123456"))
            .unwrap();
        // As if the registering request had saved the session.
        s.retired_id = None;
        let old_id = s.id.clone();

        svc.logout(&mut s);
        assert_eq!(s.state(), SessionState::LoggedOut);
        assert_eq!(s.user_id, None);
        assert_eq!(s.retired_id.as_deref(), Some(old_id.as_str()));
        assert!(matches!(
            svc.current_user(&mut s),
            Err(SchoolError::Unauthenticated(_))
        ));
    }

    #[test]
    fn deleted_account_flushes_session() {
        let svc = service();
        let mut s = session();
        let account = svc
            .register(&mut s, register_form("student", "a@x.com", "pw123456"))
            .unwrap();
        svc.sql
            .exec(
                "DELETE FROM students WHERE id = ?1",
                &[Value::Text(account.id().to_string())],
            )
            .unwrap();

        assert!(matches!(
            svc.current_user(&mut s),
            Err(SchoolError::Unauthenticated(_))
        ));
        assert!(!s.is_authenticated());
    }

    #[test]
    fn role_guards() {
        let svc = service();
        let mut s = session();
        svc.register(&mut s, register_form("student", "a@x.com", "pw123456"))
            .unwrap();
        assert!(svc.require_student(&mut s).is_ok());
        assert!(matches!(
            svc.require_mentor(&mut s),
            Err(SchoolError::Forbidden(_))
        ));
        assert!(matches!(
            svc.require_mentor(&mut session()),
            Err(SchoolError::Unauthenticated(_))
        ));
    }

    #[test]
    fn already_logged_in_is_a_no_op() {
        let svc = service();
        let mut s = session();
        let first = svc
            .register(&mut s, register_form("student", "a@x.com", "pw123456"))
            .unwrap();
        let again = svc
            .login(&mut s, login_form("other@x.com", "whatever", "mentor"))
            .unwrap();
        assert_eq!(again.id(), first.id());
    }
}
