use tracing::info;

use eduforall_core::{new_id, now_rfc3339};
use eduforall_sql::{SQLError, Statement, Value};

use crate::model::{
    Enrollment, EnrollmentDetail, EnrollInput, EnrollmentStatus, EnrollmentType, Identity,
    LearningPath, NotificationType, Party, ProgressInput, Role, Student, DEFAULT_TOTAL_LESSONS,
};
use crate::service::{SchoolError, SchoolService};
use crate::validate;

/// Enrollment rows with `mentor_id` taken from the column, which the store
/// nulls when the mentor is deleted.
const SELECT_ENROLLMENT: &str =
    "SELECT json_set(data, '$.mentor_id', mentor_id) AS data FROM enrollments";

const ACCESS_DENIED: &str = "Enrollment not found or access denied";

/// Guard for status transitions: the row must still be active when written.
const STILL_ACTIVE: &str = "status IN ('enrolled', 'in_progress')";

const NO_LONGER_ACTIVE: &str = "This enrollment is no longer active";

/// True if the identity is the enrollment's student or its assigned mentor.
fn is_party(enrollment: &Enrollment, who: &dyn Identity) -> bool {
    match who.role() {
        Role::Student => enrollment.student_id == who.id(),
        Role::Mentor => enrollment.mentor_id.as_deref() == Some(who.id()),
    }
}

impl SchoolService {
    /// Enroll a student in a course.
    ///
    /// The enrollment, its learning path and the mentor notification are
    /// written in one transaction. The unique (student, course) constraint
    /// decides races between concurrent enrollments.
    pub fn enroll(
        &self,
        student: &Student,
        course_id: &str,
        input: EnrollInput,
    ) -> Result<Enrollment, SchoolError> {
        let course = self.get_course(course_id)?;

        if self.find_enrollment(&student.id, &course.id)?.is_some() {
            return Err(SchoolError::AlreadyEnrolled);
        }

        let enrollment_type = EnrollmentType::parse(&input.enrollment_type)
            .ok_or(SchoolError::InvalidEnrollmentType)?;

        let mentor = match (enrollment_type, validate::non_blank(input.mentor_id.as_deref())) {
            (EnrollmentType::Mentored, Some(mentor_id)) => Some(
                self.get_mentor(&mentor_id)?
                    .ok_or(SchoolError::MentorNotFound)?,
            ),
            _ => None,
        };

        let now = now_rfc3339();
        let enrollment = Enrollment {
            id: new_id(),
            student_id: student.id.clone(),
            course_id: course.id.clone(),
            enrollment_type,
            mentor_id: mentor.as_ref().map(|m| m.id.clone()),
            status: EnrollmentStatus::Enrolled,
            progress: 0,
            enrolled_at: now.clone(),
            completed_at: None,
        };
        let path = LearningPath::new(
            new_id(),
            enrollment.id.clone(),
            DEFAULT_TOTAL_LESSONS,
            now.clone(),
        );

        let mut batch = vec![
            Self::insert_statement(
                "enrollments",
                &enrollment.id,
                &enrollment,
                &[
                    ("student_id", Value::Text(enrollment.student_id.clone())),
                    ("course_id", Value::Text(enrollment.course_id.clone())),
                    ("mentor_id", Value::opt_text(enrollment.mentor_id.as_deref())),
                    ("status", Value::Text(enrollment.status.as_str().into())),
                    ("created_at", Value::Text(now.clone())),
                ],
            )?,
            Self::insert_statement(
                "learning_paths",
                &path.id,
                &path,
                &[
                    ("enrollment_id", Value::Text(path.enrollment_id.clone())),
                    ("created_at", Value::Text(now)),
                ],
            )?,
        ];

        if let Some(mentor) = &mentor {
            let name = student.display_name();
            let (_, stmt) = Self::notification_statement(
                Party::mentor(&mentor.id),
                NotificationType::Enrollment,
                format!("New Student: {}", name),
                format!("{} enrolled in {} with mentoring", name, course.title),
                Some(course.id.clone()),
            )?;
            batch.push(stmt);
        }

        self.sql.exec_batch(&batch).map_err(|e| match e {
            SQLError::Unique(_) => SchoolError::AlreadyEnrolled,
            other => SchoolError::from(other),
        })?;

        info!(
            enrollment = %enrollment.id,
            student = %student.id,
            course = %course.id,
            kind = ?enrollment_type,
            "enrolled"
        );
        Ok(enrollment)
    }

    pub fn get_enrollment(&self, id: &str) -> Result<Option<Enrollment>, SchoolError> {
        let sql = format!("{} WHERE id = ?1", SELECT_ENROLLMENT);
        let mut items = self.query_records(&sql, &[Value::Text(id.to_string())])?;
        Ok(items.pop())
    }

    fn find_enrollment(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<Option<Enrollment>, SchoolError> {
        let sql = format!("{} WHERE student_id = ?1 AND course_id = ?2", SELECT_ENROLLMENT);
        let mut items = self.query_records(
            &sql,
            &[
                Value::Text(student_id.to_string()),
                Value::Text(course_id.to_string()),
            ],
        )?;
        Ok(items.pop())
    }

    /// An enrollment the identity takes part in.
    pub(crate) fn visible_enrollment(
        &self,
        who: &dyn Identity,
        id: &str,
    ) -> Result<Enrollment, SchoolError> {
        self.get_enrollment(id)?
            .filter(|e| is_party(e, who))
            .ok_or_else(|| SchoolError::NotFound(ACCESS_DENIED.into()))
    }

    fn learning_path(&self, enrollment_id: &str) -> Result<Option<LearningPath>, SchoolError> {
        self.find_record("learning_paths", "enrollment_id", enrollment_id)
    }

    pub fn enrollment_detail(
        &self,
        who: &dyn Identity,
        id: &str,
    ) -> Result<EnrollmentDetail, SchoolError> {
        let enrollment = self.visible_enrollment(who, id)?;
        let learning_path = self.learning_path(&enrollment.id)?;
        Ok(EnrollmentDetail {
            enrollment,
            learning_path,
        })
    }

    pub fn list_student_enrollments(&self, student: &Student) -> Result<Vec<Enrollment>, SchoolError> {
        let sql = format!(
            "{} WHERE student_id = ?1 ORDER BY created_at DESC, id",
            SELECT_ENROLLMENT
        );
        self.query_records(&sql, &[Value::Text(student.id.clone())])
    }

    pub fn list_mentored_enrollments(&self, mentor_id: &str) -> Result<Vec<Enrollment>, SchoolError> {
        let sql = format!(
            "{} WHERE mentor_id = ?1 ORDER BY created_at DESC, id",
            SELECT_ENROLLMENT
        );
        self.query_records(&sql, &[Value::Text(mentor_id.to_string())])
    }

    /// Record completed lessons and advance the enrollment status.
    ///
    /// Completed lessons are clamped to the total. Reaching 100% completes
    /// the enrollment and notifies the student.
    pub fn record_progress(
        &self,
        who: &dyn Identity,
        id: &str,
        input: ProgressInput,
    ) -> Result<EnrollmentDetail, SchoolError> {
        let mut enrollment = self.visible_enrollment(who, id)?;
        if !enrollment.status.is_active() {
            return Err(SchoolError::Validation(format!(
                "Cannot update progress on a {} enrollment",
                enrollment.status.as_str()
            )));
        }
        let mut path = self.learning_path(&enrollment.id)?.ok_or_else(|| {
            SchoolError::Internal(format!("enrollment {} has no learning path", enrollment.id))
        })?;

        let total = input.total_lessons.unwrap_or(path.total_lessons);
        if total == 0 {
            return Err(SchoolError::Validation(
                "Total lessons must be at least 1".into(),
            ));
        }

        let now = now_rfc3339();
        path.set_progress(input.completed_lessons, total);
        path.updated_at = now.clone();
        enrollment.progress = path.completion_percentage;

        let completed_now = path.completion_percentage >= 100;
        if completed_now {
            enrollment.status = EnrollmentStatus::Completed;
            enrollment.completed_at = Some(now);
        } else if path.completed_lessons > 0 {
            enrollment.status = EnrollmentStatus::InProgress;
        }

        // The guarded enrollment update goes first: if the row left the
        // active states since it was read, nothing in the batch is written.
        let mut batch = vec![
            Self::update_statement_where(
                "enrollments",
                &enrollment.id,
                &enrollment,
                &[("status", Value::Text(enrollment.status.as_str().into()))],
                Some(STILL_ACTIVE),
            )?
            .must_change(),
            Self::update_statement("learning_paths", &path.id, &path, &[])?,
        ];
        if completed_now {
            let course = self.get_course(&enrollment.course_id)?;
            let (_, stmt) = Self::notification_statement(
                Party::student(&enrollment.student_id),
                NotificationType::ProgressAlert,
                "Course Completed".into(),
                format!("Congratulations! You completed {}", course.title),
                Some(course.id),
            )?;
            batch.push(stmt);
        }
        self.sql.exec_batch(&batch).map_err(|e| match e {
            SQLError::Unchanged(_) => SchoolError::Validation(NO_LONGER_ACTIVE.into()),
            other => other.into(),
        })?;

        info!(
            enrollment = %enrollment.id,
            progress = enrollment.progress,
            status = enrollment.status.as_str(),
            "progress recorded"
        );
        Ok(EnrollmentDetail {
            enrollment,
            learning_path: Some(path),
        })
    }

    /// Drop an active enrollment. Only its student may do this.
    pub fn drop_enrollment(&self, student: &Student, id: &str) -> Result<Enrollment, SchoolError> {
        let mut enrollment = self.visible_enrollment(student, id)?;
        match enrollment.status {
            EnrollmentStatus::Completed => {
                return Err(SchoolError::Validation(
                    "Completed enrollments cannot be dropped".into(),
                ))
            }
            EnrollmentStatus::Dropped => {
                return Err(SchoolError::Validation(
                    "This enrollment was already dropped".into(),
                ))
            }
            EnrollmentStatus::Enrolled | EnrollmentStatus::InProgress => {}
        }

        enrollment.status = EnrollmentStatus::Dropped;
        let stmt: Statement = Self::update_statement_where(
            "enrollments",
            &enrollment.id,
            &enrollment,
            &[("status", Value::Text(enrollment.status.as_str().into()))],
            Some(STILL_ACTIVE),
        )?;
        if self.run(&stmt)? == 0 {
            return Err(SchoolError::Validation(NO_LONGER_ACTIVE.into()));
        }

        info!(enrollment = %enrollment.id, "enrollment dropped");
        Ok(enrollment)
    }
}
