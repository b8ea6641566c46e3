use std::collections::HashSet;

use serde::Serialize;

use crate::model::{
    Course, Enrollment, EnrollmentDetail, EnrollmentStatus, Mentor, Message, Notification,
    Profile, Student, Account,
};
use crate::service::{SchoolError, SchoolService};

#[derive(Debug, Serialize)]
pub struct StudentDashboard {
    pub student: Profile,
    pub enrollments: Vec<EnrollmentDetail>,
    /// Courses the student is not enrolled in.
    pub available_courses: Vec<Course>,
    pub total_courses: usize,
    pub completed_courses: usize,
    pub in_progress: usize,
    /// Mean enrollment progress, one decimal.
    pub average_progress: f64,
}

#[derive(Debug, Serialize)]
pub struct MentorDashboard {
    pub mentor: Profile,
    pub courses: Vec<Course>,
    pub mentored_enrollments: Vec<Enrollment>,
    pub unread_messages: Vec<Message>,
    pub notifications: Vec<Notification>,
    pub total_students: usize,
}

fn average_progress(enrollments: &[EnrollmentDetail]) -> f64 {
    if enrollments.is_empty() {
        return 0.0;
    }
    let sum: f64 = enrollments
        .iter()
        .map(|d| f64::from(d.enrollment.progress))
        .sum();
    (sum / enrollments.len() as f64 * 10.0).round() / 10.0
}

impl SchoolService {
    pub fn student_dashboard(&self, student: &Student) -> Result<StudentDashboard, SchoolError> {
        let mut enrollments = Vec::new();
        for enrollment in self.list_student_enrollments(student)? {
            enrollments.push(self.enrollment_detail(student, &enrollment.id)?);
        }

        let enrolled: HashSet<&str> = enrollments
            .iter()
            .map(|d| d.enrollment.course_id.as_str())
            .collect();
        let available_courses: Vec<Course> = self
            .query_records::<Course>("SELECT data FROM courses ORDER BY created_at DESC, id", &[])?
            .into_iter()
            .filter(|c| !enrolled.contains(c.id.as_str()))
            .collect();

        let with_status = |status: EnrollmentStatus| {
            enrollments
                .iter()
                .filter(|d| d.enrollment.status == status)
                .count()
        };

        Ok(StudentDashboard {
            student: Account::Student(student.clone()).profile(),
            total_courses: enrollments.len(),
            completed_courses: with_status(EnrollmentStatus::Completed),
            in_progress: with_status(EnrollmentStatus::InProgress),
            average_progress: average_progress(&enrollments),
            available_courses,
            enrollments,
        })
    }

    pub fn mentor_dashboard(&self, mentor: &Mentor) -> Result<MentorDashboard, SchoolError> {
        let mentored_enrollments = self.list_mentored_enrollments(&mentor.id)?;
        Ok(MentorDashboard {
            mentor: Account::Mentor(mentor.clone()).profile(),
            courses: self.list_mentor_courses(mentor)?,
            unread_messages: self.list_messages(mentor, true)?,
            notifications: self.list_notifications(mentor, true)?,
            total_students: mentored_enrollments.len(),
            mentored_enrollments,
        })
    }
}
