use chrono::NaiveDate;
use tracing::info;

use eduforall_core::{new_id, now_rfc3339, ListParams, ListResult};
use eduforall_sql::Value;

use crate::model::{Course, CourseType, CreateCourse, Instructor, Mentor};
use crate::service::{SchoolError, SchoolService};
use crate::validate;

const DEFAULT_DURATION_WEEKS: u32 = 4;

fn parse_date(s: &str) -> Result<NaiveDate, SchoolError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| SchoolError::Validation("Dates must use the YYYY-MM-DD format".into()))
}

impl SchoolService {
    /// Create a course owned by the mentor's instructor record.
    pub fn create_course(&self, mentor: &Mentor, input: CreateCourse) -> Result<Course, SchoolError> {
        let title = input.title.trim().to_string();
        let description = input.description.trim().to_string();
        if !validate::all_present(&[&title, &description, &input.start_date, &input.end_date]) {
            return Err(SchoolError::Validation(
                "Please fill in all required fields".into(),
            ));
        }

        let start_date = parse_date(&input.start_date)?;
        let end_date = parse_date(&input.end_date)?;
        if end_date < start_date {
            return Err(SchoolError::Validation(
                "End date cannot be before start date".into(),
            ));
        }

        let course_type = match validate::non_blank(input.course_type.as_deref()) {
            None => CourseType::Both,
            Some(t) => CourseType::parse(&t)
                .ok_or_else(|| SchoolError::Validation("Invalid course type".into()))?,
        };
        let price = match course_type {
            CourseType::Free => 0.0,
            _ => input.price.unwrap_or(0.0),
        };
        if !price.is_finite() || price < 0.0 {
            return Err(SchoolError::Validation("Price cannot be negative".into()));
        }
        let duration_weeks = match input.duration_weeks {
            None => DEFAULT_DURATION_WEEKS,
            Some(0) => {
                return Err(SchoolError::Validation(
                    "Duration must be at least one week".into(),
                ))
            }
            Some(w) => w,
        };

        let instructor = self.instructor_for(mentor)?;
        let now = now_rfc3339();
        let course = Course {
            id: new_id(),
            title,
            description,
            instructor_id: instructor.id.clone(),
            course_type,
            price,
            duration_weeks,
            start_date,
            end_date,
            created_at: now.clone(),
        };

        let stmt = Self::insert_statement(
            "courses",
            &course.id,
            &course,
            &[
                ("instructor_id", Value::Text(instructor.id)),
                ("created_at", Value::Text(now)),
            ],
        )?;
        self.run(&stmt)?;

        info!(course = %course.id, mentor = %mentor.id, "course created");
        Ok(course)
    }

    /// Get or create the instructor record keyed by the mentor's email.
    fn instructor_for(&self, mentor: &Mentor) -> Result<Instructor, SchoolError> {
        let candidate = Instructor {
            id: new_id(),
            first_name: mentor.first_name.clone(),
            last_name: mentor.last_name.clone(),
            email: mentor.email.clone(),
            phone_number: mentor.phone_number.clone(),
            created_at: now_rfc3339(),
        };
        let mut stmt = Self::insert_statement(
            "instructors",
            &candidate.id,
            &candidate,
            &[
                ("email", Value::Text(candidate.email.clone())),
                ("created_at", Value::Text(candidate.created_at.clone())),
            ],
        )?;
        stmt.sql.push_str(" ON CONFLICT(email) DO NOTHING");
        self.run(&stmt)?;

        self.find_record("instructors", "email", &mentor.email)?
            .ok_or_else(|| SchoolError::Internal("instructor vanished after upsert".into()))
    }

    pub fn list_courses(&self, params: &ListParams) -> Result<ListResult<Course>, SchoolError> {
        let (items, total) = self.list_records("courses", &[], params.page_size(), params.offset)?;
        Ok(ListResult { items, total })
    }

    pub fn get_course(&self, id: &str) -> Result<Course, SchoolError> {
        self.get_record("courses", id)?
            .ok_or_else(|| SchoolError::NotFound("Course not found".into()))
    }

    /// Courses whose instructor shares the mentor's email.
    pub fn list_mentor_courses(&self, mentor: &Mentor) -> Result<Vec<Course>, SchoolError> {
        self.query_records(
            "SELECT c.data FROM courses c
             JOIN instructors i ON i.id = c.instructor_id
             WHERE i.email = ?1
             ORDER BY c.created_at DESC, c.id",
            &[Value::Text(mentor.email.clone())],
        )
    }
}
