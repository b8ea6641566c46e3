use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Course owner. Separate from Mentor; a mentor authoring a course gets an
/// instructor record keyed by the mentor's email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instructor {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseType {
    Free,
    Paid,
    Both,
}

impl CourseType {
    pub fn parse(s: &str) -> Option<CourseType> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Some(CourseType::Free),
            "paid" => Some(CourseType::Paid),
            "both" => Some(CourseType::Both),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    pub instructor_id: String,
    pub course_type: CourseType,
    /// Always 0 for free courses.
    pub price: f64,
    pub duration_weeks: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: String,
}

/// Course creation form. Dates are `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateCourse {
    pub title: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub course_type: Option<String>,
    pub price: Option<f64>,
    pub duration_weeks: Option<u32>,
}
