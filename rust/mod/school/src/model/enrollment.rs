use serde::{Deserialize, Serialize};

/// Lessons a fresh learning path starts with.
pub const DEFAULT_TOTAL_LESSONS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentType {
    Free,
    Mentored,
}

impl EnrollmentType {
    pub fn parse(s: &str) -> Option<EnrollmentType> {
        match s.trim() {
            "free" => Some(EnrollmentType::Free),
            "mentored" => Some(EnrollmentType::Mentored),
            _ => None,
        }
    }
}

/// enrolled -> in_progress -> completed, or dropped from any non-completed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Enrolled,
    InProgress,
    Completed,
    Dropped,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Enrolled => "enrolled",
            EnrollmentStatus::InProgress => "in_progress",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Dropped => "dropped",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, EnrollmentStatus::Enrolled | EnrollmentStatus::InProgress)
    }
}

/// A student's enrollment in a course (unique per student and course).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub enrollment_type: EnrollmentType,
    /// Cleared by the store when the mentor is removed.
    #[serde(default)]
    pub mentor_id: Option<String>,
    pub status: EnrollmentStatus,
    /// 0..=100.
    pub progress: u8,
    pub enrolled_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

/// Per-enrollment lesson tracker. Exactly one per enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPath {
    pub id: String,
    pub enrollment_id: String,
    pub total_lessons: u32,
    pub completed_lessons: u32,
    pub completion_percentage: u8,
    pub updated_at: String,
}

impl LearningPath {
    pub fn new(id: String, enrollment_id: String, total_lessons: u32, now: String) -> Self {
        Self {
            id,
            enrollment_id,
            total_lessons,
            completed_lessons: 0,
            completion_percentage: 0,
            updated_at: now,
        }
    }

    /// Set lesson counts, clamping completed to total, and recompute the
    /// percentage (rounded down).
    pub fn set_progress(&mut self, completed: u32, total: u32) {
        self.total_lessons = total;
        self.completed_lessons = completed.min(total);
        self.completion_percentage = if total == 0 {
            0
        } else {
            (u64::from(self.completed_lessons) * 100 / u64::from(total)) as u8
        };
    }
}

/// Enrollment form.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrollInput {
    #[serde(default = "default_enrollment_type")]
    pub enrollment_type: String,
    #[serde(default)]
    pub mentor_id: Option<String>,
}

fn default_enrollment_type() -> String {
    "free".to_string()
}

impl Default for EnrollInput {
    fn default() -> Self {
        Self {
            enrollment_type: default_enrollment_type(),
            mentor_id: None,
        }
    }
}

/// Progress report for an enrollment.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressInput {
    pub completed_lessons: u32,
    /// Optional new lesson total.
    #[serde(default)]
    pub total_lessons: Option<u32>,
}

/// An enrollment with its learning path.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentDetail {
    pub enrollment: Enrollment,
    pub learning_path: Option<LearningPath>,
}
