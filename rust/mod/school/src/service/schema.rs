use eduforall_sql::SQLStore;

use crate::service::SchoolError;

/// Initialize the SQLite schema for all school resources.
///
/// Uniqueness (emails, one enrollment per student and course, one learning
/// path per enrollment) is enforced here, not by read-then-write checks.
/// Every row that names an account references it, so deleting an account
/// cascades to its enrollments, messages and notifications.
pub fn init_schema(sql: &dyn SQLStore) -> Result<(), SchoolError> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS students (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",

        "CREATE TABLE IF NOT EXISTS mentors (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",

        "CREATE TABLE IF NOT EXISTS instructors (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",

        // Deleting an instructor removes their courses.
        "CREATE TABLE IF NOT EXISTS courses (
            id TEXT PRIMARY KEY,
            instructor_id TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (instructor_id) REFERENCES instructors(id) ON DELETE CASCADE
        )",
        "CREATE INDEX IF NOT EXISTS idx_courses_instructor ON courses(instructor_id)",

        // Course or student deletion cascades; mentor removal only clears
        // the reference. Readers take mentor_id from the column, not `data`.
        "CREATE TABLE IF NOT EXISTS enrollments (
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            mentor_id TEXT,
            status TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (student_id, course_id),
            FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE,
            FOREIGN KEY (mentor_id) REFERENCES mentors(id) ON DELETE SET NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_enrollments_mentor ON enrollments(mentor_id)",
        "CREATE INDEX IF NOT EXISTS idx_enrollments_status ON enrollments(status)",

        "CREATE TABLE IF NOT EXISTS learning_paths (
            id TEXT PRIMARY KEY,
            enrollment_id TEXT NOT NULL UNIQUE,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (enrollment_id) REFERENCES enrollments(id) ON DELETE CASCADE
        )",

        // Both parties are kept as foreign keys so that removing either
        // account removes the conversation; receiver_role gives direction.
        "CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            enrollment_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            mentor_id TEXT NOT NULL,
            receiver_role TEXT NOT NULL CHECK (receiver_role IN ('student', 'mentor')),
            is_read INTEGER NOT NULL DEFAULT 0,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (enrollment_id) REFERENCES enrollments(id) ON DELETE CASCADE,
            FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE,
            FOREIGN KEY (mentor_id) REFERENCES mentors(id) ON DELETE CASCADE
        )",
        "CREATE INDEX IF NOT EXISTS idx_messages_student ON messages(student_id, receiver_role, is_read)",
        "CREATE INDEX IF NOT EXISTS idx_messages_mentor ON messages(mentor_id, receiver_role, is_read)",
        "CREATE INDEX IF NOT EXISTS idx_messages_enrollment ON messages(enrollment_id)",

        // Addressed to exactly one account. Readers take related_course_id
        // from the column, not `data`.
        "CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            student_id TEXT,
            mentor_id TEXT,
            related_course_id TEXT,
            is_read INTEGER NOT NULL DEFAULT 0,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            CHECK ((student_id IS NULL) <> (mentor_id IS NULL)),
            FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE,
            FOREIGN KEY (mentor_id) REFERENCES mentors(id) ON DELETE CASCADE,
            FOREIGN KEY (related_course_id) REFERENCES courses(id) ON DELETE SET NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_notifications_student ON notifications(student_id, is_read)",
        "CREATE INDEX IF NOT EXISTS idx_notifications_mentor ON notifications(mentor_id, is_read)",

        // Plain columns: subscribe is a single upsert on email.
        "CREATE TABLE IF NOT EXISTS newsletters (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            active INTEGER NOT NULL DEFAULT 1,
            subscribed_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ];

    for stmt in &statements {
        sql.exec(stmt, &[])?;
    }

    Ok(())
}
