use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// Type aliases for clarity
pub type FacultyId = u32;
pub type RoomId = u32;
pub type TimetableId = u32;
pub type CourseId = u32;
pub type SessionId = u32;

/// Top-level organizational unit owning rooms and timetables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Faculty {
    pub id: FacultyId,
    pub name: String,
}

/// Represents an exam hall with a given seating capacity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub faculty_id: FacultyId,
    pub capacity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Semester {
    First,
    Second,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timetable {
    pub id: TimetableId,
    pub name: String,
    /// Academic session label, e.g. "2023/2024".
    pub session: String,
    pub semester: Semester,
    pub exam_start_date: Option<NaiveDate>,
    pub faculty_id: FacultyId,
}

/// Single-slot projection of a course's first session, kept for displays
/// that only know about one date/time/room per course.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimarySchedule {
    pub date: NaiveDate,
    pub time_label: String,
    pub duration_minutes: u32,
    pub room_id: RoomId,
}

/// Represents a course to be examined.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    pub timetable_id: TimetableId,
    pub code: String,
    pub title: String,
    pub credit_units: u32,
    pub number_of_students: u32,
    #[serde(default)]
    pub primary: Option<PrimarySchedule>,
}

/// A (date, time-of-day) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub date: NaiveDate,
    pub time_label: String,
}

impl Slot {
    pub fn new(date: NaiveDate, time_label: impl Into<String>) -> Self {
        Self {
            date,
            time_label: time_label.into(),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time_label)
    }
}

/// One course's placement into one room at one slot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub course_id: CourseId,
    pub room_id: RoomId,
    pub date: NaiveDate,
    pub time_label: String,
    pub duration_minutes: u32,
    pub students_assigned: u32,
    /// 1-based, unique per course.
    pub session_number: u32,
}

/// A session that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub course_id: CourseId,
    pub room_id: RoomId,
    pub slot: Slot,
    pub duration_minutes: u32,
    pub students_assigned: u32,
    pub session_number: u32,
}

impl NewSession {
    pub fn primary(&self) -> PrimarySchedule {
        PrimarySchedule {
            date: self.slot.date,
            time_label: self.slot.time_label.clone(),
            duration_minutes: self.duration_minutes,
            room_id: self.room_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmailStats {
    pub total: u32,
    pub successful: u32,
    pub failed: u32,
}

/// The structured outcome of an auto-scheduling pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleReport {
    pub success: bool,
    pub message: String,
    pub conflicts: Vec<String>,
    pub scheduled_count: u32,
    pub email_stats: EmailStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    pub timetable_id: TimetableId,
    pub courses_cleared: u32,
    pub sessions_deleted: u32,
}

/// Snapshot used to seed a store.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Dataset {
    pub faculties: Vec<Faculty>,
    pub rooms: Vec<Room>,
    pub timetables: Vec<Timetable>,
    pub courses: Vec<Course>,
    pub sessions: Vec<Session>,
}
