use chrono::NaiveDate;
use thiserror::Error;

use crate::data::{CourseId, RoomId, TimetableId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store lock poisoned while accessing {0}")]
    Poisoned(&'static str),

    #[error("Referenced {entity} {id} does not exist")]
    MissingReference { entity: &'static str, id: u32 },

    #[error("Invalid {entity} {id}: {reason}")]
    InvalidRecord {
        entity: &'static str,
        id: u32,
        reason: String,
    },

    #[error("Persistence backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("Timetable {0} not found")]
    TimetableNotFound(TimetableId),

    #[error("Course {0} not found")]
    CourseNotFound(CourseId),

    #[error("Room {0} not found")]
    RoomNotFound(RoomId),

    #[error("Timetable '{0}' has no exam start date set")]
    MissingExamStartDate(String),

    #[error("Faculty {0} has no rooms available for exams")]
    NoRooms(u32),

    #[error("No unscheduled courses found in timetable '{0}'")]
    NoUnscheduledCourses(String),

    #[error("Room {room_id} is already occupied on {date} at {time_label} by {occupant}")]
    RoomOccupied {
        room_id: RoomId,
        date: NaiveDate,
        time_label: String,
        occupant: String,
    },

    #[error("{course_code} already sits in room {room_id} on {date} at {time_label}")]
    AlreadyPlaced {
        course_code: String,
        room_id: RoomId,
        date: NaiveDate,
        time_label: String,
    },

    #[error("Room {0} has no seats")]
    EmptyRoom(RoomId),

    #[error("Room {room_id} does not belong to the faculty of course {course_id}")]
    ForeignRoom { room_id: RoomId, course_id: CourseId },

    #[error("All students of course {0} are already seated")]
    CourseFullyScheduled(CourseId),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SchedulingError {
    /// Precondition and validation failures perform no writes; everything
    /// else may leave earlier writes of the same operation in place.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, SchedulingError::Store(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Figment(Box::new(e))
    }
}
