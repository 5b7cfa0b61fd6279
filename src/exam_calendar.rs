use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

use crate::data::{CourseId, RoomId, TimetableId};
use crate::error::SchedulingError;
use crate::store::ExamStore;

/// One row of the exam calendar students see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamCalendarEntry {
    pub course_id: CourseId,
    pub course_code: String,
    pub course_title: String,
    pub date: NaiveDate,
    pub time_label: String,
    pub duration_minutes: u32,
    pub room_id: RoomId,
    pub venue: String,
    pub students_assigned: u32,
    pub session_number: u32,
}

/// Every session of the timetable, ordered by date, then by the position of
/// the time label in `time_labels`, then course code and session number.
pub fn exam_calendar<S: ExamStore + ?Sized>(
    store: &S,
    timetable_id: TimetableId,
    time_labels: &[String],
) -> Result<Vec<ExamCalendarEntry>, SchedulingError> {
    let timetable = store
        .timetable(timetable_id)?
        .ok_or(SchedulingError::TimetableNotFound(timetable_id))?;
    let venues: HashMap<RoomId, String> = store
        .list_rooms(timetable.faculty_id)?
        .into_iter()
        .map(|r| (r.id, r.name))
        .collect();

    let mut entries = Vec::new();
    for course in store.list_courses(timetable_id)? {
        for session in store.list_sessions(course.id)? {
            entries.push(ExamCalendarEntry {
                course_id: course.id,
                course_code: course.code.clone(),
                course_title: course.title.clone(),
                date: session.date,
                time_label: session.time_label,
                duration_minutes: session.duration_minutes,
                room_id: session.room_id,
                venue: venues
                    .get(&session.room_id)
                    .cloned()
                    .unwrap_or_else(|| format!("Room {}", session.room_id)),
                students_assigned: session.students_assigned,
                session_number: session.session_number,
            });
        }
    }

    // unknown labels (manual placements) sort after the configured ones
    let label_rank = |label: &str| {
        time_labels
            .iter()
            .position(|l| l == label)
            .unwrap_or(time_labels.len())
    };
    entries.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| label_rank(&a.time_label).cmp(&label_rank(&b.time_label)))
            .then_with(|| a.time_label.cmp(&b.time_label))
            .then_with(|| a.course_code.cmp(&b.course_code))
            .then_with(|| a.session_number.cmp(&b.session_number))
    });
    Ok(entries)
}
