use chrono::NaiveDate;
use log::info;
use serde::Deserialize;
use std::sync::PoisonError;

use crate::availability::AvailabilityChecker;
use crate::data::{CourseId, NewSession, RoomId, Session, Slot};
use crate::error::SchedulingError;
use crate::store::ExamStore;

/// An administrator's explicit placement of one course session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualSessionRequest {
    pub course_id: CourseId,
    pub room_id: RoomId,
    pub date: NaiveDate,
    pub time_label: String,
    pub duration_minutes: u32,
}

/// Places exactly one session, bypassing the packer but not the
/// double-booking check. A room+slot already held by any session, the
/// course's own included, is refused.
pub fn schedule_session<S: ExamStore + ?Sized>(
    store: &S,
    request: &ManualSessionRequest,
) -> Result<Session, SchedulingError> {
    let time_label = request.time_label.trim();
    if time_label.is_empty() {
        return Err(SchedulingError::InvalidRequest("time label must not be empty".to_string()));
    }
    if request.duration_minutes == 0 {
        return Err(SchedulingError::InvalidRequest("duration must be positive".to_string()));
    }

    let course = store
        .course(request.course_id)?
        .ok_or(SchedulingError::CourseNotFound(request.course_id))?;

    let timetable = store
        .timetable(course.timetable_id)?
        .ok_or(SchedulingError::TimetableNotFound(course.timetable_id))?;

    let lock = store.faculty_lock(timetable.faculty_id);
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

    let room = store
        .room(request.room_id)?
        .ok_or(SchedulingError::RoomNotFound(request.room_id))?;
    if room.faculty_id != timetable.faculty_id {
        return Err(SchedulingError::ForeignRoom {
            room_id: room.id,
            course_id: course.id,
        });
    }
    if room.capacity == 0 {
        return Err(SchedulingError::EmptyRoom(room.id));
    }

    let slot = Slot::new(request.date, time_label);
    let checker = AvailabilityChecker::new(store);
    match checker.occupant(room.id, &slot)? {
        Some(id) if id == course.id => {
            return Err(SchedulingError::AlreadyPlaced {
                course_code: course.code,
                room_id: room.id,
                date: slot.date,
                time_label: slot.time_label,
            });
        }
        Some(id) => {
            let occupant = store
                .course(id)?
                .map(|c| c.code)
                .unwrap_or_else(|| format!("course {id}"));
            return Err(SchedulingError::RoomOccupied {
                room_id: room.id,
                date: slot.date,
                time_label: slot.time_label,
                occupant,
            });
        }
        None => {}
    }

    let existing = store.list_sessions(course.id)?;
    let seated: u32 = existing.iter().map(|s| s.students_assigned).sum();
    let unseated = course.number_of_students.saturating_sub(seated);
    if unseated == 0 {
        return Err(SchedulingError::CourseFullyScheduled(course.id));
    }

    let new_session = NewSession {
        course_id: course.id,
        room_id: room.id,
        slot,
        duration_minutes: request.duration_minutes,
        students_assigned: unseated.min(room.capacity),
        session_number: existing.iter().map(|s| s.session_number).max().unwrap_or(0) + 1,
    };
    let session = store.create_session(&new_session)?;
    if existing.is_empty() {
        store.update_course(course.id, new_session.primary())?;
    }

    info!(
        "Manually scheduled {} session {} in {} on {} at {}",
        course.code, session.session_number, room.name, session.date, session.time_label
    );
    Ok(session)
}
