use log::{debug, trace};
use std::cmp::Reverse;

use crate::availability::AvailabilityChecker;
use crate::calendar::SlotCalendar;
use crate::data::{Course, NewSession, Room, Slot};
use crate::error::StoreResult;
use crate::store::ExamStore;

/// A faculty's rooms in the order the packer tries them: largest first,
/// ties by name. Rooms without seats are dropped.
#[derive(Debug, Clone)]
pub struct RoomPool {
    rooms: Vec<Room>,
}

impl RoomPool {
    pub fn new(mut rooms: Vec<Room>) -> Self {
        rooms.retain(|room| room.capacity > 0);
        rooms.sort_by(|a, b| {
            Reverse(a.capacity)
                .cmp(&Reverse(b.capacity))
                .then_with(|| a.name.cmp(&b.name))
        });
        Self { rooms }
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PackedCourse {
    pub sessions: Vec<NewSession>,
    /// Set when some students could not be seated.
    pub conflict: Option<String>,
}

impl PackedCourse {
    pub fn seated(&self) -> u32 {
        self.sessions.iter().map(|s| s.students_assigned).sum()
    }
}

#[derive(Debug)]
struct Placement<'r> {
    room: &'r Room,
    slot: Slot,
    seats: u32,
}

/// Seats every student of `course`, one session per (room, slot) used.
///
/// Each round walks the calendar from its start; on the first date where
/// anything is free it takes the pair seating the most remaining students,
/// earlier time labels winning ties. Accepted pairs are committed to the
/// checker so the next round and later courses see them as taken.
pub fn pack_course<S: ExamStore + ?Sized>(
    course: &Course,
    pool: &RoomPool,
    calendar: &SlotCalendar<'_>,
    checker: &mut AvailabilityChecker<'_, S>,
    duration_minutes: u32,
) -> StoreResult<PackedCourse> {
    let mut packed = PackedCourse::default();
    if course.number_of_students == 0 {
        packed.conflict = Some(format!("{}: no enrolled students to seat", course.code));
        return Ok(packed);
    }

    let mut remaining = course.number_of_students;
    let mut session_number = 1;

    while remaining > 0 {
        let Some(best) = best_placement(course, remaining, pool, calendar, checker)? else {
            packed.conflict = Some(format!(
                "{}: unable to schedule {} remaining students after {} attempts",
                course.code,
                remaining,
                calendar.max_dates()
            ));
            break;
        };

        trace!(
            "{} session {} -> {} at {} ({} seats)",
            course.code, session_number, best.room.name, best.slot, best.seats
        );
        checker.commit(best.room.id, best.slot.clone(), course.id);
        packed.sessions.push(NewSession {
            course_id: course.id,
            room_id: best.room.id,
            slot: best.slot,
            duration_minutes,
            students_assigned: best.seats,
            session_number,
        });
        remaining -= best.seats;
        session_number += 1;
    }

    debug!(
        "Packed {} into {} session(s), {} of {} students seated",
        course.code,
        packed.sessions.len(),
        packed.seated(),
        course.number_of_students
    );
    Ok(packed)
}

fn best_placement<'r, S: ExamStore + ?Sized>(
    course: &Course,
    remaining: u32,
    pool: &'r RoomPool,
    calendar: &SlotCalendar<'_>,
    checker: &AvailabilityChecker<'_, S>,
) -> StoreResult<Option<Placement<'r>>> {
    for date in calendar.dates() {
        let mut best: Option<Placement<'r>> = None;
        for label in calendar.time_labels() {
            let slot = Slot::new(date, label.as_str());
            for room in pool.rooms() {
                if !checker.is_available(room.id, &slot, course.id)? {
                    continue;
                }
                let seats = remaining.min(room.capacity);
                if best.as_ref().is_none_or(|b| seats > b.seats) {
                    best = Some(Placement {
                        room,
                        slot: slot.clone(),
                        seats,
                    });
                }
            }
        }
        if best.is_some() {
            return Ok(best);
        }
    }
    Ok(None)
}
