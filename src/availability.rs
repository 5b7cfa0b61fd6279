use log::trace;
use std::collections::HashMap;

use crate::data::{CourseId, RoomId, Slot};
use crate::error::StoreResult;
use crate::store::ExamStore;

/// Answers "is room R free at slot S?" against persisted sessions and the
/// placements accepted earlier in the same pass.
pub struct AvailabilityChecker<'s, S: ExamStore + ?Sized> {
    store: &'s S,
    committed: HashMap<(RoomId, Slot), CourseId>,
}

impl<'s, S: ExamStore + ?Sized> AvailabilityChecker<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            committed: HashMap::new(),
        }
    }

    /// Persisted sessions of `excluding` never block. Placements committed
    /// in this pass always do, the excluded course's own included.
    pub fn is_available(&self, room_id: RoomId, slot: &Slot, excluding: CourseId) -> StoreResult<bool> {
        if self.committed.contains_key(&(room_id, slot.clone())) {
            return Ok(false);
        }
        let persisted = self.store.find_session_at(room_id, slot.date, &slot.time_label)?;
        Ok(persisted.is_none_or(|session| session.course_id == excluding))
    }

    /// The course holding `room_id` at `slot`, if any.
    pub fn occupant(&self, room_id: RoomId, slot: &Slot) -> StoreResult<Option<CourseId>> {
        if let Some(course_id) = self.committed.get(&(room_id, slot.clone())) {
            return Ok(Some(*course_id));
        }
        Ok(self
            .store
            .find_session_at(room_id, slot.date, &slot.time_label)?
            .map(|session| session.course_id))
    }

    pub fn commit(&mut self, room_id: RoomId, slot: Slot, course_id: CourseId) {
        trace!("Room {room_id} at {slot} committed to course {course_id}");
        self.committed.insert((room_id, slot), course_id);
    }

    pub fn committed_count(&self) -> usize {
        self.committed.len()
    }
}
