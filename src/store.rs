use chrono::NaiveDate;
use itertools::Itertools;
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::data::{
    Course, CourseId, Dataset, Faculty, FacultyId, NewSession, PrimarySchedule, Room, RoomId,
    Session, SessionId, Timetable, TimetableId,
};
use crate::error::{StoreError, StoreResult};

/// Persistence collaborator consumed by the scheduler.
///
/// Methods take `&self` the way a connection pool does; implementations
/// guard their own state.
pub trait ExamStore: Send + Sync {
    fn faculty(&self, id: FacultyId) -> StoreResult<Option<Faculty>>;
    fn timetable(&self, id: TimetableId) -> StoreResult<Option<Timetable>>;
    fn room(&self, id: RoomId) -> StoreResult<Option<Room>>;
    fn course(&self, id: CourseId) -> StoreResult<Option<Course>>;

    /// Rooms of one faculty, in no particular order.
    fn list_rooms(&self, faculty_id: FacultyId) -> StoreResult<Vec<Room>>;
    fn list_courses(&self, timetable_id: TimetableId) -> StoreResult<Vec<Course>>;
    /// Courses of the timetable that have no session at all, by id.
    fn list_unscheduled_courses(&self, timetable_id: TimetableId) -> StoreResult<Vec<Course>>;
    fn list_sessions(&self, course_id: CourseId) -> StoreResult<Vec<Session>>;

    fn find_session_at(
        &self,
        room_id: RoomId,
        date: NaiveDate,
        time_label: &str,
    ) -> StoreResult<Option<Session>>;

    fn create_session(&self, session: &NewSession) -> StoreResult<Session>;
    fn update_course(&self, course_id: CourseId, primary: PrimarySchedule) -> StoreResult<()>;

    /// Returns the number of sessions removed.
    fn delete_sessions(&self, course_ids: &[CourseId]) -> StoreResult<usize>;
    fn clear_course_fields(&self, course_ids: &[CourseId]) -> StoreResult<()>;

    /// Deletes the courses' sessions and clears their primary fields.
    /// Backends that can should do both in one transaction.
    fn reset_courses(&self, course_ids: &[CourseId]) -> StoreResult<usize> {
        let deleted = self.delete_sessions(course_ids)?;
        self.clear_course_fields(course_ids)?;
        Ok(deleted)
    }

    /// Mutual exclusion for everything that writes sessions into the rooms
    /// of one faculty. Rooms are shared by all timetables of the faculty.
    fn faculty_lock(&self, id: FacultyId) -> Arc<Mutex<()>>;
}

#[derive(Debug)]
struct Tables {
    faculties: HashMap<FacultyId, Faculty>,
    rooms: HashMap<RoomId, Room>,
    timetables: HashMap<TimetableId, Timetable>,
    courses: HashMap<CourseId, Course>,
    sessions: Vec<Session>,
    next_session_id: SessionId,
}

/// Process-local store backing the binary and the tests.
#[derive(Debug)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    locks: Mutex<HashMap<FacultyId, Arc<Mutex<()>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                faculties: HashMap::new(),
                rooms: HashMap::new(),
                timetables: HashMap::new(),
                courses: HashMap::new(),
                sessions: Vec::new(),
                next_session_id: 1,
            }),
            locks: Mutex::default(),
        }
    }

    /// Seeds a store, rejecting rooms without seats.
    pub fn from_dataset(dataset: Dataset) -> StoreResult<Self> {
        if let Some(room) = dataset.rooms.iter().find(|r| r.capacity == 0) {
            return Err(StoreError::InvalidRecord {
                entity: "room",
                id: room.id,
                reason: "capacity must be positive".to_string(),
            });
        }
        let next_session_id = dataset.sessions.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        let tables = Tables {
            faculties: dataset.faculties.into_iter().map(|f| (f.id, f)).collect(),
            rooms: dataset.rooms.into_iter().map(|r| (r.id, r)).collect(),
            timetables: dataset.timetables.into_iter().map(|t| (t.id, t)).collect(),
            courses: dataset.courses.into_iter().map(|c| (c.id, c)).collect(),
            sessions: dataset.sessions,
            next_session_id,
        };
        debug!(
            "Seeded in-memory store: {} faculties, {} rooms, {} timetables, {} courses, {} sessions",
            tables.faculties.len(),
            tables.rooms.len(),
            tables.timetables.len(),
            tables.courses.len(),
            tables.sessions.len()
        );
        Ok(Self {
            tables: RwLock::new(tables),
            locks: Mutex::default(),
        })
    }

    /// Every session in creation order.
    pub fn all_sessions(&self) -> StoreResult<Vec<Session>> {
        Ok(self.read()?.sessions.clone())
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StoreError::Poisoned("tables"))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| StoreError::Poisoned("tables"))
    }
}

impl ExamStore for InMemoryStore {
    fn faculty(&self, id: FacultyId) -> StoreResult<Option<Faculty>> {
        Ok(self.read()?.faculties.get(&id).cloned())
    }

    fn timetable(&self, id: TimetableId) -> StoreResult<Option<Timetable>> {
        Ok(self.read()?.timetables.get(&id).cloned())
    }

    fn room(&self, id: RoomId) -> StoreResult<Option<Room>> {
        Ok(self.read()?.rooms.get(&id).cloned())
    }

    fn course(&self, id: CourseId) -> StoreResult<Option<Course>> {
        Ok(self.read()?.courses.get(&id).cloned())
    }

    fn list_rooms(&self, faculty_id: FacultyId) -> StoreResult<Vec<Room>> {
        Ok(self
            .read()?
            .rooms
            .values()
            .filter(|r| r.faculty_id == faculty_id)
            .cloned()
            .collect())
    }

    fn list_courses(&self, timetable_id: TimetableId) -> StoreResult<Vec<Course>> {
        Ok(self
            .read()?
            .courses
            .values()
            .filter(|c| c.timetable_id == timetable_id)
            .cloned()
            .sorted_by_key(|c| c.id)
            .collect())
    }

    fn list_unscheduled_courses(&self, timetable_id: TimetableId) -> StoreResult<Vec<Course>> {
        let tables = self.read()?;
        let sessions_per_course = tables.sessions.iter().counts_by(|s| s.course_id);
        Ok(tables
            .courses
            .values()
            .filter(|c| c.timetable_id == timetable_id && !sessions_per_course.contains_key(&c.id))
            .cloned()
            .sorted_by_key(|c| c.id)
            .collect())
    }

    fn list_sessions(&self, course_id: CourseId) -> StoreResult<Vec<Session>> {
        Ok(self
            .read()?
            .sessions
            .iter()
            .filter(|s| s.course_id == course_id)
            .cloned()
            .sorted_by_key(|s| s.session_number)
            .collect())
    }

    fn find_session_at(
        &self,
        room_id: RoomId,
        date: NaiveDate,
        time_label: &str,
    ) -> StoreResult<Option<Session>> {
        Ok(self
            .read()?
            .sessions
            .iter()
            .find(|s| s.room_id == room_id && s.date == date && s.time_label == time_label)
            .cloned())
    }

    fn create_session(&self, session: &NewSession) -> StoreResult<Session> {
        let mut tables = self.write()?;
        if !tables.courses.contains_key(&session.course_id) {
            return Err(StoreError::MissingReference {
                entity: "course",
                id: session.course_id,
            });
        }
        if !tables.rooms.contains_key(&session.room_id) {
            return Err(StoreError::MissingReference {
                entity: "room",
                id: session.room_id,
            });
        }
        let stored = Session {
            id: tables.next_session_id,
            course_id: session.course_id,
            room_id: session.room_id,
            date: session.slot.date,
            time_label: session.slot.time_label.clone(),
            duration_minutes: session.duration_minutes,
            students_assigned: session.students_assigned,
            session_number: session.session_number,
        };
        tables.next_session_id += 1;
        tables.sessions.push(stored.clone());
        Ok(stored)
    }

    fn update_course(&self, course_id: CourseId, primary: PrimarySchedule) -> StoreResult<()> {
        let mut tables = self.write()?;
        let course = tables
            .courses
            .get_mut(&course_id)
            .ok_or(StoreError::MissingReference {
                entity: "course",
                id: course_id,
            })?;
        course.primary = Some(primary);
        Ok(())
    }

    fn delete_sessions(&self, course_ids: &[CourseId]) -> StoreResult<usize> {
        let mut tables = self.write()?;
        let before = tables.sessions.len();
        tables.sessions.retain(|s| !course_ids.contains(&s.course_id));
        Ok(before - tables.sessions.len())
    }

    fn clear_course_fields(&self, course_ids: &[CourseId]) -> StoreResult<()> {
        let mut tables = self.write()?;
        for id in course_ids {
            if let Some(course) = tables.courses.get_mut(id) {
                course.primary = None;
            }
        }
        Ok(())
    }

    fn reset_courses(&self, course_ids: &[CourseId]) -> StoreResult<usize> {
        let mut tables = self.write()?;
        let before = tables.sessions.len();
        tables.sessions.retain(|s| !course_ids.contains(&s.course_id));
        for id in course_ids {
            if let Some(course) = tables.courses.get_mut(id) {
                course.primary = None;
            }
        }
        Ok(before - tables.sessions.len())
    }

    fn faculty_lock(&self, id: FacultyId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id).or_default())
    }
}
