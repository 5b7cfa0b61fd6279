mod common;

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Barrier, Mutex};

use common::*;
use exam_scheduler::calendar::SlotCalendar;
use exam_scheduler::config::SchedulingConfig;
use exam_scheduler::data::{
    Course, CourseId, Dataset, Faculty, FacultyId, NewSession, PrimarySchedule, Room, RoomId,
    Session, Timetable, TimetableId,
};
use exam_scheduler::error::{SchedulingError, StoreError, StoreResult};
use exam_scheduler::manual::ManualSessionRequest;
use exam_scheduler::notify::{LogNotifier, NotificationKind};
use exam_scheduler::{ExamStore, InMemoryStore, Scheduler};

fn assert_no_double_booking(sessions: &[Session]) {
    let mut seen = HashSet::new();
    for s in sessions {
        assert!(
            seen.insert((s.room_id, s.date, s.time_label.clone())),
            "room {} double-booked on {} at {}",
            s.room_id,
            s.date,
            s.time_label
        );
    }
}

fn seated_per_course(sessions: &[Session]) -> HashMap<CourseId, u32> {
    let mut seated = HashMap::new();
    for s in sessions {
        *seated.entry(s.course_id).or_insert(0) += s.students_assigned;
    }
    seated
}

#[test]
fn single_room_sufficient() {
    let store = InMemoryStore::from_dataset(faculty_dataset(
        vec![room(1, "Main Hall", 300)],
        vec![course(1, "CSC 101", 250)],
    )).unwrap();
    let config = SchedulingConfig::default();
    let report = Scheduler::new(&store, &LogNotifier, &config).auto_schedule(1).unwrap();

    assert!(report.success);
    assert_eq!(report.scheduled_count, 1);
    assert!(report.conflicts.is_empty());

    let sessions = store.all_sessions().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].students_assigned, 250);
    assert_eq!(sessions[0].date, monday());
    assert_eq!(sessions[0].time_label, "9:00");
    assert_eq!(sessions[0].session_number, 1);
}

#[test]
fn multi_room_spill() {
    let store = InMemoryStore::from_dataset(faculty_dataset(
        vec![room(2, "Room 2", 150), room(1, "Hall 1", 200)],
        vec![course(1, "CSC 101", 300)],
    )).unwrap();
    let config = SchedulingConfig::default();
    Scheduler::new(&store, &LogNotifier, &config).auto_schedule(1).unwrap();

    let sessions = store.list_sessions(1).unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!((sessions[0].room_id, sessions[0].students_assigned), (1, 200));
    assert_eq!((sessions[1].room_id, sessions[1].students_assigned), (2, 100));
    assert_eq!(sessions.iter().map(|s| s.students_assigned).sum::<u32>(), 300);
}

fn fully_booked_dataset(extra_courses: Vec<Course>) -> Dataset {
    let labels = SchedulingConfig::default().time_labels;
    let slots: Vec<(NaiveDate, &str)> = SlotCalendar::new(monday(), &labels, 50)
        .dates()
        .flat_map(|d| [(d, "9:00"), (d, "14:00")])
        .collect();

    let mut dataset = faculty_dataset(vec![room(1, "Main Hall", 100)], extra_courses);
    dataset.timetables.push(timetable(2, Some(monday())));
    dataset.courses.push(Course {
        timetable_id: 2,
        ..course(99, "GST 101", 10_000)
    });
    dataset.sessions = occupying_sessions(99, 1, &slots);
    dataset
}

#[test]
fn exhausted_budget_for_sole_course_fails() {
    let store = InMemoryStore::from_dataset(fully_booked_dataset(vec![course(1, "CSC 101", 50)])).unwrap();
    let config = SchedulingConfig::default();
    let report = Scheduler::new(&store, &LogNotifier, &config).auto_schedule(1).unwrap();

    assert!(!report.success);
    assert_eq!(report.scheduled_count, 0);
    assert_eq!(
        report.conflicts,
        vec!["CSC 101: unable to schedule 50 remaining students after 50 attempts".to_string()]
    );
    assert!(store.list_sessions(1).unwrap().is_empty());
    assert!(store.course(1).unwrap().unwrap().primary.is_none());
}

#[test]
fn exhausted_budget_with_other_successes_still_succeeds() {
    let store = InMemoryStore::from_dataset(faculty_dataset(
        vec![room(1, "Main Hall", 100)],
        vec![course(1, "CSC 101", 100), course(2, "CSC 102", 30)],
    )).unwrap();
    let config = SchedulingConfig {
        time_labels: vec!["9:00".to_string()],
        max_dates: 1,
        ..SchedulingConfig::default()
    };
    let report = Scheduler::new(&store, &LogNotifier, &config).auto_schedule(1).unwrap();

    assert!(report.success);
    assert_eq!(report.scheduled_count, 1);
    assert_eq!(report.conflicts.len(), 1);
    assert!(report.conflicts[0].starts_with("CSC 102"));
    assert!(report.message.starts_with("Scheduled 1 course(s) with 1 conflict(s)."));
}

#[test]
fn partially_scheduled_course_keeps_its_sessions() {
    let store = InMemoryStore::from_dataset(faculty_dataset(
        vec![room(1, "Main Hall", 100)],
        vec![course(1, "CSC 101", 250)],
    )).unwrap();
    let config = SchedulingConfig {
        max_dates: 1,
        ..SchedulingConfig::default()
    };
    let report = Scheduler::new(&store, &LogNotifier, &config).auto_schedule(1).unwrap();

    assert!(report.success);
    assert_eq!(
        report.conflicts,
        vec!["CSC 101: unable to schedule 50 remaining students after 1 attempts".to_string()]
    );
    let seated: u32 = store.list_sessions(1).unwrap().iter().map(|s| s.students_assigned).sum();
    assert_eq!(seated, 200);
}

#[test]
fn rerunning_adds_no_sessions() {
    let store = InMemoryStore::from_dataset(faculty_dataset(
        vec![room(1, "Hall 1", 200), room(2, "Room 2", 150)],
        vec![course(1, "CSC 101", 600), course(2, "MTH 101", 150), course(3, "BIO 101", 300)],
    )).unwrap();
    let config = SchedulingConfig::default();
    let scheduler = Scheduler::new(&store, &LogNotifier, &config);
    scheduler.auto_schedule(1).unwrap();
    let first = store.all_sessions().unwrap();

    let err = scheduler.auto_schedule(1).unwrap_err();
    assert!(matches!(err, SchedulingError::NoUnscheduledCourses(_)));
    assert_eq!(store.all_sessions().unwrap(), first);
}

#[test]
fn largest_course_is_placed_first() {
    let store = InMemoryStore::from_dataset(faculty_dataset(
        vec![room(1, "Hall 1", 700)],
        vec![course(1, "MTH 101", 600), course(2, "BIO 101", 150), course(3, "CSC 101", 300)],
    )).unwrap();
    let notifier = RecordingNotifier::default();
    let config = SchedulingConfig::default();
    Scheduler::new(&store, &notifier, &config).auto_schedule(1).unwrap();

    let order: Vec<CourseId> = store.all_sessions().unwrap().iter().map(|s| s.course_id).collect();
    assert_eq!(order, vec![1, 3, 2]);
    assert_eq!(*notifier.notified.lock().unwrap(), vec![1, 3, 2]);
}

#[test]
fn realistic_faculty_respects_all_invariants() {
    let dataset: Dataset = serde_json::from_str(include_str!("../demos/science_faculty.json")).unwrap();
    let expected: HashMap<CourseId, u32> = dataset
        .courses
        .iter()
        .filter(|c| c.timetable_id == 1)
        .map(|c| (c.id, c.number_of_students))
        .collect();
    let store = InMemoryStore::from_dataset(dataset).unwrap();
    let config = SchedulingConfig::default();
    let report = Scheduler::new(&store, &LogNotifier, &config).auto_schedule(1).unwrap();

    assert!(report.success);
    assert!(report.conflicts.is_empty());
    assert_eq!(report.scheduled_count as usize, expected.len());
    assert_eq!(report.email_stats.total, report.scheduled_count);

    let sessions = store.all_sessions().unwrap();
    assert_no_double_booking(&sessions);
    assert_eq!(seated_per_course(&sessions), expected);
    assert!(
        sessions
            .iter()
            .all(|s| !matches!(s.date.weekday(), Weekday::Sat | Weekday::Sun))
    );
    for course_id in expected.keys() {
        let numbers: Vec<u32> = store
            .list_sessions(*course_id)
            .unwrap()
            .iter()
            .map(|s| s.session_number)
            .collect();
        assert_eq!(numbers, (1..=numbers.len() as u32).collect::<Vec<_>>());
    }
}

#[test]
fn weekend_start_spills_to_monday() {
    let mut dataset = faculty_dataset(
        vec![room(1, "Main Hall", 100)],
        (1..=6).map(|i| course(i, &format!("CSC 10{i}"), 100)).collect(),
    );
    // Thursday
    dataset.timetables[0].exam_start_date = Some(date(2025, 1, 9));
    let store = InMemoryStore::from_dataset(dataset).unwrap();
    let config = SchedulingConfig::default();
    Scheduler::new(&store, &LogNotifier, &config).auto_schedule(1).unwrap();

    let dates: Vec<NaiveDate> = store.all_sessions().unwrap().iter().map(|s| s.date).collect();
    assert_eq!(
        dates,
        vec![
            date(2025, 1, 9),
            date(2025, 1, 9),
            date(2025, 1, 10),
            date(2025, 1, 10),
            date(2025, 1, 13),
            date(2025, 1, 13),
        ]
    );
}

#[test]
fn clear_then_reschedule_starts_from_scratch() {
    let store = InMemoryStore::from_dataset(faculty_dataset(
        vec![room(1, "Hall 1", 200), room(2, "Room 2", 150)],
        vec![course(1, "CSC 101", 300), course(2, "MTH 101", 100)],
    )).unwrap();
    let config = SchedulingConfig::default();
    let scheduler = Scheduler::new(&store, &LogNotifier, &config);
    scheduler.auto_schedule(1).unwrap();
    let before: Vec<(RoomId, NaiveDate, String, u32)> = store
        .all_sessions()
        .unwrap()
        .into_iter()
        .map(|s| (s.room_id, s.date, s.time_label, s.students_assigned))
        .collect();

    let cleared = scheduler.clear_schedule(1).unwrap();
    assert_eq!(cleared.courses_cleared, 2);
    assert_eq!(cleared.sessions_deleted as usize, before.len());
    assert!(store.all_sessions().unwrap().is_empty());
    assert_eq!(store.list_unscheduled_courses(1).unwrap().len(), 2);
    assert!(store.course(1).unwrap().unwrap().primary.is_none());

    let report = scheduler.auto_schedule(1).unwrap();
    assert_eq!(report.scheduled_count, 2);
    let after: Vec<(RoomId, NaiveDate, String, u32)> = store
        .all_sessions()
        .unwrap()
        .into_iter()
        .map(|s| (s.room_id, s.date, s.time_label, s.students_assigned))
        .collect();
    assert_eq!(after, before);
}

#[test]
fn notification_failures_do_not_roll_back() {
    let store = InMemoryStore::from_dataset(faculty_dataset(
        vec![room(1, "Main Hall", 300)],
        vec![course(1, "CSC 101", 250), course(2, "MTH 101", 100)],
    )).unwrap();
    let config = SchedulingConfig::default();
    let report = Scheduler::new(&store, &FailingNotifier, &config).auto_schedule(1).unwrap();

    assert!(report.success);
    assert_eq!(report.scheduled_count, 2);
    assert_eq!(report.email_stats.failed, 2);
    assert_eq!(report.email_stats.successful, 0);
    assert_eq!(report.conflicts, vec!["2 of 2 notification(s) failed to send".to_string()]);
    assert_eq!(store.all_sessions().unwrap().len(), 2);
}

/// Delegates to an in-memory store but fails session writes after a quota
/// and can report one room as having no seats.
struct FlakyStore {
    inner: InMemoryStore,
    writes_left: AtomicUsize,
    seatless_room: Option<RoomId>,
}

impl FlakyStore {
    fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            writes_left: AtomicUsize::new(usize::MAX),
            seatless_room: None,
        }
    }
}

impl ExamStore for FlakyStore {
    fn faculty(&self, id: FacultyId) -> StoreResult<Option<Faculty>> {
        self.inner.faculty(id)
    }
    fn timetable(&self, id: TimetableId) -> StoreResult<Option<Timetable>> {
        self.inner.timetable(id)
    }
    fn room(&self, id: RoomId) -> StoreResult<Option<Room>> {
        let room = self.inner.room(id)?;
        Ok(room.map(|mut r| {
            if self.seatless_room == Some(r.id) {
                r.capacity = 0;
            }
            r
        }))
    }
    fn course(&self, id: CourseId) -> StoreResult<Option<Course>> {
        self.inner.course(id)
    }
    fn list_rooms(&self, faculty_id: FacultyId) -> StoreResult<Vec<Room>> {
        self.inner.list_rooms(faculty_id)
    }
    fn list_courses(&self, timetable_id: TimetableId) -> StoreResult<Vec<Course>> {
        self.inner.list_courses(timetable_id)
    }
    fn list_unscheduled_courses(&self, timetable_id: TimetableId) -> StoreResult<Vec<Course>> {
        self.inner.list_unscheduled_courses(timetable_id)
    }
    fn list_sessions(&self, course_id: CourseId) -> StoreResult<Vec<Session>> {
        self.inner.list_sessions(course_id)
    }
    fn find_session_at(&self, room_id: RoomId, date: NaiveDate, time_label: &str) -> StoreResult<Option<Session>> {
        self.inner.find_session_at(room_id, date, time_label)
    }
    fn create_session(&self, session: &NewSession) -> StoreResult<Session> {
        let left = self.writes_left.load(Ordering::SeqCst);
        if left == 0 {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        self.writes_left.store(left - 1, Ordering::SeqCst);
        self.inner.create_session(session)
    }
    fn update_course(&self, course_id: CourseId, primary: PrimarySchedule) -> StoreResult<()> {
        self.inner.update_course(course_id, primary)
    }
    fn delete_sessions(&self, course_ids: &[CourseId]) -> StoreResult<usize> {
        self.inner.delete_sessions(course_ids)
    }
    fn clear_course_fields(&self, course_ids: &[CourseId]) -> StoreResult<()> {
        self.inner.clear_course_fields(course_ids)
    }
    fn faculty_lock(&self, id: FacultyId) -> Arc<Mutex<()>> {
        self.inner.faculty_lock(id)
    }
}

#[test]
fn persistence_failure_aborts_without_rollback() {
    let store = FlakyStore {
        writes_left: AtomicUsize::new(1),
        ..FlakyStore::new(
            InMemoryStore::from_dataset(faculty_dataset(
                vec![room(1, "Main Hall", 300)],
                vec![course(1, "CSC 101", 250), course(2, "MTH 101", 100)],
            ))
            .unwrap(),
        )
    };
    let config = SchedulingConfig::default();
    let err = Scheduler::new(&store, &LogNotifier, &config).auto_schedule(1).unwrap_err();

    assert!(matches!(err, SchedulingError::Store(StoreError::Backend(_))));
    assert!(!err.is_precondition());
    assert_eq!(store.inner.list_sessions(1).unwrap().len(), 1);
    assert!(store.inner.list_sessions(2).unwrap().is_empty());
}

#[test]
fn concurrent_passes_on_one_timetable_are_serialized() {
    let store = Arc::new(InMemoryStore::from_dataset(faculty_dataset(
        vec![room(1, "Hall 1", 200), room(2, "Room 2", 150)],
        (1..=8).map(|i| course(i, &format!("CSC 1{i:02}"), 120 + i * 20)).collect(),
    )).unwrap());
    let config = Arc::new(SchedulingConfig::default());

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let store = Arc::clone(&store);
            let config = Arc::clone(&config);
            std::thread::spawn(move || Scheduler::new(&*store, &LogNotifier, &config).auto_schedule(1))
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let skipped = results
        .iter()
        .filter(|r| matches!(r, Err(SchedulingError::NoUnscheduledCourses(_))))
        .count();
    assert_eq!((successes, skipped), (1, 1));

    let sessions = store.all_sessions().unwrap();
    assert_no_double_booking(&sessions);
    assert_eq!(seated_per_course(&sessions).len(), 8);
}

#[test]
fn concurrent_passes_on_sibling_timetables_share_rooms_safely() {
    let mut dataset = faculty_dataset(
        vec![room(1, "Hall 1", 200), room(2, "Room 2", 150)],
        (1..=6).map(|i| course(i, &format!("CSC 1{i:02}"), 100 + i * 5)).collect(),
    );
    dataset.timetables.push(timetable(2, Some(monday())));
    dataset.courses.extend((7..=12).map(|i| Course {
        timetable_id: 2,
        ..course(i, &format!("MTH 1{i:02}"), 100 + i * 5)
    }));
    let store = Arc::new(InMemoryStore::from_dataset(dataset).unwrap());
    let config = Arc::new(SchedulingConfig::default());
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [1, 2]
        .into_iter()
        .map(|timetable_id| {
            let store = Arc::clone(&store);
            let config = Arc::clone(&config);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                Scheduler::new(&*store, &LogNotifier, &config).auto_schedule(timetable_id)
            })
        })
        .collect();
    for handle in handles {
        let report = handle
            .join()
            .unwrap_or_else(|e| std::panic::resume_unwind(e))
            .unwrap();
        assert_eq!(report.scheduled_count, 6);
    }

    let sessions = store.all_sessions().unwrap();
    assert_no_double_booking(&sessions);
    assert_eq!(seated_per_course(&sessions).len(), 12);
}

#[test]
fn manual_placement_refuses_rooms_without_seats() {
    let store = FlakyStore {
        seatless_room: Some(1),
        ..FlakyStore::new(
            InMemoryStore::from_dataset(faculty_dataset(
                vec![room(1, "Main Hall", 100)],
                vec![course(1, "CSC 101", 150)],
            ))
            .unwrap(),
        )
    };
    let request = ManualSessionRequest {
        course_id: 1,
        room_id: 1,
        date: monday(),
        time_label: "9:00".to_string(),
        duration_minutes: 120,
    };
    let config = SchedulingConfig::default();
    let err = Scheduler::new(&store, &LogNotifier, &config)
        .schedule_session(&request)
        .unwrap_err();

    assert!(matches!(err, SchedulingError::EmptyRoom(1)));
    assert!(store.inner.all_sessions().unwrap().is_empty());
    assert_eq!(store.inner.list_unscheduled_courses(1).unwrap().len(), 1);
}

#[test]
fn course_notification_carries_kind_message_and_sessions() {
    let store = InMemoryStore::from_dataset(faculty_dataset(
        vec![room(1, "Hall 1", 200), room(2, "Room 2", 150)],
        vec![course(1, "CSC 101", 300)],
    ))
    .unwrap();
    let config = SchedulingConfig::default();
    Scheduler::new(&store, &LogNotifier, &config).auto_schedule(1).unwrap();

    let notifier = RecordingNotifier::default();
    let stats = Scheduler::new(&store, &notifier, &config)
        .notify_course(1, NotificationKind::Change, Some("Moved to the afternoon."))
        .unwrap();
    assert_eq!(stats.successful, 1);

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::Change);
    assert_eq!(sent[0].subject, "Exam Schedule Changed - CSC 101 Examination");
    assert_eq!(sent[0].message, "Moved to the afternoon.");
    let venues: Vec<&str> = sent[0].details.iter().map(|d| d.venue.as_str()).collect();
    assert_eq!(venues, vec!["Hall 1", "Room 2"]);
}
