use itertools::Itertools;
use log::{debug, info, warn};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::PoisonError;
use std::time::Instant;

use crate::availability::AvailabilityChecker;
use crate::calendar::SlotCalendar;
use crate::config::SchedulingConfig;
use crate::data::{
    ClearReport, Course, CourseId, EmailStats, RoomId, ScheduleReport, Session, Timetable,
    TimetableId,
};
use crate::error::SchedulingError;
use crate::manual::{self, ManualSessionRequest};
use crate::notify::{ExamDetail, NotificationKind, NotificationRequest, Notifier};
use crate::packer::{self, RoomPool};
use crate::store::ExamStore;

/// Drives scheduling operations for timetables against a store.
pub struct Scheduler<'a, S: ExamStore + ?Sized, N: Notifier + ?Sized> {
    store: &'a S,
    notifier: &'a N,
    config: &'a SchedulingConfig,
}

/// What a pass placed, handed to the notification step after the
/// faculty lock is released.
struct PassOutcome {
    faculty: String,
    venues: HashMap<RoomId, String>,
    scheduled: Vec<(Course, Vec<Session>)>,
    conflicts: Vec<String>,
}

impl ScheduleReport {
    /// Report for a pass that stopped before scheduling anything.
    pub fn from_error(error: &SchedulingError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            conflicts: Vec::new(),
            scheduled_count: 0,
            email_stats: EmailStats::default(),
        }
    }
}

pub fn summary(scheduled: u32, conflicts: usize, stats: &EmailStats) -> String {
    format!(
        "Scheduled {} course(s) with {} conflict(s). Notifications: {} of {} sent, {} failed.",
        scheduled, conflicts, stats.successful, stats.total, stats.failed
    )
}

impl<'a, S: ExamStore + ?Sized, N: Notifier + ?Sized> Scheduler<'a, S, N> {
    pub fn new(store: &'a S, notifier: &'a N, config: &'a SchedulingConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Places every unscheduled course of the timetable, largest first.
    ///
    /// Courses that already have a session are left alone, so rerunning is
    /// harmless. Sessions are persisted one by one as they are accepted; a
    /// store failure aborts the pass without undoing earlier writes.
    pub fn auto_schedule(&self, timetable_id: TimetableId) -> Result<ScheduleReport, SchedulingError> {
        let start_time = Instant::now();
        let timetable = self.timetable(timetable_id)?;
        let outcome = {
            let lock = self.store.faculty_lock(timetable.faculty_id);
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.place_courses(&timetable)?
        };

        let PassOutcome {
            faculty,
            venues,
            scheduled,
            mut conflicts,
        } = outcome;

        let email_stats = self.notify_scheduled(&faculty, &venues, &scheduled);
        if email_stats.failed > 0 {
            conflicts.push(format!(
                "{} of {} notification(s) failed to send",
                email_stats.failed, email_stats.total
            ));
        }

        let scheduled_count = scheduled.len() as u32;
        let message = summary(scheduled_count, conflicts.len(), &email_stats);
        info!("Timetable {timetable_id}: {message} ({:.2?})", start_time.elapsed());

        Ok(ScheduleReport {
            success: scheduled_count > 0,
            message,
            conflicts,
            scheduled_count,
            email_stats,
        })
    }

    fn timetable(&self, timetable_id: TimetableId) -> Result<Timetable, SchedulingError> {
        self.store
            .timetable(timetable_id)?
            .ok_or(SchedulingError::TimetableNotFound(timetable_id))
    }

    fn place_courses(&self, timetable: &Timetable) -> Result<PassOutcome, SchedulingError> {
        let start_date = timetable
            .exam_start_date
            .ok_or_else(|| SchedulingError::MissingExamStartDate(timetable.name.clone()))?;

        let pool = RoomPool::new(self.store.list_rooms(timetable.faculty_id)?);
        if pool.is_empty() {
            return Err(SchedulingError::NoRooms(timetable.faculty_id));
        }

        let courses: Vec<Course> = self
            .store
            .list_unscheduled_courses(timetable.id)?
            .into_iter()
            .sorted_by(|a, b| {
                Reverse(a.number_of_students)
                    .cmp(&Reverse(b.number_of_students))
                    .then_with(|| a.code.cmp(&b.code))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .collect();
        if courses.is_empty() {
            return Err(SchedulingError::NoUnscheduledCourses(timetable.name.clone()));
        }

        info!(
            "Auto-scheduling {} course(s) of '{}' into {} room(s) from {}",
            courses.len(),
            timetable.name,
            pool.rooms().len(),
            start_date
        );

        let calendar = SlotCalendar::new(start_date, &self.config.time_labels, self.config.max_dates);
        let mut checker = AvailabilityChecker::new(self.store);
        let mut scheduled = Vec::new();
        let mut conflicts = Vec::new();

        for course in courses {
            let packed = packer::pack_course(
                &course,
                &pool,
                &calendar,
                &mut checker,
                self.config.duration_minutes,
            )?;

            if packed.sessions.is_empty() {
                warn!("{} could not be placed at all", course.code);
                conflicts.push(
                    packed
                        .conflict
                        .unwrap_or_else(|| format!("{}: no session could be placed", course.code)),
                );
                continue;
            }

            let mut sessions = Vec::with_capacity(packed.sessions.len());
            for new_session in &packed.sessions {
                sessions.push(self.store.create_session(new_session)?);
            }
            self.store.update_course(course.id, packed.sessions[0].primary())?;

            if let Some(conflict) = packed.conflict {
                warn!("{conflict}");
                conflicts.push(conflict);
            }
            scheduled.push((course, sessions));
        }
        debug!("Pass committed {} room slot(s)", checker.committed_count());

        let faculty = self
            .store
            .faculty(timetable.faculty_id)?
            .map(|f| f.name)
            .unwrap_or_default();
        let venues = pool.rooms().iter().map(|r| (r.id, r.name.clone())).collect();

        Ok(PassOutcome {
            faculty,
            venues,
            scheduled,
            conflicts,
        })
    }

    fn notify_scheduled(
        &self,
        faculty: &str,
        venues: &HashMap<RoomId, String>,
        scheduled: &[(Course, Vec<Session>)],
    ) -> EmailStats {
        let mut stats = EmailStats::default();
        for (course, sessions) in scheduled {
            let request = NotificationRequest::new(
                NotificationKind::Schedule,
                course.id,
                &course.code,
                &course.title,
                faculty,
                exam_details(sessions, venues),
            );
            self.send(&request, &mut stats);
        }
        stats
    }

    fn send(&self, request: &NotificationRequest, stats: &mut EmailStats) {
        match self.notifier.notify(request) {
            Ok(receipt) => {
                stats.total += receipt.total;
                stats.successful += receipt.successful;
                stats.failed += receipt.failed;
            }
            Err(e) => {
                warn!("Notification for {} failed: {e}", request.course_code);
                stats.total += 1;
                stats.failed += 1;
            }
        }
    }

    /// Sends one alert about a course's current sessions. A blank custom
    /// message falls back to the kind's template.
    pub fn notify_course(
        &self,
        course_id: CourseId,
        kind: NotificationKind,
        custom_message: Option<&str>,
    ) -> Result<EmailStats, SchedulingError> {
        let course = self
            .store
            .course(course_id)?
            .ok_or(SchedulingError::CourseNotFound(course_id))?;
        let timetable = self.timetable(course.timetable_id)?;
        let faculty = self
            .store
            .faculty(timetable.faculty_id)?
            .map(|f| f.name)
            .unwrap_or_default();

        let sessions = self.store.list_sessions(course.id)?;
        let mut venues = HashMap::new();
        for session in &sessions {
            if !venues.contains_key(&session.room_id) {
                if let Some(room) = self.store.room(session.room_id)? {
                    venues.insert(room.id, room.name);
                }
            }
        }

        let mut request = NotificationRequest::new(
            kind,
            course.id,
            &course.code,
            &course.title,
            &faculty,
            exam_details(&sessions, &venues),
        );
        if let Some(message) = custom_message.map(str::trim).filter(|m| !m.is_empty()) {
            request.message = message.to_string();
        }

        let mut stats = EmailStats::default();
        self.send(&request, &mut stats);
        info!(
            "{} notification for {}: {} of {} sent",
            kind, course.code, stats.successful, stats.total
        );
        Ok(stats)
    }

    /// Deletes every session of the timetable and resets the courses'
    /// primary fields, returning them all to unscheduled.
    pub fn clear_schedule(&self, timetable_id: TimetableId) -> Result<ClearReport, SchedulingError> {
        let timetable = self.timetable(timetable_id)?;
        let lock = self.store.faculty_lock(timetable.faculty_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let course_ids: Vec<_> = self
            .store
            .list_courses(timetable_id)?
            .into_iter()
            .map(|c| c.id)
            .collect();
        let sessions_deleted = self.store.reset_courses(&course_ids)?;

        info!(
            "Cleared {} session(s) across {} course(s) of timetable {}",
            sessions_deleted,
            course_ids.len(),
            timetable_id
        );
        Ok(ClearReport {
            timetable_id,
            courses_cleared: course_ids.len() as u32,
            sessions_deleted: sessions_deleted as u32,
        })
    }

    pub fn schedule_session(&self, request: &ManualSessionRequest) -> Result<Session, SchedulingError> {
        manual::schedule_session(self.store, request)
    }
}

fn exam_details(sessions: &[Session], venues: &HashMap<RoomId, String>) -> Vec<ExamDetail> {
    sessions
        .iter()
        .map(|s| ExamDetail {
            date: s.date.to_string(),
            time_label: s.time_label.clone(),
            venue: venues
                .get(&s.room_id)
                .cloned()
                .unwrap_or_else(|| format!("Room {}", s.room_id)),
            students_assigned: s.students_assigned,
        })
        .collect()
}
