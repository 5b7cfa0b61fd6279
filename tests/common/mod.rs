#![allow(dead_code)]

use chrono::NaiveDate;
use std::sync::Mutex;

use exam_scheduler::data::{Course, CourseId, Dataset, Faculty, Room, Semester, Session, Timetable};
use exam_scheduler::error::NotifyError;
use exam_scheduler::notify::{DeliveryReceipt, NotificationRequest, Notifier};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 2025-01-13, a Monday.
pub fn monday() -> NaiveDate {
    date(2025, 1, 13)
}

pub fn room(id: u32, name: &str, capacity: u32) -> Room {
    Room {
        id,
        name: name.to_string(),
        faculty_id: 1,
        capacity,
    }
}

pub fn course(id: u32, code: &str, students: u32) -> Course {
    Course {
        id,
        timetable_id: 1,
        code: code.to_string(),
        title: format!("{code} Examination"),
        credit_units: 3,
        number_of_students: students,
        primary: None,
    }
}

pub fn timetable(id: u32, start: Option<NaiveDate>) -> Timetable {
    Timetable {
        id,
        name: format!("Timetable {id}"),
        session: "2024/2025".to_string(),
        semester: Semester::First,
        exam_start_date: start,
        faculty_id: 1,
    }
}

pub fn faculty_dataset(rooms: Vec<Room>, courses: Vec<Course>) -> Dataset {
    Dataset {
        faculties: vec![Faculty {
            id: 1,
            name: "Faculty of Science".to_string(),
        }],
        rooms,
        timetables: vec![timetable(1, Some(monday()))],
        courses,
        sessions: Vec::new(),
    }
}

/// Sessions of one course, one per (room, slot) pair listed.
pub fn occupying_sessions(course_id: CourseId, room_id: u32, slots: &[(NaiveDate, &str)]) -> Vec<Session> {
    slots
        .iter()
        .enumerate()
        .map(|(i, (date, label))| Session {
            id: i as u32 + 1,
            course_id,
            room_id,
            date: *date,
            time_label: label.to_string(),
            duration_minutes: 120,
            students_assigned: 1,
            session_number: i as u32 + 1,
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub notified: Mutex<Vec<CourseId>>,
    pub sent: Mutex<Vec<NotificationRequest>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, request: &NotificationRequest) -> Result<DeliveryReceipt, NotifyError> {
        self.notified.lock().unwrap().push(request.course_id);
        self.sent.lock().unwrap().push(request.clone());
        Ok(DeliveryReceipt::delivered(1))
    }
}

#[derive(Debug, Default)]
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _request: &NotificationRequest) -> Result<DeliveryReceipt, NotifyError> {
        Err(NotifyError::Delivery("SMTP connection refused".to_string()))
    }
}
