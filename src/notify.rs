use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::CourseId;
use crate::error::NotifyError;

/// Alert types the exam-alert system sends to students.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Schedule,
    Reminder,
    Change,
    Emergency,
}

impl NotificationKind {
    pub fn label(self) -> &'static str {
        match self {
            NotificationKind::Schedule => "Schedule Update",
            NotificationKind::Reminder => "Reminder",
            NotificationKind::Change => "Schedule Change",
            NotificationKind::Emergency => "Emergency",
        }
    }

    pub fn subject(self, course_title: &str) -> String {
        match self {
            NotificationKind::Schedule => format!("Exam Scheduled - {course_title}"),
            NotificationKind::Reminder => format!("Exam Reminder - {course_title}"),
            NotificationKind::Change => format!("Exam Schedule Changed - {course_title}"),
            NotificationKind::Emergency => format!("URGENT: Emergency Notice - {course_title}"),
        }
    }

    pub fn default_message(self, course_title: &str) -> String {
        match self {
            NotificationKind::Schedule => format!(
                "Your {course_title} exam has been scheduled. Please find the details below."
            ),
            NotificationKind::Reminder => format!(
                "This is a reminder about your upcoming {course_title} exam. Please review the details and prepare accordingly."
            ),
            NotificationKind::Change => format!(
                "Important: There has been a change to your {course_title} exam schedule. Please note the updated information below."
            ),
            NotificationKind::Emergency => format!(
                "URGENT: There is an important update regarding your {course_title} exam. Please read this notice carefully."
            ),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where and when one part of a course sits its exam.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDetail {
    pub date: String,
    pub time_label: String,
    pub venue: String,
    pub students_assigned: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub course_id: CourseId,
    pub course_code: String,
    pub course_title: String,
    pub faculty: String,
    pub kind: NotificationKind,
    pub subject: String,
    pub message: String,
    pub details: Vec<ExamDetail>,
}

impl NotificationRequest {
    pub fn new(
        kind: NotificationKind,
        course_id: CourseId,
        course_code: &str,
        course_title: &str,
        faculty: &str,
        details: Vec<ExamDetail>,
    ) -> Self {
        Self {
            course_id,
            course_code: course_code.to_string(),
            course_title: course_title.to_string(),
            faculty: faculty.to_string(),
            kind,
            subject: kind.subject(course_title),
            message: kind.default_message(course_title),
            details,
        }
    }

    /// Plain-text body sent to each recipient.
    pub fn render_text(&self) -> String {
        let mut text = format!("{}\n\n{}\n\nExam Details:\n", self.subject, self.message);
        text.push_str(&format!("- Course: {} ({})\n", self.course_title, self.course_code));
        text.push_str(&format!("- Faculty: {}\n", self.faculty));
        if self.details.is_empty() {
            text.push_str("- Date, time and venue: TBD\n");
        }
        for detail in &self.details {
            text.push_str(&format!(
                "- {} at {} in {} ({} students)\n",
                detail.date, detail.time_label, detail.venue, detail.students_assigned
            ));
        }
        text.push_str("\nPlease arrive at the venue at least 15 minutes before the exam time.\n");
        text
    }
}

/// Delivery counts for one notification request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub total: u32,
    pub successful: u32,
    pub failed: u32,
}

impl DeliveryReceipt {
    pub fn delivered(count: u32) -> Self {
        Self {
            total: count,
            successful: count,
            failed: 0,
        }
    }
}

/// Notification dispatch collaborator.
pub trait Notifier: Send + Sync {
    fn notify(&self, request: &NotificationRequest) -> Result<DeliveryReceipt, NotifyError>;
}

/// Writes rendered notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, request: &NotificationRequest) -> Result<DeliveryReceipt, NotifyError> {
        info!(
            "[{}] {} -> course {}\n{}",
            request.kind,
            request.subject,
            request.course_code,
            request.render_text()
        );
        Ok(DeliveryReceipt::delivered(1))
    }
}
