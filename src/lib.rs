//! Greedy exam scheduling: places the courses of a timetable into
//! (date, time-slot, room) sessions without double-booking any room.

pub mod availability;
pub mod calendar;
pub mod config;
pub mod data;
pub mod error;
pub mod exam_calendar;
pub mod manual;
pub mod notify;
pub mod packer;
pub mod scheduler;
pub mod server;
pub mod store;

pub use scheduler::Scheduler;
pub use store::{ExamStore, InMemoryStore};
