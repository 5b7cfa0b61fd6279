use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::SchedulingConfig;
use crate::data::{ClearReport, CourseId, EmailStats, RoomId, ScheduleReport, Session, TimetableId};
use crate::error::SchedulingError;
use crate::exam_calendar::{self, ExamCalendarEntry};
use crate::manual::ManualSessionRequest;
use crate::notify::{NotificationKind, Notifier};
use crate::scheduler::Scheduler;
use crate::store::ExamStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ExamStore>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Arc<SchedulingConfig>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ExamStore>,
        notifier: Arc<dyn Notifier>,
        config: SchedulingConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config: Arc::new(config),
        }
    }
}

/// Error response wrapper for handler failures.
pub struct ApiError(SchedulingError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SchedulingError::TimetableNotFound(_)
            | SchedulingError::CourseNotFound(_)
            | SchedulingError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            SchedulingError::RoomOccupied { .. }
            | SchedulingError::AlreadyPlaced { .. }
            | SchedulingError::CourseFullyScheduled(_) => StatusCode::CONFLICT,
            SchedulingError::Store(e) => {
                error!("Store failure: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        };
        (status, self.0.to_string()).into_response()
    }
}

/// Runs blocking scheduling work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, Response>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        error!("Scheduling task panicked: {e}");
        (StatusCode::INTERNAL_SERVER_ERROR, "scheduling task failed".to_string()).into_response()
    })
}

async fn auto_schedule_handler(
    State(state): State<AppState>,
    Path(timetable_id): Path<TimetableId>,
) -> Response {
    let result = blocking(move || {
        Scheduler::new(&*state.store, &*state.notifier, &state.config).auto_schedule(timetable_id)
    })
    .await;

    match result {
        Ok(Ok(report)) => Json(report).into_response(),
        Ok(Err(e)) if e.is_precondition() => {
            let status = match &e {
                SchedulingError::TimetableNotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            };
            (status, Json(ScheduleReport::from_error(&e))).into_response()
        }
        Ok(Err(e)) => ApiError(e).into_response(),
        Err(response) => response,
    }
}

async fn clear_schedule_handler(
    State(state): State<AppState>,
    Path(timetable_id): Path<TimetableId>,
) -> Result<Json<ClearReport>, Response> {
    blocking(move || {
        Scheduler::new(&*state.store, &*state.notifier, &state.config).clear_schedule(timetable_id)
    })
    .await?
    .map(Json)
    .map_err(|e| ApiError(e).into_response())
}

async fn calendar_handler(
    State(state): State<AppState>,
    Path(timetable_id): Path<TimetableId>,
) -> Result<Json<Vec<ExamCalendarEntry>>, Response> {
    blocking(move || {
        exam_calendar::exam_calendar(&*state.store, timetable_id, &state.config.time_labels)
    })
    .await?
    .map(Json)
    .map_err(|e| ApiError(e).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManualSessionBody {
    room_id: RoomId,
    date: chrono::NaiveDate,
    time_label: String,
    duration_minutes: Option<u32>,
}

async fn manual_session_handler(
    State(state): State<AppState>,
    Path(course_id): Path<CourseId>,
    Json(body): Json<ManualSessionBody>,
) -> Result<(StatusCode, Json<Session>), Response> {
    let request = ManualSessionRequest {
        course_id,
        room_id: body.room_id,
        date: body.date,
        time_label: body.time_label,
        duration_minutes: body.duration_minutes.unwrap_or(state.config.duration_minutes),
    };
    blocking(move || {
        Scheduler::new(&*state.store, &*state.notifier, &state.config).schedule_session(&request)
    })
    .await?
    .map(|session| (StatusCode::CREATED, Json(session)))
    .map_err(|e| ApiError(e).into_response())
}

#[derive(Debug, Deserialize)]
struct NotificationBody {
    #[serde(default = "default_kind")]
    kind: NotificationKind,
    message: Option<String>,
}

fn default_kind() -> NotificationKind {
    NotificationKind::Schedule
}

async fn notify_course_handler(
    State(state): State<AppState>,
    Path(course_id): Path<CourseId>,
    Json(body): Json<NotificationBody>,
) -> Result<Json<EmailStats>, Response> {
    blocking(move || {
        Scheduler::new(&*state.store, &*state.notifier, &state.config).notify_course(
            course_id,
            body.kind,
            body.message.as_deref(),
        )
    })
    .await?
    .map(Json)
    .map_err(|e| ApiError(e).into_response())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/timetables/:timetable_id/schedule",
            post(auto_schedule_handler).delete(clear_schedule_handler),
        )
        .route("/v1/timetables/:timetable_id/calendar", get(calendar_handler))
        .route("/v1/courses/:course_id/sessions", post(manual_session_handler))
        .route("/v1/courses/:course_id/notifications", post(notify_course_handler))
        .with_state(state)
}

pub async fn run_server(bind_address: &str, state: AppState) -> std::io::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind_address).await?;

    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await
}
