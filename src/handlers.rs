use crate::attendance::{current_status, record_transition, upsert_leaderboard};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::import::{import_routine as import_entries, new_id, upsert_course};
use crate::models::{
    Aggregates, Course, CourseRequest, Dashboard, Event, EventRequest, EventRow, ImportReport,
    LeaderboardEntry, Mark, MarkOutcome, MarkRequest, Notice, NoticeRequest, Profile,
    ProfileRequest, RoutineEntry, RoutineRequest, RoutineRow, StatusResponse, SummaryResponse,
    WatchQuery,
};
use crate::schedule::{event_rows, parse_date, parse_day, parse_time, routine_row};
use crate::state::{AppState, newest_first};
use crate::stats::{build_summary, group_leaderboard, total_missed};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Local, Utc};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

const DEFAULT_WATCH_TIMEOUT_MS: u64 = 25_000;
const MAX_WATCH_TIMEOUT_MS: u64 = 60_000;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Profile>, AppError> {
    let snapshot = state.snapshot();
    snapshot
        .data
        .users
        .get(&user_id)
        .and_then(|user| user.profile.clone())
        .map(Json)
        .ok_or_else(|| AppError::not_found("no profile saved yet"))
}

pub async fn put_profile(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<ProfileRequest>,
) -> Result<Json<Profile>, AppError> {
    let roll_number = required(&payload.roll_number, "roll_number")?;
    let profile = Profile {
        display_name: payload
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&roll_number)
            .to_string(),
        department: required(&payload.department, "department")?,
        section: required(&payload.section, "section")?,
        is_cr: payload.is_cr,
        roll_number,
    };

    let saved = state
        .commit(|data| {
            let user = data.users.entry(user_id.clone()).or_default();
            let previous = user.profile.replace(profile.clone());
            let total = total_missed(&user.missed_by_course);

            // The leaderboard entry follows the profile into its current group.
            let listed = previous.is_some_and(|old| {
                data.groups
                    .get_mut(&old.group_key())
                    .and_then(|group| group.leaderboard.remove(&user_id))
                    .is_some()
            });
            if listed {
                upsert_leaderboard(&mut data.groups, &user_id, &profile, total);
            }
            Ok(profile.clone())
        })
        .await?;

    info!(user = %user_id, group = %saved.group_key(), "profile saved");
    Ok(Json(saved))
}

pub async fn list_courses(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Json<Vec<Course>> {
    let (_, courses) = state.subscribe_courses(&user_id).latest();
    Json(courses)
}

pub async fn add_course(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<CourseRequest>,
) -> Result<(StatusCode, Json<Course>), AppError> {
    let name = required(&payload.name, "name")?;
    let course = Course {
        id: name.clone(),
        name,
        teacher: optional(payload.teacher.as_deref()).unwrap_or_default(),
    };

    let saved = state
        .commit(|data| {
            upsert_course(data.users.entry(user_id.clone()).or_default(), course.clone());
            Ok(course)
        })
        .await?;

    info!(user = %user_id, course = %saved.id, "course saved");
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn edit_course(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(course_id): Path<String>,
    Json(payload): Json<CourseRequest>,
) -> Result<Json<Course>, AppError> {
    let name = required(&payload.name, "name")?;
    let teacher = optional(payload.teacher.as_deref()).unwrap_or_default();

    let saved = state
        .commit(|data| {
            let course = data
                .users
                .get_mut(&user_id)
                .and_then(|user| user.courses.iter_mut().find(|course| course.id == course_id))
                .ok_or_else(|| AppError::not_found("unknown course"))?;
            course.name = name;
            course.teacher = teacher;
            Ok(course.clone())
        })
        .await?;

    Ok(Json(saved))
}

pub async fn delete_course(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(course_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let removed_entries = state
        .commit(|data| {
            let user = data
                .users
                .get_mut(&user_id)
                .filter(|user| user.course(&course_id).is_some())
                .ok_or_else(|| AppError::not_found("unknown course"))?;
            user.courses.retain(|course| course.id != course_id);
            let before = user.routine.len();
            user.routine.retain(|entry| entry.course_id != course_id);
            Ok(before - user.routine.len())
        })
        .await?;

    info!(user = %user_id, course = %course_id, removed_entries, "course deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_routine(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Json<Vec<RoutineRow>> {
    let (_, rows) = state.subscribe_routine(&user_id).latest();
    Json(rows)
}

pub async fn add_routine(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<RoutineRequest>,
) -> Result<(StatusCode, Json<RoutineRow>), AppError> {
    let day = parse_day(&payload.day).ok_or_else(|| AppError::bad_request("day must be a weekday name"))?;
    let time = parse_time(&payload.time).ok_or_else(|| AppError::bad_request("time must be HH:MM"))?;
    let course_id = required(&payload.course_id, "course_id")?;
    let entry = RoutineEntry {
        id: new_id(),
        day,
        time,
        course_id,
    };

    let row = state
        .commit(|data| {
            let user = data.users.entry(user_id.clone()).or_default();
            if user.course(&entry.course_id).is_none() {
                return Err(AppError::bad_request("course_id does not name a saved course"));
            }
            user.routine.push(entry.clone());
            Ok(routine_row(user, &entry, Local::now().naive_local()))
        })
        .await?;

    info!(user = %user_id, routine = %row.id, "routine entry added");
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn delete_routine(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(routine_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .commit(|data| {
            let user = data
                .users
                .get_mut(&user_id)
                .filter(|user| user.routine_entry(&routine_id).is_some())
                .ok_or_else(|| AppError::not_found("unknown routine entry"))?;
            user.routine.retain(|entry| entry.id != routine_id);
            Ok(())
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn import_routine(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<Value>,
) -> Result<Json<ImportReport>, AppError> {
    let report = state
        .commit(|data| import_entries(data.users.entry(user_id.clone()).or_default(), &payload))
        .await?;

    info!(
        user = %user_id,
        imported = report.imported,
        skipped = report.skipped,
        "routine imported"
    );
    Ok(Json(report))
}

pub async fn get_attendance(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path((routine_id, date)): Path<(String, String)>,
) -> Result<Json<StatusResponse>, AppError> {
    let date = parse_date(&date).ok_or_else(|| AppError::bad_request("date must be YYYY-MM-DD"))?;
    let snapshot = state.snapshot();
    let user = snapshot
        .data
        .users
        .get(&user_id)
        .filter(|user| user.routine_entry(&routine_id).is_some())
        .ok_or_else(|| AppError::not_found("unknown routine entry"))?;

    Ok(Json(StatusResponse {
        status: current_status(user, &routine_id, date),
        routine_id,
        date,
    }))
}

pub async fn mark_attendance(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<MarkRequest>,
) -> Result<Json<MarkOutcome>, AppError> {
    let routine_id = required(&payload.routine_id, "routine_id")?;
    let mark: Mark = payload.status.parse().map_err(AppError::bad_request)?;
    let date = parse_date(&payload.date).ok_or_else(|| AppError::bad_request("date must be YYYY-MM-DD"))?;

    let outcome = state
        .commit(|data| record_transition(data, &user_id, &routine_id, date, mark, Utc::now()))
        .await?;

    info!(
        user = %user_id,
        routine = %routine_id,
        %date,
        status = ?outcome.status,
        total_missed = outcome.total_missed,
        "class marked"
    );
    Ok(Json(outcome))
}

pub async fn get_aggregates(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Json<Aggregates> {
    let (_, aggregates) = state.subscribe_aggregates(&user_id).latest();
    Json(aggregates)
}

pub async fn get_summary(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Json<SummaryResponse> {
    let snapshot = state.snapshot();
    let user = snapshot.data.users.get(&user_id).cloned().unwrap_or_default();
    let group = user
        .profile
        .as_ref()
        .and_then(|profile| snapshot.data.groups.get(&profile.group_key()));
    Json(build_summary(&user_id, &user, group))
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Json<Vec<LeaderboardEntry>> {
    let snapshot = state.snapshot();
    let group = snapshot
        .data
        .users
        .get(&user_id)
        .and_then(|user| user.profile.as_ref())
        .map(Profile::group_key);

    match group {
        Some(group) => Json(state.subscribe_leaderboard(&group).latest().1),
        None => Json(group_leaderboard(None)),
    }
}

pub async fn list_events(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Json<Vec<EventRow>> {
    let snapshot = state.snapshot();
    Json(snapshot.data.users.get(&user_id).map(event_rows).unwrap_or_default())
}

pub async fn add_event(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<EventRequest>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let event = Event {
        id: new_id(),
        name: required(&payload.name, "name")?,
        date: parse_date(&payload.date).ok_or_else(|| AppError::bad_request("date must be YYYY-MM-DD"))?,
        time: optional(payload.time.as_deref()),
        kind: required(&payload.kind, "type")?,
        course_id: optional(payload.course_id.as_deref()),
    };

    let saved = state
        .commit(|data| {
            data.users.entry(user_id.clone()).or_default().events.push(event.clone());
            Ok(event)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn list_notices(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Json<Vec<Notice>> {
    let snapshot = state.snapshot();
    let notices = snapshot
        .data
        .users
        .get(&user_id)
        .and_then(|user| user.profile.as_ref())
        .and_then(|profile| snapshot.data.groups.get(&profile.group_key()))
        .map(|group| newest_first(&group.notices))
        .unwrap_or_default();
    Json(notices)
}

pub async fn add_notice(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<NoticeRequest>,
) -> Result<(StatusCode, Json<Notice>), AppError> {
    let title = required(&payload.title, "title")?;
    let content = required(&payload.content, "content")?;

    let notice = state
        .commit(|data| {
            let profile = data
                .users
                .get(&user_id)
                .and_then(|user| user.profile.clone())
                .ok_or_else(|| AppError::bad_request("save your student profile first"))?;
            if !profile.is_cr {
                return Err(AppError::forbidden("only class representatives can publish notices"));
            }
            let notice = Notice {
                id: new_id(),
                title,
                content,
                author: profile.display_name.clone(),
                posted_at: Utc::now(),
            };
            data.groups
                .entry(profile.group_key())
                .or_default()
                .notices
                .push(notice.clone());
            Ok(notice)
        })
        .await?;

    info!(user = %user_id, notice = %notice.id, "notice published");
    Ok((StatusCode::CREATED, Json(notice)))
}

/// Long-poll: answers as soon as a revision newer than `after` exists, or with
/// the current dashboard when the timeout passes.
pub async fn watch(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<WatchQuery>,
) -> Json<Dashboard> {
    let timeout = Duration::from_millis(
        query
            .timeout_ms
            .unwrap_or(DEFAULT_WATCH_TIMEOUT_MS)
            .min(MAX_WATCH_TIMEOUT_MS),
    );
    let mut subscription = state.subscribe_dashboard(&user_id);
    let (mut revision, mut dashboard) = subscription.latest();

    // A client ahead of the counter predates a restart and gets the current view.
    if revision == query.after {
        if let Ok(Some(next)) = tokio::time::timeout(timeout, subscription.next()).await {
            (revision, dashboard) = next;
        }
    }

    dashboard.revision = revision;
    Json(dashboard)
}

fn required(value: &str, field: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::bad_request(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
