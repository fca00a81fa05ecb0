use crate::models::{Course, EventRow, NOT_AVAILABLE, RoutineEntry, RoutineRow, UserData, hhmm};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

const CLASS_LENGTH_MINUTES: i64 = 60;

/// A class is ongoing from its start time on `now`'s calendar day until one
/// hour later (exclusive).
pub fn is_ongoing(start: NaiveTime, now: NaiveDateTime) -> bool {
    let start_at = now.date().and_time(start);
    now >= start_at && now < start_at + Duration::minutes(CLASS_LENGTH_MINUTES)
}

pub fn parse_day(value: &str) -> Option<Weekday> {
    value.trim().parse().ok()
}

pub fn parse_time(value: &str) -> Option<NaiveTime> {
    hhmm::parse(value)
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Display name and teacher for a course id, with placeholders for gaps.
pub fn course_labels(course: Option<&Course>) -> (String, String) {
    match course {
        Some(course) => {
            let teacher = course.teacher.trim();
            let teacher = if teacher.is_empty() { NOT_AVAILABLE } else { teacher };
            (course.name.clone(), teacher.to_string())
        }
        None => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
    }
}

pub fn routine_row(user: &UserData, entry: &RoutineEntry, now: NaiveDateTime) -> RoutineRow {
    let (course_name, course_teacher) = course_labels(user.course(&entry.course_id));
    RoutineRow {
        id: entry.id.clone(),
        day: entry.day,
        time: entry.time,
        course_id: entry.course_id.clone(),
        course_name,
        course_teacher,
        ongoing: is_ongoing(entry.time, now),
    }
}

/// Routine entries joined with their course, ordered by time of day. Entries
/// at the same time keep insertion order.
pub fn routine_rows(user: &UserData, now: NaiveDateTime) -> Vec<RoutineRow> {
    let mut rows: Vec<RoutineRow> = user
        .routine
        .iter()
        .map(|entry| routine_row(user, entry, now))
        .collect();
    rows.sort_by_key(|row| row.time);
    rows
}

pub fn event_rows(user: &UserData) -> Vec<EventRow> {
    let mut rows: Vec<EventRow> = user
        .events
        .iter()
        .map(|event| EventRow {
            id: event.id.clone(),
            name: event.name.clone(),
            date: event.date,
            time: event.time.clone(),
            kind: event.kind.clone(),
            course_name: event
                .course_id
                .as_deref()
                .and_then(|id| user.course(id))
                .map(|course| course.name.clone())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        })
        .collect();
    rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.time.cmp(&b.time)));
    rows
}
