//! Attendance status transitions and the missed-class aggregates they drive.
//!
//! Every mark goes through [`mark_status`], which upserts the attendance record
//! and applies the same delta to the course count, the teacher count, and the
//! total published to the leaderboard. Callers stage the whole transition on a
//! copy of the document and persist it in one write.

use crate::errors::AppError;
use crate::models::{
    AppData, AttendanceRecord, GroupData, LeaderboardEntry, Mark, MarkOutcome, NOT_AVAILABLE,
    Profile, RoutineEntry, Status, UserData,
};
use crate::stats::total_missed;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use tracing::warn;

/// Deterministic key of the record for one routine entry on one date.
pub fn record_key(routine_id: &str, date: NaiveDate) -> String {
    format!("{routine_id}-{date}")
}

pub fn transition_delta(old: Status, new: Mark) -> i64 {
    match (old, new) {
        (Status::Missed, Mark::Missed) => 0,
        (_, Mark::Missed) => 1,
        (Status::Missed, Mark::Attended) => -1,
        (_, Mark::Attended) => 0,
    }
}

/// Counts are clamped at zero, even when the stored value is already negative.
pub fn apply_delta(count: i64, delta: i64) -> i64 {
    count.saturating_add(delta).max(0)
}

pub fn current_status(user: &UserData, routine_id: &str, date: NaiveDate) -> Status {
    user.attendance
        .get(&record_key(routine_id, date))
        .map(|record| record.status)
        .unwrap_or_default()
}

/// Teacher of the entry's course, or the placeholder when unknown or blank.
pub fn teacher_for(user: &UserData, entry: &RoutineEntry) -> String {
    user.course(&entry.course_id)
        .map(|course| course.teacher.trim())
        .filter(|teacher| !teacher.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

pub fn mark_status(
    user: &mut UserData,
    entry: &RoutineEntry,
    date: NaiveDate,
    mark: Mark,
    now: DateTime<Utc>,
) -> MarkOutcome {
    let key = record_key(&entry.id, date);
    let previous = user.attendance.get(&key);
    let old = previous.map(|record| record.status).unwrap_or_default();
    let delta = transition_delta(old, mark);

    // A missed record stays counted under the teacher it was counted for, so
    // a course edit in between cannot move the decrement elsewhere.
    let teacher = match previous {
        Some(record) if old == Status::Missed => record.teacher.clone(),
        _ => teacher_for(user, entry),
    };

    let course_count = bump(&mut user.missed_by_course, &entry.course_id, delta);
    let teacher_count = bump(&mut user.missed_by_teacher, &teacher, delta);

    let status = Status::from(mark);
    user.attendance.insert(
        key,
        AttendanceRecord {
            routine_id: entry.id.clone(),
            date,
            course_id: entry.course_id.clone(),
            teacher,
            status,
            updated_at: now,
        },
    );

    MarkOutcome {
        status,
        course_count,
        teacher_count,
        total_missed: total_missed(&user.missed_by_course),
    }
}

fn bump(counts: &mut BTreeMap<String, i64>, key: &str, delta: i64) -> i64 {
    let slot = counts.entry(key.to_string()).or_insert(0);
    *slot = apply_delta(*slot, delta);
    *slot
}

/// Full transition for one user: record, both aggregates, and the leaderboard
/// entry of the user's group.
pub fn record_transition(
    data: &mut AppData,
    user_id: &str,
    routine_id: &str,
    date: NaiveDate,
    mark: Mark,
    now: DateTime<Utc>,
) -> Result<MarkOutcome, AppError> {
    let user = data
        .users
        .get_mut(user_id)
        .ok_or_else(|| AppError::not_found("unknown routine entry"))?;
    let profile = user
        .profile
        .clone()
        .ok_or_else(|| AppError::bad_request("save your student profile before marking classes"))?;
    let entry = user
        .routine_entry(routine_id)
        .cloned()
        .ok_or_else(|| AppError::not_found("unknown routine entry"))?;

    let outcome = mark_status(user, &entry, date, mark, now);
    upsert_leaderboard(&mut data.groups, user_id, &profile, outcome.total_missed);
    Ok(outcome)
}

pub fn upsert_leaderboard(
    groups: &mut BTreeMap<String, GroupData>,
    user_id: &str,
    profile: &Profile,
    total_missed: i64,
) {
    let group = groups.entry(profile.group_key()).or_default();
    group.leaderboard.insert(
        user_id.to_string(),
        LeaderboardEntry {
            user_id: user_id.to_string(),
            display_name: profile.display_name.clone(),
            roll_number: profile.roll_number.clone(),
            department: profile.department.clone(),
            section: profile.section.clone(),
            total_missed,
        },
    );
}

/// Course and teacher counts recomputed from the attendance records.
pub fn rebuild_aggregates(user: &UserData) -> (BTreeMap<String, i64>, BTreeMap<String, i64>) {
    let mut by_course = BTreeMap::new();
    let mut by_teacher = BTreeMap::new();
    for record in user.attendance.values() {
        if record.status != Status::Missed {
            continue;
        }
        *by_course.entry(record.course_id.clone()).or_insert(0) += 1;
        *by_teacher.entry(record.teacher.clone()).or_insert(0) += 1;
    }
    (by_course, by_teacher)
}

fn nonzero(counts: &BTreeMap<String, i64>) -> BTreeMap<&str, i64> {
    counts
        .iter()
        .filter(|(_, count)| **count != 0)
        .map(|(key, count)| (key.as_str(), *count))
        .collect()
}

/// Brings every stored aggregate and leaderboard total back in line with the
/// attendance records. Returns how many user documents and leaderboard
/// entries it rewrote.
pub fn reconcile(data: &mut AppData) -> usize {
    let mut corrected = 0;
    let mut totals = Vec::new();

    for (user_id, user) in data.users.iter_mut() {
        let (by_course, by_teacher) = rebuild_aggregates(user);
        if nonzero(&by_course) != nonzero(&user.missed_by_course)
            || nonzero(&by_teacher) != nonzero(&user.missed_by_teacher)
        {
            warn!(user = %user_id, "missed-class aggregates drifted from records; rebuilding");
            user.missed_by_course = by_course;
            user.missed_by_teacher = by_teacher;
            corrected += 1;
        }
        if let Some(profile) = &user.profile {
            totals.push((user_id.clone(), profile.clone(), total_missed(&user.missed_by_course)));
        }
    }

    for (user_id, profile, total) in totals {
        let stale = data
            .groups
            .get(&profile.group_key())
            .and_then(|group| group.leaderboard.get(&user_id))
            .is_some_and(|entry| entry.total_missed != total);
        if stale {
            warn!(user = %user_id, total, "leaderboard total drifted; rewriting");
            upsert_leaderboard(&mut data.groups, &user_id, &profile, total);
            corrected += 1;
        }
    }

    corrected
}
