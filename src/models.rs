use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder shown wherever a referenced course or teacher is unknown.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Unset,
    Attended,
    Missed,
}

/// A status the user can actively choose for a class occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    Attended,
    Missed,
}

impl std::str::FromStr for Mark {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "attended" => Ok(Mark::Attended),
            "missed" => Ok(Mark::Missed),
            other => Err(format!("status must be 'attended' or 'missed', got '{other}'")),
        }
    }
}

impl From<Mark> for Status {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::Attended => Status::Attended,
            Mark::Missed => Status::Missed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Course {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub teacher: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoutineEntry {
    pub id: String,
    pub day: Weekday,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub course_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub routine_id: String,
    pub date: NaiveDate,
    pub course_id: String,
    /// Teacher key this record is counted under in the teacher aggregate.
    pub teacher: String,
    pub status: Status,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub display_name: String,
    pub roll_number: String,
    pub department: String,
    pub section: String,
    #[serde(default)]
    pub is_cr: bool,
}

impl Profile {
    pub fn group_key(&self) -> String {
        group_key(&self.department, &self.section)
    }
}

pub fn group_key(department: &str, section: &str) -> String {
    format!("{department}_{section}")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub course_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub display_name: String,
    pub roll_number: String,
    pub department: String,
    pub section: String,
    pub total_missed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserData {
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub routine: Vec<RoutineEntry>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub attendance: BTreeMap<String, AttendanceRecord>,
    #[serde(default)]
    pub missed_by_course: BTreeMap<String, i64>,
    #[serde(default)]
    pub missed_by_teacher: BTreeMap<String, i64>,
}

impl UserData {
    pub fn course(&self, id: &str) -> Option<&Course> {
        self.courses.iter().find(|course| course.id == id)
    }

    pub fn routine_entry(&self, id: &str) -> Option<&RoutineEntry> {
        self.routine.iter().find(|entry| entry.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GroupData {
    #[serde(default)]
    pub notices: Vec<Notice>,
    #[serde(default)]
    pub leaderboard: BTreeMap<String, LeaderboardEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppData {
    #[serde(default)]
    pub users: BTreeMap<String, UserData>,
    #[serde(default)]
    pub groups: BTreeMap<String, GroupData>,
}

// Requests

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub roll_number: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub is_cr: bool,
}

#[derive(Debug, Deserialize)]
pub struct CourseRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub teacher: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoutineRequest {
    #[serde(default)]
    pub day: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub course_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MarkRequest {
    #[serde(default)]
    pub routine_id: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub course_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NoticeRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct WatchQuery {
    #[serde(default)]
    pub after: u64,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

// Responses

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkOutcome {
    pub status: Status,
    pub course_count: i64,
    pub teacher_count: i64,
    pub total_missed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub routine_id: String,
    pub date: NaiveDate,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoutineRow {
    pub id: String,
    pub day: Weekday,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub course_id: String,
    pub course_name: String,
    pub course_teacher: String,
    pub ongoing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Aggregates {
    pub by_course: BTreeMap<String, i64>,
    pub by_teacher: BTreeMap<String, i64>,
    pub total_missed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseMissed {
    pub course_id: String,
    pub course_name: String,
    pub missed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub display_name: String,
    pub roll_number: String,
    pub total_missed: i64,
    pub is_me: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryResponse {
    pub total_missed: i64,
    pub by_course: Vec<CourseMissed>,
    pub by_teacher: BTreeMap<String, i64>,
    pub leaderboard: Vec<LeaderboardRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRow {
    pub id: String,
    pub name: String,
    pub date: NaiveDate,
    pub time: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub course_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub courses_created: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dashboard {
    pub revision: u64,
    pub courses: Vec<Course>,
    pub routine: Vec<RoutineRow>,
    pub events: Vec<EventRow>,
    pub aggregates: Aggregates,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub notices: Vec<Notice>,
}

/// `HH:MM` wire format for times of day.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(value: &str) -> Option<NaiveTime> {
        let value = value.trim();
        NaiveTime::parse_from_str(value, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
            .ok()
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time of day: {raw}")))
    }
}
