use crate::errors::AppError;
use crate::models::{Course, ImportReport, RoutineEntry, UserData};
use crate::schedule::{parse_day, parse_time};
use serde_json::Value;
use uuid::Uuid;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Imports `{courseName, day, time, courseTeacher?}` records. Courses are
/// matched by exact name, then by id (a renamed course keeps its old name as
/// id), and created when missing; entries that lack a field or carry an
/// unreadable day/time are skipped.
pub fn import_routine(user: &mut UserData, payload: &Value) -> Result<ImportReport, AppError> {
    let items = payload
        .as_array()
        .ok_or_else(|| AppError::bad_request("import payload must be a JSON array"))?;

    let mut report = ImportReport {
        imported: 0,
        skipped: 0,
        courses_created: 0,
    };

    for item in items {
        let field = |key: &str| {
            item.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let (Some(course_name), Some(day), Some(time)) = (field("courseName"), field("day"), field("time"))
        else {
            report.skipped += 1;
            continue;
        };
        let (Some(day), Some(time)) = (parse_day(day), parse_time(time)) else {
            report.skipped += 1;
            continue;
        };

        let existing = user
            .courses
            .iter()
            .find(|course| course.name == course_name)
            .or_else(|| user.courses.iter().find(|course| course.id == course_name));
        let course_id = match existing {
            Some(course) => course.id.clone(),
            None => {
                let course = Course {
                    id: course_name.to_string(),
                    name: course_name.to_string(),
                    teacher: field("courseTeacher").unwrap_or_default().to_string(),
                };
                let id = course.id.clone();
                upsert_course(user, course);
                report.courses_created += 1;
                id
            }
        };

        user.routine.push(RoutineEntry {
            id: new_id(),
            day,
            time,
            course_id,
        });
        report.imported += 1;
    }

    Ok(report)
}

/// Inserts the course, replacing one with the same id.
pub fn upsert_course(user: &mut UserData, course: Course) {
    match user.courses.iter_mut().find(|existing| existing.id == course.id) {
        Some(existing) => *existing = course,
        None => user.courses.push(course),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use serde_json::json;

    #[test]
    fn rejects_non_array_payload() {
        let mut user = UserData::default();
        let err = import_routine(&mut user, &json!({ "courseName": "Math" })).unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
        assert!(user.courses.is_empty());
    }

    #[test]
    fn creates_courses_once_and_skips_malformed() {
        let mut user = UserData::default();
        let payload = json!([
            { "courseName": "Math", "day": "Monday", "time": "10:00", "courseTeacher": "Prof. Rahman" },
            { "courseName": "Math", "day": "Wednesday", "time": "10:00" },
            { "courseName": "Physics", "day": "Tuesday" },
            { "day": "Tuesday", "time": "09:00" },
            { "courseName": "Chemistry", "day": "Funday", "time": "09:00" },
            "not an object"
        ]);

        let report = import_routine(&mut user, &payload).unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(report.skipped, 4);
        assert_eq!(report.courses_created, 1);
        assert_eq!(user.courses.len(), 1);
        assert_eq!(user.courses[0].teacher, "Prof. Rahman");
        assert_eq!(user.routine[1].day, Weekday::Wed);
        assert!(user.routine.iter().all(|entry| entry.course_id == "Math"));
    }

    #[test]
    fn reuses_existing_course_by_exact_name() {
        let mut user = UserData::default();
        user.courses.push(Course {
            id: "c-1".to_string(),
            name: "Biology 101".to_string(),
            teacher: "Prof. Smith".to_string(),
        });
        let payload = json!([
            { "courseName": "Biology 101", "day": "Friday", "time": "08:00" },
            { "courseName": "biology 101", "day": "Friday", "time": "09:00" }
        ]);

        let report = import_routine(&mut user, &payload).unwrap();
        assert_eq!(report.courses_created, 1);
        assert_eq!(user.routine[0].course_id, "c-1");
        assert_eq!(user.routine[1].course_id, "biology 101");
    }

    #[test]
    fn reuses_renamed_course_through_its_id() {
        let mut user = UserData::default();
        user.courses.push(Course {
            id: "Math".to_string(),
            name: "Calculus".to_string(),
            teacher: "Prof. Rahman".to_string(),
        });
        let payload = json!([{ "courseName": "Math", "day": "Monday", "time": "10:00", "courseTeacher": "Someone Else" }]);

        let report = import_routine(&mut user, &payload).unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.courses_created, 0);
        assert_eq!(user.courses.len(), 1);
        assert_eq!(user.courses[0].name, "Calculus");
        assert_eq!(user.courses[0].teacher, "Prof. Rahman");
        assert_eq!(user.routine[0].course_id, "Math");
    }
}
