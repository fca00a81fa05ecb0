use crate::models::{
    Aggregates, CourseMissed, GroupData, LeaderboardEntry, LeaderboardRow, NOT_AVAILABLE,
    SummaryResponse, UserData,
};
use std::collections::BTreeMap;

pub fn total_missed(by_course: &BTreeMap<String, i64>) -> i64 {
    by_course.values().sum()
}

/// Orders by total missed (descending), then roll number, then user id.
pub fn rank_leaderboard(mut entries: Vec<LeaderboardEntry>) -> Vec<LeaderboardEntry> {
    entries.sort_by(|a, b| {
        b.total_missed
            .cmp(&a.total_missed)
            .then_with(|| a.roll_number.cmp(&b.roll_number))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    entries
}

pub fn group_leaderboard(group: Option<&GroupData>) -> Vec<LeaderboardEntry> {
    let entries = group
        .map(|group| group.leaderboard.values().cloned().collect())
        .unwrap_or_default();
    rank_leaderboard(entries)
}

pub fn build_aggregates(user: &UserData) -> Aggregates {
    Aggregates {
        by_course: user.missed_by_course.clone(),
        by_teacher: user.missed_by_teacher.clone(),
        total_missed: total_missed(&user.missed_by_course),
    }
}

pub fn build_summary(user_id: &str, user: &UserData, group: Option<&GroupData>) -> SummaryResponse {
    let by_course = user
        .courses
        .iter()
        .map(|course| CourseMissed {
            course_id: course.id.clone(),
            course_name: course.name.clone(),
            missed: user.missed_by_course.get(&course.id).copied().unwrap_or(0),
        })
        .chain(
            // Counts for courses deleted since they were marked.
            user.missed_by_course
                .iter()
                .filter(|(id, count)| **count > 0 && user.course(id).is_none())
                .map(|(id, count)| CourseMissed {
                    course_id: id.clone(),
                    course_name: NOT_AVAILABLE.to_string(),
                    missed: *count,
                }),
        )
        .collect();

    let leaderboard = group_leaderboard(group)
        .into_iter()
        .enumerate()
        .map(|(index, entry)| LeaderboardRow {
            rank: index + 1,
            is_me: entry.user_id == user_id,
            display_name: entry.display_name,
            roll_number: entry.roll_number,
            total_missed: entry.total_missed,
        })
        .collect();

    SummaryResponse {
        total_missed: total_missed(&user.missed_by_course),
        by_course,
        by_teacher: user.missed_by_teacher.clone(),
        leaderboard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Course;

    fn entry(user_id: &str, roll: &str, total: i64) -> LeaderboardEntry {
        LeaderboardEntry {
            user_id: user_id.to_string(),
            display_name: format!("Student {user_id}"),
            roll_number: roll.to_string(),
            department: "CSE".to_string(),
            section: "A".to_string(),
            total_missed: total,
        }
    }

    #[test]
    fn leaderboard_ranks_most_missed_first() {
        let ranked = rank_leaderboard(vec![entry("a", "01", 3), entry("b", "02", 7), entry("c", "03", 1)]);
        let totals: Vec<i64> = ranked.iter().map(|e| e.total_missed).collect();
        assert_eq!(totals, vec![7, 3, 1]);
    }

    #[test]
    fn leaderboard_ties_break_on_roll_number() {
        let ranked = rank_leaderboard(vec![entry("z", "20", 2), entry("y", "05", 2), entry("x", "11", 4)]);
        let ids: Vec<&str> = ranked.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }

    #[test]
    fn total_is_sum_of_course_counts() {
        let mut counts = BTreeMap::new();
        counts.insert("Math".to_string(), 2);
        counts.insert("Physics".to_string(), 0);
        counts.insert("Chemistry".to_string(), 3);
        assert_eq!(total_missed(&counts), 5);
        assert_eq!(total_missed(&BTreeMap::new()), 0);
    }

    #[test]
    fn summary_lists_every_course_and_flags_caller() {
        let mut user = UserData::default();
        user.courses.push(Course {
            id: "Math".to_string(),
            name: "Math".to_string(),
            teacher: String::new(),
        });
        user.courses.push(Course {
            id: "Physics".to_string(),
            name: "Physics".to_string(),
            teacher: String::new(),
        });
        user.missed_by_course.insert("Math".to_string(), 2);
        user.missed_by_course.insert("Dropped".to_string(), 1);

        let mut group = GroupData::default();
        group.leaderboard.insert("me".to_string(), entry("me", "07", 3));
        group.leaderboard.insert("other".to_string(), entry("other", "08", 5));

        let summary = build_summary("me", &user, Some(&group));
        assert_eq!(summary.total_missed, 3);
        assert_eq!(summary.by_course.len(), 3);
        assert_eq!(summary.by_course[1].missed, 0);
        assert_eq!(summary.by_course[2].course_name, NOT_AVAILABLE);
        assert_eq!(summary.leaderboard[0].rank, 1);
        assert!(!summary.leaderboard[0].is_me);
        assert!(summary.leaderboard[1].is_me);
    }
}
