use crate::errors::AppError;
use crate::feed::{Feed, Snapshot, Subscription};
use crate::models::{AppData, Aggregates, Course, Dashboard, LeaderboardEntry, Notice, RoutineRow};
use crate::schedule::{event_rows, routine_rows};
use crate::stats::{build_aggregates, group_leaderboard};
use crate::storage::persist_data;
use chrono::Local;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub data: Arc<Mutex<AppData>>,
    pub feed: Feed,
}

impl AppState {
    pub fn new(data_path: PathBuf, data: AppData) -> Self {
        Self {
            data_path,
            feed: Feed::new(data.clone()),
            data: Arc::new(Mutex::new(data)),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.feed.current()
    }

    /// Runs one transition against a staged copy of the document. The copy is
    /// persisted and published only if `apply` succeeds and the write lands;
    /// otherwise the current document stays untouched.
    pub async fn commit<T, F>(&self, apply: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut AppData) -> Result<T, AppError>,
    {
        let mut data = self.data.lock().await;
        let mut staged = data.clone();
        let result = apply(&mut staged)?;

        if let Err(err) = persist_data(&self.data_path, &staged).await {
            error!("failed to persist data file: {err}");
            return Err(err);
        }

        *data = staged;
        self.feed.publish(data.clone());
        Ok(result)
    }

    pub fn subscribe_courses(&self, user_id: &str) -> Subscription<Vec<Course>> {
        let user_id = user_id.to_string();
        self.feed.subscribe(move |data| {
            data.users
                .get(&user_id)
                .map(|user| user.courses.clone())
                .unwrap_or_default()
        })
    }

    pub fn subscribe_routine(&self, user_id: &str) -> Subscription<Vec<RoutineRow>> {
        let user_id = user_id.to_string();
        self.feed.subscribe(move |data| {
            data.users
                .get(&user_id)
                .map(|user| routine_rows(user, Local::now().naive_local()))
                .unwrap_or_default()
        })
    }

    pub fn subscribe_aggregates(&self, user_id: &str) -> Subscription<Aggregates> {
        let user_id = user_id.to_string();
        self.feed.subscribe(move |data| {
            data.users
                .get(&user_id)
                .map(build_aggregates)
                .unwrap_or_default()
        })
    }

    pub fn subscribe_leaderboard(&self, group: &str) -> Subscription<Vec<LeaderboardEntry>> {
        let group = group.to_string();
        self.feed
            .subscribe(move |data| group_leaderboard(data.groups.get(&group)))
    }

    /// Everything the presentation layer renders for one user.
    pub fn subscribe_dashboard(&self, user_id: &str) -> Subscription<Dashboard> {
        let user_id = user_id.to_string();
        self.feed.subscribe(move |data| dashboard(data, &user_id))
    }
}

pub fn dashboard(data: &AppData, user_id: &str) -> Dashboard {
    let user = data.users.get(user_id).cloned().unwrap_or_default();
    let group = user
        .profile
        .as_ref()
        .and_then(|profile| data.groups.get(&profile.group_key()));

    Dashboard {
        revision: 0,
        courses: user.courses.clone(),
        routine: routine_rows(&user, Local::now().naive_local()),
        events: event_rows(&user),
        aggregates: build_aggregates(&user),
        leaderboard: group_leaderboard(group),
        notices: group.map(|group| newest_first(&group.notices)).unwrap_or_default(),
    }
}

pub fn newest_first(notices: &[Notice]) -> Vec<Notice> {
    let mut notices = notices.to_vec();
    notices.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
    notices
}
