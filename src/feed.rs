//! Snapshot feed: every committed document is published as a new revision and
//! subscribers pull typed projections of the latest one.

use crate::models::AppData;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub revision: u64,
    pub data: Arc<AppData>,
}

#[derive(Clone)]
pub struct Feed {
    tx: Arc<watch::Sender<Snapshot>>,
}

impl Feed {
    pub fn new(data: AppData) -> Self {
        let (tx, _) = watch::channel(Snapshot {
            revision: 0,
            data: Arc::new(data),
        });
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    /// Replaces the published document. Never waits on subscribers.
    pub fn publish(&self, data: AppData) -> u64 {
        let mut revision = 0;
        self.tx.send_modify(|snapshot| {
            snapshot.revision += 1;
            snapshot.data = Arc::new(data);
            revision = snapshot.revision;
        });
        revision
    }

    pub fn subscribe<T, F>(&self, project: F) -> Subscription<T>
    where
        F: Fn(&AppData) -> T + Send + Sync + 'static,
    {
        Subscription {
            rx: self.tx.subscribe(),
            project: Box::new(project),
        }
    }
}

pub struct Subscription<T> {
    rx: watch::Receiver<Snapshot>,
    project: Box<dyn Fn(&AppData) -> T + Send + Sync>,
}

impl<T> Subscription<T> {
    /// Projection of the newest snapshot, marking it as seen.
    pub fn latest(&mut self) -> (u64, T) {
        let snapshot = self.rx.borrow_and_update().clone();
        (snapshot.revision, (self.project)(&snapshot.data))
    }

    /// Waits for a snapshot newer than the last one seen. Intermediate
    /// revisions published in between are skipped. `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<(u64, T)> {
        self.rx.changed().await.ok()?;
        Some(self.latest())
    }
}
