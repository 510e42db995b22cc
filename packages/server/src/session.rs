//! Per-browser session state.
//!
//! Each session owns its incident context, chat log and dispatch status.
//! The dispatch worker never touches a session: its updates wait in a
//! channel until the session drains them on the next poll.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use incident_responder_chat::ChatSession;
use incident_responder_dispatch::{DispatchStatus, DispatchUpdate};
use incident_responder_incident_models::IncidentContext;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

use crate::config::DEFAULT_SESSION_TTL;

/// Progress messages kept per session.
const MAX_PROGRESS: usize = 50;

/// State of one browser session.
#[derive(Debug, Default)]
pub struct Session {
    /// The most recently submitted incident.
    pub context: Option<IncidentContext>,
    /// Assistant chat.
    pub chat: ChatSession,
    image_path: Option<PathBuf>,
    status: DispatchStatus,
    updates: Option<UnboundedReceiver<DispatchUpdate>>,
    progress: Vec<String>,
}

impl Session {
    /// Records a new submission and starts listening to its worker.
    ///
    /// `image_path` is where the worker saves the submission's image, if it
    /// has one. Any earlier worker's receiver is dropped, so its remaining
    /// updates are discarded.
    pub fn start_dispatch(
        &mut self,
        context: IncidentContext,
        image_path: Option<PathBuf>,
        updates: UnboundedReceiver<DispatchUpdate>,
    ) {
        self.chat.set_context(context.clone());
        self.context = Some(context);
        self.image_path = image_path;
        self.status = DispatchStatus::Running;
        self.progress.clear();
        self.updates = Some(updates);
    }

    /// Applies every pending worker update to the status.
    pub fn drain_updates(&mut self) {
        let Some(updates) = self.updates.as_mut() else {
            return;
        };

        loop {
            match updates.try_recv() {
                Ok(update) => {
                    self.status.apply(&update);
                    self.progress.push(update.describe());
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.updates = None;
                    break;
                }
            }
        }

        if self.progress.len() > MAX_PROGRESS {
            let excess = self.progress.len() - MAX_PROGRESS;
            self.progress.drain(..excess);
        }
    }

    /// Current dispatch status. Call [`Self::drain_updates`] first.
    #[must_use]
    pub const fn status(&self) -> &DispatchStatus {
        &self.status
    }

    /// Progress lines of the current dispatch, oldest first.
    #[must_use]
    pub fn progress(&self) -> &[String] {
        &self.progress
    }

    /// Path of the finished report, if the dispatch completed.
    #[must_use]
    pub fn report_path(&self) -> Option<&Path> {
        match &self.status {
            DispatchStatus::Completed { report_path } => Some(report_path.as_path()),
            _ => None,
        }
    }

    /// Saved image of the current incident, if one was uploaded.
    #[must_use]
    pub fn image_path(&self) -> Option<&Path> {
        self.image_path.as_deref()
    }
}

#[derive(Debug)]
struct Entry {
    session: Arc<tokio::sync::Mutex<Session>>,
    last_seen: Instant,
}

/// All live sessions, keyed by session id.
///
/// Sessions not looked up for longer than the store's ttl are dropped the
/// next time a session is created.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<BTreeMap<String, Entry>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    /// Creates an empty store whose sessions expire after `ttl` of
    /// inactivity.
    #[must_use]
    pub const fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(BTreeMap::new()),
            ttl,
        }
    }

    /// Drops idle sessions, then creates an empty session and returns its id.
    pub fn create(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Instant::now();

        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);

        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) < self.ttl);
        let expired = before - sessions.len();
        if expired > 0 {
            log::debug!("Expired {expired} idle session(s)");
        }

        sessions.insert(
            id.clone(),
            Entry {
                session: Arc::default(),
                last_seen: now,
            },
        );
        drop(sessions);

        log::debug!("Created session {id}");
        id
    }

    /// Looks up a session and marks it as active.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<tokio::sync::Mutex<Session>>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(id)
            .map(|entry| {
                entry.last_seen = Instant::now();
                entry.session.clone()
            })
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use incident_responder_incident_models::{IncidentCategory, IncidentSeverity};
    use std::path::PathBuf;
    use tokio::sync::mpsc;

    fn context() -> IncidentContext {
        IncidentContext {
            id: "abc".to_string(),
            username: "Jane".to_string(),
            description: "Smoke".to_string(),
            location: "Building A".to_string(),
            category: IncidentCategory::Fire,
            severity: IncidentSeverity::High,
            reported_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn start_dispatch_sets_running_and_seeds_chat() {
        let mut session = Session::default();
        let (_tx, rx) = mpsc::unbounded_channel();
        session.start_dispatch(context(), None, rx);

        assert!(session.status().is_running());
        assert_eq!(session.chat.entries().len(), 1);
    }

    #[test]
    fn drain_applies_updates_in_order() {
        let mut session = Session::default();
        let (tx, rx) = mpsc::unbounded_channel();
        session.start_dispatch(context(), None, rx);

        tx.send(DispatchUpdate::ToolCalled {
            tool: "csv_logger".to_string(),
        })
        .unwrap();
        tx.send(DispatchUpdate::Completed {
            report_path: PathBuf::from("outputs/fire_incident_report_abc.md"),
        })
        .unwrap();
        drop(tx);

        session.drain_updates();

        assert_eq!(
            session.report_path(),
            Some(Path::new("outputs/fire_incident_report_abc.md"))
        );
        assert_eq!(session.progress().len(), 2);
        assert_eq!(session.progress()[0], "Calling csv_logger");
    }

    #[test]
    fn new_submission_discards_old_updates() {
        let mut session = Session::default();
        let (old_tx, old_rx) = mpsc::unbounded_channel();
        session.start_dispatch(context(), None, old_rx);

        let (_new_tx, new_rx) = mpsc::unbounded_channel();
        session.start_dispatch(context(), None, new_rx);

        let _ = old_tx.send(DispatchUpdate::Failed {
            message: "stale".to_string(),
        });
        session.drain_updates();

        assert!(session.status().is_running());
    }

    #[test]
    fn start_dispatch_replaces_image_path() {
        let mut session = Session::default();
        let (_tx, rx) = mpsc::unbounded_channel();
        let image = PathBuf::from("outputs/images/abc.png");
        session.start_dispatch(context(), Some(image.clone()), rx);
        assert_eq!(session.image_path(), Some(image.as_path()));

        let (_tx, rx) = mpsc::unbounded_channel();
        session.start_dispatch(context(), None, rx);
        assert!(session.image_path().is_none());
    }

    #[test]
    fn store_returns_created_sessions() {
        let store = SessionStore::default();
        let a = store.create();
        let b = store.create();
        assert!(store.get(&a).is_some());
        assert!(store.get(&b).is_some());
        assert!(store.get("missing").is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn idle_sessions_expire_when_a_session_is_created() {
        let store = SessionStore::with_ttl(Duration::ZERO);
        let stale = store.create();
        let fresh = store.create();

        assert!(store.get(&stale).is_none());
        assert!(store.get(&fresh).is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn expired_session_handles_stay_usable() {
        let store = SessionStore::with_ttl(Duration::ZERO);
        let id = store.create();
        let session = store.get(&id).unwrap();
        store.create();

        assert!(store.get(&id).is_none());
        assert!(session.try_lock().unwrap().context.is_none());
    }
}
