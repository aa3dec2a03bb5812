use crate::models::TempFile;
use dashmap::DashMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-client state: the pending staged file and the staged files currently being uploaded.
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub staged_file: Option<TempFile>,
    pub uploads_in_flight: HashSet<PathBuf>,
    pub last_activity: Instant,
}

impl ClientSession {
    fn new() -> Self {
        Self {
            staged_file: None,
            uploads_in_flight: HashSet::new(),
            last_activity: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn mark_in_flight(&mut self, file_id: &Path) -> bool {
        self.uploads_in_flight.insert(file_id.to_path_buf())
    }

    /// Takes the staged reference, handing it back only when no upload owns the file.
    fn take_releasable(&mut self) -> Option<TempFile> {
        let previous = self.staged_file.take()?;
        if self.uploads_in_flight.contains(&previous.path) {
            None
        } else {
            Some(previous)
        }
    }
}

/// Result of trying to take a client's staged file for an upload
#[derive(Debug, PartialEq, Eq)]
pub enum StagedClaim {
    Claimed(TempFile),
    InFlight,
    Empty,
}

/// In-memory registry of client sessions keyed by client id.
///
/// Every operation runs under the DashMap entry lock for that client id, so
/// operations on one client are mutually exclusive while different clients
/// never contend on a global lock.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, ClientSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, client_id: &str) -> Option<ClientSession> {
        self.sessions.get(client_id).map(|s| s.value().clone())
    }

    /// Stages `file` for the client and returns the displaced file, if any, for deletion.
    ///
    /// A displaced file that is mid-upload is not returned: the upload owns its deletion.
    pub fn set_staged_file(&self, client_id: &str, file: TempFile) -> Option<TempFile> {
        let mut session = self
            .sessions
            .entry(client_id.to_string())
            .or_insert_with(ClientSession::new);
        session.touch();
        let previous = session.take_releasable();
        session.staged_file = Some(file);
        previous
    }

    /// Clears the staged reference and returns the file to delete, if any.
    pub fn clear_staged_file(&self, client_id: &str) -> Option<TempFile> {
        let mut session = self.sessions.get_mut(client_id)?;
        session.touch();
        session.take_releasable()
    }

    /// Marks `file_id` as being uploaded. Returns false when it already is.
    ///
    /// This is the low-level marker pair. Staged uploads go through
    /// [`SessionRegistry::claim_staged_file`] and [`StagedUploadGuard`], which
    /// share the same in-flight set.
    pub fn try_begin_upload(&self, client_id: &str, file_id: &Path) -> bool {
        let mut session = self
            .sessions
            .entry(client_id.to_string())
            .or_insert_with(ClientSession::new);
        session.touch();
        session.mark_in_flight(file_id)
    }

    pub fn end_upload(&self, client_id: &str, file_id: &Path) {
        if let Some(mut session) = self.sessions.get_mut(client_id) {
            session.touch();
            session.uploads_in_flight.remove(file_id);
        }
    }

    /// Atomically looks up the staged file and marks it in flight.
    pub fn claim_staged_file(&self, client_id: &str) -> StagedClaim {
        let Some(mut session) = self.sessions.get_mut(client_id) else {
            return StagedClaim::Empty;
        };
        session.touch();

        let Some(file) = session.staged_file.clone() else {
            return StagedClaim::Empty;
        };
        if session.mark_in_flight(&file.path) {
            StagedClaim::Claimed(file)
        } else {
            StagedClaim::InFlight
        }
    }

    /// Ends the upload of a consumed staged file: drops the staged reference if it
    /// still points at `file_id` and releases the in-flight marker.
    pub fn release_consumed(&self, client_id: &str, file_id: &Path) {
        if let Some(mut session) = self.sessions.get_mut(client_id) {
            session.touch();
            if session
                .staged_file
                .as_ref()
                .is_some_and(|f| f.path == file_id)
            {
                session.staged_file = None;
            }
            session.uploads_in_flight.remove(file_id);
        }
    }

    /// Removes sessions idle for longer than `ttl` with nothing in flight.
    /// Returns their staged files so the caller can delete them.
    pub fn evict_idle(&self, ttl: Duration) -> Vec<TempFile> {
        let mut released = Vec::new();
        self.sessions.retain(|_, session| {
            let expired =
                session.uploads_in_flight.is_empty() && session.last_activity.elapsed() > ttl;
            if expired && let Some(file) = session.staged_file.take() {
                released.push(file);
            }
            !expired
        });
        released
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Holds a claimed staged file for the duration of its upload.
///
/// Dropping the guard releases the in-flight marker, on success, error or panic alike.
pub struct StagedUploadGuard {
    registry: SessionRegistry,
    client_id: String,
    file_id: PathBuf,
}

impl StagedUploadGuard {
    pub fn new(registry: SessionRegistry, client_id: String, file_id: PathBuf) -> Self {
        Self {
            registry,
            client_id,
            file_id,
        }
    }
}

impl Drop for StagedUploadGuard {
    fn drop(&mut self) {
        self.registry.release_consumed(&self.client_id, &self.file_id);
    }
}
