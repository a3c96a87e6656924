//! The session registry file and its cross-process mutation discipline.
//!
//! The registry (`.sessions.index`) is the single source of truth shared by
//! every process acting on the workspace (API workers, the CLI, the shell
//! tooling). All mutations are linearized through a sentinel-file lock and
//! committed with a write-temp-then-atomic-rename, so a reader may observe
//! the pre- or post-mutation registry but never a partially written one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::session::{SessionIndex, SessionRecord, SessionStatus};
use crate::{AppError, Result};

/// Registry file name under the sessions directory.
pub const INDEX_FILE: &str = ".sessions.index";
/// Lock sentinel name: presence means held, absence means free.
pub const LOCK_FILE: &str = ".sessions.index.lock";

const READ_ATTEMPTS: u32 = 3;
const READ_BACKOFF: Duration = Duration::from_millis(100);

/// Default interval between lock-acquisition polls.
pub const DEFAULT_LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Default number of lock-acquisition polls before timing out (~5s).
pub const DEFAULT_LOCK_MAX_ATTEMPTS: u32 = 50;

/// Handle to the on-disk session registry.
///
/// Holds only paths and lock tuning; cheap to clone and passed by reference
/// to every operation. There is deliberately no process-wide singleton.
#[derive(Debug, Clone)]
pub struct IndexStore {
    sessions_dir: PathBuf,
    lock_poll_interval: Duration,
    lock_max_attempts: u32,
}

/// RAII guard for the sentinel lock; removes the sentinel on drop so the
/// lock is released on every exit path, including error paths.
struct IndexLock {
    path: PathBuf,
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), %err, "failed to remove index lock sentinel");
            }
        }
    }
}

impl IndexStore {
    /// Create a store rooted at the given sessions directory.
    #[must_use]
    pub fn new(sessions_dir: PathBuf) -> Self {
        Self {
            sessions_dir,
            lock_poll_interval: DEFAULT_LOCK_POLL_INTERVAL,
            lock_max_attempts: DEFAULT_LOCK_MAX_ATTEMPTS,
        }
    }

    /// Override the lock polling parameters. Integration tests use this to
    /// exercise the lock-timeout path without the full five-second wait.
    #[must_use]
    pub fn with_lock_params(mut self, poll_interval: Duration, max_attempts: u32) -> Self {
        self.lock_poll_interval = poll_interval;
        self.lock_max_attempts = max_attempts;
        self
    }

    /// Directory holding the registry and per-session state.
    #[must_use]
    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    fn index_path(&self) -> PathBuf {
        self.sessions_dir.join(INDEX_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.sessions_dir.join(LOCK_FILE)
    }

    /// Load the registry, tolerating transient read failures.
    ///
    /// Retries up to three times with linear backoff when a read races a
    /// concurrent rewrite (empty or unparsable content). After the retries
    /// exhaust, the failure is logged and a safe empty registry is returned;
    /// callers must treat "empty" as "unknown", never as ground truth for
    /// destructive decisions. An absent file is a clean empty registry.
    pub async fn read_index(&self) -> SessionIndex {
        match self.read_with_retries().await {
            Ok(Some(index)) => index,
            Ok(None) => SessionIndex::default(),
            Err(err) => {
                warn!(%err, "session index unreadable after retries; treating as empty");
                SessionIndex::default()
            }
        }
    }

    /// Resolve a possibly-abbreviated session id against the registry.
    ///
    /// Tries an exact UUID match first, then a unique prefix match over the
    /// canonical hyphenated form.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when nothing matches and
    /// `AppError::AmbiguousId` when an abbreviation matches more than one
    /// record.
    pub async fn resolve_session_id(&self, candidate: &str) -> Result<SessionRecord> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Err(AppError::NotFound("empty session id".into()));
        }

        let index = self.read_index().await;

        if let Ok(id) = Uuid::parse_str(candidate) {
            if let Some(record) = index.find(id) {
                return Ok(record.clone());
            }
        }

        let needle = candidate.to_ascii_lowercase();
        let matches: Vec<&SessionRecord> = index
            .sessions
            .iter()
            .filter(|r| r.session_id.to_string().starts_with(&needle))
            .collect();

        match matches.as_slice() {
            [] => Err(AppError::NotFound(format!(
                "no session matches '{candidate}'"
            ))),
            [record] => Ok((*record).clone()),
            many => Err(AppError::AmbiguousId(format!(
                "'{candidate}' matches {} sessions",
                many.len()
            ))),
        }
    }

    /// Persist a new status for one session record.
    ///
    /// Acquires the sentinel lock, re-reads the registry inside the lock,
    /// mutates exactly the target record, and commits via atomic rename.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transient` on lock timeout or registry I/O
    /// failure and `AppError::NotFound` if the record is absent from the
    /// re-read registry.
    pub async fn update_status(
        &self,
        session_id: Uuid,
        status: SessionStatus,
    ) -> Result<SessionRecord> {
        self.rewrite_record(session_id, |record| {
            record.status = status;
            Ok(())
        })
        .await
    }

    /// Transition a record into `Restoring`, failing if it already is.
    ///
    /// The re-read inside the lock makes this a compare-and-set: of two
    /// racing restore submissions for the same session, exactly one wins
    /// and the other observes the freshly persisted `Restoring`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` when a restoration is already in
    /// flight, plus the same errors as [`IndexStore::update_status`].
    pub async fn begin_restore(&self, session_id: Uuid) -> Result<SessionRecord> {
        self.rewrite_record(session_id, |record| {
            if record.status == SessionStatus::Restoring {
                return Err(AppError::Conflict(
                    "restoration already in progress".into(),
                ));
            }
            record.status = SessionStatus::Restoring;
            Ok(())
        })
        .await
    }

    /// Locked read-modify-write of a single record.
    ///
    /// A failure at any point before the rename leaves the original
    /// registry file untouched; an orphaned temp file is best-effort
    /// removed.
    async fn rewrite_record<F>(&self, session_id: Uuid, apply: F) -> Result<SessionRecord>
    where
        F: FnOnce(&mut SessionRecord) -> Result<()>,
    {
        let _lock = self.acquire_lock().await?;

        // Re-read inside the lock: a writer may have committed between the
        // caller's last read and now.
        let mut index = match self.read_with_retries().await {
            Ok(Some(index)) => index,
            Ok(None) => {
                return Err(AppError::NotFound(format!(
                    "session {session_id} not in registry (registry absent)"
                )))
            }
            Err(err) => return Err(err),
        };

        let now = chrono::Utc::now();
        let updated = {
            let record = index.find_mut(session_id).ok_or_else(|| {
                AppError::NotFound(format!("session {session_id} not in registry"))
            })?;
            apply(record)?;
            record.last_updated = now;
            record.clone()
        };
        index.last_updated = now;

        self.commit(&index).await?;
        debug!(
            session_id = %session_id,
            status = %updated.status,
            "session record committed"
        );
        Ok(updated)
    }

    /// Serialize the whole registry to a uniquely named temp file and
    /// atomically rename it over the registry path.
    async fn commit(&self, index: &SessionIndex) -> Result<()> {
        let serialized = serde_json::to_vec_pretty(index)
            .map_err(|err| AppError::Transient(format!("failed to serialize index: {err}")))?;

        let temp_path = self
            .sessions_dir
            .join(format!("{INDEX_FILE}.tmp.{}", Uuid::new_v4().as_simple()));

        if let Err(err) = tokio::fs::write(&temp_path, &serialized).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(AppError::Transient(format!(
                "failed to write index temp file: {err}"
            )));
        }

        if let Err(err) = tokio::fs::rename(&temp_path, self.index_path()).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(AppError::Transient(format!(
                "failed to commit index rename: {err}"
            )));
        }

        Ok(())
    }

    /// Acquire the sentinel lock, polling until it is free or the attempt
    /// budget runs out.
    async fn acquire_lock(&self) -> Result<IndexLock> {
        let lock_path = self.lock_path();

        tokio::fs::create_dir_all(&self.sessions_dir)
            .await
            .map_err(|err| {
                AppError::Transient(format!("failed to create sessions dir: {err}"))
            })?;

        for attempt in 1..=self.lock_max_attempts {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await
            {
                Ok(_) => {
                    return Ok(IndexLock {
                        path: lock_path,
                    })
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    debug!(attempt, "index lock held; polling");
                    sleep(self.lock_poll_interval).await;
                }
                Err(err) => {
                    return Err(AppError::Transient(format!(
                        "failed to create index lock sentinel: {err}"
                    )))
                }
            }
        }

        Err(AppError::Transient(format!(
            "timed out acquiring index lock after {} attempts",
            self.lock_max_attempts
        )))
    }

    async fn read_with_retries(&self) -> Result<Option<SessionIndex>> {
        let mut last_err = None;
        for attempt in 1..=READ_ATTEMPTS {
            match self.try_read().await {
                Ok(found) => return Ok(found),
                Err(err) => {
                    debug!(attempt, %err, "session index read failed");
                    last_err = Some(err);
                    if attempt < READ_ATTEMPTS {
                        sleep(READ_BACKOFF * attempt).await;
                    }
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| AppError::Transient("session index read failed".into())))
    }

    /// One read attempt. `Ok(None)` means the registry file is absent;
    /// empty or unparsable content is an error so the caller can retry
    /// (the content may be mid-rewrite by a non-atomic legacy writer).
    async fn try_read(&self) -> Result<Option<SessionIndex>> {
        let content = match tokio::fs::read_to_string(self.index_path()).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(AppError::Transient(format!(
                    "failed to read session index: {err}"
                )))
            }
        };

        if content.trim().is_empty() {
            return Err(AppError::Transient("session index is empty".into()));
        }

        let index: SessionIndex = serde_json::from_str(&content)
            .map_err(|err| AppError::Transient(format!("failed to parse session index: {err}")))?;

        if index.version.is_empty() {
            return Err(AppError::Transient("session index missing version".into()));
        }

        Ok(Some(index))
    }
}
