use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

/// File name of the persisted session document inside the data directory.
pub const SESSION_FILE_NAME: &str = "session_data.json";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("failed to read session data at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write session data at {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session data at {} is malformed: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode session data: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("session storage unavailable: {0}")]
    Unavailable(String),
}

/// The durable part of a session: the `user_id`/`token` pair plus the
/// optional role entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_vet: Option<bool>,
}

impl SessionRecord {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            token: Some(token.into()),
            is_vet: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.token.is_none() && self.is_vet.is_none()
    }

    /// Replace the identity pair, dropping a role that belonged to another user.
    fn with_identity(&self, user_id: &str, token: &str) -> Self {
        let is_vet = if self.user_id.as_deref() == Some(user_id) {
            self.is_vet
        } else {
            None
        };
        Self {
            user_id: Some(user_id.to_owned()),
            token: Some(token.to_owned()),
            is_vet,
        }
    }
}

pub type StoreStream<T> = BoxStream<'static, Result<T, StoreError>>;

/// Durable key-value persistence for the session pair.
///
/// Every stream returned here is restartable: a fresh call starts from the
/// currently persisted value and then follows subsequent writes.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Write `user_id` and `token` together.
    async fn save_user_data(&self, user_id: &str, token: &str) -> Result<(), StoreError>;

    /// Write the pair and the role entry in one transaction.
    async fn save_user_data_with_role(
        &self,
        user_id: &str,
        token: &str,
        is_vet: bool,
    ) -> Result<(), StoreError>;

    /// Delete every persisted entry.
    async fn clear_session(&self) -> Result<(), StoreError>;

    /// Whole records, emitted once for the current value and again on every change.
    fn records(&self) -> StoreStream<SessionRecord>;

    fn user_id(&self) -> StoreStream<Option<String>> {
        self.records()
            .map(|item| item.map(|record| record.user_id))
            .boxed()
    }

    fn token(&self) -> StoreStream<Option<String>> {
        self.records()
            .map(|item| item.map(|record| record.token))
            .boxed()
    }

    fn is_authenticated(&self) -> StoreStream<bool> {
        self.token()
            .map(|item| item.map(|token| token.is_some()))
            .boxed()
    }
}

/// Stream that yields `initial` and then every value published on `rx`.
fn follow_changes<F>(initial: F, rx: watch::Receiver<SessionRecord>) -> StoreStream<SessionRecord>
where
    F: std::future::Future<Output = Result<SessionRecord, StoreError>> + Send + 'static,
{
    let updates = stream::unfold(rx, |mut rx| async move {
        rx.changed().await.ok()?;
        let record = rx.borrow_and_update().clone();
        Some((Ok(record), rx))
    });
    stream::once(initial).chain(updates).boxed()
}

/// Session store backed by a JSON document on disk.
#[derive(Clone)]
pub struct FileSessionStore {
    inner: Arc<FileInner>,
}

struct FileInner {
    path: PathBuf,
    changes: watch::Sender<SessionRecord>,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        let (changes, _) = watch::channel(SessionRecord::default());
        Self {
            inner: Arc::new(FileInner {
                path,
                changes,
                write_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SESSION_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Read the record currently on disk.
    pub async fn load(&self) -> Result<SessionRecord, StoreError> {
        read_record(&self.inner.path).await
    }

    async fn load_for_update(&self) -> Result<SessionRecord, StoreError> {
        match read_record(&self.inner.path).await {
            Err(StoreError::Malformed { path, source }) => {
                warn!(error = %source, "discarding malformed session data at {}", path.display());
                Ok(SessionRecord::default())
            }
            other => other,
        }
    }

    async fn persist(&self, record: SessionRecord) -> Result<(), StoreError> {
        write_record(&self.inner.path, &record).await?;
        self.inner.changes.send_replace(record);
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save_user_data(&self, user_id: &str, token: &str) -> Result<(), StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let current = self.load_for_update().await?;
        self.persist(current.with_identity(user_id, token)).await?;
        debug!(user_id, "session pair persisted");
        Ok(())
    }

    async fn save_user_data_with_role(
        &self,
        user_id: &str,
        token: &str,
        is_vet: bool,
    ) -> Result<(), StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let mut record = SessionRecord::new(user_id, token);
        record.is_vet = Some(is_vet);
        self.persist(record).await?;
        debug!(user_id, is_vet, "session pair and role persisted");
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        match tokio::fs::remove_file(&self.inner.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(StoreError::Write {
                    path: self.inner.path.clone(),
                    source,
                })
            }
        }
        self.inner.changes.send_replace(SessionRecord::default());
        debug!("session data cleared");
        Ok(())
    }

    fn records(&self) -> StoreStream<SessionRecord> {
        let rx = self.inner.changes.subscribe();
        let path = self.inner.path.clone();
        follow_changes(async move { read_record(&path).await }, rx)
    }
}

async fn read_record(path: &Path) -> Result<SessionRecord, StoreError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(SessionRecord::default()),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if contents.trim().is_empty() {
        return Ok(SessionRecord::default());
    }
    serde_json::from_str(&contents).map_err(|source| StoreError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

async fn write_record(path: &Path, record: &SessionRecord) -> Result<(), StoreError> {
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let serialized = serde_json::to_vec_pretty(record)?;
    // Write then rename so readers never observe half of the pair.
    let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
    tokio::fs::write(&tmp, serialized).await.map_err(write_err)?;
    if let Err(source) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(write_err(source));
    }
    Ok(())
}

/// In-process store with switchable failures, used by tests and the smoke run.
#[derive(Clone)]
pub struct MemorySessionStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    changes: watch::Sender<SessionRecord>,
    faults: Mutex<Faults>,
}

#[derive(Default, Clone, Copy)]
struct Faults {
    saves: bool,
    clears: bool,
    reads: bool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::with_record(SessionRecord::default())
    }

    pub fn with_record(record: SessionRecord) -> Self {
        let (changes, _) = watch::channel(record);
        Self {
            inner: Arc::new(MemoryInner {
                changes,
                faults: Mutex::new(Faults::default()),
            }),
        }
    }

    pub fn snapshot(&self) -> SessionRecord {
        self.inner.changes.borrow().clone()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.inner.faults.lock().saves = fail;
    }

    pub fn fail_clears(&self, fail: bool) {
        self.inner.faults.lock().clears = fail;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.inner.faults.lock().reads = fail;
    }

    fn faults(&self) -> Faults {
        *self.inner.faults.lock()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save_user_data(&self, user_id: &str, token: &str) -> Result<(), StoreError> {
        if self.faults().saves {
            return Err(StoreError::Unavailable("simulated write failure".into()));
        }
        let record = self.snapshot().with_identity(user_id, token);
        self.inner.changes.send_replace(record);
        Ok(())
    }

    async fn save_user_data_with_role(
        &self,
        user_id: &str,
        token: &str,
        is_vet: bool,
    ) -> Result<(), StoreError> {
        if self.faults().saves {
            return Err(StoreError::Unavailable("simulated write failure".into()));
        }
        let mut record = SessionRecord::new(user_id, token);
        record.is_vet = Some(is_vet);
        self.inner.changes.send_replace(record);
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), StoreError> {
        if self.faults().clears {
            return Err(StoreError::Unavailable("simulated clear failure".into()));
        }
        self.inner.changes.send_replace(SessionRecord::default());
        Ok(())
    }

    fn records(&self) -> StoreStream<SessionRecord> {
        let rx = self.inner.changes.subscribe();
        let initial = if self.faults().reads {
            Err(StoreError::Unavailable("simulated read failure".into()))
        } else {
            Ok(self.snapshot())
        };
        follow_changes(async move { initial }, rx)
    }
}
