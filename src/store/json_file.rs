use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    discovery::types::InvestigationRecord,
    store::{
        SessionMutation, SessionStore, StoreError,
        memory::{InMemorySessionStore, StoreState},
        types::{Action, Feedback, RecommendationRecord, Session, Thought},
    },
};

const SNAPSHOT_VERSION: u64 = 1;
const SNAPSHOT_FILE_NAME: &str = "sessions.json";

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStore {
    version: u64,
    state: StoreState,
}

/// Memory-backed store that rewrites one JSON snapshot after every mutation.
///
/// Writes go through a temp file and a rename, so a crash leaves either the
/// previous snapshot or the new one on disk. A mutation reaches memory only
/// after its snapshot is on disk; a failed save leaves both unchanged.
#[derive(Debug)]
pub struct JsonFileSessionStore {
    path: PathBuf,
    inner: InMemorySessionStore,
}

impl JsonFileSessionStore {
    pub fn open(state_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = state_dir.as_ref().join(SNAPSHOT_FILE_NAME);
        let state = load_snapshot(&path)?.unwrap_or_default();
        tracing::debug!(
            target: "store",
            path = %path.display(),
            "session_snapshot_opened"
        );
        Ok(Self {
            path,
            inner: InMemorySessionStore::from_state(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Holds the write lock across the disk write, so snapshots land in
    /// mutation order.
    async fn mutate<T, F>(&self, mutate: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut StoreState) -> Result<T, StoreError>,
    {
        let mut state = self.inner.state().write().await;
        let mut staged = state.clone();
        let output = mutate(&mut staged)?;

        let path = self.path.clone();
        let to_save = staged.clone();
        tokio::task::spawn_blocking(move || save_snapshot(&path, to_save))
            .await
            .map_err(|err| StoreError::Persistence(format!("snapshot writer panicked: {err}")))??;

        *state = staged;
        Ok(output)
    }
}

fn load_snapshot(path: &Path) -> Result<Option<StoreState>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(StoreError::Persistence(format!(
                "failed to read session snapshot '{}': {err}",
                path.display()
            )));
        }
    };

    let parsed: PersistedStore = serde_json::from_str(&content).map_err(|err| {
        StoreError::Persistence(format!(
            "failed to parse session snapshot '{}': {err}",
            path.display()
        ))
    })?;
    if parsed.version != SNAPSHOT_VERSION {
        return Err(StoreError::Persistence(format!(
            "unsupported session snapshot version {} at '{}'",
            parsed.version,
            path.display()
        )));
    }
    Ok(Some(parsed.state))
}

fn persistence(action: &str, target: &Path, err: impl std::fmt::Display) -> StoreError {
    StoreError::Persistence(format!("failed to {action} '{}': {err}", target.display()))
}

fn save_snapshot(path: &Path, state: StoreState) -> Result<(), StoreError> {
    let parent = path.parent().ok_or_else(|| {
        StoreError::Persistence(format!(
            "session snapshot path '{}' has no parent",
            path.display()
        ))
    })?;
    fs::create_dir_all(parent)
        .map_err(|err| persistence("create snapshot directory", parent, err))?;

    let persisted = PersistedStore {
        version: SNAPSHOT_VERSION,
        state,
    };

    let tmp_path = path.with_extension("tmp");
    let file = fs::File::create(&tmp_path)
        .map_err(|err| persistence("create snapshot temp file", &tmp_path, err))?;
    {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &persisted)
            .map_err(|err| persistence("serialize session snapshot", &tmp_path, err))?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(|err| persistence("flush session snapshot", &tmp_path, err))?;
    }

    fs::OpenOptions::new()
        .read(true)
        .open(&tmp_path)
        .and_then(|file| file.sync_all())
        .map_err(|err| persistence("sync snapshot temp file", &tmp_path, err))?;

    fs::rename(&tmp_path, path)
        .map_err(|err| persistence("replace session snapshot", path, err))?;

    if let Ok(parent_file) = fs::File::open(parent) {
        let _ = parent_file.sync_all();
    }
    Ok(())
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn create_session(&self, session: Session) -> Result<(), StoreError> {
        self.mutate(|state| {
            state.create_session(session);
            Ok(())
        })
        .await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        self.inner.get_session(session_id).await
    }

    async fn modify_session(
        &self,
        session_id: &str,
        mutate: SessionMutation,
    ) -> Result<Session, StoreError> {
        self.mutate(|state| state.modify_session(session_id, mutate)).await
    }

    async fn append_thought(&self, thought: Thought) -> Result<(), StoreError> {
        self.mutate(|state| state.append_thought(thought)).await
    }

    async fn append_action(&self, action: Action) -> Result<(), StoreError> {
        self.mutate(|state| state.append_action(action)).await
    }

    async fn append_feedback(&self, feedback: Feedback) -> Result<(), StoreError> {
        self.mutate(|state| state.append_feedback(feedback)).await
    }

    async fn list_thoughts(&self, session_id: &str) -> Result<Vec<Thought>, StoreError> {
        self.inner.list_thoughts(session_id).await
    }

    async fn list_actions(&self, session_id: &str) -> Result<Vec<Action>, StoreError> {
        self.inner.list_actions(session_id).await
    }

    async fn list_feedback(&self, session_id: &str) -> Result<Vec<Feedback>, StoreError> {
        self.inner.list_feedback(session_id).await
    }

    async fn save_recommendation(&self, record: RecommendationRecord) -> Result<(), StoreError> {
        self.mutate(|state| state.save_recommendation(record)).await
    }

    async fn list_recommendations(
        &self,
        session_id: &str,
    ) -> Result<Vec<RecommendationRecord>, StoreError> {
        self.inner.list_recommendations(session_id).await
    }

    async fn save_investigation(&self, record: InvestigationRecord) -> Result<(), StoreError> {
        self.mutate(|state| state.save_investigation(record)).await
    }

    async fn update_investigation(&self, record: InvestigationRecord) -> Result<(), StoreError> {
        self.mutate(|state| state.update_investigation(record)).await
    }

    async fn latest_investigation(
        &self,
        subject_id: &str,
    ) -> Result<Option<InvestigationRecord>, StoreError> {
        self.inner.latest_investigation(subject_id).await
    }
}
