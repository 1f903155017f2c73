use crate::{
    config::{ScoreboardSource, STATUS_FILE_PREFIX},
    core::models::WorkerId,
    error::ScoreboardError,
};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Snapshot of every record currently on a scoreboard, keyed by worker pid
pub type ScoreboardSnapshot = BTreeMap<WorkerId, Vec<u8>>;

/// 记分板的统一读取接口
/// Workers own their records; the readiness reporter only ever reads.
pub trait Scoreboard: Send + Sync {
    /// Complete current key set with the raw bytes stored for each worker.
    fn fetch_all(&self) -> Result<ScoreboardSnapshot, ScoreboardError>;
}

/// Open the scoreboard described by configuration
pub fn open_scoreboard(source: &ScoreboardSource) -> Result<Arc<dyn Scoreboard>, ScoreboardError> {
    match source {
        ScoreboardSource::Directory { path } => Ok(Arc::new(DirectoryScoreboard::open(path)?)),
    }
}

/// One `status_<pid>` file per worker inside a base directory
#[derive(Debug, Clone)]
pub struct DirectoryScoreboard {
    base_dir: PathBuf,
}

impl DirectoryScoreboard {
    /// Open (creating when needed) the scoreboard directory
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self, ScoreboardError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(|source| ScoreboardError::Directory {
            path: base_dir.clone(),
            source,
        })?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn status_path(&self, pid: WorkerId) -> PathBuf {
        self.base_dir.join(format!("{STATUS_FILE_PREFIX}{pid}"))
    }

    /// Publish a worker's record. The write goes through a temp file and a
    /// rename so readers never observe a partially written record.
    pub fn update(&self, pid: WorkerId, record: &[u8]) -> Result<(), ScoreboardError> {
        let write_err = |source| ScoreboardError::Write {
            pid: pid.as_u32(),
            source,
        };
        let tmp = self.base_dir.join(format!(".{STATUS_FILE_PREFIX}{pid}.tmp"));
        fs::write(&tmp, record).map_err(write_err)?;
        fs::rename(&tmp, self.status_path(pid)).map_err(write_err)
    }

    pub fn remove(&self, pid: WorkerId) -> Result<(), ScoreboardError> {
        match fs::remove_file(self.status_path(pid)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ScoreboardError::Write {
                pid: pid.as_u32(),
                source,
            }),
        }
    }
}

impl Scoreboard for DirectoryScoreboard {
    fn fetch_all(&self) -> Result<ScoreboardSnapshot, ScoreboardError> {
        let entries = fs::read_dir(&self.base_dir).map_err(|source| ScoreboardError::Directory {
            path: self.base_dir.clone(),
            source,
        })?;

        let mut snapshot = ScoreboardSnapshot::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(pid) = name
                .to_str()
                .and_then(|name| name.strip_prefix(STATUS_FILE_PREFIX))
                .and_then(|pid| pid.parse::<WorkerId>().ok())
            else {
                continue;
            };

            // The worker may exit and remove its file between listing and reading
            match fs::read(entry.path()) {
                Ok(bytes) => {
                    snapshot.insert(pid, bytes);
                }
                Err(err) => debug!(pid = %pid, error = %err, "skipping unreadable status file"),
            }
        }

        Ok(snapshot)
    }
}

/// 进程内记分板（线程安全）
/// For embedding the reporter in the supervisor itself, and for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryScoreboard {
    records: Arc<DashMap<WorkerId, Vec<u8>>>,
}

impl InMemoryScoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, pid: WorkerId, record: impl Into<Vec<u8>>) {
        self.records.insert(pid, record.into());
    }

    pub fn remove(&self, pid: WorkerId) {
        self.records.remove(&pid);
    }
}

impl Scoreboard for InMemoryScoreboard {
    fn fetch_all(&self) -> Result<ScoreboardSnapshot, ScoreboardError> {
        Ok(self
            .records
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_directory_scoreboard_reads_status_files() {
        let dir = tempfile::tempdir().unwrap();
        let board = DirectoryScoreboard::open(dir.path()).unwrap();
        board
            .update(WorkerId::new(200), br#"{"status":"A"}"#)
            .unwrap();
        board.update(WorkerId::new(100), b"").unwrap();

        let snapshot = board.fetch_all().unwrap();
        let keys: Vec<WorkerId> = snapshot.keys().copied().collect();
        assert_eq!(keys, vec![WorkerId::new(100), WorkerId::new(200)]);
        assert_eq!(snapshot[&WorkerId::new(200)], br#"{"status":"A"}"#.to_vec());
        assert!(snapshot[&WorkerId::new(100)].is_empty());
    }

    #[test]
    fn test_directory_scoreboard_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("status_abc"), b"{}").unwrap();
        fs::write(dir.path().join("notes.txt"), b"{}").unwrap();
        fs::write(dir.path().join(".status_5.tmp"), b"{}").unwrap();
        fs::write(dir.path().join("status_42"), b"{}").unwrap();

        let board = DirectoryScoreboard::open(dir.path()).unwrap();
        let snapshot = board.fetch_all().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key(&WorkerId::new(42)));
    }

    #[test]
    fn test_directory_scoreboard_update_overwrites_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let board = DirectoryScoreboard::open(dir.path().join("nested")).unwrap();
        let pid = WorkerId::new(7);

        board.update(pid, br#"{"status":"A"}"#).unwrap();
        board.update(pid, br#"{"status":"_"}"#).unwrap();
        assert_eq!(board.fetch_all().unwrap()[&pid], br#"{"status":"_"}"#.to_vec());

        board.remove(pid).unwrap();
        board.remove(pid).unwrap();
        assert!(board.fetch_all().unwrap().is_empty());
    }

    #[test]
    fn test_directory_scoreboard_failed_update_keeps_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let board = DirectoryScoreboard::open(dir.path()).unwrap();
        let pid = WorkerId::new(8);
        board.update(pid, br#"{"status":"_"}"#).unwrap();

        // occupy the temp path so the next write cannot happen
        fs::create_dir(dir.path().join(".status_8.tmp")).unwrap();
        let result = board.update(pid, br#"{"status":"A"}"#);

        assert!(matches!(result, Err(ScoreboardError::Write { pid: 8, .. })));
        assert_eq!(board.fetch_all().unwrap()[&pid], br#"{"status":"_"}"#.to_vec());
    }

    #[test]
    fn test_in_memory_scoreboard() {
        let board = InMemoryScoreboard::new();
        board.update(WorkerId::new(3), r#"{"status":"A"}"#);
        board.update(WorkerId::new(1), "");
        board.remove(WorkerId::new(3));

        let snapshot = board.fetch_all().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key(&WorkerId::new(1)));
    }

    #[test]
    fn test_open_scoreboard_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScoreboardSource::Directory {
            path: dir.path().to_path_buf(),
        };
        let board = open_scoreboard(&source).unwrap();
        assert!(board.fetch_all().unwrap().is_empty());
    }
}
