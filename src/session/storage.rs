use crate::session::Session;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Session storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Session storage is corrupted: {0}")]
    Corrupted(#[from] serde_json::Error),
}

/// 세션을 재시작 이후에도 유지하기 위한 영속 저장소
///
/// 시스템에서 영속되는 상태는 세션 하나 뿐이다.
pub trait SessionStorage: Send + Sync {
    fn load(&self) -> Result<Option<Session>, StorageError>;

    fn save(&self, session: &Session) -> Result<(), StorageError>;

    fn clear(&self) -> Result<(), StorageError>;
}

/// 세션을 JSON 파일 하나로 저장한다.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileStorage { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<Option<Session>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, session: &Session) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, text)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// 프로세스 메모리에만 유지되는 저장소
#[derive(Default)]
pub struct MemoryStorage {
    session: Mutex<Option<Session>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    pub fn with_session(session: Session) -> Self {
        MemoryStorage { session: Mutex::new(Some(session)) }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Session>, StorageError> {
        Ok(self.slot().clone())
    }

    fn save(&self, session: &Session) -> Result<(), StorageError> {
        *self.slot() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.slot() = None;
        Ok(())
    }
}
