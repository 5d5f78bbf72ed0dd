//! In-memory session registry.

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use taskstream_core::TaskId;
use thiserror::Error;

use crate::TaskSession;

/// Registry error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),
    #[error("Task already registered: {0}")]
    DuplicateTask(TaskId),
}

/// Mapping from task id to live session.
///
/// Single-process and not persisted: entries are lost on restart.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<TaskId, Arc<TaskSession>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TaskId, Arc<TaskSession>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TaskId, Arc<TaskSession>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a session under its task id.
    ///
    /// # Errors
    /// Returns `DuplicateTask` if the id is already registered.
    pub fn register(&self, session: Arc<TaskSession>) -> Result<(), RegistryError> {
        match self.write().entry(session.task_id().clone()) {
            Entry::Occupied(entry) => Err(RegistryError::DuplicateTask(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(session);
                Ok(())
            }
        }
    }

    /// Find a session by task id.
    ///
    /// # Errors
    /// Returns `TaskNotFound` if no such session is registered.
    pub fn lookup(&self, task_id: &str) -> Result<Arc<TaskSession>, RegistryError> {
        self.read()
            .get(task_id)
            .cloned()
            .ok_or_else(|| RegistryError::TaskNotFound(task_id.into()))
    }

    /// Remove a session. Removing an absent id is a no-op.
    pub fn remove(&self, task_id: &str) -> Option<Arc<TaskSession>> {
        self.write().remove(task_id)
    }

    #[must_use]
    pub fn contains(&self, task_id: &str) -> bool {
        self.read().contains_key(task_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
