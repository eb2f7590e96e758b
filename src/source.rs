//! Task sources: where a scope's initial collection comes from.

use crate::error::Result;
use crate::storage::Storage;
use crate::task::{Scope, Task, TaskCollection};

pub trait TaskSource {
    fn load(&self, scope: &Scope) -> Result<Vec<Task>>;

    /// Loads and validates a scope's collection.
    fn collection(&self, scope: &Scope) -> Result<TaskCollection> {
        TaskCollection::new(self.load(scope)?)
    }
}

/// Reads scopes from the board data file.
#[derive(Debug, Clone)]
pub struct FileTaskSource {
    storage: Storage,
}

impl FileTaskSource {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

impl TaskSource for FileTaskSource {
    fn load(&self, scope: &Scope) -> Result<Vec<Task>> {
        self.storage.load_scope(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BoardFile;
    use tempfile::TempDir;

    #[test]
    fn loads_only_requested_scope() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        storage.write_board(&BoardFile::sample()).unwrap();

        let source = FileTaskSource::new(storage);
        let sprint = source.collection(&Scope::Sprint("1".to_string())).unwrap();
        assert_eq!(sprint.len(), 5);
        assert!(source
            .collection(&Scope::Sprint("2".to_string()))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn missing_file_yields_empty_collection() {
        let temp = TempDir::new().unwrap();
        let source = FileTaskSource::new(Storage::new(temp.path()));
        assert!(source.collection(&Scope::Backlog).unwrap().is_empty());
    }
}
