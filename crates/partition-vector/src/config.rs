//! Configuration for partition-vector.

use std::path::PathBuf;

/// Configuration for the vector database.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Directory holding the database. If None, data is kept in memory only.
    pub data_path: Option<PathBuf>,

    /// Maximum number of vectors per collection (0 = unlimited).
    pub max_vectors: usize,
}

impl Config {
    /// Create an in-memory configuration.
    ///
    /// Data will not be persisted and will be lost when the process exits.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a persistent configuration rooted at `path`.
    ///
    /// Collections found under the path are loaded when the database opens.
    pub fn persistent<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            data_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Set the maximum number of vectors per collection.
    pub fn with_max_vectors(mut self, max: usize) -> Self {
        self.max_vectors = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_config() {
        let config = Config::memory();
        assert!(config.data_path.is_none());
        assert_eq!(config.max_vectors, 0);
    }

    #[test]
    fn test_persistent_config() {
        let config = Config::persistent("/tmp/vectors").with_max_vectors(10);
        assert_eq!(config.data_path, Some(PathBuf::from("/tmp/vectors")));
        assert_eq!(config.max_vectors, 10);
    }
}
