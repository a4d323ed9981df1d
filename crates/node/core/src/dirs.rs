//! Directory management for podscope.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use eyre::{Result, eyre};

use crate::args::DataDirArgs;
use crate::constants::{CONFIG_FILE_NAME, FALLBACK_DATA_DIR};

/// Returns the default project directories for podscope.
pub fn default_project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "podscope", "podscope")
}

/// Returns the default data directory path.
pub fn default_data_dir() -> Option<PathBuf> {
    default_project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Data directory holding the config file and the store.
#[derive(Debug, Clone)]
pub struct DataDirs {
    pub root: PathBuf,
}

impl DataDirs {
    /// Resolve the data directory from `args` and make sure it exists.
    pub fn new(args: &DataDirArgs) -> Result<Self> {
        let root = args.datadir.clone().unwrap_or_else(|| {
            default_data_dir().unwrap_or_else(|| PathBuf::from(FALLBACK_DATA_DIR))
        });

        fs::create_dir_all(&root)
            .map_err(|e| eyre!("Failed to create directory {}: {}", root.display(), e))?;

        Ok(Self { root })
    }

    /// Returns the path to the config file.
    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// Returns the path of a store file. Relative names live in the data
    /// directory.
    pub fn store_file(&self, name: &Path) -> PathBuf {
        if name.is_absolute() {
            name.to_path_buf()
        } else {
            self.root.join(name)
        }
    }
}
