use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::error::{Error, Result};

pub const DATA_DIR_ENV_VAR: &str = "RELIK_PREP_DATA_DIR";

/// Directory holding the raw dataset, relative to `<root>/raw`.
pub const DEFAULT_DATASET: &str = "annoctr/linking_mitre_only";

/// One of the three disjoint data partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Split::Train),
            "val" | "dev" => Ok(Split::Val),
            "test" => Ok(Split::Test),
            other => Err(Error::Config(format!(
                "unknown split '{other}' (expected train, val or test)"
            ))),
        }
    }
}

/// On-disk layout of every pipeline stage's inputs and outputs.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
    dataset: String,
}

impl DataDir {
    /// Resolve the data directory from, in order of priority:
    /// 1. An explicit path (from --data-dir)
    /// 2. The RELIK_PREP_DATA_DIR environment variable
    /// 3. The `data_dir` setting of the config file
    /// 4. `./data`
    pub fn resolve(
        explicit: Option<&Path>,
        configured: Option<&Path>,
        dataset: &str,
    ) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var(DATA_DIR_ENV_VAR) {
            PathBuf::from(val)
        } else if let Some(path) = configured {
            path.to_path_buf()
        } else {
            PathBuf::from("data")
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;

        Ok(Self::new(root, dataset))
    }

    pub fn new(root: impl Into<PathBuf>, dataset: &str) -> Self {
        Self {
            root: root.into(),
            dataset: dataset.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw").join(&self.dataset)
    }

    pub fn raw_split(&self, split: Split) -> PathBuf {
        self.raw_dir().join(format!("{split}.jsonl"))
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join("processed").join("relik")
    }

    pub fn processed_split(&self, split: Split) -> PathBuf {
        self.processed_dir().join(format!("{split}.jsonl"))
    }

    pub fn windowed_split(&self, split: Split) -> PathBuf {
        self.root
            .join("windowed")
            .join("relik")
            .join(format!("{split}.window.jsonl"))
    }

    pub fn candidates_split(&self, split: Split) -> PathBuf {
        self.root
            .join("candidates")
            .join("relik")
            .join(format!("{split}.window.candidates.jsonl"))
    }

    pub fn technique_catalog(&self) -> PathBuf {
        self.root.join("index").join("mitre_documents.jsonl")
    }
}

/// Create the parent directory of `path` if it has one.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|_| Error::DataDir(parent.to_path_buf()))?;
    }
    Ok(())
}
