//! Pipeline configuration.
//!
//! Every tunable of the pipeline lives in [`PipelineConfig`]. A TOML file may
//! override any subset of fields; missing fields keep their defaults.
//!
//! ```toml
//! data_dir = "data"
//!
//! [retriever]
//! top_k = 50
//! device = "cuda"
//!
//! [stages]
//! candidates = true
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{
    data_dir::DEFAULT_DATASET,
    error::{Error, Result},
};

pub const CONFIG_ENV_VAR: &str = "RELIK_PREP_CONFIG";

pub const DEFAULT_QUESTION_ENCODER: &str =
    "sapienzanlp/relik-retriever-e5-base-v2-aida-blink-encoder";
pub const DEFAULT_DOCUMENT_INDEX: &str =
    "sapienzanlp/relik-retriever-e5-base-v2-aida-blink-wikipedia-index";
pub const DEFAULT_READER_CONFIG: &str = "relik/reader/conf/large.yaml";
pub const DEFAULT_PROGRAM: &str = "relik";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Data directory root; overridden by `--data-dir` and
    /// `RELIK_PREP_DATA_DIR`.
    pub data_dir: Option<PathBuf>,
    /// Raw dataset directory below `<data_dir>/raw`.
    pub dataset: String,
    pub toolkit: ToolkitConfig,
    pub retriever: RetrieverConfig,
    pub reader: ReaderConfig,
    pub stages: StageConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            dataset: DEFAULT_DATASET.to_string(),
            toolkit: ToolkitConfig::default(),
            retriever: RetrieverConfig::default(),
            reader: ReaderConfig::default(),
            stages: StageConfig::default(),
        }
    }
}

/// How to reach the ReLiK command line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolkitConfig {
    /// Executable name or path.
    pub program: PathBuf,
    /// Arguments placed before every subcommand, e.g. `["-m", "relik"]`
    /// when `program` is a Python interpreter.
    pub prefix_args: Vec<String>,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            prefix_args: Vec::new(),
        }
    }
}

/// Candidate retrieval settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrieverConfig {
    pub question_encoder: String,
    pub document_index: String,
    pub top_k: u32,
    pub batch_size: u32,
    pub num_workers: u32,
    /// `cpu` or `cuda`.
    pub device: String,
    /// `fp32`, or `fp16` on GPU.
    pub precision: String,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            question_encoder: DEFAULT_QUESTION_ENCODER.to_string(),
            document_index: DEFAULT_DOCUMENT_INDEX.to_string(),
            top_k: 100,
            batch_size: 128,
            num_workers: 4,
            device: "cpu".to_string(),
            precision: "fp32".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderConfig {
    /// Reader training configuration handed to `reader train`.
    pub config_path: PathBuf,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_READER_CONFIG),
        }
    }
}

/// Which pipeline stages run. Candidate retrieval and reader training need
/// a working toolkit install and are off by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageConfig {
    pub convert: bool,
    pub check: bool,
    pub windows: bool,
    pub candidates: bool,
    pub train_reader: bool,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            convert: true,
            check: true,
            windows: true,
            candidates: false,
            train_reader: false,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound {
                    kind: "config file",
                    name: path.display().to_string(),
                }
            } else {
                Error::Io(e)
            }
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load from an explicit path, else from `RELIK_PREP_CONFIG`, else use
    /// the defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.dataset.trim().is_empty() {
            return Err(Error::Config("dataset must not be empty".into()));
        }
        if self.retriever.top_k == 0 {
            return Err(Error::Config(
                "retriever.top_k must be positive".into(),
            ));
        }
        if self.retriever.batch_size == 0 {
            return Err(Error::Config(
                "retriever.batch_size must be positive".into(),
            ));
        }
        if self.toolkit.program.as_os_str().is_empty() {
            return Err(Error::Config(
                "toolkit.program must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.retriever.top_k, 100);
        assert_eq!(config.retriever.batch_size, 128);
        assert_eq!(config.retriever.num_workers, 4);
        assert_eq!(config.retriever.device, "cpu");
        assert_eq!(config.retriever.precision, "fp32");
        assert!(config.stages.convert && config.stages.windows);
        assert!(!config.stages.candidates && !config.stages.train_reader);
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            data_dir = "/srv/data"

            [retriever]
            top_k = 20
            device = "cuda"

            [stages]
            candidates = true
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/data")));
        assert_eq!(config.retriever.top_k, 20);
        assert_eq!(config.retriever.device, "cuda");
        assert_eq!(config.retriever.question_encoder, DEFAULT_QUESTION_ENCODER);
        assert!(config.stages.candidates);
        assert!(config.stages.convert);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = PipelineConfig::from_toml_str("[retriever]\ntopk = 5\n")
            .unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = PipelineConfig::from_toml_str("[retriever]\ntop_k = 0\n")
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err =
            PipelineConfig::load(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn load_reads_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("relik-prep.toml");
        std::fs::write(
            &path,
            "[toolkit]\nprogram = \"python\"\nprefix_args = [\"-m\", \"relik\"]\n",
        )
        .unwrap();
        let config = PipelineConfig::resolve(Some(&path)).unwrap();
        assert_eq!(config.toolkit.program, PathBuf::from("python"));
        assert_eq!(config.toolkit.prefix_args, vec!["-m", "relik"]);
    }
}
