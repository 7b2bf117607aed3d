//! Boundary to the external ReLiK command line.
//!
//! The toolkit is a black box that reads and writes JSONL files. This module
//! only knows how to phrase the three batch calls the pipeline needs and how
//! to run them as child processes.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Command,
};

use tracing::info;

use crate::{
    config::{RetrieverConfig, ToolkitConfig},
    data_dir::ensure_parent,
    error::{Error, Result},
};

/// One batch call into the toolkit.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// Split documents into model-sized windows.
    CreateWindows { input: PathBuf, output: PathBuf },
    /// Attach retrieved candidate entities to every window.
    AddCandidates {
        input: PathBuf,
        output: PathBuf,
        retriever: RetrieverConfig,
    },
    /// Train the reader on the candidate files.
    TrainReader {
        config: PathBuf,
        train: PathBuf,
        val: PathBuf,
        test: PathBuf,
    },
}

fn assignment(key: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(key);
    arg.push("=");
    arg.push(path);
    arg
}

impl Invocation {
    /// Command-line arguments following the program name.
    pub fn args(&self) -> Vec<OsString> {
        match self {
            Invocation::CreateWindows { input, output } => vec![
                "data".into(),
                "create-windows".into(),
                input.into(),
                output.into(),
            ],
            Invocation::AddCandidates {
                input,
                output,
                retriever,
            } => vec![
                "retriever".into(),
                "add-candidates".into(),
                (&retriever.question_encoder).into(),
                (&retriever.document_index).into(),
                input.into(),
                output.into(),
                "--top-k".into(),
                retriever.top_k.to_string().into(),
                "--batch-size".into(),
                retriever.batch_size.to_string().into(),
                "--num-workers".into(),
                retriever.num_workers.to_string().into(),
                "--device".into(),
                (&retriever.device).into(),
                "--precision".into(),
                (&retriever.precision).into(),
            ],
            Invocation::TrainReader {
                config,
                train,
                val,
                test,
            } => vec![
                "reader".into(),
                "train".into(),
                config.into(),
                assignment("train_dataset_path", train),
                assignment("val_dataset_path", val),
                assignment("test_dataset_path", test),
            ],
        }
    }

    /// File the invocation produces, if it writes one.
    pub fn output(&self) -> Option<&Path> {
        match self {
            Invocation::CreateWindows { output, .. }
            | Invocation::AddCandidates { output, .. } => {
                Some(output.as_path())
            }
            Invocation::TrainReader { .. } => None,
        }
    }
}

/// Runs toolkit invocations.
pub trait Toolkit {
    fn run(&self, invocation: &Invocation) -> Result<()>;
}

/// Runs the toolkit as a child process and waits for it.
#[derive(Debug, Clone)]
pub struct ProcessToolkit {
    program: PathBuf,
    prefix_args: Vec<String>,
}

impl ProcessToolkit {
    pub fn new(config: &ToolkitConfig) -> Self {
        Self {
            program: config.program.clone(),
            prefix_args: config.prefix_args.clone(),
        }
    }

    fn full_args(&self, invocation: &Invocation) -> Vec<OsString> {
        self.prefix_args
            .iter()
            .map(OsString::from)
            .chain(invocation.args())
            .collect()
    }

    /// Human-readable command line, for logs and errors.
    pub fn command_line(&self, invocation: &Invocation) -> String {
        std::iter::once(self.program.as_os_str().to_os_string())
            .chain(self.full_args(invocation))
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Toolkit for ProcessToolkit {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        if let Some(output) = invocation.output() {
            ensure_parent(output)?;
        }

        let command_line = self.command_line(invocation);
        info!(command = %command_line, "running toolkit");

        let status = Command::new(&self.program)
            .args(self.full_args(invocation))
            .status()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::NotFound {
                        kind: "toolkit program",
                        name: self.program.display().to_string(),
                    }
                } else {
                    Error::Io(e)
                }
            })?;

        if !status.success() {
            return Err(Error::Toolkit {
                command: command_line,
                status: status.to_string(),
            });
        }
        Ok(())
    }
}
