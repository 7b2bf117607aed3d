//! Sequential driver for the whole preparation pipeline.
//!
//! Stages run in a fixed order: convert, check, windows, candidates,
//! reader training. Each stage is toggled by [`StageConfig`]; a stage whose
//! per-split input is missing skips that split and moves on.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::{
    check::{SplitCheck, check_split},
    config::{PipelineConfig, StageConfig},
    convert::{SplitReport, convert_splits},
    data_dir::{DataDir, Split},
    error::{Error, Result},
    toolkit::{Invocation, Toolkit},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Ran { output: PathBuf },
    MissingInput { input: PathBuf },
}

/// One per-split toolkit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolkitStep {
    pub split: Split,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageReport {
    Convert(Vec<SplitReport>),
    Check(Vec<SplitCheck>),
    Windows(Vec<ToolkitStep>),
    Candidates(Vec<ToolkitStep>),
    TrainReader,
}

impl StageReport {
    pub fn name(&self) -> &'static str {
        match self {
            StageReport::Convert(_) => "convert",
            StageReport::Check(_) => "check",
            StageReport::Windows(_) => "windows",
            StageReport::Candidates(_) => "candidates",
            StageReport::TrainReader => "train-reader",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
}

pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    data_dir: &'a DataDir,
    toolkit: &'a dyn Toolkit,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        data_dir: &'a DataDir,
        toolkit: &'a dyn Toolkit,
    ) -> Self {
        Self {
            config,
            data_dir,
            toolkit,
        }
    }

    /// Run every enabled stage in order.
    ///
    /// All three raw split files must exist before anything runs.
    pub fn run(&self, stages: StageConfig) -> Result<PipelineReport> {
        self.require_raw_splits()?;
        let mut report = PipelineReport::default();

        if stages.convert {
            info!("stage: convert");
            let splits = convert_splits(self.data_dir, &Split::ALL)?;
            report.stages.push(StageReport::Convert(splits));
        }

        if stages.check {
            info!("stage: check");
            let checks = Split::ALL
                .iter()
                .map(|&split| check_split(self.data_dir, split))
                .collect::<Result<Vec<_>>>()?;
            report.stages.push(StageReport::Check(checks));
        }

        if stages.windows {
            info!("stage: windows");
            let steps = self.per_split(|split| {
                let input = self.data_dir.processed_split(split);
                let output = self.data_dir.windowed_split(split);
                (input.clone(), Invocation::CreateWindows { input, output })
            })?;
            report.stages.push(StageReport::Windows(steps));
        }

        if stages.candidates {
            info!("stage: candidates");
            let steps = self.per_split(|split| {
                let input = self.data_dir.windowed_split(split);
                let invocation = Invocation::AddCandidates {
                    input: input.clone(),
                    output: self.data_dir.candidates_split(split),
                    retriever: self.config.retriever.clone(),
                };
                (input, invocation)
            })?;
            report.stages.push(StageReport::Candidates(steps));
        }

        if stages.train_reader {
            info!("stage: train-reader");
            self.toolkit.run(&Invocation::TrainReader {
                config: self.config.reader.config_path.clone(),
                train: self.data_dir.candidates_split(Split::Train),
                val: self.data_dir.candidates_split(Split::Val),
                test: self.data_dir.candidates_split(Split::Test),
            })?;
            report.stages.push(StageReport::TrainReader);
        }

        Ok(report)
    }

    fn require_raw_splits(&self) -> Result<()> {
        for split in Split::ALL {
            let path = self.data_dir.raw_split(split);
            if !path.is_file() {
                return Err(Error::NotFound {
                    kind: "raw split file",
                    name: path.display().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Run one invocation per split whose input exists. `step_for` returns
    /// the split's input file together with the call that consumes it.
    fn per_split<F>(&self, step_for: F) -> Result<Vec<ToolkitStep>>
    where
        F: Fn(Split) -> (PathBuf, Invocation),
    {
        let mut steps = Vec::with_capacity(Split::ALL.len());
        for split in Split::ALL {
            let (input, invocation) = step_for(split);
            if !input.is_file() {
                warn!(
                    %split,
                    input = %input.display(),
                    "missing input, skipping split"
                );
                steps.push(ToolkitStep {
                    split,
                    outcome: StepOutcome::MissingInput { input },
                });
                continue;
            }

            self.toolkit.run(&invocation)?;
            let output = invocation
                .output()
                .map(PathBuf::from)
                .unwrap_or_default();
            steps.push(ToolkitStep {
                split,
                outcome: StepOutcome::Ran { output },
            });
        }
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::{check::CheckOutcome, convert::SplitOutcome};

    /// Records invocations and touches their output files.
    #[derive(Default)]
    struct RecordingToolkit {
        calls: RefCell<Vec<Invocation>>,
    }

    impl Toolkit for RecordingToolkit {
        fn run(&self, invocation: &Invocation) -> Result<()> {
            if let Some(output) = invocation.output() {
                crate::data_dir::ensure_parent(output)?;
                std::fs::write(output, "")?;
            }
            self.calls.borrow_mut().push(invocation.clone());
            Ok(())
        }
    }

    struct FailingToolkit;

    impl Toolkit for FailingToolkit {
        fn run(&self, _invocation: &Invocation) -> Result<()> {
            Err(Error::Toolkit {
                command: "relik".into(),
                status: "exit status: 1".into(),
            })
        }
    }

    fn fixture() -> (tempfile::TempDir, DataDir) {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = DataDir::new(tmp.path(), "annoctr");
        std::fs::create_dir_all(data_dir.raw_dir()).unwrap();
        for split in Split::ALL {
            std::fs::write(
                data_dir.raw_split(split),
                "{\"mention\":\"Foo\",\"context_left\":\"abc \",\"context_right\":\" bar\"}\n",
            )
            .unwrap();
        }
        (tmp, data_dir)
    }

    #[test]
    fn missing_raw_split_fails_before_any_stage() {
        let (_tmp, data_dir) = fixture();
        std::fs::remove_file(data_dir.raw_split(Split::Val)).unwrap();
        let config = PipelineConfig::default();
        let toolkit = RecordingToolkit::default();

        let err = Pipeline::new(&config, &data_dir, &toolkit)
            .run(StageConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "raw split file", .. }));
        assert!(!data_dir.processed_split(Split::Train).exists());
        assert!(toolkit.calls.borrow().is_empty());
    }

    #[test]
    fn default_stages_convert_check_and_window() {
        let (_tmp, data_dir) = fixture();
        let config = PipelineConfig::default();
        let toolkit = RecordingToolkit::default();

        let report = Pipeline::new(&config, &data_dir, &toolkit)
            .run(StageConfig::default())
            .unwrap();
        let names: Vec<_> =
            report.stages.iter().map(StageReport::name).collect();
        assert_eq!(names, vec!["convert", "check", "windows"]);

        match &report.stages[0] {
            StageReport::Convert(splits) => {
                for split in splits {
                    assert!(matches!(
                        &split.outcome,
                        SplitOutcome::Converted { stats, .. }
                            if stats.written == 1
                    ));
                }
            }
            other => panic!("unexpected stage {other:?}"),
        }
        match &report.stages[1] {
            StageReport::Check(checks) => {
                for check in checks {
                    assert!(matches!(
                        &check.outcome,
                        CheckOutcome::Checked(r) if r.checked == 1 && r.bad == 0
                    ));
                }
            }
            other => panic!("unexpected stage {other:?}"),
        }

        let calls = toolkit.calls.borrow();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls[0],
            Invocation::CreateWindows {
                input: data_dir.processed_split(Split::Train),
                output: data_dir.windowed_split(Split::Train),
            }
        );
    }

    #[test]
    fn all_stages_run_in_order() {
        let (_tmp, data_dir) = fixture();
        let config = PipelineConfig::default();
        let toolkit = RecordingToolkit::default();
        let stages = StageConfig {
            candidates: true,
            train_reader: true,
            ..StageConfig::default()
        };

        Pipeline::new(&config, &data_dir, &toolkit)
            .run(stages)
            .unwrap();

        let calls = toolkit.calls.borrow();
        assert_eq!(calls.len(), 7);
        assert!(matches!(calls[3], Invocation::AddCandidates { .. }));
        assert_eq!(
            calls[6],
            Invocation::TrainReader {
                config: config.reader.config_path.clone(),
                train: data_dir.candidates_split(Split::Train),
                val: data_dir.candidates_split(Split::Val),
                test: data_dir.candidates_split(Split::Test),
            }
        );
    }

    #[test]
    fn toolkit_stage_skips_missing_inputs() {
        let (_tmp, data_dir) = fixture();
        let config = PipelineConfig::default();
        let toolkit = RecordingToolkit::default();
        let stages = StageConfig {
            convert: false,
            check: false,
            windows: false,
            candidates: true,
            train_reader: false,
        };

        let report = Pipeline::new(&config, &data_dir, &toolkit)
            .run(stages)
            .unwrap();
        match &report.stages[..] {
            [StageReport::Candidates(steps)] => {
                assert!(steps.iter().all(|s| matches!(
                    s.outcome,
                    StepOutcome::MissingInput { .. }
                )));
            }
            other => panic!("unexpected stages {other:?}"),
        }
        assert!(toolkit.calls.borrow().is_empty());
    }

    #[test]
    fn toolkit_failure_aborts_the_run() {
        let (_tmp, data_dir) = fixture();
        let config = PipelineConfig::default();
        let err = Pipeline::new(&config, &data_dir, &FailingToolkit)
            .run(StageConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::Toolkit { .. }));
        assert!(data_dir.processed_split(Split::Test).is_file());
    }
}
