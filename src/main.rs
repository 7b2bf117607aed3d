use clap::Parser;
use relik_prep::{
    DataDir,
    PipelineConfig,
    catalog,
    check::{self, CheckOutcome, CheckReport},
    cli::{self, Cli, Command},
    config::StageConfig,
    convert::{self, SplitOutcome},
    error,
    inspect::{self, InspectOutcome, InspectReport},
    pipeline::{Pipeline, StageReport, StepOutcome},
    toolkit::ProcessToolkit,
};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("RELIK_PREP_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let config = PipelineConfig::resolve(cli.config.as_deref())?;
    let data_dir = DataDir::resolve(
        cli.data_dir.as_deref(),
        config.data_dir.as_deref(),
        &config.dataset,
    )?;

    match cli.command {
        Command::Convert(args) => cmd_convert(&data_dir, &args)?,
        Command::Check(args) => cmd_check(&data_dir, &args)?,
        Command::Inspect(args) => cmd_inspect(&data_dir, &args)?,
        Command::Catalog => cmd_catalog(&data_dir)?,
        Command::Run(args) => cmd_run(&config, &data_dir, &args)?,
        Command::Completions(_) => {}
    }

    Ok(())
}

fn cmd_convert(
    data_dir: &DataDir,
    args: &cli::SplitArgs,
) -> error::Result<()> {
    let reports = convert::convert_splits(data_dir, &args.selected())?;
    for report in &reports {
        print_split_report(report);
    }
    println!("conversion done.");
    Ok(())
}

fn print_split_report(report: &convert::SplitReport) {
    let split = report.split;
    match &report.outcome {
        SplitOutcome::MissingInput { input } => {
            println!("[{split}] missing input: {}", input.display());
        }
        SplitOutcome::Converted { output, stats } => {
            println!(
                "[{split}] wrote {} examples -> {} (dropped={}: missing_mention={}, unlocatable={}, malformed={}; recovered={})",
                stats.written,
                output.display(),
                stats.dropped(),
                stats.missing_mention,
                stats.unlocatable,
                stats.malformed,
                stats.recovered,
            );
        }
    }
}

fn cmd_check(data_dir: &DataDir, args: &cli::CheckArgs) -> error::Result<()> {
    let mut reports: Vec<(String, CheckReport)> = Vec::new();

    if let Some(ref input) = args.input {
        if !input.is_file() {
            return Err(error::Error::NotFound {
                kind: "file",
                name: input.display().to_string(),
            });
        }
        let report = check::check_file(input)?;
        reports.push((input.display().to_string(), report));
    } else {
        for split in args.splits.selected() {
            let result = check::check_split(data_dir, split)?;
            match result.outcome {
                CheckOutcome::MissingInput => {
                    println!(
                        "[{split}] nothing to check: {}",
                        result.path.display()
                    );
                }
                CheckOutcome::Checked(report) => {
                    reports.push((split.to_string(), report));
                }
            }
        }
    }

    for (name, report) in &reports {
        print_check_report(name, report);
    }

    let bad: usize = reports.iter().map(|(_, r)| r.bad).sum();
    if args.strict && bad > 0 {
        return Err(error::Error::Config(format!(
            "{bad} record(s) with inconsistent spans"
        )));
    }
    Ok(())
}

fn print_check_report(name: &str, report: &CheckReport) {
    for mismatch in &report.mismatches {
        println!(
            "BAD [{name}:{}] doc_id={}: {:?} vs {:?} label={}",
            mismatch.line,
            mismatch.doc_id,
            mismatch.extracted,
            mismatch.mention,
            mismatch.label.as_deref().unwrap_or("None"),
        );
    }
    println!(
        "[{name}] checked: {} bad: {} malformed: {}",
        report.checked, report.bad, report.malformed
    );
}

fn cmd_inspect(
    data_dir: &DataDir,
    args: &cli::InspectArgs,
) -> error::Result<()> {
    println!("== AnnoCTR inspector (heuristic, not authoritative) ==");
    for split in args.splits.selected() {
        let report =
            inspect::inspect_split(data_dir, split, args.stats_records)?;
        print_inspect_report(&report);
    }
    println!("inspection finished.");
    Ok(())
}

fn print_inspect_report(report: &InspectReport) {
    let split = report.split;
    let path = report.path.display();
    let (first, stats) = match &report.outcome {
        InspectOutcome::Missing => {
            println!("[{split}] MISSING: {path}");
            return;
        }
        InspectOutcome::Empty => {
            println!("[{split}] empty file: {path}");
            return;
        }
        InspectOutcome::Inspected { first, stats } => (first, stats),
    };

    println!("\n[{split}] file={path}");
    println!("  keys({}): {:?}", first.keys.len(), first.keys);
    match &first.text_field {
        Some((key, chars)) => println!("  text field: {key} (chars={chars})"),
        None => println!("  text field: NOT FOUND"),
    }
    match &first.token_field {
        Some((key, count, head)) => {
            println!("  tokens field: {key} (#tokens={count})");
            println!("  tokens preview: {head:?}");
        }
        None => println!("  tokens field: NOT FOUND"),
    }

    println!("  span-like items found: {}", first.spans.len());
    if !first.spans.is_empty() {
        println!("  span type guess: {}", first.guess);
        println!("  first 10 spans (start,end,label):");
        for span in first.spans.iter().take(10) {
            println!(
                "    - [{}, {}] label={}",
                span.start,
                span.end,
                label_text(&span.label)
            );
        }
        if !first.previews.is_empty() {
            println!("  substring preview (first 5 in range):");
            for p in &first.previews {
                println!(
                    "    - [{},{}] '{}' label={}",
                    p.start,
                    p.end,
                    p.text,
                    label_text(&p.label)
                );
            }
        }
    }

    println!("  quick stats on first {} records:", stats.records);
    println!("    avg span-like per doc: {:.2}", stats.mean_spans);
    println!("    max span-like per doc: {}", stats.max_spans);
}

fn label_text(label: &Option<serde_json::Value>) -> String {
    match label {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "None".to_string(),
    }
}

fn cmd_catalog(data_dir: &DataDir) -> error::Result<()> {
    let (catalog, output) = catalog::build_catalog(data_dir)?;
    println!("Built {} technique documents", catalog.len());
    println!("Saved to: {}", output.display());
    Ok(())
}

fn cmd_run(
    config: &PipelineConfig,
    data_dir: &DataDir,
    args: &cli::RunArgs,
) -> error::Result<()> {
    let stages = StageConfig {
        convert: config.stages.convert && !args.no_convert,
        check: config.stages.check && !args.no_check,
        windows: config.stages.windows && !args.no_windows,
        candidates: config.stages.candidates || args.candidates,
        train_reader: config.stages.train_reader || args.train_reader,
    };

    let toolkit = ProcessToolkit::new(&config.toolkit);
    let report = Pipeline::new(config, data_dir, &toolkit).run(stages)?;

    for stage in &report.stages {
        println!("==> {}", stage.name());
        match stage {
            StageReport::Convert(splits) => {
                splits.iter().for_each(print_split_report);
            }
            StageReport::Check(checks) => {
                for result in checks {
                    match &result.outcome {
                        CheckOutcome::Checked(r) => {
                            print_check_report(result.split.as_str(), r);
                        }
                        CheckOutcome::MissingInput => {
                            println!("[{}] nothing to check", result.split);
                        }
                    }
                }
            }
            StageReport::Windows(steps) | StageReport::Candidates(steps) => {
                for step in steps {
                    match &step.outcome {
                        StepOutcome::Ran { output } => {
                            println!(
                                "[{}] -> {}",
                                step.split,
                                output.display()
                            );
                        }
                        StepOutcome::MissingInput { input } => {
                            println!(
                                "[{}] SKIP: input missing: {}",
                                step.split,
                                input.display()
                            );
                        }
                    }
                }
            }
            StageReport::TrainReader => println!("reader training finished"),
        }
    }

    println!("pipeline finished.");
    Ok(())
}
