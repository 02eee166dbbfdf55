use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::Level;

use tapharness::batch::run_batch;
use tapharness::cli::Opts;
use tapharness::harness::{run_test, HarnessOptions, HarnessVerdict};
use tapharness::logsink::LogSink;
use tapharness::session::Session;
use tapharness::summarize;

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn child_envs(source_dir: Option<&PathBuf>, build_dir: Option<&PathBuf>) -> Vec<(String, String)> {
    let mut envs = Vec::new();
    if let Some(dir) = source_dir {
        let value = dir.to_string_lossy().into_owned();
        envs.push(("SOURCE".to_string(), value.clone()));
        envs.push(("TAP_SOURCE".to_string(), value));
    }
    if let Some(dir) = build_dir {
        let value = dir.to_string_lossy().into_owned();
        envs.push(("BUILD".to_string(), value.clone()));
        envs.push(("TAP_BUILD".to_string(), value));
    }
    envs
}

fn run(opts: &Opts) -> Result<ExitCode> {
    let mut log = opts
        .log
        .as_deref()
        .map(|path| LogSink::open(path, opts.append))
        .transpose()?;

    let harness_options = HarnessOptions {
        capture_stderr: opts.capture_stderr,
        envs: child_envs(opts.source_dir.as_ref(), opts.build_dir.as_ref()),
    };

    if opts.list {
        let (entries, totals) = run_batch(
            &opts.file,
            &harness_options,
            opts.build_dir.as_deref(),
            opts.source_dir.as_deref(),
            log.as_mut(),
        )?;

        if opts.json {
            let rendered: Vec<_> = entries
                .iter()
                .map(|e| serde_json::json!({ "name": e.name, "summary": e.summary }))
                .collect();
            println!("{}", serde_json::to_string(&rendered)?);
        } else {
            for entry in &entries {
                println!("{}: {}", entry.name, entry.summary);
            }
        }
        println!(
            "--- {} run, {} failed, {} skipped, {} todo, {} aborted, {} parse errors",
            totals.tests_run, totals.failed, totals.skipped, totals.todo, totals.aborted, totals.parse_errors
        );

        let code = if totals.aborted > 0 {
            1
        } else if totals.failed > 0 {
            2
        } else {
            0
        };
        Ok(ExitCode::from(code))
    } else {
        let mut session = Session::new();
        let outcome = run_test(&opts.file, &harness_options, &mut session, log.as_mut())?;
        let summary = summarize(&session);

        if opts.json {
            println!("{}", serde_json::to_string(&summary)?);
        } else {
            println!("{}: {}", opts.file.display(), summary);
        }
        if let HarnessVerdict::Aborted(code) = outcome.verdict {
            tracing::warn!(code, "child process did not exit cleanly");
        }

        let exit_code = match outcome.verdict {
            HarnessVerdict::Aborted(_) => 1,
            _ => summary.exit_code() as u8,
        };
        Ok(ExitCode::from(exit_code))
    }
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    init_tracing(opts.effective_verbosity());

    match run(&opts) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(%err, "harness run failed");
            eprintln!("tap-harness: {err:#}");
            ExitCode::from(1)
        }
    }
}
