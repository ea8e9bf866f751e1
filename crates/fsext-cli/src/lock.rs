use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use fsext::{Error, LockMode};
use fsext_config::{log_cli_debug, log_cli_info};

use crate::descriptor::Descriptor;

/// Exit status when a non-blocking request finds the file already locked.
pub const CONFLICT_EXIT_CODE: i32 = 1;

#[derive(Args, Debug)]
pub struct LockArgs {
    /// File to lock (created when missing)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Lock mode: sh, ex, shnb, exnb (defaults to [lock] default_mode)
    #[arg(short, long)]
    mode: Option<String>,

    /// Append a line to this file while the lock is held
    #[arg(long, value_name = "LOG", requires = "line")]
    append: Option<PathBuf>,

    /// Line written to --append
    #[arg(long, value_name = "TEXT", requires = "append")]
    line: Option<String>,

    /// Keep the lock this long before releasing it
    #[arg(long, value_name = "MS", default_value_t = 0)]
    hold_ms: u64,

    /// Command run while the lock is held
    #[arg(last = true, value_name = "COMMAND")]
    command: Vec<String>,
}

/// Execute the lock command. Returns the process exit status.
pub async fn run(args: LockArgs) -> Result<i32> {
    let mode_name = args
        .mode
        .clone()
        .unwrap_or_else(|| fsext_config::config().lock.default_mode.clone());
    let mode: LockMode = mode_name
        .parse()
        .with_context(|| format!("Invalid lock mode {mode_name:?}"))?;
    if mode == LockMode::Unlock {
        anyhow::bail!("'un' releases a lock; pick sh, ex, shnb or exnb");
    }

    let file = Descriptor::open_or_create(&args.file)?;
    log_cli_debug!(
        "acquiring",
        path = &*args.file.to_string_lossy(),
        mode = mode.symbol()
    );
    match fsext::flock_async(file.raw(), mode)?.await {
        Ok(()) => {}
        Err(Error::WouldBlock { .. }) => {
            eprintln!("fsext: {} is locked by another holder", args.file.display());
            return Ok(CONFLICT_EXIT_CODE);
        }
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to lock {}", args.file.display()))
        }
    }
    log_cli_info!("lock acquired", path = &*args.file.to_string_lossy());

    if let (Some(log), Some(line)) = (&args.append, &args.line) {
        append_line(log, line)?;
    }
    if args.hold_ms > 0 {
        tokio::time::sleep(Duration::from_millis(args.hold_ms)).await;
    }
    let status = match args.command.split_first() {
        Some((program, rest)) => run_command(program, rest).await?,
        None => 0,
    };

    fsext::flock(file.raw(), LockMode::Unlock)
        .with_context(|| format!("Failed to unlock {}", args.file.display()))?;
    log_cli_info!("lock released", path = &*args.file.to_string_lossy());
    Ok(status)
}

fn append_line(log: &Path, line: &str) -> Result<()> {
    let mut out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log)
        .with_context(|| format!("Failed to open {}", log.display()))?;
    writeln!(out, "{line}").with_context(|| format!("Failed to write {}", log.display()))?;
    out.sync_data()?;
    Ok(())
}

async fn run_command(program: &str, args: &[String]) -> Result<i32> {
    log_cli_debug!("running", program = program, args = args.len());
    let status = tokio::process::Command::new(program)
        .args(args)
        .status()
        .await
        .with_context(|| format!("Failed to run {program}"))?;
    // A child killed by a signal has no code.
    Ok(status.code().unwrap_or(1))
}
