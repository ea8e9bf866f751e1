//! # fsext CLI
//!
//! Command-line front end for the fs-ext descriptor operations.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fsext::{IdentityResolver, PlatformIdentity, RecordLock, RecordLockKind};
use fsext_config::logging::LogLevel;
use fsext_config::log_cli_debug;

mod descriptor;
mod inspect;
mod lock;

use descriptor::Descriptor;

/// fsext - flock, fcntl, seek, statvfs and stat from the command line
#[derive(Parser)]
#[command(name = "fsext")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace); overrides [logging] level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hold an advisory lock on a file, optionally running a command under it
    Lock(lock::LockArgs),

    /// Seek within a file and print the resulting offset
    Seek {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(allow_negative_numbers = true)]
        offset: i64,

        /// Origin: set, cur or end
        #[arg(short, long, default_value = "set")]
        whence: String,
    },

    /// Run an fcntl command on a file and print the result
    Fcntl {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Command: getfd, setfd, getlk, setlk, setlkw
        cmd: String,

        /// Integer argument for getfd/setfd
        arg: Option<i32>,

        /// Lock type for the record-lock commands
        #[arg(long, value_enum, default_value_t = KindArg::Write)]
        kind: KindArg,

        #[arg(long, default_value_t = 0)]
        start: i64,

        /// Bytes covered; 0 means to end of file
        #[arg(long, default_value_t = 0)]
        len: i64,
    },

    /// Print filesystem statistics as JSON (defaults to [statvfs] default_path)
    Statvfs {
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },

    /// Print file status, following symbolic links
    Stat {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Print the status of a symbolic link itself
    Lstat {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Change owner and/or group
    Chown {
        #[arg(value_name = "PATH")]
        path: PathBuf,

        #[arg(long)]
        owner: Option<String>,

        #[arg(long)]
        group: Option<String>,

        /// Change a symbolic link itself instead of its target
        #[arg(long)]
        no_dereference: bool,
    },

    /// Set access and modification time, in seconds since the epoch
    Utime {
        #[arg(value_name = "PATH")]
        path: PathBuf,

        #[arg(allow_negative_numbers = true)]
        atime: i64,

        #[arg(allow_negative_numbers = true)]
        mtime: i64,
    },

    /// List the flag constants and their numeric values
    Constants {
        #[arg(long)]
        json: bool,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print where configuration files are read from
    Path,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Read,
    Write,
    Unlock,
}

impl From<KindArg> for RecordLockKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Read => RecordLockKind::Read,
            KindArg::Write => RecordLockKind::Write,
            KindArg::Unlock => RecordLockKind::Unlock,
        }
    }
}

fn main() -> Result<()> {
    #[cfg(unix)]
    // SAFETY: restores the default SIGPIPE disposition before any output.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    let cli = Cli::parse();
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| fsext_config::config().logging.level.clone());
    fsext_config::logging::init_logging(level.parse().unwrap_or(LogLevel::Warn));

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let code = rt.block_on(async_main(cli))?;
    // Lock commands have already released the lock and closed the file.
    drop(rt);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn async_main(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Lock(args) => return lock::run(args).await,
        Commands::Seek {
            file,
            offset,
            whence,
        } => {
            let descriptor = Descriptor::open(&file)?;
            let position = fsext::seek_async(descriptor.raw(), offset, whence)?
                .await
                .with_context(|| format!("Failed to seek {}", file.display()))?;
            println!("{position}");
        }
        Commands::Fcntl {
            file,
            cmd,
            arg,
            kind,
            start,
            len,
        } => {
            let command: fsext::FcntlCommand = cmd.parse()?;
            let descriptor = Descriptor::open_or_create(&file)?;
            log_cli_debug!("fcntl", path = &*file.to_string_lossy(), cmd = command.symbol());
            if command.is_record_lock() {
                let request = RecordLock::range(kind.into(), start, len);
                let result = fsext::fcntl_lock_async(descriptor.raw(), command, request)?
                    .await
                    .with_context(|| format!("fcntl {command} failed on {}", file.display()))?;
                inspect::print_json(&result)?;
            } else {
                let result = fsext::fcntl_async(descriptor.raw(), command, arg)?
                    .await
                    .with_context(|| format!("fcntl {command} failed on {}", file.display()))?;
                println!("{result}");
            }
        }
        Commands::Statvfs { path } => inspect::statvfs(path).await?,
        Commands::Stat { path } => inspect::stat(path, true).await?,
        Commands::Lstat { path } => inspect::stat(path, false).await?,
        Commands::Chown {
            path,
            owner,
            group,
            no_dereference,
        } => {
            let owner = parse_identity("owner", owner)?;
            let group = parse_identity("group", group)?;
            let resolver = inspect::resolver();
            let display = path.display().to_string();
            let completion = if no_dereference {
                resolver.lchown_async(path, owner, group)?
            } else {
                resolver.chown_async(path, owner, group)?
            };
            completion
                .await
                .with_context(|| format!("Failed to chown {display}"))?;
        }
        Commands::Utime { path, atime, mtime } => {
            let display = path.display().to_string();
            fsext::utime_async(path, atime, mtime)?
                .await
                .with_context(|| format!("Failed to set times on {display}"))?;
        }
        Commands::Constants { json } => inspect::constants(json)?,
        Commands::Config { command } => match command {
            ConfigCommands::Show => inspect::config_show()?,
            ConfigCommands::Path => inspect::config_path()?,
        },
    }
    Ok(0)
}

fn parse_identity(field: &str, value: Option<String>) -> Result<Option<PlatformIdentity>> {
    value
        .map(|text| {
            text.parse::<PlatformIdentity>()
                .with_context(|| format!("Invalid {field} {text:?}"))
        })
        .transpose()
}
