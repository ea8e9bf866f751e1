//! Read-only queries printed as JSON: stat, statvfs and the constant table.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fsext::{IdentityResolver, PlatformResolver};
use serde::Serialize;

/// Resolver configured from `[stat]`.
pub fn resolver() -> PlatformResolver {
    #[cfg(windows)]
    {
        let hops = fsext_config::config().stat.max_link_hops;
        fsext::platform_resolver().with_max_link_hops(hops)
    }
    #[cfg(not(windows))]
    {
        fsext::platform_resolver()
    }
}

pub async fn stat(path: PathBuf, follow: bool) -> Result<()> {
    let resolver = resolver();
    let display = path.display().to_string();
    let completion = if follow {
        resolver.stat_async(path)?
    } else {
        resolver.lstat_async(path)?
    };
    let stats = completion
        .await
        .with_context(|| format!("Failed to stat {display}"))?;
    print_json(&stats)
}

pub async fn statvfs(path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(|| fsext_config::config().statvfs.default_path.clone());
    let display = path.display().to_string();
    let stats = fsext::statvfs_async(Some(path))?
        .await
        .with_context(|| format!("Failed to statvfs {display}"))?;
    print_json(&stats)
}

#[derive(Serialize)]
struct Constant {
    name: &'static str,
    value: i32,
}

pub fn constants(json: bool) -> Result<()> {
    let table = fsext::constants::table();
    if json {
        let rows: Vec<Constant> = table
            .iter()
            .map(|&(name, value)| Constant { name, value })
            .collect();
        return print_json(&rows);
    }
    for (name, value) in table {
        println!("{name:<12} {value}");
    }
    Ok(())
}

pub fn config_show() -> Result<()> {
    let rendered = fsext_config::config()
        .to_toml()
        .context("Failed to render config")?;
    print!("{rendered}");
    Ok(())
}

pub fn config_path() -> Result<()> {
    match fsext_config::Config::global_config_path() {
        Some(global) => println!("global:  {}", describe(&global)),
        None => println!("global:  (no home directory)"),
    }
    println!(
        "project: {}",
        describe(&fsext_config::Config::project_config_path())
    );
    Ok(())
}

fn describe(path: &Path) -> String {
    let state = if path.exists() { "" } else { " (not found)" };
    format!("{}{state}", path.display())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
