//! Common paths for photofeed data
//!
//! Configuration lives under ~/.config/photofeed/ on all platforms.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Get the photofeed directory (~/.config/photofeed/)
pub fn photofeed_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let dir = home.join(".config").join("photofeed");
    fs::create_dir_all(&dir).context("Failed to create photofeed directory")?;
    Ok(dir)
}

/// Get the config file path (~/.config/photofeed/config.toml)
pub fn config_path() -> Result<PathBuf> {
    Ok(photofeed_dir()?.join("config.toml"))
}
