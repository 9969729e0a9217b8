//! Configuration loading for CLI handlers.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::infrastructure::config::settings::Config;

/// Config file picked up from the working directory when `--config` is omitted.
pub const DEFAULT_CONFIG: &str = "dbload.toml";

/// Load the config at `path`, or `dbload.toml` if present, or defaults.
///
/// Environment overrides and validation apply in every case.
///
/// # Errors
/// Returns an error if an explicitly named file is missing, or if the
/// content fails to parse or validate.
pub fn load(path: Option<&Path>) -> Result<(Config, Option<PathBuf>)> {
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from(DEFAULT_CONFIG)).filter(|p| p.exists()),
    };
    let config = match &path {
        Some(path) => Config::load(path)?,
        None => Config::parse_toml("")?,
    };
    Ok((config, path))
}
