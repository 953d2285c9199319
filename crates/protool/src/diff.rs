//! Diffing two provisioning profiles.
//!
//! Both profiles are decoded to XML, optionally with some top-level keys
//! removed, written into a temporary directory and handed to an external
//! diff tool. The temporary directory lives exactly as long as one call.
//!
//! # Diff Tools
//!
//! The tool string is interpolated into a shell command line as
//! `<tool> '<a>' '<b>'`, so it may carry its own flags. The paths are
//! quoted; the tool string is not:
//!
//! ```no_run
//! use protool::DiffOptions;
//!
//! let options = DiffOptions {
//!     tool: Some("diff -u --label old --label new".into()),
//!     ..DiffOptions::default()
//! };
//! let text = protool::diff("old.mobileprovision", "new.mobileprovision", &options)?;
//! print!("{text}");
//! # Ok::<(), protool::Error>(())
//! ```
//!
//! Most diff tools exit non-zero when the inputs differ. That is reported as
//! a normal result; only a tool that cannot be started is an error.

use crate::codec;
use crate::profile::{ProfileLoader, ProvisioningProfile};
use crate::{Error, Result};
use plist::{Dictionary, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Tool used when no override is given.
pub const DEFAULT_DIFF_TOOL: &str = "opendiff";

/// Shell exit status for "found but not executable".
const EXIT_NOT_EXECUTABLE: i32 = 126;

/// Shell exit status for "command not found".
const EXIT_NOT_FOUND: i32 = 127;

/// Options for [`diff`].
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Top-level keys to drop from both profiles before comparing.
    pub ignore_keys: Vec<String>,
    /// Sort dictionary keys so the comparison is independent of file order.
    pub sort_keys: bool,
    /// Diff command, defaulting to [`DEFAULT_DIFF_TOOL`].
    pub tool: Option<String>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            ignore_keys: Vec::new(),
            sort_keys: true,
            tool: None,
        }
    }
}

/// Renders the difference between two files.
pub trait DiffRenderer {
    /// Compare the files at `a` and `b` and return the rendered diff.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RendererUnavailable`] only if the renderer could not
    /// run. Differences between the files are not errors.
    fn render(&self, a: &Path, b: &Path) -> Result<String>;
}

/// Runs a diff tool through `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellRenderer {
    tool: String,
}

impl ShellRenderer {
    /// Renderer for `tool`, which may include extra arguments.
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    /// The tool command as given.
    pub fn tool(&self) -> &str {
        &self.tool
    }

    fn command_line(&self, a: &Path, b: &Path) -> String {
        format!("{} {} {}", self.tool, shell_quote(a), shell_quote(b))
    }
}

/// Single-quote a path for `sh`, so no expansion happens inside it.
fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}

impl Default for ShellRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_DIFF_TOOL)
    }
}

impl DiffRenderer for ShellRenderer {
    fn render(&self, a: &Path, b: &Path) -> Result<String> {
        let command_line = self.command_line(a, b);
        tracing::debug!(command = %command_line, "running diff tool");

        let output = Command::new("sh")
            .arg("-c")
            .arg(&command_line)
            .output()
            .map_err(|e| Error::RendererUnavailable {
                tool: self.tool.clone(),
                reason: e.to_string(),
            })?;

        match output.status.code() {
            Some(EXIT_NOT_EXECUTABLE) | Some(EXIT_NOT_FOUND) => {
                return Err(Error::RendererUnavailable {
                    tool: self.tool.clone(),
                    reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
            Some(0) => {}
            status => tracing::debug!(?status, "diff tool reported differences"),
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.trim_end().to_string())
    }
}

/// Diff two profiles using the default loader and a [`ShellRenderer`].
///
/// # Arguments
///
/// * `a_path` - First profile
/// * `b_path` - Second profile
/// * `options` - Keys to ignore, key ordering and tool override
///
/// # Errors
///
/// Returns an error if either profile fails to load, the temporary files
/// cannot be written, or the diff tool cannot be started.
pub fn diff(a_path: impl AsRef<Path>, b_path: impl AsRef<Path>, options: &DiffOptions) -> Result<String> {
    let loader = ProfileLoader::new().sort_keys(options.sort_keys);
    let renderer = ShellRenderer::new(options.tool.as_deref().unwrap_or(DEFAULT_DIFF_TOOL));

    diff_with(&loader, &renderer, a_path.as_ref(), b_path.as_ref(), &options.ignore_keys)
}

/// Diff two profiles with explicit loading and rendering capabilities.
///
/// The loader's key sorting setting decides the ordering of both documents.
pub fn diff_with(
    loader: &ProfileLoader,
    renderer: &dyn DiffRenderer,
    a_path: &Path,
    b_path: &Path,
    ignore_keys: &[String],
) -> Result<String> {
    let profile_a = loader.load(a_path)?;
    let profile_b = loader.load(b_path)?;

    let a_xml = comparable_xml(&profile_a, ignore_keys)?;
    let b_xml = comparable_xml(&profile_b, ignore_keys)?;

    let temp_dir = TempDir::new()?;
    let (a_temp_path, b_temp_path) = temp_paths(temp_dir.path(), &profile_a, &profile_b)?;

    fs::write(&a_temp_path, &a_xml)?;
    fs::write(&b_temp_path, &b_xml)?;

    renderer.render(&a_temp_path, &b_temp_path)
}

/// XML to feed the diff tool for one profile.
fn comparable_xml(profile: &ProvisioningProfile, ignore_keys: &[String]) -> Result<Vec<u8>> {
    if ignore_keys.is_empty() {
        return Ok(profile.xml().to_vec());
    }

    let filtered: Dictionary = profile
        .contents()
        .into_iter()
        .filter(|(key, _)| !ignore_keys.contains(key))
        .collect();

    // Contents already carry the loader's ordering.
    codec::serialize(&Value::Dictionary(filtered), false)
}

/// Where to write each profile inside the scratch directory.
///
/// Files keep their original names. Two profiles with the same name go into
/// separate `a/` and `b/` subdirectories.
fn temp_paths(
    dir: &Path,
    profile_a: &ProvisioningProfile,
    profile_b: &ProvisioningProfile,
) -> Result<(PathBuf, PathBuf)> {
    if profile_a.file_name() != profile_b.file_name() {
        return Ok((dir.join(profile_a.file_name()), dir.join(profile_b.file_name())));
    }

    let a_dir = dir.join("a");
    let b_dir = dir.join("b");
    fs::create_dir(&a_dir)?;
    fs::create_dir(&b_dir)?;

    Ok((a_dir.join(profile_a.file_name()), b_dir.join(profile_b.file_name())))
}
