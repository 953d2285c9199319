//! Loading provisioning profiles from disk.
//!
//! Loading runs through a fixed sequence of stages:
//!
//! 1. [`LoadStage::Unwrapping`] - the [`Unwrapper`] turns the signed file into
//!    plist bytes
//! 2. [`LoadStage::Parsing`] - the codec parses those bytes; the root must be a
//!    non-empty dictionary
//! 3. [`LoadStage::Normalizing`] - optionally sort keys and derive the
//!    canonical XML
//! 4. [`LoadStage::Populating`] - extract the typed fields
//!
//! A failure at any stage aborts the load. Callers only ever see a complete
//! [`ProvisioningProfile`] or an error.

use super::ProvisioningProfile;
use crate::codec;
use crate::crypto::{CmsUnwrapper, Unwrapper};
use crate::{Error, Result};
use plist::{Dictionary, Value};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Stage of a profile load, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Unwrapping,
    Parsing,
    Normalizing,
    Populating,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadStage::Unwrapping => "unwrapping",
            LoadStage::Parsing => "parsing",
            LoadStage::Normalizing => "normalizing",
            LoadStage::Populating => "populating",
        };
        f.write_str(name)
    }
}

/// Loads [`ProvisioningProfile`]s through a pluggable [`Unwrapper`].
///
/// # Example
///
/// ```no_run
/// use protool::{ProfileLoader, SecurityUnwrapper};
///
/// let profile = ProfileLoader::new()
///     .unwrapper(SecurityUnwrapper::new())
///     .sort_keys(false)
///     .load("Example.mobileprovision")?;
/// println!("{:?}", profile.name);
/// # Ok::<(), protool::Error>(())
/// ```
pub struct ProfileLoader {
    unwrapper: Box<dyn Unwrapper>,
    sort_keys: bool,
}

impl ProfileLoader {
    /// Loader using the in-process CMS parser, with key sorting on.
    pub fn new() -> Self {
        Self {
            unwrapper: Box::new(CmsUnwrapper),
            sort_keys: true,
        }
    }

    /// Replace the unwrap capability.
    pub fn unwrapper(mut self, unwrapper: impl Unwrapper + 'static) -> Self {
        self.unwrapper = Box::new(unwrapper);
        self
    }

    /// Whether dictionaries are key-sorted before the XML form is derived.
    ///
    /// Default is `true`.
    pub fn sort_keys(mut self, sort_keys: bool) -> Self {
        self.sort_keys = sort_keys;
        self
    }

    /// Current key sorting setting.
    pub fn sorts_keys(&self) -> bool {
        self.sort_keys
    }

    /// Load the profile at `path`.
    ///
    /// # Errors
    ///
    /// - [`Error::FileNotFound`] if `path` does not exist
    /// - [`Error::UnwrapFailed`] if the container cannot be unwrapped
    /// - [`Error::MalformedPlist`] if the payload is not a non-empty plist dictionary
    pub fn load(&self, path: impl AsRef<Path>) -> Result<ProvisioningProfile> {
        let file_path = absolute(path.as_ref())?;

        tracing::debug!(path = %file_path.display(), stage = %LoadStage::Unwrapping, "loading profile");
        if !file_path.exists() {
            return Err(Error::FileNotFound(file_path));
        }
        let raw = self.unwrapper.unwrap_profile(&file_path)?;

        tracing::debug!(bytes = raw.len(), stage = %LoadStage::Parsing, "loading profile");
        let contents = match codec::parse(&raw)? {
            Value::Dictionary(dict) if !dict.is_empty() => dict,
            Value::Dictionary(_) => {
                return Err(Error::MalformedPlist("profile dictionary is empty".into()))
            }
            _ => {
                return Err(Error::MalformedPlist(
                    "profile root is not a dictionary".into(),
                ))
            }
        };

        tracing::debug!(sort_keys = self.sort_keys, stage = %LoadStage::Normalizing, "loading profile");
        let (xml, contents) = self.normalize(raw, contents)?;

        tracing::debug!(stage = %LoadStage::Populating, "loading profile");
        Ok(ProvisioningProfile::from_parts(file_path, xml, contents))
    }

    /// Re-read `profile` from its file.
    ///
    /// On failure `profile` is left as it was.
    pub fn reload(&self, profile: &mut ProvisioningProfile) -> Result<()> {
        *profile = self.load(profile.file_path())?;
        Ok(())
    }

    fn normalize(&self, raw: Vec<u8>, contents: Dictionary) -> Result<(Vec<u8>, Dictionary)> {
        if self.sort_keys {
            let contents = codec::sort_dictionary(contents);
            let xml = codec::serialize(&Value::Dictionary(contents.clone()), false)?;
            return Ok((xml, contents));
        }

        if codec::is_xml(&raw) {
            return Ok((trim_ascii(&raw).to_vec(), contents));
        }

        let xml = codec::serialize(&Value::Dictionary(contents.clone()), false)?;
        Ok((xml, contents))
    }
}

impl Default for ProfileLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Absolute form of `path` with `.` and `..` resolved lexically.
fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    Ok(clean_path(&joined))
}

fn clean_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}
