//! Searching installed provisioning profiles.
//!
//! Xcode installs profiles as `<UUID>.mobileprovision` files in
//! `~/Library/MobileDevice/Provisioning Profiles`. A search loads each of
//! them, derives its bundle identifier and type, and keeps the paths that
//! match both the pattern and the requested types.
//!
//! Results come back in directory listing order, which depends on the
//! platform and filesystem.

use crate::profile::{ProfileLoader, ProvisioningProfile, ProvisioningType};
use crate::{Error, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// File extension of installed profiles.
pub const PROFILE_EXTENSION: &str = "mobileprovision";

/// Set of profile types to match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileTypeSet(BTreeSet<ProvisioningType>);

impl ProfileTypeSet {
    /// Every known type.
    pub fn all() -> Self {
        Self(ProvisioningType::ALL.into_iter().collect())
    }

    pub fn contains(&self, profile_type: ProvisioningType) -> bool {
        self.0.contains(&profile_type)
    }

    pub fn insert(&mut self, profile_type: ProvisioningType) {
        self.0.insert(profile_type);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ProvisioningType> for ProfileTypeSet {
    fn from_iter<I: IntoIterator<Item = ProvisioningType>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What to search for.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Matched anywhere in the bundle identifier.
    pub pattern: Regex,
    /// Accepted profile types.
    pub types: ProfileTypeSet,
    /// Directory to scan instead of the installed profile directory.
    pub profiles_dir: Option<PathBuf>,
}

impl SearchQuery {
    /// Query for `pattern` across all profile types in the default directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if `pattern` is not a valid regex.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            types: ProfileTypeSet::all(),
            profiles_dir: None,
        })
    }

    /// Restrict the accepted types.
    pub fn types(mut self, types: ProfileTypeSet) -> Self {
        self.types = types;
        self
    }

    /// Scan `dir` instead of the installed profile directory.
    pub fn profiles_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profiles_dir = Some(dir.into());
        self
    }

    /// Whether a loaded profile satisfies the query.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::BundleIdUnavailable`] and
    /// [`Error::IndeterminateProfileType`].
    pub fn matches(&self, profile: &ProvisioningProfile) -> Result<bool> {
        let bundle_id = profile.bundle_id()?;
        if !self.pattern.is_match(&bundle_id) {
            return Ok(false);
        }

        Ok(self.types.contains(profile.profile_type()?))
    }
}

/// The directory Xcode installs profiles into.
///
/// # Errors
///
/// Returns [`Error::ProfilesDirUnavailable`] if `HOME` is not set.
pub fn default_profiles_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .ok_or_else(|| Error::ProfilesDirUnavailable("HOME is not set".into()))?;

    Ok(PathBuf::from(home)
        .join("Library")
        .join("MobileDevice")
        .join("Provisioning Profiles"))
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

/// Paths of `*.mobileprovision` files in `dir`, in listing order.
pub fn profile_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        Error::ProfilesDirUnavailable(format!("Failed to read {}: {}", dir.display(), e))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension() == Some(OsStr::new(PROFILE_EXTENSION)) && path.is_file() {
            paths.push(path);
        }
    }

    Ok(paths)
}

/// Load every profile in `dir`, or the installed profile directory.
///
/// Files that fail to load are logged and skipped.
pub fn installed_profiles(dir: Option<&Path>, loader: &ProfileLoader) -> Result<Vec<ProvisioningProfile>> {
    let dir = match dir {
        Some(dir) => expand_home(dir),
        None => default_profiles_dir()?,
    };

    let mut profiles = Vec::new();
    for path in profile_paths(&dir)? {
        match loader.load(&path) {
            Ok(profile) => profiles.push(profile),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable profile"),
        }
    }

    Ok(profiles)
}

/// Search installed profiles with the default loader.
pub fn search(query: &SearchQuery) -> Result<Vec<PathBuf>> {
    search_with(query, &ProfileLoader::new())
}

/// Search installed profiles with an explicit loader.
///
/// Profiles without a derivable bundle identifier or type are logged and
/// skipped.
pub fn search_with(query: &SearchQuery, loader: &ProfileLoader) -> Result<Vec<PathBuf>> {
    let profiles = installed_profiles(query.profiles_dir.as_deref(), loader)?;

    let mut matches = Vec::new();
    for profile in profiles {
        match query.matches(&profile) {
            Ok(true) => matches.push(profile.file_path().to_path_buf()),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(path = %profile.file_path().display(), error = %e, "skipping profile")
            }
        }
    }

    Ok(matches)
}
