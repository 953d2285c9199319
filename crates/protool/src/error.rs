//! Error types for protool operations.
//!
//! This module defines the [`enum@Error`] enum covering every failure case
//! when unwrapping, parsing, classifying, diffing and searching profiles.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use std::path::PathBuf;
use thiserror::Error;

/// Error type for protool operations.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses this error type.
/// Match on variants to handle specific failure cases.
///
/// # Examples
///
/// ```no_run
/// use protool::{Error, ProfileLoader};
///
/// match ProfileLoader::new().load("missing.mobileprovision") {
///     Ok(profile) => println!("Loaded {}", profile.file_name()),
///     Err(Error::FileNotFound(path)) => eprintln!("No such file: {}", path.display()),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Occurs when reading profiles, listing the profile directory, or
    /// writing the temporary files used by the diff engine.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The profile path does not exist.
    ///
    /// Checked before the unwrap capability is invoked.
    #[error("File does not exist: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The signed container could not be unwrapped.
    ///
    /// The file is not a CMS `SignedData` blob, carries no embedded content,
    /// or the external `security` tool rejected it.
    #[error("Failed to unwrap {}: {reason}", path.display())]
    UnwrapFailed {
        /// Profile that was being unwrapped.
        path: PathBuf,
        /// What the unwrap capability reported.
        reason: String,
    },

    /// The unwrapped payload is not a usable property list.
    ///
    /// Either the bytes are neither binary nor XML plist, or the root is not
    /// a non-empty dictionary.
    #[error("Malformed plist: {0}")]
    MalformedPlist(String),

    /// Property list serialization failed.
    #[error("Plist error: {0}")]
    Plist(#[from] plist::Error),

    /// A certificate blob is not valid DER.
    ///
    /// Non-fatal inside [`crate::ProvisioningProfile::developer_certificates`],
    /// which skips the offending entry.
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    /// No classification rule matched the profile.
    ///
    /// Raised for `get-task-allow = true` profiles without a device list.
    #[error("Unable to determine provisioning profile type for {}", .0.display())]
    IndeterminateProfileType(PathBuf),

    /// The bundle identifier could not be derived.
    ///
    /// Either `ApplicationIdentifierPrefix` is empty or the entitlements lack
    /// `application-identifier`.
    #[error("Bundle identifier unavailable: {0}")]
    BundleIdUnavailable(String),

    /// The diff tool could not be launched at all.
    ///
    /// A tool that runs and exits non-zero is not an error; see [`crate::diff`].
    #[error("Diff tool '{tool}' unavailable: {reason}")]
    RendererUnavailable {
        /// The tool command as supplied.
        tool: String,
        /// Launch failure detail.
        reason: String,
    },

    /// A value cannot be rendered as JSON.
    #[error("Unable to serialize value: {0}")]
    SerializationUnsupported(String),

    /// The search pattern is not a valid regular expression.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The installed profile directory could not be located or read.
    #[error("Profile directory unavailable: {0}")]
    ProfilesDirUnavailable(String),
}
