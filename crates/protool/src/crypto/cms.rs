//! Unwrapping the CMS envelope of a provisioning profile.
//!
//! A `.mobileprovision` file is a DER/BER encoded CMS `SignedData` structure
//! whose encapsulated content is the profile plist. [`Unwrapper`] is the seam
//! between the loader and whatever turns those signed bytes into plaintext.
//!
//! | Implementation | Mechanism | Platforms |
//! |----------------|-----------|-----------|
//! | [`CmsUnwrapper`] | `cryptographic-message-syntax` parser, in process | all |
//! | [`SecurityUnwrapper`] | `security cms -D -i <path>` | macOS |
//!
//! Neither implementation checks the signature against a trust chain.

use crate::{Error, Result};
use cryptographic_message_syntax::SignedData;
use std::path::Path;
use std::process::Command;

/// Turns a signed profile on disk into plaintext plist bytes.
pub trait Unwrapper {
    /// Return the plist payload of the profile at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnwrapFailed`] if the file is not a signed container
    /// the implementation understands.
    fn unwrap_profile(&self, path: &Path) -> Result<Vec<u8>>;
}

/// In-process CMS parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct CmsUnwrapper;

impl CmsUnwrapper {
    /// Extract the encapsulated content from raw `SignedData` bytes.
    pub fn unwrap_bytes(&self, path: &Path, data: &[u8]) -> Result<Vec<u8>> {
        let signed_data = SignedData::parse_ber(data).map_err(|e| Error::UnwrapFailed {
            path: path.to_path_buf(),
            reason: format!("Failed to parse CMS SignedData: {}", e),
        })?;

        let content = signed_data.signed_content().ok_or_else(|| Error::UnwrapFailed {
            path: path.to_path_buf(),
            reason: "CMS SignedData carries no embedded content".into(),
        })?;

        Ok(content.to_vec())
    }
}

impl Unwrapper for CmsUnwrapper {
    fn unwrap_profile(&self, path: &Path) -> Result<Vec<u8>> {
        let data = std::fs::read(path)?;
        self.unwrap_bytes(path, &data)
    }
}

/// Delegates to the macOS `security` tool.
#[derive(Debug, Clone)]
pub struct SecurityUnwrapper {
    program: String,
}

impl SecurityUnwrapper {
    /// Use `security` from `PATH`.
    pub fn new() -> Self {
        Self::with_program("security")
    }

    /// Use a specific `security` compatible program.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SecurityUnwrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Unwrapper for SecurityUnwrapper {
    fn unwrap_profile(&self, path: &Path) -> Result<Vec<u8>> {
        tracing::debug!(program = %self.program, path = %path.display(), "running cms decode");

        let output = Command::new(&self.program)
            .args(["cms", "-D", "-i"])
            .arg(path)
            .output()
            .map_err(|e| Error::UnwrapFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to run {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            return Err(Error::UnwrapFailed {
                path: path.to_path_buf(),
                reason: format!("{} cms exited with {}", self.program, output.status),
            });
        }

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_cms_rejects_plain_plist() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("plain.mobileprovision");
        fs::write(&path, b"<?xml version=\"1.0\"?><plist><dict/></plist>").unwrap();

        let result = CmsUnwrapper.unwrap_profile(&path);
        assert!(matches!(result, Err(Error::UnwrapFailed { .. })));
    }

    #[test]
    fn test_cms_missing_file_is_io() {
        let result = CmsUnwrapper.unwrap_profile(Path::new("/nonexistent/a.mobileprovision"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_security_missing_program() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.mobileprovision");
        fs::write(&path, b"x").unwrap();

        let unwrapper = SecurityUnwrapper::with_program("/nonexistent/security");
        let result = unwrapper.unwrap_profile(&path);
        assert!(matches!(result, Err(Error::UnwrapFailed { .. })));
    }

    #[test]
    #[cfg(unix)]
    fn test_security_non_zero_exit() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.mobileprovision");
        fs::write(&path, b"x").unwrap();

        let unwrapper = SecurityUnwrapper::with_program("false");
        let result = unwrapper.unwrap_profile(&path);
        assert!(matches!(result, Err(Error::UnwrapFailed { .. })));
    }

    /// Stand-in for `security` that prints the file given to `cms -D -i`.
    #[cfg(unix)]
    fn fake_security(dir: &Path) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("security");
        fs::write(
            &script,
            "#!/bin/sh\n[ \"$1 $2 $3\" = \"cms -D -i\" ] || exit 64\ncat \"$4\"\n",
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[test]
    #[cfg(unix)]
    fn test_security_returns_decoded_payload() {
        let temp_dir = TempDir::new().unwrap();
        let script = fake_security(temp_dir.path());
        let path = temp_dir.path().join("a b.mobileprovision");
        let payload = b"<?xml version=\"1.0\"?><plist version=\"1.0\"><dict><key>Name</key><string>x</string></dict></plist>";
        fs::write(&path, payload).unwrap();

        let unwrapper = SecurityUnwrapper::with_program(script.to_string_lossy());
        assert_eq!(unwrapper.unwrap_profile(&path).unwrap(), payload.to_vec());

        let profile = crate::ProfileLoader::new().unwrapper(unwrapper).load(&path).unwrap();
        assert_eq!(profile.name.as_deref(), Some("x"));
    }
}
