//! Developer certificate facts.
//!
//! Provisioning profiles embed the DER encoding of every certificate allowed
//! to sign with them. Only a few facts about each one are of interest here:
//! its SHA-1 fingerprint (what Xcode and `security find-identity` display),
//! its common name and whether it has expired.
//!
//! # Examples
//!
//! ```no_run
//! use protool::ProfileLoader;
//!
//! let profile = ProfileLoader::new().load("Example.mobileprovision")?;
//! for fact in profile.developer_certificates().facts {
//!     println!("{} expired={}", fact.sha1_fingerprint, fact.is_expired);
//! }
//! # Ok::<(), protool::Error>(())
//! ```

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use plist::Value;
use sha1::{Digest, Sha1};
use x509_certificate::X509Certificate;

/// Facts derived from one developer certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateFact {
    /// SHA-1 over the DER bytes, 40 lowercase hex characters.
    pub sha1_fingerprint: String,

    /// Whether `not_after` had passed when the fact was extracted.
    pub is_expired: bool,

    /// Subject common name, e.g. `iPhone Distribution: Example Corp (ABCDE12345)`.
    pub common_name: Option<String>,

    /// End of the certificate validity window.
    pub not_after: DateTime<Utc>,
}

impl CertificateFact {
    /// Extract facts from a DER certificate, judging expiry against now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCertificate`] if the blob is not a DER X.509
    /// certificate.
    pub fn from_der(blob: &[u8]) -> Result<Self> {
        Self::from_der_at(blob, Utc::now())
    }

    /// Extract facts from a DER certificate, judging expiry against `now`.
    pub fn from_der_at(blob: &[u8], now: DateTime<Utc>) -> Result<Self> {
        let cert = X509Certificate::from_der(blob)
            .map_err(|e| Error::InvalidCertificate(format!("Failed to parse certificate DER: {}", e)))?;

        let not_after = cert.validity_not_after();

        Ok(Self {
            sha1_fingerprint: sha1_hex(blob),
            is_expired: not_after < now,
            common_name: cert.subject_common_name(),
            not_after,
        })
    }

    /// Whether the certificate is expired at `instant`.
    pub fn is_expired_at(&self, instant: DateTime<Utc>) -> bool {
        self.not_after < instant
    }
}

/// Outcome of extracting facts from a list of certificate blobs.
///
/// Entries that fail to parse do not abort the list; they are recorded in
/// `failures` with their position in the original array.
#[derive(Debug, Default)]
pub struct CertificateReport {
    /// Facts for every entry that parsed.
    pub facts: Vec<CertificateFact>,

    /// Index and error for every entry that did not.
    pub failures: Vec<(usize, Error)>,
}

impl CertificateReport {
    /// Build a report from the `DeveloperCertificates` array.
    ///
    /// Non-data entries count as failures.
    pub fn from_values(values: &[Value]) -> Self {
        Self::from_values_at(values, Utc::now())
    }

    /// [`CertificateReport::from_values`] with an explicit expiry reference.
    pub fn from_values_at(values: &[Value], now: DateTime<Utc>) -> Self {
        let mut report = Self::default();

        for (index, value) in values.iter().enumerate() {
            let outcome = match value.as_data() {
                Some(blob) => CertificateFact::from_der_at(blob, now),
                None => Err(Error::InvalidCertificate(
                    "DeveloperCertificates entry is not a data blob".into(),
                )),
            };

            match outcome {
                Ok(fact) => report.facts.push(fact),
                Err(e) => {
                    tracing::warn!(index, error = %e, "skipping developer certificate");
                    report.failures.push((index, e));
                }
            }
        }

        report
    }
}

fn sha1_hex(data: &[u8]) -> String {
    Sha1::digest(data)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
