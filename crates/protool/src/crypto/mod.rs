//! Cryptographic containers inside provisioning profiles.
//!
//! - [`cms`] unwraps the CMS `SignedData` envelope around the profile plist.
//! - [`cert`] extracts identity and expiry facts from the embedded
//!   `DeveloperCertificates`.

pub mod cert;
pub mod cms;

pub use cert::{CertificateFact, CertificateReport};
pub use cms::{CmsUnwrapper, SecurityUnwrapper, Unwrapper};
