//! Inspect, decode, diff and search Apple provisioning profiles.
//!
//! A `.mobileprovision` file is a CMS `SignedData` container wrapping a
//! property list. This crate unwraps the container, parses the plist into a
//! [`ProvisioningProfile`], and builds the `protool` commands on top of it.
//!
//! # Examples
//!
//! ```no_run
//! use protool::{ProfileLoader, ProvisioningType};
//!
//! let profile = ProfileLoader::new().load("Example.mobileprovision")?;
//! if profile.profile_type()? == ProvisioningType::AppStoreDistribution {
//!     println!("{} ships to the App Store", profile.file_name());
//! }
//! # Ok::<(), protool::Error>(())
//! ```

pub mod codec;
pub mod crypto;
pub mod diff;
pub mod error;
pub mod profile;
pub mod query;
pub mod search;

pub use crypto::{CertificateFact, CertificateReport, CmsUnwrapper, SecurityUnwrapper, Unwrapper};
pub use diff::{diff, diff_with, DiffOptions, DiffRenderer, ShellRenderer, DEFAULT_DIFF_TOOL};
pub use error::Error;
pub use profile::{ProfileLoader, ProvisioningProfile, ProvisioningType};
pub use query::{decode, decode_contents, render_value, value_for_key, value_for_key_with};
pub use search::{installed_profiles, search, ProfileTypeSet, SearchQuery};

pub type Result<T> = std::result::Result<T, Error>;
