//! Typed view over a decoded provisioning profile.
//!
//! A [`ProvisioningProfile`] is produced by the [`ProfileLoader`] and never
//! changes afterwards. The well-known top-level keys are pulled out once into
//! typed fields; everything else stays reachable through
//! [`ProvisioningProfile::contents`], which always hands out a copy.
//!
//! # Field Extraction
//!
//! | Field | Key | When absent or mistyped |
//! |-------|-----|-------------------------|
//! | `app_id_name` | `AppIDName` | `None` |
//! | `application_identifier_prefix` | `ApplicationIdentifierPrefix` | `None` |
//! | `creation_date` | `CreationDate` | `None` |
//! | `platform` | `Platform` | `None` |
//! | `entitlements` | `Entitlements` | empty dictionary |
//! | `expiration_date` | `ExpirationDate` | `None` |
//! | `name` | `Name` | `None` |
//! | `team_identifier` | `TeamIdentifier` | `None` |
//! | `team_name` | `TeamName` | `None` |
//! | `time_to_live` | `TimeToLive` | `None` |
//! | `uuid` | `UUID` | `None` |
//! | `version` | `Version` | `None` |
//! | `provisioned_devices` | `ProvisionedDevices` | `None` |
//! | `provisions_all_devices` | `ProvisionsAllDevices` | `false` |

pub mod loader;

pub use loader::{LoadStage, ProfileLoader};

use crate::crypto::CertificateReport;
use crate::{Error, Result};
use plist::{Date, Dictionary, Value};
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};

/// Entitlement granting debugger attachment; set on development profiles.
pub const GET_TASK_ALLOW: &str = "get-task-allow";

/// Entitlement holding `<prefix>.<bundle id>`.
pub const APPLICATION_IDENTIFIER: &str = "application-identifier";

/// Kind of distribution a profile is issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProvisioningType {
    /// Development builds on registered devices.
    IosDevelopment,
    /// App Store and TestFlight submissions.
    AppStoreDistribution,
    /// Release builds on registered devices.
    AdHocDistribution,
    /// In-house distribution to any device.
    EnterpriseDistribution,
}

impl ProvisioningType {
    /// Every known type, in declaration order.
    pub const ALL: [ProvisioningType; 4] = [
        ProvisioningType::IosDevelopment,
        ProvisioningType::AppStoreDistribution,
        ProvisioningType::AdHocDistribution,
        ProvisioningType::EnterpriseDistribution,
    ];

    /// Short name used on the command line.
    pub fn cli_name(self) -> &'static str {
        match self {
            ProvisioningType::IosDevelopment => "ios-dev",
            ProvisioningType::AppStoreDistribution => "appstore",
            ProvisioningType::AdHocDistribution => "adhoc",
            ProvisioningType::EnterpriseDistribution => "enterprise",
        }
    }

    /// Inverse of [`ProvisioningType::cli_name`].
    pub fn from_cli_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.cli_name() == name)
    }

    /// Apply the classification rules to the relevant profile facts.
    ///
    /// Rules are tried in order and the first match wins:
    ///
    /// 1. all devices provisioned → enterprise
    /// 2. no `get-task-allow`, device list present → ad hoc
    /// 3. no `get-task-allow`, no device list → App Store
    /// 4. `get-task-allow`, device list present → development
    ///
    /// `None` means no rule matched.
    pub fn classify(
        provisions_all_devices: bool,
        get_task_allow: bool,
        has_device_list: bool,
    ) -> Option<Self> {
        match (provisions_all_devices, get_task_allow, has_device_list) {
            (true, _, _) => Some(ProvisioningType::EnterpriseDistribution),
            (false, false, true) => Some(ProvisioningType::AdHocDistribution),
            (false, false, false) => Some(ProvisioningType::AppStoreDistribution),
            (false, true, true) => Some(ProvisioningType::IosDevelopment),
            (false, true, false) => None,
        }
    }
}

impl fmt::Display for ProvisioningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

/// A decoded provisioning profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningProfile {
    file_path: PathBuf,
    file_name: String,
    xml: Vec<u8>,
    contents: Dictionary,

    pub app_id_name: Option<String>,
    pub application_identifier_prefix: Option<Vec<String>>,
    pub creation_date: Option<Date>,
    pub platform: Option<Vec<String>>,
    pub entitlements: Dictionary,
    pub expiration_date: Option<Date>,
    pub name: Option<String>,
    pub team_identifier: Option<Vec<String>>,
    pub team_name: Option<String>,
    pub time_to_live: Option<i64>,
    pub uuid: Option<String>,
    pub version: Option<i64>,
    /// `None` means the profile is not restricted to a device list.
    pub provisioned_devices: Option<Vec<String>>,
    pub provisions_all_devices: bool,
}

impl ProvisioningProfile {
    /// Assemble a profile from already normalized parts.
    ///
    /// The typed fields are extracted here, once.
    pub(crate) fn from_parts(file_path: PathBuf, xml: Vec<u8>, contents: Dictionary) -> Self {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            app_id_name: string_field(&contents, "AppIDName"),
            application_identifier_prefix: string_list_field(&contents, "ApplicationIdentifierPrefix"),
            creation_date: contents.get("CreationDate").and_then(Value::as_date),
            platform: string_list_field(&contents, "Platform"),
            entitlements: contents
                .get("Entitlements")
                .and_then(Value::as_dictionary)
                .cloned()
                .unwrap_or_default(),
            expiration_date: contents.get("ExpirationDate").and_then(Value::as_date),
            name: string_field(&contents, "Name"),
            team_identifier: string_list_field(&contents, "TeamIdentifier"),
            team_name: string_field(&contents, "TeamName"),
            time_to_live: contents.get("TimeToLive").and_then(Value::as_signed_integer),
            uuid: string_field(&contents, "UUID"),
            version: contents.get("Version").and_then(Value::as_signed_integer),
            provisioned_devices: string_list_field(&contents, "ProvisionedDevices"),
            provisions_all_devices: contents
                .get("ProvisionsAllDevices")
                .map(is_truthy)
                .unwrap_or(false),
            file_path,
            file_name,
            xml,
            contents,
        }
    }

    /// Absolute path the profile was loaded from.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Final component of [`ProvisioningProfile::file_path`].
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Canonical XML form of the profile plist.
    pub fn xml(&self) -> &[u8] {
        &self.xml
    }

    /// Copy of the full top-level dictionary.
    ///
    /// Each call returns an independent deep copy; mutating it has no effect
    /// on the profile.
    pub fn contents(&self) -> Dictionary {
        self.contents.clone()
    }

    /// Whether the entitlements carry a truthy `get-task-allow`.
    pub fn get_task_allow(&self) -> bool {
        self.entitlements.get(GET_TASK_ALLOW).is_some_and(is_truthy)
    }

    /// Distribution type derived from devices and entitlements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndeterminateProfileType`] for a profile with a
    /// truthy `get-task-allow` and no device list.
    pub fn profile_type(&self) -> Result<ProvisioningType> {
        ProvisioningType::classify(
            self.provisions_all_devices,
            self.get_task_allow(),
            self.provisioned_devices.is_some(),
        )
        .ok_or_else(|| Error::IndeterminateProfileType(self.file_path.clone()))
    }

    /// Bundle identifier with the team prefix removed.
    ///
    /// `ABCDE12345.com.example.app` with prefix `ABCDE12345` yields
    /// `com.example.app`. Only a leading occurrence of the prefix is removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BundleIdUnavailable`] if there is no prefix or no
    /// `application-identifier` entitlement.
    pub fn bundle_id(&self) -> Result<String> {
        let prefix = self
            .application_identifier_prefix
            .as_ref()
            .and_then(|p| p.first())
            .ok_or_else(|| {
                Error::BundleIdUnavailable(format!(
                    "{} has no ApplicationIdentifierPrefix",
                    self.file_name
                ))
            })?;

        let app_id = self
            .entitlements
            .get(APPLICATION_IDENTIFIER)
            .and_then(Value::as_string)
            .ok_or_else(|| {
                Error::BundleIdUnavailable(format!(
                    "{} has no {} entitlement",
                    self.file_name, APPLICATION_IDENTIFIER
                ))
            })?;

        let re = Regex::new(&format!(r"^{}\.", regex::escape(prefix)))?;
        Ok(re.replace(app_id, "").into_owned())
    }

    /// Facts about each embedded developer certificate.
    ///
    /// Corrupt entries are skipped and reported in
    /// [`CertificateReport::failures`].
    pub fn developer_certificates(&self) -> CertificateReport {
        let values = self
            .contents
            .get("DeveloperCertificates")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        CertificateReport::from_values(values)
    }
}

/// Truthiness of a plist value.
///
/// Booleans are themselves; numbers are truthy when non-zero; strings, data
/// and collections when non-empty. Dates are always truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::Integer(i) => i.as_signed().map_or(true, |v| v != 0),
        Value::Real(r) => *r != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Data(d) => !d.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Dictionary(d) => !d.is_empty(),
        _ => true,
    }
}

fn string_field(contents: &Dictionary, key: &str) -> Option<String> {
    contents.get(key).and_then(Value::as_string).map(str::to_owned)
}

fn string_list_field(contents: &Dictionary, key: &str) -> Option<Vec<String>> {
    contents.get(key).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_string)
            .map(str::to_owned)
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_with(contents: Dictionary) -> ProvisioningProfile {
        ProvisioningProfile::from_parts(
            PathBuf::from("/profiles/Test.mobileprovision"),
            Vec::new(),
            contents,
        )
    }

    fn classification_input(all_devices: bool, get_task_allow: bool, devices: bool) -> Dictionary {
        let mut entitlements = Dictionary::new();
        entitlements.insert(GET_TASK_ALLOW.into(), Value::Boolean(get_task_allow));

        let mut contents = Dictionary::new();
        contents.insert("Entitlements".into(), Value::Dictionary(entitlements));
        if all_devices {
            contents.insert("ProvisionsAllDevices".into(), Value::Boolean(true));
        }
        if devices {
            contents.insert(
                "ProvisionedDevices".into(),
                Value::Array(vec![Value::String("00008030-000A1B2C3D4E5F60".into())]),
            );
        }
        contents
    }

    #[test]
    fn test_classify_table() {
        use ProvisioningType::*;

        let cases = [
            ((true, false, false), Some(EnterpriseDistribution)),
            ((true, true, true), Some(EnterpriseDistribution)),
            ((false, false, true), Some(AdHocDistribution)),
            ((false, false, false), Some(AppStoreDistribution)),
            ((false, true, true), Some(IosDevelopment)),
            ((false, true, false), None),
        ];

        for ((all, gta, devices), expected) in cases {
            assert_eq!(ProvisioningType::classify(all, gta, devices), expected);
            let profile = profile_with(classification_input(all, gta, devices));
            assert_eq!(profile.profile_type().ok(), expected);
        }
    }

    #[test]
    fn test_unclassified_profile_is_error() {
        let profile = profile_with(classification_input(false, true, false));
        assert!(matches!(
            profile.profile_type(),
            Err(Error::IndeterminateProfileType(_))
        ));
    }

    #[test]
    fn test_empty_device_list_is_still_present() {
        let mut contents = classification_input(false, false, false);
        contents.insert("ProvisionedDevices".into(), Value::Array(Vec::new()));

        let profile = profile_with(contents);
        assert_eq!(profile.provisioned_devices, Some(Vec::new()));
        assert_eq!(profile.profile_type().unwrap(), ProvisioningType::AdHocDistribution);
    }

    #[test]
    fn test_get_task_allow_truthiness() {
        let mut entitlements = Dictionary::new();
        entitlements.insert(GET_TASK_ALLOW.into(), Value::from(1i64));
        let mut contents = Dictionary::new();
        contents.insert("Entitlements".into(), Value::Dictionary(entitlements));

        assert!(profile_with(contents).get_task_allow());
        assert!(!profile_with(Dictionary::new()).get_task_allow());
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let mut contents = Dictionary::new();
        contents.insert("Name".into(), Value::String("Only Name".into()));
        let profile = profile_with(contents);

        assert_eq!(profile.name.as_deref(), Some("Only Name"));
        assert!(profile.entitlements.is_empty());
        assert!(!profile.provisions_all_devices);
        assert!(profile.provisioned_devices.is_none());
        assert!(profile.uuid.is_none());
        assert!(profile.version.is_none());
        assert_eq!(profile.file_name(), "Test.mobileprovision");
    }

    #[test]
    fn test_mistyped_field_defaults() {
        let mut contents = Dictionary::new();
        contents.insert("Version".into(), Value::String("one".into()));
        contents.insert("Entitlements".into(), Value::String("nope".into()));
        let profile = profile_with(contents);

        assert!(profile.version.is_none());
        assert!(profile.entitlements.is_empty());
    }

    #[test]
    fn test_contents_is_a_copy() {
        let profile = profile_with(classification_input(false, false, false));

        let mut copy = profile.contents();
        copy.insert("Injected".into(), Value::Boolean(true));
        if let Some(Value::Dictionary(ent)) = copy.get_mut("Entitlements") {
            ent.insert(GET_TASK_ALLOW.into(), Value::Boolean(true));
        }

        assert!(profile.contents().get("Injected").is_none());
        assert!(!profile.get_task_allow());
        assert_eq!(profile.profile_type().unwrap(), ProvisioningType::AppStoreDistribution);
    }

    fn bundle_input(prefix: Option<&str>, app_id: Option<&str>) -> Dictionary {
        let mut contents = Dictionary::new();
        if let Some(prefix) = prefix {
            contents.insert(
                "ApplicationIdentifierPrefix".into(),
                Value::Array(vec![Value::String(prefix.into())]),
            );
        }
        let mut entitlements = Dictionary::new();
        if let Some(app_id) = app_id {
            entitlements.insert(APPLICATION_IDENTIFIER.into(), Value::String(app_id.into()));
        }
        contents.insert("Entitlements".into(), Value::Dictionary(entitlements));
        contents
    }

    #[test]
    fn test_bundle_id_strips_prefix_once() {
        let profile = profile_with(bundle_input(Some("ABCDE12345"), Some("ABCDE12345.com.example.ABCDE12345.app")));
        assert_eq!(profile.bundle_id().unwrap(), "com.example.ABCDE12345.app");
    }

    #[test]
    fn test_bundle_id_wildcard() {
        let profile = profile_with(bundle_input(Some("ABCDE12345"), Some("ABCDE12345.*")));
        assert_eq!(profile.bundle_id().unwrap(), "*");
    }

    #[test]
    fn test_bundle_id_prefix_not_leading() {
        let profile = profile_with(bundle_input(Some("ABCDE12345"), Some("com.ABCDE12345.app")));
        assert_eq!(profile.bundle_id().unwrap(), "com.ABCDE12345.app");
    }

    #[test]
    fn test_bundle_id_prefix_is_literal() {
        let profile = profile_with(bundle_input(Some("A.C"), Some("ABC.com.example")));
        assert_eq!(profile.bundle_id().unwrap(), "ABC.com.example");
    }

    #[test]
    fn test_bundle_id_missing_parts() {
        let no_prefix = profile_with(bundle_input(None, Some("ABCDE12345.com.example.app")));
        assert!(matches!(no_prefix.bundle_id(), Err(Error::BundleIdUnavailable(_))));

        let no_app_id = profile_with(bundle_input(Some("ABCDE12345"), None));
        assert!(matches!(no_app_id.bundle_id(), Err(Error::BundleIdUnavailable(_))));
    }

    #[test]
    fn test_cli_names_round_trip() {
        for t in ProvisioningType::ALL {
            assert_eq!(ProvisioningType::from_cli_name(t.cli_name()), Some(t));
        }
        assert_eq!(ProvisioningType::from_cli_name("all"), None);
    }

    #[test]
    fn test_developer_certificates_absent() {
        let report = profile_with(Dictionary::new()).developer_certificates();
        assert!(report.facts.is_empty());
        assert!(report.failures.is_empty());
    }
}
