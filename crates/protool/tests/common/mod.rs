//! Fixture builders shared by the integration tests.
//!
//! Profiles are built as real CMS `SignedData` blobs, signed by a throwaway
//! self-signed certificate, so they go through the same unwrap path as the
//! files Xcode installs.

#![allow(dead_code)]

use cryptographic_message_syntax::{SignedDataBuilder, SignerBuilder};
use plist::{Dictionary, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use x509_certificate::{CapturedX509Certificate, InMemorySigningKeyPair};

pub const TEAM_ID: &str = "ABCDE12345";

/// Shape of a generated profile.
#[derive(Clone)]
pub struct ProfileSpec {
    pub uuid: String,
    pub name: String,
    pub bundle_id: String,
    pub get_task_allow: bool,
    pub devices: Option<Vec<String>>,
    pub all_devices: bool,
    pub certificates: Vec<Vec<u8>>,
}

impl ProfileSpec {
    pub fn new(bundle_id: &str) -> Self {
        Self {
            uuid: "6F1C2D3E-0000-4000-8000-000000000001".into(),
            name: format!("{} Profile", bundle_id),
            bundle_id: bundle_id.into(),
            get_task_allow: false,
            devices: None,
            all_devices: false,
            certificates: Vec::new(),
        }
    }

    pub fn development(mut self) -> Self {
        self.get_task_allow = true;
        self.devices = Some(vec!["00008030-000A1B2C3D4E5F60".into()]);
        self
    }

    pub fn uuid(mut self, uuid: &str) -> Self {
        self.uuid = uuid.into();
        self
    }

    pub fn dictionary(&self) -> Dictionary {
        let mut entitlements = Dictionary::new();
        entitlements.insert(
            "application-identifier".into(),
            Value::String(format!("{}.{}", TEAM_ID, self.bundle_id)),
        );
        entitlements.insert("get-task-allow".into(), Value::Boolean(self.get_task_allow));
        entitlements.insert(
            "keychain-access-groups".into(),
            Value::Array(vec![Value::String(format!("{}.*", TEAM_ID))]),
        );

        let created = SystemTime::UNIX_EPOCH + Duration::from_secs(1_705_314_600);
        let expires = created + Duration::from_secs(365 * 24 * 3600);

        let mut dict = Dictionary::new();
        dict.insert("AppIDName".into(), Value::String("Example App".into()));
        dict.insert(
            "ApplicationIdentifierPrefix".into(),
            Value::Array(vec![Value::String(TEAM_ID.into())]),
        );
        dict.insert("CreationDate".into(), Value::Date(created.into()));
        dict.insert("Platform".into(), Value::Array(vec![Value::String("iOS".into())]));
        dict.insert(
            "DeveloperCertificates".into(),
            Value::Array(self.certificates.iter().cloned().map(Value::Data).collect()),
        );
        dict.insert("Entitlements".into(), Value::Dictionary(entitlements));
        dict.insert("ExpirationDate".into(), Value::Date(expires.into()));
        dict.insert("Name".into(), Value::String(self.name.clone()));
        if let Some(devices) = &self.devices {
            dict.insert(
                "ProvisionedDevices".into(),
                Value::Array(devices.iter().cloned().map(Value::String).collect()),
            );
        }
        if self.all_devices {
            dict.insert("ProvisionsAllDevices".into(), Value::Boolean(true));
        }
        dict.insert("TeamIdentifier".into(), Value::Array(vec![Value::String(TEAM_ID.into())]));
        dict.insert("TeamName".into(), Value::String("Example Corp".into()));
        dict.insert("TimeToLive".into(), Value::from(365i64));
        dict.insert("UUID".into(), Value::String(self.uuid.clone()));
        dict.insert("Version".into(), Value::from(1i64));
        dict
    }

    pub fn plist_xml(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        Value::Dictionary(self.dictionary()).to_writer_xml(&mut buf).unwrap();
        buf
    }

    /// Write the profile as a signed `.mobileprovision` into `dir`.
    pub fn write_signed(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        fs::write(&path, sign(&self.plist_xml())).unwrap();
        path
    }
}

/// Self-signed certificate DER.
pub fn certificate_der() -> Vec<u8> {
    let certified = rcgen::generate_simple_self_signed(vec!["developer.example.com".to_string()]).unwrap();
    certified.cert.der().to_vec()
}

/// Wrap `payload` in a CMS `SignedData` with embedded content.
pub fn sign(payload: &[u8]) -> Vec<u8> {
    let certified = rcgen::generate_simple_self_signed(vec!["signer.example.com".to_string()]).unwrap();
    let cert = CapturedX509Certificate::from_der(certified.cert.der().to_vec()).unwrap();
    let key = InMemorySigningKeyPair::from_pkcs8_der(certified.key_pair.serialize_der()).unwrap();

    SignedDataBuilder::default()
        .content_inline(payload.to_vec())
        .signer(SignerBuilder::new(&key, cert))
        .build_der()
        .unwrap()
}
