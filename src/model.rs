use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Error;

/// The onboarding form types this engine can turn into documents.
///
/// Wire keys are the camelCase identifiers used by the forms subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormType {
    BrokerInformation,
    UnlicensedInformation,
    BusinessCard,
    WebsiteInformation,
    MpcApplication,
    PaymentAuthorization,
    PoliciesAcknowledgement,
    Photos,
    ContractAndSchedule,
}

impl FormType {
    /// The camelCase key used by the external forms subsystem.
    pub fn key(self) -> &'static str {
        match self {
            FormType::BrokerInformation => "brokerInformation",
            FormType::UnlicensedInformation => "unlicensedInformation",
            FormType::BusinessCard => "businessCard",
            FormType::WebsiteInformation => "websiteInformation",
            FormType::MpcApplication => "mpcApplication",
            FormType::PaymentAuthorization => "paymentAuthorization",
            FormType::PoliciesAcknowledgement => "policiesAcknowledgement",
            FormType::Photos => "photos",
            FormType::ContractAndSchedule => "contractAndSchedule",
        }
    }

    pub fn from_key(key: &str) -> Result<Self, Error> {
        match key {
            "brokerInformation" => Ok(FormType::BrokerInformation),
            "unlicensedInformation" => Ok(FormType::UnlicensedInformation),
            "businessCard" => Ok(FormType::BusinessCard),
            "websiteInformation" => Ok(FormType::WebsiteInformation),
            "mpcApplication" => Ok(FormType::MpcApplication),
            "paymentAuthorization" => Ok(FormType::PaymentAuthorization),
            "policiesAcknowledgement" => Ok(FormType::PoliciesAcknowledgement),
            "photos" => Ok(FormType::Photos),
            "contractAndSchedule" => Ok(FormType::ContractAndSchedule),
            other => Err(Error::UnknownFormType(other.to_string())),
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Pixel dimensions recorded alongside an uploaded asset.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// A reference to a previously uploaded binary (photo, signature,
/// initials, or contract PDF). The engine only dereferences these; it
/// never uploads or mutates the stored asset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    /// Upload/capture timestamp, consumed by the signing-date rule.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
}

impl AssetRef {
    pub fn new(url: impl Into<String>) -> Self {
        AssetRef {
            url: url.into(),
            content_type: None,
            dimensions: None,
            created_at: None,
        }
    }
}

/// A single field value inside a form record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Bool(bool),
    Number(f64),
    Asset(AssetRef),
    Text(String),
}

/// A flat field-name → value mapping for one completed form.
///
/// Produced and validated by the external forms subsystem; read-only
/// here. Drawing order is always dictated by the layout template, never
/// by the record, so the map type only affects serialization.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormRecord {
    pub fields: BTreeMap<String, FormValue>,
}

impl FormRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.fields.get(name)
    }

    /// The field as text, if present and textual.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FormValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The field as an asset reference, if present and one.
    pub fn asset(&self, name: &str) -> Option<&AssetRef> {
        match self.fields.get(name) {
            Some(FormValue::Asset(a)) => Some(a),
            _ => None,
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FormValue) {
        self.fields.insert(name.into(), value);
    }
}

/// A finished, serialized document.
///
/// `page_count` always matches the number of pages a reader of `bytes`
/// would find; the assembler relies on this when concatenating.
#[derive(Clone, Debug)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

impl RenderedDocument {
    pub fn new(bytes: Vec<u8>, page_count: usize) -> Self {
        RenderedDocument { bytes, page_count }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Raw signer artwork handed to the contract overlay, already fetched.
/// Any of the three images may be missing; the overlay skips what it
/// does not have rather than failing.
#[derive(Clone, Debug, Default)]
pub struct SignerAssets {
    pub broker_signature: Option<Vec<u8>>,
    pub broker_initials: Option<Vec<u8>>,
    pub employer_signature: Option<Vec<u8>>,
    /// Broker display name printed under the broker signature line.
    pub broker_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_type_round_trips_through_key() {
        for ft in [
            FormType::BrokerInformation,
            FormType::UnlicensedInformation,
            FormType::BusinessCard,
            FormType::WebsiteInformation,
            FormType::MpcApplication,
            FormType::PaymentAuthorization,
            FormType::PoliciesAcknowledgement,
            FormType::Photos,
            FormType::ContractAndSchedule,
        ] {
            assert_eq!(FormType::from_key(ft.key()).unwrap(), ft);
        }
        assert!(FormType::from_key("signatures").is_err());
    }

    #[test]
    fn record_deserializes_mixed_values() {
        let json = r#"{
            "firstName": "Dana",
            "yearsLicensed": 7,
            "bankruptcyDeclared": false,
            "signature": {"url": "https://cdn.example.com/sig.png"}
        }"#;
        let record: FormRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.text("firstName"), Some("Dana"));
        assert_eq!(record.get("yearsLicensed"), Some(&FormValue::Number(7.0)));
        assert_eq!(
            record.get("bankruptcyDeclared"),
            Some(&FormValue::Bool(false))
        );
        assert_eq!(
            record.asset("signature").map(|a| a.url.as_str()),
            Some("https://cdn.example.com/sig.png")
        );
    }

    #[test]
    fn asset_ref_parses_created_at() {
        let json = r#"{"url": "u", "createdAt": "2025-11-03T14:22:05Z"}"#;
        let asset: AssetRef = serde_json::from_str(json).unwrap();
        let ts = asset.created_at.unwrap();
        assert_eq!(ts.hour(), 14);
        assert_eq!(ts.minute(), 22);
    }
}
