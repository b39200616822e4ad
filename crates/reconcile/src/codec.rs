//! Document codecs
//!
//! A codec maps one on-disk file shape to an [`AccessDocument`]. Encoding is
//! canonical (sorted keys, four-space indent, no trailing newline), so a
//! document written by [`DocumentCodec::encode`] and read back produces the
//! same bytes and therefore the same checksum.

use crate::sets::WILDCARD;
use crate::types::{AccessDocument, Resources};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Parse/serialize access documents in one file shape
pub trait DocumentCodec {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Convert a parsed JSON value into a document
    fn from_value(&self, value: Value) -> serde_json::Result<AccessDocument>;

    /// Convert a document into this codec's JSON shape
    fn to_value(&self, document: &AccessDocument) -> serde_json::Result<Value>;

    /// Parse raw file bytes
    fn decode(&self, raw: &[u8]) -> serde_json::Result<AccessDocument> {
        let value: Value = serde_json::from_slice(raw)?;
        self.from_value(value)
    }

    /// Serialize a document in canonical form
    fn encode(&self, document: &AccessDocument) -> serde_json::Result<Vec<u8>> {
        to_canonical_json(&self.to_value(document)?)
    }
}

/// Pretty JSON with four-space indentation and no trailing newline
pub fn to_canonical_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(buf)
}

/// The native nested shape: `{"alice": {"orders": {"SELECT": ["id", "status"]}}}`
#[derive(Debug, Clone, Copy, Default)]
pub struct GrantCodec;

impl DocumentCodec for GrantCodec {
    fn name(&self) -> &'static str {
        "grants"
    }

    fn from_value(&self, value: Value) -> serde_json::Result<AccessDocument> {
        serde_json::from_value(value)
    }

    fn to_value(&self, document: &AccessDocument) -> serde_json::Result<Value> {
        serde_json::to_value(document)
    }
}

/// Default scope for role assignments
pub const GLOBAL_ROLES: &str = "globalRoles";

/// Role assignment shape: `{"sid": ["role-a", "role-b"]}`
///
/// Each role becomes the capability `role` on the resource `scope`, with a
/// wildcard qualifier so roles are only ever compared as whole values.
#[derive(Debug, Clone)]
pub struct RoleCodec {
    pub scope: String,
}

impl RoleCodec {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }
}

impl Default for RoleCodec {
    fn default() -> Self {
        Self::new(GLOBAL_ROLES)
    }
}

impl DocumentCodec for RoleCodec {
    fn name(&self) -> &'static str {
        "roles"
    }

    fn from_value(&self, value: Value) -> serde_json::Result<AccessDocument> {
        let assignments: BTreeMap<String, Vec<String>> = serde_json::from_value(value)?;

        let mut document = AccessDocument::new();
        for (sid, roles) in assignments {
            document.insert_subject(sid.clone(), Resources::new());
            for role in roles {
                document.insert(sid.clone(), self.scope.clone(), role, [WILDCARD.to_string()]);
            }
        }
        Ok(document)
    }

    fn to_value(&self, document: &AccessDocument) -> serde_json::Result<Value> {
        let assignments: BTreeMap<&str, Vec<&str>> = document
            .iter()
            .map(|(sid, resources)| {
                let roles: Vec<&str> = resources
                    .get(&self.scope)
                    .map(|caps| caps.keys().map(String::as_str).collect())
                    .unwrap_or_default();
                (sid.as_str(), roles)
            })
            .collect();
        serde_json::to_value(assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_codec_canonical_form() {
        let raw = br#"{"bob":{"users":{"SELECT":["*"]}},"alice":{"orders":{"SELECT":["id","status"]}}}"#;
        let doc = GrantCodec.decode(raw).unwrap();
        let encoded = String::from_utf8(GrantCodec.encode(&doc).unwrap()).unwrap();

        let expected = r#"{
    "alice": {
        "orders": {
            "SELECT": [
                "id",
                "status"
            ]
        }
    },
    "bob": {
        "users": {
            "SELECT": [
                "*"
            ]
        }
    }
}"#;
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_grant_codec_reencode_is_byte_stable() {
        let raw = br#"{"alice":{"orders":{"SELECT":["status","id"]}}}"#;
        let first = GrantCodec.encode(&GrantCodec.decode(raw).unwrap()).unwrap();
        let second = GrantCodec.encode(&GrantCodec.decode(&first).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_grant_codec_rejects_wrong_shape() {
        assert!(GrantCodec.decode(br#"{"alice": ["admin"]}"#).is_err());
        assert!(GrantCodec.decode(b"not json").is_err());
    }

    #[test]
    fn test_empty_document_encodes_as_empty_object() {
        let encoded = GrantCodec.encode(&AccessDocument::new()).unwrap();
        assert_eq!(encoded, b"{}");
    }

    #[test]
    fn test_role_codec_maps_roles_to_capabilities() {
        let codec = RoleCodec::default();
        let doc = codec
            .decode(br#"{"alice": ["admin", "viewer"], "bob": []}"#)
            .unwrap();

        assert_eq!(doc.grant_count(), 2);
        assert!(doc.contains_subject("bob"));
        assert_eq!(
            doc.get("alice").unwrap()[GLOBAL_ROLES]["admin"],
            vec!["*".to_string()]
        );
    }

    #[test]
    fn test_role_codec_round_trip() {
        let codec = RoleCodec::default();
        let doc = codec
            .decode(br#"{"alice": ["viewer", "admin"], "bob": []}"#)
            .unwrap();
        let encoded = String::from_utf8(codec.encode(&doc).unwrap()).unwrap();

        assert_eq!(
            encoded,
            "{\n    \"alice\": [\n        \"admin\",\n        \"viewer\"\n    ],\n    \"bob\": []\n}"
        );
        assert_eq!(codec.decode(encoded.as_bytes()).unwrap(), doc);
    }
}
