//! Embedded-metadata model and the ICMT payload line protocol.
//!
//! The payload format is byte-compatible across versions — extraction of
//! old files depends on it:
//!
//! ```text
//! SYNAPSEQ_META::ID=<id>
//! VERSION=<app version>
//! GENERATED=<RFC3339 UTC timestamp>
//! PLATFORM=<os/arch>
//! CONTENT=
//! <base64 of original sequence source bytes>
//! ```

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{SecondsFormat, Utc};

use crate::error::FormatError;

const ID_PREFIX: &str = "SYNAPSEQ_META::ID=";
const VERSION_PREFIX: &str = "VERSION=";
const GENERATED_PREFIX: &str = "GENERATED=";
const PLATFORM_PREFIX: &str = "PLATFORM=";
const CONTENT_PREFIX: &str = "CONTENT=";

/// Provenance and content embedded into a rendered WAV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub id: String,
    pub version: String,
    /// RFC3339 UTC timestamp of generation.
    pub generated: String,
    /// `os/arch` of the generating host.
    pub platform: String,
    /// Base64 of the original sequence source bytes.
    pub content: String,
}

impl Metadata {
    /// Build metadata for a sequence source being rendered now.
    pub fn from_source(source: &[u8]) -> Metadata {
        let generated = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let content = BASE64.encode(source);
        let id = derive_id(&content, &generated);
        Metadata {
            id,
            version: crate::VERSION.to_string(),
            generated,
            platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
            content,
        }
    }

    /// Decode the embedded content back to the original source bytes.
    pub fn decode_content(&self) -> Result<Vec<u8>, FormatError> {
        BASE64
            .decode(self.content.trim())
            .map_err(|e| FormatError::InvalidContent(format!("{e}")))
    }

    /// Serialize to the ICMT payload line protocol.
    pub fn to_icmt_payload(&self) -> String {
        format!(
            "{ID_PREFIX}{}\n{VERSION_PREFIX}{}\n{GENERATED_PREFIX}{}\n{PLATFORM_PREFIX}{}\n{CONTENT_PREFIX}\n{}",
            self.id, self.version, self.generated, self.platform, self.content
        )
    }

    /// Parse an ICMT payload. Every field is required; anything missing is
    /// a typed invalid-metadata failure, never an I/O error.
    pub fn from_icmt_payload(payload: &str) -> Result<Metadata, FormatError> {
        let mut id = None;
        let mut version = None;
        let mut generated = None;
        let mut platform = None;
        let mut content: Option<String> = None;
        let mut in_content = false;

        for line in payload.lines() {
            if in_content {
                let chunk = line.trim();
                if !chunk.is_empty() {
                    content.get_or_insert_with(String::new).push_str(chunk);
                }
            } else if let Some(rest) = line.strip_prefix(ID_PREFIX) {
                id = Some(rest.to_string());
            } else if let Some(rest) = line.strip_prefix(VERSION_PREFIX) {
                version = Some(rest.to_string());
            } else if let Some(rest) = line.strip_prefix(GENERATED_PREFIX) {
                generated = Some(rest.to_string());
            } else if let Some(rest) = line.strip_prefix(PLATFORM_PREFIX) {
                platform = Some(rest.to_string());
            } else if line.starts_with(CONTENT_PREFIX) {
                in_content = true;
            }
        }

        Ok(Metadata {
            id: id.ok_or(FormatError::MissingField("ID"))?,
            version: version.ok_or(FormatError::MissingField("VERSION"))?,
            generated: generated.ok_or(FormatError::MissingField("GENERATED"))?,
            platform: platform.ok_or(FormatError::MissingField("PLATFORM"))?,
            content: content.ok_or(FormatError::MissingField("CONTENT"))?,
        })
    }

    /// The banner comment block placed above extracted sequence text,
    /// reproducing the provenance fields.
    pub fn banner(&self) -> String {
        format!(
            "#\n# Sequence extracted from SynapSeq WAV metadata\n# ID: {}\n# Generated: {}\n# Version: {}\n# Platform: {}\n#\n",
            self.id, self.generated, self.version, self.platform
        )
    }
}

/// Derive a UUID-shaped identifier from the content and timestamp.
fn derive_id(content: &str, generated: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(content.as_bytes());
    hasher.update(generated.as_bytes());
    let hash = hasher.finalize();
    let b = hash.as_bytes();
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12], b[13],
        b[14], b[15]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_roundtrip() {
        let meta = Metadata::from_source(b"@samplerate 44100\nalpha\n");
        let payload = meta.to_icmt_payload();
        let parsed = Metadata::from_icmt_payload(&payload).unwrap();
        assert_eq!(parsed, meta);
        assert_eq!(parsed.decode_content().unwrap(), b"@samplerate 44100\nalpha\n");
    }

    #[test]
    fn payload_layout_is_fixed() {
        let meta = Metadata {
            id: "abc".to_string(),
            version: "1.2.3".to_string(),
            generated: "2026-01-01T00:00:00Z".to_string(),
            platform: "linux/x86_64".to_string(),
            content: "aGVsbG8=".to_string(),
        };
        assert_eq!(
            meta.to_icmt_payload(),
            "SYNAPSEQ_META::ID=abc\nVERSION=1.2.3\nGENERATED=2026-01-01T00:00:00Z\nPLATFORM=linux/x86_64\nCONTENT=\naGVsbG8="
        );
    }

    #[test]
    fn missing_fields_are_typed_failures() {
        let payload = "VERSION=1.0.0\nGENERATED=now\nPLATFORM=linux/x86_64\nCONTENT=\nabcd";
        match Metadata::from_icmt_payload(payload) {
            Err(FormatError::MissingField("ID")) => {}
            other => panic!("expected missing ID, got {other:?}"),
        }

        let payload = "SYNAPSEQ_META::ID=x\nVERSION=1\nGENERATED=now\nPLATFORM=linux/x86_64";
        match Metadata::from_icmt_payload(payload) {
            Err(FormatError::MissingField("CONTENT")) => {}
            other => panic!("expected missing CONTENT, got {other:?}"),
        }
    }

    #[test]
    fn content_may_span_lines() {
        let payload = "SYNAPSEQ_META::ID=x\nVERSION=1\nGENERATED=now\nPLATFORM=l/x\nCONTENT=\naGVs\nbG8=";
        let meta = Metadata::from_icmt_payload(payload).unwrap();
        assert_eq!(meta.decode_content().unwrap(), b"hello");
    }

    #[test]
    fn bad_base64_is_invalid_content() {
        let payload = "SYNAPSEQ_META::ID=x\nVERSION=1\nGENERATED=now\nPLATFORM=l/x\nCONTENT=\n!!!";
        let meta = Metadata::from_icmt_payload(payload).unwrap();
        assert!(matches!(
            meta.decode_content(),
            Err(FormatError::InvalidContent(_))
        ));
    }

    #[test]
    fn derived_ids_are_stable_and_uuid_shaped() {
        let a = derive_id("content", "2026-01-01T00:00:00Z");
        let b = derive_id("content", "2026-01-01T00:00:00Z");
        let c = derive_id("content", "2026-01-01T00:00:01Z");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let parts: Vec<&str> = a.split('-').collect();
        let lens: Vec<usize> = parts.iter().map(|p| p.len()).collect();
        assert_eq!(lens, vec![8, 4, 4, 4, 12]);
    }

    #[test]
    fn banner_reproduces_provenance() {
        let meta = Metadata::from_source(b"x");
        let banner = meta.banner();
        assert!(banner.contains(&meta.id));
        assert!(banner.contains(&meta.generated));
        assert!(banner.contains(&meta.version));
        assert!(banner.contains(&meta.platform));
        assert!(banner.lines().all(|l| l.starts_with('#')));
    }
}
