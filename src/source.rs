//! Local half of the byte-source collaborator: resolves a locator into raw
//! bytes under a per-payload size ceiling, and never parses anything.
//!
//! Remote (HTTP) resolution lives outside this crate; callers with remote
//! sources fetch the bytes themselves and hand them to the parsing or
//! decoding entry points directly.

use std::fs;
use std::io::{self, Read};

use tracing::debug;

use crate::error::SynapseqError;

/// What the requested bytes will be used for; selects the size ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Text sequence source.
    Text,
    /// JSON/XML/YAML sequence source.
    Structured,
    /// Background WAV material.
    BackgroundAudio,
}

impl PayloadKind {
    /// Maximum accepted payload size in bytes.
    pub fn max_size(self) -> usize {
        match self {
            PayloadKind::Text => 32 * 1024,
            PayloadKind::Structured => 128 * 1024,
            PayloadKind::BackgroundAudio => 10 * 1024 * 1024,
        }
    }
}

fn oversize(locator: &str, kind: PayloadKind) -> SynapseqError {
    SynapseqError::Io(io::Error::new(
        io::ErrorKind::InvalidData,
        format!(
            "{locator}: exceeds maximum size of {} bytes for {kind:?} input",
            kind.max_size()
        ),
    ))
}

/// Resolve `-` (stdin) or a local path into raw bytes, enforcing the size
/// ceiling for `kind`. An oversized source is an error, not a truncation.
pub fn fetch(locator: &str, kind: PayloadKind) -> Result<Vec<u8>, SynapseqError> {
    let max = kind.max_size();

    if locator == "-" {
        let mut data = Vec::new();
        io::stdin()
            .lock()
            .take(max as u64 + 1)
            .read_to_end(&mut data)?;
        if data.len() > max {
            return Err(oversize("stdin", kind));
        }
        return Ok(data);
    }

    let meta = fs::metadata(locator)?;
    if meta.len() > max as u64 {
        return Err(oversize(locator, kind));
    }
    let data = fs::read(locator)?;
    debug!(locator, bytes = data.len(), "resolved byte source");
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn ceilings_match_contract() {
        assert_eq!(PayloadKind::Text.max_size(), 32 * 1024);
        assert_eq!(PayloadKind::Structured.max_size(), 128 * 1024);
        assert_eq!(PayloadKind::BackgroundAudio.max_size(), 10 * 1024 * 1024);
    }

    #[test]
    fn reads_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"@samplerate 44100\n").unwrap();
        let data = fetch(file.path().to_str().unwrap(), PayloadKind::Text).unwrap();
        assert_eq!(data, b"@samplerate 44100\n");
    }

    #[test]
    fn oversize_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![b'x'; PayloadKind::Text.max_size() + 1])
            .unwrap();
        let err = fetch(file.path().to_str().unwrap(), PayloadKind::Text).unwrap_err();
        assert!(format!("{err}").contains("maximum size"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = fetch("/no/such/file.spsq", PayloadKind::Text).unwrap_err();
        assert!(matches!(err, SynapseqError::Io(_)));
    }
}
