//! Payload input and output for the CLI.

use anyhow::Context;
use base64::Engine;
use clap::ValueEnum;
use std::io::Read;
use std::path::Path;

/// How a binary payload is represented on stdin/stdout or in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PayloadFormat {
    /// Raw protobuf bytes
    #[value(name = "raw")]
    Raw,
    /// Standard base64 text, surrounding whitespace ignored
    #[value(name = "base64")]
    Base64,
}

/// Read all of `path`, or stdin when no path is given.
pub fn read_input(path: Option<&Path>) -> anyhow::Result<Vec<u8>> {
    match path {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("Failed to read input file {path:?}"))
        }
        None => {
            let mut buffer = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}

/// Turn input bytes into the protobuf payload.
pub fn decode_payload(input: &[u8], format: PayloadFormat) -> anyhow::Result<Vec<u8>> {
    match format {
        PayloadFormat::Raw => Ok(input.to_vec()),
        PayloadFormat::Base64 => {
            let text = std::str::from_utf8(input).context("Base64 input is not UTF-8")?;
            base64::engine::general_purpose::STANDARD
                .decode(text.trim())
                .context("Invalid base64 payload")
        }
    }
}

/// Turn a protobuf payload into output bytes.
pub fn encode_payload(payload: &[u8], format: PayloadFormat) -> Vec<u8> {
    match format {
        PayloadFormat::Raw => payload.to_vec(),
        PayloadFormat::Base64 => {
            let mut text = base64::engine::general_purpose::STANDARD.encode(payload);
            text.push('\n');
            text.into_bytes()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_payload_trims_whitespace() {
        let payload = decode_payload(b"  CgdPcmlnaW5z\n", PayloadFormat::Base64)
            .expect("Failed to decode base64");
        assert_eq!(payload, b"\x0a\x07Origins");
    }

    #[test]
    fn test_raw_payload_is_unchanged() {
        let bytes = [0x0a, 0x00, 0xff];
        assert_eq!(
            decode_payload(&bytes, PayloadFormat::Raw).expect("raw"),
            bytes.to_vec()
        );
        assert_eq!(encode_payload(&bytes, PayloadFormat::Raw), bytes.to_vec());
    }

    #[test]
    fn test_base64_output_ends_with_newline() {
        assert_eq!(
            encode_payload(b"\x0a\x07Origins", PayloadFormat::Base64),
            b"CgdPcmlnaW5z\n".to_vec()
        );
    }

    #[test]
    fn test_invalid_base64_payload() {
        assert!(decode_payload(b"@@@", PayloadFormat::Base64).is_err());
    }
}
