//! Strict codec helpers over `encoding_rs`, and the encoding sniffer.
//!
//! "Strict" means no replacement characters in either direction: a byte
//! sequence that does not decode, or a character that does not encode, is a
//! failure rather than something to paper over.

mod sniff;

pub use encoding_rs::{Encoding, GBK};
pub use sniff::{Clock, EncodingDecision, Sniffer, SystemClock, SNIFF_BUDGET};

use crate::error::{Error, Result};

/// Look up an encoding usable for both decoding and encoding.
///
/// Rejects unknown labels, the `replacement` pseudo-encoding, and encodings
/// whose encoder writes something else (the UTF-16 family encodes as UTF-8).
pub fn for_label(label: &str) -> Result<&'static Encoding> {
    match Encoding::for_label(label.trim().as_bytes()) {
        Some(encoding)
            if encoding != encoding_rs::REPLACEMENT && encoding.output_encoding() == encoding =>
        {
            Ok(encoding)
        }
        _ => Err(Error::UnsupportedEncoding {
            label: label.to_string(),
        }),
    }
}

/// Decode `bytes`, failing on any malformed sequence. A BOM is not treated
/// specially.
///
/// Text the encoder cannot write back is also a failure: the GBK decoder
/// accepts gb18030 four-byte sequences that the GBK encoder never produces.
pub fn decode_strict(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let text = encoding.decode_without_bom_handling_and_without_replacement(bytes)?;
    encode_strict(&text, encoding)?;
    Some(text.into_owned())
}

/// Encode `text`, failing on any unmappable character.
pub fn encode_strict(text: &str, encoding: &'static Encoding) -> Option<Vec<u8>> {
    let (bytes, used, had_errors) = encoding.encode(text);
    (!had_errors && used == encoding).then(|| bytes.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gbk_label_variants() {
        assert_eq!(for_label("gbk").unwrap(), GBK);
        assert_eq!(for_label(" GBK ").unwrap(), GBK);
    }

    #[test]
    fn unknown_label_is_unsupported() {
        let err = for_label("klingon").unwrap_err();
        assert_eq!(err.to_string(), "Encoding klingon is not supported.");
    }

    #[test]
    fn one_way_encodings_are_unsupported() {
        assert!(for_label("utf-16le").is_err());
        assert!(for_label("replacement").is_err());
    }

    #[test]
    fn decode_gbk() {
        // 中国
        let bytes = [0xD6, 0xD0, 0xB9, 0xFA];
        assert_eq!(decode_strict(&bytes, GBK).as_deref(), Some("中国"));
    }

    #[test]
    fn decode_rejects_truncated_sequence() {
        assert_eq!(decode_strict(&[0xD6, 0xD0, 0xB9], GBK), None);
        assert_eq!(decode_strict(&[b'a', 0xFF, b'b'], GBK), None);
    }

    #[test]
    fn decode_rejects_four_byte_sequences() {
        // 中 followed by gb18030's four-byte form of U+0080.
        assert_eq!(decode_strict(&[0xD6, 0xD0, 0x81, 0x30, 0x81, 0x30], GBK), None);
    }

    #[test]
    fn encode_gbk() {
        assert_eq!(
            encode_strict("中国\r\n", GBK),
            Some(vec![0xD6, 0xD0, 0xB9, 0xFA, b'\r', b'\n'])
        );
    }

    #[test]
    fn encode_rejects_unmappable() {
        assert_eq!(encode_strict("smile 😀", GBK), None);
    }
}
