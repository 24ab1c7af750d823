//! Charset-correct text reading for resolved locations.
//!
//! The includer must never read a document through the platform default
//! encoding: the charset is taken from the caller, the byte-order mark,
//! or the XML declaration, in that order, with UTF-8 as the fallback.
//! Malformed sequences decode to replacement characters rather than
//! failing the whole expansion.

use encoding_rs::{Encoding, UTF_8};

use crate::encoding::declared_encoding;
use crate::error::WeaveError;
use crate::location::Location;

/// Read a location and decode it into text.
///
/// `charset` overrides detection when given; otherwise the byte-order
/// mark, then the declared encoding, then UTF-8 decide.
pub fn read_location_to_string(
    location: &Location,
    charset: Option<&'static Encoding>,
) -> Result<String, WeaveError> {
    let bytes = location
        .read_bytes()
        .map_err(|err| WeaveError::Io(format!("{}: {}", location, err)))?;
    decode_bytes(&bytes, charset)
}

/// Decode raw document bytes into text.
pub fn decode_bytes(
    bytes: &[u8],
    charset: Option<&'static Encoding>,
) -> Result<String, WeaveError> {
    let encoding = match charset {
        Some(encoding) => encoding,
        None => sniff_encoding(bytes)?,
    };
    let (text, _had_errors) = encoding.decode_with_bom_removal(bytes);
    Ok(text.into_owned())
}

/// Pick the encoding of a document from its bytes.
fn sniff_encoding(bytes: &[u8]) -> Result<&'static Encoding, WeaveError> {
    if let Some((encoding, _bom_len)) = Encoding::for_bom(bytes) {
        return Ok(encoding);
    }
    if let Some(label) = declared_encoding(bytes) {
        return Encoding::for_label(label.as_bytes())
            .ok_or(WeaveError::UnsupportedEncoding(label));
    }
    Ok(UTF_8)
}

/// Look up an `encoding_rs` encoding for a declared label.
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding, WeaveError> {
    Encoding::for_label(label.as_bytes())
        .ok_or_else(|| WeaveError::UnsupportedEncoding(label.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_utf8() {
        let text = decode_bytes(b"<root>caf\xC3\xA9</root>", None).unwrap();
        assert_eq!(text, "<root>café</root>");
    }

    #[test]
    fn test_decode_declared_latin1() {
        let text =
            decode_bytes(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r>caf\xE9</r>", None)
                .unwrap();
        assert!(text.ends_with("<r>caf\u{e9}</r>"));
    }

    #[test]
    fn test_decode_strips_utf8_bom() {
        let text = decode_bytes(b"\xEF\xBB\xBF<root/>", None).unwrap();
        assert_eq!(text, "<root/>");
    }

    #[test]
    fn test_explicit_charset_wins() {
        let text = decode_bytes(b"caf\xE9", Some(encoding_rs::WINDOWS_1252)).unwrap();
        assert_eq!(text, "caf\u{e9}");
    }

    #[test]
    fn test_unknown_label_is_an_error() {
        let err = decode_bytes(b"<?xml version=\"1.0\" encoding=\"martian\"?><r/>", None)
            .unwrap_err();
        assert!(matches!(err, WeaveError::UnsupportedEncoding(_)));
    }
}
