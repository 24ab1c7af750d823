//! Detection of an XML document's character encoding.
//!
//! Looks at the byte-order mark first, then at the `encoding`
//! pseudo-attribute of the XML declaration. Returns the encoding *name*
//! only; actual decoding happens in [`crate::reader`].

/// Detect the encoding of an XML document from its first bytes.
///
/// Order of precedence: byte-order mark, then the declared encoding of
/// the `<?xml …?>` prolog. Returns `None` when neither is present.
pub fn detect_encoding(bytes: &[u8]) -> Option<String> {
    if let Some(from_bom) = bom_encoding(bytes) {
        return Some(from_bom.to_string());
    }
    declared_encoding(bytes)
}

/// The encoding implied by a byte-order mark, if one is present.
pub fn bom_encoding(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        Some("UTF-8")
    } else if bytes.starts_with(&[0xFF, 0xFE]) {
        Some("UTF-16LE")
    } else if bytes.starts_with(&[0xFE, 0xFF]) {
        Some("UTF-16BE")
    } else {
        None
    }
}

/// The `encoding` pseudo-attribute of the XML declaration, if declared.
///
/// Only ASCII-compatible inputs are scanned; UTF-16 documents are
/// identified by their byte-order mark before this runs.
pub fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let text = leading_ascii(bytes);
    let rest = text.trim_start();
    if !rest.starts_with("<?xml") {
        return None;
    }
    let end = rest.find("?>")?;
    let decl = &rest[..end];
    let at = decl.find("encoding")?;
    let mut tail = decl[at + "encoding".len()..].trim_start();
    tail = tail.strip_prefix('=')?.trim_start();
    let quote = tail.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let value = &tail[1..];
    let close = value.find(quote)?;
    let name = &value[..close];
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

/// View the longest ASCII prefix of the input as text.
///
/// The XML declaration must be ASCII in every ASCII-compatible encoding,
/// so this is enough to read it without committing to a charset.
fn leading_ascii(bytes: &[u8]) -> &str {
    let len = bytes
        .iter()
        .position(|&b| !b.is_ascii() || b == 0)
        .unwrap_or(bytes.len());
    // The prefix is pure ASCII, which is always valid UTF-8.
    core::str::from_utf8(&bytes[..len]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_encoding_double_quotes() {
        let doc = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<root/>";
        assert_eq!(detect_encoding(doc).as_deref(), Some("ISO-8859-1"));
    }

    #[test]
    fn test_declared_encoding_single_quotes() {
        let doc = b"<?xml version='1.0' encoding='utf-8' ?><root/>";
        assert_eq!(detect_encoding(doc).as_deref(), Some("utf-8"));
    }

    #[test]
    fn test_no_declaration() {
        let doc = b"<root/>";
        assert_eq!(detect_encoding(doc), None);
    }

    #[test]
    fn test_declaration_without_encoding() {
        let doc = b"<?xml version=\"1.0\"?><root/>";
        assert_eq!(detect_encoding(doc), None);
    }

    #[test]
    fn test_utf8_bom_wins() {
        let doc = b"\xEF\xBB\xBF<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><root/>";
        assert_eq!(detect_encoding(doc).as_deref(), Some("UTF-8"));
    }

    #[test]
    fn test_utf16_le_bom() {
        let doc = b"\xFF\xFE<\x00?\x00x\x00m\x00l\x00";
        assert_eq!(detect_encoding(doc).as_deref(), Some("UTF-16LE"));
    }

    #[test]
    fn test_garbage_is_not_a_declaration() {
        let doc = b"\x01\x02\x03<?xml encoding=\"x\"?>";
        assert_eq!(detect_encoding(doc), None);
    }
}
