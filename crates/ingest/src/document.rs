//! Raw document decoding.

/// Decode file bytes into document text: UTF-8 when valid, lossy otherwise.
/// Surrounding whitespace is trimmed.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim().to_string(),
        Err(_) => String::from_utf8_lossy(bytes).trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_text() {
        let text = decode_text(b"Hello, world!\nThis is a test file.");
        assert!(text.contains("Hello, world!"));
    }

    #[test]
    fn keeps_multibyte_text() {
        let content = "Ünïcödé text with émojis 🎉";
        assert_eq!(decode_text(content.as_bytes()), content);
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        let text = decode_text(b"abc\xffdef");
        assert_eq!(text, "abc\u{FFFD}def");
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(decode_text(b"  \n  Hello  \n  "), "Hello");
        assert_eq!(decode_text(b""), "");
    }
}
