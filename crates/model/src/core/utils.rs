use std::fmt::Write;

/// Escape CSV per PostgreSQL COPY CSV rules:
/// - field is wrapped in double quotes
/// - internal `"` becomes `""`
/// - commas, newlines, tabs are safe because quoting protects them
pub fn escape_csv_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');

    for ch in s.chars() {
        if ch == '"' {
            out.push('"'); // double the quote
        }
        out.push(ch);
    }

    out.push('"');
    out
}

/// Hex form accepted by `bytea` input (`\x0a1b`).
pub fn encode_bytea(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + 2 * bytes.len());
    out.push_str("\\x");
    for b in bytes {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_are_doubled() {
        assert_eq!(escape_csv_string(r#"say "hi", bye"#), r#""say ""hi"", bye""#);
    }

    #[test]
    fn bytea_hex() {
        assert_eq!(encode_bytea(&[0x0a, 0xff]), "\\x0aff");
    }
}
