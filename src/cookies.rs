//! Cookie header parsing and `Set-Cookie` construction.

use std::collections::HashMap;

/// Decode `%XX` escapes; a value that does not decode to UTF-8 is kept as-is.
fn decode_value(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|value| value.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Parse a `Cookie` header into name/value pairs.
///
/// Parts without `=` or with an empty name are skipped; later duplicates win.
pub fn parse_cookies(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|part| {
            let (name, value) = part.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), decode_value(value.trim())))
        })
        .collect()
}

/// `Set-Cookie` value for the session id
pub fn session_cookie(name: &str, session_id: &str, max_age_secs: u64) -> String {
    format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        name,
        urlencoding::encode(session_id),
        max_age_secs
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cookies() {
        let cookies = parse_cookies("sid=abc123; theme=dark%20mode;bad; =x; empty=");
        assert_eq!(cookies.get("sid").map(String::as_str), Some("abc123"));
        assert_eq!(cookies.get("theme").map(String::as_str), Some("dark mode"));
        assert_eq!(cookies.get("empty").map(String::as_str), Some(""));
        assert!(!cookies.contains_key("bad"));
        assert_eq!(cookies.len(), 3);
    }

    #[test]
    fn test_malformed_escape_kept() {
        let cookies = parse_cookies("a=100%; b=%zz");
        assert_eq!(cookies["a"], "100%");
        assert_eq!(cookies["b"], "%zz");
    }

    #[test]
    fn test_invalid_utf8_escape_kept() {
        let cookies = parse_cookies("a=%FF%FE");
        assert_eq!(cookies["a"], "%FF%FE");
    }

    #[test]
    fn test_session_id_is_encoded() {
        assert!(session_cookie("sid", "a b;c", 60).starts_with("sid=a%20b%3Bc;"));
    }

    #[test]
    fn test_session_cookie_attributes() {
        assert_eq!(
            session_cookie("sid", "deadbeef", 86_400),
            "sid=deadbeef; Max-Age=86400; Path=/; HttpOnly; SameSite=Lax"
        );
    }
}
