//! Line format for persisted registries
//!
//! One entry per line, `name=url`. Nothing is escaped: a line is split at its
//! first `=`, so names must not contain `=` and neither side may contain a
//! newline. The final newline is optional.

use url::Url;

use crate::backend::Snapshot;
use crate::error::StorageError;

/// Parse a persisted registry.
///
/// A single malformed line fails the whole parse; there is no partial result.
pub fn parse_snapshot(content: &str) -> Result<Snapshot, StorageError> {
    let mut snapshot = Snapshot::new();

    for (idx, line) in content.lines().enumerate() {
        let corrupt = |reason: String| StorageError::Corrupt {
            line: idx + 1,
            content: line.to_string(),
            reason,
        };

        let (name, target) = line
            .split_once('=')
            .ok_or_else(|| corrupt("expected name=url".to_string()))?;

        if name.is_empty() {
            return Err(corrupt("empty upstream name".to_string()));
        }

        let target = Url::parse(target).map_err(|e| corrupt(format!("invalid url: {}", e)))?;
        snapshot.insert(name.to_string(), target);
    }

    Ok(snapshot)
}

/// Render a registry in the persisted line format
pub fn render_snapshot(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for (name, target) in snapshot {
        out.push_str(name);
        out.push('=');
        out.push_str(target.as_str());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        assert!(parse_snapshot("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_entries() {
        let snapshot =
            parse_snapshot("foo=http://foo.example:8080\nbar=https://bar.example/\n").unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot.get("foo").unwrap().as_str(),
            "http://foo.example:8080/"
        );
        assert_eq!(snapshot.get("bar").unwrap().host_str(), Some("bar.example"));
    }

    #[test]
    fn test_final_newline_optional() {
        let with = parse_snapshot("foo=http://foo.example/\n").unwrap();
        let without = parse_snapshot("foo=http://foo.example/").unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn test_url_may_contain_equals() {
        let snapshot = parse_snapshot("foo=http://foo.example/hook?token=abc").unwrap();
        assert_eq!(
            snapshot.get("foo").unwrap().query(),
            Some("token=abc")
        );
    }

    #[test]
    fn test_missing_separator_is_corrupt() {
        let err = parse_snapshot("foo=http://foo.example/\nflugelhorn\n").unwrap_err();
        match err {
            StorageError::Corrupt { line, content, .. } => {
                assert_eq!(line, 2);
                assert_eq!(content, "flugelhorn");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_name_is_corrupt() {
        assert!(matches!(
            parse_snapshot("=http://foo.example/"),
            Err(StorageError::Corrupt { line: 1, .. })
        ));
    }

    #[test]
    fn test_invalid_url_is_corrupt() {
        assert!(matches!(
            parse_snapshot("foo=not a url"),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_blank_line_is_corrupt() {
        assert!(matches!(
            parse_snapshot("foo=http://foo.example/\n\nbar=http://bar.example/\n"),
            Err(StorageError::Corrupt { line: 2, .. })
        ));
    }

    #[test]
    fn test_render_parses_back() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("a".to_string(), Url::parse("http://a.example:1234").unwrap());
        snapshot.insert("b".to_string(), Url::parse("https://b.example/x?y=z").unwrap());

        let rendered = render_snapshot(&snapshot);
        assert_eq!(
            rendered,
            "a=http://a.example:1234/\nb=https://b.example/x?y=z\n"
        );
        assert_eq!(parse_snapshot(&rendered).unwrap(), snapshot);
    }
}
