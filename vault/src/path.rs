//! Vault path conventions.
//!
//! Vault paths are `/`-separated strings relative to the vault root, e.g.
//! `references/doe2020.md`.

/// Normalize a vault path.
///
/// Runs of `/` or `\` collapse to a single `/`, leading and trailing
/// separators are stripped and non-breaking spaces become plain spaces. An
/// empty result is the vault root, `/`.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut pending_separator = false;

    for c in path.chars() {
        match c {
            '/' | '\\' => pending_separator = true,
            _ => {
                if pending_separator && !out.is_empty() {
                    out.push('/');
                }
                pending_separator = false;
                out.push(match c {
                    '\u{00A0}' | '\u{202F}' => ' ',
                    _ => c,
                });
            }
        }
    }

    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Path of the reference note for `citekey` inside `folder`.
pub fn reference_path(folder: &str, citekey: &str) -> String {
    normalize_path(&format!("{folder}/{citekey}.md"))
}

/// Parent folder of a normalized vault path, or `None` at the root level.
pub fn parent(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

/// Whether the path names a markdown document.
pub fn is_markdown(path: &str) -> bool {
    path.rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case("md"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("refs/doe.md"), "refs/doe.md");
        assert_eq!(normalize_path("//refs\\\\sub//doe.md/"), "refs/sub/doe.md");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("a\u{00A0}b/c\u{202F}d"), "a b/c d");
    }

    #[test]
    fn test_reference_path() {
        assert_eq!(reference_path("refs", "doe2020"), "refs/doe2020.md");
        assert_eq!(reference_path("refs/", "doe2020"), "refs/doe2020.md");
        assert_eq!(reference_path("", "doe2020"), "doe2020.md");
        // Citekeys may contain `/`, which nests the note.
        assert_eq!(reference_path("refs", "a/b"), "refs/a/b.md");
        // Case is preserved.
        assert_eq!(reference_path("Refs", "Doe2020"), "Refs/Doe2020.md");
    }

    #[test]
    fn test_parent_and_markdown() {
        assert_eq!(parent("refs/a/b.md"), Some("refs/a"));
        assert_eq!(parent("b.md"), None);
        assert!(is_markdown("notes/a.md"));
        assert!(is_markdown("A.MD"));
        assert!(!is_markdown("notes/a.txt"));
        assert!(!is_markdown(".md"));
    }
}
