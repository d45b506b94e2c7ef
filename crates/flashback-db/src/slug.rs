use std::sync::LazyLock;

use regex::Regex;

static NON_ALPHANUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("[^a-zA-Z0-9]+").expect("static slug pattern is valid")
});

/// URL-safe tag slug: trimmed, every run of non-ASCII-alphanumerics collapsed
/// to `-`, lowercased.
pub fn slugify(name: &str) -> String {
    NON_ALPHANUMERIC
        .replace_all(name.trim(), "-")
        .to_lowercase()
}
