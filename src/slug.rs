//! URL slugs derived from question text

use regex::Regex;
use std::sync::OnceLock;

/// Maximum length of the text-derived part of a slug
pub const MAX_SLUG_LEN: usize = 50;

/// Length of the identifier fragment appended by [`unique_slug`]
pub const ID_FRAGMENT_LEN: usize = 8;

fn disallowed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9\s]").expect("valid slug pattern"))
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

/// Lowercase, drop everything but `[a-z0-9]` and whitespace, hyphenate
/// whitespace runs, trim hyphens, cap at [`MAX_SLUG_LEN`].
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = disallowed().replace_all(&lowered, "");
    let hyphenated = whitespace().replace_all(&stripped, "-");

    // Only ASCII survives the strip, so byte and char lengths agree.
    let trimmed = hyphenated.trim_matches('-');
    let capped = &trimmed[..trimmed.len().min(MAX_SLUG_LEN)];
    capped.trim_end_matches('-').to_string()
}

/// [`slugify`] plus the first [`ID_FRAGMENT_LEN`] characters of `id`.
///
/// Uniqueness is only as good as the identifier's entropy.
pub fn unique_slug(text: &str, id: &str) -> String {
    let base = slugify(text);
    let fragment: String = id.chars().take(ID_FRAGMENT_LEN).collect();

    if base.is_empty() {
        fragment
    } else {
        format!("{}-{}", base, fragment)
    }
}
