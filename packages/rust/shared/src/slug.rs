//! Slugs and speaker-name normalization.
//!
//! Every character and story file stem goes through [`slugify`], and quote
//! matching uses the same function so that a speaker name resolves to the
//! file its character was written to.

use std::sync::LazyLock;

use regex::Regex;

/// Lower-case, drop non-word characters, collapse whitespace runs to `-`.
///
/// Idempotent: the output only contains word characters and hyphens.
pub fn slugify(s: &str) -> String {
    static NON_WORD_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
    static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    let lowered = s.trim().to_lowercase();
    let stripped = NON_WORD_RE.replace_all(&lowered, "");
    SPACE_RE.replace_all(&stripped, "-").into_owned()
}

/// Strip bracketed annotations (ASCII or full-width) from a speaker name.
///
/// `"Amiya (young)"` and `"アーミヤ［回想］"` both reduce to the bare name.
pub fn normalize_speaker(name: &str) -> String {
    static BRACKET_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[［\[\(（].*?[］\]\)）]").expect("valid regex"));

    BRACKET_RE.replace_all(name.trim(), "").trim().to_string()
}
