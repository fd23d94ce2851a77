//! Plain-text story script parser.
//!
//! Story `.txt` files are command scripts: one command or line per row.
//! Spoken lines look like `[name="Amiya"]Doctor, you're awake?` or
//! `[multiline(name="Amiya", end=true)]...`. Every other command
//! (`[Dialog]`, `[Character(...)]`, `[Blocker(...)]`) and bare narration is
//! ignored here.

use std::sync::LazyLock;

use regex::Regex;

use akdata_shared::Speech;

static NAMED_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\[\s*(?:multiline\s*\(\s*)?name\s*=\s*"([^"]*)"[^\]]*\]\s*(.*)$"#)
        .expect("valid regex")
});

/// Extract up to `cap` speeches from a story script.
pub fn parse_script(script: &str, cap: usize) -> Vec<Speech> {
    let mut out = Vec::new();
    let script = script.strip_prefix('\u{feff}').unwrap_or(script);

    for line in script.lines() {
        if out.len() >= cap {
            break;
        }
        let Some(caps) = NAMED_LINE_RE.captures(line.trim()) else {
            continue;
        };
        let speaker = caps[1].trim();
        let text = caps[2].trim();
        if speaker.is_empty() || text.is_empty() {
            continue;
        }
        out.push(Speech::new(speaker, text));
    }

    out
}
