use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

static UNSAFE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\-. ]").unwrap());

/// Turns a video title into a safe file stem: word characters, hyphen,
/// period and space survive, everything else becomes "_".
pub fn sanitize_title(title: &str) -> String {
    let title: String = title.nfc().collect();
    UNSAFE_RE.replace_all(&title, "_").into_owned()
}
