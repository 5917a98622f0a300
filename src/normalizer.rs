//! Cleanup of raw backend text into a candidate command.

const FENCE: &str = "```";

/// Strips surrounding whitespace and a single pair of code-fence markers.
///
/// A leading fence may carry a language tag (` ```powershell `) on its own
/// line, which is removed along with it. Nothing else is touched: multi-line output stays
/// multi-line, and the text is not inspected for meaning.
///
/// ```
/// use psgen::normalizer::normalize;
///
/// assert_eq!(normalize("```powershell\nGet-Date\n```"), "Get-Date");
/// assert_eq!(normalize("  Get-Date  "), "Get-Date");
/// ```
pub fn normalize(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix(FENCE) {
        let tag_len = rest
            .find(|c: char| !is_language_char(c))
            .unwrap_or(rest.len());
        // An info string runs to the end of the fence line.
        let after_tag = rest[tag_len..].trim_start_matches([' ', '\t']);
        let tagged = after_tag.starts_with('\n') || after_tag.starts_with("\r\n");
        text = if tagged { after_tag } else { rest };
    }

    if let Some(rest) = text.strip_suffix(FENCE) {
        text = rest;
    }

    text.trim().to_string()
}

fn is_language_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.')
}
