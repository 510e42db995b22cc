//! Inline markdown helpers shared by the PDF and mindmap renderers.

/// Removes bold markers and backticks and replaces `[label](target)` links
/// with their label.
#[must_use]
pub fn strip_inline(text: &str) -> String {
    let mut out = text.replace("**", "").replace('`', "");

    while let Some(start) = out.find("](") {
        let Some(open) = out[..start].rfind('[') else {
            break;
        };
        let Some(close) = out[start..].find(')').map(|i| start + i) else {
            break;
        };
        let label = out[open + 1..start].to_string();
        out.replace_range(open..=close, &label);
    }

    out
}
