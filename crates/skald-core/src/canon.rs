//! Text normalization for dedup keys.
//!
//! Near-identical summaries extracted from different messages must collapse
//! onto the same key: lowercase, punctuation stripped, whitespace collapsed.

/// Normalize free text for dedup comparison.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_punctuation() {
        assert_eq!(
            normalize_text("Waiting on Electrical: schematic!!"),
            "waiting on electrical schematic"
        );
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(normalize_text("a   b\t\nc"), "a b c");
    }

    #[test]
    fn near_identical_texts_collapse() {
        assert_eq!(
            normalize_text("Blocked by EE (schematic)"),
            normalize_text("blocked by ee schematic")
        );
    }

    #[test]
    fn empty_and_punctuation_only() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("?!,."), "");
    }
}
