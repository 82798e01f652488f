//! URL slug generation for titles without an explicit slug.

/// Lowercases ASCII letters and digits and joins every other run of
/// characters with a single `-`. Non-ASCII letters are dropped.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else if ch == '\'' {
            // apostrophes vanish: "Don't" -> "dont"
        } else {
            pending_dash = true;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_separators() {
        assert_eq!(slugify("AI-Powered  Chatbot: 3x ROI!"), "ai-powered-chatbot-3x-roi");
    }

    #[test]
    fn trims_edges() {
        assert_eq!(slugify("  --Hello World--  "), "hello-world");
    }

    #[test]
    fn drops_apostrophes_and_accents() {
        assert_eq!(slugify("Don't Panic"), "dont-panic");
        assert_eq!(slugify("Café Growth"), "caf-growth");
    }

    #[test]
    fn empty_input() {
        assert_eq!(slugify("!!!"), "");
    }
}
