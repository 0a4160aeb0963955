//! Text folding for event names.

use unicode_normalization::UnicodeNormalization;

/// Lowercases `text` and strips it to its closest ASCII form.
///
/// The text is lowercased, decomposed with NFKD so accented letters split
/// into a base letter plus combining marks, and every remaining non-ASCII
/// code point is dropped. Characters with no ASCII decomposition (CJK,
/// emoji, `ß`) disappear entirely.
pub fn fold_to_ascii(text: &str) -> String {
    text.to_lowercase()
        .nfkd()
        .filter(char::is_ascii)
        .collect()
}

/// Returns true if `text` equals `keyword` ignoring case.
pub fn eq_keyword(text: &str, keyword: &str) -> bool {
    text.to_lowercase() == keyword.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_accents() {
        assert_eq!(fold_to_ascii("Café Meeting"), "cafe meeting");
        assert_eq!(fold_to_ascii("Réunion à Zürich"), "reunion a zurich");
    }

    #[test]
    fn compatibility_forms_decompose() {
        assert_eq!(fold_to_ascii("ﬁnal"), "final");
        assert_eq!(fold_to_ascii("Ｆｕｌｌ"), "full");
    }

    #[test]
    fn drops_non_decomposable() {
        assert_eq!(fold_to_ascii("会議 standup"), " standup");
        assert_eq!(fold_to_ascii("Straße"), "strae");
    }

    #[test]
    fn plain_ascii_is_lowercased() {
        assert_eq!(fold_to_ascii("Take Out The Trash"), "take out the trash");
    }

    #[test]
    fn keyword_match_is_case_insensitive_and_exact() {
        assert!(eq_keyword("Repeat", "repeat"));
        assert!(eq_keyword("REPEAT", "repeat"));
        assert!(!eq_keyword("repeat ", "repeat"));
        assert!(!eq_keyword("repeated", "repeat"));
    }
}
