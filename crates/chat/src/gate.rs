//! Keyword gate deciding whether the retrieval tool is offered for a turn.

/// Words that make a message about professors or courses.
pub const RETRIEVAL_KEYWORDS: &[&str] = &[
    "professor",
    "teacher",
    "instructor",
    "faculty",
    "class",
    "course",
    "lecture",
    "subject",
];

/// True when `text` mentions any retrieval keyword.
///
/// Case-insensitive substring match, so "Classes" matches "class".
pub fn should_retrieve(text: &str) -> bool {
    let lower = text.to_lowercase();
    RETRIEVAL_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_keyword_triggers() {
        for kw in RETRIEVAL_KEYWORDS {
            assert!(should_retrieve(&format!("tell me about the {}", kw)), "{}", kw);
        }
    }

    #[test]
    fn test_case_and_substring() {
        assert!(should_retrieve("Who is the best Math PROFESSOR?"));
        assert!(should_retrieve("Are her classes hard?"));
        assert!(should_retrieve("lectures were dull"));
    }

    #[test]
    fn test_unrelated_text() {
        assert!(!should_retrieve("hello"));
        assert!(!should_retrieve("What's the weather like today?"));
        assert!(!should_retrieve(""));
    }
}
