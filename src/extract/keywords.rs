// File: src/extract/keywords.rs
use regex::Regex;
use std::sync::OnceLock;

const MAX_KEYWORD_TAGS: usize = 6;
const GENERIC_TAGS: [&str; 2] = ["general", "email"];

/// Category tag and the words that suggest it.
const CATEGORIES: &[(&str, &str)] = &[
    ("technology", r"\b(tech|software|app|api|code|programming|development|digital)\b"),
    ("business", r"\b(business|company|corporate|enterprise|startup|revenue)\b"),
    ("career", r"\b(job|career|hiring|position|employment|opportunity|resume)\b"),
    ("finance", r"\b(money|payment|invoice|financial|budget|investment|banking)\b"),
    ("marketing", r"\b(marketing|promotion|advertisement|campaign|brand|social)\b"),
    ("newsletter", r"\b(newsletter|digest|weekly|monthly|update|news)\b"),
    ("event", r"\b(event|meeting|conference|webinar|workshop|seminar)\b"),
    ("urgent", r"\b(urgent|asap|immediately|deadline|expires|limited)\b"),
    ("personal", r"\b(personal|private|confidential|individual)\b"),
];

static CATEGORY_RES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();

fn category_res() -> &'static [(&'static str, Regex)] {
    CATEGORY_RES.get_or_init(|| {
        CATEGORIES
            .iter()
            .filter_map(|(tag, pattern)| Regex::new(pattern).ok().map(|re| (*tag, re)))
            .collect()
    })
}

/// Local keyword scan used when no upstream extractor is reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordExtractor;

impl KeywordExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Category tags found in the text, or `["general", "email"]` when none
    /// match. Empty input gives no tags.
    pub fn extract(&self, subject: &str, body: &str) -> Vec<String> {
        if subject.trim().is_empty() && body.trim().is_empty() {
            return Vec::new();
        }
        let content = format!("{} {}", subject, body).to_lowercase();

        let mut tags: Vec<String> = category_res()
            .iter()
            .filter(|(_, re)| re.is_match(&content))
            .map(|(tag, _)| tag.to_string())
            .take(MAX_KEYWORD_TAGS)
            .collect();

        if tags.is_empty() {
            tags = GENERIC_TAGS.iter().map(|t| t.to_string()).collect();
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_categories() {
        let tags = KeywordExtractor::new().extract(
            "Hiring: senior software engineer",
            "Join our startup. Apply before the deadline!",
        );
        assert_eq!(tags, vec!["technology", "business", "career", "urgent"]);
    }

    #[test]
    fn generic_when_nothing_matches() {
        let tags = KeywordExtractor::new().extract("hello", "see you soon");
        assert_eq!(tags, vec!["general", "email"]);
    }

    #[test]
    fn empty_input_gives_nothing() {
        assert!(KeywordExtractor::new().extract("", "  ").is_empty());
    }

    #[test]
    fn whole_words_only() {
        // "apple" must not trigger "app", "newsy" must not trigger "news"
        let tags = KeywordExtractor::new().extract("apple pie", "newsy gossip");
        assert_eq!(tags, vec!["general", "email"]);
    }

    #[test]
    fn at_most_six_tags() {
        let tags = KeywordExtractor::new().extract(
            "urgent tech job payment promotion newsletter meeting",
            "personal business",
        );
        assert_eq!(tags.len(), 6);
    }
}
