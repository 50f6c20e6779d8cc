//! Pattern library: fixed phrase and keyword sets per intent category.
//!
//! Matching is case-insensitive and word-bounded: the message is normalized
//! to lowercase words separated by single spaces, keywords must equal a whole
//! word, and phrases must appear as a contiguous run of whole words.
//!
//! Every hit becomes one `IntentMatch`. Categories are never short-circuited,
//! so a message can hit several patterns of the same category, which the
//! classifier later rewards.

use std::collections::BTreeSet;

use crate::pipeline::types::{IntentCategory, IntentMatch};

/// Confidence added per additional keyword of the same category.
pub const EXTRA_KEYWORD_BOOST: f32 = 0.05;

/// Words that mark a message as reporting a problem.
const TROUBLE_KEYWORDS: &[&str] = &[
    "error", "crash", "crashed", "bug", "broken", "problem", "issue", "stuck", "glitch", "cannot",
    "can't", "cant", "failed", "failing",
];

const DATA_REQUEST_PHRASES: &[&str] = &[
    "delete my account",
    "delete my data",
    "my personal data",
    "copy of my data",
    "remove my data",
    "erase my data",
];

/// Phrase and keyword sets for one intent category.
#[derive(Debug, Clone)]
pub struct CategoryPatterns {
    pub category: IntentCategory,
    /// Multi-word phrases, stored normalized.
    pub phrases: Vec<String>,
    /// Single words, stored normalized.
    pub keywords: Vec<String>,
    /// Baseline confidence for a phrase hit.
    pub phrase_confidence: f32,
    /// Baseline confidence for a keyword hit.
    pub keyword_confidence: f32,
}

impl CategoryPatterns {
    pub fn new(
        category: IntentCategory,
        phrases: &[&str],
        keywords: &[&str],
        phrase_confidence: f32,
        keyword_confidence: f32,
    ) -> Self {
        Self {
            category,
            phrases: phrases.iter().map(|p| normalize(p)).collect(),
            keywords: keywords.iter().map(|k| normalize(k)).collect(),
            phrase_confidence,
            keyword_confidence,
        }
    }

    /// Produce one match per phrase or keyword hit in `normalized`.
    fn scan(&self, normalized: &Normalized) -> Vec<IntentMatch> {
        let found_keywords: Vec<String> = self
            .keywords
            .iter()
            .filter(|k| normalized.words.contains(k.as_str()))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut matches = Vec::new();

        for phrase in &self.phrases {
            if normalized.contains_phrase(phrase) {
                let extra = found_keywords.len() as f32;
                matches.push(self.hit(phrase, self.phrase_confidence, extra, &found_keywords));
            }
        }

        for keyword in &found_keywords {
            let extra = found_keywords.len().saturating_sub(1) as f32;
            matches.push(self.hit(keyword, self.keyword_confidence, extra, &found_keywords));
        }

        matches
    }

    fn hit(&self, pattern: &str, baseline: f32, extra: f32, keywords: &[String]) -> IntentMatch {
        IntentMatch {
            category: self.category,
            confidence: (baseline + EXTRA_KEYWORD_BOOST * extra).min(1.0),
            priority: self.category.priority(),
            matched_pattern: pattern.to_string(),
            keywords: keywords.to_vec(),
        }
    }
}

/// Immutable collection of per-category patterns.
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    categories: Vec<CategoryPatterns>,
}

impl PatternLibrary {
    /// Build a library from explicit category sets (used by tests).
    pub fn new(categories: Vec<CategoryPatterns>) -> Self {
        Self { categories }
    }

    /// The production pattern set for worker chat.
    pub fn standard() -> Self {
        use IntentCategory::*;

        let categories = vec![
            CategoryPatterns::new(
                UrgentEscalation,
                &[
                    "need help now",
                    "help me now",
                    "as soon as possible",
                    "this is urgent",
                    "i am in danger",
                    "i'm in danger",
                    "someone is hurt",
                    "got injured",
                    "accident at work",
                    "not safe",
                ],
                &["urgent", "emergency", "asap", "sos", "danger", "injured", "accident", "unsafe"],
                0.8,
                0.75,
            ),
            CategoryPatterns::new(
                PaymentInquiry,
                &[
                    "get paid",
                    "got paid",
                    "not paid",
                    "haven't been paid",
                    "havent been paid",
                    "payment status",
                    "missing payment",
                    "when is payday",
                    "bank details",
                ],
                &[
                    "paid", "payment", "payments", "salary", "wage", "wages", "payout", "payslip",
                    "invoice", "payday",
                ],
                0.7,
                0.55,
            ),
            CategoryPatterns::new(
                TechnicalSupport,
                &[
                    "app crashed",
                    "app not working",
                    "can't log in",
                    "cannot log in",
                    "cant login",
                    "can't login",
                    "not loading",
                    "error message",
                    "reset password",
                    "forgot password",
                    "otp not",
                ],
                &[
                    "bug", "crash", "crashed", "error", "glitch", "login", "password", "otp",
                    "freeze", "frozen", "broken",
                ],
                0.7,
                0.55,
            ),
            CategoryPatterns::new(
                Complaint,
                &[
                    "want to complain",
                    "make a complaint",
                    "file a complaint",
                    "very disappointed",
                    "not happy",
                    "unfair treatment",
                    "treated badly",
                    "this is unacceptable",
                ],
                &[
                    "complain", "complaint", "unfair", "unacceptable", "disappointed", "rude",
                    "harassed", "harassment", "scam", "cheated",
                ],
                0.7,
                0.55,
            ),
            CategoryPatterns::new(
                InterviewScheduling,
                &[
                    "book an interview",
                    "schedule an interview",
                    "schedule interview",
                    "book interview",
                    "interview slot",
                    "interview time",
                    "reschedule my interview",
                    "change my interview",
                    "available slots",
                ],
                &["interview", "schedule", "reschedule", "slot", "slots", "appointment", "book"],
                0.7,
                0.5,
            ),
            CategoryPatterns::new(
                VerificationStatus,
                &[
                    "verification status",
                    "am i verified",
                    "account approved",
                    "still pending",
                    "application status",
                    "waiting for approval",
                    "when will i be approved",
                    "check my status",
                    "approval status",
                ],
                &["verify", "verified", "verification", "approval", "approved", "pending", "status", "documents"],
                0.7,
                0.5,
            ),
            CategoryPatterns::new(
                AccountManagement,
                &[
                    "update my profile",
                    "change my number",
                    "change my phone",
                    "change my email",
                    "update my details",
                    "delete my account",
                    "close my account",
                    "my personal data",
                ],
                &["profile", "account", "update", "delete", "deactivate", "details", "address"],
                0.7,
                0.5,
            ),
            CategoryPatterns::new(
                JobSearch,
                &[
                    "find a job",
                    "looking for work",
                    "any jobs",
                    "new jobs",
                    "job openings",
                    "available jobs",
                    "more shifts",
                    "part time",
                    "full time",
                ],
                &["job", "jobs", "shift", "shifts", "gig", "gigs", "work", "vacancy", "vacancies", "openings"],
                0.65,
                0.5,
            ),
            CategoryPatterns::new(
                Greeting,
                &["good morning", "good afternoon", "good evening", "how are you"],
                &["hi", "hello", "hey", "hiya", "greetings", "hallo"],
                0.75,
                0.75,
            ),
            CategoryPatterns::new(
                Gratitude,
                &["thank you", "thanks a lot", "much appreciated", "appreciate it"],
                &["thanks", "thx", "ty", "cheers", "appreciate", "grateful"],
                0.75,
                0.7,
            ),
            CategoryPatterns::new(
                GeneralHelp,
                &["need help", "can you help", "i have a question", "how do i", "what should i do"],
                &["help", "question", "assist", "support", "info", "information"],
                0.5,
                0.35,
            ),
        ];

        Self { categories }
    }

    /// Scan every category and return all hits, unsorted.
    pub fn scan(&self, text: &str) -> Vec<IntentMatch> {
        let normalized = Normalized::new(text);
        if normalized.words.is_empty() {
            return Vec::new();
        }
        self.categories
            .iter()
            .flat_map(|c| c.scan(&normalized))
            .collect()
    }

    /// Number of categories in the library.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl Default for PatternLibrary {
    fn default() -> Self {
        Self::standard()
    }
}

/// Whether a message reads like a problem report.
pub fn is_trouble_message(text: &str) -> bool {
    let normalized = Normalized::new(text);
    TROUBLE_KEYWORDS
        .iter()
        .any(|k| normalized.words.contains(*k))
        || normalized.contains_phrase("not working")
}

/// Whether a message asks for a copy or deletion of the candidate's data.
pub fn is_data_request(text: &str) -> bool {
    let normalized = Normalized::new(text);
    DATA_REQUEST_PHRASES
        .iter()
        .any(|p| normalized.contains_phrase(p))
        || normalized.words.contains("gdpr")
}

/// Lowercase, unify apostrophes, turn everything except letters, digits and
/// apostrophes into single spaces.
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| match c {
            '\u{2019}' | '\u{2018}' | '`' => '\'',
            c if c.is_alphanumeric() || c == '\'' => c,
            _ => ' ',
        })
        .flat_map(char::to_lowercase)
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A message prepared for matching.
struct Normalized {
    /// Normalized text padded with a space on both sides.
    padded: String,
    words: BTreeSet<String>,
}

impl Normalized {
    fn new(text: &str) -> Self {
        let normalized = normalize(text);
        let words = normalized.split(' ').filter(|w| !w.is_empty()).map(String::from).collect();
        Self {
            padded: format!(" {normalized} "),
            words,
        }
    }

    fn contains_phrase(&self, phrase: &str) -> bool {
        !phrase.is_empty() && self.padded.contains(&format!(" {phrase} "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories_of(matches: &[IntentMatch]) -> BTreeSet<IntentCategory> {
        matches.iter().map(|m| m.category).collect()
    }

    #[test]
    fn data_requests() {
        assert!(is_data_request("Please delete my account and all my data"));
        assert!(is_data_request("I want a copy of my data (GDPR)"));
        assert!(!is_data_request("how do I update my account details"));
    }

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("  URGENT need   help now!"), "urgent need help now");
        assert_eq!(normalize("I can\u{2019}t log in"), "i can't log in");
    }

    #[test]
    fn keywords_respect_word_boundaries() {
        let lib = PatternLibrary::standard();
        // "this" contains "hi" but is not a greeting.
        let matches = lib.scan("this");
        assert!(!categories_of(&matches).contains(&IntentCategory::Greeting));

        let matches = lib.scan("hi");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].category, IntentCategory::Greeting);
        assert!((matches[0].confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn phrase_hit_gets_extra_keyword_boost() {
        let lib = PatternLibrary::standard();
        let matches: Vec<_> = lib
            .scan("when will i get paid ah?")
            .into_iter()
            .filter(|m| m.category == IntentCategory::PaymentInquiry)
            .collect();
        assert_eq!(matches.len(), 2);

        let phrase = matches.iter().find(|m| m.matched_pattern == "get paid").unwrap();
        // 0.7 baseline + one extra keyword ("paid")
        assert!((phrase.confidence - 0.75).abs() < 1e-6);
        assert_eq!(phrase.keywords, vec!["paid".to_string()]);

        let keyword = matches.iter().find(|m| m.matched_pattern == "paid").unwrap();
        assert!((keyword.confidence - 0.55).abs() < 1e-6);
    }

    #[test]
    fn all_categories_are_scanned() {
        let lib = PatternLibrary::standard();
        let matches = lib.scan("URGENT need help now!");
        let cats = categories_of(&matches);
        assert!(cats.contains(&IntentCategory::UrgentEscalation));
        assert!(cats.contains(&IntentCategory::GeneralHelp));
    }

    #[test]
    fn confidence_is_capped() {
        let lib = PatternLibrary::new(vec![CategoryPatterns::new(
            IntentCategory::Complaint,
            &["not happy"],
            &["rude", "unfair", "scam", "cheated", "unacceptable", "disappointed"],
            0.9,
            0.9,
        )]);
        let matches = lib.scan("not happy, rude unfair scam cheated unacceptable disappointed");
        assert!(matches.iter().all(|m| m.confidence <= 1.0));
        assert!(matches.iter().any(|m| (m.confidence - 1.0).abs() < 1e-6));
    }

    #[test]
    fn empty_text_has_no_matches() {
        let lib = PatternLibrary::standard();
        assert!(lib.scan("").is_empty());
        assert!(lib.scan("   \n\t ").is_empty());
        assert!(lib.scan("?!...").is_empty());
    }

    #[test]
    fn trouble_messages() {
        assert!(is_trouble_message("The app keeps showing an error"));
        assert!(is_trouble_message("upload not working"));
        assert!(!is_trouble_message("Hello there"));
    }

    #[test]
    fn standard_library_covers_every_intent() {
        let lib = PatternLibrary::standard();
        assert_eq!(lib.len(), IntentCategory::ALL.len());
    }
}
