//! Post-validation of model replies.

use thiserror::Error;

/// Phrases that mark a reply as a refusal rather than marketing copy.
pub const DEFAULT_REFUSAL_PHRASES: &[&str] = &[
    "i'm sorry",
    "i am sorry",
    "i apologize",
    "i can't help",
    "i cannot help",
    "i can't assist",
    "i cannot assist",
    "i'm unable to",
    "i am unable to",
    "as an ai",
    "as a language model",
    "unable to access the website",
    "抱歉",
    "对不起",
    "无法提供",
    "无法访问",
    "我不能",
    "作为一个ai",
    "作为ai",
];

/// Reasons a reply was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Reply was empty or whitespace only.
    #[error("model returned an empty summary")]
    Empty,
    /// Reply contained a refusal phrase.
    #[error("model refused to summarize (matched '{0}')")]
    Refusal(String),
}

/// Check applied to every generated summary before it is returned.
pub trait SummaryValidator: Send + Sync {
    /// Accept `summary` or explain why it is unusable.
    fn validate(&self, summary: &str) -> Result<(), Rejection>;
}

/// Case-insensitive substring matcher over a list of refusal phrases.
#[derive(Debug, Clone)]
pub struct RefusalPhraseValidator {
    phrases: Vec<String>,
}

impl Default for RefusalPhraseValidator {
    fn default() -> Self {
        Self {
            phrases: DEFAULT_REFUSAL_PHRASES
                .iter()
                .map(|phrase| normalize(phrase))
                .collect(),
        }
    }
}

impl RefusalPhraseValidator {
    /// Extend the phrase list.
    pub fn with_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.phrases.extend(
            phrases
                .into_iter()
                .map(|phrase| normalize(phrase.as_ref()))
                .filter(|phrase| !phrase.trim().is_empty()),
        );
        self
    }
}

impl SummaryValidator for RefusalPhraseValidator {
    fn validate(&self, summary: &str) -> Result<(), Rejection> {
        if summary.trim().is_empty() {
            return Err(Rejection::Empty);
        }
        let haystack = normalize(summary);
        match self
            .phrases
            .iter()
            .find(|phrase| haystack.contains(phrase.as_str()))
        {
            Some(phrase) => Err(Rejection::Refusal(phrase.clone())),
            None => Ok(()),
        }
    }
}

// Lowercase and fold typographic apostrophes so "I’m" matches "i'm".
fn normalize(text: &str) -> String {
    text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}
