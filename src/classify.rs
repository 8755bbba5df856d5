//! Relevance classification.
//!
//! The poll loop only asks one question of an entry: should it produce a
//! notification?  [`Classifier`] is that question as a trait, so the policy
//! can change without touching delta computation or the loop itself.

/// Pure predicate over an entry's descriptive text.
pub trait Classifier: Send + Sync {
    fn is_relevant(&self, title: &str) -> bool;
}

/// Form codes notified when nothing else is configured: resale prospectus
/// supplements and current reports.
pub const DEFAULT_FORMS: &[&str] = &["424B3", "8-K"];

/// Case-insensitive substring match against a list of document-type tokens.
#[derive(Debug, Clone)]
pub struct AllowList {
    /// Lower-cased, non-empty.
    tokens: Vec<String>,
}

impl AllowList {
    /// Blank tokens are dropped; an all-blank list matches nothing.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = tokens
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { tokens }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(DEFAULT_FORMS)
    }
}

impl Classifier for AllowList {
    fn is_relevant(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.tokens.iter().any(|t| title.contains(t.as_str()))
    }
}

impl<F> Classifier for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_relevant(&self, title: &str) -> bool {
        self(title)
    }
}
