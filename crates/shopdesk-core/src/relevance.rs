//! Keyword-based topic check run before any request leaves the process.
//!
//! This is a coarse, non-semantic gate. Phrasing that misses every keyword is
//! declined locally; anything that hits a keyword is forwarded and the model's
//! system prompt handles off-topic refusals.

/// Stock keyword set for shopping, order, payment, shipping and return questions.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "shop", "buy", "order", "product", "price", "payment",
    "shipping", "delivery", "return", "refund", "cart",
    "checkout", "store", "purchase", "discount", "sale", "hi",
];

/// Reply used when the filter rejects a message. No request is made.
pub const DECLINE_MESSAGE: &str = "I apologize, but I can only assist with e-commerce and shopping-related questions. Please ask something related to online shopping, products, orders, payments, shipping, or returns.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceFilter {
    keywords: Vec<String>,
}

impl RelevanceFilter {
    /// Build a filter from any keyword list. Keywords are lower-cased and
    /// blank entries dropped; an empty list rejects every message.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// True when the lower-cased text contains any keyword as a substring.
    pub fn is_relevant(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.keywords.iter().any(|keyword| text.contains(keyword.as_str()))
    }
}

impl Default for RelevanceFilter {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS.iter().copied())
    }
}
