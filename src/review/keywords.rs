//! Competitor-brand safety net.
//!
//! Model recall on small on-screen logos is unreliable, but models do transcribe what
//! they see. Matching those transcriptions against a fixed blocklist catches known
//! brands even when the model's own verdict says "compliant".

/// Case-insensitive substring matcher over a keyword list.
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
}

impl KeywordMatcher {
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

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// First keyword contained in any of `texts`. Texts are scanned in order, and each
    /// text is checked against the keywords in their configured order.
    pub fn first_hit<S: AsRef<str>>(&self, texts: &[S]) -> Option<&str> {
        texts.iter().find_map(|text| {
            let text = text.as_ref().to_lowercase();
            self.keywords
                .iter()
                .find(|kw| text.contains(kw.as_str()))
                .map(String::as_str)
        })
    }
}
