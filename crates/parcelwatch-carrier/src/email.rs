//! Tracking number extraction from shipping notification emails.

use crate::definition::EmailPatterns;
use parcelwatch_core::TrackingNumber;
use regex::Regex;

/// Compiled form of a carrier's [`EmailPatterns`].
#[derive(Debug, Clone)]
pub struct EmailMatcher {
    keywords: Vec<String>,
    tracking_regex: Regex,
}

impl EmailMatcher {
    /// Compile email patterns.
    ///
    /// # Errors
    /// Returns the regex error if `tracking_regex` doesn't compile.
    pub fn compile(patterns: &EmailPatterns) -> Result<Self, regex::Error> {
        Ok(Self {
            keywords: patterns
                .subject_contains
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            tracking_regex: Regex::new(&patterns.tracking_regex)?,
        })
    }

    /// Find this carrier's tracking number in an email.
    ///
    /// The email is only considered when one of the keywords appears in the
    /// subject or body (case-insensitive); an empty keyword list accepts every
    /// email. The first regex match in the uppercased body wins. If the
    /// pattern has a capture group, group 1 is the number.
    #[must_use]
    pub fn extract(&self, subject: &str, body: &str) -> Option<TrackingNumber> {
        if !self.keywords.is_empty() {
            let subject = subject.to_lowercase();
            let lowered_body = body.to_lowercase();
            let relevant = self
                .keywords
                .iter()
                .any(|k| subject.contains(k.as_str()) || lowered_body.contains(k.as_str()));
            if !relevant {
                return None;
            }
        }

        let upper = body.to_uppercase();
        self.tracking_regex.captures_iter(&upper).find_map(|caps| {
            let m = caps.get(1).or_else(|| caps.get(0))?;
            TrackingNumber::new(m.as_str()).ok()
        })
    }
}
