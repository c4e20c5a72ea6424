//! Bot identity check distinguishing Jules from human commenters.

/// Logins Jules posts under on GitHub.
pub const DEFAULT_BOT_LOGINS: [&str; 2] = ["google-labs-jules[bot]", "google-labs-jules"];

/// Set of logins treated as the automated collaborator.
///
/// Comparison is ASCII case-insensitive; GitHub logins are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    logins: Vec<String>,
}

impl BotIdentity {
    pub fn new<I, S>(logins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            logins: logins.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` when `author` is one of the configured bot logins.
    /// Deleted accounts (`None`) never match.
    pub fn is_bot(&self, author: Option<&str>) -> bool {
        let Some(author) = author else {
            return false;
        };
        self.logins
            .iter()
            .any(|login| login.eq_ignore_ascii_case(author))
    }
}

impl Default for BotIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_BOT_LOGINS)
    }
}
