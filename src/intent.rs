//! Shortcut navigation for common dashboard requests.
//!
//! A handful of phrasings ("show me sales for Woodlands", "get NPS
//! analysis") map straight to a dashboard view without going through the
//! language model. Patterns are tried in a fixed order and the first match
//! wins, so earlier patterns shadow later ones when both could apply.

use std::sync::LazyLock;

use async_graphql::Enum;
use regex::Regex;

#[derive(Enum, Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Intent {
    SalesByCity,
    SalesByAgent,
    NpsAnalysis,
    GenderAnalysis,
    FeedbackAnalysis,
    Properties,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Resolution {
    pub(crate) intent: Intent,
    pub(crate) parameter: Option<String>,
}

/// Where the dashboard should go for a resolved intent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Navigation {
    pub(crate) path: &'static str,
    pub(crate) filter: Option<&'static str>,
    pub(crate) value: Option<String>,
}

impl Resolution {
    fn unknown() -> Self {
        Self {
            intent: Intent::Unknown,
            parameter: None,
        }
    }

    /// `None` for [`Intent::Unknown`]; the caller shows a warning instead.
    pub(crate) fn navigation(&self) -> Option<Navigation> {
        let value = self.parameter.clone();
        let (path, filter) = match self.intent {
            Intent::SalesByCity => ("/sales-by-city", Some("city")),
            Intent::SalesByAgent => ("/sales-by-city", Some("agent")),
            Intent::NpsAnalysis => ("/nps-analysis", None),
            Intent::GenderAnalysis => ("/gender-analysis", None),
            Intent::FeedbackAnalysis => ("/feedback-analysis", None),
            Intent::Properties => ("/properties", value.as_ref().map(|_| "city")),
            Intent::Unknown => return None,
        };
        let value = if filter.is_some() { value } else { None };
        Some(Navigation {
            path,
            filter,
            value,
        })
    }
}

struct Pattern {
    intent: Intent,
    regex: Regex,
}

impl Pattern {
    fn new(intent: Intent, body: &str) -> Self {
        let source = format!(r"(?i)(?:show|display|get)\s+(?:me\s+)?(?:the\s+)?{body}");
        Self {
            intent,
            regex: Regex::new(&source).expect("Invalid regex"),
        }
    }
}

static PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    vec![
        Pattern::new(
            Intent::SalesByCity,
            r"(?:sales|sale)\s+(?:data\s+)?(?:for|in|of)\s+([a-z\s]+)",
        ),
        Pattern::new(
            Intent::SalesByAgent,
            r"(?:sales|sale)\s+(?:data\s+)?(?:by|for)\s+(?:agent|salesperson)\s+([a-z\s]+)",
        ),
        Pattern::new(
            Intent::NpsAnalysis,
            r"(?:nps|net\s+promoter\s+score)\s+(?:data|analysis|stats|statistics)?",
        ),
        Pattern::new(
            Intent::GenderAnalysis,
            r"(?:gender|demographic)\s+(?:data|analysis|breakdown|distribution)?",
        ),
        Pattern::new(
            Intent::FeedbackAnalysis,
            r"(?:feedback|customer\s+feedback)\s+(?:data|analysis)?",
        ),
        // Longer words first so "properties in ..." keeps its location.
        Pattern::new(
            Intent::Properties,
            r"(?:properties|property|listings|listing)(?:\s+(?:listings|listing))?(?:\s+in\s+([a-z\s]+))?",
        ),
    ]
});

/// Resolves free text to an intent. Parameters are taken from the
/// lower-cased text, so `"Sales for Woodlands"` yields `"woodlands"`.
pub(crate) fn resolve(text: &str) -> Resolution {
    let text = text.to_lowercase();
    for pattern in PATTERNS.iter() {
        if let Some(captures) = pattern.regex.captures(&text) {
            let parameter = captures
                .get(1)
                .map(|m| m.as_str().trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            return Resolution {
                intent: pattern.intent,
                parameter,
            };
        }
    }
    Resolution::unknown()
}
