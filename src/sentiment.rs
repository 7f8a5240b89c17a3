use async_graphql::Enum;
use serde::{Deserialize, Serialize};

#[derive(
    Enum, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

/// Scores free text as positive, neutral or negative.
pub(crate) trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str) -> Sentiment;
}

/// Counts how many positive and how many negative keywords occur in the
/// text. Each keyword counts at most once. The larger count wins and equal
/// counts are neutral.
#[derive(Debug, Clone)]
pub(crate) struct KeywordSentiment {
    positive: Vec<String>,
    negative: Vec<String>,
}

impl KeywordSentiment {
    pub(crate) fn new<P, N>(positive: P, negative: N) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        N: IntoIterator,
        N::Item: Into<String>,
    {
        let lowered = |word: String| word.to_lowercase();
        Self {
            positive: positive.into_iter().map(Into::into).map(lowered).collect(),
            negative: negative.into_iter().map(Into::into).map(lowered).collect(),
        }
    }

    /// Word lists used when scoring submitted customer feedback.
    pub(crate) fn feedback_form() -> Self {
        Self::new(
            [
                "great",
                "excellent",
                "good",
                "satisfied",
                "happy",
                "thanks",
                "awesome",
                "love",
            ],
            [
                "bad",
                "poor",
                "terrible",
                "unhappy",
                "disappointed",
                "issue",
                "problem",
                "fail",
            ],
        )
    }

    /// Word lists tuned for the short remarks attached to sales records.
    pub(crate) fn sales_feedback() -> Self {
        Self::new(
            ["great", "excellent", "satisfied", "good", "perfect", "recommend"],
            ["slow", "higher", "longer", "needed", "sometimes"],
        )
    }
}

impl SentimentScorer for KeywordSentiment {
    fn score(&self, text: &str) -> Sentiment {
        let text = text.to_lowercase();
        let hits = |words: &[String]| words.iter().filter(|w| text.contains(w.as_str())).count();
        let positive = hits(&self.positive);
        let negative = hits(&self.negative);

        match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }
}
