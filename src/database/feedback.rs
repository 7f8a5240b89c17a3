use async_graphql::{Enum, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Tree;

use super::{Database, Record};
use crate::sentiment::Sentiment;

#[derive(SimpleObject, Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Feedback {
    pub(crate) text: String,
    pub(crate) sentiment: Sentiment,
    pub(crate) source: FeedbackSource,
    pub(crate) category: FeedbackCategory,
    pub(crate) created_at: DateTime<Utc>,
}

#[derive(Enum, Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub(crate) enum FeedbackSource {
    #[default]
    Customer,
    Agent,
    System,
}

#[derive(Enum, Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub(crate) enum FeedbackCategory {
    #[default]
    General,
    Service,
    Property,
    Pricing,
    Agent,
    Website,
    Other,
}

impl FeedbackCategory {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            FeedbackCategory::General => "general",
            FeedbackCategory::Service => "service",
            FeedbackCategory::Property => "property",
            FeedbackCategory::Pricing => "pricing",
            FeedbackCategory::Agent => "agent",
            FeedbackCategory::Website => "website",
            FeedbackCategory::Other => "other",
        }
    }
}

impl Record for Feedback {
    const COLLECTION: &'static str = "Feedback";

    fn tree(db: &Database) -> &Tree {
        &db.feedback
    }
}
