use async_graphql::{Context, InputObject, Object, Result};
use chrono::Utc;
use tracing::info;

use super::{load, FeedbackScorer};
use crate::analytics::{self, FeedbackAnalysis};
use crate::database::{
    feedback::{Feedback, FeedbackCategory, FeedbackSource},
    Database,
};
use crate::sentiment::Sentiment;

const DEFAULT_PAGE: usize = 20;

#[derive(Default)]
pub(super) struct FeedbackQuery;

#[derive(Default)]
pub(super) struct FeedbackMutation;

#[derive(InputObject)]
struct FeedbackInput {
    text: String,
    /// Scored from `text` when omitted.
    sentiment: Option<Sentiment>,
    source: Option<FeedbackSource>,
    category: Option<FeedbackCategory>,
}

#[Object]
impl FeedbackQuery {
    /// Submitted feedback, newest first.
    async fn feedbacks(&self, ctx: &Context<'_>, first: Option<usize>) -> Result<Vec<Feedback>> {
        let entries = load::<Feedback>(ctx)?;
        Ok(analytics::recent(&entries, first.unwrap_or(DEFAULT_PAGE)))
    }

    async fn feedback_analysis(&self, ctx: &Context<'_>) -> Result<FeedbackAnalysis> {
        Ok(analytics::feedback_analysis(&load::<Feedback>(ctx)?))
    }
}

#[Object]
impl FeedbackMutation {
    async fn submit_feedback(&self, ctx: &Context<'_>, input: FeedbackInput) -> Result<Feedback> {
        let text = input.text.trim();
        if text.is_empty() {
            return Err("feedback text is required".into());
        }
        let sentiment = match input.sentiment {
            Some(sentiment) => sentiment,
            None => ctx.data::<FeedbackScorer>()?.score(text),
        };
        let feedback = Feedback {
            text: text.to_string(),
            sentiment,
            source: input.source.unwrap_or_default(),
            category: input.category.unwrap_or_default(),
            created_at: Utc::now(),
        };

        let db = ctx.data::<Database>()?;
        db.insert(&feedback)
            .map_err(|e| format!("failed to save feedback: {e}"))?;
        info!(
            "Stored {} feedback from {:?}",
            sentiment.as_str(),
            feedback.source
        );
        Ok(feedback)
    }
}
