use async_graphql::{Context, Object, Result};

use super::load;
use crate::analytics::{
    self, FeedbackSentimentSummary, NpsSummary, PropertyGroup, SalesGroup, SalesSummary,
};
use crate::database::{property::Property, sale::Sale};
use crate::sentiment::KeywordSentiment;

#[derive(Default)]
pub(super) struct DashboardQuery;

#[Object]
impl DashboardQuery {
    async fn sales_summary(&self, ctx: &Context<'_>) -> Result<SalesSummary> {
        Ok(analytics::sales_summary(&load::<Sale>(ctx)?))
    }

    async fn nps_summary(&self, ctx: &Context<'_>) -> Result<NpsSummary> {
        Ok(analytics::nps_summary(&load::<Sale>(ctx)?))
    }

    /// The five agents with the highest total sales value.
    async fn top_agents(&self, ctx: &Context<'_>) -> Result<Vec<SalesGroup>> {
        Ok(analytics::top_agents(&load::<Sale>(ctx)?))
    }

    async fn sales_by_city(&self, ctx: &Context<'_>) -> Result<Vec<SalesGroup>> {
        Ok(analytics::sales_by_city(&load::<Sale>(ctx)?))
    }

    async fn sales_by_gender(&self, ctx: &Context<'_>) -> Result<Vec<SalesGroup>> {
        Ok(analytics::sales_by_gender(&load::<Sale>(ctx)?))
    }

    async fn sales_by_agent(&self, ctx: &Context<'_>) -> Result<Vec<SalesGroup>> {
        Ok(analytics::sales_by_agent(&load::<Sale>(ctx)?))
    }

    /// Number of listings in each status.
    async fn inventory_status(&self, ctx: &Context<'_>) -> Result<Vec<SalesGroup>> {
        Ok(analytics::inventory_status(&load::<Property>(ctx)?))
    }

    /// Monthly sales, oldest month first. Keys are `YYYY-MM`.
    async fn sales_trends(&self, ctx: &Context<'_>) -> Result<Vec<SalesGroup>> {
        Ok(analytics::sales_trends(&load::<Sale>(ctx)?))
    }

    /// The ten latest sales, newest first.
    async fn recent_sales(&self, ctx: &Context<'_>) -> Result<Vec<Sale>> {
        Ok(analytics::recent_sales(&load::<Sale>(ctx)?))
    }

    async fn properties_by_city(&self, ctx: &Context<'_>) -> Result<Vec<PropertyGroup>> {
        Ok(analytics::properties_by_city(&load::<Property>(ctx)?))
    }

    async fn properties_by_type(&self, ctx: &Context<'_>) -> Result<Vec<PropertyGroup>> {
        Ok(analytics::properties_by_type(&load::<Property>(ctx)?))
    }

    async fn feedback_sentiment(&self, ctx: &Context<'_>) -> Result<FeedbackSentimentSummary> {
        let sales = load::<Sale>(ctx)?;
        Ok(analytics::feedback_sentiment(
            &sales,
            &KeywordSentiment::sales_feedback(),
        ))
    }
}
