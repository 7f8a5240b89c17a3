//! Dashboard summaries computed over stored records.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, HashMap},
    sync::LazyLock,
};

use async_graphql::SimpleObject;
use regex::Regex;
use serde::Serialize;

use crate::database::{
    feedback::{Feedback, FeedbackCategory},
    property::Property,
    sale::Sale,
};
use crate::sentiment::{Sentiment, SentimentScorer};

const TOP_AGENTS: usize = 5;
const SENTIMENT_SAMPLES: usize = 10;
const RECENT_FEEDBACK: usize = 5;
const RECENT_SALES: usize = 10;
const TOP_KEYWORDS: usize = 10;
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "is", "are", "was", "were", "to", "of", "for", "with",
];

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").expect("Invalid regex"));

#[derive(SimpleObject, Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SalesSummary {
    pub(crate) total_sales: usize,
    pub(crate) total_value: u64,
    pub(crate) average_price: f64,
}

#[derive(SimpleObject, Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NpsSummary {
    pub(crate) average_nps: f64,
    /// Ratings of 6 or lower.
    pub(crate) detractors: usize,
    /// Ratings of 7 or 8.
    pub(crate) passives: usize,
    /// Ratings of 9 or 10.
    pub(crate) promoters: usize,
    pub(crate) total_responses: usize,
    /// Percentage of promoters minus percentage of detractors.
    pub(crate) nps_score: f64,
}

/// Sales grouped by some key: a city, an agent, a month or a status.
#[derive(SimpleObject, Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SalesGroup {
    pub(crate) key: String,
    pub(crate) count: usize,
    pub(crate) total_value: u64,
    pub(crate) average_nps: Option<f64>,
}

/// Listings grouped by city or by property type.
#[derive(SimpleObject, Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PropertyGroup {
    pub(crate) key: String,
    pub(crate) count: usize,
    pub(crate) average_price: f64,
    /// Only filled in for the by-type grouping.
    pub(crate) average_area: Option<f64>,
}

#[derive(SimpleObject, Debug, Clone, PartialEq, Serialize)]
pub(crate) struct FeedbackSample {
    pub(crate) feedback: String,
    pub(crate) nps: u8,
    pub(crate) sentiment: Sentiment,
}

#[derive(SimpleObject, Debug, Clone, PartialEq, Serialize)]
pub(crate) struct FeedbackSentimentSummary {
    pub(crate) positive: usize,
    pub(crate) neutral: usize,
    pub(crate) negative: usize,
    pub(crate) total: usize,
    pub(crate) samples: Vec<FeedbackSample>,
}

#[derive(SimpleObject, Debug, Clone, PartialEq, Serialize)]
pub(crate) struct SentimentCount {
    pub(crate) sentiment: Sentiment,
    pub(crate) count: usize,
}

#[derive(SimpleObject, Debug, Clone, PartialEq, Serialize)]
pub(crate) struct CategoryCount {
    pub(crate) category: FeedbackCategory,
    pub(crate) count: usize,
}

#[derive(SimpleObject, Debug, Clone, PartialEq, Serialize)]
pub(crate) struct KeywordCount {
    pub(crate) word: String,
    pub(crate) count: usize,
}

#[derive(SimpleObject, Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FeedbackAnalysis {
    pub(crate) sentiment_counts: Vec<SentimentCount>,
    pub(crate) category_counts: Vec<CategoryCount>,
    pub(crate) recent_feedback: Vec<Feedback>,
    pub(crate) keywords: Vec<KeywordCount>,
}

pub(crate) fn sales_summary(sales: &[Sale]) -> SalesSummary {
    let total_value = sales.iter().map(|sale| sale.price).sum();
    SalesSummary {
        total_sales: sales.len(),
        total_value,
        average_price: average(total_value as f64, sales.len()),
    }
}

pub(crate) fn nps_summary(sales: &[Sale]) -> NpsSummary {
    let count = |range: std::ops::RangeInclusive<u8>| {
        sales.iter().filter(|sale| range.contains(&sale.nps)).count()
    };
    let detractors = count(0..=6);
    let passives = count(7..=8);
    let promoters = count(9..=u8::MAX);
    let total_responses = sales.len();
    let nps_total: u64 = sales.iter().map(|sale| u64::from(sale.nps)).sum();

    NpsSummary {
        average_nps: average(nps_total as f64, total_responses),
        detractors,
        passives,
        promoters,
        total_responses,
        nps_score: average(
            (promoters as f64 - detractors as f64) * 100.0,
            total_responses,
        ),
    }
}

/// The five agents with the highest total sales value.
pub(crate) fn top_agents(sales: &[Sale]) -> Vec<SalesGroup> {
    let mut groups = sales_by_agent(sales);
    groups.truncate(TOP_AGENTS);
    groups
}

pub(crate) fn sales_by_agent(sales: &[Sale]) -> Vec<SalesGroup> {
    let mut groups = group(sales, |sale| sale.sales_agent.clone(), true);
    groups.sort_by_key(|group| Reverse(group.total_value));
    groups
}

pub(crate) fn sales_by_city(sales: &[Sale]) -> Vec<SalesGroup> {
    let mut groups = group(sales, |sale| sale.location.city.clone(), false);
    groups.sort_by_key(|group| Reverse(group.count));
    groups
}

pub(crate) fn sales_by_gender(sales: &[Sale]) -> Vec<SalesGroup> {
    let mut groups = group(sales, |sale| sale.customer.gender.clone(), true);
    groups.sort_by(|a, b| a.key.cmp(&b.key));
    groups
}

/// Monthly sales count and value, oldest month first.
pub(crate) fn sales_trends(sales: &[Sale]) -> Vec<SalesGroup> {
    let mut groups = group(sales, |sale| sale.date_of_sale.format("%Y-%m").to_string(), false);
    groups.sort_by(|a, b| a.key.cmp(&b.key));
    groups
}

pub(crate) fn inventory_status(properties: &[Property]) -> Vec<SalesGroup> {
    let mut by_status: BTreeMap<&str, (usize, u64)> = BTreeMap::new();
    for property in properties {
        let entry = by_status.entry(property.status.as_str()).or_default();
        entry.0 += 1;
        entry.1 += property.price;
    }
    by_status
        .into_iter()
        .map(|(status, (count, total_value))| SalesGroup {
            key: status.to_string(),
            count,
            total_value,
            average_nps: None,
        })
        .collect()
}

/// The most recent sales by date of sale, newest first.
pub(crate) fn recent_sales(sales: &[Sale]) -> Vec<Sale> {
    let mut sales = sales.to_vec();
    sales.sort_by_key(|sale| Reverse(sale.date_of_sale));
    sales.truncate(RECENT_SALES);
    sales
}

/// Listing count and average price per city, most listings first.
pub(crate) fn properties_by_city(properties: &[Property]) -> Vec<PropertyGroup> {
    property_groups(properties, |property| property.location.city.as_str(), false)
}

/// Listing count, average price and average area per property type, most
/// listings first.
pub(crate) fn properties_by_type(properties: &[Property]) -> Vec<PropertyGroup> {
    property_groups(properties, |property| property.property_type.as_str(), true)
}

fn property_groups(
    properties: &[Property],
    key: impl Fn(&Property) -> &str,
    with_area: bool,
) -> Vec<PropertyGroup> {
    let mut totals: BTreeMap<&str, (usize, u64, u64)> = BTreeMap::new();
    for property in properties {
        let entry = totals.entry(key(property)).or_default();
        entry.0 += 1;
        entry.1 += property.price;
        entry.2 += u64::from(property.area);
    }

    let mut groups: Vec<PropertyGroup> = totals
        .into_iter()
        .map(|(key, (count, price, area))| PropertyGroup {
            key: key.to_string(),
            count,
            average_price: average(price as f64, count),
            average_area: with_area.then(|| average(area as f64, count)),
        })
        .collect();
    // Stable, so equal counts stay in key order.
    groups.sort_by_key(|group| Reverse(group.count));
    groups
}

/// Scores the remark attached to each sale.
pub(crate) fn feedback_sentiment(
    sales: &[Sale],
    scorer: &dyn SentimentScorer,
) -> FeedbackSentimentSummary {
    let scored: Vec<FeedbackSample> = sales
        .iter()
        .map(|sale| FeedbackSample {
            feedback: sale.feedback.clone(),
            nps: sale.nps,
            sentiment: scorer.score(&sale.feedback),
        })
        .collect();
    let count = |sentiment: Sentiment| scored.iter().filter(|s| s.sentiment == sentiment).count();

    FeedbackSentimentSummary {
        positive: count(Sentiment::Positive),
        neutral: count(Sentiment::Neutral),
        negative: count(Sentiment::Negative),
        total: scored.len(),
        samples: scored.iter().take(SENTIMENT_SAMPLES).cloned().collect(),
    }
}

pub(crate) fn feedback_analysis(feedback: &[Feedback]) -> FeedbackAnalysis {
    let mut sentiments: BTreeMap<Sentiment, usize> = BTreeMap::new();
    let mut categories: HashMap<FeedbackCategory, usize> = HashMap::new();
    for entry in feedback {
        *sentiments.entry(entry.sentiment).or_default() += 1;
        *categories.entry(entry.category).or_default() += 1;
    }

    let mut category_counts: Vec<_> = categories
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect();
    category_counts.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.category.as_str().cmp(b.category.as_str()))
    });

    FeedbackAnalysis {
        sentiment_counts: sentiments
            .into_iter()
            .map(|(sentiment, count)| SentimentCount { sentiment, count })
            .collect(),
        category_counts,
        recent_feedback: recent(feedback, RECENT_FEEDBACK),
        keywords: keywords(feedback.iter().map(|entry| entry.text.as_str())),
    }
}

/// Newest entries first.
pub(crate) fn recent(feedback: &[Feedback], n: usize) -> Vec<Feedback> {
    let mut entries = feedback.to_vec();
    entries.sort_by_key(|entry| Reverse(entry.created_at));
    entries.truncate(n);
    entries
}

fn keywords<'a>(texts: impl Iterator<Item = &'a str>) -> Vec<KeywordCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for text in texts {
        let text = text.to_lowercase();
        for word in WORD.find_iter(&text).map(|m| m.as_str()) {
            if word.chars().count() > 3 && !STOP_WORDS.contains(&word) {
                *counts.entry(word.to_string()).or_default() += 1;
            }
        }
    }

    let mut keywords: Vec<_> = counts
        .into_iter()
        .map(|(word, count)| KeywordCount { word, count })
        .collect();
    keywords.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    keywords.truncate(TOP_KEYWORDS);
    keywords
}

/// Groups sales by `key`, keeping groups in order of first appearance.
fn group(sales: &[Sale], key: impl Fn(&Sale) -> String, with_nps: bool) -> Vec<SalesGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(SalesGroup, u64)> = Vec::new();
    for sale in sales {
        let key = key(sale);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push((
                SalesGroup {
                    key,
                    count: 0,
                    total_value: 0,
                    average_nps: None,
                },
                0,
            ));
            groups.len() - 1
        });
        let (group, nps_total) = &mut groups[slot];
        group.count += 1;
        group.total_value += sale.price;
        *nps_total += u64::from(sale.nps);
    }

    groups
        .into_iter()
        .map(|(mut group, nps_total)| {
            if with_nps {
                group.average_nps = Some(average(nps_total as f64, group.count));
            }
            group
        })
        .collect()
}

fn average(total: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        total / n as f64
    }
}
