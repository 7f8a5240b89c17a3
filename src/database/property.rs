use async_graphql::Enum;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Tree;

use super::{Database, Record};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Property {
    pub(crate) property_id: String,
    pub(crate) property_name: String,
    pub(crate) property_type: String,
    pub(crate) location: PropertyLocation,
    pub(crate) price: u64,
    pub(crate) bedrooms: u8,
    pub(crate) bathrooms: u8,
    /// Floor area in square feet.
    pub(crate) area: u32,
    pub(crate) features: Vec<String>,
    pub(crate) status: PropertyStatus,
    pub(crate) listed_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub(crate) struct PropertyLocation {
    pub(crate) city: String,
    pub(crate) district: String,
    pub(crate) address: String,
}

#[derive(Enum, Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub(crate) enum PropertyStatus {
    Available,
    Sold,
    Reserved,
}

impl PropertyStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            PropertyStatus::Available => "Available",
            PropertyStatus::Sold => "Sold",
            PropertyStatus::Reserved => "Reserved",
        }
    }
}

impl Record for Property {
    const COLLECTION: &'static str = "Property";

    fn tree(db: &Database) -> &Tree {
        &db.properties
    }
}
