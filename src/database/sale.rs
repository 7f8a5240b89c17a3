use async_graphql::SimpleObject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Tree;

use super::{Database, Record};

#[derive(SimpleObject, Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Sale {
    pub(crate) property_id: String,
    pub(crate) property_name: String,
    pub(crate) location: SaleLocation,
    pub(crate) price: u64,
    pub(crate) date_of_sale: DateTime<Utc>,
    pub(crate) customer: Customer,
    pub(crate) sales_agent: String,
    pub(crate) nps: u8,
    pub(crate) feedback: String,
}

#[derive(SimpleObject, Debug, Clone, Deserialize, Serialize, PartialEq)]
pub(crate) struct SaleLocation {
    pub(crate) city: String,
    pub(crate) district: String,
}

#[derive(SimpleObject, Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Customer {
    pub(crate) gender: String,
    pub(crate) age_group: String,
}

impl Record for Sale {
    const COLLECTION: &'static str = "Sale";

    fn tree(db: &Database) -> &Tree {
        &db.sales
    }
}

#[cfg(test)]
pub(crate) fn test_sale(n: u32, city: &str, price: u64) -> Sale {
    use chrono::TimeZone;

    Sale {
        property_id: format!("PROP{n:03}"),
        property_name: format!("Property {n}"),
        location: SaleLocation {
            city: city.to_string(),
            district: "District 1".to_string(),
        },
        price,
        date_of_sale: Utc
            .with_ymd_and_hms(2024, n % 12 + 1, 15, 0, 0, 0)
            .single()
            .unwrap(),
        customer: Customer {
            gender: if n % 2 == 0 { "Female" } else { "Male" }.to_string(),
            age_group: "26-35".to_string(),
        },
        sales_agent: "John Tan".to_string(),
        nps: 9,
        feedback: "Very satisfied with the property and service!".to_string(),
    }
}
