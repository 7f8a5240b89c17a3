use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::database::{
    property::{Property, PropertyLocation, PropertyStatus},
    sale::{Customer, Sale, SaleLocation},
    Database,
};

const PROPERTIES: usize = 50;
const SALES: usize = 200;

const CITIES: &[&str] = &[
    "Singapore Central",
    "Woodlands",
    "Tampines",
    "Jurong",
    "Punggol",
    "Pasir Ris",
];
const DISTRICTS: &[&str] = &[
    "District 1",
    "District 2",
    "District 3",
    "District 4",
    "District 5",
];
const PROPERTY_TYPES: &[&str] = &[
    "Condominium",
    "Apartment",
    "Landed House",
    "Bungalow",
    "Penthouse",
];
const FEATURES: &[&str] = &[
    "Swimming Pool",
    "Gym",
    "Tennis Court",
    "Playground",
    "BBQ Pit",
    "Security",
    "24/7 Concierge",
    "Rooftop Garden",
    "Jacuzzi",
    "Smart Home",
];
const STATUSES: &[PropertyStatus] = &[
    PropertyStatus::Available,
    PropertyStatus::Sold,
    PropertyStatus::Reserved,
];
const FEEDBACK: &[&str] = &[
    "Very satisfied with the property and service!",
    "The agent was very helpful but pricing was higher than expected.",
    "Great location but the property needed some renovations.",
    "Excellent service from start to finish!",
    "The process took longer than expected.",
    "Everything went smoothly, highly recommend!",
    "Property was as advertised, no surprises.",
    "Agent was knowledgeable but sometimes slow to respond.",
    "Perfect fit for my needs, satisfied with purchase.",
    "Good experience overall, would use service again.",
];
const AGENTS: &[&str] = &[
    "John Tan",
    "Sarah Wong",
    "Michael Lee",
    "Rachel Lim",
    "David Chen",
    "Jennifer Koh",
    "Brian Ng",
    "Amanda Teo",
];
const AGE_GROUPS: &[&str] = &["18-25", "26-35", "36-45", "46-55", "56+"];

/// Fills an empty database with sample properties and sales. Returns
/// `false` without writing anything when data already exists.
pub(crate) fn seed(db: &Database, now: DateTime<Utc>) -> Result<bool> {
    if !db.is_empty() {
        info!("Database already has data; skipping seed");
        return Ok(false);
    }

    let (properties, sales) = sample_data(now);
    let properties = db
        .insert_many(&properties)
        .context("failed to seed properties")?;
    let sales = db.insert_many(&sales).context("failed to seed sales")?;
    db.flush()?;
    info!("Seeded {properties} properties and {sales} sales");
    Ok(true)
}

pub(crate) fn sample_data(now: DateTime<Utc>) -> (Vec<Property>, Vec<Sale>) {
    let mut properties: Vec<Property> = (1..=PROPERTIES).map(|i| property(i, now)).collect();

    let sales = (1..=SALES)
        .map(|i| {
            let property = &mut properties[pick(i, 10, PROPERTIES)];
            if spread(i, 11) % 2 == 0 {
                property.status = PropertyStatus::Sold;
            }
            Sale {
                property_id: property.property_id.clone(),
                property_name: property.property_name.clone(),
                location: SaleLocation {
                    city: property.location.city.clone(),
                    district: property.location.district.clone(),
                },
                price: property.price,
                date_of_sale: now - Duration::days(days(i, 12, 365)),
                customer: Customer {
                    gender: if spread(i, 13) % 2 == 0 { "Male" } else { "Female" }.to_string(),
                    age_group: AGE_GROUPS[pick(i, 14, AGE_GROUPS.len())].to_string(),
                },
                sales_agent: AGENTS[pick(i, 15, AGENTS.len())].to_string(),
                nps: u8::try_from(spread(i, 16) % 11).unwrap_or_default(),
                feedback: FEEDBACK[pick(i, 17, FEEDBACK.len())].to_string(),
            }
        })
        .collect();

    (properties, sales)
}

fn property(i: usize, now: DateTime<Utc>) -> Property {
    let city = CITIES[pick(i, 1, CITIES.len())];
    let district = DISTRICTS[pick(i, 2, DISTRICTS.len())];

    let mut features: Vec<String> = Vec::new();
    for n in 0..=pick(i, 3, 5) {
        let feature = FEATURES[pick(i * 10 + n, 4, FEATURES.len())];
        if !features.iter().any(|f| f == feature) {
            features.push(feature.to_string());
        }
    }

    Property {
        property_id: format!("PROP{i:03}"),
        property_name: format!("{city} {} {i}", PROPERTY_TYPES[pick(i, 5, PROPERTY_TYPES.len())]),
        property_type: PROPERTY_TYPES[pick(i, 6, PROPERTY_TYPES.len())].to_string(),
        location: PropertyLocation {
            city: city.to_string(),
            district: district.to_string(),
            address: format!("{} {district} Road, {city}", pick(i, 7, 100) + 1),
        },
        price: 500_000 + spread(i, 8) % 5_000_000,
        bedrooms: small(i, 9, 5),
        bathrooms: small(i, 18, 4),
        area: 500 + u32::try_from(spread(i, 19) % 2000).unwrap_or_default(),
        features,
        status: STATUSES[pick(i, 20, STATUSES.len())],
        listed_date: now - Duration::days(days(i, 21, 180)),
    }
}

/// A well-mixed, repeatable value for item `i` and stream `salt`.
fn spread(i: usize, salt: u64) -> u64 {
    let mut x = (i as u64).wrapping_add(salt.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

fn pick(i: usize, salt: u64, len: usize) -> usize {
    usize::try_from(spread(i, salt) % len as u64).unwrap_or_default()
}

/// A value in `1..=max`.
fn small(i: usize, salt: u64, max: u8) -> u8 {
    u8::try_from(spread(i, salt) % u64::from(max)).unwrap_or_default() + 1
}

fn days(i: usize, salt: u64, max: i64) -> i64 {
    i64::try_from(spread(i, salt) % max.unsigned_abs()).unwrap_or_default()
}
