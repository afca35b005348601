use std::time::Duration;

use bazaar_core::{
    Announcement, Coordinate, Error, ListingRecord, OrderStatus, Rating, Side, scalar_to_string,
};
use serde_json::Value;

use super::{DEFAULT_EXPIRATION, RecordMapper};
use crate::source::peach::ORIGIN;

/// Maps Peach offers, fanning out one announcement per settlement currency.
///
/// Each facet's `fa` is the price quoted in that facet's own currency, not
/// the first listed price. An offer with an empty `meansOfPayment` yields a
/// single announcement whose `d` is the bare id, with no payment methods and
/// the first currency of `prices` (keys in sorted order), if any.
#[derive(Debug, Clone)]
pub struct PeachMapper {
    expiration: Duration,
}

impl PeachMapper {
    pub fn new(expiration: Duration) -> Self {
        Self { expiration }
    }
}

impl Default for PeachMapper {
    fn default() -> Self {
        Self::new(DEFAULT_EXPIRATION)
    }
}

impl RecordMapper for PeachMapper {
    fn origin(&self) -> &'static str {
        ORIGIN
    }

    fn map(
        &self,
        record: &ListingRecord,
        status: OrderStatus,
        created_at: u64,
    ) -> bazaar_core::Result<Vec<Announcement>> {
        let facets = currency_facets(record)?;

        let side = match record.get("type").and_then(Value::as_str) {
            Some("ask") => Side::Sell,
            _ => Side::Buy,
        };

        // A ranged amount has no single fiat equivalent
        let amount = record.get("amount").filter(|v| !v.is_array());
        let amount_str = amount.and_then(scalar_to_string);

        let rating = Rating {
            total_reviews: record.value_or("ratingCount", Value::from(0)),
            total_rating: record.value_or("rating", Value::from(0)),
        };
        let premium = record.str_or("premium", "0");
        let name = record.str_or("userId", "");

        let announcements = facets
            .into_iter()
            .map(|facet| {
                let mut a = Announcement::new(
                    Coordinate::derive(&record.identifier, facet.suffix.as_deref()),
                    ORIGIN,
                    status,
                    created_at,
                    self.expiration.as_secs(),
                );

                a.name = name.clone();
                a.side = side;
                a.amount = amount_str.clone().unwrap_or_else(|| "0".to_string());
                a.fiat_amount = match &amount_str {
                    Some(_) => vec![fiat_price(record, &facet.currency)],
                    None => vec!["0".to_string()],
                };
                a.payment_methods = facet.methods;
                a.rating = rating.clone();
                a.extra = vec![
                    ("premium".to_string(), vec![premium.clone()]),
                    ("bond".to_string(), vec!["0".to_string()]),
                ];
                a.currency = facet.currency;
                a
            })
            .collect();

        Ok(announcements)
    }
}

/// One settlement currency of an offer.
struct Facet {
    /// Coordinate suffix, `None` when the offer has no facets.
    suffix: Option<String>,
    currency: String,
    methods: Vec<String>,
}

/// Facets from `meansOfPayment`, sorted by currency so fan-out order never
/// depends on upstream key order.
fn currency_facets(record: &ListingRecord) -> bazaar_core::Result<Vec<Facet>> {
    let means = record
        .get("meansOfPayment")
        .ok_or(Error::MissingField("meansOfPayment"))?
        .as_object()
        .ok_or_else(|| Error::InvalidField {
            field: "meansOfPayment",
            reason: "expected an object keyed by currency".to_string(),
        })?;

    if means.is_empty() {
        let currency = record
            .get("prices")
            .and_then(Value::as_object)
            .and_then(|prices| prices.keys().next().cloned())
            .unwrap_or_default();
        return Ok(vec![Facet {
            suffix: None,
            currency,
            methods: Vec::new(),
        }]);
    }

    let mut facets: Vec<Facet> = means
        .iter()
        .map(|(currency, methods)| Facet {
            suffix: Some(currency.clone()),
            currency: currency.clone(),
            methods: methods
                .as_array()
                .map(|list| list.iter().filter_map(scalar_to_string).collect())
                .unwrap_or_default(),
        })
        .collect();

    facets.sort_by(|a, b| a.currency.cmp(&b.currency));
    Ok(facets)
}

fn fiat_price(record: &ListingRecord, currency: &str) -> String {
    record
        .get("prices")
        .and_then(|prices| prices.get(currency))
        .and_then(scalar_to_string)
        .unwrap_or_else(|| "0".to_string())
}
