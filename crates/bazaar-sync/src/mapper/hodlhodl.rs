use std::time::Duration;

use bazaar_core::{Announcement, Coordinate, ListingRecord, OrderStatus, Rating, Side};
use serde_json::Value;

use super::{DEFAULT_EXPIRATION, RecordMapper};
use crate::source::hodlhodl::ORIGIN;

/// Maps HodlHodl offers. Every offer has a single currency, so no fan-out.
#[derive(Debug, Clone)]
pub struct HodlHodlMapper {
    expiration: Duration,
}

impl HodlHodlMapper {
    pub fn new(expiration: Duration) -> Self {
        Self { expiration }
    }
}

impl Default for HodlHodlMapper {
    fn default() -> Self {
        Self::new(DEFAULT_EXPIRATION)
    }
}

impl RecordMapper for HodlHodlMapper {
    fn origin(&self) -> &'static str {
        ORIGIN
    }

    fn map(
        &self,
        record: &ListingRecord,
        status: OrderStatus,
        created_at: u64,
    ) -> bazaar_core::Result<Vec<Announcement>> {
        let mut a = Announcement::new(
            Coordinate::derive(&record.identifier, None),
            ORIGIN,
            status,
            created_at,
            self.expiration.as_secs(),
        );

        a.name = record.require_str("trader.login")?;
        a.side = record.require_str("side")?.parse::<Side>()?;
        a.currency = record.require_str("currency_code")?;
        a.amount = record.str_or("max_amount_sats", "0");
        a.fiat_amount = vec![
            record.str_or("min_amount", "0"),
            record.str_or("max_amount", "0"),
        ];
        a.payment_methods = payment_methods(record);
        a.source = format!("https://hodlhodl.com/offers/{}", record.identifier);
        a.rating = Rating {
            total_reviews: record.value_or("trader.trades_count", Value::from(0)),
            total_rating: record.value_or("trader.rating", Value::from(0)),
        };

        Ok(vec![a])
    }
}

fn payment_methods(record: &ListingRecord) -> Vec<String> {
    record
        .get("payment_method_instructions")
        .and_then(Value::as_array)
        .map(|instructions| {
            instructions
                .iter()
                .filter_map(|i| i.get("payment_method_name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
