//! Announcement events: the replaceable order records published to relays.
//!
//! An [`Announcement`] is the unsigned, deterministic output of a record
//! mapper. It carries everything needed to build the kind-38383 event; the
//! signature is only added at publish time via [`Announcement::sign`].
//!
//! # Wire shape
//!
//! Tags are emitted in a fixed order:
//!
//! ```text
//! d name k f s amt fa pm source rating network layer expiration y z [extra...]
//! ```
//!
//! Events sharing the same `d` tag and author are parameterized-replaceable:
//! a later `created_at` supersedes the earlier event at the relay, so
//! re-publishing a listing never duplicates it.

use std::fmt;
use std::str::FromStr;

use nostr::{Event, EventBuilder, Keys, Kind, Tag, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::{ANNOUNCEMENT_KIND, DEFAULT_LAYER, DEFAULT_NETWORK, RECORD_CATEGORY};

/// Lifecycle status carried in the `s` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// Listing is open upstream.
    Pending,
    /// Listing disappeared upstream.
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Canceled => "canceled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "canceled" => Ok(Self::Canceled),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order side carried in the `k` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            _ => Err(Error::InvalidField {
                field: "side",
                reason: format!("expected buy or sell, got '{}'", s),
            }),
        }
    }
}

/// Counterparty reputation, JSON-encoded into the `rating` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub total_reviews: serde_json::Value,
    pub total_rating: serde_json::Value,
}

/// Stable replacement key (`d` tag) of an announcement.
///
/// Derived from the listing identifier and, for fan-out listings, the facet
/// (settlement currency). The same inputs always produce the same coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate(String);

impl Coordinate {
    pub fn derive(identifier: &str, facet: Option<&str>) -> Self {
        match facet {
            Some(facet) => Self(format!("{}{}", identifier, facet)),
            None => Self(identifier.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unsigned order announcement.
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub coordinate: Coordinate,
    /// Counterparty display name.
    pub name: String,
    pub side: Side,
    /// Settlement currency code.
    pub currency: String,
    pub status: OrderStatus,
    /// Amount in sats, `"0"` when unknown.
    pub amount: String,
    /// Fiat amount bounds `[min, max]` or a single value.
    pub fiat_amount: Vec<String>,
    pub payment_methods: Vec<String>,
    /// Canonical upstream URL (may be empty).
    pub source: String,
    pub rating: Rating,
    pub network: String,
    pub layer: String,
    pub created_at: u64,
    pub expires_at: u64,
    /// Origin tag (`y`).
    pub origin: String,
    /// Origin-specific tags appended after the fixed set.
    pub extra: Vec<(String, Vec<String>)>,
}

impl Announcement {
    /// Start an announcement with the fixed defaults filled in.
    ///
    /// `expires_at` is `created_at + expiration_secs`.
    pub fn new(
        coordinate: Coordinate,
        origin: impl Into<String>,
        status: OrderStatus,
        created_at: u64,
        expiration_secs: u64,
    ) -> Self {
        Self {
            coordinate,
            name: String::new(),
            side: Side::Buy,
            currency: String::new(),
            status,
            amount: "0".to_string(),
            fiat_amount: vec!["0".to_string()],
            payment_methods: Vec::new(),
            source: String::new(),
            rating: Rating {
                total_reviews: serde_json::Value::from(0),
                total_rating: serde_json::Value::from(0),
            },
            network: DEFAULT_NETWORK.to_string(),
            layer: DEFAULT_LAYER.to_string(),
            created_at,
            expires_at: created_at.saturating_add(expiration_secs),
            origin: origin.into(),
            extra: Vec::new(),
        }
    }

    /// Raw tag rows in wire order.
    pub fn tag_rows(&self) -> Result<Vec<Vec<String>>> {
        let rating = serde_json::to_string(&self.rating)?;

        let mut rows: Vec<Vec<String>> = vec![
            vec!["d".into(), self.coordinate.to_string()],
            vec!["name".into(), self.name.clone()],
            vec!["k".into(), self.side.as_str().into()],
            vec!["f".into(), self.currency.clone()],
            vec!["s".into(), self.status.as_str().into()],
            vec!["amt".into(), self.amount.clone()],
            prefixed("fa", &self.fiat_amount),
            prefixed("pm", &self.payment_methods),
            vec!["source".into(), self.source.clone()],
            vec!["rating".into(), rating],
            vec!["network".into(), self.network.clone()],
            vec!["layer".into(), self.layer.clone()],
            vec!["expiration".into(), self.expires_at.to_string()],
            vec!["y".into(), self.origin.clone()],
            vec!["z".into(), RECORD_CATEGORY.into()],
        ];

        for (name, values) in &self.extra {
            rows.push(prefixed(name, values));
        }

        Ok(rows)
    }

    /// Tags for the Nostr event.
    pub fn tags(&self) -> Result<Vec<Tag>> {
        self.tag_rows()?
            .into_iter()
            .map(|row| Tag::parse(row).map_err(|e| Error::Tag(e.to_string())))
            .collect()
    }

    /// Sign the announcement into a kind-38383 event.
    pub fn sign(&self, keys: &Keys) -> Result<Event> {
        EventBuilder::new(Kind::from(ANNOUNCEMENT_KIND), "")
            .tags(self.tags()?)
            .custom_created_at(Timestamp::from(self.created_at))
            .sign_with_keys(keys)
            .map_err(|e| Error::Signing(e.to_string()))
    }
}

fn prefixed(name: &str, values: &[String]) -> Vec<String> {
    let mut row = Vec::with_capacity(values.len() + 1);
    row.push(name.to_string());
    row.extend(values.iter().cloned());
    row
}

/// Values of the first tag named `name` in an event (without the name itself).
pub fn tag_values<'a>(event: &'a Event, name: &str) -> Option<&'a [String]> {
    event.tags.iter().find_map(|tag| {
        let slice = tag.as_slice();
        match slice.first() {
            Some(first) if first == name => Some(&slice[1..]),
            _ => None,
        }
    })
}
