// region:    --- Imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// endregion: --- Imports

pub type UserId = i64;
pub type CategoryId = i64;
pub type ListingId = i64;
pub type BidId = i64;
pub type CommentId = i64;

// region:    --- Amount
/// Currency amount held in integer cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    /// Largest value a DECIMAL(8, 2) column can hold.
    pub const MAX: Amount = Amount(99_999_999);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn from_units(units: i64) -> Self {
        Self(units * 100)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Smallest whole currency amount strictly greater than `self`.
    pub fn next_whole_unit(self) -> Self {
        Self((self.0.div_euclid(100) + 1) * 100)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid amount: {0:?}")]
pub struct ParseAmountError(String);

impl FromStr for Amount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseAmountError(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(err());
        }
        if frac.len() > 2
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(err());
        }
        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| err())?
        };
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| err())? * 10,
            _ => frac.parse().map_err(|_| err())?,
        };
        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac))
            .ok_or_else(err)?;
        Ok(Self(if negative { -cents } else { cents }))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text,
            Raw::Number(number) => number.to_string(),
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}
// endregion: --- Amount

// region:    --- Entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingStatus {
    Active,
    Closed,
}

impl ListingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingStatus::Active => "ACTIVE",
            ListingStatus::Closed => "CLOSED",
        }
    }
}

impl FromStr for ListingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(ListingStatus::Active),
            "CLOSED" => Ok(ListingStatus::Closed),
            other => Err(format!("unknown listing status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    pub description: String,
    pub starting_bid: Amount,
    pub photo_url: String,
    pub contact: String,
    pub lister_id: UserId,
    pub category_id: Option<CategoryId>,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Listing {
    pub fn is_active(&self) -> bool {
        matches!(self.status, ListingStatus::Active)
    }
}

/// Fields supplied by the lister when creating a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewListing {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub starting_bid: Amount,
    #[serde(default)]
    pub photo_url: String,
    pub contact: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub listing_id: ListingId,
    pub bidder_id: UserId,
    pub value: Amount,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub listing_id: ListingId,
    pub commenter_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
// endregion: --- Entities

// region:    --- Derived Views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BidStatus {
    Highest,
    OutBidded,
    Won,
    Lost,
}

/// A bid together with its current standing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedBid {
    pub bid: Bid,
    pub status: BidStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserBids {
    pub open: Vec<RankedBid>,
    pub closed: Vec<RankedBid>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserListings {
    pub active: Vec<Listing>,
    pub closed: Vec<Listing>,
}

/// Everything a listing page shows, from the point of view of an optional viewer.
#[derive(Debug, Clone, Serialize)]
pub struct ListingDetail {
    pub listing: Listing,
    pub highest_bid: Option<Bid>,
    pub minimum_next_bid: Amount,
    pub bid_count: usize,
    pub comment_count: usize,
    pub comments: Vec<Comment>,
    pub watching: bool,
    pub viewer_bid: Option<RankedBid>,
    pub winning_bid: Option<Bid>,
}
// endregion: --- Derived Views

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_parses_and_displays() {
        assert_eq!("100.50".parse::<Amount>().unwrap().cents(), 10050);
        assert_eq!("100.5".parse::<Amount>().unwrap().cents(), 10050);
        assert_eq!("75".parse::<Amount>().unwrap().cents(), 7500);
        assert_eq!(".99".parse::<Amount>().unwrap().cents(), 99);
        assert_eq!(Amount::from_cents(5100).to_string(), "51.00");
        assert_eq!(Amount::from_cents(-5).to_string(), "-0.05");
    }

    #[test]
    fn amount_rejects_malformed_input() {
        for bad in ["", ".", "1.234", "abc", "1,00", "1.2x"] {
            assert!(bad.parse::<Amount>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn next_whole_unit_is_strictly_greater() {
        assert_eq!(Amount::from_cents(5000).next_whole_unit(), Amount::from_units(51));
        assert_eq!(Amount::from_cents(10050).next_whole_unit(), Amount::from_units(101));
        assert_eq!(Amount::from_cents(5099).next_whole_unit(), Amount::from_units(51));
    }

    #[test]
    fn amount_deserializes_from_string_or_number() {
        let from_text: Amount = serde_json::from_str("\"12.30\"").unwrap();
        let from_number: Amount = serde_json::from_str("12.3").unwrap();
        assert_eq!(from_text, Amount::from_cents(1230));
        assert_eq!(from_number, Amount::from_cents(1230));
    }
}
