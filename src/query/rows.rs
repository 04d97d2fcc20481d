//! Raw table rows and their conversion into model types.

use crate::auction::model::{Amount, Bid, Category, Comment, Listing, User};
use crate::ledger::LedgerError;
use chrono::{DateTime, Utc};

#[derive(sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub name: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct ListingRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub starting_bid: i64,
    pub photo_url: String,
    pub contact: String,
    pub lister_id: i64,
    pub category_id: Option<i64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ListingRow> for Listing {
    type Error = LedgerError;

    fn try_from(row: ListingRow) -> Result<Self, Self::Error> {
        Ok(Listing {
            id: row.id,
            title: row.title,
            description: row.description,
            starting_bid: Amount::from_cents(row.starting_bid),
            photo_url: row.photo_url,
            contact: row.contact,
            lister_id: row.lister_id,
            category_id: row.category_id,
            status: row.status.parse().map_err(LedgerError::Database)?,
            created_at: row.created_at,
            closed_at: row.closed_at,
        })
    }
}

pub fn into_listings(rows: Vec<ListingRow>) -> Result<Vec<Listing>, LedgerError> {
    rows.into_iter().map(Listing::try_from).collect()
}

#[derive(sqlx::FromRow)]
pub struct BidRow {
    pub id: i64,
    pub listing_id: i64,
    pub bidder_id: i64,
    pub value: i64,
    pub created_at: DateTime<Utc>,
}

impl From<BidRow> for Bid {
    fn from(row: BidRow) -> Self {
        Bid {
            id: row.id,
            listing_id: row.listing_id,
            bidder_id: row.bidder_id,
            value: Amount::from_cents(row.value),
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub listing_id: i64,
    pub commenter_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            listing_id: row.listing_id,
            commenter_id: row.commenter_id,
            content: row.content,
            created_at: row.created_at,
        }
    }
}
