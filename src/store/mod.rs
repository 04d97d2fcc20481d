//! Persistence seam for the ledger.
//!
//! Each method is one atomic unit of work: implementations must either apply the whole
//! change or leave state untouched. Methods that enforce an auction rule
//! (`insert_bid`, `close_listing`, `delete_listing`) load the rows they need and call
//! the matching `auction::rules::check_*` function inside the same transaction.

// region:    --- Imports
use crate::auction::model::{
    Amount, Bid, BidId, Category, CategoryId, Comment, Listing, ListingId, ListingStatus,
    NewListing, User, UserId,
};
use crate::ledger::LedgerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// endregion: --- Imports

// region:    --- Modules
mod memory;
mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
// endregion: --- Modules

/// Field filters for listing queries; `None` means "any".
#[derive(Debug, Clone, Copy, Default)]
pub struct ListingFilter {
    pub status: Option<ListingStatus>,
    pub category_id: Option<CategoryId>,
    pub lister_id: Option<UserId>,
}

impl ListingFilter {
    pub fn matches(&self, listing: &Listing) -> bool {
        self.status.map_or(true, |s| listing.status == s)
            && self
                .category_id
                .map_or(true, |c| listing.category_id == Some(c))
            && self.lister_id.map_or(true, |l| listing.lister_id == l)
    }
}

// region:    --- Ledger Store Trait
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // -- Users
    /// Fails with `InvalidState` when the username is taken.
    async fn insert_user(
        &self,
        username: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<User, LedgerError>;
    async fn get_user(&self, id: UserId) -> Result<User, LedgerError>;
    /// Fails with `InvalidState` when another user holds the username.
    async fn update_user(
        &self,
        id: UserId,
        username: &str,
        email: &str,
    ) -> Result<User, LedgerError>;
    /// Refused while any listing, bid or comment references the user.
    async fn delete_user(&self, id: UserId) -> Result<(), LedgerError>;

    // -- Categories
    /// Fails with `InvalidState` when the name is taken.
    async fn insert_category(&self, name: &str) -> Result<Category, LedgerError>;
    async fn get_category(&self, id: CategoryId) -> Result<Category, LedgerError>;
    async fn category_by_name(&self, name: &str) -> Result<Option<Category>, LedgerError>;
    /// Ordered by name.
    async fn categories(&self) -> Result<Vec<Category>, LedgerError>;
    /// Refused while any listing references the category.
    async fn delete_category(&self, id: CategoryId) -> Result<(), LedgerError>;

    // -- Listings
    async fn insert_listing(
        &self,
        lister_id: UserId,
        new: &NewListing,
        category_id: Option<CategoryId>,
        now: DateTime<Utc>,
    ) -> Result<Listing, LedgerError>;
    async fn get_listing(&self, id: ListingId) -> Result<Listing, LedgerError>;
    /// Newest first.
    async fn find_listings(&self, filter: ListingFilter) -> Result<Vec<Listing>, LedgerError>;
    async fn close_listing(
        &self,
        id: ListingId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<Listing, LedgerError>;
    /// Removes the listing with its bids, comments and watchlist entries.
    async fn delete_listing(&self, id: ListingId, actor: UserId) -> Result<(), LedgerError>;

    // -- Bids
    async fn insert_bid(
        &self,
        listing_id: ListingId,
        bidder_id: UserId,
        value: Amount,
        now: DateTime<Utc>,
    ) -> Result<Bid, LedgerError>;
    async fn get_bid(&self, id: BidId) -> Result<Bid, LedgerError>;
    /// Newest first.
    async fn listing_bids(&self, listing_id: ListingId) -> Result<Vec<Bid>, LedgerError>;
    async fn user_bids(&self, user_id: UserId) -> Result<Vec<Bid>, LedgerError>;

    // -- Comments
    async fn insert_comment(
        &self,
        listing_id: ListingId,
        commenter_id: UserId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment, LedgerError>;
    /// Oldest first.
    async fn listing_comments(&self, listing_id: ListingId) -> Result<Vec<Comment>, LedgerError>;

    // -- Watchlist
    async fn watch(&self, user_id: UserId, listing_id: ListingId) -> Result<(), LedgerError>;
    async fn unwatch(&self, user_id: UserId, listing_id: ListingId) -> Result<(), LedgerError>;
    async fn is_watching(&self, user_id: UserId, listing_id: ListingId)
        -> Result<bool, LedgerError>;
    /// Newest first.
    async fn watchlist(&self, user_id: UserId) -> Result<Vec<Listing>, LedgerError>;
}
// endregion: --- Ledger Store Trait
