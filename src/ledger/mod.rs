//! The auction ledger: bid/auction rules and derived auction state over a
//! [`LedgerStore`].
//!
//! Operations that need authorization take the acting user explicitly.

// region:    --- Imports
use crate::auction::model::{
    Amount, Bid, BidId, BidStatus, Category, CategoryId, Comment, Listing, ListingDetail,
    ListingId, ListingStatus, NewListing, RankedBid, User, UserBids, UserId, UserListings,
};
use crate::auction::rules;
use crate::store::{LedgerStore, ListingFilter};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Modules
mod error;

pub use error::LedgerError;
// endregion: --- Modules

pub type LedgerResult<T> = Result<T, LedgerError>;

// region:    --- Auction Ledger
#[derive(Clone)]
pub struct AuctionLedger {
    store: Arc<dyn LedgerStore>,
}

impl AuctionLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    // -- Users

    pub async fn create_user(&self, username: &str, email: &str) -> LedgerResult<User> {
        rules::validate_username(username)?;
        rules::validate_email(email)?;
        let user = self
            .store
            .insert_user(username.trim(), email.trim(), Utc::now())
            .await?;
        info!("{:<12} --> user {} created: {}", "Ledger", user.id, user.username);
        Ok(user)
    }

    pub async fn get_user(&self, user_id: UserId) -> LedgerResult<User> {
        self.store.get_user(user_id).await
    }

    /// Changes the username and email of the actor's own account.
    pub async fn update_user(
        &self,
        user_id: UserId,
        actor: UserId,
        username: &str,
        email: &str,
    ) -> LedgerResult<User> {
        rules::check_account_owner(user_id, actor)?;
        rules::validate_username(username)?;
        rules::validate_email(email)?;
        let user = self
            .store
            .update_user(user_id, username.trim(), email.trim())
            .await?;
        info!("{:<12} --> user {} updated: {}", "Ledger", user.id, user.username);
        Ok(user)
    }

    pub async fn delete_user(&self, user_id: UserId) -> LedgerResult<()> {
        self.store.delete_user(user_id).await?;
        info!("{:<12} --> user {} deleted", "Ledger", user_id);
        Ok(())
    }

    // -- Categories

    pub async fn create_category(&self, name: &str) -> LedgerResult<Category> {
        rules::validate_category_name(name)?;
        let category = self.store.insert_category(name.trim()).await?;
        info!("{:<12} --> category created: {}", "Ledger", category.name);
        Ok(category)
    }

    pub async fn categories(&self) -> LedgerResult<Vec<Category>> {
        self.store.categories().await
    }

    pub async fn delete_category(&self, category_id: CategoryId) -> LedgerResult<()> {
        self.store.delete_category(category_id).await
    }

    // -- Listings

    pub async fn create_listing(&self, lister: UserId, new: NewListing) -> LedgerResult<Listing> {
        rules::validate_new_listing(&new)?;
        let category_id = match new.category.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(name) => Some(
                self.store
                    .category_by_name(name)
                    .await?
                    .ok_or_else(|| LedgerError::not_found("Category", name))?
                    .id,
            ),
        };
        let listing = self
            .store
            .insert_listing(lister, &new, category_id, Utc::now())
            .await?;
        info!(
            "{:<12} --> listing {} created by user {} (starting bid {})",
            "Ledger", listing.id, lister, listing.starting_bid
        );
        Ok(listing)
    }

    pub async fn get_listing(&self, listing_id: ListingId) -> LedgerResult<Listing> {
        self.store.get_listing(listing_id).await
    }

    pub async fn active_listings(&self) -> LedgerResult<Vec<Listing>> {
        self.store
            .find_listings(ListingFilter {
                status: Some(ListingStatus::Active),
                ..ListingFilter::default()
            })
            .await
    }

    pub async fn category_listings(&self, category_id: CategoryId) -> LedgerResult<Vec<Listing>> {
        self.store.get_category(category_id).await?;
        self.store
            .find_listings(ListingFilter {
                category_id: Some(category_id),
                ..ListingFilter::default()
            })
            .await
    }

    pub async fn user_listings(&self, user_id: UserId) -> LedgerResult<UserListings> {
        self.store.get_user(user_id).await?;
        let listings = self
            .store
            .find_listings(ListingFilter {
                lister_id: Some(user_id),
                ..ListingFilter::default()
            })
            .await?;

        let mut split = UserListings::default();
        for listing in listings {
            match listing.status {
                ListingStatus::Active => split.active.push(listing),
                ListingStatus::Closed => split.closed.push(listing),
            }
        }
        Ok(split)
    }

    /// Closes the auction. Only the lister may do this, and only once.
    pub async fn close_auction(&self, listing_id: ListingId, actor: UserId) -> LedgerResult<Listing> {
        let listing = self
            .store
            .close_listing(listing_id, actor, Utc::now())
            .await
            .inspect_err(|e| {
                warn!(
                    "{:<12} --> close of listing {} by user {} rejected: {}",
                    "Ledger", listing_id, actor, e
                )
            })?;
        info!("{:<12} --> listing {} closed by user {}", "Ledger", listing_id, actor);
        Ok(listing)
    }

    pub async fn delete_listing(&self, listing_id: ListingId, actor: UserId) -> LedgerResult<()> {
        self.store.delete_listing(listing_id, actor).await?;
        info!("{:<12} --> listing {} deleted by user {}", "Ledger", listing_id, actor);
        Ok(())
    }

    // -- Bids

    pub async fn listing_bids(&self, listing_id: ListingId) -> LedgerResult<Vec<Bid>> {
        self.store.listing_bids(listing_id).await
    }

    pub async fn highest_bid(&self, listing_id: ListingId) -> LedgerResult<Option<Bid>> {
        let bids = self.store.listing_bids(listing_id).await?;
        Ok(rules::highest_bid(&bids).cloned())
    }

    pub async fn minimum_next_bid(&self, listing_id: ListingId) -> LedgerResult<Amount> {
        let listing = self.store.get_listing(listing_id).await?;
        let bids = self.store.listing_bids(listing_id).await?;
        Ok(rules::minimum_next_bid(&listing, rules::highest_bid(&bids)))
    }

    pub async fn highest_bid_by(
        &self,
        listing_id: ListingId,
        user_id: UserId,
    ) -> LedgerResult<Option<Bid>> {
        let bids = self.store.listing_bids(listing_id).await?;
        Ok(rules::highest_bid_by(&bids, user_id).cloned())
    }

    /// Records a bid that must beat the current highest bid (or meet the starting bid).
    pub async fn place_bid(
        &self,
        listing_id: ListingId,
        bidder: UserId,
        value: Amount,
    ) -> LedgerResult<Bid> {
        let bid = self
            .store
            .insert_bid(listing_id, bidder, value, Utc::now())
            .await
            .inspect_err(|e| {
                warn!(
                    "{:<12} --> bid of {} on listing {} by user {} rejected: {}",
                    "Ledger", value, listing_id, bidder, e
                )
            })?;
        info!(
            "{:<12} --> bid {} placed: {} on listing {} by user {}",
            "Ledger", bid.id, bid.value, listing_id, bidder
        );
        Ok(bid)
    }

    pub async fn bid_status(&self, bid_id: BidId) -> LedgerResult<BidStatus> {
        let bid = self.store.get_bid(bid_id).await?;
        let listing = self.store.get_listing(bid.listing_id).await?;
        let bids = self.store.listing_bids(bid.listing_id).await?;
        Ok(rules::bid_status(&bid, &listing, &bids))
    }

    /// The user's highest bid on each listing they bid on.
    pub async fn user_highest_bids(&self, user_id: UserId) -> LedgerResult<Vec<Bid>> {
        let bids = self.store.user_bids(user_id).await?;
        Ok(rules::user_highest_bids(&bids))
    }

    /// [`Self::user_highest_bids`] with their standing, split by listing status.
    pub async fn user_bids(&self, user_id: UserId) -> LedgerResult<UserBids> {
        let mut split = UserBids::default();
        for bid in self.user_highest_bids(user_id).await? {
            let listing = self.store.get_listing(bid.listing_id).await?;
            let bids = self.store.listing_bids(bid.listing_id).await?;
            let ranked = RankedBid {
                status: rules::bid_status(&bid, &listing, &bids),
                bid,
            };
            match listing.status {
                ListingStatus::Active => split.open.push(ranked),
                ListingStatus::Closed => split.closed.push(ranked),
            }
        }
        Ok(split)
    }

    pub async fn open_highest_bids(&self, user_id: UserId) -> LedgerResult<Vec<RankedBid>> {
        Ok(self.user_bids(user_id).await?.open)
    }

    pub async fn closed_highest_bids(&self, user_id: UserId) -> LedgerResult<Vec<RankedBid>> {
        Ok(self.user_bids(user_id).await?.closed)
    }

    // -- Comments

    pub async fn add_comment(
        &self,
        listing_id: ListingId,
        commenter: UserId,
        content: &str,
    ) -> LedgerResult<Comment> {
        rules::validate_comment(content)?;
        let comment = self
            .store
            .insert_comment(listing_id, commenter, content, Utc::now())
            .await?;
        info!(
            "{:<12} --> comment {} added to listing {} by user {}",
            "Ledger", comment.id, listing_id, commenter
        );
        Ok(comment)
    }

    pub async fn listing_comments(&self, listing_id: ListingId) -> LedgerResult<Vec<Comment>> {
        self.store.listing_comments(listing_id).await
    }

    // -- Watchlist

    pub async fn watchlist_add(&self, user_id: UserId, listing_id: ListingId) -> LedgerResult<()> {
        self.store.watch(user_id, listing_id).await
    }

    pub async fn watchlist_remove(
        &self,
        user_id: UserId,
        listing_id: ListingId,
    ) -> LedgerResult<()> {
        self.store.unwatch(user_id, listing_id).await
    }

    pub async fn is_watching(&self, user_id: UserId, listing_id: ListingId) -> LedgerResult<bool> {
        self.store.is_watching(user_id, listing_id).await
    }

    pub async fn watchlist(&self, user_id: UserId) -> LedgerResult<Vec<Listing>> {
        self.store.watchlist(user_id).await
    }

    // -- Listing page

    pub async fn listing_detail(
        &self,
        listing_id: ListingId,
        viewer: Option<UserId>,
    ) -> LedgerResult<ListingDetail> {
        let listing = self.store.get_listing(listing_id).await?;
        let bids = self.store.listing_bids(listing_id).await?;
        let comments = self.store.listing_comments(listing_id).await?;
        let highest = rules::highest_bid(&bids).cloned();

        let (watching, viewer_bid) = match viewer {
            Some(user_id) => {
                let watching = self.store.is_watching(user_id, listing_id).await?;
                let viewer_bid = rules::highest_bid_by(&bids, user_id).map(|bid| RankedBid {
                    status: rules::bid_status(bid, &listing, &bids),
                    bid: bid.clone(),
                });
                (watching, viewer_bid)
            }
            None => (false, None),
        };

        let winning_bid = match listing.status {
            ListingStatus::Active => None,
            ListingStatus::Closed => highest.clone(),
        };

        Ok(ListingDetail {
            minimum_next_bid: rules::minimum_next_bid(&listing, highest.as_ref()),
            bid_count: bids.len(),
            comment_count: comments.len(),
            highest_bid: highest,
            comments,
            watching,
            viewer_bid,
            winning_bid,
            listing,
        })
    }
}
// endregion: --- Auction Ledger
