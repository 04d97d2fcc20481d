// region:    --- Imports
use super::{LedgerStore, ListingFilter};
use crate::auction::model::{
    Amount, Bid, BidId, Category, CategoryId, Comment, CommentId, Listing, ListingId,
    ListingStatus, NewListing, User, UserId,
};
use crate::auction::rules;
use crate::ledger::LedgerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;

// endregion: --- Imports

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    users: BTreeMap<UserId, User>,
    categories: BTreeMap<CategoryId, Category>,
    listings: BTreeMap<ListingId, Listing>,
    bids: BTreeMap<BidId, Bid>,
    comments: BTreeMap<CommentId, Comment>,
    watchlist: BTreeSet<(UserId, ListingId)>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, id: UserId) -> Result<&User, LedgerError> {
        self.users
            .get(&id)
            .ok_or_else(|| LedgerError::not_found("User", id))
    }

    fn listing(&self, id: ListingId) -> Result<&Listing, LedgerError> {
        self.listings
            .get(&id)
            .ok_or_else(|| LedgerError::not_found("Listing", id))
    }

    fn bids_on(&self, listing_id: ListingId) -> Vec<Bid> {
        self.bids
            .values()
            .filter(|bid| bid.listing_id == listing_id)
            .cloned()
            .collect()
    }
}

/// Store kept entirely in process memory.
///
/// A single mutex guards all state, so every operation is serialized.
#[derive(Default)]
pub struct MemoryLedgerStore {
    state: Mutex<MemoryState>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(listings: &mut [Listing]) {
    listings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert_user(
        &self,
        username: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<User, LedgerError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.username == username) {
            return Err(LedgerError::invalid_state(format!(
                "username {:?} is already taken",
                username
            )));
        }
        let user = User {
            id: state.next_id(),
            username: username.to_string(),
            email: email.to_string(),
            created_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<User, LedgerError> {
        self.state.lock().await.user(id).cloned()
    }

    async fn update_user(
        &self,
        id: UserId,
        username: &str,
        email: &str,
    ) -> Result<User, LedgerError> {
        let mut state = self.state.lock().await;
        state.user(id)?;
        if state
            .users
            .values()
            .any(|u| u.id != id && u.username == username)
        {
            return Err(LedgerError::invalid_state(format!(
                "username {:?} is already taken",
                username
            )));
        }
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("User", id))?;
        user.username = username.to_string();
        user.email = email.to_string();
        Ok(user.clone())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        state.user(id)?;
        let referenced = state.listings.values().any(|l| l.lister_id == id)
            || state.bids.values().any(|b| b.bidder_id == id)
            || state.comments.values().any(|c| c.commenter_id == id);
        if referenced {
            return Err(LedgerError::invalid_state(format!(
                "user {} still has listings, bids or comments",
                id
            )));
        }
        state.watchlist.retain(|(user_id, _)| *user_id != id);
        state.users.remove(&id);
        Ok(())
    }

    async fn insert_category(&self, name: &str) -> Result<Category, LedgerError> {
        let mut state = self.state.lock().await;
        if state.categories.values().any(|c| c.name == name) {
            return Err(LedgerError::invalid_state(format!(
                "category {:?} already exists",
                name
            )));
        }
        let category = Category {
            id: state.next_id(),
            name: name.to_string(),
        };
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn get_category(&self, id: CategoryId) -> Result<Category, LedgerError> {
        self.state
            .lock()
            .await
            .categories
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("Category", id))
    }

    async fn category_by_name(&self, name: &str) -> Result<Option<Category>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state.categories.values().find(|c| c.name == name).cloned())
    }

    async fn categories(&self) -> Result<Vec<Category>, LedgerError> {
        let state = self.state.lock().await;
        let mut categories: Vec<Category> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        if !state.categories.contains_key(&id) {
            return Err(LedgerError::not_found("Category", id));
        }
        if state.listings.values().any(|l| l.category_id == Some(id)) {
            return Err(LedgerError::invalid_state(format!(
                "category {} is still used by listings",
                id
            )));
        }
        state.categories.remove(&id);
        Ok(())
    }

    async fn insert_listing(
        &self,
        lister_id: UserId,
        new: &NewListing,
        category_id: Option<CategoryId>,
        now: DateTime<Utc>,
    ) -> Result<Listing, LedgerError> {
        let mut state = self.state.lock().await;
        state.user(lister_id)?;
        if let Some(id) = category_id {
            if !state.categories.contains_key(&id) {
                return Err(LedgerError::not_found("Category", id));
            }
        }
        let listing = Listing {
            id: state.next_id(),
            title: new.title.clone(),
            description: new.description.clone(),
            starting_bid: new.starting_bid,
            photo_url: new.photo_url.clone(),
            contact: new.contact.clone(),
            lister_id,
            category_id,
            status: ListingStatus::Active,
            created_at: now,
            closed_at: None,
        };
        state.listings.insert(listing.id, listing.clone());
        Ok(listing)
    }

    async fn get_listing(&self, id: ListingId) -> Result<Listing, LedgerError> {
        self.state.lock().await.listing(id).cloned()
    }

    async fn find_listings(&self, filter: ListingFilter) -> Result<Vec<Listing>, LedgerError> {
        let state = self.state.lock().await;
        let mut listings: Vec<Listing> = state
            .listings
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        newest_first(&mut listings);
        Ok(listings)
    }

    async fn close_listing(
        &self,
        id: ListingId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<Listing, LedgerError> {
        let mut state = self.state.lock().await;
        rules::check_close(state.listing(id)?, actor)?;
        let listing = state
            .listings
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("Listing", id))?;
        listing.status = ListingStatus::Closed;
        listing.closed_at = Some(now);
        Ok(listing.clone())
    }

    async fn delete_listing(&self, id: ListingId, actor: UserId) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        rules::check_lister(state.listing(id)?, actor, "delete it")?;
        state.bids.retain(|_, bid| bid.listing_id != id);
        state.comments.retain(|_, comment| comment.listing_id != id);
        state.watchlist.retain(|(_, listing_id)| *listing_id != id);
        state.listings.remove(&id);
        Ok(())
    }

    async fn insert_bid(
        &self,
        listing_id: ListingId,
        bidder_id: UserId,
        value: Amount,
        now: DateTime<Utc>,
    ) -> Result<Bid, LedgerError> {
        let mut state = self.state.lock().await;
        state.user(bidder_id)?;
        let existing = state.bids_on(listing_id);
        rules::check_bid(state.listing(listing_id)?, &existing, value)?;
        let bid = Bid {
            id: state.next_id(),
            listing_id,
            bidder_id,
            value,
            created_at: now,
        };
        state.bids.insert(bid.id, bid.clone());
        Ok(bid)
    }

    async fn get_bid(&self, id: BidId) -> Result<Bid, LedgerError> {
        self.state
            .lock()
            .await
            .bids
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("Bid", id))
    }

    async fn listing_bids(&self, listing_id: ListingId) -> Result<Vec<Bid>, LedgerError> {
        let state = self.state.lock().await;
        state.listing(listing_id)?;
        let mut bids = state.bids_on(listing_id);
        bids.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(bids)
    }

    async fn user_bids(&self, user_id: UserId) -> Result<Vec<Bid>, LedgerError> {
        let state = self.state.lock().await;
        state.user(user_id)?;
        Ok(state
            .bids
            .values()
            .filter(|bid| bid.bidder_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_comment(
        &self,
        listing_id: ListingId,
        commenter_id: UserId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment, LedgerError> {
        let mut state = self.state.lock().await;
        state.user(commenter_id)?;
        state.listing(listing_id)?;
        let comment = Comment {
            id: state.next_id(),
            listing_id,
            commenter_id,
            content: content.to_string(),
            created_at: now,
        };
        state.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn listing_comments(&self, listing_id: ListingId) -> Result<Vec<Comment>, LedgerError> {
        let state = self.state.lock().await;
        state.listing(listing_id)?;
        let mut comments: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.listing_id == listing_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn watch(&self, user_id: UserId, listing_id: ListingId) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        state.user(user_id)?;
        state.listing(listing_id)?;
        state.watchlist.insert((user_id, listing_id));
        Ok(())
    }

    async fn unwatch(&self, user_id: UserId, listing_id: ListingId) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        state.user(user_id)?;
        state.listing(listing_id)?;
        state.watchlist.remove(&(user_id, listing_id));
        Ok(())
    }

    async fn is_watching(
        &self,
        user_id: UserId,
        listing_id: ListingId,
    ) -> Result<bool, LedgerError> {
        Ok(self
            .state
            .lock()
            .await
            .watchlist
            .contains(&(user_id, listing_id)))
    }

    async fn watchlist(&self, user_id: UserId) -> Result<Vec<Listing>, LedgerError> {
        let state = self.state.lock().await;
        state.user(user_id)?;
        let mut listings: Vec<Listing> = state
            .watchlist
            .range((user_id, ListingId::MIN)..=(user_id, ListingId::MAX))
            .filter_map(|(_, listing_id)| state.listings.get(listing_id).cloned())
            .collect();
        newest_first(&mut listings);
        Ok(listings)
    }
}
