//! Bid ranking and auction rules.
//!
//! Every function here is a pure scan over already-loaded entities. Stores call the
//! `check_*` functions inside their own transaction so the rules are enforced in one
//! place regardless of the backend.

// region:    --- Imports
use super::model::{Amount, Bid, BidStatus, Listing, ListingStatus, NewListing, UserId};
use crate::ledger::LedgerError;
use std::cmp::Reverse;
use std::collections::BTreeMap;

// endregion: --- Imports

pub const COMMENT_MAX_CHARS: usize = 100;
pub const TITLE_MAX_CHARS: usize = 50;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;
pub const PHOTO_URL_MAX_CHARS: usize = 400;
pub const CONTACT_CHARS: usize = 9;
pub const CATEGORY_NAME_MAX_CHARS: usize = 20;
pub const USERNAME_MAX_CHARS: usize = 150;
pub const EMAIL_MAX_CHARS: usize = 254;

// region:    --- Ranking
/// Highest value wins; equal values go to the earliest bid, then the lowest id.
fn rank(bid: &Bid) -> (Amount, Reverse<chrono::DateTime<chrono::Utc>>, Reverse<i64>) {
    (bid.value, Reverse(bid.created_at), Reverse(bid.id))
}

pub fn highest_bid<'a, I>(bids: I) -> Option<&'a Bid>
where
    I: IntoIterator<Item = &'a Bid>,
{
    bids.into_iter().max_by_key(|bid| rank(bid))
}

pub fn highest_bid_by<'a, I>(bids: I, user_id: UserId) -> Option<&'a Bid>
where
    I: IntoIterator<Item = &'a Bid>,
{
    highest_bid(bids.into_iter().filter(|bid| bid.bidder_id == user_id))
}

pub fn minimum_next_bid(listing: &Listing, highest: Option<&Bid>) -> Amount {
    match highest {
        Some(bid) => bid.value.next_whole_unit(),
        None => listing.starting_bid,
    }
}

pub fn bid_status(bid: &Bid, listing: &Listing, bids: &[Bid]) -> BidStatus {
    let is_highest = highest_bid(bids).is_some_and(|top| top.id == bid.id);
    match (listing.status, is_highest) {
        (ListingStatus::Active, true) => BidStatus::Highest,
        (ListingStatus::Active, false) => BidStatus::OutBidded,
        (ListingStatus::Closed, true) => BidStatus::Won,
        (ListingStatus::Closed, false) => BidStatus::Lost,
    }
}

/// The user's single highest bid on every listing they bid on, ordered by listing id.
pub fn user_highest_bids(bids_by_user: &[Bid]) -> Vec<Bid> {
    let mut per_listing: BTreeMap<i64, &Bid> = BTreeMap::new();
    for bid in bids_by_user {
        per_listing
            .entry(bid.listing_id)
            .and_modify(|best| {
                if rank(bid) > rank(best) {
                    *best = bid;
                }
            })
            .or_insert(bid);
    }
    per_listing.into_values().cloned().collect()
}
// endregion: --- Ranking

// region:    --- Checks
pub fn check_bid(listing: &Listing, bids: &[Bid], value: Amount) -> Result<(), LedgerError> {
    match listing.status {
        ListingStatus::Active => {}
        ListingStatus::Closed => {
            return Err(LedgerError::invalid_state(format!(
                "listing {} is closed for bidding",
                listing.id
            )))
        }
    }
    if value > Amount::MAX {
        return Err(LedgerError::validation(format!(
            "bid of {} exceeds the maximum of {}",
            value,
            Amount::MAX
        )));
    }
    match highest_bid(bids) {
        Some(top) if value <= top.value => Err(LedgerError::validation(format!(
            "bid of {} must be greater than the current highest bid of {}",
            value, top.value
        ))),
        None if value < listing.starting_bid => Err(LedgerError::validation(format!(
            "bid of {} must be at least the starting bid of {}",
            value, listing.starting_bid
        ))),
        _ => Ok(()),
    }
}

pub fn check_lister(listing: &Listing, actor: UserId, action: &str) -> Result<(), LedgerError> {
    if listing.lister_id != actor {
        return Err(LedgerError::permission(format!(
            "only the lister of listing {} may {}",
            listing.id, action
        )));
    }
    Ok(())
}

/// Account edits are only open to the account holder.
pub fn check_account_owner(user_id: UserId, actor: UserId) -> Result<(), LedgerError> {
    if user_id != actor {
        return Err(LedgerError::permission(format!(
            "user {} may not edit the account of user {}",
            actor, user_id
        )));
    }
    Ok(())
}

pub fn check_close(listing: &Listing, actor: UserId) -> Result<(), LedgerError> {
    check_lister(listing, actor, "close it")?;
    match listing.status {
        ListingStatus::Active => Ok(()),
        ListingStatus::Closed => Err(LedgerError::invalid_state(format!(
            "listing {} is already closed",
            listing.id
        ))),
    }
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), LedgerError> {
    let len = value.chars().count();
    if len > max {
        return Err(LedgerError::validation(format!(
            "{} must be at most {} characters (got {})",
            field, max, len
        )));
    }
    Ok(())
}

fn check_not_blank(field: &str, value: &str) -> Result<(), LedgerError> {
    if value.trim().is_empty() {
        return Err(LedgerError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

pub fn validate_comment(content: &str) -> Result<(), LedgerError> {
    check_not_blank("comment", content)?;
    check_length("comment", content, COMMENT_MAX_CHARS)
}

pub fn validate_username(username: &str) -> Result<(), LedgerError> {
    check_not_blank("username", username)?;
    check_length("username", username, USERNAME_MAX_CHARS)
}

/// Email is optional; only its length is bounded.
pub fn validate_email(email: &str) -> Result<(), LedgerError> {
    check_length("email", email.trim(), EMAIL_MAX_CHARS)
}

pub fn validate_category_name(name: &str) -> Result<(), LedgerError> {
    check_not_blank("category name", name)?;
    check_length("category name", name, CATEGORY_NAME_MAX_CHARS)
}

pub fn validate_new_listing(new: &NewListing) -> Result<(), LedgerError> {
    check_not_blank("title", &new.title)?;
    check_length("title", &new.title, TITLE_MAX_CHARS)?;
    check_length("description", &new.description, DESCRIPTION_MAX_CHARS)?;

    if !new.starting_bid.is_positive() {
        return Err(LedgerError::validation("starting bid must be greater than zero"));
    }
    if new.starting_bid > Amount::MAX {
        return Err(LedgerError::validation(format!(
            "starting bid must be at most {}",
            Amount::MAX
        )));
    }

    if !new.photo_url.is_empty() {
        check_length("photo url", &new.photo_url, PHOTO_URL_MAX_CHARS)?;
        url::Url::parse(&new.photo_url)
            .map_err(|e| LedgerError::validation(format!("photo url is invalid: {}", e)))?;
    }

    if new.contact.chars().count() != CONTACT_CHARS {
        return Err(LedgerError::validation(format!(
            "contact must be exactly {} characters",
            CONTACT_CHARS
        )));
    }
    Ok(())
}
// endregion: --- Checks
