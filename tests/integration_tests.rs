use auction_ledger::auction::model::{Amount, BidStatus, ListingStatus, NewListing};
use auction_ledger::auction::rules;
use auction_ledger::ledger::{AuctionLedger, LedgerError};
use auction_ledger::store::MemoryLedgerStore;
use std::sync::Arc;

/// Tracing setup shared by every test in this binary
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .without_time()
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// Ledger over a fresh in-memory store
fn setup() -> AuctionLedger {
    init_tracing();
    AuctionLedger::new(Arc::new(MemoryLedgerStore::new()))
}

fn amount(text: &str) -> Amount {
    text.parse().unwrap()
}

fn new_listing(title: &str, starting_bid: &str) -> NewListing {
    NewListing {
        title: title.to_string(),
        description: format!("{} for sale", title),
        starting_bid: amount(starting_bid),
        photo_url: String::new(),
        contact: "912345678".to_string(),
        category: None,
    }
}

/// Creates a lister and one listing; returns (lister id, listing id)
async fn create_test_listing(ledger: &AuctionLedger, starting_bid: &str) -> (i64, i64) {
    let lister = ledger.create_user("lister", "lister@example.com").await.unwrap();
    let listing = ledger
        .create_listing(lister.id, new_listing("Test item", starting_bid))
        .await
        .unwrap();
    (lister.id, listing.id)
}

/// Equal bid is rejected, a strictly higher one becomes the highest
#[tokio::test]
async fn test_bid_must_exceed_highest() {
    let ledger = setup();
    let (_, listing_id) = create_test_listing(&ledger, "100.00").await;
    let a = ledger.create_user("a", "").await.unwrap();
    let b = ledger.create_user("b", "").await.unwrap();

    ledger.place_bid(listing_id, a.id, amount("100.50")).await.unwrap();

    let err = ledger
        .place_bid(listing_id, b.id, amount("100.50"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
    assert_eq!(ledger.listing_bids(listing_id).await.unwrap().len(), 1);

    let bid = ledger.place_bid(listing_id, b.id, amount("100.51")).await.unwrap();
    let highest = ledger.highest_bid(listing_id).await.unwrap().unwrap();
    assert_eq!(highest.id, bid.id);
    assert_eq!(highest.bidder_id, b.id);
}

/// First bid may equal the starting bid but not go below it
#[tokio::test]
async fn test_first_bid_against_starting_bid() {
    let ledger = setup();
    let (_, listing_id) = create_test_listing(&ledger, "50.00").await;
    let bidder = ledger.create_user("bidder", "").await.unwrap();

    let err = ledger
        .place_bid(listing_id, bidder.id, amount("49.99"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
    assert!(ledger.highest_bid(listing_id).await.unwrap().is_none());

    ledger.place_bid(listing_id, bidder.id, amount("50.00")).await.unwrap();
}

/// minimum_next_bid: starting bid first, then the next whole unit
#[tokio::test]
async fn test_minimum_next_bid() {
    let ledger = setup();
    let (_, listing_id) = create_test_listing(&ledger, "50.00").await;
    let bidder = ledger.create_user("bidder", "").await.unwrap();

    assert_eq!(ledger.minimum_next_bid(listing_id).await.unwrap(), amount("50.00"));

    ledger.place_bid(listing_id, bidder.id, amount("50.00")).await.unwrap();
    assert_eq!(ledger.minimum_next_bid(listing_id).await.unwrap(), amount("51.00"));

    ledger.place_bid(listing_id, bidder.id, amount("51.37")).await.unwrap();
    assert_eq!(ledger.minimum_next_bid(listing_id).await.unwrap(), amount("52.00"));
}

/// Closing: Won for the top bidder, Lost for the rest, and no way back
#[tokio::test]
async fn test_auction_lifecycle() {
    let ledger = setup();
    let (lister, listing_id) = create_test_listing(&ledger, "10.00").await;
    let x = ledger.create_user("x", "").await.unwrap();
    let y = ledger.create_user("y", "").await.unwrap();

    let y_bid = ledger.place_bid(listing_id, y.id, amount("60.00")).await.unwrap();
    let x_bid = ledger.place_bid(listing_id, x.id, amount("75.00")).await.unwrap();

    assert_eq!(ledger.bid_status(x_bid.id).await.unwrap(), BidStatus::Highest);
    assert_eq!(ledger.bid_status(y_bid.id).await.unwrap(), BidStatus::OutBidded);

    let closed = ledger.close_auction(listing_id, lister).await.unwrap();
    assert_eq!(closed.status, ListingStatus::Closed);
    assert!(closed.closed_at.is_some());

    assert_eq!(ledger.bid_status(x_bid.id).await.unwrap(), BidStatus::Won);
    assert_eq!(ledger.bid_status(y_bid.id).await.unwrap(), BidStatus::Lost);
    // repeated reads do not change anything
    assert_eq!(ledger.bid_status(x_bid.id).await.unwrap(), BidStatus::Won);

    let err = ledger.close_auction(listing_id, lister).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));
    assert_eq!(
        ledger.get_listing(listing_id).await.unwrap().status,
        ListingStatus::Closed
    );

    let err = ledger
        .place_bid(listing_id, y.id, amount("100.00"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));
    assert_eq!(ledger.listing_bids(listing_id).await.unwrap().len(), 2);
}

/// Only the lister may close
#[tokio::test]
async fn test_close_requires_lister() {
    let ledger = setup();
    let (_, listing_id) = create_test_listing(&ledger, "10.00").await;
    let other = ledger.create_user("other", "").await.unwrap();

    let err = ledger.close_auction(listing_id, other.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::Permission(_)));
    assert!(ledger.get_listing(listing_id).await.unwrap().is_active());
}

/// One highest bid per listing, split by listing status
#[tokio::test]
async fn test_user_highest_bids() {
    let ledger = setup();
    let lister = ledger.create_user("lister", "").await.unwrap();
    let bidder = ledger.create_user("bidder", "").await.unwrap();
    let rival = ledger.create_user("rival", "").await.unwrap();

    let first = ledger
        .create_listing(lister.id, new_listing("First", "1.00"))
        .await
        .unwrap();
    let second = ledger
        .create_listing(lister.id, new_listing("Second", "1.00"))
        .await
        .unwrap();

    ledger.place_bid(first.id, bidder.id, amount("2.00")).await.unwrap();
    let best_first = ledger.place_bid(first.id, bidder.id, amount("3.00")).await.unwrap();
    let best_second = ledger.place_bid(second.id, bidder.id, amount("5.00")).await.unwrap();
    ledger.place_bid(second.id, rival.id, amount("6.00")).await.unwrap();

    let highest = ledger.user_highest_bids(bidder.id).await.unwrap();
    assert_eq!(
        highest.iter().map(|b| b.id).collect::<Vec<_>>(),
        vec![best_first.id, best_second.id]
    );
    assert_eq!(
        ledger.highest_bid_by(first.id, bidder.id).await.unwrap().map(|b| b.id),
        Some(best_first.id)
    );
    assert!(ledger.highest_bid_by(first.id, rival.id).await.unwrap().is_none());

    ledger.close_auction(first.id, lister.id).await.unwrap();

    let open = ledger.open_highest_bids(bidder.id).await.unwrap();
    let closed = ledger.closed_highest_bids(bidder.id).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].bid.id, best_second.id);
    assert_eq!(open[0].status, BidStatus::OutBidded);
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].bid.id, best_first.id);
    assert_eq!(closed[0].status, BidStatus::Won);
}

/// Comment length boundary at 100 characters
#[tokio::test]
async fn test_comment_length() {
    let ledger = setup();
    let (lister, listing_id) = create_test_listing(&ledger, "10.00").await;

    let err = ledger
        .add_comment(listing_id, lister, &"x".repeat(101))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = ledger.add_comment(listing_id, lister, "").await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let comment = ledger
        .add_comment(listing_id, lister, &"x".repeat(100))
        .await
        .unwrap();
    assert_eq!(comment.content.len(), 100);
    assert_eq!(ledger.listing_comments(listing_id).await.unwrap().len(), 1);
}

/// Watchlist add/remove is idempotent
#[tokio::test]
async fn test_watchlist_toggle() {
    let ledger = setup();
    let (_, listing_id) = create_test_listing(&ledger, "10.00").await;
    let user = ledger.create_user("watcher", "").await.unwrap();

    ledger.watchlist_add(user.id, listing_id).await.unwrap();
    ledger.watchlist_add(user.id, listing_id).await.unwrap();
    assert_eq!(ledger.watchlist(user.id).await.unwrap().len(), 1);
    assert!(ledger.is_watching(user.id, listing_id).await.unwrap());

    ledger.watchlist_remove(user.id, listing_id).await.unwrap();
    ledger.watchlist_remove(user.id, listing_id).await.unwrap();
    assert!(ledger.watchlist(user.id).await.unwrap().is_empty());
    assert!(!ledger.is_watching(user.id, listing_id).await.unwrap());
}

/// Unknown ids surface as NotFound
#[tokio::test]
async fn test_not_found() {
    let ledger = setup();
    let (lister, listing_id) = create_test_listing(&ledger, "10.00").await;

    assert!(matches!(
        ledger.place_bid(9_999, lister, amount("20.00")).await,
        Err(LedgerError::NotFound { .. })
    ));
    assert!(matches!(
        ledger.place_bid(listing_id, 9_999, amount("20.00")).await,
        Err(LedgerError::NotFound { .. })
    ));
    assert!(matches!(
        ledger.bid_status(9_999).await,
        Err(LedgerError::NotFound { .. })
    ));
    assert!(matches!(
        ledger.watchlist_add(lister, 9_999).await,
        Err(LedgerError::NotFound { .. })
    ));
}

/// Account edits: owner only, unique username, bounded email
#[tokio::test]
async fn test_update_user() {
    let ledger = setup();
    let alice = ledger.create_user("alice", "alice@example.com").await.unwrap();
    let bob = ledger.create_user("bob", "").await.unwrap();

    assert!(matches!(
        ledger.update_user(alice.id, bob.id, "mallory", "").await,
        Err(LedgerError::Permission(_))
    ));
    assert!(matches!(
        ledger.update_user(alice.id, alice.id, "bob", "").await,
        Err(LedgerError::InvalidState(_))
    ));
    assert!(matches!(
        ledger
            .update_user(alice.id, alice.id, "alice", &"e".repeat(255))
            .await,
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        ledger.update_user(9_999, 9_999, "ghost", "").await,
        Err(LedgerError::NotFound { .. })
    ));

    // keeping the same username is not a conflict
    let updated = ledger
        .update_user(alice.id, alice.id, "alice", " alice@new.example.com ")
        .await
        .unwrap();
    assert_eq!(updated.email, "alice@new.example.com");

    let renamed = ledger
        .update_user(alice.id, alice.id, "alicia", "")
        .await
        .unwrap();
    assert_eq!(ledger.get_user(alice.id).await.unwrap().username, "alicia");
    assert_eq!(renamed.created_at, alice.created_at);
    ledger.create_user("alice", "").await.unwrap();
}

/// Over-long emails are rejected before reaching the store
#[tokio::test]
async fn test_create_user_email_length() {
    let ledger = setup();
    assert!(matches!(
        ledger.create_user("u", &"e".repeat(300)).await,
        Err(LedgerError::Validation(_))
    ));
    assert!(ledger.create_user("u", &"e".repeat(254)).await.is_ok());
}

/// Categories: lookup by name and protected deletion
#[tokio::test]
async fn test_listing_categories() {
    let ledger = setup();
    let lister = ledger.create_user("lister", "").await.unwrap();
    let books = ledger.create_category("Books").await.unwrap();
    ledger.create_category("Toys").await.unwrap();

    let mut new = new_listing("Novel", "5.00");
    new.category = Some("Books".to_string());
    let listing = ledger.create_listing(lister.id, new).await.unwrap();
    assert_eq!(listing.category_id, Some(books.id));

    let mut unknown = new_listing("Lamp", "5.00");
    unknown.category = Some("Lighting".to_string());
    assert!(matches!(
        ledger.create_listing(lister.id, unknown).await,
        Err(LedgerError::NotFound { .. })
    ));

    assert!(matches!(
        ledger.create_category("Books").await,
        Err(LedgerError::InvalidState(_))
    ));

    let names: Vec<String> = ledger
        .categories()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Books", "Toys"]);

    let in_books = ledger.category_listings(books.id).await.unwrap();
    assert_eq!(in_books.len(), 1);

    assert!(matches!(
        ledger.delete_category(books.id).await,
        Err(LedgerError::InvalidState(_))
    ));
}

/// Listing deletion cascades; user deletion is blocked while referenced
#[tokio::test]
async fn test_delete_semantics() {
    let ledger = setup();
    let (lister, listing_id) = create_test_listing(&ledger, "10.00").await;
    let bidder = ledger.create_user("bidder", "").await.unwrap();
    let bystander = ledger.create_user("bystander", "").await.unwrap();

    let bid = ledger.place_bid(listing_id, bidder.id, amount("12.00")).await.unwrap();
    ledger.add_comment(listing_id, bidder.id, "nice").await.unwrap();
    ledger.watchlist_add(bystander.id, listing_id).await.unwrap();

    assert!(matches!(
        ledger.delete_user(bidder.id).await,
        Err(LedgerError::InvalidState(_))
    ));
    assert!(matches!(
        ledger.delete_listing(listing_id, bidder.id).await,
        Err(LedgerError::Permission(_))
    ));

    ledger.delete_listing(listing_id, lister).await.unwrap();
    assert!(matches!(
        ledger.bid_status(bid.id).await,
        Err(LedgerError::NotFound { .. })
    ));
    assert!(ledger.watchlist(bystander.id).await.unwrap().is_empty());
    assert!(ledger.user_highest_bids(bidder.id).await.unwrap().is_empty());

    ledger.delete_user(bidder.id).await.unwrap();
    ledger.delete_user(bystander.id).await.unwrap();
    assert!(matches!(
        ledger.get_user(bidder.id).await,
        Err(LedgerError::NotFound { .. })
    ));
}

/// Listing page view for lister, bidder and anonymous viewer
#[tokio::test]
async fn test_listing_detail() {
    let ledger = setup();
    let (lister, listing_id) = create_test_listing(&ledger, "10.00").await;
    let bidder = ledger.create_user("bidder", "").await.unwrap();

    ledger.place_bid(listing_id, bidder.id, amount("10.00")).await.unwrap();
    ledger.add_comment(listing_id, lister, "Still available").await.unwrap();
    ledger.watchlist_add(bidder.id, listing_id).await.unwrap();

    let anonymous = ledger.listing_detail(listing_id, None).await.unwrap();
    assert_eq!(anonymous.bid_count, 1);
    assert_eq!(anonymous.comment_count, 1);
    assert_eq!(anonymous.minimum_next_bid, amount("11.00"));
    assert!(!anonymous.watching);
    assert!(anonymous.viewer_bid.is_none());
    assert!(anonymous.winning_bid.is_none());

    let seen_by_bidder = ledger.listing_detail(listing_id, Some(bidder.id)).await.unwrap();
    assert!(seen_by_bidder.watching);
    assert_eq!(
        seen_by_bidder.viewer_bid.map(|r| r.status),
        Some(BidStatus::Highest)
    );

    ledger.close_auction(listing_id, lister).await.unwrap();
    let seen_by_lister = ledger.listing_detail(listing_id, Some(lister)).await.unwrap();
    assert_eq!(
        seen_by_lister.winning_bid.map(|b| b.bidder_id),
        Some(bidder.id)
    );
    assert!(seen_by_lister.viewer_bid.is_none());
}

/// Listings on the account page are split by status
#[tokio::test]
async fn test_user_listings_split() {
    let ledger = setup();
    let (lister, listing_id) = create_test_listing(&ledger, "10.00").await;
    ledger
        .create_listing(lister, new_listing("Second", "3.00"))
        .await
        .unwrap();
    ledger.close_auction(listing_id, lister).await.unwrap();

    let listings = ledger.user_listings(lister).await.unwrap();
    assert_eq!(listings.active.len(), 1);
    assert_eq!(listings.closed.len(), 1);
    assert_eq!(listings.closed[0].id, listing_id);
    assert_eq!(ledger.active_listings().await.unwrap().len(), 1);
}

/// Concurrent bids still leave the store consistent with the ranking rules
#[tokio::test]
async fn test_concurrent_bidding() {
    let ledger = Arc::new(setup());
    let (_, listing_id) = create_test_listing(&ledger, "1.00").await;

    let mut bidders = Vec::new();
    for i in 0..20 {
        bidders.push(ledger.create_user(&format!("bidder{}", i), "").await.unwrap().id);
    }

    let mut handles = vec![];
    for (i, bidder) in bidders.into_iter().enumerate() {
        let ledger = Arc::clone(&ledger);
        let value = Amount::from_units(10 + (i as i64 % 5));
        handles.push(tokio::spawn(async move {
            ledger.place_bid(listing_id, bidder, value).await
        }));
    }

    let mut successful_bids = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successful_bids += 1,
            Err(LedgerError::Validation(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    let bids = ledger.listing_bids(listing_id).await.unwrap();
    assert_eq!(bids.len(), successful_bids);
    // accepted bids form a strictly increasing sequence in insertion order
    let mut in_order = bids.clone();
    in_order.sort_by_key(|b| b.id);
    assert!(in_order.windows(2).all(|w| w[0].value < w[1].value));
    assert_eq!(
        rules::highest_bid(&bids).map(|b| b.value),
        Some(Amount::from_units(14))
    );
}
