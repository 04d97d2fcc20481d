// -- Users

/// Create a user; no row comes back when the username is taken
pub const INSERT_USER: &str = r#"
    INSERT INTO users (username, email, created_at)
    VALUES ($1, $2, $3)
    ON CONFLICT (username) DO NOTHING
    RETURNING id, username, email, created_at
"#;

/// Look up a user
pub const GET_USER: &str = "SELECT id, username, email, created_at FROM users WHERE id = $1";

/// Edit a user's account fields
pub const UPDATE_USER: &str = r#"
    UPDATE users SET username = $2, email = $3
    WHERE id = $1
    RETURNING id, username, email, created_at
"#;

/// Counts every row that protects a user from deletion.
pub const COUNT_USER_REFERENCES: &str = r#"
    SELECT (SELECT COUNT(*) FROM listings WHERE lister_id = $1)
         + (SELECT COUNT(*) FROM bids WHERE bidder_id = $1)
         + (SELECT COUNT(*) FROM comments WHERE commenter_id = $1) AS refs
"#;

/// Delete a user
pub const DELETE_USER: &str = "DELETE FROM users WHERE id = $1";

// -- Categories

/// Create a category; no row comes back when the name is taken
pub const INSERT_CATEGORY: &str = r#"
    INSERT INTO categories (name) VALUES ($1)
    ON CONFLICT (name) DO NOTHING
    RETURNING id, name
"#;

/// Look up a category
pub const GET_CATEGORY: &str = "SELECT id, name FROM categories WHERE id = $1";

/// Look up a category by name
pub const GET_CATEGORY_BY_NAME: &str = "SELECT id, name FROM categories WHERE name = $1";

/// All categories
pub const GET_ALL_CATEGORIES: &str = "SELECT id, name FROM categories ORDER BY name";

/// Listings that protect a category from deletion
pub const COUNT_CATEGORY_LISTINGS: &str =
    "SELECT COUNT(*) AS refs FROM listings WHERE category_id = $1";

/// Delete a category
pub const DELETE_CATEGORY: &str = "DELETE FROM categories WHERE id = $1";

// -- Listings

/// Create an active listing
pub const INSERT_LISTING: &str = r#"
    INSERT INTO listings (title, description, starting_bid, photo_url, contact, lister_id, category_id, status, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, 'ACTIVE', $8)
    RETURNING id, title, description, starting_bid, photo_url, contact, lister_id, category_id, status, created_at, closed_at
"#;

/// Look up a listing
pub const GET_LISTING: &str = "SELECT id, title, description, starting_bid, photo_url, contact, lister_id, category_id, status, created_at, closed_at FROM listings WHERE id = $1";

/// Row-locks the listing until the surrounding transaction ends.
pub const GET_LISTING_FOR_UPDATE: &str = "SELECT id, title, description, starting_bid, photo_url, contact, lister_id, category_id, status, created_at, closed_at FROM listings WHERE id = $1 FOR UPDATE";

/// `NULL` parameters match any value.
pub const FIND_LISTINGS: &str = r#"
    SELECT id, title, description, starting_bid, photo_url, contact, lister_id, category_id, status, created_at, closed_at
    FROM listings
    WHERE ($1::TEXT IS NULL OR status = $1)
      AND ($2::BIGINT IS NULL OR category_id = $2)
      AND ($3::BIGINT IS NULL OR lister_id = $3)
    ORDER BY created_at DESC, id DESC
"#;

/// Close a listing
pub const CLOSE_LISTING: &str = r#"
    UPDATE listings SET status = 'CLOSED', closed_at = $2
    WHERE id = $1
    RETURNING id, title, description, starting_bid, photo_url, contact, lister_id, category_id, status, created_at, closed_at
"#;

/// Delete a listing; bids, comments and watchlist rows cascade
pub const DELETE_LISTING: &str = "DELETE FROM listings WHERE id = $1";

/// Listings a user watches
pub const GET_WATCHLIST: &str = r#"
    SELECT l.id, l.title, l.description, l.starting_bid, l.photo_url, l.contact, l.lister_id, l.category_id, l.status, l.created_at, l.closed_at
    FROM listings l
    JOIN watchlist w ON w.listing_id = l.id
    WHERE w.user_id = $1
    ORDER BY l.created_at DESC, l.id DESC
"#;

// -- Bids

/// Record a bid
pub const INSERT_BID: &str = r#"
    INSERT INTO bids (listing_id, bidder_id, value, created_at)
    VALUES ($1, $2, $3, $4)
    RETURNING id, listing_id, bidder_id, value, created_at
"#;

/// Look up a bid
pub const GET_BID: &str =
    "SELECT id, listing_id, bidder_id, value, created_at FROM bids WHERE id = $1";

/// Bid history of a listing, newest first
pub const GET_LISTING_BIDS: &str = r#"
    SELECT id, listing_id, bidder_id, value, created_at
    FROM bids
    WHERE listing_id = $1
    ORDER BY created_at DESC, id DESC
"#;

/// Every bid a user placed
pub const GET_USER_BIDS: &str = r#"
    SELECT id, listing_id, bidder_id, value, created_at
    FROM bids
    WHERE bidder_id = $1
    ORDER BY listing_id, id
"#;

// -- Comments

/// Record a comment
pub const INSERT_COMMENT: &str = r#"
    INSERT INTO comments (listing_id, commenter_id, content, created_at)
    VALUES ($1, $2, $3, $4)
    RETURNING id, listing_id, commenter_id, content, created_at
"#;

/// Comments on a listing, oldest first
pub const GET_LISTING_COMMENTS: &str = r#"
    SELECT id, listing_id, commenter_id, content, created_at
    FROM comments
    WHERE listing_id = $1
    ORDER BY created_at, id
"#;

// -- Watchlist

/// Watch a listing
pub const INSERT_WATCH: &str = r#"
    INSERT INTO watchlist (user_id, listing_id) VALUES ($1, $2)
    ON CONFLICT (user_id, listing_id) DO NOTHING
"#;

/// Stop watching a listing
pub const DELETE_WATCH: &str = "DELETE FROM watchlist WHERE user_id = $1 AND listing_id = $2";

/// Whether a user watches a listing
pub const IS_WATCHING: &str =
    "SELECT EXISTS (SELECT 1 FROM watchlist WHERE user_id = $1 AND listing_id = $2) AS watching";
