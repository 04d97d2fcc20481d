// region:    --- Imports
use super::{LedgerStore, ListingFilter};
use crate::auction::model::{
    Amount, Bid, BidId, Category, CategoryId, Comment, Listing, ListingId, NewListing, User,
    UserId,
};
use crate::auction::rules;
use crate::database::DatabaseManager;
use crate::ledger::LedgerError;
use crate::query::queries;
use crate::query::rows::{self, BidRow, CategoryRow, CommentRow, ListingRow, UserRow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use std::sync::Arc;
use tracing::debug;

// endregion: --- Imports

// region:    --- Row Helpers
async fn fetch_user(conn: &mut PgConnection, id: UserId) -> Result<User, LedgerError> {
    sqlx::query_as::<_, UserRow>(queries::GET_USER)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .map(User::from)
        .ok_or_else(|| LedgerError::not_found("User", id))
}

async fn fetch_listing(conn: &mut PgConnection, id: ListingId) -> Result<Listing, LedgerError> {
    sqlx::query_as::<_, ListingRow>(queries::GET_LISTING)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| LedgerError::not_found("Listing", id))?
        .try_into()
}

/// Loads the listing and holds its row lock until commit or rollback.
async fn lock_listing(conn: &mut PgConnection, id: ListingId) -> Result<Listing, LedgerError> {
    sqlx::query_as::<_, ListingRow>(queries::GET_LISTING_FOR_UPDATE)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| LedgerError::not_found("Listing", id))?
        .try_into()
}

async fn fetch_listing_bids(
    conn: &mut PgConnection,
    listing_id: ListingId,
) -> Result<Vec<Bid>, LedgerError> {
    let bids = sqlx::query_as::<_, BidRow>(queries::GET_LISTING_BIDS)
        .bind(listing_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(bids.into_iter().map(Bid::from).collect())
}
// endregion: --- Row Helpers

// region:    --- Postgres Ledger Store
/// Store backed by Postgres through sqlx.
///
/// Bids and closes lock the listing row (`SELECT ... FOR UPDATE`), so concurrent
/// requests on one listing are applied one after the other.
pub struct PostgresLedgerStore {
    db: Arc<DatabaseManager>,
}

impl PostgresLedgerStore {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn insert_user(
        &self,
        username: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<User, LedgerError> {
        sqlx::query_as::<_, UserRow>(queries::INSERT_USER)
            .bind(username)
            .bind(email)
            .bind(now)
            .fetch_optional(self.db.pool())
            .await?
            .map(User::from)
            .ok_or_else(|| {
                LedgerError::invalid_state(format!("username {:?} is already taken", username))
            })
    }

    async fn get_user(&self, id: UserId) -> Result<User, LedgerError> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_user(&mut conn, id).await
    }

    async fn update_user(
        &self,
        id: UserId,
        username: &str,
        email: &str,
    ) -> Result<User, LedgerError> {
        let row = sqlx::query_as::<_, UserRow>(queries::UPDATE_USER)
            .bind(id)
            .bind(username)
            .bind(email)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    LedgerError::invalid_state(format!("username {:?} is already taken", username))
                }
                other => LedgerError::from(other),
            })?;
        row.map(User::from)
            .ok_or_else(|| LedgerError::not_found("User", id))
    }

    async fn delete_user(&self, id: UserId) -> Result<(), LedgerError> {
        self.db
            .transaction(|tx| {
                Box::pin(async move {
                    fetch_user(&mut **tx, id).await?;
                    let refs: i64 = sqlx::query_scalar(queries::COUNT_USER_REFERENCES)
                        .bind(id)
                        .fetch_one(&mut **tx)
                        .await?;
                    if refs > 0 {
                        return Err(LedgerError::invalid_state(format!(
                            "user {} still has listings, bids or comments",
                            id
                        )));
                    }
                    sqlx::query(queries::DELETE_USER)
                        .bind(id)
                        .execute(&mut **tx)
                        .await?;
                    Ok(())
                })
            })
            .await
    }

    async fn insert_category(&self, name: &str) -> Result<Category, LedgerError> {
        sqlx::query_as::<_, CategoryRow>(queries::INSERT_CATEGORY)
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?
            .map(Category::from)
            .ok_or_else(|| LedgerError::invalid_state(format!("category {:?} already exists", name)))
    }

    async fn get_category(&self, id: CategoryId) -> Result<Category, LedgerError> {
        sqlx::query_as::<_, CategoryRow>(queries::GET_CATEGORY)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .map(Category::from)
            .ok_or_else(|| LedgerError::not_found("Category", id))
    }

    async fn category_by_name(&self, name: &str) -> Result<Option<Category>, LedgerError> {
        let row = sqlx::query_as::<_, CategoryRow>(queries::GET_CATEGORY_BY_NAME)
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(Category::from))
    }

    async fn categories(&self) -> Result<Vec<Category>, LedgerError> {
        let rows = sqlx::query_as::<_, CategoryRow>(queries::GET_ALL_CATEGORIES)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), LedgerError> {
        self.db
            .transaction(|tx| {
                Box::pin(async move {
                    sqlx::query_as::<_, CategoryRow>(queries::GET_CATEGORY)
                        .bind(id)
                        .fetch_optional(&mut **tx)
                        .await?
                        .ok_or_else(|| LedgerError::not_found("Category", id))?;
                    let refs: i64 = sqlx::query_scalar(queries::COUNT_CATEGORY_LISTINGS)
                        .bind(id)
                        .fetch_one(&mut **tx)
                        .await?;
                    if refs > 0 {
                        return Err(LedgerError::invalid_state(format!(
                            "category {} is still used by listings",
                            id
                        )));
                    }
                    sqlx::query(queries::DELETE_CATEGORY)
                        .bind(id)
                        .execute(&mut **tx)
                        .await?;
                    Ok(())
                })
            })
            .await
    }

    async fn insert_listing(
        &self,
        lister_id: UserId,
        new: &NewListing,
        category_id: Option<CategoryId>,
        now: DateTime<Utc>,
    ) -> Result<Listing, LedgerError> {
        let new = new.clone();
        self.db
            .transaction(move |tx| {
                Box::pin(async move {
                    fetch_user(&mut **tx, lister_id).await?;
                    if let Some(id) = category_id {
                        sqlx::query_as::<_, CategoryRow>(queries::GET_CATEGORY)
                            .bind(id)
                            .fetch_optional(&mut **tx)
                            .await?
                            .ok_or_else(|| LedgerError::not_found("Category", id))?;
                    }
                    let row = sqlx::query_as::<_, ListingRow>(queries::INSERT_LISTING)
                        .bind(&new.title)
                        .bind(&new.description)
                        .bind(new.starting_bid.cents())
                        .bind(&new.photo_url)
                        .bind(&new.contact)
                        .bind(lister_id)
                        .bind(category_id)
                        .bind(now)
                        .fetch_one(&mut **tx)
                        .await?;
                    Listing::try_from(row)
                })
            })
            .await
    }

    async fn get_listing(&self, id: ListingId) -> Result<Listing, LedgerError> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_listing(&mut conn, id).await
    }

    async fn find_listings(&self, filter: ListingFilter) -> Result<Vec<Listing>, LedgerError> {
        let rows = sqlx::query_as::<_, ListingRow>(queries::FIND_LISTINGS)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.category_id)
            .bind(filter.lister_id)
            .fetch_all(self.db.pool())
            .await?;
        rows::into_listings(rows)
    }

    async fn close_listing(
        &self,
        id: ListingId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<Listing, LedgerError> {
        self.db
            .transaction(|tx| {
                Box::pin(async move {
                    let listing = lock_listing(&mut **tx, id).await?;
                    rules::check_close(&listing, actor)?;
                    let row = sqlx::query_as::<_, ListingRow>(queries::CLOSE_LISTING)
                        .bind(id)
                        .bind(now)
                        .fetch_one(&mut **tx)
                        .await?;
                    Listing::try_from(row)
                })
            })
            .await
    }

    async fn delete_listing(&self, id: ListingId, actor: UserId) -> Result<(), LedgerError> {
        self.db
            .transaction(|tx| {
                Box::pin(async move {
                    let listing = lock_listing(&mut **tx, id).await?;
                    rules::check_lister(&listing, actor, "delete it")?;
                    // bids, comments and watchlist rows go with it (ON DELETE CASCADE)
                    sqlx::query(queries::DELETE_LISTING)
                        .bind(id)
                        .execute(&mut **tx)
                        .await?;
                    Ok(())
                })
            })
            .await
    }

    async fn insert_bid(
        &self,
        listing_id: ListingId,
        bidder_id: UserId,
        value: Amount,
        now: DateTime<Utc>,
    ) -> Result<Bid, LedgerError> {
        self.db
            .transaction(|tx| {
                Box::pin(async move {
                    fetch_user(&mut **tx, bidder_id).await?;
                    let listing = lock_listing(&mut **tx, listing_id).await?;
                    let bids = fetch_listing_bids(&mut **tx, listing_id).await?;
                    debug!(
                        "{:<12} --> listing {} locked with {} bids",
                        "Postgres",
                        listing_id,
                        bids.len()
                    );
                    rules::check_bid(&listing, &bids, value)?;
                    let row = sqlx::query_as::<_, BidRow>(queries::INSERT_BID)
                        .bind(listing_id)
                        .bind(bidder_id)
                        .bind(value.cents())
                        .bind(now)
                        .fetch_one(&mut **tx)
                        .await?;
                    Ok(Bid::from(row))
                })
            })
            .await
    }

    async fn get_bid(&self, id: BidId) -> Result<Bid, LedgerError> {
        sqlx::query_as::<_, BidRow>(queries::GET_BID)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .map(Bid::from)
            .ok_or_else(|| LedgerError::not_found("Bid", id))
    }

    async fn listing_bids(&self, listing_id: ListingId) -> Result<Vec<Bid>, LedgerError> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_listing(&mut conn, listing_id).await?;
        fetch_listing_bids(&mut conn, listing_id).await
    }

    async fn user_bids(&self, user_id: UserId) -> Result<Vec<Bid>, LedgerError> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_user(&mut conn, user_id).await?;
        let rows = sqlx::query_as::<_, BidRow>(queries::GET_USER_BIDS)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows.into_iter().map(Bid::from).collect())
    }

    async fn insert_comment(
        &self,
        listing_id: ListingId,
        commenter_id: UserId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment, LedgerError> {
        let content = content.to_string();
        self.db
            .transaction(move |tx| {
                Box::pin(async move {
                    fetch_user(&mut **tx, commenter_id).await?;
                    fetch_listing(&mut **tx, listing_id).await?;
                    let row = sqlx::query_as::<_, CommentRow>(queries::INSERT_COMMENT)
                        .bind(listing_id)
                        .bind(commenter_id)
                        .bind(&content)
                        .bind(now)
                        .fetch_one(&mut **tx)
                        .await?;
                    Ok(Comment::from(row))
                })
            })
            .await
    }

    async fn listing_comments(&self, listing_id: ListingId) -> Result<Vec<Comment>, LedgerError> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_listing(&mut conn, listing_id).await?;
        let rows = sqlx::query_as::<_, CommentRow>(queries::GET_LISTING_COMMENTS)
            .bind(listing_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn watch(&self, user_id: UserId, listing_id: ListingId) -> Result<(), LedgerError> {
        self.db
            .transaction(|tx| {
                Box::pin(async move {
                    fetch_user(&mut **tx, user_id).await?;
                    fetch_listing(&mut **tx, listing_id).await?;
                    sqlx::query(queries::INSERT_WATCH)
                        .bind(user_id)
                        .bind(listing_id)
                        .execute(&mut **tx)
                        .await?;
                    Ok(())
                })
            })
            .await
    }

    async fn unwatch(&self, user_id: UserId, listing_id: ListingId) -> Result<(), LedgerError> {
        self.db
            .transaction(|tx| {
                Box::pin(async move {
                    fetch_user(&mut **tx, user_id).await?;
                    fetch_listing(&mut **tx, listing_id).await?;
                    sqlx::query(queries::DELETE_WATCH)
                        .bind(user_id)
                        .bind(listing_id)
                        .execute(&mut **tx)
                        .await?;
                    Ok(())
                })
            })
            .await
    }

    async fn is_watching(
        &self,
        user_id: UserId,
        listing_id: ListingId,
    ) -> Result<bool, LedgerError> {
        let watching = sqlx::query_scalar(queries::IS_WATCHING)
            .bind(user_id)
            .bind(listing_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(watching)
    }

    async fn watchlist(&self, user_id: UserId) -> Result<Vec<Listing>, LedgerError> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_user(&mut conn, user_id).await?;
        let rows = sqlx::query_as::<_, ListingRow>(queries::GET_WATCHLIST)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
        rows::into_listings(rows)
    }
}
// endregion: --- Postgres Ledger Store
