use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::{
    blob::{BlobStore, Bucket},
    catalog::aggregate::ReviewStats,
    error::{translate_store_error, CatalogError, Entity},
    models::{NewReview, Review},
    schema::{review, users},
};

pub const MAX_COMMENT_LENGTH: usize = 1000;

#[derive(serde::Deserialize, Debug, Clone)]
pub struct ReviewInput {
    pub rating: i32,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDetails {
    pub id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub user_name: String,
    pub user_photo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BookReviews {
    pub reviews: Vec<ReviewDetails>,
    #[serde(flatten)]
    pub stats: ReviewStats,
}

fn check_input(input: &ReviewInput) -> Result<(), CatalogError> {
    if !(1..=5).contains(&input.rating) {
        return Err(CatalogError::InvalidArgument("rating"));
    }
    if input
        .comment
        .as_ref()
        .is_some_and(|c| c.chars().count() > MAX_COMMENT_LENGTH)
    {
        return Err(CatalogError::InvalidArgument("comment"));
    }
    Ok(())
}

/// Adds the review of `user` on `book`. A user reviews a book at most once.
pub async fn create_review(
    conn: &mut AsyncPgConnection,
    user: Uuid,
    book: Uuid,
    input: &ReviewInput,
) -> Result<Review, CatalogError> {
    check_input(input)?;

    let created = diesel::insert_into(review::table)
        .values(NewReview {
            book,
            owner: user,
            rating: input.rating,
            comment: input.comment.as_deref(),
        })
        .returning(Review::as_returning())
        .get_result(conn)
        .await
        .map_err(|e| match translate_store_error(Entity::Review)(e) {
            CatalogError::NotFound(_) => CatalogError::NotFound(Entity::Book),
            e => e,
        })?;

    tracing::debug!(id = %created.id, %book, rating = created.rating, "created review");

    Ok(created)
}

pub async fn update_review(
    conn: &mut AsyncPgConnection,
    user: Uuid,
    book: Uuid,
    input: &ReviewInput,
) -> Result<Review, CatalogError> {
    check_input(input)?;

    diesel::update(
        review::table
            .filter(review::book.eq(book))
            .filter(review::owner.eq(user)),
    )
    .set((
        review::rating.eq(input.rating),
        review::comment.eq(input.comment.as_deref()),
        review::updated_at.eq(Utc::now()),
    ))
    .returning(Review::as_returning())
    .get_result(conn)
    .await
    .map_err(translate_store_error(Entity::Review))
}

pub async fn delete_review(
    conn: &mut AsyncPgConnection,
    user: Uuid,
    book: Uuid,
) -> Result<(), CatalogError> {
    let deleted = diesel::delete(
        review::table
            .filter(review::book.eq(book))
            .filter(review::owner.eq(user)),
    )
    .execute(conn)
    .await?;

    match deleted {
        0 => Err(CatalogError::NotFound(Entity::Review)),
        _ => Ok(()),
    }
}

pub async fn find_my_review(
    conn: &mut AsyncPgConnection,
    user: Uuid,
    book: Uuid,
) -> Result<Review, CatalogError> {
    review::table
        .filter(review::book.eq(book))
        .filter(review::owner.eq(user))
        .select(Review::as_select())
        .get_result(conn)
        .await
        .map_err(translate_store_error(Entity::Review))
}

/// All reviews of a book, newest first, with the statistics computed over
/// the same rows.
pub async fn find_reviews(
    conn: &mut AsyncPgConnection,
    blobs: &dyn BlobStore,
    book: Uuid,
) -> Result<BookReviews, CatalogError> {
    let rows: Vec<(Review, String, Option<String>)> = review::table
        .inner_join(users::table)
        .filter(review::book.eq(book))
        .select((Review::as_select(), users::name, users::photo))
        .order((review::created_at.desc(), review::id.asc()))
        .load(conn)
        .await?;

    let stats = ReviewStats::from_ratings(rows.iter().map(|(r, _, _)| r.rating));

    let reviews = rows
        .into_iter()
        .map(|(review, user_name, photo)| ReviewDetails {
            id: review.id,
            rating: review.rating,
            comment: review.comment,
            user_name,
            user_photo: photo.map(|p| blobs.file_url(Bucket::Photos, &p)),
            created_at: review.created_at,
            updated_at: review.updated_at,
        })
        .collect();

    Ok(BookReviews { reviews, stats })
}
