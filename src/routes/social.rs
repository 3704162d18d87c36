use axum::{extract::Path, http::StatusCode, Json};
use uuid::Uuid;

use crate::{
    catalog::{
        aggregate::{self, ReviewStats, VoteTally},
        quotes::{self, QuoteDetails},
        reviews::{self, BookReviews, ReviewInput},
        shelves::{self, ShelvedBook},
        votes,
    },
    models::{Review, ShelfStatus, VoteKind},
    State,
};

use super::{MaybePrincipal, Principal, RouteError};

pub(crate) async fn book_reviews(
    state: State,
    id: Path<Uuid>,
) -> Result<Json<BookReviews>, RouteError> {
    let mut conn = state.db.get().await?;

    Ok(Json(reviews::find_reviews(&mut conn, &state.blobs, *id).await?))
}

pub(crate) async fn review_stats(
    state: State,
    id: Path<Uuid>,
) -> Result<Json<ReviewStats>, RouteError> {
    let mut conn = state.db.get().await?;

    Ok(Json(aggregate::aggregate_reviews(&mut conn, *id).await?))
}

#[derive(serde::Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReviewView {
    id: Uuid,
    book: Uuid,
    rating: i32,
    comment: Option<String>,
}

impl From<Review> for ReviewView {
    fn from(r: Review) -> Self {
        Self {
            id: r.id,
            book: r.book,
            rating: r.rating,
            comment: r.comment,
        }
    }
}

pub(crate) async fn my_review(
    state: State,
    principal: Principal,
    id: Path<Uuid>,
) -> Result<Json<ReviewView>, RouteError> {
    let mut conn = state.db.get().await?;

    let review = reviews::find_my_review(&mut conn, principal.user.id, *id).await?;

    Ok(Json(review.into()))
}

pub(crate) async fn create_review(
    state: State,
    principal: Principal,
    id: Path<Uuid>,
    Json(input): Json<ReviewInput>,
) -> Result<(StatusCode, Json<ReviewView>), RouteError> {
    let mut conn = state.db.get().await?;

    let review = reviews::create_review(&mut conn, principal.user.id, *id, &input).await?;

    Ok((StatusCode::CREATED, Json(review.into())))
}

pub(crate) async fn update_review(
    state: State,
    principal: Principal,
    id: Path<Uuid>,
    Json(input): Json<ReviewInput>,
) -> Result<Json<ReviewView>, RouteError> {
    let mut conn = state.db.get().await?;

    let review = reviews::update_review(&mut conn, principal.user.id, *id, &input).await?;

    Ok(Json(review.into()))
}

pub(crate) async fn delete_review(
    state: State,
    principal: Principal,
    id: Path<Uuid>,
) -> Result<StatusCode, RouteError> {
    let mut conn = state.db.get().await?;

    reviews::delete_review(&mut conn, principal.user.id, *id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn book_quotes(
    state: State,
    viewer: MaybePrincipal,
    id: Path<Uuid>,
) -> Result<Json<Vec<QuoteDetails>>, RouteError> {
    let mut conn = state.db.get().await?;

    Ok(Json(quotes::book_quotes(&mut conn, *id, viewer.user_id()).await?))
}

#[derive(serde::Deserialize, Debug)]
pub(crate) struct QuoteInput {
    text: String,
}

#[derive(serde::Serialize, Debug)]
pub(crate) struct Created {
    id: Uuid,
}

pub(crate) async fn add_quote(
    state: State,
    principal: Principal,
    id: Path<Uuid>,
    Json(input): Json<QuoteInput>,
) -> Result<(StatusCode, Json<Created>), RouteError> {
    let mut conn = state.db.get().await?;

    let quote = quotes::add_quote(&mut conn, principal.user.id, *id, &input.text).await?;

    Ok((StatusCode::CREATED, Json(Created { id: quote.id })))
}

pub(crate) async fn delete_quote(
    state: State,
    principal: Principal,
    id: Path<Uuid>,
) -> Result<StatusCode, RouteError> {
    let mut conn = state.db.get().await?;

    quotes::delete_quote(&mut conn, principal.user.id, *id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// `{"vote": null}` withdraws the vote. Answers with the updated tally.
#[derive(serde::Deserialize, Debug)]
pub(crate) struct VoteInput {
    #[serde(default)]
    vote: Option<VoteKind>,
}

pub(crate) async fn vote(
    state: State,
    principal: Principal,
    id: Path<Uuid>,
    Json(input): Json<VoteInput>,
) -> Result<Json<VoteTally>, RouteError> {
    let mut conn = state.db.get().await?;

    votes::set_vote(&mut conn, principal.user.id, *id, input.vote).await?;

    Ok(Json(
        aggregate::aggregate_votes(&mut conn, *id, Some(principal.user.id)).await?,
    ))
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub(crate) struct ShelfInput {
    status: String,
}

#[derive(serde::Serialize, Debug)]
pub(crate) struct ShelfView {
    status: Option<ShelfStatus>,
}

pub(crate) async fn shelf_status(
    state: State,
    principal: Principal,
    id: Path<Uuid>,
) -> Result<Json<ShelfView>, RouteError> {
    let mut conn = state.db.get().await?;

    let status = shelves::shelf_status(&mut conn, principal.user.id, *id).await?;

    Ok(Json(ShelfView { status }))
}

pub(crate) async fn set_shelf_status(
    state: State,
    principal: Principal,
    id: Path<Uuid>,
    Json(input): Json<ShelfInput>,
) -> Result<Json<ShelfView>, RouteError> {
    let mut conn = state.db.get().await?;

    let status = shelves::set_shelf_status(&mut conn, principal.user.id, *id, &input.status).await?;

    Ok(Json(ShelfView {
        status: Some(status),
    }))
}

pub(crate) async fn clear_shelf_status(
    state: State,
    principal: Principal,
    id: Path<Uuid>,
) -> Result<StatusCode, RouteError> {
    let mut conn = state.db.get().await?;

    shelves::clear_shelf_status(&mut conn, principal.user.id, *id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn shelf(
    state: State,
    principal: Principal,
) -> Result<Json<Vec<ShelvedBook>>, RouteError> {
    let mut conn = state.db.get().await?;

    Ok(Json(shelves::shelf_books(&mut conn, principal.user.id).await?))
}
