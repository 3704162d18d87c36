use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    catalog::{
        books::{self, BookDetails, BookPatch, CreateBook, Include},
        query::{query_books, BookQuery},
    },
    pagination::Paginated,
    State,
};

use super::{Admin, Principal, RouteError};

pub(crate) async fn list_books(
    state: State,
    query: Query<BookQuery>,
) -> Result<Json<Paginated<BookDetails>>, RouteError> {
    let mut conn = state.db.get().await?;

    Ok(Json(query_books(&mut conn, &query).await?))
}

/// Books submitted by administrators are verified right away.
pub(crate) async fn add_book(
    state: State,
    principal: Principal,
    Json(mut data): Json<CreateBook>,
) -> Result<(StatusCode, Json<BookDetails>), RouteError> {
    let mut conn = state.db.get().await?;

    data.book.verified = principal.is_admin();
    let created = books::add_book(&mut conn, &data, state.palette.as_ref()).await?;

    tracing::info!(id = %created.id, by = principal.user.name, "book submitted");

    Ok((StatusCode::CREATED, Json(created)))
}

pub(crate) async fn get_book(
    state: State,
    id: Path<Uuid>,
) -> Result<Json<BookDetails>, RouteError> {
    let mut conn = state.db.get().await?;

    Ok(Json(books::get_book(&mut conn, *id, Include::ALL).await?))
}

pub(crate) async fn update_book(
    state: State,
    Admin(admin): Admin,
    id: Path<Uuid>,
    Json(patch): Json<BookPatch>,
) -> Result<Json<BookDetails>, RouteError> {
    let mut conn = state.db.get().await?;

    let updated = books::update_book(&mut conn, *id, &patch).await?;

    tracing::info!(id = %updated.id, by = admin.user.name, "book updated");

    Ok(Json(updated))
}

pub(crate) async fn delete_book(
    state: State,
    Admin(admin): Admin,
    id: Path<Uuid>,
) -> Result<StatusCode, RouteError> {
    let mut conn = state.db.get().await?;

    books::delete_book(&mut conn, *id).await?;

    tracing::info!(id = %id.0, by = admin.user.name, "book deleted");

    Ok(StatusCode::NO_CONTENT)
}
