use axum::{extract::Path, http::StatusCode, Json};
use uuid::Uuid;

use crate::{
    catalog::reading_lists::{self, ListDetails, ListPatch, ListSummary, NewList},
    State,
};

use super::{MaybePrincipal, Principal, RouteError};

pub(crate) async fn public_lists(state: State) -> Result<Json<Vec<ListSummary>>, RouteError> {
    let mut conn = state.db.get().await?;

    Ok(Json(
        reading_lists::public_reading_lists(&mut conn, &state.blobs).await?,
    ))
}

pub(crate) async fn my_lists(
    state: State,
    principal: Principal,
) -> Result<Json<Vec<ListSummary>>, RouteError> {
    let mut conn = state.db.get().await?;

    let lists =
        reading_lists::owned_reading_lists(&mut conn, &state.blobs, principal.user.id).await?;

    Ok(Json(lists))
}

pub(crate) async fn get_list(
    state: State,
    viewer: MaybePrincipal,
    id: Path<Uuid>,
) -> Result<Json<ListDetails>, RouteError> {
    let mut conn = state.db.get().await?;

    let list =
        reading_lists::find_reading_list(&mut conn, &state.blobs, *id, viewer.user_id()).await?;

    Ok(Json(list))
}

pub(crate) async fn create_list(
    state: State,
    principal: Principal,
    Json(new): Json<NewList>,
) -> Result<(StatusCode, Json<ListDetails>), RouteError> {
    let mut conn = state.db.get().await?;

    let created = reading_lists::create_reading_list(&mut conn, principal.user.id, &new).await?;
    let details = reading_lists::find_reading_list(
        &mut conn,
        &state.blobs,
        created.id,
        Some(principal.user.id),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(details)))
}

pub(crate) async fn update_list(
    state: State,
    principal: Principal,
    id: Path<Uuid>,
    Json(patch): Json<ListPatch>,
) -> Result<Json<ListDetails>, RouteError> {
    let mut conn = state.db.get().await?;

    reading_lists::update_reading_list(&mut conn, principal.user.id, *id, &patch).await?;

    let details =
        reading_lists::find_reading_list(&mut conn, &state.blobs, *id, Some(principal.user.id))
            .await?;

    Ok(Json(details))
}

pub(crate) async fn delete_list(
    state: State,
    principal: Principal,
    id: Path<Uuid>,
) -> Result<StatusCode, RouteError> {
    let mut conn = state.db.get().await?;

    reading_lists::delete_reading_list(&mut conn, principal.user.id, *id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(serde::Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Membership {
    is_member: bool,
}

pub(crate) async fn toggle_book(
    state: State,
    principal: Principal,
    Path((list, book)): Path<(Uuid, Uuid)>,
) -> Result<Json<Membership>, RouteError> {
    let mut conn = state.db.get().await?;

    let is_member =
        reading_lists::toggle_book_in_list(&mut conn, list, book, principal.user.id).await?;

    Ok(Json(Membership { is_member }))
}
