use axum::{
    extract::{Multipart, Path, Query},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    blob::{BlobStore, Bucket},
    catalog::{
        celebrities::{self, CelebrityQuery, CelebritySummary, CelebrityWithBooks, NewCelebrityInput},
        taxonomy,
    },
    models::Industry,
    pagination::Paginated,
    State,
};

use super::{read_upload, Admin, RouteError};

pub(crate) async fn list_celebrities(
    state: State,
    query: Query<CelebrityQuery>,
) -> Result<Json<Paginated<CelebritySummary>>, RouteError> {
    let mut conn = state.db.get().await?;

    Ok(Json(
        celebrities::query_celebrities(&mut conn, &state.blobs, &query).await?,
    ))
}

pub(crate) async fn get_celebrity(
    state: State,
    id: Path<Uuid>,
) -> Result<Json<CelebrityWithBooks>, RouteError> {
    let mut conn = state.db.get().await?;

    Ok(Json(
        celebrities::find_celebrity(&mut conn, &state.blobs, *id).await?,
    ))
}

#[derive(serde::Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadedPhoto {
    file_name: String,
    url: String,
}

/// Stores a portrait to be referenced when creating a celebrity.
pub(crate) async fn upload_photo(
    state: State,
    Admin(admin): Admin,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadedPhoto>), RouteError> {
    let data = read_upload(multipart).await?;
    let file_name = state.blobs.upload_file(Bucket::Celebrities, data).await?;
    let url = state.blobs.file_url(Bucket::Celebrities, &file_name);

    tracing::info!(%file_name, by = admin.user.name, "celebrity photo uploaded");

    Ok((StatusCode::CREATED, Json(UploadedPhoto { file_name, url })))
}

pub(crate) async fn create_celebrity(
    state: State,
    Admin(admin): Admin,
    Json(input): Json<NewCelebrityInput>,
) -> Result<(StatusCode, Json<CelebrityWithBooks>), RouteError> {
    let mut conn = state.db.get().await?;

    let created = celebrities::create_celebrity(&mut conn, &state.blobs, &input).await?;

    tracing::info!(id = %created.summary.id, by = admin.user.name, "celebrity created");

    Ok((StatusCode::CREATED, Json(created)))
}

pub(crate) async fn genres(state: State) -> Result<Json<Vec<String>>, RouteError> {
    let mut conn = state.db.get().await?;

    Ok(Json(taxonomy::list_genres(&mut conn).await?))
}

pub(crate) async fn industries(state: State) -> Result<Json<Vec<Industry>>, RouteError> {
    let mut conn = state.db.get().await?;

    Ok(Json(taxonomy::list_industries(&mut conn).await?))
}
