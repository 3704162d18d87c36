use axum::{
    extract::{Multipart, Path},
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::{
    blob::{BlobError, Bucket},
    catalog::users::{self, Profile},
    State,
};

use super::{read_upload, Principal, RouteError};

#[derive(serde::Serialize, Debug)]
pub(crate) struct Me {
    #[serde(flatten)]
    profile: Profile,
    role: super::Role,
}

pub(crate) async fn me(state: State, principal: Principal) -> Json<Me> {
    Json(Me {
        profile: users::profile(&state.blobs, &principal.user),
        role: principal.role,
    })
}

pub(crate) async fn delete_me(
    state: State,
    principal: Principal,
) -> Result<StatusCode, RouteError> {
    let mut conn = state.db.get().await?;

    users::delete_user(&mut conn, &state.blobs, &principal.user).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn update_photo(
    state: State,
    principal: Principal,
    multipart: Multipart,
) -> Result<Json<Profile>, RouteError> {
    let data = read_upload(multipart).await?;

    let mut conn = state.db.get().await?;
    let user = users::update_photo(&mut conn, &state.blobs, &principal.user, data).await?;

    Ok(Json(users::profile(&state.blobs, &user)))
}

pub(crate) async fn file(
    state: State,
    Path((bucket, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, RouteError> {
    let bucket = Bucket::from_name(&bucket).ok_or_else(|| BlobError::NotFound(name.clone()))?;
    let data = state.blobs.read_file(bucket, &name).await?;

    Ok(([(CONTENT_TYPE, "image/jpeg")], data))
}
