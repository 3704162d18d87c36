use std::sync::Arc;

use axum::{
    async_trait,
    extract::{multipart::MultipartError, FromRequestParts, Multipart, Request},
    http::{header::ACCEPT_LANGUAGE, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use diesel_async::pooled_connection::deadpool::PoolError;

use crate::{
    blob::BlobError,
    catalog::users::{find_or_create_user, PhotoError},
    error::CatalogError,
    i18n::primary_locale,
    models::User,
    AppState, State,
};

mod books;
mod celebrities;
mod reading_lists;
mod social;
mod users;

#[derive(thiserror::Error, Debug)]
pub(crate) enum RouteError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("Blob storage error")]
    Blob(#[from] BlobError),
    #[error("Could not get a connection from the pool")]
    PoolError(#[from] PoolError),
    #[error("Could not parse user name")]
    InvalidUser(#[from] axum::http::header::ToStrError),
    #[error("Invalid multipart upload")]
    Multipart(#[from] MultipartError),
    #[error("Upload is missing its file")]
    MissingFile,
    #[error("Reserved to administrators")]
    NotAdmin,
}

impl From<PhotoError> for RouteError {
    fn from(e: PhotoError) -> Self {
        match e {
            PhotoError::Catalog(e) => e.into(),
            PhotoError::Blob(e) => e.into(),
        }
    }
}

impl RouteError {
    fn status(&self) -> StatusCode {
        match self {
            RouteError::Catalog(e) => match e {
                CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
                CatalogError::Conflict(_) => StatusCode::CONFLICT,
                CatalogError::Forbidden(_) => StatusCode::FORBIDDEN,
                CatalogError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                CatalogError::Unauthorized => StatusCode::UNAUTHORIZED,
                CatalogError::Db(_) | CatalogError::Pool(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            RouteError::Blob(BlobError::NotAnImage(_)) => StatusCode::BAD_REQUEST,
            RouteError::Blob(BlobError::NotFound(_) | BlobError::InvalidName(_)) => {
                StatusCode::NOT_FOUND
            }
            RouteError::Blob(BlobError::Io(_)) | RouteError::PoolError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RouteError::InvalidUser(_) | RouteError::Multipart(_) | RouteError::MissingFile => {
                StatusCode::BAD_REQUEST
            }
            RouteError::NotAdmin => StatusCode::FORBIDDEN,
        }
    }

    fn key(&self) -> String {
        match self {
            RouteError::Catalog(e) => e.key(),
            RouteError::Blob(BlobError::NotAnImage(_)) => "errors.invalid.image".into(),
            RouteError::Blob(BlobError::NotFound(_) | BlobError::InvalidName(_)) => {
                "errors.files.notFound".into()
            }
            RouteError::Blob(BlobError::Io(_)) | RouteError::PoolError(_) => {
                "errors.somethingWentWrong".into()
            }
            RouteError::InvalidUser(_) => "errors.invalid.userName".into(),
            RouteError::Multipart(_) | RouteError::MissingFile => "errors.invalid.upload".into(),
            RouteError::NotAdmin => "errors.auth.notAdmin".into(),
        }
    }
}

/// Marks a response as an error to be localized by [`localize_errors`].
#[derive(Clone, Debug)]
pub(crate) struct ErrorKey(pub String);

#[derive(serde::Serialize, Debug)]
pub(crate) struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl IntoResponse for RouteError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        match status {
            StatusCode::INTERNAL_SERVER_ERROR => tracing::error!("route error: {self} ({self:#?})"),
            _ => tracing::debug!("request rejected: {self}"),
        }

        let key = self.key();
        let body = ErrorBody {
            error: key.clone(),
            message: key.clone(),
        };

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(ErrorKey(key));
        response
    }
}

/// Replaces the message of error responses with its translation in the
/// language requested by the client.
pub(crate) async fn localize_errors(state: State, request: Request, next: Next) -> Response {
    let locale = primary_locale(
        request
            .headers()
            .get(ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok()),
    );

    let response = next.run(request).await;

    let Some(ErrorKey(key)) = response.extensions().get::<ErrorKey>().cloned() else {
        return response;
    };

    let message = state
        .translator
        .translate(&key, &locale)
        .unwrap_or_else(|| key.clone());

    (response.status(), Json(ErrorBody { error: key, message })).into_response()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    User,
    Admin,
}

impl Role {
    fn of(name: &str, admins: &[String]) -> Self {
        match admins.iter().any(|a| a == name) {
            true => Role::Admin,
            false => Role::User,
        }
    }
}

/// The authenticated caller, as reported by the reverse proxy.
#[derive(Debug, Clone)]
pub(crate) struct Principal {
    pub user: User,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A principal when the request carries one.
pub(crate) struct MaybePrincipal(pub Option<Principal>);

impl MaybePrincipal {
    pub fn user_id(&self) -> Option<uuid::Uuid> {
        self.0.as_ref().map(|p| p.user.id)
    }
}

/// A principal with the admin role.
pub(crate) struct Admin(pub Principal);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybePrincipal {
    type Rejection = RouteError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let name = match parts.headers.get(&state.config.auth.header) {
            Some(user) => user.to_str()?,
            None => match state.config.debug.assume_user.as_deref() {
                Some(user) => user,
                None => return Ok(MaybePrincipal(None)),
            },
        };

        let mut conn = state.db.get().await?;
        let user = find_or_create_user(&mut conn, name).await?;
        let role = Role::of(&user.name, &state.config.auth.admin);

        Ok(MaybePrincipal(Some(Principal { user, role })))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Principal {
    type Rejection = RouteError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        MaybePrincipal::from_request_parts(parts, state)
            .await?
            .0
            .ok_or(RouteError::Catalog(CatalogError::Unauthorized))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Admin {
    type Rejection = RouteError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        match principal.is_admin() {
            true => Ok(Admin(principal)),
            false => Err(RouteError::NotAdmin),
        }
    }
}

/// Returns the content of the first file field of a multipart upload.
pub(crate) async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, RouteError> {
    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_some() || field.name() == Some("file") {
            return Ok(field.bytes().await?.to_vec());
        }
    }

    Err(RouteError::MissingFile)
}

pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/books", get(books::list_books).post(books::add_book))
        .route(
            "/books/:id",
            get(books::get_book)
                .patch(books::update_book)
                .delete(books::delete_book),
        )
        .route(
            "/books/:id/reviews",
            get(social::book_reviews)
                .post(social::create_review)
                .put(social::update_review)
                .delete(social::delete_review),
        )
        .route("/books/:id/reviews/mine", get(social::my_review))
        .route("/books/:id/reviews/stats", get(social::review_stats))
        .route(
            "/books/:id/quotes",
            get(social::book_quotes).post(social::add_quote),
        )
        .route("/quotes/:id", axum::routing::delete(social::delete_quote))
        .route("/quotes/:id/vote", put(social::vote))
        .route(
            "/books/:id/shelf",
            get(social::shelf_status)
                .put(social::set_shelf_status)
                .delete(social::clear_shelf_status),
        )
        .route("/shelf", get(social::shelf))
        .route(
            "/reading-lists",
            get(reading_lists::public_lists).post(reading_lists::create_list),
        )
        .route("/reading-lists/mine", get(reading_lists::my_lists))
        .route(
            "/reading-lists/:id",
            get(reading_lists::get_list)
                .patch(reading_lists::update_list)
                .delete(reading_lists::delete_list),
        )
        .route(
            "/reading-lists/:id/books/:book",
            post(reading_lists::toggle_book),
        )
        .route(
            "/celebrities",
            get(celebrities::list_celebrities).post(celebrities::create_celebrity),
        )
        .route("/celebrities/photo", post(celebrities::upload_photo))
        .route("/celebrities/:id", get(celebrities::get_celebrity))
        .route("/genres", get(celebrities::genres))
        .route("/industries", get(celebrities::industries))
        .route("/me", get(users::me).delete(users::delete_me))
        .route("/me/photo", put(users::update_photo))
        .route("/files/:bucket/:name", get(users::file))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            localize_errors,
        ))
        .with_state(state)
}
