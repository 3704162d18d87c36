use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::{
    blob::{BlobError, BlobStore, Bucket},
    error::{translate_store_error, CatalogError, Entity},
    models::{NewUser, User},
    schema::users,
};

#[derive(serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub photo: Option<String>,
}

pub fn photo_url(blobs: &dyn BlobStore, user: &User) -> Option<String> {
    user.photo
        .as_deref()
        .map(|p| blobs.file_url(Bucket::Photos, p))
}

pub fn profile(blobs: &dyn BlobStore, user: &User) -> Profile {
    Profile {
        id: user.id,
        name: user.name.clone(),
        photo: photo_url(blobs, user),
    }
}

/// Returns the user called `name`, creating it on first sight.
pub async fn find_or_create_user(
    conn: &mut AsyncPgConnection,
    name: &str,
) -> Result<User, CatalogError> {
    if name.is_empty() || name.contains('\0') {
        return Err(CatalogError::InvalidArgument("userName"));
    }

    diesel::insert_into(users::table)
        .values(&NewUser { name })
        .on_conflict_do_nothing()
        .execute(conn)
        .await?;

    Ok(users::table
        .filter(users::name.eq(name))
        .select(User::as_select())
        .first(conn)
        .await?)
}

#[derive(thiserror::Error, Debug)]
pub enum PhotoError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Blob(#[from] BlobError),
}

/// Stores a new profile picture for `user` and drops the previous one.
pub async fn update_photo(
    conn: &mut AsyncPgConnection,
    blobs: &dyn BlobStore,
    user: &User,
    data: Vec<u8>,
) -> Result<User, PhotoError> {
    let file_name = blobs.upload_file(Bucket::Photos, data).await?;

    let updated = diesel::update(users::table.find(user.id))
        .set(users::photo.eq(&file_name))
        .returning(User::as_returning())
        .get_result(conn)
        .await
        .map_err(translate_store_error(Entity::User));

    let updated = match updated {
        Ok(u) => u,
        Err(e) => {
            blobs.delete_file(Bucket::Photos, &file_name).await?;
            return Err(e.into());
        }
    };

    if let Some(previous) = &user.photo {
        if let Err(e) = blobs.delete_file(Bucket::Photos, previous).await {
            tracing::warn!("could not remove previous photo {previous}: {e}");
        }
    }

    Ok(updated)
}

/// Removes the account of `user` with everything it owns: reviews, quotes,
/// votes, shelf entries and reading lists.
pub async fn delete_user(
    conn: &mut AsyncPgConnection,
    blobs: &dyn BlobStore,
    user: &User,
) -> Result<(), CatalogError> {
    let deleted = diesel::delete(users::table.find(user.id))
        .execute(conn)
        .await?;

    if deleted == 0 {
        return Err(CatalogError::NotFound(Entity::User));
    }

    if let Some(photo) = &user.photo {
        if let Err(e) = blobs.delete_file(Bucket::Photos, photo).await {
            tracing::warn!("could not remove photo {photo} of deleted user: {e}");
        }
    }

    tracing::info!(id = %user.id, name = user.name, "deleted user");

    Ok(())
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use crate::{
        catalog::{
            quotes::add_quote,
            reading_lists::{create_reading_list, NewList},
            reviews::{create_review, ReviewInput},
            shelves::set_shelf_status,
            testing,
            votes::set_vote,
        },
        models::VoteKind,
        schema::{quote, quotevote, readinglist, review, shelfitem},
    };

    fn tiny_png() -> Vec<u8> {
        let mut png = Cursor::new(Vec::new());
        image::RgbImage::new(2, 2)
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();
        png.into_inner()
    }

    #[tokio::test]
    async fn users_are_created_once() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };

        let first = find_or_create_user(&mut conn, "reader").await.unwrap();
        let again = find_or_create_user(&mut conn, "reader").await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(first.photo, None);

        let err = find_or_create_user(&mut conn, "").await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument("userName")));
    }

    #[tokio::test]
    async fn photo_replaces_previous() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };
        let blobs = testing::blobs().await;
        let user = find_or_create_user(&mut conn, "portrait").await.unwrap();

        let png = tiny_png();

        let user = update_photo(&mut conn, &blobs, &user, png.clone())
            .await
            .unwrap();
        let first = user.photo.clone().unwrap();

        let user = update_photo(&mut conn, &blobs, &user, png).await.unwrap();
        let second = user.photo.clone().unwrap();
        assert_ne!(first, second);

        let url = photo_url(&blobs, &user).unwrap();
        assert!(url.ends_with(&format!("/photos/{second}")));
        assert_eq!(profile(&blobs, &user).photo, Some(url));
    }

    #[tokio::test]
    async fn deleting_a_user_removes_what_they_own() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };
        let blobs = testing::blobs().await;
        let book = testing::book(&mut conn, "Bel-Ami").await;
        let other = testing::user(&mut conn, "stays").await;
        let user = find_or_create_user(&mut conn, "leaving").await.unwrap();
        let user = update_photo(&mut conn, &blobs, &user, tiny_png())
            .await
            .unwrap();
        let photo = user.photo.clone().unwrap();

        set_shelf_status(&mut conn, user.id, book, "READING")
            .await
            .unwrap();
        create_review(
            &mut conn,
            user.id,
            book,
            &ReviewInput {
                rating: 4,
                comment: None,
            },
        )
        .await
        .unwrap();
        let own = add_quote(&mut conn, user.id, book, "Mine").await.unwrap();
        let kept = add_quote(&mut conn, other, book, "Theirs").await.unwrap();
        set_vote(&mut conn, user.id, kept.id, Some(VoteKind::Up))
            .await
            .unwrap();
        set_vote(&mut conn, other, own.id, Some(VoteKind::Down))
            .await
            .unwrap();
        create_reading_list(
            &mut conn,
            user.id,
            &NewList {
                title: "Maupassant".into(),
                description: String::new(),
                tags: Vec::new(),
                is_public: true,
            },
        )
        .await
        .unwrap();

        delete_user(&mut conn, &blobs, &user).await.unwrap();

        let remaining: (i64, i64, i64, i64, i64) = (
            shelfitem::table
                .filter(shelfitem::owner.eq(user.id))
                .count()
                .get_result(&mut *conn)
                .await
                .unwrap(),
            review::table
                .filter(review::owner.eq(user.id))
                .count()
                .get_result(&mut *conn)
                .await
                .unwrap(),
            quote::table
                .filter(quote::owner.eq(user.id))
                .count()
                .get_result(&mut *conn)
                .await
                .unwrap(),
            quotevote::table
                .filter(quotevote::voter.eq(user.id).or(quotevote::quote.eq(own.id)))
                .count()
                .get_result(&mut *conn)
                .await
                .unwrap(),
            readinglist::table
                .filter(readinglist::owner.eq(user.id))
                .count()
                .get_result(&mut *conn)
                .await
                .unwrap(),
        );
        assert_eq!(remaining, (0, 0, 0, 0, 0));

        let kept: Option<Uuid> = quote::table
            .find(kept.id)
            .select(quote::id)
            .get_result(&mut *conn)
            .await
            .optional()
            .unwrap();
        assert!(kept.is_some());

        assert!(matches!(
            blobs.read_file(Bucket::Photos, &photo).await,
            Err(BlobError::NotFound(_))
        ));

        let err = delete_user(&mut conn, &blobs, &user).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(Entity::User)));
    }
}
