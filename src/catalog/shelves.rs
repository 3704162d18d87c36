use chrono::{DateTime, Utc};
use diesel::{pg::upsert::excluded, prelude::*};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::{
    catalog::books::{load_books, BookDetails, Include},
    error::{translate_store_error, CatalogError, Entity},
    models::{Book, NewShelfItem, ShelfStatus},
    schema::{book, shelfitem},
};

#[derive(serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ShelvedBook {
    pub book: BookDetails,
    pub status: ShelfStatus,
    pub updated_at: DateTime<Utc>,
}

/// Puts `book` on the shelf of `user` with `status`, replacing any previous
/// status. Setting the same status twice leaves a single entry.
pub async fn set_shelf_status(
    conn: &mut AsyncPgConnection,
    user: Uuid,
    book: Uuid,
    status: &str,
) -> Result<ShelfStatus, CatalogError> {
    let status: ShelfStatus = status
        .parse()
        .map_err(|_| CatalogError::InvalidArgument("shelfStatus"))?;

    diesel::insert_into(shelfitem::table)
        .values(NewShelfItem {
            book,
            owner: user,
            status,
        })
        .on_conflict((shelfitem::book, shelfitem::owner))
        .do_update()
        .set((
            shelfitem::status.eq(excluded(shelfitem::status)),
            shelfitem::updated_at.eq(Utc::now()),
        ))
        .execute(conn)
        .await
        .map_err(translate_store_error(Entity::Book))?;

    tracing::debug!(%user, %book, %status, "set shelf status");

    Ok(status)
}

/// Removes `book` from the shelf of `user`. Does nothing if it was not shelved.
pub async fn clear_shelf_status(
    conn: &mut AsyncPgConnection,
    user: Uuid,
    book: Uuid,
) -> Result<(), CatalogError> {
    let removed = diesel::delete(
        shelfitem::table
            .filter(shelfitem::owner.eq(user))
            .filter(shelfitem::book.eq(book)),
    )
    .execute(conn)
    .await?;

    tracing::debug!(%user, %book, removed, "cleared shelf status");

    Ok(())
}

pub async fn shelf_status(
    conn: &mut AsyncPgConnection,
    user: Uuid,
    book: Uuid,
) -> Result<Option<ShelfStatus>, CatalogError> {
    Ok(shelfitem::table
        .filter(shelfitem::owner.eq(user))
        .filter(shelfitem::book.eq(book))
        .select(shelfitem::status)
        .first(conn)
        .await
        .optional()?)
}

/// Every shelved book of `user`, most recently changed first.
pub async fn shelf_books(
    conn: &mut AsyncPgConnection,
    user: Uuid,
) -> Result<Vec<ShelvedBook>, CatalogError> {
    let rows: Vec<(Book, ShelfStatus, DateTime<Utc>)> = shelfitem::table
        .inner_join(book::table)
        .filter(shelfitem::owner.eq(user))
        .select((Book::as_select(), shelfitem::status, shelfitem::updated_at))
        .order((shelfitem::updated_at.desc(), book::id.asc()))
        .load(conn)
        .await?;

    let (books, states): (Vec<_>, Vec<_>) = rows
        .into_iter()
        .map(|(book, status, updated_at)| (book, (status, updated_at)))
        .unzip();

    let details = load_books(conn, books, Include::ALL).await?;

    Ok(details
        .into_iter()
        .zip(states)
        .map(|(book, (status, updated_at))| ShelvedBook {
            book,
            status,
            updated_at,
        })
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::catalog::testing;

    #[tokio::test]
    async fn setting_twice_keeps_one_entry() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };
        let user = testing::user(&mut conn, "shelver").await;
        let book = testing::book(&mut conn, "Germinal").await;

        set_shelf_status(&mut conn, user, book, "READ").await.unwrap();
        set_shelf_status(&mut conn, user, book, "READ").await.unwrap();

        let count: i64 = shelfitem::table
            .filter(shelfitem::owner.eq(user))
            .count()
            .get_result(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 1);

        set_shelf_status(&mut conn, user, book, "READING")
            .await
            .unwrap();
        assert_eq!(
            shelf_status(&mut conn, user, book).await.unwrap(),
            Some(ShelfStatus::Reading)
        );

        let shelved = shelf_books(&mut conn, user).await.unwrap();
        assert_eq!(shelved.len(), 1);
        assert_eq!(shelved[0].book.title, "Germinal");
        assert_eq!(shelved[0].status, ShelfStatus::Reading);
    }

    #[tokio::test]
    async fn invalid_status_and_unknown_book() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };
        let user = testing::user(&mut conn, "shelver").await;
        let book = testing::book(&mut conn, "Nana").await;

        let err = set_shelf_status(&mut conn, user, book, "FINISHED")
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument("shelfStatus")));

        let err = set_shelf_status(&mut conn, user, Uuid::new_v4(), "READ")
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(Entity::Book)));
    }

    #[tokio::test]
    async fn clearing_is_idempotent() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };
        let user = testing::user(&mut conn, "shelver").await;
        let book = testing::book(&mut conn, "L'Assommoir").await;

        clear_shelf_status(&mut conn, user, book).await.unwrap();

        set_shelf_status(&mut conn, user, book, "WANT_TO_READ")
            .await
            .unwrap();
        clear_shelf_status(&mut conn, user, book).await.unwrap();
        clear_shelf_status(&mut conn, user, book).await.unwrap();

        assert_eq!(shelf_status(&mut conn, user, book).await.unwrap(), None);
    }

    #[tokio::test]
    async fn racing_shelf_updates_converge_on_one_entry() {
        let Some(pool) = testing::pool().await else {
            return;
        };

        let tag = Uuid::new_v4();
        let (user, book) = {
            let mut conn = pool.get().await.unwrap();
            (
                testing::user(&mut conn, &format!("shelver-{tag}")).await,
                testing::book(&mut conn, &format!("Shelf race {tag}")).await,
            )
        };

        let statuses = ["WANT_TO_READ", "READING", "READ"];
        let mut tasks = Vec::new();
        for i in 0..16 {
            let pool = pool.clone();
            let status = statuses[i % statuses.len()];
            tasks.push(tokio::spawn(async move {
                let mut conn = pool.get().await.unwrap();
                set_shelf_status(&mut conn, user, book, status).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut conn = pool.get().await.unwrap();
        let count: i64 = shelfitem::table
            .filter(shelfitem::owner.eq(user))
            .filter(shelfitem::book.eq(book))
            .count()
            .get_result(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 1);

        crate::catalog::books::delete_book(&mut conn, book).await.unwrap();
        diesel::delete(crate::schema::users::table.find(user))
            .execute(&mut *conn)
            .await
            .unwrap();
    }
}
