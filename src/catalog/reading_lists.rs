use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::{
    blob::BlobStore,
    catalog::{
        books::{load_books, BookDetails, Include},
        users::photo_url,
    },
    error::{translate_store_error, CatalogError, Entity},
    models::{Book, NewReadingList, ReadingList, ReadingListBook, ReadingListChanges, User},
    schema::{book, readinglist, readinglistbook, users},
};

#[derive(serde::Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewList {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(serde::Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

#[derive(serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub owner_name: String,
    pub owner_photo: Option<String>,
    pub number_of_books: usize,
    pub updated_at: DateTime<Utc>,
}

#[derive(serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListDetails {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub owner_name: String,
    pub owner_photo: Option<String>,
    pub is_mine: bool,
    pub books: Vec<BookDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn check_title(title: &str) -> Result<(), CatalogError> {
    if title.trim().is_empty() {
        return Err(CatalogError::InvalidArgument("title"));
    }
    Ok(())
}

/// Fetches a list and checks that `requester` owns it.
async fn owned_list(
    conn: &mut AsyncPgConnection,
    id: Uuid,
    requester: Uuid,
) -> Result<ReadingList, CatalogError> {
    let list = readinglist::table
        .find(id)
        .select(ReadingList::as_select())
        .get_result(conn)
        .await
        .map_err(translate_store_error(Entity::ReadingList))?;

    if list.owner != requester {
        return Err(CatalogError::Forbidden(Entity::ReadingList));
    }

    Ok(list)
}

pub async fn create_reading_list(
    conn: &mut AsyncPgConnection,
    user: Uuid,
    new: &NewList,
) -> Result<ReadingList, CatalogError> {
    check_title(&new.title)?;

    let created = diesel::insert_into(readinglist::table)
        .values(NewReadingList {
            owner: user,
            title: &new.title,
            description: &new.description,
            tags: &new.tags,
            is_public: new.is_public,
        })
        .returning(ReadingList::as_returning())
        .get_result(conn)
        .await
        .map_err(translate_store_error(Entity::User))?;

    tracing::debug!(id = %created.id, %user, "created reading list");

    Ok(created)
}

pub async fn update_reading_list(
    conn: &mut AsyncPgConnection,
    requester: Uuid,
    id: Uuid,
    patch: &ListPatch,
) -> Result<ReadingList, CatalogError> {
    if let Some(title) = &patch.title {
        check_title(title)?;
    }

    conn.transaction(|c| {
        async move {
            owned_list(c, id, requester).await?;

            let changes = ReadingListChanges {
                title: patch.title.clone(),
                description: patch.description.clone(),
                tags: patch.tags.clone(),
                is_public: patch.is_public,
                updated_at: Some(Utc::now()),
            };

            Ok(diesel::update(readinglist::table.find(id))
                .set(&changes)
                .returning(ReadingList::as_returning())
                .get_result(c)
                .await?)
        }
        .scope_boxed()
    })
    .await
}

pub async fn delete_reading_list(
    conn: &mut AsyncPgConnection,
    requester: Uuid,
    id: Uuid,
) -> Result<(), CatalogError> {
    conn.transaction(|c| {
        async move {
            owned_list(c, id, requester).await?;
            diesel::delete(readinglist::table.find(id)).execute(c).await?;
            Ok(())
        }
        .scope_boxed()
    })
    .await
}

/// Adds `book` to the list if it is absent, removes it otherwise.
///
/// Returns whether the book is in the list afterwards.
pub async fn toggle_book_in_list(
    conn: &mut AsyncPgConnection,
    list: Uuid,
    book: Uuid,
    requester: Uuid,
) -> Result<bool, CatalogError> {
    conn.transaction(|c| {
        async move {
            owned_list(c, list, requester).await?;

            book::table
                .find(book)
                .select(book::id)
                .get_result::<Uuid>(c)
                .await
                .map_err(translate_store_error(Entity::Book))?;

            let removed = diesel::delete(
                readinglistbook::table
                    .filter(readinglistbook::list.eq(list))
                    .filter(readinglistbook::book.eq(book)),
            )
            .execute(c)
            .await?;

            if removed == 0 {
                diesel::insert_into(readinglistbook::table)
                    .values(ReadingListBook { list, book })
                    .on_conflict_do_nothing()
                    .execute(c)
                    .await
                    .map_err(translate_store_error(Entity::Book))?;
            }

            diesel::update(readinglist::table.find(list))
                .set(readinglist::updated_at.eq(Utc::now()))
                .execute(c)
                .await?;

            let member = removed == 0;
            tracing::debug!(%list, %book, member, "toggled book in list");
            Ok(member)
        }
        .scope_boxed()
    })
    .await
}

/// A list with its books. Private lists are only visible to their owner,
/// anybody else gets `NotFound`.
pub async fn find_reading_list(
    conn: &mut AsyncPgConnection,
    blobs: &dyn BlobStore,
    id: Uuid,
    viewer: Option<Uuid>,
) -> Result<ListDetails, CatalogError> {
    let (list, owner): (ReadingList, User) = readinglist::table
        .inner_join(users::table)
        .filter(readinglist::id.eq(id))
        .select((ReadingList::as_select(), User::as_select()))
        .get_result(conn)
        .await
        .map_err(translate_store_error(Entity::ReadingList))?;

    let is_mine = Some(list.owner) == viewer;
    if !list.is_public && !is_mine {
        return Err(CatalogError::NotFound(Entity::ReadingList));
    }

    let books: Vec<Book> = readinglistbook::table
        .inner_join(book::table)
        .filter(readinglistbook::list.eq(id))
        .select(Book::as_select())
        .order((book::title.asc(), book::id.asc()))
        .load(conn)
        .await?;
    let books = load_books(conn, books, Include::ALL).await?;

    Ok(ListDetails {
        id: list.id,
        title: list.title,
        description: list.description,
        tags: list.tags,
        is_public: list.is_public,
        owner_photo: photo_url(blobs, &owner),
        owner_name: owner.name,
        is_mine,
        books,
        created_at: list.created_at,
        updated_at: list.updated_at,
    })
}

async fn summarize(
    conn: &mut AsyncPgConnection,
    blobs: &dyn BlobStore,
    rows: Vec<(ReadingList, User)>,
) -> Result<Vec<ListSummary>, CatalogError> {
    let (lists, owners): (Vec<_>, Vec<_>) = rows.into_iter().unzip();

    let members: Vec<Vec<ReadingListBook>> = ReadingListBook::belonging_to(&lists)
        .select(ReadingListBook::as_select())
        .load(conn)
        .await?
        .grouped_by(&lists);

    Ok(lists
        .into_iter()
        .zip(owners)
        .zip(members)
        .map(|((list, owner), books)| ListSummary {
            id: list.id,
            title: list.title,
            description: list.description,
            tags: list.tags,
            is_public: list.is_public,
            owner_photo: photo_url(blobs, &owner),
            owner_name: owner.name,
            number_of_books: books.len(),
            updated_at: list.updated_at,
        })
        .collect())
}

/// Every public list, most recently updated first.
pub async fn public_reading_lists(
    conn: &mut AsyncPgConnection,
    blobs: &dyn BlobStore,
) -> Result<Vec<ListSummary>, CatalogError> {
    let rows = readinglist::table
        .inner_join(users::table)
        .filter(readinglist::is_public.eq(true))
        .select((ReadingList::as_select(), User::as_select()))
        .order((readinglist::updated_at.desc(), readinglist::id.asc()))
        .load(conn)
        .await?;

    summarize(conn, blobs, rows).await
}

/// Lists of `user`, public or not.
pub async fn owned_reading_lists(
    conn: &mut AsyncPgConnection,
    blobs: &dyn BlobStore,
    user: Uuid,
) -> Result<Vec<ListSummary>, CatalogError> {
    let rows = readinglist::table
        .inner_join(users::table)
        .filter(readinglist::owner.eq(user))
        .select((ReadingList::as_select(), User::as_select()))
        .order((readinglist::updated_at.desc(), readinglist::id.asc()))
        .load(conn)
        .await?;

    summarize(conn, blobs, rows).await
}
