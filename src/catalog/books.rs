use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::{
    catalog::{
        palette::Palette,
        resolver::{resolve, NameKind},
    },
    error::{translate_store_error, CatalogError, Entity},
    models::{Book, BookAuthor, BookChanges, BookColor, BookGenre, Named, NewBookRow},
    schema::{author, book, bookauthor, bookgenre, genre},
};

/// Which relations to load alongside books.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Include {
    pub authors: bool,
    pub genres: bool,
}

impl Include {
    pub const ALL: Include = Include {
        authors: true,
        genres: true,
    };
    pub const NONE: Include = Include {
        authors: false,
        genres: false,
    };
}

#[derive(serde::Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookDetails {
    pub id: Uuid,
    pub title: String,
    pub year_of_publication: i32,
    pub language: String,
    pub authors: Vec<String>,
    pub genres: Vec<String>,
    pub description: String,
    pub color: BookColor,
    pub verified: bool,
}

impl BookDetails {
    fn assemble(book: Book, authors: Vec<String>, genres: Vec<String>) -> Self {
        Self {
            id: book.id,
            title: book.title,
            year_of_publication: book.year_of_publication,
            language: book.language,
            authors,
            genres,
            description: book.description,
            color: book.color,
            verified: book.verified,
        }
    }
}

#[derive(serde::Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewBook {
    pub title: String,
    pub year_of_publication: i32,
    pub language: String,
    pub description: String,
    #[serde(default)]
    pub color: Option<BookColor>,
    #[serde(default)]
    pub verified: bool,
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct CreateBook {
    #[serde(flatten)]
    pub book: NewBook,
    pub authors: Vec<String>,
    pub genres: Vec<String>,
}

#[derive(serde::Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BookPatch {
    pub title: Option<String>,
    pub year_of_publication: Option<i32>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub verified: Option<bool>,
    pub authors: Option<Vec<String>>,
    pub genres: Option<Vec<String>>,
}

fn check_title(title: &str) -> Result<(), CatalogError> {
    if title.trim().is_empty() {
        return Err(CatalogError::InvalidArgument("title"));
    }
    Ok(())
}

fn check_language(language: &str) -> Result<(), CatalogError> {
    if language.trim().is_empty() {
        return Err(CatalogError::InvalidArgument("language"));
    }
    Ok(())
}

fn check_description(description: &str) -> Result<(), CatalogError> {
    let len = description.chars().count();
    if !(10..=5000).contains(&len) {
        return Err(CatalogError::InvalidArgument("description"));
    }
    Ok(())
}

fn check_new_book(book: &NewBook) -> Result<(), CatalogError> {
    check_title(&book.title)?;
    check_language(&book.language)?;
    check_description(&book.description)
}

fn check_patch(patch: &BookPatch) -> Result<(), CatalogError> {
    if let Some(title) = &patch.title {
        check_title(title)?;
    }
    if let Some(language) = &patch.language {
        check_language(language)?;
    }
    if let Some(description) = &patch.description {
        check_description(description)?;
    }
    if patch.authors.as_ref().is_some_and(Vec::is_empty) {
        return Err(CatalogError::InvalidArgument("authors"));
    }
    if patch.genres.as_ref().is_some_and(Vec::is_empty) {
        return Err(CatalogError::InvalidArgument("genres"));
    }
    Ok(())
}

fn distinct_ids(entities: &[Named]) -> Vec<i32> {
    let mut ids: Vec<i32> = entities.iter().map(|e| e.id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

async fn link_authors(
    conn: &mut AsyncPgConnection,
    book_id: Uuid,
    authors: &[Named],
) -> Result<(), CatalogError> {
    let edges: Vec<_> = distinct_ids(authors)
        .into_iter()
        .map(|author| BookAuthor {
            book: book_id,
            author,
        })
        .collect();

    if edges.is_empty() {
        return Ok(());
    }

    diesel::insert_into(bookauthor::table)
        .values(&edges)
        .on_conflict_do_nothing()
        .execute(conn)
        .await?;

    Ok(())
}

async fn link_genres(
    conn: &mut AsyncPgConnection,
    book_id: Uuid,
    genres: &[Named],
) -> Result<(), CatalogError> {
    let edges: Vec<_> = distinct_ids(genres)
        .into_iter()
        .map(|genre| BookGenre {
            book: book_id,
            genre,
        })
        .collect();

    if edges.is_empty() {
        return Ok(());
    }

    diesel::insert_into(bookgenre::table)
        .values(&edges)
        .on_conflict_do_nothing()
        .execute(conn)
        .await?;

    Ok(())
}

/// Attaches the requested relations to `books`, keeping their order.
///
/// Issues at most one query per relation, whatever the number of books.
pub async fn load_books(
    conn: &mut AsyncPgConnection,
    books: Vec<Book>,
    include: Include,
) -> Result<Vec<BookDetails>, CatalogError> {
    let authors: Vec<Vec<String>> = if include.authors && !books.is_empty() {
        BookAuthor::belonging_to(&books)
            .inner_join(author::table)
            .select((BookAuthor::as_select(), (author::id, author::name)))
            .order(author::id.asc())
            .load::<(BookAuthor, Named)>(conn)
            .await?
            .grouped_by(&books)
            .into_iter()
            .map(|edges| edges.into_iter().map(|(_, a)| a.name).collect())
            .collect()
    } else {
        vec![Vec::new(); books.len()]
    };

    let genres: Vec<Vec<String>> = if include.genres && !books.is_empty() {
        BookGenre::belonging_to(&books)
            .inner_join(genre::table)
            .select((BookGenre::as_select(), (genre::id, genre::name)))
            .order(genre::id.asc())
            .load::<(BookGenre, Named)>(conn)
            .await?
            .grouped_by(&books)
            .into_iter()
            .map(|edges| edges.into_iter().map(|(_, g)| g.name).collect())
            .collect()
    } else {
        vec![Vec::new(); books.len()]
    };

    Ok(books
        .into_iter()
        .zip(authors)
        .zip(genres)
        .map(|((book, authors), genres)| BookDetails::assemble(book, authors, genres))
        .collect())
}

/// Inserts a book linked to already resolved authors and genres.
pub async fn create_book(
    conn: &mut AsyncPgConnection,
    new: &NewBook,
    authors: &[Named],
    genres: &[Named],
    palette: &dyn Palette,
) -> Result<BookDetails, CatalogError> {
    check_new_book(new)?;

    let color = new.color.unwrap_or_else(|| palette.pick());

    conn.transaction(|c| {
        async move {
            let created: Book = diesel::insert_into(book::table)
                .values(NewBookRow {
                    title: &new.title,
                    year_of_publication: new.year_of_publication,
                    language: &new.language,
                    description: &new.description,
                    color,
                    verified: new.verified,
                })
                .returning(Book::as_returning())
                .get_result(c)
                .await
                .map_err(translate_store_error(Entity::Book))?;

            link_authors(c, created.id, authors).await?;
            link_genres(c, created.id, genres).await?;

            tracing::debug!(id = %created.id, title = created.title, "created book");

            let mut loaded = load_books(c, vec![created], Include::ALL).await?;
            loaded.pop().ok_or(CatalogError::NotFound(Entity::Book))
        }
        .scope_boxed()
    })
    .await
}

/// Resolves the author and genre names of `data` and creates the book, all
/// inside a single transaction.
pub async fn add_book(
    conn: &mut AsyncPgConnection,
    data: &CreateBook,
    palette: &dyn Palette,
) -> Result<BookDetails, CatalogError> {
    check_new_book(&data.book)?;
    if data.authors.is_empty() {
        return Err(CatalogError::InvalidArgument("authors"));
    }
    if data.genres.is_empty() {
        return Err(CatalogError::InvalidArgument("genres"));
    }

    conn.transaction(|c| {
        async move {
            let authors = resolve(c, &data.authors, NameKind::Author).await?;
            let genres = resolve(c, &data.genres, NameKind::Genre).await?;
            create_book(c, &data.book, &authors, &genres, palette).await
        }
        .scope_boxed()
    })
    .await
}

pub async fn get_book(
    conn: &mut AsyncPgConnection,
    id: Uuid,
    include: Include,
) -> Result<BookDetails, CatalogError> {
    let found = book::table
        .find(id)
        .select(Book::as_select())
        .get_result(conn)
        .await
        .map_err(translate_store_error(Entity::Book))?;

    let mut loaded = load_books(conn, vec![found], include).await?;
    loaded.pop().ok_or(CatalogError::NotFound(Entity::Book))
}

/// Applies `patch` to a book.
///
/// Author and genre lists replace the current associations instead of being
/// appended to them.
pub async fn update_book(
    conn: &mut AsyncPgConnection,
    id: Uuid,
    patch: &BookPatch,
) -> Result<BookDetails, CatalogError> {
    check_patch(patch)?;

    conn.transaction(|c| {
        async move {
            let changes = BookChanges {
                title: patch.title.clone(),
                year_of_publication: patch.year_of_publication,
                language: patch.language.clone(),
                description: patch.description.clone(),
                verified: patch.verified,
                updated_at: Some(Utc::now()),
            };

            diesel::update(book::table.find(id))
                .set(&changes)
                .returning(book::id)
                .get_result::<Uuid>(c)
                .await
                .map_err(translate_store_error(Entity::Book))?;

            if let Some(names) = &patch.authors {
                let authors = resolve(c, names, NameKind::Author).await?;
                diesel::delete(bookauthor::table.filter(bookauthor::book.eq(id)))
                    .execute(c)
                    .await?;
                link_authors(c, id, &authors).await?;
            }

            if let Some(names) = &patch.genres {
                let genres = resolve(c, names, NameKind::Genre).await?;
                diesel::delete(bookgenre::table.filter(bookgenre::book.eq(id)))
                    .execute(c)
                    .await?;
                link_genres(c, id, &genres).await?;
            }

            get_book(c, id, Include::ALL).await
        }
        .scope_boxed()
    })
    .await
}

/// Removes a book and its association rows. Authors and genres are kept.
pub async fn delete_book(conn: &mut AsyncPgConnection, id: Uuid) -> Result<(), CatalogError> {
    let deleted = diesel::delete(book::table.find(id)).execute(conn).await?;

    if deleted == 0 {
        return Err(CatalogError::NotFound(Entity::Book));
    }

    tracing::debug!(%id, "deleted book");

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::catalog::{palette::FixedPalette, testing};

    fn create(title: &str, authors: &[&str], genres: &[&str]) -> CreateBook {
        CreateBook {
            book: NewBook {
                title: title.into(),
                year_of_publication: 1862,
                language: "fr".into(),
                description: "A long enough description".into(),
                color: None,
                verified: false,
            },
            authors: authors.iter().map(|s| s.to_string()).collect(),
            genres: genres.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn description_bounds() {
        assert!(check_description("too short").is_err());
        assert!(check_description("just right").is_ok());
        assert!(check_description(&"x".repeat(5000)).is_ok());
        assert!(check_description(&"x".repeat(5001)).is_err());
    }

    #[test]
    fn create_book_deserializes_flat() {
        let data: CreateBook = serde_json::from_str(
            r#"{
                "title": "Les Misérables",
                "yearOfPublication": 1862,
                "language": "fr",
                "description": "Jean Valjean and the barricades",
                "authors": ["Victor Hugo"],
                "genres": ["Novel"]
            }"#,
        )
        .unwrap();

        assert_eq!(data.book.year_of_publication, 1862);
        assert_eq!(data.book.color, None);
        assert!(!data.book.verified);
        assert_eq!(data.authors, ["Victor Hugo"]);
    }

    #[tokio::test]
    async fn add_and_get_book() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };

        let created = add_book(
            &mut conn,
            &create("Les Misérables", &["Victor Hugo", "Victor Hugo"], &["Novel"]),
            &FixedPalette(BookColor::Rose),
        )
        .await
        .unwrap();

        assert_eq!(created.color, BookColor::Rose);
        assert_eq!(created.authors, ["Victor Hugo"]);
        assert_eq!(created.genres, ["Novel"]);

        let fetched = get_book(&mut conn, created.id, Include::ALL).await.unwrap();
        assert_eq!(fetched, created);

        let bare = get_book(&mut conn, created.id, Include::NONE).await.unwrap();
        assert!(bare.authors.is_empty());
        assert!(bare.genres.is_empty());
    }

    #[tokio::test]
    async fn duplicate_book_conflicts() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };

        let data = create("Notre-Dame de Paris", &["Victor Hugo"], &["Novel"]);
        add_book(&mut conn, &data, &FixedPalette(BookColor::Red))
            .await
            .unwrap();

        let err = add_book(&mut conn, &data, &FixedPalette(BookColor::Red))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(Entity::Book)));
    }

    #[tokio::test]
    async fn update_replaces_associations() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };

        let created = add_book(
            &mut conn,
            &create("Quatrevingt-treize", &["Victor Hugo", "C"], &["Novel"]),
            &FixedPalette(BookColor::Blue),
        )
        .await
        .unwrap();

        let patch = BookPatch {
            authors: Some(vec!["A".into(), "B".into()]),
            ..Default::default()
        };
        update_book(&mut conn, created.id, &patch).await.unwrap();

        let fetched = get_book(&mut conn, created.id, Include::ALL).await.unwrap();
        let mut authors = fetched.authors.clone();
        authors.sort();
        assert_eq!(authors, ["A", "B"]);
        assert_eq!(fetched.genres, ["Novel"]);
        assert_eq!(fetched.title, "Quatrevingt-treize");
    }

    #[tokio::test]
    async fn update_into_an_existing_book_conflicts() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };

        add_book(
            &mut conn,
            &create("Les Travailleurs de la mer", &["Victor Hugo"], &["Novel"]),
            &FixedPalette(BookColor::Teal),
        )
        .await
        .unwrap();
        let other = add_book(
            &mut conn,
            &create("L'Homme qui rit", &["Victor Hugo"], &["Novel"]),
            &FixedPalette(BookColor::Teal),
        )
        .await
        .unwrap();

        let patch = BookPatch {
            title: Some("Les Travailleurs de la mer".into()),
            genres: Some(vec!["Sea".into()]),
            ..Default::default()
        };
        let err = update_book(&mut conn, other.id, &patch).await.unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(Entity::Book)));

        let fetched = get_book(&mut conn, other.id, Include::ALL).await.unwrap();
        assert_eq!(fetched.title, "L'Homme qui rit");
        assert_eq!(fetched.genres, ["Novel"]);
    }

    #[tokio::test]
    async fn update_missing_book() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };

        let patch = BookPatch {
            title: Some("Nothing".into()),
            ..Default::default()
        };
        let err = update_book(&mut conn, Uuid::new_v4(), &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(Entity::Book)));
    }

    #[tokio::test]
    async fn delete_detaches_but_keeps_authors() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };

        let created = add_book(
            &mut conn,
            &create("Les Contemplations", &["Victor Hugo"], &["Poetry"]),
            &FixedPalette(BookColor::Amber),
        )
        .await
        .unwrap();

        delete_book(&mut conn, created.id).await.unwrap();

        let edges: i64 = bookauthor::table
            .filter(bookauthor::book.eq(created.id))
            .count()
            .get_result(&mut *conn)
            .await
            .unwrap();
        assert_eq!(edges, 0);

        let authors: i64 = author::table
            .filter(author::name.eq("Victor Hugo"))
            .count()
            .get_result(&mut *conn)
            .await
            .unwrap();
        assert_eq!(authors, 1);

        let err = delete_book(&mut conn, created.id).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(Entity::Book)));

        let err = get_book(&mut conn, created.id, Include::ALL)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(Entity::Book)));
    }
}
