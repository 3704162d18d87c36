use diesel::{pg::Pg, prelude::*, sql_types::Bool};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Deserializer};

use crate::{
    catalog::books::{load_books, BookDetails, Include},
    error::CatalogError,
    models::Book,
    pagination::{PageRequest, Paginated, BOOKS_PER_PAGE},
    schema::{author, book, bookauthor, bookgenre, genre},
};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortingMethod {
    Newest,
    Oldest,
}

/// Accepts either a comma separated string or a list of strings.
pub(crate) fn comma_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Joined(String),
        List(Vec<String>),
    }

    let items = match Raw::deserialize(deserializer)? {
        Raw::Joined(s) => s.split(',').map(str::to_string).collect(),
        Raw::List(l) => l,
    };

    Ok(items.into_iter().filter(|s| !s.is_empty()).collect())
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BookQuery {
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "comma_list")]
    pub genres: Vec<String>,
    /// Accepted for compatibility, not used for filtering.
    #[serde(default, deserialize_with = "comma_list")]
    pub authors: Vec<String>,
    pub search: Option<String>,
    pub language: Option<String>,
    pub sorting_method: Option<SortingMethod>,
}

/// Escapes LIKE wildcards so that user input only ever matches literally.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub fn contains_pattern(input: &str) -> String {
    format!("%{}%", escape_like(input))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

type BookPredicate = Box<dyn BoxableExpression<book::table, Pg, SqlType = Bool>>;

/// Builds the filter shared by the page and the count of a book query.
fn book_predicate(query: &BookQuery) -> BookPredicate {
    let mut predicate: BookPredicate = Box::new(true.into_sql::<Bool>());

    if let Some(search) = non_empty(&query.search) {
        let pattern = contains_pattern(search);
        let by_author = bookauthor::table
            .inner_join(author::table)
            .filter(author::name.ilike(pattern.clone()))
            .select(bookauthor::book);

        predicate = Box::new(
            predicate.and(
                book::title
                    .ilike(pattern)
                    .or(book::id.eq_any(by_author)),
            ),
        );
    }

    // The genre names are matched against the whole comma joined filter, not
    // against each of its items.
    if !query.genres.is_empty() {
        let pattern = contains_pattern(&query.genres.join(","));
        let by_genre = bookgenre::table
            .inner_join(genre::table)
            .filter(genre::name.ilike(pattern))
            .select(bookgenre::book);

        predicate = Box::new(predicate.and(book::id.eq_any(by_genre)));
    }

    if let Some(language) = non_empty(&query.language) {
        predicate = Box::new(predicate.and(book::language.ilike(contains_pattern(language))));
    }

    predicate
}

/// Returns one page of books matching `query`, with authors and genres.
pub async fn query_books(
    conn: &mut AsyncPgConnection,
    query: &BookQuery,
) -> Result<Paginated<BookDetails>, CatalogError> {
    let request = PageRequest::new(query.page, BOOKS_PER_PAGE);

    let total: i64 = book::table
        .filter(book_predicate(query))
        .count()
        .get_result(conn)
        .await?;

    let page = book::table
        .filter(book_predicate(query))
        .select(Book::as_select())
        .into_boxed();

    let page = match query.sorting_method {
        Some(SortingMethod::Newest) => page.order(book::year_of_publication.desc()),
        Some(SortingMethod::Oldest) => page.order(book::year_of_publication.asc()),
        None => page.order(book::created_at.asc()),
    };

    let books = page
        .then_order_by(book::id.asc())
        .limit(request.limit())
        .offset(request.offset())
        .load(conn)
        .await?;

    tracing::debug!(
        total,
        page = request.page,
        returned = books.len(),
        "queried books"
    );

    let results = load_books(conn, books, Include::ALL).await?;

    Ok(request.wrap(results, total))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        catalog::{
            books::{add_book, CreateBook, NewBook},
            palette::FixedPalette,
            testing,
        },
        models::BookColor,
    };

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(contains_pattern("100%"), r"%100\%%");
        assert_eq!(contains_pattern("a_b"), r"%a\_b%");
        assert_eq!(contains_pattern(r"c:\"), r"%c:\\%");
        assert_eq!(contains_pattern("plain"), "%plain%");
    }

    #[test]
    fn query_accepts_comma_lists() {
        let query: BookQuery = serde_json::from_str(
            r#"{"genres": "Fantasy,Adventure", "authors": ["A"], "sortingMethod": "NEWEST"}"#,
        )
        .unwrap();

        assert_eq!(query.genres, ["Fantasy", "Adventure"]);
        assert_eq!(query.authors, ["A"]);
        assert_eq!(query.sorting_method, Some(SortingMethod::Newest));
        assert_eq!(query.page, None);
    }

    async fn seed(conn: &mut AsyncPgConnection, title: &str, year: i32, author: &str, genre: &str) {
        add_book(
            conn,
            &CreateBook {
                book: NewBook {
                    title: title.into(),
                    year_of_publication: year,
                    language: "English".into(),
                    description: "Some description text".into(),
                    color: None,
                    verified: true,
                },
                authors: vec![author.into()],
                genres: vec![genre.into()],
            },
            &FixedPalette(BookColor::Sky),
        )
        .await
        .unwrap();
    }

    fn titles(page: &Paginated<BookDetails>) -> Vec<&str> {
        page.results.iter().map(|b| b.title.as_str()).collect()
    }

    #[tokio::test]
    async fn search_matches_title_or_author() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };

        let tag = uuid::Uuid::new_v4().simple().to_string();
        seed(&mut conn, &format!("Hobbit {tag}"), 1937, "J. R. R. Tolkien", "Fantasy").await;
        seed(&mut conn, "Dune", 1965, &format!("Herbert {tag}"), "Science Fiction").await;
        seed(&mut conn, "Unrelated", 2000, "Nobody", "Essay").await;

        let page = query_books(
            &mut conn,
            &BookQuery {
                search: Some(tag.to_uppercase()),
                sorting_method: Some(SortingMethod::Oldest),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(titles(&page), [format!("Hobbit {tag}"), "Dune".to_string()]);
        assert_eq!(page.number_of_pages, 1);
        assert_eq!(page.current_page, 1);
    }

    #[tokio::test]
    async fn genre_filter_matches_joined_list() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };

        let tag = uuid::Uuid::new_v4().simple().to_string();
        seed(&mut conn, "Joined", 1990, "X", &format!("{tag}a,{tag}b")).await;
        seed(&mut conn, "Single", 1991, "Y", &format!("{tag}a")).await;

        let joined = query_books(
            &mut conn,
            &BookQuery {
                genres: vec![format!("{tag}a"), format!("{tag}b")],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(titles(&joined), ["Joined"]);

        let single = query_books(
            &mut conn,
            &BookQuery {
                genres: vec![format!("{tag}a")],
                sorting_method: Some(SortingMethod::Newest),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(titles(&single), ["Single", "Joined"]);
    }

    #[tokio::test]
    async fn pages_slice_the_filtered_set() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };

        let tag = uuid::Uuid::new_v4().simple().to_string();
        for i in 0..(BOOKS_PER_PAGE + 3) {
            seed(
                &mut conn,
                &format!("{tag} volume {i:02}"),
                1900 + i as i32,
                "Serial Writer",
                "Saga",
            )
            .await;
        }

        let query = |page| BookQuery {
            search: Some(tag.clone()),
            sorting_method: Some(SortingMethod::Oldest),
            page,
            ..Default::default()
        };

        let first = query_books(&mut conn, &query(None)).await.unwrap();
        assert_eq!(first.current_page, 1);
        assert_eq!(first.number_of_pages, 2);
        assert_eq!(first.results.len(), BOOKS_PER_PAGE as usize);
        assert_eq!(first.results[0].title, format!("{tag} volume 00"));

        let second = query_books(&mut conn, &query(Some(2))).await.unwrap();
        assert_eq!(
            titles(&second),
            [
                format!("{tag} volume 12"),
                format!("{tag} volume 13"),
                format!("{tag} volume 14"),
            ]
        );

        let empty = query_books(
            &mut conn,
            &BookQuery {
                search: Some(format!("{tag} nothing")),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(empty.results.is_empty());
        assert_eq!(empty.number_of_pages, 1);
    }

    #[tokio::test]
    async fn language_filter_is_case_insensitive() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };

        let tag = uuid::Uuid::new_v4().simple().to_string();
        seed(&mut conn, &format!("{tag} english"), 2001, "W", "Drama").await;

        let page = query_books(
            &mut conn,
            &BookQuery {
                search: Some(tag.clone()),
                language: Some("ENGL".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.results.len(), 1);

        let page = query_books(
            &mut conn,
            &BookQuery {
                search: Some(tag),
                language: Some("fr".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(page.results.is_empty());
    }
}
