use diesel::{pg::Pg, prelude::*, sql_types::Bool};
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::{
    blob::{BlobStore, Bucket},
    catalog::{
        books::{load_books, BookDetails, Include},
        query::contains_pattern,
    },
    error::{translate_store_error, CatalogError, Entity},
    models::{Book, Celebrity, CelebrityBook, CelebrityIndustry, Industry, NewCelebrity, NewIndustry},
    pagination::{PageRequest, Paginated, CELEBRITIES_PER_PAGE},
    schema::{book, celebrity, celebritybook, celebrityindustry, industry},
};

/// Industry filter value standing for "any industry".
pub const ALL_INDUSTRIES: &str = "all";

#[derive(serde::Deserialize, Debug, Clone, Default)]
pub struct CelebrityQuery {
    pub page: Option<i64>,
    pub search: Option<String>,
    pub industry: Option<String>,
}

#[derive(serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CelebritySummary {
    pub id: Uuid,
    pub name: String,
    pub photo_url: String,
    pub industries: Vec<Industry>,
}

#[derive(serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CelebrityWithBooks {
    #[serde(flatten)]
    pub summary: CelebritySummary,
    pub description: String,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub books: Vec<BookDetails>,
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct IndustryInput {
    pub name: String,
    pub job: String,
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct NewCelebrityInput {
    pub name: String,
    /// File name in the celebrities bucket.
    pub photo: String,
    pub description: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub instagram: Option<String>,
    #[serde(default)]
    pub facebook: Option<String>,
    #[serde(default)]
    pub industries: Vec<IndustryInput>,
    #[serde(default)]
    pub books: Vec<Uuid>,
}

type CelebrityPredicate = Box<dyn BoxableExpression<celebrity::table, Pg, SqlType = Bool>>;

fn celebrity_predicate(query: &CelebrityQuery) -> CelebrityPredicate {
    let mut predicate: CelebrityPredicate = Box::new(true.into_sql::<Bool>());

    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        predicate = Box::new(predicate.and(celebrity::name.ilike(contains_pattern(search))));
    }

    let industry_filter = query
        .industry
        .as_deref()
        .filter(|i| !i.is_empty() && *i != ALL_INDUSTRIES);

    if let Some(name) = industry_filter {
        let in_industry = celebrityindustry::table
            .inner_join(industry::table)
            .filter(industry::name.ilike(contains_pattern(name)))
            .select(celebrityindustry::celebrity);

        predicate = Box::new(predicate.and(celebrity::id.eq_any(in_industry)));
    }

    predicate
}

async fn load_industries(
    conn: &mut AsyncPgConnection,
    celebrities: &[Celebrity],
) -> Result<Vec<Vec<Industry>>, CatalogError> {
    if celebrities.is_empty() {
        return Ok(Vec::new());
    }

    Ok(CelebrityIndustry::belonging_to(celebrities)
        .inner_join(industry::table)
        .select((CelebrityIndustry::as_select(), Industry::as_select()))
        .order(industry::name.asc())
        .load::<(CelebrityIndustry, Industry)>(conn)
        .await?
        .grouped_by(celebrities)
        .into_iter()
        .map(|edges| edges.into_iter().map(|(_, i)| i).collect())
        .collect())
}

fn summarize(blobs: &dyn BlobStore, celebrity: &Celebrity, industries: Vec<Industry>) -> CelebritySummary {
    CelebritySummary {
        id: celebrity.id,
        name: celebrity.name.clone(),
        photo_url: blobs.file_url(Bucket::Celebrities, &celebrity.photo),
        industries,
    }
}

pub async fn query_celebrities(
    conn: &mut AsyncPgConnection,
    blobs: &dyn BlobStore,
    query: &CelebrityQuery,
) -> Result<Paginated<CelebritySummary>, CatalogError> {
    let request = PageRequest::new(query.page, CELEBRITIES_PER_PAGE);

    let total: i64 = celebrity::table
        .filter(celebrity_predicate(query))
        .count()
        .get_result(conn)
        .await?;

    let celebrities: Vec<Celebrity> = celebrity::table
        .filter(celebrity_predicate(query))
        .select(Celebrity::as_select())
        .order((celebrity::name.asc(), celebrity::id.asc()))
        .limit(request.limit())
        .offset(request.offset())
        .load(conn)
        .await?;

    let industries = load_industries(conn, &celebrities).await?;

    let results = celebrities
        .iter()
        .zip(industries)
        .map(|(c, industries)| summarize(blobs, c, industries))
        .collect();

    Ok(request.wrap(results, total))
}

/// A celebrity with industries and recommended books.
pub async fn find_celebrity(
    conn: &mut AsyncPgConnection,
    blobs: &dyn BlobStore,
    id: Uuid,
) -> Result<CelebrityWithBooks, CatalogError> {
    let found: Celebrity = celebrity::table
        .find(id)
        .select(Celebrity::as_select())
        .get_result(conn)
        .await
        .map_err(translate_store_error(Entity::Celebrity))?;

    let industries = load_industries(conn, std::slice::from_ref(&found))
        .await?
        .pop()
        .unwrap_or_default();

    let books: Vec<Book> = celebritybook::table
        .inner_join(book::table)
        .filter(celebritybook::celebrity.eq(id))
        .select(Book::as_select())
        .order((book::title.asc(), book::id.asc()))
        .load(conn)
        .await?;
    let books = load_books(conn, books, Include::ALL).await?;

    Ok(CelebrityWithBooks {
        summary: summarize(blobs, &found, industries),
        description: found.description,
        website: found.website,
        twitter: found.twitter,
        instagram: found.instagram,
        facebook: found.facebook,
        books,
    })
}

/// Finds or creates industries by name. An existing industry keeps its job
/// label.
async fn resolve_industries(
    conn: &mut AsyncPgConnection,
    inputs: &[IndustryInput],
) -> Result<Vec<Industry>, CatalogError> {
    if inputs.is_empty() {
        return Ok(Vec::new());
    }

    let mut values: Vec<_> = inputs
        .iter()
        .map(|i| NewIndustry {
            name: &i.name,
            job: &i.job,
        })
        .collect();
    values.sort_by(|a, b| a.name.cmp(b.name));
    values.dedup_by(|a, b| a.name == b.name);

    diesel::insert_into(industry::table)
        .values(&values)
        .on_conflict(industry::name)
        .do_nothing()
        .execute(conn)
        .await?;

    let names: Vec<&str> = values.iter().map(|v| v.name).collect();

    Ok(industry::table
        .filter(industry::name.eq_any(names))
        .select(Industry::as_select())
        .load(conn)
        .await?)
}

pub async fn create_celebrity(
    conn: &mut AsyncPgConnection,
    blobs: &dyn BlobStore,
    input: &NewCelebrityInput,
) -> Result<CelebrityWithBooks, CatalogError> {
    if input.name.trim().is_empty() {
        return Err(CatalogError::InvalidArgument("name"));
    }

    let id = conn
        .transaction(|c| {
            async move {
                let created: Celebrity = diesel::insert_into(celebrity::table)
                    .values(NewCelebrity {
                        name: &input.name,
                        photo: &input.photo,
                        description: &input.description,
                        website: input.website.as_deref(),
                        twitter: input.twitter.as_deref(),
                        instagram: input.instagram.as_deref(),
                        facebook: input.facebook.as_deref(),
                    })
                    .returning(Celebrity::as_returning())
                    .get_result(c)
                    .await?;

                let industries: Vec<_> = resolve_industries(c, &input.industries)
                    .await?
                    .into_iter()
                    .map(|i| CelebrityIndustry {
                        celebrity: created.id,
                        industry: i.id,
                    })
                    .collect();

                if !industries.is_empty() {
                    diesel::insert_into(celebrityindustry::table)
                        .values(&industries)
                        .on_conflict_do_nothing()
                        .execute(c)
                        .await?;
                }

                let mut book_ids = input.books.clone();
                book_ids.sort_unstable();
                book_ids.dedup();

                let books: Vec<_> = book_ids
                    .into_iter()
                    .map(|book| CelebrityBook {
                        celebrity: created.id,
                        book,
                    })
                    .collect();

                if !books.is_empty() {
                    diesel::insert_into(celebritybook::table)
                        .values(&books)
                        .on_conflict_do_nothing()
                        .execute(c)
                        .await
                        .map_err(translate_store_error(Entity::Book))?;
                }

                tracing::debug!(id = %created.id, name = created.name, "created celebrity");

                Ok::<_, CatalogError>(created.id)
            }
            .scope_boxed()
        })
        .await?;

    find_celebrity(conn, blobs, id).await
}
