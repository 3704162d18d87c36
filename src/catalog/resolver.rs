use std::collections::HashMap;

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::{
    error::CatalogError,
    models::{AuthorName, GenreName, Named},
    schema::{author, genre},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Author,
    Genre,
}

fn check_name(name: &str) -> Result<(), CatalogError> {
    // Postgres text cannot hold NUL bytes
    if name.contains('\0') {
        return Err(CatalogError::InvalidArgument("name"));
    }
    Ok(())
}

/// Finds or creates one entity per name, preserving the order of `names`.
///
/// Repeated names resolve to the same entity. Creation relies on the unique
/// index on `name`: concurrent resolvers racing on a new name all end up with
/// the single row that got committed.
pub async fn resolve(
    conn: &mut AsyncPgConnection,
    names: &[String],
    kind: NameKind,
) -> Result<Vec<Named>, CatalogError> {
    if names.is_empty() {
        return Ok(Vec::new());
    }

    for name in names {
        check_name(name)?;
    }

    // Sorted so that concurrent batches lock the unique index in the same order
    let mut distinct: Vec<&str> = names.iter().map(String::as_str).collect();
    distinct.sort_unstable();
    distinct.dedup();

    let lookup: Vec<String> = distinct.iter().map(|n| n.to_string()).collect();

    let found: Vec<Named> = match kind {
        NameKind::Author => {
            let values: Vec<_> = distinct.iter().map(|&name| AuthorName { name }).collect();
            diesel::insert_into(author::table)
                .values(&values)
                .on_conflict(author::name)
                .do_nothing()
                .execute(conn)
                .await?;

            author::table
                .filter(author::name.eq_any(lookup))
                .select((author::id, author::name))
                .load(conn)
                .await?
        }
        NameKind::Genre => {
            let values: Vec<_> = distinct.iter().map(|&name| GenreName { name }).collect();
            diesel::insert_into(genre::table)
                .values(&values)
                .on_conflict(genre::name)
                .do_nothing()
                .execute(conn)
                .await?;

            genre::table
                .filter(genre::name.eq_any(lookup))
                .select((genre::id, genre::name))
                .load(conn)
                .await?
        }
    };

    tracing::debug!(?kind, requested = names.len(), distinct = found.len(), "resolved names");

    let by_name: HashMap<&str, &Named> = found.iter().map(|n| (n.name.as_str(), n)).collect();

    names
        .iter()
        .map(|name| {
            by_name
                .get(name.as_str())
                .map(|&n| n.clone())
                .ok_or(CatalogError::Db(diesel::result::Error::NotFound))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use diesel_async::AsyncConnection;

    use super::*;
    use crate::catalog::testing;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn duplicates_in_input_map_to_one_entity() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };

        let resolved = resolve(
            &mut conn,
            &names(&["Victor Hugo", "Jules Verne", "Victor Hugo"]),
            NameKind::Author,
        )
        .await
        .unwrap();

        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[0], resolved[2]);
        assert_ne!(resolved[0].id, resolved[1].id);
        assert_eq!(resolved[1].name, "Jules Verne");

        let again = resolve(&mut conn, &names(&["Jules Verne"]), NameKind::Author)
            .await
            .unwrap();
        assert_eq!(again[0], resolved[1]);
    }

    #[tokio::test]
    async fn names_are_case_sensitive_and_kinds_separate() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };

        let authors = resolve(&mut conn, &names(&["Poetry", "poetry"]), NameKind::Author)
            .await
            .unwrap();
        assert_ne!(authors[0].id, authors[1].id);

        let genres = resolve(&mut conn, &names(&["Poetry", ""]), NameKind::Genre)
            .await
            .unwrap();
        assert_eq!(genres[0].name, "Poetry");
        assert_eq!(genres[1].name, "");
    }

    #[tokio::test]
    async fn nul_names_are_rejected() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };

        let err = resolve(&mut conn, &names(&["bad\0name"]), NameKind::Genre)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument("name")));
    }

    #[tokio::test]
    async fn concurrent_resolvers_create_each_name_once() {
        let Some(pool) = testing::pool().await else {
            return;
        };

        let tag = uuid::Uuid::new_v4();
        let batch = names(&[
            &format!("a-{tag}"),
            &format!("b-{tag}"),
            &format!("a-{tag}"),
            &format!("c-{tag}"),
        ]);

        let mut tasks = Vec::new();
        for i in 0..8 {
            let pool = pool.clone();
            let mut batch = batch.clone();
            let n = batch.len();
            batch.rotate_left(i % n);
            tasks.push(tokio::spawn(async move {
                let mut conn = pool.get().await.unwrap();
                conn.transaction(|c| {
                    use diesel_async::scoped_futures::ScopedFutureExt;
                    async move { resolve(c, &batch, NameKind::Genre).await }.scope_boxed()
                })
                .await
                .unwrap()
            }));
        }

        let mut ids = HashSet::new();
        for task in tasks {
            for named in task.await.unwrap() {
                ids.insert(named.id);
            }
        }

        assert_eq!(ids.len(), 3);
    }
}
