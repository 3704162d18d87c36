use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::{error::CatalogError, models::Industry, schema::{genre, industry}};

/// Names of every known genre, alphabetically.
pub async fn list_genres(conn: &mut AsyncPgConnection) -> Result<Vec<String>, CatalogError> {
    Ok(genre::table
        .select(genre::name)
        .order(genre::name.asc())
        .load(conn)
        .await?)
}

pub async fn list_industries(conn: &mut AsyncPgConnection) -> Result<Vec<Industry>, CatalogError> {
    Ok(industry::table
        .select(Industry::as_select())
        .order(industry::name.asc())
        .load(conn)
        .await?)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::catalog::{
        resolver::{resolve, NameKind},
        testing,
    };

    #[tokio::test]
    async fn genres_are_sorted() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };

        let names = ["zz-western", "aa-thriller", "mm-poetry"].map(String::from);
        resolve(&mut conn, &names, NameKind::Genre).await.unwrap();

        let genres = list_genres(&mut conn).await.unwrap();
        let ours: Vec<_> = genres
            .iter()
            .filter(|g| names.contains(g))
            .map(String::as_str)
            .collect();
        assert_eq!(ours, ["aa-thriller", "mm-poetry", "zz-western"]);
    }
}
