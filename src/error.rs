use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::pooled_connection::deadpool::PoolError;

/// Which kind of entity an error refers to. Used to build stable error keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Book,
    Review,
    Quote,
    ReadingList,
    Celebrity,
    User,
}

impl Entity {
    pub fn key(self) -> &'static str {
        match self {
            Entity::Book => "books",
            Entity::Review => "reviews",
            Entity::Quote => "quotes",
            Entity::ReadingList => "readingLists",
            Entity::Celebrity => "celebrities",
            Entity::User => "users",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("{0:?} not found")]
    NotFound(Entity),
    #[error("{0:?} already exists")]
    Conflict(Entity),
    #[error("Not the owner of this {0:?}")]
    Forbidden(Entity),
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Database error")]
    Db(#[source] DieselError),
    #[error("Could not get a connection from the pool")]
    Pool(#[from] PoolError),
}

impl From<DieselError> for CatalogError {
    fn from(e: DieselError) -> Self {
        CatalogError::Db(e)
    }
}

impl CatalogError {
    /// Machine readable key, stable across locales.
    pub fn key(&self) -> String {
        match self {
            CatalogError::NotFound(e) => format!("errors.{}.notFound", e.key()),
            CatalogError::Conflict(e) => format!("errors.{}.alreadyExists", e.key()),
            CatalogError::Forbidden(e) => format!("errors.{}.notOwner", e.key()),
            CatalogError::InvalidArgument(field) => format!("errors.invalid.{field}"),
            CatalogError::Unauthorized => "errors.auth.unauthorized".into(),
            CatalogError::Db(_) | CatalogError::Pool(_) => "errors.somethingWentWrong".into(),
        }
    }
}

/// Translates raw store failures into the catalog taxonomy for `entity`.
///
/// Unique violations become `Conflict`, dangling references and missing rows
/// become `NotFound`. Anything else stays an opaque database error.
pub fn translate_store_error(entity: Entity) -> impl FnOnce(DieselError) -> CatalogError {
    move |e| match e {
        DieselError::NotFound => CatalogError::NotFound(entity),
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            CatalogError::Conflict(entity)
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
            CatalogError::NotFound(entity)
        }
        e => CatalogError::Db(e),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use expect_test::expect;

    #[test]
    fn keys_are_stable() {
        let keys = [
            CatalogError::NotFound(Entity::Book),
            CatalogError::Conflict(Entity::Review),
            CatalogError::Forbidden(Entity::ReadingList),
            CatalogError::InvalidArgument("shelfStatus"),
            CatalogError::Unauthorized,
            CatalogError::Db(DieselError::RollbackTransaction),
        ]
        .iter()
        .map(|e| e.key())
        .collect::<Vec<_>>();

        expect![[r#"
            [
                "errors.books.notFound",
                "errors.reviews.alreadyExists",
                "errors.readingLists.notOwner",
                "errors.invalid.shelfStatus",
                "errors.auth.unauthorized",
                "errors.somethingWentWrong",
            ]
        "#]]
        .assert_debug_eq(&keys);
    }

    #[test]
    fn not_found_row_translates() {
        let e = translate_store_error(Entity::Quote)(DieselError::NotFound);
        assert!(matches!(e, CatalogError::NotFound(Entity::Quote)));
    }
}
