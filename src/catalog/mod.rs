//! Catalog engine: books and their relations, the social features built on
//! top of them, and the queries over both.

pub mod aggregate;
pub mod books;
pub mod celebrities;
pub mod palette;
pub mod query;
pub mod quotes;
pub mod reading_lists;
pub mod resolver;
pub mod reviews;
pub mod shelves;
pub mod taxonomy;
pub mod users;
pub mod votes;
