use std::io::Write;

use chrono::{DateTime, Utc};
use diesel::{
    deserialize::{self, FromSql, FromSqlRow},
    expression::AsExpression,
    pg::{Pg, PgValue},
    prelude::*,
    serialize::{self, IsNull, Output, ToSql},
    sql_types::Text,
};
use uuid::Uuid;

/// Declares an enum stored as a `TEXT` column, with its wire name used both in
/// the database and in JSON.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, AsExpression, FromSqlRow,
            serde::Serialize, serde::Deserialize,
        )]
        #[diesel(sql_type = Text)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownVariant(s.to_string())),
                }
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let text = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                Ok(text.parse()?)
            }
        }
    };
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Unknown variant '{0}'")]
pub struct UnknownVariant(pub String);

text_enum! {
    /// Reading progress of a user on a book.
    pub enum ShelfStatus {
        WantToRead => "WANT_TO_READ",
        Reading => "READING",
        Read => "READ",
    }
}

text_enum! {
    pub enum VoteKind {
        Up => "UP",
        Down => "DOWN",
    }
}

text_enum! {
    /// Display palette a book card is drawn with.
    pub enum BookColor {
        Red => "red",
        Orange => "orange",
        Yellow => "yellow",
        Green => "green",
        Teal => "teal",
        Blue => "blue",
        Indigo => "indigo",
        Purple => "purple",
        Pink => "pink",
        Gray => "gray",
        Stone => "stone",
        Amber => "amber",
        Emerald => "emerald",
        Cyan => "cyan",
        Sky => "sky",
        Violet => "violet",
        Fuchsia => "fuchsia",
        Rose => "rose",
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewUser<'a> {
    pub name: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub photo: Option<String>,
}

/// An entity identified by a unique name: authors and genres.
#[derive(Queryable, PartialEq, Eq, Debug, Clone, serde::Serialize)]
pub struct Named {
    pub id: i32,
    pub name: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::author)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AuthorName<'a> {
    pub name: &'a str,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::genre)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GenreName<'a> {
    pub name: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, PartialEq, Eq, Debug, Clone)]
#[diesel(table_name = crate::schema::book)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub year_of_publication: i32,
    pub language: String,
    pub description: String,
    pub color: BookColor,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::book)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewBookRow<'a> {
    pub title: &'a str,
    pub year_of_publication: i32,
    pub language: &'a str,
    pub description: &'a str,
    pub color: BookColor,
    pub verified: bool,
}

#[derive(AsChangeset, Default, Debug)]
#[diesel(table_name = crate::schema::book)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BookChanges {
    pub title: Option<String>,
    pub year_of_publication: Option<i32>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub verified: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Identifiable, Selectable, Queryable, Associations, Debug)]
#[diesel(belongs_to(Book, foreign_key = book))]
#[diesel(table_name = crate::schema::bookauthor)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(primary_key(book, author))]
pub struct BookAuthor {
    pub book: Uuid,
    pub author: i32,
}

#[derive(Insertable, Identifiable, Selectable, Queryable, Associations, Debug)]
#[diesel(belongs_to(Book, foreign_key = book))]
#[diesel(table_name = crate::schema::bookgenre)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(primary_key(book, genre))]
pub struct BookGenre {
    pub book: Uuid,
    pub genre: i32,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::review)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Review {
    pub id: Uuid,
    pub book: Uuid,
    pub owner: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::review)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewReview<'a> {
    pub book: Uuid,
    pub owner: Uuid,
    pub rating: i32,
    pub comment: Option<&'a str>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::quote)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Quote {
    pub id: Uuid,
    pub book: Uuid,
    pub owner: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::quote)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewQuote<'a> {
    pub book: Uuid,
    pub owner: Uuid,
    pub text: &'a str,
}

#[derive(Insertable, Queryable, Selectable, Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[diesel(table_name = crate::schema::quotevote)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct QuoteVote {
    pub quote: Uuid,
    pub voter: Uuid,
    pub kind: VoteKind,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::shelfitem)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewShelfItem {
    pub book: Uuid,
    pub owner: Uuid,
    pub status: ShelfStatus,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::readinglist)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ReadingList {
    pub id: Uuid,
    pub owner: Uuid,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::readinglist)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewReadingList<'a> {
    pub owner: Uuid,
    pub title: &'a str,
    pub description: &'a str,
    pub tags: &'a [String],
    pub is_public: bool,
}

#[derive(AsChangeset, Default, Debug)]
#[diesel(table_name = crate::schema::readinglist)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ReadingListChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Identifiable, Selectable, Queryable, Associations, Debug)]
#[diesel(belongs_to(ReadingList, foreign_key = list))]
#[diesel(table_name = crate::schema::readinglistbook)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(primary_key(list, book))]
pub struct ReadingListBook {
    pub list: Uuid,
    pub book: Uuid,
}

#[derive(Queryable, Selectable, Identifiable, PartialEq, Eq, Debug, Clone, serde::Serialize)]
#[diesel(table_name = crate::schema::industry)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Industry {
    #[serde(skip)]
    pub id: i32,
    pub name: String,
    pub job: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::industry)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewIndustry<'a> {
    pub name: &'a str,
    pub job: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::celebrity)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Celebrity {
    pub id: Uuid,
    pub name: String,
    pub photo: String,
    pub description: String,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::celebrity)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewCelebrity<'a> {
    pub name: &'a str,
    pub photo: &'a str,
    pub description: &'a str,
    pub website: Option<&'a str>,
    pub twitter: Option<&'a str>,
    pub instagram: Option<&'a str>,
    pub facebook: Option<&'a str>,
}

#[derive(Insertable, Identifiable, Selectable, Queryable, Associations, Debug)]
#[diesel(belongs_to(Celebrity, foreign_key = celebrity))]
#[diesel(table_name = crate::schema::celebrityindustry)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(primary_key(celebrity, industry))]
pub struct CelebrityIndustry {
    pub celebrity: Uuid,
    pub industry: i32,
}

#[derive(Insertable, Identifiable, Selectable, Queryable, Associations, Debug)]
#[diesel(belongs_to(Celebrity, foreign_key = celebrity))]
#[diesel(table_name = crate::schema::celebritybook)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(primary_key(celebrity, book))]
pub struct CelebrityBook {
    pub celebrity: Uuid,
    pub book: Uuid,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn palette_has_eighteen_colors() {
        assert_eq!(BookColor::ALL.len(), 18);
    }

    #[test]
    fn shelf_status_parses_wire_names() {
        assert_eq!("READ".parse::<ShelfStatus>(), Ok(ShelfStatus::Read));
        assert_eq!(
            "WANT_TO_READ".parse::<ShelfStatus>(),
            Ok(ShelfStatus::WantToRead)
        );
        assert_eq!(
            "read".parse::<ShelfStatus>(),
            Err(UnknownVariant("read".into()))
        );
    }

    #[test]
    fn enums_serialize_with_wire_names() {
        assert_eq!(
            serde_json::to_string(&VoteKind::Down).unwrap(),
            r#""DOWN""#
        );
        assert_eq!(
            serde_json::to_string(&BookColor::Fuchsia).unwrap(),
            r#""fuchsia""#
        );
    }
}
