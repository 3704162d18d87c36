use std::collections::HashMap;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::{
    catalog::aggregate::VoteTally,
    error::{translate_store_error, CatalogError, Entity},
    models::{NewQuote, Quote, QuoteVote},
    schema::{quote, quotevote, users},
};

pub const MAX_QUOTE_LENGTH: usize = 500;

#[derive(serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QuoteDetails {
    pub id: Uuid,
    pub book: Uuid,
    pub text: String,
    pub user_name: String,
    pub is_mine: bool,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub votes: VoteTally,
}

fn check_text(text: &str) -> Result<(), CatalogError> {
    let len = text.trim().chars().count();
    if len == 0 || len > MAX_QUOTE_LENGTH {
        return Err(CatalogError::InvalidArgument("text"));
    }
    Ok(())
}

pub async fn add_quote(
    conn: &mut AsyncPgConnection,
    user: Uuid,
    book: Uuid,
    text: &str,
) -> Result<Quote, CatalogError> {
    check_text(text)?;

    let created = diesel::insert_into(quote::table)
        .values(NewQuote {
            book,
            owner: user,
            text,
        })
        .returning(Quote::as_returning())
        .get_result(conn)
        .await
        .map_err(translate_store_error(Entity::Book))?;

    tracing::debug!(id = %created.id, %book, "added quote");

    Ok(created)
}

/// Deletes a quote owned by `user`, along with its votes.
pub async fn delete_quote(
    conn: &mut AsyncPgConnection,
    user: Uuid,
    id: Uuid,
) -> Result<(), CatalogError> {
    let owner: Uuid = quote::table
        .find(id)
        .select(quote::owner)
        .get_result(conn)
        .await
        .map_err(translate_store_error(Entity::Quote))?;

    if owner != user {
        return Err(CatalogError::Forbidden(Entity::Quote));
    }

    diesel::delete(quote::table.find(id)).execute(conn).await?;

    Ok(())
}

/// Quotes of a book, newest first, each with its vote tally as seen by
/// `viewer`.
pub async fn book_quotes(
    conn: &mut AsyncPgConnection,
    book: Uuid,
    viewer: Option<Uuid>,
) -> Result<Vec<QuoteDetails>, CatalogError> {
    let quotes: Vec<(Quote, String)> = quote::table
        .inner_join(users::table)
        .filter(quote::book.eq(book))
        .select((Quote::as_select(), users::name))
        .order((quote::created_at.desc(), quote::id.asc()))
        .load(conn)
        .await?;

    let ids: Vec<Uuid> = quotes.iter().map(|(q, _)| q.id).collect();

    let votes: Vec<QuoteVote> = quotevote::table
        .filter(quotevote::quote.eq_any(ids))
        .select(QuoteVote::as_select())
        .load(conn)
        .await?;

    let mut by_quote: HashMap<Uuid, Vec<QuoteVote>> = HashMap::new();
    for vote in votes {
        by_quote.entry(vote.quote).or_default().push(vote);
    }

    Ok(quotes
        .into_iter()
        .map(|(quote, user_name)| {
            let votes = VoteTally::from_votes(
                by_quote.get(&quote.id).into_iter().flatten(),
                viewer,
            );

            QuoteDetails {
                id: quote.id,
                book: quote.book,
                text: quote.text,
                user_name,
                is_mine: Some(quote.owner) == viewer,
                created_at: quote.created_at,
                votes,
            }
        })
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        catalog::{testing, votes::set_vote},
        models::VoteKind,
    };

    #[test]
    fn quote_length() {
        assert!(check_text("").is_err());
        assert!(check_text("   ").is_err());
        assert!(check_text(&"é".repeat(MAX_QUOTE_LENGTH)).is_ok());
        assert!(check_text(&"é".repeat(MAX_QUOTE_LENGTH + 1)).is_err());
    }

    #[tokio::test]
    async fn quotes_carry_their_tallies() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };
        let alice = testing::user(&mut conn, "alice").await;
        let bob = testing::user(&mut conn, "bob").await;
        let book = testing::book(&mut conn, "Le Petit Prince").await;

        let quote = add_quote(
            &mut conn,
            alice,
            book,
            "On ne voit bien qu'avec le cœur.",
        )
        .await
        .unwrap();
        set_vote(&mut conn, alice, quote.id, Some(VoteKind::Up))
            .await
            .unwrap();
        set_vote(&mut conn, bob, quote.id, Some(VoteKind::Up))
            .await
            .unwrap();

        let quotes = book_quotes(&mut conn, book, Some(bob)).await.unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].user_name, "alice");
        assert!(!quotes[0].is_mine);
        assert_eq!(quotes[0].votes.number_of_upvotes, 2);
        assert_eq!(quotes[0].votes.viewer_vote, Some(VoteKind::Up));

        let anonymous = book_quotes(&mut conn, book, None).await.unwrap();
        assert_eq!(anonymous[0].votes.viewer_vote, None);
    }

    #[tokio::test]
    async fn only_the_owner_deletes() {
        let Some(mut conn) = testing::connection().await else {
            return;
        };
        let alice = testing::user(&mut conn, "alice").await;
        let bob = testing::user(&mut conn, "bob").await;
        let book = testing::book(&mut conn, "Bel-Ami").await;

        let quote = add_quote(&mut conn, alice, book, "Quote worth keeping")
            .await
            .unwrap();

        let err = delete_quote(&mut conn, bob, quote.id).await.unwrap_err();
        assert!(matches!(err, CatalogError::Forbidden(Entity::Quote)));

        delete_quote(&mut conn, alice, quote.id).await.unwrap();
        assert!(book_quotes(&mut conn, book, None).await.unwrap().is_empty());

        let err = delete_quote(&mut conn, alice, quote.id).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(Entity::Quote)));
    }
}
