use diesel::{pg::upsert::excluded, prelude::*};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::{
    error::{translate_store_error, CatalogError, Entity},
    models::{QuoteVote, VoteKind},
    schema::quotevote,
};

/// Records the vote of `user` on `quote`.
///
/// `None` withdraws the vote, whether or not there was one. A new kind
/// replaces the previous vote so a user never has more than one.
pub async fn set_vote(
    conn: &mut AsyncPgConnection,
    user: Uuid,
    quote: Uuid,
    kind: Option<VoteKind>,
) -> Result<Option<QuoteVote>, CatalogError> {
    let Some(kind) = kind else {
        let removed = diesel::delete(
            quotevote::table
                .filter(quotevote::quote.eq(quote))
                .filter(quotevote::voter.eq(user)),
        )
        .execute(conn)
        .await?;

        tracing::debug!(%user, %quote, removed, "withdrew vote");
        return Ok(None);
    };

    let vote = diesel::insert_into(quotevote::table)
        .values(QuoteVote {
            quote,
            voter: user,
            kind,
        })
        .on_conflict((quotevote::quote, quotevote::voter))
        .do_update()
        .set(quotevote::kind.eq(excluded(quotevote::kind)))
        .returning(QuoteVote::as_returning())
        .get_result(conn)
        .await
        .map_err(translate_store_error(Entity::Quote))?;

    tracing::debug!(%user, %quote, %kind, "voted");

    Ok(Some(vote))
}
