use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::{
    error::CatalogError,
    models::{QuoteVote, VoteKind},
    schema::{quotevote, review},
};

#[derive(serde::Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    /// Rounded to two decimals, zero without reviews.
    pub average_rating: f64,
    pub number_of_reviews: i64,
    /// `counts[i]` is the number of reviews rated `i + 1`.
    pub counts: [i64; 5],
}

impl ReviewStats {
    pub fn from_ratings(ratings: impl IntoIterator<Item = i32>) -> Self {
        let mut counts = [0i64; 5];
        let mut total = 0i64;
        let mut sum = 0i64;

        for rating in ratings {
            let Some(slot) = usize::try_from(rating - 1)
                .ok()
                .and_then(|i| counts.get_mut(i))
            else {
                tracing::warn!(rating, "ignoring out of range rating");
                continue;
            };

            *slot += 1;
            total += 1;
            sum += i64::from(rating);
        }

        let average_rating = match total {
            0 => 0.,
            n => (sum as f64 / n as f64 * 100.).round() / 100.,
        };

        Self {
            average_rating,
            number_of_reviews: total,
            counts,
        }
    }
}

pub async fn aggregate_reviews(
    conn: &mut AsyncPgConnection,
    book: Uuid,
) -> Result<ReviewStats, CatalogError> {
    let ratings: Vec<i32> = review::table
        .filter(review::book.eq(book))
        .select(review::rating)
        .load(conn)
        .await?;

    Ok(ReviewStats::from_ratings(ratings))
}

#[derive(serde::Serialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VoteTally {
    pub number_of_upvotes: i64,
    pub number_of_downvotes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_vote: Option<VoteKind>,
}

impl VoteTally {
    pub fn from_votes<'a>(
        votes: impl IntoIterator<Item = &'a QuoteVote>,
        viewer: Option<Uuid>,
    ) -> Self {
        votes.into_iter().fold(Self::default(), |mut tally, vote| {
            match vote.kind {
                VoteKind::Up => tally.number_of_upvotes += 1,
                VoteKind::Down => tally.number_of_downvotes += 1,
            }
            if Some(vote.voter) == viewer {
                tally.viewer_vote = Some(vote.kind);
            }
            tally
        })
    }
}

pub async fn aggregate_votes(
    conn: &mut AsyncPgConnection,
    quote: Uuid,
    viewer: Option<Uuid>,
) -> Result<VoteTally, CatalogError> {
    let votes: Vec<QuoteVote> = quotevote::table
        .filter(quotevote::quote.eq(quote))
        .select(QuoteVote::as_select())
        .load(conn)
        .await?;

    Ok(VoteTally::from_votes(&votes, viewer))
}
