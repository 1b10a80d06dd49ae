//! Materialization of composed results with the result count ceiling.

use crate::{
    err::SearchError,
    search::{comp_het::PairedResult, compose::Candidate, schema::data::SearchHit},
};

impl From<Candidate> for SearchHit {
    fn from(value: Candidate) -> Self {
        SearchHit::Single(value.variant)
    }
}

/// The pair key is only needed for uniqueness and dropped here.
impl From<PairedResult> for SearchHit {
    fn from(value: PairedResult) -> Self {
        SearchHit::Pair(value.variants)
    }
}

/// Materialize at most `max_variants + 1` rows, failing if there are more than
/// `max_variants`.
pub fn evaluate<T, I>(rows: I, max_variants: usize) -> Result<Vec<SearchHit>, SearchError>
where
    T: Into<SearchHit>,
    I: IntoIterator<Item = T>,
{
    let result = rows
        .into_iter()
        .take(max_variants.saturating_add(1))
        .map(Into::into)
        .collect::<Vec<_>>();
    if result.len() > max_variants {
        tracing::warn!("search yields more than {} results", max_variants);
        return Err(SearchError::TooManyResults);
    }
    Ok(result)
}
