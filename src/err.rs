use std::process::{ExitCode, Termination};

/// Stage of a search that a collaborator failure occured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    /// Grouping the sample records into per-dataset bundles.
    SampleAggregation,
    /// Loading entries and annotations for a dataset type.
    QueryComposition,
    /// Computing sort metadata for the candidate result set.
    Sorting,
    /// Loading transcripts for the displayed page.
    Formatting,
    /// Looking up a single variant.
    Lookup,
}

/// Errors raised by the search engine.
///
/// Each kind is raised synchronously and aborts the current search call.
#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    /// The search configuration cannot be executed as given.
    #[error("{0}")]
    InvalidSearch(String),
    /// A single query pass matched more than the configured maximal number of variants.
    #[error("This search returned too many results")]
    TooManyResults,
    /// A requested variant has no matching entry.
    #[error("Variant not present in seqr")]
    NotFound,
    /// The combination of genome release and dataset type is not known.
    #[error("Unsupported dataset type {dataset_type} for genome release {release}")]
    UnsupportedDataset {
        release: String,
        dataset_type: String,
    },
    /// The backing store failed.
    #[error("store failure during {stage}: {source}")]
    Store {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

impl SearchError {
    /// Construct a `SearchError::Store` tagged with the given stage.
    pub fn store(stage: Stage) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| SearchError::Store { stage, source }
    }
}

impl Termination for SearchError {
    fn report(self) -> ExitCode {
        match self {
            SearchError::InvalidSearch(_) | SearchError::UnsupportedDataset { .. } => {
                ExitCode::from(2)
            }
            SearchError::TooManyResults => ExitCode::from(3),
            SearchError::NotFound => ExitCode::from(4),
            SearchError::Store { .. } => ExitCode::from(1),
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use std::process::{ExitCode, Termination};

    use super::{SearchError, Stage};

    #[test]
    fn store_error_message() {
        let err = SearchError::store(Stage::QueryComposition)(anyhow::anyhow!("connection lost"));
        assert_eq!(
            err.to_string(),
            "store failure during query_composition: connection lost"
        );
    }

    #[test]
    fn too_many_results_message() {
        insta::assert_snapshot!(
            SearchError::TooManyResults.to_string(),
            @"This search returned too many results"
        );
    }

    #[rstest::rstest]
    #[case(SearchError::InvalidSearch(String::from("Invalid sort: bogus")), 2)]
    #[case(SearchError::TooManyResults, 3)]
    #[case(SearchError::NotFound, 4)]
    #[case(SearchError::store(Stage::Lookup)(anyhow::anyhow!("gone")), 1)]
    fn exit_codes(#[case] err: SearchError, #[case] code: u8) {
        assert_eq!(
            format!("{:?}", err.report()),
            format!("{:?}", ExitCode::from(code))
        );
    }
}
