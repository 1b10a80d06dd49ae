use crate::search::schema::{data::Annotation, query::InSilicoFilter};

/// Determine whether the `Annotation` passes the in-silico predictor filter.
///
/// The variant passes if any predictor with a score meets its threshold.  Variants
/// without any of the scores pass unless a score is required.
pub fn passes(filter: Option<&InSilicoFilter>, annotation: &Annotation) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    if filter.scores.is_empty() {
        return true;
    }

    let mut any_score = false;
    for (predictor, min_score) in &filter.scores {
        if let Some(Some(score)) = annotation.predictions.get(predictor) {
            any_score = true;
            if score >= min_score {
                return true;
            }
        }
    }

    let res = !any_score && !filter.require_score;
    if !res {
        tracing::trace!(
            "variant {} fails in-silico filter {:?}",
            &annotation.variant_id,
            filter
        );
    }
    res
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use crate::search::schema::{data::Annotation, query::InSilicoFilter};

    #[rstest]
    #[case(None, None, false, true)]
    #[case(Some(0.7), None, false, true)]
    #[case(Some(0.3), None, false, false)]
    #[case(Some(0.7), Some(25.0), false, true)]
    #[case(None, Some(10.0), false, false)]
    #[case(None, None, true, false)]
    #[case(Some(0.5), None, true, true)]
    fn passes(
        #[case] revel: Option<f64>,
        #[case] cadd: Option<f64>,
        #[case] require_score: bool,
        #[case] expected: bool,
    ) {
        let filter = InSilicoFilter {
            scores: indexmap::indexmap! {
                String::from("revel") => 0.5,
                String::from("cadd") => 20.0,
            },
            require_score,
        };
        let annotation = Annotation {
            predictions: indexmap::indexmap! {
                String::from("revel") => revel,
                String::from("cadd") => cadd,
            },
            ..Default::default()
        };

        assert_eq!(super::passes(Some(&filter), &annotation), expected);
    }

    #[test]
    fn passes_without_filter() {
        assert!(super::passes(None, &Annotation::default()));
        assert!(super::passes(
            Some(&InSilicoFilter::default()),
            &Annotation::default()
        ));
    }
}
