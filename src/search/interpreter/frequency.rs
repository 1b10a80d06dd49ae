use indexmap::IndexMap;

use crate::search::schema::{data::Annotation, query::PopulationFilter};

/// Determine whether the `Annotation` passes the frequency filter.
///
/// Populations without data for the variant pass.
pub fn passes(freqs: &IndexMap<String, PopulationFilter>, annotation: &Annotation) -> bool {
    for (population, filter) in freqs {
        let Some(pop) = annotation.populations.get(population) else {
            continue;
        };
        let fails_af = matches!((filter.af, pop.af), (Some(max_af), Some(af)) if af > max_af);
        let fails_ac = matches!((filter.ac, pop.ac), (Some(max_ac), Some(ac)) if ac > max_ac);
        let fails_hh = match filter.hh {
            Some(max_hh) if pop.hom.is_some() || pop.hemi.is_some() => {
                pop.hom.unwrap_or(0) + pop.hemi.unwrap_or(0) > max_hh
            }
            _ => false,
        };
        if fails_af || fails_ac || fails_hh {
            tracing::trace!(
                "variant {} fails {} frequency filter {:?}",
                &annotation.variant_id,
                population,
                filter
            );
            return false;
        }
    }
    true
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use crate::search::schema::{
        data::{Annotation, PopulationFrequency},
        query::PopulationFilter,
    };

    #[rstest]
    // no filter
    #[case(None, None, None, Some(0.5), Some(100), Some(3), Some(1), true)]
    // af: pass
    #[case(Some(0.01), None, None, Some(0.01), None, None, None, true)]
    // af: fail
    #[case(Some(0.01), None, None, Some(0.02), None, None, None, false)]
    // ac: fail
    #[case(None, Some(5), None, None, Some(6), None, None, false)]
    // hh: pass
    #[case(None, None, Some(2), None, None, Some(1), Some(1), true)]
    // hh: fail
    #[case(None, None, Some(2), None, None, Some(2), Some(1), false)]
    // missing values pass
    #[case(Some(0.01), Some(5), Some(2), None, None, None, None, true)]
    #[allow(clippy::too_many_arguments)]
    fn passes(
        #[case] max_af: Option<f64>,
        #[case] max_ac: Option<i32>,
        #[case] max_hh: Option<i32>,
        #[case] af: Option<f64>,
        #[case] ac: Option<i32>,
        #[case] hom: Option<i32>,
        #[case] hemi: Option<i32>,
        #[case] expected: bool,
    ) {
        let freqs = indexmap::indexmap! {
            String::from("gnomad_genomes") => PopulationFilter {
                af: max_af,
                ac: max_ac,
                hh: max_hh,
            },
        };
        let annotation = Annotation {
            populations: indexmap::indexmap! {
                String::from("gnomad_genomes") => PopulationFrequency {
                    af,
                    ac,
                    hom,
                    hemi,
                    ..Default::default()
                },
            },
            ..Default::default()
        };

        assert_eq!(super::passes(&freqs, &annotation), expected);
    }

    #[test]
    fn passes_missing_population() {
        let freqs = indexmap::indexmap! {
            String::from("gnomad_exomes") => PopulationFilter {
                af: Some(0.0),
                ..Default::default()
            },
        };
        assert!(super::passes(&freqs, &Annotation::default()));
    }
}
