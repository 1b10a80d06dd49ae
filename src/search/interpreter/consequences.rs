use crate::search::schema::{
    data::{Annotation, TranscriptConsequence},
    query::{AnnotationFilter, PathogenicityFilter},
};

/// Result of `passes()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsequenceMatch {
    /// The first transcript consequence matching the consequence filter, within the
    /// selected genes if any.
    pub selected_transcript: Option<TranscriptConsequence>,
    /// Genes with a matching consequence, `None` if the variant passed without a
    /// consequence match.
    pub gene_ids: Option<Vec<String>>,
}

/// Determine whether the `Annotation` passes the annotation and pathogenicity filters.
///
/// When both filters are given, a variant passes if it matches either.  The selected
/// transcript is taken from `selected_genes` unless that is empty or has no match.
pub fn passes(
    annotations: Option<&AnnotationFilter>,
    pathogenicity: Option<&PathogenicityFilter>,
    selected_genes: &[String],
    annotation: &Annotation,
) -> Option<ConsequenceMatch> {
    let annotations = annotations.filter(|a| !a.is_empty());
    let pathogenicity = pathogenicity.filter(|p| !p.is_empty());
    if annotations.is_none() && pathogenicity.is_none() {
        return Some(ConsequenceMatch::default());
    }

    if let Some(filter) = annotations {
        if let Some(res) = passes_annotations(filter, selected_genes, annotation) {
            return Some(res);
        }
    }
    if let Some(filter) = pathogenicity {
        if passes_pathogenicity(filter, annotation) {
            return Some(ConsequenceMatch::default());
        }
    }

    tracing::trace!(
        "variant {} fails annotation filter {:?} / pathogenicity filter {:?}",
        &annotation.variant_id,
        annotations,
        pathogenicity
    );
    None
}

fn passes_annotations(
    filter: &AnnotationFilter,
    selected_genes: &[String],
    annotation: &Annotation,
) -> Option<ConsequenceMatch> {
    if let Some(csqs) = annotation.sorted_transcript_consequences.as_ref() {
        let matching = csqs
            .iter()
            .filter(|csq| {
                csq.consequence_terms
                    .iter()
                    .any(|term| filter.consequences.contains(term))
            })
            .collect::<Vec<_>>();
        let first = matching
            .iter()
            .find(|csq| selected_genes.contains(&csq.gene_id))
            .or_else(|| matching.first())?;
        let mut gene_ids: Vec<String> = Vec::new();
        for csq in &matching {
            if !gene_ids.contains(&csq.gene_id) {
                gene_ids.push(csq.gene_id.clone());
            }
        }
        return Some(ConsequenceMatch {
            selected_transcript: Some((*first).clone()),
            gene_ids: Some(gene_ids),
        });
    }

    if annotation
        .sv_type
        .as_ref()
        .map(|sv_type| filter.structural.contains(sv_type))
        .unwrap_or(false)
    {
        return Some(ConsequenceMatch::default());
    }
    let gene_ids = annotation
        .transcripts
        .iter()
        .flatten()
        .filter(|(_, transcripts)| {
            transcripts.iter().any(|t| {
                t.major_consequence
                    .as_ref()
                    .map(|csq| filter.structural_consequence.contains(csq))
                    .unwrap_or(false)
            })
        })
        .map(|(gene_id, _)| gene_id.clone())
        .collect::<Vec<_>>();
    if gene_ids.is_empty() {
        None
    } else {
        Some(ConsequenceMatch {
            selected_transcript: None,
            gene_ids: Some(gene_ids),
        })
    }
}

fn passes_pathogenicity(filter: &PathogenicityFilter, annotation: &Annotation) -> bool {
    let clinvar = annotation
        .clinvar
        .as_ref()
        .and_then(|c| c.pathogenicity.as_ref())
        .map(|p| filter.clinvar.contains(p))
        .unwrap_or(false);
    let hgmd = annotation
        .hgmd
        .as_ref()
        .and_then(|h| h.class.as_ref())
        .map(|c| filter.hgmd.contains(c))
        .unwrap_or(false);
    clinvar || hgmd
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::search::schema::{
        data::{Annotation, Clinvar, Transcript, TranscriptConsequence},
        query::{AnnotationFilter, PathogenicityFilter},
    };

    fn snv(csqs: &[(&str, &str)], clinvar: Option<&str>) -> Annotation {
        Annotation {
            sorted_transcript_consequences: Some(
                csqs.iter()
                    .map(|(gene_id, term)| TranscriptConsequence {
                        gene_id: (*gene_id).to_owned(),
                        consequence_terms: vec![(*term).to_owned()],
                        ..Default::default()
                    })
                    .collect(),
            ),
            clinvar: clinvar.map(|p| Clinvar {
                pathogenicity: Some(p.to_owned()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn filter(csqs: &[&str], structural: &[&str], sv_csqs: &[&str]) -> AnnotationFilter {
        let to_vec = |values: &[&str]| values.iter().map(|v| (*v).to_owned()).collect();
        AnnotationFilter {
            consequences: to_vec(csqs),
            structural: to_vec(structural),
            structural_consequence: to_vec(sv_csqs),
        }
    }

    #[test]
    fn passes_consequence_selects_transcript() {
        let var = snv(
            &[("G1", "intron_variant"), ("G2", "missense_variant")],
            None,
        );
        let res = super::passes(Some(&filter(&["missense_variant"], &[], &[])), None, &[], &var);
        let res = res.expect("should pass");
        assert_eq!(
            res.selected_transcript.map(|t| t.gene_id),
            Some(String::from("G2"))
        );
        assert_eq!(res.gene_ids, Some(vec![String::from("G2")]));
    }

    #[rstest]
    #[case(&[], "G1")]
    #[case(&["G2"], "G2")]
    // gene without matching consequence
    #[case(&["G3"], "G1")]
    fn passes_selects_transcript_in_genes(#[case] genes: &[&str], #[case] expected: &str) {
        let var = snv(
            &[
                ("G1", "missense_variant"),
                ("G2", "missense_variant"),
                ("G3", "intron_variant"),
            ],
            None,
        );
        let genes = genes.iter().map(|g| (*g).to_owned()).collect::<Vec<_>>();

        let res = super::passes(Some(&filter(&["missense_variant"], &[], &[])), None, &genes, &var);

        assert_eq!(
            res.and_then(|r| r.selected_transcript).map(|t| t.gene_id),
            Some(String::from(expected))
        );
    }

    #[rstest]
    // no filters
    #[case(None, None, None, true)]
    // consequence matches
    #[case(Some(vec!["intron_variant"]), None, None, true)]
    // consequence does not match
    #[case(Some(vec!["stop_gained"]), None, None, false)]
    // pathogenicity OR-ed with consequences
    #[case(Some(vec!["stop_gained"]), Some(vec!["Pathogenic"]), Some("Pathogenic"), true)]
    // pathogenicity alone must match
    #[case(None, Some(vec!["Pathogenic"]), Some("Benign"), false)]
    #[case(None, Some(vec!["Pathogenic"]), None, false)]
    fn passes_snv(
        #[case] csqs: Option<Vec<&str>>,
        #[case] clinvar_filter: Option<Vec<&str>>,
        #[case] clinvar: Option<&str>,
        #[case] expected: bool,
    ) {
        let var = snv(&[("G1", "intron_variant")], clinvar);
        let annotations = csqs.map(|csqs| filter(&csqs, &[], &[]));
        let pathogenicity = clinvar_filter.map(|values| PathogenicityFilter {
            clinvar: values.into_iter().map(str::to_owned).collect(),
            hgmd: vec![],
        });

        assert_eq!(
            super::passes(annotations.as_ref(), pathogenicity.as_ref(), &[], &var).is_some(),
            expected
        );
    }

    #[rstest]
    #[case(&["DEL"], &[], true)]
    #[case(&["DUP"], &[], false)]
    #[case(&[], &["LOF"], true)]
    #[case(&[], &["INTRONIC"], false)]
    fn passes_sv(#[case] structural: &[&str], #[case] sv_csqs: &[&str], #[case] expected: bool) {
        let var = Annotation {
            sv_type: Some(String::from("DEL")),
            transcripts: Some(indexmap::indexmap! {
                String::from("G1") => vec![Transcript {
                    major_consequence: Some(String::from("LOF")),
                    ..Default::default()
                }],
            }),
            ..Default::default()
        };
        let annotations = filter(&[], structural, sv_csqs);

        assert_eq!(
            super::passes(Some(&annotations), None, &[], &var).is_some(),
            expected
        );
    }

    #[test]
    fn sv_fails_consequence_only_filter() {
        let var = Annotation {
            sv_type: Some(String::from("DEL")),
            ..Default::default()
        };
        let annotations = filter(&["missense_variant"], &[], &[]);
        assert_eq!(super::passes(Some(&annotations), None, &[], &var), None);
    }
}
