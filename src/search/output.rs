//! Formatting of search results for display.

use std::collections::{BTreeSet, HashMap};

use crate::{
    common::GenomeRelease,
    err::{SearchError, Stage},
    search::{
        schema::data::{SearchHit, Transcript, TranscriptConsequence, TranscriptMap, VariantResult},
        store::VariantStore,
    },
};

/// Attach transcripts to the results and pick the main and selected transcripts.
///
/// Transcripts of all variants without a transcript map are loaded in one batch.
/// Variants that already carry transcripts are passed through, so formatting twice
/// yields the same result.
#[tracing::instrument(skip(hits, store))]
pub fn format_results(
    hits: Vec<SearchHit>,
    release: GenomeRelease,
    store: &dyn VariantStore,
) -> Result<Vec<SearchHit>, SearchError> {
    let keys = hits
        .iter()
        .flat_map(|hit| hit.variants())
        .filter(|variant| variant.annotation.transcripts.is_none())
        .map(|variant| variant.annotation.key)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();
    let transcripts_by_key = if keys.is_empty() {
        HashMap::new()
    } else {
        store
            .transcripts_by_key(release, &keys)
            .map_err(SearchError::store(Stage::Formatting))?
    };
    tracing::debug!(
        "loaded transcripts for {} of {} variants",
        transcripts_by_key.len(),
        keys.len()
    );

    Ok(hits
        .into_iter()
        .map(|mut hit| {
            for variant in hit.variants_mut() {
                format_variant(variant, &transcripts_by_key);
            }
            hit
        })
        .collect())
}

fn format_variant(variant: &mut VariantResult, transcripts_by_key: &HashMap<u64, TranscriptMap>) {
    let selected_gene_id = variant.selected_gene_id.take();
    let selected_transcript = variant.selected_transcript.take();
    if variant.annotation.transcripts.is_some() {
        return;
    }

    let transcripts = transcripts_by_key
        .get(&variant.annotation.key)
        .cloned()
        .unwrap_or_default();
    let minimal_transcripts = variant
        .annotation
        .sorted_transcript_consequences
        .take()
        .unwrap_or_default();

    let main_transcript_id = minimal_transcripts.first().and_then(|csq| {
        transcripts
            .get(&csq.gene_id)?
            .iter()
            .find(|t| t.transcript_rank == Some(0))?
            .transcript_id
            .clone()
    });
    let selected_main_transcript_id = if let Some(selected) = selected_transcript.as_ref() {
        transcripts
            .get(&selected.gene_id)
            .and_then(|ts| ts.iter().find(|t| is_matched_minimal_transcript(t, selected)))
            .and_then(|t| t.transcript_id.clone())
    } else if let Some(gene_id) = selected_gene_id.as_ref() {
        transcripts
            .get(gene_id)
            .and_then(|ts| ts.first())
            .and_then(|t| t.transcript_id.clone())
    } else {
        None
    };

    variant.annotation.transcripts = Some(transcripts);
    variant.selected_main_transcript_id = if selected_main_transcript_id == main_transcript_id {
        None
    } else {
        selected_main_transcript_id
    };
    variant.main_transcript_id = main_transcript_id;
}

/// Whether the full transcript is the one described by the minimal consequence.
fn is_matched_minimal_transcript(transcript: &Transcript, minimal: &TranscriptConsequence) -> bool {
    transcript.canonical == minimal.canonical
        && transcript.consequence_terms == minimal.consequence_terms
        && transcript
            .utrannotator
            .as_ref()
            .and_then(|utr| utr.five_utr_consequence.as_ref())
            == minimal.five_utr_consequence.as_ref()
        && transcript
            .spliceregion
            .as_ref()
            .and_then(|region| region.extended_intronic_splice_region_variant)
            == minimal.extended_intronic_splice_region_variant
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::format_results;
    use crate::{
        common::GenomeRelease,
        search::{
            schema::data::{
                Annotation, SearchHit, SpliceRegionAnnotation, Transcript, TranscriptConsequence,
                TranscriptMap, UtrAnnotation, VariantResult,
            },
            store::in_memory::{InMemoryStore, StoreSnapshot},
        },
    };

    fn transcript(id: &str, gene_id: &str, rank: i32, terms: &[&str]) -> Transcript {
        Transcript {
            transcript_id: Some(id.to_owned()),
            gene_id: Some(gene_id.to_owned()),
            transcript_rank: Some(rank),
            consequence_terms: terms.iter().map(|t| (*t).to_owned()).collect(),
            ..Default::default()
        }
    }

    fn store() -> Result<InMemoryStore, anyhow::Error> {
        let mut g2_alt = transcript("T4", "G2", 1, &["missense_variant"]);
        g2_alt.canonical = Some(1);
        g2_alt.utrannotator = Some(UtrAnnotation {
            five_utr_consequence: None,
        });
        g2_alt.spliceregion = Some(SpliceRegionAnnotation {
            extended_intronic_splice_region_variant: Some(false),
        });
        let transcripts: TranscriptMap = indexmap::indexmap! {
            String::from("G1") => vec![
                transcript("T2", "G1", 1, &["intron_variant"]),
                transcript("T1", "G1", 0, &["missense_variant"]),
            ],
            String::from("G2") => vec![
                transcript("T3", "G2", 0, &["intron_variant"]),
                g2_alt,
            ],
        };
        let mut snapshot = StoreSnapshot::default();
        snapshot
            .transcripts
            .entry(GenomeRelease::Grch38)
            .or_default()
            .insert(1, transcripts);
        InMemoryStore::from_snapshot(snapshot)
    }

    fn csq(gene_id: &str, terms: &[&str]) -> TranscriptConsequence {
        TranscriptConsequence {
            gene_id: gene_id.to_owned(),
            consequence_terms: terms.iter().map(|t| (*t).to_owned()).collect(),
            ..Default::default()
        }
    }

    fn variant() -> VariantResult {
        VariantResult::from_annotation(Annotation {
            key: 1,
            variant_id: String::from("1-1000-A-G"),
            chrom: String::from("1"),
            pos: 1000,
            sorted_transcript_consequences: Some(vec![
                csq("G1", &["missense_variant"]),
                csq("G2", &["intron_variant"]),
            ]),
            ..Default::default()
        })
    }

    #[test]
    fn main_transcript() -> Result<(), anyhow::Error> {
        let store = store()?;

        let hits = format_results(vec![SearchHit::Single(variant())], GenomeRelease::Grch38, &store)?;

        let formatted = hits[0].sort_variant();
        assert_eq!(formatted.main_transcript_id.as_deref(), Some("T1"));
        assert_eq!(formatted.selected_main_transcript_id, None);
        assert_eq!(formatted.annotation.sorted_transcript_consequences, None);
        assert_eq!(
            formatted
                .annotation
                .transcripts
                .as_ref()
                .map(|ts| ts.keys().cloned().collect::<Vec<_>>()),
            Some(vec![String::from("G1"), String::from("G2")])
        );

        Ok(())
    }

    #[test]
    fn selected_transcript() -> Result<(), anyhow::Error> {
        let store = store()?;
        let mut selected = variant();
        let mut minimal = csq("G2", &["missense_variant"]);
        minimal.canonical = Some(1);
        minimal.extended_intronic_splice_region_variant = Some(false);
        selected.selected_transcript = Some(minimal);
        let mut by_gene = variant();
        by_gene.selected_gene_id = Some(String::from("G2"));
        let mut same_as_main = variant();
        same_as_main.selected_gene_id = Some(String::from("G1"));
        same_as_main.annotation.key = 2;

        let hits = format_results(
            vec![SearchHit::Pair([selected, by_gene]), SearchHit::Single(same_as_main)],
            GenomeRelease::Grch38,
            &store,
        )?;

        let ids = hits
            .iter()
            .flat_map(|hit| hit.variants())
            .map(|v| {
                (
                    v.main_transcript_id.clone(),
                    v.selected_main_transcript_id.clone(),
                    v.selected_gene_id.clone(),
                    v.selected_transcript.is_some(),
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(
            ids,
            vec![
                (Some(String::from("T1")), Some(String::from("T4")), None, false),
                (Some(String::from("T1")), Some(String::from("T3")), None, false),
                // key 2 has no transcripts
                (None, None, None, false),
            ]
        );

        Ok(())
    }

    #[test]
    fn idempotent() -> Result<(), anyhow::Error> {
        let store = store()?;
        let mut v = variant();
        v.selected_gene_id = Some(String::from("G2"));

        let once = format_results(vec![SearchHit::Single(v)], GenomeRelease::Grch38, &store)?;
        let twice = format_results(once.clone(), GenomeRelease::Grch38, &store)?;

        assert_eq!(once, twice);

        Ok(())
    }

    #[test]
    fn pass_through_with_transcripts() -> Result<(), anyhow::Error> {
        let store = InMemoryStore::from_snapshot(StoreSnapshot::default())?;
        let mut sv = VariantResult::from_annotation(Annotation {
            key: 7,
            sv_type: Some(String::from("DEL")),
            transcripts: Some(TranscriptMap::default()),
            ..Default::default()
        });
        sv.selected_gene_id = Some(String::from("G1"));

        let hits = format_results(vec![SearchHit::Single(sv.clone())], GenomeRelease::Grch38, &store)?;

        sv.selected_gene_id = None;
        assert_eq!(hits, vec![SearchHit::Single(sv)]);

        Ok(())
    }
}
