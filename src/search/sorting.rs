//! Deterministic ordering of search results.
//!
//! Each sort strategy yields a tuple of comparable values, the genome-wide position is
//! always appended as the final tie-break.  Pairs are sorted internally first and then
//! ordered by their first member.

use std::{
    cmp::Ordering,
    collections::{BTreeSet, HashMap},
    str::FromStr,
};

use crate::{
    err::{SearchError, Stage},
    search::{
        ranks,
        schema::data::{SearchHit, Transcript, VariantResult},
        store::GeneMetadataSource,
    },
};

/// Sort value used for missing data, sorting last.
pub const MAX_SORT_RANK: f64 = 1e10;
/// Default for absent scores that are sorted descending.
const MIN_SORT_RANK: f64 = 0.0;
/// Default for absent in-silico predictions.
const MIN_PRED_SORT_RANK: f64 = -1.0;
/// Consequence rank given to structural variants in the main-transcript sort position.
const SV_MAIN_CONSEQUENCE_RANK: f64 = 4.5;
/// Size sort value of structural variants spanning chromosomes.
const CHROM_SPANNING_SIZE: f64 = -50.0;
/// Size sort value of variants without end position.
const NO_END_SIZE: f64 = -1.0;

/// The supported sort strategies.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortKind {
    /// Genomic position only.
    #[default]
    Xpos,
    Pathogenicity,
    PathogenicityHgmd,
    ProteinConsequence,
    Cadd,
    Revel,
    SpliceAi,
    Eigen,
    Mpc,
    PrimateAi,
    Alphamissense,
    CallsetAf,
    Gnomad,
    GnomadExomes,
    FamilyGuid,
    Size,
    Constraint,
    InOmim,
    PrioritizedGene,
}

impl SortKind {
    /// Parse an optional sort name, absent names sort by position.
    pub fn parse(name: Option<&str>) -> Result<Self, SearchError> {
        match name {
            None => Ok(SortKind::Xpos),
            Some(name) => SortKind::from_str(name)
                .map_err(|_| SearchError::InvalidSearch(format!("Invalid sort: {}", name))),
        }
    }

    /// Whether the strategy needs gene metadata.
    pub fn is_gene_sort(&self) -> bool {
        matches!(
            self,
            SortKind::Constraint | SortKind::InOmim | SortKind::PrioritizedGene
        )
    }

    /// Key of the prediction score, for predictor sorts.
    fn prediction(&self) -> Option<&'static str> {
        match self {
            SortKind::Cadd => Some("cadd"),
            SortKind::Revel => Some("revel"),
            SortKind::SpliceAi => Some("splice_ai"),
            SortKind::Eigen => Some("eigen"),
            SortKind::Mpc => Some("mpc"),
            SortKind::PrimateAi => Some("primate_ai"),
            _ => None,
        }
    }
}

/// One component of a sort key.
#[derive(Debug, Clone)]
pub enum SortValue {
    Num(f64),
    Text(String),
}

impl SortValue {
    /// Numeric value with negative zero normalized.
    fn num(value: f64) -> Self {
        SortValue::Num(if value == 0.0 { 0.0 } else { value })
    }
}

impl Ord for SortValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Num(a), SortValue::Num(b)) => a.total_cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Num(_), SortValue::Text(_)) => Ordering::Less,
            (SortValue::Text(_), SortValue::Num(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for SortValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortValue {}

/// Gene-level metadata consulted by the gene sorts.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneMetadata {
    /// Numeric rank per gene, lower is better.
    Ranks(HashMap<String, f64>),
    /// Genes with an OMIM phenotype.
    Omim(BTreeSet<String>),
}

/// Union of the genes referenced by the results.
fn result_gene_ids(results: &[SearchHit]) -> BTreeSet<String> {
    results
        .iter()
        .flat_map(|hit| hit.variants())
        .flat_map(variant_gene_ids)
        .collect()
}

/// Genes of a variant, from the consequences or the transcript map.
fn variant_gene_ids(variant: &VariantResult) -> Vec<String> {
    match variant.annotation.sorted_transcript_consequences.as_ref() {
        Some(csqs) if !csqs.is_empty() => csqs.iter().map(|csq| csq.gene_id.clone()).collect(),
        _ => variant
            .annotation
            .transcripts
            .as_ref()
            .map(|transcripts| transcripts.keys().cloned().collect())
            .unwrap_or_default(),
    }
}

/// Load the gene metadata needed by `sort`, `None` for sorts not based on genes.
pub fn get_sort_gene_metadata(
    sort: SortKind,
    results: &[SearchHit],
    family_guid: Option<&str>,
    genes: &dyn GeneMetadataSource,
    max_prioritized_gene_rank: i32,
) -> Result<Option<GeneMetadata>, SearchError> {
    if !sort.is_gene_sort() {
        return Ok(None);
    }
    let gene_ids = result_gene_ids(results);
    tracing::debug!("loading {} metadata for {} genes", sort, gene_ids.len());

    let metadata = match sort {
        SortKind::Constraint => GeneMetadata::Ranks(
            genes
                .constraint_ranks(&gene_ids)
                .map_err(SearchError::store(Stage::Sorting))?
                .into_iter()
                .map(|c| (c.gene_id, (c.mis_z_rank + c.pli_rank) as f64))
                .collect(),
        ),
        SortKind::InOmim => GeneMetadata::Omim(
            genes
                .omim_genes(&gene_ids)
                .map_err(SearchError::store(Stage::Sorting))?,
        ),
        _ => {
            let mut min_ranks: HashMap<String, f64> = HashMap::new();
            if let Some(family_guid) = family_guid {
                let priority_ranks = genes
                    .phenotype_priority_ranks(&gene_ids, family_guid)
                    .map_err(SearchError::store(Stage::Sorting))?;
                for (gene_id, rank) in priority_ranks {
                    if rank > max_prioritized_gene_rank {
                        continue;
                    }
                    let rank = rank as f64;
                    min_ranks
                        .entry(gene_id)
                        .and_modify(|min_rank| *min_rank = min_rank.min(rank))
                        .or_insert(rank);
                }
            }
            GeneMetadata::Ranks(min_ranks)
        }
    };
    Ok(Some(metadata))
}

/// Computes sort keys for one strategy.
#[derive(Debug, Clone)]
pub struct SortKeyBuilder<'a> {
    sort: SortKind,
    gene_metadata: Option<&'a GeneMetadata>,
}

impl<'a> SortKeyBuilder<'a> {
    pub fn new(sort: SortKind, gene_metadata: Option<&'a GeneMetadata>) -> Self {
        Self {
            sort,
            gene_metadata,
        }
    }

    /// The full sort key of a variant, including the trailing position.
    pub fn key(&self, variant: &VariantResult) -> Vec<SortValue> {
        let mut result = self.strategy_key(variant);
        result.push(SortValue::Num(variant.annotation.xpos as f64));
        result
    }

    fn strategy_key(&self, variant: &VariantResult) -> Vec<SortValue> {
        let annotation = &variant.annotation;
        if let Some(metadata) = self.gene_metadata {
            return gene_sort_key(metadata, variant);
        }
        if let Some(prediction) = self.sort.prediction() {
            let value = annotation
                .predictions
                .get(prediction)
                .copied()
                .flatten()
                .unwrap_or(MIN_PRED_SORT_RANK);
            return vec![SortValue::num(-value)];
        }

        match self.sort {
            SortKind::Pathogenicity => vec![clinvar_key(variant)],
            SortKind::PathogenicityHgmd => vec![
                clinvar_key(variant),
                SortValue::num(
                    annotation
                        .hgmd
                        .as_ref()
                        .and_then(|hgmd| hgmd.class.as_deref())
                        .and_then(ranks::hgmd_rank)
                        .unwrap_or(MAX_SORT_RANK),
                ),
            ],
            SortKind::ProteinConsequence => vec![
                SortValue::num(main_consequence_rank(variant)),
                SortValue::num(selected_consequence_rank(variant)),
            ],
            SortKind::Alphamissense => {
                let max_score = match annotation.sorted_transcript_consequences.as_ref() {
                    Some(csqs) if !csqs.is_empty() => csqs
                        .iter()
                        .map(|csq| csq.alphamissense_pathogenicity.unwrap_or(MIN_SORT_RANK))
                        .fold(f64::NEG_INFINITY, f64::max),
                    _ => -MIN_SORT_RANK,
                };
                let selected = variant
                    .selected_transcript
                    .as_ref()
                    .and_then(|csq| csq.alphamissense_pathogenicity)
                    .unwrap_or(MIN_SORT_RANK);
                vec![SortValue::num(-max_score), SortValue::num(-selected)]
            }
            SortKind::CallsetAf => vec![SortValue::num(
                population(variant, &["seqr", "sv_callset"])
                    .and_then(|pop| pop.ac)
                    .map(f64::from)
                    .unwrap_or(MAX_SORT_RANK),
            )],
            SortKind::Gnomad => vec![SortValue::num(
                population(variant, &["gnomad_genomes", "gnomad_mito", "gnomad_svs"])
                    .and_then(|pop| pop.af)
                    .unwrap_or(MAX_SORT_RANK),
            )],
            SortKind::GnomadExomes => vec![SortValue::num(
                population(variant, &["gnomad_exomes"])
                    .and_then(|pop| pop.af)
                    .unwrap_or(MAX_SORT_RANK),
            )],
            SortKind::FamilyGuid => vec![SortValue::Text(
                variant.families().into_iter().min().unwrap_or_default(),
            )],
            SortKind::Size => vec![SortValue::num(sv_size(variant))],
            _ => Vec::new(),
        }
    }
}

fn clinvar_key(variant: &VariantResult) -> SortValue {
    SortValue::num(
        variant
            .annotation
            .clinvar
            .as_ref()
            .and_then(|clinvar| clinvar.pathogenicity.as_deref())
            .and_then(ranks::clinvar_rank)
            .unwrap_or(ranks::ABSENT_CLINVAR_SORT_OFFSET),
    )
}

/// First population of `names` present in the variant's populations.
fn population<'v>(
    variant: &'v VariantResult,
    names: &[&str],
) -> Option<&'v crate::search::schema::data::PopulationFrequency> {
    names
        .iter()
        .find_map(|name| variant.annotation.populations.get(*name))
}

fn sv_size(variant: &VariantResult) -> f64 {
    let annotation = &variant.annotation;
    match annotation.end {
        None | Some(0) => NO_END_SIZE,
        Some(_) if annotation.end_chrom.is_some() => CHROM_SPANNING_SIZE,
        Some(end) => (annotation.pos - end) as f64,
    }
}

fn is_sv(variant: &VariantResult) -> bool {
    variant
        .annotation
        .sv_type
        .as_deref()
        .map(|sv_type| !sv_type.is_empty())
        .unwrap_or(false)
}

/// Transcript of the transcript map with the given identifier.
fn matched_transcript<'v>(variant: &'v VariantResult, transcript_id: Option<&str>) -> Option<&'v Transcript> {
    let transcript_id = transcript_id?;
    variant
        .annotation
        .transcripts
        .as_ref()?
        .values()
        .flatten()
        .find(|t| t.transcript_id.as_deref() == Some(transcript_id))
}

fn first_term_rank(terms: &[String]) -> f64 {
    terms
        .first()
        .and_then(|term| ranks::consequence_rank(term))
        .unwrap_or(MAX_SORT_RANK)
}

fn main_consequence_rank(variant: &VariantResult) -> f64 {
    if is_sv(variant) {
        return SV_MAIN_CONSEQUENCE_RANK;
    }
    let first_csq = variant
        .annotation
        .sorted_transcript_consequences
        .as_ref()
        .and_then(|csqs| csqs.first());
    if let Some(csq) = first_csq {
        first_term_rank(&csq.consequence_terms)
    } else if let Some(transcript) = matched_transcript(variant, variant.main_transcript_id.as_deref()) {
        first_term_rank(&transcript.consequence_terms)
    } else {
        MAX_SORT_RANK
    }
}

fn selected_consequence_rank(variant: &VariantResult) -> f64 {
    if is_sv(variant) {
        return variant
            .annotation
            .transcripts
            .as_ref()
            .into_iter()
            .flat_map(|transcripts| transcripts.values())
            .filter_map(|transcripts| transcripts.first())
            .map(|transcript| {
                transcript
                    .major_consequence
                    .as_deref()
                    .and_then(ranks::sv_consequence_rank)
                    .unwrap_or(MAX_SORT_RANK)
            })
            .fold(MAX_SORT_RANK, f64::min);
    }
    if let Some(csq) = variant.selected_transcript.as_ref() {
        first_term_rank(&csq.consequence_terms)
    } else if let Some(transcript) =
        matched_transcript(variant, variant.selected_main_transcript_id.as_deref())
    {
        first_term_rank(&transcript.consequence_terms)
    } else {
        MAX_SORT_RANK
    }
}

/// Gene chosen by the search, from the selected transcript or the gene filter.
fn selected_gene_id(variant: &VariantResult) -> Option<&str> {
    variant
        .selected_transcript
        .as_ref()
        .map(|csq| csq.gene_id.as_str())
        .filter(|gene_id| !gene_id.is_empty())
        .or(variant.selected_gene_id.as_deref())
}

fn gene_sort_key(metadata: &GeneMetadata, variant: &VariantResult) -> Vec<SortValue> {
    let gene_ids = variant_gene_ids(variant);
    match metadata {
        GeneMetadata::Omim(omim_genes) => {
            let selected_in_omim = selected_gene_id(variant)
                .map(|gene_id| omim_genes.contains(gene_id))
                .unwrap_or(false);
            let num_omim = gene_ids
                .iter()
                .filter(|gene_id| omim_genes.contains(*gene_id))
                .collect::<BTreeSet<_>>()
                .len();
            vec![
                SortValue::num(if selected_in_omim { 0.0 } else { 1.0 }),
                SortValue::num(-(num_omim as f64)),
            ]
        }
        GeneMetadata::Ranks(gene_ranks) => {
            let selected = selected_gene_id(variant)
                .and_then(|gene_id| gene_ranks.get(gene_id))
                .copied()
                .unwrap_or(MAX_SORT_RANK);
            let best = gene_ids
                .iter()
                .filter_map(|gene_id| gene_ranks.get(gene_id))
                .copied()
                .fold(MAX_SORT_RANK, f64::min);
            vec![SortValue::num(selected), SortValue::num(best)]
        }
    }
}

/// The sorted result set of a search.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheResults {
    pub all_results: Vec<SearchHit>,
    pub total_results: usize,
}

/// Sort all results of a search.
///
/// Pairs are ordered internally before the results are ordered by their first member.
/// The sort is stable so results with equal keys keep their relative order.
#[tracing::instrument(skip(results, genes))]
pub fn get_cache_results(
    mut results: Vec<SearchHit>,
    sort: SortKind,
    family_guid: Option<&str>,
    genes: &dyn GeneMetadataSource,
    max_prioritized_gene_rank: i32,
) -> Result<CacheResults, SearchError> {
    let before_sorting = std::time::Instant::now();
    let gene_metadata = get_sort_gene_metadata(
        sort,
        &results,
        family_guid,
        genes,
        max_prioritized_gene_rank,
    )?;
    let builder = SortKeyBuilder::new(sort, gene_metadata.as_ref());

    for hit in results.iter_mut() {
        if let SearchHit::Pair(pair) = hit {
            pair.sort_by_cached_key(|variant| builder.key(variant));
        }
    }
    results.sort_by_cached_key(|hit| builder.key(hit.sort_variant()));

    tracing::debug!(
        "sorting {} results took {:?}",
        results.len(),
        before_sorting.elapsed()
    );
    Ok(CacheResults {
        total_results: results.len(),
        all_results: results,
    })
}

#[cfg(test)]
mod test {
    use std::collections::{BTreeSet, HashMap};

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{get_cache_results, GeneMetadata, SortKeyBuilder, SortKind, SortValue};
    use crate::{
        err::{SearchError, Stage},
        search::{
            schema::data::{
                Annotation, Clinvar, SearchHit, TranscriptConsequence, VariantResult,
            },
            store::{ConstraintRanks, GeneMetadataSource},
        },
    };

    #[derive(Default)]
    struct Genes {
        fail: bool,
    }

    impl GeneMetadataSource for Genes {
        fn constraint_ranks(
            &self,
            gene_ids: &BTreeSet<String>,
        ) -> Result<Vec<ConstraintRanks>, anyhow::Error> {
            if self.fail {
                anyhow::bail!("constraint table unavailable");
            }
            Ok(gene_ids
                .iter()
                .filter(|gene_id| gene_id.as_str() != "G9")
                .map(|gene_id| ConstraintRanks {
                    gene_id: gene_id.clone(),
                    mis_z_rank: if gene_id == "G1" { 30 } else { 5 },
                    pli_rank: 2,
                })
                .collect())
        }

        fn omim_genes(&self, gene_ids: &BTreeSet<String>) -> Result<BTreeSet<String>, anyhow::Error> {
            Ok(gene_ids.iter().filter(|g| g.as_str() == "G2").cloned().collect())
        }

        fn phenotype_priority_ranks(
            &self,
            _gene_ids: &BTreeSet<String>,
            family_guid: &str,
        ) -> Result<Vec<(String, i32)>, anyhow::Error> {
            if family_guid != "F1" {
                return Ok(Vec::new());
            }
            Ok(vec![
                (String::from("G1"), 7),
                (String::from("G1"), 3),
                (String::from("G2"), 150),
            ])
        }
    }

    fn variant(key: u64, genes: &[&str]) -> VariantResult {
        VariantResult::from_annotation(Annotation {
            key,
            variant_id: format!("1-{}-A-G", key * 100),
            chrom: String::from("1"),
            pos: (key * 100) as i32,
            xpos: 1_000_000_000 + (key * 100) as i64,
            sorted_transcript_consequences: Some(
                genes
                    .iter()
                    .map(|gene_id| TranscriptConsequence {
                        gene_id: (*gene_id).to_owned(),
                        consequence_terms: vec![String::from("missense_variant")],
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        })
    }

    fn keys(results: &[SearchHit]) -> Vec<Vec<u64>> {
        results
            .iter()
            .map(|hit| hit.variants().iter().map(|v| v.annotation.key).collect())
            .collect()
    }

    fn sorted(results: Vec<SearchHit>, sort: SortKind) -> Result<Vec<Vec<u64>>, SearchError> {
        let results = get_cache_results(results, sort, Some("F1"), &Genes::default(), 100)?;
        assert_eq!(results.total_results, results.all_results.len());
        Ok(keys(&results.all_results))
    }

    #[rstest]
    #[case(None, Some(SortKind::Xpos))]
    #[case(Some("xpos"), Some(SortKind::Xpos))]
    #[case(Some("splice_ai"), Some(SortKind::SpliceAi))]
    #[case(Some("pathogenicity_hgmd"), Some(SortKind::PathogenicityHgmd))]
    #[case(Some("in_omim"), Some(SortKind::InOmim))]
    #[case(Some("loudness"), None)]
    fn parse(#[case] name: Option<&str>, #[case] expected: Option<SortKind>) {
        match (SortKind::parse(name), expected) {
            (Ok(kind), Some(expected)) => assert_eq!(kind, expected),
            (Err(SearchError::InvalidSearch(msg)), None) => {
                insta::assert_snapshot!(msg, @"Invalid sort: loudness")
            }
            (res, _) => panic!("unexpected {:?}", res),
        }
    }

    #[test]
    fn sort_value_order() {
        assert!(SortValue::num(-0.0) == SortValue::num(0.0));
        assert!(SortValue::Num(1e10) < SortValue::Text(String::from("F1")));
        assert!(SortValue::Text(String::from("F1")) < SortValue::Text(String::from("F2")));
    }

    #[test]
    fn size_of_structural_variants() -> Result<(), anyhow::Error> {
        let sv = |key: u64, pos: i32, end: Option<i32>, end_chrom: Option<&str>| {
            SearchHit::Single(VariantResult::from_annotation(Annotation {
                key,
                chrom: String::from("1"),
                pos,
                end,
                end_chrom: end_chrom.map(str::to_owned),
                xpos: 1_000_000_000 + pos as i64,
                sv_type: Some(String::from(if end_chrom.is_some() { "BND" } else { "DEL" })),
                ..Default::default()
            }))
        };
        let results = vec![
            sv(1, 1000, Some(1100), None),
            sv(2, 2000, Some(2500), None),
            sv(3, 500, None, Some("2")),
            sv(4, 100, Some(200), Some("3")),
        ];

        assert_eq!(
            sorted(results, SortKind::Size)?,
            vec![vec![2], vec![1], vec![4], vec![3]]
        );

        Ok(())
    }

    #[test]
    fn pathogenicity() -> Result<(), anyhow::Error> {
        let with_clinvar = |key: u64, pathogenicity: Option<&str>| {
            let mut v = variant(key, &["G1"]);
            v.annotation.clinvar = pathogenicity.map(|p| Clinvar {
                pathogenicity: Some(p.to_owned()),
                ..Default::default()
            });
            SearchHit::Single(v)
        };
        let results = vec![
            with_clinvar(1, Some("Benign")),
            with_clinvar(2, None),
            with_clinvar(3, Some("Uncertain_significance")),
            with_clinvar(4, Some("Pathogenic")),
        ];

        assert_eq!(
            sorted(results, SortKind::Pathogenicity)?,
            vec![vec![4], vec![3], vec![2], vec![1]]
        );

        Ok(())
    }

    #[test]
    fn pairs_sorted_internally() -> Result<(), anyhow::Error> {
        let with_cadd = |key: u64, cadd: Option<f64>| {
            let mut v = variant(key, &["G1"]);
            v.annotation.predictions.insert(String::from("cadd"), cadd);
            v
        };
        let results = vec![
            SearchHit::Single(with_cadd(1, Some(20.0))),
            SearchHit::Pair([with_cadd(2, Some(10.0)), with_cadd(3, Some(30.0))]),
            SearchHit::Single(with_cadd(4, None)),
        ];

        assert_eq!(
            sorted(results, SortKind::Cadd)?,
            vec![vec![3, 2], vec![1], vec![4]]
        );

        Ok(())
    }

    #[test]
    fn equal_keys_keep_position_order() -> Result<(), anyhow::Error> {
        let results = vec![
            SearchHit::Single(variant(3, &["G1"])),
            SearchHit::Single(variant(1, &["G1"])),
            SearchHit::Single(variant(2, &["G1"])),
        ];

        assert_eq!(
            sorted(results, SortKind::Revel)?,
            vec![vec![1], vec![2], vec![3]]
        );

        Ok(())
    }

    #[test]
    fn protein_consequence() -> Result<(), anyhow::Error> {
        let with_terms = |key: u64, term: &str| {
            let mut v = variant(key, &["G1"]);
            if let Some(csqs) = v.annotation.sorted_transcript_consequences.as_mut() {
                csqs[0].consequence_terms = vec![term.to_owned()];
            }
            SearchHit::Single(v)
        };
        let mut sv = variant(4, &[]);
        sv.annotation.sorted_transcript_consequences = None;
        sv.annotation.sv_type = Some(String::from("DEL"));
        let results = vec![
            with_terms(1, "intron_variant"),
            with_terms(2, "stop_gained"),
            with_terms(3, "missense_variant"),
            SearchHit::Single(sv),
        ];

        assert_eq!(
            sorted(results, SortKind::ProteinConsequence)?,
            vec![vec![2], vec![4], vec![3], vec![1]]
        );

        Ok(())
    }

    #[test]
    fn constraint() -> Result<(), anyhow::Error> {
        let results = vec![
            SearchHit::Single(variant(1, &["G1"])),
            SearchHit::Single(variant(2, &["G9", "G3"])),
            SearchHit::Single(variant(3, &["G9"])),
        ];

        assert_eq!(
            sorted(results, SortKind::Constraint)?,
            vec![vec![2], vec![1], vec![3]]
        );

        Ok(())
    }

    #[test]
    fn constraint_key_values() {
        let metadata = GeneMetadata::Ranks(HashMap::from([(String::from("G1"), 32.0)]));
        let builder = SortKeyBuilder::new(SortKind::Constraint, Some(&metadata));
        let mut v = variant(1, &["G1"]);
        v.selected_gene_id = Some(String::from("G1"));

        let key = builder.key(&v);

        match key.as_slice() {
            [SortValue::Num(selected), SortValue::Num(best), SortValue::Num(xpos)] => {
                assert!(float_cmp::approx_eq!(f64, *selected, 32.0, ulps = 2));
                assert!(float_cmp::approx_eq!(f64, *best, 32.0, ulps = 2));
                assert!(float_cmp::approx_eq!(f64, *xpos, 1_000_000_100.0, ulps = 2));
            }
            _ => panic!("unexpected key {:?}", key),
        }
    }

    #[test]
    fn in_omim() -> Result<(), anyhow::Error> {
        let mut selected = variant(3, &["G1", "G2"]);
        selected.selected_gene_id = Some(String::from("G2"));
        let results = vec![
            SearchHit::Single(variant(1, &["G1"])),
            SearchHit::Single(variant(2, &["G1", "G2"])),
            SearchHit::Single(selected),
        ];

        assert_eq!(
            sorted(results, SortKind::InOmim)?,
            vec![vec![3], vec![2], vec![1]]
        );

        Ok(())
    }

    #[test]
    fn prioritized_gene() -> Result<(), anyhow::Error> {
        let results = vec![
            SearchHit::Single(variant(1, &["G2"])),
            SearchHit::Single(variant(2, &["G1"])),
        ];

        // the G2 rank is above the cutoff
        assert_eq!(
            sorted(results, SortKind::PrioritizedGene)?,
            vec![vec![2], vec![1]]
        );

        Ok(())
    }

    #[test]
    fn family_guid() -> Result<(), anyhow::Error> {
        let with_families = |key: u64, families: &[&str]| {
            let mut v = variant(key, &["G1"]);
            v.family_guids = Some(families.iter().map(|f| (*f).to_owned()).collect());
            SearchHit::Single(v)
        };
        let results = vec![
            with_families(1, &["F3"]),
            with_families(2, &["F4", "F2"]),
            with_families(3, &["F1"]),
        ];

        assert_eq!(
            sorted(results, SortKind::FamilyGuid)?,
            vec![vec![3], vec![2], vec![1]]
        );

        Ok(())
    }

    #[test]
    fn metadata_failure_tagged() {
        let genes = Genes { fail: true };
        let res = get_cache_results(
            vec![SearchHit::Single(variant(1, &["G1"]))],
            SortKind::Constraint,
            None,
            &genes,
            100,
        );

        assert!(matches!(
            res,
            Err(SearchError::Store {
                stage: Stage::Sorting,
                ..
            })
        ));
    }
}
