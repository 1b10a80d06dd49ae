//! Lookup of single variants, variants in a gene and variant keys.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;

use crate::{
    common::{canonicalize, GenomeRelease},
    err::{SearchError, Stage},
    search::{
        dataset::{self, DatasetKey, DatasetType, SampleType},
        genotypes::add_individual_guids,
        interpreter::QueryInterpreter,
        output::format_results,
        samples::{get_sample_data, AggregateOptions, SampleData},
        schema::{
            data::{Annotation, EntryRow, GenotypeCall, SampleRecord, SearchHit, VariantResult},
            query::{Gene, LocusFilter, SearchSpec},
        },
        store::{Liftover, VariantStore},
    },
};

/// Number of variant identifiers translated per store query.
pub const KEY_LOOKUP_BATCH_SIZE: usize = 10_000;

/// Fraction of the structural variant length allowed as breakpoint deviation of
/// overlapping calls in the sibling store.
const SV_OVERLAP_PADDING: f64 = 0.2;

/// Identifier of a variant to look up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantId {
    /// Short variant as `chrom-pos-ref-alt`.
    Parsed {
        chrom: String,
        pos: i32,
        ref_: String,
        alt: String,
    },
    /// Structural variant identifier.
    Named(String),
}

impl VariantId {
    /// Parse the identifier as appropriate for the dataset.
    pub fn parse(dataset_key: DatasetKey, variant_id: &str) -> Result<Self, SearchError> {
        if dataset_key.is_sv() {
            return Ok(VariantId::Named(variant_id.to_owned()));
        }
        let invalid = || SearchError::InvalidSearch(format!("Invalid variant id: {}", variant_id));
        let parts = variant_id.split('-').collect::<Vec<_>>();
        let [chrom, pos, ref_, alt] = parts.as_slice() else {
            return Err(invalid());
        };
        Ok(VariantId::Parsed {
            chrom: canonicalize(chrom),
            pos: pos.parse().map_err(|_| invalid())?,
            ref_: (*ref_).to_owned(),
            alt: (*alt).to_owned(),
        })
    }

    /// The same alleles at another position.
    fn at(&self, chrom: &str, pos: i32) -> Option<Self> {
        match self {
            VariantId::Parsed { ref_, alt, .. } => Some(VariantId::Parsed {
                chrom: canonicalize(chrom),
                pos,
                ref_: ref_.clone(),
                alt: alt.clone(),
            }),
            VariantId::Named(_) => None,
        }
    }
}

impl std::fmt::Display for VariantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariantId::Parsed {
                chrom,
                pos,
                ref_,
                alt,
            } => write!(f, "{}-{}-{}-{}", chrom, pos, ref_, alt),
            VariantId::Named(id) => write!(f, "{}", id),
        }
    }
}

/// Dispatch key of a lookup, structural variants need the sample type.
fn lookup_dataset_key(
    dataset_type: DatasetType,
    sample_type: Option<SampleType>,
) -> Result<DatasetKey, SearchError> {
    match (dataset_type, sample_type) {
        (DatasetType::Sv, None) => Err(SearchError::InvalidSearch(String::from(
            "Sample type is required to look up structural variants",
        ))),
        (DatasetType::Sv, Some(sample_type)) => Ok(DatasetKey::from_parts(dataset_type, sample_type)),
        (DatasetType::SnvIndel, _) => Ok(DatasetKey::SnvIndel),
        (DatasetType::Mito, _) => Ok(DatasetKey::Mito),
    }
}

/// Group entry rows into genotype calls by family.
fn family_genotypes(entries: &[EntryRow]) -> IndexMap<String, Vec<GenotypeCall>> {
    let mut result: IndexMap<String, Vec<GenotypeCall>> = IndexMap::new();
    for entry in entries {
        result
            .entry(entry.family_guid.clone())
            .or_default()
            .extend(entry.calls.iter().map(|call| GenotypeCall {
                sample_type: Some(entry.sample_type),
                ..call.clone()
            }));
    }
    result
}

/// Build the result of a variant from its annotation and entry rows.
fn variant_with_entries(annotation: Annotation, entries: &[EntryRow]) -> VariantResult {
    let family_genotypes = family_genotypes(entries);
    let mut family_guids = family_genotypes.keys().cloned().collect::<Vec<_>>();
    family_guids.sort();
    VariantResult {
        family_guids: Some(family_guids),
        family_genotypes: Some(family_genotypes),
        ..VariantResult::from_annotation(annotation)
    }
}

/// Translate one variant identifier to its key.
fn lookup_key(
    store: &dyn VariantStore,
    release: GenomeRelease,
    dataset_key: DatasetKey,
    variant_id: &VariantId,
) -> Result<Option<u64>, SearchError> {
    Ok(store
        .key_lookup(release, dataset_key, &[variant_id.to_string()])
        .map_err(SearchError::store(Stage::Lookup))?
        .into_values()
        .next())
}

/// Look up a variant with its entries, optionally restricted to the families of `scope`.
///
/// Variants without any entry in scope are not found.
fn lookup_in(
    store: &dyn VariantStore,
    release: GenomeRelease,
    dataset_key: DatasetKey,
    variant_id: &VariantId,
    scope: Option<&SampleData>,
) -> Result<Option<VariantResult>, SearchError> {
    dataset::resolve(release, dataset_key)?;
    let Some(key) = lookup_key(store, release, dataset_key, variant_id)? else {
        return Ok(None);
    };

    let mut entries = store
        .entries_for_keys(release, dataset_key, &[key])
        .map_err(SearchError::store(Stage::Lookup))?;
    if let Some(sample_data) = scope {
        let entry_scope = sample_data.entry_scope();
        entries.retain(|entry| {
            entry_scope
                .get(&entry.sample_type)
                .map(|families| families.contains(&entry.family_guid))
                .unwrap_or(false)
        });
    }
    if entries.is_empty() {
        return Ok(None);
    }

    let annotation = store
        .annotations(release, dataset_key, &[key])
        .map_err(SearchError::store(Stage::Lookup))?
        .shift_remove(&key);
    Ok(annotation.map(|annotation| variant_with_entries(annotation, &entries)))
}

/// Merge the genotypes of the variant's counterpart in the lifted-over release.
fn add_liftover_genotypes(
    store: &dyn VariantStore,
    variant: &mut VariantResult,
    dataset_key: DatasetKey,
    variant_id: &VariantId,
) -> Result<(), SearchError> {
    let annotation = &variant.annotation;
    let Some(lifted_release) = annotation
        .lifted_over_genome_version
        .as_deref()
        .and_then(|version| version.parse::<GenomeRelease>().ok())
    else {
        return Ok(());
    };
    if dataset::resolve(lifted_release, dataset_key).is_err() {
        return Ok(());
    }
    let (Some(chrom), Some(pos)) = (annotation.lifted_over_chrom.as_deref(), annotation.lifted_over_pos)
    else {
        return Ok(());
    };
    let Some(lifted_id) = variant_id.at(chrom, pos) else {
        return Ok(());
    };
    let Some(key) = lookup_key(store, lifted_release, dataset_key, &lifted_id)? else {
        return Ok(());
    };

    let entries = store
        .entries_for_keys(lifted_release, dataset_key, &[key])
        .map_err(SearchError::store(Stage::Lookup))?;
    let lifted = family_genotypes(&entries);
    if lifted.is_empty() {
        return Ok(());
    }
    tracing::debug!(
        "merging genotypes of {} families from {} variant {}",
        lifted.len(),
        lifted_release.name(),
        &lifted_id
    );
    let mut lifted_family_guids = lifted.keys().cloned().collect::<Vec<_>>();
    lifted_family_guids.sort();
    variant
        .family_genotypes
        .get_or_insert_with(IndexMap::new)
        .extend(lifted);
    variant.lifted_family_guids = Some(lifted_family_guids);
    Ok(())
}

/// Calls of the sibling store overlapping a deletion or duplication at both breakpoints.
fn overlapping_svs(
    store: &dyn VariantStore,
    release: GenomeRelease,
    dataset_key: DatasetKey,
    variant: &VariantResult,
) -> Result<Vec<VariantResult>, SearchError> {
    let annotation = &variant.annotation;
    let sv_type = match annotation.sv_type.as_deref() {
        Some(sv_type @ ("DEL" | "DUP")) => sv_type,
        _ => return Ok(Vec::new()),
    };
    let (Some(sibling), Some(end)) = (dataset_key.sibling_sv(), annotation.end) else {
        return Ok(Vec::new());
    };
    if dataset::resolve(release, sibling).is_err() {
        return Ok(Vec::new());
    }

    let padding = ((end - annotation.pos) as f64 * SV_OVERLAP_PADDING) as i32;
    let sv_types = [sv_type.to_owned(), format!("gCNV_{}", sv_type)];
    let candidates = store
        .annotations_overlapping(
            release,
            sibling,
            &annotation.chrom,
            annotation.pos - padding,
            end + padding,
        )
        .map_err(SearchError::store(Stage::Lookup))?
        .into_iter()
        .filter(|other| {
            (other.pos - annotation.pos).abs() <= padding
                && other
                    .end
                    .map(|other_end| (other_end - end).abs() <= padding)
                    .unwrap_or(false)
                && other
                    .sv_type
                    .as_ref()
                    .map(|other_type| sv_types.contains(other_type))
                    .unwrap_or(false)
        })
        .collect::<Vec<_>>();
    let keys = candidates.iter().map(|a| a.key).collect::<Vec<_>>();
    let entries = store
        .entries_for_keys(release, sibling, &keys)
        .map_err(SearchError::store(Stage::Lookup))?;
    let mut entries_by_key: BTreeMap<u64, Vec<EntryRow>> = BTreeMap::new();
    for entry in entries {
        entries_by_key.entry(entry.key).or_default().push(entry);
    }

    Ok(candidates
        .into_iter()
        .filter_map(|other| {
            let entries = entries_by_key.get(&other.key)?;
            Some(variant_with_entries(other, entries))
        })
        .collect())
}

/// Look up a variant by identifier in all families.
///
/// Variants not found in `release` are lifted over to the other release if that release
/// carries the dataset.  The result starts with the variant, deletions and duplications
/// are followed by the matching calls of the other sequencing modality.
#[tracing::instrument(skip(store, liftover))]
pub fn lookup_variant(
    store: &dyn VariantStore,
    liftover: &dyn Liftover,
    variant_id: &str,
    release: GenomeRelease,
    dataset_type: DatasetType,
    sample_type: Option<SampleType>,
) -> Result<Vec<SearchHit>, SearchError> {
    let dataset_key = lookup_dataset_key(dataset_type, sample_type)?;
    tracing::info!(
        "Looking up variant {} with data type {}",
        variant_id,
        dataset_key
    );
    let parsed = VariantId::parse(dataset_key, variant_id)?;

    let mut found = None;
    if let Some(mut variant) = lookup_in(store, release, dataset_key, &parsed, None)? {
        add_liftover_genotypes(store, &mut variant, dataset_key, &parsed)?;
        found = Some((variant, release));
    } else if let VariantId::Parsed { chrom, pos, .. } = &parsed {
        let lifted_release = release.other();
        if dataset::resolve(lifted_release, dataset_key).is_ok() {
            let lifted = liftover
                .liftover(lifted_release, chrom, *pos)
                .map_err(SearchError::store(Stage::Lookup))?;
            if let Some(lifted_id) = lifted.and_then(|(chrom, pos)| parsed.at(&chrom, pos)) {
                tracing::debug!("trying {} in {}", &lifted_id, lifted_release.name());
                found = lookup_in(store, lifted_release, dataset_key, &lifted_id, None)?
                    .map(|variant| (variant, lifted_release));
            }
        }
    }
    let Some((variant, found_release)) = found else {
        return Err(SearchError::NotFound);
    };

    let mut variants = vec![variant];
    if dataset_key.is_sv() {
        variants.extend(overlapping_svs(store, found_release, dataset_key, &variants[0])?);
    }
    format_results(
        variants.into_iter().map(SearchHit::Single).collect(),
        found_release,
        store,
    )
}

/// Look up a variant by identifier in the families of the given samples.
///
/// Structural variants are looked up for each sample type present in the samples.
#[tracing::instrument(skip(store, samples))]
pub fn variant_by_id(
    store: &dyn VariantStore,
    variant_id: &str,
    samples: &[SampleRecord],
    release: GenomeRelease,
    dataset_type: DatasetType,
) -> Result<Option<SearchHit>, SearchError> {
    let samples = samples
        .iter()
        .filter(|s| s.dataset_type == dataset_type)
        .cloned()
        .collect::<Vec<_>>();
    let sample_data = get_sample_data(&samples, AggregateOptions::default())?;
    let dataset_keys = if dataset_type == DatasetType::Sv {
        samples
            .iter()
            .map(|s| DatasetKey::from_parts(dataset_type, s.sample_type))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>()
    } else {
        vec![lookup_dataset_key(dataset_type, None)?]
    };

    for dataset_key in dataset_keys {
        let Some(scope) = sample_data.get(&dataset_key) else {
            continue;
        };
        let parsed = VariantId::parse(dataset_key, variant_id)?;
        if let Some(variant) = lookup_in(store, release, dataset_key, &parsed, Some(scope))? {
            let mut hits = vec![SearchHit::Single(variant)];
            add_individual_guids(&mut hits, &samples);
            return Ok(format_results(hits, release, store)?.into_iter().next());
        }
    }
    Ok(None)
}

/// All short variants in a gene that pass the annotation filters, ordered by position.
///
/// Genotypes are not loaded.
#[tracing::instrument(skip(store, gene, spec), fields(gene_id = %gene.gene_id))]
pub fn variant_gene_lookup(
    store: &dyn VariantStore,
    release: GenomeRelease,
    gene: &Gene,
    spec: &SearchSpec,
) -> Result<Vec<SearchHit>, SearchError> {
    tracing::info!("Looking up variants in gene {}", &gene.gene_id);
    let dataset_key = DatasetKey::SnvIndel;
    dataset::resolve(release, dataset_key)?;

    let gene_spec = SearchSpec {
        locus: Some(LocusFilter {
            genes: IndexMap::from([(gene.gene_id.clone(), gene.clone())]),
            ..Default::default()
        }),
        ..spec.clone()
    };
    let interpreter = QueryInterpreter::primary(&gene_spec);

    let mut variants = store
        .annotations_in_genes(release, dataset_key, &[gene.gene_id.clone()])
        .map_err(SearchError::store(Stage::Lookup))?
        .into_iter()
        .filter_map(|annotation| {
            let selection = interpreter.passes(&annotation)?;
            Some(VariantResult {
                selected_gene_id: selection.selected_gene_id,
                selected_transcript: selection.selected_transcript,
                ..VariantResult::from_annotation(annotation)
            })
        })
        .collect::<Vec<_>>();
    variants.sort_by_key(|v| (v.annotation.xpos, v.annotation.key));
    tracing::debug!("found {} variants in gene", variants.len());

    format_results(
        variants.into_iter().map(SearchHit::Single).collect(),
        release,
        store,
    )
}

/// Result of a key lookup.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum KeyLookup {
    /// Keys by variant identifier.
    ByVariantId(IndexMap<String, u64>),
    /// Variant identifiers by key.
    ByKey(IndexMap<u64, String>),
}

impl KeyLookup {
    pub fn len(&self) -> usize {
        match self {
            KeyLookup::ByVariantId(lookup) => lookup.len(),
            KeyLookup::ByKey(lookup) => lookup.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Translate variant identifiers to keys in batches, or keys to identifiers if `reverse`.
pub fn key_lookup(
    store: &dyn VariantStore,
    release: GenomeRelease,
    dataset_key: DatasetKey,
    variant_ids: &[String],
    reverse: bool,
) -> Result<KeyLookup, SearchError> {
    dataset::resolve(release, dataset_key)?;
    let mut lookup = IndexMap::new();
    for batch in variant_ids.chunks(KEY_LOOKUP_BATCH_SIZE) {
        lookup.extend(
            store
                .key_lookup(release, dataset_key, batch)
                .map_err(SearchError::store(Stage::Lookup))?,
        );
    }
    tracing::debug!(
        "found keys for {} of {} variants",
        lookup.len(),
        variant_ids.len()
    );
    Ok(if reverse {
        KeyLookup::ByKey(lookup.into_iter().map(|(id, key)| (key, id)).collect())
    } else {
        KeyLookup::ByVariantId(lookup)
    })
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{key_lookup, lookup_variant, variant_by_id, variant_gene_lookup, KeyLookup, VariantId};
    use crate::{
        common::GenomeRelease,
        err::SearchError,
        search::{
            dataset::{DatasetKey, DatasetType, SampleType},
            schema::{
                data::{IndividualGenotypes, SearchHit},
                query::{AnnotationFilter, Gene, SearchSpec},
            },
            test_utils,
        },
    };

    fn keys(hits: &[SearchHit]) -> Vec<u64> {
        hits.iter().map(|hit| hit.sort_variant().annotation.key).collect()
    }

    #[rstest]
    #[case(DatasetKey::SnvIndel, "chr1-1000-A-G", Some("1-1000-A-G"))]
    #[case(DatasetKey::Mito, "M-73-A-G", Some("M-73-A-G"))]
    #[case(DatasetKey::SvWgs, "DEL_chr1_101", Some("DEL_chr1_101"))]
    #[case(DatasetKey::SnvIndel, "1-1000-A", None)]
    #[case(DatasetKey::SnvIndel, "1-x-A-G", None)]
    fn parse_variant_id(
        #[case] dataset_key: DatasetKey,
        #[case] variant_id: &str,
        #[case] expected: Option<&str>,
    ) {
        let parsed = VariantId::parse(dataset_key, variant_id).ok();
        assert_eq!(parsed.map(|id| id.to_string()).as_deref(), expected);
    }

    #[test]
    fn lookup_with_liftover_genotypes() -> Result<(), anyhow::Error> {
        let store = test_utils::comp_het_store()?;

        let hits = lookup_variant(
            &store,
            &store,
            "1-1000-A-G",
            GenomeRelease::Grch38,
            DatasetType::SnvIndel,
            None,
        )?;

        assert_eq!(keys(&hits), vec![1]);
        let variant = hits[0].sort_variant();
        assert_eq!(
            variant
                .family_genotypes
                .as_ref()
                .map(|gts| gts.keys().cloned().collect::<Vec<_>>()),
            Some(vec![String::from("F1"), String::from("F9")])
        );
        assert_eq!(variant.lifted_family_guids, Some(vec![String::from("F9")]));
        assert_eq!(variant.main_transcript_id.as_deref(), Some("T1"));

        Ok(())
    }

    #[test]
    fn lookup_falls_back_to_liftover() -> Result<(), anyhow::Error> {
        let store = test_utils::comp_het_store()?;

        let hits = lookup_variant(
            &store,
            &store,
            "1-1100-A-G",
            GenomeRelease::Grch38,
            DatasetType::SnvIndel,
            None,
        )?;

        assert_eq!(keys(&hits), vec![7]);
        assert_eq!(hits[0].sort_variant().annotation.variant_id, "1-900-A-G");

        Ok(())
    }

    #[test]
    fn lookup_not_found() -> Result<(), anyhow::Error> {
        let store = test_utils::comp_het_store()?;

        let res = lookup_variant(
            &store,
            &store,
            "1-1-A-C",
            GenomeRelease::Grch38,
            DatasetType::SnvIndel,
            None,
        );

        match res {
            Err(err @ SearchError::NotFound) => {
                insta::assert_snapshot!(err.to_string(), @"Variant not present in seqr")
            }
            other => panic!("unexpected {:?}", other),
        }

        Ok(())
    }

    #[test]
    fn lookup_overlapping_svs() -> Result<(), anyhow::Error> {
        let store = test_utils::comp_het_store()?;

        let hits = lookup_variant(
            &store,
            &store,
            "DEL_chr1_101",
            GenomeRelease::Grch38,
            DatasetType::Sv,
            Some(SampleType::Wes),
        )?;

        // the duplication and the call with the far-off start are skipped
        assert_eq!(keys(&hits), vec![101, 203, 201]);

        Ok(())
    }

    #[test]
    fn lookup_sv_requires_sample_type() -> Result<(), anyhow::Error> {
        let store = test_utils::comp_het_store()?;

        let res = lookup_variant(
            &store,
            &store,
            "DEL_chr1_101",
            GenomeRelease::Grch38,
            DatasetType::Sv,
            None,
        );

        assert!(matches!(res, Err(SearchError::InvalidSearch(_))));

        Ok(())
    }

    #[test]
    fn by_id_in_families() -> Result<(), anyhow::Error> {
        let store = test_utils::comp_het_store()?;
        let samples = test_utils::trio_samples();

        let hit = variant_by_id(
            &store,
            "1-2000-C-T",
            &samples,
            GenomeRelease::Grch38,
            DatasetType::SnvIndel,
        )?;

        let variant = hit.as_ref().map(|hit| hit.sort_variant()).expect("found");
        assert_eq!(variant.family_guids, Some(vec![String::from("F1")]));
        let genotypes = variant.genotypes.as_ref().expect("genotypes");
        assert!(matches!(&genotypes["I3"], IndividualGenotypes::One(record) if record.call.sample_id == "S3"));

        let missing = variant_by_id(
            &store,
            "1-900-A-G",
            &samples,
            GenomeRelease::Grch38,
            DatasetType::SnvIndel,
        )?;
        assert_eq!(missing, None);

        Ok(())
    }

    #[test]
    fn by_id_sv_sample_types() -> Result<(), anyhow::Error> {
        let store = test_utils::comp_het_store()?;
        let samples = test_utils::trio_samples_with_sv();

        let hit = variant_by_id(
            &store,
            "DEL_chr1_101",
            &samples,
            GenomeRelease::Grch38,
            DatasetType::Sv,
        )?;

        assert_eq!(hit.map(|hit| hit.sort_variant().annotation.key), Some(101));

        Ok(())
    }

    #[test]
    fn gene_lookup() -> Result<(), anyhow::Error> {
        let store = test_utils::comp_het_store()?;
        let gene = Gene {
            gene_id: String::from("G1"),
            chrom_grch38: Some(String::from("1")),
            ..Default::default()
        };

        let all = variant_gene_lookup(&store, GenomeRelease::Grch38, &gene, &SearchSpec::default())?;
        assert_eq!(keys(&all), vec![1, 2]);
        assert!(all
            .iter()
            .all(|hit| hit.sort_variant().family_genotypes.is_none()));

        let spec = SearchSpec {
            annotations: Some(AnnotationFilter {
                consequences: vec![String::from("stop_gained")],
                ..Default::default()
            }),
            ..Default::default()
        };
        let filtered = variant_gene_lookup(&store, GenomeRelease::Grch38, &gene, &spec)?;
        assert_eq!(keys(&filtered), vec![2]);

        Ok(())
    }

    #[test]
    fn key_lookup_batches() -> Result<(), anyhow::Error> {
        let store = test_utils::comp_het_store()?;
        let mut ids = (0..super::KEY_LOOKUP_BATCH_SIZE)
            .map(|i| format!("1-{}-A-A", i + 10_000_000))
            .collect::<Vec<_>>();
        ids.push(String::from("1-2000-C-T"));
        ids.push(String::from("1-1000-A-G"));

        let lookup = key_lookup(&store, GenomeRelease::Grch38, DatasetKey::SnvIndel, &ids, false)?;
        assert_eq!(
            lookup,
            KeyLookup::ByVariantId(indexmap::indexmap! {
                String::from("1-2000-C-T") => 2,
                String::from("1-1000-A-G") => 1,
            })
        );

        let reverse = key_lookup(&store, GenomeRelease::Grch38, DatasetKey::SnvIndel, &ids, true)?;
        assert_eq!(
            serde_json::to_string(&reverse)?,
            r#"{"2":"1-2000-C-T","1":"1-1000-A-G"}"#
        );

        Ok(())
    }
}
