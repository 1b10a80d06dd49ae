//! Composition of the filtered relation for one dataset and inheritance mode.
//!
//! Entry rows are loaded for the family scope of the sample data bundle and evaluated
//! family by family.  The passing entries are then joined to their annotations which are
//! checked with a `QueryInterpreter`.  Compound heterozygous searches join the same entry
//! base twice with different interpreters.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    time::Instant,
};

use indexmap::IndexMap;
use thousands::Separable;

use crate::{
    common::GenomeRelease,
    err::{SearchError, Stage},
    search::{
        dataset::{self, DatasetKey, DatasetStrategy, GenotypeSource},
        interpreter::{
            genotype::{self, EntryMode, FamilyEvaluation},
            quality, QueryInterpreter,
        },
        samples::SampleData,
        schema::{
            data::{
                Annotation, EntryRow, GenotypeCall, IndividualGenotype, IndividualGenotypes,
                VariantResult,
            },
            query::QualityFilter,
        },
        store::VariantStore,
    },
};

/// Signals exposed by a relation for the compound heterozygous resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Carriers are known per individual over the single family in scope.
    pub carriers: bool,
    /// Carriers are known per family.
    pub family_carriers: bool,
    /// Homozygous alternative affected samples are flagged over the single family.
    pub has_hom_alt: bool,
    /// Families without homozygous alternative affected samples are known.
    pub no_hom_alt_families: bool,
}

impl Capabilities {
    /// Capabilities of the relations of a compound heterozygous pass.
    pub fn comp_het(num_families: usize, annotate_hom_alts: bool) -> Self {
        let single = num_families <= 1;
        Self {
            carriers: single,
            family_carriers: !single,
            has_hom_alt: annotate_hom_alts && single,
            no_hom_alt_families: annotate_hom_alts && !single,
        }
    }
}

/// Entry-level match of one variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryMatch {
    pub key: u64,
    /// Calls of the passing rows, by family.
    pub family_calls: IndexMap<String, Vec<GenotypeCall>>,
    /// Unaffected carrier individuals, by family.
    pub family_carriers: BTreeMap<String, BTreeSet<String>>,
    /// Families with a homozygous alternative affected sample.
    pub hom_alt_families: BTreeSet<String>,
}

/// Entry matches of one dataset together with their annotations.
#[derive(Debug, Clone)]
pub struct EntryBase {
    pub dataset_key: DatasetKey,
    pub matches: Vec<EntryMatch>,
    pub annotations: IndexMap<u64, Annotation>,
}

/// One row of a composed relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub variant: VariantResult,
    /// Genes that the variant may be paired in.
    pub gene_ids: Vec<String>,
    pub family_carriers: BTreeMap<String, BTreeSet<String>>,
    pub hom_alt_families: BTreeSet<String>,
}

impl Candidate {
    /// Unaffected carriers over all families.
    pub fn carriers(&self) -> BTreeSet<String> {
        self.family_carriers.values().flatten().cloned().collect()
    }

    /// Carriers of the given family.
    pub fn carriers_of(&self, family_guid: &str) -> BTreeSet<String> {
        self.family_carriers
            .get(family_guid)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether any affected sample is homozygous alternative.
    pub fn has_hom_alt(&self) -> bool {
        !self.hom_alt_families.is_empty()
    }
}

/// The composed relation of one dataset.
#[derive(Debug, Clone)]
pub struct Relation {
    pub dataset_key: DatasetKey,
    /// Rows sorted by `(xpos, key)`.
    pub rows: Vec<Candidate>,
    pub capabilities: Capabilities,
}

/// Builds relations from the variant store.
pub struct QueryComposer<'a> {
    store: &'a dyn VariantStore,
    release: GenomeRelease,
    quality: &'a QualityFilter,
}

impl<'a> QueryComposer<'a> {
    pub fn new(store: &'a dyn VariantStore, release: GenomeRelease, quality: &'a QualityFilter) -> Self {
        Self {
            store,
            release,
            quality,
        }
    }

    /// Compose the relation of a single-hit pass.
    pub fn compose(
        &self,
        dataset_key: DatasetKey,
        sample_data: &SampleData,
        mode: EntryMode,
        interpreter: &QueryInterpreter,
        exclude_keys: &HashSet<u64>,
    ) -> Result<Relation, SearchError> {
        let base = self.search_entries(dataset_key, sample_data, mode, exclude_keys)?;
        Ok(self.join(&base, sample_data, interpreter, Capabilities::default()))
    }

    /// Load and evaluate the entry rows of the families in scope.
    pub fn search_entries(
        &self,
        dataset_key: DatasetKey,
        sample_data: &SampleData,
        mode: EntryMode,
        exclude_keys: &HashSet<u64>,
    ) -> Result<EntryBase, SearchError> {
        let strategy = dataset::resolve(self.release, dataset_key)?;
        let mut result = EntryBase {
            dataset_key,
            matches: Vec::new(),
            annotations: IndexMap::new(),
        };
        let scope = sample_data.entry_scope();
        if scope.is_empty() {
            return Ok(result);
        }

        let before_query = Instant::now();
        let rows = self
            .store
            .search_entries(self.release, dataset_key, &scope)
            .map_err(SearchError::store(Stage::QueryComposition))?;
        let mut grouped: BTreeMap<u64, IndexMap<&str, Vec<&EntryRow>>> = BTreeMap::new();
        for row in rows.iter().filter(|row| !exclude_keys.contains(&row.key)) {
            grouped
                .entry(row.key)
                .or_default()
                .entry(row.family_guid.as_str())
                .or_default()
                .push(row);
        }
        let keys = grouped.keys().copied().collect::<Vec<_>>();
        result.annotations = self
            .store
            .annotations(self.release, dataset_key, &keys)
            .map_err(SearchError::store(Stage::QueryComposition))?;

        for (key, families) in grouped {
            let Some(annotation) = result.annotations.get(&key) else {
                tracing::trace!("no annotation for {} key {}", dataset_key, key);
                continue;
            };
            let mut entry_match = EntryMatch {
                key,
                ..Default::default()
            };
            for (family_guid, family_rows) in families {
                let mut passed = false;
                let mut calls = Vec::new();
                let mut carriers = BTreeSet::new();
                let mut has_hom_alt = false;
                for row in &family_rows {
                    let Some(evaluation) = self.evaluate_row(
                        sample_data,
                        strategy,
                        mode,
                        &annotation.chrom,
                        row,
                        &family_rows,
                    ) else {
                        continue;
                    };
                    passed = true;
                    calls.extend(row_calls(sample_data, row));
                    carriers.extend(evaluation.carriers);
                    has_hom_alt |= evaluation.has_hom_alt;
                }
                if !passed {
                    continue;
                }
                entry_match
                    .family_calls
                    .insert(family_guid.to_owned(), calls);
                entry_match
                    .family_carriers
                    .insert(family_guid.to_owned(), carriers);
                if has_hom_alt {
                    entry_match.hom_alt_families.insert(family_guid.to_owned());
                }
            }
            if !entry_match.family_calls.is_empty() {
                result.matches.push(entry_match);
            }
        }

        tracing::debug!(
            "{} entry rows of {} yield {} {} matches in {:?}",
            rows.len().separate_with_commas(),
            dataset_key,
            result.matches.len().separate_with_commas(),
            mode,
            before_query.elapsed()
        );
        Ok(result)
    }

    /// Evaluate quality and inheritance constraints on one row.
    ///
    /// Calls of samples that lack the row's sample type are taken from the family's row
    /// of the other sample type.
    fn evaluate_row(
        &self,
        sample_data: &SampleData,
        strategy: &DatasetStrategy,
        mode: EntryMode,
        chrom: &str,
        row: &EntryRow,
        family_rows: &[&EntryRow],
    ) -> Option<FamilyEvaluation> {
        if !quality::passes_filters(self.quality, row) {
            return None;
        }
        let from_heteroplasmy = strategy.genotype_source == GenotypeSource::Heteroplasmy;

        let expected = sample_data.expected_samples(&row.family_guid, row.sample_type);
        let mut genotypes = Vec::with_capacity(expected.len());
        let mut calls = Vec::with_capacity(expected.len());
        for sample in expected {
            let source_row = if sample.sample_type == row.sample_type {
                Some(row)
            } else {
                family_rows
                    .iter()
                    .find(|r| r.sample_type == sample.sample_type)
                    .copied()
            };
            let call = source_row.and_then(|r| {
                r.calls
                    .iter()
                    .find(|call| call.sample_id == sample.sample_id)
            });
            let gt = call.and_then(|call| call.genotype(from_heteroplasmy));
            genotypes.push((sample, gt));
            if let Some(call) = call {
                calls.push((sample, call, gt));
            }
        }

        if !quality::passes_calls(self.quality, strategy.quality_fields, &calls) {
            return None;
        }
        let res = genotype::evaluate(mode, chrom, &genotypes);
        if res.is_none() {
            tracing::trace!(
                "entry {} / {} / {} fails {}",
                row.key,
                &row.family_guid,
                row.sample_type,
                mode
            );
        }
        res
    }

    /// Join the entry matches to their annotations and apply the annotation filters.
    pub fn join(
        &self,
        base: &EntryBase,
        sample_data: &SampleData,
        interpreter: &QueryInterpreter,
        capabilities: Capabilities,
    ) -> Relation {
        let mut rows = Vec::new();
        for entry_match in &base.matches {
            let Some(annotation) = base.annotations.get(&entry_match.key) else {
                continue;
            };
            let Some(selection) = interpreter.passes(annotation) else {
                continue;
            };

            let mut variant = VariantResult::from_annotation(annotation.clone());
            variant.selected_gene_id = selection.selected_gene_id;
            variant.selected_transcript = selection.selected_transcript;
            let mut family_guids = entry_match.family_calls.keys().cloned().collect::<Vec<_>>();
            family_guids.sort();
            variant.family_guids = Some(family_guids);
            if sample_data.samples.is_some() {
                variant.genotypes = Some(individual_genotypes(sample_data, entry_match));
            } else {
                variant.family_genotypes = Some(entry_match.family_calls.clone());
            }

            rows.push(Candidate {
                variant,
                gene_ids: selection.gene_ids,
                family_carriers: entry_match.family_carriers.clone(),
                hom_alt_families: entry_match.hom_alt_families.clone(),
            });
        }
        rows.sort_by_key(|row| (row.variant.annotation.xpos, row.variant.annotation.key));

        Relation {
            dataset_key: base.dataset_key,
            rows,
            capabilities,
        }
    }
}

/// Calls of the family samples in the row, tagged with the row's sample type.
fn row_calls(sample_data: &SampleData, row: &EntryRow) -> Vec<GenotypeCall> {
    let samples = sample_data.family_samples(&row.family_guid);
    row.calls
        .iter()
        .filter(|call| {
            samples
                .iter()
                .any(|s| s.sample_id == call.sample_id && s.sample_type == row.sample_type)
        })
        .map(|call| GenotypeCall {
            sample_type: Some(row.sample_type),
            ..call.clone()
        })
        .collect()
}

/// Genotypes keyed by individual, for bundles with per-sample details.
fn individual_genotypes(
    sample_data: &SampleData,
    entry_match: &EntryMatch,
) -> IndexMap<String, IndividualGenotypes> {
    let mut by_individual: IndexMap<String, Vec<IndividualGenotype>> = IndexMap::new();
    for (family_guid, calls) in &entry_match.family_calls {
        let samples = sample_data.family_samples(family_guid);
        for call in calls {
            let Some(sample) = samples
                .iter()
                .find(|s| s.sample_id == call.sample_id && Some(s.sample_type) == call.sample_type)
            else {
                continue;
            };
            by_individual
                .entry(sample.individual_guid.clone())
                .or_default()
                .push(IndividualGenotype {
                    individual_guid: Some(sample.individual_guid.clone()),
                    family_guid: family_guid.clone(),
                    call: call.clone(),
                });
        }
    }
    by_individual
        .into_iter()
        .map(|(individual_guid, records)| (individual_guid, IndividualGenotypes::from_records(records)))
        .collect()
}

#[cfg(test)]
mod test {
    use std::collections::{BTreeSet, HashSet};

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{Capabilities, QueryComposer};
    use crate::{
        common::GenomeRelease,
        search::{
            dataset::DatasetKey,
            interpreter::{genotype::EntryMode, QueryInterpreter},
            samples::{get_sample_data, AggregateOptions},
            schema::{
                data::IndividualGenotypes,
                query::{QualityFilter, SearchSpec},
            },
            test_utils,
        },
    };

    #[rstest]
    #[case(EntryMode::Any, vec![1, 2, 3, 6, 4])]
    #[case(EntryMode::AnyAffected, vec![1, 2, 3, 6, 4])]
    #[case(EntryMode::DeNovo, vec![6])]
    #[case(EntryMode::HomozygousRecessive, vec![3, 4])]
    #[case(EntryMode::XLinkedRecessive, vec![4])]
    #[case(EntryMode::CompoundHet, vec![1, 2, 6])]
    fn compose_trio(#[case] mode: EntryMode, #[case] expected: Vec<u64>) -> Result<(), anyhow::Error> {
        let store = test_utils::comp_het_store()?;
        let samples = test_utils::trio_samples();
        let sample_data = get_sample_data(&samples, AggregateOptions::default())?;
        let spec = SearchSpec::default();
        let composer = QueryComposer::new(&store, GenomeRelease::Grch38, &spec.quality);

        let relation = composer.compose(
            DatasetKey::SnvIndel,
            &sample_data[&DatasetKey::SnvIndel],
            mode,
            &QueryInterpreter::primary(&spec),
            &HashSet::new(),
        )?;

        assert_eq!(
            relation
                .rows
                .iter()
                .map(|row| row.variant.annotation.key)
                .collect::<Vec<_>>(),
            expected
        );

        Ok(())
    }

    #[test]
    fn compose_detail_genotypes() -> Result<(), anyhow::Error> {
        let store = test_utils::comp_het_store()?;
        let samples = test_utils::trio_samples();
        let sample_data = get_sample_data(&samples, AggregateOptions::default())?;
        let spec = SearchSpec::default();
        let composer = QueryComposer::new(&store, GenomeRelease::Grch38, &spec.quality);

        let relation = composer.compose(
            DatasetKey::SnvIndel,
            &sample_data[&DatasetKey::SnvIndel],
            EntryMode::HomozygousRecessive,
            &QueryInterpreter::primary(&spec),
            &HashSet::from([4]),
        )?;

        assert_eq!(relation.rows.len(), 1);
        let variant = &relation.rows[0].variant;
        assert_eq!(variant.family_guids, Some(vec![String::from("F1")]));
        assert_eq!(variant.family_genotypes, None);
        let genotypes = variant.genotypes.as_ref().expect("detail mode");
        assert_eq!(genotypes.len(), 3);
        match &genotypes["I1"] {
            IndividualGenotypes::One(record) => {
                assert_eq!(record.call.sample_id, "S1");
                assert_eq!(record.family_guid, "F1");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            relation.rows[0].carriers(),
            BTreeSet::from([String::from("I2"), String::from("I3")])
        );
        assert!(relation.rows[0].has_hom_alt());

        Ok(())
    }

    #[test]
    fn compose_quality_filter() -> Result<(), anyhow::Error> {
        let store = test_utils::comp_het_store()?;
        let samples = test_utils::trio_samples();
        let sample_data = get_sample_data(&samples, AggregateOptions::default())?;
        let spec = SearchSpec {
            quality: QualityFilter {
                min_gq: Some(40),
                ..Default::default()
            },
            ..Default::default()
        };
        let composer = QueryComposer::new(&store, GenomeRelease::Grch38, &spec.quality);

        let relation = composer.compose(
            DatasetKey::SnvIndel,
            &sample_data[&DatasetKey::SnvIndel],
            EntryMode::DeNovo,
            &QueryInterpreter::primary(&spec),
            &HashSet::new(),
        )?;

        // the de novo call has low genotype quality
        assert!(relation.rows.is_empty());

        Ok(())
    }

    #[rstest]
    #[case(1, false, Capabilities { carriers: true, family_carriers: false, has_hom_alt: false, no_hom_alt_families: false })]
    #[case(1, true, Capabilities { carriers: true, family_carriers: false, has_hom_alt: true, no_hom_alt_families: false })]
    #[case(2, true, Capabilities { carriers: false, family_carriers: true, has_hom_alt: false, no_hom_alt_families: true })]
    fn comp_het_capabilities(
        #[case] num_families: usize,
        #[case] annotate_hom_alts: bool,
        #[case] expected: Capabilities,
    ) {
        assert_eq!(Capabilities::comp_het(num_families, annotate_hom_alts), expected);
    }
}
