//! Variant search with compound heterozygous resolution, sorting and formatting.

pub mod cli;
pub mod comp_het;
pub mod compose;
pub mod dataset;
pub mod evaluate;
pub mod genotypes;
pub mod interpreter;
pub mod lookup;
pub mod output;
pub mod ranks;
pub mod samples;
pub mod schema;
pub mod sorting;
pub mod store;

#[cfg(test)]
pub mod test_utils;

use std::{
    borrow::Cow,
    collections::{BTreeSet, HashSet},
    time::Instant,
};

use indexmap::IndexMap;
use thousands::Separable;

use crate::{
    common::GenomeRelease,
    err::SearchError,
    search::{
        compose::{Capabilities, QueryComposer},
        dataset::{DatasetKey, DatasetType, SampleType},
        evaluate::evaluate,
        genotypes::add_individual_guids,
        interpreter::{genotype::EntryMode, QueryInterpreter},
        lookup::KeyLookup,
        output::format_results,
        samples::{get_sample_data, AggregateOptions, SampleData},
        schema::{
            data::{SampleRecord, SearchHit},
            query::{AnnotationFilter, Gene, InheritanceMode, SearchSpec},
        },
        sorting::{get_cache_results, SortKind},
        store::{GeneMetadataSource, Liftover, VariantStore},
    },
};

/// Limits of the search engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Maximal number of results of a single query pass.
    pub max_variants: usize,
    /// Phenotype prioritization ranks above this value are ignored when sorting.
    pub max_prioritized_gene_rank: i32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_variants: 10_000,
            max_prioritized_gene_rank: 100,
        }
    }
}

/// One page of sorted search results.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    /// The results of the requested page.
    pub all_results: Vec<SearchHit>,
    /// Number of results over all pages.
    pub total_results: usize,
}

/// Search engine over a variant store for one genome release.
pub struct SearchEngine<'a> {
    store: &'a dyn VariantStore,
    genes: &'a dyn GeneMetadataSource,
    liftover: &'a dyn Liftover,
    release: GenomeRelease,
    config: SearchConfig,
}

impl<'a> SearchEngine<'a> {
    pub fn new(
        store: &'a dyn VariantStore,
        genes: &'a dyn GeneMetadataSource,
        liftover: &'a dyn Liftover,
        release: GenomeRelease,
        config: SearchConfig,
    ) -> Self {
        Self {
            store,
            genes,
            liftover,
            release,
            config,
        }
    }

    /// Search the variants of the given samples and return one page of the sorted results.
    ///
    /// Each dataset key of the samples is searched in turn.  Recessive searches combine the
    /// homozygous, X-linked (families with affected males) and compound heterozygous passes.
    /// Compound heterozygous pairs of a short variant and a structural variant are searched
    /// for families with calls in both datasets.
    #[tracing::instrument(skip(self, samples, spec))]
    pub fn search(
        &self,
        samples: &[SampleRecord],
        spec: &SearchSpec,
        page: usize,
        num_results: usize,
        sort: Option<&str>,
    ) -> Result<SearchResults, SearchError> {
        let before_search = Instant::now();
        spec.validate()?;
        let sort = SortKind::parse(sort)?;

        let inheritance_mode = spec.inheritance_mode;
        let has_comp_het = inheritance_mode
            .map(|mode| mode.has_comp_het())
            .unwrap_or(false);
        let has_x_chrom_comp_het = has_comp_het && spec.is_x_chrom_only(self.release);
        let sample_data_by_key = get_sample_data(
            samples,
            AggregateOptions {
                skip_multi_project_individual_guid: true,
                annotate_affected_male_families: has_x_chrom_comp_het
                    || inheritance_mode == Some(InheritanceMode::Recessive),
            },
        )?;
        let composer = QueryComposer::new(self.store, self.release, &spec.quality);

        let mut results = Vec::new();
        let mut family_guid = None;
        for (dataset_key, sample_data) in &sample_data_by_key {
            tracing::info!(
                "Loading {} data for {} families",
                dataset_key,
                sample_data.num_families.separate_with_commas()
            );
            family_guid = sample_data.first_family().cloned();
            let exclude_keys = spec.exclude_keys_for(&dataset_key.to_string());

            let mut dataset_results = Vec::new();
            if inheritance_mode != Some(InheritanceMode::CompoundHet) {
                let relation = composer.compose(
                    *dataset_key,
                    sample_data,
                    EntryMode::from_inheritance(inheritance_mode),
                    &QueryInterpreter::primary(spec),
                    &exclude_keys,
                )?;
                dataset_results.extend(evaluate(relation.rows, self.config.max_variants)?);
            }
            if inheritance_mode == Some(InheritanceMode::Recessive)
                && !spec.is_no_x_chrom(self.release)
            {
                let affected_male_families = sample_data.affected_male_families();
                if !affected_male_families.is_empty() {
                    let relation = composer.compose(
                        *dataset_key,
                        &sample_data.restrict_to_families(&affected_male_families),
                        EntryMode::XLinkedRecessive,
                        &QueryInterpreter::primary(spec),
                        &exclude_keys,
                    )?;
                    dataset_results.extend(evaluate(relation.rows, self.config.max_variants)?);
                }
            }
            if has_comp_het {
                let comp_het_sample_data = match sample_data.affected_male_family_guids.as_ref() {
                    Some(families) if has_x_chrom_comp_het && *dataset_key == DatasetKey::SnvIndel => {
                        let without = sample_data.without_families(families);
                        tracing::info!(
                            "Loading X-chromosome compound het data for {} families",
                            without.num_families
                        );
                        Cow::Owned(without)
                    }
                    _ => Cow::Borrowed(sample_data),
                };
                dataset_results.extend(self.comp_het_results(
                    &composer,
                    *dataset_key,
                    &comp_het_sample_data,
                    spec,
                )?);
            }

            if sample_data.samples.is_none() {
                add_individual_guids(&mut dataset_results, samples);
            }
            results.extend(dataset_results);
        }

        if has_comp_het
            && sample_data_by_key.contains_key(&DatasetKey::SnvIndel)
            && sample_data_by_key.keys().any(|key| key.is_sv())
        {
            results.extend(self.multi_type_comp_het_results(
                &composer,
                samples,
                &sample_data_by_key,
                spec,
            )?);
        }

        let cache_results = get_cache_results(
            results,
            sort,
            family_guid.as_deref(),
            self.genes,
            self.config.max_prioritized_gene_rank,
        )?;
        let total_results = cache_results.total_results;
        tracing::info!("Total results: {}", total_results.separate_with_commas());

        let begin = page
            .saturating_sub(1)
            .saturating_mul(num_results)
            .min(total_results);
        let end = begin.saturating_add(num_results).min(total_results);
        let page_results = cache_results
            .all_results
            .into_iter()
            .skip(begin)
            .take(end - begin)
            .collect();
        let all_results = format_results(page_results, self.release, self.store)?;
        tracing::debug!("search took {:?}", before_search.elapsed());

        Ok(SearchResults {
            all_results,
            total_results,
        })
    }

    /// Compound heterozygous pairs within one dataset.
    fn comp_het_results(
        &self,
        composer: &QueryComposer,
        dataset_key: DatasetKey,
        sample_data: &SampleData,
        spec: &SearchSpec,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let base = composer.search_entries(
            dataset_key,
            sample_data,
            EntryMode::CompoundHet,
            &HashSet::new(),
        )?;
        let capabilities = Capabilities::comp_het(sample_data.num_families, false);
        let primary = composer.join(
            &base,
            sample_data,
            &QueryInterpreter::primary(spec),
            capabilities,
        );
        let secondary = composer.join(
            &base,
            sample_data,
            &QueryInterpreter::secondary(spec),
            capabilities,
        );
        let pairs = comp_het::pair(
            &primary,
            &secondary,
            sample_data.num_families,
            &spec.exclude_key_pairs_for(&dataset_key.to_string()),
        );
        evaluate(pairs, self.config.max_variants)
    }

    /// Compound heterozygous pairs of a short variant and a structural variant.
    ///
    /// Both sides use the union of the primary and secondary annotation filters.  The short
    /// variant side accepts homozygous affected samples unless the variant is overlapped
    /// by the paired deletion.
    fn multi_type_comp_het_results(
        &self,
        composer: &QueryComposer,
        samples: &[SampleRecord],
        sample_data_by_key: &IndexMap<DatasetKey, SampleData>,
        spec: &SearchSpec,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let Some(snv_indel_data) = sample_data_by_key.get(&DatasetKey::SnvIndel) else {
            return Ok(Vec::new());
        };
        let annotations = merged_annotations(spec);
        let interpreter = QueryInterpreter::with_annotations(spec, annotations);
        let snv_indel_families = snv_indel_data.families();

        let mut results = Vec::new();
        for sample_type in [SampleType::Wes, SampleType::Wgs] {
            let sv_key = DatasetKey::from_parts(DatasetType::Sv, sample_type);
            let Some(sv_data) = sample_data_by_key.get(&sv_key) else {
                continue;
            };
            let families = snv_indel_families
                .intersection(&sv_data.families())
                .cloned()
                .collect::<BTreeSet<_>>();
            if families.is_empty() {
                continue;
            }
            tracing::info!(
                "Loading {}/{} data for {} families",
                DatasetKey::SnvIndel,
                sv_key,
                families.len()
            );
            let num_families = families.len();
            let type_snv_indel_data = snv_indel_data.restrict_to_families(&families);
            let type_sv_data = sv_data.restrict_to_families(&families);

            let snv_indel_base = composer.search_entries(
                DatasetKey::SnvIndel,
                &type_snv_indel_data,
                EntryMode::CompoundHetAllowHomAlts,
                &HashSet::new(),
            )?;
            let snv_indel = composer.join(
                &snv_indel_base,
                &type_snv_indel_data,
                &interpreter,
                Capabilities::comp_het(num_families, true),
            );
            let sv_base = composer.search_entries(
                sv_key,
                &type_sv_data,
                EntryMode::CompoundHet,
                &HashSet::new(),
            )?;
            let sv = composer.join(
                &sv_base,
                &type_sv_data,
                &interpreter,
                Capabilities::comp_het(num_families, false),
            );

            let pairs = comp_het::pair(
                &snv_indel,
                &sv,
                num_families,
                &spec.exclude_key_pairs_for(&format!("{},{}", DatasetKey::SnvIndel, sv_key)),
            );
            let mut dataset_results = evaluate(pairs, self.config.max_variants)?;
            if type_sv_data.samples.is_none() {
                add_individual_guids(&mut dataset_results, samples);
            }
            results.extend(dataset_results);
        }
        Ok(results)
    }

    /// Look up a variant in all families, see `lookup::lookup_variant()`.
    pub fn lookup(
        &self,
        variant_id: &str,
        dataset_type: DatasetType,
        sample_type: Option<SampleType>,
    ) -> Result<Vec<SearchHit>, SearchError> {
        lookup::lookup_variant(
            self.store,
            self.liftover,
            variant_id,
            self.release,
            dataset_type,
            sample_type,
        )
    }

    /// Look up a variant in the families of the samples, see `lookup::variant_by_id()`.
    pub fn variant_by_id(
        &self,
        variant_id: &str,
        samples: &[SampleRecord],
        dataset_type: DatasetType,
    ) -> Result<Option<SearchHit>, SearchError> {
        lookup::variant_by_id(self.store, variant_id, samples, self.release, dataset_type)
    }

    /// All short variants in a gene, see `lookup::variant_gene_lookup()`.
    pub fn gene_lookup(&self, gene: &Gene, spec: &SearchSpec) -> Result<Vec<SearchHit>, SearchError> {
        spec.validate()?;
        lookup::variant_gene_lookup(self.store, self.release, gene, spec)
    }

    /// Translate variant identifiers and keys, see `lookup::key_lookup()`.
    pub fn key_lookup(
        &self,
        dataset_key: DatasetKey,
        variant_ids: &[String],
        reverse: bool,
    ) -> Result<KeyLookup, SearchError> {
        lookup::key_lookup(self.store, self.release, dataset_key, variant_ids, reverse)
    }
}

/// Union of the primary and secondary annotation filters.
fn merged_annotations(spec: &SearchSpec) -> Option<AnnotationFilter> {
    match (spec.annotations.as_ref(), spec.annotations_secondary.as_ref()) {
        (Some(primary), Some(secondary)) => Some(primary.union(secondary)),
        (Some(annotations), None) | (None, Some(annotations)) => Some(annotations.clone()),
        (None, None) => None,
    }
}
