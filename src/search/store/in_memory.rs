//! In-memory store backed by a JSON snapshot.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    path::Path,
    time::Instant,
};

use bio::data_structures::interval_tree::ArrayBackedIntervalTree;
use enum_map::EnumMap;
use indexmap::IndexMap;
use thousands::Separable;

use super::{ConstraintRanks, GeneMetadataSource, Liftover, VariantStore};
use crate::{
    common::{canonicalize, get_xpos, io::read_json_maybe_gz, trace_rss_now, GenomeRelease},
    search::{
        dataset::{self, DatasetKey, SampleType},
        schema::data::{Annotation, EntryRow, TranscriptMap},
    },
};

/// Alias for the interval tree that we use.
type IntervalTree = ArrayBackedIntervalTree<i32, u64>;

/// Entries and annotations of one dataset as stored in the snapshot.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSnapshot {
    #[serde(default)]
    pub entries: Vec<EntryRow>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

/// OMIM record of a gene.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OmimRecord {
    pub gene_id: String,
    #[serde(default)]
    pub phenotype_mim_number: Option<u32>,
}

/// Phenotype prioritization result of one gene for one family.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhenotypePrioritizationRecord {
    pub gene_id: String,
    pub family_guid: String,
    pub rank: i32,
}

/// One liftover mapping.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiftoverRecord {
    /// Release lifted to.
    pub target: GenomeRelease,
    pub chrom: String,
    pub pos: i32,
    pub lifted_chrom: String,
    pub lifted_pos: i32,
}

/// The snapshot as read from JSON.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default)]
    pub datasets: IndexMap<GenomeRelease, IndexMap<DatasetKey, DatasetSnapshot>>,
    /// Transcripts of short variants by release and key.
    #[serde(default)]
    pub transcripts: IndexMap<GenomeRelease, IndexMap<u64, TranscriptMap>>,
    #[serde(default)]
    pub constraint: Vec<ConstraintRanks>,
    #[serde(default)]
    pub omim: Vec<OmimRecord>,
    #[serde(default)]
    pub phenotype_prioritization: Vec<PhenotypePrioritizationRecord>,
    #[serde(default)]
    pub liftover: Vec<LiftoverRecord>,
}

/// Indexed data of one dataset.
#[derive(Debug, Default)]
struct DatasetIndex {
    entries: Vec<EntryRow>,
    entries_by_key: multimap::MultiMap<u64, usize>,
    annotations: IndexMap<u64, Annotation>,
    keys_by_variant_id: HashMap<String, u64>,
    keys_by_gene: multimap::MultiMap<String, u64>,
    trees: HashMap<String, IntervalTree>,
}

impl DatasetIndex {
    fn build(snapshot: DatasetSnapshot) -> Result<Self, anyhow::Error> {
        let mut result = DatasetIndex::default();
        for mut annotation in snapshot.annotations {
            if annotation.xpos == 0 {
                annotation.xpos = get_xpos(&annotation.chrom, annotation.pos)?;
            }
            result
                .keys_by_variant_id
                .insert(annotation.variant_id.clone(), annotation.key);
            for gene_id in annotation.gene_ids() {
                result.keys_by_gene.insert(gene_id, annotation.key);
            }
            let begin = annotation.pos - 1;
            let end = annotation.end.unwrap_or(annotation.pos).max(annotation.pos);
            result
                .trees
                .entry(canonicalize(&annotation.chrom))
                .or_insert_with(IntervalTree::new)
                .insert(begin..end, annotation.key);
            result.annotations.insert(annotation.key, annotation);
        }
        for (idx, entry) in snapshot.entries.into_iter().enumerate() {
            result.entries_by_key.insert(entry.key, idx);
            result.entries.push(entry);
        }
        result.trees.values_mut().for_each(|tree| tree.index());
        Ok(result)
    }
}

/// Store keeping all data in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    datasets: EnumMap<GenomeRelease, IndexMap<DatasetKey, DatasetIndex>>,
    transcripts: EnumMap<GenomeRelease, HashMap<u64, TranscriptMap>>,
    constraint: HashMap<String, ConstraintRanks>,
    omim: BTreeSet<String>,
    phenotype_priority: multimap::MultiMap<String, (String, i32)>,
    liftover: HashMap<(GenomeRelease, String, i32), (String, i32)>,
}

impl InMemoryStore {
    /// Build the store from a snapshot, failing for unsupported datasets.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self, anyhow::Error> {
        let mut result = InMemoryStore::default();
        for (release, datasets) in snapshot.datasets {
            for (dataset_key, data) in datasets {
                dataset::resolve(release, dataset_key)?;
                tracing::debug!(
                    "indexing {} entries and {} annotations of {} / {}",
                    data.entries.len().separate_with_commas(),
                    data.annotations.len().separate_with_commas(),
                    release.name(),
                    dataset_key
                );
                result.datasets[release].insert(dataset_key, DatasetIndex::build(data)?);
            }
        }
        for (release, transcripts) in snapshot.transcripts {
            result.transcripts[release].extend(transcripts);
        }
        result.constraint = snapshot
            .constraint
            .into_iter()
            .map(|record| (record.gene_id.clone(), record))
            .collect();
        result.omim = snapshot
            .omim
            .into_iter()
            .filter(|record| record.phenotype_mim_number.is_some())
            .map(|record| record.gene_id)
            .collect();
        for record in snapshot.phenotype_prioritization {
            result
                .phenotype_priority
                .insert(record.family_guid, (record.gene_id, record.rank));
        }
        result.liftover = snapshot
            .liftover
            .into_iter()
            .map(|record| {
                (
                    (record.target, canonicalize(&record.chrom), record.pos),
                    (record.lifted_chrom, record.lifted_pos),
                )
            })
            .collect();
        Ok(result)
    }

    /// Load the store from a (maybe gzip-compressed) JSON file.
    #[tracing::instrument]
    pub fn load(path: &Path) -> Result<Self, anyhow::Error> {
        tracing::info!("loading store snapshot from {:?}", path);
        let before_loading = Instant::now();
        let snapshot: StoreSnapshot = read_json_maybe_gz(path)?;
        tracing::debug!("done reading snapshot in {:?}", before_loading.elapsed());

        let before_indexing = Instant::now();
        let result = Self::from_snapshot(snapshot)?;
        tracing::debug!("done indexing snapshot in {:?}", before_indexing.elapsed());
        trace_rss_now();

        Ok(result)
    }

    fn dataset(
        &self,
        release: GenomeRelease,
        dataset_key: DatasetKey,
    ) -> Result<Option<&DatasetIndex>, anyhow::Error> {
        dataset::resolve(release, dataset_key)?;
        Ok(self.datasets[release].get(&dataset_key))
    }
}

impl VariantStore for InMemoryStore {
    fn search_entries(
        &self,
        release: GenomeRelease,
        dataset_key: DatasetKey,
        scope: &BTreeMap<SampleType, BTreeSet<String>>,
    ) -> Result<Vec<EntryRow>, anyhow::Error> {
        let Some(dataset) = self.dataset(release, dataset_key)? else {
            return Ok(Vec::new());
        };
        Ok(dataset
            .entries
            .iter()
            .filter(|entry| {
                scope
                    .get(&entry.sample_type)
                    .map(|families| families.contains(&entry.family_guid))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    fn entries_for_keys(
        &self,
        release: GenomeRelease,
        dataset_key: DatasetKey,
        keys: &[u64],
    ) -> Result<Vec<EntryRow>, anyhow::Error> {
        let Some(dataset) = self.dataset(release, dataset_key)? else {
            return Ok(Vec::new());
        };
        Ok(keys
            .iter()
            .filter_map(|key| dataset.entries_by_key.get_vec(key))
            .flatten()
            .map(|idx| dataset.entries[*idx].clone())
            .collect())
    }

    fn annotations(
        &self,
        release: GenomeRelease,
        dataset_key: DatasetKey,
        keys: &[u64],
    ) -> Result<IndexMap<u64, Annotation>, anyhow::Error> {
        let Some(dataset) = self.dataset(release, dataset_key)? else {
            return Ok(IndexMap::new());
        };
        Ok(keys
            .iter()
            .filter_map(|key| dataset.annotations.get(key).map(|a| (*key, a.clone())))
            .collect())
    }

    fn annotations_in_genes(
        &self,
        release: GenomeRelease,
        dataset_key: DatasetKey,
        gene_ids: &[String],
    ) -> Result<Vec<Annotation>, anyhow::Error> {
        let Some(dataset) = self.dataset(release, dataset_key)? else {
            return Ok(Vec::new());
        };
        let mut seen = HashSet::new();
        Ok(gene_ids
            .iter()
            .filter_map(|gene_id| dataset.keys_by_gene.get_vec(gene_id))
            .flatten()
            .filter(|key| seen.insert(**key))
            .filter_map(|key| dataset.annotations.get(key).cloned())
            .collect())
    }

    fn annotations_overlapping(
        &self,
        release: GenomeRelease,
        dataset_key: DatasetKey,
        chrom: &str,
        start: i32,
        end: i32,
    ) -> Result<Vec<Annotation>, anyhow::Error> {
        let Some(dataset) = self.dataset(release, dataset_key)? else {
            return Ok(Vec::new());
        };
        let Some(tree) = dataset.trees.get(&canonicalize(chrom)) else {
            return Ok(Vec::new());
        };
        let mut keys = tree
            .find((start - 1).max(0)..end.max(start))
            .iter()
            .map(|e| *e.data())
            .collect::<Vec<_>>();
        keys.sort_unstable();
        keys.dedup();
        let mut result = keys
            .iter()
            .filter_map(|key| dataset.annotations.get(key).cloned())
            .collect::<Vec<_>>();
        result.sort_by_key(|a| (a.xpos, a.key));
        Ok(result)
    }

    fn key_lookup(
        &self,
        release: GenomeRelease,
        dataset_key: DatasetKey,
        variant_ids: &[String],
    ) -> Result<IndexMap<String, u64>, anyhow::Error> {
        let Some(dataset) = self.dataset(release, dataset_key)? else {
            return Ok(IndexMap::new());
        };
        Ok(variant_ids
            .iter()
            .filter_map(|id| {
                dataset
                    .keys_by_variant_id
                    .get(id)
                    .map(|key| (id.clone(), *key))
            })
            .collect())
    }

    fn transcripts_by_key(
        &self,
        release: GenomeRelease,
        keys: &[u64],
    ) -> Result<HashMap<u64, TranscriptMap>, anyhow::Error> {
        Ok(keys
            .iter()
            .filter_map(|key| {
                self.transcripts[release]
                    .get(key)
                    .map(|transcripts| (*key, transcripts.clone()))
            })
            .collect())
    }
}

impl GeneMetadataSource for InMemoryStore {
    fn constraint_ranks(
        &self,
        gene_ids: &BTreeSet<String>,
    ) -> Result<Vec<ConstraintRanks>, anyhow::Error> {
        Ok(gene_ids
            .iter()
            .filter_map(|gene_id| self.constraint.get(gene_id).cloned())
            .collect())
    }

    fn omim_genes(&self, gene_ids: &BTreeSet<String>) -> Result<BTreeSet<String>, anyhow::Error> {
        Ok(gene_ids.intersection(&self.omim).cloned().collect())
    }

    fn phenotype_priority_ranks(
        &self,
        gene_ids: &BTreeSet<String>,
        family_guid: &str,
    ) -> Result<Vec<(String, i32)>, anyhow::Error> {
        Ok(self
            .phenotype_priority
            .get_vec(family_guid)
            .map(|records| {
                records
                    .iter()
                    .filter(|(gene_id, _)| gene_ids.contains(gene_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl Liftover for InMemoryStore {
    fn liftover(
        &self,
        target: GenomeRelease,
        chrom: &str,
        pos: i32,
    ) -> Result<Option<(String, i32)>, anyhow::Error> {
        Ok(self
            .liftover
            .get(&(target, canonicalize(chrom), pos))
            .cloned())
    }
}
