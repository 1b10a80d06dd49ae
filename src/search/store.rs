//! Interfaces of the collaborators the engine queries.
//!
//! The columnar variant store, the gene metadata sources and the liftover service are
//! external to the engine.  The engine only sees the traits defined here.  An in-memory
//! implementation backed by a JSON snapshot lives in `in_memory`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use indexmap::IndexMap;

use crate::{
    common::GenomeRelease,
    search::{
        dataset::{DatasetKey, SampleType},
        schema::data::{Annotation, EntryRow, TranscriptMap},
    },
};

pub mod in_memory;

/// Constraint ranks of a gene.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintRanks {
    pub gene_id: String,
    pub mis_z_rank: i32,
    pub pli_rank: i32,
}

/// Access to the stored genotype entries and variant annotations.
pub trait VariantStore {
    /// Entry rows of the given families, by sample type of the row.
    fn search_entries(
        &self,
        release: GenomeRelease,
        dataset_key: DatasetKey,
        scope: &BTreeMap<SampleType, BTreeSet<String>>,
    ) -> Result<Vec<EntryRow>, anyhow::Error>;

    /// Entry rows of all families for the given keys.
    fn entries_for_keys(
        &self,
        release: GenomeRelease,
        dataset_key: DatasetKey,
        keys: &[u64],
    ) -> Result<Vec<EntryRow>, anyhow::Error>;

    /// Annotations of the given keys, keys without annotation are skipped.
    fn annotations(
        &self,
        release: GenomeRelease,
        dataset_key: DatasetKey,
        keys: &[u64],
    ) -> Result<IndexMap<u64, Annotation>, anyhow::Error>;

    /// Annotations of all variants overlapping one of the genes.
    fn annotations_in_genes(
        &self,
        release: GenomeRelease,
        dataset_key: DatasetKey,
        gene_ids: &[String],
    ) -> Result<Vec<Annotation>, anyhow::Error>;

    /// Annotations of all variants overlapping the 1-based closed interval.
    fn annotations_overlapping(
        &self,
        release: GenomeRelease,
        dataset_key: DatasetKey,
        chrom: &str,
        start: i32,
        end: i32,
    ) -> Result<Vec<Annotation>, anyhow::Error>;

    /// Map variant identifiers to keys, unknown identifiers are skipped.
    fn key_lookup(
        &self,
        release: GenomeRelease,
        dataset_key: DatasetKey,
        variant_ids: &[String],
    ) -> Result<IndexMap<String, u64>, anyhow::Error>;

    /// Full transcripts by key, only for short variant datasets.
    fn transcripts_by_key(
        &self,
        release: GenomeRelease,
        keys: &[u64],
    ) -> Result<HashMap<u64, TranscriptMap>, anyhow::Error>;
}

/// Access to gene-level reference data used for sorting.
pub trait GeneMetadataSource {
    /// Constraint ranks for the given genes.
    fn constraint_ranks(
        &self,
        gene_ids: &BTreeSet<String>,
    ) -> Result<Vec<ConstraintRanks>, anyhow::Error>;

    /// The subset of genes with an OMIM phenotype.
    fn omim_genes(&self, gene_ids: &BTreeSet<String>) -> Result<BTreeSet<String>, anyhow::Error>;

    /// Phenotype prioritization ranks of the genes for the family, one entry per tool
    /// result.
    fn phenotype_priority_ranks(
        &self,
        gene_ids: &BTreeSet<String>,
        family_guid: &str,
    ) -> Result<Vec<(String, i32)>, anyhow::Error>;
}

/// Coordinate translation between genome releases.
pub trait Liftover {
    /// Lift `chrom:pos` over to `target`, `None` if the position does not map.
    fn liftover(
        &self,
        target: GenomeRelease,
        chrom: &str,
        pos: i32,
    ) -> Result<Option<(String, i32)>, anyhow::Error>;
}
