//! Data structures for sample records, stored entries, annotations and search results.

use indexmap::IndexMap;

use crate::search::dataset::{DatasetType, SampleType};

/// Affected status of an individual.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    strum::Display,
)]
pub enum Affected {
    /// Affected.
    #[serde(rename = "A")]
    #[strum(serialize = "A")]
    Affected,
    /// Unaffected.
    #[serde(rename = "N")]
    #[strum(serialize = "N")]
    Unaffected,
    /// Unknown.
    #[serde(rename = "U")]
    #[strum(serialize = "U")]
    #[default]
    Unknown,
}

/// Sex of an individual.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "XXY")]
    Xxy,
    #[serde(rename = "XYY")]
    Xyy,
    #[serde(rename = "U")]
    #[default]
    Unknown,
}

impl Sex {
    /// Whether the individual is considered male.
    pub fn is_male(&self) -> bool {
        matches!(self, Sex::Male | Sex::Xxy | Sex::Xyy)
    }
}

/// An active sample as handed to the search.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRecord {
    /// Identifier of the sample in the call set.
    pub sample_id: String,
    /// Dataset type of the sample.
    pub dataset_type: DatasetType,
    /// Sequencing modality of the sample.
    pub sample_type: SampleType,
    /// Stable individual identifier.
    pub individual_guid: String,
    /// Stable family identifier.
    pub family_guid: String,
    /// Stable project identifier.
    pub project_guid: String,
    /// Display name of the project.
    #[serde(default)]
    pub project_name: Option<String>,
    /// Affected status of the individual.
    #[serde(default)]
    pub affected: Affected,
    /// Sex of the individual.
    #[serde(default)]
    pub sex: Sex,
}

impl SampleRecord {
    /// Name of the project used in messages, falls back to the GUID.
    pub fn project_label(&self) -> &str {
        self.project_name.as_deref().unwrap_or(&self.project_guid)
    }
}

/// Genotype of a call.
#[derive(
    serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum Genotype {
    /// Homozygous reference.
    #[serde(rename = "REF")]
    Ref,
    /// Heterozygous.
    #[serde(rename = "HET")]
    Het,
    /// Homozygous alternative.
    #[serde(rename = "HOM")]
    Hom,
}

impl Genotype {
    /// Whether the genotype carries an alternative allele.
    pub fn has_alt(&self) -> bool {
        matches!(self, Genotype::Het | Genotype::Hom)
    }
}

/// Heteroplasmy level at or above which a mitochondrial call is considered homoplasmic.
pub const HOMOPLASMY_THRESHOLD: f64 = 0.95;

/// Genotype call of one sample for one variant.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenotypeCall {
    /// Identifier of the sample in the call set.
    pub sample_id: String,
    /// Sequencing modality, filled from the entry row.
    #[serde(default)]
    pub sample_type: Option<SampleType>,
    /// Genotype, `None` for no-calls.
    #[serde(default)]
    pub gt: Option<Genotype>,
    /// Genotype quality.
    #[serde(default)]
    pub gq: Option<i32>,
    /// Allele balance as a fraction.
    #[serde(default)]
    pub ab: Option<f64>,
    /// Read depth.
    #[serde(default)]
    pub dp: Option<i32>,
    /// Heteroplasmy level, mitochondrial calls only.
    #[serde(default)]
    pub hl: Option<f64>,
    /// Copy number, structural variant calls only.
    #[serde(default)]
    pub cn: Option<i32>,
    /// Whether the structural variant call is new in this call set.
    #[serde(default)]
    pub new_call: Option<bool>,
    /// Whether the structural variant was called previously.
    #[serde(default)]
    pub prev_call: Option<bool>,
}

impl GenotypeCall {
    /// Genotype with mitochondrial heteroplasmy interpreted when requested.
    pub fn genotype(&self, from_heteroplasmy: bool) -> Option<Genotype> {
        if from_heteroplasmy {
            self.hl.map(|hl| {
                if hl <= 0.0 {
                    Genotype::Ref
                } else if hl < HOMOPLASMY_THRESHOLD {
                    Genotype::Het
                } else {
                    Genotype::Hom
                }
            })
        } else {
            self.gt
        }
    }
}

/// One stored row of calls, per variant key, family and sample type.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRow {
    /// Dataset-local variant key.
    pub key: u64,
    /// The family of the calls.
    pub family_guid: String,
    /// The project of the family.
    #[serde(default)]
    pub project_guid: Option<String>,
    /// Sequencing modality of the calls.
    pub sample_type: SampleType,
    /// VCF filter values, empty for `PASS`.
    #[serde(default)]
    pub filters: Vec<String>,
    /// The genotype calls of the family samples.
    pub calls: Vec<GenotypeCall>,
}

/// Minimal transcript consequence as stored with short variant annotations.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptConsequence {
    pub gene_id: String,
    #[serde(default)]
    pub transcript_id: Option<String>,
    #[serde(default)]
    pub canonical: Option<i32>,
    #[serde(default)]
    pub consequence_terms: Vec<String>,
    #[serde(default)]
    pub alphamissense_pathogenicity: Option<f64>,
    #[serde(default, rename = "fiveutrConsequence")]
    pub five_utr_consequence: Option<String>,
    #[serde(default)]
    pub extended_intronic_splice_region_variant: Option<bool>,
}

/// UTR annotation of a transcript.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtrAnnotation {
    #[serde(default, rename = "fiveutrConsequence")]
    pub five_utr_consequence: Option<String>,
}

/// Splice region annotation of a transcript.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpliceRegionAnnotation {
    #[serde(default)]
    pub extended_intronic_splice_region_variant: Option<bool>,
}

/// Full transcript payload.
///
/// Fields not interpreted by the engine are kept in `extra` and written back unchanged.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    #[serde(default)]
    pub transcript_id: Option<String>,
    #[serde(default)]
    pub gene_id: Option<String>,
    /// Rank of the transcript within the gene, the main transcript has rank 0.
    #[serde(default)]
    pub transcript_rank: Option<i32>,
    #[serde(default)]
    pub canonical: Option<i32>,
    #[serde(default)]
    pub consequence_terms: Vec<String>,
    /// Consequence of structural variants.
    #[serde(default)]
    pub major_consequence: Option<String>,
    #[serde(default)]
    pub alphamissense_pathogenicity: Option<f64>,
    #[serde(default)]
    pub utrannotator: Option<UtrAnnotation>,
    #[serde(default)]
    pub spliceregion: Option<SpliceRegionAnnotation>,
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

/// Transcripts by gene identifier.
pub type TranscriptMap = IndexMap<String, Vec<Transcript>>;

/// Population frequency information.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationFrequency {
    #[serde(default)]
    pub af: Option<f64>,
    #[serde(default)]
    pub ac: Option<i32>,
    #[serde(default)]
    pub an: Option<i32>,
    #[serde(default)]
    pub hom: Option<i32>,
    #[serde(default)]
    pub hemi: Option<i32>,
    #[serde(default)]
    pub het: Option<i32>,
}

/// ClinVar information.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clinvar {
    #[serde(default)]
    pub pathogenicity: Option<String>,
    #[serde(default)]
    pub assertions: Vec<String>,
    #[serde(default)]
    pub gold_stars: Option<i32>,
    #[serde(default)]
    pub version: Option<String>,
}

/// HGMD information.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hgmd {
    #[serde(default)]
    pub accession: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
}

/// Variant annotation as returned from the annotation store.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Dataset-local variant key.
    pub key: u64,
    /// Variant identifier, `chrom-pos-ref-alt` for short variants.
    pub variant_id: String,
    pub chrom: String,
    pub pos: i32,
    #[serde(default)]
    pub end: Option<i32>,
    /// End chromosome of translocations.
    #[serde(default)]
    pub end_chrom: Option<String>,
    /// Genome-wide position, computed on load when absent.
    #[serde(default)]
    pub xpos: i64,
    #[serde(default, rename = "ref")]
    pub ref_: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
    /// Structural variant type, e.g., `DEL`, `DUP`, `gCNV_DEL`.
    #[serde(default)]
    pub sv_type: Option<String>,
    #[serde(default)]
    pub rsid: Option<String>,
    /// Minimal transcript consequences sorted by severity.
    #[serde(default)]
    pub sorted_transcript_consequences: Option<Vec<TranscriptConsequence>>,
    /// Full transcripts by gene.
    #[serde(default)]
    pub transcripts: Option<TranscriptMap>,
    #[serde(default)]
    pub populations: IndexMap<String, PopulationFrequency>,
    #[serde(default)]
    pub predictions: IndexMap<String, Option<f64>>,
    #[serde(default)]
    pub clinvar: Option<Clinvar>,
    #[serde(default)]
    pub hgmd: Option<Hgmd>,
    #[serde(default)]
    pub lifted_over_genome_version: Option<String>,
    #[serde(default)]
    pub lifted_over_chrom: Option<String>,
    #[serde(default)]
    pub lifted_over_pos: Option<i32>,
}

impl Annotation {
    /// Identifiers of the genes overlapped by the variant, in consequence order.
    pub fn gene_ids(&self) -> Vec<String> {
        let mut result: Vec<String> = Vec::new();
        if let Some(csqs) = self.sorted_transcript_consequences.as_ref() {
            for csq in csqs {
                if !result.contains(&csq.gene_id) {
                    result.push(csq.gene_id.clone());
                }
            }
        } else if let Some(transcripts) = self.transcripts.as_ref() {
            result.extend(transcripts.keys().cloned());
        }
        result
    }

    /// Whether the variant is a (possibly gCNV) deletion.
    pub fn is_deletion(&self) -> bool {
        matches!(self.sv_type.as_deref(), Some("DEL") | Some("gCNV_DEL"))
    }
}

/// Genotype of one sample as included in the results, with the owning individual.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualGenotype {
    #[serde(default)]
    pub individual_guid: Option<String>,
    pub family_guid: String,
    #[serde(flatten)]
    pub call: GenotypeCall,
}

/// Genotypes of one individual, a single record unless sequenced in several modalities.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum IndividualGenotypes {
    One(IndividualGenotype),
    Many(Vec<IndividualGenotype>),
}

impl IndividualGenotypes {
    /// Build from a list of records, collapsing single-element lists.
    pub fn from_records(mut records: Vec<IndividualGenotype>) -> Self {
        if records.len() == 1 {
            IndividualGenotypes::One(records.remove(0))
        } else {
            IndividualGenotypes::Many(records)
        }
    }

    /// Iterate over the contained records.
    pub fn records(&self) -> Vec<&IndividualGenotype> {
        match self {
            IndividualGenotypes::One(record) => vec![record],
            IndividualGenotypes::Many(records) => records.iter().collect(),
        }
    }

    /// Retain the records of the given families, returning `None` if nothing is left.
    pub fn retain_families(self, families: &[String]) -> Option<Self> {
        let records: Vec<IndividualGenotype> = match self {
            IndividualGenotypes::One(record) => vec![record],
            IndividualGenotypes::Many(records) => records,
        }
        .into_iter()
        .filter(|record| families.contains(&record.family_guid))
        .collect();
        if records.is_empty() {
            None
        } else {
            Some(IndividualGenotypes::from_records(records))
        }
    }
}

/// One variant in the search results.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantResult {
    #[serde(flatten)]
    pub annotation: Annotation,
    /// Families the variant was found in, sorted.
    #[serde(default)]
    pub family_guids: Option<Vec<String>>,
    /// Genotypes by family when samples were not resolved to individuals.
    #[serde(default)]
    pub family_genotypes: Option<IndexMap<String, Vec<GenotypeCall>>>,
    /// Genotypes by individual.
    #[serde(default)]
    pub genotypes: Option<IndexMap<String, IndividualGenotypes>>,
    /// Families of calls merged in from the other genome release.
    #[serde(default)]
    pub lifted_family_guids: Option<Vec<String>>,
    /// Gene selected by the locus filter.
    #[serde(default)]
    pub selected_gene_id: Option<String>,
    /// Transcript consequence selected by the annotation filter.
    #[serde(default)]
    pub selected_transcript: Option<TranscriptConsequence>,
    #[serde(default)]
    pub main_transcript_id: Option<String>,
    #[serde(default)]
    pub selected_main_transcript_id: Option<String>,
}

impl VariantResult {
    /// Construct a result from an annotation without family information.
    pub fn from_annotation(annotation: Annotation) -> Self {
        Self {
            annotation,
            ..Default::default()
        }
    }

    /// The families of the variant, from `familyGuids` or `familyGenotypes`.
    pub fn families(&self) -> Vec<String> {
        if let Some(family_guids) = self.family_guids.as_ref() {
            family_guids.clone()
        } else if let Some(family_genotypes) = self.family_genotypes.as_ref() {
            family_genotypes.keys().cloned().collect()
        } else {
            Vec::new()
        }
    }

    /// Restrict families and genotypes to the given families.
    pub fn retain_families(&mut self, families: &[String]) {
        if let Some(family_guids) = self.family_guids.as_mut() {
            family_guids.retain(|f| families.contains(f));
        }
        if let Some(family_genotypes) = self.family_genotypes.as_mut() {
            family_genotypes.retain(|f, _| families.contains(f));
        }
        if let Some(genotypes) = self.genotypes.take() {
            self.genotypes = Some(
                genotypes
                    .into_iter()
                    .filter_map(|(ind, gts)| gts.retain_families(families).map(|gts| (ind, gts)))
                    .collect(),
            );
        }
    }
}

/// One entry of the search results, a single variant or a compound heterozygous pair.
#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum SearchHit {
    Pair([VariantResult; 2]),
    Single(VariantResult),
}

impl SearchHit {
    /// The variants of the hit.
    pub fn variants(&self) -> &[VariantResult] {
        match self {
            SearchHit::Single(variant) => std::slice::from_ref(variant),
            SearchHit::Pair(pair) => pair.as_slice(),
        }
    }

    /// The variants of the hit, mutably.
    pub fn variants_mut(&mut self) -> &mut [VariantResult] {
        match self {
            SearchHit::Single(variant) => std::slice::from_mut(variant),
            SearchHit::Pair(pair) => pair.as_mut_slice(),
        }
    }

    /// The variant used for sorting, the first of a pair.
    pub fn sort_variant(&self) -> &VariantResult {
        match self {
            SearchHit::Single(variant) => variant,
            SearchHit::Pair(pair) => &pair[0],
        }
    }
}
