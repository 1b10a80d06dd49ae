//! Code for representing search definitions.
//!
//! Searches are handed over as JSON and deserialized into the data structures defined
//! here.

use indexmap::IndexMap;

use crate::{
    common::{canonicalize, GenomeRelease},
    err::SearchError,
};

/// Inheritance mode requested by the user.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InheritanceMode {
    /// At least one affected sample carries an alternative allele.
    AnyAffected,
    /// Alternative allele in affected samples only.
    DeNovo,
    /// Heterozygous in affected, reference in unaffected samples.
    Dominant,
    /// Homozygous alternative in affected samples.
    HomozygousRecessive,
    /// Pairs of heterozygous variants in the same gene.
    CompoundHet,
    /// Hemizygous in affected males on chromosome X.
    XLinkedRecessive,
    /// Union of homozygous recessive, X-linked recessive and compound heterozygous.
    Recessive,
}

impl InheritanceMode {
    /// Whether the mode includes compound heterozygous pairs.
    pub fn has_comp_het(&self) -> bool {
        matches!(
            self,
            InheritanceMode::Recessive | InheritanceMode::CompoundHet
        )
    }
}

/// Annotation filter, one list of accepted values per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationFilter {
    /// Accepted transcript consequence terms.
    #[serde(default)]
    pub consequences: Vec<String>,
    /// Accepted structural variant types.
    #[serde(default)]
    pub structural: Vec<String>,
    /// Accepted structural variant consequences.
    #[serde(default)]
    pub structural_consequence: Vec<String>,
}

impl AnnotationFilter {
    /// Whether no category has any value.
    pub fn is_empty(&self) -> bool {
        self.consequences.is_empty()
            && self.structural.is_empty()
            && self.structural_consequence.is_empty()
    }

    /// Category-wise union with `other`, keeping first-seen order.
    pub fn union(&self, other: &AnnotationFilter) -> AnnotationFilter {
        fn merge(a: &[String], b: &[String]) -> Vec<String> {
            let mut result = a.to_vec();
            for value in b {
                if !result.contains(value) {
                    result.push(value.clone());
                }
            }
            result
        }

        AnnotationFilter {
            consequences: merge(&self.consequences, &other.consequences),
            structural: merge(&self.structural, &other.structural),
            structural_consequence: merge(
                &self.structural_consequence,
                &other.structural_consequence,
            ),
        }
    }
}

/// Pathogenicity filter, OR-ed with the annotation filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathogenicityFilter {
    /// Accepted ClinVar pathogenicity values.
    #[serde(default)]
    pub clinvar: Vec<String>,
    /// Accepted HGMD classes.
    #[serde(default)]
    pub hgmd: Vec<String>,
}

impl PathogenicityFilter {
    pub fn is_empty(&self) -> bool {
        self.clinvar.is_empty() && self.hgmd.is_empty()
    }
}

/// Frequency thresholds for one population.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationFilter {
    /// Maximal allele frequency.
    #[serde(default)]
    pub af: Option<f64>,
    /// Maximal allele count.
    #[serde(default)]
    pub ac: Option<i32>,
    /// Maximal number of homozygous plus hemizygous carriers.
    #[serde(default)]
    pub hh: Option<i32>,
}

/// In-silico predictor thresholds.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InSilicoFilter {
    /// Minimal score by predictor name.
    #[serde(default)]
    pub scores: IndexMap<String, f64>,
    /// Fail variants without any of the predictor scores.
    #[serde(default)]
    pub require_score: bool,
}

/// Call quality thresholds.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityFilter {
    /// Minimal genotype quality of short variant calls.
    #[serde(default)]
    pub min_gq: Option<i32>,
    /// Minimal allele balance of heterozygous calls, in percent.
    #[serde(default)]
    pub min_ab: Option<i32>,
    /// Minimal genotype quality of structural variant calls.
    #[serde(default)]
    pub min_gq_sv: Option<i32>,
    /// Set to `"pass"` to only keep calls without VCF filter.
    #[serde(default)]
    pub vcf_filter: Option<String>,
    /// Apply thresholds to affected samples only.
    #[serde(default)]
    pub affected_only: bool,
}

impl QualityFilter {
    /// Whether only `PASS` calls are accepted.
    pub fn require_pass(&self) -> bool {
        self.vcf_filter
            .as_deref()
            .map(|f| f.eq_ignore_ascii_case("pass"))
            .unwrap_or(false)
    }
}

/// Gene as given in the locus filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gene {
    pub gene_id: String,
    #[serde(default)]
    pub gene_symbol: Option<String>,
    #[serde(default)]
    pub chrom_grch37: Option<String>,
    #[serde(default)]
    pub chrom_grch38: Option<String>,
}

impl Gene {
    /// Chromosome of the gene in the given release.
    pub fn chrom(&self, release: GenomeRelease) -> Option<&str> {
        match release {
            GenomeRelease::Grch37 => self.chrom_grch37.as_deref(),
            GenomeRelease::Grch38 => self.chrom_grch38.as_deref(),
        }
    }
}

/// Genomic interval, 1-based and fully closed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    pub chrom: String,
    pub start: i32,
    pub end: i32,
}

/// Locus filter by genes and intervals.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocusFilter {
    /// Genes by identifier.
    #[serde(default)]
    pub genes: IndexMap<String, Gene>,
    #[serde(default)]
    pub intervals: Vec<Interval>,
    /// Exclude rather than include the loci.
    #[serde(default)]
    pub exclude: bool,
}

/// Supporting code for `SearchSpec`.
pub(crate) mod search_spec {
    /// Error type for `SearchSpec::validate()`.
    #[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
    pub enum Error {
        #[error("Invalid interval {0}:{1}-{2}")]
        InvalidInterval(String, i32, i32),
        #[error("Invalid exclusion dataset key: {0}")]
        InvalidExcludeKey(String),
        #[error("Invalid pair exclusion dataset key: {0}")]
        InvalidExcludeKeyPair(String),
        #[error("Invalid allele balance threshold: {0}")]
        InvalidMinAb(i32),
    }
}

/// A complete search specification.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSpec {
    /// Requested inheritance mode, `None` for no genotype constraint beyond carrying.
    #[serde(default)]
    pub inheritance_mode: Option<InheritanceMode>,
    #[serde(default)]
    pub annotations: Option<AnnotationFilter>,
    /// Annotations of the second hit of compound heterozygous pairs.
    #[serde(default)]
    pub annotations_secondary: Option<AnnotationFilter>,
    /// Skip defaulting the secondary annotations to the primary ones.
    #[serde(default)]
    pub no_secondary_annotations: bool,
    #[serde(default)]
    pub pathogenicity: Option<PathogenicityFilter>,
    /// Frequency thresholds by population name.
    #[serde(default)]
    pub freqs: IndexMap<String, PopulationFilter>,
    #[serde(default)]
    pub in_silico: Option<InSilicoFilter>,
    #[serde(default)]
    pub quality: QualityFilter,
    #[serde(default)]
    pub locus: Option<LocusFilter>,
    /// Variant keys to exclude, by dataset key.
    #[serde(default)]
    pub exclude_keys: IndexMap<String, Vec<u64>>,
    /// Variant key pairs to exclude, by joined dataset keys such as `SNV_INDEL,SV_WGS`.
    #[serde(default)]
    pub exclude_key_pairs: IndexMap<String, Vec<(u64, u64)>>,
}

impl SearchSpec {
    /// Check the specification before running any query.
    pub fn validate(&self) -> Result<(), SearchError> {
        self.validate_inner()
            .map_err(|e| SearchError::InvalidSearch(e.to_string()))
    }

    fn validate_inner(&self) -> Result<(), search_spec::Error> {
        if let Some(locus) = self.locus.as_ref() {
            for interval in &locus.intervals {
                if interval.start > interval.end || interval.start < 1 {
                    return Err(search_spec::Error::InvalidInterval(
                        interval.chrom.clone(),
                        interval.start,
                        interval.end,
                    ));
                }
            }
        }
        for key in self.exclude_keys.keys() {
            if key.parse::<crate::search::dataset::DatasetKey>().is_err() {
                return Err(search_spec::Error::InvalidExcludeKey(key.clone()));
            }
        }
        for key in self.exclude_key_pairs.keys() {
            let parts = key.split(',').collect::<Vec<_>>();
            if parts.len() > 2
                || parts
                    .iter()
                    .any(|part| part.parse::<crate::search::dataset::DatasetKey>().is_err())
            {
                return Err(search_spec::Error::InvalidExcludeKeyPair(key.clone()));
            }
        }
        if let Some(min_ab) = self.quality.min_ab {
            if !(0..=100).contains(&min_ab) {
                return Err(search_spec::Error::InvalidMinAb(min_ab));
            }
        }
        Ok(())
    }

    /// Annotations to use for the secondary hit of compound heterozygous pairs.
    ///
    /// An explicit secondary filter wins, otherwise the primary annotations are used
    /// unless `no_secondary_annotations` is set.
    pub fn secondary_annotations(&self) -> Option<&AnnotationFilter> {
        match (self.annotations_secondary.as_ref(), self.no_secondary_annotations) {
            (Some(secondary), _) => Some(secondary),
            (None, false) => self.annotations.as_ref(),
            (None, true) => None,
        }
    }

    /// Locus chromosomes for the release, `None` if there is no locus filter or a gene
    /// chromosome is unknown.
    fn locus_chroms(&self, release: GenomeRelease) -> Option<Vec<String>> {
        let locus = self.locus.as_ref()?;
        if locus.genes.is_empty() && locus.intervals.is_empty() {
            return None;
        }
        let mut chroms = Vec::new();
        for gene in locus.genes.values() {
            chroms.push(canonicalize(gene.chrom(release)?));
        }
        chroms.extend(locus.intervals.iter().map(|i| canonicalize(&i.chrom)));
        Some(chroms)
    }

    /// Whether the included locus lies entirely on chromosome X.
    pub fn is_x_chrom_only(&self, release: GenomeRelease) -> bool {
        if self.locus.as_ref().map(|l| l.exclude).unwrap_or(false) {
            return false;
        }
        self.locus_chroms(release)
            .map(|chroms| chroms.iter().all(|c| c == "X"))
            .unwrap_or(false)
    }

    /// Whether the included locus lies entirely off chromosome X.
    pub fn is_no_x_chrom(&self, release: GenomeRelease) -> bool {
        if self.locus.as_ref().map(|l| l.exclude).unwrap_or(false) {
            return false;
        }
        self.locus_chroms(release)
            .map(|chroms| chroms.iter().all(|c| c != "X"))
            .unwrap_or(false)
    }

    /// Excluded keys for the given dataset key.
    pub fn exclude_keys_for(&self, dataset_key: &str) -> std::collections::HashSet<u64> {
        self.exclude_keys
            .get(dataset_key)
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Excluded key pairs for the given (joined) dataset key.
    pub fn exclude_key_pairs_for(
        &self,
        dataset_key: &str,
    ) -> std::collections::HashSet<(u64, u64)> {
        self.exclude_key_pairs
            .get(dataset_key)
            .map(|pairs| {
                pairs
                    .iter()
                    .map(|&(a, b)| if a <= b { (a, b) } else { (b, a) })
                    .collect()
            })
            .unwrap_or_default()
    }
}
