//! Dataset types, sample types and the per-dataset strategy table.
//!
//! Structural variant calls are stored separately for each sequencing modality, so the
//! dispatch key splits `SV` into `SV_WGS` and `SV_WES`.

use crate::{common::GenomeRelease, err::SearchError};

/// Category of genomic calls.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
)]
pub enum DatasetType {
    /// Short variants (SNVs and indels).
    #[serde(rename = "SNV_INDEL")]
    #[strum(serialize = "SNV_INDEL")]
    SnvIndel,
    /// Mitochondrial variants.
    #[serde(rename = "MITO")]
    #[strum(serialize = "MITO")]
    Mito,
    /// Structural variants.
    #[serde(rename = "SV")]
    #[strum(serialize = "SV")]
    Sv,
}

/// Sequencing modality.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    clap::ValueEnum,
)]
pub enum SampleType {
    /// Exome sequencing.
    #[serde(rename = "WES")]
    #[strum(serialize = "WES")]
    Wes,
    /// Genome sequencing.
    #[serde(rename = "WGS")]
    #[strum(serialize = "WGS")]
    Wgs,
}

impl SampleType {
    /// Return the respective other sequencing modality.
    pub fn other(&self) -> Self {
        match self {
            SampleType::Wes => SampleType::Wgs,
            SampleType::Wgs => SampleType::Wes,
        }
    }
}

/// Bucket of families in a sample data bundle.
///
/// Families that have samples of both modalities go into `Multi`.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
)]
pub enum SampleTypeBucket {
    #[serde(rename = "WES")]
    #[strum(serialize = "WES")]
    Wes,
    #[serde(rename = "WGS")]
    #[strum(serialize = "WGS")]
    Wgs,
    #[serde(rename = "multi")]
    #[strum(serialize = "multi")]
    Multi,
}

impl From<SampleType> for SampleTypeBucket {
    fn from(value: SampleType) -> Self {
        match value {
            SampleType::Wes => SampleTypeBucket::Wes,
            SampleType::Wgs => SampleTypeBucket::Wgs,
        }
    }
}

impl SampleTypeBucket {
    /// The sample types whose entries are loaded for families in this bucket.
    pub fn sample_types(&self) -> &'static [SampleType] {
        match self {
            SampleTypeBucket::Wes => &[SampleType::Wes],
            SampleTypeBucket::Wgs => &[SampleType::Wgs],
            SampleTypeBucket::Multi => &[SampleType::Wes, SampleType::Wgs],
        }
    }
}

/// Key for dispatching to the physically distinct stores.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum DatasetKey {
    #[serde(rename = "SNV_INDEL")]
    #[strum(serialize = "SNV_INDEL")]
    SnvIndel,
    #[serde(rename = "MITO")]
    #[strum(serialize = "MITO")]
    Mito,
    #[serde(rename = "SV_WGS")]
    #[strum(serialize = "SV_WGS")]
    SvWgs,
    #[serde(rename = "SV_WES")]
    #[strum(serialize = "SV_WES")]
    SvWes,
}

impl DatasetKey {
    /// Build the dispatch key from dataset and sample type.
    pub fn from_parts(dataset_type: DatasetType, sample_type: SampleType) -> Self {
        match (dataset_type, sample_type) {
            (DatasetType::SnvIndel, _) => DatasetKey::SnvIndel,
            (DatasetType::Mito, _) => DatasetKey::Mito,
            (DatasetType::Sv, SampleType::Wgs) => DatasetKey::SvWgs,
            (DatasetType::Sv, SampleType::Wes) => DatasetKey::SvWes,
        }
    }

    /// Return the dataset type of the key.
    pub fn dataset_type(&self) -> DatasetType {
        match self {
            DatasetKey::SnvIndel => DatasetType::SnvIndel,
            DatasetKey::Mito => DatasetType::Mito,
            DatasetKey::SvWgs | DatasetKey::SvWes => DatasetType::Sv,
        }
    }

    /// Whether the key refers to structural variant calls.
    pub fn is_sv(&self) -> bool {
        self.dataset_type() == DatasetType::Sv
    }

    /// The structural variant store of the other sequencing modality.
    pub fn sibling_sv(&self) -> Option<DatasetKey> {
        match self {
            DatasetKey::SvWgs => Some(DatasetKey::SvWes),
            DatasetKey::SvWes => Some(DatasetKey::SvWgs),
            _ => None,
        }
    }

    /// Return the strategy for this key.
    pub fn strategy(&self) -> &'static DatasetStrategy {
        match self {
            DatasetKey::SnvIndel => &STRATEGIES[0],
            DatasetKey::Mito => &STRATEGIES[1],
            DatasetKey::SvWgs => &STRATEGIES[2],
            DatasetKey::SvWes => &STRATEGIES[3],
        }
    }
}

/// How genotypes are derived from calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenotypeSource {
    /// From the `gt` field of the call.
    Gt,
    /// From the heteroplasmy level `hl` of the call.
    Heteroplasmy,
}

/// Quality fields that are meaningful for a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityFields {
    /// Genotype quality and allele balance.
    GqAb,
    /// Heteroplasmy-based calls, only genotype quality applies.
    Gq,
    /// Structural variant genotype quality.
    GqSv,
}

/// Description of how a dataset is stored and interpreted.
#[derive(Debug)]
pub struct DatasetStrategy {
    /// The dispatch key.
    pub key: DatasetKey,
    /// Genome releases for which the dataset is available.
    pub releases: &'static [GenomeRelease],
    /// Whether annotations carry the minimal `sortedTranscriptConsequences` list (and
    /// transcripts need to be loaded in bulk) rather than an inline `transcripts` map.
    pub has_transcript_consequences: bool,
    /// How to derive genotypes from calls.
    pub genotype_source: GenotypeSource,
    /// Quality fields used in filtration.
    pub quality_fields: QualityFields,
}

static STRATEGIES: [DatasetStrategy; 4] = [
    DatasetStrategy {
        key: DatasetKey::SnvIndel,
        releases: &[GenomeRelease::Grch37, GenomeRelease::Grch38],
        has_transcript_consequences: true,
        genotype_source: GenotypeSource::Gt,
        quality_fields: QualityFields::GqAb,
    },
    DatasetStrategy {
        key: DatasetKey::Mito,
        releases: &[GenomeRelease::Grch38],
        has_transcript_consequences: true,
        genotype_source: GenotypeSource::Heteroplasmy,
        quality_fields: QualityFields::Gq,
    },
    DatasetStrategy {
        key: DatasetKey::SvWgs,
        releases: &[GenomeRelease::Grch38],
        has_transcript_consequences: false,
        genotype_source: GenotypeSource::Gt,
        quality_fields: QualityFields::GqSv,
    },
    DatasetStrategy {
        key: DatasetKey::SvWes,
        releases: &[GenomeRelease::Grch38],
        has_transcript_consequences: false,
        genotype_source: GenotypeSource::Gt,
        quality_fields: QualityFields::GqSv,
    },
];

impl DatasetStrategy {
    /// Whether the dataset is available for the given release.
    pub fn supports(&self, release: GenomeRelease) -> bool {
        self.releases.contains(&release)
    }
}

/// Resolve the strategy for `key` in `release`, failing for unknown combinations.
pub fn resolve(
    release: GenomeRelease,
    key: DatasetKey,
) -> Result<&'static DatasetStrategy, SearchError> {
    let strategy = key.strategy();
    if strategy.supports(release) {
        Ok(strategy)
    } else {
        Err(SearchError::UnsupportedDataset {
            release: release.name(),
            dataset_type: key.to_string(),
        })
    }
}
