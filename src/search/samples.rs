//! Aggregation of the active sample records into per-dataset sample data bundles.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use itertools::Itertools;

use crate::{
    err::SearchError,
    search::{
        dataset::{DatasetKey, DatasetType, SampleType, SampleTypeBucket},
        schema::data::{Affected, SampleRecord, Sex},
    },
};

/// Per-sample detail as kept in the sample data bundle.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleDetail {
    pub affected: Affected,
    pub sex: Sex,
    pub sample_id: String,
    pub sample_type: SampleType,
    pub family_guid: String,
    pub individual_guid: String,
}

impl From<&SampleRecord> for SampleDetail {
    fn from(value: &SampleRecord) -> Self {
        Self {
            affected: value.affected,
            sex: value.sex,
            sample_id: value.sample_id.clone(),
            sample_type: value.sample_type,
            family_guid: value.family_guid.clone(),
            individual_guid: value.individual_guid.clone(),
        }
    }
}

/// Options for `get_sample_data()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Do not keep per-sample details when samples span more than one project.
    pub skip_multi_project_individual_guid: bool,
    /// Record the affected male families in aggregate mode.
    pub annotate_affected_male_families: bool,
}

/// The sample data bundle of one dataset key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleData {
    /// Family identifiers by sample type bucket, empty buckets are dropped.
    pub sample_type_families: BTreeMap<SampleTypeBucket, BTreeSet<String>>,
    /// Number of distinct families over all buckets.
    pub num_families: usize,
    pub project_guids: BTreeSet<String>,
    /// Per-sample details, `None` in aggregate (multi-project) mode.
    pub samples: Option<Vec<SampleDetail>>,
    /// Sample identifiers of individuals that lack a sample of the given type, by family.
    pub family_missing_type_samples: BTreeMap<String, BTreeMap<SampleType, Vec<String>>>,
    /// Number of unaffected individuals, aggregate mode only.
    pub num_unaffected: Option<usize>,
    /// Families with an affected male, aggregate mode only when requested.
    pub affected_male_family_guids: Option<BTreeSet<String>>,
    /// Affected status dictionary of all samples in scope, keyed by family.
    pub(crate) family_samples: BTreeMap<String, Vec<SampleDetail>>,
}

impl SampleData {
    /// All families in the bundle.
    pub fn families(&self) -> BTreeSet<String> {
        self.sample_type_families
            .values()
            .flat_map(|families| families.iter().cloned())
            .collect()
    }

    /// The first family of the first bucket.
    pub fn first_family(&self) -> Option<&String> {
        self.sample_type_families
            .values()
            .next()
            .and_then(|families| families.iter().next())
    }

    /// Families to load by sample type, families in the `multi` bucket are loaded for
    /// both types.
    pub fn entry_scope(&self) -> BTreeMap<SampleType, BTreeSet<String>> {
        let mut result: BTreeMap<SampleType, BTreeSet<String>> = BTreeMap::new();
        for (bucket, families) in &self.sample_type_families {
            for sample_type in bucket.sample_types() {
                result
                    .entry(*sample_type)
                    .or_default()
                    .extend(families.iter().cloned());
            }
        }
        result
    }

    /// Whether the family has samples of both types.
    pub fn is_multi_type_family(&self, family_guid: &str) -> bool {
        self.sample_type_families
            .get(&SampleTypeBucket::Multi)
            .map(|families| families.contains(family_guid))
            .unwrap_or(false)
    }

    /// All samples of the family.
    pub fn family_samples(&self, family_guid: &str) -> &[SampleDetail] {
        self.family_samples
            .get(family_guid)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Samples whose calls are expected in an entry row of the given sample type.
    ///
    /// For families with both sample types, individuals that lack a sample of `sample_type`
    /// are represented by their sample of the other type.
    pub fn expected_samples(&self, family_guid: &str, sample_type: SampleType) -> Vec<&SampleDetail> {
        let missing = self
            .family_missing_type_samples
            .get(family_guid)
            .and_then(|by_type| by_type.get(&sample_type));
        self.family_samples(family_guid)
            .iter()
            .filter(|s| {
                s.sample_type == sample_type
                    || missing
                        .map(|ids| s.sample_type != sample_type && ids.contains(&s.sample_id))
                        .unwrap_or(false)
            })
            .collect()
    }

    /// Families with an affected male individual.
    pub fn affected_male_families(&self) -> BTreeSet<String> {
        if let Some(families) = self.affected_male_family_guids.as_ref() {
            return families.clone();
        }
        self.family_samples
            .values()
            .flatten()
            .filter(|s| s.affected == Affected::Affected && s.sex.is_male())
            .map(|s| s.family_guid.clone())
            .collect()
    }

    fn with_buckets(&self, buckets: BTreeMap<SampleTypeBucket, BTreeSet<String>>) -> Self {
        let sample_type_families: BTreeMap<_, _> = buckets
            .into_iter()
            .filter(|(_, families)| !families.is_empty())
            .collect();
        let families = sample_type_families
            .values()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>();
        let in_families = |family_guid: &str| families.contains(family_guid);
        // `num_unaffected` is an aggregate count over all families and is kept as is
        Self {
            num_families: families.len(),
            samples: self.samples.as_ref().map(|samples| {
                samples
                    .iter()
                    .filter(|s| in_families(s.family_guid.as_str()))
                    .cloned()
                    .collect()
            }),
            family_missing_type_samples: self
                .family_missing_type_samples
                .iter()
                .filter(|(family_guid, _)| in_families(family_guid.as_str()))
                .map(|(family_guid, missing)| (family_guid.clone(), missing.clone()))
                .collect(),
            affected_male_family_guids: self
                .affected_male_family_guids
                .as_ref()
                .map(|guids| guids.intersection(&families).cloned().collect()),
            family_samples: self
                .family_samples
                .iter()
                .filter(|(family_guid, _)| in_families(family_guid.as_str()))
                .map(|(family_guid, samples)| (family_guid.clone(), samples.clone()))
                .collect(),
            sample_type_families,
            ..self.clone()
        }
    }

    /// Restrict the bundle to the given families.
    ///
    /// The bundle is returned unchanged if all families are selected.
    pub fn restrict_to_families(&self, families: &BTreeSet<String>) -> Self {
        if families.len() == self.num_families {
            return self.clone();
        }
        self.with_buckets(
            self.sample_type_families
                .iter()
                .map(|(bucket, fams)| (*bucket, fams.intersection(families).cloned().collect()))
                .collect(),
        )
    }

    /// Remove the given families from the bundle.
    pub fn without_families(&self, families: &BTreeSet<String>) -> Self {
        self.with_buckets(
            self.sample_type_families
                .iter()
                .map(|(bucket, fams)| (*bucket, fams.difference(families).cloned().collect()))
                .collect(),
        )
    }
}

/// Fail if a sample is configured with different affected statuses across projects.
fn check_affected_consistency(samples: &[SampleRecord]) -> Result<(), SearchError> {
    let mut by_sample: BTreeMap<(&str, DatasetType), (BTreeSet<Affected>, BTreeSet<&str>)> =
        BTreeMap::new();
    for sample in samples {
        let (affected, projects) = by_sample
            .entry((sample.sample_id.as_str(), sample.dataset_type))
            .or_default();
        affected.insert(sample.affected);
        projects.insert(sample.project_label());
    }

    let mismatches = by_sample
        .iter()
        .filter(|(_, (affected, _))| affected.len() > 1)
        .map(|((sample_id, _), (_, projects))| {
            format!("{} ({})", sample_id, projects.iter().join("/ "))
        })
        .collect::<Vec<_>>();
    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(SearchError::InvalidSearch(format!(
            "The following samples are incorrectly configured and have different affected \
            statuses in different projects: {}",
            mismatches.join(", ")
        )))
    }
}

/// Group the sample records into one sample data bundle per dataset key.
pub fn get_sample_data(
    samples: &[SampleRecord],
    options: AggregateOptions,
) -> Result<IndexMap<DatasetKey, SampleData>, SearchError> {
    check_affected_consistency(samples)?;

    let num_projects = samples
        .iter()
        .map(|s| s.project_guid.as_str())
        .collect::<BTreeSet<_>>()
        .len();
    let skip_individual_guid = options.skip_multi_project_individual_guid && num_projects > 1;

    let mut groups: BTreeMap<(DatasetType, SampleType), Vec<&SampleRecord>> = BTreeMap::new();
    for sample in samples {
        groups
            .entry((sample.dataset_type, sample.sample_type))
            .or_default()
            .push(sample);
    }

    let mut result: IndexMap<DatasetKey, SampleData> = IndexMap::new();
    for ((dataset_type, sample_type), group) in groups {
        let dataset_key = DatasetKey::from_parts(dataset_type, sample_type);
        let family_guids: BTreeSet<String> =
            group.iter().map(|s| s.family_guid.clone()).collect();
        let project_guids: BTreeSet<String> =
            group.iter().map(|s| s.project_guid.clone()).collect();

        if let Some(other) = result.get_mut(&dataset_key) {
            let (other_bucket, other_families) = other
                .sample_type_families
                .iter()
                .next()
                .map(|(bucket, families)| (*bucket, families.clone()))
                .unwrap_or((SampleTypeBucket::from(sample_type.other()), BTreeSet::new()));
            let buckets = BTreeMap::from([
                (
                    other_bucket,
                    other_families.difference(&family_guids).cloned().collect(),
                ),
                (
                    SampleTypeBucket::from(sample_type),
                    family_guids.difference(&other_families).cloned().collect(),
                ),
                (
                    SampleTypeBucket::Multi,
                    family_guids.intersection(&other_families).cloned().collect(),
                ),
            ]);
            let mut merged = other.with_buckets(buckets);
            merged.project_guids.extend(project_guids);
            for sample in &group {
                merged
                    .family_samples
                    .entry(sample.family_guid.clone())
                    .or_default()
                    .push(SampleDetail::from(*sample));
            }
            *other = merged;
        } else {
            let mut family_samples: BTreeMap<String, Vec<SampleDetail>> = BTreeMap::new();
            for sample in &group {
                family_samples
                    .entry(sample.family_guid.clone())
                    .or_default()
                    .push(SampleDetail::from(*sample));
            }
            result.insert(
                dataset_key,
                SampleData {
                    num_families: family_guids.len(),
                    sample_type_families: BTreeMap::from([(
                        SampleTypeBucket::from(sample_type),
                        family_guids,
                    )]),
                    project_guids,
                    samples: None,
                    family_missing_type_samples: BTreeMap::new(),
                    num_unaffected: None,
                    affected_male_family_guids: None,
                    family_samples,
                },
            );
        }
    }

    for data in result.values_mut() {
        add_missing_multi_type_samples(data);
        if skip_individual_guid {
            let unaffected = data
                .family_samples
                .values()
                .flatten()
                .filter(|s| s.affected == Affected::Unaffected)
                .map(|s| s.individual_guid.as_str())
                .collect::<BTreeSet<_>>();
            data.num_unaffected = Some(unaffected.len());
            if options.annotate_affected_male_families {
                data.affected_male_family_guids = Some(data.affected_male_families());
            }
        } else {
            data.samples = Some(data.family_samples.values().flatten().cloned().collect());
        }
    }

    Ok(result)
}

/// Record the individuals of multi-type families that have a sample of one type only.
fn add_missing_multi_type_samples(data: &mut SampleData) {
    let Some(multi) = data.sample_type_families.get(&SampleTypeBucket::Multi) else {
        return;
    };
    let mut missing: BTreeMap<String, BTreeMap<SampleType, Vec<String>>> = BTreeMap::new();
    for family_guid in multi {
        let by_individual = data
            .family_samples
            .get(family_guid)
            .map(|samples| {
                samples
                    .iter()
                    .into_group_map_by(|s| s.individual_guid.as_str())
            })
            .unwrap_or_default();
        for (_, samples) in by_individual.into_iter().sorted_by(|a, b| a.0.cmp(b.0)) {
            if let [sample] = samples.as_slice() {
                missing
                    .entry(family_guid.clone())
                    .or_default()
                    .entry(sample.sample_type.other())
                    .or_default()
                    .push(sample.sample_id.clone());
            }
        }
    }
    data.family_missing_type_samples = missing;
}
