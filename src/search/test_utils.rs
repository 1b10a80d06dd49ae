//! Shared helpers for the search tests.

use std::path::Path;

use crate::search::{
    dataset::{DatasetType, SampleType},
    schema::data::{Affected, SampleRecord, Sex},
    store::in_memory::InMemoryStore,
};

/// Short variant sample record.
pub fn sample(
    sample_id: &str,
    individual_guid: &str,
    family_guid: &str,
    project_guid: &str,
    sample_type: SampleType,
    affected: Affected,
    sex: Sex,
) -> SampleRecord {
    SampleRecord {
        sample_id: sample_id.to_owned(),
        dataset_type: DatasetType::SnvIndel,
        sample_type,
        individual_guid: individual_guid.to_owned(),
        family_guid: family_guid.to_owned(),
        project_guid: project_guid.to_owned(),
        project_name: None,
        affected,
        sex,
    }
}

/// Exome trio of an affected son with unaffected parents in family `F1`.
pub fn trio_samples() -> Vec<SampleRecord> {
    vec![
        sample("S1", "I1", "F1", "P1", SampleType::Wes, Affected::Affected, Sex::Male),
        sample("S2", "I2", "F1", "P1", SampleType::Wes, Affected::Unaffected, Sex::Male),
        sample("S3", "I3", "F1", "P1", SampleType::Wes, Affected::Unaffected, Sex::Female),
    ]
}

/// The trio with structural variant calls of the same samples.
pub fn trio_samples_with_sv() -> Vec<SampleRecord> {
    let short = trio_samples();
    let sv = short
        .iter()
        .map(|s| SampleRecord {
            dataset_type: DatasetType::Sv,
            ..s.clone()
        })
        .collect::<Vec<_>>();
    short.into_iter().chain(sv).collect()
}

/// Store with the trio variants from `tests/search/store.json`.
pub fn comp_het_store() -> Result<InMemoryStore, anyhow::Error> {
    InMemoryStore::load(Path::new("tests/search/store.json"))
}
