//! Resolution of per-family genotype calls to individuals.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;

use crate::search::schema::data::{
    IndividualGenotype, IndividualGenotypes, SampleRecord, SearchHit, VariantResult,
};

/// Key genotypes carried as `familyGenotypes` by individual.
///
/// Results that already carry individual genotypes are left unchanged.
pub fn add_individual_guids(hits: &mut [SearchHit], samples: &[SampleRecord]) {
    let families = hits
        .iter()
        .flat_map(|hit| hit.variants())
        .filter_map(|variant| variant.family_genotypes.as_ref())
        .flat_map(|gts| gts.keys().map(String::as_str))
        .collect::<BTreeSet<_>>();
    let sample_map = samples
        .iter()
        .filter(|s| families.contains(s.family_guid.as_str()))
        .map(|s| {
            (
                (s.family_guid.as_str(), s.sample_id.as_str()),
                s.individual_guid.as_str(),
            )
        })
        .collect::<HashMap<_, _>>();

    for hit in hits.iter_mut() {
        for variant in hit.variants_mut() {
            set_individual_guids(variant, &sample_map);
        }
    }
}

fn set_individual_guids(variant: &mut VariantResult, sample_map: &HashMap<(&str, &str), &str>) {
    let Some(family_genotypes) = variant.family_genotypes.take() else {
        return;
    };
    let mut family_guids = family_genotypes.keys().cloned().collect::<Vec<_>>();
    family_guids.sort();
    variant.family_guids = Some(family_guids);

    let mut by_individual: IndexMap<String, Vec<IndividualGenotype>> = IndexMap::new();
    for (family_guid, calls) in family_genotypes {
        for call in calls {
            let Some(individual_guid) = sample_map.get(&(family_guid.as_str(), call.sample_id.as_str()))
            else {
                tracing::warn!(
                    "no individual for sample {} in family {}",
                    &call.sample_id,
                    &family_guid
                );
                continue;
            };
            by_individual
                .entry((*individual_guid).to_owned())
                .or_default()
                .push(IndividualGenotype {
                    individual_guid: Some((*individual_guid).to_owned()),
                    family_guid: family_guid.clone(),
                    call,
                });
        }
    }
    variant.genotypes = Some(
        by_individual
            .into_iter()
            .map(|(individual_guid, records)| (individual_guid, IndividualGenotypes::from_records(records)))
            .collect(),
    );
}
