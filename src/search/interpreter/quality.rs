use crate::search::{
    dataset::QualityFields,
    samples::SampleDetail,
    schema::{
        data::{Affected, EntryRow, Genotype, GenotypeCall},
        query::QualityFilter,
    },
};

/// Determine whether the VCF filter column of the row passes.
pub fn passes_filters(filter: &QualityFilter, row: &EntryRow) -> bool {
    let res = !filter.require_pass() || row.filters.is_empty();
    if !res {
        tracing::trace!(
            "entry {} / {} fails VCF filter {:?}",
            row.key,
            &row.family_guid,
            &row.filters
        );
    }
    res
}

/// Determine whether the calls pass the quality thresholds.
///
/// Only calls carrying an alternative allele are checked, and only those of affected
/// samples if `affected_only` is set.  Missing values pass.
pub fn passes_calls(
    filter: &QualityFilter,
    fields: QualityFields,
    calls: &[(&SampleDetail, &GenotypeCall, Option<Genotype>)],
) -> bool {
    calls.iter().all(|(sample, call, gt)| {
        let Some(gt) = gt.filter(Genotype::has_alt) else {
            return true;
        };
        if filter.affected_only && sample.affected != Affected::Affected {
            return true;
        }
        let res = passes_call(filter, fields, call, gt);
        if !res {
            tracing::trace!(
                "call of {} fails quality filter {:?}",
                &sample.sample_id,
                filter
            );
        }
        res
    })
}

fn passes_call(filter: &QualityFilter, fields: QualityFields, call: &GenotypeCall, gt: Genotype) -> bool {
    let min_gq = match fields {
        QualityFields::GqAb | QualityFields::Gq => filter.min_gq,
        QualityFields::GqSv => filter.min_gq_sv,
    };
    if let (Some(min_gq), Some(gq)) = (min_gq, call.gq) {
        if gq < min_gq {
            return false;
        }
    }
    if fields == QualityFields::GqAb && gt == Genotype::Het {
        if let (Some(min_ab), Some(ab)) = (filter.min_ab, call.ab) {
            if ab * 100.0 < min_ab as f64 {
                return false;
            }
        }
    }
    true
}
