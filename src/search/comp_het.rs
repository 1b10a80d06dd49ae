//! Pairing of compound heterozygous candidates.

use std::collections::{BTreeSet, HashSet};

use crate::search::{
    compose::{Candidate, Relation},
    schema::data::VariantResult,
};

/// A compound heterozygous pair with its order-independent key.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedResult {
    /// Sorted keys of the two variants.
    pub pair_key: (u64, u64),
    pub variants: [VariantResult; 2],
}

/// Sorted tuple of the two keys.
pub fn pair_key(a: u64, b: u64) -> (u64, u64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Pair the rows of `primary` and `secondary` that share a gene.
///
/// A variant is never paired with itself when both relations come from the same
/// dataset key.
pub fn pair(
    primary: &Relation,
    secondary: &Relation,
    num_families: usize,
    exclude_key_pairs: &HashSet<(u64, u64)>,
) -> Vec<PairedResult> {
    let same_dataset = primary.dataset_key == secondary.dataset_key;
    let mut secondary_by_gene: multimap::MultiMap<&str, usize> = multimap::MultiMap::new();
    for (idx, row) in secondary.rows.iter().enumerate() {
        for gene_id in &row.gene_ids {
            secondary_by_gene.insert(gene_id.as_str(), idx);
        }
    }

    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for p in &primary.rows {
        let partners = p
            .gene_ids
            .iter()
            .filter_map(|gene_id| secondary_by_gene.get_vec(gene_id.as_str()))
            .flatten()
            .copied()
            .collect::<BTreeSet<_>>();
        for idx in partners {
            let s = &secondary.rows[idx];
            let p_key = p.variant.annotation.key;
            let s_key = s.variant.annotation.key;
            if same_dataset && p_key == s_key {
                continue;
            }
            let Some(families) = pair_families(primary, secondary, p, s, num_families) else {
                continue;
            };

            let key = pair_key(p_key, s_key);
            if !seen.insert(key) {
                continue;
            }
            if exclude_key_pairs.contains(&key) {
                tracing::trace!("pair {:?} excluded", key);
                continue;
            }

            let mut first = p.variant.clone();
            let mut second = s.variant.clone();
            if num_families > 1 {
                first.retain_families(&families);
                second.retain_families(&families);
            }
            result.push(PairedResult {
                pair_key: key,
                variants: [first, second],
            });
        }
    }

    tracing::debug!(
        "paired {} primary and {} secondary candidates into {} pairs",
        primary.rows.len(),
        secondary.rows.len(),
        result.len()
    );
    result
}

/// Families that the pair is valid in, `None` if the pair is rejected.
fn pair_families(
    primary: &Relation,
    secondary: &Relation,
    p: &Candidate,
    s: &Candidate,
    num_families: usize,
) -> Option<Vec<String>> {
    let mut primary_families = p.variant.families();

    if primary.capabilities.carriers && secondary.capabilities.carriers {
        if !p.carriers().is_disjoint(&s.carriers()) {
            tracing::trace!(
                "pair {} / {} has unphased carriers",
                &p.variant.annotation.variant_id,
                &s.variant.annotation.variant_id
            );
            return None;
        }
    } else if primary.capabilities.family_carriers && secondary.capabilities.family_carriers {
        primary_families.retain(|family_guid| {
            p.carriers_of(family_guid)
                .is_disjoint(&s.carriers_of(family_guid))
        });
    }

    let overlapped_by_deletion = s.variant.annotation.is_deletion()
        && s.variant.annotation.pos <= p.variant.annotation.pos
        && s.variant
            .annotation
            .end
            .map(|end| p.variant.annotation.pos <= end)
            .unwrap_or(false);
    if primary.capabilities.has_hom_alt {
        if p.has_hom_alt() && !overlapped_by_deletion {
            return None;
        }
    } else if primary.capabilities.no_hom_alt_families && !overlapped_by_deletion {
        primary_families.retain(|family_guid| !p.hom_alt_families.contains(family_guid));
    }

    let families = if num_families > 1 {
        let secondary_families = s.variant.families();
        primary_families
            .into_iter()
            .filter(|family_guid| secondary_families.contains(family_guid))
            .collect::<Vec<_>>()
    } else {
        primary_families
    };
    if families.is_empty() {
        None
    } else {
        Some(families)
    }
}
