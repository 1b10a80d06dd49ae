//! Evaluation of inheritance constraints on the calls of one family.

use std::collections::BTreeSet;

use crate::{
    common::is_x_chrom,
    search::{
        samples::SampleDetail,
        schema::{
            data::{Affected, Genotype},
            query::InheritanceMode,
        },
    },
};

/// Inheritance constraint applied to entry rows.
///
/// In addition to the user-facing modes, this contains the modes used internally for the
/// compound heterozygous passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum EntryMode {
    /// Any sample carries an alternative allele.
    Any,
    AnyAffected,
    DeNovo,
    Dominant,
    HomozygousRecessive,
    XLinkedRecessive,
    CompoundHet,
    /// Compound heterozygous constraints, but affected samples may be homozygous.
    CompoundHetAllowHomAlts,
}

impl EntryMode {
    /// The mode of the single-hit pass for the given inheritance mode.
    pub fn from_inheritance(mode: Option<InheritanceMode>) -> Self {
        match mode {
            None => EntryMode::Any,
            Some(InheritanceMode::AnyAffected) => EntryMode::AnyAffected,
            Some(InheritanceMode::DeNovo) => EntryMode::DeNovo,
            Some(InheritanceMode::Dominant) => EntryMode::Dominant,
            Some(InheritanceMode::HomozygousRecessive) | Some(InheritanceMode::Recessive) => {
                EntryMode::HomozygousRecessive
            }
            Some(InheritanceMode::XLinkedRecessive) => EntryMode::XLinkedRecessive,
            Some(InheritanceMode::CompoundHet) => EntryMode::CompoundHet,
        }
    }
}

/// Genotype requirement of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requirement {
    Any,
    Alt,
    Het,
    Hom,
    NotHom,
    Ref,
}

impl Requirement {
    fn for_sample(mode: EntryMode, sample: &SampleDetail) -> Self {
        match (mode, sample.affected) {
            (_, Affected::Unknown) | (EntryMode::Any, _) | (EntryMode::AnyAffected, _) => {
                Requirement::Any
            }
            (EntryMode::DeNovo | EntryMode::Dominant, Affected::Affected) => Requirement::Alt,
            (EntryMode::DeNovo | EntryMode::Dominant, Affected::Unaffected) => Requirement::Ref,
            (EntryMode::HomozygousRecessive, Affected::Affected) => Requirement::Hom,
            (EntryMode::XLinkedRecessive, Affected::Affected) => Requirement::Hom,
            (EntryMode::XLinkedRecessive, Affected::Unaffected) if sample.sex.is_male() => {
                Requirement::Ref
            }
            (EntryMode::CompoundHet, Affected::Affected) => Requirement::Het,
            (EntryMode::CompoundHetAllowHomAlts, Affected::Affected) => Requirement::Alt,
            (_, Affected::Unaffected) => Requirement::NotHom,
        }
    }

    /// No-calls only match `Any`.
    fn matches(&self, gt: Option<Genotype>) -> bool {
        match (self, gt) {
            (Requirement::Any, _) => true,
            (_, None) => false,
            (Requirement::Alt, Some(gt)) => gt.has_alt(),
            (Requirement::Het, Some(gt)) => gt == Genotype::Het,
            (Requirement::Hom, Some(gt)) => gt == Genotype::Hom,
            (Requirement::NotHom, Some(gt)) => gt != Genotype::Hom,
            (Requirement::Ref, Some(gt)) => gt == Genotype::Ref,
        }
    }
}

/// Result of a passing `evaluate()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilyEvaluation {
    /// Individuals of unaffected samples with an alternative allele.
    pub carriers: BTreeSet<String>,
    /// Whether any affected sample is homozygous alternative.
    pub has_hom_alt: bool,
}

/// Evaluate the inheritance constraint on the genotypes of the expected family samples.
///
/// Samples without a call are represented with a `None` genotype.
pub fn evaluate(
    mode: EntryMode,
    chrom: &str,
    genotypes: &[(&SampleDetail, Option<Genotype>)],
) -> Option<FamilyEvaluation> {
    if mode == EntryMode::XLinkedRecessive && !is_x_chrom(chrom) {
        return None;
    }

    let has_alt = |gt: &Option<Genotype>| gt.map(|gt| gt.has_alt()).unwrap_or(false);
    let pass = match mode {
        EntryMode::Any => genotypes.iter().any(|(_, gt)| has_alt(gt)),
        EntryMode::AnyAffected => genotypes
            .iter()
            .any(|(sample, gt)| sample.affected == Affected::Affected && has_alt(gt)),
        _ => {
            genotypes
                .iter()
                .any(|(sample, _)| sample.affected == Affected::Affected)
                && genotypes
                    .iter()
                    .all(|(sample, gt)| Requirement::for_sample(mode, sample).matches(*gt))
        }
    };
    if !pass {
        return None;
    }

    Some(FamilyEvaluation {
        carriers: genotypes
            .iter()
            .filter(|(sample, gt)| sample.affected == Affected::Unaffected && has_alt(gt))
            .map(|(sample, _)| sample.individual_guid.clone())
            .collect(),
        has_hom_alt: genotypes.iter().any(|(sample, gt)| {
            sample.affected == Affected::Affected && *gt == Some(Genotype::Hom)
        }),
    })
}
