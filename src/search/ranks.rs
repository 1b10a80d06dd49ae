//! Static rank tables used for sorting.
//!
//! The tables are built once on first access and never modified afterwards.

use std::{collections::HashMap, sync::OnceLock};

/// ClinVar pathogenicity values, most severe first, ranked from 0.
pub const CLINVAR_PATHOGENICITIES: &[&str] = &[
    "Pathogenic",
    "Pathogenic/Likely_pathogenic",
    "Pathogenic/Likely_pathogenic/Established_risk_allele",
    "Pathogenic/Likely_pathogenic/Likely_risk_allele",
    "Pathogenic/Likely_risk_allele",
    "Likely_pathogenic",
    "Likely_pathogenic/Likely_risk_allele",
    "Established_risk_allele",
    "Likely_risk_allele",
    "Conflicting_classifications_of_pathogenicity",
    "Uncertain_risk_allele",
    "Uncertain_significance/Uncertain_risk_allele",
    "Uncertain_significance",
    "No_pathogenic_assertion",
    "Likely_benign",
    "Benign/Likely_benign",
    "Benign",
];

/// Sort value of variants without ClinVar pathogenicity, between uncertain significance
/// and no pathogenic assertion.
pub const ABSENT_CLINVAR_SORT_OFFSET: f64 = 12.5;

/// HGMD classes, most severe first, ranked from 0.
pub const HGMD_CLASSES: &[&str] = &["DM", "DM?", "DP", "DFP", "FP", "R"];

/// Transcript consequence terms, most severe first, ranked from 1.
pub const CONSEQUENCE_TERMS: &[&str] = &[
    "transcript_ablation",
    "splice_acceptor_variant",
    "splice_donor_variant",
    "stop_gained",
    "frameshift_variant",
    "stop_lost",
    "start_lost",
    "inframe_insertion",
    "inframe_deletion",
    "missense_variant",
    "protein_altering_variant",
    "splice_donor_5th_base_variant",
    "splice_region_variant",
    "splice_donor_region_variant",
    "splice_polypyrimidine_tract_variant",
    "incomplete_terminal_codon_variant",
    "start_retained_variant",
    "stop_retained_variant",
    "synonymous_variant",
    "coding_sequence_variant",
    "mature_miRNA_variant",
    "5_prime_UTR_variant",
    "3_prime_UTR_variant",
    "non_coding_transcript_exon_variant",
    "intron_variant",
    "NMD_transcript_variant",
    "non_coding_transcript_variant",
    "coding_transcript_variant",
    "upstream_gene_variant",
    "downstream_gene_variant",
    "intergenic_variant",
    "sequence_variant",
];

/// Structural variant gene consequences, most severe first, ranked from 1.
pub const SV_CONSEQUENCES: &[&str] = &[
    "LOF",
    "INTRAGENIC_EXON_DUP",
    "PARTIAL_EXON_DUP",
    "COPY_GAIN",
    "DUP_PARTIAL",
    "MSV_EXON_OVERLAP",
    "INV_SPAN",
    "UTR",
    "PROMOTER",
    "TSS_DUP",
    "BREAKEND_EXONIC",
    "INTRONIC",
    "NEAREST_TSS",
];

type RankTable = HashMap<&'static str, f64>;

fn build(values: &'static [&'static str], offset: usize) -> RankTable {
    values
        .iter()
        .enumerate()
        .map(|(idx, value)| (*value, (idx + offset) as f64))
        .collect()
}

/// Rank of a ClinVar pathogenicity value.
pub fn clinvar_rank(pathogenicity: &str) -> Option<f64> {
    static TABLE: OnceLock<RankTable> = OnceLock::new();
    TABLE
        .get_or_init(|| build(CLINVAR_PATHOGENICITIES, 0))
        .get(pathogenicity)
        .copied()
}

/// Rank of an HGMD class.
pub fn hgmd_rank(class: &str) -> Option<f64> {
    static TABLE: OnceLock<RankTable> = OnceLock::new();
    TABLE
        .get_or_init(|| build(HGMD_CLASSES, 0))
        .get(class)
        .copied()
}

/// Rank of a transcript consequence term.
pub fn consequence_rank(term: &str) -> Option<f64> {
    static TABLE: OnceLock<RankTable> = OnceLock::new();
    TABLE
        .get_or_init(|| build(CONSEQUENCE_TERMS, 1))
        .get(term)
        .copied()
}

/// Rank of a structural variant gene consequence.
pub fn sv_consequence_rank(consequence: &str) -> Option<f64> {
    static TABLE: OnceLock<RankTable> = OnceLock::new();
    TABLE
        .get_or_init(|| build(SV_CONSEQUENCES, 1))
        .get(consequence)
        .copied()
}
