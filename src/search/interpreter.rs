//! Interpretation of a `SearchSpec` on annotations and entry rows.

use crate::search::schema::{
    data::{Annotation, TranscriptConsequence},
    query::{AnnotationFilter, SearchSpec},
};

pub mod consequences;
pub mod frequency;
pub mod genotype;
pub mod in_silico;
pub mod locus;
pub mod quality;

/// What the annotation-level filters attributed a passing variant to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// First gene of the variant in the locus gene list.
    pub selected_gene_id: Option<String>,
    /// First transcript consequence matching the annotation filter, in the selected gene
    /// of gene-scoped searches.
    pub selected_transcript: Option<TranscriptConsequence>,
    /// Genes that compound heterozygous pairs may be formed in.
    pub gene_ids: Vec<String>,
}

/// Applies the annotation-level filters of a `SearchSpec` with a given annotation filter.
///
/// The annotation filter is passed separately as it differs between the primary and
/// secondary side of compound heterozygous searches.
#[derive(Debug, Clone)]
pub struct QueryInterpreter<'a> {
    pub spec: &'a SearchSpec,
    pub annotations: Option<AnnotationFilter>,
}

impl<'a> QueryInterpreter<'a> {
    /// Interpreter using the primary annotation filter.
    pub fn primary(spec: &'a SearchSpec) -> Self {
        Self {
            spec,
            annotations: spec.annotations.clone(),
        }
    }

    /// Interpreter using the secondary annotation filter of compound heterozygous pairs.
    pub fn secondary(spec: &'a SearchSpec) -> Self {
        Self {
            spec,
            annotations: spec.secondary_annotations().cloned(),
        }
    }

    /// Interpreter using the given annotation filter.
    pub fn with_annotations(spec: &'a SearchSpec, annotations: Option<AnnotationFilter>) -> Self {
        Self { spec, annotations }
    }

    /// Determine whether the `Annotation` passes all annotation-level filters.
    pub fn passes(&self, annotation: &Annotation) -> Option<Selection> {
        let locus = locus::passes(self.spec.locus.as_ref(), annotation)?;
        // only gene-scoped matches restrict the selected transcript
        let selected_genes: &[String] = if locus.selected_gene_id.is_some() {
            &locus.gene_ids
        } else {
            &[]
        };
        let csq = consequences::passes(
            self.annotations.as_ref(),
            self.spec.pathogenicity.as_ref(),
            selected_genes,
            annotation,
        )?;
        if !frequency::passes(&self.spec.freqs, annotation) {
            return None;
        }
        if !in_silico::passes(self.spec.in_silico.as_ref(), annotation) {
            return None;
        }

        let gene_ids = match csq.gene_ids {
            Some(csq_gene_ids) => csq_gene_ids
                .into_iter()
                .filter(|gene_id| locus.gene_ids.contains(gene_id))
                .collect(),
            None => locus.gene_ids,
        };
        Some(Selection {
            selected_gene_id: locus.selected_gene_id,
            selected_transcript: csq.selected_transcript,
            gene_ids,
        })
    }
}
