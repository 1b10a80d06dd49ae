use crate::{
    common::canonicalize,
    search::schema::{
        data::Annotation,
        query::{Interval, LocusFilter},
    },
};

/// Result of `passes()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocusMatch {
    /// First gene of the variant in the gene list, if a gene list was given.
    pub selected_gene_id: Option<String>,
    /// Genes of the variant in the gene list, all genes of the variant without gene list.
    pub gene_ids: Vec<String>,
}

/// Determine whether the `Annotation` passes the locus filter.
pub fn passes(locus: Option<&LocusFilter>, annotation: &Annotation) -> Option<LocusMatch> {
    let gene_ids = annotation.gene_ids();
    let Some(locus) = locus.filter(|l| !l.genes.is_empty() || !l.intervals.is_empty()) else {
        return Some(LocusMatch {
            selected_gene_id: None,
            gene_ids,
        });
    };

    let in_genes = gene_ids
        .iter()
        .filter(|gene_id| locus.genes.contains_key(*gene_id))
        .cloned()
        .collect::<Vec<_>>();
    let (begin, end) = span(annotation);
    let in_intervals = locus
        .intervals
        .iter()
        .any(|interval| overlaps(interval, &annotation.chrom, begin, end));
    let hit = !in_genes.is_empty() || in_intervals;

    if locus.exclude {
        if hit {
            tracing::trace!("variant {} in excluded locus", &annotation.variant_id);
            None
        } else {
            Some(LocusMatch {
                selected_gene_id: None,
                gene_ids,
            })
        }
    } else if hit {
        Some(LocusMatch {
            selected_gene_id: in_genes.first().cloned(),
            gene_ids: if locus.genes.is_empty() {
                gene_ids
            } else {
                in_genes
            },
        })
    } else {
        tracing::trace!(
            "variant {} fails locus filter {:?}",
            &annotation.variant_id,
            locus
        );
        None
    }
}

/// Span of the variant on its chromosome.
fn span(annotation: &Annotation) -> (i32, i32) {
    if annotation.end_chrom.is_some() {
        return (annotation.pos, annotation.pos);
    }
    let end = match (annotation.end, annotation.ref_.as_ref()) {
        (Some(end), _) => end,
        (None, Some(ref_)) if !ref_.is_empty() => annotation.pos + ref_.len() as i32 - 1,
        _ => annotation.pos,
    };
    (annotation.pos, end.max(annotation.pos))
}

fn overlaps(interval: &Interval, chrom: &str, begin: i32, end: i32) -> bool {
    canonicalize(&interval.chrom) == canonicalize(chrom)
        && interval.start <= end
        && interval.end >= begin
}
