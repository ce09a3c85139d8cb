/// Correlator & Same-Author Filter
///
/// Turns raw analyzer comparisons into domain results. Tokens that do not
/// resolve through the run's token table are dropped with a diagnostic, never
/// guessed at. The same-author filter only shapes what is displayed: stored
/// results keep same-author pairs.

use crate::classifier::{classify, ratio_to_percent};
use crate::error::Diagnostic;
use crate::locator::RawComparisonRecord;
use crate::workspace::TokenMap;
use plagiarism_common::types::{AuthorId, PairwiseResult, SubmissionId};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Default)]
pub struct Correlated {
    pub results: Vec<PairwiseResult>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolve both tokens of every record, keeping the reported (a, b) order
pub fn correlate(records: &[RawComparisonRecord], tokens: &TokenMap) -> Correlated {
    let mut correlated = Correlated::default();

    for record in records {
        let resolved = tokens
            .resolve(&record.token_a)
            .zip(tokens.resolve(&record.token_b))
            .filter(|(a, b)| a != b);

        match resolved {
            Some((submission_id_a, submission_id_b)) => {
                let similarity_percent = ratio_to_percent(record.similarity_ratio);
                correlated.results.push(PairwiseResult {
                    submission_id_a,
                    submission_id_b,
                    similarity_percent,
                    status: classify(similarity_percent),
                });
            }
            None => {
                warn!(
                    token_a = %record.token_a,
                    token_b = %record.token_b,
                    "Dropping comparison with unresolved submission"
                );
                correlated.diagnostics.push(Diagnostic::UnresolvedPair {
                    token_a: record.token_a.clone(),
                    token_b: record.token_b.clone(),
                });
            }
        }
    }

    correlated
}

/// Drop pairs whose submissions share an author. Pairs with an unknown
/// author on either side are dropped as well.
pub fn distinct_authors(
    results: &[PairwiseResult],
    authors: &HashMap<SubmissionId, AuthorId>,
) -> Vec<PairwiseResult> {
    results
        .iter()
        .filter(|r| match (authors.get(&r.submission_id_a), authors.get(&r.submission_id_b)) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        })
        .cloned()
        .collect()
}

/// Highest similarity first, the usual display order
pub fn sort_for_display(results: &mut [PairwiseResult]) {
    results.sort_by(|x, y| {
        y.similarity_percent
            .partial_cmp(&x.similarity_percent)
            .unwrap_or(Ordering::Equal)
    });
}
