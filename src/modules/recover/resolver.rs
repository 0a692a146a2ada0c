use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::VxfsError;

use super::model::{BlobLookup, EntryMap};
use super::rules::RuleThresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrialOutcome {
    /// Enough entries landed on carved blobs.
    Accepted,
    /// Too many consecutive misses before reaching the success threshold.
    Aborted,
    /// Ran through the table with some hits, but fewer than needed.
    Partial,
    /// Ran through the table without a single hit.
    NoHits,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrialRecord {
    pub base_offset: u64,
    pub successes: usize,
    pub consecutive_failures: usize,
    pub beyond_max: usize,
    pub outcome: TrialOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub base_offset: u64,
    pub trials: Vec<TrialRecord>,
}

#[derive(Debug, Clone, Copy)]
enum ResolverState {
    Trying(usize),
    Accepted(usize),
    NextCandidate(usize),
    Exhausted,
}

/// Picks the filesystem base by checking which candidate turns table
/// offsets into names of existing blobs.
pub struct OffsetResolver<'a, B: BlobLookup> {
    entries: &'a EntryMap,
    blobs: &'a B,
    max_offset: u64,
    accept_successes: usize,
    max_consecutive_failures: usize,
}

impl<'a, B: BlobLookup> OffsetResolver<'a, B> {
    pub fn new(entries: &'a EntryMap, blobs: &'a B, max_offset: u64, t: &RuleThresholds) -> Self {
        Self {
            entries,
            blobs,
            max_offset,
            accept_successes: t.resolver_accept_successes,
            max_consecutive_failures: t.resolver_max_consecutive_failures,
        }
    }

    /// Verifies one base offset. Entries are visited in table order.
    pub fn trial(&self, base_offset: u64) -> TrialRecord {
        let mut record = TrialRecord {
            base_offset,
            successes: 0,
            consecutive_failures: 0,
            beyond_max: 0,
            outcome: TrialOutcome::NoHits,
        };

        for (name, rel) in self.entries.iter() {
            let absolute = match rel.checked_add(base_offset) {
                Some(abs) if abs <= self.max_offset => abs,
                _ => {
                    record.beyond_max += 1;
                    continue;
                }
            };

            if self.blobs.contains(absolute) {
                record.successes += 1;
                record.consecutive_failures = 0;
                if record.successes >= self.accept_successes {
                    record.outcome = TrialOutcome::Accepted;
                    return record;
                }
            } else {
                record.consecutive_failures += 1;
                debug!(name, absolute = format_args!("0x{:X}", absolute), "no blob");
                if record.consecutive_failures >= self.max_consecutive_failures {
                    record.outcome = TrialOutcome::Aborted;
                    return record;
                }
            }
        }

        if record.successes > 0 {
            record.outcome = TrialOutcome::Partial;
        }
        record
    }

    pub fn resolve(&self, candidates: &[u64]) -> Result<Resolution, VxfsError> {
        let mut trials = Vec::new();
        let mut state = if candidates.is_empty() {
            ResolverState::Exhausted
        } else {
            ResolverState::Trying(0)
        };

        loop {
            state = match state {
                ResolverState::Trying(i) => {
                    let base = candidates[i];
                    info!(base = format_args!("0x{:X}", base), "trying filesystem base");
                    let record = self.trial(base);
                    let outcome = record.outcome;
                    let (successes, failures) = (record.successes, record.consecutive_failures);
                    trials.push(record);
                    if outcome == TrialOutcome::Accepted {
                        ResolverState::Accepted(i)
                    } else {
                        let soft = VxfsError::OffsetMismatch {
                            base_offset: base,
                            successes,
                            failures,
                        };
                        warn!(error = %soft, "trying next candidate");
                        ResolverState::NextCandidate(i)
                    }
                }
                ResolverState::NextCandidate(i) if i + 1 < candidates.len() => {
                    ResolverState::Trying(i + 1)
                }
                ResolverState::NextCandidate(_) => ResolverState::Exhausted,
                ResolverState::Accepted(i) => {
                    info!(
                        base = format_args!("0x{:X}", candidates[i]),
                        trials = trials.len(),
                        "filesystem base accepted"
                    );
                    return Ok(Resolution {
                        base_offset: candidates[i],
                        trials,
                    });
                }
                ResolverState::Exhausted => {
                    // no full acceptance; fall back to the partial trial with the most hits
                    let Some(best) = best_partial(&trials) else {
                        return Err(VxfsError::UnresolvedOffset {
                            tried: trials.len(),
                            entries: self.entries.len(),
                        });
                    };
                    let (base_offset, successes) = (trials[best].base_offset, trials[best].successes);
                    warn!(
                        base = format_args!("0x{:X}", base_offset),
                        successes,
                        "no base reached the acceptance threshold, using the best partial match"
                    );
                    return Ok(Resolution { base_offset, trials });
                }
            };
        }
    }
}

/// Index of the partial trial with the most successes; earliest wins ties.
fn best_partial(trials: &[TrialRecord]) -> Option<usize> {
    trials
        .iter()
        .enumerate()
        .filter(|(_, t)| t.outcome == TrialOutcome::Partial)
        .min_by_key(|(i, t)| (std::cmp::Reverse(t.successes), *i))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::recover::rules::RecoverRules;
    use std::collections::HashSet;

    fn table(n: u64) -> EntryMap {
        (0..n)
            .map(|i| (format!("web/f{:02}.htm", i), 0x100 * (i + 1)))
            .collect()
    }

    #[test]
    fn picks_the_base_whose_offsets_exist() {
        let t = RecoverRules::default().thresholds;
        let entries = table(8);
        let blobs: HashSet<u64> = entries.iter().map(|(_, rel)| rel + 0x2000).collect();
        let resolver = OffsetResolver::new(&entries, &blobs, u64::MAX, &t);
        let res = resolver.resolve(&[0x1000, 0x2000]).unwrap();
        assert_eq!(res.base_offset, 0x2000);
        assert_eq!(res.trials.len(), 2);
        assert_eq!(res.trials[0].outcome, TrialOutcome::NoHits);
        assert_eq!(res.trials[1].successes, 5);
    }

    #[test]
    fn ten_consecutive_misses_abort_a_trial() {
        let t = RecoverRules::default().thresholds;
        let entries = table(20);
        // only the last entry hits, far too late
        let blobs: HashSet<u64> = [0x100 * 20].into();
        let resolver = OffsetResolver::new(&entries, &blobs, u64::MAX, &t);
        let rec = resolver.trial(0);
        assert_eq!(rec.outcome, TrialOutcome::Aborted);
        assert_eq!(rec.consecutive_failures, 10);
    }

    #[test]
    fn a_hit_resets_the_failure_counter() {
        let t = RecoverRules::default().thresholds;
        let entries = table(20);
        let hits: HashSet<u64> = [0x100 * 9, 0x100 * 18].into();
        let resolver = OffsetResolver::new(&entries, &hits, u64::MAX, &t);
        let rec = resolver.trial(0);
        assert_eq!(rec.outcome, TrialOutcome::Partial);
        assert_eq!(rec.successes, 2);
    }

    #[test]
    fn offsets_beyond_max_are_ignored() {
        let t = RecoverRules::default().thresholds;
        let entries = table(3);
        let blobs: HashSet<u64> = [0x100].into();
        let resolver = OffsetResolver::new(&entries, &blobs, 0x100, &t);
        let rec = resolver.trial(0);
        assert_eq!(rec.beyond_max, 2);
        assert_eq!(rec.outcome, TrialOutcome::Partial);
    }

    #[test]
    fn stray_hit_does_not_beat_a_later_full_match() {
        let t = RecoverRules::default().thresholds;
        let entries = table(8);
        let mut blobs: HashSet<u64> = entries.iter().map(|(_, rel)| rel + 0x2000).collect();
        blobs.insert(0x100 + 0x1000);
        let resolver = OffsetResolver::new(&entries, &blobs, u64::MAX, &t);
        let res = resolver.resolve(&[0x1000, 0x2000]).unwrap();
        assert_eq!(res.base_offset, 0x2000);
        assert_eq!(res.trials[0].outcome, TrialOutcome::Partial);
        assert_eq!(res.trials[1].outcome, TrialOutcome::Accepted);
    }

    #[test]
    fn best_partial_is_used_once_candidates_run_out() {
        let t = RecoverRules::default().thresholds;
        let entries = table(6);
        // 0x1000 verifies one entry, 0x3000 verifies three
        let blobs: HashSet<u64> = [0x1100, 0x3100, 0x3300, 0x3500].into();
        let resolver = OffsetResolver::new(&entries, &blobs, u64::MAX, &t);
        let res = resolver.resolve(&[0x1000, 0x2000, 0x3000]).unwrap();
        assert_eq!(res.base_offset, 0x3000);
        assert_eq!(res.trials.len(), 3);
        assert_eq!(res.trials[1].outcome, TrialOutcome::NoHits);
    }

    #[test]
    fn equal_partials_keep_report_order() {
        let t = RecoverRules::default().thresholds;
        let entries = table(4);
        let blobs: HashSet<u64> = [0x1100, 0x2200].into();
        let resolver = OffsetResolver::new(&entries, &blobs, u64::MAX, &t);
        let res = resolver.resolve(&[0x2000, 0x1000]).unwrap();
        assert_eq!(res.base_offset, 0x2000);
    }

    #[test]
    fn exhausted_candidates_are_fatal() {
        let t = RecoverRules::default().thresholds;
        let entries = table(4);
        let blobs: HashSet<u64> = HashSet::new();
        let resolver = OffsetResolver::new(&entries, &blobs, u64::MAX, &t);
        let err = resolver.resolve(&[0, 0x10]).unwrap_err();
        assert!(matches!(err, VxfsError::UnresolvedOffset { tried: 2, entries: 4 }));
        assert!(resolver.resolve(&[]).is_err());
    }
}
