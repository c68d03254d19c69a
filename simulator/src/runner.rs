//! The simulation loop: one request at a time, lookup then admit-on-miss.

use crate::input::TraceError;
use crate::stats::SimulationStats;
use webcache_rs::{Cache, Request};

/// Replays a trace against a policy. A trace error stops the replay; the
/// totals accumulated so far are returned either way.
pub fn run<I>(cache: &mut dyn Cache, trace: I) -> SimulationStats
where
    I: IntoIterator<Item = Result<Request, TraceError>>,
{
    let mut stats = SimulationStats::new();
    for item in trace {
        match item {
            Ok(req) => {
                let hit = cache.lookup(&req);
                if !hit {
                    cache.admit(&req);
                }
                stats.record(hit);
            }
            Err(e) => {
                tracing::warn!(error = %e, "stopping trace replay");
                break;
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use webcache_rs::policy;

    fn ok_trace(records: &[(u64, u64)]) -> Vec<Result<Request, TraceError>> {
        records.iter().map(|&(id, size)| Ok(Request::new(id, size))).collect()
    }

    #[test]
    fn test_run_counts_hits() {
        let mut cache = policy::create("LRU").unwrap();
        cache.set_size(3);
        let trace = ok_trace(&[(1, 1), (2, 1), (3, 1), (1, 1), (4, 1), (2, 1)]);
        let stats = run(cache.as_mut(), trace);
        assert_eq!(stats.reqs, 6);
        // The hit on 1 promotes it, so 4 evicts 2 and only that hit counts
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_run_stops_at_error_and_keeps_totals() {
        let mut cache = policy::create("LRU").unwrap();
        cache.set_size(3);
        let trace = vec![
            Ok(Request::new(1, 1)),
            Ok(Request::new(1, 1)),
            Err(TraceError::Parse {
                line: 3,
                reason: "boom".into(),
            }),
            Ok(Request::new(1, 1)),
        ];
        let stats = run(cache.as_mut(), trace);
        assert_eq!(stats.reqs, 2, "replay stops at the first error");
        assert_eq!(stats.hits, 1);
    }
}
