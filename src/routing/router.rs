//! Placement of URLs onto instances and duplicate detection.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::{debug, info, instrument};

use super::affinity::AffinityTable;
use super::normalize::{comparable_host, extract_base_identity, normalize};

/// Read-only view of the instance set used for routing decisions.
pub trait PoolView {
    /// Number of instances; valid indices are `0..instance_count()`.
    fn instance_count(&self) -> usize;

    /// True while instance `index` has a live process run.
    fn is_running(&self, index: usize) -> bool;

    /// Pending URL list of instance `index`, in order.
    fn pending_urls(&self, index: usize) -> &[String];
}

/// Reasons automatic placement can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The pool has no instances.
    #[error("no instances are available")]
    EmptyPool,

    /// Every instance is running and the identity has no recorded affinity.
    #[error("every instance is running; add the URL to a specific instance instead")]
    NoIdleInstance,
}

/// How a pending URL relates to the URL being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Normalized forms are equal.
    Exact,
    /// One normalized form contains the other.
    Partial,
}

impl MatchKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "Exact match",
            Self::Partial => "Partial match",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-instance duplicate findings, keyed by zero-based instance index.
pub type DuplicateMatches = BTreeMap<usize, MatchKind>;

/// Load-aware placement with sticky per-identity affinity.
#[derive(Debug, Clone, Default)]
pub struct UrlRouter {
    affinity: AffinityTable,
}

impl UrlRouter {
    #[must_use]
    pub fn new(affinity: AffinityTable) -> Self {
        Self { affinity }
    }

    /// Current affinity table.
    #[must_use]
    pub fn affinity(&self) -> &AffinityTable {
        &self.affinity
    }

    /// Chooses the instance that should receive `url`.
    ///
    /// A recorded affinity for the URL's base identity wins when it points
    /// at an existing instance, whatever that instance's load. Otherwise the
    /// idle instance with the fewest pending URLs is chosen (lowest index on
    /// ties), recorded and persisted.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::EmptyPool`] for an empty pool and
    /// [`RouteError::NoIdleInstance`] when a fresh identity finds every
    /// instance running.
    #[instrument(skip(self, pool))]
    pub fn place_url<P: PoolView + ?Sized>(
        &mut self,
        url: &str,
        pool: &P,
    ) -> Result<usize, RouteError> {
        let count = pool.instance_count();
        if count == 0 {
            return Err(RouteError::EmptyPool);
        }

        let identity = extract_base_identity(url);
        if let Some(index) = self.affinity.get(&identity) {
            if index < count {
                debug!(%identity, index, "sticky placement");
                return Ok(index);
            }
            debug!(%identity, index, "ignoring affinity to missing instance");
        }

        let chosen = (0..count)
            .filter(|&index| !pool.is_running(index))
            .min_by_key(|&index| (pool.pending_urls(index).len(), index))
            .ok_or(RouteError::NoIdleInstance)?;

        info!(%identity, index = chosen, "recorded new placement");
        self.affinity.insert(identity, chosen);
        self.affinity.save();
        Ok(chosen)
    }
}

/// Reports, per instance, whether `url` is already pending there.
///
/// Exact matches take precedence over partial matches on the same instance.
/// Empty strings never match partially.
#[must_use]
pub fn check_duplicate<P: PoolView + ?Sized>(url: &str, pool: &P) -> DuplicateMatches {
    let needle = normalize(url.trim());
    let mut matches = DuplicateMatches::new();

    for index in 0..pool.instance_count() {
        let mut found = None;
        for pending in pool.pending_urls(index) {
            let candidate = normalize(pending.trim());
            if candidate == needle {
                found = Some(MatchKind::Exact);
                break;
            }
            if found.is_none()
                && !needle.is_empty()
                && !candidate.is_empty()
                && (candidate.contains(&needle) || needle.contains(&candidate))
            {
                found = Some(MatchKind::Partial);
            }
        }
        if let Some(kind) = found {
            matches.insert(index, kind);
        }
    }

    matches
}

/// Runs [`check_duplicate`] independently for every URL, in input order.
#[must_use]
pub fn check_bulk<P: PoolView + ?Sized>(
    urls: &[String],
    pool: &P,
) -> Vec<(String, DuplicateMatches)> {
    urls.iter()
        .map(|url| url.trim())
        .filter(|url| !url.is_empty())
        .map(|url| (url.to_string(), check_duplicate(url, pool)))
        .collect()
}

/// Lists pending URLs per instance whose host contains `domain`.
///
/// Hosts are compared lower-cased with `www.` removed. An empty filter
/// matches nothing.
#[must_use]
pub fn filter_by_domain<P: PoolView + ?Sized>(
    domain: &str,
    pool: &P,
) -> BTreeMap<usize, Vec<String>> {
    let needle = domain.trim().to_ascii_lowercase();
    let mut filtered = BTreeMap::new();
    if needle.is_empty() {
        return filtered;
    }

    for index in 0..pool.instance_count() {
        let urls: Vec<String> = pool
            .pending_urls(index)
            .iter()
            .filter(|url| comparable_host(url).is_some_and(|host| host.contains(&needle)))
            .cloned()
            .collect();
        if !urls.is_empty() {
            filtered.insert(index, urls);
        }
    }

    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakePool {
        pending: Vec<Vec<String>>,
        running: Vec<bool>,
    }

    impl FakePool {
        fn with_loads(loads: &[usize]) -> Self {
            Self {
                pending: loads
                    .iter()
                    .enumerate()
                    .map(|(i, &n)| (0..n).map(|k| format!("https://load{i}.com/{k}")).collect())
                    .collect(),
                running: vec![false; loads.len()],
            }
        }
    }

    impl PoolView for FakePool {
        fn instance_count(&self) -> usize {
            self.pending.len()
        }

        fn is_running(&self, index: usize) -> bool {
            self.running[index]
        }

        fn pending_urls(&self, index: usize) -> &[String] {
            &self.pending[index]
        }
    }

    #[test]
    fn test_place_url_picks_first_least_loaded() {
        let pool = FakePool::with_loads(&[5, 2, 2, 9]);
        let mut router = UrlRouter::default();
        assert_eq!(router.place_url("https://fresh.com/x", &pool), Ok(1));
        assert_eq!(router.affinity().get("fresh.com"), Some(1));
    }

    #[test]
    fn test_place_url_is_sticky_when_load_shifts() {
        let mut pool = FakePool::with_loads(&[0, 3]);
        let mut router = UrlRouter::default();
        assert_eq!(router.place_url("https://s.com/user/al/1", &pool), Ok(0));

        pool.pending[0] = (0..10).map(|k| format!("https://x.com/{k}")).collect();
        pool.running[0] = true;
        assert_eq!(router.place_url("https://s.com/user/al/2", &pool), Ok(0));
    }

    #[test]
    fn test_place_url_skips_running_instances() {
        let mut pool = FakePool::with_loads(&[0, 4]);
        pool.running[0] = true;
        let mut router = UrlRouter::default();
        assert_eq!(router.place_url("https://b.com", &pool), Ok(1));
    }

    #[test]
    fn test_place_url_all_running_is_an_error_without_affinity() {
        let mut pool = FakePool::with_loads(&[0, 0]);
        pool.running = vec![true, true];
        let mut router = UrlRouter::default();
        assert_eq!(
            router.place_url("https://b.com", &pool),
            Err(RouteError::NoIdleInstance)
        );
        assert!(router.affinity().is_empty());
    }

    #[test]
    fn test_place_url_empty_pool() {
        let pool = FakePool::with_loads(&[]);
        let mut router = UrlRouter::default();
        assert_eq!(router.place_url("https://b.com", &pool), Err(RouteError::EmptyPool));
    }

    #[test]
    fn test_place_url_recomputes_out_of_range_affinity() {
        let pool = FakePool::with_loads(&[3, 1]);
        let mut affinity = AffinityTable::in_memory();
        affinity.insert("gone.com", 7);
        let mut router = UrlRouter::new(affinity);
        assert_eq!(router.place_url("https://gone.com/a", &pool), Ok(1));
        assert_eq!(router.affinity().get("gone.com"), Some(1));
    }

    #[test]
    fn test_check_duplicate_exact_beats_partial() {
        let pool = FakePool {
            pending: vec![
                vec![
                    "https://a.com/post/12".to_string(),
                    "https://www.a.com/post/1/".to_string(),
                ],
                vec!["https://a.com/post/123".to_string()],
                vec!["https://other.com".to_string()],
            ],
            running: vec![false; 3],
        };

        let matches = check_duplicate("https://a.com/post/1", &pool);
        assert_eq!(matches.get(&0), Some(&MatchKind::Exact));
        assert_eq!(matches.get(&1), Some(&MatchKind::Partial));
        assert!(!matches.contains_key(&2));
    }

    #[test]
    fn test_check_bulk_runs_each_url_independently() {
        let pool = FakePool {
            pending: vec![vec!["https://a.com/1".to_string()]],
            running: vec![false],
        };
        let results = check_bulk(
            &[
                "https://a.com/1".to_string(),
                "  ".to_string(),
                "https://z.com".to_string(),
            ],
            &pool,
        );
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].1.get(&0), Some(&MatchKind::Exact));
        assert!(results[1].1.is_empty());
    }

    #[test]
    fn test_filter_by_domain_matches_hosts_only() {
        let pool = FakePool {
            pending: vec![
                vec![
                    "https://www.Example.com/a".to_string(),
                    "https://other.com/example.com".to_string(),
                ],
                vec!["https://cdn.example.com/x".to_string()],
            ],
            running: vec![false; 2],
        };
        let filtered = filter_by_domain("EXAMPLE.com", &pool);
        assert_eq!(filtered[&0], vec!["https://www.Example.com/a".to_string()]);
        assert_eq!(filtered[&1].len(), 1);
        assert!(filter_by_domain("  ", &pool).is_empty());
    }
}
