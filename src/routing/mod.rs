//! URL routing: normalization, sticky affinity and duplicate detection.
//!
//! - [`normalize`] / [`extract_base_identity`] - canonical comparison keys
//! - [`AffinityTable`] - persisted identity to instance mapping
//! - [`UrlRouter`] - load-aware placement over any [`PoolView`]
//! - [`check_duplicate`], [`check_bulk`], [`filter_by_domain`] - operator queries

mod affinity;
mod normalize;
mod router;

pub use affinity::AffinityTable;
pub use normalize::{TRACKING_PARAMS, comparable_host, extract_base_identity, normalize};
pub use router::{
    DuplicateMatches, MatchKind, PoolView, RouteError, UrlRouter, check_bulk, check_duplicate,
    filter_by_domain,
};
