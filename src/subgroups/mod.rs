// Subgroup discovery — validity analysis, ellipsoid hierarchy, membership.
//
// `validity` decides which linkage nodes deserve to be subgroups,
// `hierarchy` turns those decisions into a tree of fitted ellipsoids, and
// `membership` places out-of-sample points into that tree.

pub mod ellipsoid;
pub mod hierarchy;
pub mod membership;
pub mod silhouette;
pub mod validity;
