#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial indexes over static geometry corpora.
//!
//! Both indexes are bulk-loaded R-trees built once per run and never
//! updated afterwards. They only hold envelopes (or points) tagged with
//! the position of the geometry in its source slice, so the corpus itself
//! stays owned by the caller and the index is safe to share across
//! threads for reads.

use geo::{BoundingRect, Point, Rect};
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree, RTreeObject};

/// A corpus envelope stored in the R-tree with its corpus position.
struct IndexEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Bounding-box index over a geometry corpus.
///
/// Queries return candidate positions whose envelopes intersect the
/// query box. There are no false negatives; exact geometric tests are
/// left to the caller.
pub struct SpatialIndex {
    tree: RTree<IndexEntry>,
    corpus_len: usize,
}

impl SpatialIndex {
    /// Builds an index from the envelope of every item in `items`.
    ///
    /// Items for which `bounds` returns `None` (empty geometries) are
    /// left out of the tree and can never be returned by a query.
    pub fn build<T, F>(items: &[T], bounds: F) -> Self
    where
        F: Fn(&T) -> Option<Rect<f64>>,
    {
        let entries: Vec<IndexEntry> = items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                bounds(item).map(|rect| IndexEntry {
                    index,
                    envelope: envelope_of(&rect),
                })
            })
            .collect();

        let skipped = items.len() - entries.len();
        if skipped > 0 {
            log::debug!("Spatial index skipped {skipped} geometries without an envelope");
        }

        Self {
            tree: RTree::bulk_load(entries),
            corpus_len: items.len(),
        }
    }

    /// Builds an index directly from geometries that know their own
    /// bounding rectangle.
    pub fn from_geometries<G>(geometries: &[G]) -> Self
    where
        G: BoundingRect<f64, Output = Option<Rect<f64>>>,
    {
        Self::build(geometries, |geometry| geometry.bounding_rect())
    }

    /// Positions of every indexed geometry whose envelope intersects
    /// `bbox`, in ascending order.
    #[must_use]
    pub fn query(&self, bbox: &Rect<f64>) -> Vec<usize> {
        let query_env = envelope_of(bbox);

        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .map(|entry| entry.index)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Positions of every indexed geometry whose envelope contains
    /// `point` (boundary inclusive), in ascending order.
    #[must_use]
    pub fn query_point(&self, point: Point<f64>) -> Vec<usize> {
        let query_env = AABB::from_point([point.x(), point.y()]);

        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .map(|entry| entry.index)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Number of geometries in the source corpus (indexed or not).
    #[must_use]
    pub const fn corpus_len(&self) -> usize {
        self.corpus_len
    }

    /// Number of geometries actually held by the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the tree holds no geometries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// Result of a nearest-point lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest {
    /// Position of the nearest point in the source corpus.
    pub index: usize,
    /// Planar distance to it.
    pub distance: f64,
}

/// Nearest-neighbor index over a point corpus.
pub struct PointIndex {
    tree: RTree<GeomWithData<[f64; 2], usize>>,
}

impl PointIndex {
    /// Builds the index. Points with non-finite coordinates are skipped.
    #[must_use]
    pub fn new(points: &[Point<f64>]) -> Self {
        let entries = points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.x().is_finite() && p.y().is_finite())
            .map(|(index, p)| GeomWithData::new([p.x(), p.y()], index))
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Finds the point closest to `query`.
    ///
    /// Several points at exactly the same distance resolve to the one
    /// with the lowest corpus position, so results only depend on corpus
    /// order and never on tree layout.
    #[must_use]
    pub fn nearest(&self, query: Point<f64>) -> Option<Nearest> {
        let mut candidates = self
            .tree
            .nearest_neighbor_iter_with_distance_2(&[query.x(), query.y()]);

        let (first, best_distance_2) = candidates.next()?;
        let mut best_index = first.data;

        // Iteration is ordered by distance, so equal distances are adjacent.
        for (entry, distance_2) in candidates {
            if distance_2 > best_distance_2 {
                break;
            }
            best_index = best_index.min(entry.data);
        }

        Some(Nearest {
            index: best_index,
            distance: best_distance_2.sqrt(),
        })
    }

    /// Number of indexed points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether no points are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// Converts a [`Rect`] into an R-tree envelope.
#[must_use]
pub fn envelope_of(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}
