//! Point-in-neighborhood lookup.

use geo::{BoundingRect, Contains, Point};
use line_risk_models::{DataIntegrityError, NeighborhoodPolygon};
use line_risk_spatial::SpatialIndex;

/// Bounding-box index over the neighborhood partition with an exact
/// interior test on top.
pub struct NeighborhoodIndex<'a> {
    neighborhoods: &'a [NeighborhoodPolygon],
    index: SpatialIndex,
}

impl<'a> NeighborhoodIndex<'a> {
    /// Indexes the partition.
    ///
    /// # Errors
    ///
    /// Returns [`DataIntegrityError::EmptyCorpus`] if `neighborhoods` is
    /// empty.
    pub fn new(neighborhoods: &'a [NeighborhoodPolygon]) -> Result<Self, DataIntegrityError> {
        if neighborhoods.is_empty() {
            return Err(DataIntegrityError::EmptyCorpus {
                corpus: "neighborhood",
            });
        }

        let index = SpatialIndex::build(neighborhoods, |n| n.geometry.bounding_rect());

        log::debug!("Indexed {} neighborhood polygons", index.len());

        Ok(Self {
            neighborhoods,
            index,
        })
    }

    /// Label of the first neighborhood whose interior contains `point`.
    ///
    /// Overlapping partitions resolve in partition order, so results
    /// never depend on index layout.
    #[must_use]
    pub fn locate(&self, point: Point<f64>) -> Option<&'a str> {
        // Candidates come back sorted by partition position.
        self.index
            .query_point(point)
            .into_iter()
            .map(|position| &self.neighborhoods[position])
            .find(|n| n.geometry.contains(&point))
            .map(|n| n.neighborhood.as_str())
    }

    /// Number of polygons in the partition.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.neighborhoods.len()
    }

    /// Whether the partition is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.neighborhoods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, polygon};

    use super::*;

    fn square(label: &str, x: f64, y: f64, size: f64) -> NeighborhoodPolygon {
        NeighborhoodPolygon {
            neighborhood: label.to_string(),
            geometry: MultiPolygon(vec![polygon![
                (x: x, y: y),
                (x: x + size, y: y),
                (x: x + size, y: y + size),
                (x: x, y: y + size),
            ]]),
        }
    }

    #[test]
    fn interior_point_is_located() {
        let partition = [square("North", 0.0, 100.0, 100.0), square("South", 0.0, 0.0, 100.0)];
        let index = NeighborhoodIndex::new(&partition).unwrap();

        assert_eq!(index.locate(Point::new(50.0, 50.0)), Some("South"));
        assert_eq!(index.locate(Point::new(50.0, 150.0)), Some("North"));
        assert_eq!(index.locate(Point::new(500.0, 500.0)), None);
    }

    #[test]
    fn boundary_point_is_not_contained() {
        let partition = [square("North", 0.0, 100.0, 100.0), square("South", 0.0, 0.0, 100.0)];
        let index = NeighborhoodIndex::new(&partition).unwrap();

        assert_eq!(index.locate(Point::new(50.0, 100.0)), None);
        assert_eq!(index.locate(Point::new(0.0, 50.0)), None);
    }

    #[test]
    fn overlapping_partitions_resolve_in_order() {
        let partition = [square("Second", 50.0, 50.0, 100.0), square("First", 0.0, 0.0, 100.0)];
        let index = NeighborhoodIndex::new(&partition).unwrap();

        assert_eq!(index.locate(Point::new(75.0, 75.0)), Some("Second"));
    }

    #[test]
    fn empty_partition_is_rejected() {
        assert!(matches!(
            NeighborhoodIndex::new(&[]),
            Err(DataIntegrityError::EmptyCorpus {
                corpus: "neighborhood"
            })
        ));
    }
}
