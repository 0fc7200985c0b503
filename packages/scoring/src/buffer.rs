//! Clearance buffer generation around conductor segments.
//!
//! Every segment is offset with the same style (round caps and round
//! joins, the overlay engine's default) so buffer areas are comparable
//! across the whole run. Zero-length lines become a circle of the buffer
//! radius around their single location.

use std::f64::consts::PI;

use geo::{Area, Buffer, Coord, LineString, MultiPolygon, Polygon};
use line_risk_config::{ConfigError, validate_buffer_distance};
use line_risk_models::{BufferedSegment, GeometryFlag, Segment};

use crate::batch::{BatchOptions, process_batched};
use crate::geometry::{Validity, ensure_valid};
use crate::{GeometryError, ScoringError};

/// Vertices used to approximate the circle around a zero-length line.
pub const CIRCLE_SEGMENTS: usize = 64;

/// Output of the buffer stage.
#[derive(Debug, Clone)]
pub struct BufferStage {
    /// One buffered record per input segment, in input order.
    pub segments: Vec<BufferedSegment>,
    /// Buffers fixed by the canonical repair.
    pub repaired: usize,
    /// Buffers built from degenerate input.
    pub degenerate: usize,
}

/// Offsets segments by a fixed planar distance.
#[derive(Debug, Clone, Copy)]
pub struct BufferGenerator {
    distance: f64,
}

impl BufferGenerator {
    /// Creates a generator for `distance_ft`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBufferDistance`] if the distance is
    /// not a positive finite number.
    pub fn new(distance_ft: f64) -> Result<Self, ConfigError> {
        validate_buffer_distance(distance_ft)?;
        Ok(Self {
            distance: distance_ft,
        })
    }

    /// Buffer distance in feet.
    #[must_use]
    pub const fn distance(&self) -> f64 {
        self.distance
    }

    /// Buffers a single line.
    ///
    /// # Errors
    ///
    /// Returns a [`GeometryError`] if the line is empty, has non-finite
    /// coordinates, or produces a buffer the repair cannot fix.
    pub fn offset(
        &self,
        line: &LineString<f64>,
    ) -> Result<(MultiPolygon<f64>, GeometryFlag), GeometryError> {
        let first = *line.0.first().ok_or(GeometryError::Empty)?;

        if line.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(GeometryError::NonFinite);
        }

        if line.0.iter().all(|c| *c == first) {
            let circle = circle(first, self.distance, CIRCLE_SEGMENTS);
            return Ok((MultiPolygon(vec![circle]), GeometryFlag::Degenerate));
        }

        let buffered = line.buffer(self.distance);
        if buffered.0.is_empty() {
            return Err(GeometryError::Empty);
        }

        match ensure_valid(buffered)? {
            (polygon, Validity::Valid) => Ok((polygon, GeometryFlag::Valid)),
            (polygon, Validity::Repaired) => Ok((polygon, GeometryFlag::Repaired)),
        }
    }

    /// Buffer polygon for `segment`, degrading to an empty polygon on
    /// failure.
    #[must_use]
    pub fn buffer_polygon(&self, segment: &Segment) -> (MultiPolygon<f64>, GeometryFlag) {
        match self.offset(&segment.geometry) {
            Ok((buffer, flag)) => {
                if flag == GeometryFlag::Repaired {
                    log::debug!("Segment {} buffer repaired", segment.segment_id);
                }
                (buffer, flag)
            }
            Err(e) => {
                log::debug!(
                    "Segment {} could not be buffered ({e}); using an empty buffer",
                    segment.segment_id
                );
                (MultiPolygon(vec![]), GeometryFlag::Degenerate)
            }
        }
    }

    /// Buffers a single segment.
    #[must_use]
    pub fn buffer_segment(&self, segment: Segment) -> BufferedSegment {
        let (buffer, flag) = self.buffer_polygon(&segment);
        attach(segment, buffer, flag)
    }

    /// Buffers every segment in bounded parallel batches, keeping input
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::Cancelled`] if the run is cancelled between
    /// batches.
    pub fn run(
        &self,
        segments: Vec<Segment>,
        options: &BatchOptions,
    ) -> Result<BufferStage, ScoringError> {
        let buffers = process_batched(&segments, options, "buffer", |s| self.buffer_polygon(s))?;

        let segments: Vec<BufferedSegment> = segments
            .into_iter()
            .zip(buffers)
            .map(|(segment, (buffer, flag))| attach(segment, buffer, flag))
            .collect();

        let repaired = count_flag(&segments, GeometryFlag::Repaired);
        let degenerate = count_flag(&segments, GeometryFlag::Degenerate);

        log::info!(
            "Buffered {} segments at {} ft ({repaired} repaired, {degenerate} degenerate)",
            segments.len(),
            self.distance
        );

        Ok(BufferStage {
            segments,
            repaired,
            degenerate,
        })
    }
}

fn attach(segment: Segment, buffer: MultiPolygon<f64>, flag: GeometryFlag) -> BufferedSegment {
    let buffer_area_sqft = buffer.unsigned_area();
    BufferedSegment {
        segment,
        buffer,
        buffer_area_sqft,
        flag,
    }
}

fn count_flag(segments: &[BufferedSegment], flag: GeometryFlag) -> usize {
    segments.iter().filter(|s| s.flag == flag).count()
}

/// Regular polygon approximating a circle of `radius` around `center`.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn circle(center: Coord<f64>, radius: f64, segments: usize) -> Polygon<f64> {
    let n = segments.max(4);

    let mut coords: Vec<Coord<f64>> = (0..n)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / n as f64;
            Coord {
                x: radius.mul_add(angle.cos(), center.x),
                y: radius.mul_add(angle.sin(), center.y),
            }
        })
        .collect();
    // Close the ring
    coords.push(coords[0]);

    Polygon::new(LineString::from(coords), vec![])
}
