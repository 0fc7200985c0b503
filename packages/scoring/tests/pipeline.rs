use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use geo::{LineString, MultiPolygon, Point, polygon};
use line_risk_config::RunConfig;
use line_risk_models::{
    CanopyPolygon, DataIntegrityError, Facility, FacilityType, GeometryFlag, InputLayers,
    NeighborhoodPolygon, OUTSIDE_CITY_LIMITS, ProximityClass, Segment,
};
use line_risk_scoring::{Pipeline, ScoringError};

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    MultiPolygon(vec![polygon![
        (x: x0, y: y0),
        (x: x1, y: y0),
        (x: x1, y: y1),
        (x: x0, y: y1),
    ]])
}

fn segment(id: u64, from: (f64, f64), to: (f64, f64)) -> Segment {
    Segment::new(id, LineString::from(vec![from, to]))
}

/// Two neighborhoods side by side, a small canopy layer and one segment
/// east of the city boundary.
fn synthetic_city() -> InputLayers {
    InputLayers {
        segments: vec![
            segment(1, (100.0, 1000.0), (900.0, 1000.0)),
            segment(2, (2100.0, 500.0), (2300.0, 500.0)),
            segment(3, (2500.0, 1500.0), (3500.0, 1500.0)),
            segment(4, (5000.0, 5000.0), (5100.0, 5000.0)),
            segment(5, (1200.0, 300.0), (1200.0, 300.0)),
        ],
        canopy: vec![
            CanopyPolygon {
                geometry: rect(0.0, 950.0, 1000.0, 1050.0),
            },
            CanopyPolygon {
                geometry: rect(2900.0, 1400.0, 3100.0, 1600.0),
            },
            CanopyPolygon {
                geometry: rect(8000.0, 8000.0, 8100.0, 8100.0),
            },
        ],
        facilities: vec![
            Facility {
                location: Point::new(500.0, 1100.0),
                facility_type: FacilityType::Hospital,
                name: Some("General".to_string()),
            },
            Facility {
                location: Point::new(3000.0, 200.0),
                facility_type: FacilityType::FireStation,
                name: None,
            },
        ],
        neighborhoods: vec![
            NeighborhoodPolygon {
                neighborhood: "Downtown".to_string(),
                geometry: rect(0.0, 0.0, 2000.0, 2000.0),
            },
            NeighborhoodPolygon {
                neighborhood: "Riverside".to_string(),
                geometry: rect(2000.0, 0.0, 4000.0, 2000.0),
            },
        ],
    }
}

#[test]
fn synthetic_city_scores_every_segment() {
    let pipeline = Pipeline::new(RunConfig {
        chunk_size: 2,
        ..RunConfig::default()
    })
    .unwrap();

    let output = pipeline.run(synthetic_city()).unwrap();

    let ids: Vec<u64> = output.segments.iter().map(|s| s.segment_id()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    let mut ranks: Vec<usize> = output.segments.iter().map(|s| s.priority_rank).collect();
    ranks.sort_unstable();
    assert_eq!(ranks, vec![1, 2, 3, 4, 5]);

    let first = &output.segments[0];
    assert_eq!(first.proximity.proximity_score, ProximityClass::High);
    assert_eq!(first.proximity.nearest_facility_type, Some(FacilityType::Hospital));
    assert!((first.proximity.proximity_dist_ft.unwrap() - 100.0).abs() < 1e-9);
    assert!(first.canopy.canopy_area_sqft > 0.0);
    assert!(
        first.canopy.canopy_area_sqft
            <= first.buffered.buffer_area_sqft * (1.0 + 1e-7),
        "Canopy {} exceeds buffer {}",
        first.canopy.canopy_area_sqft,
        first.buffered.buffer_area_sqft
    );
    assert_eq!(first.priority_rank, 1, "Densest canopy next to a hospital ranks first");

    let summary = &output.summary;
    assert_eq!(summary.segments, 5);
    assert_eq!(summary.degenerate_buffers, 1);
    assert_eq!(summary.segments_with_canopy, 2);
    assert_eq!(summary.outside_city_limits, 1);
    assert_eq!(summary.unlocated_segments, 0);
    assert!(summary.canopy_acres > 0.0);
    assert_eq!(
        summary.high.segments + summary.medium.segments + summary.low.segments,
        5
    );
    assert!(summary.tier_thresholds.is_some());
    assert!(summary.scores.min <= summary.scores.median);
    assert!(summary.scores.median <= summary.scores.max);
}

#[test]
fn degenerate_lines_are_scored_not_fatal() {
    let mut inputs = synthetic_city();
    inputs.segments.push(Segment::new(6, LineString::new(vec![])));
    inputs.segments.push(Segment::new(
        7,
        LineString::from(vec![(10.0, 20.0), (f64::NAN, 20.0)]),
    ));

    let output = Pipeline::new(RunConfig::default())
        .unwrap()
        .run(inputs)
        .unwrap();

    assert_eq!(output.segments.len(), 7);
    assert_eq!(output.segments[0].priority_rank, 1);

    for degenerate in &output.segments[5..] {
        assert_eq!(degenerate.buffered.flag, GeometryFlag::Degenerate);
        assert!(degenerate.buffered.buffer_area_sqft.abs() < f64::EPSILON);
        assert!(degenerate.canopy.canopy_area_sqft.abs() < f64::EPSILON);
        assert_eq!(degenerate.proximity.proximity_score, ProximityClass::Low);
        assert!(degenerate.proximity.nearest_facility_type.is_none());
        assert!(degenerate.factors.vegetation.abs() < f64::EPSILON);
        assert!(degenerate.factors.length.abs() < f64::EPSILON);
        assert!(degenerate.risk_score.is_finite());
    }

    let summary = &output.summary;
    assert_eq!(summary.unlocated_segments, 2);
    assert_eq!(summary.degenerate_buffers, 3);
    assert_eq!(summary.outside_city_limits, 3);
    assert_eq!(&output.assignments[5..], &[OUTSIDE_CITY_LIMITS, OUTSIDE_CITY_LIMITS]);
}

#[test]
fn synthetic_city_neighborhood_summaries() {
    let output = Pipeline::new(RunConfig::default())
        .unwrap()
        .run(synthetic_city())
        .unwrap();

    assert_eq!(
        output.assignments,
        vec![
            "Downtown",
            "Riverside",
            "Riverside",
            OUTSIDE_CITY_LIMITS,
            "Downtown"
        ]
    );

    let labels: Vec<&str> = output
        .neighborhoods
        .iter()
        .map(|n| n.neighborhood.as_str())
        .collect();
    assert_eq!(labels.len(), 3);
    assert!(labels.contains(&OUTSIDE_CITY_LIMITS));

    for pair in output.neighborhoods.windows(2) {
        assert!(pair[0].pct_high_risk >= pair[1].pct_high_risk);
    }

    let total: usize = output.neighborhoods.iter().map(|n| n.total_segments).sum();
    assert_eq!(total, 5);

    let downtown = output
        .neighborhoods
        .iter()
        .find(|n| n.neighborhood == "Downtown")
        .unwrap();
    assert_eq!(downtown.total_segments, 2);
    assert!((downtown.total_length_ft - 800.0).abs() < 1e-9);
}

#[test]
fn runs_are_deterministic() {
    let pipeline = Pipeline::new(RunConfig::default()).unwrap();

    let first = pipeline.run(synthetic_city()).unwrap();
    let second = pipeline.run(synthetic_city()).unwrap();

    let records = |output: &line_risk_scoring::RunOutput| {
        output
            .segments
            .iter()
            .map(line_risk_models::ScoredSegment::to_record)
            .collect::<Vec<_>>()
    };
    assert_eq!(records(&first), records(&second));
    assert_eq!(first.neighborhoods, second.neighborhoods);
}

#[test]
fn empty_facility_layer_is_fatal() {
    let mut inputs = synthetic_city();
    inputs.facilities.clear();

    let result = Pipeline::new(RunConfig::default()).unwrap().run(inputs);
    assert!(matches!(
        result,
        Err(ScoringError::DataIntegrity(DataIntegrityError::EmptyCorpus {
            corpus: "facility"
        }))
    ));
}

#[test]
fn empty_neighborhood_layer_is_fatal() {
    let mut inputs = synthetic_city();
    inputs.neighborhoods.clear();

    let result = Pipeline::new(RunConfig::default()).unwrap().run(inputs);
    assert!(matches!(
        result,
        Err(ScoringError::DataIntegrity(DataIntegrityError::EmptyCorpus {
            corpus: "neighborhood"
        }))
    ));
}

#[test]
fn cancelled_run_returns_no_output() {
    let cancel = Arc::new(AtomicBool::new(true));
    let pipeline = Pipeline::new(RunConfig::default())
        .unwrap()
        .with_cancel(cancel);

    let result = pipeline.run(synthetic_city());
    assert!(matches!(
        result,
        Err(ScoringError::Cancelled { stage: "buffer" })
    ));
}
