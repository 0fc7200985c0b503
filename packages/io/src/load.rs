//! `GeoJSON` layer loaders.
//!
//! Every layer is a `FeatureCollection`. Features without a geometry, or
//! with a geometry type the layer does not use, are skipped and counted
//! in a warning. Missing or malformed required properties are fatal.

use std::path::{Path, PathBuf};
use std::str::FromStr as _;

use geo::{Geometry, LineString, MultiPolygon};
use geojson::{Feature, FeatureCollection, GeoJson};
use line_risk_config::InputFields;
use line_risk_models::{
    CanopyPolygon, DataIntegrityError, Facility, FacilityType, InputLayers, NeighborhoodPolygon,
    Segment, SegmentId,
};
use serde_json::Value;

use crate::LoadError;

/// Locations of the four input layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPaths {
    /// Power line segments.
    pub lines: PathBuf,
    /// Tree canopy polygons.
    pub canopy: PathBuf,
    /// Fire stations and hospitals.
    pub facilities: PathBuf,
    /// Neighborhood partition.
    pub neighborhoods: PathBuf,
}

/// Loads all four layers.
///
/// # Errors
///
/// * If a file cannot be read or is not a `GeoJSON` `FeatureCollection`
/// * If a feature is missing a required property or has an invalid value
pub fn load_inputs(paths: &InputPaths, fields: &InputFields) -> Result<InputLayers, LoadError> {
    let segments = parse_segments(read_collection(&paths.lines)?, fields)?;
    let canopy = parse_canopy(read_collection(&paths.canopy)?);
    let facilities = parse_facilities(read_collection(&paths.facilities)?, fields)?;
    let neighborhoods = parse_neighborhoods(read_collection(&paths.neighborhoods)?, fields)?;

    log::info!(
        "Loaded {} segments, {} canopy polygons, {} facilities, {} neighborhoods",
        segments.len(),
        canopy.len(),
        facilities.len(),
        neighborhoods.len()
    );

    Ok(InputLayers {
        segments,
        canopy,
        facilities,
        neighborhoods,
    })
}

/// Reads a `FeatureCollection` from disk.
///
/// # Errors
///
/// * If the file cannot be read
/// * If the content is not a `GeoJSON` `FeatureCollection`
pub fn read_collection(path: &Path) -> Result<FeatureCollection, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_collection(&text, &path.display().to_string())
}

/// Parses a `FeatureCollection`. `label` names the source in errors.
///
/// # Errors
///
/// * If `text` is not valid `GeoJSON`
/// * If it is valid `GeoJSON` but not a `FeatureCollection`
pub fn parse_collection(text: &str, label: &str) -> Result<FeatureCollection, LoadError> {
    let geojson = text.parse::<GeoJson>().map_err(|e| LoadError::GeoJson {
        path: label.to_string(),
        source: Box::new(e),
    })?;

    match geojson {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        _ => Err(LoadError::NotFeatureCollection {
            path: label.to_string(),
        }),
    }
}

/// Builds segments from a line layer.
///
/// When the conductor property appears on any feature, only features
/// whose value equals the overhead marker are kept; otherwise every line
/// is kept. `MultiLineString` features yield one segment per part. Ids
/// come from `segment_id_field` when configured, else they are assigned
/// sequentially from 0 after filtering.
///
/// # Errors
///
/// * If a configured segment id is missing or not a non-negative integer
pub fn parse_segments(
    collection: FeatureCollection,
    fields: &InputFields,
) -> Result<Vec<Segment>, LoadError> {
    let total = collection.features.len();
    let has_conductor = collection
        .features
        .iter()
        .any(|f| property(f, &fields.conductor_field).is_some());

    if !has_conductor {
        log::warn!(
            "Line layer has no `{}` property; using all {total} lines",
            fields.conductor_field
        );
    }

    let mut segments = vec![];
    let mut skipped = 0;
    let mut filtered = 0;
    let mut empty = 0;

    for (position, mut feature) in collection.features.into_iter().enumerate() {
        if has_conductor {
            let conductor = property(&feature, &fields.conductor_field).and_then(as_text);
            if conductor.as_deref() != Some(fields.overhead_value.as_str()) {
                filtered += 1;
                continue;
            }
        }

        let explicit_id = match &fields.segment_id_field {
            Some(field) => Some(segment_id(&feature, position, field)?),
            None => None,
        };

        let Some(lines) = take_geometry(&mut feature).and_then(into_lines) else {
            skipped += 1;
            continue;
        };

        for line in lines {
            let id = explicit_id.unwrap_or(segments.len() as SegmentId);
            if line.0.is_empty() {
                empty += 1;
            }
            segments.push(Segment::new(id, line));
        }
    }

    if has_conductor {
        log::info!(
            "Kept {} overhead segments; removed {filtered} of {total} lines as underground/other",
            segments.len()
        );
    }
    warn_skipped("line", skipped);
    if empty > 0 {
        log::warn!("{empty} line segments have no coordinates; they will score as degenerate");
    }

    Ok(segments)
}

/// Builds canopy polygons. Non-polygonal features are skipped.
#[must_use]
pub fn parse_canopy(collection: FeatureCollection) -> Vec<CanopyPolygon> {
    let mut skipped = 0;

    let canopy: Vec<CanopyPolygon> = collection
        .features
        .into_iter()
        .filter_map(|mut feature| {
            let geometry = take_geometry(&mut feature).and_then(into_multi_polygon);
            if geometry.is_none() {
                skipped += 1;
            }
            geometry.map(|geometry| CanopyPolygon { geometry })
        })
        .collect();

    warn_skipped("canopy", skipped);
    canopy
}

/// Builds facilities from a point layer.
///
/// # Errors
///
/// * If a point feature has no facility type
/// * If the facility type is neither `fire_station` nor `hospital`
pub fn parse_facilities(
    collection: FeatureCollection,
    fields: &InputFields,
) -> Result<Vec<Facility>, LoadError> {
    let mut facilities = vec![];
    let mut skipped = 0;

    for (position, mut feature) in collection.features.into_iter().enumerate() {
        let Some(Geometry::Point(location)) = take_geometry(&mut feature) else {
            skipped += 1;
            continue;
        };

        let raw_type = required_text(&feature, "facility", position, &fields.facility_type_field)?;
        let facility_type =
            FacilityType::from_str(&raw_type).map_err(|_| DataIntegrityError::InvalidProperty {
                layer: "facility",
                feature: position,
                field: fields.facility_type_field.clone(),
                value: raw_type.clone(),
            })?;

        let name = property(&feature, &fields.facility_name_field).and_then(as_text);

        facilities.push(Facility {
            location,
            facility_type,
            name,
        });
    }

    warn_skipped("facility", skipped);
    Ok(facilities)
}

/// Builds the neighborhood partition.
///
/// # Errors
///
/// * If a polygon feature has no label or an empty one
pub fn parse_neighborhoods(
    collection: FeatureCollection,
    fields: &InputFields,
) -> Result<Vec<NeighborhoodPolygon>, LoadError> {
    let mut neighborhoods = vec![];
    let mut skipped = 0;

    for (position, mut feature) in collection.features.into_iter().enumerate() {
        let Some(geometry) = take_geometry(&mut feature).and_then(into_multi_polygon) else {
            skipped += 1;
            continue;
        };

        let neighborhood =
            required_text(&feature, "neighborhood", position, &fields.neighborhood_field)?;

        neighborhoods.push(NeighborhoodPolygon {
            neighborhood,
            geometry,
        });
    }

    warn_skipped("neighborhood", skipped);
    Ok(neighborhoods)
}

fn warn_skipped(layer: &str, skipped: usize) {
    if skipped > 0 {
        log::warn!("Skipped {skipped} {layer} features with a missing or unsupported geometry");
    }
}

fn take_geometry(feature: &mut Feature) -> Option<Geometry<f64>> {
    let geometry = feature.geometry.take()?;
    Geometry::<f64>::try_from(geometry).ok()
}

fn into_lines(geometry: Geometry<f64>) -> Option<Vec<LineString<f64>>> {
    match geometry {
        Geometry::LineString(line) => Some(vec![line]),
        Geometry::MultiLineString(lines) => Some(lines.0),
        _ => None,
    }
}

fn into_multi_polygon(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => Some(MultiPolygon(vec![polygon])),
        Geometry::MultiPolygon(polygons) => Some(polygons),
        _ => None,
    }
}

/// Non-null property value.
fn property<'a>(feature: &'a Feature, field: &str) -> Option<&'a Value> {
    feature.property(field).filter(|value| !value.is_null())
}

/// Trimmed textual form of a string or number property.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required_text(
    feature: &Feature,
    layer: &'static str,
    position: usize,
    field: &str,
) -> Result<String, DataIntegrityError> {
    let value = property(feature, field).ok_or_else(|| DataIntegrityError::MissingProperty {
        layer,
        feature: position,
        field: field.to_string(),
    })?;

    as_text(value)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| DataIntegrityError::InvalidProperty {
            layer,
            feature: position,
            field: field.to_string(),
            value: value.to_string(),
        })
}

fn segment_id(
    feature: &Feature,
    position: usize,
    field: &str,
) -> Result<SegmentId, DataIntegrityError> {
    let text = required_text(feature, "line", position, field)?;

    text.parse::<SegmentId>()
        .map_err(|_| DataIntegrityError::InvalidProperty {
            layer: "line",
            feature: position,
            field: field.to_string(),
            value: text,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(json: &str) -> FeatureCollection {
        parse_collection(json, "test").unwrap()
    }

    const LINES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "ConductorT": "OH", "OBJECTID": 17 },
                "geometry": { "type": "LineString", "coordinates": [[0, 0], [3, 4]] }
            },
            {
                "type": "Feature",
                "properties": { "ConductorT": "UG", "OBJECTID": 18 },
                "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 0]] }
            },
            {
                "type": "Feature",
                "properties": { "ConductorT": "OH", "OBJECTID": "19" },
                "geometry": {
                    "type": "MultiLineString",
                    "coordinates": [[[10, 0], [20, 0]], [[30, 0], [30, 5]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "ConductorT": "OH", "OBJECTID": 20 },
                "geometry": null
            }
        ]
    }"#;

    #[test]
    fn overhead_lines_are_filtered_and_split() {
        let segments = parse_segments(collection(LINES), &InputFields::default()).unwrap();

        let ids: Vec<SegmentId> = segments.iter().map(|s| s.segment_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);

        let lengths: Vec<f64> = segments.iter().map(|s| s.length_ft).collect();
        assert!((lengths[0] - 5.0).abs() < 1e-12);
        assert!((lengths[1] - 10.0).abs() < 1e-12);
        assert!((lengths[2] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn empty_lines_are_kept_with_zero_length() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "ConductorT": "OH" },
                  "geometry": { "type": "LineString", "coordinates": [[0, 0], [10, 0]] } },
                { "type": "Feature", "properties": { "ConductorT": "OH" },
                  "geometry": { "type": "LineString", "coordinates": [] } }
            ]
        }"#;

        let segments = parse_segments(collection(json), &InputFields::default()).unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].segment_id, 1);
        assert!(segments[1].geometry.0.is_empty());
        assert!(segments[1].length_ft.abs() < f64::EPSILON);
        assert!((segments[0].length_ft - 10.0).abs() < 1e-12);
    }

    #[test]
    fn lines_without_conductor_property_are_all_kept() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 0]] } },
                { "type": "Feature", "properties": null,
                  "geometry": { "type": "LineString", "coordinates": [[0, 1], [1, 1]] } }
            ]
        }"#;

        let segments = parse_segments(collection(json), &InputFields::default()).unwrap();
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn explicit_segment_ids_are_read() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "ConductorT": "OH", "OBJECTID": 17 },
                  "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 0]] } },
                { "type": "Feature", "properties": { "ConductorT": "OH", "OBJECTID": "42" },
                  "geometry": { "type": "LineString", "coordinates": [[0, 1], [1, 1]] } }
            ]
        }"#;
        let fields = InputFields {
            segment_id_field: Some("OBJECTID".to_string()),
            ..InputFields::default()
        };

        let segments = parse_segments(collection(json), &fields).unwrap();
        let ids: Vec<SegmentId> = segments.iter().map(|s| s.segment_id).collect();
        assert_eq!(ids, vec![17, 42]);
    }

    #[test]
    fn malformed_segment_id_is_an_error() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "OBJECTID": "abc" },
                  "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 0]] } }
            ]
        }"#;
        let fields = InputFields {
            segment_id_field: Some("OBJECTID".to_string()),
            ..InputFields::default()
        };

        let err = parse_segments(collection(json), &fields).unwrap_err();
        assert!(matches!(
            err,
            LoadError::DataIntegrity(DataIntegrityError::InvalidProperty { feature: 0, .. })
        ));
    }

    #[test]
    fn facilities_parse_type_and_name() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature",
                  "properties": { "facility_type": "fire_station", "facility_name": "Station 2" },
                  "geometry": { "type": "Point", "coordinates": [100, 200] } },
                { "type": "Feature",
                  "properties": { "facility_type": "hospital" },
                  "geometry": { "type": "Point", "coordinates": [300, 400] } }
            ]
        }"#;

        let facilities = parse_facilities(collection(json), &InputFields::default()).unwrap();
        assert_eq!(facilities.len(), 2);
        assert_eq!(facilities[0].facility_type, FacilityType::FireStation);
        assert_eq!(facilities[0].name.as_deref(), Some("Station 2"));
        assert_eq!(facilities[1].facility_type, FacilityType::Hospital);
        assert_eq!(facilities[1].name, None);
        assert!((facilities[1].location.x() - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_facility_type_is_an_error() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "facility_type": "school" },
                  "geometry": { "type": "Point", "coordinates": [0, 0] } }
            ]
        }"#;

        let err = parse_facilities(collection(json), &InputFields::default()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::DataIntegrity(DataIntegrityError::InvalidProperty { ref value, .. })
                if value == "school"
        ));
    }

    #[test]
    fn neighborhood_without_label_is_an_error() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "S_HOOD": "Fremont" },
                  "geometry": { "type": "Polygon",
                                "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]] } }
            ]
        }"#;

        let err = parse_neighborhoods(collection(json), &InputFields::default()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::DataIntegrity(DataIntegrityError::MissingProperty { .. })
        ));

        let fields = InputFields {
            neighborhood_field: "S_HOOD".to_string(),
            ..InputFields::default()
        };
        let neighborhoods = parse_neighborhoods(collection(json), &fields).unwrap();
        assert_eq!(neighborhoods[0].neighborhood, "Fremont");
    }

    #[test]
    fn canopy_keeps_polygons_only() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": null,
                  "geometry": { "type": "Polygon",
                                "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]] } },
                { "type": "Feature", "properties": null,
                  "geometry": { "type": "Point", "coordinates": [0, 0] } },
                { "type": "Feature", "properties": null,
                  "geometry": { "type": "MultiPolygon",
                                "coordinates": [[[[5, 5], [6, 5], [6, 6], [5, 5]]]] } }
            ]
        }"#;

        let canopy = parse_canopy(collection(json));
        assert_eq!(canopy.len(), 2);
    }

    #[test]
    fn non_collection_is_rejected() {
        let err = parse_collection(r#"{ "type": "Point", "coordinates": [0, 0] }"#, "pt")
            .unwrap_err();
        assert!(matches!(err, LoadError::NotFeatureCollection { .. }));
    }
}
