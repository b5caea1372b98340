//! GeoJSON points and spherical distance lookups.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use tourbook_core::{DomainError, DomainResult, TourId};

use crate::Tour;

const EARTH_RADIUS_KM: f64 = 6378.1;
const EARTH_RADIUS_MI: f64 = 3963.2;
const METERS_TO_KM: f64 = 0.001;
const METERS_TO_MI: f64 = 0.000_621_371;

/// GeoJSON point, `coordinates` as `[lng, lat]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type", default = "point_kind")]
    pub kind: String,
    pub coordinates: [f64; 2],
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
}

fn point_kind() -> String {
    "Point".to_string()
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            kind: point_kind(),
            coordinates: [lng, lat],
            address: None,
            description: None,
            day: None,
        }
    }

    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.kind != "Point" {
            return Err(DomainError::validation("Location type must be Point"));
        }
        check_lat_lng(self.lat(), self.lng())
    }

    /// Central angle to `other` in radians (haversine).
    fn angle_to(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat().to_radians(), other.lat().to_radians());
        let d_lat = lat2 - lat1;
        let d_lng = (other.lng() - self.lng()).to_radians();
        let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * h.sqrt().min(1.0).asin()
    }
}

fn check_lat_lng(lat: f64, lng: f64) -> DomainResult<()> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(DomainError::validation(
            "Latitude must be between -90 and 90, longitude between -180 and 180",
        ));
    }
    Ok(())
}

/// Parse `"lat,lng"`.
pub fn parse_latlng(raw: &str) -> DomainResult<GeoPoint> {
    let invalid = || DomainError::validation(format!("Invalid latlng: {raw}. Use the format lat,lng."));
    let (lat, lng) = raw.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
    check_lat_lng(lat, lng)?;
    Ok(GeoPoint::new(lat, lng))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DistanceUnit {
    #[default]
    Km,
    Mi,
}

impl DistanceUnit {
    fn earth_radius(self) -> f64 {
        match self {
            DistanceUnit::Km => EARTH_RADIUS_KM,
            DistanceUnit::Mi => EARTH_RADIUS_MI,
        }
    }

    fn meters_multiplier(self) -> f64 {
        match self {
            DistanceUnit::Km => METERS_TO_KM,
            DistanceUnit::Mi => METERS_TO_MI,
        }
    }
}

impl FromStr for DistanceUnit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "km" => Ok(DistanceUnit::Km),
            "mi" => Ok(DistanceUnit::Mi),
            other => Err(DomainError::validation(format!("Invalid unit: {other}. Use km or mi."))),
        }
    }
}

/// Tours whose start location lies within `distance` of `center`.
pub fn tours_within<'a>(
    tours: &'a [Tour],
    center: &GeoPoint,
    distance: f64,
    unit: DistanceUnit,
) -> DomainResult<Vec<&'a Tour>> {
    if !distance.is_finite() || distance <= 0.0 {
        return Err(DomainError::validation("Distance must be a positive number"));
    }
    let radius = distance / unit.earth_radius();
    Ok(tours
        .iter()
        .filter(|t| {
            t.start_location
                .as_ref()
                .is_some_and(|start| center.angle_to(start) <= radius)
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TourDistance {
    pub id: TourId,
    pub name: String,
    pub distance: f64,
}

/// Distance from `center` to every located tour, nearest first.
pub fn distances(tours: &[Tour], center: &GeoPoint, unit: DistanceUnit) -> Vec<TourDistance> {
    let meters_per_radian = EARTH_RADIUS_KM * 1000.0;
    let mut out: Vec<TourDistance> = tours
        .iter()
        .filter_map(|t| {
            let start = t.start_location.as_ref()?;
            Some(TourDistance {
                id: t.id,
                name: t.name.clone(),
                distance: center.angle_to(start) * meters_per_radian * unit.meters_multiplier(),
            })
        })
        .collect();
    out.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tour::tests::tour;

    fn located(name: &str, lat: f64, lng: f64) -> Tour {
        let mut t = tour(name, 500.0);
        t.start_location = Some(GeoPoint::new(lat, lng));
        t
    }

    #[test]
    fn latlng_parses_in_lat_lng_order() {
        let p = parse_latlng("34.11, -118.11").unwrap();
        assert_eq!(p.lat(), 34.11);
        assert_eq!(p.lng(), -118.11);
        assert_eq!(p.coordinates, [-118.11, 34.11]);
    }

    #[test]
    fn out_of_range_latlng_is_rejected() {
        assert!(parse_latlng("91,0").is_err());
        assert!(parse_latlng("0,181").is_err());
        assert!(parse_latlng("abc").is_err());
    }

    #[test]
    fn within_radius_filters_by_great_circle() {
        // Los Angeles and San Diego are ~180 km apart; Miami is far away.
        let tours = vec![
            located("The Sea Explorer", 32.7157, -117.1611),
            located("The Sports Lover", 25.7617, -80.1918),
        ];
        let la = GeoPoint::new(34.0522, -118.2437);
        let near = tours_within(&tours, &la, 250.0, DistanceUnit::Km).unwrap();
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].name, "The Sea Explorer");

        let none = tours_within(&tours, &la, 50.0, DistanceUnit::Mi).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn non_positive_distance_is_rejected() {
        let la = GeoPoint::new(34.0, -118.0);
        assert!(tours_within(&[], &la, 0.0, DistanceUnit::Km).is_err());
    }

    #[test]
    fn distances_are_sorted_and_unit_scaled() {
        let tours = vec![
            located("The Sports Lover", 25.7617, -80.1918),
            located("The Sea Explorer", 32.7157, -117.1611),
        ];
        let la = GeoPoint::new(34.0522, -118.2437);
        let km = distances(&tours, &la, DistanceUnit::Km);
        assert_eq!(km[0].name, "The Sea Explorer");
        assert!(km[0].distance > 150.0 && km[0].distance < 200.0);

        let mi = distances(&tours, &la, DistanceUnit::Mi);
        let ratio = mi[0].distance / km[0].distance;
        assert!((ratio - 0.621_371).abs() < 1e-6);
    }

    #[test]
    fn unit_parsing_is_strict() {
        assert_eq!("mi".parse::<DistanceUnit>().unwrap(), DistanceUnit::Mi);
        assert!("furlong".parse::<DistanceUnit>().is_err());
    }
}
