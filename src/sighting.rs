// src/sighting.rs
//! # Sighting
//! The single entity of the service plus the expiry policy that decides
//! whether a sighting is still shown on the map.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SightingError};

/// Default expiry window: one hour without a "still here" refresh.
pub const DEFAULT_EXPIRY_SECS: u64 = 3600;

/// Longest accepted expiry window (30 days).
pub const MAX_EXPIRY_SECS: u64 = 30 * 24 * 3600;

const MAX_IMAGE_URL_LEN: usize = 2048;

/// Closed set of species tags accepted by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Animal {
    Deer,
    Coyote,
    Bobcat,
    MountainLion,
    WildTurkey,
    Raccoon,
    Skunk,
    Fox,
    Opossum,
    Rabbit,
    Owl,
    Snake,
}

impl Animal {
    pub const ALL: [Animal; 12] = [
        Animal::Deer,
        Animal::Coyote,
        Animal::Bobcat,
        Animal::MountainLion,
        Animal::WildTurkey,
        Animal::Raccoon,
        Animal::Skunk,
        Animal::Fox,
        Animal::Opossum,
        Animal::Rabbit,
        Animal::Owl,
        Animal::Snake,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Animal::Deer => "deer",
            Animal::Coyote => "coyote",
            Animal::Bobcat => "bobcat",
            Animal::MountainLion => "mountain_lion",
            Animal::WildTurkey => "wild_turkey",
            Animal::Raccoon => "raccoon",
            Animal::Skunk => "skunk",
            Animal::Fox => "fox",
            Animal::Opossum => "opossum",
            Animal::Rabbit => "rabbit",
            Animal::Owl => "owl",
            Animal::Snake => "snake",
        }
    }
}

impl fmt::Display for Animal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Animal {
    type Err = SightingError;

    /// Case-insensitive; `-` and spaces are read as `_` ("Mountain Lion").
    fn from_str(s: &str) -> Result<Self> {
        let norm = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Animal::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == norm)
            .ok_or_else(|| SightingError::validation(format!("unknown animal '{}'", s.trim())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    /// Builds a location, rejecting non-finite or out-of-range coordinates.
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(SightingError::validation(format!(
                "latitude {lat} outside [-90, 90]"
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(SightingError::validation(format!(
                "longitude {lng} outside [-180, 180]"
            )));
        }
        Ok(Self { lat, lng })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sighting {
    pub id: Uuid,
    pub animal: Animal,
    #[serde(default)]
    pub is_baby: bool,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Sighting {
    /// Fresh record with `created_at == last_active_at == now`.
    pub fn from_new(new: NewSighting, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            animal: new.animal,
            is_baby: new.is_baby,
            location: new.location,
            image_url: new.image_url,
            created_at: now,
            last_active_at: now,
        }
    }
}

/// Raw, unvalidated creation fields as they arrive from a form or JSON body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SightingDraft {
    pub animal: String,
    pub is_baby: bool,
    pub lat: f64,
    pub lng: f64,
    pub image_url: Option<String>,
}

impl SightingDraft {
    pub fn new(animal: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            animal: animal.into(),
            lat,
            lng,
            ..Self::default()
        }
    }

    pub fn baby(mut self, is_baby: bool) -> Self {
        self.is_baby = is_baby;
        self
    }

    pub fn image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn validate(self) -> Result<NewSighting> {
        NewSighting::parse(&self.animal, self.is_baby, self.lat, self.lng, self.image_url)
    }
}

/// Validated creation input.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSighting {
    pub animal: Animal,
    pub is_baby: bool,
    pub location: Location,
    pub image_url: Option<String>,
}

impl NewSighting {
    pub fn parse(
        animal: &str,
        is_baby: bool,
        lat: f64,
        lng: f64,
        image_url: Option<String>,
    ) -> Result<Self> {
        let animal = animal.parse::<Animal>()?;
        let location = Location::new(lat, lng)?;
        let image_url = match image_url.map(|u| u.trim().to_string()) {
            None => None,
            Some(u) if u.is_empty() => None,
            Some(u) => Some(validate_image_url(u)?),
        };
        Ok(Self {
            animal,
            is_baby,
            location,
            image_url,
        })
    }
}

fn validate_image_url(url: String) -> Result<String> {
    if url.len() > MAX_IMAGE_URL_LEN {
        return Err(SightingError::validation("imageUrl is too long"));
    }
    let lower = url.to_ascii_lowercase();
    if !(lower.starts_with("https://") || lower.starts_with("http://")) {
        return Err(SightingError::validation("imageUrl must be an http(s) URL"));
    }
    Ok(url)
}

/// Fixed-window activity rule: active iff `now - last_active_at < window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    window: Duration,
}

impl ExpiryPolicy {
    /// Windows outside `1s..=MAX_EXPIRY_SECS` are clamped into range.
    pub fn new(window: Duration) -> Self {
        let max = Duration::seconds(MAX_EXPIRY_SECS as i64);
        Self {
            window: window.clamp(Duration::seconds(1), max),
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        let secs = i64::try_from(secs.min(MAX_EXPIRY_SECS)).unwrap_or(i64::MAX);
        let window = Duration::try_seconds(secs).unwrap_or(Duration::MAX);
        Self::new(window)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Anything with `last_active_at <= cutoff` is expired.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }

    pub fn is_active(&self, sighting: &Sighting, now: DateTime<Utc>) -> bool {
        now - sighting.last_active_at < self.window
    }

    pub fn expires_at(&self, sighting: &Sighting) -> DateTime<Utc> {
        sighting.last_active_at + self.window
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::from_secs(DEFAULT_EXPIRY_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn animal_parsing_is_lenient_on_case_and_separators() {
        assert_eq!("Deer".parse::<Animal>().unwrap(), Animal::Deer);
        assert_eq!(" mountain-lion ".parse::<Animal>().unwrap(), Animal::MountainLion);
        assert_eq!("Wild Turkey".parse::<Animal>().unwrap(), Animal::WildTurkey);
        assert!(matches!(
            "unicorn".parse::<Animal>(),
            Err(SightingError::Validation(_))
        ));
        assert!("".parse::<Animal>().is_err());
    }

    #[test]
    fn animal_serializes_as_snake_case_tag() {
        let json = serde_json::to_string(&Animal::MountainLion).unwrap();
        assert_eq!(json, "\"mountain_lion\"");
        for a in Animal::ALL {
            assert_eq!(a.as_str().parse::<Animal>().unwrap(), a);
        }
    }

    #[test]
    fn coordinate_bounds_are_inclusive() {
        assert!(Location::new(90.0, 180.0).is_ok());
        assert!(Location::new(-90.0, -180.0).is_ok());
        assert!(Location::new(90.0001, 0.0).is_err());
        assert!(Location::new(0.0, -180.5).is_err());
        assert!(Location::new(f64::NAN, 0.0).is_err());
        assert!(Location::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn image_url_must_be_http() {
        let ok = NewSighting::parse("fox", false, 1.0, 1.0, Some("https://img.example/a.jpg".into()));
        assert!(ok.is_ok());
        let blank = NewSighting::parse("fox", false, 1.0, 1.0, Some("   ".into())).unwrap();
        assert_eq!(blank.image_url, None);
        let bad = NewSighting::parse("fox", false, 1.0, 1.0, Some("ftp://x".into()));
        assert!(matches!(bad, Err(SightingError::Validation(_))));
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let policy = ExpiryPolicy::from_secs(3600);
        let t0 = Utc::now();
        let new = NewSighting::parse("deer", false, 36.99, -122.05, None).unwrap();
        let s = Sighting::from_new(new, t0);
        assert_eq!(s.created_at, s.last_active_at);
        assert!(policy.is_active(&s, t0 + Duration::seconds(3599)));
        assert!(!policy.is_active(&s, t0 + Duration::seconds(3600)));
        assert_eq!(policy.expires_at(&s), t0 + Duration::hours(1));
    }

    #[test]
    fn oversized_window_is_clamped_not_inverted() {
        let max = Duration::seconds(MAX_EXPIRY_SECS as i64);
        assert_eq!(ExpiryPolicy::from_secs(u64::MAX).window(), max);
        assert_eq!(ExpiryPolicy::from_secs(10_000_000_000_000_000).window(), max);
        assert_eq!(ExpiryPolicy::new(Duration::seconds(-1)).window(), Duration::seconds(1));

        let policy = ExpiryPolicy::from_secs(u64::MAX);
        let t0 = Utc::now();
        let s = Sighting::from_new(NewSighting::parse("deer", false, 1.0, 1.0, None).unwrap(), t0);
        assert!(policy.is_active(&s, t0));
        assert!(policy.cutoff(t0) < t0);
    }

    #[test]
    fn stored_document_uses_camel_case() {
        let new = NewSighting::parse("owl", true, 10.0, 20.0, None).unwrap();
        let s = Sighting::from_new(new, Utc::now());
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["isBaby"], true);
        assert!(v.get("createdAt").is_some());
        assert!(v.get("lastActiveAt").is_some());
        assert!(v.get("imageUrl").is_none());
        let back: Sighting = serde_json::from_value(v).unwrap();
        assert_eq!(back, s);
    }
}
