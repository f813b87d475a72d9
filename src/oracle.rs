//! Boundary to the external astrolabe library.
//!
//! The library hands back loosely-typed objects, so every raw field here is an
//! `Option`. The chart builder decides which absences become sentinels and
//! which become errors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::*;

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("snapshot was recorded for {recorded}, not {requested}")]
    SnapshotMismatch { recorded: String, requested: String },
    #[error("oracle rejected date `{0}`")]
    InvalidDate(String),
    #[error("failed to read astrolabe snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse astrolabe snapshot: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

// ---------------------------
// ## Raw Oracle Output
// ---------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStar {
    pub name: Option<String>,
    pub mutagen: Option<String>,
    pub brightness: Option<String>,
}

impl RawStar {
    pub fn named(name: &str) -> Self {
        RawStar {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPalace {
    pub name: Option<String>,
    pub heavenly_stem: Option<String>,
    pub earthly_branch: Option<String>,
    pub major_stars: Option<Vec<RawStar>>,
    pub minor_stars: Option<Vec<RawStar>>,
    pub adjective_stars: Option<Vec<RawStar>>,
}

/// Per-palace decorative stars of a flow year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawYearlyDecStars {
    pub jiangqian12: Option<Vec<String>>,
    pub suiqian12: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawYearly {
    /// Star names receiving 禄, 权, 科, 忌, in that order.
    pub mutagen: Option<Vec<String>>,
    pub palace_names: Option<Vec<String>>,
    pub stars: Option<Vec<Vec<RawStar>>>,
    pub yearly_dec_star: Option<RawYearlyDecStars>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHoroscope {
    pub yearly: Option<RawYearly>,
}

// ---------------------------
// ## Oracle Traits
// ---------------------------

/// Arguments of a by-solar-date astrolabe request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OracleRequest<'a> {
    pub solar_date: &'a str,
    pub time_slot: TimeSlot,
    pub gender: Gender,
    pub fix_leap_month: bool,
    pub locale: &'a str,
}

/// A generated astrolabe, as exposed by the external library.
pub trait Astrolabe {
    fn five_elements_class(&self) -> Option<&str>;
    fn soul(&self) -> Option<&str>;
    fn body(&self) -> Option<&str>;
    /// Palace at oracle index `index` (0-11).
    fn palace(&self, index: usize) -> Option<RawPalace>;
    fn horoscope(&self, date: &str, time_slot: TimeSlot) -> std::result::Result<RawHoroscope, OracleError>;
}

pub trait AstrolabeOracle {
    type Astrolabe: Astrolabe;

    fn by_solar(&self, request: &OracleRequest<'_>) -> std::result::Result<Self::Astrolabe, OracleError>;
}

// ---------------------------
// ## Snapshot Oracle
// ---------------------------

/// An astrolabe exported from the external library as JSON, together with
/// the birth input it was generated for and flow-year horoscopes by year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstrolabeSnapshot {
    pub solar_date: String,
    pub time_index: u8,
    /// 男 or 女.
    pub gender: String,
    pub five_elements_class: Option<String>,
    pub soul: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub palaces: Vec<RawPalace>,
    #[serde(default)]
    pub horoscopes: BTreeMap<i32, RawHoroscope>,
}

impl Astrolabe for AstrolabeSnapshot {
    fn five_elements_class(&self) -> Option<&str> {
        self.five_elements_class.as_deref()
    }

    fn soul(&self) -> Option<&str> {
        self.soul.as_deref()
    }

    fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    fn palace(&self, index: usize) -> Option<RawPalace> {
        self.palaces.get(index).cloned()
    }

    fn horoscope(&self, date: &str, _time_slot: TimeSlot) -> std::result::Result<RawHoroscope, OracleError> {
        let (year, _, _) =
            split_date(date).ok_or_else(|| OracleError::InvalidDate(date.to_string()))?;
        // A year that was never exported has no flow-year section.
        Ok(self.horoscopes.get(&year).cloned().unwrap_or_default())
    }
}

/// Serves a single recorded astrolabe.
#[derive(Debug, Clone)]
pub struct SnapshotOracle {
    snapshot: AstrolabeSnapshot,
}

impl SnapshotOracle {
    pub fn new(snapshot: AstrolabeSnapshot) -> Self {
        SnapshotOracle { snapshot }
    }

    pub fn from_json_str(json: &str) -> std::result::Result<Self, OracleError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn from_path(path: impl AsRef<Path>) -> std::result::Result<Self, OracleError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn snapshot(&self) -> &AstrolabeSnapshot {
        &self.snapshot
    }
}

impl AstrolabeOracle for SnapshotOracle {
    type Astrolabe = AstrolabeSnapshot;

    fn by_solar(&self, request: &OracleRequest<'_>) -> std::result::Result<AstrolabeSnapshot, OracleError> {
        let recorded = &self.snapshot;
        let matches = split_date(&recorded.solar_date).is_some()
            && split_date(&recorded.solar_date) == split_date(request.solar_date)
            && recorded.time_index == request.time_slot.index()
            && recorded.gender == request.gender.oracle_label();

        if !matches {
            return Err(OracleError::SnapshotMismatch {
                recorded: format!(
                    "{} slot {} {}",
                    recorded.solar_date, recorded.time_index, recorded.gender
                ),
                requested: format!(
                    "{} slot {} {}",
                    request.solar_date,
                    request.time_slot.index(),
                    request.gender.oracle_label()
                ),
            });
        }
        Ok(recorded.clone())
    }
}

fn split_date(date: &str) -> Option<(i32, u32, u32)> {
    let mut parts = date.split('-');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((year, month, day))
}
