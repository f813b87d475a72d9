// src/lib.rs

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub mod calculator;
pub mod config;
pub mod flying;
pub mod interpretation;
pub mod lunar;
pub mod oracle;
pub mod patterns;
pub mod prompt;
pub mod solar_time;

pub use calculator::{ChartOptions, ZiweiCalculator};
pub use flying::{find_stars_location, flying_stars, flying_stars_for, FlyingStars, FlyingTarget};
pub use interpretation::{
    palace_interpretations, KnowledgeBase, PalaceInterpretations, PalaceQuery, StarInterpretation,
};
pub use lunar::{LunarCalendar, LunarDate, TableCalendar};
pub use oracle::{Astrolabe, AstrolabeOracle, OracleError, OracleRequest, SnapshotOracle};
pub use patterns::{detect_patterns, PalaceContext, Pattern};
pub use prompt::{analysis_prompt, surrounding_palaces, SurroundingPalaces};
pub use solar_time::{time_slot_from, true_solar_time};

/// Number of palaces on every chart, natal or yearly.
pub const PALACE_COUNT: usize = 12;

/// Substituted for star names the oracle left out.
pub const UNKNOWN_STAR: &str = "未知";

/// Substituted for palace names the oracle left out.
pub const UNKNOWN_PALACE: &str = "未知宫";

// ---------------------------
// ## Enumerations
// ---------------------------

macro_rules! label_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn from_label(label: &str) -> Option<Self> {
                match label {
                    $($label => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn from_char(c: char) -> Option<Self> {
                let mut buf = [0u8; 4];
                Self::from_label(c.encode_utf8(&mut buf))
            }

            pub fn index(self) -> usize {
                self as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }
    };
}

label_enum! {
    /// The ten heavenly stems.
    Stem {
        Jia => "甲",
        Yi => "乙",
        Bing => "丙",
        Ding => "丁",
        Wu => "戊",
        Ji => "己",
        Geng => "庚",
        Xin => "辛",
        Ren => "壬",
        Gui => "癸",
    }
}

label_enum! {
    /// The twelve earthly branches, in calendar order starting at 子.
    Branch {
        Zi => "子",
        Chou => "丑",
        Yin => "寅",
        Mao => "卯",
        Chen => "辰",
        Si => "巳",
        Wu => "午",
        Wei => "未",
        Shen => "申",
        You => "酉",
        Xu => "戌",
        Hai => "亥",
    }
}

label_enum! {
    /// The four transformations, in table order: wealth, power, fame, trouble.
    Mutagen {
        Lu => "禄",
        Quan => "权",
        Ke => "科",
        Ji => "忌",
    }
}

label_enum! {
    Brightness {
        Miao => "庙",
        Wang => "旺",
        De => "得",
        Li => "利",
        Ping => "平",
        Bu => "不",
        Xian => "陷",
    }
}

label_enum! {
    /// Five-element class of a chart. The numeric suffix is the bureau number.
    FiveElementsClass {
        Water2 => "水二局",
        Wood3 => "木三局",
        Metal4 => "金四局",
        Earth5 => "土五局",
        Fire6 => "火六局",
    }
}

impl Stem {
    /// Stem of a sexagenary year, e.g. 1984 → 甲.
    pub fn of_year(year: i32) -> Stem {
        Stem::ALL[(year - 4).rem_euclid(10) as usize]
    }
}

impl Branch {
    pub fn of_year(year: i32) -> Branch {
        Branch::ALL[(year - 4).rem_euclid(12) as usize]
    }
}

impl Mutagen {
    /// Knowledge-base palace key for transformation judgments, e.g. `化禄`.
    pub fn palace_key(self) -> String {
        format!("化{}", self.label())
    }
}

impl FiveElementsClass {
    pub fn number(self) -> u8 {
        self as u8 + 2
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Label the astrology oracle expects.
    pub fn oracle_label(self) -> &'static str {
        match self {
            Gender::Male => "男",
            Gender::Female => "女",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

impl FromStr for Gender {
    type Err = ZiweiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "male" | "m" | "男" => Ok(Gender::Male),
            "female" | "f" | "女" => Ok(Gender::Female),
            other => Err(ZiweiError::InvalidInput(format!("unknown gender `{}`", other))),
        }
    }
}

const TIME_SLOT_NAMES: [&str; 13] = [
    "早子时", "丑时", "寅时", "卯时", "辰时", "巳时", "午时", "未时", "申时", "酉时", "戌时", "亥时",
    "晚子时",
];

/// One of the thirteen traditional time slots. Slots 0 and 12 are the two
/// halves of the 子 double-hour.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TimeSlot(u8);

impl TimeSlot {
    pub const EARLY_ZI: TimeSlot = TimeSlot(0);
    pub const LATE_ZI: TimeSlot = TimeSlot(12);

    pub fn new(index: u8) -> Result<Self> {
        if index <= 12 {
            Ok(TimeSlot(index))
        } else {
            Err(ZiweiError::InvalidTimeSlot(index))
        }
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn branch(self) -> Branch {
        Branch::ALL[self.0 as usize % 12]
    }

    pub fn name(self) -> &'static str {
        TIME_SLOT_NAMES[self.0 as usize]
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

// ---------------------------
// ## Chart Structures
// ---------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Star {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutagen: Option<Mutagen>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<Brightness>,
}

impl Star {
    pub fn new(name: impl Into<String>) -> Self {
        Star {
            name: name.into(),
            mutagen: None,
            brightness: None,
        }
    }

    pub fn with_mutagen(mut self, mutagen: Mutagen) -> Self {
        self.mutagen = Some(mutagen);
        self
    }

    pub fn with_brightness(mut self, brightness: Brightness) -> Self {
        self.brightness = Some(brightness);
        self
    }
}

/// One of the twelve life domains of a chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Palace {
    pub palace_name: String,
    pub stem: Stem,
    pub branch: Branch,
    pub stem_branch: String,
    pub major_stars: Vec<Star>,
    pub minor_stars: Vec<Star>,
    pub misc_stars: Vec<Star>,
    /// Mutagens carried by the major stars.
    pub transformations: Vec<Mutagen>,
    pub is_yearly: bool,
}

impl Palace {
    /// Major, minor and misc stars in that order.
    pub fn stars(&self) -> impl Iterator<Item = &Star> {
        self.major_stars
            .iter()
            .chain(self.minor_stars.iter())
            .chain(self.misc_stars.iter())
    }

    pub fn has_star(&self, name: &str) -> bool {
        self.stars().any(|s| s.name == name)
    }

    /// A palace without major stars (空宫).
    pub fn is_empty(&self) -> bool {
        self.major_stars.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZiweiChart {
    pub five_elements: FiveElementsClass,
    pub life_owner: String,
    pub body_owner: String,
    /// Natal palaces in oracle index order.
    pub palaces: Vec<Palace>,
    /// Flow-year palaces, same positions as `palaces`.
    pub yearly: Vec<Palace>,
    pub solar_date: String,
    pub time_slot: TimeSlot,
    pub gender: Gender,
    pub lunar_date: LunarDate,
    pub flow_year: i32,
}

impl ZiweiChart {
    pub fn palace_index(&self, palace_name: &str) -> Option<usize> {
        self.palaces.iter().position(|p| p.palace_name == palace_name)
    }

    pub fn life_palace(&self) -> Option<&Palace> {
        self.palaces.iter().find(|p| p.palace_name == "命宫")
    }
}

// ---------------------------
// ## Birth Input
// ---------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub longitude: f64,
}

/// Longitudes of major cities, used when only a birthplace is known.
pub const CITIES: &[(&str, f64)] = &[
    ("北京", 116.40),
    ("上海", 121.47),
    ("天津", 117.20),
    ("重庆", 106.55),
    ("香港", 114.17),
    ("澳门", 113.54),
    ("石家庄", 114.48),
    ("太原", 112.53),
    ("呼和浩特", 111.65),
    ("沈阳", 123.38),
    ("大连", 121.61),
    ("长春", 125.35),
    ("哈尔滨", 126.63),
    ("南京", 118.78),
    ("苏州", 120.62),
    ("杭州", 120.19),
    ("宁波", 121.56),
    ("合肥", 117.27),
    ("福州", 119.30),
    ("厦门", 118.10),
    ("南昌", 115.89),
    ("济南", 117.00),
    ("青岛", 120.33),
    ("郑州", 113.65),
    ("武汉", 114.31),
    ("长沙", 113.00),
    ("广州", 113.26),
    ("深圳", 114.05),
    ("南宁", 108.33),
    ("海口", 110.35),
    ("成都", 104.06),
    ("贵阳", 106.71),
    ("昆明", 102.71),
    ("拉萨", 91.11),
    ("西安", 108.95),
    ("兰州", 103.73),
    ("西宁", 101.74),
    ("银川", 106.27),
    ("乌鲁木齐", 87.68),
    ("台北", 121.50),
];

impl Location {
    pub fn new(longitude: f64) -> Self {
        Location { longitude }
    }

    pub fn city(name: &str) -> Option<Self> {
        CITIES
            .iter()
            .find(|(city, _)| *city == name)
            .map(|&(_, longitude)| Location { longitude })
    }

    /// The 120°E meridian civil time is kept on.
    pub fn standard() -> Self { Location { longitude: solar_time::STANDARD_MERIDIAN } }
    pub fn beijing() -> Self { Location { longitude: 116.40 } }
    pub fn shanghai() -> Self { Location { longitude: 121.47 } }
    pub fn chengdu() -> Self { Location { longitude: 104.06 } }
    pub fn urumqi() -> Self { Location { longitude: 87.68 } }
}

impl Default for Location {
    fn default() -> Self {
        Location::standard()
    }
}

/// Civil birth time on the standard meridian clock, plus where it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct BirthInfo {
    pub date_time: NaiveDateTime,
    pub location: Location,
    pub gender: Gender,
}

// ---------------------------
// ## Error Handling
// ---------------------------

/// Broad failure categories, for callers that map errors to statuses.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    CalendarConversionFailed,
    OracleFailed,
    InvalidAstrolabe,
    YearlyDataMissing,
    YearlyDataIncomplete,
    ExtractionFailed,
}

#[derive(Debug, thiserror::Error)]
pub enum ZiweiError {
    #[error("Invalid date format. Expected YYYY-MM-DD, got `{0}`")]
    InvalidDateFormat(String),
    #[error("Invalid time index {0}. Expected 0-12")]
    InvalidTimeSlot(u8),
    #[error("Invalid longitude {0}. Must be between -180 and 180")]
    InvalidLongitude(f64),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Failed to convert {date} to a lunar date: {reason}")]
    LunarConversionFailed { date: String, reason: String },
    #[error("astrology oracle failed: {0}")]
    Oracle(#[from] OracleError),
    #[error("invalid astrolabe: {0}")]
    InvalidAstrolabe(String),
    #[error("流年数据缺失")]
    YearlyDataMissing,
    #[error("流年{field}数据不完整 (expected {expected}, received {received})")]
    YearlyDataIncomplete {
        field: &'static str,
        expected: usize,
        received: usize,
    },
    #[error("failed to extract yearly palaces: {source}")]
    ExtractionFailed {
        #[source]
        source: Box<ZiweiError>,
    },
}

impl ZiweiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ZiweiError::InvalidDateFormat(_)
            | ZiweiError::InvalidTimeSlot(_)
            | ZiweiError::InvalidLongitude(_)
            | ZiweiError::InvalidInput(_) => ErrorKind::InvalidInput,
            ZiweiError::LunarConversionFailed { .. } => ErrorKind::CalendarConversionFailed,
            ZiweiError::Oracle(_) => ErrorKind::OracleFailed,
            ZiweiError::InvalidAstrolabe(_) => ErrorKind::InvalidAstrolabe,
            ZiweiError::YearlyDataMissing => ErrorKind::YearlyDataMissing,
            ZiweiError::YearlyDataIncomplete { .. } => ErrorKind::YearlyDataIncomplete,
            ZiweiError::ExtractionFailed { .. } => ErrorKind::ExtractionFailed,
        }
    }
}

pub type Result<T> = std::result::Result<T, ZiweiError>;
