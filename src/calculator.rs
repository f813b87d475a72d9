//! Chart construction.
//!
//! [`ZiweiCalculator`] validates the birth input, checks it against the lunar
//! calendar, asks the astrolabe oracle for a chart and normalises the raw
//! natal and flow-year palaces into a [`ZiweiChart`]. A chart is either built
//! completely or not at all.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::*;
use crate::config::ChartConfig;
use crate::oracle::{RawPalace, RawStar};

static SOLAR_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{1,2}-[0-9]{1,2}$").expect("solar date pattern compiles")
});

#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    pub fix_leap_month: bool,
    pub locale: String,
}

impl Default for ChartOptions {
    fn default() -> Self {
        ChartOptions {
            fix_leap_month: true,
            locale: "zh-CN".to_string(),
        }
    }
}

impl From<&ChartConfig> for ChartOptions {
    fn from(config: &ChartConfig) -> Self {
        ChartOptions {
            fix_leap_month: config.fix_leap_month,
            locale: config.locale.clone(),
        }
    }
}

pub struct ZiweiCalculator<O, C = TableCalendar> {
    oracle: O,
    calendar: C,
    options: ChartOptions,
}

impl<O: AstrolabeOracle> ZiweiCalculator<O, TableCalendar> {
    pub fn new(oracle: O) -> Self {
        Self::with_calendar(oracle, TableCalendar)
    }
}

impl<O: AstrolabeOracle, C: LunarCalendar> ZiweiCalculator<O, C> {
    pub fn with_calendar(oracle: O, calendar: C) -> Self {
        ZiweiCalculator {
            oracle,
            calendar,
            options: ChartOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ChartOptions) -> Self {
        self.options = options;
        self
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn chart_by_birth(&self, birth: &BirthInfo, flow_year: Option<i32>) -> Result<ZiweiChart> {
        self.chart_by_date(birth.date_time, birth.location.longitude, birth.gender, flow_year)
    }

    /// Builds a chart from a standard-clock birth time, correcting it to true
    /// solar time at `longitude` first.
    pub fn chart_by_date(
        &self,
        date_time: NaiveDateTime,
        longitude: f64,
        gender: Gender,
        flow_year: Option<i32>,
    ) -> Result<ZiweiChart> {
        let solar = true_solar_time(date_time, longitude)?;
        let solar_date = format!("{}-{:02}-{:02}", solar.year(), solar.month(), solar.day());
        let time_slot = time_slot_from(solar);
        debug!(%solar_date, slot = time_slot.index(), "derived chart input from true solar time");

        self.chart(&solar_date, time_slot.index(), gender, flow_year)
    }

    /// Builds a chart from a `YYYY-M-D` solar date and a time slot (0-12).
    /// The flow year defaults to the birth year.
    pub fn chart(
        &self,
        solar_date: &str,
        time_slot: u8,
        gender: Gender,
        flow_year: Option<i32>,
    ) -> Result<ZiweiChart> {
        let (year, month, day) = parse_solar_date(solar_date)?;
        let time_slot = TimeSlot::new(time_slot)?;
        let lunar_date = self.calendar.to_lunar(year, month, day)?;

        debug!(solar_date, slot = time_slot.index(), %gender, %lunar_date, "requesting astrolabe");
        let astrolabe = self.oracle.by_solar(&OracleRequest {
            solar_date,
            time_slot,
            gender,
            fix_leap_month: self.options.fix_leap_month,
            locale: &self.options.locale,
        })?;

        let five_elements = five_elements_of(&astrolabe)?;
        let life_owner = owner(astrolabe.soul(), "life");
        let body_owner = owner(astrolabe.body(), "body");
        let palaces = natal_palaces(&astrolabe)?;

        let flow_year = flow_year.unwrap_or(year);
        let flow_date = flow_date(flow_year, month, day);
        let yearly = yearly_palaces(&astrolabe, &flow_date, time_slot).map_err(|err| match err {
            err @ (ZiweiError::YearlyDataMissing | ZiweiError::YearlyDataIncomplete { .. }) => err,
            other => ZiweiError::ExtractionFailed {
                source: Box::new(other),
            },
        })?;

        Ok(ZiweiChart {
            five_elements,
            life_owner,
            body_owner,
            palaces,
            yearly,
            solar_date: solar_date.to_string(),
            time_slot,
            gender,
            lunar_date,
            flow_year,
        })
    }
}

/// Checks the `YYYY-M-D` shape and splits it. Calendar validity is left to
/// the lunar conversion.
pub fn parse_solar_date(solar_date: &str) -> Result<(i32, u32, u32)> {
    let invalid = || ZiweiError::InvalidDateFormat(solar_date.to_string());
    if !SOLAR_DATE.is_match(solar_date) {
        return Err(invalid());
    }

    let mut parts = solar_date.split('-').map(str::parse::<u32>);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(year)), Some(Ok(month)), Some(Ok(day))) => Ok((year as i32, month, day)),
        _ => Err(invalid()),
    }
}

// Feb 29 clamps to Feb 28 in common years.
fn flow_date(year: i32, month: u32, day: u32) -> String {
    let day = (1..=day)
        .rev()
        .find(|&d| NaiveDate::from_ymd_opt(year, month, d).is_some())
        .unwrap_or(day);
    format!("{}-{}-{}", year, month, day)
}

// ---------------------------
// ## Natal Extraction
// ---------------------------

fn five_elements_of<A: Astrolabe>(astrolabe: &A) -> Result<FiveElementsClass> {
    let label = astrolabe.five_elements_class();
    label
        .and_then(FiveElementsClass::from_label)
        .ok_or_else(|| ZiweiError::InvalidAstrolabe(format!("unknown five elements class {:?}", label)))
}

fn owner(name: Option<&str>, which: &str) -> String {
    match name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            warn!(which, "astrolabe has no {} owner star", which);
            UNKNOWN_STAR.to_string()
        }
    }
}

fn natal_palaces<A: Astrolabe>(astrolabe: &A) -> Result<Vec<Palace>> {
    let mut seen = [false; PALACE_COUNT];
    let mut palaces = Vec::with_capacity(PALACE_COUNT);

    for index in 0..PALACE_COUNT {
        let raw = raw_palace(astrolabe, index)?;
        let (stem, branch) = stem_and_branch(&raw, index)?;
        if std::mem::replace(&mut seen[branch.index()], true) {
            return Err(ZiweiError::InvalidAstrolabe(format!(
                "branch {} appears on more than one palace",
                branch
            )));
        }

        let name = raw
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ZiweiError::InvalidAstrolabe(format!("palace {} has no name", index)))?;

        palaces.push(palace(
            name,
            stem,
            branch,
            stars(raw.major_stars.as_deref()),
            stars(raw.minor_stars.as_deref()),
            stars(raw.adjective_stars.as_deref()),
            false,
        ));
    }
    Ok(palaces)
}

fn raw_palace<A: Astrolabe>(astrolabe: &A, index: usize) -> Result<RawPalace> {
    astrolabe
        .palace(index)
        .ok_or_else(|| ZiweiError::InvalidAstrolabe(format!("palace {} missing", index)))
}

fn stem_and_branch(raw: &RawPalace, index: usize) -> Result<(Stem, Branch)> {
    let stem = raw
        .heavenly_stem
        .as_deref()
        .and_then(Stem::from_label)
        .ok_or_else(|| {
            ZiweiError::InvalidAstrolabe(format!("palace {} has stem {:?}", index, raw.heavenly_stem))
        })?;
    let branch = raw
        .earthly_branch
        .as_deref()
        .and_then(Branch::from_label)
        .ok_or_else(|| {
            ZiweiError::InvalidAstrolabe(format!(
                "palace {} has branch {:?}",
                index, raw.earthly_branch
            ))
        })?;
    Ok((stem, branch))
}

fn palace(
    name: &str,
    stem: Stem,
    branch: Branch,
    major_stars: Vec<Star>,
    minor_stars: Vec<Star>,
    misc_stars: Vec<Star>,
    is_yearly: bool,
) -> Palace {
    let transformations = major_stars.iter().filter_map(|s| s.mutagen).collect();
    Palace {
        palace_name: name.to_string(),
        stem,
        branch,
        stem_branch: format!("{}{}", stem, branch),
        major_stars,
        minor_stars,
        misc_stars,
        transformations,
        is_yearly,
    }
}

fn stars(raw: Option<&[RawStar]>) -> Vec<Star> {
    raw.unwrap_or_default().iter().map(star).collect()
}

fn star(raw: &RawStar) -> Star {
    let name = match raw.name.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            warn!("astrolabe returned a star without a name");
            UNKNOWN_STAR.to_string()
        }
    };
    Star {
        name,
        mutagen: non_empty(raw.mutagen.as_deref()).and_then(Mutagen::from_label),
        brightness: non_empty(raw.brightness.as_deref()).and_then(Brightness::from_label),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

// ---------------------------
// ## Flow-Year Extraction
// ---------------------------

fn yearly_palaces<A: Astrolabe>(
    astrolabe: &A,
    flow_date: &str,
    time_slot: TimeSlot,
) -> Result<Vec<Palace>> {
    let horoscope = astrolabe.horoscope(flow_date, time_slot)?;
    let yearly = horoscope.yearly.ok_or(ZiweiError::YearlyDataMissing)?;

    let yearly_stars = exactly_twelve(yearly.stars.as_deref(), "星曜")?;
    let palace_names = exactly_twelve(yearly.palace_names.as_deref(), "宫位")?;

    let mutagen_stars = yearly.mutagen.as_deref().unwrap_or_default();
    if mutagen_stars.len() != Mutagen::ALL.len() {
        warn!(received = mutagen_stars.len(), "flow-year mutagen list is not four stars long");
    }

    let decorations = yearly.yearly_dec_star.unwrap_or_default();
    let jiangqian = decoration(decorations.jiangqian12.as_deref(), "jiangqian12");
    let suiqian = decoration(decorations.suiqian12.as_deref(), "suiqian12");

    // Only the flow year's own transformations annotate yearly stars.
    let transformed = |raw: &RawStar| {
        let mut star = star(raw);
        star.mutagen = mutagen_stars
            .iter()
            .position(|name| *name == star.name)
            .and_then(|i| Mutagen::ALL.get(i).copied());
        star
    };

    let mut palaces = Vec::with_capacity(PALACE_COUNT);
    for index in 0..PALACE_COUNT {
        let raw = raw_palace(astrolabe, index)?;
        let (stem, branch) = stem_and_branch(&raw, index)?;

        let major_stars = raw.major_stars.as_deref().unwrap_or_default().iter().map(&transformed).collect();
        let minor_stars = raw.minor_stars.as_deref().unwrap_or_default().iter().map(&transformed).collect();

        let mut misc_stars = stars(raw.adjective_stars.as_deref());
        misc_stars.extend(yearly_stars[index].iter().map(star));
        misc_stars.extend(jiangqian.map(|names| Star::new(names[index].as_str())));
        misc_stars.extend(suiqian.map(|names| Star::new(names[index].as_str())));

        let name = match palace_names[index].as_str() {
            "" => {
                warn!(index, "flow-year palace name is empty");
                UNKNOWN_PALACE
            }
            name => name,
        };

        palaces.push(palace(name, stem, branch, major_stars, minor_stars, misc_stars, true));
    }

    debug!(flow_date, "extracted flow-year palaces");
    Ok(palaces)
}

fn exactly_twelve<'a, T>(values: Option<&'a [T]>, field: &'static str) -> Result<&'a [T]> {
    match values {
        Some(values) if values.len() == PALACE_COUNT => Ok(values),
        other => Err(ZiweiError::YearlyDataIncomplete {
            field,
            expected: PALACE_COUNT,
            received: other.map_or(0, <[T]>::len),
        }),
    }
}

fn decoration<'a>(names: Option<&'a [String]>, field: &str) -> Option<&'a [String]> {
    match names {
        Some(names) if names.len() == PALACE_COUNT => Some(names),
        Some(names) => {
            warn!(field, received = names.len(), "ignoring decorative stars of unexpected length");
            None
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{RawHoroscope, RawYearly, RawYearlyDecStars};
    use crate::testing::{sample_chart, SAMPLE_ASTROLABE};
    use std::cell::RefCell;
    use std::rc::Rc;
    const STANDARD_NAMES: [&str; 12] = [
        "命宫", "兄弟", "夫妻", "子女", "财帛", "疾厄", "迁移", "交友", "官禄", "田宅", "福德", "父母",
    ];

    #[derive(Clone, Default)]
    struct Calls {
        requests: Rc<RefCell<Vec<(String, u8, Gender)>>>,
        horoscope_dates: Rc<RefCell<Vec<String>>>,
    }

    #[derive(Clone)]
    struct FixtureAstrolabe {
        five_elements: Option<String>,
        palaces: Vec<Option<RawPalace>>,
        // None makes the horoscope call itself fail
        horoscope: Option<RawHoroscope>,
        calls: Calls,
    }

    impl Astrolabe for FixtureAstrolabe {
        fn five_elements_class(&self) -> Option<&str> {
            self.five_elements.as_deref()
        }

        fn soul(&self) -> Option<&str> {
            Some("贪狼")
        }

        fn body(&self) -> Option<&str> {
            Some("文昌")
        }

        fn palace(&self, index: usize) -> Option<RawPalace> {
            self.palaces.get(index).cloned().flatten()
        }

        fn horoscope(&self, date: &str, _time_slot: TimeSlot) -> std::result::Result<RawHoroscope, OracleError> {
            self.calls.horoscope_dates.borrow_mut().push(date.to_string());
            self.horoscope
                .clone()
                .ok_or_else(|| OracleError::Other("horoscope engine crashed".into()))
        }
    }

    struct FixtureOracle {
        astrolabe: FixtureAstrolabe,
    }

    impl AstrolabeOracle for FixtureOracle {
        type Astrolabe = FixtureAstrolabe;

        fn by_solar(&self, request: &OracleRequest<'_>) -> std::result::Result<FixtureAstrolabe, OracleError> {
            self.astrolabe.calls.requests.borrow_mut().push((
                request.solar_date.to_string(),
                request.time_slot.index(),
                request.gender,
            ));
            Ok(self.astrolabe.clone())
        }
    }

    fn raw(name: &str, mutagen: &str, brightness: &str) -> RawStar {
        RawStar {
            name: Some(name.to_string()),
            mutagen: Some(mutagen.to_string()),
            brightness: Some(brightness.to_string()),
        }
    }

    fn fixture() -> FixtureAstrolabe {
        let palaces = (0..12)
            .map(|i| {
                Some(RawPalace {
                    name: Some(format!("OriginalPalace{}", i)),
                    heavenly_stem: Some("甲".into()),
                    earthly_branch: Some(Branch::ALL[(i + 2) % 12].label().into()),
                    major_stars: Some(vec![raw("紫微", "", "庙")]),
                    minor_stars: Some(vec![raw("天机", "", "平")]),
                    adjective_stars: Some(vec![]),
                })
            })
            .collect();

        let horoscope = RawHoroscope {
            yearly: Some(RawYearly {
                mutagen: Some(["紫微", "天机", "太阳", "武曲"].map(String::from).to_vec()),
                palace_names: Some(STANDARD_NAMES.map(String::from).to_vec()),
                stars: Some(vec![vec![RawStar::named("流年星1")]; 12]),
                yearly_dec_star: Some(RawYearlyDecStars {
                    jiangqian12: Some(vec!["将星".to_string(); 12]),
                    suiqian12: Some(vec!["岁建".to_string(); 12]),
                }),
            }),
        };

        FixtureAstrolabe {
            five_elements: Some("木三局".into()),
            palaces,
            horoscope: Some(horoscope),
            calls: Calls::default(),
        }
    }

    fn calculator(astrolabe: FixtureAstrolabe) -> ZiweiCalculator<FixtureOracle> {
        ZiweiCalculator::new(FixtureOracle { astrolabe })
    }

    fn yearly_mut(astrolabe: &mut FixtureAstrolabe) -> &mut RawYearly {
        astrolabe.horoscope.as_mut().unwrap().yearly.as_mut().unwrap()
    }

    #[test]
    fn test_sample_chart() {
        let chart = sample_chart();

        assert_eq!(chart.palaces.len(), 12);
        assert_eq!(chart.yearly.len(), 12);
        assert_eq!(chart.five_elements, FiveElementsClass::Metal4);
        assert_eq!(chart.life_owner, "文曲");
        assert_eq!(chart.body_owner, "天机");
        assert_eq!(chart.flow_year, 1990);
        assert_eq!(chart.lunar_date.to_string(), "己巳年腊月初五");

        let mut branches: Vec<Branch> = chart.palaces.iter().map(|p| p.branch).collect();
        branches.sort();
        assert_eq!(branches, Branch::ALL.to_vec());
        assert!(chart.palaces.iter().all(|p| !p.palace_name.is_empty()));
        assert!(chart.yearly.iter().all(|p| !p.palace_name.is_empty() && p.is_yearly));

        let life = chart.life_palace().unwrap();
        assert_eq!(life.stem_branch, "癸酉");
        assert_eq!(life.transformations, vec![Mutagen::Ke]);
        assert_eq!(chart.palace_index("命宫"), Some(7));
    }

    #[test]
    fn test_sample_yearly_overlay() {
        let calc = ZiweiCalculator::new(SnapshotOracle::from_json_str(SAMPLE_ASTROLABE).unwrap());
        let chart = calc.chart("1990-1-1", 4, Gender::Male, Some(1990)).unwrap();

        // 庚 year: 太阳禄 武曲权 太阴科 天同忌
        assert_eq!(chart.yearly[7].major_stars[0].mutagen, Some(Mutagen::Lu));
        assert_eq!(chart.yearly[6].major_stars[0].mutagen, Some(Mutagen::Quan));
        assert_eq!(chart.yearly[3].major_stars[0].mutagen, Some(Mutagen::Ke));
        assert_eq!(chart.yearly[5].major_stars[0].mutagen, Some(Mutagen::Ji));
        // natal 贪狼化权 does not carry into the flow year
        assert_eq!(chart.palaces[4].major_stars[0].mutagen, Some(Mutagen::Quan));
        assert_eq!(chart.yearly[4].major_stars[0].mutagen, None);

        assert_eq!(chart.yearly[4].palace_name, "命宫");
        assert_eq!(chart.yearly[4].branch, Branch::Wu);
        let misc: Vec<&str> = chart.yearly[4].misc_stars.iter().map(|s| s.name.as_str()).collect();
        assert!(misc.contains(&"天官"));
        assert!(misc.contains(&"将星"));
        assert!(misc.contains(&"岁建"));
    }

    #[test]
    fn test_unrecorded_flow_year_is_missing() {
        let calc = ZiweiCalculator::new(SnapshotOracle::from_json_str(SAMPLE_ASTROLABE).unwrap());
        let err = calc.chart("1990-01-01", 4, Gender::Male, Some(2025)).unwrap_err();
        assert!(matches!(err, ZiweiError::YearlyDataMissing));
    }

    #[test]
    fn test_fixture_yearly_extraction() {
        let chart = calculator(fixture()).chart("2024-01-01", 0, Gender::Male, Some(2024)).unwrap();

        assert_eq!(chart.yearly.len(), 12);
        assert_eq!(chart.yearly[0].palace_name, "命宫");
        assert_eq!(chart.yearly[0].major_stars[0].mutagen, Some(Mutagen::Lu));
        assert_eq!(chart.yearly[0].minor_stars[0].mutagen, Some(Mutagen::Quan));
        assert_eq!(chart.yearly[0].transformations, vec![Mutagen::Lu]);
        let misc: Vec<&str> = chart.yearly[0].misc_stars.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(misc, vec!["流年星1", "将星", "岁建"]);
        assert_eq!(chart.palaces[0].palace_name, "OriginalPalace0");
        assert!(chart.palaces[0].transformations.is_empty());
    }

    #[test]
    fn test_yearly_data_missing() {
        let mut astrolabe = fixture();
        astrolabe.horoscope = Some(RawHoroscope::default());
        let err = calculator(astrolabe).chart("2024-01-01", 0, Gender::Male, Some(2024)).unwrap_err();
        assert!(matches!(err, ZiweiError::YearlyDataMissing));
        assert_eq!(err.to_string(), "流年数据缺失");
    }

    #[test]
    fn test_yearly_stars_incomplete() {
        let mut astrolabe = fixture();
        yearly_mut(&mut astrolabe).stars = Some(vec![]);
        let err = calculator(astrolabe).chart("2024-01-01", 0, Gender::Male, Some(2024)).unwrap_err();
        assert!(matches!(
            err,
            ZiweiError::YearlyDataIncomplete { field: "星曜", expected: 12, received: 0 }
        ));
        assert!(err.to_string().contains("流年星曜数据不完整"));
    }

    #[test]
    fn test_yearly_palace_names_incomplete() {
        let mut astrolabe = fixture();
        yearly_mut(&mut astrolabe).palace_names.as_mut().unwrap().pop();
        let err = calculator(astrolabe.clone()).chart("2024-01-01", 0, Gender::Male, None).unwrap_err();
        assert!(matches!(err, ZiweiError::YearlyDataIncomplete { received: 11, .. }));

        yearly_mut(&mut astrolabe).palace_names = None;
        let err = calculator(astrolabe).chart("2024-01-01", 0, Gender::Male, None).unwrap_err();
        assert!(matches!(err, ZiweiError::YearlyDataIncomplete { received: 0, .. }));
    }

    #[test]
    fn test_missing_star_names_become_unknown() {
        let mut astrolabe = fixture();
        for palace in astrolabe.palaces.iter_mut().flatten() {
            palace.major_stars = Some(vec![RawStar::default()]);
            palace.minor_stars = None;
        }
        let chart = calculator(astrolabe).chart("2024-01-01", 0, Gender::Male, Some(2024)).unwrap();
        assert_eq!(chart.palaces[0].major_stars[0].name, UNKNOWN_STAR);
        assert_eq!(chart.yearly[0].major_stars[0].name, UNKNOWN_STAR);
        assert!(chart.yearly[0].minor_stars.is_empty());
    }

    #[test]
    fn test_empty_yearly_palace_name_becomes_unknown() {
        let mut astrolabe = fixture();
        yearly_mut(&mut astrolabe).palace_names.as_mut().unwrap()[3] = String::new();
        let chart = calculator(astrolabe).chart("2024-01-01", 0, Gender::Male, Some(2024)).unwrap();
        assert_eq!(chart.yearly[3].palace_name, UNKNOWN_PALACE);
        assert_ne!(chart.yearly[3].palace_name, UNKNOWN_STAR);
        assert_eq!(chart.yearly[4].palace_name, STANDARD_NAMES[4]);
    }

    #[test]
    fn test_short_decorations_are_skipped() {
        let mut astrolabe = fixture();
        yearly_mut(&mut astrolabe).yearly_dec_star = Some(RawYearlyDecStars {
            jiangqian12: Some(vec!["将星".to_string(); 3]),
            suiqian12: None,
        });
        let chart = calculator(astrolabe).chart("2024-01-01", 0, Gender::Male, None).unwrap();
        let misc: Vec<&str> = chart.yearly[5].misc_stars.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(misc, vec!["流年星1"]);
    }

    #[test]
    fn test_horoscope_failure_is_wrapped() {
        let mut astrolabe = fixture();
        astrolabe.horoscope = None;
        let err = calculator(astrolabe).chart("2024-01-01", 0, Gender::Male, None).unwrap_err();
        match err {
            ZiweiError::ExtractionFailed { source } => {
                assert!(matches!(*source, ZiweiError::Oracle(OracleError::Other(_))));
            }
            other => panic!("expected ExtractionFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_date_fails_before_oracle() {
        let astrolabe = fixture();
        let calls = astrolabe.calls.clone();
        let calc = calculator(astrolabe);

        let err = calc.chart("invalid-date", 0, Gender::Male, None).unwrap_err();
        assert!(matches!(err, ZiweiError::InvalidDateFormat(_)));
        assert!(err.to_string().contains("Invalid date format"));
        assert!(calc.chart("2024-1-1-1", 0, Gender::Male, None).is_err());
        assert!(calc.chart("２０２４-1-1", 0, Gender::Male, None).is_err());

        let err = calc.chart("2024-01-01", 13, Gender::Male, None).unwrap_err();
        assert!(matches!(err, ZiweiError::InvalidTimeSlot(13)));

        let err = calc.chart("2023-02-30", 0, Gender::Male, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CalendarConversionFailed);

        assert!(calls.requests.borrow().is_empty());
    }

    #[test]
    fn test_invalid_astrolabe() {
        let mut astrolabe = fixture();
        astrolabe.palaces[3] = None;
        let err = calculator(astrolabe).chart("2024-01-01", 0, Gender::Male, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAstrolabe);

        let mut astrolabe = fixture();
        astrolabe.palaces[5].as_mut().unwrap().earthly_branch = Some("寅".into());
        assert!(calculator(astrolabe).chart("2024-01-01", 0, Gender::Male, None).is_err());

        let mut astrolabe = fixture();
        astrolabe.five_elements = Some("七局".into());
        assert!(calculator(astrolabe).chart("2024-01-01", 0, Gender::Male, None).is_err());
    }

    #[test]
    fn test_chart_by_date_uses_true_solar_time() {
        let astrolabe = fixture();
        let calls = astrolabe.calls.clone();
        let calc = calculator(astrolabe);

        let noon = NaiveDate::from_ymd_opt(2023, 4, 15).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let chart = calc.chart_by_date(noon, 104.0, Gender::Female, None).unwrap();
        assert_eq!(chart.time_slot.index(), 5);
        assert_eq!(chart.solar_date, "2023-04-15");

        let birth = BirthInfo {
            date_time: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap().and_hms_opt(0, 30, 0).unwrap(),
            location: Location::new(100.0),
            gender: Gender::Male,
        };
        let chart = calc.chart_by_birth(&birth, None).unwrap();
        assert_eq!(chart.solar_date, "2023-05-31");
        assert_eq!(chart.time_slot, TimeSlot::LATE_ZI);

        let requests = calls.requests.borrow();
        assert_eq!(requests[0], ("2023-04-15".to_string(), 5, Gender::Female));
        assert_eq!(requests[1], ("2023-05-31".to_string(), 12, Gender::Male));
    }

    #[test]
    fn test_flow_date() {
        let astrolabe = fixture();
        let calls = astrolabe.calls.clone();
        let calc = calculator(astrolabe);

        calc.chart("2000-02-29", 3, Gender::Male, Some(2001)).unwrap();
        calc.chart("2000-02-29", 3, Gender::Male, None).unwrap();
        calc.chart("1999-7-8", 3, Gender::Male, Some(2030)).unwrap();

        let dates = calls.horoscope_dates.borrow();
        assert_eq!(*dates, vec!["2001-2-28", "2000-2-29", "2030-7-8"]);
    }

    #[test]
    fn test_parse_solar_date() {
        assert_eq!(parse_solar_date("1990-1-1").unwrap(), (1990, 1, 1));
        assert_eq!(parse_solar_date("2024-12-31").unwrap(), (2024, 12, 31));
        assert!(parse_solar_date("90-1-1").is_err());
        assert!(parse_solar_date("1990/01/01").is_err());
        assert!(parse_solar_date("").is_err());
    }
}
