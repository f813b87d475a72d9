//! Solar to lunar date conversion, used to sanity-check birth dates.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use super::*;

/// Converts civil dates to the traditional lunisolar calendar.
pub trait LunarCalendar {
    fn to_lunar(&self, year: i32, month: u32, day: u32) -> Result<LunarDate>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LunarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub is_leap_month: bool,
    pub year_stem: Stem,
    pub year_branch: Branch,
}

const MONTH_NAMES: [&str; 12] = [
    "正", "二", "三", "四", "五", "六", "七", "八", "九", "十", "冬", "腊",
];
const DIGITS: [&str; 10] = ["", "一", "二", "三", "四", "五", "六", "七", "八", "九"];

fn day_name(day: u32) -> String {
    match day {
        10 => "初十".to_string(),
        20 => "二十".to_string(),
        30 => "三十".to_string(),
        1..=9 => format!("初{}", DIGITS[day as usize]),
        11..=19 => format!("十{}", DIGITS[day as usize - 10]),
        21..=29 => format!("廿{}", DIGITS[day as usize - 20]),
        _ => day.to_string(),
    }
}

impl fmt::Display for LunarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let leap = if self.is_leap_month { "闰" } else { "" };
        let month = (self.month as usize)
            .checked_sub(1)
            .and_then(|i| MONTH_NAMES.get(i))
            .copied()
            .unwrap_or("?");
        write!(
            f,
            "{}{}年{}{}月{}",
            self.year_stem,
            self.year_branch,
            leap,
            month,
            day_name(self.day)
        )
    }
}

// ---------------------------
// ## Month Length Table
// ---------------------------

const FIRST_YEAR: i32 = 1900;
const LAST_YEAR: i32 = 2100;

// Per lunar year from 1900: bits 4-15 mark 30-day months (month 1 at bit 15),
// the low nibble is the leap month (0 for none) and bit 16 marks a 30-day leap
// month.
const LUNAR_INFO: [u32; 201] = [
    0x04bd8, 0x04ae0, 0x0a570, 0x054d5, 0x0d260, 0x0d950, 0x16554, 0x056a0, 0x09ad0, 0x055d2, // 1900
    0x04ae0, 0x0a5b6, 0x0a4d0, 0x0d250, 0x1d255, 0x0b540, 0x0d6a0, 0x0ada2, 0x095b0, 0x14977, // 1910
    0x04970, 0x0a4b0, 0x0b4b5, 0x06a50, 0x06d40, 0x1ab54, 0x02b60, 0x09570, 0x052f2, 0x04970, // 1920
    0x06566, 0x0d4a0, 0x0ea50, 0x16a95, 0x05ad0, 0x02b60, 0x186e3, 0x092e0, 0x1c8d7, 0x0c950, // 1930
    0x0d4a0, 0x1d8a6, 0x0b550, 0x056a0, 0x1a5b4, 0x025d0, 0x092d0, 0x0d2b2, 0x0a950, 0x0b557, // 1940
    0x06ca0, 0x0b550, 0x15355, 0x04da0, 0x0a5b0, 0x14573, 0x052b0, 0x0a9a8, 0x0e950, 0x06aa0, // 1950
    0x0aea6, 0x0ab50, 0x04b60, 0x0aae4, 0x0a570, 0x05260, 0x0f263, 0x0d950, 0x05b57, 0x056a0, // 1960
    0x096d0, 0x04dd5, 0x04ad0, 0x0a4d0, 0x0d4d4, 0x0d250, 0x0d558, 0x0b540, 0x0b6a0, 0x195a6, // 1970
    0x095b0, 0x049b0, 0x0a974, 0x0a4b0, 0x0b27a, 0x06a50, 0x06d40, 0x0af46, 0x0ab60, 0x09570, // 1980
    0x04af5, 0x04970, 0x064b0, 0x074a3, 0x0ea50, 0x06b58, 0x05ac0, 0x0ab60, 0x096d5, 0x092e0, // 1990
    0x0c960, 0x0d954, 0x0d4a0, 0x0da50, 0x07552, 0x056a0, 0x0abb7, 0x025d0, 0x092d0, 0x0cab5, // 2000
    0x0a950, 0x0b4a0, 0x0baa4, 0x0ad50, 0x055d9, 0x04ba0, 0x0a5b0, 0x15176, 0x052b0, 0x0a930, // 2010
    0x07954, 0x06aa0, 0x0ad50, 0x05b52, 0x04b60, 0x0a6e6, 0x0a4e0, 0x0d260, 0x0ea65, 0x0d530, // 2020
    0x05aa0, 0x076a3, 0x096d0, 0x04afb, 0x04ad0, 0x0a4d0, 0x1d0b6, 0x0d250, 0x0d520, 0x0dd45, // 2030
    0x0b5a0, 0x056d0, 0x055b2, 0x049b0, 0x0a577, 0x0a4b0, 0x0aa50, 0x1b255, 0x06d20, 0x0ada0, // 2040
    0x14b63, 0x09370, 0x049f8, 0x04970, 0x064b0, 0x168a6, 0x0ea50, 0x06b20, 0x1a6c4, 0x0aae0, // 2050
    0x092e0, 0x0d2e3, 0x0c960, 0x0d557, 0x0d4a0, 0x0da50, 0x05d55, 0x056a0, 0x0a6d0, 0x055d4, // 2060
    0x052d0, 0x0a9b8, 0x0a950, 0x0b4a0, 0x0b6a6, 0x0ad50, 0x055a0, 0x0aba4, 0x0a5b0, 0x052b0, // 2070
    0x0b273, 0x06930, 0x07337, 0x06aa0, 0x0ad50, 0x14b55, 0x04b60, 0x0a570, 0x054e4, 0x0d160, // 2080
    0x0e968, 0x0d520, 0x0daa0, 0x16aa6, 0x056d0, 0x04ae0, 0x0a9d4, 0x0a2d0, 0x0d150, 0x0f252, // 2090
    0x0d520, // 2100
];

fn info(year: i32) -> u32 {
    LUNAR_INFO[(year - FIRST_YEAR) as usize]
}

fn leap_month(year: i32) -> u32 {
    info(year) & 0xf
}

fn leap_days(year: i32) -> i64 {
    match leap_month(year) {
        0 => 0,
        _ if info(year) & 0x10000 != 0 => 30,
        _ => 29,
    }
}

fn month_days(year: i32, month: u32) -> i64 {
    if info(year) & (0x10000 >> month) != 0 {
        30
    } else {
        29
    }
}

fn year_days(year: i32) -> i64 {
    (1..=12).map(|m| month_days(year, m)).sum::<i64>() + leap_days(year)
}

// ---------------------------
// ## Table Calendar
// ---------------------------

/// Month-length table calendar covering lunar years 1900 through 2100.
#[derive(Debug, Default, Clone, Copy)]
pub struct TableCalendar;

impl TableCalendar {
    pub fn new() -> Self {
        TableCalendar
    }
}

impl LunarCalendar for TableCalendar {
    fn to_lunar(&self, year: i32, month: u32, day: u32) -> Result<LunarDate> {
        let failed = |reason: &str| ZiweiError::LunarConversionFailed {
            date: format!("{}-{}-{}", year, month, day),
            reason: reason.to_string(),
        };

        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| failed("no such day in the civil calendar"))?;
        // Lunar new year of 1900
        let epoch = NaiveDate::from_ymd_opt(FIRST_YEAR, 1, 31)
            .ok_or_else(|| failed("calendar epoch unavailable"))?;

        let mut offset = (date - epoch).num_days();
        if offset < 0 {
            return Err(failed("date precedes the supported range"));
        }

        let mut lunar_year = FIRST_YEAR;
        loop {
            if lunar_year > LAST_YEAR {
                return Err(failed("date exceeds the supported range"));
            }
            let days = year_days(lunar_year);
            if offset < days {
                break;
            }
            offset -= days;
            lunar_year += 1;
        }

        let leap = leap_month(lunar_year);
        for lunar_month in 1..=12 {
            let days = month_days(lunar_year, lunar_month);
            if offset < days {
                return Ok(lunar_date(lunar_year, lunar_month, offset, false));
            }
            offset -= days;

            if lunar_month == leap {
                let days = leap_days(lunar_year);
                if offset < days {
                    return Ok(lunar_date(lunar_year, lunar_month, offset, true));
                }
                offset -= days;
            }
        }

        Err(failed("day offset overflowed the lunar year"))
    }
}

fn lunar_date(year: i32, month: u32, offset: i64, is_leap_month: bool) -> LunarDate {
    LunarDate {
        year,
        month,
        day: offset as u32 + 1,
        is_leap_month,
        year_stem: Stem::of_year(year),
        year_branch: Branch::of_year(year),
    }
}
