//! Stem transformations (四化) and the palaces their target stars sit in.

use serde::Serialize;
use std::collections::HashMap;

use super::*;

// 禄 权 科 忌 per stem, in stem order 甲..癸
const STEM_TRANSFORMATIONS: [[&str; 4]; 10] = [
    ["廉贞", "破军", "武曲", "太阳"],
    ["天机", "天梁", "紫微", "太阴"],
    ["天同", "天机", "文昌", "廉贞"],
    ["太阴", "天同", "天机", "巨门"],
    ["贪狼", "太阴", "右弼", "天机"],
    ["武曲", "贪狼", "天梁", "文曲"],
    ["太阳", "武曲", "太阴", "天同"],
    ["巨门", "太阳", "文曲", "文昌"],
    ["天梁", "紫微", "左辅", "武曲"],
    ["破军", "巨门", "太阴", "贪狼"],
];

/// The four stars a stem transforms. All empty when the stem is unknown.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlyingStars {
    pub lu: &'static str,
    pub quan: &'static str,
    pub ke: &'static str,
    pub ji: &'static str,
}

impl FlyingStars {
    pub fn iter(&self) -> impl Iterator<Item = (Mutagen, &'static str)> {
        Mutagen::ALL
            .iter()
            .copied()
            .zip([self.lu, self.quan, self.ke, self.ji])
    }

    pub fn get(&self, mutagen: Mutagen) -> &'static str {
        match mutagen {
            Mutagen::Lu => self.lu,
            Mutagen::Quan => self.quan,
            Mutagen::Ke => self.ke,
            Mutagen::Ji => self.ji,
        }
    }
}

pub fn flying_stars(stem: Stem) -> FlyingStars {
    let [lu, quan, ke, ji] = STEM_TRANSFORMATIONS[stem.index()];
    FlyingStars { lu, quan, ke, ji }
}

/// Looks up a stem given as its character, e.g. `"甲"`.
pub fn flying_stars_for(stem: &str) -> FlyingStars {
    Stem::from_label(stem)
        .map(flying_stars)
        .unwrap_or_default()
}

/// Resolves the natal palace index hosting each requested star name.
///
/// Names are matched across major, minor and misc stars. A name found in
/// several palaces resolves to the last one in palace order.
pub fn find_stars_location<S: AsRef<str>>(chart: &ZiweiChart, names: &[S]) -> Vec<Option<usize>> {
    let mut wanted: HashMap<&str, Vec<usize>> = HashMap::with_capacity(names.len());
    for (position, name) in names.iter().enumerate() {
        wanted.entry(name.as_ref()).or_default().push(position);
    }

    let mut found = vec![None; names.len()];
    for (index, palace) in chart.palaces.iter().enumerate() {
        for star in palace.stars() {
            if let Some(positions) = wanted.get(star.name.as_str()) {
                for &position in positions {
                    found[position] = Some(index);
                }
            }
        }
    }
    found
}

/// One transformation line drawn from a palace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlyingTarget {
    pub mutagen: Mutagen,
    pub star: &'static str,
    pub palace: Option<usize>,
}

impl ZiweiChart {
    pub fn locate_stars<S: AsRef<str>>(&self, names: &[S]) -> Vec<Option<usize>> {
        find_stars_location(self, names)
    }

    /// Transformations flown by the stem of the natal palace at `index`,
    /// with the palace each target star sits in.
    pub fn flying_targets(&self, index: usize) -> Option<Vec<FlyingTarget>> {
        let palace = self.palaces.get(index)?;
        let stars = flying_stars(palace.stem);
        let names: Vec<&str> = stars.iter().map(|(_, star)| star).collect();
        let locations = self.locate_stars(&names);

        Some(
            stars
                .iter()
                .zip(locations)
                .map(|((mutagen, star), palace)| FlyingTarget { mutagen, star, palace })
                .collect(),
        )
    }
}
