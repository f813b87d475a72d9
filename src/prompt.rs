//! Analysis prompt for the chat assistant's "read this palace" action.

use super::*;

/// The three-parties-four-squares (三方四正) of a palace, as oracle indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurroundingPalaces {
    pub wealth: usize,
    pub career: usize,
    pub opposite: usize,
}

pub fn surrounding_palaces(index: usize) -> SurroundingPalaces {
    SurroundingPalaces {
        wealth: (index + 4) % PALACE_COUNT,
        career: (index + 8) % PALACE_COUNT,
        opposite: (index + 6) % PALACE_COUNT,
    }
}

fn names(stars: &[Star], separator: &str) -> String {
    stars
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(separator)
}

// majors run together, minors follow after 、
fn palace_stars(palace: &Palace) -> String {
    let majors = names(&palace.major_stars, "");
    let minors = names(&palace.minor_stars, "");
    match (majors.is_empty(), minors.is_empty()) {
        (true, true) => "无主星".to_string(),
        (true, false) => minors,
        (false, true) => majors,
        (false, false) => format!("{}、{}", majors, minors),
    }
}

/// Builds the prompt for the natal palace at `index`, or `None` when the
/// index is out of range.
pub fn analysis_prompt(chart: &ZiweiChart, index: usize) -> Option<String> {
    let palace = chart.palaces.get(index)?;
    let around = surrounding_palaces(index);

    let life_majors = chart
        .life_palace()
        .map(|life| names(&life.major_stars, "、"))
        .filter(|majors| !majors.is_empty())
        .unwrap_or_else(|| "无".to_string());

    let majors = match names(&palace.major_stars, "、") {
        majors if majors.is_empty() => "无主星".to_string(),
        majors => majors,
    };
    let minors = names(&palace.minor_stars, "、");

    let mut surrounding = Vec::with_capacity(3);
    for i in [around.wealth, around.career, around.opposite] {
        let other = chart.palaces.get(i)?;
        surrounding.push(format!("{}：{}", other.palace_name, palace_stars(other)));
    }

    Some(format!(
        "你是一名紫微斗数大师。当前命主命宫主星为【{}】。\n\
         我正在查看【{}】，本宫主星为【{}】，辅星【{}】。\n\
         其三方四正（{}）。\n\
         请分析此宫位的吉凶趋势及流年运势。",
        life_majors,
        palace.palace_name,
        majors,
        minors,
        surrounding.join("；")
    ))
}
