//! Named star configurations (格局) recognised inside a single palace.

use serde::Serialize;
use std::fmt;

use super::*;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Pattern {
    /// 贪狼 with 火星.
    FireGreed,
    /// 贪狼 with 铃星 and no 火星.
    BellGreed,
    /// 太阴 in 亥.
    MoonAtHeavenGate,
    /// 太阳 in 卯.
    SunriseAtFusang,
    /// 巨门 in 子 or 午.
    JadeInStone,
    /// 擎羊 in 午.
    ArrowOnHorse,
    /// 地空 or 地劫 in the life palace.
    VoidInLife,
}

impl Pattern {
    pub const ALL: &'static [Pattern] = &[
        Pattern::FireGreed,
        Pattern::BellGreed,
        Pattern::MoonAtHeavenGate,
        Pattern::SunriseAtFusang,
        Pattern::JadeInStone,
        Pattern::ArrowOnHorse,
        Pattern::VoidInLife,
    ];

    /// Name the knowledge base files the pattern under.
    pub fn name(self) -> &'static str {
        match self {
            Pattern::FireGreed => "火贪格",
            Pattern::BellGreed => "铃贪格",
            Pattern::MoonAtHeavenGate => "月朗天门",
            Pattern::SunriseAtFusang => "日出扶桑",
            Pattern::JadeInStone => "石中隐玉",
            Pattern::ArrowOnHorse => "马头带箭",
            Pattern::VoidInLife => "命里逢空",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the pattern rules look at: the palace name, every star in it and
/// the branch taken from the second character of its stem-branch.
#[derive(Debug, Clone)]
pub struct PalaceContext<'a> {
    pub palace_name: &'a str,
    pub star_names: Vec<&'a str>,
    pub branch: Option<Branch>,
}

impl<'a> PalaceContext<'a> {
    pub fn new(
        palace_name: &'a str,
        stars: impl IntoIterator<Item = &'a Star>,
        stem_branch: &str,
    ) -> Self {
        PalaceContext {
            palace_name,
            star_names: stars.into_iter().map(|s| s.name.as_str()).collect(),
            branch: stem_branch.chars().nth(1).and_then(Branch::from_char),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.star_names.contains(&name)
    }

    fn in_branch(&self, branches: &[Branch]) -> bool {
        self.branch.is_some_and(|b| branches.contains(&b))
    }
}

/// Patterns satisfied by the palace, in rule order.
pub fn detect_patterns(ctx: &PalaceContext<'_>) -> Vec<Pattern> {
    let mut patterns = Vec::new();

    if ctx.has("贪狼") {
        if ctx.has("火星") {
            patterns.push(Pattern::FireGreed);
        } else if ctx.has("铃星") {
            patterns.push(Pattern::BellGreed);
        }
    }

    if ctx.has("太阴") && ctx.in_branch(&[Branch::Hai]) {
        patterns.push(Pattern::MoonAtHeavenGate);
    }

    if ctx.has("太阳") && ctx.in_branch(&[Branch::Mao]) {
        patterns.push(Pattern::SunriseAtFusang);
    }

    if ctx.has("巨门") && ctx.in_branch(&[Branch::Zi, Branch::Wu]) {
        patterns.push(Pattern::JadeInStone);
    }

    if ctx.has("擎羊") && ctx.in_branch(&[Branch::Wu]) {
        patterns.push(Pattern::ArrowOnHorse);
    }

    if ctx.palace_name == "命宫" && (ctx.has("地空") || ctx.has("地劫")) {
        patterns.push(Pattern::VoidInLife);
    }

    patterns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(palace: &str, names: &[&str], stem_branch: &str) -> Vec<Pattern> {
        let stars: Vec<Star> = names.iter().map(|&n| Star::new(n)).collect();
        detect_patterns(&PalaceContext::new(palace, &stars, stem_branch))
    }

    #[test]
    fn test_fire_preferred_over_bell() {
        assert_eq!(detect("财帛", &["贪狼", "铃星"], "甲子"), vec![Pattern::BellGreed]);
        assert_eq!(
            detect("财帛", &["贪狼", "铃星", "火星"], "甲子"),
            vec![Pattern::FireGreed]
        );
        assert!(detect("财帛", &["火星", "铃星"], "甲子").is_empty());
    }

    #[test]
    fn test_branch_rules() {
        assert_eq!(detect("田宅", &["太阴"], "乙亥"), vec![Pattern::MoonAtHeavenGate]);
        assert!(detect("田宅", &["太阴"], "乙子").is_empty());
        assert_eq!(detect("官禄", &["太阳"], "丁卯"), vec![Pattern::SunriseAtFusang]);
        assert_eq!(detect("夫妻", &["巨门"], "丙子"), vec![Pattern::JadeInStone]);
        assert_eq!(detect("夫妻", &["巨门"], "庚午"), vec![Pattern::JadeInStone]);
        assert_eq!(
            detect("子女", &["巨门", "擎羊"], "庚午"),
            vec![Pattern::JadeInStone, Pattern::ArrowOnHorse]
        );
    }

    #[test]
    fn test_missing_branch_never_matches() {
        assert!(detect("田宅", &["太阴", "太阳", "巨门"], "").is_empty());
        assert!(detect("田宅", &["太阴"], "亥").is_empty());
    }

    #[test]
    fn test_void_only_in_life_palace() {
        assert_eq!(detect("命宫", &["地劫"], "癸酉"), vec![Pattern::VoidInLife]);
        assert!(detect("迁移", &["地劫", "地空"], "癸酉").is_empty());
    }

    #[test]
    fn test_names() {
        let names: Vec<&str> = Pattern::ALL.iter().map(|p| p.name()).collect();
        assert_eq!(names.len(), 7);
        assert_eq!(Pattern::FireGreed.to_string(), "火贪格");
        assert!(names.contains(&"命里逢空"));
    }
}
