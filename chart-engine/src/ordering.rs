use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use fleet_core::Series;

use crate::pattern::{check_shadowing, Pattern};
use crate::ChartError;

/// Rank of names no rule matches; they sort last.
pub const UNRANKED: u32 = u32::MAX;

/// Technologies in the order the lifecycle chart walks them.
const LIFECYCLE_TECHS: [&str; 5] = ["BEV", "FCEV", "OL-BEV", "BWS-BEV", "Diesel"];

/// Lifecycle stages after vehicle and battery, bottom to top.
const LIFECYCLE_STAGES: [&str; 6] = [
    "Energie",
    "Energie_WTT",
    "Energie_TTW",
    "Wartung",
    "EoL",
    "Infrastruktur",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRule {
    pub pattern: Pattern,
    /// Position in the stack, 0 at the bottom.
    pub stack_rank: u32,
    /// Legend cluster; consecutive legend entries with equal rank group together.
    pub legend_rank: u32,
}

impl OrderRule {
    pub fn new(pattern: Pattern, stack_rank: u32, legend_rank: u32) -> Self {
        Self {
            pattern,
            stack_rank,
            legend_rank,
        }
    }

    fn ranks(&self) -> (u32, u32) {
        (self.stack_rank, self.legend_rank)
    }
}

/// Ordered rule list; the first rule matching a name decides its ranks.
///
/// Rules must be listed most specific first: compound markers such as
/// `OL-BEV` and `BWS-BEV` before the bare `BEV` they contain. [`TechOrdering::new`]
/// rejects tables that break this.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechOrdering {
    rules: Vec<OrderRule>,
    /// Text after the first occurrence of this separator is ignored for
    /// matching (e.g. the size class in `OL-BEV_3,5-12 t`).
    suffix_separator: Option<char>,
}

#[derive(Deserialize)]
struct OrderingTable {
    rules: Vec<OrderRule>,
    #[serde(default)]
    suffix_separator: Option<char>,
}

impl TechOrdering {
    pub fn new(rules: Vec<OrderRule>, suffix_separator: Option<char>) -> Result<Self, ChartError> {
        let ordering = Self {
            rules,
            suffix_separator,
        };
        ordering.validate()?;
        Ok(ordering)
    }

    pub fn from_json(json: &str) -> Result<Self, ChartError> {
        let table: OrderingTable =
            serde_json::from_str(json).map_err(|e| ChartError::InvalidRules(e.to_string()))?;
        Self::new(table.rules, table.suffix_separator)
    }

    /// Stock and cost charts: one rank per technology, Diesel at the bottom,
    /// legend reading from the top of the stack.
    pub fn technology() -> Self {
        let stack = |marker: &str, rank: u32| {
            OrderRule::new(Pattern::contains(marker), rank, 4 - rank)
        };
        Self {
            rules: vec![
                stack("OL-BEV", 3),
                stack("BWS", 2),
                stack("BEV", 4),
                stack("FCEV", 1),
                stack("H2", 1),
                stack("Diesel", 0),
            ],
            suffix_separator: Some('_'),
        }
    }

    /// Emissions chart: exact lifecycle component names. Vehicle and battery
    /// share the first legend cluster, every later stage has its own.
    pub fn lifecycle() -> Self {
        let last_stage = LIFECYCLE_STAGES.len() as u32;
        let mut rules = Vec::new();
        for tech in LIFECYCLE_TECHS {
            for part in ["Fahrzeug", "Akku"] {
                let rank = rules.len() as u32;
                rules.push(OrderRule::new(
                    Pattern::exact(format!("{part} {tech}")),
                    rank,
                    last_stage,
                ));
            }
        }
        for (stage_idx, stage) in LIFECYCLE_STAGES.iter().enumerate() {
            for tech in LIFECYCLE_TECHS {
                let rank = rules.len() as u32;
                rules.push(OrderRule::new(
                    Pattern::exact(format!("{stage} {tech}")),
                    rank,
                    last_stage - 1 - stage_idx as u32,
                ));
            }
        }
        Self {
            rules,
            suffix_separator: None,
        }
    }

    pub fn rules(&self) -> &[OrderRule] {
        &self.rules
    }

    pub fn validate(&self) -> Result<(), ChartError> {
        let ranks: Vec<(u32, u32)> = self.rules.iter().map(OrderRule::ranks).collect();
        check_shadowing(self.rules.iter().map(|r| &r.pattern).zip(ranks.iter()))
    }

    fn matching_key<'a>(&self, name: &'a str) -> &'a str {
        match self.suffix_separator.and_then(|sep| name.find(sep)) {
            Some(idx) => &name[..idx],
            None => name,
        }
    }

    fn rule_for(&self, name: &str) -> Option<&OrderRule> {
        let key = self.matching_key(name);
        self.rules.iter().find(|r| r.pattern.matches(key))
    }

    /// Stack rank; lower ranks are drawn first (bottom).
    pub fn order(&self, name: &str) -> u32 {
        self.rule_for(name).map(|r| r.stack_rank).unwrap_or(UNRANKED)
    }

    pub fn legend_order(&self, name: &str) -> u32 {
        self.rule_for(name).map(|r| r.legend_rank).unwrap_or(UNRANKED)
    }

    /// Stack rank first, then natural order of the full name.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.order(a)
            .cmp(&self.order(b))
            .then_with(|| natural_cmp(a, b))
    }

    pub fn sort_series(&self, series: &mut [Series]) {
        series.sort_by(|a, b| self.compare(&a.name, &b.name));
    }
}

fn chunks(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut prev_digit = None;
    for (i, c) in s.char_indices() {
        let digit = c.is_ascii_digit();
        if prev_digit.is_some_and(|p| p != digit) {
            out.push(&s[start..i]);
            start = i;
        }
        prev_digit = Some(digit);
    }
    if start < s.len() {
        out.push(&s[start..]);
    }
    out
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Numeric-aware comparison: digit runs compare by value, so `x20` sorts
/// before `x100`. Text runs compare case-insensitively; the raw strings break
/// remaining ties.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let ca = chunks(a);
    let cb = chunks(b);
    for (x, y) in ca.iter().zip(cb.iter()) {
        let x_num = x.starts_with(|c: char| c.is_ascii_digit());
        let y_num = y.starts_with(|c: char| c.is_ascii_digit());
        let ord = match (x_num, y_num) {
            (true, true) => cmp_digits(x, y),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => x.to_lowercase().cmp(&y.to_lowercase()),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    ca.len().cmp(&cb.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_series(names: &[&str]) -> Vec<Series> {
        names.iter().map(|n| Series::new(*n, vec![1.0])).collect()
    }

    fn names(series: &[Series]) -> Vec<&str> {
        series.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn builtin_tables_have_no_shadowed_rules() {
        TechOrdering::technology().validate().unwrap();
        TechOrdering::lifecycle().validate().unwrap();
    }

    #[test]
    fn compound_markers_win_over_bare_bev() {
        let o = TechOrdering::technology();
        assert_ne!(o.order("OL-BEV_3,5-12t"), o.order("BEV_3,5-12t"));
        assert_eq!(o.order("OL-BEV_3,5-12t"), o.order("OL-BEV"));
        assert_eq!(o.order("BWS-BEV"), 2);
        assert_eq!(o.order("BEV Lastzüge"), 4);
        assert_eq!(o.order("Diesel"), 0);
        assert_eq!(o.order("Wasserstoff"), UNRANKED);
        assert_eq!(o.order("H2-Brennstoffzelle"), o.order("FCEV"));
        assert_eq!(o.legend_order("H2_Lastzüge"), 3);
    }

    #[test]
    fn suffix_is_ignored_for_matching() {
        let o = TechOrdering::technology();
        // "Diesel" in the suffix must not decide the rank
        assert_eq!(o.order("FCEV_Diesel-Ersatz"), 1);
    }

    #[test]
    fn reversed_table_is_rejected() {
        let rules = vec![
            OrderRule::new(Pattern::contains("BEV"), 0, 0),
            OrderRule::new(Pattern::contains("OL-BEV"), 1, 1),
        ];
        assert!(matches!(
            TechOrdering::new(rules, None),
            Err(ChartError::ShadowedRule { .. })
        ));
    }

    #[test]
    fn sorts_by_rank_then_natural_name() {
        let o = TechOrdering::technology();
        let mut series = mk_series(&[
            "BEV",
            "Unbekannt",
            "OL-BEV",
            "Diesel",
            "BWS-BEV",
            "FCEV",
        ]);
        o.sort_series(&mut series);
        assert_eq!(
            names(&series),
            ["Diesel", "FCEV", "BWS-BEV", "OL-BEV", "BEV", "Unbekannt"]
        );
    }

    #[test]
    fn legend_rank_reverses_stack() {
        let o = TechOrdering::technology();
        assert_eq!(o.legend_order("BEV"), 0);
        assert_eq!(o.legend_order("Diesel"), 4);
        assert_eq!(o.legend_order("???"), UNRANKED);
    }

    #[test]
    fn natural_order_is_numeric_aware() {
        let mut v = vec!["Lkw 100", "Lkw 20", "Lkw 3", "lkw 20", "Lkw"];
        v.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(v, ["Lkw", "Lkw 3", "Lkw 20", "lkw 20", "Lkw 100"]);
        assert_eq!(natural_cmp("a007", "a7"), Ordering::Less);
        assert_eq!(natural_cmp("x", "x"), Ordering::Equal);
    }

    #[test]
    fn equal_rank_ties_use_natural_order() {
        let o = TechOrdering::technology();
        let mut series = mk_series(&["BEV 300", "BEV 100", "BEV 20"]);
        o.sort_series(&mut series);
        assert_eq!(names(&series), ["BEV 20", "BEV 100", "BEV 300"]);
    }

    #[test]
    fn lifecycle_stack_and_legend() {
        let o = TechOrdering::lifecycle();
        assert_eq!(o.order("Fahrzeug BEV"), 0);
        assert_eq!(o.order("Akku BEV"), 1);
        assert_eq!(o.order("Fahrzeug FCEV"), 2);
        assert!(o.order("Akku Diesel") < o.order("Energie BEV"));
        assert!(o.order("Energie_TTW Diesel") < o.order("Wartung BEV"));
        assert_eq!(o.legend_order("Fahrzeug BEV"), o.legend_order("Akku Diesel"));
        assert_eq!(o.legend_order("Infrastruktur BEV"), 0);
        assert_ne!(o.legend_order("Wartung BEV"), o.legend_order("EoL BEV"));
        // exact names only
        assert_eq!(o.order("Wartung BEV extra"), UNRANKED);
    }

    #[test]
    fn ordering_from_json() {
        let json = r#"{
            "rules": [
                {"pattern": {"kind": "contains", "text": "OL-BEV"}, "stack_rank": 1, "legend_rank": 0},
                {"pattern": {"kind": "contains", "text": "BEV"}, "stack_rank": 0, "legend_rank": 1}
            ],
            "suffix_separator": "_"
        }"#;
        let o = TechOrdering::from_json(json).unwrap();
        assert_eq!(o.order("OL-BEV_x"), 1);
        assert!(matches!(
            TechOrdering::from_json("{"),
            Err(ChartError::InvalidRules(_))
        ));
    }
}
