use log::warn;
use serde::{Deserialize, Serialize};

use crate::pattern::{check_shadowing, Pattern};
use crate::ChartError;

/// Colour of names nothing else resolves; deliberately loud.
pub const UNKNOWN_COLOR: &str = "#F00";

/// Base palette for series without a rule, indexed cyclically.
pub const SERIES_PALETTE: [&str; 6] = [
    "#0a3b46", "#d9d300", "#4f6b74", "#274650", "#f0e88b", "#aeb8bc",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRule {
    pub pattern: Pattern,
    pub color: String,
}

impl ColorRule {
    pub fn new(pattern: Pattern, color: impl Into<String>) -> Self {
        Self {
            pattern,
            color: color.into(),
        }
    }
}

/// Ordered colour rules, first match wins. Exact names come before word
/// markers, and compound markers (`OL-BEV`, `BWS-BEV`) before `BEV`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorTable {
    rules: Vec<ColorRule>,
}

impl ColorTable {
    pub fn new(rules: Vec<ColorRule>) -> Result<Self, ChartError> {
        let table = Self { rules };
        table.validate()?;
        Ok(table)
    }

    /// Parse a JSON list of `{pattern, color}` rules.
    pub fn from_json(json: &str) -> Result<Self, ChartError> {
        let rules: Vec<ColorRule> =
            serde_json::from_str(json).map_err(|e| ChartError::InvalidRules(e.to_string()))?;
        Self::new(rules)
    }

    /// Colours of the fleet study charts.
    pub fn standard() -> Result<Self, ChartError> {
        let mut rules = Vec::new();
        let mut exact = |name: &str, token: &str| {
            rules.push(ColorRule::new(
                Pattern::exact(name),
                format!("var(--color-{token})"),
            ));
        };

        // infrastructure
        exact("Infrastruktur OL-BEV", "ol-bev-medium");
        exact("Infrastruktur BEV", "bev-infrastructure");
        exact("Infrastruktur FCEV", "fcev-light");
        exact("Infrastruktur BWS-BEV", "bws-bev-light");
        exact("Infrastruktur Diesel", "diesel-energy-light");

        // end of life
        exact("EoL Diesel", "diesel-energy-soft");
        exact("EoL OL-BEV", "ol-bev-dark");
        exact("EoL BEV", "bev-highlight");
        exact("EoL FCEV", "fcev-light");
        exact("EoL BWS-BEV", "bws-bev-primary");

        exact("Wartung Diesel", "diesel-energy-medium");
        exact("Wartung OL-BEV", "ol-bev-medium");
        exact("Wartung BEV", "bev-highlight");
        exact("Wartung FCEV", "fcev-primary");
        exact("Wartung BWS-BEV", "bws-bev-primary");

        exact("Energie_TTW Diesel", "diesel-energy-ttw");
        exact("Energie_WTT Diesel", "diesel-energy-wtt");
        exact("Energie OL-BEV", "ol-bev-light");
        exact("Energie BEV", "bev-energy");
        exact("Energie FCEV", "fcev-light");
        exact("Energie BWS-BEV", "bws-bev-light");

        exact("Akku OL-BEV", "ol-bev-medium");
        exact("Akku BEV", "bev-battery");
        exact("Akku FCEV", "fcev-battery");
        exact("Akku BWS-BEV", "bws-bev-light");

        exact("Fahrzeug Diesel", "diesel-vehicle-dark");
        exact("Fahrzeug OL-BEV", "ol-bev-light");
        exact("Fahrzeug BEV", "bev-vehicle");
        exact("Fahrzeug FCEV", "fcev-primary");
        exact("Fahrzeug BWS-BEV", "bws-bev-primary");

        // technology x size class
        exact("Diesel Sattelzüge", "diesel-vehicle-dark");
        exact("Diesel Lastzüge", "diesel-vehicle-medium");
        exact("Diesel 12-26 t", "diesel-energy-soft");
        exact("Diesel 3,5-12 t", "diesel-energy-light");

        exact("OL-BEV Sattelzüge", "ol-bev-light");
        exact("OL-BEV Lastzüge", "ol-bev-medium");
        exact("OL-BEV 12-26 t", "ol-bev-dark");
        exact("OL-BEV 3,5-12 t", "ol-bev-light");

        exact("BEV Sattelzüge", "bev-energy");
        exact("BEV Lastzüge", "bev-battery");
        exact("BEV 12-26 t", "bev-vehicle");
        exact("BEV 3,5-12 t", "bev-infrastructure");

        exact("FCEV Sattelzüge", "fcev-light");
        exact("FCEV Lastzüge", "fcev-dark");
        exact("FCEV 12-26 t", "fcev-primary");
        exact("FCEV 3,5-12 t", "fcev-primary");

        exact("BWS-BEV Sattelzüge", "bws-bev-primary");
        exact("BWS-BEV Lastzüge", "bws-bev-light");
        exact("BWS-BEV 12-26 t", "bws-bev-dark");
        exact("BWS-BEV 3,5-12 t", "bws-bev-light");

        // bare technology labels
        exact("Diesel", "diesel-vehicle-dark");
        exact("OL-BEV", "ol-bev-medium");
        exact("BEV", "bev-energy");
        exact("FCEV", "fcev-light");
        exact("BWS-BEV", "bws-bev-primary");
        exact("Batterieelektrisch", "bev-energy");
        exact("Brennstoffzelle", "fcev-primary");
        exact("Batteriewechsel", "bws-bev-primary");
        exact("Batteriewechselsystem", "bws-bev-primary");

        // generic markers, must stay last
        for (marker, token) in [
            ("Diesel", "diesel-vehicle-dark"),
            ("OL-BEV", "ol-bev-medium"),
            ("BWS-BEV", "bws-bev-primary"),
            ("BEV", "bev-energy"),
            ("FCEV", "fcev-primary"),
            ("Brennstoffzelle", "fcev-primary"),
        ] {
            rules.push(ColorRule::new(
                Pattern::word(marker)?,
                format!("var(--color-{token})"),
            ));
        }
        Self::new(rules)
    }

    pub fn rules(&self) -> &[ColorRule] {
        &self.rules
    }

    pub fn validate(&self) -> Result<(), ChartError> {
        check_shadowing(self.rules.iter().map(|r| (&r.pattern, &r.color)))
    }

    /// Colour of the first rule matching `name`.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|r| r.pattern.matches(name))
            .map(|r| r.color.as_str())
    }
}

/// Entry of the abbreviations legend shown next to the charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Abbreviation {
    pub abbr: String,
    pub description: Option<String>,
    pub color: String,
}

/// Deterministic series colours: rule table, then palette by index, then the
/// unknown sentinel. Never fails.
#[derive(Debug, Clone)]
pub struct ColorResolver {
    table: ColorTable,
    palette: Vec<String>,
    unknown_color: String,
}

impl ColorResolver {
    /// Resolver over [`ColorTable::standard`].
    pub fn standard() -> Result<Self, ChartError> {
        ColorTable::standard().map(Self::new)
    }

    pub fn new(table: ColorTable) -> Self {
        Self {
            table,
            palette: SERIES_PALETTE.iter().map(|c| c.to_string()).collect(),
            unknown_color: UNKNOWN_COLOR.to_string(),
        }
    }

    pub fn with_palette(mut self, palette: Vec<String>) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_unknown_color(mut self, color: impl Into<String>) -> Self {
        self.unknown_color = color.into();
        self
    }

    pub fn table(&self) -> &ColorTable {
        &self.table
    }

    pub fn color_for(&self, name: &str, fallback_index: Option<usize>) -> &str {
        if let Some(color) = self.table.lookup(name) {
            return color;
        }
        match fallback_index {
            Some(idx) if !self.palette.is_empty() => &self.palette[idx % self.palette.len()],
            _ => {
                warn!("no colour rule for series \"{name}\"");
                &self.unknown_color
            }
        }
    }

    pub fn abbreviations(&self) -> Vec<Abbreviation> {
        [
            ("Diesel", None, "Diesel"),
            ("BEV", Some("Batterieelektrisch"), "BEV"),
            ("BWS", Some("Batteriewechselsystem"), "BWS-BEV"),
            ("OL", Some("Oberleitung"), "OL-BEV"),
            ("FCEV", Some("H₂-Brennstoffzelle"), "FCEV"),
        ]
        .into_iter()
        .map(|(abbr, description, tech)| Abbreviation {
            abbr: abbr.to_string(),
            description: description.map(str::to_string),
            color: self.color_for(tech, None).to_string(),
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_resolver() -> ColorResolver {
        ColorResolver::standard().unwrap()
    }

    #[test]
    fn standard_table_is_well_ordered() {
        ColorTable::standard().unwrap().validate().unwrap();
    }

    #[test]
    fn exact_names_resolve() {
        let r = mk_resolver();
        assert_eq!(r.color_for("Akku BEV", None), "var(--color-bev-battery)");
        assert_eq!(r.color_for("Diesel Lastzüge", None), "var(--color-diesel-vehicle-medium)");
        assert_eq!(r.color_for("Batteriewechselsystem", None), "var(--color-bws-bev-primary)");
    }

    #[test]
    fn compound_markers_resolve_before_bev() {
        let r = mk_resolver();
        assert_eq!(r.color_for("Neu OL-BEV", None), "var(--color-ol-bev-medium)");
        assert_eq!(r.color_for("Neu BWS-BEV", None), "var(--color-bws-bev-primary)");
        assert_eq!(r.color_for("neu bev", None), "var(--color-bev-energy)");
        assert_eq!(r.color_for("Brennstoffzelle Lkw", None), "var(--color-fcev-primary)");
    }

    #[test]
    fn repeated_lookups_are_stable() {
        let r = mk_resolver();
        let first = r.color_for("BEV", None).to_string();
        for _ in 0..100 {
            assert_eq!(r.color_for("BEV", None), first);
        }
    }

    #[test]
    fn unknown_names_fall_back() {
        let r = mk_resolver();
        assert_eq!(r.color_for("Wasserstoffpipeline", None), UNKNOWN_COLOR);
        assert_eq!(r.color_for("Wasserstoffpipeline", Some(1)), SERIES_PALETTE[1]);
        assert_eq!(r.color_for("Wasserstoffpipeline", Some(7)), SERIES_PALETTE[1]);

        let r = mk_resolver()
            .with_palette(vec![])
            .with_unknown_color("magenta");
        assert_eq!(r.color_for("x", Some(3)), "magenta");
    }

    #[test]
    fn abbreviations_use_technology_colours() {
        let abbrs = mk_resolver().abbreviations();
        assert_eq!(abbrs.len(), 5);
        assert_eq!(abbrs[0].description, None);
        assert_eq!(abbrs[2].abbr, "BWS");
        assert_eq!(abbrs[2].color, "var(--color-bws-bev-primary)");
        assert!(abbrs.iter().all(|a| a.color != UNKNOWN_COLOR));
    }

    #[test]
    fn table_from_json_is_validated() {
        let ok = r##"[
            {"pattern": {"kind": "exact", "text": "BEV"}, "color": "#111"},
            {"pattern": {"kind": "word", "text": "BEV"}, "color": "#222"}
        ]"##;
        let table = ColorTable::from_json(ok).unwrap();
        assert_eq!(table.lookup("BEV"), Some("#111"));
        assert_eq!(table.lookup("OL-BEV"), Some("#222"));

        let shadowed = r##"[
            {"pattern": {"kind": "word", "text": "BEV"}, "color": "#222"},
            {"pattern": {"kind": "word", "text": "OL-BEV"}, "color": "#333"}
        ]"##;
        assert!(matches!(
            ColorTable::from_json("[{]"),
            Err(ChartError::InvalidRules(_))
        ));
        assert!(matches!(
            ColorTable::from_json(shadowed),
            Err(ChartError::ShadowedRule { .. })
        ));
    }
}
