use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Calendar year of an observation.
pub type Year = i32;

/// Sentinel size-class entry meaning "no size-class filter".
pub const ALL_SIZE_CLASSES: &str = "alle Größenklassen";

/// Size classes offered by the selector, sentinel first.
pub const SIZE_CLASSES: [&str; 5] = [
    ALL_SIZE_CLASSES,
    "3,5-12 t",
    "12-26 t",
    "Lastzüge",
    "Sattelzüge",
];

/// Scenarios of the study (id, display name).
pub const SCENARIOS: [(&str, &str); 8] = [
    ("1", "Batterie-Lkw"),
    ("2", "Batterie-Lkw ohne Verzögerung"),
    ("3", "Batterie-Lkw mit Ladeinfrastruktur-Restriktion"),
    ("4", "Mit Batteriewechsel-Lkw"),
    (
        "5",
        "Mit Batteriewechsel-Lkw und Batterie-Lkw mit max. 1000 km Reichweite",
    ),
    ("6", "Mit Oberleitungs-Lkw"),
    ("7", "Mit Brennstoffzellen-Lkw"),
    ("8", "Mit Brennstoffzellen-Lkw und H2-Mix"),
];

/// Display name of a scenario id, if it is part of the study.
pub fn scenario_name(id: &str) -> Option<&'static str> {
    SCENARIOS
        .iter()
        .find(|(sid, _)| *sid == id)
        .map(|(_, name)| *name)
}

/// Axis form of a year label: 2025 -> `'25`.
pub fn short_year_label(year: Year) -> String {
    format!("'{:02}", year.rem_euclid(100))
}

// ---------- values -------------------------------------------------------------

/// A numeric cell as it arrives from the source files: a JSON number or a
/// possibly comma-formatted string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Numeric value; unparseable or non-finite input is coerced to 0.0.
    pub fn to_f64(&self) -> f64 {
        match self {
            RawValue::Number(v) if v.is_finite() => *v,
            RawValue::Number(_) => 0.0,
            RawValue::Text(s) => parse_decimal(s),
        }
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

/// Parse a decimal that may use a comma as decimal separator.
///
/// `"66,62"` and `"66.62"` both give 66.62; when both separators occur the dot
/// is read as thousands grouping (`"1.234,5"` -> 1234.5). Like a lenient float
/// parser only the leading numeric prefix is used (`"12abc"` -> 12). Input
/// without a numeric prefix yields 0.0.
pub fn parse_decimal(text: &str) -> f64 {
    let trimmed = text.trim();
    let normalized = if trimmed.contains(',') {
        if trimmed.contains('.') {
            trimmed.replace('.', "").replacen(',', ".", 1)
        } else {
            trimmed.replacen(',', ".", 1)
        }
    } else {
        trimmed.to_string()
    };
    let prefix = numeric_prefix(&normalized);
    match prefix.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

fn numeric_prefix(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut end = 0usize;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return "";
    }
    // optional exponent, only taken when complete
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    &s[..end]
}

// ---------- rows -----------------------------------------------------------------

/// Observation keyed by technology and vehicle size class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeClassRow {
    pub scenario: String,
    pub size_class: String,
    pub technology: String,
    pub year: Year,
    pub value: Option<RawValue>,
}

/// Observation keyed by lifecycle component (e.g. `Wartung BEV`), no size class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRow {
    pub scenario: String,
    pub component: String,
    pub year: Year,
    pub value: Option<RawValue>,
}

/// One observation. The shape is explicit; it is decided once at the loading
/// boundary and never inferred from field presence afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Row {
    SizeClassed(SizeClassRow),
    Component(ComponentRow),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowShape {
    SizeClassed,
    Component,
}

impl Row {
    pub fn size_classed(
        scenario: impl Into<String>,
        size_class: impl Into<String>,
        technology: impl Into<String>,
        year: Year,
        value: impl Into<RawValue>,
    ) -> Self {
        Row::SizeClassed(SizeClassRow {
            scenario: scenario.into(),
            size_class: size_class.into(),
            technology: technology.into(),
            year,
            value: Some(value.into()),
        })
    }

    pub fn component(
        scenario: impl Into<String>,
        component: impl Into<String>,
        year: Year,
        value: impl Into<RawValue>,
    ) -> Self {
        Row::Component(ComponentRow {
            scenario: scenario.into(),
            component: component.into(),
            year,
            value: Some(value.into()),
        })
    }

    pub fn shape(&self) -> RowShape {
        match self {
            Row::SizeClassed(_) => RowShape::SizeClassed,
            Row::Component(_) => RowShape::Component,
        }
    }

    pub fn scenario(&self) -> &str {
        match self {
            Row::SizeClassed(r) => &r.scenario,
            Row::Component(r) => &r.scenario,
        }
    }

    pub fn year(&self) -> Year {
        match self {
            Row::SizeClassed(r) => r.year,
            Row::Component(r) => r.year,
        }
    }

    /// Technology (size-classed rows) or component name (component rows).
    pub fn category(&self) -> &str {
        match self {
            Row::SizeClassed(r) => &r.technology,
            Row::Component(r) => &r.component,
        }
    }

    pub fn size_class(&self) -> Option<&str> {
        match self {
            Row::SizeClassed(r) => Some(&r.size_class),
            Row::Component(_) => None,
        }
    }

    /// Numeric value before unit scaling; missing values count as 0.0.
    pub fn value(&self) -> f64 {
        let raw = match self {
            Row::SizeClassed(r) => r.value.as_ref(),
            Row::Component(r) => r.value.as_ref(),
        };
        raw.map(RawValue::to_f64).unwrap_or(0.0)
    }
}

/// One point of a reference line (e.g. the cost path without drive transition).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub year: Year,
    pub value: RawValue,
}

// ---------- chart data -----------------------------------------------------------

/// Named values aligned to the label axis of its batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

impl Series {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn is_all_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChartDataError {
    #[error("dataset \"{series}\" has {actual} values but there are {expected} labels")]
    LengthMismatch {
        series: String,
        expected: usize,
        actual: usize,
    },
}

/// Bar/stack input: one label per year, one series per category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Series>,
}

impl ChartData {
    pub fn new(labels: Vec<String>, datasets: Vec<Series>) -> Self {
        Self { labels, datasets }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Nothing to draw: no labels or no datasets.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() || self.datasets.is_empty()
    }

    pub fn series_names(&self) -> impl Iterator<Item = &str> {
        self.datasets.iter().map(|s| s.name.as_str())
    }

    /// Every dataset must carry exactly one value per label.
    pub fn check_lengths(&self) -> Result<(), ChartDataError> {
        for ds in &self.datasets {
            if ds.values.len() != self.labels.len() {
                return Err(ChartDataError::LengthMismatch {
                    series: ds.name.clone(),
                    expected: self.labels.len(),
                    actual: ds.values.len(),
                });
            }
        }
        Ok(())
    }
}

/// A line point in data space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinePoint {
    pub x: f64,
    pub y: f64,
    /// Original x label for tooltips (e.g. "2025").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Original value before transformation, for tooltips.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl LinePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            label: None,
            value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<LinePoint>,
}

/// Line overlay input with explicit coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineChartData {
    pub datasets: Vec<LineSeries>,
}

impl LineChartData {
    pub fn is_empty(&self) -> bool {
        self.datasets.iter().all(|d| d.points.is_empty())
    }

    /// Extent of all x coordinates, `None` without points.
    pub fn x_extent(&self) -> Option<(f64, f64)> {
        let mut xs = self
            .datasets
            .iter()
            .flat_map(|d| d.points.iter().map(|p| p.x))
            .filter(|x| x.is_finite());
        let first = xs.next()?;
        Some(xs.fold((first, first), |(lo, hi), x| (lo.min(x), hi.max(x))))
    }
}

// ---------- scale ----------------------------------------------------------------

/// Axis descriptor: `ticks` ascending, first tick 0, last tick >= `max_value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub max_value: f64,
    pub ticks: Vec<f64>,
}

impl Scale {
    /// Ticks the y-axis actually draws (those not above `max_value`).
    pub fn visible_ticks(&self) -> impl Iterator<Item = f64> + '_ {
        self.ticks.iter().copied().filter(|t| *t <= self.max_value)
    }
}

/// Optional overrides and tuning for scale computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleInputs {
    /// Hard axis maximum; computed when absent.
    pub max_value: Option<f64>,
    /// Hard tick list; computed when absent or empty.
    pub ticks: Option<Vec<f64>>,
    /// Default 5.
    pub tick_count: Option<usize>,
    /// Default 1.2: the axis maximum stays within 20% of the data maximum.
    pub max_overage_ratio: Option<f64>,
    /// Line charts: start of the x range (e.g. first year).
    pub min_x: Option<f64>,
    /// Line charts: end of the x range.
    pub max_x: Option<f64>,
}

impl ScaleInputs {
    pub fn with_tick_count(mut self, tick_count: usize) -> Self {
        self.tick_count = Some(tick_count);
        self
    }

    pub fn with_max_value(mut self, max_value: f64) -> Self {
        self.max_value = Some(max_value);
        self
    }

    pub fn with_ticks(mut self, ticks: Vec<f64>) -> Self {
        self.ticks = Some(ticks);
        self
    }

    pub fn with_x_range(mut self, min_x: f64, max_x: f64) -> Self {
        self.min_x = Some(min_x);
        self.max_x = Some(max_x);
        self
    }
}

// ---------- selection ------------------------------------------------------------

/// Size-class multi-selection. Always non-empty; the [`ALL_SIZE_CLASSES`]
/// sentinel anywhere in the list means "no filter".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SizeClassSelection(Vec<String>);

impl SizeClassSelection {
    pub fn all() -> Self {
        Self(vec![ALL_SIZE_CLASSES.to_string()])
    }

    /// Build from explicit entries; an empty list selects everything.
    pub fn from_classes<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for c in classes {
            let c = c.into();
            if !out.contains(&c) {
                out.push(c);
            }
        }
        if out.is_empty() {
            Self::all()
        } else {
            Self(out)
        }
    }

    pub fn is_all(&self) -> bool {
        self.0.iter().any(|c| c == ALL_SIZE_CLASSES)
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }

    /// Whether rows of `size_class` pass the filter.
    pub fn includes(&self, size_class: &str) -> bool {
        self.is_all() || self.0.iter().any(|c| c == size_class)
    }

    /// Several specific classes selected: series get a size-class suffix.
    pub fn is_multi_specific(&self) -> bool {
        !self.is_all() && self.0.len() > 1
    }

    /// Selector toggle: the sentinel is mutually exclusive with specific
    /// classes, and deselecting the last specific class restores it.
    pub fn toggle(&mut self, size_class: &str) {
        if size_class == ALL_SIZE_CLASSES {
            *self = Self::all();
            return;
        }
        let mut specific: Vec<String> = self
            .0
            .iter()
            .filter(|c| c.as_str() != ALL_SIZE_CLASSES)
            .cloned()
            .collect();
        if let Some(idx) = specific.iter().position(|c| c == size_class) {
            specific.remove(idx);
        } else {
            specific.push(size_class.to_string());
        }
        *self = Self::from_classes(specific);
    }
}

impl Default for SizeClassSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl From<Vec<String>> for SizeClassSelection {
    fn from(v: Vec<String>) -> Self {
        Self::from_classes(v)
    }
}

impl From<SizeClassSelection> for Vec<String> {
    fn from(s: SizeClassSelection) -> Self {
        s.0
    }
}

/// Current UI selection driving every recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub scenario: String,
    pub size_classes: SizeClassSelection,
}

impl Selection {
    pub fn new(scenario: impl Into<String>, size_classes: SizeClassSelection) -> Self {
        Self {
            scenario: scenario.into(),
            size_classes,
        }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::new("1", SizeClassSelection::all())
    }
}

// ---------- configuration --------------------------------------------------------

/// Which source file / value column a chart reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    Bestand,
    Kosten,
    #[serde(rename = "THG")]
    Thg,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Bestand, Metric::Kosten, Metric::Thg];

    /// File stem of the source file (`<stem>.json`).
    pub fn file_stem(&self) -> &'static str {
        match self {
            Metric::Bestand => "Bestand",
            Metric::Kosten => "Kosten",
            Metric::Thg => "THG-Emissionen",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.file_stem())
    }

    /// Column holding the value in the source rows.
    pub fn value_field(&self) -> &'static str {
        match self {
            Metric::Bestand => "Bestand",
            Metric::Kosten => "Kosten",
            Metric::Thg => "THG",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value_field())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMetricError;

impl fmt::Display for ParseMetricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown metric")
    }
}

impl std::error::Error for ParseMetricError {}

impl FromStr for Metric {
    type Err = ParseMetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bestand" => Ok(Metric::Bestand),
            "kosten" => Ok(Metric::Kosten),
            "thg" | "thg-emissionen" => Ok(Metric::Thg),
            _ => Err(ParseMetricError),
        }
    }
}

/// Category renames and exclusions applied to component rows only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentRewrite {
    /// Ordered (from, to) substring replacements.
    pub renames: Vec<(String, String)>,
    /// Components containing any of these are dropped.
    pub excluded: Vec<String>,
}

impl ComponentRewrite {
    pub fn is_empty(&self) -> bool {
        self.renames.is_empty() && self.excluded.is_empty()
    }

    /// Renamed component, or `None` when the component is excluded.
    pub fn apply(&self, component: &str) -> Option<String> {
        let mut name = component.to_string();
        for (from, to) in &self.renames {
            if name.contains(from.as_str()) {
                name = name.replacen(from.as_str(), to, 1);
            }
        }
        if self.excluded.iter().any(|ex| name.contains(ex.as_str())) {
            None
        } else {
            Some(name)
        }
    }

    /// THG chart: energy components are well-to-tank figures, and two
    /// infrastructure components are always zero.
    pub fn thg() -> Self {
        let renames = ["Diesel", "BEV", "BWS-BEV", "OL-BEV", "FCEV"]
            .iter()
            .map(|tech| (format!("Energie {tech}"), format!("Energie_WTT {tech}")))
            .collect();
        Self {
            renames,
            excluded: vec![
                "Infrastruktur FCEV".to_string(),
                "Infrastruktur BWS-BEV".to_string(),
            ],
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid chart config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("chart \"{id}\": unit divisor must be finite and positive, got {value}")]
    InvalidDivisor { id: String, value: f64 },
    #[error("chart \"{id}\": tick count must be at least 2, got {value}")]
    InvalidTickCount { id: String, value: usize },
}

/// Static description of one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub id: String,
    pub metric: Metric,
    pub title: String,
    /// Raw values are divided by this (e.g. 1e9 for "Mrd. €").
    pub unit_divisor: f64,
    pub unit_label: String,
    /// Apply the size-class selection (size-classed data only).
    #[serde(default = "default_true")]
    pub size_class_filter: bool,
    #[serde(default)]
    pub tick_count: Option<usize>,
    #[serde(default)]
    pub component_rewrite: ComponentRewrite,
}

fn default_true() -> bool {
    true
}

impl ChartConfig {
    pub fn new(id: impl Into<String>, metric: Metric, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metric,
            title: title.into(),
            unit_divisor: 1.0,
            unit_label: String::new(),
            size_class_filter: true,
            tick_count: None,
            component_rewrite: ComponentRewrite::default(),
        }
    }

    pub fn bestand() -> Self {
        Self::new("bestand", Metric::Bestand, "Bestand")
            .with_unit(1_000.0, "in Tsd. Fahrzeuge")
    }

    pub fn kosten() -> Self {
        Self::new("kosten", Metric::Kosten, "Kosten").with_unit(1_000_000_000.0, "in Mrd. €")
    }

    pub fn thg() -> Self {
        Self::new("thg", Metric::Thg, "THG-Emissionen")
            .with_unit(1.0, "in Mt CO2äq")
            .with_size_class_filter(false)
            .with_component_rewrite(ComponentRewrite::thg())
    }

    pub fn defaults() -> Vec<Self> {
        vec![Self::bestand(), Self::kosten(), Self::thg()]
    }

    pub fn with_unit(mut self, unit_divisor: f64, unit_label: impl Into<String>) -> Self {
        self.unit_divisor = unit_divisor;
        self.unit_label = unit_label.into();
        self
    }

    pub fn with_size_class_filter(mut self, enabled: bool) -> Self {
        self.size_class_filter = enabled;
        self
    }

    pub fn with_tick_count(mut self, tick_count: usize) -> Self {
        self.tick_count = Some(tick_count);
        self
    }

    pub fn with_component_rewrite(mut self, rewrite: ComponentRewrite) -> Self {
        self.component_rewrite = rewrite;
        self
    }

    /// Heading as shown above the chart.
    pub fn heading(&self) -> String {
        if self.unit_label.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.unit_label)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.unit_divisor.is_finite() || self.unit_divisor <= 0.0 {
            return Err(ConfigError::InvalidDivisor {
                id: self.id.clone(),
                value: self.unit_divisor,
            });
        }
        if let Some(n) = self.tick_count {
            if n < 2 {
                return Err(ConfigError::InvalidTickCount {
                    id: self.id.clone(),
                    value: n,
                });
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON list of chart configs.
    pub fn from_json(json: &str) -> Result<Vec<Self>, ConfigError> {
        let configs: Vec<Self> = serde_json::from_str(json)?;
        for cfg in &configs {
            cfg.validate()?;
        }
        Ok(configs)
    }

    /// Scale inputs derived from this config.
    pub fn scale_inputs(&self) -> ScaleInputs {
        ScaleInputs {
            tick_count: self.tick_count,
            ..ScaleInputs::default()
        }
    }
}

/// Distinct years of `rows`, ascending.
pub fn distinct_years<'a, I>(rows: I) -> Vec<Year>
where
    I: IntoIterator<Item = &'a Row>,
{
    rows.into_iter()
        .map(Row::year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
