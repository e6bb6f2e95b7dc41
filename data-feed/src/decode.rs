//! Decoding of the source files into validated rows.
//!
//! Stock and cost files carry `Groessenklasse` + `Technologie`, the emissions
//! file carries `Komponente`. The shape is decided here, once per row, and a
//! file mixing both shapes is rejected.

use serde::Deserialize;

use fleet_core::{
    parse_decimal, ComponentRow, Metric, RawValue, ReferencePoint, Row, RowShape, SizeClassRow,
    Year,
};

use crate::FeedError;

#[derive(Debug, Deserialize)]
struct WireRow {
    #[serde(rename = "Szenario")]
    scenario: Option<RawValue>,
    #[serde(rename = "Groessenklasse")]
    size_class: Option<String>,
    #[serde(rename = "Technologie")]
    technology: Option<String>,
    #[serde(rename = "Komponente")]
    component: Option<String>,
    #[serde(rename = "Jahr")]
    year: Option<RawValue>,
    #[serde(rename = "Bestand")]
    bestand: Option<RawValue>,
    #[serde(rename = "Kosten")]
    kosten: Option<RawValue>,
    #[serde(rename = "THG")]
    thg: Option<RawValue>,
}

impl WireRow {
    fn field(&self, metric: Metric) -> Option<&RawValue> {
        match metric {
            Metric::Bestand => self.bestand.as_ref(),
            Metric::Kosten => self.kosten.as_ref(),
            Metric::Thg => self.thg.as_ref(),
        }
    }

    /// The chart's own column first, then any other value column present.
    fn value(&self, metric: Metric) -> Option<RawValue> {
        self.field(metric)
            .or_else(|| {
                Metric::ALL
                    .iter()
                    .filter(|m| **m != metric)
                    .find_map(|m| self.field(*m))
            })
            .cloned()
    }

    fn year(&self, index: usize) -> Result<Year, FeedError> {
        let raw = self.year.as_ref().ok_or(FeedError::MissingField {
            index,
            field: "Jahr",
        })?;
        parse_year(raw).ok_or_else(|| FeedError::InvalidYear {
            index,
            value: scalar_text(raw),
        })
    }
}

fn scalar_text(raw: &RawValue) -> String {
    match raw {
        RawValue::Number(n) if n.fract() == 0.0 && n.is_finite() => format!("{}", *n as i64),
        RawValue::Number(n) => n.to_string(),
        RawValue::Text(s) => s.trim().to_string(),
    }
}

fn parse_year(raw: &RawValue) -> Option<Year> {
    match raw {
        RawValue::Number(n) if n.is_finite() && n.fract() == 0.0 => Year::try_from(*n as i64).ok(),
        RawValue::Number(_) => None,
        RawValue::Text(s) => s.trim().trim_matches('"').parse().ok(),
    }
}

fn decode_row(index: usize, wire: WireRow, metric: Metric) -> Result<Row, FeedError> {
    let scenario = wire
        .scenario
        .as_ref()
        .map(scalar_text)
        .ok_or(FeedError::MissingField {
            index,
            field: "Szenario",
        })?;
    let year = wire.year(index)?;
    let value = wire.value(metric);

    match (wire.size_class, wire.component) {
        (Some(size_class), _) => {
            let technology = wire.technology.ok_or(FeedError::MissingField {
                index,
                field: "Technologie",
            })?;
            Ok(Row::SizeClassed(SizeClassRow {
                scenario,
                size_class,
                technology,
                year,
                value,
            }))
        }
        (None, Some(component)) => Ok(Row::Component(ComponentRow {
            scenario,
            component,
            year,
            value,
        })),
        (None, None) => Err(FeedError::MissingField {
            index,
            field: "Groessenklasse/Komponente",
        }),
    }
}

/// Decode one source file (a JSON array of rows) for `metric`.
pub fn decode_rows(json: &str, metric: Metric) -> Result<Vec<Row>, FeedError> {
    let wire: Vec<WireRow> = serde_json::from_str(json)?;
    let mut rows = Vec::with_capacity(wire.len());
    let mut shape: Option<RowShape> = None;
    for (index, w) in wire.into_iter().enumerate() {
        let row = decode_row(index, w, metric)?;
        match shape {
            None => shape = Some(row.shape()),
            Some(expected) if expected != row.shape() => {
                return Err(FeedError::MixedShapes {
                    index,
                    expected,
                    found: row.shape(),
                })
            }
            Some(_) => {}
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Decode a reference line file: `[{"Jahr": .., "<Metric>": ..}]`.
pub fn decode_reference_points(
    json: &str,
    metric: Metric,
) -> Result<Vec<ReferencePoint>, FeedError> {
    let wire: Vec<WireRow> = serde_json::from_str(json)?;
    wire.iter()
        .enumerate()
        .map(|(index, w)| {
            let year = w.year(index)?;
            let value = w.value(metric).ok_or(FeedError::MissingField {
                index,
                field: metric.value_field(),
            })?;
            Ok(ReferencePoint { year, value })
        })
        .collect()
}

/// Parse the reference CSV export: a header of years (first cell empty) and
/// one data row of quoted German decimals, e.g.
///
/// ```text
/// ,"2025","2030"
/// Kosten,"66,62","70,1"
/// ```
///
/// Values are multiplied by `scale` (1e9 turns "Mrd. €" into raw euros).
pub fn parse_reference_csv(text: &str, scale: f64) -> Result<Vec<ReferencePoint>, FeedError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.trim().as_bytes());
    let mut records = reader.records();
    let header = records
        .next()
        .ok_or_else(|| FeedError::InvalidCsv("missing header".to_string()))??;
    let data = records
        .next()
        .ok_or_else(|| FeedError::InvalidCsv("missing data row".to_string()))??;

    // first column holds the row label
    let years = header
        .iter()
        .skip(1)
        .map(|cell| {
            cell.parse::<Year>()
                .map_err(|_| FeedError::InvalidCsv(format!("invalid year \"{cell}\"")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let values: Vec<&str> = data.iter().skip(1).collect();
    if values.len() != years.len() {
        return Err(FeedError::InvalidCsv(format!(
            "{} years but {} values",
            years.len(),
            values.len()
        )));
    }

    Ok(years
        .into_iter()
        .zip(values)
        .map(|(year, v)| ReferencePoint {
            year,
            value: RawValue::Number(parse_decimal(v) * scale),
        })
        .collect())
}
