use std::borrow::Cow;
use std::collections::BTreeMap;

use log::debug;

use fleet_core::{
    distinct_years, ChartConfig, ChartData, ComponentRewrite, LineChartData, LinePoint,
    LineSeries, Metric, ReferencePoint, Row, RowShape, Selection, Series, Year,
};

use crate::ordering::TechOrdering;

/// Pivots raw rows into one series per category, aligned to the sorted years.
#[derive(Debug, Clone)]
pub struct SeriesTransform {
    unit_divisor: f64,
    size_class_filter: bool,
    rewrite: ComponentRewrite,
    ordering: TechOrdering,
}

impl SeriesTransform {
    pub fn new(ordering: TechOrdering) -> Self {
        Self {
            unit_divisor: 1.0,
            size_class_filter: true,
            rewrite: ComponentRewrite::default(),
            ordering,
        }
    }

    /// Transform for a configured chart; the emissions chart orders by
    /// lifecycle component, the others by technology.
    pub fn from_config(config: &ChartConfig) -> Self {
        let ordering = match config.metric {
            Metric::Thg => TechOrdering::lifecycle(),
            Metric::Bestand | Metric::Kosten => TechOrdering::technology(),
        };
        Self::new(ordering)
            .with_unit_divisor(config.unit_divisor)
            .with_size_class_filter(config.size_class_filter)
            .with_rewrite(config.component_rewrite.clone())
    }

    pub fn with_unit_divisor(mut self, divisor: f64) -> Self {
        self.unit_divisor = divisor;
        self
    }

    pub fn with_size_class_filter(mut self, enabled: bool) -> Self {
        self.size_class_filter = enabled;
        self
    }

    pub fn with_rewrite(mut self, rewrite: ComponentRewrite) -> Self {
        self.rewrite = rewrite;
        self
    }

    pub fn ordering(&self) -> &TechOrdering {
        &self.ordering
    }

    pub fn unit_divisor(&self) -> f64 {
        self.unit_divisor
    }

    fn scaled(&self, value: f64) -> f64 {
        let v = value / self.unit_divisor;
        if v.is_finite() {
            v
        } else {
            0.0
        }
    }

    /// Category after the component rewrite; `None` drops the row.
    fn category<'r>(&self, row: &'r Row) -> Option<Cow<'r, str>> {
        match row {
            Row::Component(r) if !self.rewrite.is_empty() => {
                self.rewrite.apply(&r.component).map(Cow::Owned)
            }
            _ => Some(Cow::Borrowed(row.category())),
        }
    }

    pub fn transform(&self, rows: &[Row], selection: &Selection) -> ChartData {
        let mut picked: Vec<(&Row, Cow<'_, str>)> = rows
            .iter()
            .filter(|r| r.scenario() == selection.scenario)
            .filter_map(|r| self.category(r).map(|c| (r, c)))
            .collect();

        let Some(shape) = picked.first().map(|(r, _)| r.shape()) else {
            return ChartData::empty();
        };
        let before = picked.len();
        picked.retain(|(r, _)| r.shape() == shape);
        if picked.len() != before {
            debug!(
                "dropped {} rows whose shape differs from {:?}",
                before - picked.len(),
                shape
            );
        }

        let sizes = &selection.size_classes;
        let size_classed = shape == RowShape::SizeClassed;
        if size_classed && self.size_class_filter && !sizes.is_all() {
            picked.retain(|(r, _)| r.size_class().is_some_and(|c| sizes.includes(c)));
        }

        let years = distinct_years(picked.iter().map(|(r, _)| *r));
        // without filtering the selection does not name the series
        let suffixed = size_classed && self.size_class_filter && sizes.is_multi_specific();

        let mut cells: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (row, category) in &picked {
            let name = match row.size_class() {
                Some(class) if suffixed => format!("{category} {class}"),
                _ => category.to_string(),
            };
            let values = cells
                .entry(name)
                .or_insert_with(|| vec![0.0; years.len()]);
            if let Ok(idx) = years.binary_search(&row.year()) {
                values[idx] += self.scaled(row.value());
            }
        }

        let mut datasets: Vec<Series> = cells
            .into_iter()
            .map(|(name, values)| Series { name, values })
            .collect();
        self.ordering.sort_series(&mut datasets);
        datasets.retain(|s| {
            let keep = !s.is_all_zero();
            if !keep {
                debug!("dropping all-zero series \"{}\"", s.name);
            }
            keep
        });

        // labels survive even when every series was dropped
        ChartData::new(years.iter().map(Year::to_string).collect(), datasets)
    }
}

/// Reference line (one point per year, ascending) in chart units.
pub fn reference_line(
    points: &[ReferencePoint],
    name: impl Into<String>,
    unit_divisor: f64,
) -> LineChartData {
    let mut sorted: Vec<&ReferencePoint> = points.iter().collect();
    sorted.sort_by_key(|p| p.year);
    let points = sorted
        .into_iter()
        .map(|p| {
            let y = p.value.to_f64() / unit_divisor;
            let y = if y.is_finite() { y } else { 0.0 };
            LinePoint {
                x: f64::from(p.year),
                y,
                label: Some(p.year.to_string()),
                value: Some(y),
            }
        })
        .collect();
    LineChartData {
        datasets: vec![LineSeries {
            name: name.into(),
            points,
        }],
    }
}

/// Draw bar series as lines: numeric labels become x coordinates, other
/// labels fall back to their position.
pub fn series_to_lines(data: &ChartData) -> LineChartData {
    let xs: Vec<f64> = data
        .labels
        .iter()
        .enumerate()
        .map(|(i, l)| l.trim().parse::<f64>().unwrap_or(i as f64))
        .collect();
    let datasets = data
        .datasets
        .iter()
        .map(|s| LineSeries {
            name: s.name.clone(),
            points: s
                .values
                .iter()
                .zip(xs.iter().zip(&data.labels))
                .map(|(&y, (&x, label))| LinePoint {
                    x,
                    y,
                    label: Some(label.clone()),
                    value: Some(y),
                })
                .collect(),
        })
        .collect();
    LineChartData { datasets }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{RawValue, SizeClassSelection, ALL_SIZE_CLASSES};

    fn mk_sized(scenario: &str, class: &str, tech: &str, year: Year, value: &str) -> Row {
        Row::size_classed(scenario, class, tech, year, value)
    }

    fn mk_selection(scenario: &str, classes: &[&str]) -> Selection {
        Selection::new(scenario, SizeClassSelection::from_classes(classes.iter().copied()))
    }

    fn tech_transform() -> SeriesTransform {
        SeriesTransform::new(TechOrdering::technology())
    }

    #[test]
    fn single_year_orders_diesel_before_bev() {
        let rows = vec![
            mk_sized("1", "all", "BEV", 2025, "100"),
            mk_sized("1", "all", "Diesel", 2025, "50"),
        ];
        let data = tech_transform().transform(&rows, &mk_selection("1", &[ALL_SIZE_CLASSES]));
        assert_eq!(data.labels, ["2025"]);
        assert_eq!(
            data.datasets,
            vec![Series::new("Diesel", vec![50.0]), Series::new("BEV", vec![100.0])]
        );
    }

    #[test]
    fn filters_scenario_and_sums_cells() {
        let rows = vec![
            mk_sized("1", "Lastzüge", "BEV", 2030, "1,5"),
            mk_sized("1", "Sattelzüge", "BEV", 2030, "2,5"),
            mk_sized("1", "Lastzüge", "BEV", 2025, "1"),
            mk_sized("2", "Lastzüge", "BEV", 2040, "99"),
        ];
        let data = tech_transform().transform(&rows, &Selection::default());
        assert_eq!(data.labels, ["2025", "2030"]);
        assert_eq!(data.datasets, vec![Series::new("BEV", vec![1.0, 4.0])]);
        data.check_lengths().unwrap();
    }

    #[test]
    fn multi_class_selection_suffixes_names() {
        let rows = vec![
            mk_sized("1", "A", "BEV", 2025, "1"),
            mk_sized("1", "B", "BEV", 2025, "2"),
            mk_sized("1", "B", "BEV", 2025, "3"),
            mk_sized("1", "C", "BEV", 2025, "4"),
        ];
        let data = tech_transform().transform(&rows, &mk_selection("1", &["A", "B"]));
        assert_eq!(
            data.datasets,
            vec![Series::new("BEV A", vec![1.0]), Series::new("BEV B", vec![5.0])]
        );

        let all = tech_transform().transform(&rows, &mk_selection("1", &[ALL_SIZE_CLASSES]));
        assert_eq!(all.datasets, vec![Series::new("BEV", vec![10.0])]);

        let mixed =
            tech_transform().transform(&rows, &mk_selection("1", &[ALL_SIZE_CLASSES, "A"]));
        assert_eq!(mixed, all);

        let single = tech_transform().transform(&rows, &mk_selection("1", &["C"]));
        assert_eq!(single.datasets, vec![Series::new("BEV", vec![4.0])]);
    }

    #[test]
    fn disabled_filter_keeps_all_classes() {
        let rows = vec![
            mk_sized("1", "A", "FCEV", 2025, "1"),
            mk_sized("1", "C", "FCEV", 2025, "4"),
        ];
        let t = tech_transform().with_size_class_filter(false);
        let data = t.transform(&rows, &mk_selection("1", &["A"]));
        assert_eq!(data.datasets, vec![Series::new("FCEV", vec![5.0])]);
    }

    #[test]
    fn disabled_filter_never_suffixes() {
        let rows = vec![
            mk_sized("1", "A", "BEV", 2025, "1"),
            mk_sized("1", "B", "BEV", 2025, "2"),
            mk_sized("1", "C", "BEV", 2025, "4"),
        ];
        let t = tech_transform().with_size_class_filter(false);
        let data = t.transform(&rows, &mk_selection("1", &["A", "B"]));
        assert_eq!(data.series_names().collect::<Vec<_>>(), ["BEV"]);
        assert_eq!(data.datasets[0].values, vec![7.0]);
    }

    #[test]
    fn zero_series_are_dropped_and_empty_is_neutral() {
        let rows = vec![
            mk_sized("1", "A", "BEV", 2025, "0"),
            mk_sized("1", "A", "BEV", 2030, "kaputt"),
            mk_sized("1", "A", "Diesel", 2030, "3"),
        ];
        let data = tech_transform().transform(&rows, &Selection::default());
        assert_eq!(data.series_names().collect::<Vec<_>>(), ["Diesel"]);
        assert_eq!(data.datasets[0].values, vec![0.0, 3.0]);

        let empty = tech_transform().transform(&rows, &mk_selection("7", &[]));
        assert_eq!(empty, ChartData::empty());

        let zeros = vec![mk_sized("1", "A", "BEV", 2025, "0")];
        let data = tech_transform().transform(&zeros, &Selection::default());
        assert!(data.is_empty());
        assert_eq!(data.labels, ["2025"]);
        assert!(data.datasets.is_empty());
    }

    #[test]
    fn component_rows_are_rewritten_and_scaled() {
        let cfg = ChartConfig::thg().with_unit(1_000.0, "in kt");
        let t = SeriesTransform::from_config(&cfg);
        let rows = vec![
            Row::component("1", "Energie BEV", 2025, "2000"),
            Row::component("1", "Fahrzeug BEV", 2025, 1000.0),
            Row::component("1", "Infrastruktur FCEV", 2025, 5000.0),
            Row::component("1", "Wartung BEV", 2025, 500.0),
        ];
        let data = t.transform(&rows, &mk_selection("1", &["Lastzüge", "Sattelzüge"]));
        assert_eq!(
            data.series_names().collect::<Vec<_>>(),
            ["Fahrzeug BEV", "Energie_WTT BEV", "Wartung BEV"]
        );
        assert_eq!(data.datasets[1].values, vec![2.0]);
    }

    #[test]
    fn rows_of_other_shape_are_skipped() {
        let rows = vec![
            mk_sized("1", "A", "BEV", 2025, "1"),
            Row::component("1", "Wartung BEV", 2030, 7.0),
        ];
        let data = tech_transform().transform(&rows, &Selection::default());
        assert_eq!(data.labels, ["2025"]);
        assert_eq!(data.datasets, vec![Series::new("BEV", vec![1.0])]);
    }

    #[test]
    fn transform_is_repeatable() {
        let rows = vec![
            mk_sized("1", "A", "OL-BEV", 2025, "1"),
            mk_sized("1", "B", "BWS-BEV", 2030, "2"),
            mk_sized("1", "A", "Diesel", 2035, "3"),
        ];
        let t = tech_transform();
        let sel = mk_selection("1", &["A", "B"]);
        assert_eq!(t.transform(&rows, &sel), t.transform(&rows, &sel));
    }

    #[test]
    fn reference_points_become_sorted_line() {
        let points = vec![
            ReferencePoint {
                year: 2030,
                value: RawValue::Number(2.0e9),
            },
            ReferencePoint {
                year: 2025,
                value: RawValue::from("1000000000"),
            },
        ];
        let line = reference_line(&points, "Keine Antriebswende", 1e9);
        let pts = &line.datasets[0].points;
        assert_eq!(pts[0].x, 2025.0);
        assert_eq!(pts[0].y, 1.0);
        assert_eq!(pts[1].label.as_deref(), Some("2030"));
    }

    #[test]
    fn series_convert_to_lines() {
        let data = ChartData::new(
            vec!["2025".into(), "2030".into()],
            vec![Series::new("BEV", vec![1.0, 2.0])],
        );
        let lines = series_to_lines(&data);
        assert_eq!(lines.datasets[0].points[1].x, 2030.0);
        assert_eq!(lines.datasets[0].points[1].y, 2.0);
    }
}
