use serde::{Deserialize, Serialize};

use fleet_core::{ChartData, LineChartData, Scale, ScaleInputs};

use crate::color::ColorResolver;
use crate::ordering::TechOrdering;
use crate::scale::{compute_scale, max_of_data, max_of_lines, stacked_totals};
use crate::ChartError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegendKind {
    Box,
    Line,
    DashedLine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendItem {
    pub name: String,
    pub color: String,
    pub kind: LegendKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColoredSeries {
    pub name: String,
    pub color: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub color: String,
    pub value: f64,
}

/// One stacked bar: segments bottom to top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackedColumn {
    pub label: String,
    pub total: f64,
    pub segments: Vec<Segment>,
}

/// Line point placed in plot space: percentages from the left and from the
/// top edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlottedPoint {
    pub x_pct: f64,
    pub y_pct: f64,
    pub x: f64,
    pub y: f64,
    pub label: Option<String>,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlottedLine {
    pub name: String,
    pub color: String,
    pub kind: LegendKind,
    pub points: Vec<PlottedPoint>,
}

/// Render-ready chart: everything a drawing surface needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartView {
    pub labels: Vec<String>,
    pub datasets: Vec<ColoredSeries>,
    pub columns: Vec<StackedColumn>,
    pub scale: Scale,
    pub legend_groups: Vec<Vec<LegendItem>>,
    pub lines: Vec<PlottedLine>,
}

impl ChartView {
    /// Nothing to draw; the scale is still a valid axis.
    pub fn empty(inputs: &ScaleInputs) -> Self {
        Self {
            labels: Vec::new(),
            datasets: Vec::new(),
            columns: Vec::new(),
            scale: compute_scale(0.0, inputs),
            legend_groups: Vec::new(),
            lines: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty() && self.lines.iter().all(|l| l.points.is_empty())
    }

    pub fn legend_items(&self) -> impl Iterator<Item = &LegendItem> {
        self.legend_groups.iter().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerOptions {
    pub scale: ScaleInputs,
    /// Size the axis by column totals rather than the largest single value.
    pub use_stacked_max: bool,
    /// Unmatched series take a palette colour by position instead of the
    /// unknown sentinel.
    pub palette_fallback: bool,
    pub line_kind: LegendKind,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            scale: ScaleInputs::default(),
            use_stacked_max: true,
            palette_fallback: true,
            line_kind: LegendKind::DashedLine,
        }
    }
}

impl AssemblerOptions {
    pub fn with_scale(mut self, scale: ScaleInputs) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_stacked_max(mut self, enabled: bool) -> Self {
        self.use_stacked_max = enabled;
        self
    }

    pub fn with_palette_fallback(mut self, enabled: bool) -> Self {
        self.palette_fallback = enabled;
        self
    }

    pub fn with_line_kind(mut self, kind: LegendKind) -> Self {
        self.line_kind = kind;
        self
    }
}

/// Combines bar data and optional line overlays into one [`ChartView`] with a
/// shared scale.
#[derive(Debug, Clone)]
pub struct ChartAssembler {
    colors: ColorResolver,
    ordering: TechOrdering,
    options: AssemblerOptions,
}

impl ChartAssembler {
    pub fn new(colors: ColorResolver, ordering: TechOrdering) -> Self {
        Self {
            colors,
            ordering,
            options: AssemblerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AssemblerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &AssemblerOptions {
        &self.options
    }

    fn fallback(&self, idx: usize) -> Option<usize> {
        self.options.palette_fallback.then_some(idx)
    }

    /// Bars must be length-consistent; that is checked before anything is
    /// scaled. Empty bars without line points give [`ChartView::empty`].
    pub fn assemble(
        &self,
        bars: &ChartData,
        lines: Option<&LineChartData>,
    ) -> Result<ChartView, ChartError> {
        bars.check_lengths()?;

        let lines = lines.filter(|l| !l.is_empty());
        let has_bars = !bars.is_empty();
        if !has_bars && lines.is_none() {
            return Ok(ChartView::empty(&self.options.scale));
        }

        let bar_max = if !has_bars {
            0.0
        } else if self.options.use_stacked_max {
            stacked_totals(bars).into_iter().fold(0.0, f64::max)
        } else {
            max_of_data(bars)
        };
        let line_max = lines.map(max_of_lines).unwrap_or(0.0);
        let scale = compute_scale(bar_max.max(line_max), &self.options.scale);

        let datasets: Vec<ColoredSeries> = if has_bars {
            bars.datasets
                .iter()
                .enumerate()
                .map(|(i, s)| ColoredSeries {
                    name: s.name.clone(),
                    color: self.colors.color_for(&s.name, self.fallback(i)).to_string(),
                    values: s.values.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };
        let labels = if has_bars {
            bars.labels.clone()
        } else {
            Vec::new()
        };
        let columns = stack_columns(&labels, &datasets);

        let plotted = lines
            .map(|l| self.plot_lines(l, &scale))
            .unwrap_or_default();

        let mut legend_groups = self.legend_groups(&datasets);
        if !plotted.is_empty() {
            legend_groups.push(
                plotted
                    .iter()
                    .map(|l| LegendItem {
                        name: l.name.clone(),
                        color: l.color.clone(),
                        kind: l.kind,
                    })
                    .collect(),
            );
        }

        Ok(ChartView {
            labels,
            datasets,
            columns,
            scale,
            legend_groups,
            lines: plotted,
        })
    }

    /// Legend reads from the top of the stack down; consecutive entries with
    /// the same legend rank share a group.
    fn legend_groups(&self, datasets: &[ColoredSeries]) -> Vec<Vec<LegendItem>> {
        let mut groups: Vec<Vec<LegendItem>> = Vec::new();
        let mut current_rank = None;
        for s in datasets.iter().rev() {
            let rank = self.ordering.legend_order(&s.name);
            let item = LegendItem {
                name: s.name.clone(),
                color: s.color.clone(),
                kind: LegendKind::Box,
            };
            match groups.last_mut() {
                Some(group) if current_rank == Some(rank) => group.push(item),
                _ => groups.push(vec![item]),
            }
            current_rank = Some(rank);
        }
        groups
    }

    fn plot_lines(&self, lines: &LineChartData, scale: &Scale) -> Vec<PlottedLine> {
        let extent = lines.x_extent().unwrap_or((0.0, 0.0));
        let min_x = self.options.scale.min_x.unwrap_or(extent.0);
        let max_x = self.options.scale.max_x.unwrap_or(extent.1);
        let range = max_x - min_x;

        lines
            .datasets
            .iter()
            .enumerate()
            .map(|(i, ds)| PlottedLine {
                name: ds.name.clone(),
                color: self.colors.color_for(&ds.name, self.fallback(i)).to_string(),
                kind: self.options.line_kind,
                points: ds
                    .points
                    .iter()
                    .map(|p| PlottedPoint {
                        x_pct: if range > 0.0 {
                            (p.x - min_x) / range * 100.0
                        } else {
                            50.0
                        },
                        y_pct: 100.0 - p.y / scale.max_value * 100.0,
                        x: p.x,
                        y: p.y,
                        label: p.label.clone(),
                        value: p.value,
                    })
                    .collect(),
            })
            .collect()
    }
}

fn stack_columns(labels: &[String], datasets: &[ColoredSeries]) -> Vec<StackedColumn> {
    labels
        .iter()
        .enumerate()
        .map(|(idx, label)| {
            let segments: Vec<Segment> = datasets
                .iter()
                .map(|s| {
                    let v = s.values.get(idx).copied().unwrap_or(0.0);
                    Segment {
                        name: s.name.clone(),
                        color: s.color.clone(),
                        value: if v.is_finite() { v } else { 0.0 },
                    }
                })
                .collect();
            StackedColumn {
                label: label.clone(),
                total: segments.iter().map(|s| s.value).sum(),
                segments,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{SERIES_PALETTE, UNKNOWN_COLOR};
    use fleet_core::{ChartDataError, LinePoint, LineSeries, Series};

    fn mk_assembler() -> ChartAssembler {
        ChartAssembler::new(ColorResolver::standard().unwrap(), TechOrdering::technology())
    }

    fn mk_bars(labels: &[&str], series: &[(&str, &[f64])]) -> ChartData {
        ChartData::new(
            labels.iter().map(|l| l.to_string()).collect(),
            series
                .iter()
                .map(|(n, v)| Series::new(*n, v.to_vec()))
                .collect(),
        )
    }

    fn mk_line(name: &str, pts: &[(f64, f64)]) -> LineChartData {
        LineChartData {
            datasets: vec![LineSeries {
                name: name.to_string(),
                points: pts.iter().map(|(x, y)| LinePoint::new(*x, *y)).collect(),
            }],
        }
    }

    #[test]
    fn scale_uses_stacked_totals() {
        let bars = mk_bars(&["2025"], &[("Diesel", &[50.0]), ("BEV", &[100.0])]);
        let view = mk_assembler().assemble(&bars, None).unwrap();
        assert_eq!(view.scale.max_value, 150.0);
        assert_eq!(view.scale.ticks, vec![0.0, 50.0, 100.0, 150.0, 200.0]);
        assert_eq!(view.columns[0].total, 150.0);
        assert_eq!(view.columns[0].segments[0].name, "Diesel");

        let raw = mk_assembler()
            .with_options(AssemblerOptions::default().with_stacked_max(false))
            .assemble(&bars, None)
            .unwrap();
        assert_eq!(raw.scale.max_value, 100.0);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let bars = mk_bars(&["2025", "2030"], &[("BEV", &[1.0])]);
        let err = mk_assembler().assemble(&bars, None).unwrap_err();
        assert!(matches!(
            err,
            ChartError::Data(ChartDataError::LengthMismatch { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn empty_input_is_terminal() {
        let asm = mk_assembler();
        let view = asm.assemble(&ChartData::empty(), None).unwrap();
        assert!(view.is_empty());
        assert!(view.legend_groups.is_empty());
        assert!(view.scale.max_value > 0.0);

        let labels_only = mk_bars(&["2025"], &[]);
        assert!(asm.assemble(&labels_only, None).unwrap().is_empty());

        let no_points = LineChartData::default();
        assert!(asm.assemble(&ChartData::empty(), Some(&no_points)).unwrap().is_empty());
    }

    #[test]
    fn legend_groups_follow_reversed_stack() {
        let bars = mk_bars(
            &["2025"],
            &[
                ("Diesel A", &[1.0]),
                ("Diesel B", &[1.0]),
                ("BEV A", &[1.0]),
                ("BEV B", &[1.0]),
            ],
        );
        let view = mk_assembler().assemble(&bars, None).unwrap();
        let names: Vec<Vec<&str>> = view
            .legend_groups
            .iter()
            .map(|g| g.iter().map(|i| i.name.as_str()).collect())
            .collect();
        assert_eq!(names, vec![vec!["BEV B", "BEV A"], vec!["Diesel B", "Diesel A"]]);
        assert!(view.legend_items().all(|i| i.kind == LegendKind::Box));
    }

    #[test]
    fn lines_share_scale_and_get_own_group() {
        let bars = mk_bars(&["2025", "2030"], &[("BEV", &[10.0, 20.0])]);
        let line = mk_line("Referenz", &[(2025.0, 30.0), (2030.0, 45.0)]);
        let view = mk_assembler().assemble(&bars, Some(&line)).unwrap();
        assert_eq!(view.scale.max_value, 50.0);

        let pts = &view.lines[0].points;
        assert_eq!(pts[0].x_pct, 0.0);
        assert_eq!(pts[1].x_pct, 100.0);
        assert_eq!(pts[0].y_pct, 40.0);

        let last = view.legend_groups.last().unwrap();
        assert_eq!(last[0].name, "Referenz");
        assert_eq!(last[0].kind, LegendKind::DashedLine);
        assert_eq!(last[0].color, SERIES_PALETTE[0]);
    }

    #[test]
    fn single_x_centres_and_range_override_applies() {
        let line = mk_line("Ref", &[(2030.0, 1.0)]);
        let view = mk_assembler().assemble(&ChartData::empty(), Some(&line)).unwrap();
        assert_eq!(view.lines[0].points[0].x_pct, 50.0);
        assert!(view.labels.is_empty());

        let opts = AssemblerOptions::default()
            .with_scale(ScaleInputs::default().with_x_range(2020.0, 2040.0));
        let view = mk_assembler()
            .with_options(opts)
            .assemble(&ChartData::empty(), Some(&line))
            .unwrap();
        assert_eq!(view.lines[0].points[0].x_pct, 50.0);
        let early = mk_line("Ref", &[(2025.0, 1.0)]);
        let opts = AssemblerOptions::default()
            .with_scale(ScaleInputs::default().with_x_range(2020.0, 2040.0));
        let view = mk_assembler()
            .with_options(opts)
            .assemble(&ChartData::empty(), Some(&early))
            .unwrap();
        assert_eq!(view.lines[0].points[0].x_pct, 25.0);
    }

    #[test]
    fn unknown_series_colour_depends_on_fallback_option() {
        let bars = mk_bars(&["2025"], &[("Sonstige", &[1.0])]);
        let view = mk_assembler().assemble(&bars, None).unwrap();
        assert_eq!(view.datasets[0].color, SERIES_PALETTE[0]);

        let strict = mk_assembler()
            .with_options(AssemblerOptions::default().with_palette_fallback(false))
            .assemble(&bars, None)
            .unwrap();
        assert_eq!(strict.datasets[0].color, UNKNOWN_COLOR);
    }
}
