//! Chart data engine: turns fleet rows into ordered, coloured, scaled chart views.

use fleet_core::{ChartDataError, ConfigError};
use thiserror::Error;

pub mod assemble;
pub mod color;
pub mod ordering;
pub mod pattern;
pub mod pipeline;
pub mod scale;
pub mod transform;

pub use assemble::{
    AssemblerOptions, ChartAssembler, ChartView, ColoredSeries, LegendItem, LegendKind,
    PlottedLine, PlottedPoint, Segment, StackedColumn,
};
pub use color::{Abbreviation, ColorResolver, ColorRule, ColorTable, SERIES_PALETTE, UNKNOWN_COLOR};
pub use ordering::{natural_cmp, OrderRule, TechOrdering, UNRANKED};
pub use pattern::Pattern;
pub use pipeline::ChartPipeline;
pub use scale::{
    compute_max_value, compute_scale, compute_ticks, max_of_data, max_of_lines, nice_ceil,
    round_up_few_sig_digits, stacked_totals,
};
pub use transform::{reference_line, series_to_lines, SeriesTransform};

#[derive(Error, Debug)]
pub enum ChartError {
    #[error(transparent)]
    Data(#[from] ChartDataError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("rule {later} is unreachable for its own sample, {earlier} matches first")]
    ShadowedRule { earlier: String, later: String },
    #[error("invalid rule table: {0}")]
    InvalidRules(String),
}
