use log::error;

use fleet_core::{ChartConfig, ReferencePoint, Row, Selection};

use crate::assemble::{AssemblerOptions, ChartAssembler, ChartView};
use crate::color::ColorResolver;
use crate::transform::{reference_line, SeriesTransform};
use crate::ChartError;

const DEFAULT_REFERENCE_NAME: &str = "Keine Antriebswende";

/// One configured chart: rows and selection in, [`ChartView`] out. Holds no
/// state between calls, so every recompute starts from scratch.
#[derive(Debug, Clone)]
pub struct ChartPipeline {
    config: ChartConfig,
    transform: SeriesTransform,
    assembler: ChartAssembler,
    reference_name: String,
}

impl ChartPipeline {
    pub fn from_config(config: ChartConfig) -> Result<Self, ChartError> {
        config.validate()?;
        let transform = SeriesTransform::from_config(&config);
        let options = AssemblerOptions::default().with_scale(config.scale_inputs());
        let colors = ColorResolver::standard()?;
        let assembler =
            ChartAssembler::new(colors, transform.ordering().clone()).with_options(options);
        Ok(Self {
            config,
            transform,
            assembler,
            reference_name: DEFAULT_REFERENCE_NAME.to_string(),
        })
    }

    pub fn with_colors(mut self, colors: ColorResolver) -> Self {
        let options = self.assembler.options().clone();
        self.assembler =
            ChartAssembler::new(colors, self.transform.ordering().clone()).with_options(options);
        self
    }

    pub fn with_options(mut self, options: AssemblerOptions) -> Self {
        self.assembler = self.assembler.with_options(options);
        self
    }

    pub fn with_reference_name(mut self, name: impl Into<String>) -> Self {
        self.reference_name = name.into();
        self
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn recompute(
        &self,
        rows: &[Row],
        selection: &Selection,
        reference: Option<&[ReferencePoint]>,
    ) -> Result<ChartView, ChartError> {
        let bars = self.transform.transform(rows, selection);
        let line = reference
            .filter(|points| !points.is_empty())
            .map(|points| {
                reference_line(points, self.reference_name.as_str(), self.transform.unit_divisor())
            });
        self.assembler
            .assemble(&bars, line.as_ref())
            .inspect_err(|e| error!("chart \"{}\": recompute rejected: {e}", self.config.id))
    }
}
