use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use chart_engine::{ChartError, ChartPipeline, ChartView};
use fleet_core::{ChartConfig, ReferencePoint, Row, RowShape, Selection, SizeClassSelection};
use log::{debug, warn};
use thiserror::Error;

pub mod decode;
pub mod source;

pub use decode::{decode_reference_points, decode_rows, parse_reference_csv};
pub use source::{DirSource, MemorySource, RowSource, REFERENCE_FILE};

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("invalid source json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("row {index}: {found:?} row in a file of {expected:?} rows")]
    MixedShapes {
        index: usize,
        expected: RowShape,
        found: RowShape,
    },
    #[error("row {index}: missing field {field}")]
    MissingField { index: usize, field: &'static str },
    #[error("row {index}: invalid year \"{value}\"")]
    InvalidYear { index: usize, value: String },
    #[error("invalid reference csv: {0}")]
    InvalidCsv(String),
    #[error("unreadable reference csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("no data for {0}")]
    UnknownSource(String),
}

/// Selection changes coming from the scenario and size-class pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionEvent {
    ScenarioChanged(String),
    /// Selector click on one entry, sentinel included.
    SizeClassToggled(String),
    SizeClassesReplaced(Vec<String>),
    /// Back to scenario 1 with all size classes.
    Reset,
}

impl SelectionEvent {
    pub fn apply(self, selection: &mut Selection) {
        match self {
            SelectionEvent::ScenarioChanged(id) => selection.scenario = id,
            SelectionEvent::SizeClassToggled(class) => selection.size_classes.toggle(&class),
            SelectionEvent::SizeClassesReplaced(classes) => {
                selection.size_classes = SizeClassSelection::from_classes(classes)
            }
            SelectionEvent::Reset => *selection = Selection::default(),
        }
    }
}

/// Consumer interface for selection events.
pub trait SelectionSink {
    fn on_selection(&mut self, event: SelectionEvent);
}

/// Handle for one in-flight recompute. Only the newest ticket of a feed is
/// applied; older ones are discarded on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecomputeTicket {
    generation: u64,
    selection: Selection,
}

impl RecomputeTicket {
    pub fn selection(&self) -> &Selection {
        &self.selection
    }
}

/// Latest view of one chart, recomputed from scratch per selection.
#[derive(Debug, Clone)]
pub struct ChartFeed {
    pipeline: ChartPipeline,
    generation: u64,
    view: Option<ChartView>,
}

impl ChartFeed {
    pub fn new(pipeline: ChartPipeline) -> Self {
        Self {
            pipeline,
            generation: 0,
            view: None,
        }
    }

    pub fn from_config(config: ChartConfig) -> Result<Self, ChartError> {
        Ok(Self::new(ChartPipeline::from_config(config)?))
    }

    pub fn id(&self) -> &str {
        self.pipeline.id()
    }

    pub fn config(&self) -> &ChartConfig {
        self.pipeline.config()
    }

    pub fn view(&self) -> Option<&ChartView> {
        self.view.as_ref()
    }

    /// Start a recompute for `selection`; supersedes every earlier ticket.
    pub fn begin(&mut self, selection: &Selection) -> RecomputeTicket {
        self.generation += 1;
        RecomputeTicket {
            generation: self.generation,
            selection: selection.clone(),
        }
    }

    /// Finish a recompute with the loaded rows. Returns `Ok(false)` when the
    /// ticket was superseded. A failed load renders as an empty chart.
    pub fn complete<E: fmt::Display>(
        &mut self,
        ticket: RecomputeTicket,
        rows: Result<Vec<Row>, E>,
        reference: Option<Vec<ReferencePoint>>,
    ) -> Result<bool, ChartError> {
        if ticket.generation != self.generation {
            debug!(
                "chart \"{}\": discarding stale recompute {} (latest {})",
                self.id(),
                ticket.generation,
                self.generation
            );
            return Ok(false);
        }
        let rows = rows.unwrap_or_else(|e| {
            warn!("chart \"{}\": loading rows failed: {e}", self.id());
            Vec::new()
        });
        let view = self
            .pipeline
            .recompute(&rows, &ticket.selection, reference.as_deref())?;
        self.view = Some(view);
        Ok(true)
    }

    /// Load and recompute synchronously.
    pub fn refresh<S: RowSource>(
        &mut self,
        source: &S,
        selection: &Selection,
    ) -> Result<&ChartView, ChartError> {
        let ticket = self.begin(selection);
        let metric = self.config().metric;
        let rows = source.load_rows(metric);
        let reference = source.load_reference(metric).unwrap_or_else(|e| {
            warn!("chart \"{}\": loading reference line failed: {e}", self.id());
            None
        });
        self.complete(ticket, rows, reference)?;
        let view = self
            .view
            .get_or_insert_with(|| ChartView::empty(&Default::default()));
        Ok(&*view)
    }
}

/// All charts of the page, driven by one shared selection.
pub struct Dashboard<S> {
    source: S,
    selection: Selection,
    feeds: Vec<ChartFeed>,
}

impl<S: RowSource> Dashboard<S> {
    pub fn new(source: S, configs: Vec<ChartConfig>) -> Result<Self, ChartError> {
        let feeds = configs
            .into_iter()
            .map(ChartFeed::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source,
            selection: Selection::default(),
            feeds,
        })
    }

    /// The stock, cost and emissions charts.
    pub fn with_default_charts(source: S) -> Result<Self, ChartError> {
        Self::new(source, ChartConfig::defaults())
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn feeds(&self) -> &[ChartFeed] {
        &self.feeds
    }

    pub fn view(&self, id: &str) -> Option<&ChartView> {
        self.feeds
            .iter()
            .find(|f| f.id() == id)
            .and_then(ChartFeed::view)
    }

    /// Recompute every chart; stops at the first rejected recompute.
    pub fn refresh_all(&mut self) -> Result<(), ChartError> {
        for feed in &mut self.feeds {
            feed.refresh(&self.source, &self.selection)?;
        }
        Ok(())
    }
}

impl<S: RowSource> SelectionSink for Dashboard<S> {
    fn on_selection(&mut self, event: SelectionEvent) {
        event.apply(&mut self.selection);
        // rejections are logged by the pipeline
        let _ = self.refresh_all();
    }
}
