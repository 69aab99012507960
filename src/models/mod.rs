mod metric_record;
mod price_point;
mod report;

pub use metric_record::{MetricRecord, RecordError, RecordOutcome, TickerMetrics};
pub use price_point::{PricePoint, PriceSeries};
pub use report::{FilteredTable, Report, ResultTable, Thresholds};
