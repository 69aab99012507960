use chrono::NaiveDate;

pub const ADJ_CLOSE: &str = "Adj Close";

/// A column label as delivered by a provider.
///
/// Some sources label every column with a single name, others with a
/// multi-level name such as `("Adj Close", "AAPL")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnLabel {
    Flat(String),
    Compound(Vec<String>),
}

impl ColumnLabel {
    /// Single-name form of the label.
    ///
    /// Compound parts that are empty or equal to `ticker` (case-insensitive)
    /// are dropped and the rest joined with a space.
    pub fn flattened(&self, ticker: &str) -> String {
        match self {
            ColumnLabel::Flat(name) => name.trim().to_string(),
            ColumnLabel::Compound(parts) => parts
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case(ticker))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PriceColumn {
    pub label: ColumnLabel,
    pub values: Vec<Option<f64>>,
}

/// Provider-neutral tabular price response: a date index plus labelled columns
/// aligned with it by position.
#[derive(Debug, Clone, Default)]
pub struct PriceFrame {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<PriceColumn>,
}

impl PriceFrame {
    pub fn new(dates: Vec<NaiveDate>) -> Self {
        Self { dates, columns: Vec::new() }
    }

    pub fn with_column(mut self, label: ColumnLabel, values: Vec<Option<f64>>) -> Self {
        self.columns.push(PriceColumn { label, values });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn has_compound_labels(&self) -> bool {
        self.columns
            .iter()
            .any(|c| matches!(c.label, ColumnLabel::Compound(_)))
    }

    /// Rewrite every label into its flat form.
    pub fn flatten_columns(&mut self, ticker: &str) {
        for column in &mut self.columns {
            if let ColumnLabel::Compound(_) = column.label {
                column.label = ColumnLabel::Flat(column.label.flattened(ticker));
            }
        }
    }

    /// Exact lookup by flat name. Compound labels never match; flatten first.
    pub fn column(&self, name: &str) -> Option<&PriceColumn> {
        self.columns.iter().find(|c| match &c.label {
            ColumnLabel::Flat(n) => n == name,
            ColumnLabel::Compound(_) => false,
        })
    }

    /// `(date, value)` pairs of a column, skipping rows where the value is missing.
    pub fn series(&self, name: &str) -> Option<Vec<(NaiveDate, f64)>> {
        let column = self.column(name)?;
        Some(
            self.dates
                .iter()
                .zip(column.values.iter())
                .filter_map(|(date, value)| value.map(|v| (*date, v)))
                .collect(),
        )
    }
}
