//! Telemetry sink for the barter simulation engine.
//!
//! The engine emits `tracing` events whose `target:` names a telemetry
//! table (`tick_states`, `agent_state`, `resource_state`, `trade`,
//! `pairing`, `preference`). This crate provides the collecting
//! subscriber: each event becomes a row, each field a typed column, and
//! the schema emerges from what was recorded. Tests drain the collected
//! tables to assert on telemetry streams; runs can be exported to parquet
//! for offline analysis.
//!
//! # Usage
//!
//! ```ignore
//! // In engine code:
//! tracing::info!(target: "trade", tick, buyer_id, seller_id, da, db, price);
//!
//! // In a test:
//! let log = instrument::capture(|| {
//!     // ... run simulation ...
//! });
//! assert_eq!(log.table("trade").unwrap().rows(), 4);
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Record};
use tracing::{Event, Id, Metadata, Subscriber};

// === TABLES ===

/// A single typed column of event field values.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    U64(Vec<u64>),
    I64(Vec<i64>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::U64(v) => v.len(),
            Column::I64(v) => v.len(),
            Column::F64(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pad_to(&mut self, len: usize) {
        match self {
            Column::U64(v) => v.resize(len, 0),
            Column::I64(v) => v.resize(len, 0),
            Column::F64(v) => v.resize(len, 0.0),
            Column::Bool(v) => v.resize(len, false),
            Column::Str(v) => v.resize(len, String::new()),
        }
    }
}

/// One telemetry table: a row per event, columns keyed by field name.
/// BTreeMap keys keep column order stable so two identical runs produce
/// identical tables, column for column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: BTreeMap<String, Column>,
    row_count: usize,
}

impl Table {
    pub fn rows(&self) -> usize {
        self.row_count
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn u64s(&self, name: &str) -> &[u64] {
        match self.columns.get(name) {
            Some(Column::U64(v)) => v,
            _ => &[],
        }
    }

    pub fn i64s(&self, name: &str) -> &[i64] {
        match self.columns.get(name) {
            Some(Column::I64(v)) => v,
            _ => &[],
        }
    }

    pub fn f64s(&self, name: &str) -> &[f64] {
        match self.columns.get(name) {
            Some(Column::F64(v)) => v,
            _ => &[],
        }
    }

    pub fn strs(&self, name: &str) -> &[String] {
        match self.columns.get(name) {
            Some(Column::Str(v)) => v,
            _ => &[],
        }
    }

    /// Align every column to the current row count; sparse fields are
    /// padded with the column default.
    fn align(&mut self) {
        for column in self.columns.values_mut() {
            if column.len() < self.row_count {
                column.pad_to(self.row_count);
            }
        }
    }
}

/// All tables collected from one run, keyed by tracing target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryLog {
    pub tables: BTreeMap<String, Table>,
}

impl TelemetryLog {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Row count of a table, zero when it never recorded.
    pub fn rows(&self, name: &str) -> usize {
        self.table(name).map_or(0, Table::rows)
    }
}

thread_local! {
    static LOG: RefCell<TelemetryLog> = RefCell::default();
}

// === COLLECTION ===

struct FieldVisitor<'a> {
    table: &'a mut Table,
    prior_rows: usize,
}

impl FieldVisitor<'_> {
    fn push<T>(
        &mut self,
        field: &Field,
        value: T,
        make: impl FnOnce(Vec<T>) -> Column,
        get: impl FnOnce(&mut Column) -> Option<&mut Vec<T>>,
    ) where
        T: Default + Clone,
    {
        let prior = self.prior_rows;
        let column = self
            .table
            .columns
            .entry(field.name().to_string())
            .or_insert_with(|| {
                // New column mid-run: pre-pad for every earlier row.
                make(vec![T::default(); prior])
            });
        if let Some(values) = get(column) {
            values.push(value);
        }
    }
}

impl Visit for FieldVisitor<'_> {
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value, Column::U64, |c| match c {
            Column::U64(v) => Some(v),
            _ => None,
        });
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, value, Column::I64, |c| match c {
            Column::I64(v) => Some(v),
            _ => None,
        });
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, value, Column::F64, |c| match c {
            Column::F64(v) => Some(v),
            _ => None,
        });
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value, Column::Bool, |c| match c {
            Column::Bool(v) => Some(v),
            _ => None,
        });
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string(), Column::Str, |c| match c {
            Column::Str(v) => Some(v),
            _ => None,
        });
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_str(field, &format!("{:?}", value));
    }
}

/// Subscriber that turns info-level events into telemetry table rows.
pub struct TelemetrySubscriber;

impl Subscriber for TelemetrySubscriber {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.is_event() && *metadata.level() <= tracing::Level::INFO
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        Id::from_u64(1)
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let target = event.metadata().target().to_string();
        LOG.with(|log| {
            let mut log = log.borrow_mut();
            let table = log.tables.entry(target).or_default();
            table.align();
            let prior_rows = table.row_count;
            event.record(&mut FieldVisitor { table, prior_rows });
            table.row_count += 1;
            table.align();
        });
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}

/// Install the collecting subscriber as the global default. Call once at
/// the start of a headless run.
pub fn install() {
    let _ = tracing::subscriber::set_global_default(TelemetrySubscriber);
}

/// Take everything recorded on this thread so far.
pub fn drain() -> TelemetryLog {
    LOG.with(|log| std::mem::take(&mut *log.borrow_mut()))
}

/// Discard everything recorded on this thread so far.
pub fn clear() {
    LOG.with(|log| *log.borrow_mut() = TelemetryLog::default());
}

/// Run `f` with the collecting subscriber scoped to this thread and
/// return the telemetry it produced. The tool of choice in tests: no
/// global-subscriber contention between test cases.
pub fn capture(f: impl FnOnce()) -> TelemetryLog {
    clear();
    tracing::subscriber::with_default(TelemetrySubscriber, f);
    drain()
}

// === POLARS EXPORT ===

use polars::prelude::*;

impl Table {
    /// Convert to a polars DataFrame for analysis.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let columns: Vec<polars::prelude::Column> = self
            .columns
            .iter()
            .map(|(name, column)| match column {
                Column::U64(v) => polars::prelude::Column::new(name.into(), v),
                Column::I64(v) => polars::prelude::Column::new(name.into(), v),
                Column::F64(v) => polars::prelude::Column::new(name.into(), v),
                Column::Bool(v) => polars::prelude::Column::new(name.into(), v),
                Column::Str(v) => polars::prelude::Column::new(name.into(), v),
            })
            .collect();
        DataFrame::new(columns)
    }
}

impl TelemetryLog {
    pub fn to_dataframes(&self) -> BTreeMap<String, DataFrame> {
        self.tables
            .iter()
            .filter_map(|(name, table)| table.to_dataframe().ok().map(|df| (name.clone(), df)))
            .collect()
    }

    /// Write every table as `{dir}/{name}.parquet`, plus a `_ready`
    /// sentinel once all files are complete.
    pub fn save_parquet(&self, dir: &std::path::Path) -> PolarsResult<()> {
        std::fs::create_dir_all(dir).map_err(|e| PolarsError::IO {
            error: e.into(),
            msg: None,
        })?;
        for (name, mut df) in self.to_dataframes() {
            let file =
                std::fs::File::create(dir.join(format!("{name}.parquet"))).map_err(|e| {
                    PolarsError::IO {
                        error: e.into(),
                        msg: None,
                    }
                })?;
            ParquetWriter::new(file).finish(&mut df)?;
        }
        std::fs::File::create(dir.join("_ready")).map_err(|e| PolarsError::IO {
            error: e.into(),
            msg: None,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_builds_typed_columns() {
        let log = capture(|| {
            tracing::info!(target: "trade", tick = 1u64, price = 1.5f64, direction = "seller_gives_a");
            tracing::info!(target: "trade", tick = 2u64, price = 2.5f64, direction = "seller_gives_a");
        });

        let trades = log.table("trade").expect("trade table");
        assert_eq!(trades.rows(), 2);
        assert_eq!(trades.u64s("tick"), &[1, 2]);
        assert_eq!(trades.f64s("price"), &[1.5, 2.5]);
        assert_eq!(trades.strs("direction")[0], "seller_gives_a");
    }

    #[test]
    fn sparse_fields_are_padded() {
        let log = capture(|| {
            tracing::info!(target: "pairing", tick = 1u64, reason = "matched");
            tracing::info!(target: "pairing", tick = 2u64, reason = "matched", surplus_a = 0.5f64);
            tracing::info!(target: "pairing", tick = 3u64, reason = "trade_failed");
        });

        let pairings = log.table("pairing").expect("pairing table");
        assert_eq!(pairings.rows(), 3);
        // surplus_a appeared late and vanished again: padded both sides.
        assert_eq!(pairings.f64s("surplus_a"), &[0.0, 0.5, 0.0]);
    }

    #[test]
    fn identical_runs_produce_identical_logs() {
        let emit = || {
            tracing::info!(target: "tick_states", tick = 0u64, current_mode = "trade");
            tracing::info!(target: "agent_state", tick = 0u64, agent_id = 0u32, inventory_a = 10.0);
        };
        let first = capture(emit);
        let second = capture(emit);
        assert_eq!(first, second);
    }

    #[test]
    fn dataframe_roundtrip_keeps_row_counts() {
        let log = capture(|| {
            for tick in 0..5u64 {
                tracing::info!(target: "tick_states", tick = tick, current_mode = "both");
            }
        });
        let dfs = log.to_dataframes();
        assert_eq!(dfs["tick_states"].height(), 5);
    }
}
