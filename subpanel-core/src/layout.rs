//! Widget layout and statistic discovery.
//!
//! A layout is a declarative grid of rows and columns. Columns may name a
//! statistic; the subpanel store creates one statistics store per named key
//! and binds the created handle back onto every column naming it.
//!
//! Layouts are hand-written, so parsing is lenient: anything that is not the
//! expected shape degrades to "no statistics" instead of failing. The typed
//! [`LayoutScan`] is computed once, before any store exists.

use serde_json::{Map, Value};

use crate::metadata::SubpanelDefinition;

/// Column field holding the statistic key.
const STATISTIC_FIELD: &str = "statistic";
/// Alternate spelling accepted for the statistic key.
const STATISTIC_FIELD_ALIAS: &str = "statisticKey";

/// One column of a widget row.
///
/// `H` is the store handle type bound during resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetColumn<H = ()> {
    /// Raw statistic key exactly as written; only non-empty strings qualify.
    pub statistic: Option<Value>,
    /// Presentational fields, passed through to the renderer.
    pub extra: Map<String, Value>,
    /// Store bound to this column during resolution.
    pub store: Option<H>,
}

impl<H> Default for WidgetColumn<H> {
    fn default() -> Self {
        Self {
            statistic: None,
            extra: Map::new(),
            store: None,
        }
    }
}

impl<H> WidgetColumn<H> {
    pub fn with_statistic(statistic: impl Into<Value>) -> Self {
        Self {
            statistic: Some(statistic.into()),
            ..Default::default()
        }
    }

    /// The statistic key, if this column names a usable one.
    pub fn statistic_key(&self) -> Option<&str> {
        match &self.statistic {
            Some(Value::String(key)) if !key.is_empty() => Some(key),
            _ => None,
        }
    }

    fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let mut extra = object.clone();
        let primary = extra.remove(STATISTIC_FIELD);
        let alias = extra.remove(STATISTIC_FIELD_ALIAS);
        // A usable alias wins over an unusable primary field.
        let statistic = match (primary, alias) {
            (Some(primary), Some(alias)) if !is_statistic_key(&primary) && is_statistic_key(&alias) => {
                Some(alias)
            }
            (primary, alias) => primary.or(alias),
        };
        // Handles are never read from input.
        extra.remove("store");

        Self {
            statistic,
            extra,
            store: None,
        }
    }
}

fn is_statistic_key(value: &Value) -> bool {
    matches!(value, Value::String(key) if !key.is_empty())
}

/// One row of the layout.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetRow<H = ()> {
    pub cols: Vec<WidgetColumn<H>>,
    pub extra: Map<String, Value>,
}

impl<H> Default for WidgetRow<H> {
    fn default() -> Self {
        Self {
            cols: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl<H> WidgetRow<H> {
    pub fn new(cols: Vec<WidgetColumn<H>>) -> Self {
        Self {
            cols,
            extra: Map::new(),
        }
    }

    fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let mut extra = object.clone();
        let cols = match extra.remove("cols") {
            Some(Value::Array(cols)) => cols.iter().map(WidgetColumn::from_value).collect(),
            _ => Vec::new(),
        };

        Self { cols, extra }
    }
}

/// The statistic widget grid of a subpanel.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetLayout<H = ()> {
    pub rows: Vec<WidgetRow<H>>,
    pub extra: Map<String, Value>,
}

impl<H> Default for WidgetLayout<H> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// A column that names a valid statistic key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticSlot {
    pub row: usize,
    pub col: usize,
    pub key: String,
}

/// Why a column naming something was not registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The statistic value is not a string.
    NotAString,
    /// The statistic value is an empty string.
    EmptyKey,
}

/// A column with a statistic value that does not qualify.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedColumn {
    pub row: usize,
    pub col: usize,
    pub value: Value,
    pub reason: SkipReason,
}

/// Result of the discovery pass over a layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutScan {
    pub slots: Vec<StatisticSlot>,
    pub skipped: Vec<SkippedColumn>,
}

impl LayoutScan {
    /// Distinct statistic keys, in discovery order.
    pub fn unique_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            if !keys.contains(&slot.key.as_str()) {
                keys.push(&slot.key);
            }
        }
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<H> WidgetLayout<H> {
    pub fn new(rows: Vec<WidgetRow<H>>) -> Self {
        Self {
            rows,
            extra: Map::new(),
        }
    }

    /// Build a layout from raw JSON.
    ///
    /// A missing, non-array, or empty `rows` value yields a layout with no rows.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let mut extra = object.clone();
        let rows = match extra.remove("rows") {
            Some(Value::Array(rows)) => rows.iter().map(WidgetRow::from_value).collect(),
            _ => Vec::new(),
        };

        Self { rows, extra }
    }

    /// The layout declared by a subpanel, or an empty one when it declares none.
    pub fn from_definition(meta: &SubpanelDefinition) -> Self {
        meta.layout_value()
            .map(Self::from_value)
            .unwrap_or_default()
    }

    /// Walk every column and classify its statistic value.
    pub fn scan(&self) -> LayoutScan {
        let mut scan = LayoutScan::default();

        for (row_index, row) in self.rows.iter().enumerate() {
            for (col_index, col) in row.cols.iter().enumerate() {
                match &col.statistic {
                    None => {}
                    Some(Value::String(key)) if key.is_empty() => {
                        scan.skipped.push(SkippedColumn {
                            row: row_index,
                            col: col_index,
                            value: Value::String(String::new()),
                            reason: SkipReason::EmptyKey,
                        });
                    }
                    Some(Value::String(key)) => scan.slots.push(StatisticSlot {
                        row: row_index,
                        col: col_index,
                        key: key.clone(),
                    }),
                    Some(other) => scan.skipped.push(SkippedColumn {
                        row: row_index,
                        col: col_index,
                        value: other.clone(),
                        reason: SkipReason::NotAString,
                    }),
                }
            }
        }

        scan
    }

    /// Attach handles to the columns listed in `slots`.
    ///
    /// `lookup` is asked once per slot; columns outside `slots` keep no handle.
    pub fn bind<G, F>(self, slots: &[StatisticSlot], mut lookup: F) -> WidgetLayout<G>
    where
        F: FnMut(&str) -> Option<G>,
    {
        let mut rows: Vec<WidgetRow<G>> = self
            .rows
            .into_iter()
            .map(|row| WidgetRow {
                cols: row
                    .cols
                    .into_iter()
                    .map(|col| WidgetColumn {
                        statistic: col.statistic,
                        extra: col.extra,
                        store: None,
                    })
                    .collect(),
                extra: row.extra,
            })
            .collect();

        for slot in slots {
            if let Some(col) = rows
                .get_mut(slot.row)
                .and_then(|row| row.cols.get_mut(slot.col))
            {
                col.store = lookup(&slot.key);
            }
        }

        WidgetLayout {
            rows,
            extra: self.extra,
        }
    }

    /// Iterate over all columns in row-major order.
    pub fn columns(&self) -> impl Iterator<Item = &WidgetColumn<H>> {
        self.rows.iter().flat_map(|row| row.cols.iter())
    }
}
