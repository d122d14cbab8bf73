//! Query descriptors and statistic payloads.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The record a query is scoped to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewContext {
    pub module: String,
    pub id: String,
}

impl ViewContext {
    pub fn new(module: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            id: id.into(),
        }
    }
}

/// Identifies what to fetch and for which record.
///
/// Two descriptors with equal `(key, context, params)` describe the same
/// logical request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatisticsQuery {
    pub key: String,
    pub context: ViewContext,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl StatisticsQuery {
    pub fn new(key: impl Into<String>, context: ViewContext) -> Self {
        Self {
            key: key.into(),
            context,
            params: BTreeMap::new(),
        }
    }

    /// Add a query parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// The query scoped to a subpanel of a parent record.
    pub fn for_subpanel(
        key: impl Into<String>,
        parent_module: impl Into<String>,
        parent_id: impl Into<String>,
        subpanel: impl Into<String>,
    ) -> Self {
        Self::new(key, ViewContext::new(parent_module, parent_id)).with_param("subpanel", subpanel)
    }
}

/// A single statistic value. `data` is opaque to the stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistic {
    pub id: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Statistic {
    /// The placeholder used when a fetch returns no entry.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.data.is_empty()
    }
}

/// Queries keyed by statistic key, in request order.
pub type StatisticsQueryMap = IndexMap<String, StatisticsQuery>;

/// Statistics keyed by statistic key, in response order.
pub type StatisticsMap = IndexMap<String, Statistic>;

/// Pick the statistic out of a single-statistic response.
///
/// Takes the first entry; an empty response maps to [`Statistic::empty`].
pub fn first_statistic(map: &StatisticsMap) -> Statistic {
    map.values().next().cloned().unwrap_or_else(Statistic::empty)
}
