//! Record list data and search criteria.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A single record as returned by the list transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub module: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Page position within a record list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pagination {
    pub page_size: u32,
    /// Zero-based page index.
    pub current_page: u32,
    /// Total records available upstream, if the transport reported it.
    #[serde(default)]
    pub total: u64,
}

impl Pagination {
    pub fn first_page(page_size: u32) -> Self {
        Self {
            page_size,
            current_page: 0,
            total: 0,
        }
    }

    /// Offset of the first record on the current page.
    pub fn offset(&self) -> u64 {
        u64::from(self.current_page) * u64::from(self.page_size)
    }

    /// Number of pages needed for `total` records.
    pub fn page_count(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.page_size))
    }
}

/// One page of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordList {
    pub records: Vec<Record>,
    pub pagination: Pagination,
}

/// A named server-side search preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchPreset {
    #[serde(rename = "type")]
    pub preset_type: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Criteria applied to a record list fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<SearchPreset>,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

impl SearchCriteria {
    /// Criteria listing the records related to a parent record through a subpanel.
    pub fn subpanel(
        subpanel: impl Into<String>,
        parent_module: impl Into<String>,
        parent_id: impl Into<String>,
    ) -> Self {
        let mut params = BTreeMap::new();
        params.insert("subpanel".to_string(), subpanel.into());
        params.insert("parentModule".to_string(), parent_module.into());
        params.insert("parentId".to_string(), parent_id.into());

        Self {
            preset: Some(SearchPreset {
                preset_type: "subpanel".to_string(),
                params,
            }),
            filters: BTreeMap::new(),
        }
    }
}
