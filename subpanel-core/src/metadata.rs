//! Subpanel metadata as delivered by the view definition.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Definition of a single subpanel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubpanelDefinition {
    pub name: String,
    /// Module whose records the subpanel lists.
    pub module: String,
    #[serde(default)]
    pub title_key: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default, rename = "insightWidget", skip_serializing_if = "Option::is_none")]
    pub insight_widget: Option<InsightWidgetDefinition>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Statistic widget settings of a subpanel.
///
/// Both fields stay raw JSON: authors write them by hand and the stores must
/// degrade rather than reject unexpected shapes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightWidgetDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl SubpanelDefinition {
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            ..Default::default()
        }
    }

    /// Whether statistics should be loaded as one batch.
    ///
    /// Batching is on unless the author wrote `insightWidget.batch = false`.
    pub fn should_batch(&self) -> bool {
        !matches!(
            self.insight_widget.as_ref().and_then(|w| w.batch.as_ref()),
            Some(Value::Bool(false))
        )
    }

    /// The raw widget layout at `insightWidget.options.insightWidget`.
    pub fn layout_value(&self) -> Option<&Value> {
        self.insight_widget
            .as_ref()
            .and_then(|w| w.options.as_ref())
            .and_then(|options| options.get("insightWidget"))
    }
}
