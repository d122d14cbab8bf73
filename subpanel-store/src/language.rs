//! Label lookup used for subpanel titles.

use std::collections::HashMap;

/// App list holding module display names.
pub const MODULE_LIST: &str = "moduleList";

/// Resolves translated labels.
///
/// `None` means the label is unknown; callers fall back to something else.
pub trait LanguageStore: Send + Sync {
    /// Label for a field key in a module.
    fn field_label(&self, key: &str, module: &str) -> Option<String>;

    /// A named app list of `value -> label`.
    fn app_list_strings(&self, list: &str) -> Option<HashMap<String, String>>;
}
