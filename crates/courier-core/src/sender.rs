use serde::{Deserialize, Serialize};

/// Host tab identifier
pub type TabId = i64;

/// What the substrate knows about the context a message came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderInfo {
    /// Extension the sending context belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Set when the sender is a content script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl SenderInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension_id(mut self, id: impl Into<String>) -> Self {
        self.extension_id = Some(id.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_tab(mut self, tab_id: TabId, frame_id: i64) -> Self {
        self.tab_id = Some(tab_id);
        self.frame_id = Some(frame_id);
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn is_content_script(&self) -> bool {
        self.tab_id.is_some()
    }
}
