use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppType {
    #[default]
    Unspecified,
    Agent,
    McpServer,
}

/// A registered caller/callee identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct App {
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub app_type: AppType,
    /// Identifier callers use to address the app before they know its id.
    pub resolver_metadata_id: Option<String>,
}

impl App {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn is_mcp_server(&self) -> bool {
        self.app_type == AppType::McpServer
    }
}
