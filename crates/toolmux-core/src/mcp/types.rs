//! Protocol payload types

use super::error::McpError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;

/// Outcome of one capability probe
///
/// The probe is a heuristic: a list call that succeeds marks the capability
/// as supported, a JSON-RPC rejection marks it unsupported, and anything else
/// (timeouts, dropped connections) leaves it unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// The trial call succeeded
    Supported,
    /// The server rejected the trial call
    Unsupported,
    /// The probe was not run or failed for transport reasons
    #[default]
    Unknown,
}

impl Capability {
    /// Classify the outcome of a trial list call
    pub fn from_probe<T>(outcome: &Result<T, McpError>) -> Self {
        match outcome {
            Ok(_) => Self::Supported,
            Err(McpError::Server { .. }) => Self::Unsupported,
            Err(_) => Self::Unknown,
        }
    }

    /// Check whether the capability is known to be available
    pub fn is_supported(self) -> bool {
        self == Self::Supported
    }
}

/// Capabilities discovered by probing a server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    /// `tools/list` probe result
    pub tools: Capability,
    /// `resources/list` probe result
    pub resources: Capability,
    /// `prompts/list` probe result
    pub prompts: Capability,
}

/// Snapshot of a server taken at initialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    /// Server name
    pub name: String,
    /// Server version
    pub version: String,
    /// Protocol version agreed during the handshake
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Probed capabilities
    #[serde(default)]
    pub capabilities: CapabilitySet,
}

/// Tool definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpTool {
    /// Tool name
    pub name: String,
    /// Tool description
    #[serde(default)]
    pub description: Option<String>,
    /// Input schema (JSON Schema)
    #[serde(default)]
    pub input_schema: Value,
}

impl McpTool {
    /// Create a new tool
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: Value::Object(serde_json::Map::new()),
        }
    }

    /// Set description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Set input schema
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }
}

/// Result of a `tools/call`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResult {
    /// Result content
    #[serde(default)]
    pub content: Vec<McpContent>,
    /// Whether the tool reported a failure
    #[serde(default)]
    pub is_error: bool,
    /// Tool-specific hints
    #[serde(default, rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl CallResult {
    /// Create a successful text result
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent::text(text)],
            is_error: false,
            meta: None,
        }
    }

    /// Whether the tool asked for its output to be returned to the user as-is
    pub fn return_direct(&self) -> bool {
        self.meta
            .as_ref()
            .and_then(|m| m.get("returnDirect"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// One content item in a tool result
///
/// Items with an unrecognized `type` are preserved verbatim in `Other`.
#[derive(Debug, Clone, PartialEq)]
pub enum McpContent {
    /// Text content
    Text { text: String },
    /// Image content
    Image { data: String, mime_type: String },
    /// Embedded resource
    Resource { resource: McpResourceRef },
    /// Any other content kind
    Other(Value),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TaggedContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType", default)]
        mime_type: String,
    },
    Resource {
        resource: McpResourceRef,
    },
}

impl McpContent {
    /// Create text content
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create image content
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }
}

impl<'de> Deserialize<'de> for McpContent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let known = matches!(
            value.get("type").and_then(Value::as_str),
            Some("text" | "image" | "resource")
        );
        if known {
            if let Ok(tagged) = serde_json::from_value::<TaggedContent>(value.clone()) {
                return Ok(match tagged {
                    TaggedContent::Text { text } => Self::Text { text },
                    TaggedContent::Image { data, mime_type } => Self::Image { data, mime_type },
                    TaggedContent::Resource { resource } => Self::Resource { resource },
                });
            }
        }
        Ok(Self::Other(value))
    }
}

impl Serialize for McpContent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Text { text } => TaggedContent::Text { text: text.clone() }.serialize(serializer),
            Self::Image { data, mime_type } => TaggedContent::Image {
                data: data.clone(),
                mime_type: mime_type.clone(),
            }
            .serialize(serializer),
            Self::Resource { resource } => TaggedContent::Resource {
                resource: resource.clone(),
            }
            .serialize(serializer),
            Self::Other(value) => value.serialize(serializer),
        }
    }
}

/// Reference to a resource embedded in content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpResourceRef {
    /// Resource URI
    pub uri: String,
    /// MIME type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Resource text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Resource blob content (base64)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

/// Resource definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpResource {
    /// Resource URI
    pub uri: String,
    /// Resource name
    pub name: String,
    /// Resource description
    #[serde(default)]
    pub description: Option<String>,
    /// MIME type
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl McpResource {
    /// Create a new resource
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: None,
            mime_type: None,
        }
    }
}

/// Parameters of `resources/read`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResourceParams {
    /// Resource URI
    pub uri: String,
    /// Extra server-specific arguments
    #[serde(flatten, default)]
    pub extra: HashMap<String, Value>,
}

impl ReadResourceParams {
    /// Read the resource at `uri`
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            extra: HashMap::new(),
        }
    }
}

/// Result of `resources/read`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadResult {
    /// Resource contents
    #[serde(default)]
    pub contents: Vec<McpResourceRef>,
}

/// Prompt definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpPrompt {
    /// Prompt name
    pub name: String,
    /// Prompt description
    #[serde(default)]
    pub description: Option<String>,
    /// Prompt arguments
    #[serde(default)]
    pub arguments: Vec<McpPromptArgument>,
}

/// Prompt argument definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpPromptArgument {
    /// Argument name
    pub name: String,
    /// Argument description
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the argument is required
    #[serde(default)]
    pub required: bool,
}

/// Initialize request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version
    pub protocol_version: String,
    /// Client capabilities
    pub capabilities: Value,
    /// Client info
    pub client_info: Implementation,
}

/// Name and version of a protocol participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    /// Name
    pub name: String,
    /// Version
    #[serde(default)]
    pub version: String,
}

impl Implementation {
    /// Info this client announces
    pub fn client() -> Self {
        Self {
            name: "toolmux".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Initialize response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol version
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Declared server capabilities
    #[serde(default)]
    pub capabilities: Value,
    /// Server info
    pub server_info: Implementation,
}

/// `tools/list` result
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ToolsList {
    #[serde(default)]
    pub tools: Vec<McpTool>,
}

/// `resources/list` result
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ResourcesList {
    #[serde(default)]
    pub resources: Vec<McpResource>,
}

/// `prompts/list` result
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PromptsList {
    #[serde(default)]
    pub prompts: Vec<McpPrompt>,
}
