//! Rendering of tool results as text

use crate::mcp::types::McpContent;

/// Render result content: text verbatim, placeholders for images and
/// resources, JSON for anything else; items joined by a blank line
pub fn format_call_result(content: &[McpContent]) -> String {
    content
        .iter()
        .map(|item| match item {
            McpContent::Text { text } => text.clone(),
            McpContent::Image { mime_type, .. } => format!("[Image: {}]", mime_type),
            McpContent::Resource { resource } => format!("[Resource: {}]", resource.uri),
            McpContent::Other(value) => value.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
