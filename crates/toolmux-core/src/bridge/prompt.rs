//! System prompt augmentation

use super::qualify;
use crate::mcp::types::McpTool;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Append the tool listing grouped by server; `base` is returned unchanged
/// when there are no tools
pub(super) fn augment(base: &str, tools: &HashMap<String, Vec<McpTool>>) -> String {
    let mut servers: Vec<(&String, &Vec<McpTool>)> =
        tools.iter().filter(|(_, list)| !list.is_empty()).collect();
    if servers.is_empty() {
        return base.to_string();
    }
    servers.sort_by(|a, b| a.0.cmp(b.0));

    let mut prompt = base.trim_end().to_string();
    if !prompt.is_empty() {
        prompt.push_str("\n\n");
    }
    prompt.push_str("You have access to the following tools:\n");
    for (server, list) in servers {
        let _ = write!(prompt, "\n## {}\n", server);
        let mut list: Vec<&McpTool> = list.iter().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        for tool in list {
            match tool.description.as_deref().filter(|d| !d.trim().is_empty()) {
                Some(desc) => {
                    let _ = writeln!(prompt, "- {}: {}", qualify(server, &tool.name), desc.trim());
                }
                None => {
                    let _ = writeln!(prompt, "- {}", qualify(server, &tool.name));
                }
            }
        }
    }
    prompt
}
