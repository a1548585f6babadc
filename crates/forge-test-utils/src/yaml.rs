//! Builders for minimal valid definition documents.

/// A tool document with optional extra YAML lines appended verbatim.
pub fn tool(name: &str, version: &str, extra: &str) -> String {
    format!(
        "type: tool\nname: {name}\nversion: {version}\ndescription: {name} tool\n{extra}"
    )
}

/// An agent document with optional extra YAML lines appended verbatim.
pub fn agent(name: &str, version: &str, extra: &str) -> String {
    format!(
        "type: agent\nname: {name}\nversion: {version}\ndescription: {name} agent\n{extra}"
    )
}

/// A Markdown agent: front matter followed by `prompt` as the body.
pub fn markdown_agent(name: &str, version: &str, prompt: &str) -> String {
    format!(
        "---\ntype: agent\nname: {name}\nversion: {version}\ndescription: {name} agent\n---\n{prompt}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_document_ends_with_extra() {
        let doc = tool("t", "1.0.0", "tags: [a]\n");
        assert!(doc.starts_with("type: tool\n"));
        assert!(doc.ends_with("tags: [a]\n"));
    }
}
