use serde_json::Value;

/// Render a list of resources as a compact table (pointer, version, phase, owner).
pub fn render_resource_table(resources: &[Value]) -> String {
    if resources.is_empty() {
        return "No resources.\n".to_string();
    }
    let mut out = String::new();
    out.push_str(&format!("{:<42} {:<8} {:<14} {}\n", "POINTER", "VERSION", "PHASE", "OWNER"));
    for r in resources {
        let pointer = r.get("pointer");
        let resource_type = pointer.and_then(|p| p.get("resource_type")).and_then(|v| v.as_str()).unwrap_or("-");
        let namespace = pointer.and_then(|p| p.get("namespace")).and_then(|v| v.as_str()).unwrap_or("-");
        let id = pointer.and_then(|p| p.get("id")).and_then(|v| v.as_str()).unwrap_or("-");
        let metadata = r.get("metadata");
        let version = metadata
            .and_then(|m| m.get("version"))
            .map(|v| if v.is_null() { "-".to_string() } else { v.to_string() })
            .unwrap_or_else(|| "-".to_string());
        let phase = metadata.and_then(|m| m.get("phase")).and_then(|v| v.as_str()).unwrap_or("-");
        let owner = metadata.and_then(|m| m.get("owner")).and_then(|v| v.as_str()).unwrap_or("-");
        out.push_str(&format!("{:<42} {:<8} {:<14} {}\n", format!("{resource_type}/{namespace}/{id}"), version, phase, owner));
    }
    out
}

/// Render the `/controllers` response as plain text.
pub fn render_controllers_text(body: &Value) -> String {
    let mut out = String::new();
    let controllers = body.get("controllers").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    for c in &controllers {
        let name = c.get("name").and_then(|v| v.as_str()).unwrap_or("-");
        out.push_str(&format!("{name}\n"));
        for input in c.get("inputs").and_then(|v| v.as_array()).into_iter().flatten() {
            let rt = input.get("resource_type").and_then(|v| v.as_str()).unwrap_or("-");
            let kind = input.get("kind").and_then(|v| v.as_str()).unwrap_or("-");
            out.push_str(&format!("  in  {rt} ({kind})\n"));
        }
        for output in c.get("outputs").and_then(|v| v.as_array()).into_iter().flatten() {
            let rt = output.get("resource_type").and_then(|v| v.as_str()).unwrap_or("-");
            let kind = output.get("kind").and_then(|v| v.as_str()).unwrap_or("-");
            out.push_str(&format!("  out {rt} ({kind})\n"));
        }
    }
    out
}

/// Render a `DependencyGraph` JSON body (see `omnicore_graph::DependencyGraph`)
/// as plain text: one line per edge, annotated with cycle status.
pub fn render_dependency_graph_text(graph: &Value) -> String {
    let mut out = String::new();
    let cyclic = graph.get("cyclic").and_then(|v| v.as_bool()).unwrap_or(false);
    for edge in graph.get("edges").and_then(|v| v.as_array()).into_iter().flatten() {
        let from = edge.get("from").and_then(|v| v.as_str()).unwrap_or("-");
        let to = edge.get("to").and_then(|v| v.as_str()).unwrap_or("-");
        let kind = edge.get("kind").and_then(|v| v.as_str()).unwrap_or("-");
        out.push_str(&format!("{from} --{kind}--> {to}\n"));
    }
    if cyclic {
        out.push_str("\n(cyclic: no single topological order)\n");
    }
    out
}

/// Render a `DependencyGraph` JSON body as Graphviz DOT.
pub fn render_dependency_graph_dot(graph: &Value) -> String {
    let mut out = String::from("digraph omnicore {\n  rankdir=LR;\n  node [shape=box];\n\n");
    for node in graph.get("nodes").and_then(|v| v.as_array()).into_iter().flatten() {
        let id = node.get("id").and_then(|v| v.as_str()).unwrap_or("");
        let label = node.get("label").and_then(|v| v.as_str()).unwrap_or(id);
        out.push_str(&format!("  \"{id}\" [label=\"{label}\"];\n"));
    }
    out.push('\n');
    for edge in graph.get("edges").and_then(|v| v.as_array()).into_iter().flatten() {
        let from = edge.get("from").and_then(|v| v.as_str()).unwrap_or("");
        let to = edge.get("to").and_then(|v| v.as_str()).unwrap_or("");
        let kind = edge.get("kind").and_then(|v| v.as_str()).unwrap_or("");
        out.push_str(&format!("  \"{from}\" -> \"{to}\" [label=\"{kind}\"];\n"));
    }
    out.push('}');
    out
}
