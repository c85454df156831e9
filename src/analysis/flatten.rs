//! Plain-text projection of the graph for embedding consumers that only
//! read flat text.

use crate::core::types::DocumentGraph;

/// One `--- Page/Slide N ---` block per page with its text nodes top to
/// bottom, followed by a blank line.
pub fn flatten_text(graph: &DocumentGraph) -> String {
    let mut out = String::new();
    for page in graph.pages() {
        out.push_str(&format!("--- Page/Slide {} ---\n", page.index));

        let mut nodes: Vec<_> = page.text_nodes().collect();
        // stable: nodes on the same line keep paint order
        nodes.sort_by(|a, b| a.position.y.total_cmp(&b.position.y));
        for node in nodes {
            out.push_str(&node.text);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}
