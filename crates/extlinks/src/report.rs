use extlinks_core::IndexSnapshot;

/// Render every URL with the documents that reference it.
pub fn render_text(snapshot: &IndexSnapshot) -> String {
    let urls = snapshot.urls();
    let mut output = format!(
        "External links ({} URLs across {} documents):\n",
        urls.len(),
        snapshot.document_count()
    );
    if urls.is_empty() {
        output.push_str("- (none)\n");
        return output;
    }
    for url in urls {
        output.push_str(&format!("- {}\n", url));
        for doc in snapshot.documents_for(url) {
            output.push_str(&format!("    - {} ({})\n", doc.label, doc.path));
        }
    }
    output
}

/// Render the links stored for one document, in index order.
pub fn render_document(snapshot: &IndexSnapshot, path: &str) -> String {
    let mut output = format!("Links in {}:\n", path);
    let links = snapshot.links_for(path);
    if links.is_empty() {
        output.push_str("- (none)\n");
    }
    for link in links {
        if link.display_text.trim().is_empty() || link.display_text == link.url {
            output.push_str(&format!("- {}\n", link.url));
        } else {
            output.push_str(&format!("- {} <{}>\n", link.display_text, link.url));
        }
    }
    output
}

pub fn render_json(snapshot: &IndexSnapshot) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// One-line status, e.g. "v3: 12 documents, 40 URLs".
pub fn summary(snapshot: &IndexSnapshot) -> String {
    format!(
        "v{}: {} documents, {} URLs",
        snapshot.version,
        snapshot.document_count(),
        snapshot.url_count()
    )
}
