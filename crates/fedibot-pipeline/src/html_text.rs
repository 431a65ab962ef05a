//! Plain-text extraction from status HTML.

use kuchiki::traits::TendrilSink;
use kuchiki::NodeRef;

/// Flattens markup to the concatenation of its text nodes in document order.
///
/// Parsing is error-recovering: unclosed or stray tags still yield their text,
/// and input without any markup is returned unchanged. Whitespace is left as
/// the author wrote it.
pub fn extract_text_from_html(markup: &str) -> String {
    if !markup.contains('<') && !markup.contains('&') {
        return markup.to_string();
    }

    let document = kuchiki::parse_html().one(markup);
    collect_text(document)
}

fn collect_text(root: NodeRef) -> String {
    let mut text = String::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if let Some(content) = node.as_text() {
            text.push_str(&content.borrow());
            continue;
        }
        let children = node.children().collect::<Vec<_>>();
        stack.extend(children.into_iter().rev());
    }
    text
}
