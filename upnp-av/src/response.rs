//! Small helpers for pulling argument values out of action responses.

use xmltree::Element;

/// Text of a child element, empty when absent.
pub(crate) fn child_text(element: &Element, name: &str) -> String {
    element
        .get_child(name)
        .and_then(|c| c.get_text())
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

pub(crate) fn child_u32(element: &Element, name: &str) -> u32 {
    child_text(element, name).parse().unwrap_or(0)
}

pub(crate) fn child_i32(element: &Element, name: &str) -> i32 {
    child_text(element, name).parse().unwrap_or(0)
}
