use std::collections::HashMap;

/// Derive a locator for an element from its attributes.
///
/// Priority: `id` → `#id`, `name` → `[name='..']`, first `class` token →
/// `.token`, otherwise the bare tag. Nothing is escaped, so the result is
/// best-effort and may match more than one element.
pub fn derive_selector(attributes: &HashMap<String, String>, tag: &str) -> String {
    if let Some(id) = attributes.get("id") {
        return format!("#{}", id);
    }
    if let Some(name) = attributes.get("name") {
        return format!("[name='{}']", name);
    }
    if let Some(token) = attributes
        .get("class")
        .and_then(|class| class.split_whitespace().next())
    {
        return format!(".{}", token);
    }
    tag.to_string()
}
