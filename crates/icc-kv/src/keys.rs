//! Composite key construction
//!
//! Every logical key lives in the flat Redis keyspace as `namespace-key`.

/// Separator placed between the namespace and the logical key
pub const KEY_SEPARATOR: char = '-';

/// Build the composite key stored in Redis for a namespaced key
pub fn composite_key(namespace: &str, key: &str) -> String {
    let mut composite = String::with_capacity(namespace.len() + 1 + key.len());
    composite.push_str(namespace);
    composite.push(KEY_SEPARATOR);
    composite.push_str(key);
    composite
}

/// Strip the `namespace-` prefix from a composite key
///
/// Keys outside the namespace are returned unchanged.
pub fn strip_namespace<'a>(namespace: &str, composite: &'a str) -> &'a str {
    composite
        .strip_prefix(namespace)
        .and_then(|rest| rest.strip_prefix(KEY_SEPARATOR))
        .unwrap_or(composite)
}

/// Build the SCAN MATCH pattern for keys in `namespace` starting with `prefix`
pub fn scan_pattern(namespace: &str, prefix: Option<&str>) -> String {
    let mut pattern = composite_key(namespace, prefix.unwrap_or(""));
    pattern.push('*');
    pattern
}
