const DNS_NAME_MAX: usize = 63;
const PORT_NAME_MAX: usize = 15;

pub fn collector(instance: &str) -> String {
    dns_name(&format!("{}-collector", instance))
}

pub fn headless_service(instance: &str) -> String {
    dns_name(&format!("{}-collector-headless", instance))
}

pub fn monitoring_service(instance: &str) -> String {
    dns_name(&format!("{}-collector-monitoring", instance))
}

pub fn ingress(instance: &str) -> String {
    dns_name(&format!("{}-ingress", instance))
}

pub fn target_allocator(instance: &str) -> String {
    dns_name(&format!("{}-targetallocator", instance))
}

/// Truncates to the object name limit and trims trailing separators.
pub fn dns_name(name: &str) -> String {
    let truncated: String = name.chars().take(DNS_NAME_MAX).collect();
    truncated.trim_end_matches(['-', '.']).to_string()
}

/// Container port names must be lowercase DNS labels of at most 15 characters.
/// Names that cannot be kept fall back to `port-<number>`.
pub fn port_name(candidate: &str, port: i32) -> String {
    let sanitized: String = candidate
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let sanitized = sanitized.trim_matches('-');

    let valid = !sanitized.is_empty()
        && sanitized.len() <= PORT_NAME_MAX
        && sanitized.chars().any(|c| c.is_ascii_alphabetic())
        && !sanitized.contains("--");
    if valid {
        sanitized.to_string()
    } else {
        format!("port-{}", port)
    }
}
