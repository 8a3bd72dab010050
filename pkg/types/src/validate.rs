use anyhow::{Result, bail};

/// Validate a Kubernetes-style resource name.
/// Rules: lowercase `[a-z0-9-]`, max 63 chars, no leading/trailing hyphens.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("name must not be empty");
    }
    if name.len() > 63 {
        bail!("name '{}' exceeds 63 characters (got {})", name, name.len());
    }
    if name.starts_with('-') || name.ends_with('-') {
        bail!("name '{}' must not start or end with a hyphen", name);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        bail!(
            "name '{}' must contain only lowercase letters, digits, and hyphens [a-z0-9-]",
            name
        );
    }
    Ok(())
}

/// Split a `namespace/name` reference. Exactly one `/` is allowed and both
/// halves must be valid names.
pub fn parse_namespaced_name(target: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = target.split('/').collect();
    let [namespace, name] = parts.as_slice() else {
        bail!(
            "malformed object string '{}', must be in format \"namespace/name\"",
            target
        );
    };
    validate_name(namespace)?;
    validate_name(name)?;
    Ok((namespace.to_string(), name.to_string()))
}
