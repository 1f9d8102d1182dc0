pub fn semver_parse(ver_str: &str) -> Result<semver::Version, semver::Error> {
    semver::Version::parse(ver_str.trim_start_matches('v'))
}

pub fn semver_parse_without_build(ver_str: &str) -> Result<semver::Version, semver::Error> {
    let version = semver_parse(ver_str)?;
    Ok(strip_build_metadata(version))
}

fn strip_build_metadata(mut version: semver::Version) -> semver::Version {
    version.build = semver::BuildMetadata::EMPTY;
    version
}

// Tag part of a container image reference, "latest" when none is given.
// Example: "otel/collector:0.88.0" -> "0.88.0"
// Example: "registry:5000/otel/collector" -> "latest"
pub fn image_tag(image: &str) -> String {
    let without_digest = image.split('@').next().unwrap_or(image);
    let last_segment = without_digest.rsplit('/').next().unwrap_or(without_digest);
    match last_segment.rsplit_once(':') {
        Some((_, tag)) if !tag.is_empty() => tag.to_string(),
        _ => "latest".to_string(),
    }
}
