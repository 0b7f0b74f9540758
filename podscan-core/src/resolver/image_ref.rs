//! String-level helpers over image references and runtime image ids.

use crate::ports::PullCredential;

const DIGEST_MARKER: &str = "@sha256:";
const DEFAULT_REGISTRY: &str = "docker.io";

/// Extract the sha256 digest from an observed image id such as
/// `docker-pullable://nginx@sha256:4c0f…`.
pub fn parse_image_hash(image_id: &str) -> Option<String> {
    let index = image_id.rfind(DIGEST_MARKER)?;
    let hash = &image_id[index + DIGEST_MARKER.len()..];
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(hash.to_string())
}

/// Registry host an image reference is pulled from.
///
/// Follows the docker convention: the first path component is a registry
/// only if it looks like a host (contains `.` or `:`, or is `localhost`).
pub fn registry_host(image: &str) -> String {
    match image.split_once('/') {
        Some((first, _))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            normalize_registry(first)
        }
        _ => DEFAULT_REGISTRY.to_string(),
    }
}

/// Canonical form of a registry key from a docker config (`auths` map).
///
/// Strips the scheme and any path, lowercases, and folds the legacy Docker
/// Hub aliases onto `docker.io`.
pub fn normalize_registry(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let host = without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
        .to_ascii_lowercase();

    match host.as_str() {
        "index.docker.io" | "registry-1.docker.io" | "registry.hub.docker.com" => {
            DEFAULT_REGISTRY.to_string()
        }
        _ => host,
    }
}

/// Name of the first credential whose registries cover `image`.
pub fn matching_secret(
    credentials: &[PullCredential],
    image: &str,
) -> Option<String> {
    let host = registry_host(image);
    credentials
        .iter()
        .find(|cred| {
            cred.registries
                .iter()
                .any(|registry| normalize_registry(registry) == host)
        })
        .map(|cred| cred.secret_name.clone())
}
