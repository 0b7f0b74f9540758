//! Registry lookup for image pull secrets.

use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use serde::{Deserialize, de::Error as _};

/// Data key of `kubernetes.io/dockerconfigjson` secrets. Scan jobs mount the
/// pull secret under this key, so it is the only format read.
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";

#[derive(Debug, Default, Deserialize)]
struct DockerConfigJson {
    #[serde(default)]
    auths: BTreeMap<String, DockerAuthEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct DockerAuthEntry {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    auth: Option<String>,
}

impl DockerAuthEntry {
    fn has_credentials(&self) -> bool {
        let basic = matches!(
            (self.username.as_deref(), self.password.as_deref()),
            (Some(user), Some(_)) if !user.is_empty()
        );
        basic || self.auth.as_deref().is_some_and(decodes_to_user_pass)
    }
}

fn decodes_to_user_pass(auth: &str) -> bool {
    BASE64_STANDARD
        .decode(auth.trim())
        .ok()
        .and_then(|raw| String::from_utf8(raw).ok())
        .is_some_and(|pair| matches!(pair.split_once(':'), Some((user, _)) if !user.is_empty()))
}

/// Registries a `.dockerconfigjson` payload holds usable credentials for.
pub fn registries(raw: &[u8]) -> Result<Vec<String>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_slice(raw)?;
    if !value.is_object() {
        return Err(serde_json::Error::custom("docker config must be a JSON object"));
    }
    let config: DockerConfigJson = serde_json::from_value(value)?;

    Ok(config
        .auths
        .into_iter()
        .filter(|(_, entry)| entry.has_credentials())
        .map(|(registry, _)| registry)
        .collect())
}
