// ConfigModel (§6): loads the declarative provider-config document, expands
// `${VAR}` placeholders against the process environment, and fails load if
// any placeholder is left unresolved. TOML only — the workspace carries the
// `toml` crate for this and no YAML parser, so the document format stays
// aligned with what's actually in the dependency graph (see DESIGN.md).

use std::collections::BTreeMap;
use std::path::Path;

use conduit_contracts::ProviderConfig;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("unresolved placeholder ${{{var}}} in provider '{provider}' field '{field}'")]
    UnresolvedPlaceholder {
        provider: String,
        field: String,
        var: String,
    },
}

#[derive(Debug, Deserialize)]
struct RawConfigDocument {
    #[serde(default)]
    providers: Vec<ProviderConfig>,
}

/// The fully loaded, placeholder-expanded provider set.
#[derive(Debug, Clone, Default)]
pub struct ConfigModel {
    pub providers: Vec<ProviderConfig>,
}

impl ConfigModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw, &path.display().to_string())
    }

    fn parse(raw: &str, path: &str) -> Result<Self, ConfigError> {
        let document: RawConfigDocument =
            toml::from_str(raw).map_err(|source| ConfigError::Parse {
                path: path.to_string(),
                source,
            })?;

        let mut providers = Vec::with_capacity(document.providers.len());
        for mut provider in document.providers {
            expand_placeholders(&mut provider)?;
            providers.push(provider);
        }
        Ok(Self { providers })
    }
}

fn expand_placeholders(provider: &mut ProviderConfig) -> Result<(), ConfigError> {
    if let Some(command) = provider.command.as_mut() {
        *command = expand_field(&provider.name, "command", command)?;
    }
    if let Some(url) = provider.url.as_mut() {
        *url = expand_field(&provider.name, "url", url)?;
    }
    for arg in provider.args.iter_mut() {
        *arg = expand_field(&provider.name, "args", arg)?;
    }

    let mut expanded_env: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in provider.env.iter() {
        expanded_env.insert(key.clone(), expand_field(&provider.name, key, value)?);
    }
    provider.env = expanded_env;

    Ok(())
}

/// Resolves every `${VAR}` occurrence in `value` from the process
/// environment; leaves anything without the `${...}` shape untouched.
fn expand_field(provider: &str, field: &str, value: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let var = &after[..end];
        let resolved = std::env::var(var).map_err(|_| ConfigError::UnresolvedPlaceholder {
            provider: provider.to_string(),
            field: field.to_string(),
            var: var.to_string(),
        })?;
        out.push_str(&resolved);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_env_var_placeholder() {
        std::env::set_var("CONDUIT_TEST_TOKEN", "secret123");
        let toml = r#"
            [[providers]]
            name = "filesystem"
            transport = "stdio"
            command = "mcp-fs"
            env = { TOKEN = "${CONDUIT_TEST_TOKEN}" }
        "#;
        let model = ConfigModel::parse(toml, "inline").unwrap();
        assert_eq!(model.providers[0].env["TOKEN"], "secret123");
    }

    #[test]
    fn unresolved_placeholder_is_a_load_error() {
        let toml = r#"
            [[providers]]
            name = "filesystem"
            transport = "stdio"
            command = "mcp-fs"
            env = { TOKEN = "${DOES_NOT_EXIST_ANYWHERE}" }
        "#;
        let result = ConfigModel::parse(toml, "inline");
        assert!(matches!(result, Err(ConfigError::UnresolvedPlaceholder { .. })));
    }
}
