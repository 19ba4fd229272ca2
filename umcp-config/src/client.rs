//! Client configuration snippets for desktop assistants.

use std::path::Path;

use serde_json::{Map, Value, json};
use umcp_primitives::Catalog;

/// Builds an `mcpServers` document launching one `umcp` server per catalog.
///
/// Each entry is keyed by the catalog name and passes the catalog path via
/// `--config`.
#[must_use]
pub fn generate_client_config<'a, I>(catalogs: I) -> Value
where
    I: IntoIterator<Item = (&'a Catalog, &'a Path)>,
{
    let servers: Map<String, Value> = catalogs
        .into_iter()
        .map(|(catalog, path)| {
            (
                catalog.name().to_owned(),
                json!({
                    "command": "umcp",
                    "args": ["--config", path.display().to_string()],
                }),
            )
        })
        .collect();
    json!({ "mcpServers": servers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use umcp_primitives::{CatalogMetadata, CatalogSettings};

    #[test]
    fn one_server_per_catalog() {
        let git = Catalog::new(CatalogMetadata::new("git"), CatalogSettings::new("git"));
        let docker = Catalog::new(CatalogMetadata::new("docker"), CatalogSettings::new("docker"));
        let config = generate_client_config([
            (&git, Path::new("/etc/umcp/git.yaml")),
            (&docker, Path::new("/etc/umcp/docker.yaml")),
        ]);

        assert_eq!(
            config,
            json!({
                "mcpServers": {
                    "git": { "command": "umcp", "args": ["--config", "/etc/umcp/git.yaml"] },
                    "docker": { "command": "umcp", "args": ["--config", "/etc/umcp/docker.yaml"] }
                }
            })
        );
    }
}
