pub mod types;


pub use types::*;

use anyhow::Result;
use std::path::Path;

impl GatewayConfig {
    /// Load configuration from a file. Format is sniffed from the extension
    /// (`.toml`, `.json`, `.yaml`/`.yml`). When the file does not exist,
    /// built-in defaults are used — allowing the gateway to start with zero
    /// configuration for local development.
    pub fn load(path: &Path) -> Result<Self> {
        let config: GatewayConfig = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => toml::from_str(&content)?,
                Some("json") => serde_json::from_str(&content)?,
                Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
                Some(ext) => {
                    anyhow::bail!("unsupported config format: .{ext}, use .toml, .json or .yaml")
                }
                None => anyhow::bail!("config file has no extension, use .toml, .json or .yaml"),
            }
        } else {
            tracing::info!(
                "config file not found at {}, using defaults",
                path.display()
            );
            GatewayConfig::default()
        };

        config.validate()?;
        tracing::info!(
            "loaded gateway configuration, upstream_nodes={}",
            config.upstream.len()
        );
        Ok(config)
    }

    /// Write the default configuration to `path`, refusing to overwrite an
    /// existing file. Backs the `init` CLI verb.
    pub fn generate_default(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("config file already exists at {}", path.display());
        }
        let config = GatewayConfig::default();
        let rendered = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::to_string_pretty(&config)?,
            Some("json") => serde_json::to_string_pretty(&config)?,
            _ => serde_yaml::to_string(&config)?,
        };
        std::fs::write(path, rendered)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (i, node) in self.upstream.iter().enumerate() {
            if node.blocks.is_empty() {
                anyhow::bail!("node {}: blocks must not be empty", i + 1);
            }
            if node.blocks.len() > 2 {
                anyhow::bail!("invalid blocks range for node {}", i + 1);
            }
        }
        Ok(())
    }
}
