//! Configuration file loading.
//!
//! A config file is TOML or YAML, chosen by extension:
//!
//! ```toml
//! [render]
//! preserve_proto_field_names = false
//! omit_whitespace = false
//!
//! [[topics_mapping]]
//! topic_regex = "album.*"
//! descriptor_file = "descriptors/album.desc"
//! value_message_type = "Album"
//! ```
//!
//! Each mapping supplies its descriptor set either inline as standard base64
//! (`descriptor_file_base64`) or as a path (`descriptor_file`); relative paths
//! resolve against the directory holding the config file.

use anyhow::{bail, Context};
use base64::Engine;
use lens_protobuf::{RenderOptions, SharedRegistry, TopicDeserializer, TopicMapping};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LensConfig {
    #[serde(default)]
    pub render: RenderOptions,

    /// Mappings in precedence order
    #[serde(default)]
    pub topics_mapping: Vec<TopicMappingConfig>,

    /// Directory relative descriptor paths resolve against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// One `[[topics_mapping]]` entry as written in the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopicMappingConfig {
    pub topic_regex: String,
    #[serde(default)]
    pub descriptor_file_base64: Option<String>,
    #[serde(default)]
    pub descriptor_file: Option<PathBuf>,
    pub value_message_type: String,
    #[serde(default)]
    pub key_message_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            _ => bail!(
                "Unsupported config file extension for {:?} (expected .toml, .yaml or .yml)",
                path
            ),
        }
    }
}

impl LensConfig {
    /// Load a config file; the format follows the file extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path:?}"))?;
        let mut config = Self::parse(&content, format)
            .with_context(|| format!("Failed to parse config file {path:?}"))?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    pub fn parse(content: &str, format: ConfigFormat) -> anyhow::Result<Self> {
        let config = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        };
        Ok(config)
    }

    /// Resolve every mapping's descriptor source to raw bytes.
    pub fn topic_mappings(&self) -> anyhow::Result<Vec<TopicMapping>> {
        self.topics_mapping
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                entry.to_topic_mapping(&self.base_dir).with_context(|| {
                    format!(
                        "Invalid topics_mapping #{index} ('{}')",
                        entry.topic_regex
                    )
                })
            })
            .collect()
    }

    pub fn build_registry(&self) -> anyhow::Result<SharedRegistry> {
        let mappings = self.topic_mappings()?;
        let registry = SharedRegistry::build(&mappings).context("Failed to build schema registry")?;
        info!("Loaded {} topic mappings", mappings.len());
        Ok(registry)
    }

    pub fn deserializer(&self) -> anyhow::Result<TopicDeserializer> {
        Ok(TopicDeserializer::new(
            self.build_registry()?,
            self.render.clone(),
        ))
    }
}

impl TopicMappingConfig {
    pub fn to_topic_mapping(&self, base_dir: &Path) -> anyhow::Result<TopicMapping> {
        let descriptor_set = match (&self.descriptor_file_base64, &self.descriptor_file) {
            (Some(encoded), None) => base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .context("descriptor_file_base64 is not valid base64")?,
            (None, Some(file)) => {
                let path = base_dir.join(file);
                fs::read(&path)
                    .with_context(|| format!("Failed to read descriptor file {path:?}"))?
            }
            (Some(_), Some(_)) => {
                bail!("Only one of descriptor_file_base64 and descriptor_file may be set")
            }
            (None, None) => bail!("One of descriptor_file_base64 or descriptor_file is required"),
        };

        let mapping = TopicMapping::new(
            self.topic_regex.clone(),
            descriptor_set,
            self.value_message_type.clone(),
        );
        Ok(match &self.key_message_type {
            Some(key) => mapping.with_key_message_type(key.clone()),
            None => mapping,
        })
    }
}
