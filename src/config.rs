use crate::error::{GradeError, Result};
use crate::types::config::GradecraftConfig;
use std::path::{Path, PathBuf};
use toml::{Table, Value};
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "gradecraft.toml";
pub const DEFAULT_LOCAL_FILE: &str = ".gradecraft/local.toml";
pub const DEFAULT_GLOBAL_CONFIG_FILE: &str = ".config/gradecraft/config.toml";

/// One optional TOML file in the override chain.
#[derive(Debug, Clone, PartialEq)]
struct ConfigLayer {
    label: &'static str,
    path: PathBuf,
}

pub fn load_config(root: &Path) -> Result<GradecraftConfig> {
    let global = std::env::var_os("HOME")
        .map(PathBuf::from)
        .map(|home| home.join(DEFAULT_GLOBAL_CONFIG_FILE));
    load_config_with_global(root, global.as_deref())
}

pub(crate) fn load_config_with_global(
    root: &Path,
    global_path: Option<&Path>,
) -> Result<GradecraftConfig> {
    let mut merged = Table::new();
    for layer in config_layers(root, global_path) {
        if let Some(table) = read_layer(&layer)? {
            debug!(layer = layer.label, path = %layer.path.display(), "applied config layer");
            overlay_table(&mut merged, table);
        }
    }

    let cfg = GradecraftConfig::deserialize_table(merged)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Lowest precedence first: global, project, local.
fn config_layers(root: &Path, global_path: Option<&Path>) -> Vec<ConfigLayer> {
    let global = global_path.map(|path| ConfigLayer {
        label: "global",
        path: path.to_path_buf(),
    });
    global
        .into_iter()
        .chain([
            ConfigLayer {
                label: "project",
                path: root.join(DEFAULT_CONFIG_FILE),
            },
            ConfigLayer {
                label: "local",
                path: root.join(DEFAULT_LOCAL_FILE),
            },
        ])
        .collect()
}

fn read_layer(layer: &ConfigLayer) -> Result<Option<Table>> {
    if !layer.path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&layer.path)?;
    content.parse::<Table>().map(Some).map_err(|e| {
        GradeError::ConfigParse(format!(
            "{} config {}: {}",
            layer.label,
            layer.path.display(),
            e
        ))
    })
}

/// Nested tables merge key by key; any other value replaces what was there.
fn overlay_table(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match value {
            Value::Table(nested) => match base.get_mut(&key) {
                Some(Value::Table(existing)) => overlay_table(existing, nested),
                _ => {
                    base.insert(key, Value::Table(nested));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

impl GradecraftConfig {
    fn deserialize_table(table: Table) -> Result<Self> {
        Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| GradeError::ConfigParse(e.to_string()))
    }
}
