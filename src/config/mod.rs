use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ExportError;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "CARBON_EXPORT_CONFIG_PATH";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub roots: RootsConfig,
    pub output: OutputConfig,
    pub notify: NotifyConfig,
}

/// CLI で未指定の場合に使うルート名と相対パスの既定値。
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RootsConfig {
    pub plugin_root: Option<String>,
    pub plugins: Option<PathBuf>,
    pub server_root: Option<String>,
    pub server: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub quiet: bool,
    pub replace: ReplaceMode,
}

/// 既存の出力ファイルを置き換える前の処理方法。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplaceMode {
    #[default]
    Delete,
    Trash,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    pub macos_notify: bool,
}

impl Config {
    /// 設定ファイルを読み込み、CLI の既定値を構築する。
    ///
    /// # 判定ルール
    /// 1. `CARBON_EXPORT_CONFIG_PATH` または `~/.config/carbon-export/config.toml` を使用
    /// 2. ファイルが存在しない場合は既定値を返す（ファイルは作成しない）
    pub fn load() -> Result<Self, ExportError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// 指定パスの設定ファイルを読み込み、検証する。
    pub fn load_from(path: &Path) -> Result<Self, ExportError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ExportError::Config(format!("Failed to read config file: {e}")))?;

        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self, ExportError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ExportError::Config(format!("Failed to parse config file: {e}")))?;
        config.validate()?;

        Ok(config)
    }

    /// `roots.plugins` と `roots.server` には相対パスのみを許可する。
    fn validate(&self) -> Result<(), ExportError> {
        let relative_fields = [
            ("roots.plugins", &self.roots.plugins),
            ("roots.server", &self.roots.server),
        ];

        for (field, value) in relative_fields {
            if let Some(path) = value.as_ref().filter(|p| p.is_absolute()) {
                return Err(ExportError::InvalidConfig(format!(
                    "{field} must be a relative path: {}",
                    path.display()
                )));
            }
        }

        Ok(())
    }

    /// Determines the path to the configuration file.
    ///
    /// # Priority
    /// 1. CARBON_EXPORT_CONFIG_PATH environment variable
    /// 2. ~/.config/carbon-export/config.toml
    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }

        let home_dir = dirs::home_dir()?;
        Some(home_dir.join(".config").join("carbon-export").join("config.toml"))
    }
}
