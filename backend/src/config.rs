use forreal_shared::ModelVariant;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tch::Device;

const DEFAULT_CONFIG_PATH: &str = "config/server.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceChoice {
    Auto,
    Cpu,
    Cuda,
}

impl DeviceChoice {
    pub fn resolve(self) -> Device {
        match self {
            DeviceChoice::Auto => Device::cuda_if_available(),
            DeviceChoice::Cpu => Device::Cpu,
            DeviceChoice::Cuda => Device::Cuda(0),
        }
    }
}

impl FromStr for DeviceChoice {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(DeviceChoice::Auto),
            "cpu" => Ok(DeviceChoice::Cpu),
            "cuda" | "gpu" => Ok(DeviceChoice::Cuda),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub dir: PathBuf,
    pub variant: ModelVariant,
    pub device: DeviceChoice,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("model"),
            variant: ModelVariant::Efficientnet,
            device: DeviceChoice::Auto,
        }
    }
}

impl AppConfig {
    /// Defaults, then the YAML file (if any), then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = match std::env::var("FORREAL_CONFIG") {
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                path.exists().then_some(path)
            }
        };

        let mut config = match path {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&config_str).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key: "PORT", value: port })?;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(max) = lookup("MAX_UPLOAD_BYTES") {
            self.server.max_upload_bytes = max.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: "MAX_UPLOAD_BYTES",
                value: max,
            })?;
        }
        if let Some(dir) = lookup("MODEL_DIR") {
            self.model.dir = PathBuf::from(dir);
        }
        if let Some(variant) = lookup("MODEL_VARIANT") {
            self.model.variant = ModelVariant::from_str(variant.trim()).map_err(|_| {
                ConfigError::InvalidEnv {
                    key: "MODEL_VARIANT",
                    value: variant,
                }
            })?;
        }
        if let Some(device) = lookup("DEVICE") {
            self.model.device = DeviceChoice::from_str(&device)
                .map_err(|_| ConfigError::InvalidEnv { key: "DEVICE", value: device })?;
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_local_dev_setup() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.model.dir, PathBuf::from("model"));
        assert_eq!(config.model.variant, ModelVariant::Efficientnet);
        assert_eq!(config.server.cors_origins.len(), 2);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "model:\n  variant: densenet\n  dir: /srv/weights\nserver:\n  port: 9000\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.model.variant, ModelVariant::Densenet);
        assert_eq!(config.model.dir, PathBuf::from("/srv/weights"));
        assert_eq!(config.model.device, DeviceChoice::Auto);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn env_overrides_win() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[
                ("PORT", "8081"),
                ("MODEL_VARIANT", "DenseNet"),
                ("DEVICE", "cpu"),
                ("CORS_ORIGINS", "https://a.example, ,https://b.example"),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.model.variant, ModelVariant::Densenet);
        assert_eq!(config.model.device, DeviceChoice::Cpu);
        assert_eq!(
            config.server.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn invalid_env_value_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(env(&[("MODEL_VARIANT", "resnet")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key: "MODEL_VARIANT", .. }));

        let err = config.apply_overrides(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key: "PORT", .. }));
    }

    #[test]
    fn missing_config_file_is_a_read_error() {
        let err = AppConfig::from_file(Path::new("/nonexistent/forreal.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
