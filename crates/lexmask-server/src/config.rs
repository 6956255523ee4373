use anyhow::{Context, bail};
use lexmask_core::EntityLabel;
use lexmask_egress::{HttpClientConfig, LinguisticConfig, ModelNerConfig};
use lexmask_ingress::{
    CorsConfig, DEFAULT_ANALYZE_THRESHOLD, DEFAULT_MASK_THRESHOLD, RequestDefaults,
};
use lexmask_pii::{
    DEFAULT_MASK_CHARACTER, DEFAULT_MAX_TEXT_CHARS, EngineConfig, MaskRepresentation, MaskStyle,
    PatternDetectorConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub masking: MaskingConfig,

    #[serde(default)]
    pub detectors: DetectorsConfig,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener for administrative endpoints, kept apart from the public API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_admin_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of the human-readable format
    #[serde(default = "default_false")]
    pub json: bool,

    /// Log a summary of every mask/analyze request (counts and lengths only)
    #[serde(default = "default_false")]
    pub log_requests: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskingConfig {
    /// `false` turns the service into a pass-through
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    #[serde(default = "default_mask_threshold")]
    pub mask_threshold: f32,

    #[serde(default = "default_analyze_threshold")]
    pub analyze_threshold: f32,

    #[serde(default)]
    pub default_representation: MaskStyle,

    #[serde(default = "default_mask_character")]
    pub mask_character: String,

    /// Replacement text per label for token masking
    #[serde(default)]
    pub token_overrides: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorsConfig {
    pub model: Option<ModelDetectorSettings>,
    pub linguistic: Option<LinguisticDetectorSettings>,

    #[serde(default)]
    pub patterns: PatternDetectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDetectorSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub endpoint: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinguisticDetectorSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub endpoint: String,

    #[serde(default = "default_linguistic_confidence")]
    pub confidence: f32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            logging: LoggingConfig::default(),
            masking: MaskingConfig::default(),
            detectors: DetectorsConfig::default(),
            cors: CorsConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_admin_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            log_requests: false,
        }
    }
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_text_chars: default_max_text_chars(),
            mask_threshold: default_mask_threshold(),
            analyze_threshold: default_analyze_threshold(),
            default_representation: MaskStyle::default(),
            mask_character: default_mask_character(),
            token_overrides: HashMap::new(),
        }
    }
}

impl ModelDetectorSettings {
    fn new(endpoint: String) -> Self {
        Self {
            enabled: true,
            endpoint,
            health_path: None,
            model_name: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }

    pub fn to_detector_config(&self) -> ModelNerConfig {
        let mut config = ModelNerConfig::new(self.endpoint.clone()).with_client_config(
            HttpClientConfig {
                max_retries: self.max_retries,
                ..HttpClientConfig::default().with_timeout(self.timeout_secs)
            },
        );
        if let Some(path) = &self.health_path {
            config = config.with_health_path(path.clone());
        }
        if let Some(name) = &self.model_name {
            config = config.with_model_name(name.clone());
        }
        config
    }
}

impl LinguisticDetectorSettings {
    fn new(endpoint: String) -> Self {
        Self {
            enabled: true,
            endpoint,
            confidence: default_linguistic_confidence(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }

    pub fn to_detector_config(&self) -> LinguisticConfig {
        LinguisticConfig::new(self.endpoint.clone())
            .with_confidence(self.confidence)
            .with_client_config(HttpClientConfig {
                max_retries: self.max_retries,
                ..HttpClientConfig::default().with_timeout(self.timeout_secs)
            })
    }
}

impl MaskingConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_text_chars: self.max_text_chars,
            passthrough: !self.enabled,
        }
    }

    pub fn token_overrides(&self) -> HashMap<EntityLabel, String> {
        self.token_overrides
            .iter()
            .map(|(label, token)| (EntityLabel::from(label.as_str()).normalized(), token.clone()))
            .collect()
    }

    pub fn request_defaults(&self) -> RequestDefaults {
        RequestDefaults {
            mask_threshold: self.mask_threshold,
            analyze_threshold: self.analyze_threshold,
            representation: self.default_representation,
            mask_character: self.mask_character.clone(),
            token_overrides: self.token_overrides(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Invalid YAML in {}", path.display()))?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        self.merge_from(|key| std::env::var(key).ok());
    }

    fn merge_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Server settings
        if let Some(val) = lookup("LEXMASK_HOST") {
            self.host = val;
        }

        if let Some(val) = lookup("LEXMASK_PORT") {
            match val.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => eprintln!("Warning: Invalid LEXMASK_PORT '{}', ignoring", val),
            }
        }

        if let Some(val) = lookup("LEXMASK_ADMIN_PORT") {
            match val.parse::<u16>() {
                Ok(port) => self.admin.port = port,
                Err(_) => eprintln!("Warning: Invalid LEXMASK_ADMIN_PORT '{}', ignoring", val),
            }
        }

        // Logging settings
        if let Some(val) = lookup("LEXMASK_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Some(val) = lookup("LEXMASK_LOG_REQUESTS")
            && let Ok(enabled) = val.parse::<bool>()
        {
            self.logging.log_requests = enabled;
        }

        // Masking toggle keeps its unprefixed legacy name
        if let Some(val) = lookup("ENABLE_MASKING") {
            self.masking.enabled = val.eq_ignore_ascii_case("true");
        }

        if let Some(val) = lookup("LEXMASK_MAX_TEXT_CHARS") {
            match val.parse::<usize>() {
                Ok(max) => self.masking.max_text_chars = max,
                Err(_) => eprintln!("Warning: Invalid LEXMASK_MAX_TEXT_CHARS '{}', ignoring", val),
            }
        }

        // Detector endpoints
        if let Some(endpoint) = lookup("LEXMASK_MODEL_ENDPOINT") {
            match &mut self.detectors.model {
                Some(model) => model.endpoint = endpoint,
                None => self.detectors.model = Some(ModelDetectorSettings::new(endpoint)),
            }
        }

        if let Some(endpoint) = lookup("LEXMASK_LINGUISTIC_ENDPOINT") {
            match &mut self.detectors.linguistic {
                Some(linguistic) => linguistic.endpoint = endpoint,
                None => {
                    self.detectors.linguistic = Some(LinguisticDetectorSettings::new(endpoint))
                }
            }
        }
    }

    /// Reject settings the service cannot start with
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("masking.mask_threshold", self.masking.mask_threshold),
            ("masking.analyze_threshold", self.masking.analyze_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{} must be between 0 and 1, got {}", name, value);
            }
        }

        if self.admin.enabled && self.admin.host == self.host && self.admin.port == self.port {
            bail!(
                "admin listener {}:{} must differ from the API listener",
                self.admin.host,
                self.admin.port
            );
        }

        if self.masking.max_text_chars == 0 {
            bail!("masking.max_text_chars must be greater than 0");
        }

        MaskRepresentation::from_style(
            MaskStyle::Character,
            &self.masking.mask_character,
            HashMap::new(),
        )
        .context("masking.mask_character")?;

        Ok(())
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8002
}

fn default_admin_port() -> u16 {
    8003
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_text_chars() -> usize {
    DEFAULT_MAX_TEXT_CHARS
}

fn default_mask_threshold() -> f32 {
    DEFAULT_MASK_THRESHOLD
}

fn default_analyze_threshold() -> f32 {
    DEFAULT_ANALYZE_THRESHOLD
}

fn default_mask_character() -> String {
    DEFAULT_MASK_CHARACTER.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_linguistic_confidence() -> f32 {
    lexmask_egress::linguistic::DEFAULT_LINGUISTIC_CONFIDENCE
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const YAML: &str = r#"
host: 0.0.0.0
port: 9000
logging:
  level: debug
  json: true
masking:
  enabled: true
  mask_threshold: 0.9
  default_representation: token
  token_overrides:
    PERSON: "[NAME]"
    per: "[PER]"
detectors:
  model:
    endpoint: http://127.0.0.1:8090/ner
    health_path: /health
  linguistic:
    endpoint: http://127.0.0.1:8091/ents
    confidence: 0.8
    enabled: false
  patterns:
    custom_patterns:
      - label: BAR_NUMBER
        pattern: "\\bBar No\\. \\d{6}\\b"
        confidence: 0.95
cors:
  allowed_origins: ["*"]
"#;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8002);
        assert!(config.masking.enabled);
        assert_eq!(config.masking.max_text_chars, 10_000);
        assert_eq!(config.masking.mask_threshold, 0.85);
        assert_eq!(config.masking.analyze_threshold, 0.7);
        assert_eq!(config.masking.mask_character, "█");
        assert_eq!(config.masking.default_representation, MaskStyle::Character);
        assert!(config.detectors.model.is_none());
        assert!(config.detectors.linguistic.is_none());
        assert!(config.admin.enabled);
        assert_eq!(config.admin.host, "127.0.0.1");
        assert_eq!(config.admin.port, 8003);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert!(config.logging.json);
        assert_eq!(config.masking.mask_threshold, 0.9);
        assert_eq!(config.masking.analyze_threshold, 0.7);
        assert_eq!(config.masking.default_representation, MaskStyle::Token);

        let model = config.detectors.model.as_ref().unwrap();
        assert!(model.enabled);
        assert_eq!(model.health_path.as_deref(), Some("/health"));
        assert_eq!(model.timeout_secs, 30);

        let linguistic = config.detectors.linguistic.as_ref().unwrap();
        assert!(!linguistic.enabled);
        assert_eq!(linguistic.confidence, 0.8);

        assert_eq!(config.detectors.patterns.custom_patterns.len(), 1);
        assert_eq!(config.cors.allowed_origins, vec!["*".to_string()]);
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(
            br#"
port = 8100

[masking]
enabled = false
max_text_chars = 500

[detectors.linguistic]
endpoint = "http://127.0.0.1:8091/ents"
"#,
        )
        .unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 8100);
        assert!(!config.masking.enabled);
        assert_eq!(config.masking.max_text_chars, 500);
        assert_eq!(
            config.detectors.linguistic.unwrap().confidence,
            lexmask_egress::linguistic::DEFAULT_LINGUISTIC_CONFIDENCE
        );

        let engine = config.masking.engine_config();
        assert!(engine.passthrough);
        assert_eq!(engine.max_text_chars, 500);
    }

    #[test]
    fn test_from_file_missing() {
        let err = ServerConfig::from_file("/nonexistent/lexmask.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_token_overrides_are_normalized() {
        let config: ServerConfig = serde_yaml::from_str(YAML).unwrap();
        let defaults = config.masking.request_defaults();

        assert_eq!(defaults.representation, MaskStyle::Token);
        assert_eq!(defaults.mask_threshold, 0.9);
        // `per` normalizes onto PERSON as well; either entry may win
        assert!(defaults.token_overrides.contains_key(&EntityLabel::Person));
        assert_eq!(defaults.token_overrides.len(), 1);
    }

    #[test]
    fn test_merge_env_overrides() {
        let mut config: ServerConfig = serde_yaml::from_str(YAML).unwrap();
        config.merge_from(lookup(&[
            ("LEXMASK_HOST", "10.0.0.1"),
            ("LEXMASK_PORT", "7000"),
            ("LEXMASK_LOG_LEVEL", "warn"),
            ("LEXMASK_LOG_REQUESTS", "true"),
            ("ENABLE_MASKING", "false"),
            ("LEXMASK_MAX_TEXT_CHARS", "2000"),
            ("LEXMASK_MODEL_ENDPOINT", "http://gpu:8090/ner"),
        ]));

        assert_eq!(config.host, "10.0.0.1");
        assert_eq!(config.port, 7000);
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.log_requests);
        assert!(!config.masking.enabled);
        assert_eq!(config.masking.max_text_chars, 2000);

        let model = config.detectors.model.unwrap();
        assert_eq!(model.endpoint, "http://gpu:8090/ner");
        // other settings from the file survive
        assert_eq!(model.health_path.as_deref(), Some("/health"));
    }

    #[test]
    fn test_merge_env_creates_detector_sections() {
        let mut config = ServerConfig::default();
        config.merge_from(lookup(&[
            ("LEXMASK_LINGUISTIC_ENDPOINT", "http://127.0.0.1:8091/ents"),
            ("LEXMASK_PORT", "not-a-port"),
        ]));

        assert_eq!(config.port, 8002);
        let linguistic = config.detectors.linguistic.unwrap();
        assert!(linguistic.enabled);
        assert_eq!(linguistic.endpoint, "http://127.0.0.1:8091/ents");
    }

    #[test]
    #[serial_test::serial]
    fn test_merge_env_reads_process_environment() {
        unsafe {
            std::env::set_var("ENABLE_MASKING", "FALSE");
        }

        let mut config = ServerConfig::default();
        config.merge_env();
        assert!(!config.masking.enabled);

        unsafe {
            std::env::remove_var("ENABLE_MASKING");
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ServerConfig::default();
        config.masking.mask_threshold = 1.2;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.masking.mask_character = "##".to_string();
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.masking.max_text_chars = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_admin_listener_must_be_separate() {
        let mut config = ServerConfig::default();
        config.admin.port = config.port;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must differ from the API listener"));

        config.admin.enabled = false;
        assert!(config.validate().is_ok());

        let mut config = ServerConfig::default();
        config.merge_from(lookup(&[("LEXMASK_ADMIN_PORT", "9100")]));
        assert_eq!(config.admin.port, 9100);
    }

    #[test]
    fn test_detector_settings_conversion() {
        let config: ServerConfig = serde_yaml::from_str(YAML).unwrap();

        let model = config.detectors.model.unwrap().to_detector_config();
        assert_eq!(model.endpoint, "http://127.0.0.1:8090/ner");
        assert_eq!(model.health_path.as_deref(), Some("/health"));
        assert_eq!(model.client_config.timeout_secs, 30);
        assert_eq!(model.client_config.max_retries, 2);

        let linguistic = config.detectors.linguistic.unwrap().to_detector_config();
        assert_eq!(linguistic.confidence, 0.8);
    }
}
