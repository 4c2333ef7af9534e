//! # Configuração
//!
//! Tudo é fixado na inicialização e nunca muda durante a vida do processo:
//!
//! | Variável                | Padrão                      |
//! |-------------------------|-----------------------------|
//! | `FABULA_HOST`           | `0.0.0.0`                   |
//! | `FABULA_PORT`           | `3000`                      |
//! | `STATS_FILE`            | `api_processing_stats.json` |
//! | `CONTEXT_WINDOW_SIZE`   | `25`                        |
//! | `SERIAL_PATTERNS_FILE`  | tabela embutida             |
//! | `CALIBER_PATTERNS_FILE` | tabela embutida             |
//! | `LOG_LEVEL`             | `info`                      |
//!
//! A leitura passa por uma função de busca injetável ([`ServiceConfig::from_vars`]),
//! o que permite testar a interpretação sem mexer no ambiente do processo.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pattern::{caliber_table, serial_number_table, AttributeKind, PatternTable};

pub const DEFAULT_CONTEXT_WINDOW: usize = 25;

/// Parâmetros do motor de extração.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Raio da janela de contexto, em tokens, de cada lado da entidade.
    pub context_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { context_window: DEFAULT_CONTEXT_WINDOW }
    }
}

/// Configuração do serviço HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub stats_file: PathBuf,
    pub log_level: String,
    pub engine: EngineConfig,
    pub serial_patterns_file: Option<PathBuf>,
    pub caliber_patterns_file: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            stats_file: PathBuf::from("api_processing_stats.json"),
            log_level: "info".to_string(),
            engine: EngineConfig::default(),
            serial_patterns_file: None,
            caliber_patterns_file: None,
        }
    }
}

impl ServiceConfig {
    /// Lê do ambiente do processo.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Lê usando `lookup` como fonte das variáveis.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup("FABULA_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("FABULA_PORT") {
            config.port = parse_value("FABULA_PORT", port)?;
        }
        if let Some(path) = lookup("STATS_FILE") {
            config.stats_file = PathBuf::from(path);
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(window) = lookup("CONTEXT_WINDOW_SIZE") {
            config.engine.context_window = parse_value("CONTEXT_WINDOW_SIZE", window)?;
        }
        config.serial_patterns_file = lookup("SERIAL_PATTERNS_FILE").map(PathBuf::from);
        config.caliber_patterns_file = lookup("CALIBER_PATTERNS_FILE").map(PathBuf::from);

        Ok(config)
    }

    /// Endereço de escuta (`host:port`).
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Tabelas de número de série e de calibre: arquivo configurado ou embutida.
    pub fn load_tables(&self) -> Result<(PatternTable, PatternTable), ConfigError> {
        let serial = match &self.serial_patterns_file {
            Some(path) => load_table(path, AttributeKind::SerialNumber)?,
            None => serial_number_table(),
        };
        let caliber = match &self.caliber_patterns_file {
            Some(path) => load_table(path, AttributeKind::Caliber)?,
            None => caliber_table(),
        };
        Ok((serial, caliber))
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value })
}

fn load_table(path: &Path, expected: AttributeKind) -> Result<PatternTable, ConfigError> {
    let table = PatternTable::from_json_file(path)?;
    if table.kind != expected {
        return Err(ConfigError::WrongTableKind { path: path.to_path_buf(), expected, found: table.kind });
    }
    Ok(table)
}
