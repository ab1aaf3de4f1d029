//! Erros de orquestração, configuração e publicação

use std::path::PathBuf;

use thiserror::Error;

use sensa_core::{BusError, BusKind, CalculationError, DeviceError};

pub type OrchestrationResult<T> = Result<T, OrchestrationError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type SinkResult<T> = Result<T, SinkError>;

/// Erros em tempo de execução do ciclo de amostragem
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Falha do dispositivo da pilha
    #[error("Stack '{stack}': {source}")]
    Device {
        stack: String,
        #[source]
        source: DeviceError,
    },

    /// Pilha referenciada não existe
    #[error("Sensing stack not found: {0}")]
    StackNotFound(String),

    /// Amostrador sem pilhas
    #[error("Sampler has no sensing stacks")]
    NoStacks,

    /// Nenhuma pilha produziu dados no ciclo
    #[error("Every sensing stack failed in this cycle")]
    AllStacksFailed,

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Erros ao carregar ou validar a configuração
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Nome de referência inexistente (`device`, `pipeline`, ...)
    #[error("{kind} '{name}' referenced by '{referrer}' is not defined")]
    DanglingReference {
        kind: &'static str,
        name: String,
        referrer: String,
    },

    #[error("Device '{device}' needs a {expected} interface, but '{interface}' is {found}")]
    InterfaceMismatch {
        device: String,
        interface: String,
        expected: BusKind,
        found: BusKind,
    },

    #[error("Device '{name}': {source}")]
    Device {
        name: String,
        #[source]
        source: DeviceError,
    },

    #[error("Calculation '{name}': {source}")]
    Calculation {
        name: String,
        #[source]
        source: CalculationError,
    },

    #[error("Interface '{name}': {source}")]
    Interface {
        name: String,
        #[source]
        source: BusError,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Erros de publicação do blackboard
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialise payload: {0}")]
    Serialise(#[from] serde_json::Error),

    #[error("Sink is not connected to {0}")]
    Disconnected(String),
}
