//! Arquivo de configuração (TOML)
//!
//! ```toml
//! [interfaces.i2c]
//! kind = "i2c"
//! bus = 1
//!
//! [devices.climate]
//! model = "bmp280"
//! interface = "i2c"
//! config = { i2c_address = 0x76 }
//! variables = { P = "pressure", T = "temperature" }
//!
//! [pipelines.climate]
//! modules = []
//!
//! [stacks.climate]
//! device = "climate"
//! pipeline = "climate"
//! prefix = "lab_"
//!
//! [sampler]
//! mode = "multi_merged"
//! period_secs = 1.0
//! ```
//!
//! As tabelas `config` de dispositivos e cálculos são repassadas sem
//! interpretação ao construtor do modelo.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sensa_core::{Blackboard, BusKind, Variables};

use crate::error::{ConfigError, ConfigResult};
use crate::sampler::SamplerMode;
use crate::scheduler::SchedulerMode;

/// Configuração completa de uma instalação
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub interfaces: BTreeMap<String, InterfaceConfig>,
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceConfig>,
    #[serde(default)]
    pub calculations: BTreeMap<String, CalculationConfig>,
    #[serde(default)]
    pub pipelines: BTreeMap<String, PipelineConfig>,
    #[serde(default)]
    pub stacks: BTreeMap<String, StackConfig>,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub sink: SinkConfig,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SEÇÕES
// ═══════════════════════════════════════════════════════════════════════════════

/// Barramento a abrir
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InterfaceConfig {
    /// `/dev/i2c-{bus}`
    I2c { bus: u8 },
    /// `/dev/spidev{bus}.{chip_select}`
    Spi {
        bus: u8,
        #[serde(default)]
        chip_select: u8,
        #[serde(default = "default_spi_speed")]
        speed_hz: u32,
        #[serde(default)]
        mode: u8,
    },
    /// Diretório sysfs do mestre one-wire
    OneWire {
        #[serde(default = "default_one_wire_root")]
        root: PathBuf,
    },
    /// Gateway Modbus RTU sobre TCP (`host:porta`)
    ModbusTcp {
        address: String,
        #[serde(default = "default_modbus_timeout")]
        timeout_secs: f64,
    },
    /// Sem barramento
    Mock,
}

impl InterfaceConfig {
    pub fn kind(&self) -> BusKind {
        match self {
            InterfaceConfig::I2c { .. } => BusKind::I2c,
            InterfaceConfig::Spi { .. } => BusKind::Spi,
            InterfaceConfig::OneWire { .. } => BusKind::OneWire,
            InterfaceConfig::ModbusTcp { .. } => BusKind::Modbus,
            InterfaceConfig::Mock => BusKind::None,
        }
    }
}

fn default_spi_speed() -> u32 {
    1_000_000
}

fn default_one_wire_root() -> PathBuf {
    PathBuf::from("/sys/bus/w1/devices")
}

fn default_modbus_timeout() -> f64 {
    5.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Nome do modelo (`bmp280`, `sht40`, ...)
    pub model: String,
    /// Chave em `[interfaces]`; dispensável para dispositivos sem barramento
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default)]
    pub config: toml::Table,
    /// Papel lógico → chave no blackboard
    #[serde(default)]
    pub variables: Variables,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationConfig {
    /// Nome do módulo (`pt_rtd`, `peak_to_rms`, ...)
    pub module: String,
    #[serde(default)]
    pub config: toml::Table,
    #[serde(default)]
    pub variables: Variables,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Chaves em `[calculations]`, na ordem de execução
    #[serde(default)]
    pub modules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackConfig {
    pub device: String,
    /// Sem pipeline, a saída do dispositivo passa direto
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default)]
    pub constants: Blackboard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub mode: SamplerMode,
    pub period_secs: f64,
    /// Pilhas em ordem; vazio = todas, em ordem alfabética
    pub stacks: Vec<String>,
    pub scheduler: SchedulerMode,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            mode: SamplerMode::default(),
            period_secs: 1.0,
            stacks: Vec::new(),
            scheduler: SchedulerMode::default(),
        }
    }
}

impl SamplerConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(self.period_secs)
    }
}

/// Destino das mensagens
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Uma linha JSON por ciclo na saída padrão
    #[default]
    Stdout,
    /// Uma linha JSON por ciclo num socket TCP
    Tcp {
        address: String,
        #[serde(default = "default_connect_timeout")]
        connect_timeout_secs: f64,
    },
}

fn default_connect_timeout() -> f64 {
    5.0
}

// ═══════════════════════════════════════════════════════════════════════════════
// CARGA E VALIDAÇÃO
// ═══════════════════════════════════════════════════════════════════════════════

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(content: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Carrega e valida um arquivo
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    /// Serializa de volta para TOML
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(format!("failed to serialise: {}", e)))
    }

    /// Pilhas amostradas, na ordem configurada
    pub fn sampled_stacks(&self) -> Vec<String> {
        if self.sampler.stacks.is_empty() {
            self.stacks.keys().cloned().collect()
        } else {
            self.sampler.stacks.clone()
        }
    }

    /// Verifica referências entre seções e valores numéricos
    ///
    /// Modelos e módulos são conferidos quando o registro é montado.
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, device) in &self.devices {
            if let Some(interface) = &device.interface {
                if !self.interfaces.contains_key(interface) {
                    return Err(dangling("interface", interface, format!("device {}", name)));
                }
            }
        }

        for (name, pipeline) in &self.pipelines {
            for module in &pipeline.modules {
                if !self.calculations.contains_key(module) {
                    return Err(dangling("calculation", module, format!("pipeline {}", name)));
                }
            }
        }

        for (name, stack) in &self.stacks {
            if !self.devices.contains_key(&stack.device) {
                return Err(dangling("device", &stack.device, format!("stack {}", name)));
            }
            if let Some(pipeline) = &stack.pipeline {
                if !self.pipelines.contains_key(pipeline) {
                    return Err(dangling("pipeline", pipeline, format!("stack {}", name)));
                }
            }
        }

        let mut claimed = BTreeMap::new();
        for (name, stack) in &self.stacks {
            if let Some(other) = claimed.insert(stack.device.as_str(), name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "device '{}' is used by both stack '{}' and stack '{}'",
                    stack.device, other, name
                )));
            }
        }

        for stack in &self.sampler.stacks {
            if !self.stacks.contains_key(stack) {
                return Err(dangling("stack", stack, "sampler".to_string()));
            }
        }

        if self.stacks.is_empty() {
            return Err(ConfigError::Invalid("no sensing stacks defined".into()));
        }

        if !self.sampler.period_secs.is_finite() || self.sampler.period_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sampler period must be a non-negative number of seconds, got {}",
                self.sampler.period_secs
            )));
        }

        for (name, interface) in &self.interfaces {
            if let InterfaceConfig::ModbusTcp { timeout_secs, .. } = interface {
                if !(timeout_secs.is_finite() && *timeout_secs > 0.0) {
                    return Err(ConfigError::Invalid(format!(
                        "interface '{}': timeout must be positive, got {}",
                        name, timeout_secs
                    )));
                }
            }
        }

        if let SinkConfig::Tcp { connect_timeout_secs, .. } = &self.sink {
            if !(connect_timeout_secs.is_finite() && *connect_timeout_secs > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "sink connect timeout must be positive, got {}",
                    connect_timeout_secs
                )));
            }
        }

        Ok(())
    }
}

fn dangling(kind: &'static str, name: &str, referrer: String) -> ConfigError {
    ConfigError::DanglingReference {
        kind,
        name: name.to_string(),
        referrer,
    }
}
