//! Registro: da [`Config`] aos objetos vivos
//!
//! Abre cada interface referenciada uma única vez e entrega clones do mesmo
//! handle a todos os dispositivos que a usam. Pipelines são montados uma vez
//! e compartilhados entre as pilhas que os referenciam.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, info};

use sensa_bus::{BlockingModbusClient, SysfsOneWire};
use sensa_calc::CalculationKind;
use sensa_core::{BusError, BusHandle, BusKind, BusResult, CalculationError, DeviceError};
use sensa_devices::DeviceKind;

use crate::config::{Config, InterfaceConfig, SamplerConfig, StackConfig};
use crate::error::{ConfigError, ConfigResult, OrchestrationError, OrchestrationResult};
use crate::pipeline::Pipeline;
use crate::sampler::Sampler;
use crate::stack::SensingStack;

// ═══════════════════════════════════════════════════════════════════════════════
// ABERTURA DE INTERFACES
// ═══════════════════════════════════════════════════════════════════════════════

/// Abre o barramento descrito por uma entrada de `[interfaces]`
pub trait InterfaceOpener {
    fn open(&mut self, name: &str, config: &InterfaceConfig) -> BusResult<BusHandle>;
}

impl<F> InterfaceOpener for F
where
    F: FnMut(&str, &InterfaceConfig) -> BusResult<BusHandle>,
{
    fn open(&mut self, name: &str, config: &InterfaceConfig) -> BusResult<BusHandle> {
        self(name, config)
    }
}

/// Hardware real: `/dev`, sysfs e TCP
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

impl InterfaceOpener for SystemInterfaces {
    fn open(&mut self, name: &str, config: &InterfaceConfig) -> BusResult<BusHandle> {
        debug!(interface = name, kind = %config.kind(), "opening interface");
        match config {
            InterfaceConfig::I2c { bus } => open_i2c(*bus),
            InterfaceConfig::Spi {
                bus,
                chip_select,
                speed_hz,
                mode,
            } => open_spi(*bus, *chip_select, *speed_hz, *mode),
            InterfaceConfig::OneWire { root } => Ok(BusHandle::one_wire(SysfsOneWire::new(root.clone()))),
            InterfaceConfig::ModbusTcp { address, timeout_secs } => Ok(BusHandle::modbus(
                BlockingModbusClient::new(address.clone(), Duration::from_secs_f64(*timeout_secs))?,
            )),
            InterfaceConfig::Mock => Ok(BusHandle::None),
        }
    }
}

#[cfg(feature = "linux")]
fn open_i2c(bus: u8) -> BusResult<BusHandle> {
    Ok(BusHandle::i2c(sensa_bus::linux::open_i2c(bus)?))
}

#[cfg(not(feature = "linux"))]
fn open_i2c(bus: u8) -> BusResult<BusHandle> {
    Err(BusError::Unsupported(format!(
        "/dev/i2c-{} requires the `linux` feature",
        bus
    )))
}

#[cfg(feature = "linux")]
fn open_spi(bus: u8, chip_select: u8, speed_hz: u32, mode: u8) -> BusResult<BusHandle> {
    let mode = sensa_core::SpiMode::new(mode)
        .ok_or_else(|| BusError::Unsupported(format!("SPI mode {}", mode)))?;
    Ok(BusHandle::spi(sensa_bus::linux::LinuxSpi::open(
        bus,
        chip_select,
        speed_hz,
        mode,
    )?))
}

#[cfg(not(feature = "linux"))]
fn open_spi(bus: u8, chip_select: u8, _speed_hz: u32, _mode: u8) -> BusResult<BusHandle> {
    Err(BusError::Unsupported(format!(
        "/dev/spidev{}.{} requires the `linux` feature",
        bus, chip_select
    )))
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRO
// ═══════════════════════════════════════════════════════════════════════════════

/// Pilha montada e o barramento que ela recebe em `initialise`
struct Binding {
    stack: SensingStack,
    bus: BusHandle,
}

/// Objetos montados a partir de uma configuração
pub struct Registry {
    buses: BTreeMap<String, BusHandle>,
    pipelines: BTreeMap<String, Rc<Pipeline>>,
    stacks: BTreeMap<String, Binding>,
    order: Vec<String>,
    sampler: SamplerConfig,
}

impl Registry {
    /// Monta usando o hardware real
    pub fn build(config: &Config) -> ConfigResult<Self> {
        Self::build_with(config, &mut SystemInterfaces)
    }

    /// Monta com um abridor de interfaces arbitrário
    pub fn build_with(config: &Config, opener: &mut dyn InterfaceOpener) -> ConfigResult<Self> {
        config.validate()?;

        let mut registry = Self {
            buses: BTreeMap::new(),
            pipelines: BTreeMap::new(),
            stacks: BTreeMap::new(),
            order: config.sampled_stacks(),
            sampler: config.sampler.clone(),
        };

        for (name, pipeline) in &config.pipelines {
            let built = build_pipeline(config, name, &pipeline.modules)?;
            registry.pipelines.insert(name.clone(), Rc::new(built));
        }

        for (name, stack) in &config.stacks {
            let binding = registry.build_stack(config, opener, name, stack)?;
            registry.stacks.insert(name.clone(), binding);
        }

        info!(
            interfaces = registry.buses.len(),
            pipelines = registry.pipelines.len(),
            stacks = registry.stacks.len(),
            "registry built"
        );
        Ok(registry)
    }

    fn build_stack(
        &mut self,
        config: &Config,
        opener: &mut dyn InterfaceOpener,
        name: &str,
        stack: &StackConfig,
    ) -> ConfigResult<Binding> {
        let device_config = config
            .devices
            .get(&stack.device)
            .ok_or_else(|| dangling("device", &stack.device, name))?;

        let wrap = |source: DeviceError| ConfigError::Device {
            name: stack.device.clone(),
            source,
        };
        let kind: DeviceKind = device_config.model.parse().map_err(wrap)?;
        let device = kind
            .build(device_config.config.clone(), &device_config.variables)
            .map_err(wrap)?;

        let required = device.interface();
        let bus = match (&device_config.interface, required) {
            (None, BusKind::None) => BusHandle::None,
            (None, _) => {
                return Err(ConfigError::Invalid(format!(
                    "device '{}' ({}) needs a {} interface",
                    stack.device, kind, required
                )));
            }
            (Some(interface), _) => {
                let bus = self.open_interface(config, opener, interface, &stack.device)?;
                if required != BusKind::None && bus.kind() != required {
                    return Err(ConfigError::InterfaceMismatch {
                        device: stack.device.clone(),
                        interface: interface.clone(),
                        expected: required,
                        found: bus.kind(),
                    });
                }
                bus
            }
        };

        let pipeline = match &stack.pipeline {
            Some(pipeline) => self
                .pipelines
                .get(pipeline)
                .cloned()
                .ok_or_else(|| dangling("pipeline", pipeline, name))?,
            None => Rc::new(Pipeline::new(name)),
        };

        let mut built = SensingStack::new(name, device, pipeline).with_constants(stack.constants.clone());
        if let Some(prefix) = &stack.prefix {
            built = built.with_prefix(prefix.clone());
        }
        debug!(stack = name, device = %stack.device, model = %kind, "stack built");
        Ok(Binding { stack: built, bus })
    }

    fn open_interface(
        &mut self,
        config: &Config,
        opener: &mut dyn InterfaceOpener,
        interface: &str,
        device: &str,
    ) -> ConfigResult<BusHandle> {
        if let Some(bus) = self.buses.get(interface) {
            return Ok(bus.clone());
        }
        let interface_config = config
            .interfaces
            .get(interface)
            .ok_or_else(|| dangling("interface", interface, device))?;
        let bus = opener
            .open(interface, interface_config)
            .map_err(|source| ConfigError::Interface {
                name: interface.to_string(),
                source,
            })?;
        info!(interface, kind = %bus.kind(), "interface opened");
        self.buses.insert(interface.to_string(), bus.clone());
        Ok(bus)
    }

    pub fn interface(&self, name: &str) -> Option<&BusHandle> {
        self.buses.get(name)
    }

    pub fn pipeline(&self, name: &str) -> Option<&Rc<Pipeline>> {
        self.pipelines.get(name)
    }

    pub fn stack_names(&self) -> impl Iterator<Item = &str> {
        self.stacks.keys().map(String::as_str)
    }

    pub fn stack(&self, name: &str) -> Option<&SensingStack> {
        self.stacks.get(name).map(|binding| &binding.stack)
    }

    pub fn stack_mut(&mut self, name: &str) -> Option<&mut SensingStack> {
        self.stacks.get_mut(name).map(|binding| &mut binding.stack)
    }

    /// Inicializa todas as pilhas; o primeiro erro interrompe
    pub fn initialise(&mut self) -> OrchestrationResult<()> {
        for (name, binding) in &mut self.stacks {
            binding
                .stack
                .initialise(binding.bus.clone())
                .map_err(|source| OrchestrationError::Device {
                    stack: name.clone(),
                    source,
                })?;
            info!(stack = %name, device = binding.stack.device().name(), "stack initialised");
        }
        Ok(())
    }

    /// Entrega as pilhas amostradas, na ordem configurada, ao [`Sampler`]
    pub fn into_sampler(mut self) -> OrchestrationResult<Sampler> {
        let mut stacks = Vec::with_capacity(self.order.len());
        for name in &self.order {
            let binding = self
                .stacks
                .remove(name)
                .ok_or_else(|| OrchestrationError::StackNotFound(name.clone()))?;
            stacks.push(binding.stack);
        }
        for unused in self.stacks.keys() {
            debug!(stack = %unused, "stack not sampled");
        }
        Sampler::new(self.sampler.mode, self.sampler.period(), stacks)
    }

    pub fn sampler_config(&self) -> &SamplerConfig {
        &self.sampler
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("interfaces", &self.buses.keys().collect::<Vec<_>>())
            .field("pipelines", &self.pipelines.keys().collect::<Vec<_>>())
            .field("stacks", &self.stacks.keys().collect::<Vec<_>>())
            .field("order", &self.order)
            .finish()
    }
}

fn build_pipeline(config: &Config, name: &str, modules: &[String]) -> ConfigResult<Pipeline> {
    let mut pipeline = Pipeline::new(name);
    for module in modules {
        let calculation = config
            .calculations
            .get(module)
            .ok_or_else(|| dangling("calculation", module, name))?;
        let wrap = |source: CalculationError| ConfigError::Calculation {
            name: module.clone(),
            source,
        };
        let kind: CalculationKind = calculation.module.parse().map_err(wrap)?;
        let built = kind
            .build(calculation.config.clone(), &calculation.variables)
            .map_err(wrap)?;
        pipeline.push(module.clone(), built);
    }
    debug!(pipeline = name, modules = pipeline.len(), "pipeline built");
    Ok(pipeline)
}

fn dangling(kind: &'static str, name: &str, referrer: &str) -> ConfigError {
    ConfigError::DanglingReference {
        kind,
        name: name.to_string(),
        referrer: referrer.to_string(),
    }
}
