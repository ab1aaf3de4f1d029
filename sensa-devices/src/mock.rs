//! Dispositivo sem barramento que publica um valor fixo
//!
//! Útil para testar pipelines e configurações sem hardware.

use serde::Deserialize;

use sensa_core::bus::{BusHandle, BusKind};
use sensa_core::error::DeviceResult;
use sensa_core::{Blackboard, Device, Value};

use crate::common::{Variables, variable_or};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MockDeviceConfig {
    pub value: Value,
}

impl Default for MockDeviceConfig {
    fn default() -> Self {
        Self { value: Value::Int(0) }
    }
}

#[derive(Debug)]
pub struct MockDevice {
    value: Value,
    variable: String,
    initialised: bool,
}

impl MockDevice {
    pub const NAME: &'static str = "MockDevice";

    pub fn new(config: MockDeviceConfig, variables: &Variables) -> DeviceResult<Self> {
        Ok(Self {
            value: config.value,
            variable: variable_or(variables, "variable", "variable"),
            initialised: false,
        })
    }

    /// Atalho: `{key: value}`
    pub fn with_value(key: &str, value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            variable: key.to_string(),
            initialised: false,
        }
    }
}

impl Device for MockDevice {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn interface(&self) -> BusKind {
        BusKind::None
    }

    /// Aceita qualquer barramento
    fn initialise(&mut self, _bus: BusHandle) -> DeviceResult<()> {
        self.initialised = true;
        Ok(())
    }

    fn sample(&mut self) -> DeviceResult<Blackboard> {
        let mut board = Blackboard::new();
        board.insert(self.variable.as_str(), self.value);
        Ok(board)
    }

    fn is_initialised(&self) -> bool {
        self.initialised
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_configured_value() {
        let config: MockDeviceConfig = toml::from_str("value = 5").unwrap();
        let vars: Variables = [("variable".to_string(), "x".to_string())].into_iter().collect();
        let mut dev = MockDevice::new(config, &vars).unwrap();
        dev.initialise(BusHandle::None).unwrap();
        assert_eq!(dev.sample().unwrap().get("x"), Some(Value::Int(5)));
    }

    #[test]
    fn test_float_value() {
        let mut dev = MockDevice::with_value("t", 21.5);
        assert_eq!(dev.sample().unwrap().get_f64("t"), Some(21.5));
    }
}
