//! Peças compartilhadas pelos módulos de dispositivo

use serde::{Deserialize, Deserializer};

use sensa_core::bus::Bus;
use sensa_core::codec::{ChannelRange, ChannelValue};
use sensa_core::error::{ChannelError, DeviceError, DeviceResult};

pub use sensa_core::{Variables, variable_or};

/// Chave para `role`, obrigatória
pub fn required_variable(variables: &Variables, role: &str, device: &str) -> DeviceResult<String> {
    variables.get(role).cloned().ok_or_else(|| {
        DeviceError::InvalidConfig(format!("{}: variable mapping '{}' is required", device, role))
    })
}

/// Barramento vinculado, ou `NotInitialised`
pub(crate) fn bound<'a, T: ?Sized>(bus: &'a Option<Bus<T>>, device: &str) -> DeviceResult<&'a Bus<T>> {
    bus.as_ref()
        .ok_or_else(|| DeviceError::NotInitialised(device.to_string()))
}

/// Confere o tamanho de um buffer antes de decodificar
pub(crate) fn expect_len(device: &str, buf: &[u8], len: usize) -> DeviceResult<()> {
    if buf.len() == len {
        Ok(())
    } else {
        Err(DeviceError::Decode(format!(
            "{}: expected {} bytes, got {}",
            device,
            len,
            buf.len()
        )))
    }
}

/// Valida o canal configurado (ausente conta como tipo errado)
pub fn validate_channel(device: &str, range: ChannelRange, channel: Option<&ChannelValue>) -> DeviceResult<i64> {
    match channel {
        Some(value) => Ok(range.validate(device, value)?),
        None => Err(ChannelError::WrongType {
            device: device.to_string(),
            value: "none".into(),
        }
        .into()),
    }
}

/// Aceita `true`/`false` ou `1`/`0` em campos de liga/desliga
pub(crate) fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_lookup() {
        let vars: Variables = [("T".to_string(), "temp".to_string())].into_iter().collect();
        assert_eq!(required_variable(&vars, "T", "BMP280").unwrap(), "temp");
        assert!(required_variable(&vars, "P", "BMP280").is_err());
    }

    #[test]
    fn test_bound_before_initialise() {
        let bus: Option<Bus<dyn sensa_core::I2cBus>> = None;
        assert!(matches!(bound(&bus, "X"), Err(DeviceError::NotInitialised(_))));
    }

    #[test]
    fn test_missing_channel_is_wrong_type() {
        let err = validate_channel("ADC", ChannelRange::new(0, 7), None).unwrap_err();
        assert!(matches!(err, DeviceError::InvalidChannel(ChannelError::WrongType { .. })));
        assert_eq!(
            validate_channel("ADC", ChannelRange::new(0, 7), Some(&ChannelValue::Integer(7))),
            Ok(7)
        );
    }

    #[test]
    fn test_expect_len() {
        assert!(expect_len("X", &[1, 2], 2).is_ok());
        assert!(matches!(expect_len("X", &[1], 2), Err(DeviceError::Decode(_))));
    }
}
