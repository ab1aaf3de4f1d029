//! Decodificação de registradores
//!
//! Funções puras sobre buffers de bytes: montagem multi-byte, sinal em
//! complemento de dois, CRC-8 Sensirion, escala para unidades físicas e
//! validação de canal. Não dependem de como os bytes foram obtidos.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ChannelError, DeviceError, DeviceResult};

// ═══════════════════════════════════════════════════════════════════════════════
// MONTAGEM DE REGISTRADORES
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordem dos bytes de um valor multi-byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Byte mais significativo primeiro
    #[default]
    Big,
    /// Byte menos significativo primeiro
    Little,
}

/// Monta até 8 bytes num inteiro sem sinal
///
/// Big-endian: `Σ byte[i] << 8·(N−1−i)`; little-endian inverte os shifts.
pub fn assemble(bytes: &[u8], order: ByteOrder) -> u64 {
    let fold = |acc: u64, b: &u8| (acc << 8) | u64::from(*b);
    match order {
        ByteOrder::Big => bytes.iter().fold(0, fold),
        ByteOrder::Little => bytes.iter().rev().fold(0, fold),
    }
}

#[inline]
pub fn u16_be(hi: u8, lo: u8) -> u16 {
    u16::from_be_bytes([hi, lo])
}

#[inline]
pub fn u16_le(lo: u8, hi: u8) -> u16 {
    u16::from_le_bytes([lo, hi])
}

#[inline]
pub fn i16_be(hi: u8, lo: u8) -> i16 {
    i16::from_be_bytes([hi, lo])
}

#[inline]
pub fn i16_le(lo: u8, hi: u8) -> i16 {
    i16::from_le_bytes([lo, hi])
}

/// IEEE-754 `f32` a partir de 4 bytes little-endian
#[inline]
pub fn f32_le(bytes: [u8; 4]) -> f32 {
    f32::from_le_bytes(bytes)
}

/// Interpreta os `bits` inferiores de `value` como complemento de dois
pub fn to_signed(value: u64, bits: u32) -> i64 {
    if bits == 0 || bits >= 64 {
        return value as i64;
    }
    let mask = (1u64 << bits) - 1;
    let value = value & mask;
    if value & (1u64 << (bits - 1)) != 0 {
        value as i64 - (1i64 << bits)
    } else {
        value as i64
    }
}

/// Código de 20 bits alinhado à esquerda em 3 bytes: `(b0<<16 | b1<<8 | b2) >> 4`
#[inline]
pub fn u20_from_msb(b0: u8, b1: u8, b2: u8) -> u32 {
    ((u32::from(b0) << 16) | (u32::from(b1) << 8) | u32::from(b2)) >> 4
}

/// Palavra de 15 bits com flag no bit 0: `(msb<<8 | lsb) >> 1`
#[inline]
pub fn u15_drop_flag(msb: u8, lsb: u8) -> u16 {
    u16_be(msb, lsb) >> 1
}

/// Escala código bruto para unidade física: `code / full_scale · reference`
///
/// `full_scale` nunca é zero por construção.
#[inline]
pub fn scale(code: f64, full_scale: f64, reference: f64) -> f64 {
    code / full_scale * reference
}

// ═══════════════════════════════════════════════════════════════════════════════
// CRC-8 (polinômio 0x31, init 0xFF, sem reflexão)
// ═══════════════════════════════════════════════════════════════════════════════

pub const CRC8_POLYNOMIAL: u8 = 0x31;
pub const CRC8_INIT: u8 = 0xFF;

/// CRC-8 usado pelos sensores Sensirion
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = CRC8_INIT;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLYNOMIAL
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Verifica uma palavra contra o byte de CRC recebido
pub fn verify_crc8(data: &[u8], expected: u8) -> bool {
    crc8(data) == expected
}

/// O que fazer quando um CRC não confere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumPolicy {
    /// Registra aviso e retorna o valor mesmo assim
    #[default]
    Warn,
    /// Falha a amostra com `ChecksumMismatch`
    Reject,
    /// Não verifica
    Ignore,
}

impl ChecksumPolicy {
    /// Aplica a política a uma palavra `data` + `received`
    ///
    /// Retorna `Ok(true)` se o CRC confere (ou não foi verificado),
    /// `Ok(false)` se não confere mas a política permite seguir.
    pub fn check(&self, device: &str, field: &str, data: &[u8], received: u8) -> DeviceResult<bool> {
        if *self == ChecksumPolicy::Ignore {
            return Ok(true);
        }
        let computed = crc8(data);
        if computed == received {
            return Ok(true);
        }
        match self {
            ChecksumPolicy::Reject => Err(DeviceError::ChecksumMismatch {
                device: device.to_string(),
                field: field.to_string(),
                received,
                computed,
            }),
            _ => {
                warn!(
                    device,
                    field,
                    received = format_args!("0x{:02X}", received),
                    computed = format_args!("0x{:02X}", computed),
                    "CRC mismatch, keeping value"
                );
                Ok(false)
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CANAIS
// ═══════════════════════════════════════════════════════════════════════════════

/// Canal como veio da configuração (ainda não validado)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Default for ChannelValue {
    fn default() -> Self {
        ChannelValue::Integer(0)
    }
}

impl From<i64> for ChannelValue {
    fn from(v: i64) -> Self {
        ChannelValue::Integer(v)
    }
}

impl fmt::Display for ChannelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelValue::Integer(v) => write!(f, "{}", v),
            ChannelValue::Float(v) => write!(f, "{}", v),
            ChannelValue::Bool(v) => write!(f, "{}", v),
            ChannelValue::Text(v) => write!(f, "{:?}", v),
        }
    }
}

/// Faixa inclusiva de canais válidos de um dispositivo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRange {
    pub min: i64,
    pub max: i64,
}

impl ChannelRange {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, channel: i64) -> bool {
        (self.min..=self.max).contains(&channel)
    }

    /// Valida tipo e faixa, retornando o canal inteiro
    pub fn validate(&self, device: &str, value: &ChannelValue) -> Result<i64, ChannelError> {
        let ChannelValue::Integer(channel) = value else {
            return Err(ChannelError::WrongType {
                device: device.to_string(),
                value: value.to_string(),
            });
        };
        if !self.contains(*channel) {
            return Err(ChannelError::OutOfRange {
                device: device.to_string(),
                channel: *channel,
                min: self.min,
                max: self.max,
            });
        }
        Ok(*channel)
    }
}
