//! Erros do núcleo Sensa
//!
//! | Erro | Origem | Política |
//! |:-----|:-------|:---------|
//! | [`BusError`] | transporte | fatal para a amostra, propagado |
//! | [`DeviceError::DeviceMismatch`] | `initialise` | fatal, aborta a stack |
//! | [`ChannelError`] | configuração | fatal, surge na primeira amostra |
//! | [`DeviceError::ChecksumMismatch`] | decodificação | só com [`ChecksumPolicy::Reject`](crate::codec::ChecksumPolicy) |
//! | [`CalculationError`] | módulo de cálculo | contido pelo pipeline |

use thiserror::Error;

use crate::bus::BusKind;

pub type BusResult<T> = Result<T, BusError>;
pub type DeviceResult<T> = Result<T, DeviceError>;
pub type CalculationResult<T> = Result<T, CalculationError>;

/// Erro de barramento
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BusError {
    /// Dispositivo não respondeu (NACK)
    #[error("No acknowledge from device 0x{address:02X}")]
    NoAcknowledge { address: u8 },

    /// Transação retornou menos bytes que o pedido
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// Falha de transporte (I/O do sistema operacional, socket, etc.)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Exceção Modbus
    #[error("Modbus exception 0x{code:02X} from slave {slave}")]
    Modbus { slave: u8, code: u8 },

    /// Quadro malformado
    #[error("Malformed frame: {0}")]
    Frame(String),

    /// ID de dispositivo inexistente no barramento
    #[error("Device not found on bus: {0}")]
    DeviceNotFound(String),

    /// Operação não suportada por este barramento
    #[error("Operation not supported by this bus: {0}")]
    Unsupported(String),
}

impl From<std::io::Error> for BusError {
    fn from(err: std::io::Error) -> Self {
        BusError::Transport(err.to_string())
    }
}

/// Erro de canal (configuração)
///
/// Tipo errado e fora de faixa são dois tipos distintos.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChannelError {
    #[error("{device}: channel {value} is not an integer")]
    WrongType { device: String, value: String },

    #[error("{device}: channel {channel} outside {min}..={max}")]
    OutOfRange {
        device: String,
        channel: i64,
        min: i64,
        max: i64,
    },
}

/// Erro de dispositivo
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeviceError {
    /// `sample` chamado antes de `initialise`
    #[error("Device not initialised: {0}")]
    NotInitialised(String),

    /// Barramento de tipo errado entregue ao dispositivo
    #[error("{device}: expected {expected} interface, got {found}")]
    WrongInterface {
        device: String,
        expected: BusKind,
        found: BusKind,
    },

    /// Chip conectado não é o esperado
    #[error("{device}: device mismatch, expected {expected}, found {found}")]
    DeviceMismatch {
        device: String,
        expected: String,
        found: String,
    },

    #[error("Invalid channel: {0}")]
    InvalidChannel(#[from] ChannelError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// CRC não confere (só emitido com política `Reject`)
    #[error("{device}: checksum mismatch on {field} (received 0x{received:02X}, computed 0x{computed:02X})")]
    ChecksumMismatch {
        device: String,
        field: String,
        received: u8,
        computed: u8,
    },

    /// Bytes recebidos não decodificam
    #[error("Decode error: {0}")]
    Decode(String),

    /// Dispositivo sinalizou que os dados não estão prontos
    #[error("Data not ready: {0}")]
    NotReady(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Erro de módulo de cálculo
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalculationError {
    /// Variável de entrada ausente no blackboard
    #[error("{module}: required variable '{variable}' not found in blackboard")]
    InputMissing { module: String, variable: String },

    /// Variável presente mas inutilizável
    #[error("{module}: invalid input '{variable}': {reason}")]
    InvalidInput {
        module: String,
        variable: String,
        reason: String,
    },

    #[error("Calculation failed: {0}")]
    Failed(String),
}
