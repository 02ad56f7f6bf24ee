//! Binary TCP command set shared by the ETH002/008/484/8020/044 modules.
//!
//! Every request is a single write of an opcode followed by its argument
//! bytes; the module answers with a fixed-length reply.

use std::fmt;
use std::time::Duration;

use crate::error::{RelayError, RelayResult};

use super::{Model, ModuleInfo};

pub const GET_MODULE_INFO: u8 = 0x10;
pub const DIGITAL_ACTIVE: u8 = 0x20;
pub const DIGITAL_INACTIVE: u8 = 0x21;
pub const DIGITAL_SET_OUTPUTS: u8 = 0x23;
pub const DIGITAL_GET_OUTPUTS: u8 = 0x24;
pub const DIGITAL_GET_INPUTS: u8 = 0x25;
pub const GET_ANALOGUE_VOLTAGE: u8 = 0x32;
pub const GET_SERIAL_NUMBER: u8 = 0x77;
pub const GET_VOLTS: u8 = 0x78;
pub const PASSWORD_ENTRY: u8 = 0x79;
pub const GET_UNLOCK_TIME: u8 = 0x7a;
pub const LOG_OUT: u8 = 0x7b;

/// Reply byte to a password entry that was accepted.
pub const PASSWORD_ACCEPTED: u8 = 1;

/// Pulse times are counted in 100ms ticks.
pub const PULSE_TICK: Duration = Duration::from_millis(100);

#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    ModuleInfo,
    /// Energize `relay`; `pulse` ticks later it reverts, 0 = stay on
    DigitalActive { relay: u8, pulse: u8 },
    DigitalInactive { relay: u8, pulse: u8 },
    SetOutputs([u8; 3]),
    GetOutputs,
    GetInputs,
    AnalogueVoltage { channel: u8 },
    SerialNumber,
    Volts,
    Password(String),
    UnlockTime,
    LogOut,
}

impl Command {
    pub fn opcode(&self) -> u8 {
        match self {
            Command::ModuleInfo => GET_MODULE_INFO,
            Command::DigitalActive { .. } => DIGITAL_ACTIVE,
            Command::DigitalInactive { .. } => DIGITAL_INACTIVE,
            Command::SetOutputs(_) => DIGITAL_SET_OUTPUTS,
            Command::GetOutputs => DIGITAL_GET_OUTPUTS,
            Command::GetInputs => DIGITAL_GET_INPUTS,
            Command::AnalogueVoltage { .. } => GET_ANALOGUE_VOLTAGE,
            Command::SerialNumber => GET_SERIAL_NUMBER,
            Command::Volts => GET_VOLTS,
            Command::Password(_) => PASSWORD_ENTRY,
            Command::UnlockTime => GET_UNLOCK_TIME,
            Command::LogOut => LOG_OUT,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut frame = vec![self.opcode()];
        match self {
            Command::DigitalActive { relay, pulse } | Command::DigitalInactive { relay, pulse } => {
                frame.push(*relay);
                frame.push(*pulse);
            }
            Command::SetOutputs(bytes) => frame.extend_from_slice(bytes),
            Command::AnalogueVoltage { channel } => frame.push(*channel),
            Command::Password(password) => frame.extend_from_slice(password.as_bytes()),
            _ => {}
        }
        frame
    }

    /// Number of bytes the module sends back.
    pub fn response_len(&self) -> usize {
        match self {
            Command::ModuleInfo | Command::GetOutputs => 3,
            Command::GetInputs => 4,
            Command::AnalogueVoltage { .. } => 2,
            Command::SerialNumber => 6,
            _ => 1,
        }
    }
}

// Password bytes stay out of logs.
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Password(_) => write!(f, "Password(***)"),
            Command::DigitalActive { relay, pulse } => {
                write!(f, "DigitalActive {{ relay: {relay}, pulse: {pulse} }}")
            }
            Command::DigitalInactive { relay, pulse } => {
                write!(f, "DigitalInactive {{ relay: {relay}, pulse: {pulse} }}")
            }
            Command::SetOutputs(bytes) => write!(f, "SetOutputs({bytes:02x?})"),
            Command::AnalogueVoltage { channel } => {
                write!(f, "AnalogueVoltage {{ channel: {channel} }}")
            }
            other => write!(f, "Command(0x{:02x})", other.opcode()),
        }
    }
}

/// Convert a pulse duration into ticks, rounding to the nearest 100ms.
pub fn pulse_ticks(duration: Duration) -> RelayResult<u8> {
    let ticks = (duration.as_millis() + PULSE_TICK.as_millis() / 2) / PULSE_TICK.as_millis();
    match u8::try_from(ticks) {
        Ok(0) | Err(_) => Err(RelayError::InvalidPulse(duration)),
        Ok(ticks) => Ok(ticks),
    }
}

/// Output commands reply with a single byte, 0 for success.
pub fn check_ack(command: &Command, reply: u8) -> RelayResult<()> {
    if reply != 0 {
        return Err(RelayError::Protocol(format!(
            "module rejected {command:?} (reply 0x{reply:02x})"
        )));
    }
    Ok(())
}

pub fn decode_module_info(reply: &[u8]) -> RelayResult<ModuleInfo> {
    let [id, hardware_version, firmware_version] = reply else {
        return Err(RelayError::Protocol(format!(
            "module info reply must be 3 bytes, got {}",
            reply.len()
        )));
    };
    let model = Model::from_id(*id).ok_or(RelayError::UnknownModule(*id))?;
    Ok(ModuleInfo {
        model,
        hardware_version: *hardware_version,
        firmware_version: *firmware_version,
    })
}

/// The input reply carries three zero bytes, then one bit per input.
pub fn decode_inputs(reply: &[u8], count: u8) -> RelayResult<Vec<bool>> {
    let Some(bits) = reply.get(3) else {
        return Err(RelayError::Protocol(format!(
            "input reply must be 4 bytes, got {}",
            reply.len()
        )));
    };
    Ok((0..count.min(8)).map(|i| bits & (1 << i) != 0).collect())
}

/// Analogue readings are a big-endian u16.
pub fn decode_analogue(reply: &[u8]) -> RelayResult<u16> {
    <[u8; 2]>::try_from(reply)
        .map(u16::from_be_bytes)
        .map_err(|_| {
            RelayError::Protocol(format!(
                "analogue reply must be 2 bytes, got {}",
                reply.len()
            ))
        })
}

/// Supply voltage comes back in tenths of a volt.
pub fn decode_volts(reply: &[u8]) -> RelayResult<f32> {
    <[u8; 1]>::try_from(reply)
        .map(|[tenths]| f32::from(tenths) / 10.0)
        .map_err(|_| {
            RelayError::Protocol(format!("volts reply must be 1 byte, got {}", reply.len()))
        })
}
