pub mod client;
pub mod protocol;
pub(crate) mod session;

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::error::{RelayError, RelayResult};

/// `true` = closed (energized), `false` = open.
pub type RelayState = bool;

/// Static description of an ETH module family member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Model {
    pub id: u8,
    pub name: &'static str,
    pub relays: u8,
    pub digital_io: u8,
    pub analogue_inputs: u8,
}

pub const MODELS: &[Model] = &[
    Model { id: 18, name: "ETH002", relays: 2, digital_io: 0, analogue_inputs: 0 },
    Model { id: 19, name: "ETH008", relays: 8, digital_io: 0, analogue_inputs: 0 },
    Model { id: 20, name: "ETH484", relays: 4, digital_io: 8, analogue_inputs: 4 },
    Model { id: 21, name: "ETH8020", relays: 20, digital_io: 0, analogue_inputs: 8 },
    Model { id: 29, name: "ETH044", relays: 4, digital_io: 4, analogue_inputs: 0 },
];

impl Model {
    pub fn from_id(id: u8) -> Option<Model> {
        MODELS.iter().find(|m| m.id == id).copied()
    }

    pub fn check_relay(&self, index: u8) -> RelayResult<()> {
        if index == 0 || index > self.relays {
            return Err(RelayError::InvalidRelay {
                index,
                count: self.relays,
            });
        }
        Ok(())
    }
}

/// Reply to the "get module info" command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    pub model: Model,
    pub hardware_version: u8,
    pub firmware_version: u8,
}

/// Reply to the "get unlock time" command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockStatus {
    /// Password protection is on and this connection has not entered it yet
    Locked,
    /// Password protection is off entirely
    PasswordDisabled,
    /// Unlocked; the module re-locks after this many idle seconds
    Unlocked { seconds: u8 },
}

impl From<u8> for UnlockStatus {
    fn from(byte: u8) -> Self {
        match byte {
            0 => UnlockStatus::Locked,
            255 => UnlockStatus::PasswordDisabled,
            seconds => UnlockStatus::Unlocked { seconds },
        }
    }
}

/// Most relays the 3-byte output bitmask can address.
pub const MAX_RELAYS: u8 = 24;

/// Output state of every relay on a module. Bit 0 is relay 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStates {
    bits: u32,
    count: u8,
}

impl RelayStates {
    /// All relays open. `count` is capped at [`MAX_RELAYS`].
    pub fn new(count: u8) -> Self {
        Self {
            bits: 0,
            count: count.min(MAX_RELAYS),
        }
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn get(&self, index: u8) -> Option<RelayState> {
        if index == 0 || index > self.count {
            return None;
        }
        Some(self.bits & (1 << (index - 1)) != 0)
    }

    pub fn set(&mut self, index: u8, state: RelayState) -> RelayResult<()> {
        if index == 0 || index > self.count {
            return Err(RelayError::InvalidRelay {
                index,
                count: self.count,
            });
        }
        if state {
            self.bits |= 1 << (index - 1);
        } else {
            self.bits &= !(1 << (index - 1));
        }
        Ok(())
    }

    /// Decode the 3-byte output bitmask; bits past `count` are dropped.
    pub fn from_wire(bytes: [u8; 3], count: u8) -> Self {
        let count = count.min(MAX_RELAYS);
        let raw = u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16);
        Self {
            bits: raw & ((1u32 << count) - 1),
            count,
        }
    }

    pub fn to_wire(&self) -> [u8; 3] {
        [
            (self.bits & 0xff) as u8,
            ((self.bits >> 8) & 0xff) as u8,
            ((self.bits >> 16) & 0xff) as u8,
        ]
    }

    /// `(index, state)` pairs in relay order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, RelayState)> + '_ {
        (1..=self.count).map(move |i| (i, self.bits & (1 << (i - 1)) != 0))
    }
}

impl Serialize for RelayStates {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.count as usize))?;
        for (index, state) in self.iter() {
            map.serialize_entry(&index, &state)?;
        }
        map.end()
    }
}
