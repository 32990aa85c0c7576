use std::fmt;

use super::wire::{Reader, Writer};
use super::CodecError;
use crate::admin::Mask;

/// Longest name or instance a v4 record may carry.
pub const MAX_NAME_LEN: usize = 39;

/// Recognized attribute slots, in wire order (highest bit first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Name,
    Instance,
    ExpDate,
    Attributes,
    MaxLife,
    DesKey,
    ModDate,
    ModName,
    ModInstance,
    KeyVersion,
}

impl Slot {
    pub const ALL: [Slot; 10] = [
        Slot::Name,
        Slot::Instance,
        Slot::ExpDate,
        Slot::Attributes,
        Slot::MaxLife,
        Slot::DesKey,
        Slot::ModDate,
        Slot::ModName,
        Slot::ModInstance,
        Slot::KeyVersion,
    ];

    /// Bit number in the presence mask.
    pub const fn bit(self) -> u32 {
        match self {
            Slot::Name => 31,
            Slot::Instance => 30,
            Slot::ExpDate => 29,
            Slot::Attributes => 28,
            Slot::MaxLife => 27,
            Slot::DesKey => 26,
            Slot::ModDate => 25,
            Slot::ModName => 24,
            Slot::ModInstance => 23,
            Slot::KeyVersion => 22,
        }
    }

    pub fn from_bit(bit: u32) -> Option<Slot> {
        Self::ALL.into_iter().find(|slot| slot.bit() == bit)
    }

    /// Capability an attribute in this slot reads or writes.
    pub fn capability(self) -> Mask {
        match self {
            Slot::Name | Slot::Instance => Mask::PRINCIPAL,
            Slot::ExpDate => Mask::PW_EXPIRATION,
            Slot::Attributes => Mask::ATTRIBUTES,
            Slot::MaxLife => Mask::MAX_LIFE,
            Slot::DesKey | Slot::KeyVersion => Mask::KEY_DATA,
            Slot::ModDate => Mask::MOD_TIME,
            Slot::ModName | Slot::ModInstance => Mask::MOD_NAME,
        }
    }
}

/// 32-bit field-presence set as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PresenceMask(pub u32);

impl PresenceMask {
    pub fn from_slots(slots: impl IntoIterator<Item = Slot>) -> Self {
        PresenceMask(slots.into_iter().fold(0, |acc, slot| acc | (1 << slot.bit())))
    }

    /// Decodes the four selection bytes of a get request, which arrive
    /// least-significant byte first unlike every other mask on the wire.
    pub fn from_selection_bytes(wire: [u8; 4]) -> Self {
        let [b3, b2, b1, b0] = wire;
        PresenceMask(u32::from_be_bytes([b0, b1, b2, b3]))
    }

    pub fn contains(self, slot: Slot) -> bool {
        self.0 & (1 << slot.bit()) != 0
    }

    /// Recognized slots that are set, highest bit first. Unknown bits are
    /// skipped.
    pub fn slots(self) -> impl Iterator<Item = Slot> {
        Slot::ALL.into_iter().filter(move |slot| self.contains(*slot))
    }
}

/// The two 32-bit halves of a DES key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DesKey {
    pub high: u32,
    pub low: u32,
}

impl DesKey {
    pub fn from_bytes(raw: [u8; 8]) -> Self {
        let [a, b, c, d, e, f, g, h] = raw;
        DesKey {
            high: u32::from_be_bytes([a, b, c, d]),
            low: u32::from_be_bytes([e, f, g, h]),
        }
    }

    pub fn to_bytes(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.high.to_be_bytes());
        out[4..].copy_from_slice(&self.low.to_be_bytes());
        out
    }
}

impl fmt::Debug for DesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DesKey(<redacted>)")
    }
}

/// Fixed-field v4 principal record. A slot is present exactly when its
/// field is `Some`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyRecord {
    pub name: Option<String>,
    pub instance: Option<String>,
    pub exp_date: Option<i32>,
    pub attributes: Option<u16>,
    pub max_life: Option<u8>,
    pub des_key: Option<DesKey>,
    pub mod_date: Option<i32>,
    pub mod_name: Option<String>,
    pub mod_instance: Option<String>,
    pub key_version: Option<u8>,
}

impl LegacyRecord {
    pub fn has(&self, slot: Slot) -> bool {
        match slot {
            Slot::Name => self.name.is_some(),
            Slot::Instance => self.instance.is_some(),
            Slot::ExpDate => self.exp_date.is_some(),
            Slot::Attributes => self.attributes.is_some(),
            Slot::MaxLife => self.max_life.is_some(),
            Slot::DesKey => self.des_key.is_some(),
            Slot::ModDate => self.mod_date.is_some(),
            Slot::ModName => self.mod_name.is_some(),
            Slot::ModInstance => self.mod_instance.is_some(),
            Slot::KeyVersion => self.key_version.is_some(),
        }
    }

    pub fn presence(&self) -> PresenceMask {
        PresenceMask::from_slots(Slot::ALL.into_iter().filter(|slot| self.has(*slot)))
    }

    /// Decodes one record from the front of `reader`.
    pub fn read_from(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let presence = PresenceMask(reader.u32("presence mask")?);
        let mut record = LegacyRecord::default();
        for slot in presence.slots() {
            match slot {
                Slot::Name => record.name = Some(reader.string("name", MAX_NAME_LEN)?),
                Slot::Instance => record.instance = Some(reader.string("instance", MAX_NAME_LEN)?),
                Slot::ExpDate => record.exp_date = Some(reader.i32("expiration date")?),
                Slot::Attributes => record.attributes = Some(reader.u16("attributes")?),
                Slot::MaxLife => record.max_life = Some(reader.u8("max life")?),
                Slot::DesKey => {
                    let high = reader.u32("key high")?;
                    let low = reader.u32("key low")?;
                    record.des_key = Some(DesKey { high, low });
                }
                Slot::ModDate => record.mod_date = Some(reader.i32("modification date")?),
                Slot::ModName => record.mod_name = Some(reader.string("modifier name", MAX_NAME_LEN)?),
                Slot::ModInstance => {
                    record.mod_instance = Some(reader.string("modifier instance", MAX_NAME_LEN)?)
                }
                Slot::KeyVersion => record.key_version = Some(reader.u8("key version")?),
            }
        }
        Ok(record)
    }

    pub fn write_to(&self, writer: &mut Writer) {
        let presence = self.presence();
        writer.u32(presence.0);
        for slot in presence.slots() {
            match slot {
                Slot::Name => writer.string(self.name.as_deref().unwrap_or_default()),
                Slot::Instance => writer.string(self.instance.as_deref().unwrap_or_default()),
                Slot::ExpDate => writer.i32(self.exp_date.unwrap_or_default()),
                Slot::Attributes => writer.u16(self.attributes.unwrap_or_default()),
                Slot::MaxLife => writer.u8(self.max_life.unwrap_or_default()),
                Slot::DesKey => {
                    let key = self.des_key.unwrap_or(DesKey { high: 0, low: 0 });
                    writer.u32(key.high).u32(key.low)
                }
                Slot::ModDate => writer.i32(self.mod_date.unwrap_or_default()),
                Slot::ModName => writer.string(self.mod_name.as_deref().unwrap_or_default()),
                Slot::ModInstance => writer.string(self.mod_instance.as_deref().unwrap_or_default()),
                Slot::KeyVersion => writer.u8(self.key_version.unwrap_or_default()),
            };
        }
    }

    /// Decodes a record and reports how many bytes it occupied.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), CodecError> {
        let mut reader = Reader::new(bytes);
        let record = Self::read_from(&mut reader)?;
        Ok((record, reader.position()))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        self.write_to(&mut writer);
        writer.into_bytes()
    }
}
