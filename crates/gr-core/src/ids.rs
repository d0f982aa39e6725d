use core::fmt;
use core::num::NonZeroU8;

use crate::error::{CoreError, CoreResult};

/// Identity of one rotary valve on the valve bank.
///
/// - addressed on the wire by letter (`A`..`I`)
/// - numbered 1..9 in bank order
/// - `NonZero` keeps `Option<ValveId>` the size of a byte
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "char", into = "char"))]
pub struct ValveId(NonZeroU8);

impl ValveId {
    pub const MAX: u8 = 9;

    pub const A: ValveId = ValveId::from_number_const(1);
    pub const B: ValveId = ValveId::from_number_const(2);
    pub const C: ValveId = ValveId::from_number_const(3);
    pub const D: ValveId = ValveId::from_number_const(4);
    pub const E: ValveId = ValveId::from_number_const(5);
    pub const F: ValveId = ValveId::from_number_const(6);
    pub const G: ValveId = ValveId::from_number_const(7);
    pub const H: ValveId = ValveId::from_number_const(8);
    pub const I: ValveId = ValveId::from_number_const(9);

    const fn from_number_const(n: u8) -> Self {
        match NonZeroU8::new(n) {
            Some(v) => Self(v),
            None => panic!("valve numbers start at 1"),
        }
    }

    /// Every valve on a fully populated bank, in id order.
    pub fn all() -> impl Iterator<Item = ValveId> {
        (1..=Self::MAX).filter_map(|n| Self::from_number(n).ok())
    }

    /// Valve from its 1-based bank number.
    pub fn from_number(n: u8) -> CoreResult<Self> {
        match NonZeroU8::new(n) {
            Some(v) if n <= Self::MAX => Ok(Self(v)),
            _ => Err(CoreError::InvalidValve {
                letter: char::from(b'@'.wrapping_add(n)),
            }),
        }
    }

    /// Valve from its wire letter. Lowercase letters are accepted.
    pub fn from_letter(letter: char) -> CoreResult<Self> {
        let upper = letter.to_ascii_uppercase();
        if ('A'..='I').contains(&upper) {
            Self::from_number(upper as u8 - b'A' + 1)
        } else {
            Err(CoreError::InvalidValve { letter })
        }
    }

    pub fn number(self) -> u8 {
        self.0.get()
    }

    pub fn letter(self) -> char {
        char::from(b'A' + self.0.get() - 1)
    }
}

impl TryFrom<char> for ValveId {
    type Error = CoreError;

    fn try_from(letter: char) -> Result<Self, Self::Error> {
        Self::from_letter(letter)
    }
}

impl From<ValveId> for char {
    fn from(id: ValveId) -> char {
        id.letter()
    }
}

impl fmt::Debug for ValveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Valve({})", self.letter())
    }
}

impl fmt::Display for ValveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Address of an instrument on the MFC bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct NodeId(pub u8);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}", self.0)
    }
}
