//! Parameter addressing on the MFC bus.

use gr_core::NodeId;

/// Wire type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Int8,
    Int16,
    Float,
}

/// Process/parameter pair plus its wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamAddr {
    pub process: u8,
    pub parameter: u8,
    pub kind: ParamType,
}

impl ParamAddr {
    /// Measured flow (or pressure on pressure controllers), sccm / psia.
    pub const MEASURED: ParamAddr = ParamAddr::new(33, 0, ParamType::Float);
    /// Active setpoint in engineering units.
    pub const SETPOINT: ParamAddr = ParamAddr::new(33, 3, ParamType::Float);
    /// Selected calibration curve.
    pub const ACTIVE_CURVE: ParamAddr = ParamAddr::new(1, 16, ParamType::Int8);
    /// Setpoint as a fraction of full scale (0..=32000).
    pub const SETPOINT_CODE: ParamAddr = ParamAddr::new(1, 1, ParamType::Int16);

    pub const fn new(process: u8, parameter: u8, kind: ParamType) -> Self {
        Self {
            process,
            parameter,
            kind,
        }
    }

    pub fn at(self, node: NodeId) -> ParamRead {
        ParamRead { node, addr: self }
    }

    pub fn write(self, node: NodeId, data: ParamData) -> ParamWrite {
        ParamWrite {
            node,
            addr: self,
            data,
        }
    }
}

/// One parameter to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamRead {
    pub node: NodeId,
    pub addr: ParamAddr,
}

/// One parameter to write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamWrite {
    pub node: NodeId,
    pub addr: ParamAddr,
    pub data: ParamData,
}

/// Parameter payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamData {
    Int(i64),
    Float(f64),
}

impl ParamData {
    pub fn as_f64(self) -> f64 {
        match self {
            ParamData::Int(v) => v as f64,
            ParamData::Float(v) => v,
        }
    }

    /// Integer view; floats are accepted when they carry an integral value.
    pub fn as_int(self) -> Option<i64> {
        match self {
            ParamData::Int(v) => Some(v),
            ParamData::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(v as i64),
            ParamData::Float(_) => None,
        }
    }
}
