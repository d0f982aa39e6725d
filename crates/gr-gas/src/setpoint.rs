//! Flow validation and setpoint quantization.

use gr_core::GasId;

use crate::error::{GasError, GasResult, RangeViolation};
use crate::registry::GasChannel;

/// A requested flow after validation, with its device code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSetpoint {
    pub gas: GasId,
    /// Flow as requested, in sccm of the gas itself.
    pub requested: Option<f64>,
    /// Flow after calibration-factor conversion; 0.0 when the channel is off.
    pub validated: f64,
    pub code: u16,
}

impl FlowSetpoint {
    /// Whether the channel will carry gas, so its source must be selected.
    pub fn is_flowing(&self) -> bool {
        self.validated > 0.0
    }
}

/// Validate `flow` against `channel` and encode it for a bus with
/// `full_scale` counts.
///
/// An absent or exactly zero flow turns the channel off and skips the range
/// check. Anything else is converted with the calibration factor and must lie
/// inside the channel range; it is never clamped.
pub fn validate_flow(
    channel: &GasChannel,
    flow: Option<f64>,
    full_scale: u16,
) -> GasResult<FlowSetpoint> {
    let requested = flow;
    let flow = match flow {
        None => 0.0,
        Some(v) if !v.is_finite() => {
            return Err(GasError::InvalidFlow {
                gas: channel.gas,
                value: v,
            });
        }
        Some(v) => v,
    };

    let validated = if flow == 0.0 {
        0.0
    } else {
        let converted = flow / channel.calibration_factor;
        if !channel.range.contains(converted) {
            return Err(RangeViolation {
                gas: channel.gas,
                requested: flow,
                converted,
                min: channel.range.min,
                max: channel.range.max,
            }
            .into());
        }
        converted
    };

    Ok(FlowSetpoint {
        gas: channel.gas,
        requested,
        validated,
        code: encode_code(validated, channel.divisor, full_scale),
    })
}

/// Device code for a converted flow, rounded to the nearest count.
pub fn encode_code(converted: f64, divisor: f64, full_scale: u16) -> u16 {
    let code = (converted * f64::from(full_scale) / divisor).round();
    code.clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Flow in the gas's own units that a code corresponds to.
pub fn decode_code(code: u16, channel: &GasChannel, full_scale: u16) -> f64 {
    f64::from(code) * channel.divisor / f64::from(full_scale) * channel.calibration_factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use gr_config::FlowRange;
    use gr_core::NodeId;
    use proptest::prelude::*;

    fn co_al() -> GasChannel {
        GasChannel {
            gas: GasId::CoAL,
            node: NodeId(6),
            curve: Some(3),
            range: FlowRange::new(0.36, 18.0),
            calibration_factor: 1.0,
            divisor: 18.0,
        }
    }

    #[test]
    fn zero_and_absent_turn_off() {
        for flow in [None, Some(0.0)] {
            let sp = validate_flow(&co_al(), flow, 32000).unwrap();
            assert_eq!(sp.code, 0);
            assert!(!sp.is_flowing());
        }
    }

    #[test]
    fn below_range_is_rejected_with_bounds() {
        let err = validate_flow(&co_al(), Some(0.1), 32000).unwrap_err();
        let GasError::RangeViolation(v) = err else {
            panic!("expected range violation, got {err:?}");
        };
        assert_eq!(v.min, 0.36);
        assert_eq!(v.max, 18.0);
        assert!(v.below_minimum());
    }

    #[test]
    fn calibration_factor_applies_before_range() {
        let mut ch = co_al();
        ch.calibration_factor = 2.0;
        // 30 / 2 = 15, inside [0.36, 18]
        let sp = validate_flow(&ch, Some(30.0), 32000).unwrap();
        assert_eq!(sp.validated, 15.0);
        assert_eq!(sp.code, 26667);
        assert!(validate_flow(&ch, Some(40.0), 32000).is_err());
    }

    #[test]
    fn nan_is_not_a_flow() {
        assert!(matches!(
            validate_flow(&co_al(), Some(f64::NAN), 32000),
            Err(GasError::InvalidFlow { .. })
        ));
    }

    #[test]
    fn negative_flow_is_out_of_range() {
        assert!(matches!(
            validate_flow(&co_al(), Some(-1.0), 32000),
            Err(GasError::RangeViolation(_))
        ));
    }

    proptest! {
        #[test]
        fn quantization_within_one_step(flow in 0.36f64..=18.0) {
            let ch = co_al();
            let sp = validate_flow(&ch, Some(flow), 32000).unwrap();
            let back = decode_code(sp.code, &ch, 32000);
            let step = ch.divisor / 32000.0;
            prop_assert!((back - flow).abs() <= step);
        }

        #[test]
        fn in_range_always_accepted(flow in 0.36f64..=18.0, factor in 0.5f64..2.0) {
            let mut ch = co_al();
            ch.calibration_factor = factor;
            let requested = flow * factor;
            prop_assume!((requested / factor) >= 0.36 && (requested / factor) <= 18.0);
            prop_assert!(validate_flow(&ch, Some(requested), 32000).is_ok());
        }
    }
}
