//! # Parameter store
//!
//! The store holds the operator's controller-tuning and vehicle-constraint
//! values in two layers:
//!
//! - the *staged* set, edited one field at a time in operator units (steps,
//!   seconds, degrees, km/h),
//! - the *active* configuration, published in SI units and consumed by the
//!   simulation manager.
//!
//! Edits never leak into the active configuration on their own. Only
//! [`ParamStore::apply`] publishes, and it validates the complete staged set
//! as a unit first: if any field is invalid nothing changes and the first
//! offending field is reported. Unit conversion happens exactly once, inside
//! `apply`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The tuning parameters of the tracking controller, in SI units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerParameters {
    /// Number of future steps the controller optimises over
    pub horizon: u32,

    /// Discretisation time step
    pub time_step_s: f64,

    /// State cost weight on x position
    pub weight_x: f64,

    /// State cost weight on y position
    pub weight_y: f64,

    /// State cost weight on speed
    pub weight_speed: f64,

    /// State cost weight on yaw
    pub weight_yaw: f64,

    /// Input cost weight on acceleration
    pub weight_accel: f64,

    /// Input cost weight on steering
    pub weight_steer: f64,

    /// Input rate cost weight on acceleration change
    pub weight_accel_rate: f64,

    /// Input rate cost weight on steering change
    pub weight_steer_rate: f64,

    /// Cap on solver iterations per decision point
    pub max_iter: u32,
}

/// The physical limits of the simulated vehicle, in SI units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleConstraints {
    /// Maximum steering angle
    pub max_steer_rad: f64,

    /// Maximum steering rate
    pub max_steer_rate_rads: f64,

    /// Maximum speed
    pub max_speed_ms: f64,

    /// Maximum acceleration
    pub max_accel_mss: f64,

    /// Distance between the front and rear axles
    pub wheelbase_m: f64,
}

/// The published configuration consumed by the simulation manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveConfig {
    pub ctrl: ControllerParameters,
    pub constraints: VehicleConstraints,
}

/// The parameter store itself.
#[derive(Debug, Clone)]
pub struct ParamStore {
    staged: StagedParams,
    active: ActiveConfig,
}

/// The staged parameter set in operator units. Field order matches the
/// operator-facing field list.
#[derive(Debug, Clone, PartialEq)]
struct StagedParams {
    horizon: f64,
    time_step: f64,
    weight_x: f64,
    weight_y: f64,
    weight_speed: f64,
    weight_yaw: f64,
    weight_accel: f64,
    weight_steer: f64,
    weight_accel_rate: f64,
    weight_steer_rate: f64,
    max_iter: f64,
    max_steer_deg: f64,
    max_steer_rate_degs: f64,
    max_speed_kmh: f64,
    max_accel_mss: f64,
    wheelbase_m: f64,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum ParamError {
    /// A parameter value failed parsing or violated its bound. The field
    /// name identifies the offender.
    #[error("Invalid parameter {field:?}: {reason}")]
    InvalidParameter { field: String, reason: String },
}

/// The bound attached to each parameter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    /// Integer-valued, at least one (horizon, iteration cap)
    AtLeastOne,

    /// Strictly positive (time step, physical limits)
    Positive,

    /// Zero or greater (cost weights)
    NonNegative,
}

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// All operator-settable fields with their bounds, in validation order.
/// Validation failures report the first offender in this order.
const FIELDS: [(&str, Bound); 16] = [
    ("horizon", Bound::AtLeastOne),
    ("time_step", Bound::Positive),
    ("weight_x", Bound::NonNegative),
    ("weight_y", Bound::NonNegative),
    ("weight_speed", Bound::NonNegative),
    ("weight_yaw", Bound::NonNegative),
    ("weight_accel", Bound::NonNegative),
    ("weight_steer", Bound::NonNegative),
    ("weight_accel_rate", Bound::NonNegative),
    ("weight_steer_rate", Bound::NonNegative),
    ("max_iter", Bound::AtLeastOne),
    ("max_steer_deg", Bound::Positive),
    ("max_steer_rate_degs", Bound::Positive),
    ("max_speed_kmh", Bound::Positive),
    ("max_accel_mss", Bound::Positive),
    ("wheelbase_m", Bound::Positive),
];

/// km/h per m/s
const KMH_PER_MS: f64 = 3.6;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ParamStore {
    /// Create a store holding the built-in defaults, both staged and active.
    pub fn new() -> Self {
        let staged = StagedParams::default();

        // Defaults satisfy every bound, so conversion cannot fail
        let active = staged
            .to_active()
            .expect("Default parameters must be valid");

        Self { staged, active }
    }

    /// Stage a new value for the named field.
    ///
    /// The raw text is parsed and checked against the field's bound, but the
    /// active configuration is untouched until [`ParamStore::apply`].
    pub fn set_field(&mut self, name: &str, raw_value: &str) -> Result<(), ParamError> {
        let bound = match FIELDS.iter().find(|(n, _)| *n == name) {
            Some((_, b)) => *b,
            None => {
                return Err(ParamError::InvalidParameter {
                    field: name.to_string(),
                    reason: "unknown parameter".to_string(),
                })
            }
        };

        let value: f64 = match raw_value.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                return Err(ParamError::InvalidParameter {
                    field: name.to_string(),
                    reason: format!("{:?} is not a number", raw_value),
                })
            }
        };

        bound.check(value).map_err(|reason| ParamError::InvalidParameter {
            field: name.to_string(),
            reason,
        })?;

        // The unwrap is safe, the name was found in FIELDS above
        *self.staged.field_mut(name).unwrap() = value;

        Ok(())
    }

    /// Get the staged value of the named field, in operator units.
    pub fn staged_value(&self, name: &str) -> Option<f64> {
        self.staged.field(name)
    }

    /// Restore the built-in default set. Cannot fail and replaces the whole
    /// staged set atomically.
    pub fn reset_to_defaults(&mut self) {
        self.staged = StagedParams::default();
    }

    /// Validate the complete staged set and, if every field is valid,
    /// publish it as the active configuration.
    ///
    /// On failure the previously active configuration is untouched and the
    /// first offending field is named. Unit conversion (degrees to radians,
    /// km/h to m/s) happens here and only here.
    pub fn apply(&mut self) -> Result<ActiveConfig, ParamError> {
        let active = self.staged.to_active()?;
        self.active = active.clone();
        Ok(active)
    }

    /// The currently active configuration.
    pub fn active(&self) -> &ActiveConfig {
        &self.active
    }
}

impl Default for ParamStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StagedParams {
    /// Validate every field in order and convert to the SI active
    /// configuration.
    fn to_active(&self) -> Result<ActiveConfig, ParamError> {
        for (name, bound) in FIELDS.iter() {
            // The unwrap is safe, FIELDS names are exactly the struct fields
            let value = self.field(name).unwrap();

            bound.check(value).map_err(|reason| ParamError::InvalidParameter {
                field: name.to_string(),
                reason,
            })?;
        }

        Ok(ActiveConfig {
            ctrl: ControllerParameters {
                horizon: self.horizon.round() as u32,
                time_step_s: self.time_step,
                weight_x: self.weight_x,
                weight_y: self.weight_y,
                weight_speed: self.weight_speed,
                weight_yaw: self.weight_yaw,
                weight_accel: self.weight_accel,
                weight_steer: self.weight_steer,
                weight_accel_rate: self.weight_accel_rate,
                weight_steer_rate: self.weight_steer_rate,
                max_iter: self.max_iter.round() as u32,
            },
            constraints: VehicleConstraints {
                max_steer_rad: self.max_steer_deg.to_radians(),
                max_steer_rate_rads: self.max_steer_rate_degs.to_radians(),
                max_speed_ms: self.max_speed_kmh / KMH_PER_MS,
                max_accel_mss: self.max_accel_mss,
                wheelbase_m: self.wheelbase_m,
            },
        })
    }

    fn field(&self, name: &str) -> Option<f64> {
        Some(match name {
            "horizon" => self.horizon,
            "time_step" => self.time_step,
            "weight_x" => self.weight_x,
            "weight_y" => self.weight_y,
            "weight_speed" => self.weight_speed,
            "weight_yaw" => self.weight_yaw,
            "weight_accel" => self.weight_accel,
            "weight_steer" => self.weight_steer,
            "weight_accel_rate" => self.weight_accel_rate,
            "weight_steer_rate" => self.weight_steer_rate,
            "max_iter" => self.max_iter,
            "max_steer_deg" => self.max_steer_deg,
            "max_steer_rate_degs" => self.max_steer_rate_degs,
            "max_speed_kmh" => self.max_speed_kmh,
            "max_accel_mss" => self.max_accel_mss,
            "wheelbase_m" => self.wheelbase_m,
            _ => return None,
        })
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut f64> {
        Some(match name {
            "horizon" => &mut self.horizon,
            "time_step" => &mut self.time_step,
            "weight_x" => &mut self.weight_x,
            "weight_y" => &mut self.weight_y,
            "weight_speed" => &mut self.weight_speed,
            "weight_yaw" => &mut self.weight_yaw,
            "weight_accel" => &mut self.weight_accel,
            "weight_steer" => &mut self.weight_steer,
            "weight_accel_rate" => &mut self.weight_accel_rate,
            "weight_steer_rate" => &mut self.weight_steer_rate,
            "max_iter" => &mut self.max_iter,
            "max_steer_deg" => &mut self.max_steer_deg,
            "max_steer_rate_degs" => &mut self.max_steer_rate_degs,
            "max_speed_kmh" => &mut self.max_speed_kmh,
            "max_accel_mss" => &mut self.max_accel_mss,
            "wheelbase_m" => &mut self.wheelbase_m,
            _ => return None,
        })
    }
}

impl Default for StagedParams {
    fn default() -> Self {
        Self {
            horizon: 5.0,
            time_step: 0.2,
            weight_x: 1.0,
            weight_y: 1.0,
            weight_speed: 0.5,
            weight_yaw: 0.5,
            weight_accel: 0.01,
            weight_steer: 0.01,
            weight_accel_rate: 0.01,
            weight_steer_rate: 1.0,
            max_iter: 3.0,
            max_steer_deg: 45.0,
            max_steer_rate_degs: 30.0,
            max_speed_kmh: 55.0,
            max_accel_mss: 1.0,
            wheelbase_m: 2.5,
        }
    }
}

impl Bound {
    /// Check a value against the bound, producing the reason on failure.
    fn check(&self, value: f64) -> Result<(), String> {
        if !value.is_finite() {
            return Err(format!("{} is not finite", value));
        }

        match self {
            Bound::AtLeastOne => {
                if value < 1.0 {
                    return Err(format!("{} is less than 1", value));
                }
            }
            Bound::Positive => {
                if value <= 0.0 {
                    return Err(format!("{} is not positive", value));
                }
            }
            Bound::NonNegative => {
                if value < 0.0 {
                    return Err(format!("{} is negative", value));
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const PI: f64 = std::f64::consts::PI;

    #[test]
    fn test_defaults_active_on_creation() {
        let store = ParamStore::new();
        let active = store.active();

        assert_eq!(active.ctrl.horizon, 5);
        assert!((active.ctrl.time_step_s - 0.2).abs() < 1e-12);
        assert_eq!(active.ctrl.max_iter, 3);
        assert!((active.constraints.max_steer_rad - 45f64.to_radians()).abs() < 1e-12);
        assert!((active.constraints.wheelbase_m - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_unit_conversion_on_apply() {
        let mut store = ParamStore::new();

        store.set_field("max_steer_deg", "45").unwrap();
        store.set_field("max_speed_kmh", "36").unwrap();
        let active = store.apply().unwrap();

        assert!((active.constraints.max_steer_rad - PI / 4.0).abs() < 1e-12);
        assert!((active.constraints.max_speed_ms - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_set_field_does_not_publish() {
        let mut store = ParamStore::new();
        let before = store.active().clone();

        store.set_field("max_speed_kmh", "72").unwrap();

        // No apply yet, the active configuration must be unchanged
        assert_eq!(*store.active(), before);

        store.apply().unwrap();
        assert!((store.active().constraints.max_speed_ms - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_field_rejected_on_set() {
        let mut store = ParamStore::new();

        assert!(store.set_field("time_step", "0").is_err());
        assert!(store.set_field("time_step", "nan").is_err());
        assert!(store.set_field("weight_x", "-1").is_err());
        assert!(store.set_field("horizon", "0").is_err());
        assert!(store.set_field("no_such_field", "1").is_err());
        assert!(store.set_field("time_step", "fast").is_err());

        // None of the rejected edits stuck
        assert_eq!(store.staged_value("time_step"), Some(0.2));
        assert_eq!(store.staged_value("weight_x"), Some(1.0));
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let mut store = ParamStore::new();
        store.set_field("max_speed_kmh", "36").unwrap();
        store.apply().unwrap();
        let before = store.active().clone();

        // Force an invalid staged value past set_field by corrupting a
        // different field through the editing API, then check apply names
        // the offender and publishes nothing
        store.set_field("max_speed_kmh", "50").unwrap();
        store.staged.time_step = 0.0;

        match store.apply() {
            Err(ParamError::InvalidParameter { field, .. }) => {
                assert_eq!(field, "time_step");
            }
            other => panic!("expected InvalidParameter, got {:?}", other),
        }

        // The valid max_speed edit staged alongside the bad field must not
        // have been published either
        assert_eq!(*store.active(), before);
        assert!((store.active().constraints.max_speed_ms - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_reset_then_apply_reproduces_defaults() {
        let mut store = ParamStore::new();

        store.set_field("horizon", "12").unwrap();
        store.set_field("weight_yaw", "3.5").unwrap();
        store.set_field("max_steer_deg", "20").unwrap();
        store.apply().unwrap();

        store.reset_to_defaults();
        let active = store.apply().unwrap();

        assert_eq!(active, ParamStore::new().active().clone());
    }
}
