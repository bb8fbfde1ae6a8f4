//! Typed, named, validated access to the plant state.
//!
//! Three disjoint groups (`config`, `state`, `target`) of field descriptors,
//! each binding a registry key to one `PlantState` location together with a
//! readonly flag, a validator, and an update hook that routes committed
//! values into the motion controller. Explicit registration tables keep
//! every field testable in isolation.

use crate::error::{Fault, ValidationError};
use crate::state::PlantState;

/// Side effects a committed field applies to the motion layer.
///
/// `trgt_v` and `trgt_a` deliberately have no hook: position control is the
/// only implemented target mode.
pub trait MotionHooks {
    fn set_max_speed(&mut self, v: f32);
    fn set_max_accel(&mut self, a: f32);
    fn set_target_position(&mut self, x: f32);
    fn set_debug_led(&mut self, on: bool);
}

/// Tagged field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Float(f32),
    Bool(bool),
    Fault(Fault),
}

impl Value {
    /// Canonical wire format: `%.5f` floats, `true`/`false` bools, integer
    /// fault codes.
    pub fn format(&self) -> String {
        match self {
            Value::Float(v) => format!("{v:.5}"),
            Value::Bool(true) => "true".to_string(),
            Value::Bool(false) => "false".to_string(),
            Value::Fault(f) => f.code().to_string(),
        }
    }

    fn float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Float,
    Bool,
    Fault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateHook {
    None,
    MaxSpeed,
    MaxAccel,
    TargetPosition,
    DebugLed,
}

type Getter = fn(&PlantState) -> Value;
type Setter = fn(&mut PlantState, Value);
/// Validators may clamp the value and may record a fault as a side effect
/// (target overflow validators do) before the error propagates.
type Validator = fn(&mut PlantState, Value) -> Result<Value, ValidationError>;

struct FieldDef {
    name: &'static str,
    kind: FieldKind,
    readonly: bool,
    get: Getter,
    set: Setter,
    validate: Validator,
    hook: UpdateHook,
}

fn parse(kind: FieldKind, text: &str) -> Result<Value, ValidationError> {
    match kind {
        FieldKind::Float => {
            let v: f32 = text
                .parse()
                .map_err(|_| ValidationError::Parse(text.to_string()))?;
            if !v.is_finite() {
                return Err(ValidationError::NonFinite);
            }
            Ok(Value::Float(v))
        }
        FieldKind::Bool => match text {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(ValidationError::Parse(text.to_string())),
        },
        // Fault fields are readonly; prepare rejects them before parsing.
        FieldKind::Fault => Err(ValidationError::Parse(text.to_string())),
    }
}

fn validate_range(value: f32, min: f32, max: f32, clamp: bool) -> Result<f32, ValidationError> {
    if value < min {
        if clamp {
            return Ok(min);
        }
        return Err(ValidationError::BelowRange { value, min });
    }
    if value > max {
        if clamp {
            return Ok(max);
        }
        return Err(ValidationError::AboveRange { value, max });
    }
    Ok(value)
}

fn accept(_state: &mut PlantState, value: Value) -> Result<Value, ValidationError> {
    Ok(value)
}

fn expect_float(value: Value) -> Result<f32, ValidationError> {
    value
        .float()
        .ok_or_else(|| ValidationError::Parse(value.format()))
}

fn v_max_x(state: &mut PlantState, value: Value) -> Result<Value, ValidationError> {
    let v = expect_float(value)?;
    validate_range(v, 0.0, state.hw_max_x, false).map(Value::Float)
}

fn v_max_v(state: &mut PlantState, value: Value) -> Result<Value, ValidationError> {
    let v = expect_float(value)?;
    validate_range(v, 0.0, state.hw_max_v, false).map(Value::Float)
}

fn v_max_a(state: &mut PlantState, value: Value) -> Result<Value, ValidationError> {
    let v = expect_float(value)?;
    validate_range(v, 0.0, state.hw_max_a, false).map(Value::Float)
}

/// Targets are only accepted while the plant is fault-free; a range
/// violation additionally records the matching overflow fault.
fn gate_target(
    state: &mut PlantState,
    value: Value,
    limit: f32,
    clamp: bool,
    overflow: Fault,
) -> Result<Value, ValidationError> {
    let v = expect_float(value)?;
    if state.errcode != Fault::NoError {
        return Err(ValidationError::MotionDisabled(state.errcode.code()));
    }
    match validate_range(v, -limit, limit, clamp) {
        Ok(v) => Ok(Value::Float(v)),
        Err(e) => {
            state.errcode = overflow;
            Err(e)
        }
    }
}

fn v_trgt_x(state: &mut PlantState, value: Value) -> Result<Value, ValidationError> {
    let (limit, clamp) = (state.max_x, state.clamp_x);
    gate_target(state, value, limit, clamp, Fault::XOverflow)
}

fn v_trgt_v(state: &mut PlantState, value: Value) -> Result<Value, ValidationError> {
    let (limit, clamp) = (state.max_v, state.clamp_v);
    gate_target(state, value, limit, clamp, Fault::VOverflow)
}

fn v_trgt_a(state: &mut PlantState, value: Value) -> Result<Value, ValidationError> {
    let (limit, clamp) = (state.max_a, state.clamp_a);
    gate_target(state, value, limit, clamp, Fault::AOverflow)
}

macro_rules! float_field {
    ($name:literal, $field:ident, readonly: $ro:expr, validate: $v:expr, hook: $hook:expr) => {
        FieldDef {
            name: $name,
            kind: FieldKind::Float,
            readonly: $ro,
            get: |s| Value::Float(s.$field),
            set: |s, v| {
                if let Value::Float(x) = v {
                    s.$field = x;
                }
            },
            validate: $v,
            hook: $hook,
        }
    };
}

macro_rules! bool_field {
    ($name:literal, $field:ident, hook: $hook:expr) => {
        FieldDef {
            name: $name,
            kind: FieldKind::Bool,
            readonly: false,
            get: |s| Value::Bool(s.$field),
            set: |s, v| {
                if let Value::Bool(x) = v {
                    s.$field = x;
                }
            },
            validate: accept,
            hook: $hook,
        }
    };
}

static CONFIG_FIELDS: &[FieldDef] = &[
    float_field!("max_x", max_x, readonly: false, validate: v_max_x, hook: UpdateHook::None),
    float_field!("max_v", max_v, readonly: false, validate: v_max_v, hook: UpdateHook::MaxSpeed),
    float_field!("max_a", max_a, readonly: false, validate: v_max_a, hook: UpdateHook::MaxAccel),
    float_field!("hw_max_x", hw_max_x, readonly: true, validate: accept, hook: UpdateHook::None),
    float_field!("hw_max_v", hw_max_v, readonly: true, validate: accept, hook: UpdateHook::None),
    float_field!("hw_max_a", hw_max_a, readonly: true, validate: accept, hook: UpdateHook::None),
    bool_field!("clamp_x", clamp_x, hook: UpdateHook::None),
    bool_field!("clamp_v", clamp_v, hook: UpdateHook::None),
    bool_field!("clamp_a", clamp_a, hook: UpdateHook::None),
    bool_field!("debug_led", debug_led, hook: UpdateHook::DebugLed),
];

static STATE_FIELDS: &[FieldDef] = &[
    float_field!("curr_x", curr_x, readonly: true, validate: accept, hook: UpdateHook::None),
    float_field!("curr_v", curr_v, readonly: true, validate: accept, hook: UpdateHook::None),
    float_field!("curr_a", curr_a, readonly: true, validate: accept, hook: UpdateHook::None),
    float_field!("pole_x", pole_x, readonly: true, validate: accept, hook: UpdateHook::None),
    float_field!("pole_v", pole_v, readonly: true, validate: accept, hook: UpdateHook::None),
    FieldDef {
        name: "errcode",
        kind: FieldKind::Fault,
        readonly: true,
        get: |s| Value::Fault(s.errcode),
        set: |s, v| {
            if let Value::Fault(f) = v {
                s.errcode = f;
            }
        },
        validate: accept,
        hook: UpdateHook::None,
    },
    float_field!("imu_a", imu_a, readonly: true, validate: accept, hook: UpdateHook::None),
    float_field!("motor_x", motor_x, readonly: true, validate: accept, hook: UpdateHook::None),
    float_field!("motor_v", motor_v, readonly: true, validate: accept, hook: UpdateHook::None),
];

static TARGET_FIELDS: &[FieldDef] = &[
    float_field!("trgt_x", trgt_x, readonly: false, validate: v_trgt_x, hook: UpdateHook::TargetPosition),
    float_field!("trgt_v", trgt_v, readonly: false, validate: v_trgt_v, hook: UpdateHook::None),
    float_field!("trgt_a", trgt_a, readonly: false, validate: v_trgt_a, hook: UpdateHook::None),
];

/// Field group; partitions the registry by mutability and purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    Config = 0,
    State = 1,
    Target = 2,
}

impl Group {
    pub const ALL: [Group; 3] = [Group::Config, Group::State, Group::Target];

    pub fn parse(text: &str) -> Result<Group, ValidationError> {
        match text {
            "config" => Ok(Group::Config),
            "state" => Ok(Group::State),
            "target" => Ok(Group::Target),
            other => Err(ValidationError::UnknownGroup(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Group::Config => "config",
            Group::State => "state",
            Group::Target => "target",
        }
    }

    fn fields(self) -> &'static [FieldDef] {
        match self {
            Group::Config => CONFIG_FIELDS,
            Group::State => STATE_FIELDS,
            Group::Target => TARGET_FIELDS,
        }
    }
}

/// A validated pending write, produced by `prepare` and applied by `commit`.
/// Holding these apart is what makes multi-key `set` all-or-nothing.
#[derive(Debug)]
pub struct Prepared {
    group: Group,
    index: usize,
    value: Value,
}

/// Registry over the three field groups, carrying the registration-time
/// default of every field for `reset`.
pub struct FieldRegistry {
    defaults: [Vec<Value>; 3],
}

impl FieldRegistry {
    /// Snapshot the given state as the reset defaults.
    pub fn new(state: &PlantState) -> Self {
        let snapshot =
            |group: Group| -> Vec<Value> { group.fields().iter().map(|f| (f.get)(state)).collect() };
        Self {
            defaults: [
                snapshot(Group::Config),
                snapshot(Group::State),
                snapshot(Group::Target),
            ],
        }
    }

    fn lookup(group: Group, key: &str) -> Result<(usize, &'static FieldDef), ValidationError> {
        group
            .fields()
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == key)
            .ok_or_else(|| ValidationError::UnknownKey(key.to_string()))
    }

    /// Format one field. Pure read.
    pub fn get(&self, group: Group, key: &str, state: &PlantState) -> Result<String, ValidationError> {
        let (_, field) = Self::lookup(group, key)?;
        Ok((field.get)(state).format())
    }

    /// Format every field of a group, in registration order.
    pub fn get_all(&self, group: Group, state: &PlantState) -> Vec<(&'static str, String)> {
        group
            .fields()
            .iter()
            .map(|f| (f.name, (f.get)(state).format()))
            .collect()
    }

    /// Parse and validate a textual write without touching the live value.
    pub fn prepare(
        &self,
        group: Group,
        key: &str,
        text: &str,
        state: &mut PlantState,
    ) -> Result<Prepared, ValidationError> {
        let (index, field) = Self::lookup(group, key)?;
        if field.readonly {
            return Err(ValidationError::Readonly);
        }
        let parsed = parse(field.kind, text)?;
        let value = (field.validate)(state, parsed)?;
        Ok(Prepared {
            group,
            index,
            value,
        })
    }

    /// Apply a prepared write and run its update hook.
    pub fn commit(&self, prepared: &Prepared, state: &mut PlantState, hooks: &mut dyn MotionHooks) {
        let field = &prepared.group.fields()[prepared.index];
        (field.set)(state, prepared.value);
        Self::run_hook(field, state, hooks);
    }

    fn run_hook(field: &FieldDef, state: &PlantState, hooks: &mut dyn MotionHooks) {
        match field.hook {
            UpdateHook::None => {}
            UpdateHook::MaxSpeed => hooks.set_max_speed(state.max_v),
            UpdateHook::MaxAccel => hooks.set_max_accel(state.max_a),
            UpdateHook::TargetPosition => hooks.set_target_position(state.trgt_x),
            UpdateHook::DebugLed => hooks.set_debug_led(state.debug_led),
        }
    }

    /// Restore every field of a group to its registration-time default,
    /// running update hooks.
    pub fn reset_group(&self, group: Group, state: &mut PlantState, hooks: &mut dyn MotionHooks) {
        for (field, default) in group.fields().iter().zip(&self.defaults[group as usize]) {
            (field.set)(state, *default);
            Self::run_hook(field, state, hooks);
        }
    }

    /// Restore all three groups to defaults.
    pub fn reset_all(&self, state: &mut PlantState, hooks: &mut dyn MotionHooks) {
        for group in Group::ALL {
            self.reset_group(group, state, hooks);
        }
    }
}

#[cfg(test)]
mod range_tests {
    use super::validate_range;

    #[test]
    fn inclusive_bounds_pass() {
        assert_eq!(validate_range(0.5, -0.5, 0.5, false), Ok(0.5));
        assert_eq!(validate_range(-0.5, -0.5, 0.5, false), Ok(-0.5));
    }

    #[test]
    fn clamp_returns_boundary() {
        assert_eq!(validate_range(0.7, -0.5, 0.5, true), Ok(0.5));
        assert_eq!(validate_range(-0.7, -0.5, 0.5, true), Ok(-0.5));
    }

    #[test]
    fn reject_outside_bounds() {
        assert!(validate_range(0.7, -0.5, 0.5, false).is_err());
        assert!(validate_range(-0.7, -0.5, 0.5, false).is_err());
    }
}
