//! Per-node operator parameters.
//!
//! Every graph node carries a fixed [`MAX_OP_PARAMS`]-byte blob for small
//! immediate operands (axes, epsilons, shape fragments). The blob has no type
//! tag of its own: the operator that wrote a slot decides how it is read back.
//! [`ParamValue`] and [`OpParamsRecord`] give callers a typed layer on top.

use tracing::trace;

use crate::error::{CoreError, Result};

/// Capacity of a node's parameter blob in bytes.
pub const MAX_OP_PARAMS: usize = 64;

/// Number of 4-byte slots in a blob.
pub const MAX_OP_PARAM_SLOTS: usize = MAX_OP_PARAMS / 4;

/// Fixed-size, allocation-free parameter storage.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpParams {
    bytes: [u8; MAX_OP_PARAMS],
}

impl Default for OpParams {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OpParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots: Vec<i32> = (0..MAX_OP_PARAM_SLOTS).map(|i| self.get_i32(i)).collect();
        f.debug_struct("OpParams").field("slots", &slots).finish()
    }
}

#[inline]
fn check_slot(slot: usize) {
    assert!(
        slot < MAX_OP_PARAM_SLOTS,
        "op param slot {} out of range (max {})",
        slot,
        MAX_OP_PARAM_SLOTS
    );
}

impl OpParams {
    pub const fn new() -> Self {
        Self {
            bytes: [0; MAX_OP_PARAMS],
        }
    }

    /// Copy `bytes` into the start of the blob. Trailing bytes are untouched.
    ///
    /// # Panics
    /// Panics if `bytes` is longer than [`MAX_OP_PARAMS`].
    pub fn set(&mut self, bytes: &[u8]) {
        assert!(
            bytes.len() <= MAX_OP_PARAMS,
            "op params of {} bytes exceed the {} byte capacity",
            bytes.len(),
            MAX_OP_PARAMS
        );
        self.bytes[..bytes.len()].copy_from_slice(bytes);
    }

    pub fn as_bytes(&self) -> &[u8; MAX_OP_PARAMS] {
        &self.bytes
    }

    /// Zero the whole blob.
    pub fn clear(&mut self) {
        self.bytes = [0; MAX_OP_PARAMS];
    }

    #[inline]
    fn slot_bytes(&self, slot: usize) -> [u8; 4] {
        check_slot(slot);
        let off = slot * 4;
        [
            self.bytes[off],
            self.bytes[off + 1],
            self.bytes[off + 2],
            self.bytes[off + 3],
        ]
    }

    #[inline]
    fn write_slot(&mut self, slot: usize, raw: [u8; 4]) {
        check_slot(slot);
        let off = slot * 4;
        self.bytes[off..off + 4].copy_from_slice(&raw);
    }

    #[inline]
    pub fn get_i32(&self, slot: usize) -> i32 {
        i32::from_ne_bytes(self.slot_bytes(slot))
    }

    #[inline]
    pub fn get_f32(&self, slot: usize) -> f32 {
        f32::from_ne_bytes(self.slot_bytes(slot))
    }

    #[inline]
    pub fn set_i32(&mut self, slot: usize, value: i32) {
        self.write_slot(slot, value.to_ne_bytes());
    }

    #[inline]
    pub fn set_f32(&mut self, slot: usize, value: f32) {
        self.write_slot(slot, value.to_ne_bytes());
    }

    /// Build a blob from leading slot values.
    ///
    /// # Panics
    /// Panics if more than [`MAX_OP_PARAM_SLOTS`] values are given.
    pub fn from_values(values: &[ParamValue]) -> Self {
        assert!(
            values.len() <= MAX_OP_PARAM_SLOTS,
            "{} op param values exceed the {} slot capacity",
            values.len(),
            MAX_OP_PARAM_SLOTS
        );
        let mut params = Self::new();
        for (slot, value) in values.iter().enumerate() {
            params.set_value(slot, *value);
        }
        params
    }

    pub fn set_value(&mut self, slot: usize, value: ParamValue) {
        match value {
            ParamValue::I32(v) => self.set_i32(slot, v),
            ParamValue::F32(v) => self.set_f32(slot, v),
        }
    }

    /// Read `slot` as the given kind.
    pub fn value(&self, slot: usize, kind: ParamKind) -> ParamValue {
        match kind {
            ParamKind::I32 => ParamValue::I32(self.get_i32(slot)),
            ParamKind::F32 => ParamValue::F32(self.get_f32(slot)),
        }
    }
}

/// Interpretation of a 4-byte slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    I32,
    F32,
}

/// A slot value tagged with its interpretation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    I32(i32),
    F32(f32),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::I32(_) => ParamKind::I32,
            ParamValue::F32(_) => ParamKind::F32,
        }
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::I32(v)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::F32(v)
    }
}

/// Anything that embeds an [`OpParams`] blob, typically a graph node.
pub trait HasOpParams {
    fn op_params(&self) -> &OpParams;
    fn op_params_mut(&mut self) -> &mut OpParams;
}

impl HasOpParams for OpParams {
    fn op_params(&self) -> &OpParams {
        self
    }

    fn op_params_mut(&mut self) -> &mut OpParams {
        self
    }
}

pub fn set_op_params<N: HasOpParams + ?Sized>(node: &mut N, bytes: &[u8]) {
    node.op_params_mut().set(bytes);
}

pub fn get_op_params_i32<N: HasOpParams + ?Sized>(node: &N, slot: usize) -> i32 {
    node.op_params().get_i32(slot)
}

pub fn get_op_params_f32<N: HasOpParams + ?Sized>(node: &N, slot: usize) -> f32 {
    node.op_params().get_f32(slot)
}

pub fn set_op_params_i32<N: HasOpParams + ?Sized>(node: &mut N, slot: usize, value: i32) {
    node.op_params_mut().set_i32(slot, value);
}

pub fn set_op_params_f32<N: HasOpParams + ?Sized>(node: &mut N, slot: usize, value: f32) {
    node.op_params_mut().set_f32(slot, value);
}

/// A typed parameter record with a fixed slot layout.
pub trait OpParamsRecord: Sized {
    fn encode(&self, params: &mut OpParams);
    fn decode(params: &OpParams) -> Result<Self>;

    fn to_params(&self) -> OpParams {
        let mut params = OpParams::new();
        self.encode(&mut params);
        params
    }

    /// Encode into a node's blob.
    fn store<N: HasOpParams + ?Sized>(&self, node: &mut N) {
        self.encode(node.op_params_mut());
    }

    fn load<N: HasOpParams + ?Sized>(node: &N) -> Result<Self> {
        Self::decode(node.op_params())
    }
}

/// Let the scheduler pick the task count of a custom operator.
pub const N_TASKS_MAX: i32 = -1;

/// Number of tensor inputs a custom operator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum CustomOpArity {
    Unary = 1,
    Binary = 2,
    Ternary = 3,
}

impl TryFrom<i32> for CustomOpArity {
    type Error = CoreError;

    fn try_from(v: i32) -> Result<Self> {
        match v {
            1 => Ok(CustomOpArity::Unary),
            2 => Ok(CustomOpArity::Binary),
            3 => Ok(CustomOpArity::Ternary),
            other => Err(CoreError::InvalidOpParams(format!(
                "custom op arity must be 1, 2 or 3, got {}",
                other
            ))),
        }
    }
}

/// Index of a registered custom-operator callback.
///
/// Callbacks live in a registry owned by the executor; the blob only carries
/// the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CustomOpHandle(pub u32);

/// Parameters of a user-supplied map operator.
///
/// Layout: slot 0 arity, slot 1 callback handle, slot 2 task count,
/// slots 3 and 4 the low and high halves of the user-data word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomOpParams {
    pub arity: CustomOpArity,
    pub fun: CustomOpHandle,
    /// Task count, or [`N_TASKS_MAX`].
    pub n_tasks: i32,
    /// Opaque user data passed back to the callback.
    pub userdata: u64,
}

impl OpParamsRecord for CustomOpParams {
    fn encode(&self, params: &mut OpParams) {
        params.set_i32(0, self.arity as i32);
        params.set_i32(1, self.fun.0 as i32);
        params.set_i32(2, self.n_tasks);
        params.set_i32(3, self.userdata as u32 as i32);
        params.set_i32(4, (self.userdata >> 32) as u32 as i32);
        trace!(arity = ?self.arity, fun = self.fun.0, n_tasks = self.n_tasks, "Encoded custom op params");
    }

    fn decode(params: &OpParams) -> Result<Self> {
        let arity = CustomOpArity::try_from(params.get_i32(0))?;
        let n_tasks = params.get_i32(2);
        if n_tasks < N_TASKS_MAX || n_tasks == 0 {
            return Err(CoreError::InvalidOpParams(format!(
                "custom op task count must be positive or {}, got {}",
                N_TASKS_MAX, n_tasks
            )));
        }
        let lo = params.get_i32(3) as u32 as u64;
        let hi = params.get_i32(4) as u32 as u64;
        Ok(Self {
            arity,
            fun: CustomOpHandle(params.get_i32(1) as u32),
            n_tasks,
            userdata: lo | (hi << 32),
        })
    }
}
