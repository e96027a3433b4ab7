//! Captured-Value Binder
//!
//! Moves an evaluated argument into the local the inlined body will read it
//! from. A value that already sits in a local of the right type is reused as
//! is; anything else is pushed, coerced and stored into a fresh temp.

use super::frame::{Insn, MethodFrame, StackValue};
use super::lambda::ExpandedLambda;
use super::CodeGenError;
use crate::asm::AsmType;
use crate::types::Type;
use tracing::trace;

/// Where a bound value ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundLocation {
    /// Stored into a newly allocated temp
    Fresh(usize),
    /// Aliases an existing local; no code was emitted
    Reused(usize),
    /// Not materialized (void value)
    Deferred,
}

impl BoundLocation {
    pub fn slot(&self) -> Option<usize> {
        match self {
            BoundLocation::Fresh(slot) | BoundLocation::Reused(slot) => Some(*slot),
            BoundLocation::Deferred => None,
        }
    }
}

/// What a value is bound for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingTarget {
    /// Explicit parameter (receiver or value parameter) by ordinal
    Parameter(usize),
    /// Captured value by captured index
    Captured(usize),
}

/// A materialized argument
#[derive(Debug, Clone, PartialEq)]
pub struct ValueBinding {
    pub ty: AsmType,
    pub source_type: Type,
    pub location: BoundLocation,
    /// Ordinal of the parameter; `None` for captured values
    pub parameter_index: Option<usize>,
    /// Position in the capture list; `None` for explicit parameters
    pub captured_index: Option<usize>,
}

impl ValueBinding {
    /// How the inlined body reads this value
    pub fn as_stack_value(&self) -> StackValue {
        match self.location.slot() {
            Some(slot) => StackValue::Local {
                slot,
                ty: self.ty.clone(),
            },
            None => StackValue::Void,
        }
    }
}

/// Bind `value` as `expected` for `target`, emitting the store if needed.
pub fn bind_value(
    frame: &mut MethodFrame,
    value: StackValue,
    expected: &AsmType,
    source_type: &Type,
    target: BindingTarget,
    reuse_locals: bool,
) -> Result<ValueBinding, CodeGenError> {
    let location = if expected.is_void() {
        if let StackValue::OnStack(ty) = &value {
            if !ty.is_void() {
                frame.emit(Insn::Pop(ty.clone()))?;
            }
        }
        BoundLocation::Deferred
    } else {
        match value {
            StackValue::Local { slot, ref ty } if reuse_locals && ty == expected => {
                BoundLocation::Reused(slot)
            }
            _ => {
                frame.push_value(&value)?;
                frame.coerce(&value.ty(), expected)?;
                let slot = frame.enter_temp(expected);
                frame.emit(Insn::Store {
                    ty: expected.clone(),
                    slot,
                })?;
                BoundLocation::Fresh(slot)
            }
        }
    };

    trace!(?target, ty = %expected, ?location, "bound value");

    let (parameter_index, captured_index) = match target {
        BindingTarget::Parameter(index) => (Some(index), None),
        BindingTarget::Captured(index) => (None, Some(index)),
    };
    Ok(ValueBinding {
        ty: expected.clone(),
        source_type: source_type.clone(),
        location,
        parameter_index,
        captured_index,
    })
}

/// Bind the `index`-th captured value of `lambda`.
///
/// The lambda is passed explicitly: its captured window decides the slot
/// type, and its capture list supplies the source type.
pub fn bind_captured(
    frame: &mut MethodFrame,
    lambda: &ExpandedLambda<'_>,
    index: usize,
    value: StackValue,
    reuse_locals: bool,
) -> Result<ValueBinding, CodeGenError> {
    let (expected, captured) = lambda
        .captured_params_in_desc()
        .get(index)
        .zip(lambda.captured_vars.get(index))
        .ok_or_else(|| {
            CodeGenError::internal(format!(
                "inline lambda for parameter {} has no captured value {}",
                lambda.parameter_index, index
            ))
        })?;
    bind_value(
        frame,
        value,
        expected,
        &captured.source_type,
        BindingTarget::Captured(index),
        reuse_locals,
    )
}
