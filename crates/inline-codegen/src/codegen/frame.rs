//! Method Frame Management
//!
//! Instruction list, local slot allocation and operand stack tracking for the
//! method being generated. Every instruction knows its stack effect, so the
//! frame can verify depths as code is emitted instead of after the fact.

use super::CodeGenError;
use crate::asm::{AsmType, MethodSignature};
use crate::ir::Constant;
use std::fmt;

/// Where an evaluated value currently lives
#[derive(Debug, Clone, PartialEq)]
pub enum StackValue {
    /// Nothing was produced (Unit in statement position)
    Void,
    /// On top of the operand stack
    OnStack(AsmType),
    /// In a local variable slot
    Local { slot: usize, ty: AsmType },
    /// A constant not yet pushed
    Constant { value: Constant, ty: AsmType },
}

impl StackValue {
    pub fn ty(&self) -> AsmType {
        match self {
            StackValue::Void => AsmType::Void,
            StackValue::OnStack(ty) => ty.clone(),
            StackValue::Local { ty, .. } | StackValue::Constant { ty, .. } => ty.clone(),
        }
    }
}

/// Instructions of the typed register model
#[derive(Debug, Clone, PartialEq)]
pub enum Insn {
    /// Push a constant
    Push { value: Constant, ty: AsmType },
    /// Push the value of a local slot
    Load { ty: AsmType, slot: usize },
    /// Pop into a local slot
    Store { ty: AsmType, slot: usize },
    /// Discard the top of stack
    Pop(AsmType),
    /// Box, unbox or checkcast the top of stack
    Coerce { from: AsmType, to: AsmType },
    /// Static call (`receiver = false`) or call on a function object
    Call {
        signature: MethodSignature,
        receiver: bool,
    },
    /// Allocate a closure object from `captures` stack values
    NewClosure { class: AsmType, captures: Vec<AsmType> },
    /// Start or end of an inlined region
    InlineMarker { callee: String, begin: bool },
}

impl Insn {
    /// Net change of operand stack slots
    pub fn stack_delta(&self) -> isize {
        match self {
            Insn::Push { ty, .. } | Insn::Load { ty, .. } => ty.size() as isize,
            Insn::Store { ty, .. } | Insn::Pop(ty) => -(ty.size() as isize),
            Insn::Coerce { from, to } => to.size() as isize - from.size() as isize,
            Insn::Call {
                signature,
                receiver,
            } => {
                signature.ret.size() as isize
                    - signature.args_size() as isize
                    - isize::from(*receiver)
            }
            Insn::NewClosure { captures, .. } => {
                1 - captures.iter().map(AsmType::size).sum::<usize>() as isize
            }
            Insn::InlineMarker { .. } => 0,
        }
    }
}

fn type_prefix(ty: &AsmType) -> &'static str {
    match ty {
        AsmType::Boolean | AsmType::Int => "i",
        AsmType::Long => "l",
        AsmType::Double => "d",
        AsmType::Object(_) | AsmType::Void => "a",
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insn::Push { value, ty } => write!(f, "push {} {}", ty, value),
            Insn::Load { ty, slot } => write!(f, "{}load {}", type_prefix(ty), slot),
            Insn::Store { ty, slot } => write!(f, "{}store {}", type_prefix(ty), slot),
            Insn::Pop(ty) if ty.size() == 2 => write!(f, "pop2"),
            Insn::Pop(_) => write!(f, "pop"),
            Insn::Coerce { from, to } => write!(f, "coerce {} -> {}", from, to),
            Insn::Call {
                signature,
                receiver: true,
            } => write!(f, "invokeinterface {}", signature),
            Insn::Call { signature, .. } => write!(f, "invokestatic {}", signature),
            Insn::NewClosure { class, captures } => {
                write!(f, "new {} (", class)?;
                for c in captures {
                    write!(f, "{}", c)?;
                }
                write!(f, ")")
            }
            Insn::InlineMarker { callee, begin } => {
                write!(f, "; {} inline {}", if *begin { "begin" } else { "end" }, callee)
            }
        }
    }
}

/// Code and frame state of the method receiving inlined code
#[derive(Debug, Clone, Default)]
pub struct MethodFrame {
    insns: Vec<Insn>,
    next_local: usize,
    max_locals: usize,
    stack_depth: usize,
    max_stack: usize,
}

impl MethodFrame {
    /// Frame whose first `param_slots` locals hold the method's own parameters
    pub fn new(param_slots: usize) -> Self {
        MethodFrame {
            next_local: param_slots,
            max_locals: param_slots,
            ..Self::default()
        }
    }

    /// Append an instruction, tracking the operand stack depth.
    pub fn emit(&mut self, insn: Insn) -> Result<(), CodeGenError> {
        let depth = self.stack_depth as isize + insn.stack_delta();
        if depth < 0 {
            return Err(CodeGenError::internal(format!(
                "operand stack underflow at '{}' (depth {})",
                insn, self.stack_depth
            )));
        }
        self.stack_depth = depth as usize;
        self.max_stack = self.max_stack.max(self.stack_depth);
        self.insns.push(insn);
        Ok(())
    }

    /// Allocate a fresh local slot sized for `ty`
    pub fn enter_temp(&mut self, ty: &AsmType) -> usize {
        let slot = self.next_local;
        self.next_local += ty.size().max(1);
        self.max_locals = self.max_locals.max(self.next_local);
        slot
    }

    /// Current end of the allocated locals, for [`Self::release_locals`]
    pub fn local_mark(&self) -> usize {
        self.next_local
    }

    /// Free every temp allocated after `mark`; `max_locals` is kept
    pub fn release_locals(&mut self, mark: usize) {
        debug_assert!(mark <= self.next_local, "releasing locals that were never allocated");
        self.next_local = mark.min(self.next_local);
    }

    /// Put `value` on top of the operand stack.
    pub fn push_value(&mut self, value: &StackValue) -> Result<(), CodeGenError> {
        match value {
            StackValue::Void | StackValue::OnStack(_) => Ok(()),
            StackValue::Local { slot, ty } => self.emit(Insn::Load {
                ty: ty.clone(),
                slot: *slot,
            }),
            StackValue::Constant { value, ty } => self.emit(Insn::Push {
                value: value.clone(),
                ty: ty.clone(),
            }),
        }
    }

    /// Coerce the top of stack from `from` to `to` (no-op when equal)
    pub fn coerce(&mut self, from: &AsmType, to: &AsmType) -> Result<(), CodeGenError> {
        if from == to {
            return Ok(());
        }
        if from.is_void() || to.is_void() {
            return Err(CodeGenError::internal(format!(
                "cannot coerce {} to {}",
                from, to
            )));
        }
        self.emit(Insn::Coerce {
            from: from.clone(),
            to: to.clone(),
        })
    }

    pub fn stack_depth(&self) -> usize {
        self.stack_depth
    }

    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    pub fn max_locals(&self) -> usize {
        self.max_locals
    }

    pub fn instructions(&self) -> &[Insn] {
        &self.insns
    }

    /// Textual listing, one instruction per line
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for insn in &self.insns {
            out.push_str("  ");
            out.push_str(&insn.to_string());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_tracking() {
        let mut frame = MethodFrame::new(0);
        frame
            .emit(Insn::Push {
                value: Constant::Long(1),
                ty: AsmType::Long,
            })
            .unwrap();
        assert_eq!(frame.stack_depth(), 2);
        frame.emit(Insn::Store { ty: AsmType::Long, slot: 0 }).unwrap();
        assert_eq!(frame.stack_depth(), 0);
        assert_eq!(frame.max_stack(), 2);
    }

    #[test]
    fn test_underflow_is_internal_error() {
        let mut frame = MethodFrame::new(0);
        let err = frame.emit(Insn::Pop(AsmType::Int)).unwrap_err();
        assert!(err.is_internal());
        assert!(frame.instructions().is_empty());
    }

    #[test]
    fn test_temps_respect_wide_types() {
        let mut frame = MethodFrame::new(1);
        let mark = frame.local_mark();
        assert_eq!(frame.enter_temp(&AsmType::Double), 1);
        assert_eq!(frame.enter_temp(&AsmType::Int), 3);
        frame.release_locals(mark);
        assert_eq!(frame.enter_temp(&AsmType::Int), 1);
        assert_eq!(frame.max_locals(), 4);
    }

    #[test]
    fn test_call_delta_counts_receiver() {
        let sig = MethodSignature::new("invoke", vec![AsmType::Int, AsmType::Long], AsmType::Int);
        let call = Insn::Call {
            signature: sig.clone(),
            receiver: true,
        };
        assert_eq!(call.stack_delta(), 1 - 3 - 1);
        let call = Insn::Call {
            signature: sig,
            receiver: false,
        };
        assert_eq!(call.stack_delta(), -2);
    }

    #[test]
    fn test_listing() {
        let mut frame = MethodFrame::new(0);
        frame
            .push_value(&StackValue::Constant {
                value: Constant::Int(5),
                ty: AsmType::Int,
            })
            .unwrap();
        frame.emit(Insn::Store { ty: AsmType::Int, slot: 0 }).unwrap();
        assert_eq!(frame.listing(), "  push I 5\n  istore 0\n");
    }
}
