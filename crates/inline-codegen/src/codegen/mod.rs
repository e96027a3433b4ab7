//! Inline Function Expansion
//!
//! Expands calls of inline functions directly into the caller's code instead
//! of emitting a call instruction.
//!
//! # Expansion Strategy
//!
//! For each inline call site:
//! 1. Enter an inlining scope (reentrancy marker plus local-slot mark)
//! 2. Materialize the callee's formal parameters in declaration order:
//!    - lambda literals bound to inline function parameters become
//!      expanded-lambda descriptors and are never evaluated as closures
//!    - everything else is evaluated once and stored in a local
//! 3. Splice the callee body with parameter names bound to those locals;
//!    invoking a lambda parameter expands the lambda body in place through
//!    its specialized signature
//! 4. Leave the result on the operand stack and exit the scope
//!
//! Expression lowering and body walking belong to the surrounding backend
//! and come in through [`ExpressionEvaluator`] and [`BodySplicer`].

// Submodules
mod backend;
mod binder;
mod driver;
mod error;
mod frame;
mod lambda;
mod parameters;
mod reentrancy;
mod state;

// Re-exports
pub use backend::{BodySplicer, ExpressionEvaluator, SpliceRequest};
pub use binder::{BindingTarget, BoundLocation, ValueBinding, bind_captured, bind_value};
pub use error::CodeGenError;
pub use frame::{Insn, MethodFrame, StackValue};
pub use lambda::{CapturedBinding, ExpandedLambda, inline_lambda, is_inline_lambda_argument};
pub use parameters::{ParameterEntry, ParameterTable};
pub use reentrancy::{InlineMarker, MarkerKind, ReentrancyContext};
pub use state::{InlineContext, InliningScope, LocalBinding, Scope};
