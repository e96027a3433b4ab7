//! Collaborator interfaces
//!
//! The inliner does not lower expressions or walk callee bodies itself. The
//! surrounding backend plugs in an [`ExpressionEvaluator`] and a
//! [`BodySplicer`]. Each receives the other so that either side can recurse:
//! an argument may contain another inline call, and a callee body may invoke
//! an inline lambda or call further inline functions.

use super::CodeGenError;
use super::frame::StackValue;
use super::lambda::ExpandedLambda;
use super::parameters::ParameterTable;
use super::state::InlineContext;
use crate::asm::AsmType;
use crate::ir::{CallSite, Expr, FunctionDecl};
use crate::types::TypeArguments;

/// Lowers an arbitrary expression to code leaving its value in a known place
pub trait ExpressionEvaluator<'m> {
    /// Generate code for `expr`, aiming for `target`.
    ///
    /// The returned location's type may differ from `target`; the caller
    /// coerces.
    fn evaluate(
        &mut self,
        expr: &'m Expr,
        target: &AsmType,
        cx: &mut InlineContext<'m>,
        splicer: &mut dyn BodySplicer<'m>,
    ) -> Result<StackValue, CodeGenError>;
}

/// Everything the splicer needs to emit one inlined body
pub struct SpliceRequest<'r, 'm> {
    pub call: &'m CallSite,
    pub callee: &'m FunctionDecl,
    pub type_arguments: &'r TypeArguments,
    pub parameters: &'r ParameterTable<'m>,
    /// Binary return type of the callee after substitution
    pub return_type: AsmType,
}

/// Emits an inlined callee body using the materialized parameter table
pub trait BodySplicer<'m> {
    fn splice(
        &mut self,
        request: &SpliceRequest<'_, 'm>,
        cx: &mut InlineContext<'m>,
        evaluator: &mut dyn ExpressionEvaluator<'m>,
    ) -> Result<StackValue, CodeGenError>;

    /// Expand an invocation of an inline lambda parameter.
    ///
    /// `arguments` are the invocation's arguments, extension receiver first,
    /// matching `lambda.invoke_method`.
    fn expand_lambda(
        &mut self,
        lambda: &ExpandedLambda<'m>,
        arguments: &'m [Expr],
        cx: &mut InlineContext<'m>,
        evaluator: &mut dyn ExpressionEvaluator<'m>,
    ) -> Result<StackValue, CodeGenError>;
}
