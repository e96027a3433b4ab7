//! Parameter Materialization
//!
//! Walks the callee's formal parameters in declaration order (captured
//! parameters first, then receiver and value parameters) and turns each
//! argument into exactly one table entry:
//!
//! - an inline lambda literal bound to an inline function-typed parameter
//!   becomes an [`ExpandedLambda`]; the literal itself is never evaluated,
//!   only its captured variables are read into locals
//! - an inline lambda parameter of the enclosing body passed straight on to
//!   another inline parameter is handed over as the same descriptor
//! - every other argument is evaluated and bound to a local by the binder
//!
//! Argument evaluation may inline further calls. Those expansions enter and
//! leave their own scopes before the next argument is looked at.

use super::CodeGenError;
use super::backend::{BodySplicer, ExpressionEvaluator};
use super::binder::{BindingTarget, ValueBinding, bind_captured, bind_value};
use super::lambda::{CapturedBinding, ExpandedLambda, inline_lambda};
use super::state::{InlineContext, LocalBinding, Scope};
use crate::ir::{CallSite, Expr, FormalParameter, FunctionDecl, ParameterKind};
use crate::types::TypeArguments;
use std::collections::BTreeMap;
use tracing::debug;

/// Materialized form of one explicit parameter
#[derive(Debug, Clone)]
pub enum ParameterEntry<'m> {
    Value(ValueBinding),
    Lambda(ExpandedLambda<'m>),
}

/// Ordinal -> entry table handed to the body splicer
#[derive(Debug, Clone, Default)]
pub struct ParameterTable<'m> {
    entries: BTreeMap<usize, ParameterEntry<'m>>,
    captured: Vec<ValueBinding>,
}

impl<'m> ParameterTable<'m> {
    pub fn new() -> Self {
        ParameterTable {
            entries: BTreeMap::new(),
            captured: Vec::new(),
        }
    }

    fn insert(&mut self, ordinal: usize, entry: ParameterEntry<'m>) -> Result<(), CodeGenError> {
        if self.entries.contains_key(&ordinal) {
            return Err(CodeGenError::internal(format!(
                "parameter {} materialized twice",
                ordinal
            )));
        }
        self.entries.insert(ordinal, entry);
        Ok(())
    }

    pub fn register_value(&mut self, binding: ValueBinding) -> Result<(), CodeGenError> {
        match (binding.parameter_index, binding.captured_index) {
            (Some(ordinal), None) => self.insert(ordinal, ParameterEntry::Value(binding)),
            (None, Some(index)) if index == self.captured.len() => {
                self.captured.push(binding);
                Ok(())
            }
            _ => Err(CodeGenError::internal(format!(
                "malformed binding (parameter {:?}, captured {:?})",
                binding.parameter_index, binding.captured_index
            ))),
        }
    }

    pub fn register_lambda(&mut self, lambda: ExpandedLambda<'m>) -> Result<(), CodeGenError> {
        self.insert(lambda.parameter_index, ParameterEntry::Lambda(lambda))
    }

    pub fn get(&self, ordinal: usize) -> Option<&ParameterEntry<'m>> {
        self.entries.get(&ordinal)
    }

    pub fn value(&self, ordinal: usize) -> Option<&ValueBinding> {
        match self.entries.get(&ordinal) {
            Some(ParameterEntry::Value(binding)) => Some(binding),
            _ => None,
        }
    }

    pub fn lambda(&self, ordinal: usize) -> Option<&ExpandedLambda<'m>> {
        match self.entries.get(&ordinal) {
            Some(ParameterEntry::Lambda(lambda)) => Some(lambda),
            _ => None,
        }
    }

    /// Entries in ordinal order
    pub fn entries(&self) -> impl Iterator<Item = (usize, &ParameterEntry<'m>)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Bindings of the callee's captured parameters
    pub fn captured(&self) -> &[ValueBinding] {
        &self.captured
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.captured.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that every formal of `callee` has exactly one entry
    pub fn ensure_complete(&self, callee: &FunctionDecl) -> Result<(), CodeGenError> {
        let expected = callee.explicit_parameter_count();
        let complete = self.captured.len() == callee.captured_parameters.len()
            && self.entries.len() == expected
            && self.entries.keys().copied().eq(0..expected);
        if !complete {
            return Err(CodeGenError::internal(format!(
                "incomplete parameter table for '{}': {} of {} parameters, {} of {} captured",
                callee.name,
                self.entries.len(),
                expected,
                self.captured.len(),
                callee.captured_parameters.len()
            )));
        }
        Ok(())
    }

    /// Scope exposing the parameters to the callee body by name
    pub fn scope(&self, callee: &FunctionDecl) -> Scope<'m> {
        let mut scope = Scope::new();
        for formal in callee.formal_parameters() {
            let binding = match formal.kind {
                ParameterKind::Captured => self
                    .captured
                    .get(formal.index)
                    .map(|b| LocalBinding::Value(b.as_stack_value())),
                _ => self.entries.get(&formal.index).map(|entry| match entry {
                    ParameterEntry::Value(b) => LocalBinding::Value(b.as_stack_value()),
                    ParameterEntry::Lambda(l) => LocalBinding::InlineLambda(l.clone()),
                }),
            };
            if let Some(binding) = binding {
                scope.insert(formal.param.name.clone(), binding);
            }
        }
        scope
    }
}

impl<'m> InlineContext<'m> {
    /// Materialize every formal parameter of `callee` for `call`.
    pub fn materialize_parameters(
        &mut self,
        call: &'m CallSite,
        callee: &'m FunctionDecl,
        type_arguments: &TypeArguments,
        evaluator: &mut dyn ExpressionEvaluator<'m>,
        splicer: &mut dyn BodySplicer<'m>,
    ) -> Result<ParameterTable<'m>, CodeGenError> {
        check_arity(call, callee)?;

        let mut table = ParameterTable::new();
        for formal in callee.formal_parameters() {
            let argument = match call.argument_for(&formal) {
                Some(argument) => argument,
                None if formal.param.has_default => {
                    return Err(CodeGenError::Unsupported(format!(
                        "default argument erasure for parameter '{}' of '{}'",
                        formal.param.name, callee.name
                    )));
                }
                None => {
                    return Err(CodeGenError::internal(format!(
                        "no argument for parameter '{}' of '{}'",
                        formal.param.name, callee.name
                    )));
                }
            };
            self.materialize(&mut table, formal, argument, type_arguments, evaluator, splicer)?;
        }

        table.ensure_complete(callee)?;
        Ok(table)
    }

    /// Materialize a single formal parameter.
    pub fn materialize(
        &mut self,
        table: &mut ParameterTable<'m>,
        formal: FormalParameter<'m>,
        argument: &'m Expr,
        type_arguments: &TypeArguments,
        evaluator: &mut dyn ExpressionEvaluator<'m>,
        splicer: &mut dyn BodySplicer<'m>,
    ) -> Result<(), CodeGenError> {
        let declared = formal.param.ty.substitute(type_arguments);
        let inline_parameter = formal.kind != ParameterKind::Captured
            && declared.is_function()
            && !declared.is_nullable()
            && !formal.param.is_noinline;

        if inline_parameter {
            if let Some((literal, is_bound)) = inline_lambda(argument) {
                let mut lambda = ExpandedLambda::new(
                    formal.index,
                    literal,
                    is_bound,
                    formal.param.is_crossinline,
                    self.mapper,
                )?;
                lambda.owner = self.reentrancy.top_index().ok_or_else(|| {
                    CodeGenError::internal("inline lambda registered outside an inline scope")
                })?;
                lambda.captured_bindings =
                    self.put_closure_parameters(&lambda, evaluator, splicer)?;
                debug!(
                    parameter = %formal.param.name,
                    captures = lambda.captured_vars.len(),
                    invoke = %lambda.invoke_method,
                    "registered inline lambda"
                );
                return table.register_lambda(lambda);
            }
            if let Some(lambda) = self.pass_through_lambda(argument) {
                let mut lambda = lambda.clone();
                debug!(
                    parameter = %formal.param.name,
                    from = lambda.parameter_index,
                    "passing inline lambda through"
                );
                lambda.parameter_index = formal.index;
                return table.register_lambda(lambda);
            }
        }

        let expected = self.mapper.map_type(&declared);
        let value = evaluator.evaluate(argument, &expected, self, splicer)?;
        let target = match formal.kind {
            ParameterKind::Captured => BindingTarget::Captured(formal.index),
            _ => BindingTarget::Parameter(formal.index),
        };
        let binding = bind_value(
            &mut self.frame,
            value,
            &expected,
            &declared,
            target,
            self.config.reuse_locals,
        )?;
        table.register_value(binding)
    }

    /// The inline lambda a variable read refers to, if any.
    ///
    /// Its captured values already sit in locals of the enclosing expansion,
    /// which outlives the call being materialized.
    fn pass_through_lambda(&self, argument: &Expr) -> Option<&ExpandedLambda<'m>> {
        match argument {
            Expr::GetValue { name, .. } => match self.lookup_local(name) {
                Some(LocalBinding::InlineLambda(lambda)) => Some(lambda),
                _ => None,
            },
            _ => None,
        }
    }

    /// Read the captured values of `lambda` into locals.
    ///
    /// Bound arguments are evaluated in capture order in the current scope,
    /// which is the scope the lambda literal appeared in. A captured inline
    /// lambda parameter is carried over as its descriptor instead.
    pub fn put_closure_parameters(
        &mut self,
        lambda: &ExpandedLambda<'m>,
        evaluator: &mut dyn ExpressionEvaluator<'m>,
        splicer: &mut dyn BodySplicer<'m>,
    ) -> Result<Vec<CapturedBinding<'m>>, CodeGenError> {
        let mut bindings = Vec::with_capacity(lambda.bound_arguments.len());
        for (index, argument) in lambda.bound_arguments.iter().enumerate() {
            if let Some(captured) = self.pass_through_lambda(argument).cloned() {
                debug!(
                    capture = index,
                    from = captured.parameter_index,
                    "capturing inline lambda"
                );
                bindings.push(CapturedBinding::InlineLambda(captured));
                continue;
            }
            let expected = lambda.captured_params_in_desc()[index].clone();
            let value = evaluator.evaluate(argument, &expected, self, splicer)?;
            let reuse = self.config.reuse_locals;
            let binding = bind_captured(&mut self.frame, lambda, index, value, reuse)?;
            bindings.push(CapturedBinding::Value(binding));
        }
        Ok(bindings)
    }
}

fn check_arity(call: &CallSite, callee: &FunctionDecl) -> Result<(), CodeGenError> {
    if call.receiver.is_some() != callee.extension_receiver.is_some() {
        return Err(CodeGenError::internal(format!(
            "call of '{}' {} an extension receiver",
            callee.name,
            if call.receiver.is_some() { "supplies" } else { "lacks" }
        )));
    }
    if call.arguments.len() > callee.value_parameters.len()
        || call.captured_arguments.len() != callee.captured_parameters.len()
    {
        return Err(CodeGenError::internal(format!(
            "call of '{}' passes {} arguments and {} captured values, expected {} and {}",
            callee.name,
            call.arguments.len(),
            call.captured_arguments.len(),
            callee.value_parameters.len(),
            callee.captured_parameters.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::AsmType;
    use crate::codegen::binder::BoundLocation;
    use crate::types::Type;

    fn binding(parameter_index: Option<usize>, captured_index: Option<usize>) -> ValueBinding {
        ValueBinding {
            ty: AsmType::Int,
            source_type: Type::Int,
            location: BoundLocation::Fresh(0),
            parameter_index,
            captured_index,
        }
    }

    #[test]
    fn test_duplicate_ordinal_is_internal() {
        let mut table = ParameterTable::new();
        table.register_value(binding(Some(0), None)).unwrap();
        let err = table.register_value(binding(Some(0), None)).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_captured_bindings_must_arrive_in_order() {
        let mut table = ParameterTable::new();
        table.register_value(binding(None, Some(0))).unwrap();
        assert!(table.register_value(binding(None, Some(2))).is_err());
        assert_eq!(table.captured().len(), 1);
    }

    #[test]
    fn test_ensure_complete() {
        let mut decl = FunctionDecl::new("f");
        decl.value_parameters = vec![
            crate::ir::ValueParameter::new("a", Type::Int),
            crate::ir::ValueParameter::new("b", Type::Int),
        ];
        let mut table = ParameterTable::new();
        table.register_value(binding(Some(0), None)).unwrap();
        assert!(table.ensure_complete(&decl).unwrap_err().is_internal());

        table.register_value(binding(Some(1), None)).unwrap();
        table.ensure_complete(&decl).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_scope_names_parameters() {
        let mut decl = FunctionDecl::new("f");
        decl.value_parameters = vec![crate::ir::ValueParameter::new("a", Type::Int)];
        let mut table = ParameterTable::new();
        table.register_value(binding(Some(0), None)).unwrap();

        let scope = table.scope(&decl);
        assert!(matches!(scope.get("a"), Some(LocalBinding::Value(_))));
    }
}
