//! Inlining Driver
//!
//! Turns one call site into an inlined body:
//!
//! 1. enter an [`InliningScope`] keyed by the callee
//! 2. resolve the callee's type arguments
//! 3. materialize every formal parameter (arguments are caller code)
//! 4. hand the parameter table to the body splicer
//! 5. normalize the result onto the operand stack
//!
//! The scope guard exits on every path out of this module, so a failed
//! expansion leaves the reentrancy stack and the local allocator exactly as
//! it found them.

use super::CodeGenError;
use super::backend::{BodySplicer, ExpressionEvaluator, SpliceRequest};
use super::binder::{BindingTarget, bind_value};
use super::frame::{Insn, StackValue};
use super::lambda::{CapturedBinding, ExpandedLambda};
use super::state::{InlineContext, InliningScope, LocalBinding, Scope};
use crate::asm::AsmType;
use crate::ir::{CallSite, Expr, FunctionDecl};
use crate::types::TypeArguments;
use tracing::{debug, trace};

impl<'m> InlineContext<'m> {
    /// Inline `call` at the current position of the frame.
    ///
    /// On success the callee's result (if any) is on top of the operand
    /// stack as the callee's binary return type.
    pub fn inline_call(
        &mut self,
        call: &'m CallSite,
        evaluator: &mut dyn ExpressionEvaluator<'m>,
        splicer: &mut dyn BodySplicer<'m>,
    ) -> Result<StackValue, CodeGenError> {
        let callee = self
            .module
            .find_function(&call.callee)
            .ok_or_else(|| format!("unresolved function: {}", call.callee))?;
        if !callee.is_inline {
            return Err(CodeGenError::internal(format!(
                "'{}' is not an inline function",
                callee.name
            )));
        }

        let entry_depth = self.frame.stack_depth();
        // Type arguments written at the call site belong to the caller's code
        let type_arguments =
            resolve_type_arguments(call, callee, self.reentrancy.current_type_arguments())?;

        let mut scope = InliningScope::enter_callee(self, &callee.name)?;
        scope.reentrancy.set_type_arguments(type_arguments.clone());
        scope.frame.emit(Insn::InlineMarker {
            callee: callee.name.clone(),
            begin: true,
        })?;
        generate_assert_field_if_needed(callee);

        let parameters =
            scope.materialize_parameters(call, callee, &type_arguments, evaluator, splicer)?;
        debug!(
            callee = %callee.name,
            parameters = parameters.len(),
            "materialized inline parameters"
        );

        let return_type = scope
            .mapper
            .map_return_type(&callee.return_type.substitute(&type_arguments));
        scope.reentrancy.begin_body();
        let request = SpliceRequest {
            call,
            callee,
            type_arguments: &type_arguments,
            parameters: &parameters,
            return_type: return_type.clone(),
        };
        let result = splicer.splice(&request, &mut scope, evaluator)?;
        let result = scope.put_result(result, &return_type)?;

        scope.frame.emit(Insn::InlineMarker {
            callee: callee.name.clone(),
            begin: false,
        })?;

        if scope.config.check_stack_balance {
            let expected = entry_depth + return_type.size();
            if scope.frame.stack_depth() != expected {
                return Err(CodeGenError::internal(format!(
                    "unbalanced operand stack after inlining '{}': depth {}, expected {}",
                    callee.name,
                    scope.frame.stack_depth(),
                    expected
                )));
            }
        }
        Ok(result)
    }

    /// Splice a callee body: its statements run in a scope holding only the
    /// callee's parameters.
    pub fn splice_body(
        &mut self,
        request: &SpliceRequest<'_, 'm>,
        evaluator: &mut dyn ExpressionEvaluator<'m>,
        splicer: &mut dyn BodySplicer<'m>,
    ) -> Result<StackValue, CodeGenError> {
        let scope = request.parameters.scope(request.callee);
        self.with_scope(scope, |cx| {
            cx.evaluate_statements(&request.callee.body, &request.return_type, evaluator, splicer)
        })
    }

    /// Expand an invocation of an inline lambda in place.
    ///
    /// `arguments` are evaluated first, in the invoking body's scope. The
    /// lambda body then runs under a lambda marker with its own parameters,
    /// captured values included, as the only visible names.
    pub fn expand_lambda_invocation(
        &mut self,
        lambda: &ExpandedLambda<'m>,
        arguments: &'m [Expr],
        evaluator: &mut dyn ExpressionEvaluator<'m>,
        splicer: &mut dyn BodySplicer<'m>,
    ) -> Result<StackValue, CodeGenError> {
        let invoke = &lambda.invoke_method;
        if arguments.len() != invoke.args.len() {
            return Err(CodeGenError::Logic(format!(
                "inline lambda for parameter {} takes {} arguments, {} given",
                lambda.parameter_index,
                invoke.args.len(),
                arguments.len()
            )));
        }

        let mut bound = Vec::with_capacity(arguments.len());
        for (index, (argument, expected)) in arguments.iter().zip(&invoke.args).enumerate() {
            let value = evaluator.evaluate(argument, expected, self, splicer)?;
            let source_type = lambda_parameter_type(lambda, index);
            let binding = bind_value(
                &mut self.frame,
                value,
                expected,
                &source_type,
                BindingTarget::Parameter(index),
                self.config.reuse_locals,
            )?;
            bound.push(binding.as_stack_value());
        }
        let scope = lambda_scope(lambda, bound)?;

        let name = lambda.marker_name();
        let mut guard = InliningScope::enter_lambda(self, &name, lambda.owner)?;
        guard.frame.emit(Insn::InlineMarker {
            callee: name.clone(),
            begin: true,
        })?;
        let result = guard.with_scope(scope, |cx| {
            cx.evaluate_statements(&lambda.function.body, &invoke.ret, evaluator, splicer)
        })?;
        let result = guard.put_result(result, &invoke.ret)?;
        guard.frame.emit(Insn::InlineMarker {
            callee: name,
            begin: false,
        })?;
        Ok(result)
    }

    /// Evaluate a statement list; only the last statement's value is kept.
    pub fn evaluate_statements(
        &mut self,
        statements: &'m [Expr],
        target: &AsmType,
        evaluator: &mut dyn ExpressionEvaluator<'m>,
        splicer: &mut dyn BodySplicer<'m>,
    ) -> Result<StackValue, CodeGenError> {
        let (last, init) = match statements.split_last() {
            Some(split) => split,
            None => return Ok(StackValue::Void),
        };
        for statement in init {
            let value = evaluator.evaluate(statement, &AsmType::Void, self, splicer)?;
            self.discard(&value)?;
        }
        evaluator.evaluate(last, target, self, splicer)
    }

    /// Drop a value nobody uses
    pub fn discard(&mut self, value: &StackValue) -> Result<(), CodeGenError> {
        match value {
            StackValue::OnStack(ty) if !ty.is_void() => self.frame.emit(Insn::Pop(ty.clone())),
            _ => Ok(()),
        }
    }

    /// Leave `result` on the operand stack as `return_type`, or nothing for
    /// a void return
    fn put_result(
        &mut self,
        result: StackValue,
        return_type: &AsmType,
    ) -> Result<StackValue, CodeGenError> {
        if return_type.is_void() {
            self.discard(&result)?;
            return Ok(StackValue::Void);
        }
        if matches!(result, StackValue::Void) {
            return Err(CodeGenError::internal(format!(
                "inlined body produced no value, expected {}",
                return_type
            )));
        }
        self.frame.push_value(&result)?;
        self.frame.coerce(&result.ty(), return_type)?;
        Ok(StackValue::OnStack(return_type.clone()))
    }
}

/// Resolve every type parameter of `callee` for `call`.
///
/// Supplied arguments are substituted with the enclosing callee's arguments;
/// omitted ones fall back to the parameter's upper bound.
fn resolve_type_arguments(
    call: &CallSite,
    callee: &FunctionDecl,
    enclosing: Option<&TypeArguments>,
) -> Result<TypeArguments, CodeGenError> {
    if let Some(unknown) = call
        .type_arguments
        .keys()
        .find(|name| !callee.type_parameters.iter().any(|p| &p.name == *name))
    {
        return Err(CodeGenError::internal(format!(
            "type argument '{}' does not match a type parameter of '{}'",
            unknown, callee.name
        )));
    }

    let mut resolved = TypeArguments::new();
    for parameter in &callee.type_parameters {
        let ty = match call.type_arguments.get(&parameter.name) {
            Some(ty) => match enclosing {
                Some(args) => ty.substitute(args),
                None => ty.clone(),
            },
            None => {
                debug!(
                    callee = %callee.name,
                    parameter = %parameter.name,
                    bound = %parameter.upper_bound,
                    "type argument omitted, using upper bound"
                );
                parameter.upper_bound.clone()
            }
        };
        trace!(parameter = %parameter.name, %ty, "resolved type argument");
        resolved.insert(parameter.name.clone(), ty);
    }
    Ok(resolved)
}

/// Declared type of the `index`-th invocation argument of `lambda`
fn lambda_parameter_type(lambda: &ExpandedLambda<'_>, index: usize) -> crate::types::Type {
    let function = lambda.function;
    let captures = lambda.captured_vars.len();
    let param = if lambda.is_extension_lambda {
        match index {
            0 => function.extension_receiver.as_ref(),
            i => function.value_parameters.get(captures + i - 1),
        }
    } else {
        lowered_parameters(function).get(captures + index).copied()
    };
    param.map(|p| p.ty.clone()).unwrap_or(crate::types::Type::Any)
}

fn lowered_parameters(function: &FunctionDecl) -> Vec<&crate::ir::ValueParameter> {
    function
        .extension_receiver
        .iter()
        .chain(&function.value_parameters)
        .collect()
}

/// Names visible inside an expanded lambda body.
///
/// The lowered parameter list is `[receiver] captured... own...` for an
/// extension lambda and `captured... own...` otherwise, where a bound
/// reference's receiver is its single capture. A captured inline lambda
/// stays invocable under its parameter name.
fn lambda_scope<'m>(
    lambda: &ExpandedLambda<'m>,
    arguments: Vec<StackValue>,
) -> Result<Scope<'m>, CodeGenError> {
    let lowered = lowered_parameters(lambda.function);
    let receiver_slots = usize::from(lambda.is_extension_lambda);
    let captures = lambda.captured_bindings.len();
    if lowered.len() != arguments.len() + captures || captures != lambda.captured_vars.len() {
        return Err(CodeGenError::internal(format!(
            "inline lambda for parameter {} binds {} arguments and {} captures for {} parameters",
            lambda.parameter_index,
            arguments.len(),
            captures,
            lowered.len()
        )));
    }

    let mut arguments = arguments.into_iter();
    let mut scope = Scope::new();
    for (position, param) in lowered.into_iter().enumerate() {
        let captured = position
            .checked_sub(receiver_slots)
            .filter(|i| *i < captures);
        let binding = match captured.map(|i| &lambda.captured_bindings[i]) {
            Some(CapturedBinding::Value(value)) => LocalBinding::Value(value.as_stack_value()),
            Some(CapturedBinding::InlineLambda(inner)) => LocalBinding::InlineLambda(inner.clone()),
            None => LocalBinding::Value(arguments.next().unwrap_or(StackValue::Void)),
        };
        scope.insert(param.name.clone(), binding);
    }
    Ok(scope)
}

/// Assertion fields are only needed by callees that use `assert`, which this
/// backend never generates.
fn generate_assert_field_if_needed(_callee: &FunctionDecl) {}
