//! Reference backend
//!
//! A small [`ExpressionEvaluator`] and [`BodySplicer`] pair that lowers the
//! IR straight into a [`MethodFrame`](crate::codegen::MethodFrame). The CLI
//! and the integration tests drive whole expansions through it.
//!
//! Calls of inline functions go back through the driver; everything else
//! becomes ordinary stack code. Function values that are not expanded in
//! place are materialized as closure objects and called through `invoke`.

use crate::asm::{AsmType, MethodSignature};
use crate::codegen::{
    BodySplicer, BoundLocation, CodeGenError, ExpandedLambda, ExpressionEvaluator, InlineContext,
    Insn, LocalBinding, ParameterEntry, SpliceRequest, StackValue, ValueBinding,
};
use crate::ir::{CallSite, Constant, Expr, LambdaLiteral, ParameterKind};
use tracing::trace;

#[derive(Debug, Default)]
pub struct ReferenceEvaluator;

impl<'m> ExpressionEvaluator<'m> for ReferenceEvaluator {
    fn evaluate(
        &mut self,
        expr: &'m Expr,
        target: &AsmType,
        cx: &mut InlineContext<'m>,
        splicer: &mut dyn BodySplicer<'m>,
    ) -> Result<StackValue, CodeGenError> {
        trace!(kind = expr.kind_name(), %target, "evaluate");
        match expr {
            Expr::Const { value } => Ok(constant(value, cx)),
            Expr::GetValue { name, .. } => match cx.lookup_local(name) {
                Some(LocalBinding::Value(value)) => Ok(value.clone()),
                Some(LocalBinding::InlineLambda(_)) => Err(CodeGenError::Logic(format!(
                    "illegal usage of inline-parameter '{}'",
                    name
                ))),
                None => Err(CodeGenError::Logic(format!("unresolved reference: {}", name))),
            },
            Expr::Call(call) => {
                let is_inline = cx
                    .module()
                    .find_function(&call.callee)
                    .is_some_and(|f| f.is_inline);
                if is_inline {
                    cx.inline_call(call, self, splicer)
                } else {
                    self.plain_call(call, cx, splicer)
                }
            }
            Expr::Invoke { callee, arguments } => {
                if let Some(lambda) = inline_lambda_binding(callee, cx) {
                    return splicer.expand_lambda(&lambda, arguments, cx, self);
                }
                self.invoke_value(callee, arguments, cx, splicer)
            }
            Expr::Block { statements } => cx.evaluate_statements(statements, target, self, splicer),
            Expr::Lambda(literal)
            | Expr::AnonymousFunction(literal)
            | Expr::BoundReference(literal) => self.closure(literal, cx, splicer),
        }
    }
}

impl ReferenceEvaluator {
    /// Evaluate `expr` and leave it on the stack as `ty`
    fn push<'m>(
        &mut self,
        expr: &'m Expr,
        ty: &AsmType,
        cx: &mut InlineContext<'m>,
        splicer: &mut dyn BodySplicer<'m>,
    ) -> Result<(), CodeGenError> {
        let value = self.evaluate(expr, ty, cx, splicer)?;
        cx.frame_mut().push_value(&value)?;
        cx.frame_mut().coerce(&value.ty(), ty)
    }

    /// Call of a function that is not inlined
    fn plain_call<'m>(
        &mut self,
        call: &'m CallSite,
        cx: &mut InlineContext<'m>,
        splicer: &mut dyn BodySplicer<'m>,
    ) -> Result<StackValue, CodeGenError> {
        let callee = cx
            .module()
            .find_function(&call.callee)
            .ok_or_else(|| format!("unresolved function: {}", call.callee))?;
        let signature = cx.mapper().map_method_signature(callee);

        // Lowered argument order: receiver, captured, value
        let arguments: Vec<&'m Expr> = call
            .receiver
            .as_deref()
            .into_iter()
            .chain(&call.captured_arguments)
            .chain(&call.arguments)
            .collect();
        if arguments.len() != signature.args.len() {
            return Err(CodeGenError::Logic(format!(
                "'{}' expects {} arguments, {} given",
                callee.name,
                signature.args.len(),
                arguments.len()
            )));
        }
        for (argument, ty) in arguments.into_iter().zip(&signature.args) {
            self.push(argument, ty, cx, splicer)?;
        }

        let generic_ret = signature.ret.clone();
        cx.frame_mut().emit(Insn::Call {
            signature,
            receiver: false,
        })?;
        if generic_ret.is_void() {
            return Ok(StackValue::Void);
        }
        let ret = cx
            .mapper()
            .map_return_type(&cx.substitute(&callee.return_type.substitute(&call.type_arguments)));
        if ret.is_void() {
            cx.discard(&StackValue::OnStack(generic_ret))?;
            return Ok(StackValue::Void);
        }
        cx.frame_mut().coerce(&generic_ret, &ret)?;
        Ok(StackValue::OnStack(ret))
    }

    /// `value(args)` on a function object
    fn invoke_value<'m>(
        &mut self,
        callee: &'m Expr,
        arguments: &'m [Expr],
        cx: &mut InlineContext<'m>,
        splicer: &mut dyn BodySplicer<'m>,
    ) -> Result<StackValue, CodeGenError> {
        let object = AsmType::object(AsmType::OBJECT);
        let function = self.evaluate(callee, &object, cx, splicer)?;
        if !matches!(function.ty(), AsmType::Object(_)) {
            return Err(CodeGenError::Logic(format!(
                "cannot invoke a value of type {}",
                function.ty()
            )));
        }
        cx.frame_mut().push_value(&function)?;
        for argument in arguments {
            let value = self.evaluate(argument, &object, cx, splicer)?;
            let boxed = value.ty().boxed();
            cx.frame_mut().push_value(&value)?;
            cx.frame_mut().coerce(&value.ty(), &boxed)?;
        }
        let signature =
            MethodSignature::new("invoke", vec![object.clone(); arguments.len()], object.clone());
        cx.frame_mut().emit(Insn::Call {
            signature,
            receiver: true,
        })?;
        Ok(StackValue::OnStack(object))
    }

    /// Closure object for a lambda that is not expanded in place
    fn closure<'m>(
        &mut self,
        literal: &'m LambdaLiteral,
        cx: &mut InlineContext<'m>,
        splicer: &mut dyn BodySplicer<'m>,
    ) -> Result<StackValue, CodeGenError> {
        let mut captures = Vec::with_capacity(literal.bound_arguments.len());
        for argument in &literal.bound_arguments {
            let value = self.evaluate(argument, &AsmType::object(AsmType::OBJECT), cx, splicer)?;
            cx.frame_mut().push_value(&value)?;
            captures.push(value.ty());
        }
        let class = cx.mapper().map_type(&literal.function_type());
        cx.frame_mut().emit(Insn::NewClosure {
            class: class.clone(),
            captures,
        })?;
        Ok(StackValue::OnStack(class))
    }
}

fn constant(value: &Constant, cx: &InlineContext<'_>) -> StackValue {
    match value {
        Constant::Unit => StackValue::Void,
        other => StackValue::Constant {
            value: other.clone(),
            ty: cx.mapper().map_type(&other.ty()),
        },
    }
}

/// The expanded lambda behind `callee`, if it names an inline lambda
/// parameter
fn inline_lambda_binding<'m>(callee: &Expr, cx: &InlineContext<'m>) -> Option<ExpandedLambda<'m>> {
    match callee {
        Expr::GetValue { name, .. } => match cx.lookup_local(name) {
            Some(LocalBinding::InlineLambda(lambda)) => Some(lambda.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Parameter table of one spliced callee, rendered for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct SpliceRecord {
    pub callee: String,
    /// `(parameter name, binding)` in materialization order
    pub parameters: Vec<(String, String)>,
}

impl SpliceRecord {
    fn new(request: &SpliceRequest<'_, '_>) -> Self {
        let table = request.parameters;
        let parameters = request
            .callee
            .formal_parameters()
            .into_iter()
            .map(|formal| {
                let entry = match formal.kind {
                    ParameterKind::Captured => table
                        .captured()
                        .get(formal.index)
                        .map(describe_value),
                    _ => table.get(formal.index).map(|entry| match entry {
                        ParameterEntry::Value(binding) => describe_value(binding),
                        ParameterEntry::Lambda(lambda) => describe_lambda(lambda),
                    }),
                };
                (formal.param.name.clone(), entry.unwrap_or_else(|| "missing".to_string()))
            })
            .collect();
        SpliceRecord {
            callee: request.callee.name.clone(),
            parameters,
        }
    }

    /// Binding of the parameter called `name`
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b.as_str())
    }
}

fn describe_value(binding: &ValueBinding) -> String {
    match binding.location {
        BoundLocation::Fresh(slot) => format!("value {} in slot {}", binding.ty, slot),
        BoundLocation::Reused(slot) => format!("value {} reusing slot {}", binding.ty, slot),
        BoundLocation::Deferred => "value V deferred".to_string(),
    }
}

fn describe_lambda(lambda: &ExpandedLambda<'_>) -> String {
    let captures: Vec<String> = lambda
        .captured_vars
        .iter()
        .map(|c| format!("{}:{}", c.name, c.ty))
        .collect();
    format!(
        "inline lambda {} captures [{}]",
        lambda.invoke_method_descriptor(),
        captures.join(", ")
    )
}

/// Splices callee bodies and lambda bodies statement by statement
#[derive(Debug, Default)]
pub struct ReferenceSplicer {
    records: Vec<SpliceRecord>,
    lambda_expansions: usize,
}

impl ReferenceSplicer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callee bodies spliced so far, in splice order
    pub fn records(&self) -> &[SpliceRecord] {
        &self.records
    }

    /// Lambda invocations expanded in place so far
    pub fn lambda_expansions(&self) -> usize {
        self.lambda_expansions
    }
}

impl<'m> BodySplicer<'m> for ReferenceSplicer {
    fn splice(
        &mut self,
        request: &SpliceRequest<'_, 'm>,
        cx: &mut InlineContext<'m>,
        evaluator: &mut dyn ExpressionEvaluator<'m>,
    ) -> Result<StackValue, CodeGenError> {
        self.records.push(SpliceRecord::new(request));
        cx.splice_body(request, evaluator, self)
    }

    fn expand_lambda(
        &mut self,
        lambda: &ExpandedLambda<'m>,
        arguments: &'m [Expr],
        cx: &mut InlineContext<'m>,
        evaluator: &mut dyn ExpressionEvaluator<'m>,
    ) -> Result<StackValue, CodeGenError> {
        self.lambda_expansions += 1;
        cx.expand_lambda_invocation(lambda, arguments, evaluator, self)
    }
}
