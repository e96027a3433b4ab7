//! Inline Lambda Recognition and Expanded-Lambda Descriptors
//!
//! A lambda literal bound to an inline function parameter is never turned
//! into a closure object. The materializer records an [`ExpandedLambda`]
//! instead, and the body splicer expands the lambda's body wherever the
//! callee invokes that parameter, calling it through the specialized
//! signature with the captured values already sitting in locals.

use super::CodeGenError;
use super::binder::ValueBinding;
use crate::asm::{AsmType, MethodSignature};
use crate::capture_analysis::{
    CapturedVariable, captured_window, derive_specialized_signature, extract_captures,
};
use crate::ir::{Expr, FunctionDecl, LambdaLiteral};
use crate::type_mapper::TypeMapper;

/// True if `expr` is a lambda literal, anonymous function or bound callable
/// reference that can be expanded in place.
pub fn is_inline_lambda_argument(expr: &Expr) -> bool {
    inline_lambda(expr).is_some()
}

/// The literal behind an inline lambda argument and whether it is a bound
/// callable reference
pub fn inline_lambda(expr: &Expr) -> Option<(&LambdaLiteral, bool)> {
    match expr {
        Expr::Lambda(literal) | Expr::AnonymousFunction(literal) => Some((literal, false)),
        Expr::BoundReference(literal) => Some((literal, true)),
        _ => None,
    }
}

/// How one captured value of an inline lambda is held
#[derive(Debug, Clone)]
pub enum CapturedBinding<'a> {
    /// Read into a local at registration
    Value(ValueBinding),
    /// An inline lambda parameter of the enclosing body. The nested body
    /// expands it in place like its owner would.
    InlineLambda(ExpandedLambda<'a>),
}

/// Everything the body splicer needs to expand one inline lambda argument.
///
/// Borrows the call site's IR, so it cannot outlive the inlining operation
/// that created it.
#[derive(Debug, Clone)]
pub struct ExpandedLambda<'a> {
    /// Ordinal of the inline parameter this lambda is bound to
    pub parameter_index: usize,
    /// Lowered lambda body
    pub function: &'a FunctionDecl,
    /// Expressions producing the captured values
    pub bound_arguments: &'a [Expr],
    pub captured_vars: Vec<CapturedVariable>,
    /// Lowered signature including captured parameters
    pub generic_signature: MethodSignature,
    /// Signature used at inlined invocation sites
    pub invoke_method: MethodSignature,
    pub is_bound_callable_reference: bool,
    pub is_extension_lambda: bool,
    pub is_crossinline: bool,
    /// Reentrancy marker of the inline call this lambda was passed to
    pub owner: usize,
    /// Captured values in capture order
    pub captured_bindings: Vec<CapturedBinding<'a>>,
    captured_window: Vec<AsmType>,
}

impl<'a> ExpandedLambda<'a> {
    pub fn new(
        parameter_index: usize,
        literal: &'a LambdaLiteral,
        is_bound_callable_reference: bool,
        is_crossinline: bool,
        mapper: &dyn TypeMapper,
    ) -> Result<Self, CodeGenError> {
        let function = literal.function.as_ref();
        let captured_vars = extract_captures(&literal.bound_arguments, mapper)?;

        if is_bound_callable_reference && captured_vars.len() != 1 {
            return Err(CodeGenError::internal(format!(
                "bound reference to '{}' carries {} bound arguments, expected exactly one receiver",
                function.name,
                captured_vars.len()
            )));
        }
        // A bound reference's receiver is captured, so it is never an extension lambda
        let is_extension_lambda =
            function.extension_receiver.is_some() && !is_bound_callable_reference;

        let generic_signature = mapper.map_method_signature(function);
        let invoke_method =
            derive_specialized_signature(&generic_signature, &captured_vars, is_extension_lambda)?;
        let captured_window =
            captured_window(&generic_signature, captured_vars.len(), is_extension_lambda)?
                .to_vec();

        Ok(ExpandedLambda {
            parameter_index,
            function,
            bound_arguments: &literal.bound_arguments,
            captured_vars,
            generic_signature,
            invoke_method,
            is_bound_callable_reference,
            is_extension_lambda,
            is_crossinline,
            owner: 0,
            captured_bindings: Vec::new(),
            captured_window,
        })
    }

    /// Types of the captured parameters as they appear in the lowered signature
    pub fn captured_params_in_desc(&self) -> &[AsmType] {
        &self.captured_window
    }

    pub fn invoke_method_descriptor(&self) -> String {
        self.invoke_method.descriptor()
    }

    /// Marker name used while the lambda body is expanded
    pub fn marker_name(&self) -> String {
        format!("{}${}", self.function.name, self.parameter_index)
    }

    /// Lambdas expanded in place never carry a dispatch receiver
    pub fn has_dispatch_receiver(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CallSite, ValueParameter};
    use crate::type_mapper::DefaultTypeMapper;
    use crate::types::Type;

    fn lambda_body(params: Vec<ValueParameter>) -> Box<FunctionDecl> {
        let mut decl = FunctionDecl::new("invoke");
        decl.value_parameters = params;
        decl.return_type = Type::Int;
        Box::new(decl)
    }

    fn adder_literal() -> LambdaLiteral {
        LambdaLiteral {
            function: lambda_body(vec![
                ValueParameter::new("captured", Type::Int),
                ValueParameter::new("it", Type::Int),
            ]),
            bound_arguments: vec![Expr::get("captured", Type::Int)],
        }
    }

    #[test]
    fn test_recognizer_accepts_literals_only() {
        let literal = adder_literal();
        assert!(is_inline_lambda_argument(&Expr::Lambda(literal.clone())));
        assert!(is_inline_lambda_argument(&Expr::AnonymousFunction(
            literal.clone()
        )));
        assert!(is_inline_lambda_argument(&Expr::BoundReference(literal)));

        let fn_type = Type::function(vec![Type::Int], Type::Int);
        assert!(!is_inline_lambda_argument(&Expr::get("f", fn_type)));
        assert!(!is_inline_lambda_argument(&Expr::Call(CallSite::new(
            "make",
            vec![]
        ))));
        assert!(!is_inline_lambda_argument(&Expr::Block { statements: vec![] }));
    }

    #[test]
    fn test_descriptor_for_capturing_lambda() {
        let literal = adder_literal();
        let lambda = ExpandedLambda::new(0, &literal, false, false, &DefaultTypeMapper).unwrap();

        assert_eq!(lambda.captured_vars.len(), 1);
        assert_eq!(lambda.captured_vars[0].name, "captured");
        assert_eq!(lambda.captured_vars[0].ty, AsmType::Int);
        assert_eq!(lambda.generic_signature.descriptor(), "(II)I");
        assert_eq!(lambda.invoke_method_descriptor(), "(I)I");
        assert_eq!(lambda.captured_params_in_desc(), &[AsmType::Int]);
        assert!(!lambda.has_dispatch_receiver());
        assert!(!lambda.is_extension_lambda);
    }

    #[test]
    fn test_extension_lambda_keeps_receiver() {
        let mut body = lambda_body(vec![
            ValueParameter::new("n", Type::Long),
            ValueParameter::new("x", Type::Int),
        ]);
        body.extension_receiver = Some(ValueParameter::new("this", Type::String));
        let literal = LambdaLiteral {
            function: body,
            bound_arguments: vec![Expr::get("n", Type::Long)],
        };

        let lambda = ExpandedLambda::new(1, &literal, false, true, &DefaultTypeMapper).unwrap();
        assert!(lambda.is_extension_lambda);
        assert!(lambda.is_crossinline);
        assert_eq!(lambda.invoke_method_descriptor(), "(Ljava/lang/String;I)I");
        assert_eq!(lambda.captured_params_in_desc(), &[AsmType::Long]);
    }

    #[test]
    fn test_bound_reference_captures_receiver() {
        let literal = LambdaLiteral {
            function: lambda_body(vec![
                ValueParameter::new("receiver", Type::String),
                ValueParameter::new("x", Type::Int),
            ]),
            bound_arguments: vec![Expr::get("s", Type::String)],
        };
        let lambda = ExpandedLambda::new(0, &literal, true, false, &DefaultTypeMapper).unwrap();
        assert!(lambda.is_bound_callable_reference);
        assert!(!lambda.is_extension_lambda);
        assert_eq!(lambda.invoke_method_descriptor(), "(I)I");
    }

    #[test]
    fn test_bound_reference_without_receiver_is_internal() {
        let literal = LambdaLiteral {
            function: lambda_body(vec![ValueParameter::new("x", Type::Int)]),
            bound_arguments: vec![],
        };
        let err = ExpandedLambda::new(0, &literal, true, false, &DefaultTypeMapper).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_inconsistent_closure_shape_is_internal() {
        // Two bound arguments but the lowered body only has one parameter
        let literal = LambdaLiteral {
            function: lambda_body(vec![ValueParameter::new("a", Type::Int)]),
            bound_arguments: vec![Expr::get("a", Type::Int), Expr::get("b", Type::Int)],
        };
        let err = ExpandedLambda::new(0, &literal, false, false, &DefaultTypeMapper).unwrap_err();
        assert!(err.is_internal());
    }
}
