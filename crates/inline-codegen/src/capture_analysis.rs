//! Capture Analysis for Inline Lambdas
//!
//! A lambda literal passed to an inline parameter is lowered into a function
//! whose leading parameters receive the lambda's captured variables. Inside
//! the inlined body the captured values are already bound to locals, so the
//! lambda is invoked with a *specialized* signature that omits them.
//!
//! ## Example
//!
//! ```text
//! val captured = 10
//! apply({ it + captured }, 5)
//! ```
//!
//! Here:
//! - Lowered lambda: `invoke(II)I` (captured, it)
//! - Captures: `[captured: I]`
//! - Specialized signature: `invoke(I)I` (it)
//!
//! For an extension lambda `String.(Int) -> Int` the receiver stays first:
//! lowered `invoke(Ljava/lang/String;II)I` with one capture becomes
//! `invoke(Ljava/lang/String;I)I`.

use crate::asm::{AsmType, MethodSignature};
use crate::codegen::CodeGenError;
use crate::ir::Expr;
use crate::type_mapper::TypeMapper;
use crate::types::Type;

/// One captured variable of an inline lambda
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedVariable {
    pub name: String,
    pub ty: AsmType,
    pub source_type: Type,
}

/// Extract the capture list of an inline lambda from its bound arguments.
///
/// Captures keep the order of `bound_arguments`; that order is the layout of
/// the captured window in the lowered signature.
///
/// # Errors
///
/// Every bound argument must be a plain variable read. The lowering stage
/// only synthesizes reads here, so anything else is an internal error.
pub fn extract_captures(
    bound_arguments: &[Expr],
    mapper: &dyn TypeMapper,
) -> Result<Vec<CapturedVariable>, CodeGenError> {
    bound_arguments
        .iter()
        .enumerate()
        .map(|(index, arg)| match arg {
            Expr::GetValue { name, ty } => Ok(CapturedVariable {
                name: name.clone(),
                ty: mapper.map_type(ty),
                source_type: ty.clone(),
            }),
            other => Err(CodeGenError::internal(format!(
                "captured argument {} of inline lambda is a {}, expected a variable read",
                index,
                other.kind_name()
            ))),
        })
        .collect()
}

/// Argument types of the captured window: the `capture_count` arguments
/// following the optional extension receiver.
///
/// # Errors
///
/// Returns an internal error if the lowered signature has fewer arguments
/// after the receiver than there are captures.
pub fn captured_window(
    generic: &MethodSignature,
    capture_count: usize,
    is_extension_lambda: bool,
) -> Result<&[AsmType], CodeGenError> {
    let receiver_slots = usize::from(is_extension_lambda);
    let available = generic.args.len().saturating_sub(receiver_slots);
    if capture_count > available || generic.args.len() < receiver_slots {
        return Err(CodeGenError::internal(format!(
            "closure shape mismatch for '{}': {} captures, {} arguments after the receiver in {}",
            generic.name,
            capture_count,
            available,
            generic.descriptor()
        )));
    }
    Ok(&generic.args[receiver_slots..receiver_slots + capture_count])
}

/// Derive the specialized invocation signature of an inline lambda.
///
/// Keeps the extension receiver (if any) first, drops the captured window,
/// and keeps the name and return type.
pub fn derive_specialized_signature(
    generic: &MethodSignature,
    captures: &[CapturedVariable],
    is_extension_lambda: bool,
) -> Result<MethodSignature, CodeGenError> {
    // Validates the window before slicing below
    captured_window(generic, captures.len(), is_extension_lambda)?;

    let receiver_slots = usize::from(is_extension_lambda);
    let args = generic.args[..receiver_slots]
        .iter()
        .chain(&generic.args[receiver_slots + captures.len()..])
        .cloned()
        .collect();
    Ok(MethodSignature::new(
        generic.name.clone(),
        args,
        generic.ret.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Constant;
    use crate::type_mapper::DefaultTypeMapper;

    fn capture(name: &str, ty: AsmType) -> CapturedVariable {
        CapturedVariable {
            name: name.to_string(),
            ty,
            source_type: Type::Int,
        }
    }

    fn string() -> AsmType {
        AsmType::object("java/lang/String")
    }

    #[test]
    fn test_extract_preserves_order() {
        let args = vec![
            Expr::get("b", Type::String),
            Expr::get("a", Type::Int),
            Expr::get("c", Type::Long),
        ];
        let captures = extract_captures(&args, &DefaultTypeMapper).unwrap();
        let names: Vec<_> = captures.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(captures[0].ty, string());
        assert_eq!(captures[2].ty, AsmType::Long);
    }

    #[test]
    fn test_extract_rejects_non_read() {
        let args = vec![
            Expr::get("a", Type::Int),
            Expr::Const {
                value: Constant::Int(3),
            },
        ];
        let err = extract_captures(&args, &DefaultTypeMapper).unwrap_err();
        assert!(err.is_internal());
        assert!(err.to_string().contains("captured argument 1"));
    }

    #[test]
    fn test_no_captures_keeps_signature() {
        let generic = MethodSignature::new("invoke", vec![AsmType::Int], AsmType::Int);
        let specialized = derive_specialized_signature(&generic, &[], false).unwrap();
        assert_eq!(specialized, generic);
    }

    #[test]
    fn test_drops_captured_prefix() {
        let generic = MethodSignature::new(
            "invoke",
            vec![AsmType::Int, AsmType::Long, string()],
            AsmType::Boolean,
        );
        let captures = vec![capture("x", AsmType::Int), capture("y", AsmType::Long)];
        let specialized = derive_specialized_signature(&generic, &captures, false).unwrap();
        assert_eq!(specialized.descriptor(), "(Ljava/lang/String;)Z");
        assert_eq!(specialized.name, "invoke");
    }

    #[test]
    fn test_extension_receiver_stays_first() {
        let generic = MethodSignature::new(
            "invoke",
            vec![string(), AsmType::Int, AsmType::Double],
            AsmType::Int,
        );
        let captures = vec![capture("x", AsmType::Int)];
        let specialized = derive_specialized_signature(&generic, &captures, true).unwrap();
        assert_eq!(specialized.descriptor(), "(Ljava/lang/String;D)I");

        let window = captured_window(&generic, 1, true).unwrap();
        assert_eq!(window, &[AsmType::Int]);
    }

    #[test]
    fn test_capture_count_mismatch_is_internal() {
        let generic = MethodSignature::new("invoke", vec![string(), AsmType::Int], AsmType::Int);
        let captures = vec![capture("x", AsmType::Int), capture("y", AsmType::Int)];
        let err = derive_specialized_signature(&generic, &captures, true).unwrap_err();
        assert!(err.is_internal());
        assert!(err.to_string().contains("2 captures, 1 arguments"));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let generic = MethodSignature::new(
            "invoke",
            vec![AsmType::Int, AsmType::Int],
            AsmType::Int,
        );
        let captures = vec![capture("x", AsmType::Int)];
        let first = derive_specialized_signature(&generic, &captures, false).unwrap();
        let second = derive_specialized_signature(&generic, &captures, false).unwrap();
        assert_eq!(first, second);
    }
}
