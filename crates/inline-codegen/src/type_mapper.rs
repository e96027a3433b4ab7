//! Source type to binary type mapping
//!
//! The inliner only consumes a [`TypeMapper`]; the real mapping lives in the
//! surrounding backend. [`DefaultTypeMapper`] is the JVM-flavoured mapping
//! used by the CLI and the tests.

use crate::asm::{AsmType, MethodSignature};
use crate::ir::FunctionDecl;
use crate::types::Type;

/// Pure, deterministic mapping from source types to binary types
pub trait TypeMapper {
    /// Binary type of a value of `ty` in a local slot or argument position
    fn map_type(&self, ty: &Type) -> AsmType;

    /// Binary type of `ty` in return position (`Unit` becomes `V`)
    fn map_return_type(&self, ty: &Type) -> AsmType {
        match ty {
            Type::Unit => AsmType::Void,
            other => self.map_type(other),
        }
    }

    /// Lowered signature of a function: receiver, captured parameters and
    /// value parameters, in that order
    fn map_method_signature(&self, decl: &FunctionDecl) -> MethodSignature {
        let args = decl
            .extension_receiver
            .iter()
            .chain(&decl.captured_parameters)
            .chain(&decl.value_parameters)
            .map(|p| self.map_type(&p.ty))
            .collect();
        MethodSignature::new(decl.name.clone(), args, self.map_return_type(&decl.return_type))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTypeMapper;

impl TypeMapper for DefaultTypeMapper {
    fn map_type(&self, ty: &Type) -> AsmType {
        match ty {
            Type::Unit => AsmType::object("kotlin/Unit"),
            Type::Int => AsmType::Int,
            Type::Long => AsmType::Long,
            Type::Double => AsmType::Double,
            Type::Boolean => AsmType::Boolean,
            Type::String => AsmType::object("java/lang/String"),
            Type::Any | Type::Param(_) => AsmType::object(AsmType::OBJECT),
            Type::Class(name) => AsmType::object(name.replace('.', "/")),
            // Nullable primitives live in their wrapper class
            Type::Nullable(inner) => self.map_type(inner).boxed(),
            Type::Function(ft) => {
                let arity = ft.params.len() + usize::from(ft.receiver.is_some());
                AsmType::object(format!("kotlin/jvm/functions/Function{}", arity))
            }
        }
    }
}
