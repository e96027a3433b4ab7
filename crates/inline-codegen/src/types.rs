//! Source-level type system
//!
//! Types here are what the front end resolved for each expression and
//! declaration. They are already checked; the inliner only inspects their
//! shape (is this a function type? is it nullable?) and substitutes type
//! parameters at a call site before handing them to the type mapper.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Base types in the language
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    /// The unit type (no meaningful value)
    Unit,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Long,
    /// IEEE 754 double precision float
    Double,
    /// Boolean type
    Boolean,
    /// String type
    String,
    /// Top type; also the default upper bound of a type parameter
    Any,
    /// Named class type, e.g. `kotlin.collections.List`
    Class(String),
    /// Nullable version of the inner type (`T?`)
    Nullable(Box<Type>),
    /// Function type, optionally with an extension receiver
    /// Example: `Int.(String) -> Boolean`
    Function(Box<FunctionType>),
    /// Type parameter reference (for generic callees)
    /// Example: T in `inline fun <T> run(block: () -> T): T`
    Param(String),
}

/// Shape of a function type: `Receiver.(P1, P2) -> R`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct FunctionType {
    #[serde(default)]
    pub receiver: Option<Type>,
    #[serde(default)]
    pub params: Vec<Type>,
    pub ret: Type,
}

/// Concrete types bound to a callee's type parameters at one call site
pub type TypeArguments = HashMap<String, Type>;

impl Type {
    /// Build a function type without receiver
    pub fn function(params: Vec<Type>, ret: Type) -> Type {
        Type::Function(Box::new(FunctionType {
            receiver: None,
            params,
            ret,
        }))
    }

    /// Build an extension function type `receiver.(params) -> ret`
    pub fn extension_function(receiver: Type, params: Vec<Type>, ret: Type) -> Type {
        Type::Function(Box::new(FunctionType {
            receiver: Some(receiver),
            params,
            ret,
        }))
    }

    /// Wrap this type as nullable (idempotent)
    pub fn nullable(self) -> Type {
        match self {
            Type::Nullable(_) => self,
            other => Type::Nullable(Box::new(other)),
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Nullable(_))
    }

    /// True for function types, including nullable ones.
    ///
    /// The materializer still refuses nullable function parameters as inline
    /// targets; this only answers "is the value callable".
    pub fn is_function(&self) -> bool {
        match self {
            Type::Function(_) => true,
            Type::Nullable(inner) => inner.is_function(),
            _ => false,
        }
    }

    /// Function shape of a non-nullable function type
    pub fn as_function(&self) -> Option<&FunctionType> {
        match self {
            Type::Function(ft) => Some(ft),
            _ => None,
        }
    }

    /// Replace type parameters with their bound arguments.
    ///
    /// Parameters without a binding are left untouched; the driver resolves
    /// every callee parameter before substituting, so leftovers belong to an
    /// enclosing scope.
    pub fn substitute(&self, args: &TypeArguments) -> Type {
        match self {
            Type::Param(name) => args.get(name).cloned().unwrap_or_else(|| self.clone()),
            Type::Nullable(inner) => inner.substitute(args).nullable(),
            Type::Function(ft) => Type::Function(Box::new(FunctionType {
                receiver: ft.receiver.as_ref().map(|r| r.substitute(args)),
                params: ft.params.iter().map(|p| p.substitute(args)).collect(),
                ret: ft.ret.substitute(args),
            })),
            _ => self.clone(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unit => write!(f, "Unit"),
            Type::Int => write!(f, "Int"),
            Type::Long => write!(f, "Long"),
            Type::Double => write!(f, "Double"),
            Type::Boolean => write!(f, "Boolean"),
            Type::String => write!(f, "String"),
            Type::Any => write!(f, "Any"),
            Type::Class(name) => write!(f, "{}", name),
            Type::Nullable(inner) if inner.is_function() => write!(f, "({})?", inner),
            Type::Nullable(inner) => write!(f, "{}?", inner),
            Type::Function(ft) => {
                if let Some(receiver) = &ft.receiver {
                    write!(f, "{}.", receiver)?;
                }
                write!(f, "(")?;
                for (i, p) in ft.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", ft.ret)
            }
            Type::Param(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_function_types() {
        let ty = Type::function(vec![Type::Int], Type::Int);
        assert_eq!(ty.to_string(), "(Int) -> Int");

        let ext = Type::extension_function(Type::String, vec![], Type::Boolean);
        assert_eq!(ext.to_string(), "String.() -> Boolean");

        assert_eq!(ty.clone().nullable().to_string(), "((Int) -> Int)?");
    }

    #[test]
    fn test_nullable_is_idempotent() {
        let ty = Type::Int.nullable().nullable();
        assert_eq!(ty, Type::Nullable(Box::new(Type::Int)));
    }

    #[test]
    fn test_is_function_sees_through_nullable() {
        let ty = Type::function(vec![], Type::Unit).nullable();
        assert!(ty.is_function());
        assert!(ty.as_function().is_none());
    }

    #[test]
    fn test_substitute_nested() {
        let mut args = TypeArguments::new();
        args.insert("T".to_string(), Type::String);

        let ty = Type::function(vec![Type::Param("T".to_string())], Type::Param("R".to_string()))
            .nullable();
        let substituted = ty.substitute(&args);
        assert_eq!(
            substituted,
            Type::function(vec![Type::String], Type::Param("R".to_string())).nullable()
        );
    }

    #[test]
    fn test_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Holder {
            ty: Type,
        }
        let holder: Holder =
            toml::from_str("ty = { function = { params = [\"int\"], ret = \"int\" } }").unwrap();
        assert_eq!(holder.ty, Type::function(vec![Type::Int], Type::Int));
    }
}
