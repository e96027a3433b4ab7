//! Typed intermediate representation consumed by the inliner
//!
//! The front end has already parsed, resolved and type-checked everything
//! here. Expression shapes form a closed enum: the inliner recognizes inline
//! lambda arguments by matching on the variant, and lambda literals carry
//! their bound (captured) arguments directly in the payload.

use crate::types::{Type, TypeArguments};
use serde::Deserialize;

/// A literal constant
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constant {
    Unit,
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
}

impl Constant {
    /// Source type of the literal
    pub fn ty(&self) -> Type {
        match self {
            Constant::Unit => Type::Unit,
            Constant::Null => Type::Any.nullable(),
            Constant::Boolean(_) => Type::Boolean,
            Constant::Int(_) => Type::Int,
            Constant::Long(_) => Type::Long,
            Constant::Double(_) => Type::Double,
            Constant::String(_) => Type::String,
        }
    }
}

impl std::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Unit => write!(f, "Unit"),
            Constant::Null => write!(f, "null"),
            Constant::Boolean(b) => write!(f, "{}", b),
            Constant::Int(i) => write!(f, "{}", i),
            Constant::Long(l) => write!(f, "{}L", l),
            Constant::Double(d) => write!(f, "{:?}", d),
            Constant::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// A lambda literal, anonymous function or bound callable reference.
///
/// `function` is the lowered body: its leading value parameters receive the
/// bound arguments, in the same order as `bound_arguments`. For a bound
/// callable reference the single bound argument is the receiver.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LambdaLiteral {
    pub function: Box<FunctionDecl>,
    #[serde(default)]
    pub bound_arguments: Vec<Expr>,
}

impl LambdaLiteral {
    /// Function type of the literal as seen by its consumer (captures hidden)
    pub fn function_type(&self) -> Type {
        let captured = self.bound_arguments.len();
        let params = self
            .function
            .value_parameters
            .iter()
            .skip(captured)
            .map(|p| p.ty.clone())
            .collect();
        match &self.function.extension_receiver {
            Some(receiver) => Type::extension_function(
                receiver.ty.clone(),
                params,
                self.function.return_type.clone(),
            ),
            None => Type::function(params, self.function.return_type.clone()),
        }
    }
}

/// Expressions of the typed IR
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    /// Literal constant
    Const { value: Constant },
    /// Read of a local variable or parameter
    GetValue { name: String, ty: Type },
    /// Call of a named function (inline or not)
    Call(CallSite),
    /// Invocation of a function-typed value
    Invoke {
        callee: Box<Expr>,
        #[serde(default)]
        arguments: Vec<Expr>,
    },
    /// Statement block; its value is the value of the last expression
    Block { statements: Vec<Expr> },
    /// `{ x -> ... }`
    Lambda(LambdaLiteral),
    /// `fun(x: Int): Int { ... }`
    AnonymousFunction(LambdaLiteral),
    /// `receiver::function`
    BoundReference(LambdaLiteral),
}

impl Expr {
    pub fn int(value: i32) -> Expr {
        Expr::Const {
            value: Constant::Int(value),
        }
    }

    pub fn get(name: impl Into<String>, ty: Type) -> Expr {
        Expr::GetValue {
            name: name.into(),
            ty,
        }
    }

    /// Short label used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Const { .. } => "constant",
            Expr::GetValue { .. } => "variable read",
            Expr::Call(_) => "call",
            Expr::Invoke { .. } => "invoke",
            Expr::Block { .. } => "block",
            Expr::Lambda(_) => "lambda",
            Expr::AnonymousFunction(_) => "anonymous function",
            Expr::BoundReference(_) => "bound reference",
        }
    }
}

/// A generic type parameter of a function
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TypeParameter {
    pub name: String,
    #[serde(default = "default_upper_bound")]
    pub upper_bound: Type,
}

/// Implicit bound of an unconstrained type parameter (`Any?`)
fn default_upper_bound() -> Type {
    Type::Any.nullable()
}

/// A declared parameter of a function
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ValueParameter {
    pub name: String,
    pub ty: Type,
    #[serde(default)]
    pub is_crossinline: bool,
    #[serde(default)]
    pub is_noinline: bool,
    /// Declares a default value (the call site may omit the argument)
    #[serde(default)]
    pub has_default: bool,
}

impl ValueParameter {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        ValueParameter {
            name: name.into(),
            ty,
            is_crossinline: false,
            is_noinline: false,
            has_default: false,
        }
    }

    pub fn noinline(mut self) -> Self {
        self.is_noinline = true;
        self
    }

    pub fn crossinline(mut self) -> Self {
        self.is_crossinline = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    #[serde(default)]
    pub is_inline: bool,
    #[serde(default)]
    pub type_parameters: Vec<TypeParameter>,
    #[serde(default)]
    pub extension_receiver: Option<ValueParameter>,
    /// Closure-style parameters bound by an enclosing scope (local functions)
    #[serde(default)]
    pub captured_parameters: Vec<ValueParameter>,
    #[serde(default)]
    pub value_parameters: Vec<ValueParameter>,
    #[serde(default = "default_return_type")]
    pub return_type: Type,
    #[serde(default)]
    pub body: Vec<Expr>,
}

fn default_return_type() -> Type {
    Type::Unit
}

/// Role of a formal parameter in the callee's parameter list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// Closure-style parameter supplied by an enclosing scope
    Captured,
    /// Extension receiver (`this` of `fun T.foo()`)
    ExtensionReceiver,
    /// Ordinary value parameter
    Value,
}

/// A formal parameter together with its position.
///
/// Ordinals number the extension receiver (if any) and then the value
/// parameters from 0. Captured parameters are numbered separately by their
/// captured index.
#[derive(Debug, Clone, Copy)]
pub struct FormalParameter<'a> {
    pub index: usize,
    pub kind: ParameterKind,
    pub param: &'a ValueParameter,
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>) -> Self {
        FunctionDecl {
            name: name.into(),
            is_inline: false,
            type_parameters: Vec::new(),
            extension_receiver: None,
            captured_parameters: Vec::new(),
            value_parameters: Vec::new(),
            return_type: Type::Unit,
            body: Vec::new(),
        }
    }

    /// Captured parameters followed by receiver and value parameters,
    /// in the order the materializer visits them
    pub fn formal_parameters(&self) -> Vec<FormalParameter<'_>> {
        let captured = self
            .captured_parameters
            .iter()
            .enumerate()
            .map(|(index, param)| FormalParameter {
                index,
                kind: ParameterKind::Captured,
                param,
            });
        let receiver = self
            .extension_receiver
            .iter()
            .map(|param| (ParameterKind::ExtensionReceiver, param));
        let values = self
            .value_parameters
            .iter()
            .map(|param| (ParameterKind::Value, param));
        let explicit = receiver
            .chain(values)
            .enumerate()
            .map(|(index, (kind, param))| FormalParameter { index, kind, param });
        captured.chain(explicit).collect()
    }

    /// Number of ordinals (receiver plus value parameters)
    pub fn explicit_parameter_count(&self) -> usize {
        self.value_parameters.len() + usize::from(self.extension_receiver.is_some())
    }
}

/// A resolved call of a named function
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallSite {
    pub callee: String,
    /// Extension receiver argument, when the callee declares one
    #[serde(default)]
    pub receiver: Option<Box<Expr>>,
    #[serde(default)]
    pub arguments: Vec<Expr>,
    /// Values for the callee's captured parameters
    #[serde(default)]
    pub captured_arguments: Vec<Expr>,
    #[serde(default)]
    pub type_arguments: TypeArguments,
}

impl CallSite {
    pub fn new(callee: impl Into<String>, arguments: Vec<Expr>) -> Self {
        CallSite {
            callee: callee.into(),
            receiver: None,
            arguments,
            captured_arguments: Vec::new(),
            type_arguments: TypeArguments::new(),
        }
    }

    /// Argument expression for a formal parameter, if supplied
    pub fn argument_for(&self, formal: &FormalParameter<'_>) -> Option<&Expr> {
        match formal.kind {
            ParameterKind::Captured => self.captured_arguments.get(formal.index),
            ParameterKind::ExtensionReceiver => self.receiver.as_deref(),
            ParameterKind::Value => {
                let offset = usize::from(self.receiver.is_some());
                formal
                    .index
                    .checked_sub(offset)
                    .and_then(|i| self.arguments.get(i))
            }
        }
    }
}

/// A compilation unit: the functions visible to the inliner
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Module {
    #[serde(default, rename = "function")]
    pub functions: Vec<FunctionDecl>,
}

impl Module {
    pub fn find_function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply_decl() -> FunctionDecl {
        let mut decl = FunctionDecl::new("apply");
        decl.is_inline = true;
        decl.value_parameters = vec![
            ValueParameter::new("f", Type::function(vec![Type::Int], Type::Int)),
            ValueParameter::new("x", Type::Int),
        ];
        decl.return_type = Type::Int;
        decl
    }

    #[test]
    fn test_formal_parameter_ordinals() {
        let decl = apply_decl();
        let formals = decl.formal_parameters();
        assert_eq!(formals.len(), 2);
        assert_eq!(formals[0].index, 0);
        assert_eq!(formals[0].param.name, "f");
        assert_eq!(formals[1].index, 1);
        assert_eq!(formals[1].kind, ParameterKind::Value);
    }

    #[test]
    fn test_captured_parameters_come_first() {
        let mut decl = apply_decl();
        decl.captured_parameters = vec![ValueParameter::new("outer", Type::Long)];
        decl.extension_receiver = Some(ValueParameter::new("this", Type::String));

        let kinds: Vec<_> = decl.formal_parameters().iter().map(|f| (f.kind, f.index)).collect();
        assert_eq!(
            kinds,
            vec![
                (ParameterKind::Captured, 0),
                (ParameterKind::ExtensionReceiver, 0),
                (ParameterKind::Value, 1),
                (ParameterKind::Value, 2),
            ]
        );
        assert_eq!(decl.explicit_parameter_count(), 3);
    }

    #[test]
    fn test_argument_for_with_receiver() {
        let mut decl = apply_decl();
        decl.extension_receiver = Some(ValueParameter::new("this", Type::String));
        let mut call = CallSite::new("apply", vec![Expr::int(1), Expr::int(2)]);
        call.receiver = Some(Box::new(Expr::Const {
            value: Constant::String("r".to_string()),
        }));

        let formals = decl.formal_parameters();
        assert!(matches!(
            call.argument_for(&formals[0]),
            Some(Expr::Const { value: Constant::String(_) })
        ));
        assert_eq!(call.argument_for(&formals[2]), Some(&Expr::int(2)));
    }

    #[test]
    fn test_lambda_function_type_hides_captures() {
        let mut body = FunctionDecl::new("lambda");
        body.value_parameters = vec![
            ValueParameter::new("captured", Type::Int),
            ValueParameter::new("it", Type::Int),
        ];
        body.return_type = Type::Int;
        let literal = LambdaLiteral {
            function: Box::new(body),
            bound_arguments: vec![Expr::get("captured", Type::Int)],
        };
        assert_eq!(
            literal.function_type(),
            Type::function(vec![Type::Int], Type::Int)
        );
    }

    #[test]
    fn test_module_from_toml() {
        let module: Module = toml::from_str(
            r#"
            [[function]]
            name = "twice"
            is_inline = true
            return_type = "int"
            value_parameters = [{ name = "x", ty = "int" }]
            body = [{ kind = "get_value", name = "x", ty = "int" }]
            "#,
        )
        .unwrap();
        let twice = module.find_function("twice").unwrap();
        assert!(twice.is_inline);
        assert_eq!(twice.body, vec![Expr::get("x", Type::Int)]);
    }
}
