//! TOML fixtures: a module, the caller's locals and one call to expand
//!
//! ```toml
//! [[function]]
//! name = "twice"
//! is_inline = true
//! return_type = "int"
//! value_parameters = [{ name = "x", ty = "int" }]
//! body = [{ kind = "get_value", name = "x", ty = "int" }]
//!
//! [[local]]
//! name = "n"
//! ty = "int"
//!
//! [call]
//! callee = "twice"
//! arguments = [{ kind = "get_value", name = "n", ty = "int" }]
//! ```

use crate::ir::{CallSite, FunctionDecl, Module};
use crate::types::Type;
use serde::Deserialize;
use std::path::Path;

/// A local of the method the call is expanded into
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallerLocal {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    #[serde(default, rename = "function")]
    pub functions: Vec<FunctionDecl>,
    /// Caller locals, allocated to slots in declaration order
    #[serde(default, rename = "local")]
    pub locals: Vec<CallerLocal>,
    pub call: CallSite,
}

impl Fixture {
    pub fn from_toml(source: &str) -> Result<Self, String> {
        toml::from_str(source).map_err(|e| format!("Failed to parse fixture: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_toml(&content)
    }

    /// Split into the module and the rest of the fixture
    pub fn into_parts(self) -> (Module, Vec<CallerLocal>, CallSite) {
        (
            Module {
                functions: self.functions,
            },
            self.locals,
            self.call,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Expr;

    #[test]
    fn test_parse_fixture() {
        let fixture = Fixture::from_toml(
            r#"
            [[function]]
            name = "id"
            is_inline = true
            type_parameters = [{ name = "T" }]
            return_type = { param = "T" }
            value_parameters = [{ name = "x", ty = { param = "T" } }]
            body = [{ kind = "get_value", name = "x", ty = { param = "T" } }]

            [[local]]
            name = "n"
            ty = "long"

            [call]
            callee = "id"
            type_arguments = { T = "long" }
            arguments = [{ kind = "get_value", name = "n", ty = "long" }]
            "#,
        )
        .unwrap();

        assert_eq!(fixture.functions.len(), 1);
        assert_eq!(fixture.functions[0].type_parameters[0].upper_bound, Type::Any.nullable());
        assert_eq!(fixture.locals[0].ty, Type::Long);
        assert_eq!(fixture.call.type_arguments.get("T"), Some(&Type::Long));
        assert_eq!(fixture.call.arguments, vec![Expr::get("n", Type::Long)]);
    }

    #[test]
    fn test_parse_lambda_argument() {
        let fixture = Fixture::from_toml(
            r#"
            [call]
            callee = "run"

            [[call.arguments]]
            kind = "lambda"
            bound_arguments = [{ kind = "get_value", name = "c", ty = "int" }]

            [call.arguments.function]
            name = "run$lambda"
            return_type = "int"
            value_parameters = [{ name = "c", ty = "int" }]
            body = [{ kind = "const", value = { int = 1 } }]
            "#,
        )
        .unwrap();

        match &fixture.call.arguments[0] {
            Expr::Lambda(literal) => {
                assert_eq!(literal.bound_arguments.len(), 1);
                assert_eq!(literal.function.body, vec![Expr::int(1)]);
            }
            other => panic!("expected a lambda, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_call_is_an_error() {
        let err = Fixture::from_toml("[[local]]\nname = \"n\"\nty = \"int\"\n").unwrap_err();
        assert!(err.starts_with("Failed to parse fixture"));
    }
}
