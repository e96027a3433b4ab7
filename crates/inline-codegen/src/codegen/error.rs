//! Code generation error types.

/// Error type for inline expansion.
///
/// `Internal` marks a broken invariant handed over by an earlier compiler
/// stage. It is a compiler defect, never a problem in the user's source, and
/// diagnostics print it differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeGenError {
    /// An ordinary compilation failure (ill-typed or unresolvable input)
    Logic(String),
    /// An invariant violated by an earlier compiler stage
    Internal(String),
    /// The callee is already being expanded further up the inline chain
    Recursion { callee: String, chain: Vec<String> },
    /// The inline chain grew past the configured limit
    DepthExceeded { callee: String, limit: usize },
    /// A backend feature this inliner does not implement
    Unsupported(String),
}

impl CodeGenError {
    pub fn internal(message: impl Into<String>) -> Self {
        CodeGenError::Internal(message.into())
    }

    /// True for compiler defects (as opposed to errors in the input program)
    pub fn is_internal(&self) -> bool {
        matches!(self, CodeGenError::Internal(_))
    }
}

impl std::fmt::Display for CodeGenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeGenError::Logic(s) => write!(f, "{}", s),
            CodeGenError::Internal(s) => write!(f, "internal compiler error: {}", s),
            CodeGenError::Recursion { callee, chain } => write!(
                f,
                "inline function '{}' cannot be recursive (inline chain: {} -> {})",
                callee,
                chain.join(" -> "),
                callee
            ),
            CodeGenError::DepthExceeded { callee, limit } => write!(
                f,
                "inlining '{}' exceeds the maximum inline depth of {}",
                callee, limit
            ),
            CodeGenError::Unsupported(s) => write!(f, "unsupported in inline codegen: {}", s),
        }
    }
}

impl std::error::Error for CodeGenError {}

impl From<String> for CodeGenError {
    fn from(s: String) -> Self {
        CodeGenError::Logic(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_errors_are_distinguishable() {
        let internal = CodeGenError::internal("capture list mismatch");
        let logic = CodeGenError::from("unresolved reference: y".to_string());

        assert!(internal.is_internal());
        assert!(!logic.is_internal());
        assert_eq!(
            internal.to_string(),
            "internal compiler error: capture list mismatch"
        );
        assert_eq!(logic.to_string(), "unresolved reference: y");
    }

    #[test]
    fn test_recursion_message_shows_chain() {
        let err = CodeGenError::Recursion {
            callee: "a".to_string(),
            chain: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "inline function 'a' cannot be recursive (inline chain: a -> b -> a)"
        );
    }
}
