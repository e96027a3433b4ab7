//! Reentrancy Tracking
//!
//! A strict LIFO stack of "currently inlining" markers. Each inline call
//! expansion pushes a callee marker; each in-place lambda body expansion
//! pushes a lambda marker pointing back at the callee marker that owns the
//! lambda.
//!
//! Arguments and lambda bodies are caller code. A callee marker only joins
//! the effective chain once its body is being spliced, and calls made from a
//! lambda body are checked against the chain of the lambda's *caller*. So
//! `f(f(1))` and `apply { apply { ... } }` are fine while an inline function
//! calling itself is not.

use super::CodeGenError;
use crate::config::InlineConfig;
use crate::types::TypeArguments;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerKind {
    /// Expansion of an inline function; `in_body` once its arguments are
    /// materialized and the body is being spliced
    Callee { in_body: bool },
    /// Expansion of a lambda body owned by the callee marker at this index
    Lambda { owner: usize },
}

#[derive(Debug, Clone)]
pub struct InlineMarker {
    pub name: String,
    pub kind: MarkerKind,
    /// Resolved type arguments of a callee marker
    pub type_arguments: TypeArguments,
}

#[derive(Debug, Default)]
pub struct ReentrancyContext {
    markers: Vec<InlineMarker>,
    entered: usize,
    exited: usize,
}

impl ReentrancyContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a callee marker.
    ///
    /// Fails (pushing nothing) when the callee is already on the effective
    /// chain and recursion is off, or when the depth limit is reached.
    pub fn enter(&mut self, callee: &str, config: &InlineConfig) -> Result<(), CodeGenError> {
        if self.markers.len() >= config.max_inline_depth {
            return Err(CodeGenError::DepthExceeded {
                callee: callee.to_string(),
                limit: config.max_inline_depth,
            });
        }
        if !config.allow_recursive_inline {
            let chain = self.effective_chain();
            if chain.contains(&callee) {
                return Err(CodeGenError::Recursion {
                    callee: callee.to_string(),
                    chain: chain.into_iter().map(str::to_string).collect(),
                });
            }
        }
        self.push(InlineMarker {
            name: callee.to_string(),
            kind: MarkerKind::Callee { in_body: false },
            type_arguments: TypeArguments::new(),
        });
        Ok(())
    }

    /// Push a lambda marker for the lambda bound to a callee marker.
    pub fn enter_lambda(
        &mut self,
        name: &str,
        owner: usize,
        config: &InlineConfig,
    ) -> Result<(), CodeGenError> {
        let owned = self
            .markers
            .get(owner)
            .is_some_and(|m| matches!(m.kind, MarkerKind::Callee { .. }));
        if !owned {
            return Err(CodeGenError::internal(format!(
                "lambda '{}' expanded outside the inline call that owns it",
                name
            )));
        }
        if self.markers.len() >= config.max_inline_depth {
            return Err(CodeGenError::DepthExceeded {
                callee: name.to_string(),
                limit: config.max_inline_depth,
            });
        }
        self.push(InlineMarker {
            name: name.to_string(),
            kind: MarkerKind::Lambda { owner },
            type_arguments: TypeArguments::new(),
        });
        Ok(())
    }

    fn push(&mut self, marker: InlineMarker) {
        self.entered += 1;
        self.markers.push(marker);
    }

    /// Pop the innermost marker, which must be `name`.
    pub fn exit(&mut self, name: &str) {
        let popped = self.markers.pop();
        debug_assert!(
            popped.as_ref().is_some_and(|m| m.name == name),
            "unbalanced inline scope exit: expected '{}', found {:?}",
            name,
            popped.map(|m| m.name)
        );
        self.exited += 1;
    }

    /// Move the innermost callee marker from argument materialization into
    /// its body
    pub fn begin_body(&mut self) {
        if let Some(top) = self.markers.last_mut() {
            if let MarkerKind::Callee { in_body } = &mut top.kind {
                *in_body = true;
            }
        }
    }

    /// Record the resolved type arguments on the innermost marker
    pub fn set_type_arguments(&mut self, args: TypeArguments) {
        if let Some(top) = self.markers.last_mut() {
            top.type_arguments = args;
        }
    }

    /// Indices of the callee markers whose code is currently executing,
    /// innermost first
    fn effective_indices(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        let mut cursor = self.markers.len();
        while cursor > 0 {
            let index = cursor - 1;
            match self.markers[index].kind {
                MarkerKind::Callee { in_body } => {
                    if in_body {
                        indices.push(index);
                    }
                    cursor = index;
                }
                // Skip the owning callee: the lambda body runs in its caller
                MarkerKind::Lambda { owner } => cursor = owner,
            }
        }
        indices
    }

    /// Callees on the effective chain, outermost first
    pub fn effective_chain(&self) -> Vec<&str> {
        let mut chain: Vec<&str> = self
            .effective_indices()
            .into_iter()
            .map(|i| self.markers[i].name.as_str())
            .collect();
        chain.reverse();
        chain
    }

    /// Type arguments of the innermost effective callee
    pub fn current_type_arguments(&self) -> Option<&TypeArguments> {
        self.effective_indices()
            .first()
            .map(|&i| &self.markers[i].type_arguments)
    }

    pub fn depth(&self) -> usize {
        self.markers.len()
    }

    /// Index of the innermost marker
    pub fn top_index(&self) -> Option<usize> {
        self.markers.len().checked_sub(1)
    }

    pub fn is_idle(&self) -> bool {
        self.markers.is_empty()
    }

    /// Total markers pushed so far
    pub fn entered(&self) -> usize {
        self.entered
    }

    /// Total markers popped so far
    pub fn exited(&self) -> usize {
        self.exited
    }
}
