//! Inline Context and Core Types
//!
//! This module contains the InlineContext struct: the per-method state an
//! inlining session threads through every expansion, nested or not.

use super::CodeGenError;
use super::frame::MethodFrame;
use super::lambda::ExpandedLambda;
use super::reentrancy::ReentrancyContext;
use crate::config::InlineConfig;
use crate::ir::Module;
use crate::type_mapper::TypeMapper;
use crate::types::Type;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use tracing::debug;

/// What a name refers to inside the code being generated
#[derive(Debug, Clone)]
pub enum LocalBinding<'m> {
    /// A value in a local slot (or a deferred void value)
    Value(super::frame::StackValue),
    /// An inline lambda parameter, expanded wherever it is invoked
    InlineLambda(ExpandedLambda<'m>),
}

/// Names visible to one function body
pub type Scope<'m> = HashMap<String, LocalBinding<'m>>;

pub struct InlineContext<'m> {
    pub(super) module: &'m Module,
    pub(super) mapper: &'m dyn TypeMapper,
    pub(super) config: InlineConfig,
    pub(super) frame: MethodFrame,
    pub(super) reentrancy: ReentrancyContext,
    /// One scope per body being generated; only the innermost is visible
    pub(super) scopes: Vec<Scope<'m>>,
}

impl<'m> InlineContext<'m> {
    pub fn new(
        module: &'m Module,
        mapper: &'m dyn TypeMapper,
        config: InlineConfig,
        frame: MethodFrame,
    ) -> Self {
        InlineContext {
            module,
            mapper,
            config,
            frame,
            reentrancy: ReentrancyContext::new(),
            scopes: vec![Scope::new()],
        }
    }

    pub fn module(&self) -> &'m Module {
        self.module
    }

    pub fn mapper(&self) -> &'m dyn TypeMapper {
        self.mapper
    }

    pub fn config(&self) -> &InlineConfig {
        &self.config
    }

    pub fn frame(&self) -> &MethodFrame {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut MethodFrame {
        &mut self.frame
    }

    pub fn reentrancy(&self) -> &ReentrancyContext {
        &self.reentrancy
    }

    pub fn into_frame(self) -> MethodFrame {
        self.frame
    }

    /// Declare a name in the innermost scope (e.g. the caller's own locals)
    pub fn declare_local(&mut self, name: impl Into<String>, binding: LocalBinding<'m>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), binding);
        }
    }

    /// Resolve a name in the innermost scope
    pub fn lookup_local(&self, name: &str) -> Option<&LocalBinding<'m>> {
        self.scopes.last().and_then(|scope| scope.get(name))
    }

    /// Run `f` with `scope` as the innermost scope, popping it afterwards
    /// whether `f` succeeds or not
    pub fn with_scope<T>(
        &mut self,
        scope: Scope<'m>,
        f: impl FnOnce(&mut Self) -> Result<T, CodeGenError>,
    ) -> Result<T, CodeGenError> {
        self.scopes.push(scope);
        let result = f(self);
        self.scopes.pop();
        result
    }

    /// Substitute the type parameters of the innermost effective callee
    pub fn substitute(&self, ty: &Type) -> Type {
        match self.reentrancy.current_type_arguments() {
            Some(args) => ty.substitute(args),
            None => ty.clone(),
        }
    }
}

/// An entered inline scope.
///
/// Holds the reentrancy marker for one expansion and releases it, together
/// with every temp local allocated inside, when dropped. Early returns and
/// errors therefore always leave through the exit path.
pub struct InliningScope<'c, 'm> {
    cx: &'c mut InlineContext<'m>,
    name: String,
    local_mark: usize,
}

impl<'c, 'm> InliningScope<'c, 'm> {
    /// Enter an inline function expansion
    pub fn enter_callee(cx: &'c mut InlineContext<'m>, callee: &str) -> Result<Self, CodeGenError> {
        cx.reentrancy.enter(callee, &cx.config)?;
        debug!(callee, depth = cx.reentrancy.depth(), "entered inline scope");
        Ok(Self::new(cx, callee))
    }

    /// Enter an in-place lambda body expansion owned by the callee marker
    /// at `owner`
    pub fn enter_lambda(
        cx: &'c mut InlineContext<'m>,
        name: &str,
        owner: usize,
    ) -> Result<Self, CodeGenError> {
        cx.reentrancy.enter_lambda(name, owner, &cx.config)?;
        debug!(lambda = name, depth = cx.reentrancy.depth(), "entered lambda scope");
        Ok(Self::new(cx, name))
    }

    fn new(cx: &'c mut InlineContext<'m>, name: &str) -> Self {
        let local_mark = cx.frame.local_mark();
        InliningScope {
            cx,
            name: name.to_string(),
            local_mark,
        }
    }
}

impl<'m> Deref for InliningScope<'_, 'm> {
    type Target = InlineContext<'m>;

    fn deref(&self) -> &Self::Target {
        self.cx
    }
}

impl DerefMut for InliningScope<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.cx
    }
}

impl Drop for InliningScope<'_, '_> {
    fn drop(&mut self) {
        self.cx.frame.release_locals(self.local_mark);
        self.cx.reentrancy.exit(&self.name);
        debug!(
            name = %self.name,
            depth = self.cx.reentrancy.depth(),
            "exited inline scope"
        );
    }
}
