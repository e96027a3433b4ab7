//! Inline Expansion Code Generator
//!
//! Expands calls of inline functions into the calling method of a
//! stack-based bytecode backend. Arguments are evaluated once into fresh
//! locals, lambda literals passed to inline parameters are expanded at their
//! invocation sites instead of becoming closure objects, and a reentrancy
//! stack keeps recursive inlining from running away.
//!
//! # Embedding the Inliner
//!
//! A backend supplies an [`ExpressionEvaluator`], a [`BodySplicer`] and a
//! [`TypeMapper`], then drives [`InlineContext::inline_call`]:
//!
//! ```rust,ignore
//! use inlinegen::{DefaultTypeMapper, InlineConfig, InlineContext, MethodFrame};
//!
//! let frame = MethodFrame::new(0);
//! let mut cx = InlineContext::new(&module, &DefaultTypeMapper, InlineConfig::new(), frame);
//! cx.inline_call(&call, &mut evaluator, &mut splicer)?;
//! ```

pub mod asm;
pub mod capture_analysis;
pub mod codegen;
pub mod config;
pub mod fixture;
pub mod ir;
pub mod reference;
pub mod type_mapper;
pub mod types;

pub use asm::{AsmType, MethodSignature};
pub use codegen::{
    BodySplicer, CodeGenError, ExpandedLambda, ExpressionEvaluator, InlineContext, LocalBinding,
    MethodFrame, StackValue,
};
pub use config::InlineConfig;
pub use fixture::Fixture;
pub use ir::{CallSite, Expr, FunctionDecl, Module};
pub use reference::{ReferenceEvaluator, ReferenceSplicer, SpliceRecord};
pub use type_mapper::{DefaultTypeMapper, TypeMapper};
pub use types::Type;

use std::fmt;
use std::path::Path;

/// Outcome of expanding one fixture call
#[derive(Debug, Clone)]
pub struct Expansion {
    /// Parameter tables of every spliced callee, outermost call first
    pub records: Vec<SpliceRecord>,
    /// Number of lambda invocations expanded in place
    pub lambda_expansions: usize,
    pub frame: MethodFrame,
    pub result: StackValue,
}

/// Binding tables followed by the instruction listing
impl fmt::Display for Expansion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            writeln!(f, "inline {}", record.callee)?;
            for (name, binding) in &record.parameters {
                writeln!(f, "  {}: {}", name, binding)?;
            }
        }
        writeln!(f, "code:")?;
        write!(f, "{}", self.frame.listing())?;
        writeln!(f, "result: {}", self.result.ty())?;
        writeln!(
            f,
            "max_stack: {}, max_locals: {}",
            self.frame.max_stack(),
            self.frame.max_locals()
        )
    }
}

/// Expand the call of a fixture file
pub fn expand_fixture_file(path: &Path, config: &InlineConfig) -> Result<Expansion, String> {
    let fixture = Fixture::load(path)?;
    expand_fixture(fixture, config)
}

/// Expand the call of a parsed fixture with the reference backend
pub fn expand_fixture(fixture: Fixture, config: &InlineConfig) -> Result<Expansion, String> {
    let (module, locals, call) = fixture.into_parts();
    let mapper = DefaultTypeMapper;
    let target = module
        .find_function(&call.callee)
        .map(|f| mapper.map_return_type(&f.return_type.substitute(&call.type_arguments)))
        .unwrap_or(AsmType::Void);
    let root = Expr::Call(call);

    let mut slots = 0;
    let locals: Vec<_> = locals
        .into_iter()
        .map(|local| {
            let ty = mapper.map_type(&local.ty);
            let slot = slots;
            slots += ty.size().max(1);
            (local.name, StackValue::Local { slot, ty })
        })
        .collect();

    let mut cx = InlineContext::new(&module, &mapper, config.clone(), MethodFrame::new(slots));
    for (name, value) in locals {
        cx.declare_local(name, LocalBinding::Value(value));
    }

    let mut evaluator = ReferenceEvaluator;
    let mut splicer = ReferenceSplicer::new();
    let result = evaluator
        .evaluate(&root, &target, &mut cx, &mut splicer)
        .map_err(|e| e.to_string())?;

    Ok(Expansion {
        records: splicer.records().to_vec(),
        lambda_expansions: splicer.lambda_expansions(),
        frame: cx.into_frame(),
        result,
    })
}

/// Expand a fixture given as TOML source and render the result (for testing)
pub fn expand_to_listing(source: &str) -> Result<String, String> {
    let fixture = Fixture::from_toml(source)?;
    expand_fixture(fixture, &InlineConfig::default()).map(|e| e.to_string())
}
