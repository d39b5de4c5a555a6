use crate::{
    error::{CompileError, ErrorOrigin},
    sql::SqlBuffer,
};
use std::{fmt, sync::Arc};

///
/// CallRewriter
///
/// Dialect hook for a custom method call. Receives the call's operands
/// (receiver first) already compiled in value context.
///

pub trait CallRewriter: fmt::Debug + Send + Sync {
    /// Custom method name this rewriter answers for.
    fn method(&self) -> &str;

    fn rewrite(&self, out: &mut SqlBuffer, operands: Vec<SqlBuffer>) -> Result<(), CompileError>;
}

///
/// TemplateRewriter
///
/// Substitutes operands into a template: `{0}` is the first operand.
/// An operand may appear more than once.
///

#[derive(Clone, Copy, Debug)]
pub struct TemplateRewriter {
    pub method: &'static str,
    pub template: &'static str,
}

impl TemplateRewriter {
    #[must_use]
    pub const fn new(method: &'static str, template: &'static str) -> Self {
        Self { method, template }
    }
}

impl CallRewriter for TemplateRewriter {
    fn method(&self) -> &str {
        self.method
    }

    fn rewrite(&self, out: &mut SqlBuffer, operands: Vec<SqlBuffer>) -> Result<(), CompileError> {
        let mut rest = self.template;

        while let Some(open) = rest.find('{') {
            out.write(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| self.malformed())?;
            let index: usize = after[..close].parse().map_err(|_| self.malformed())?;
            let operand = operands.get(index).ok_or_else(|| {
                CompileError::syntax(
                    ErrorOrigin::Dialect,
                    format!(
                        "'{}' template references operand {index} but the call has {}",
                        self.method,
                        operands.len()
                    ),
                )
            })?;
            out.append_ref(operand);
            rest = &after[close + 1..];
        }
        out.write(rest);

        Ok(())
    }
}

impl TemplateRewriter {
    fn malformed(&self) -> CompileError {
        CompileError::syntax(
            ErrorOrigin::Dialect,
            format!("malformed template for '{}': {}", self.method, self.template),
        )
    }
}

///
/// Rewriters
/// Registered rewriters of one dialect; later registrations win.
///

#[derive(Clone, Debug, Default)]
pub struct Rewriters(Vec<Arc<dyn CallRewriter>>);

impl Rewriters {
    #[must_use]
    pub fn from_templates(templates: &[TemplateRewriter]) -> Self {
        Self(
            templates
                .iter()
                .map(|template| Arc::new(*template) as Arc<dyn CallRewriter>)
                .collect(),
        )
    }

    pub fn push(&mut self, rewriter: Arc<dyn CallRewriter>) {
        self.0.push(rewriter);
    }

    #[must_use]
    pub fn find(&self, method: &str) -> Option<&dyn CallRewriter> {
        self.0
            .iter()
            .rev()
            .find(|rewriter| rewriter.method() == method)
            .map(|rewriter| &**rewriter)
    }
}
