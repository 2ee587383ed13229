//! The processor pipeline: transformers, validators, analyzer (§4.3).

pub mod analyzer;
pub mod transformers;
pub mod validators;

use crate::context::ProcessingContext;
use crate::error::Result;

/// A single pure pass over the context (§4.3 "Processor contract").
///
/// Implementors may read/modify the fields listed on `ProcessingContext`,
/// must not perform I/O, and must be deterministic given the same input —
/// the cache's "cache miss may be computed twice concurrently, either result
/// is equivalent" guarantee (§5) depends on that.
pub trait Processor {
    fn name(&self) -> &'static str;
    fn should_run(&self, ctx: &ProcessingContext) -> bool;
    fn process(&self, ctx: &mut ProcessingContext) -> Result<()>;
}

/// The transformer pipeline in its declared order (§4.3.1).
pub fn transformers() -> Vec<Box<dyn Processor>> {
    vec![
        Box::new(transformers::IdentifierSanitizer),
        Box::new(transformers::LiteralParameterizer),
        Box::new(transformers::CommentStripper),
    ]
}

/// The validator pipeline, already in decreasing-severity-family order
/// (§4.3.2): security first since it is the costliest to get wrong, then
/// DML-safety, performance, and finally parameter-style bookkeeping.
pub fn validators() -> Vec<Box<dyn Processor>> {
    vec![
        Box::new(validators::SecurityValidator),
        Box::new(validators::DmlSafetyValidator),
        Box::new(validators::PerformanceValidator),
        Box::new(validators::ParameterStyleValidator),
    ]
}

/// Runs `stage` in order, short-circuiting on the first fatal error (§4.3.4).
/// Validators additionally abort in `strict_mode` once a finding at or above
/// `Severity::High` has been recorded.
pub fn run_stage(stage: &[Box<dyn Processor>], ctx: &mut ProcessingContext) -> Result<()> {
    for processor in stage {
        if !processor.should_run(ctx) {
            continue;
        }
        processor.process(ctx)?;
        if ctx.configuration.strict_mode {
            if let Some(worst) = ctx.worst_finding() {
                if worst >= crate::error::Severity::High {
                    let finding = ctx
                        .validation_findings
                        .iter()
                        .rev()
                        .find(|f| f.severity == worst)
                        .expect("worst_finding implies a matching entry");
                    return Err(crate::error::SqlSpecError::ValidationBlocked {
                        rule: finding.kind.clone(),
                        severity: finding.severity,
                        message: finding.message.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}
