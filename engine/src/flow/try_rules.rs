//! `tryRules`: ordered fallback between alternative command chains.
//!
//! ```text
//! record ─▶ rule 0 ──Matched──▶ done (true)
//!              │ NoMatch
//!              ▼
//!           rule 1 ──Matched──▶ done (true)
//!              │ NoMatch
//!              ▼
//!             ...  ──all NoMatch──▶ fault, or false
//! ```
//!
//! Every attempt gets its own copy of the incoming record. Records a failed
//! rule already emitted downstream are not taken back.

use crate::command::{notify_chain, run_chain, Command, Downstream, Notification};
use crate::compiler::Compiler;
use crate::config::ConfigNode;
use crate::error::{CompileError, CompileResult, RuntimeError, RuntimeResult};
use crate::metrics::CommandMeter;
use crate::record::Record;
use crate::registry::{BuildScope, CommandBuilder};

const NAME: &str = "tryRules";

/// Message prefix of the fault raised when every rule failed.
pub const NO_RULE_MATCHED: &str = "tryRules command found no successful rule for record";

/// Why a rule did not match.
#[derive(Debug, Clone, PartialEq)]
pub enum NoMatchReason {
    /// The rule's chain returned `false`.
    Rejected,
    /// The rule's chain raised a fault that was caught.
    Fault(RuntimeError),
}

/// Result of one rule attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    Matched,
    NoMatch(NoMatchReason),
}

pub struct TryRules {
    rules: Vec<Vec<Box<dyn Command>>>,
    catch_exceptions: bool,
    throw_if_all_failed: bool,
    meter: CommandMeter,
}

impl TryRules {
    fn attempt(
        rule: &mut [Box<dyn Command>],
        record: Record,
        child: &mut dyn Downstream,
        catch_exceptions: bool,
    ) -> RuntimeResult<RuleOutcome> {
        match run_chain(rule, record, child) {
            Ok(true) => Ok(RuleOutcome::Matched),
            Ok(false) => Ok(RuleOutcome::NoMatch(NoMatchReason::Rejected)),
            Err(err) if catch_exceptions => Ok(RuleOutcome::NoMatch(NoMatchReason::Fault(err))),
            Err(err) => Err(err),
        }
    }
}

impl Command for TryRules {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&mut self, record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();

        for (index, rule) in self.rules.iter_mut().enumerate() {
            match Self::attempt(rule, record.copy(), child, self.catch_exceptions)? {
                RuleOutcome::Matched => return Ok(true),
                RuleOutcome::NoMatch(NoMatchReason::Rejected) => {
                    tracing::debug!(rule = index, "tryRules rule rejected record");
                }
                RuleOutcome::NoMatch(NoMatchReason::Fault(err)) => {
                    tracing::debug!(rule = index, command = %err.command, error = %err, "tryRules rule failed");
                }
            }
        }

        if self.throw_if_all_failed {
            Err(RuntimeError::new(
                NAME,
                format!("{}: {}", NO_RULE_MATCHED, record.to_json()),
            ))
        } else {
            Ok(false)
        }
    }

    fn notify(&mut self, notification: Notification) -> RuntimeResult<()> {
        for rule in self.rules.iter_mut() {
            notify_chain(rule, notification)?;
        }
        Ok(())
    }
}

pub struct TryRulesBuilder;

impl CommandBuilder for TryRulesBuilder {
    fn names(&self) -> &'static [&'static str] {
        &[NAME]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["rules", "catchExceptions", "throwExceptionIfAllRulesFailed"])?;

        let rule_nodes = config.get_list("rules")?;
        if rule_nodes.is_empty() {
            return Err(CompileError::invalid(NAME, "rules must not be empty"));
        }

        let mut rules = Vec::with_capacity(rule_nodes.len());
        for node in &rule_nodes {
            node.validate_keys(&["commands"])?;
            rules.push(compiler.build_list(node, "commands", scope)?);
        }

        Ok(Box::new(TryRules {
            rules,
            catch_exceptions: config.get_bool_or("catchExceptions", true)?,
            throw_if_all_failed: config.get_bool_or("throwExceptionIfAllRulesFailed", true)?,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}
