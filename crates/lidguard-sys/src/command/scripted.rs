//! Scripted command runner for tests.
//!
//! Responses are keyed by program name plus a leading-argument prefix. Each
//! key holds a queue; the last queued response repeats once the queue is
//! down to one entry. Unmatched commands behave like a missing executable.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{CommandError, CommandOutput, CommandRunner, CommandSpec};

type Response = Result<CommandOutput, CommandError>;

struct Rule {
    program: String,
    prefix: Vec<String>,
    responses: VecDeque<Response>,
}

impl Rule {
    fn matches(&self, spec: &CommandSpec) -> bool {
        spec.program == self.program
            && spec.args.len() >= self.prefix.len()
            && spec.args.iter().zip(&self.prefix).all(|(a, p)| a == p)
    }

    fn next(&mut self) -> Option<Response> {
        if self.responses.len() > 1 {
            self.responses.pop_front()
        } else {
            self.responses.front().cloned()
        }
    }
}

/// A [`CommandRunner`] that replays canned output and records every call.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `program` called with args starting with `prefix`.
    ///
    /// Rules are matched in the order they were first added, so register
    /// longer prefixes before shorter ones for the same program.
    pub fn on(&self, program: &str, prefix: &[&str], response: Response) -> &Self {
        let prefix: Vec<String> = prefix.iter().map(|s| (*s).to_string()).collect();
        let mut rules = lock(&self.rules);
        if let Some(rule) = rules
            .iter_mut()
            .find(|r| r.program == program && r.prefix == prefix)
        {
            rule.responses.push_back(response);
        } else {
            rules.push(Rule {
                program: program.to_string(),
                prefix,
                responses: VecDeque::from([response]),
            });
        }
        self
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        lock(&self.calls).clone()
    }

    /// Command lines (program + args) run so far.
    pub fn command_lines(&self) -> Vec<String> {
        lock(&self.calls).iter().map(ToString::to_string).collect()
    }

    /// Number of calls to `program`.
    pub fn count(&self, program: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.program == program)
            .count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        lock(&self.calls).push(spec.clone());
        let mut rules = lock(&self.rules);
        rules
            .iter_mut()
            .find(|r| r.matches(spec))
            .and_then(Rule::next)
            .unwrap_or_else(|| {
                Err(CommandError::NotFound {
                    program: spec.program.clone(),
                })
            })
    }
}
