//! Test-only reasoners with scripted replies.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::Notify;

use crate::io::reasoner::{ReasonRequest, Reasoner, Reasoning};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    Reply { output: String, is_last: bool },
    Fail(String),
}

/// Scripted reply that keeps the task open.
pub fn progress(output: &str) -> ScriptedStep {
    ScriptedStep::Reply {
        output: output.to_string(),
        is_last: false,
    }
}

/// Scripted reply that finishes the task.
pub fn finish(output: &str) -> ScriptedStep {
    ScriptedStep::Reply {
        output: output.to_string(),
        is_last: true,
    }
}

pub fn fail(message: &str) -> ScriptedStep {
    ScriptedStep::Fail(message.to_string())
}

/// Reasoner that replays queued replies and records every call.
///
/// Replies are looked up by task input first, then from the shared queue,
/// then from the repeating fallback. Running out of all three is an error.
#[derive(Default)]
pub struct ScriptedReasoner {
    shared: Mutex<VecDeque<ScriptedStep>>,
    by_input: Mutex<HashMap<String, VecDeque<ScriptedStep>>>,
    fallback: Option<ScriptedStep>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl ScriptedReasoner {
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            shared: Mutex::new(steps.into()),
            ..Self::default()
        }
    }

    /// Reply with `step` whenever no scripted reply is left.
    pub fn repeating(step: ScriptedStep) -> Self {
        Self {
            fallback: Some(step),
            ..Self::default()
        }
    }

    /// Script replies for the task created with `input`.
    pub fn with_task(self, input: &str, steps: Vec<ScriptedStep>) -> Self {
        self.by_input
            .lock()
            .expect("script lock")
            .insert(input.to_string(), steps.into());
        self
    }

    /// `(task input, step index)` for every call, in call order.
    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn calls_for(&self, input: &str) -> usize {
        self.calls()
            .iter()
            .filter(|(called, _)| called == input)
            .count()
    }

    fn next_step(&self, input: &str) -> Option<ScriptedStep> {
        if let Some(queue) = self.by_input.lock().expect("script lock").get_mut(input)
            && let Some(step) = queue.pop_front()
        {
            return Some(step);
        }
        self.shared
            .lock()
            .expect("script lock")
            .pop_front()
            .or_else(|| self.fallback.clone())
    }
}

/// Reasoner that blocks every call until the test opens the gate, then
/// answers from an inner [`ScriptedReasoner`].
pub struct GatedReasoner {
    inner: ScriptedReasoner,
    started: Notify,
    release: Notify,
}

impl GatedReasoner {
    pub fn new(inner: ScriptedReasoner) -> Self {
        Self {
            inner,
            started: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Wait until a call has entered the reasoner.
    pub async fn entered(&self) {
        self.started.notified().await;
    }

    /// Let one waiting (or the next) call finish.
    pub fn open(&self) {
        self.release.notify_one();
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.inner.calls()
    }
}

#[async_trait]
impl Reasoner for GatedReasoner {
    async fn reason(&self, request: &ReasonRequest) -> Result<Reasoning> {
        self.started.notify_one();
        self.release.notified().await;
        self.inner.reason(request).await
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn reason(&self, request: &ReasonRequest) -> Result<Reasoning> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((request.task.input.clone(), request.step.index));
        match self.next_step(&request.task.input) {
            Some(ScriptedStep::Reply { output, is_last }) => Ok(Reasoning { output, is_last }),
            Some(ScriptedStep::Fail(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("script exhausted for task {:?}", request.task.input)),
        }
    }
}
