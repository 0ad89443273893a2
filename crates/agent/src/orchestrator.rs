//! Turn orchestrator — the bounded submit → parse → dispatch → observe loop.
//!
//! ```text
//! AWAITING_INPUT → STREAMING → PARSE_FAILED                        → DONE
//!                            → CONTRACT_READY → EXECUTING
//!                                             → (VERIFYING)? → OBSERVED → STREAMING (bounded)
//!                                                                       → DONE
//! ```
//!
//! One turn, one pass, one action in flight at a time. Actions run strictly in
//! contract order; a failing action never blocks the ones after it. Every
//! suspension point (model response, approval prompt, tool, verification)
//! races the [`InterruptHandle`].

use std::sync::Arc;

use actloop_config::{AgentConfig, AppConfig, VerifyMode};
use actloop_contracts::parse_contract;
use actloop_core::message::estimated_tokens;
use actloop_core::{
    Action, AutoConfirm, Completion, Confirm, DispatchOutcome, Message, Provider, ProviderError,
    ProviderRequest, ProviderResponse, RecordKind, SessionLog, SessionRecord, ToolRegistry,
};
use actloop_security::{ApprovalPolicy, AuditLog, TracingSink};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::events::{NullSink, TurnEvent, TurnSink};
use crate::interrupt::InterruptHandle;
use crate::observation::ObservationAccumulator;
use crate::prompt::system_prompt;
use crate::session::SessionContext;
use crate::verify::{VerificationResult, VerificationRunner};

/// Where the orchestrator is within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    AwaitingInput,
    Streaming,
    ParseFailed,
    ContractReady,
    Executing,
    Verifying,
    Observed,
    Done,
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// The model returned a contract with nothing left to do.
    Answered,
    /// No JSON contract; the raw text was shown instead.
    NoContract,
    /// Every pass produced observations and the budget ran out.
    PassLimitReached,
    Interrupted,
    /// The model request failed; the message list is left intact.
    TransportFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    /// Model calls made this turn.
    pub passes: u32,
    /// The last human-facing text: the contract's `message`, or raw text.
    pub reply: Option<String>,
}

/// Passes left in the current turn. Consumed and returned by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassBudget {
    remaining: u32,
}

impl PassBudget {
    pub fn new(max_passes: u32) -> Self {
        Self {
            remaining: max_passes.max(1),
        }
    }

    pub fn remaining(self) -> u32 {
        self.remaining
    }

    /// Spend the pass just run. `None` when no further pass is allowed.
    pub fn spend(self) -> Option<Self> {
        let remaining = self.remaining.saturating_sub(1);
        (remaining > 0).then_some(Self { remaining })
    }
}

enum PassResult {
    Continue,
    Finished(TurnStatus),
}

pub struct TurnOrchestrator {
    provider: Arc<dyn Provider>,
    registry: ToolRegistry,
    policy: ApprovalPolicy,
    confirm: Arc<dyn Confirm>,
    verifier: Option<VerificationRunner>,
    verify_mode: VerifyMode,
    session_log: Arc<dyn SessionLog>,
    sink: Arc<dyn TurnSink>,
    interrupt: InterruptHandle,
    system_prompt: Option<String>,
    model: String,
    temperature: f32,
    stream: bool,
    want_reasoning: bool,
    max_passes: u32,
    observation_body_limit: usize,
    context: SessionContext,
    messages: Vec<Message>,
    state: TurnState,
}

impl TurnOrchestrator {
    /// Create an orchestrator with default agent settings. Unapproved
    /// actions are declined until a [`Confirm`] is supplied.
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: ToolRegistry,
        model: impl Into<String>,
    ) -> Self {
        let defaults = AgentConfig::default();
        Self {
            provider,
            registry,
            policy: ApprovalPolicy::from_config(&defaults),
            confirm: Arc::new(AutoConfirm(false)),
            verifier: None,
            verify_mode: defaults.verify_mode,
            session_log: Arc::new(AuditLog::with_sinks(vec![Box::new(TracingSink)])),
            sink: Arc::new(NullSink),
            interrupt: InterruptHandle::new(),
            system_prompt: None,
            model: model.into(),
            temperature: 0.2,
            stream: false,
            want_reasoning: false,
            max_passes: defaults.max_passes,
            observation_body_limit: defaults.observation_body_limit,
            context: SessionContext::new(),
            messages: Vec::new(),
            state: TurnState::AwaitingInput,
        }
    }

    /// Apply model, sampling, and `[agent]` settings from config.
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.model = config.model.clone();
        self.temperature = config.temperature;
        self.stream = config.stream;
        self.want_reasoning = config.want_reasoning;
        self.policy = ApprovalPolicy::from_config(&config.agent);
        self.verify_mode = config.agent.verify_mode;
        self.max_passes = config.agent.max_passes;
        self.observation_body_limit = config.agent.observation_body_limit;
        self
    }

    pub fn with_policy(mut self, policy: ApprovalPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn with_verifier(mut self, runner: VerificationRunner, mode: VerifyMode) -> Self {
        self.verifier = Some(runner);
        self.verify_mode = mode;
        self
    }

    pub fn with_session_log(mut self, log: Arc<dyn SessionLog>) -> Self {
        self.session_log = log;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn TurnSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_interrupt(mut self, interrupt: InterruptHandle) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn with_max_passes(mut self, max: u32) -> Self {
        self.max_passes = max.max(1);
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// The current turn's messages.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Run one user turn to completion.
    pub async fn run_turn(&mut self, input: &str) -> TurnOutcome {
        self.interrupt.reset();
        self.context.begin_turn();
        let prompt = self.system_prompt.clone().unwrap_or_else(|| {
            system_prompt(&self.registry, self.policy.level(), self.verify_mode)
        });
        self.messages = vec![Message::system(prompt), Message::user(input)];
        self.log(
            RecordKind::UserInput,
            input,
            json!({ "turn": self.context.turns() }),
        );
        info!(
            turn = self.context.turns(),
            max_passes = self.max_passes,
            approval = %self.policy.level(),
            verify = %self.verify_mode,
            "Starting turn"
        );

        let mut budget = PassBudget::new(self.max_passes);
        let mut verified = false;
        let mut passes = 0;
        let mut reply = None;
        let status = loop {
            passes += 1;
            let (result, pass_reply) = self.run_pass(passes, &mut verified).await;
            if pass_reply.is_some() {
                reply = pass_reply;
            }
            match result {
                PassResult::Finished(status) => break status,
                PassResult::Continue => match budget.spend() {
                    Some(next) => budget = next,
                    None => {
                        info!(passes, "Pass limit reached");
                        break TurnStatus::PassLimitReached;
                    }
                },
            }
        };

        self.transition(TurnState::Done);
        self.sink.emit(TurnEvent::TurnEnded { status, passes });
        self.transition(TurnState::AwaitingInput);
        info!(status = ?status, passes, "Turn finished");
        TurnOutcome {
            status,
            passes,
            reply,
        }
    }

    async fn run_pass(&mut self, pass: u32, verified: &mut bool) -> (PassResult, Option<String>) {
        let interrupt = self.interrupt.clone();

        self.transition(TurnState::Streaming);
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: self.messages.clone(),
            temperature: self.temperature,
            max_tokens: None,
            stream: self.stream,
            want_reasoning: self.want_reasoning,
        };
        debug!(pass, messages = request.messages.len(), "Submitting to model");

        let received = tokio::select! {
            result = self.receive(request) => Some(result),
            _ = interrupt.interrupted() => None,
        };
        let response = match received {
            None => return (self.on_interrupt("model response"), None),
            Some(Ok(response)) => response,
            Some(Err(e)) => {
                warn!(pass, error = %e, "Model request failed");
                self.sink.emit(TurnEvent::Error {
                    message: format!("model request failed: {e}"),
                });
                return (PassResult::Finished(TurnStatus::TransportFailed), None);
            }
        };

        let estimate = estimated_tokens(&self.messages) + response.text.len() / 4;
        self.context.record_pass(response.usage, estimate);
        self.log(
            RecordKind::AssistantOutput,
            &response.text,
            json!({ "pass": pass, "reasoning": response.reasoning }),
        );

        let parsed = parse_contract(&response.text);
        if !parsed.is_present() {
            self.transition(TurnState::ParseFailed);
            self.sink.emit(TurnEvent::RawText {
                text: response.text.clone(),
            });
            return (
                PassResult::Finished(TurnStatus::NoContract),
                Some(response.text),
            );
        }

        self.transition(TurnState::ContractReady);
        let contract = parsed.contract;
        if !contract.plan.is_empty() || contract.rationale.is_some() || contract.message.is_some() {
            self.sink.emit(TurnEvent::Plan {
                steps: contract.plan.clone(),
                rationale: contract.rationale.clone(),
                message: contract.message.clone(),
            });
        }
        let reply = contract.message.clone();

        let mut observations = ObservationAccumulator::new(self.observation_body_limit);
        for rejected in parsed.rejected {
            observations.push(rejected);
        }
        if !contract.has_actions() && observations.is_empty() {
            debug!(pass, "Contract has no actions");
            return (PassResult::Finished(TurnStatus::Answered), reply);
        }

        self.transition(TurnState::Executing);
        let mut edited = false;
        for (index, action) in contract.actions.iter().enumerate() {
            let description = action.describe();
            self.sink.emit(TurnEvent::ActionStarted {
                index,
                description: description.clone(),
            });

            let Some(outcome) = self.execute_action(action, &interrupt).await else {
                return (self.on_interrupt("action dispatch"), reply);
            };
            if outcome.is_executed() && action.is_edit() {
                edited = true;
            }

            let (label, summary) = match &outcome {
                DispatchOutcome::Executed(output) => ("executed", output.summary.clone()),
                DispatchOutcome::Skipped(reason) => ("skipped", reason.clone()),
                DispatchOutcome::Failed(error) => ("failed", error.to_string()),
            };
            self.log(
                RecordKind::ToolExecution,
                &description,
                json!({ "pass": pass, "index": index, "outcome": label, "summary": summary }),
            );
            self.sink.emit(TurnEvent::ActionFinished {
                index,
                description,
                outcome: label.into(),
                summary,
            });
            observations.record(action, &outcome);
        }

        if edited && !*verified && self.verify_mode != VerifyMode::None {
            *verified = true;
            self.transition(TurnState::Verifying);
            let mode = self.verify_mode;
            let verification = match &self.verifier {
                Some(runner) => tokio::select! {
                    result = runner.run(mode) => Some(result),
                    _ = interrupt.interrupted() => None,
                },
                None => Some(VerificationResult {
                    ok: true,
                    summary: format!("{mode}: skipped (no verification runner configured)"),
                }),
            };
            let Some(result) = verification else {
                return (self.on_interrupt("verification"), reply);
            };
            info!(ok = result.ok, "Verification finished");
            self.sink.emit(TurnEvent::Verification {
                ok: result.ok,
                summary: result.summary.clone(),
            });
            observations.push(result.to_observation());
        }

        self.transition(TurnState::Observed);
        if observations.is_empty() {
            return (PassResult::Finished(TurnStatus::Answered), reply);
        }

        let block = observations.render();
        self.log(
            RecordKind::Observation,
            &block,
            json!({ "pass": pass, "count": observations.len() }),
        );
        self.messages.push(Message::assistant(response.text));
        self.messages.push(Message::assistant(block));
        self.sink.emit(TurnEvent::PassEnded {
            pass,
            observations: observations.len(),
        });
        (PassResult::Continue, reply)
    }

    /// Submit to the model, forwarding stream deltas to the sink.
    async fn receive(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.provider.complete(request).await? {
            Completion::Full(response) => Ok(response),
            Completion::Stream(mut rx) => {
                let mut response = ProviderResponse::default();
                while let Some(delta) = rx.recv().await {
                    let delta = delta?;
                    if let Some(content) = &delta.content {
                        self.sink.emit(TurnEvent::ContentDelta {
                            content: content.clone(),
                        });
                    }
                    if let Some(reasoning) = &delta.reasoning {
                        self.sink.emit(TurnEvent::ReasoningDelta {
                            content: reasoning.clone(),
                        });
                    }
                    response.absorb(delta);
                }
                Ok(response)
            }
        }
    }

    /// Approve (if needed) and dispatch one action. `None` means interrupted.
    async fn execute_action(
        &self,
        action: &Action,
        interrupt: &InterruptHandle,
    ) -> Option<DispatchOutcome> {
        if self.policy.needs_approval(action) {
            let prompt = self.policy.prompt_for(action);
            let approved = tokio::select! {
                answer = self.confirm.confirm(&prompt, false) => answer,
                _ = interrupt.interrupted() => return None,
            };
            self.sink.emit(TurnEvent::Approval {
                description: action.describe(),
                approved,
            });
            if !approved {
                info!(action = %action.describe(), "Action declined");
                return Some(DispatchOutcome::Skipped(
                    "declined by user; not executed".into(),
                ));
            }
        }

        let result = tokio::select! {
            result = self.registry.dispatch(action) => result,
            _ = interrupt.interrupted() => return None,
        };
        Some(match result {
            Ok(output) => DispatchOutcome::Executed(output),
            Err(e) => {
                warn!(tool = e.tool_name(), kind = e.classification(), "Action failed");
                DispatchOutcome::Failed(e)
            }
        })
    }

    fn on_interrupt(&mut self, stage: &str) -> PassResult {
        warn!(stage, "Turn interrupted");
        self.sink.emit(TurnEvent::Error {
            message: format!("interrupted during {stage}"),
        });
        PassResult::Finished(TurnStatus::Interrupted)
    }

    fn transition(&mut self, next: TurnState) {
        debug!(from = ?self.state, to = ?next, "State transition");
        self.state = next;
    }

    fn log(&self, kind: RecordKind, content: &str, meta: serde_json::Value) {
        self.session_log.record(SessionRecord::new(kind, content, meta));
    }
}
