use std::future::Future;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::{
    agents::{
        AgentContext, AgentError, analyst, planner, reflector, synthesizer,
        types::{ReflectionOutcome, SynthesisOutcome},
    },
    orchestrator::{
        OrchestratorError,
        state::{IterationSnapshot, LoopPolicy, Phase},
    },
    session::SessionRecorder,
    store::{Session, StoreError},
};

/// What a successful run leaves behind.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub iterations: u32,
    pub synthesis: SynthesisOutcome,
    pub reflection: ReflectionOutcome,
}

/// Drives one recommendation session through
/// plan → evidence → readiness → synthesize → reflect → termination.
///
/// Built fresh per session; the session id travels with the recorder and is
/// never stored on shared state.
pub struct IterationController {
    agents: AgentContext,
    recorder: SessionRecorder,
    policy: LoopPolicy,
    cancel: CancellationToken,
    subject_id: String,
    goal: String,
}

impl IterationController {
    pub fn new(
        agents: AgentContext,
        recorder: SessionRecorder,
        policy: LoopPolicy,
        cancel: CancellationToken,
        session: &Session,
    ) -> Self {
        Self {
            agents,
            recorder,
            policy,
            cancel,
            subject_id: session.subject_id.clone(),
            goal: session.goal_description.clone(),
        }
    }

    /// Runs the loop and records the terminal state on the session. A session
    /// handed to `drive` never stays in progress unless the store itself fails.
    pub async fn drive(self) -> Result<Session, StoreError> {
        match self.run().await {
            Ok(outcome) => {
                self.recorder
                    .set_context(json!({
                        "iterations": outcome.iterations,
                        "recommendation_id": outcome.synthesis.record.id,
                        "recommendation": outcome.synthesis.output,
                        "reflection": outcome.reflection.output,
                    }))
                    .await?;
                self.recorder
                    .complete(
                        outcome.reflection.output.confidence,
                        outcome.synthesis.output.action.clone(),
                    )
                    .await
            }
            Err(err) => {
                tracing::warn!(
                    target: "orchestrator",
                    session_id = self.recorder.session_id(),
                    error = %err,
                    "recommendation_loop_failed"
                );
                self.recorder.fail(err.to_string()).await
            }
        }
    }

    pub async fn run(&self) -> Result<LoopOutcome, OrchestratorError> {
        let mut snapshot = IterationSnapshot::first();

        while snapshot.iteration() <= self.policy.max_iterations {
            let iteration = snapshot.iteration();
            tracing::debug!(
                target: "orchestrator",
                session_id = self.recorder.session_id(),
                iteration = iteration,
                has_prior_critique = snapshot.prior_critique().is_some(),
                "iteration_started"
            );

            let plan = self
                .phase(
                    Phase::Planning,
                    iteration,
                    planner::plan(
                        &self.agents,
                        &self.recorder,
                        &self.subject_id,
                        &self.goal,
                        &snapshot,
                    ),
                )
                .await?;
            let evidence = self
                .phase(
                    Phase::EvidenceGathering,
                    iteration,
                    analyst::analyze(&self.agents, &self.recorder, &plan, iteration),
                )
                .await?;

            self.checkpoint(Phase::ReadinessCheck, iteration).await?;
            if !self.policy.is_ready(iteration, &evidence.output) {
                tracing::debug!(
                    target: "orchestrator",
                    session_id = self.recorder.session_id(),
                    iteration = iteration,
                    findings = evidence.output.key_findings.len(),
                    hypotheses = evidence.output.hypotheses.len(),
                    "readiness_not_met"
                );
                snapshot = snapshot.advance(plan.output, evidence.output, None);
                continue;
            }

            let synthesis = self
                .phase(
                    Phase::Synthesizing,
                    iteration,
                    synthesizer::synthesize(
                        &self.agents,
                        &self.recorder,
                        &plan,
                        &evidence,
                        iteration,
                    ),
                )
                .await?;
            let reflection = self
                .phase(
                    Phase::Reflecting,
                    iteration,
                    reflector::reflect(
                        &self.agents,
                        &self.recorder,
                        &plan,
                        &evidence,
                        &synthesis,
                        iteration,
                    ),
                )
                .await?;

            self.checkpoint(Phase::TerminationCheck, iteration).await?;
            if self
                .policy
                .should_terminate(iteration, reflection.output.confidence)
            {
                tracing::info!(
                    target: "orchestrator",
                    session_id = self.recorder.session_id(),
                    iteration = iteration,
                    confidence = reflection.output.confidence,
                    "recommendation_loop_terminated"
                );
                return Ok(LoopOutcome {
                    iterations: iteration,
                    synthesis,
                    reflection,
                });
            }

            snapshot = snapshot.advance(plan.output, evidence.output, Some(reflection.feedback));
        }

        Err(OrchestratorError::IterationBoundExceeded {
            max_iterations: self.policy.max_iterations,
        })
    }

    /// Stops scheduling once cancelled, then labels the session with `phase`.
    async fn checkpoint(&self, phase: Phase, iteration: u32) -> Result<(), OrchestratorError> {
        if self.cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }
        self.recorder
            .enter_phase(phase.label(), Some(iteration))
            .await?;
        Ok(())
    }

    /// In-flight model calls are never aborted by cancellation; only the
    /// optional wall-clock bound cuts a phase short.
    async fn phase<T, F>(
        &self,
        phase: Phase,
        iteration: u32,
        work: F,
    ) -> Result<T, OrchestratorError>
    where
        F: Future<Output = Result<T, AgentError>>,
    {
        self.checkpoint(phase, iteration).await?;
        let outcome = match self.policy.phase_timeout {
            Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
                OrchestratorError::PhaseTimeout {
                    phase: phase.label(),
                    timeout_ms: limit.as_millis() as u64,
                }
            })?,
            None => work.await,
        };
        Ok(outcome?)
    }
}
