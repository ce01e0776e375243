//! Session controller: the loading → armed → answering → submitted lifecycle.
//!
//! All application logic runs on one cooperative event loop
//! ([`SessionController::run`]). The loop `select!`s over clock ticks, the
//! warm-up deadline, finished background code runs, and user/proctor
//! commands, and applies each event completely before taking the next one.
//! The methods it dispatches to are public so the state machine can also be
//! driven step by step.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{sleep_until, Instant};
use uuid::Uuid;

use crate::answers::AnswerStore;
use crate::clock::{Clock, ClockEvent, TICK_PERIOD};
use crate::error::{ExecutionError, SessionError};
use crate::model::{
    Answer, CodeLanguage, Question, QuestionId, QuestionKind, Section, StudentDetails, Test,
};
use crate::router::{BackOutcome, View, ViewRouter};
use crate::scoring::ScoringEngine;
use crate::sections::SectionNavigator;
use crate::submission::{SubmissionPipeline, SubmissionReceipt, SubmissionState, SubmitAttempt};
use crate::traits::{AnswerEvaluator, CodeExecutor, ResultStore, TestSource};

/// Top-level state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Armed,
    Answering,
    Submitting,
    Submitted,
    /// Persistence failed; resubmission is possible.
    SubmissionFailed,
    Disqualified,
    /// The test could not be loaded.
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Submitted | Phase::Disqualified | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Loading => "loading",
            Phase::Armed => "armed",
            Phase::Answering => "answering",
            Phase::Submitting => "submitting",
            Phase::Submitted => "submitted",
            Phase::SubmissionFailed => "submission failed",
            Phase::Disqualified => "disqualified",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How the countdown gets released once the test is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessPolicy {
    /// Wait for the proctoring collaborator's ready signal.
    Signal,
    /// Start after a fixed warm-up delay; ready signals are ignored.
    Warmup(Duration),
}

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub readiness: ReadinessPolicy,
    /// Clock cadence.
    pub tick_period: Duration,
    /// Language assumed for code answers that do not name one.
    pub default_language: CodeLanguage,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            readiness: ReadinessPolicy::Signal,
            tick_period: TICK_PERIOD,
            default_language: CodeLanguage::JavaScript,
        }
    }
}

/// External collaborators of a session.
#[derive(Clone)]
pub struct SessionServices {
    pub tests: Arc<dyn TestSource>,
    pub evaluator: Arc<dyn AnswerEvaluator>,
    pub executor: Arc<dyn CodeExecutor>,
    pub results: Arc<dyn ResultStore>,
}

/// Events fed into the session loop.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Proctoring warm-up finished.
    Ready,
    /// Proctoring asks to end the session without scoring.
    Disqualify(String),
    SetAnswer { question: QuestionId, answer: Answer },
    AdvanceSection,
    RunCode(QuestionId),
    /// Explicit submission, or resubmission after a persistence failure.
    Submit,
    /// Back-navigation event from the view layer.
    Back,
}

/// Result of a code run requested from the UI. Display-only, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub question: QuestionId,
    pub result: Result<String, ExecutionError>,
}

impl ExecutionReport {
    /// Text shown under the editor.
    pub fn display_text(&self) -> String {
        match &self.result {
            Ok(output) if output.is_empty() => "No output generated".to_string(),
            Ok(output) => output.clone(),
            Err(ExecutionError::Rejected { message }) if message.is_empty() => {
                "Error executing code".to_string()
            }
            Err(e) => e.to_string(),
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    Submitted(Arc<SubmissionReceipt>),
    Disqualified { reason: String },
    /// The command stream closed before the session reached a terminal view.
    Abandoned { phase: Phase },
}

/// Receives session notifications (rendering, logging, tests).
pub trait SessionObserver: Send + Sync {
    fn on_phase_change(&self, from: Phase, to: Phase);
    fn on_loaded(&self, test: &Test);
    fn on_section(&self, section: Section, questions: &[&Question]);
    fn on_tick(&self, remaining_secs: u64);
    fn on_execution(&self, report: &ExecutionReport);
    fn on_submitted(&self, receipt: &SubmissionReceipt);
    fn on_submission_failed(&self, error: &SessionError);
    fn on_disqualified(&self, reason: &str);
    fn on_rejected(&self, error: &SessionError);
    fn on_back(&self, outcome: BackOutcome);
}

/// No-op observer.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_phase_change(&self, _: Phase, _: Phase) {}
    fn on_loaded(&self, _: &Test) {}
    fn on_section(&self, _: Section, _: &[&Question]) {}
    fn on_tick(&self, _: u64) {}
    fn on_execution(&self, _: &ExecutionReport) {}
    fn on_submitted(&self, _: &SubmissionReceipt) {}
    fn on_submission_failed(&self, _: &SessionError) {}
    fn on_disqualified(&self, _: &str) {}
    fn on_rejected(&self, _: &SessionError) {}
    fn on_back(&self, _: BackOutcome) {}
}

/// Moves a session out of `Submitting` if the submit future is dropped early.
struct SubmittingGuard<'a> {
    phase: &'a mut Phase,
    observer: &'a dyn SessionObserver,
    session_id: Uuid,
}

impl SubmittingGuard<'_> {
    fn disarm(self) {
        std::mem::forget(self);
    }
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        if *self.phase == Phase::Submitting {
            tracing::warn!(session_id = %self.session_id, "submission interrupted, retry is possible");
            *self.phase = Phase::SubmissionFailed;
            self.observer
                .on_phase_change(Phase::Submitting, Phase::SubmissionFailed);
        }
    }
}

pub struct SessionController {
    session_id: Uuid,
    test_id: String,
    student: StudentDetails,
    config: SessionConfig,
    tests: Arc<dyn TestSource>,
    executor: Arc<dyn CodeExecutor>,
    observer: Arc<dyn SessionObserver>,
    phase: Phase,
    test: Option<Arc<Test>>,
    clock: Clock,
    answers: AnswerStore,
    sections: SectionNavigator,
    last_execution: Option<ExecutionReport>,
    executions: JoinSet<ExecutionReport>,
    submission: SubmissionPipeline,
    router: ViewRouter,
    warmup_deadline: Option<Instant>,
}

impl SessionController {
    pub fn new(
        test_id: impl Into<String>,
        student: StudentDetails,
        services: SessionServices,
        config: SessionConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let session_id = Uuid::new_v4();
        let scorer = ScoringEngine::new(
            services.evaluator,
            Arc::clone(&services.executor),
            config.default_language,
        );
        Self {
            session_id,
            test_id: test_id.into(),
            student,
            clock: Clock::new(config.tick_period),
            config,
            tests: services.tests,
            executor: services.executor,
            observer,
            phase: Phase::Loading,
            test: None,
            answers: AnswerStore::new(),
            sections: SectionNavigator::new(),
            last_execution: None,
            executions: JoinSet::new(),
            submission: SubmissionPipeline::new(session_id, scorer, services.results),
            router: ViewRouter::new(),
            warmup_deadline: None,
        }
    }

    /// Use `clock` instead of one built from the configured tick period.
    /// Takes effect only before [`Self::load`].
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Use `router` for views and the back-navigation guard.
    pub fn with_router(mut self, router: ViewRouter) -> Self {
        self.router = router;
        self
    }

    // -- accessors -----------------------------------------------------------

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn test(&self) -> Option<&Test> {
        self.test.as_deref()
    }

    pub fn remaining_secs(&self) -> u64 {
        self.clock.remaining()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn current_section(&self) -> Section {
        self.sections.current()
    }

    pub fn answer(&self, question: &QuestionId) -> Option<&Answer> {
        self.answers.get(question)
    }

    pub fn last_execution(&self) -> Option<&ExecutionReport> {
        self.last_execution.as_ref()
    }

    pub fn current_view(&self) -> &View {
        self.router.current()
    }

    pub fn router(&self) -> &ViewRouter {
        &self.router
    }

    pub fn submission_state(&self) -> &SubmissionState {
        self.submission.state()
    }

    /// Questions of the active section.
    pub fn current_questions(&self) -> Vec<&Question> {
        match self.test.as_deref() {
            Some(test) => self.sections.questions(test),
            None => Vec::new(),
        }
    }

    // -- transitions ---------------------------------------------------------

    fn set_phase(&mut self, to: Phase) {
        let from = self.phase;
        if from == to {
            return;
        }
        tracing::info!(session_id = %self.session_id, %from, %to, "phase changed");
        self.phase = to;
        self.observer.on_phase_change(from, to);
    }

    fn require(&self, phase: Phase, action: &'static str) -> Result<(), SessionError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(SessionError::invalid(self.phase, action))
        }
    }

    fn loaded_test(&self) -> Result<Arc<Test>, SessionError> {
        self.test
            .clone()
            .ok_or_else(|| SessionError::invalid(self.phase, "use test"))
    }

    fn announce_section(&self) {
        let questions = self.current_questions();
        self.observer
            .on_section(self.sections.current(), &questions);
    }

    /// Fetch the test definition and arm the clock.
    pub async fn load(&mut self) -> Result<(), SessionError> {
        self.require(Phase::Loading, "load")?;
        let test = match self.tests.fetch_test(&self.test_id).await {
            Ok(test) => test,
            Err(source) => {
                tracing::error!(test_id = %self.test_id, "failed to load test: {source}");
                self.set_phase(Phase::Failed);
                return Err(SessionError::LoadFailure {
                    test_id: self.test_id.clone(),
                    source,
                });
            }
        };

        tracing::info!(
            test_id = %test.id,
            questions = test.questions.len(),
            duration_min = test.duration,
            "test loaded"
        );
        self.clock.arm(test.duration_secs());
        self.observer.on_loaded(&test);
        self.test = Some(Arc::new(test));
        if let ReadinessPolicy::Warmup(delay) = self.config.readiness {
            self.warmup_deadline = Some(Instant::now() + delay);
        }
        self.set_phase(Phase::Armed);
        Ok(())
    }

    /// Readiness gate passed: start the countdown.
    pub fn ready(&mut self) -> Result<(), SessionError> {
        self.require(Phase::Armed, "start")?;
        self.clock.start()?;
        self.warmup_deadline = None;
        self.set_phase(Phase::Answering);
        self.announce_section();
        Ok(())
    }

    /// End the session without scoring.
    pub fn disqualify(&mut self, reason: &str) -> Result<(), SessionError> {
        self.require(Phase::Answering, "disqualify")?;
        self.stop_answering();
        self.router.enter_disqualified(reason);
        let reason = match self.router.current() {
            View::Disqualified { reason } => reason.clone(),
            _ => reason.to_string(),
        };
        tracing::warn!(session_id = %self.session_id, %reason, "session disqualified");
        self.set_phase(Phase::Disqualified);
        self.observer.on_disqualified(&reason);
        Ok(())
    }

    pub fn set_answer(&mut self, question: QuestionId, answer: Answer) -> Result<(), SessionError> {
        self.require(Phase::Answering, "edit answers")?;
        let test = self.loaded_test()?;
        if test.question(&question).is_none() {
            return Err(SessionError::UnknownQuestion(question));
        }
        tracing::trace!(%question, "answer updated");
        self.answers.set(question, answer);
        Ok(())
    }

    pub fn advance_section(&mut self) -> Result<Section, SessionError> {
        self.require(Phase::Answering, "change section")?;
        let section = self.sections.advance()?;
        self.announce_section();
        Ok(section)
    }

    /// Start a code run in the background. The clock keeps ticking while it
    /// is pending; the result arrives through [`Self::next_execution`].
    pub fn run_code(&mut self, question: QuestionId) -> Result<(), SessionError> {
        self.require(Phase::Answering, "run code")?;
        let test = self.loaded_test()?;
        match test.question(&question).map(|q| &q.kind) {
            None => return Err(SessionError::UnknownQuestion(question)),
            Some(QuestionKind::Coding { .. }) => {}
            Some(_) => return Err(SessionError::NotRunnable(question)),
        }
        let Some(answer) = self.answers.get(&question).filter(|a| !a.is_blank()) else {
            let report = ExecutionReport {
                question,
                result: Err(ExecutionError::Rejected {
                    message: "No code to run".into(),
                }),
            };
            self.record_execution(report);
            return Ok(());
        };

        let source = answer.as_str().to_string();
        let language = answer.language().unwrap_or(self.config.default_language);
        let executor = Arc::clone(&self.executor);
        tracing::debug!(%question, %language, "running code");
        self.executions.spawn(async move {
            let result = executor.run(&source, language).await;
            ExecutionReport { question, result }
        });
        Ok(())
    }

    /// Wait for the next background code run to finish.
    pub async fn next_execution(&mut self) -> Option<ExecutionReport> {
        while let Some(joined) = self.executions.join_next().await {
            if let Some(report) = self.on_execution_joined(joined) {
                return Some(report);
            }
        }
        None
    }

    fn on_execution_joined(&mut self, joined: Result<ExecutionReport, JoinError>) -> Option<ExecutionReport> {
        match joined {
            Ok(report) => {
                self.record_execution(report.clone());
                Some(report)
            }
            Err(e) if e.is_cancelled() => None,
            Err(e) => {
                tracing::error!("code run task failed: {e}");
                None
            }
        }
    }

    fn record_execution(&mut self, report: ExecutionReport) {
        if let Err(e) = &report.result {
            tracing::warn!(question = %report.question, "code run failed: {e}");
        }
        self.observer.on_execution(&report);
        self.last_execution = Some(report);
    }

    /// Apply a clock event. Expiry triggers submission.
    pub async fn on_clock(&mut self, event: ClockEvent) {
        match event {
            ClockEvent::Ticked(remaining) => {
                tracing::trace!(remaining, "tick");
                self.observer.on_tick(remaining);
            }
            ClockEvent::Expired => {
                self.observer.on_tick(0);
                tracing::info!(session_id = %self.session_id, "time is up, submitting");
                if let Err(e) = self.submit().await {
                    if !e.is_recoverable() {
                        tracing::warn!("submission on expiry rejected: {e}");
                    }
                }
            }
        }
    }

    fn stop_answering(&mut self) {
        self.clock.cancel();
        self.warmup_deadline = None;
        self.executions.abort_all();
    }

    /// Score and persist, at most once.
    ///
    /// From `Answering` this freezes edits, stops the clock and runs the
    /// pipeline. From `SubmissionFailed` it resends the retained score.
    /// While submitting or after success it does nothing.
    ///
    /// Dropping the returned future before it completes leaves the session in
    /// `SubmissionFailed`, from which `submit` can be called again.
    pub async fn submit(&mut self) -> Result<SubmitAttempt, SessionError> {
        match self.phase {
            Phase::Answering | Phase::SubmissionFailed => {}
            Phase::Submitting | Phase::Submitted => return Ok(SubmitAttempt::Ignored),
            other => return Err(SessionError::invalid(other, "submit")),
        }
        let test = self.loaded_test()?;
        self.stop_answering();
        self.set_phase(Phase::Submitting);

        let answers = self.answers.snapshot();
        let guard = SubmittingGuard {
            phase: &mut self.phase,
            observer: self.observer.as_ref(),
            session_id: self.session_id,
        };
        let result = self.submission.submit(&test, &self.student, answers).await;
        guard.disarm();
        match result {
            Ok(SubmitAttempt::Submitted(receipt)) => {
                self.set_phase(Phase::Submitted);
                self.router.enter_confirmation(Arc::clone(&receipt));
                self.observer.on_submitted(&receipt);
                Ok(SubmitAttempt::Submitted(receipt))
            }
            Ok(SubmitAttempt::Ignored) => Ok(SubmitAttempt::Ignored),
            Err(e) => {
                self.set_phase(Phase::SubmissionFailed);
                self.observer.on_submission_failed(&e);
                Err(e)
            }
        }
    }

    /// Handle a back-navigation event from the view layer.
    pub fn back(&mut self) -> BackOutcome {
        let outcome = self.router.back();
        self.observer.on_back(outcome);
        outcome
    }

    /// The outcome as of now.
    pub fn outcome(&self) -> SessionOutcome {
        match (self.phase, self.router.current()) {
            (Phase::Submitted, View::Confirmation(receipt)) => {
                SessionOutcome::Submitted(Arc::clone(receipt))
            }
            (Phase::Disqualified, View::Disqualified { reason }) => SessionOutcome::Disqualified {
                reason: reason.clone(),
            },
            (phase, _) => SessionOutcome::Abandoned { phase },
        }
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        let result = match command {
            SessionCommand::Ready => match self.config.readiness {
                ReadinessPolicy::Signal => self.ready(),
                ReadinessPolicy::Warmup(_) => {
                    tracing::debug!("ready signal ignored, waiting for warm-up");
                    Ok(())
                }
            },
            SessionCommand::Disqualify(reason) => self.disqualify(&reason),
            SessionCommand::SetAnswer { question, answer } => self.set_answer(question, answer),
            SessionCommand::AdvanceSection => self.advance_section().map(|_| ()),
            SessionCommand::RunCode(question) => self.run_code(question),
            SessionCommand::Submit => match self.submit().await {
                Err(e) if e.is_recoverable() => Ok(()),
                other => other.map(|_| ()),
            },
            SessionCommand::Back => {
                self.back();
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::warn!(phase = %self.phase, "command rejected: {e}");
            self.observer.on_rejected(&e);
        }
    }

    /// Run the session until the command stream closes.
    ///
    /// Loads the test first; a load failure ends the session with
    /// [`SessionError::LoadFailure`]. The loop keeps running in terminal
    /// phases so back navigation stays intercepted for as long as the
    /// confirmation view is shown.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
    ) -> Result<SessionOutcome, SessionError> {
        self.load().await?;

        loop {
            let warmup = self.warmup_deadline;
            tokio::select! {
                event = self.clock.next_event() => self.on_clock(event).await,
                Some(joined) = self.executions.join_next(), if !self.executions.is_empty() => {
                    self.on_execution_joined(joined);
                }
                _ = sleep_until(warmup.unwrap_or_else(Instant::now)), if warmup.is_some() => {
                    tracing::info!("warm-up elapsed");
                    if let Err(e) = self.ready() {
                        self.observer.on_rejected(&e);
                    }
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }

        self.stop_answering();
        let outcome = self.outcome();
        tracing::info!(session_id = %self.session_id, phase = %self.phase, "session closed");
        Ok(outcome)
    }
}
