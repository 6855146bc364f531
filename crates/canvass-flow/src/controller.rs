//! The per-call survey state machine.

use crate::catalog::QuestionCatalog;
use crate::error::FlowError;
use crate::session::SessionTable;
use canvass_types::{AnswerSink, Judge, Judgement, Question, QuestionId, Transcriber};
use std::sync::Arc;
use std::time::Duration;

/// What the boundary should have the vendor do next.
///
/// Every step carries the full text to speak; the boundary only renders it
/// (synthesized audio or vendor speech) and, for `Gather`, arranges for the
/// next recording to call back with the question id.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowStep {
    /// Speak `speech`, then record the caller's reply for `question_id`.
    Gather {
        question_id: QuestionId,
        speech: String,
    },
    /// Speak `speech` and end the call.
    Hangup { speech: String },
}

/// The fixed spoken fragments of a survey, configurable per deployment.
#[derive(Debug, Clone)]
pub struct SurveyScript {
    /// Spoken once when the call connects, before the first question.
    pub greeting: String,
    /// Spoken after the last accepted answer, before hanging up.
    pub closing: String,
    /// Prefixed to a repeated question after a collaborator failure.
    pub apology: String,
    /// Prefixed to a repeated question after a blank transcription.
    pub reprompt: String,
    /// Prefixed to the next question when a retry limit forces advancement.
    pub transition: String,
}

impl Default for SurveyScript {
    fn default() -> Self {
        Self {
            greeting: "Hello! Thank you for taking our survey. \
                       We have a few questions for you. Let's begin."
                .to_string(),
            closing: "Thank you for completing our survey. Have a great day!".to_string(),
            apology: "Sorry, something went wrong on our end. Let's try that again.".to_string(),
            reprompt: "Sorry, I didn't catch that.".to_string(),
            transition: "Alright, no worries. Let's move on.".to_string(),
        }
    }
}

/// Call flow controller: one state machine instance per active call.
///
/// All transitions happen here; the webhook boundary calls in with raw
/// events and renders whatever [`FlowStep`] comes back.
pub struct SurveyController {
    catalog: QuestionCatalog,
    sessions: SessionTable,
    script: SurveyScript,
    /// Consecutive unresolved attempts tolerated per question before the
    /// survey force-advances. `None` repeats forever.
    max_attempts: Option<u32>,
    transcriber: Arc<dyn Transcriber>,
    judge: Arc<dyn Judge>,
    store: Arc<dyn AnswerSink>,
}

impl SurveyController {
    pub fn new(
        catalog: QuestionCatalog,
        script: SurveyScript,
        max_attempts: Option<u32>,
        transcriber: Arc<dyn Transcriber>,
        judge: Arc<dyn Judge>,
        store: Arc<dyn AnswerSink>,
    ) -> Self {
        Self {
            catalog,
            sessions: SessionTable::new(),
            script,
            max_attempts,
            transcriber,
            judge,
            store,
        }
    }

    /// Starts (or restarts) a survey session for a freshly connected call.
    ///
    /// Returns the greeting joined with the first question. A re-delivered
    /// call-connected event restarts the survey from the top.
    pub fn begin_call(&self, call_id: &str) -> FlowStep {
        self.sessions.insert(call_id);
        let first = self.catalog.first();

        tracing::info!(call_id, question_id = %first.id, "call connected, starting survey");

        FlowStep::Gather {
            question_id: first.id.clone(),
            speech: format!("{} {}", self.script.greeting, first.prompt),
        }
    }

    /// Processes one recorded answer.
    ///
    /// `expected` is the question id the recording was captured for (carried
    /// through the vendor's callback URL). When it does not match the
    /// session's current question the event is a duplicate or stale delivery
    /// and the current prompt is re-served untouched.
    pub async fn submit_answer(
        &self,
        call_id: &str,
        expected: &QuestionId,
        audio: &[u8],
    ) -> Result<FlowStep, FlowError> {
        let question = self.current_question(call_id)?;

        if question.id != *expected {
            tracing::debug!(
                call_id,
                expected = %expected,
                current = %question.id,
                "stale answer event, re-serving current prompt"
            );
            return Ok(FlowStep::Gather {
                question_id: question.id.clone(),
                speech: question.prompt.clone(),
            });
        }

        let transcript = match self.transcriber.transcribe(audio).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(call_id, question_id = %question.id, error = %e, "transcription failed");
                let speech = format!("{} {}", self.script.apology, question.prompt);
                return self.unresolved(call_id, &question, speech);
            }
        };

        let transcript = transcript.trim();
        if transcript.is_empty() {
            // Silence never reaches the judge; a wasted language-model call
            // buys nothing over re-asking.
            tracing::info!(call_id, question_id = %question.id, "blank transcription, re-asking");
            let speech = format!("{} {}", self.script.reprompt, question.prompt);
            return self.unresolved(call_id, &question, speech);
        }

        tracing::debug!(call_id, question_id = %question.id, transcript, "answer transcribed");

        match self.judge.evaluate(&question.prompt, transcript).await {
            Ok(Judgement::Accepted { value }) => {
                // Persistence is best-effort: a storage failure is logged and
                // the call keeps moving.
                if let Err(e) = self.store.record(call_id, &question.id, &value).await {
                    tracing::warn!(
                        call_id,
                        question_id = %question.id,
                        error = %e,
                        "failed to persist accepted answer"
                    );
                }
                self.advance(call_id, None)
            }
            Ok(Judgement::FollowUp {
                question: follow_up,
            }) => {
                tracing::info!(call_id, question_id = %question.id, "answer needs follow-up");
                self.unresolved(call_id, &question, follow_up)
            }
            Err(e) => {
                tracing::warn!(call_id, question_id = %question.id, error = %e, "judgement failed");
                let speech = format!("{} {}", self.script.apology, question.prompt);
                self.unresolved(call_id, &question, speech)
            }
        }
    }

    /// Re-serves the current question with an apology, counting an
    /// unresolved attempt. Used by the boundary when the recorded audio
    /// itself could not be retrieved.
    pub fn recover(&self, call_id: &str) -> Result<FlowStep, FlowError> {
        let question = self.current_question(call_id)?;
        let speech = format!("{} {}", self.script.apology, question.prompt);
        self.unresolved(call_id, &question, speech)
    }

    /// Evicts sessions with no webhook activity for `max_idle`; returns how
    /// many were removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        self.sessions.evict_idle(max_idle)
    }

    /// Number of in-progress calls.
    pub fn active_calls(&self) -> usize {
        self.sessions.len()
    }

    fn current_question(&self, call_id: &str) -> Result<Question, FlowError> {
        let view = self
            .sessions
            .view(call_id)
            .ok_or_else(|| FlowError::UnknownCall(call_id.to_string()))?;

        match self.catalog.get(view.question_index) {
            Some(question) => Ok(question.clone()),
            None => {
                // Completion evicts, so an index past the end can only mean
                // the session was corrupted; drop it and reject the event.
                self.sessions.remove(call_id);
                Err(FlowError::UnknownCall(call_id.to_string()))
            }
        }
    }

    /// Registers an unresolved attempt and either re-asks or, once a
    /// configured retry limit is exhausted, force-advances.
    fn unresolved(
        &self,
        call_id: &str,
        question: &Question,
        speech: String,
    ) -> Result<FlowStep, FlowError> {
        let attempts = self
            .sessions
            .bump_attempts(call_id)
            .ok_or_else(|| FlowError::UnknownCall(call_id.to_string()))?;

        if let Some(max) = self.max_attempts {
            if attempts >= max {
                tracing::info!(
                    call_id,
                    question_id = %question.id,
                    attempts,
                    "retry limit reached, moving on without an answer"
                );
                return self.advance(call_id, Some(&self.script.transition));
            }
        }

        Ok(FlowStep::Gather {
            question_id: question.id.clone(),
            speech,
        })
    }

    /// Moves to the next question, or completes the survey past the last
    /// one. `preface` is spoken before the next prompt (or the closing).
    fn advance(&self, call_id: &str, preface: Option<&str>) -> Result<FlowStep, FlowError> {
        let next_index = self
            .sessions
            .advance(call_id)
            .ok_or_else(|| FlowError::UnknownCall(call_id.to_string()))?;

        match self.catalog.get(next_index) {
            Some(next) => Ok(FlowStep::Gather {
                question_id: next.id.clone(),
                speech: match preface {
                    Some(p) => format!("{} {}", p, next.prompt),
                    None => next.prompt.clone(),
                },
            }),
            None => {
                self.sessions.remove(call_id);
                tracing::info!(call_id, "survey complete, ending call");
                Ok(FlowStep::Hangup {
                    speech: match preface {
                        Some(p) => format!("{} {}", p, self.script.closing),
                        None => self.script.closing.clone(),
                    },
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use canvass_types::CollaboratorError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedTranscriber {
        results: Mutex<VecDeque<Result<String, CollaboratorError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedTranscriber {
        fn new(results: Vec<Result<String, CollaboratorError>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transcriber for ScriptedTranscriber {
        async fn transcribe(&self, _audio: &[u8]) -> Result<String, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(String::new()))
        }
    }

    struct ScriptedJudge {
        results: Mutex<VecDeque<Result<Judgement, CollaboratorError>>>,
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedJudge {
        fn new(results: Vec<Result<Judgement, CollaboratorError>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }

        fn seen(&self) -> Vec<(String, String)> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Judge for ScriptedJudge {
        async fn evaluate(
            &self,
            prompt: &str,
            answer: &str,
        ) -> Result<Judgement, CollaboratorError> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), answer.to_string()));
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(CollaboratorError::Judgement("exhausted".into())))
        }
    }

    #[derive(Default)]
    struct MemorySink {
        records: Mutex<Vec<(String, QuestionId, String)>>,
        fail: AtomicBool,
    }

    impl MemorySink {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn failing() -> Arc<Self> {
            let sink = Self::default();
            sink.fail.store(true, Ordering::SeqCst);
            Arc::new(sink)
        }

        fn records(&self) -> Vec<(String, QuestionId, String)> {
            self.records.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AnswerSink for MemorySink {
        async fn record(
            &self,
            call_id: &str,
            question_id: &QuestionId,
            answer: &str,
        ) -> Result<(), CollaboratorError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CollaboratorError::Storage("disk full".into()));
            }
            self.records.lock().unwrap().push((
                call_id.to_string(),
                question_id.clone(),
                answer.to_string(),
            ));
            Ok(())
        }
    }

    fn two_question_catalog() -> QuestionCatalog {
        QuestionCatalog::new(vec![
            Question::new("Q1", "Do you own a vehicle?"),
            Question::new("Q2", "What is the make?"),
        ])
        .unwrap()
    }

    fn controller(
        max_attempts: Option<u32>,
        transcriber: Arc<ScriptedTranscriber>,
        judge: Arc<ScriptedJudge>,
        store: Arc<MemorySink>,
    ) -> SurveyController {
        SurveyController::new(
            two_question_catalog(),
            SurveyScript::default(),
            max_attempts,
            transcriber,
            judge,
            store,
        )
    }

    fn accepted(value: &str) -> Result<Judgement, CollaboratorError> {
        Ok(Judgement::Accepted {
            value: value.to_string(),
        })
    }

    fn follow_up(text: &str) -> Result<Judgement, CollaboratorError> {
        Ok(Judgement::FollowUp {
            question: text.to_string(),
        })
    }

    #[test]
    fn begin_call_speaks_greeting_and_first_question() {
        let flow = controller(
            None,
            ScriptedTranscriber::new(vec![]),
            ScriptedJudge::new(vec![]),
            MemorySink::new(),
        );

        match flow.begin_call("CA1") {
            FlowStep::Gather {
                question_id,
                speech,
            } => {
                assert_eq!(question_id.as_str(), "Q1");
                assert!(speech.contains("Thank you for taking our survey"));
                assert!(speech.ends_with("Do you own a vehicle?"));
            }
            other => panic!("expected Gather, got {:?}", other),
        }
        assert_eq!(flow.active_calls(), 1);
    }

    #[tokio::test]
    async fn accepted_answer_stores_and_advances() {
        let transcriber = ScriptedTranscriber::new(vec![Ok("yes".to_string())]);
        let judge = ScriptedJudge::new(vec![accepted("yes")]);
        let store = MemorySink::new();
        let flow = controller(None, transcriber, judge.clone(), store.clone());

        flow.begin_call("CA1");
        let step = flow
            .submit_answer("CA1", &QuestionId::new("Q1"), b"wav")
            .await
            .unwrap();

        assert_eq!(
            step,
            FlowStep::Gather {
                question_id: QuestionId::new("Q2"),
                speech: "What is the make?".to_string(),
            }
        );
        assert_eq!(
            store.records(),
            vec![("CA1".to_string(), QuestionId::new("Q1"), "yes".to_string())]
        );
        // The judge saw the current question's prompt, not its id.
        assert_eq!(
            judge.seen(),
            vec![("Do you own a vehicle?".to_string(), "yes".to_string())]
        );
    }

    #[tokio::test]
    async fn blank_transcription_reasks_without_judging() {
        let transcriber = ScriptedTranscriber::new(vec![Ok("   ".to_string())]);
        let judge = ScriptedJudge::new(vec![]);
        let store = MemorySink::new();
        let flow = controller(None, transcriber, judge.clone(), store.clone());

        flow.begin_call("CA1");
        let step = flow
            .submit_answer("CA1", &QuestionId::new("Q1"), b"wav")
            .await
            .unwrap();

        match step {
            FlowStep::Gather {
                question_id,
                speech,
            } => {
                assert_eq!(question_id.as_str(), "Q1");
                assert!(speech.contains("didn't catch that"));
                assert!(speech.ends_with("Do you own a vehicle?"));
            }
            other => panic!("expected Gather, got {:?}", other),
        }
        assert_eq!(judge.calls(), 0, "silence must never reach the judge");
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn follow_up_keeps_position_and_stores_nothing() {
        let transcriber = ScriptedTranscriber::new(vec![
            Ok("maybe something".to_string()),
            Ok("yes".to_string()),
        ]);
        let judge = ScriptedJudge::new(vec![
            follow_up("Can you clarify, yes or no?"),
            accepted("yes"),
        ]);
        let store = MemorySink::new();
        let flow = controller(None, transcriber, judge.clone(), store.clone());

        flow.begin_call("CA1");
        let step = flow
            .submit_answer("CA1", &QuestionId::new("Q1"), b"wav")
            .await
            .unwrap();

        assert_eq!(
            step,
            FlowStep::Gather {
                question_id: QuestionId::new("Q1"),
                speech: "Can you clarify, yes or no?".to_string(),
            }
        );
        assert!(store.records().is_empty());

        // The next answer is still evaluated against Q1.
        flow.submit_answer("CA1", &QuestionId::new("Q1"), b"wav")
            .await
            .unwrap();
        let seen = judge.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].0, "Do you own a vehicle?");
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn last_question_accept_completes_and_evicts() {
        let transcriber = ScriptedTranscriber::new(vec![
            Ok("yes".to_string()),
            Ok("a toyota".to_string()),
        ]);
        let judge = ScriptedJudge::new(vec![accepted("yes"), accepted("toyota")]);
        let store = MemorySink::new();
        let flow = controller(None, transcriber, judge, store.clone());

        flow.begin_call("CA1");
        flow.submit_answer("CA1", &QuestionId::new("Q1"), b"wav")
            .await
            .unwrap();
        let step = flow
            .submit_answer("CA1", &QuestionId::new("Q2"), b"wav")
            .await
            .unwrap();

        match step {
            FlowStep::Hangup { speech } => {
                assert!(speech.contains("Thank you for completing our survey"));
            }
            other => panic!("expected Hangup, got {:?}", other),
        }
        assert_eq!(store.records().len(), 2);
        assert_eq!(flow.active_calls(), 0);

        // Completion is terminal: any further answer event is rejected.
        let err = flow
            .submit_answer("CA1", &QuestionId::new("Q2"), b"wav")
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::UnknownCall(_)));
        assert_eq!(store.records().len(), 2, "no re-store after completion");
    }

    #[tokio::test]
    async fn stale_answer_event_is_a_no_op_reply() {
        let transcriber = ScriptedTranscriber::new(vec![Ok("yes".to_string())]);
        let judge = ScriptedJudge::new(vec![accepted("yes")]);
        let store = MemorySink::new();
        let flow = controller(None, transcriber.clone(), judge.clone(), store.clone());

        flow.begin_call("CA1");
        flow.submit_answer("CA1", &QuestionId::new("Q1"), b"wav")
            .await
            .unwrap();

        // Duplicate delivery of the Q1 recording after advancing to Q2.
        let step = flow
            .submit_answer("CA1", &QuestionId::new("Q1"), b"wav")
            .await
            .unwrap();

        assert_eq!(
            step,
            FlowStep::Gather {
                question_id: QuestionId::new("Q2"),
                speech: "What is the make?".to_string(),
            }
        );
        assert_eq!(transcriber.calls(), 1, "duplicate must not re-transcribe");
        assert_eq!(judge.calls(), 1, "duplicate must not re-judge");
        assert_eq!(store.records().len(), 1, "duplicate must not re-store");
    }

    #[tokio::test]
    async fn unknown_call_is_rejected_without_mutation() {
        let flow = controller(
            None,
            ScriptedTranscriber::new(vec![]),
            ScriptedJudge::new(vec![]),
            MemorySink::new(),
        );

        let err = flow
            .submit_answer("CA-ghost", &QuestionId::new("Q1"), b"wav")
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::UnknownCall(_)));
    }

    #[tokio::test]
    async fn transcription_failure_degrades_to_apology() {
        let transcriber = ScriptedTranscriber::new(vec![Err(
            CollaboratorError::Transcription("backend down".into()),
        )]);
        let judge = ScriptedJudge::new(vec![]);
        let store = MemorySink::new();
        let flow = controller(None, transcriber, judge.clone(), store.clone());

        flow.begin_call("CA1");
        let step = flow
            .submit_answer("CA1", &QuestionId::new("Q1"), b"wav")
            .await
            .unwrap();

        match step {
            FlowStep::Gather {
                question_id,
                speech,
            } => {
                assert_eq!(question_id.as_str(), "Q1");
                assert!(speech.contains("Sorry, something went wrong"));
                assert!(speech.ends_with("Do you own a vehicle?"));
            }
            other => panic!("expected Gather, got {:?}", other),
        }
        assert_eq!(judge.calls(), 0);
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn judgement_failure_degrades_to_apology() {
        let transcriber = ScriptedTranscriber::new(vec![Ok("yes".to_string())]);
        let judge = ScriptedJudge::new(vec![Err(CollaboratorError::Judgement("timeout".into()))]);
        let store = MemorySink::new();
        let flow = controller(None, transcriber, judge, store.clone());

        flow.begin_call("CA1");
        let step = flow
            .submit_answer("CA1", &QuestionId::new("Q1"), b"wav")
            .await
            .unwrap();

        match step {
            FlowStep::Gather { question_id, .. } => assert_eq!(question_id.as_str(), "Q1"),
            other => panic!("expected Gather, got {:?}", other),
        }
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_never_blocks_progression() {
        let transcriber = ScriptedTranscriber::new(vec![Ok("yes".to_string())]);
        let judge = ScriptedJudge::new(vec![accepted("yes")]);
        let store = MemorySink::failing();
        let flow = controller(None, transcriber, judge, store);

        flow.begin_call("CA1");
        let step = flow
            .submit_answer("CA1", &QuestionId::new("Q1"), b"wav")
            .await
            .unwrap();

        match step {
            FlowStep::Gather { question_id, .. } => assert_eq!(question_id.as_str(), "Q2"),
            other => panic!("expected advance despite store failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn retry_limit_forces_advancement() {
        let transcriber = ScriptedTranscriber::new(vec![
            Ok(String::new()),
            Ok(String::new()),
        ]);
        let judge = ScriptedJudge::new(vec![]);
        let store = MemorySink::new();
        let flow = controller(Some(2), transcriber, judge, store.clone());

        flow.begin_call("CA1");

        // First blank: attempt 1 of 2, still re-asking.
        let step = flow
            .submit_answer("CA1", &QuestionId::new("Q1"), b"wav")
            .await
            .unwrap();
        match step {
            FlowStep::Gather { question_id, .. } => assert_eq!(question_id.as_str(), "Q1"),
            other => panic!("expected re-ask, got {:?}", other),
        }

        // Second blank exhausts the limit: move on without storing.
        let step = flow
            .submit_answer("CA1", &QuestionId::new("Q1"), b"wav")
            .await
            .unwrap();
        match step {
            FlowStep::Gather {
                question_id,
                speech,
            } => {
                assert_eq!(question_id.as_str(), "Q2");
                assert!(speech.starts_with("Alright, no worries."));
                assert!(speech.ends_with("What is the make?"));
            }
            other => panic!("expected forced advance, got {:?}", other),
        }
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn retry_limit_on_last_question_completes_the_call() {
        let transcriber = ScriptedTranscriber::new(vec![
            Ok("yes".to_string()),
            Ok(String::new()),
        ]);
        let judge = ScriptedJudge::new(vec![accepted("yes")]);
        let store = MemorySink::new();
        let flow = controller(Some(1), transcriber, judge, store.clone());

        flow.begin_call("CA1");
        flow.submit_answer("CA1", &QuestionId::new("Q1"), b"wav")
            .await
            .unwrap();

        let step = flow
            .submit_answer("CA1", &QuestionId::new("Q2"), b"wav")
            .await
            .unwrap();
        match step {
            FlowStep::Hangup { speech } => {
                assert!(speech.starts_with("Alright, no worries."));
                assert!(speech.contains("Thank you for completing our survey"));
            }
            other => panic!("expected Hangup, got {:?}", other),
        }
        assert_eq!(store.records().len(), 1, "only the accepted answer stored");
        assert_eq!(flow.active_calls(), 0);
    }

    #[tokio::test]
    async fn without_a_limit_follow_ups_recur_indefinitely() {
        let transcriber = ScriptedTranscriber::new(vec![
            Ok("mumble".to_string()),
            Ok("mumble".to_string()),
            Ok("mumble".to_string()),
        ]);
        let judge = ScriptedJudge::new(vec![
            follow_up("Clarify?"),
            follow_up("Clarify?"),
            follow_up("Clarify?"),
        ]);
        let store = MemorySink::new();
        let flow = controller(None, transcriber, judge, store.clone());

        flow.begin_call("CA1");
        for _ in 0..3 {
            let step = flow
                .submit_answer("CA1", &QuestionId::new("Q1"), b"wav")
                .await
                .unwrap();
            match step {
                FlowStep::Gather { question_id, .. } => assert_eq!(question_id.as_str(), "Q1"),
                other => panic!("expected same question, got {:?}", other),
            }
        }
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn recover_apologizes_and_counts_an_attempt() {
        let flow = controller(
            Some(2),
            ScriptedTranscriber::new(vec![]),
            ScriptedJudge::new(vec![]),
            MemorySink::new(),
        );

        flow.begin_call("CA1");
        let step = flow.recover("CA1").unwrap();
        match step {
            FlowStep::Gather {
                question_id,
                speech,
            } => {
                assert_eq!(question_id.as_str(), "Q1");
                assert!(speech.contains("Sorry, something went wrong"));
            }
            other => panic!("expected Gather, got {:?}", other),
        }

        // A second recovery exhausts the limit of 2 and moves on.
        let step = flow.recover("CA1").unwrap();
        match step {
            FlowStep::Gather { question_id, .. } => assert_eq!(question_id.as_str(), "Q2"),
            other => panic!("expected forced advance, got {:?}", other),
        }

        assert!(matches!(
            flow.recover("CA-ghost"),
            Err(FlowError::UnknownCall(_))
        ));
    }

    #[test]
    fn begin_call_twice_restarts_the_survey() {
        let flow = controller(
            None,
            ScriptedTranscriber::new(vec![]),
            ScriptedJudge::new(vec![]),
            MemorySink::new(),
        );

        flow.begin_call("CA1");
        flow.begin_call("CA1");
        assert_eq!(flow.active_calls(), 1);
    }

    #[test]
    fn idle_eviction_clears_abandoned_calls() {
        let flow = controller(
            None,
            ScriptedTranscriber::new(vec![]),
            ScriptedJudge::new(vec![]),
            MemorySink::new(),
        );

        flow.begin_call("CA1");
        flow.begin_call("CA2");
        assert_eq!(flow.evict_idle(Duration::from_secs(3600)), 0);
        assert_eq!(flow.evict_idle(Duration::ZERO), 2);
        assert_eq!(flow.active_calls(), 0);
    }
}
