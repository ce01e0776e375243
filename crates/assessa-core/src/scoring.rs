//! Scoring: turning a frozen answer set into a [`ScoreRecord`].
//!
//! Grading is split in two. [`ScoringEngine::grade`] performs the external
//! calls (subjective evaluation, code execution) and collects their outcomes
//! as plain values; [`compute_score`] is a pure function over the test, the
//! answers, and those outcomes.
//!
//! Weighting: an objective question is worth 1 point, subjective and coding
//! questions are worth 10 points each.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::answers::AnswerSnapshot;
use crate::error::ExecutionError;
use crate::model::{CodeLanguage, Question, QuestionId, QuestionKind, Section, Test};
use crate::traits::{AnswerEvaluator, CodeExecutor, EvaluationRequest};

/// Points awarded per subjective or coding question.
pub const WEIGHTED_QUESTION_POINTS: f64 = 10.0;

/// How a single question was graded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum GradeStatus {
    Correct,
    Incorrect,
    /// Subjective answers carry whatever the evaluator returned.
    Evaluated,
    Unanswered,
    EvaluationFailed(String),
    ExecutionFailed(String),
}

/// Per-question grade detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionGrade {
    pub question_id: QuestionId,
    pub section: Section,
    pub points: f64,
    pub max_points: f64,
    pub status: GradeStatus,
}

/// Immutable result of grading a completed session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    /// Number of correctly answered objective questions.
    pub objective: u32,
    pub objective_total: u32,
    /// Sum of subjective scores.
    pub subjective: f64,
    pub subjective_scores: Vec<f64>,
    /// Sum of coding scores.
    pub coding: u32,
    pub coding_scores: Vec<u32>,
    /// Overall percentage in `0..=100`, two-decimal precision.
    pub percentage: f64,
    #[serde(default)]
    pub questions: Vec<QuestionGrade>,
}

impl ScoreRecord {
    pub fn earned_points(&self) -> f64 {
        f64::from(self.objective) + self.subjective + f64::from(self.coding)
    }

    pub fn possible_points(&self) -> f64 {
        f64::from(self.objective_total)
            + WEIGHTED_QUESTION_POINTS * self.subjective_scores.len() as f64
            + WEIGHTED_QUESTION_POINTS * self.coding_scores.len() as f64
    }
}

/// Outcomes of the external calls made while grading.
#[derive(Debug, Clone, Default)]
pub struct GradingInputs {
    /// Evaluator score per subjective question, or the failure message.
    pub evaluations: HashMap<QuestionId, Result<f64, String>>,
    /// Program output per coding question.
    pub executions: HashMap<QuestionId, Result<String, ExecutionError>>,
}

/// Exact match after trimming leading and trailing whitespace.
///
/// A failed execution never matches.
pub fn outputs_match(expected: &str, actual: &Result<String, ExecutionError>) -> bool {
    match actual {
        Ok(output) => output.trim() == expected.trim(),
        Err(_) => false,
    }
}

/// Round to two decimals.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute the score record. Pure: no I/O, same inputs give the same record.
///
/// Subjective or coding questions with no recorded outcome are treated as
/// unanswered.
pub fn compute_score(test: &Test, answers: &AnswerSnapshot, inputs: &GradingInputs) -> ScoreRecord {
    let mut record = ScoreRecord {
        objective: 0,
        objective_total: 0,
        subjective: 0.0,
        subjective_scores: Vec::new(),
        coding: 0,
        coding_scores: Vec::new(),
        percentage: 0.0,
        questions: Vec::with_capacity(test.questions.len()),
    };

    for question in &test.questions {
        let grade = grade_question(question, answers, inputs);
        match question.kind {
            QuestionKind::Objective { .. } => {
                record.objective_total += 1;
                if grade.status == GradeStatus::Correct {
                    record.objective += 1;
                }
            }
            QuestionKind::Subjective {} => {
                record.subjective_scores.push(grade.points);
                record.subjective += grade.points;
            }
            QuestionKind::Coding { .. } => {
                let points = grade.points as u32;
                record.coding_scores.push(points);
                record.coding += points;
            }
        }
        record.questions.push(grade);
    }

    let possible = record.possible_points();
    record.percentage = if possible > 0.0 {
        round2((record.earned_points() / possible * 100.0).clamp(0.0, 100.0))
    } else {
        0.0
    };
    record
}

fn grade_question(question: &Question, answers: &AnswerSnapshot, inputs: &GradingInputs) -> QuestionGrade {
    let (points, max_points, status) = match &question.kind {
        QuestionKind::Objective { answer, .. } => match answers.get(&question.id) {
            None => (0.0, 1.0, GradeStatus::Unanswered),
            Some(given) if given.as_str() == answer => (1.0, 1.0, GradeStatus::Correct),
            Some(_) => (0.0, 1.0, GradeStatus::Incorrect),
        },
        QuestionKind::Subjective {} => match inputs.evaluations.get(&question.id) {
            None => (0.0, WEIGHTED_QUESTION_POINTS, GradeStatus::Unanswered),
            Some(Ok(score)) => (
                clamp_subjective(*score),
                WEIGHTED_QUESTION_POINTS,
                GradeStatus::Evaluated,
            ),
            Some(Err(reason)) => (
                0.0,
                WEIGHTED_QUESTION_POINTS,
                GradeStatus::EvaluationFailed(reason.clone()),
            ),
        },
        QuestionKind::Coding { answer } => match inputs.executions.get(&question.id) {
            None => (0.0, WEIGHTED_QUESTION_POINTS, GradeStatus::Unanswered),
            Some(Err(e)) => (
                0.0,
                WEIGHTED_QUESTION_POINTS,
                GradeStatus::ExecutionFailed(e.to_string()),
            ),
            Some(output) if outputs_match(answer, output) => (
                WEIGHTED_QUESTION_POINTS,
                WEIGHTED_QUESTION_POINTS,
                GradeStatus::Correct,
            ),
            Some(_) => (0.0, WEIGHTED_QUESTION_POINTS, GradeStatus::Incorrect),
        },
    };
    QuestionGrade {
        question_id: question.id.clone(),
        section: question.section(),
        points,
        max_points,
        status,
    }
}

fn clamp_subjective(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, WEIGHTED_QUESTION_POINTS)
    }
}

/// Performs the external calls needed to grade a session.
#[derive(Clone)]
pub struct ScoringEngine {
    evaluator: Arc<dyn AnswerEvaluator>,
    executor: Arc<dyn CodeExecutor>,
    default_language: CodeLanguage,
}

impl ScoringEngine {
    pub fn new(
        evaluator: Arc<dyn AnswerEvaluator>,
        executor: Arc<dyn CodeExecutor>,
        default_language: CodeLanguage,
    ) -> Self {
        Self {
            evaluator,
            executor,
            default_language,
        }
    }

    /// Grade a test. Collaborator failures become score-0 outcomes.
    pub async fn score(&self, test: &Test, answers: &AnswerSnapshot) -> ScoreRecord {
        let inputs = self.grade(test, answers).await;
        let record = compute_score(test, answers, &inputs);
        tracing::info!(
            test_id = %test.id,
            objective = record.objective,
            subjective = record.subjective,
            coding = record.coding,
            percentage = record.percentage,
            "test scored"
        );
        record
    }

    /// Issue every evaluation and execution call concurrently and collect
    /// the outcomes. Unanswered questions are skipped without a call.
    ///
    /// Blank or missing subjective answers are not sent to the evaluator;
    /// they grade as `Unanswered` with 0 points instead of whatever the
    /// evaluator would return for an empty answer.
    pub async fn grade(&self, test: &Test, answers: &AnswerSnapshot) -> GradingInputs {
        let evaluations = test.questions.iter().filter_map(|q| {
            let QuestionKind::Subjective {} = q.kind else {
                return None;
            };
            let answer = answers.answered(&q.id)?;
            let request = EvaluationRequest {
                question: q.prompt.clone(),
                answer: answer.as_str().to_string(),
            };
            Some(async move {
                let outcome = match self.evaluator.evaluate(&request).await {
                    Ok(score) => Ok(score),
                    Err(e) => {
                        tracing::warn!(question = %q.id, "evaluation failed: {e}");
                        Err(e.to_string())
                    }
                };
                (q.id.clone(), outcome)
            })
        });

        let executions = test.questions.iter().filter_map(|q| {
            let QuestionKind::Coding { .. } = q.kind else {
                return None;
            };
            let Some(answer) = answers.answered(&q.id) else {
                tracing::debug!(question = %q.id, "no code submitted");
                return None;
            };
            let language = answer.language().unwrap_or(self.default_language);
            let source = answer.as_str().to_string();
            Some(async move {
                let outcome = self.executor.run(&source, language).await;
                if let Err(e) = &outcome {
                    tracing::warn!(question = %q.id, "execution failed: {e}");
                }
                (q.id.clone(), outcome)
            })
        });

        let (evaluations, executions) =
            futures::join!(join_all(evaluations), join_all(executions));

        GradingInputs {
            evaluations: evaluations.into_iter().collect(),
            executions: executions.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::mock::{MockEvaluator, MockExecutor};
    use crate::model::Answer;

    fn objective(id: &str, correct: &str) -> Question {
        Question {
            id: id.into(),
            prompt: format!("objective {id}"),
            kind: QuestionKind::Objective {
                options: vec!["A".into(), "B".into(), "C".into()],
                answer: correct.into(),
            },
        }
    }

    fn subjective(id: &str) -> Question {
        Question {
            id: id.into(),
            prompt: format!("subjective {id}"),
            kind: QuestionKind::Subjective {},
        }
    }

    fn coding(id: &str, expected: &str) -> Question {
        Question {
            id: id.into(),
            prompt: format!("coding {id}"),
            kind: QuestionKind::Coding {
                answer: expected.into(),
            },
        }
    }

    fn make_test(questions: Vec<Question>) -> Test {
        Test {
            id: "t".into(),
            name: "T".into(),
            duration: 10,
            questions,
        }
    }

    fn code(source: &str) -> Answer {
        Answer::Code {
            source: source.into(),
            language: CodeLanguage::JavaScript,
        }
    }

    #[test]
    fn objective_exact_match() {
        let test = make_test(vec![objective("q1", "B")]);
        let inputs = GradingInputs::default();

        let right: AnswerSnapshot = [("q1".into(), Answer::Choice("B".into()))].into_iter().collect();
        assert_eq!(compute_score(&test, &right, &inputs).objective, 1);

        let wrong: AnswerSnapshot = [("q1".into(), Answer::Choice("b".into()))].into_iter().collect();
        assert_eq!(compute_score(&test, &wrong, &inputs).objective, 0);

        let record = compute_score(&test, &AnswerSnapshot::default(), &inputs);
        assert_eq!(record.objective, 0);
        assert_eq!(record.questions[0].status, GradeStatus::Unanswered);
    }

    #[test]
    fn coding_output_comparison_trims_only_edges() {
        assert!(outputs_match("42", &Ok(" 42\n".into())));
        assert!(!outputs_match("42", &Ok("43".into())));
        assert!(!outputs_match("a b", &Ok("a  b".into())));
        assert!(!outputs_match("Hello", &Ok("hello".into())));
        assert!(!outputs_match(
            "42",
            &Err(ExecutionError::Unavailable("down".into()))
        ));
    }

    #[test]
    fn mixed_test_percentage() {
        let test = make_test(vec![
            objective("o1", "A"),
            objective("o2", "B"),
            subjective("s1"),
            coding("c1", "42"),
        ]);
        let answers: AnswerSnapshot = [
            ("o1".into(), Answer::Choice("A".into())),
            ("o2".into(), Answer::Choice("C".into())),
            ("s1".into(), Answer::Text("an essay".into())),
            ("c1".into(), code("console.log(42)")),
        ]
        .into_iter()
        .collect();
        let mut inputs = GradingInputs::default();
        inputs.evaluations.insert("s1".into(), Ok(7.0));
        inputs.executions.insert("c1".into(), Ok(" 42\n".into()));

        let record = compute_score(&test, &answers, &inputs);
        assert_eq!(record.objective, 1);
        assert_eq!(record.subjective, 7.0);
        assert_eq!(record.coding, 10);
        assert_eq!(record.percentage, 81.82);
    }

    #[test]
    fn failures_score_zero() {
        let test = make_test(vec![subjective("s1"), coding("c1", "42")]);
        let mut inputs = GradingInputs::default();
        inputs
            .evaluations
            .insert("s1".into(), Err("evaluator down".into()));
        inputs.executions.insert(
            "c1".into(),
            Err(ExecutionError::Rejected {
                message: "ReferenceError".into(),
            }),
        );

        let record = compute_score(&test, &AnswerSnapshot::default(), &inputs);
        assert_eq!(record.subjective_scores, vec![0.0]);
        assert_eq!(record.coding_scores, vec![0]);
        assert_eq!(record.percentage, 0.0);
        assert!(matches!(
            record.questions[1].status,
            GradeStatus::ExecutionFailed(ref m) if m == "ReferenceError"
        ));
    }

    #[test]
    fn evaluator_scores_are_clamped() {
        let test = make_test(vec![subjective("s1"), subjective("s2")]);
        let mut inputs = GradingInputs::default();
        inputs.evaluations.insert("s1".into(), Ok(14.0));
        inputs.evaluations.insert("s2".into(), Ok(-3.0));

        let record = compute_score(&test, &AnswerSnapshot::default(), &inputs);
        assert_eq!(record.subjective_scores, vec![10.0, 0.0]);
        assert_eq!(record.percentage, 50.0);
    }

    #[test]
    fn empty_sections_do_not_count() {
        let record = compute_score(
            &make_test(vec![]),
            &AnswerSnapshot::default(),
            &GradingInputs::default(),
        );
        assert_eq!(record.percentage, 0.0);

        let test = make_test(vec![objective("o1", "A")]);
        let answers: AnswerSnapshot = [("o1".into(), Answer::Choice("A".into()))].into_iter().collect();
        let record = compute_score(&test, &answers, &GradingInputs::default());
        assert_eq!(record.percentage, 100.0);
    }

    #[tokio::test]
    async fn engine_skips_calls_for_unanswered_questions() {
        let evaluator = Arc::new(MockEvaluator::with_fixed_score(5.0));
        let executor = Arc::new(MockExecutor::with_fixed_output("42"));
        let engine = ScoringEngine::new(
            evaluator.clone(),
            executor.clone(),
            CodeLanguage::JavaScript,
        );
        let test = make_test(vec![
            subjective("s1"),
            subjective("s2"),
            coding("c1", "42"),
            coding("c2", "42"),
        ]);
        let answers: AnswerSnapshot = [
            ("s2".into(), Answer::Text("   ".into())),
            ("c2".into(), code("print(42)")),
        ]
        .into_iter()
        .collect();

        let record = engine.score(&test, &answers).await;
        assert_eq!(evaluator.call_count(), 0);
        assert_eq!(record.subjective_scores, vec![0.0, 0.0]);
        assert_eq!(executor.call_count(), 1);
        assert_eq!(record.coding_scores, vec![0, 10]);
    }

    #[tokio::test]
    async fn engine_turns_collaborator_errors_into_zero() {
        let evaluator = Arc::new(MockEvaluator::failing(ServiceError::Network(
            "connection refused".into(),
        )));
        let executor = Arc::new(MockExecutor::failing(ExecutionError::Unavailable(
            "timeout".into(),
        )));
        let engine = ScoringEngine::new(evaluator, executor, CodeLanguage::Python);
        let test = make_test(vec![subjective("s1"), coding("c1", "42")]);
        let answers: AnswerSnapshot = [
            ("s1".into(), Answer::Text("answer".into())),
            ("c1".into(), code("x")),
        ]
        .into_iter()
        .collect();

        let record = engine.score(&test, &answers).await;
        assert_eq!(record.earned_points(), 0.0);
        assert!(matches!(
            record.questions[0].status,
            GradeStatus::EvaluationFailed(_)
        ));
    }

    #[tokio::test]
    async fn engine_uses_default_language_for_plain_text() {
        let executor = Arc::new(MockExecutor::with_fixed_output("ok"));
        let engine = ScoringEngine::new(
            Arc::new(MockEvaluator::with_fixed_score(0.0)),
            executor.clone(),
            CodeLanguage::Python,
        );
        let test = make_test(vec![coding("c1", "ok")]);
        let answers: AnswerSnapshot = [("c1".into(), Answer::Text("print('ok')".into()))]
            .into_iter()
            .collect();

        engine.score(&test, &answers).await;
        assert_eq!(
            executor.last_request(),
            Some(("print('ok')".to_string(), CodeLanguage::Python))
        );
    }
}
