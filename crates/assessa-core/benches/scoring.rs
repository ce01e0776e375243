use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use assessa_core::answers::AnswerSnapshot;
use assessa_core::model::{Answer, CodeLanguage, Question, QuestionId, QuestionKind, Test};
use assessa_core::scoring::{compute_score, outputs_match, GradingInputs};

fn make_test(per_section: usize) -> Test {
    let mut questions = Vec::with_capacity(per_section * 3);
    for i in 0..per_section {
        questions.push(Question {
            id: format!("o{i}").into(),
            prompt: "Pick B".into(),
            kind: QuestionKind::Objective {
                options: vec!["A".into(), "B".into(), "C".into()],
                answer: "B".into(),
            },
        });
        questions.push(Question {
            id: format!("s{i}").into(),
            prompt: "Explain".into(),
            kind: QuestionKind::Subjective {},
        });
        questions.push(Question {
            id: format!("c{i}").into(),
            prompt: "Print 42".into(),
            kind: QuestionKind::Coding {
                answer: "42".into(),
            },
        });
    }
    Test {
        id: "bench".into(),
        name: "Bench".into(),
        duration: 60,
        questions,
    }
}

fn make_inputs(test: &Test) -> (AnswerSnapshot, GradingInputs) {
    let mut answers = Vec::new();
    let mut evaluations = HashMap::new();
    let mut executions = HashMap::new();
    for q in &test.questions {
        let id: QuestionId = q.id.clone();
        match q.kind {
            QuestionKind::Objective { .. } => answers.push((id, Answer::Choice("B".into()))),
            QuestionKind::Subjective {} => {
                answers.push((id.clone(), Answer::Text("an answer".into())));
                evaluations.insert(id, Ok(6.5));
            }
            QuestionKind::Coding { .. } => {
                answers.push((
                    id.clone(),
                    Answer::Code {
                        source: "console.log(42)".into(),
                        language: CodeLanguage::JavaScript,
                    },
                ));
                executions.insert(id, Ok("42\n".to_string()));
            }
        }
    }
    (
        answers.into_iter().collect(),
        GradingInputs {
            evaluations,
            executions,
        },
    )
}

fn bench_compute_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_score");

    for per_section in [5, 50, 500] {
        let test = make_test(per_section);
        let (answers, inputs) = make_inputs(&test);
        group.bench_function(format!("questions={}", per_section * 3), |b| {
            b.iter(|| compute_score(black_box(&test), black_box(&answers), black_box(&inputs)))
        });
    }

    group.bench_function("empty_test", |b| {
        let test = make_test(0);
        let answers = AnswerSnapshot::default();
        let inputs = GradingInputs::default();
        b.iter(|| compute_score(black_box(&test), black_box(&answers), black_box(&inputs)))
    });

    group.finish();
}

fn bench_outputs_match(c: &mut Criterion) {
    let output = Ok(format!("  {}\n", "x".repeat(4096)));
    let expected = "x".repeat(4096);
    c.bench_function("outputs_match_4k", |b| {
        b.iter(|| outputs_match(black_box(&expected), black_box(&output)))
    });
}

criterion_group!(benches, bench_compute_score, bench_outputs_match);
criterion_main!(benches);
