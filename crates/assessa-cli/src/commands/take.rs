//! The `assessa take` command.
//!
//! Runs one session against the configured services. Commands are read line
//! by line from stdin, so the command can be driven by a person or a script.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use assessa_core::clock::format_remaining;
use assessa_core::error::SessionError;
use assessa_core::model::{Answer, CodeLanguage, Question, QuestionKind, Section, StudentDetails, Test};
use assessa_core::router::BackOutcome;
use assessa_core::scoring::GradeStatus;
use assessa_core::session::{
    ExecutionReport, Phase, ReadinessPolicy, SessionCommand, SessionController, SessionObserver,
    SessionOutcome,
};
use assessa_core::submission::SubmissionReceipt;
use assessa_services::config::{create_services, load_config_from};

const HELP: &str = "\
Commands:
  ready                          start the countdown
  answer <question> <text>       set an answer (option value or free text)
  code <question> <js|py> <file> set a code answer from a file
  run <question>                 run the code answer and show its output
  next                           go to the next section
  submit                         submit (or retry a failed submission)
  back                           navigate back
  disqualify [reason]            end the session as the proctor
  quit                           leave";

/// Console session observer.
struct ConsoleObserver {
    readiness: ReadinessPolicy,
}

impl SessionObserver for ConsoleObserver {
    fn on_phase_change(&self, _from: Phase, to: Phase) {
        if to == Phase::Submitting {
            println!("Submitting...");
        }
    }

    fn on_loaded(&self, test: &Test) {
        println!(
            "Test: {} ({} questions, {} min)",
            test.name,
            test.questions.len(),
            test.duration
        );
        match self.readiness {
            ReadinessPolicy::Signal => println!("Type `ready` to start the clock."),
            ReadinessPolicy::Warmup(delay) => {
                println!("The clock starts in {}s.", delay.as_secs())
            }
        }
    }

    fn on_section(&self, section: Section, questions: &[&Question]) {
        println!("\n== {} ==", section.title());
        if questions.is_empty() {
            println!("  (no questions)");
        }
        for question in questions {
            println!("  [{}] {}", question.id, question.prompt);
            if let QuestionKind::Objective { options, .. } = &question.kind {
                for option in options {
                    println!("      - {option}");
                }
            }
        }
        if section.next().is_some() {
            println!("Type `next` for the next section.");
        }
    }

    fn on_tick(&self, remaining_secs: u64) {
        if remaining_secs % 60 == 0 || remaining_secs <= 10 {
            println!("  [{} remaining]", format_remaining(remaining_secs));
        }
    }

    fn on_execution(&self, report: &ExecutionReport) {
        println!("Output ({}):\n{}", report.question, report.display_text());
    }

    fn on_submitted(&self, receipt: &SubmissionReceipt) {
        print_score(receipt);
        println!(
            "Test submitted successfully! Your total score is: {:.2}%",
            receipt.percentage()
        );
        println!("Type `quit` to exit.");
    }

    fn on_submission_failed(&self, error: &SessionError) {
        eprintln!("Submission failed: {error}");
        eprintln!("Your score is kept. Type `submit` to retry.");
    }

    fn on_disqualified(&self, reason: &str) {
        println!("DISQUALIFIED: {reason}");
    }

    fn on_rejected(&self, error: &SessionError) {
        eprintln!("Rejected: {error}");
    }

    fn on_back(&self, outcome: BackOutcome) {
        if outcome == BackOutcome::Intercepted {
            println!("Back navigation is disabled on this page.");
        }
    }
}

fn print_score(receipt: &SubmissionReceipt) {
    use comfy_table::{Cell, Table};

    let scores = &receipt.payload.scores;

    let mut summary = Table::new();
    summary.set_header(vec!["Section", "Score", "Max"]);
    summary.add_row(vec![
        Cell::new("Objective"),
        Cell::new(scores.objective),
        Cell::new(scores.objective_total),
    ]);
    summary.add_row(vec![
        Cell::new("Subjective"),
        Cell::new(format!("{:.1}", scores.subjective)),
        Cell::new(scores.subjective_scores.len() * 10),
    ]);
    summary.add_row(vec![
        Cell::new("Coding"),
        Cell::new(scores.coding),
        Cell::new(scores.coding_scores.len() * 10),
    ]);
    summary.add_row(vec![
        Cell::new("Total"),
        Cell::new(format!("{:.2}%", scores.percentage)),
        Cell::new(""),
    ]);
    println!("\n{summary}");

    if scores.questions.is_empty() {
        return;
    }
    let mut detail = Table::new();
    detail.set_header(vec!["Question", "Section", "Points", "Status"]);
    for grade in &scores.questions {
        let status = match &grade.status {
            GradeStatus::Correct => "correct".to_string(),
            GradeStatus::Incorrect => "incorrect".to_string(),
            GradeStatus::Evaluated => "evaluated".to_string(),
            GradeStatus::Unanswered => "unanswered".to_string(),
            GradeStatus::EvaluationFailed(reason) => format!("evaluation failed: {reason}"),
            GradeStatus::ExecutionFailed(reason) => format!("execution failed: {reason}"),
        };
        detail.add_row(vec![
            Cell::new(&grade.question_id),
            Cell::new(grade.section),
            Cell::new(format!("{}/{}", grade.points, grade.max_points)),
            Cell::new(status),
        ]);
    }
    println!("{detail}");
}

/// A parsed stdin line.
#[derive(Debug)]
enum Input {
    Command(SessionCommand),
    Help,
    Quit,
    Empty,
}

fn parse_command(line: &str, base_dir: &Path) -> Result<Input> {
    let line = line.trim();
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let command = match verb {
        "" => return Ok(Input::Empty),
        "help" | "?" => return Ok(Input::Help),
        "quit" | "exit" => return Ok(Input::Quit),
        "ready" => SessionCommand::Ready,
        "next" => SessionCommand::AdvanceSection,
        "submit" | "retry" => SessionCommand::Submit,
        "back" => SessionCommand::Back,
        "disqualify" => SessionCommand::Disqualify(rest.to_string()),
        "run" => {
            anyhow::ensure!(!rest.is_empty(), "usage: run <question>");
            SessionCommand::RunCode(rest.into())
        }
        "answer" => {
            let (question, text) = rest
                .split_once(char::is_whitespace)
                .context("usage: answer <question> <text>")?;
            SessionCommand::SetAnswer {
                question: question.into(),
                answer: Answer::Text(text.trim().to_string()),
            }
        }
        "code" => {
            let mut parts = rest.split_whitespace();
            let (Some(question), Some(language), Some(file)) =
                (parts.next(), parts.next(), parts.next())
            else {
                anyhow::bail!("usage: code <question> <js|py> <file>");
            };
            let language: CodeLanguage = language.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let path = base_dir.join(file);
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read code file: {}", path.display()))?;
            SessionCommand::SetAnswer {
                question: question.into(),
                answer: Answer::Code { source, language },
            }
        }
        other => anyhow::bail!("unknown command `{other}` (type `help`)"),
    };
    Ok(Input::Command(command))
}

async fn read_commands(tx: mpsc::Sender<SessionCommand>, base_dir: PathBuf) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("failed to read stdin: {e}");
                break;
            }
        };
        match parse_command(&line, &base_dir) {
            Ok(Input::Command(command)) => {
                if tx.send(command).await.is_err() {
                    break;
                }
            }
            Ok(Input::Help) => println!("{HELP}"),
            Ok(Input::Quit) => break,
            Ok(Input::Empty) => {}
            Err(e) => eprintln!("{e:#}"),
        }
    }
}

pub async fn execute(
    test_id: String,
    name: String,
    email: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let session_config = config.session_config();
    let observer = Arc::new(ConsoleObserver {
        readiness: session_config.readiness,
    });
    let student = StudentDetails {
        name,
        email,
        ..Default::default()
    };

    let controller = SessionController::new(
        test_id,
        student,
        create_services(&config),
        session_config,
        observer,
    );
    tracing::debug!(session_id = %controller.session_id(), "session created");

    let (tx, rx) = mpsc::channel(32);
    let base_dir = std::env::current_dir().context("failed to resolve working directory")?;
    tokio::spawn(read_commands(tx, base_dir));

    match controller.run(rx).await? {
        SessionOutcome::Submitted(receipt) => {
            println!("Session {} submitted at {}.", receipt.session_id, receipt.submitted_at);
        }
        SessionOutcome::Disqualified { reason } => {
            println!("Session ended: {reason}");
        }
        SessionOutcome::Abandoned { phase } => {
            println!("Session ended while {phase}; nothing was submitted.");
        }
    }

    Ok(())
}
