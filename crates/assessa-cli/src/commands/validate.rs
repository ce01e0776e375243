//! The `assessa validate` command.

use std::path::PathBuf;

use anyhow::Result;

use assessa_core::model::Section;
use assessa_core::parser;

pub fn execute(test_path: PathBuf) -> Result<()> {
    let tests = if test_path.is_dir() {
        parser::load_test_directory(&test_path)?
    } else {
        vec![parser::load_test_file(&test_path)?]
    };

    let mut total_warnings = 0;

    for test in &tests {
        let counts: Vec<String> = Section::ORDER
            .iter()
            .map(|s| format!("{} {s}", test.questions_in(*s).len()))
            .collect();
        println!(
            "Test: {} ({} questions: {}, {} min)",
            test.name,
            test.questions.len(),
            counts.join(", "),
            test.duration
        );

        let warnings = parser::validate_test(test);
        for w in &warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All tests valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
