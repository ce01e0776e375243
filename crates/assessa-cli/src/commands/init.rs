//! The `assessa init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("assessa.toml").exists() {
        println!("assessa.toml already exists, skipping.");
    } else {
        std::fs::write("assessa.toml", SAMPLE_CONFIG)?;
        println!("Created assessa.toml");
    }

    std::fs::create_dir_all("test-definitions")?;
    let example_path = std::path::Path::new("test-definitions/example.json");
    if example_path.exists() {
        println!("test-definitions/example.json already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_TEST)?;
        println!("Created test-definitions/example.json");
    }

    println!("\nNext steps:");
    println!("  1. Edit assessa.toml to point at your backend and code runner");
    println!("  2. Run: assessa validate --test test-definitions/example.json");
    println!("  3. Run: assessa take --test-id <id> --name <name> --email <email>");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# assessa configuration

backend_url = "http://localhost:5000"
executor_url = "https://api.codex.jaagrav.in"
request_timeout_secs = 30
default_language = "javascript"

[readiness]
# "signal": wait for `ready`; "warmup": start after warmup_secs
mode = "signal"
warmup_secs = 10
"#;

const EXAMPLE_TEST: &str = r#"{
  "_id": "example",
  "name": "Example Test",
  "duration": 15,
  "questions": [
    {
      "_id": "q1",
      "type": "objective",
      "question": "What is 2 + 2?",
      "options": ["3", "4", "5"],
      "answer": "4"
    },
    {
      "_id": "q2",
      "type": "subjective",
      "question": "Describe a bug you fixed recently."
    },
    {
      "_id": "q3",
      "type": "coding",
      "question": "Print the sum of 19 and 23.",
      "answer": "42"
    }
  ]
}
"#;
