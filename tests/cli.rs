use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::{contains, is_empty};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CODER_DESCRIPTION: &str = "You write terse code.";

fn personabot_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("personabot"));
    cmd.env_remove("PB_CONFIG")
        .env_remove("PB_PERSONA_FILE")
        .env_remove("PB_MODEL")
        .env_remove("PB_LOG")
        .env_remove("GEMINI_API_KEY")
        .env_remove("TOGETHER_API_KEY")
        .env_remove("TELEGRAM_BOT_TOKEN")
        .env("XDG_CONFIG_HOME", home)
        .current_dir(home);
    cmd
}

fn persona_file(dir: &TempDir) -> PathBuf {
    dir.path().join("personas.json")
}

fn parse_stdout_json(output: &[u8]) -> Value {
    let text = String::from_utf8(output.to_vec()).expect("stdout should be utf-8");
    serde_json::from_str(text.trim()).expect("stdout should contain valid JSON")
}

#[test]
fn persona_is_saved_and_listed() {
    let dir = TempDir::new().unwrap();
    let path = persona_file(&dir);

    personabot_cmd(dir.path())
        .arg("handle")
        .arg("--persona-file")
        .arg(&path)
        .args(["/persona [Coder] You write terse code.", "/persona"])
        .assert()
        .success()
        .stdout(contains("Persona 'coder' saved successfully!").and(contains("**>*coder*\n>You write terse code\\.\n>||")));

    let stored: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(stored, json!({ "coder": CODER_DESCRIPTION }));
}

#[test]
fn dry_run_ai_uses_persona_as_gemini_system_instruction() {
    let dir = TempDir::new().unwrap();
    let path = persona_file(&dir);
    fs::write(&path, json!({ "coder": CODER_DESCRIPTION }).to_string()).unwrap();

    let assert = personabot_cmd(dir.path())
        .arg("handle")
        .arg("--persona-file")
        .arg(&path)
        .args(["--dry-run", "/ai [coder] explain recursion"])
        .assert()
        .success();

    let body = parse_stdout_json(&assert.get_output().stdout);
    assert_eq!(body["dry_run"], Value::Bool(true));
    assert_eq!(body["provider"], "gemini");
    assert_eq!(body["model"], "gemini-2.0-flash-lite");
    assert_eq!(
        body["body"]["system_instruction"]["parts"][0]["text"],
        CODER_DESCRIPTION
    );
    assert_eq!(body["body"]["contents"][0]["parts"][0]["text"], "explain recursion");
}

#[test]
fn dry_run_together_model_sends_system_message() {
    let dir = TempDir::new().unwrap();
    let path = persona_file(&dir);

    let assert = personabot_cmd(dir.path())
        .arg("handle")
        .arg("--persona-file")
        .arg(&path)
        .args([
            "--dry-run",
            "--json",
            "/model meta-llama/Llama-3.3-70B-Instruct-Turbo",
            "/persona [coder] You write terse code.",
            "/ai [coder] explain recursion",
        ])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let replies: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect();
    assert_eq!(replies.len(), 3);
    assert_eq!(
        replies[0]["text"],
        "Model set to 'meta-llama/Llama-3.3-70B-Instruct-Turbo'."
    );
    assert_eq!(replies[2]["quote"], Value::Bool(true));

    let preview: Value = serde_json::from_str(replies[2]["text"].as_str().unwrap()).unwrap();
    assert_eq!(preview["provider"], "together");
    assert_eq!(
        preview["body"]["messages"],
        json!([
            { "role": "system", "content": CODER_DESCRIPTION },
            { "role": "user", "content": "explain recursion" }
        ])
    );
}

#[test]
fn rejected_model_keeps_previous_selection() {
    let dir = TempDir::new().unwrap();

    personabot_cmd(dir.path())
        .args(["handle", "/model nonexistent-id", "/model"])
        .assert()
        .success()
        .stdout(
            contains("Error: Model 'nonexistent-id' is not available.")
                .and(contains("*Current Model:*\n`gemini-2.0-flash-lite`")),
        );
}

#[test]
fn json_output_prints_null_for_ignored_messages() {
    let dir = TempDir::new().unwrap();

    let assert = personabot_cmd(dir.path())
        .args(["handle", "--json", "just chatting", "/start"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "null");
    let help: Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(help["parse_mode"], Value::Null);
    assert_eq!(help["quote"], Value::Bool(false));
    assert!(help["text"].as_str().unwrap().contains("/persona"));
}

#[test]
fn ignored_message_prints_nothing() {
    let dir = TempDir::new().unwrap();

    personabot_cmd(dir.path())
        .args(["handle", "hello there"])
        .assert()
        .success()
        .stdout(is_empty());
}

#[test]
fn ai_without_api_key_replies_with_error() {
    let dir = TempDir::new().unwrap();

    personabot_cmd(dir.path())
        .args(["handle", "/ai hello"])
        .assert()
        .success()
        .stdout(contains("Error: GEMINI_API_KEY is not set in the environment"));
}

#[test]
fn empty_ai_prompt_is_rejected() {
    let dir = TempDir::new().unwrap();

    personabot_cmd(dir.path())
        .args(["handle", "--dry-run", "/ai"])
        .assert()
        .success()
        .stdout(contains("Error: Please provide a message after /ai."));
}

#[test]
fn message_can_be_read_from_stdin() {
    let dir = TempDir::new().unwrap();

    personabot_cmd(dir.path())
        .arg("handle")
        .write_stdin("/model\n")
        .assert()
        .success()
        .stdout(contains("*Available Models:*").and(contains("`gemini-2.0-flash`")));
}

#[test]
fn malformed_persona_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = persona_file(&dir);
    fs::write(&path, "{oops").unwrap();

    personabot_cmd(dir.path())
        .arg("handle")
        .arg("--persona-file")
        .arg(&path)
        .arg("/persona")
        .assert()
        .failure()
        .stdout(is_empty())
        .stderr(contains("Failed to parse persona file"));
}

#[test]
fn unknown_startup_model_is_fatal() {
    let dir = TempDir::new().unwrap();

    personabot_cmd(dir.path())
        .args(["handle", "--model", "gpt-nonexistent", "/model"])
        .assert()
        .failure()
        .stderr(contains("Invalid model configuration").and(contains("gpt-nonexistent")));
}

#[test]
fn startup_model_from_env_is_used() {
    let dir = TempDir::new().unwrap();

    personabot_cmd(dir.path())
        .env("PB_MODEL", "gemini-2.0-flash")
        .args(["handle", "/model"])
        .assert()
        .success()
        .stdout(contains("*Current Model:*\n`gemini-2.0-flash`"));
}

#[test]
fn config_file_restricts_model_list() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("bot.toml");
    fs::write(
        &config_path,
        "default_model = \"local/model\"\n\n[[models]]\nid = \"local/model\"\nprovider = \"together\"\n",
    )
    .unwrap();

    personabot_cmd(dir.path())
        .arg("--config")
        .arg(&config_path)
        .args(["handle", "/model gemini-2.0-flash", "/model"])
        .assert()
        .success()
        .stdout(
            contains("Error: Model 'gemini-2.0-flash' is not available.")
                .and(contains("*Available Models:*\n`local/model`\n\n*Current Model:*\n`local/model`")),
        );
}

#[test]
fn config_check_reports_defaults_without_file() {
    let dir = TempDir::new().unwrap();

    personabot_cmd(dir.path())
        .args(["config", "check"])
        .assert()
        .success()
        .stdout(contains("config OK: built-in defaults"));
}

#[test]
fn config_check_reads_explicit_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("bot.toml");
    fs::write(&config_path, "persona_file = \"p.json\"\n").unwrap();

    personabot_cmd(dir.path())
        .env("PB_CONFIG", &config_path)
        .args(["config", "check"])
        .assert()
        .success()
        .stdout(contains("config OK:").and(contains("bot.toml")));
}

#[test]
fn config_check_missing_explicit_file_fails() {
    let dir = TempDir::new().unwrap();

    personabot_cmd(dir.path())
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .args(["config", "check"])
        .assert()
        .failure()
        .stderr(contains("Failed to read config file"));
}

#[test]
fn config_check_invalid_toml_fails() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("bad.toml");
    fs::write(&config_path, "[[models]\nid = \"x\"").unwrap();

    personabot_cmd(dir.path())
        .arg("--config")
        .arg(&config_path)
        .args(["config", "check"])
        .assert()
        .failure()
        .stderr(contains("Failed to parse config file"));
}

#[test]
fn config_check_rejects_unknown_provider() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("bot.toml");
    fs::write(&config_path, "[[models]]\nid = \"m\"\nprovider = \"openai\"\n").unwrap();

    personabot_cmd(dir.path())
        .arg("--config")
        .arg(&config_path)
        .args(["config", "check"])
        .assert()
        .failure()
        .stderr(contains("Invalid provider 'openai' for model 'm'"));
}

#[test]
fn run_requires_telegram_token() {
    let dir = TempDir::new().unwrap();

    personabot_cmd(dir.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(contains("TELEGRAM_BOT_TOKEN is not set in the environment"));
}

#[test]
fn version_prints_build_metadata() {
    let dir = TempDir::new().unwrap();

    personabot_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(contains(env!("CARGO_PKG_VERSION")).and(contains("built")));
}

#[test]
fn completion_bash_outputs_script() {
    let dir = TempDir::new().unwrap();

    personabot_cmd(dir.path())
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(contains("personabot"));
}

#[test]
fn help_mentions_examples() {
    let dir = TempDir::new().unwrap();

    personabot_cmd(dir.path())
        .args(["handle", "--help"])
        .assert()
        .success()
        .stdout(contains("Examples:").and(contains("--dry-run")));
}
