use std::io::Write;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

const DRY_ENV: &str = "ENGAGE_CLI_DRY_RUN";

const CONFIG: &str = r#"
notifications:
  key_id: key-1
  secret: secret-1
  project_id: P
  integration_id: int-1
  from_email: noreply@shop.test
  from_name: Shop
  template_mappings:
    order-placed: tmpl_1
  campaign_mappings:
    order-placed: Order Campaign
"#;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn cli_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_engage"));
    cmd.env(DRY_ENV, "1").env("RUST_LOG", "warn");
    cmd
}

fn run(args: &[&str]) -> Output {
    cli_cmd().args(args).output().expect("run engage CLI")
}

fn run_and_capture(args: &[&str]) -> String {
    let output = run(args);
    if !output.status.success() {
        panic!(
            "CLI command {:?} failed: status={:?}\nstdout={}\nstderr={}",
            args,
            output.status,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn validate_prints_summary() {
    let config = write_temp(CONFIG);
    let stdout = run_and_capture(&["--config", config.path().to_str().unwrap(), "validate"]);
    assert!(stdout.contains("Configuration ok"), "{stdout}");
    assert!(
        stdout.contains("order-placed -> tmpl_1 (Order Campaign)"),
        "{stdout}"
    );
    assert!(stdout.contains("SMS sends will fail"), "{stdout}");
}

#[test]
fn validate_reports_missing_field() {
    let config = write_temp("notifications:\n  key_id: key-1\n");
    let output = run(&["--config", config.path().to_str().unwrap(), "validate"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Secret is required in the provider's options."),
        "{stderr}"
    );
}

#[test]
fn validate_ignores_unusable_api_base() {
    let config = write_temp(&format!("{CONFIG}  api_base: not a url\n"));
    let output = cli_cmd()
        .env_remove(DRY_ENV)
        .args(["--config", config.path().to_str().unwrap(), "validate"])
        .output()
        .expect("run engage CLI");
    assert!(output.status.success(), "{output:?}");
    assert!(String::from_utf8_lossy(&output.stdout).contains("Configuration ok"));

    let config = write_temp("notifications:\n  key_id: key-1\n  api_base: not a url\n");
    let output = cli_cmd()
        .env_remove(DRY_ENV)
        .args(["--config", config.path().to_str().unwrap(), "validate"])
        .output()
        .expect("run engage CLI");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Secret is required"), "{stderr}");
}

#[test]
fn send_dry_run_prints_email_request() {
    let config = write_temp(CONFIG);
    let stdout = run_and_capture(&[
        "--config",
        config.path().to_str().unwrap(),
        "send",
        "--to",
        "a@b.com",
        "--template",
        "order-placed",
        "--data",
        r#"{"n":"1"}"#,
    ]);
    assert!(stdout.contains(r#"{"id":"dry-run"}"#), "{stdout}");
    assert!(
        stdout.contains("dry-run: POST /email/v2/projects/P/sync"),
        "{stdout}"
    );
    assert!(stdout.contains(r#""template_id":"tmpl_1""#), "{stdout}");
    assert!(stdout.contains(r#""registered":"a@b.com""#), "{stdout}");
}

#[test]
fn send_unmapped_template_is_skipped() {
    let config = write_temp(CONFIG);
    let stdout = run_and_capture(&[
        "--config",
        config.path().to_str().unwrap(),
        "send",
        "--to",
        "a@b.com",
        "--template",
        "T",
    ]);
    assert!(stdout.contains("{}"), "{stdout}");
    assert!(!stdout.contains("dry-run: POST"), "{stdout}");
}

#[test]
fn track_dry_run_with_typed_actor() {
    let config = write_temp(CONFIG);
    let stdout = run_and_capture(&[
        "--config",
        config.path().to_str().unwrap(),
        "track",
        "--event",
        "x",
        "--actor",
        "u1",
        "--actor-type",
        "registered",
    ]);
    assert!(stdout.contains("tracked x"), "{stdout}");
    assert!(
        stdout.contains("dry-run: POST /track/v2/projects/P/customers/events"),
        "{stdout}"
    );
    assert!(
        stdout.contains(r#""customer_ids":{"id":"u1","type":"registered"}"#),
        "{stdout}"
    );
}

#[test]
fn track_without_actor_sends_nothing() {
    let config = write_temp(CONFIG);
    let stdout = run_and_capture(&[
        "--config",
        config.path().to_str().unwrap(),
        "track",
        "--event",
        "x",
    ]);
    assert!(stdout.contains("skipped x"), "{stdout}");
    assert!(!stdout.contains("dry-run: POST"), "{stdout}");
}

#[test]
fn dispatch_replays_order_fixture() {
    let config = write_temp(CONFIG);
    let fixtures = write_temp(
        r#"{
  "orders": [{
    "id": "order_1",
    "display_id": 1001,
    "customer": {"id": "cus_1", "email": "ada@shop.test", "first_name": "Ada"},
    "items": [{"id": "li_1", "quantity": 1, "unit_price": 20.0}]
  }]
}"#,
    );
    let stdout = run_and_capture(&[
        "--config",
        config.path().to_str().unwrap(),
        "dispatch",
        "--event",
        "order.placed",
        "--id",
        "order_1",
        "--fixtures",
        fixtures.path().to_str().unwrap(),
    ]);
    assert!(stdout.contains("notification : completed"), "{stdout}");
    assert!(stdout.contains("tracking     : completed"), "{stdout}");
    assert!(stdout.contains("/email/v2/projects/P/sync"), "{stdout}");
    assert!(stdout.contains(r#""event_type":"order_placed""#), "{stdout}");
}

#[test]
fn dispatch_rejects_unknown_event() {
    let config = write_temp(CONFIG);
    let fixtures = write_temp("{}");
    let output = run(&[
        "--config",
        config.path().to_str().unwrap(),
        "dispatch",
        "--event",
        "order.canceled",
        "--id",
        "order_1",
        "--fixtures",
        fixtures.path().to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not handled"));
}
