use serde_json::{Value, json};
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use toolgate_test_support::{EchoServer, write_json_file};

fn weather_config(base_url: &str) -> Value {
    json!({
        "apis": [{
            "name": "weather",
            "description": "Weather API",
            "baseUrl": base_url,
            "auth": { "type": "bearer", "token": "${WEATHER_TOKEN}" },
            "tools": [{
                "name": "getCurrent",
                "description": "Current weather for a city",
                "endpoint": "/current",
                "method": "GET",
                "parameters": [
                    { "name": "city", "type": "string", "required": true }
                ],
                "transform": {
                    "type": "json",
                    "template": "{{method}} {{path}}?{{query}} auth={{headers.authorization}}"
                }
            }]
        }]
    })
}

fn toolgate() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_toolgate"));
    for var in [
        "TOOLGATE_API_CONFIG",
        "TOOLGATE_API_CONFIG_REF",
        "TOOLGATE_CONFIG_FILE",
        "TOOLGATE_ALLOW_PRIVATE_NETWORKS",
        "TOOLGATE_ALLOWED_HOSTS",
        "TOOLGATE_LOG",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("WEATHER_TOKEN", "s3cret");
    cmd
}

async fn run(cmd: &mut Command) -> Output {
    cmd.output().await.expect("run toolgate")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

fn config_arg(path: &Path) -> String {
    path.display().to_string()
}

#[tokio::test]
async fn validate_prints_summary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_json_file(
        dir.path(),
        "apis.json",
        &weather_config("https://weather.example.com"),
    )
    .expect("write config");

    let out = run(toolgate().args(["--config", &config_arg(&path), "validate"])).await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("OK: 1 API(s), 1 tool(s)"), "{text}");
    assert!(text.contains("weatherGetCurrent  (GET https://weather.example.com /current)"), "{text}");
}

#[tokio::test]
async fn validate_rejects_private_base_url_by_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_json_file(dir.path(), "apis.json", &weather_config("http://127.0.0.1:9"))
        .expect("write config");

    let out = run(toolgate().args(["--config", &config_arg(&path), "validate"])).await;
    assert!(!out.status.success());
    assert!(stderr(&out).contains("unsafe baseUrl"), "{}", stderr(&out));
}

#[tokio::test]
async fn missing_config_source_is_reported() {
    let out = run(toolgate().arg("validate")).await;
    assert!(!out.status.success());
    assert!(stderr(&out).contains("TOOLGATE_API_CONFIG"), "{}", stderr(&out));
}

#[tokio::test]
async fn unset_placeholder_fails_startup() {
    let mut cmd = toolgate();
    cmd.env_remove("WEATHER_TOKEN").env(
        "TOOLGATE_API_CONFIG",
        weather_config("https://weather.example.com").to_string(),
    );
    let out = run(cmd.arg("validate")).await;
    assert!(!out.status.success());
    assert!(stderr(&out).contains("WEATHER_TOKEN"), "{}", stderr(&out));
}

#[tokio::test]
async fn list_prints_tools_as_json() {
    let mut cmd = toolgate();
    cmd.env(
        "TOOLGATE_API_CONFIG",
        weather_config("https://weather.example.com").to_string(),
    );
    let out = run(cmd.arg("list")).await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let tools: Value = serde_json::from_str(&stdout(&out)).expect("json");
    let tool = &tools[0];
    assert_eq!(tool["name"], "weatherGetCurrent");
    assert_eq!(tool["inputSchema"]["required"], json!(["city"]));
    assert_eq!(tool["annotations"]["readOnlyHint"], true);
}

#[tokio::test]
async fn call_invokes_the_api() {
    let server = EchoServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_json_file(dir.path(), "apis.json", &weather_config(server.base_url()))
        .expect("write config");

    let mut cmd = toolgate();
    cmd.env("TOOLGATE_ALLOW_PRIVATE_NETWORKS", "1").args([
        "--config",
        &config_arg(&path),
        "call",
        "weatherGetCurrent",
        "--args",
        r#"{"city":"Paris"}"#,
    ]);
    let out = run(&mut cmd).await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(
        stdout(&out).trim(),
        "GET /current?city=Paris auth=Bearer s3cret"
    );
}

#[tokio::test]
async fn call_reports_invalid_arguments() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_json_file(
        dir.path(),
        "apis.json",
        &weather_config("https://weather.example.com"),
    )
    .expect("write config");

    let out = run(toolgate().args([
        "--config",
        &config_arg(&path),
        "call",
        "weatherGetCurrent",
    ]))
    .await;
    assert!(!out.status.success());
    let err = stderr(&out);
    assert!(err.contains("Invalid arguments for tool 'weatherGetCurrent'"), "{err}");
    assert!(!err.contains("s3cret"));
}

#[tokio::test]
async fn import_openapi_writes_a_draft() {
    let dir = tempfile::tempdir().expect("tempdir");
    let spec = dir.path().join("spec.yaml");
    std::fs::write(
        &spec,
        r#"
openapi: "3.0.0"
info: { title: Weather, version: "1" }
servers: [{ url: "https://weather.example.com" }]
paths:
  /current:
    get:
      operationId: getCurrent
      parameters:
        - { name: city, in: query, required: true, schema: { type: string } }
      responses:
        "200":
          description: ok
          content:
            application/json:
              example: { temp: 21 }
"#,
    )
    .expect("write spec");
    let output = dir.path().join("draft.json");
    let previews = dir.path().join("previews.json");

    let out = run(toolgate().args([
        "import-openapi",
        &spec.display().to_string(),
        "--output",
        &output.display().to_string(),
        "--previews",
        &previews.display().to_string(),
    ]))
    .await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let draft: Value =
        serde_json::from_slice(&std::fs::read(&output).expect("read draft")).expect("json");
    assert_eq!(draft["apis"][0]["name"], "Weather");
    assert_eq!(draft["apis"][0]["tools"][0]["name"], "getCurrent");
    assert_eq!(draft["apis"][0]["tools"][0]["parameters"][0]["required"], true);

    let previews: Value =
        serde_json::from_slice(&std::fs::read(&previews).expect("read previews")).expect("json");
    assert_eq!(previews["getCurrent"], json!({ "temp": 21 }));

    // The draft is a valid config as-is.
    let out = run(toolgate().args(["--config", &output.display().to_string(), "validate"])).await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));
}
