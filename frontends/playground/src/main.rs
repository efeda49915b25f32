mod backend;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use blaze_core::{
    AuthAction, AuthOutcome, BlobGateway, CredentialGateway, DispatchOutcome, ErrorCallback,
    RawMutationRequest, SanitizingMutationGateway, StoreError, UploadRequest, Value, ValueCallback,
};
use blaze_rest::ProjectConfig;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use backend::{connect, Origin};

const USAGE: &str = "\
Usage: blaze-playground [--memory] <command>

Commands:
  demo                        Walk through every mutation against the in-memory backend
  mutate <json>               Run {\"path\", \"action\", \"data\", \"actionBy\"}
  auth <json>                 Run {\"action\": \"login\" | \"signup\" | \"logout\" | \"changePassword\", ...}
  upload <path> <file>        Upload a file to the blob store and list its folder
  convert-config <file>       Print a console config snippet as .env lines

Remote collaborators are used when NEXT_PUBLIC_FIREBASE_* / FIREBASE_* are set,
unless --memory is given.";

#[tokio::main]
async fn main() -> Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut memory_only = false;
    let mut positional = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--memory" | "-m" => memory_only = true,
            "--help" | "-h" => {
                println!("{USAGE}");
                return Ok(());
            }
            _ => positional.push(arg),
        }
    }

    let command = positional.first().map(String::as_str).unwrap_or("demo");
    let args = positional.get(1..).unwrap_or_default();

    match (command, args) {
        ("demo", _) => demo().await,
        ("mutate", [json]) => mutate(json, memory_only).await,
        ("auth", [json]) => auth(json, memory_only).await,
        ("upload", [path, file]) => upload(path, file, memory_only).await,
        ("convert-config", [file]) => convert_config(file),
        _ => bail!("{USAGE}"),
    }
}

fn print_value(label: &str, value: &Value) {
    println!("{label}: {}", value.to_json_string());
}

fn print_changes(path: &str) -> ValueCallback {
    let label = format!("onValue {path}");
    Arc::new(move |value: Value| print_value(&label, &value))
}

fn print_errors(path: &str) -> ErrorCallback {
    let path = path.to_string();
    Arc::new(move |err: StoreError| eprintln!("onValue {path} failed: {err}"))
}

async fn demo() -> Result<()> {
    let (connection, _) = connect(true)?;
    let gateway = SanitizingMutationGateway::new(connection);

    let subscription = gateway
        .subscribe("users", print_changes("users"), Some(print_errors("users")))
        .await?;

    gateway
        .create(
            "users/ann",
            Value::object([
                ("name", Value::from("Ann")),
                ("nickname", Value::Absent),
                ("tags", Value::Array(vec![Value::from("admin"), Value::Absent])),
            ]),
            Some("playground"),
        )
        .await?;
    gateway
        .update(
            "users/ann",
            Value::object([("name", Value::from("Ann B.")), ("age", Value::Absent)]),
            Some("playground"),
        )
        .await?;

    let key = gateway
        .create_with_id("users", Value::object([("name", Value::from("Bob"))]), None)
        .await?;
    println!("createWithId: {key}");

    print_value("get users", &gateway.get("users").await?);

    gateway.delete(&format!("users/{key}")).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    subscription.unsubscribe();
    Ok(())
}

async fn mutate(json: &str, memory_only: bool) -> Result<()> {
    let raw: RawMutationRequest =
        serde_json::from_str(json).context("mutation must be a JSON object")?;
    let (connection, origin) = connect(memory_only)?;
    let gateway = SanitizingMutationGateway::new(connection);

    let path = raw.path.clone();
    let outcome = gateway.dispatch_raw(raw, Some(print_changes(&path))).await?;

    match outcome {
        DispatchOutcome::Ack => println!("ok"),
        DispatchOutcome::GeneratedKey(key) => println!("key: {key}"),
        DispatchOutcome::Value(value) => print_value(&path, &value),
        DispatchOutcome::Subscription(handle) => {
            if origin == Origin::Memory {
                // Nothing else writes to a fresh in-memory store.
                tokio::time::sleep(Duration::from_millis(50)).await;
                handle.unsubscribe();
                return Ok(());
            }
            info!("Listening to '{}', press Ctrl-C to stop", handle.path());
            tokio::signal::ctrl_c().await?;
            handle.unsubscribe();
        }
    }
    Ok(())
}

async fn auth(json: &str, memory_only: bool) -> Result<()> {
    let action: AuthAction =
        serde_json::from_str(json).context("auth request must be a JSON object")?;
    let (connection, _) = connect(memory_only)?;
    let gateway = CredentialGateway::new(connection);

    match gateway.execute(action).await? {
        AuthOutcome::Credential(credential) => {
            println!("{}", serde_json::to_string_pretty(&credential)?)
        }
        AuthOutcome::Done => println!("ok"),
    }
    Ok(())
}

async fn upload(path: &str, file: &str, memory_only: bool) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {file}"))?;
    let (connection, _) = connect(memory_only)?;
    let gateway = BlobGateway::new(connection);

    let request = UploadRequest::new(path, bytes)
        .content_type("application/octet-stream")
        .by("playground");
    let result = gateway
        .upload(
            request,
            Some(Arc::new(|percent: f64| eprintln!("upload {percent:.0}%"))),
        )
        .await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    let folder = path.rsplit_once('/').map(|(folder, _)| folder).unwrap_or("");
    for listing in gateway.list(folder).await? {
        println!("{}", serde_json::to_string(&listing)?);
    }
    Ok(())
}

fn convert_config(file: &str) -> Result<()> {
    let snippet = std::fs::read_to_string(file).with_context(|| format!("Failed to read {file}"))?;
    let config = ProjectConfig::from_config_snippet(&snippet);
    if config.api_key.is_none() {
        bail!("No apiKey found in {file}");
    }
    println!("{}", config.to_env_file());
    Ok(())
}
