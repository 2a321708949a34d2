//! Flag-only client for the recbatch ingest API
//!
//! Operations:
//!   --operation presign  presign only (prints JSON; optionally --out presign.json)
//!   --operation upload   upload using a presign JSON (--presign-json); records blob refs
//!   --operation create   register recordings from an uploads JSON + --meta files
//!   --operation poll     poll a batch
//!   --operation demo     presign -> upload -> create -> poll
//!
//! For presign & demo, --files must line up with --meta (same count and
//! order) for create. For append, pass --batch-id to presign/demo; the
//! server returns the effective batch_id.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Operation {
    Presign,
    Upload,
    Create,
    Poll,
    Demo,
}

#[derive(Parser, Debug)]
#[command(name = "recbatch-client", about = "Flag-only client for the recbatch ingest API")]
struct Cli {
    #[arg(long, value_enum)]
    operation: Operation,

    #[arg(long, default_value = "http://127.0.0.1:5741")]
    base_url: String,

    #[arg(long, default_value = "test_12345")]
    api_key: String,

    /// Audio files to upload (presign, upload, demo)
    #[arg(long, num_args = 1..)]
    files: Vec<PathBuf>,

    /// Metadata JSON files, one per uploaded file (create, demo)
    #[arg(long, num_args = 1..)]
    meta: Vec<PathBuf>,

    /// Existing batch to append to (presign, demo) or to poll
    #[arg(long)]
    batch_id: Option<String>,

    /// Write the operation's JSON result to this file
    #[arg(long)]
    out: Option<PathBuf>,

    /// Presign JSON produced by a previous presign step (upload)
    #[arg(long)]
    presign_json: Option<PathBuf>,

    /// Uploads JSON produced by a previous upload step (create)
    #[arg(long)]
    uploads_json: Option<PathBuf>,
}

fn pretty(title: &str, value: &Value) {
    println!("\n=== {} ===", title);
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn guess_content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("flac") => "audio/flac",
        _ => "application/octet-stream",
    }
}

fn load_json_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Read {} failed", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Parse {} failed", path.display()))
}

fn write_out(out: Option<&Path>, value: &Value) -> Result<()> {
    if let Some(path) = out {
        std::fs::write(path, serde_json::to_string_pretty(value)?)
            .with_context(|| format!("Write {} failed", path.display()))?;
        println!("[out] wrote {}", path.display());
    }
    Ok(())
}

async fn check(response: reqwest::Response, step: &str) -> Result<Value> {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        bail!("[{}] HTTP {}: {}", step, status.as_u16(), text);
    }
    if text.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

async fn api_presign(
    client: &reqwest::Client,
    cli: &Cli,
    files: &[PathBuf],
    batch_id: Option<&str>,
) -> Result<Value> {
    let items: Vec<Value> = files
        .iter()
        .map(|p| {
            json!({
                "filename": p.file_name().and_then(|n| n.to_str()).unwrap_or("upload.bin"),
                "contentType": guess_content_type(p),
            })
        })
        .collect();
    let mut payload = json!({ "items": items });
    if let Some(id) = batch_id {
        payload["batch_id"] = json!(id);
    }

    let response = client
        .post(format!("{}/uploads/presign", cli.base_url.trim_end_matches('/')))
        .header("X-API-Key", &cli.api_key)
        .json(&payload)
        .send()
        .await?;
    let data = check(response, "presign").await?;
    pretty("presign response", &data);
    Ok(data)
}

/// PUT each file against its presigned slot; returns an uploads document
/// carrying the content-derived blob refs
async fn do_uploads(client: &reqwest::Client, presign: &Value, files: &[PathBuf]) -> Result<Value> {
    let items = presign["items"]
        .as_array()
        .context("presign JSON has no items array")?;
    if items.len() != files.len() {
        bail!("Presign items count does not match provided --files.");
    }

    let mut uploaded = Vec::with_capacity(files.len());
    for (slot, file_path) in items.iter().zip(files) {
        let upload_url = slot["upload_url"]
            .as_str()
            .context("presign item has no upload_url")?;
        let content_type = slot["required_headers"]["Content-Type"]
            .as_str()
            .map(|s| s.to_string())
            .unwrap_or_else(|| guess_content_type(file_path).to_string());

        let bytes = std::fs::read(file_path)
            .with_context(|| format!("Read {} failed", file_path.display()))?;
        let byte_count = bytes.len();

        let response = client
            .put(upload_url)
            .header("Content-Type", &content_type)
            .body(bytes)
            .send()
            .await?;
        let ack = check(response, "upload").await?;

        println!(
            "[upload] OK -> {} ({} bytes) blob_ref={}",
            file_path.display(),
            byte_count,
            ack["blob_ref"].as_str().unwrap_or("?")
        );
        uploaded.push(json!({
            "upload_id": slot["upload_id"],
            "blob_ref": ack["blob_ref"],
        }));
    }

    Ok(json!({
        "batch_id": presign["batch_id"],
        "items": uploaded,
    }))
}

async fn api_create(
    client: &reqwest::Client,
    cli: &Cli,
    uploads: &Value,
    metas: &[PathBuf],
) -> Result<Value> {
    let items = uploads["items"]
        .as_array()
        .context("uploads JSON has no items array")?;
    if items.len() != metas.len() {
        bail!("Uploaded items count does not match provided --meta count.");
    }

    let mut manifest = Vec::with_capacity(metas.len());
    for (item, meta_path) in items.iter().zip(metas) {
        manifest.push(json!({
            "blob_ref": item["blob_ref"],
            "metadata": load_json_file(meta_path)?,
        }));
    }

    let payload = json!({
        "batch_id": uploads["batch_id"],
        "items": manifest,
    });

    let response = client
        .post(format!("{}/recordings", cli.base_url.trim_end_matches('/')))
        .header("X-API-Key", &cli.api_key)
        .json(&payload)
        .send()
        .await?;
    let data = check(response, "create").await?;
    pretty("recordings response", &data);
    Ok(data)
}

async fn api_poll(client: &reqwest::Client, cli: &Cli, batch_id: &str) -> Result<Value> {
    let response = client
        .get(format!(
            "{}/batches/{}",
            cli.base_url.trim_end_matches('/'),
            batch_id
        ))
        .header("X-API-Key", &cli.api_key)
        .send()
        .await?;
    let data = check(response, "poll").await?;
    pretty("batch status", &data);
    Ok(data)
}

fn require_files(cli: &Cli) -> Result<&[PathBuf]> {
    if cli.files.is_empty() {
        bail!("--files is required for this operation");
    }
    for path in &cli.files {
        if !path.exists() {
            bail!("File not found: {}", path.display());
        }
    }
    Ok(&cli.files)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.operation {
        Operation::Presign => {
            let files = require_files(&cli)?;
            let presign = api_presign(&client, &cli, files, cli.batch_id.as_deref()).await?;
            write_out(cli.out.as_deref(), &presign)?;
        }
        Operation::Upload => {
            let files = require_files(&cli)?;
            let presign_path = cli
                .presign_json
                .as_deref()
                .context("--presign-json is required for upload")?;
            let presign = load_json_file(presign_path)?;
            let uploads = do_uploads(&client, &presign, files).await?;
            pretty("uploads", &uploads);
            write_out(cli.out.as_deref(), &uploads)?;
        }
        Operation::Create => {
            let uploads_path = cli
                .uploads_json
                .as_deref()
                .context("--uploads-json is required for create")?;
            let uploads = load_json_file(uploads_path)?;
            let created = api_create(&client, &cli, &uploads, &cli.meta).await?;
            write_out(cli.out.as_deref(), &created)?;
        }
        Operation::Poll => {
            let batch_id = cli
                .batch_id
                .as_deref()
                .context("--batch-id is required for poll")?;
            let polled = api_poll(&client, &cli, batch_id).await?;
            write_out(cli.out.as_deref(), &polled)?;
        }
        Operation::Demo => {
            let files = require_files(&cli)?;
            if cli.meta.len() != files.len() {
                bail!("--meta must line up with --files for demo");
            }
            let presign = api_presign(&client, &cli, files, cli.batch_id.as_deref()).await?;
            let uploads = do_uploads(&client, &presign, files).await?;
            let created = api_create(&client, &cli, &uploads, &cli.meta).await?;
            let batch_id = created["batch_id"]
                .as_str()
                .context("create response has no batch_id")?
                .to_string();
            let polled = api_poll(&client, &cli, &batch_id).await?;
            write_out(cli.out.as_deref(), &polled)?;
        }
    }

    Ok(())
}
