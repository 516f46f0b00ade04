use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::{json, Value};

use tally::hash::hash;

#[derive(Parser)]
#[command(name = "tallycli")]
#[command(about = "Command-line client for a tallyd accumulator server")]
struct Args {
  /// Accumulator server endpoint
  #[arg(long, default_value = "http://127.0.0.1:10000")]
  endpoint: String,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Append a hash (hex) to the log
  Append { hash: String },
  /// Get the hash stored under a transaction id
  Get { id: u64 },
  /// Get the earliest transaction id holding a hash (hex)
  Search { hash: String },
  /// Get the current digest of the accumulator
  Digest,
  /// Get a membership proof for a transaction by id or hash
  Proof {
    /// Transaction id, or transaction hash in hex
    query: String,
    /// Prove against this previously returned digest (hex) instead of the live one
    #[arg(long)]
    digest: Option<String>,
  },
  /// Register a file by appending its hash to the log
  Register { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let client = Client::new();
  let endpoint = args.endpoint.trim_end_matches('/');

  match args.command {
    Command::Append { hash } => {
      let url = format!("{endpoint}/v1/entries");
      let value = request(client.post(&url).json(&json!({ "hash": hash }))).await?;
      println!("Transaction ID: {}", value["id"]);
    }
    Command::Get { id } => {
      let url = format!("{endpoint}/v1/entries/{id}");
      let value = request(client.get(&url)).await?;
      println!("{}", value["hash"].as_str().unwrap_or_default());
    }
    Command::Search { hash } => {
      let url = format!("{endpoint}/v1/entries");
      let value = request(client.get(&url).query(&[("hash", hash)])).await?;
      println!("{}", value["id"]);
    }
    Command::Digest => {
      let url = format!("{endpoint}/v1/digest");
      let value = request(client.get(&url)).await?;
      println!("{}", value["digest"].as_str().unwrap_or_default());
    }
    Command::Proof { query, digest } => {
      let by_hash = matches!(hex::decode(&query), Ok(bytes) if bytes.len() == 32);
      let mut builder = if by_hash {
        client.get(format!("{endpoint}/v1/proof")).query(&[("hash", &query)])
      } else {
        let id: u64 = query.parse().map_err(|_| {
          anyhow::anyhow!("invalid input {query}, need a transaction id or a 32-byte hash in hex")
        })?;
        client.get(format!("{endpoint}/v1/proof/{id}"))
      };
      if let Some(digest) = digest {
        builder = builder.query(&[("digest", digest)]);
      }
      let value = request(builder).await?;
      println!("Hash: {}", value["target"].as_str().unwrap_or_default());
      println!("Digest: {}", value["digest"].as_str().unwrap_or_default());
      let copath: Vec<&str> =
        value["copath"].as_array().map(Vec::as_slice).unwrap_or_default().iter().filter_map(Value::as_str).collect();
      println!("HashPath: {copath:?}");
    }
    Command::Register { file } => {
      let bytes = std::fs::read(&file)?;
      let file_hash = hex::encode(hash(&bytes));
      println!("Hash: {file_hash}");
      let url = format!("{endpoint}/v1/entries");
      let value = request(client.post(&url).json(&json!({ "hash": file_hash }))).await?;
      println!("Transaction ID: {}", value["id"]);
    }
  }
  Ok(())
}

async fn request(builder: reqwest::RequestBuilder) -> Result<Value> {
  let response = builder.send().await?;
  let status = response.status();
  let body = response.text().await?;
  let value: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
  if !status.is_success() {
    match value["error"].as_str() {
      Some(message) => bail!("{message} ({status})"),
      None => bail!("request failed ({status})"),
    }
  }
  Ok(value)
}
