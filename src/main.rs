use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tally::accumulator::Accumulator;
use tally::api;
use tally::rocksdb::RocksKvs;

#[derive(Parser)]
#[command(name = "tallyd")]
#[command(about = "Persistent streaming Merkle accumulator server")]
struct Args {
  /// Directory of the accumulator database
  #[arg(long, default_value = "accumulator.db")]
  db_dir: PathBuf,

  /// Address to listen on
  #[arg(long, default_value = "127.0.0.1:10000")]
  listen: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let args = Args::parse();

  tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

  let db = RocksKvs::open(&args.db_dir)?;
  let accumulator = Arc::new(Accumulator::open(db)?);
  info!(db_dir = %args.db_dir.display(), "accumulator recovered");

  let app = api::router(accumulator);
  let listener = tokio::net::TcpListener::bind(args.listen).await?;
  info!(listen = %args.listen, "serving");
  axum::serve(listener, app).await?;
  Ok(())
}
