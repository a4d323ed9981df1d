//! podscope binary.

mod cli;
mod commands;
mod context;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    cli::run().await
}
