mod cli;
mod infra;
mod interactive;
mod routes;
mod server;

use lead_agent::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
