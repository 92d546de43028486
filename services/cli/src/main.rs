use lead_agent_cli::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("lead-agent: {err}");
        std::process::exit(1);
    }
}
