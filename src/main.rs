use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match stepwise_cli::cli::run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(2)
        }
    }
}
