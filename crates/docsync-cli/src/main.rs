mod cli;

#[tokio::main]
async fn main() {
    let code = match cli::run_from_args().await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("docsync error: {:#}", err);
            cli::exit::FATAL
        }
    };
    std::process::exit(code);
}
