use clap::Parser;
use std::process;
use strata_cli::cli::{self, Cli};
use strata_logger::log;
use strata_logger::LogSeverity::{Debug, Error};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    log("Strata init".to_owned(), Debug);

    match cli::run(cli).await {
        Ok(output) => print!("{}", output),
        Err(e) => {
            log(e.to_string(), Error);
            process::exit(1);
        }
    }
}
