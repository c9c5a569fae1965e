use clap::Parser;

mod args;
use args::Args;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();
    ::log::info!("Starting clone of {}", args.url);

    let cloner = match args.into_cloner() {
        Ok(cloner) => cloner,
        Err(e) => {
            ::log::error!("Failed to load configuration: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    let start_time = std::time::Instant::now();
    match cloner.run().await {
        Ok(report) => {
            ::log::info!(
                "Clone finished in {:.2} seconds",
                start_time.elapsed().as_secs_f64()
            );
            for record in report.dangling() {
                ::log::warn!(
                    "Missing asset {} (referenced as {})",
                    record.remote_url,
                    record.local_relative_path
                );
            }
            println!("{}", report);
        }
        Err(e) => {
            ::log::error!("Cloning failed: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
