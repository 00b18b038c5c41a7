use bto_allocation_cli::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("bto-desk error: {err}");
        std::process::exit(1);
    }
}
