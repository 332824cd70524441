#[tokio::main]
async fn main() {
    if let Err(error) = pomoplay::run().await {
        eprintln!("pomoplay failed to start: {error}");
        std::process::exit(1);
    }
}
