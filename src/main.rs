use tracing::error;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if let Err(error) = hospital_payments::observability::init_observability("payments") {
        eprintln!("Failed to initialize observability: {error}");
        std::process::exit(1);
    }

    if let Err(error) = hospital_payments::run().await {
        error!("Payments service exited with error: {:#}", error);
        std::process::exit(1);
    }
}
