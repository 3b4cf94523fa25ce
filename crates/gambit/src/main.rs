//! Standalone Gambit server binary.
//!
//! Runs with the development defaults: standard chess, Elo rating, an
//! in-memory recorder, and the guest authenticator. Log verbosity
//! follows `RUST_LOG`.

use gambit::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gambit=info".into()),
        )
        .init();

    let bind = std::env::var("GAMBIT_BIND")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let server = GambitServerBuilder::new()
        .bind(&bind)
        .build(GuestAuthenticator)
        .await?;

    tracing::info!(addr = %server.local_addr()?, "listening");
    server.run().await?;
    Ok(())
}
