use authgate::cli::{
    Args, build_auth_config, build_config, init_logging, load_jwt_secret, open_database,
};
use authgate::{init_cleanup, run_server};
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let auth = match build_auth_config(&args, jwt_secret) {
        Ok(auth) => auth,
        Err(e) => {
            error!(error = %e, "Invalid authentication configuration");
            std::process::exit(1);
        }
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    init_cleanup(&db).await;

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to read local address");
        std::process::exit(1);
    });

    let config = build_config(&args, db, auth);

    info!(address = %local_addr, issuer = %config.auth.issuer, "Listening");

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
