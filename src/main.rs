use podrank::domain::Actor;
use podrank::{api, config::Config, db::init_db, LeagueService, Repository};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let service = Arc::new(LeagueService::new(repo, config.clone()));

    if config.decay_enabled {
        let sweep_service = service.clone();
        let interval = Duration::from_millis(config.decay_sweep_interval_ms.max(1_000) as u64);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let expired = sweep_service.expire_pending().await;
                if expired > 0 {
                    tracing::info!(expired, "staged submissions expired");
                }
                match sweep_service.run_decay_sweep(Actor::new("scheduler".into())).await {
                    Ok(Some(report)) => {
                        tracing::info!(
                            players = report.players,
                            steps = report.steps,
                            "decay sweep applied"
                        );
                    }
                    Ok(None) => {}
                    Err(e) => tracing::error!(error = %e, "decay sweep failed"),
                }
            }
        });
    }

    // Create router
    let app = api::create_router(api::AppState { service });

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
