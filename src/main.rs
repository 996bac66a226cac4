// TAO Social Server

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tao_social::{app_state::AppState, config::Config, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let address = config.server_address();

    let app_state = AppState::new(config).await?;
    let app = create_router(app_state);

    let listener = TcpListener::bind(&address).await?;
    info!("TAO Social server listening on http://{}", address);
    info!("  POST   /api/posts                 - Create post");
    info!("  GET    /api/posts                 - All posts");
    info!("  GET    /api/feed                  - Following feed");
    info!("  POST   /api/users/{{id}}/follow     - Follow/unfollow");
    info!("  GET    /api/users/{{username}}      - Profile");

    axum::serve(listener, app).await?;

    Ok(())
}
