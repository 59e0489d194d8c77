use autowa::{init_tracing, load_config, run_api_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = load_config()?;
    tracing::info!("starting autowa on {}:{}", config.server.host, config.server.port);

    run_api_server(config).await?;

    Ok(())
}
