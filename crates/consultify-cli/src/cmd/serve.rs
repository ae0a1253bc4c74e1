use crate::settings::Settings;
use anyhow::Context;

pub fn run(settings: &Settings, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = settings.load_config()?;
    if let Some(port) = port {
        config.server.port = port;
    }

    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    rt.block_on(async move {
        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let local = listener.local_addr()?;
        eprintln!("Consultify listening on http://{local}");

        tokio::select! {
            result = consultify_server::serve_on(config, listener) => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
