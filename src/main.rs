use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use resmon_service::{
    alert::{dispatcher::AlertDispatcher, thresholds::AlertPolicy},
    chat::{
        discord::DiscordClient,
        handler::CommandHandler,
        interactions::{InteractionState, InteractionVerifier},
    },
    config::Config,
    controller::SessionController,
    dev_mode::{MemorySessionStore, ScriptedReadings},
    ingest::{ReadingSource, SessionStore, provider::ProviderClient},
    logging::{Component, init_logging, install_panic_hook},
    scheduler::PollScheduler,
    server, verify,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::load()?;
    init_logging(&config.log_level, config.log_file.as_deref())?;
    install_panic_hook();

    let (source, store, provider_label) = build_backends(&config)?;

    if std::env::args().nth(1).as_deref() == Some("verify") {
        let report = verify::verify_provider(source.as_ref(), store.as_ref(), &provider_label).await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        verify::print_summary(&report);
        if report.status != verify::VerificationStatus::Success {
            std::process::exit(1);
        }
        return Ok(());
    }

    run_service(config, source, store).await
}

fn build_backends(
    config: &Config,
) -> Result<(Arc<dyn ReadingSource>, Arc<dyn SessionStore>, String), BoxError> {
    if let Some(rates) = &config.dev_readings {
        tracing::warn!(component = %Component::System, ?rates, "DEV_READINGS set: using scripted readings and an in-memory session store");
        return Ok((
            Arc::new(ScriptedReadings::new(rates)),
            Arc::new(MemorySessionStore::new()),
            "dev-readings".to_string(),
        ));
    }

    let provider = Arc::new(ProviderClient::new(
        &config.provider_base_url,
        config.request_timeout,
    )?);
    Ok((
        Arc::clone(&provider) as Arc<dyn ReadingSource>,
        provider as Arc<dyn SessionStore>,
        config.provider_base_url.clone(),
    ))
}

async fn run_service(
    config: Config,
    source: Arc<dyn ReadingSource>,
    store: Arc<dyn SessionStore>,
) -> Result<(), BoxError> {
    let policy = AlertPolicy::from_config(&config);
    tracing::info!(
        component = %Component::System,
        reservoir = %config.reservoir_name,
        alert_decrease = policy.alert_decrease,
        poll_minutes = config.poll_interval.as_secs() / 60,
        "starting reservoir monitor"
    );

    let controller = Arc::new(
        SessionController::new(source, Arc::clone(&store), policy)
            .with_stale_after(config.stale_after_minutes),
    );
    let discord = Arc::new(DiscordClient::new(
        config.discord.clone(),
        config.request_timeout,
    )?);

    let dispatcher = Arc::new(AlertDispatcher::new(
        Arc::clone(&discord) as _,
        store,
        policy,
        &config.reservoir_name,
        config.display_offset,
    ));
    let scheduler = Arc::new(PollScheduler::new(
        Arc::clone(&controller),
        dispatcher,
        config.poll_interval,
        config.display_offset,
    ));
    let handler = Arc::new(CommandHandler::new(
        controller,
        config.display_offset,
        config.poll_interval,
    ));

    let interactions = match config.discord.public_key.as_deref() {
        Some(public_key) if config.discord.interactions_enabled() => {
            Some(Arc::new(InteractionState {
                verifier: InteractionVerifier::from_hex(public_key)?,
                handler,
                replies: discord as _,
            }))
        }
        _ => {
            tracing::warn!(component = %Component::System, "DISCORD_APPLICATION_ID or DISCORD_PUBLIC_KEY missing: chat commands disabled");
            None
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    let http = tokio::spawn(server::serve(
        listener,
        server::router(interactions),
        cancel.clone(),
    ));

    scheduler.run(cancel.clone()).await;

    match http.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(component = %Component::System, error = %e, "HTTP listener failed"),
        Err(e) => tracing::error!(component = %Component::System, error = %e, "HTTP task aborted"),
    }
    tracing::info!(component = %Component::System, "shutdown complete");
    Ok(())
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(component = %Component::System, error = %e, "SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!(component = %Component::System, "shutdown requested");
    cancel.cancel();
}
