//! Wire the bot, the queue and the media tools together and run until
//! Ctrl-C or a polling conflict.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    anyhow::{Context, bail},
    linkdrop_config::{LinkdropConfig, SitePolicy, validate::Severity},
    linkdrop_media::{Ffmpeg, YtDlp},
    linkdrop_metrics::MetricsRecorderConfig,
    linkdrop_queue::{
        AdmissionFilter, AdmissionService, ConcurrencyLimit, Dispatcher, PipelineRunner,
        PipelineSettings, QueueStore, ResultNotifier, WorkerPool,
    },
    linkdrop_telegram::{BotState, TelegramOutbound},
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
};

pub async fn run(config: LinkdropConfig) -> anyhow::Result<()> {
    let report = linkdrop_config::validate(&config);
    for d in &report.diagnostics {
        match d.severity {
            Severity::Error => error!(path = %d.path, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
            Severity::Info => info!(path = %d.path, "{}", d.message),
        }
    }
    if report.has_errors() {
        bail!(
            "configuration has {} error(s); run `linkdrop check-config` for details",
            report.count(Severity::Error)
        );
    }

    std::fs::create_dir_all(&config.pipeline.tmp_dir).with_context(|| {
        format!(
            "failed to create scratch directory {}",
            config.pipeline.tmp_dir.display()
        )
    })?;

    let policy = SitePolicy::load(&config.policy)?;

    let listen = if config.metrics.enabled {
        Some(config.metrics.bind.parse::<SocketAddr>()?)
    } else {
        None
    };
    linkdrop_metrics::init_metrics(MetricsRecorderConfig { listen })?;

    let connected = linkdrop_telegram::connect(&config.telegram).await?;

    let transport = Arc::new(TelegramOutbound::new(
        connected.bot.clone(),
        config.telegram.reply_to_message,
    ));
    let notifier = ResultNotifier::new(transport);
    let store = Arc::new(QueueStore::new());

    let filter = AdmissionFilter::new(policy, &config.policy.audio_flag)?;
    let admission = AdmissionService::new(filter, Arc::clone(&store), notifier.clone());

    let runner = PipelineRunner::new(
        Arc::new(YtDlp::new(config.extractor.clone())),
        Arc::new(Ffmpeg::new(config.transcoder.clone())),
        notifier.clone(),
        PipelineSettings::from_config(&config.pipeline),
    );
    let pool = WorkerPool::new(ConcurrencyLimit::from_max_in_flight(
        config.queue.max_in_flight,
    ));
    let dispatcher = Dispatcher::new(
        Arc::clone(&store),
        Arc::new(runner),
        pool.clone(),
        Duration::from_millis(config.queue.dispatch_interval_ms),
    );

    let state = Arc::new(BotState {
        bot: connected.bot,
        bot_username: connected.username,
        admission,
        notifier,
        poll_timeout_secs: config.telegram.poll_timeout_secs,
    });

    let cancel = CancellationToken::new();
    let polling = linkdrop_telegram::spawn_polling(state, cancel.clone());
    let dispatch = {
        let cancel = cancel.clone();
        tokio::spawn(async move { dispatcher.run(cancel).await })
    };

    info!(
        max_in_flight = config.queue.max_in_flight,
        interval_ms = config.queue.dispatch_interval_ms,
        tmp_dir = %config.pipeline.tmp_dir.display(),
        "linkdrop is running"
    );

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutdown requested");
        },
        () = cancel.cancelled() => {
            warn!("polling stopped, shutting down");
        },
    }
    cancel.cancel();

    if let Err(e) = polling.await {
        warn!(error = %e, "polling task ended abnormally");
    }
    if let Err(e) = dispatch.await {
        warn!(error = %e, "dispatcher task ended abnormally");
    }

    let grace = Duration::from_secs(config.queue.shutdown_grace_secs);
    if pool.shutdown(grace).await {
        info!("all jobs finished");
    }
    Ok(())
}
