//! postwatch - Keyword and AI-assisted alerting on new Reddit submissions.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use postwatch::cli::{Cli, LogFormat};
use postwatch::config::{Config, RuntimeConfig};
use postwatch::error::ConfigError;
use postwatch::{
    Alert, AlertLevel, AlertRouter, ChannelRule, ChatCompletionClient, DestinationKind, HttpSink,
    MetricsServer, Pipeline, RedditFeed, RelevanceClassifier, StreamController,
    initialize_metrics, sample_submission,
};

/// Initialize the tracing subscriber with the specified log format.
fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    match format {
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_env_filter(filter)
                .init();
        }
    }
}

fn report_config_errors(errors: &[ConfigError], summary: &str) -> ! {
    for e in errors {
        error!(error = %e, "Configuration validation error");
    }
    error!(error_count = errors.len(), "{}", summary);
    std::process::exit(1);
}

fn print_summary(cli: &Cli, runtime_config: &RuntimeConfig) {
    println!("Configuration is valid: {}", cli.config.display());
    println!("  Reddit: {}", runtime_config.feed.base_url);
    println!(
        "  Subreddits: {} ({})",
        runtime_config.rules.len(),
        runtime_config.rules.channel_names().join(", ")
    );
    match &runtime_config.classifier {
        Some(classifier) => println!("  Classifier: {} at {}", classifier.model, classifier.url),
        None => println!("  Classifier: disabled"),
    }
    for level in AlertLevel::ALL {
        println!(
            "  Destinations ({}): {}",
            level,
            runtime_config.destinations.for_level(level).len()
        );
    }
    println!(
        "  Metrics: {} (port {})",
        if runtime_config.metrics.enabled {
            "enabled"
        } else {
            "disabled"
        },
        runtime_config.metrics.port
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_format);

    info!(config_path = %cli.config.display(), "Loading configuration");

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = %cli.config.display(), "Failed to load configuration");
            std::process::exit(1);
        }
    };

    info!("Validating configuration");
    if let Err(errors) = config.validate() {
        report_config_errors(&errors, "Configuration validation failed");
    }

    let runtime_config = match config.compile() {
        Ok(c) => c,
        Err(errors) => report_config_errors(&errors, "Configuration compilation failed"),
    };

    if cli.validate {
        print_summary(&cli, &runtime_config);
        return Ok(());
    }

    info!(config_path = %cli.config.display(), "postwatch starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    if cli.sample {
        return runtime.block_on(run_sample(runtime_config));
    }

    runtime.block_on(run(runtime_config))
}

fn build_pipeline(runtime_config: &RuntimeConfig) -> Result<Pipeline> {
    let sink = HttpSink::with_default_client()?;
    let router = AlertRouter::new(runtime_config.destinations.clone(), Arc::new(sink));

    let classifier = match &runtime_config.classifier {
        Some(settings) => {
            let backend = ChatCompletionClient::new(settings)?;
            info!(model = %backend.model(), endpoint = %settings.url, "Classifier enabled");
            Some(RelevanceClassifier::new(
                Arc::new(backend),
                settings.reasoning_delimiter.as_str(),
            ))
        }
        None => {
            info!("Classifier disabled, every match is notified");
            None
        }
    };

    Ok(Pipeline::new(runtime_config.rules.clone(), classifier, router))
}

/// Run the built-in sample post against a matching and a non-matching rule.
async fn run_sample(runtime_config: RuntimeConfig) -> Result<()> {
    let pipeline = build_pipeline(&runtime_config)?;
    let sample = sample_submission();

    for term in ["3090", "5090"] {
        let rule = ChannelRule::new(vec![term.to_string()], Vec::new());
        let outcome = pipeline.process_with_rule(&sample, &rule).await;
        println!("include [{}]: {}", term, outcome.as_str());
    }

    Ok(())
}

/// Main async entry point.
async fn run(runtime_config: RuntimeConfig) -> Result<()> {
    let cancel = CancellationToken::new();

    let metrics_handle = if runtime_config.metrics.enabled {
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
        let server = MetricsServer::with_ready_signal(runtime_config.metrics.port, ready_tx);
        let cancel_metrics = cancel.clone();
        info!(port = runtime_config.metrics.port, "Starting metrics server");
        let handle = tokio::spawn(async move {
            if let Err(e) = server.run(cancel_metrics).await {
                error!(error = %e, "Metrics server error");
            }
        });
        if tokio::time::timeout(Duration::from_secs(2), ready_rx).await.is_err() {
            warn!("Metrics recorder not ready, early metrics may be lost");
        }
        let destination_types: Vec<&'static str> =
            [DestinationKind::Ntfy, DestinationKind::Json, DestinationKind::Mattermost]
                .iter()
                .map(|k| k.as_str())
                .collect();
        initialize_metrics(runtime_config.rules.channel_names(), &destination_types);
        Some(handle)
    } else {
        info!("Metrics server disabled");
        None
    };

    let pipeline = build_pipeline(&runtime_config)?;

    let feed = RedditFeed::new(&runtime_config.feed)?;
    if let Err(errors) = feed
        .validate_channels(runtime_config.rules.channel_names())
        .await
    {
        for e in &errors {
            error!(error = %e, "Subreddit check failed");
        }
        cancel.cancel();
        return Err(anyhow::anyhow!("{} subreddit(s) do not exist", errors.len()));
    }

    let failures = pipeline.router().self_test().await;
    if !failures.is_empty() {
        for failure in &failures {
            error!(failure = %failure, "Self-test delivery failed");
        }
        if runtime_config.stream.self_test {
            cancel.cancel();
            return Err(anyhow::anyhow!(
                "self-test failed for {} destination(s)",
                failures.len()
            ));
        }
        warn!("Self-test failures ignored (stream.self_test is disabled)");
    }

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c signal");
            return;
        }
        info!("Received shutdown signal, initiating graceful shutdown");
        cancel_clone.cancel();
    });

    let router = pipeline.router().clone();
    let controller = StreamController::new(Arc::new(feed), pipeline, runtime_config.stream.backoff);
    let result = controller.run(cancel.clone()).await;

    cancel.cancel();
    if let Some(handle) = metrics_handle {
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    }

    match result {
        Ok(()) => {
            info!("postwatch shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Stream controller failed");
            router
                .route(&Alert::error(format!("postwatch stopped: {}", e)))
                .await;
            Err(anyhow::anyhow!("Stream controller failed: {}", e))
        }
    }
}
