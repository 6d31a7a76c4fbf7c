use crate::config::LoggingConfig;
use std::fs::OpenOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Level picked by `-v` repetitions, falling back to the configured level.
pub fn effective_level(config: &LoggingConfig, cli_verbose: u8) -> &str {
    match cli_verbose {
        0 => &config.level,
        1 => "debug",
        _ => "trace",
    }
}

/// `RUST_LOG` wins; otherwise every curia crate at the effective level plus module directives.
pub fn build_filter(config: &LoggingConfig, cli_verbose: u8) -> anyhow::Result<EnvFilter> {
    let level = effective_level(config, cli_verbose);
    let base = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        [
            "curia",
            "curia_node",
            "curia_types",
            "curia_ledger",
            "curia_review",
            "curia_settlement",
            "curia_arbitration",
        ]
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
    });

    let mut filter = EnvFilter::new(base);
    for (module, level) in &config.module_filters {
        filter = filter.add_directive(format!("{}={}", module, level).parse()?);
    }
    Ok(filter)
}

/// Initialize the logging system based on configuration
pub fn init_logging(config: &LoggingConfig, cli_verbose: u8) -> anyhow::Result<()> {
    let filter = build_filter(config, cli_verbose)?;
    let subscriber = tracing_subscriber::registry().with(filter);

    let file = match &config.file_output {
        Some(path) => Some(OpenOptions::new().create(true).append(true).open(path)?),
        None => None,
    };

    match config.format.as_str() {
        "json" => {
            let json_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_line_number(true)
                .with_file(true);
            match file {
                Some(file) => subscriber
                    .with(json_layer)
                    .with(fmt::layer().json().with_writer(file).with_ansi(false))
                    .init(),
                None => subscriber.with(json_layer).init(),
            }
        }
        "compact" => {
            let compact_layer = fmt::layer()
                .compact()
                .with_target(false)
                .with_line_number(false)
                .with_file(false);
            match file {
                Some(file) => subscriber
                    .with(compact_layer)
                    .with(fmt::layer().compact().with_writer(file).with_ansi(false))
                    .init(),
                None => subscriber.with(compact_layer).init(),
            }
        }
        _ => {
            // Source locations only when debugging
            let show_location = matches!(effective_level(config, cli_verbose), "debug" | "trace");
            let pretty_layer = fmt::layer()
                .with_target(show_location)
                .with_line_number(show_location)
                .with_file(show_location);
            match file {
                Some(file) => subscriber
                    .with(pretty_layer)
                    .with(fmt::layer().with_writer(file).with_ansi(false))
                    .init(),
                None => subscriber.with(pretty_layer).init(),
            }
        }
    }

    Ok(())
}
