mod cli;

use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pfcpscope::capture;
use pfcpscope::config;
use pfcpscope::display::ConsolePresenter;
use pfcpscope::filter::FilterConfig;
use pfcpscope::pipeline::{self, reporter, Analyzer, IngestOptions, StatsAggregator};
use pfcpscope::report;

fn main() {
    let args = cli::Cli::parse();

    // Initialize tracing/logging
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(1);
        }
    };

    // Set up Ctrl-C handler
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
        eprintln!("\nInterrupt received, stopping capture...");
    }) {
        eprintln!("error: failed to set Ctrl-C handler: {}", err);
        std::process::exit(1);
    }

    if let Err(e) = run_capture(&config, &running) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

/// Open the socket, start the reporter, and ingest until stopped.
fn run_capture(
    config: &RuntimeConfig,
    running: &Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut socket = capture::engine::open_socket(&config.capture)?;

    println!("pfcpscope v{}", env!("CARGO_PKG_VERSION"));
    println!("Listening on udp {}", socket.local_addr());
    println!("Filter: {}", config.filter);
    if config.run.count > 0 {
        println!("Capturing {} messages...", config.run.count);
    } else {
        println!("Capturing PFCP messages (Ctrl-C to stop)...");
    }
    println!();

    let stats = StatsAggregator::new();

    let sinks = report::build_sinks(config.output.report_jsonl.as_deref());

    let interval = if config.stats.enabled {
        Some(Duration::from_secs(config.stats.interval_secs.max(1)))
    } else {
        None
    };
    let reporter = reporter::spawn(stats.clone(), interval, sinks)?;

    let mut analyzer = Analyzer::with_stats(config.filter.clone(), stats);
    let mut presenter = ConsolePresenter::new(config.display.clone());
    let options = IngestOptions {
        buffer_size: config.capture.buffer_size,
        max_messages: config.run.count,
    };

    let counters = pipeline::run(&mut analyzer, &mut socket, &mut presenter, running, &options);

    // Ingestion has returned; the final report now covers every message.
    reporter.finish();

    println!();
    println!("{}", "=".repeat(50));
    println!("Capture complete.");
    println!("  Datagrams received: {}", counters.received);
    println!("  Too short:          {}", counters.too_short);
    println!("  Filtered out:       {}", counters.rejected);
    println!("  Accepted:           {}", counters.accepted);
    if counters.recv_errors > 0 {
        println!("  Receive errors:     {}", counters.recv_errors);
    }
    println!("{}", "=".repeat(50));

    Ok(())
}

#[derive(Debug, Clone)]
struct RuntimeConfig {
    capture: config::CaptureConfig,
    filter: FilterConfig,
    display: config::DisplayConfig,
    stats: config::StatsConfig,
    run: config::RunConfig,
    output: config::OutputConfig,
}

fn load_config(args: &cli::Cli) -> Result<RuntimeConfig, config::ConfigError> {
    let base = match &args.config {
        Some(path) => config::Config::load(path)?,
        None => config::Config::default(),
    };

    let mut capture = base.capture.clone();
    let mut filter = base.filter.clone();
    let mut display = base.display.clone();
    let mut stats = base.stats.clone();
    let mut run = base.run.clone();
    let mut output = base.output.clone();

    if let Some(value) = &args.bind {
        capture.bind = value.clone();
    }
    if let Some(value) = args.port {
        capture.port = value;
    }
    if let Some(value) = args.timeout_ms {
        capture.timeout_ms = value;
    }
    if let Some(value) = &args.source_ip {
        filter.source_ip = Some(value.clone());
    }
    if let Some(value) = &args.dest_ip {
        filter.dest_ip = Some(value.clone());
    }
    if let Some(value) = &args.message_type {
        filter.message_type = Some(config::MessageTypeSetting::Text(value.clone()));
    }
    if let Some(value) = args.min_length {
        filter.min_length = value;
    }
    if let Some(value) = args.max_length {
        filter.max_length = value;
    }
    if let Some(value) = args.stats_interval_secs {
        stats.interval_secs = value;
    }
    if let Some(value) = args.count {
        run.count = value;
    }
    if let Some(value) = &args.report_jsonl {
        if value.as_os_str().is_empty() {
            output.report_jsonl = None;
        } else {
            output.report_jsonl = Some(value.clone());
        }
    }

    if args.compact {
        display.compact = true;
    }
    if args.no_hex {
        display.show_hex = false;
    }
    if args.no_raw {
        display.show_raw = false;
    }
    if args.no_details {
        display.show_details = false;
    }
    if args.quiet {
        display.quiet = true;
    }
    if args.no_stats {
        stats.enabled = false;
    }

    Ok(RuntimeConfig {
        capture,
        filter: FilterConfig::from_settings(&filter),
        display,
        stats,
        run,
        output,
    })
}
