mod aggregate;
mod errors;
mod netinfo;
mod orchestrator;
mod progress;
mod results;
mod sampler;
mod scoring;
mod stats;
mod tui;

use std::io::IsTerminal;

use clap::Parser;
use colored::Colorize;
use log::{info, warn};
use tokio::sync::mpsc;

use crate::errors::{exit_codes, DiagError};
use crate::netinfo::NetworkInfoProvider;
use crate::orchestrator::{Orchestrator, TestRun, TestState};
use crate::progress::ProgressSource;
use crate::results::DiagnosticReport;
use crate::sampler::real::HttpSampler;
use crate::sampler::simulated::SimulatedSampler;
use crate::sampler::{
    CancelToken, SampleGenerator, SizeClass, StreamQuality,
};
use crate::tui::{DisplayMode, TuiController};

/// Diagnose your internet connection: latency, throughput, stability, and
/// what your link is actually good for.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output the full report as JSON
    #[arg(long)]
    json: bool,

    /// Time actual HTTP transfers instead of simulating them
    #[arg(long)]
    real: bool,

    /// Transfer size tier for the download and upload phases
    #[arg(long, value_enum, default_value_t = SizeClass::Medium)]
    size: SizeClass,

    /// Also run a streaming benchmark at this quality (480p, 720p, 1080p, 4K)
    #[arg(long, value_name = "QUALITY")]
    streaming: Option<StreamQuality>,

    /// Also run a sustained throughput benchmark for this many seconds
    #[arg(long, value_name = "SECONDS")]
    throughput: Option<u64>,

    /// Skip the public network identity lookup
    #[arg(long)]
    no_netinfo: bool,

    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity<clap_verbosity_flag::WarnLevel>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbosity.log_level_filter())
        .init();

    let mode =
        DisplayMode::detect(cli.json, std::io::stdout().is_terminal());

    let code = match run(cli, mode).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{} {}", "error:".bold().red(), error);
            if let Some(suggestion) = error.suggestion() {
                eprintln!("{} {}", "hint:".bold().yellow(), suggestion);
            }
            error.exit_code()
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli, mode: DisplayMode) -> Result<i32, DiagError> {
    let cancel = CancelToken::new();
    spawn_signal_handler(cancel.clone());

    let network = if cli.no_netinfo {
        None
    } else {
        let client = reqwest::Client::new();
        match NetworkInfoProvider::new(client).fetch().await {
            Ok(info) => Some(info),
            Err(error) => {
                // The dashboard works without an identity lookup; the
                // report just omits the network section.
                warn!("network info lookup failed: {}", error);
                None
            }
        }
    };

    let run = if cli.real {
        let sampler = HttpSampler::new()?;
        execute_run(sampler, &cli, mode, &network, &cancel).await?
    } else {
        execute_run(SimulatedSampler::new(), &cli, mode, &network, &cancel)
            .await?
    };

    // The streaming and throughput benchmarks are artificial-delay only;
    // they characterize the link shape, not a second real transfer.
    let benchmarks = SimulatedSampler::new();
    let mut report = DiagnosticReport::new(&run, network);

    if let Some(quality) = cli.streaming {
        info!("running streaming benchmark at {}", quality);
        let samples =
            benchmarks.stream_chunks(quality, None, &cancel).await?;
        report = report
            .with_streaming(aggregate::aggregate_streaming(quality, &samples));
    }

    if let Some(seconds) = cli.throughput {
        if seconds == 0 {
            return Err(DiagError::invalid_input(
                "duration",
                "throughput duration must be at least 1 second",
            ));
        }
        info!("running throughput benchmark for {}s", seconds);
        let samples = benchmarks
            .throughput_intervals(
                std::time::Duration::from_secs(seconds),
                &cancel,
            )
            .await?;
        report =
            report.with_throughput(aggregate::aggregate_throughput(&samples));
    }

    match mode {
        DisplayMode::Json => {
            let json = serde_json::to_string_pretty(&report).map_err(|e| {
                DiagError::unexpected(format!("serializing report: {}", e))
            })?;
            println!("{}", json);
        }
        _ => print_summary(&report),
    }

    Ok(match report.state {
        TestState::Completed if report.failures.is_empty() => {
            exit_codes::SUCCESS
        }
        TestState::Completed => exit_codes::PARTIAL_FAILURE,
        _ => exit_codes::NETWORK_ERROR,
    })
}

/// Drive one full test run with the given sampler, rendering the live
/// dashboard when the mode calls for it.
async fn execute_run<S: SampleGenerator>(
    sampler: S,
    cli: &Cli,
    mode: DisplayMode,
    network: &Option<netinfo::NetworkInfo>,
    cancel: &CancelToken,
) -> Result<TestRun, DiagError> {
    // Simulated runs keep the reference's cosmetic ticker; real transfers
    // report true bytes-so-far, so their progress is tied to chunks.
    let source = if cli.real {
        ProgressSource::Chunks
    } else {
        ProgressSource::Timer
    };

    let mut orchestrator =
        Orchestrator::new(sampler, cli.size).with_progress_source(source);

    if mode == DisplayMode::Tui {
        let server_label = {
            let server = &orchestrator.run().server;
            format!("{} ({})", server.name, server.location)
        };
        let mut controller = TuiController::new(mode, server_label);
        if let Some(info) = network {
            controller
                .set_network_label(format!("{} ({})", info.isp, info.ip));
        }
        controller.init().map_err(|e| {
            DiagError::unexpected(format!("terminal setup failed: {}", e))
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (outcome, display) = tokio::join!(
            orchestrator.start(Some(tx), cancel),
            controller.run(rx, cancel),
        );
        controller.cleanup().map_err(|e| {
            DiagError::unexpected(format!("terminal restore failed: {}", e))
        })?;
        if let Err(error) = display {
            warn!("dashboard rendering failed: {}", error);
        }
        let run = outcome?.clone();
        Ok(run)
    } else {
        let run = orchestrator.start(None, cancel).await?.clone();
        Ok(run)
    }
}

fn spawn_signal_handler(cancel: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
}

fn print_summary(report: &DiagnosticReport) {
    println!(
        "{} {} {}",
        "Server:".bold().white(),
        report.server.name.bright_blue(),
        format!("({})", report.server.location).bright_blue()
    );

    if let Some(ref network) = report.network {
        println!(
            "{} {} {}",
            "Your IP:".bold().white(),
            network.ip.bright_blue(),
            format!("({}, {})", network.city, network.country).bright_blue()
        );
        println!("{} {}", "ISP:".bold().white(), network.isp.bright_blue());
        println!(
            "{} {} ({})",
            "DNS:".bold().white(),
            network.dns.resolver,
            network.dns.response_time
        );
    }

    println!(
        "{} {} ms {}",
        "Ping:".bold().white(),
        report.ping.value,
        report
            .ping
            .jitter_ms
            .map(|j| format!("(jitter {} ms)", j))
            .unwrap_or_default()
    );
    println!(
        "{} {}",
        "Download:".bold().white(),
        format!("{:.2} Mbps", report.download.value).bright_cyan()
    );
    println!(
        "{} {}",
        "Upload:".bold().white(),
        format!("{:.2} Mbps", report.upload.value).bright_cyan()
    );

    for failure in &report.failures {
        println!(
            "{} {} test failed: {}",
            "warning:".bold().yellow(),
            failure.phase,
            failure.message
        );
    }

    let Some(ref scores) = report.scores else {
        if let Some(ref error) = report.error {
            println!("{} {}", "error:".bold().red(), error);
        }
        return;
    };

    println!(
        "{} {} ({}/100) - {}",
        "Rating:".bold().white(),
        scores.rating.band.to_string().bright_green(),
        scores.rating.score,
        scores.rating.description
    );
    println!(
        "{} {} ({}/100)",
        "Stability:".bold().white(),
        scores.stability.band,
        scores.stability.score
    );

    println!("{}", "Streaming:".bold().white());
    for tier in &scores.streaming {
        let mark = if tier.can_stream {
            "ok".bright_green()
        } else {
            "no".bright_red()
        };
        println!(
            "  {:>5}  {}  (buffering risk: {})",
            tier.quality.to_string(),
            mark,
            tier.buffering_risk
        );
    }

    println!("{}", "Platforms:".bold().white());
    for platform in &scores.platforms {
        print_compat(platform.name, platform.compatible);
    }
    println!("{}", "Games:".bold().white());
    for game in &scores.games {
        print_compat(game.name, game.compatible);
    }

    if let Some(ref verdict) = report.streaming_benchmark {
        println!(
            "{} {} avg {:.2} Mbps (min {:.2}, max {:.2}) - {}",
            "Streaming benchmark:".bold().white(),
            verdict.quality,
            verdict.avg_mbps,
            verdict.min_mbps,
            verdict.max_mbps,
            if verdict.can_stream {
                format!("playable, {} risk", verdict.buffering_risk)
            } else {
                format!("not playable, {} risk", verdict.buffering_risk)
            }
        );
    }

    if let Some(ref throughput) = report.throughput {
        println!(
            "{} avg {:.2} Mbps over {:.1}s (stability {:.0}%)",
            "Throughput:".bold().white(),
            throughput.avg_mbps,
            throughput.duration_secs,
            throughput.stability_pct
        );
    }
}

fn print_compat(name: &str, compatible: bool) {
    let mark = if compatible {
        "ok".bright_green()
    } else {
        "no".bright_red()
    };
    println!("  {}  {}", mark, name);
}
