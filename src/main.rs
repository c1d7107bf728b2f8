use ping_watch::{
    resolve, EventSink, ProbeConfig, ProbeEvent, Prober, ShutdownFlag, StatsLine,
};
use std::process::ExitCode;
use std::time::Duration;

#[derive(argh::FromArgs)]
/// Send ICMP echo requests to a host and report RTT, TTL and packet loss
/// per reply.
struct Args {
    /// target hostname or IP address
    #[argh(positional)]
    target: String,

    /// stop after this many successful replies (0 = unlimited)
    #[argh(option, short = 'l', default = "0")]
    limit: u64,

    /// interval between requests, e.g. "1s" or "250ms" (default 1s)
    #[argh(
        option,
        short = 'i',
        default = "Duration::from_secs(1)",
        from_str_fn(parse_interval)
    )]
    interval: Duration,

    /// RTT alert threshold in milliseconds (0 = disabled)
    #[argh(option, default = "0")]
    rtt: u64,

    /// print an aggregate statistics line after each reply
    #[argh(switch)]
    stats: bool,
}

fn parse_interval(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let (number, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => value.split_at(idx),
        None => (value, "s"),
    };
    let number: u64 = number
        .parse()
        .map_err(|_| format!("invalid interval: {value}"))?;
    match unit {
        "ms" => Ok(Duration::from_millis(number)),
        "s" => Ok(Duration::from_secs(number)),
        _ => Err(format!("invalid interval unit \"{unit}\" (use \"ms\" or \"s\")")),
    }
}

struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&mut self, event: ProbeEvent) {
        match event {
            ProbeEvent::Reply(line) => println!(
                "{} bytes from {}: icmp_seq={} time={:?} ttl={} loss={:.1}%",
                line.bytes, line.source, line.sequence, line.rtt, line.ttl, line.loss_percent
            ),
            ProbeEvent::RttAlert { rtt, threshold_ms } => {
                println!("RTT limit of {threshold_ms} ms crossed: {rtt:?}");
            }
            ProbeEvent::Stats(StatsLine {
                sent,
                received,
                min_rtt,
                avg_rtt,
                max_rtt,
            }) => println!(
                "sent={sent} received={received} rtt min/avg/max = {min_rtt:?}/{avg_rtt:?}/{max_rtt:?}"
            ),
            ProbeEvent::DecodeFailure { message } => {
                eprintln!("could not decode a reply: {message}");
            }
        }
    }
}

fn main() -> ExitCode {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::WARN)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let args: Args = argh::from_env();

    let target = match resolve(&args.target) {
        Ok(target) => target,
        Err(e) => {
            eprintln!("Encountered error: {e}");
            return ExitCode::FAILURE;
        }
    };
    println!("Source: {} ({})", args.target, target.addr);

    let config = ProbeConfig {
        limit: args.limit,
        interval: args.interval,
        rtt_threshold_ms: args.rtt,
        show_stats: args.stats,
    };

    let shutdown = ShutdownFlag::new();
    let handler_flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_flag.request()) {
        tracing::warn!("could not install the Ctrl-C handler: {e}");
    }

    let mut prober = match Prober::open(target, config) {
        Ok(prober) => prober,
        Err(e) => {
            eprintln!("Encountered error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let termination = prober.run(&mut ConsoleSink, &shutdown);
    tracing::debug!(?termination, "session ended");
    ExitCode::SUCCESS
}
