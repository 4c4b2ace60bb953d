//! Command-line companion for flip authoring and validation bookkeeping.
//!
//! Commands encode and decode flip payloads, maintain the local flip store
//! and report session deadlines.  Settings come from `FC_*` variables (see
//! `CeremonyConfig`).

use flip_ceremony::commands::{
    codec::{run_decode, run_encode, EncodeOptions},
    flips::{run_archive, run_list, run_prune},
    now_millis, now_secs,
    timer::run_timer,
};
use flip_ceremony::{random_permutation, CeremonyConfig, FlipFilter, Permutation};
use serde::Serialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn fatal(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

fn print_help() {
    println!("Usage: ceremony <perm|encode|decode|flips|timer> ...");
    println!("  perm");
    println!("  encode --image <file> (x4) --order <a,b,c,d>");
    println!("  decode --public <file> --private <file> [--out-dir <dir>]");
    println!("  flips <list|archive|prune> ...");
    println!("  timer --start <unix-ms> --short <secs> --long <secs> [--now <unix-ms>]");
}

fn print_flips_help() {
    println!("Usage: ceremony flips <list|archive|prune> ...");
    println!("  list [--filter active|drafts|archived]");
    println!("  archive --epoch <N>");
    println!("  prune");
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config() -> CeremonyConfig {
    CeremonyConfig::load().unwrap_or_else(|err| fatal(&format!("config error: {err}")))
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => fatal(&format!("failed to render output: {err}")),
    }
}

fn main() {
    init_tracing();
    let mut args = env::args().skip(1);
    let command = args.next();
    match command.as_deref() {
        Some("perm") => println!("{}", random_permutation()),
        Some("encode") => cmd_encode(args.collect()),
        Some("decode") => cmd_decode(args.collect()),
        Some("flips") => {
            let sub = args.next().unwrap_or_else(|| {
                print_flips_help();
                std::process::exit(1);
            });
            handle_flips(&sub, args.collect());
        }
        Some("timer") => cmd_timer(args.collect()),
        Some("-h") | Some("--help") | None => print_help(),
        Some(other) => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(1);
        }
    }
}

fn handle_flips(sub: &str, tail: Vec<String>) {
    match sub {
        "-h" | "--help" => print_flips_help(),
        "list" => cmd_flips_list(tail),
        "archive" => cmd_flips_archive(tail),
        "prune" => cmd_flips_prune(tail),
        _ => {
            eprintln!("Unknown flips subcommand: {sub}");
            std::process::exit(1);
        }
    }
}

fn parse_u64(flag: &str, raw: Option<String>) -> u64 {
    let raw = raw.unwrap_or_else(|| fatal(&format!("{flag} expects a value")));
    raw.parse::<u64>()
        .unwrap_or_else(|_| fatal(&format!("invalid {flag}")))
}

fn cmd_encode(args: Vec<String>) {
    let mut images: Vec<PathBuf> = Vec::new();
    let mut order: Option<Permutation> = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--image" => {
                images.push(PathBuf::from(
                    iter.next()
                        .unwrap_or_else(|| fatal("--image expects a value")),
                ));
            }
            "--order" => {
                let raw = iter
                    .next()
                    .unwrap_or_else(|| fatal("--order expects a value"));
                order = Some(
                    raw.parse()
                        .unwrap_or_else(|err| fatal(&format!("invalid --order: {err}"))),
                );
            }
            "-h" | "--help" => {
                println!("Usage: ceremony encode --image <file> (x4) --order <a,b,c,d>");
                return;
            }
            other => fatal(&format!("unknown argument: {other}")),
        }
    }

    let order = order.unwrap_or_else(|| fatal("--order is required"));
    let cfg = load_config();
    let out = run_encode(&EncodeOptions {
        images,
        order,
        max_payload_len: cfg.max_payload_len,
    })
    .unwrap_or_else(|err| fatal(&format!("encode failed: {err}")));
    print_json(&out);
}

fn cmd_decode(args: Vec<String>) {
    let mut public: Option<PathBuf> = None;
    let mut private: Option<PathBuf> = None;
    let mut out_dir: Option<PathBuf> = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--public" => {
                public = Some(PathBuf::from(
                    iter.next()
                        .unwrap_or_else(|| fatal("--public expects a value")),
                ));
            }
            "--private" => {
                private = Some(PathBuf::from(
                    iter.next()
                        .unwrap_or_else(|| fatal("--private expects a value")),
                ));
            }
            "--out-dir" => {
                out_dir = Some(PathBuf::from(
                    iter.next()
                        .unwrap_or_else(|| fatal("--out-dir expects a value")),
                ));
            }
            "-h" | "--help" => {
                println!("Usage: ceremony decode --public <file> --private <file> [--out-dir <dir>]");
                return;
            }
            other => fatal(&format!("unknown argument: {other}")),
        }
    }

    let public = public.unwrap_or_else(|| fatal("--public is required"));
    let private = private.unwrap_or_else(|| fatal("--private is required"));
    let out = run_decode(&public, &private, out_dir.as_deref())
        .unwrap_or_else(|err| fatal(&format!("decode failed: {err}")));
    print_json(&out);
}

fn cmd_flips_list(args: Vec<String>) {
    let mut filter = FlipFilter::Active;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--filter" => {
                let raw = iter
                    .next()
                    .unwrap_or_else(|| fatal("--filter expects a value"));
                filter = raw
                    .parse()
                    .unwrap_or_else(|err| fatal(&format!("invalid --filter: {err}")));
            }
            other => fatal(&format!("unknown argument: {other}")),
        }
    }
    let cfg = load_config();
    let rows = run_list(&cfg, filter, now_secs())
        .unwrap_or_else(|err| fatal(&format!("list failed: {err}")));
    print_json(&rows);
}

fn cmd_flips_archive(args: Vec<String>) {
    let mut epoch: Option<u64> = None;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--epoch" => epoch = Some(parse_u64("--epoch", iter.next())),
            other => fatal(&format!("unknown argument: {other}")),
        }
    }
    let epoch = epoch.unwrap_or_else(|| fatal("--epoch is required"));
    let cfg = load_config();
    let archived = run_archive(&cfg, epoch, now_secs())
        .unwrap_or_else(|err| fatal(&format!("archive failed: {err}")));
    if archived {
        println!("epoch {epoch}: flips archived");
    } else {
        println!("epoch {epoch}: already archived");
    }
}

fn cmd_flips_prune(args: Vec<String>) {
    if let Some(other) = args.first() {
        fatal(&format!("unknown argument: {other}"));
    }
    let cfg = load_config();
    let removed = run_prune(&cfg, now_secs())
        .unwrap_or_else(|err| fatal(&format!("prune failed: {err}")));
    println!("removed {removed} outdated flips");
}

fn cmd_timer(args: Vec<String>) {
    let mut start: Option<u64> = None;
    let mut short: Option<u64> = None;
    let mut long: Option<u64> = None;
    let mut now: Option<u64> = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--start" => start = Some(parse_u64("--start", iter.next())),
            "--short" => short = Some(parse_u64("--short", iter.next())),
            "--long" => long = Some(parse_u64("--long", iter.next())),
            "--now" => now = Some(parse_u64("--now", iter.next())),
            "-h" | "--help" => {
                println!(
                    "Usage: ceremony timer --start <unix-ms> --short <secs> --long <secs> [--now <unix-ms>]"
                );
                return;
            }
            other => fatal(&format!("unknown argument: {other}")),
        }
    }

    let start = start.unwrap_or_else(|| fatal("--start is required"));
    let short = short.unwrap_or_else(|| fatal("--short is required"));
    let long = long.unwrap_or_else(|| fatal("--long is required"));
    let cfg = load_config();
    let report = run_timer(
        start,
        Duration::from_secs(short),
        Duration::from_secs(long),
        cfg.submit_grace(),
        now.unwrap_or_else(now_millis),
    );
    print_json(&report);
}
