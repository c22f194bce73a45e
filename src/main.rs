use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};

use seqgap::config::{DEFAULT_BIND_ADDR, DEFAULT_STAGING_PATH};
use seqgap::server::{self, ServiceState};
use seqgap::{AnalysisOptions, PacketConfig, ReclassifyScope, SeqError};

fn exit_code(err: &SeqError) -> i32 {
    match err {
        SeqError::Config(_) => 2,
        SeqError::SourceUnavailable(_) | SeqError::Acquire(_) => 3,
        _ => 1,
    }
}

fn parse_arg<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> Result<Option<T>, SeqError> {
    match matches.value_of(name) {
        None => Ok(None),
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| SeqError::Config(format!("invalid value for --{}: {}", name, v))),
    }
}

fn get_options(matches: &ArgMatches) -> Result<AnalysisOptions, SeqError> {
    Ok(AnalysisOptions {
        scope: if matches.is_present("after-gap") { ReclassifyScope::AfterGap } else { ReclassifyScope::WholeLog },
        max_retained: parse_arg(matches, "max-retained")?,
        cancel: None,
        memory_samples: parse_arg(matches, "memory-samples")?.unwrap_or(0),
        memory_interval: None,
    })
}

/// Build the request a `check` invocation stands for, plus where the capture lives.
fn get_request(matches: &ArgMatches) -> Result<(PacketConfig, PathBuf), SeqError> {
    let (url, staging, read_local) = match (matches.value_of("source"), matches.value_of("url")) {
        (Some(source), None) => (source.to_string(), PathBuf::from(source), true),
        (None, Some(url)) => {
            let staging = matches.value_of("staging").unwrap_or(DEFAULT_STAGING_PATH);
            (url.to_string(), PathBuf::from(staging), false)
        }
        _ => return Err(SeqError::Config("Must specify either --source or --url".to_string())),
    };
    let request = PacketConfig {
        encoding: matches.value_of("encoding").unwrap_or("BigEndian").to_string(),
        start_offset: parse_arg(matches, "offset")?.unwrap_or(40),
        length: parse_arg(matches, "length")?.unwrap_or(2),
        packet_url: url,
        read_local: Some(read_local),
    };
    Ok((request, staging))
}

fn main_check(matches: &ArgMatches) -> Result<(), SeqError> {
    let (request, staging) = get_request(matches)?;
    let options = get_options(matches)?;
    let result = seqgap::run(&request, &staging, &options)?;
    let text = if matches.is_present("pretty") {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", text);
    Ok(())
}

fn main_serve(matches: &ArgMatches) -> Result<(), SeqError> {
    let bind = matches.value_of("bind").unwrap_or(DEFAULT_BIND_ADDR);
    let addr: SocketAddr = bind
        .parse()
        .map_err(|_| SeqError::Config(format!("invalid bind address: {}", bind)))?;
    let staging = PathBuf::from(matches.value_of("staging").unwrap_or(DEFAULT_STAGING_PATH));
    let state = Arc::new(ServiceState::new(staging, get_options(matches)?));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::serve(addr, state))
}

fn analysis_args<'a, 'b>(cmd: App<'a, 'b>) -> App<'a, 'b> {
    cmd.arg(Arg::with_name("max-retained")
             .long("max-retained")
             .takes_value(true)
             .help("Fail instead of holding more than <max-retained> sequence numbers"))
        .arg(Arg::with_name("after-gap")
             .long("after-gap")
             .takes_value(false)
             .help("Only count a missing number as out of order if it shows up after the gap"))
        .arg(Arg::with_name("memory-samples")
             .long("memory-samples")
             .takes_value(true)
             .help("Log process memory once a second, <memory-samples> times, after collection"))
        .arg(Arg::with_name("staging")
             .long("staging")
             .takes_value(true)
             .help("Where downloaded captures are written [default: ./samplePcaps/download.pcap]"))
}

fn main() {
    env_logger::init();

    let check = SubCommand::with_name("check")
        .about("Analyze one capture and print the result as JSON")
        .arg(Arg::with_name("source")
                 .short("s")
                 .long("source")
                 .takes_value(true)
                 .conflicts_with("url")
                 .help("pcap file to read from"))
        .arg(Arg::with_name("url")
                 .short("u")
                 .long("url")
                 .takes_value(true)
                 .help("Download the capture from <url> before reading it"))
        .arg(Arg::with_name("encoding")
                 .short("e")
                 .long("encoding")
                 .takes_value(true)
                 .possible_values(&["BigEndian", "LittleEndian"])
                 .help("Byte order of the sequence number [default: BigEndian]"))
        .arg(Arg::with_name("offset")
                 .short("o")
                 .long("offset")
                 .takes_value(true)
                 .help("Zero based byte offset of the sequence number [default: 40]"))
        .arg(Arg::with_name("length")
                 .short("l")
                 .long("length")
                 .takes_value(true)
                 .possible_values(&["2", "4", "8"])
                 .help("Sequence number width in bytes [default: 2]"))
        .arg(Arg::with_name("pretty")
                 .long("pretty")
                 .takes_value(false)
                 .help("Pretty print the JSON result"));

    let serve = SubCommand::with_name("serve")
        .about("Serve GET/POST /config over HTTP")
        .arg(Arg::with_name("bind")
                 .short("b")
                 .long("bind")
                 .takes_value(true)
                 .help("Address to listen on [default: 127.0.0.1:8080]"));

    let matches = App::new("seqgap")
        .version("0.1.0")
        .author("Eric Harding <eric@digitalsorcery.net>")
        .about("Checks a pcap file for gaps and out of order sequence numbers")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(analysis_args(check))
        .subcommand(analysis_args(serve))
        .get_matches();

    let result = match matches.subcommand() {
        ("check", Some(m)) => main_check(m),
        ("serve", Some(m)) => main_serve(m),
        _ => Err(SeqError::Config("unknown subcommand".to_string())),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
}
