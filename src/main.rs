use clap::{Parser, Subcommand};
use hsr_lre::capture::{MemoryPort, MemoryUpperLayer};
use hsr_lre::config;
use hsr_lre::dataplane::{is_supervision_frame, ForwardOutcome, FrameBuf, Node};
use hsr_lre::protocol::ethernet::Frame;
use hsr_lre::protocol::hsr::{SupervisionTag, SUPERVISION_MULTICAST};
use hsr_lre::protocol::EtherType;
use hsr_lre::telemetry::{init_logging, MetricsRegistry};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "hsr-lre")]
#[command(about = "HSR/PRP link redundancy entity: frame forwarding and duplicate discard")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Decode a single frame given as hex
    Inspect {
        /// Frame bytes, e.g. ffffffffffff0200000000010800...
        hex: String,

        /// Last byte of the supervision multicast address
        #[arg(long, default_value_t = 0)]
        supervision_lsb: u8,
    },
    /// Push recorded frames through a node built from config.lock
    Replay {
        /// Path to config.lock file
        #[arg(short, long, default_value = "config.lock")]
        config: PathBuf,

        /// File with one "<port> <hex>" frame per line
        input: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate config.lock from config.toml
    Generate {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,

        /// Output path for config.lock
        #[arg(short, long, default_value = "config.lock")]
        output: PathBuf,
    },
    /// Validate config.toml without generating lock file
    Validate {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config { action } => {
            init_logging(None);
            match action {
                ConfigAction::Generate {
                    config: config_path,
                    output,
                } => cmd_config_generate(&config_path, &output),
                ConfigAction::Validate {
                    config: config_path,
                } => cmd_config_validate(&config_path),
            }
        }
        Commands::Inspect {
            hex,
            supervision_lsb,
        } => {
            init_logging(None);
            cmd_inspect(&hex, supervision_lsb)
        }
        Commands::Replay {
            config: lock_path,
            input,
        } => cmd_replay(&lock_path, &input),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn parse_hex(text: &str) -> Result<Vec<u8>, String> {
    let mut digits = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            c if c.is_whitespace() || c == ':' || c == '-' => {}
            c if c.is_ascii_hexdigit() => digits.push(c as u8),
            c => return Err(format!("invalid hex digit '{}' in '{}'", c, text)),
        }
    }
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in '{}'", text));
    }
    Ok(digits
        .chunks_exact(2)
        .map(|pair| (hex_value(pair[0]) << 4) | hex_value(pair[1]))
        .collect())
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

fn cmd_inspect(hex: &str, supervision_lsb: u8) -> Result<(), String> {
    let bytes = parse_hex(hex)?;
    let frame = Frame::parse(&bytes).map_err(|e| format!("Failed to parse frame: {}", e))?;

    println!("length:      {}", bytes.len());
    println!("destination: {}", frame.dst_mac());
    println!("source:      {}", frame.src_mac());
    println!("ethertype:   0x{:04x}", frame.outer_ethertype());
    if let Some(vlan) = frame.vlan_tag() {
        println!("vlan:        {} (not forwarded)", vlan.vid);
    }
    if let Some(tag) = frame.hsr_tag() {
        let version = if frame.outer_ethertype() == EtherType::Hsr as u16 {
            "v1"
        } else {
            "v0"
        };
        println!("tag:         {}", version);
        println!("  path:      {}", tag.path);
        println!("  lsdu:      {}", tag.lsdu_size);
        println!("  sequence:  {}", tag.sequence_nr);
        println!("  encap:     0x{:04x}", tag.encap_proto);
    }

    let mut multicast = SUPERVISION_MULTICAST;
    multicast.0[5] = supervision_lsb;
    let buf = FrameBuf::new(bytes.clone());
    if is_supervision_frame(&buf, multicast) {
        if let Some((sup, _)) = SupervisionTag::locate(&bytes) {
            println!("supervision: TLV {} length {}", sup.tlv_type, sup.tlv_length);
        }
        if let Some(mac_a) = hsr_lre::protocol::hsr::supervision_mac_a(&bytes) {
            println!("  mac_a:     {}", mac_a);
        }
    }
    Ok(())
}

fn cmd_replay(lock_path: &PathBuf, input: &PathBuf) -> Result<(), String> {
    let lock = config::load_lock(lock_path)
        .map_err(|e| format!("Failed to load {}: {}", lock_path.display(), e))?;
    init_logging(Some(&lock.logging));
    info!("Loaded {}", lock_path.display());

    let settings = lock.node_settings().map_err(|e| e.to_string())?;
    let upper = Arc::new(MemoryUpperLayer::new());
    let metrics = Arc::new(MetricsRegistry::new());
    let mut devices = BTreeMap::new();

    let mut builder = Node::builder(settings, upper.clone())
        .node_table(Arc::new(lock.node_table()))
        .metrics(metrics.clone());
    for (name, role, mac) in lock.port_specs().map_err(|e| e.to_string())? {
        let device = Arc::new(MemoryPort::new(name.clone()));
        devices.insert(name.clone(), device.clone());
        builder = builder.port(role, name, mac, device);
    }
    let node = builder.build().map_err(|e| e.to_string())?;

    let content = std::fs::read_to_string(input)
        .map_err(|e| format!("Failed to read {}: {}", input.display(), e))?;

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (port_name, hex) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| format!("line {}: expected '<port> <hex>'", lineno + 1))?;
        let port = node
            .port_by_name(port_name)
            .ok_or_else(|| format!("line {}: unknown port {}", lineno + 1, port_name))?;
        let bytes = parse_hex(hex).map_err(|e| format!("line {}: {}", lineno + 1, e))?;

        debug!("Replaying {} bytes on {}", bytes.len(), port_name);
        let outcome = node.forward(FrameBuf::new(bytes), port.id());
        print_outcome(lineno + 1, port_name, &node, &outcome);

        for (name, device) in &devices {
            for frame in device.take() {
                println!("  {} <- {}", name, to_hex(frame.as_bytes()));
            }
        }
        for frame in upper.take() {
            println!("  upper <- {}", to_hex(frame.as_bytes()));
        }
    }

    println!();
    for (name, value) in metrics.export() {
        println!("{} {}", name, value);
    }
    Ok(())
}

fn print_outcome(lineno: usize, port_name: &str, node: &Node, outcome: &ForwardOutcome) {
    match outcome {
        ForwardOutcome::Dropped(reason) => {
            println!("{}: {} dropped ({:?})", lineno, port_name, reason);
        }
        ForwardOutcome::Forwarded {
            transmitted,
            delivered,
            supervision_consumed,
            replicas_dropped,
            skipped,
        } => {
            let names: Vec<&str> = transmitted
                .iter()
                .filter_map(|id| node.port(*id).map(|p| p.name()))
                .collect();
            println!(
                "{}: {} -> [{}] delivered={} supervision={} replicas_dropped={}",
                lineno,
                port_name,
                names.join(", "),
                delivered,
                supervision_consumed,
                replicas_dropped
            );
            for (id, reason) in skipped {
                if let Some(port) = node.port(*id) {
                    debug!("  {} skipped: {:?}", port.name(), reason);
                }
            }
        }
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn cmd_config_generate(config_path: &PathBuf, output_path: &PathBuf) -> Result<(), String> {
    println!("[INFO] Loading {}...", config_path.display());

    let content = std::fs::read_to_string(config_path)
        .map_err(|e| format!("Failed to read config file: {}", e))?;

    let cfg = config::load(config_path).map_err(|e| format!("Failed to parse config: {}", e))?;

    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        return Err("Validation failed with errors".to_string());
    }

    let lock = config::generate_lock(&cfg, &content);

    let lock_toml =
        toml::to_string_pretty(&lock).map_err(|e| format!("Failed to serialize lock: {}", e))?;

    // Add header comment
    let output = format!(
        "# Generated by hsr-lre - DO NOT EDIT\n# Source: {} (sha256: {})\n\n{}",
        config_path.display(),
        lock.source_hash,
        lock_toml
    );

    std::fs::write(output_path, output).map_err(|e| format!("Failed to write lock file: {}", e))?;

    println!("[INFO] Generated {}", output_path.display());
    Ok(())
}

fn cmd_config_validate(config_path: &PathBuf) -> Result<(), String> {
    println!("[INFO] Validating {}...", config_path.display());

    let cfg = config::load(config_path).map_err(|e| format!("Failed to parse config: {}", e))?;

    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        Err("Validation failed".to_string())
    } else {
        println!("[INFO] Configuration is valid");
        Ok(())
    }
}
