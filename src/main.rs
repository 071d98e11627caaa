//! Command-line interface for topic-lens
//!
//! # Usage Examples
//!
//! ```bash
//! # Decode a record value
//! topic-lens decode --config lens.toml --topic album.topic.name --input album.bin
//!
//! # Decode a record key given as base64 on stdin
//! topic-lens decode --config lens.yaml --topic orders --key --input-format base64 < key.b64
//!
//! # Encode JSON from stdin for a topic, printing base64
//! topic-lens encode --config lens.toml --topic album.topic.name --output-format base64
//!
//! # List mappings
//! topic-lens list --config lens.toml
//! ```
//!
//! Set `RUST_LOG=debug` to see registry and resolution logs on stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use topic_lens::commands::{describe_mappings, encode_record};
use topic_lens::payload::{decode_payload, encode_payload, read_input};
use topic_lens::{LensConfig, PayloadFormat};

#[derive(Parser)]
#[command(name = "topic-lens")]
#[command(about = "Decode protobuf topic records to JSON using descriptor sets mapped by topic")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a protobuf record to JSON
    Decode {
        /// Config file (.toml, .yaml or .yml)
        #[arg(long, env = "TOPIC_LENS_CONFIG")]
        config: PathBuf,

        /// Topic the record was read from
        #[arg(long)]
        topic: String,

        /// Decode the record key instead of the value
        #[arg(long)]
        key: bool,

        /// Payload file (default: stdin)
        #[arg(long, value_name = "PATH")]
        input: Option<PathBuf>,

        /// Payload representation
        #[arg(long, value_enum, default_value = "raw")]
        input_format: PayloadFormat,
    },

    /// Encode a JSON document to a protobuf record
    Encode {
        /// Config file (.toml, .yaml or .yml)
        #[arg(long, env = "TOPIC_LENS_CONFIG")]
        config: PathBuf,

        /// Topic the record is destined for
        #[arg(long)]
        topic: String,

        /// Encode with the key message type
        #[arg(long)]
        key: bool,

        /// JSON file (default: stdin)
        #[arg(long, value_name = "PATH")]
        input: Option<PathBuf>,

        /// Output representation
        #[arg(long, value_enum, default_value = "raw")]
        output_format: PayloadFormat,
    },

    /// List topic mappings in precedence order
    List {
        /// Config file (.toml, .yaml or .yml)
        #[arg(long, env = "TOPIC_LENS_CONFIG")]
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> anyhow::Result<()> {
    // Logs go to stderr so stdout only carries output
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Decode {
            config,
            topic,
            key,
            input,
            input_format,
        } => {
            let config = LensConfig::from_file(&config)?;
            let deserializer = config.deserializer()?;
            let payload = decode_payload(&read_input(input.as_deref())?, input_format)?;
            match deserializer
                .deserialize(&topic, &payload, key)
                .with_context(|| format!("Failed to decode record from topic '{topic}'"))?
            {
                Some(json) => println!("{json}"),
                None => {
                    let side = if key { "key" } else { "value" };
                    eprintln!("No protobuf {side} schema mapped for topic '{topic}'");
                }
            }
        }
        Commands::Encode {
            config,
            topic,
            key,
            input,
            output_format,
        } => {
            let config = LensConfig::from_file(&config)?;
            let registry = config.build_registry()?.snapshot();
            let input = read_input(input.as_deref())?;
            let json = std::str::from_utf8(&input).context("JSON input is not UTF-8")?;
            let payload = encode_record(&registry, &topic, key, json)?;
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&encode_payload(&payload, output_format))
                .context("Failed to write output")?;
            stdout.flush().context("Failed to write output")?;
        }
        Commands::List { config } => {
            let config = LensConfig::from_file(&config)?;
            let registry = config.build_registry()?.snapshot();
            for line in describe_mappings(&registry) {
                println!("{line}");
            }
        }
    }

    Ok(())
}
