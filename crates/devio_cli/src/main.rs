//! devio CLI
//!
//! Pipes a file or stdin through devio filter chains into a file or stdout.
//!
//! # Commands
//!
//! - `encode` / `decode` - hex, base64 or URL-safe base64
//! - `hash` - MD5, SHA-1 or SHA-256 digest, printed as hex
//! - `compress` / `decompress` - zlib
//! - `encrypt` / `decrypt` - AES with PKCS#7 padding
//! - `random` - bytes from the OS CSPRNG

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::codec::Codec;
use commands::crypt::{CryptOptions, Mode};
use commands::digest::Algorithm;
use commands::stdio::{open_input, open_output};
use devio_filters::DEFAULT_LEVEL;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Stream filters for files and pipes.
#[derive(Parser)]
#[command(name = "devio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Read from this file instead of stdin
    #[arg(global = true, short, long)]
    input: Option<PathBuf>,

    /// Write to this file instead of stdout
    #[arg(global = true, short, long)]
    output: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct CipherArgs {
    /// Key as hex (32, 48 or 64 digits)
    #[arg(short, long)]
    key: String,

    /// IV as hex (32 digits), all zero when omitted
    #[arg(long)]
    iv: Option<String>,

    /// Chaining mode
    #[arg(short, long, value_enum, default_value_t = Mode::Cbc)]
    mode: Mode,

    /// Do not apply PKCS#7 padding
    #[arg(long)]
    no_padding: bool,
}

impl From<CipherArgs> for CryptOptions {
    fn from(args: CipherArgs) -> Self {
        Self {
            key: args.key,
            iv: args.iv,
            mode: args.mode,
            no_padding: args.no_padding,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Encode binary input as text
    Encode {
        /// Text codec
        #[arg(short, long, value_enum, default_value_t = Codec::Base64)]
        codec: Codec,
    },

    /// Decode text input back to binary
    Decode {
        /// Text codec
        #[arg(short, long, value_enum, default_value_t = Codec::Base64)]
        codec: Codec,
    },

    /// Print the digest of the input
    Hash {
        /// Digest algorithm
        #[arg(short, long, value_enum, default_value_t = Algorithm::Sha256)]
        algorithm: Algorithm,
    },

    /// Compress with zlib
    Compress {
        /// Compression level, 0 to 9
        #[arg(short, long, default_value_t = DEFAULT_LEVEL)]
        level: u32,
    },

    /// Decompress a zlib stream
    Decompress,

    /// Encrypt with AES
    Encrypt(CipherArgs),

    /// Decrypt with AES
    Decrypt(CipherArgs),

    /// Emit random bytes
    Random {
        /// Number of bytes
        #[arg(short, long)]
        bytes: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // stdout carries data.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let output = open_output(cli.output.as_deref())?;

    match cli.command {
        Commands::Encode { codec } => {
            let mut input = open_input(cli.input.as_deref())?;
            commands::codec::run(&mut input, &output, codec, false)?;
        }
        Commands::Decode { codec } => {
            let mut input = open_input(cli.input.as_deref())?;
            commands::codec::run(&mut input, &output, codec, true)?;
        }
        Commands::Hash { algorithm } => {
            let input = open_input(cli.input.as_deref())?;
            commands::digest::run(input, &output, algorithm)?;
        }
        Commands::Compress { level } => {
            let mut input = open_input(cli.input.as_deref())?;
            commands::compress::compress(&mut input, &output, level)?;
        }
        Commands::Decompress => {
            let mut input = open_input(cli.input.as_deref())?;
            commands::compress::decompress(&mut input, &output)?;
        }
        Commands::Encrypt(args) => {
            let mut input = open_input(cli.input.as_deref())?;
            commands::crypt::encrypt(&mut input, &output, &args.into())?;
        }
        Commands::Decrypt(args) => {
            let input = open_input(cli.input.as_deref())?;
            commands::crypt::decrypt(input, &output, &args.into())?;
        }
        Commands::Random { bytes } => {
            commands::random::run(&output, bytes)?;
        }
    }

    output.lock().close()?;
    Ok(())
}
