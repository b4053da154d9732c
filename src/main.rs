use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Read, Write};
mod auth;
use syncwire::crypto::{self, DEFAULT_ITERATIONS, KEY_LEN, SALT_LEN};
use syncwire::{FrameReader, FrameWriter, KdfParams, Key, stream::DEFAULT_BUFFER_SIZE};
use zeroize::Zeroizing;

#[derive(Debug, clap::Args)]
struct KdfArgs {
    /// Hex-encoded salt shared by both peers
    #[arg(long, value_name = "HEX", env = "SYNCWIRE_SALT")]
    salt: String,

    /// PBKDF2 iteration count (default: 1000)
    #[arg(long)]
    iterations: Option<u32>,

    /// Derived key size in bytes (default: 32)
    #[arg(long = "key-size")]
    key_size: Option<usize>,
}

impl KdfArgs {
    fn to_kdf_params(&self) -> Result<KdfParams> {
        KdfParams::new(
            self.iterations.unwrap_or(DEFAULT_ITERATIONS),
            self.key_size.unwrap_or(KEY_LEN),
        )
    }

    fn derive(&self) -> Result<Key> {
        let kdf = self.to_kdf_params()?;
        let salt = crypto::from_hex(&self.salt).context("invalid --salt")?;
        let password = auth::read_password()?;
        crypto::derive_key(&password, &salt, kdf).context("failed to derive stream key")
    }
}

#[derive(Debug, Parser)]
#[command(name = "syncwire")]
#[command(
    version,
    about = "Framed, password-encrypted virtual streams over stdin/stdout."
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Writes stdin to stdout as one framed logical stream
    Frame {
        /// Largest frame payload in bytes (1..=32767)
        #[arg(long = "buffer-size", default_value_t = DEFAULT_BUFFER_SIZE)]
        buffer_size: usize,
    },

    /// Reads one framed logical stream from stdin and writes its content
    Unframe,

    /// Encrypts stdin with a key derived from the password
    Encrypt {
        #[command(flatten)]
        kdf: KdfArgs,
    },

    /// Decrypts stdin with a key derived from the password
    Decrypt {
        #[command(flatten)]
        kdf: KdfArgs,
    },

    /// Prints the key derived from the password as hex
    DeriveKey {
        #[command(flatten)]
        kdf: KdfArgs,
    },

    /// Prints a random salt as hex
    Salt {
        /// Salt size in bytes
        #[arg(long, default_value_t = SALT_LEN)]
        size: usize,
    },

    /// Prints the verification hash of DATA
    #[command(arg_required_else_help = true)]
    Hash { data: String },
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();
    init_logging(args.verbose);

    match args.command {
        Commands::Frame { buffer_size } => {
            let mut stdout = io::stdout().lock();
            let mut out = FrameWriter::with_capacity(&mut stdout, buffer_size)?;
            io::copy(&mut io::stdin().lock(), &mut out)?;
            out.close()?;
        }
        Commands::Unframe => {
            let mut stdin = io::stdin().lock();
            let mut input = FrameReader::new(&mut stdin);
            let mut stdout = io::stdout().lock();
            io::copy(&mut input, &mut stdout)?;
            input.close()?;
            stdout.flush()?;
        }
        Commands::Encrypt { kdf } => {
            let key = kdf.derive()?;
            let mut sealed = crypto::wrap_for_encryption(io::stdout().lock(), &key)?;
            io::copy(&mut io::stdin().lock(), &mut sealed)?;
            sealed.finish()?;
        }
        Commands::Decrypt { kdf } => {
            let key = kdf.derive()?;
            let mut ciphertext = Vec::new();
            io::stdin().read_to_end(&mut ciphertext)?;
            // nothing is written unless the whole input decrypts
            let plaintext: Zeroizing<Vec<u8>> = crypto::decrypt(&key, &ciphertext)?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(&plaintext)?;
            stdout.flush()?;
        }
        Commands::DeriveKey { kdf } => {
            let key = kdf.derive()?;
            println!("{}", crypto::to_hex(key.as_bytes()));
        }
        Commands::Salt { size } => {
            let salt = crypto::random_salt(size)?;
            println!("{}", crypto::to_hex(&salt));
        }
        Commands::Hash { data } => {
            println!("{}", crypto::hash(&data));
        }
    }

    Ok(())
}
