use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use provebit::proof::disasm::print_program;
use provebit::{Executor, ExecutorConfig, Program, Verdict, parse_str, verify};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "provebit")]
#[command(about = "Run and inspect ProveBit proof programs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a proof program and print the resulting bytes as hex
    Run {
        /// Proof program (.json, or a binary file written by `pack`)
        proof: PathBuf,

        /// File fed to the program as its byte source (empty when omitted)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Executor configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Allow whole-stream reads regardless of the configuration file
        #[arg(long)]
        unrestricted: bool,

        /// Expected result as hex; exits non-zero unless the proof holds
        #[arg(long)]
        expect: Option<String>,
    },
    /// Print a listing of a proof program
    Disasm { proof: PathBuf },
    /// Convert a JSON proof program to the compact binary encoding
    Pack { proof: PathBuf, out: PathBuf },
    /// Convert a binary proof program back to JSON
    Unpack { packed: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            proof,
            input,
            config,
            unrestricted,
            expect,
        } => {
            let program = load_program(&proof)?;
            let mut config = load_config(config.as_deref())?;
            if unrestricted {
                config.allow_unbounded_reads = true;
            }
            let executor = Executor::with_config(config);
            let source = open_source(input.as_deref())?;

            match expect {
                Some(expected_hex) => {
                    let expected = hex::decode(expected_hex.trim())
                        .context("--expect must be a hex string")?;
                    match verify(&executor, &program, source, &expected) {
                        Verdict::Holds => println!("proof holds"),
                        Verdict::Mismatch { computed } => {
                            bail!("proof does not hold: computed {}", hex::encode(computed))
                        }
                        Verdict::Aborted(e) => bail!("proof does not hold: {}", e),
                        Verdict::Malformed(e) => bail!("proof is malformed: {}", e),
                        Verdict::Failed(e) => bail!("proof could not be checked: {}", e),
                    }
                }
                None => {
                    let out = executor.execute(&program, source)?;
                    println!("{}", hex::encode(out));
                }
            }
        }
        Commands::Disasm { proof } => {
            let program = load_program(&proof)?;
            print_program(&program);
        }
        Commands::Pack { proof, out } => {
            let program = load_program(&proof)?;
            let bytes = program.to_bytes()?;
            fs::write(&out, &bytes).with_context(|| format!("cannot write '{}'", out.display()))?;
            info!(bytes = bytes.len(), out = %out.display(), "packed proof program");
        }
        Commands::Unpack { packed } => {
            let bytes = fs::read(&packed).with_context(|| format!("cannot read '{}'", packed.display()))?;
            let program = Program::from_bytes(&bytes)?;
            println!("{}", serde_json::to_string_pretty(&program.to_json())?);
        }
    }

    Ok(())
}

/// Loads a proof program: `.json` files are parsed as text, anything else is
/// decoded as the packed form.
fn load_program(path: &Path) -> Result<Program> {
    let program = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        let text =
            fs::read_to_string(path).with_context(|| format!("cannot read '{}'", path.display()))?;
        parse_str(&text)
    } else {
        let bytes = fs::read(path).with_context(|| format!("cannot read '{}'", path.display()))?;
        Program::from_bytes(&bytes)
    }
    .with_context(|| format!("in '{}'", path.display()))?;
    Ok(program)
}

fn load_config(path: Option<&Path>) -> Result<ExecutorConfig> {
    match path {
        Some(p) => {
            let content =
                fs::read_to_string(p).with_context(|| format!("cannot read '{}'", p.display()))?;
            let config: ExecutorConfig = serde_json::from_str(&content)?;
            Ok(config)
        }
        None => Ok(ExecutorConfig::default()),
    }
}

fn open_source(path: Option<&Path>) -> Result<Box<dyn Read>> {
    match path {
        Some(p) => {
            let file = File::open(p).with_context(|| format!("cannot open '{}'", p.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(std::io::empty())),
    }
}
