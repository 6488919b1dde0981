//! Convweight - convert model weights into quantized, deployment-ready form.
//!
//! This binary resolves the command line into a job descriptor with
//! convweight-core and hands it to a conversion engine.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use convweight_core::registry::{ModelType, Quantization, RegistryKey};
use convweight_core::{
    AppConfig, AutoDetector, CommandEngine, ConversionDispatcher, ConversionEngine, ConvertError,
    JobResolver, ManifestEngine, RawInputs,
};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "convweight")]
#[command(about = "Convert model weights to a quantized format")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve inputs and convert weights
    Convert(ConvertArgs),
    /// List registered quantizations or model types
    List {
        #[arg(value_enum)]
        target: ListTarget,
    },
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Model config file, or a directory containing config.json
    config: String,

    /// Quantization scheme to apply
    #[arg(long)]
    quantization: String,

    /// Model architecture, or "auto" to read it from the config
    #[arg(long, default_value = AppConfig::AUTO)]
    model_type: String,

    /// Target device such as "cuda:0", or "auto" to probe the hardware
    #[arg(long, default_value = AppConfig::AUTO)]
    device: String,

    /// Weight directory or file, or "auto" to use the config's directory
    #[arg(long, default_value = AppConfig::AUTO)]
    source: String,

    /// Weight format, or "auto" to detect it
    #[arg(long, default_value = AppConfig::AUTO)]
    source_format: String,

    /// Output directory, created if missing
    #[arg(short, long)]
    output: PathBuf,

    /// LoRA adapters as paths or name=path pairs
    #[arg(long, num_args = 0..)]
    lora_paths: Option<Vec<String>>,

    /// Convert only the adapter weights
    #[arg(long)]
    lora_only: bool,

    /// Resolve the job and write its manifest without running an engine
    #[arg(long)]
    dry_run: bool,

    /// External conversion program, called with the job manifest path
    #[arg(long, env = AppConfig::ENGINE_ENV)]
    engine: Option<PathBuf>,

    /// Print the resolved job as JSON on stdout
    #[arg(long)]
    print_job: bool,
}

impl ConvertArgs {
    fn raw_inputs(&self) -> RawInputs {
        RawInputs {
            config: self.config.clone(),
            quantization: self.quantization.clone(),
            model_type: self.model_type.clone(),
            device: self.device.clone(),
            source: self.source.clone(),
            source_format: self.source_format.clone(),
            output: self.output.clone(),
            lora_paths: self.lora_paths.clone(),
            lora_only: self.lora_only,
        }
    }

    fn engine(&self) -> Arc<dyn ConversionEngine> {
        match (&self.engine, self.dry_run) {
            (Some(program), false) => Arc::new(CommandEngine::new(program)),
            (None, false) => {
                warn!("No conversion engine configured, writing the job manifest only");
                Arc::new(ManifestEngine)
            }
            (_, true) => Arc::new(ManifestEngine),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ListTarget {
    Quantizations,
    Models,
}

async fn convert(args: ConvertArgs) -> Result<()> {
    let raw = args.raw_inputs();
    debug!("Raw inputs: {:?}", raw);

    let detector = AutoDetector::default();
    let job = JobResolver::new(&detector).resolve(&raw).map_err(|failure| {
        error!("Resolution stopped at stage: {}", failure.stage);
        failure.error
    })?;

    if args.print_job {
        println!("{}", serde_json::to_string_pretty(&job)?);
    }

    let dispatcher = ConversionDispatcher::new(args.engine());
    let engine_name = dispatcher.engine_name().to_string();
    let report = dispatcher.dispatch(job).await?;
    info!(
        "Done with {} engine ({}), manifest at {}",
        engine_name,
        report.engine,
        report.manifest.display()
    );
    Ok(())
}

fn list(target: ListTarget) {
    match target {
        ListTarget::Quantizations => {
            for quantization in Quantization::ALL {
                let scheme = quantization.scheme();
                println!(
                    "{:<16} {:<18} {:>5.2} bits/weight",
                    scheme.name,
                    scheme.kind.as_str(),
                    scheme.bits_per_weight()
                );
            }
        }
        ListTarget::Models => {
            for model_type in ModelType::ALL {
                let spec = model_type.spec();
                let formats: Vec<&str> = spec.source_formats.iter().map(|f| f.name()).collect();
                println!("{:<14} {}", spec.name, formats.join(", "));
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging; RUST_LOG overrides --debug
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let result = match cli.command {
        Command::Convert(args) => convert(args).await,
        Command::List { target } => {
            list(target);
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        let code = err
            .downcast_ref::<ConvertError>()
            .map_or(1, ConvertError::exit_code);
        std::process::exit(code);
    }
    Ok(())
}
