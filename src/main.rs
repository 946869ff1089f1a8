// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use neuralbabel::app_config::{self, Config};
use neuralbabel::language_utils::get_language_name;
use neuralbabel::pipeline::{HealthStatus, PipelineOrchestrator, PipelineRequest, ResponseMetadata};
use neuralbabel::{AppError, CancelToken, ReqwestTransport, StageKind};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate an audio file into speech in another language
    Translate(TranslateArgs),

    /// Probe every downstream service and print their health
    Health,

    /// List the supported language pairs
    Languages,

    /// Print the effective configuration as JSON
    Config,

    /// Generate shell completions for neuralbabel
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Input audio file
    #[arg(value_name = "AUDIO_PATH")]
    audio_path: PathBuf,

    /// Source language code (e.g., 'en', 'fr', 'de')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'fr', 'de')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Audio format of the input and the synthesized output
    #[arg(short = 'f', long)]
    audio_format: Option<String>,

    /// Voice used for synthesis
    #[arg(long)]
    voice: Option<String>,

    /// Output file (defaults to <input>_<target>.<format> next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Abandon the whole run after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,
}

/// neuralbabel - speech-to-speech translation
///
/// Chains speech recognition, text translation and speech synthesis services
/// running in a cluster to translate spoken audio.
#[derive(Parser, Debug)]
#[command(name = "neuralbabel")]
#[command(version)]
#[command(about = "Speech-to-speech translation orchestrator")]
#[command(long_about = "neuralbabel sends audio through ASR, translation and TTS services and writes the synthesized result.

EXAMPLES:
    neuralbabel translate hello.wav -s en -t fr        # English speech to French speech
    neuralbabel translate hi.mp3 -f mp3 -o out.mp3     # Keep the mp3 format
    neuralbabel health                                 # Probe all services
    neuralbabel languages                              # List supported pairs
    neuralbabel completions bash > neuralbabel.bash    # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.

ENVIRONMENT:
    ASR_SERVICE_ENDPOINT, TRANSLATION_SERVICE_ENDPOINT, TTS_SERVICE_ENDPOINT
    override the address of a service. *_SERVICE_NAME and *_SERVICE_NAMESPACE
    override the name used for cluster DNS.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

/// Coloured stderr logger installed before configuration is loaded
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    /// Install as the global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    /// ANSI colour and tag for a level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("1;31", "ERROR"),
            Level::Warn => ("1;33", "WARN "),
            Level::Info => ("1;32", "INFO "),
            Level::Debug => ("1;36", "DEBUG"),
            Level::Trace => ("1;35", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (colour, tag) = Self::style_for_level(record.level());
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {} [{}] {}\x1B[0m",
                colour,
                now,
                tag,
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Start at trace so the logger never filters; the effective level is set
    // with log::set_max_level once the config is known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "neuralbabel", &mut std::io::stdout());
        return Ok(());
    }

    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level((&level).into());
    }

    let config = load_config(&cli)?;

    let result = match cli.command {
        Commands::Translate(args) => run_translate(&config, args).await,
        Commands::Health => run_health(&config).await,
        Commands::Languages => run_languages(&config),
        Commands::Config => run_show_config(&config),
        Commands::Completions { .. } => Ok(()),
    };

    if let Err(e) = &result {
        error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Load or create the config, apply environment and CLI overrides, validate
fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let config_path = Path::new(&cli.config_path);
    if !config_path.exists() {
        warn!("Config file not found at '{}', creating default config.", cli.config_path);
    }

    let mut config = Config::load_or_create(config_path)?;
    config.apply_env_overrides();

    if let Some(level) = &cli.log_level {
        config.log_level = level.clone().into();
    } else {
        log::set_max_level(config.log_level_filter());
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn build_orchestrator(config: &Config) -> PipelineOrchestrator {
    PipelineOrchestrator::from_config(config, Arc::new(ReqwestTransport::new()))
}

async fn run_translate(config: &Config, args: TranslateArgs) -> Result<(), AppError> {
    let source = args
        .source_language
        .unwrap_or_else(|| config.default_source_language.clone());
    let target = args
        .target_language
        .unwrap_or_else(|| config.default_target_language.clone());
    let audio_format = args
        .audio_format
        .unwrap_or_else(|| config.default_audio_format.clone());
    let voice = args.voice.unwrap_or_else(|| config.default_voice.clone());

    let audio = tokio::fs::read(&args.audio_path)
        .await
        .map_err(|e| AppError::File(format!("Failed to read {}: {}", args.audio_path.display(), e)))?;

    let output_path = args
        .output
        .unwrap_or_else(|| default_output_path(&args.audio_path, &target, &audio_format));

    let request = PipelineRequest::new(audio, source, target)
        .with_format(audio_format)
        .with_voice(voice);

    let cancel = match args.deadline_secs {
        Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };

    let orchestrator = build_orchestrator(config);
    let output = orchestrator.run(&request, &cancel).await?;

    tokio::fs::write(&output_path, &output.audio)
        .await
        .map_err(|e| AppError::File(format!("Failed to write {}: {}", output_path.display(), e)))?;

    info!("Wrote {} bytes to {}", output.audio.len(), output_path.display());
    for (name, value) in ResponseMetadata::new(&request, &output).headers() {
        println!("{}: {}", name, value);
    }
    println!("{}", output.timings.summary());
    Ok(())
}

async fn run_health(config: &Config) -> Result<(), AppError> {
    let orchestrator = build_orchestrator(config);
    let snapshot = orchestrator.check_services_health().await;

    for stage in StageKind::ALL {
        let status = if snapshot.get(stage) { "healthy" } else { "unhealthy" };
        println!("{:<12} {}", stage.display_name(), status);
    }
    println!("{:<12} {}", "overall", snapshot.overall().as_str());
    println!("{:<12} {}", "ready", snapshot.is_ready());

    if snapshot.overall() == HealthStatus::Error {
        return Err(AppError::Unknown("no service is healthy".to_string()));
    }
    Ok(())
}

fn run_languages(config: &Config) -> Result<(), AppError> {
    for pair in &config.supported_language_pairs {
        let source = get_language_name(&pair.source)?;
        let target = get_language_name(&pair.target)?;
        println!("{:<8} {} -> {}", pair.to_string().replace(" -> ", "-"), source, target);
    }
    Ok(())
}

fn run_show_config(config: &Config) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(config).map_err(|e| AppError::Unknown(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

/// `<dir>/<stem>_<target>.<format>`
fn default_output_path(input: &Path, target: &str, audio_format: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_{}.{}", stem, target, audio_format))
}
