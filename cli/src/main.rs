use clap::{Args, Parser, Subcommand};
use htmlwave_cli::{audio, server};
use htmlwave_core::{
    run_session, DecodeSession, DecoderConfig, EncoderConfig, HtmlEncoder, SampleFrameSource,
    SymbolTable, PRODUCTION_BLOCK_SIZE, SAMPLE_RATE,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "htmlwave")]
#[command(about = "Transmit HTML documents as sound and rebuild them from recordings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct EncodeOptions {
    /// Shift every tone up by 20 kHz
    #[arg(long)]
    ultrasonic: bool,

    /// Text block size in bytes (1-255)
    #[arg(long, default_value_t = PRODUCTION_BLOCK_SIZE)]
    block_size: usize,

    /// Marker tone duration in seconds
    #[arg(long, default_value_t = 0.3)]
    tone_duration: f32,

    /// FSK bit duration in seconds
    #[arg(long, default_value_t = 0.08)]
    bit_duration: f32,
}

impl EncodeOptions {
    fn to_config(&self) -> EncoderConfig {
        EncoderConfig {
            ultrasonic: self.ultrasonic,
            block_size: self.block_size,
            tone_duration: self.tone_duration,
            fsk_bit_duration: self.bit_duration,
            ..EncoderConfig::production()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Encode an HTML file to a WAV audio file
    Encode {
        /// Input HTML file
        #[arg(value_name = "INPUT.HTML")]
        input: PathBuf,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        #[command(flatten)]
        options: EncodeOptions,

        /// Print encoding details and the frequency map
        #[arg(short, long)]
        verbose: bool,
    },

    /// Rebuild a document from a WAV recording
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Output HTML file
        #[arg(value_name = "OUTPUT.HTML")]
        output: PathBuf,

        /// Expect tones shifted up by 20 kHz
        #[arg(long)]
        ultrasonic: bool,

        /// Minimum byte magnitude (0-255) for a spectral peak
        #[arg(long, default_value_t = 128)]
        threshold: u8,

        /// Spectrum smoothing between ticks, in [0, 1)
        #[arg(long, default_value_t = 0.8)]
        smoothing: f32,

        /// Listen for the note-based listener table instead of the encoder table
        #[arg(long)]
        listener_table: bool,

        /// Print every recognized symbol
        #[arg(short, long)]
        verbose: bool,
    },

    /// Render raw frequencies as a tone sequence
    Tones {
        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Frequencies in Hz
        #[arg(value_name = "HZ", required = true)]
        frequencies: Vec<f32>,

        /// Tone duration in seconds
        #[arg(long, default_value_t = 0.3)]
        tone_duration: f32,

        /// Silence after each tone in seconds
        #[arg(long, default_value_t = 0.1)]
        gap: f32,
    },

    /// Print the symbol to frequency map
    Frequencies {
        /// Show frequencies shifted for ultrasonic mode
        #[arg(long)]
        ultrasonic: bool,

        /// Print the map as JSON, as served by /api/frequencies
        #[arg(long)]
        json: bool,
    },

    /// Serve encoded audio for documents in a directory
    Serve {
        /// Address to bind
        #[arg(long, env = "HTMLWAVE_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(long, env = "HTMLWAVE_PORT", default_value_t = 8080)]
        port: u16,

        /// Encode in ultrasonic mode
        #[arg(long, env = "HTMLWAVE_ULTRASONIC")]
        ultrasonic: bool,

        /// Directory holding the HTML documents
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .try_init()
        .map_err(|e| format!("Failed to initialize logging: {}", e))?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode {
            input,
            output,
            options,
            verbose,
        } => encode_command(&input, &output, &options, verbose)?,
        Commands::Decode {
            input,
            output,
            ultrasonic,
            threshold,
            smoothing,
            listener_table,
            verbose,
        } => {
            let config = DecoderConfig {
                ultrasonic,
                threshold,
                smoothing,
                ..DecoderConfig::default()
            };
            decode_command(&input, &output, config, listener_table, verbose)?
        }
        Commands::Tones {
            output,
            frequencies,
            tone_duration,
            gap,
        } => tones_command(&output, &frequencies, tone_duration, gap)?,
        Commands::Frequencies { ultrasonic, json } => frequencies_command(ultrasonic, json)?,
        Commands::Serve {
            host,
            port,
            ultrasonic,
            root,
        } => serve_command(&host, port, ultrasonic, root)?,
    }

    Ok(())
}

fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

fn format_duration(seconds: f64) -> String {
    let minutes = (seconds / 60.0).floor();
    if minutes > 0.0 {
        format!("{}m {:.1}s", minutes, seconds - minutes * 60.0)
    } else {
        format!("{:.1}s", seconds)
    }
}

fn encode_command(
    input_path: &PathBuf,
    output_path: &PathBuf,
    options: &EncodeOptions,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let html = std::fs::read_to_string(input_path)?;
    let encoder = HtmlEncoder::new(options.to_config())?;

    if verbose {
        println!("Input file: {}", input_path.display());
        println!("Output file: {}", output_path.display());
        println!(
            "Ultrasonic mode: {}",
            if options.ultrasonic { "enabled" } else { "disabled" }
        );
        println!("Block size: {} bytes", options.block_size);
        println!("HTML size: {}", format_bytes(html.len()));
    }

    let started = Instant::now();
    let wav = encoder.encode_wav(&html)?;
    std::fs::write(output_path, &wav)?;

    let audio_seconds = (wav.len() - htmlwave_core::wav::WAV_HEADER_SIZE) as f64
        / (SAMPLE_RATE as f64 * 2.0);
    let rate = html.len() as f64 / audio_seconds;

    if verbose {
        println!("Results:");
        println!("  File size: {}", format_bytes(wav.len()));
        println!("  Audio duration: {}", format_duration(audio_seconds));
        println!(
            "  Encoding time: {}",
            format_duration(started.elapsed().as_secs_f64())
        );
        println!("  Data rate: {:.1} bytes/second", rate);
        println!();
        println!("Frequency Map:");
        let shift = encoder.config().frequency_shift();
        for (symbol, frequency) in encoder.frequency_map() {
            println!("  {}: {}Hz", symbol, frequency + shift);
        }
    } else {
        println!(
            "Encoded {} -> {}",
            input_path.display(),
            output_path.display()
        );
        println!(
            "  Size: {} | Duration: {} | Rate: {:.1} B/s",
            format_bytes(wav.len()),
            format_duration(audio_seconds),
            rate
        );
    }

    Ok(())
}

fn decode_command(
    input_path: &PathBuf,
    output_path: &PathBuf,
    mut config: DecoderConfig,
    listener_table: bool,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (samples, sample_rate) = audio::read_mono(input_path)?;
    println!(
        "Read {} samples at {} Hz from {}",
        samples.len(),
        sample_rate,
        input_path.display()
    );

    config.sample_rate = sample_rate as usize;
    // One analysis tick per 60 Hz display frame
    config.hop_size = (config.sample_rate / 60).max(1);

    let table = if listener_table {
        SymbolTable::listener()
    } else {
        SymbolTable::encoder()
    };

    let mut source = SampleFrameSource::new(samples, &config)?;
    let mut session = DecodeSession::with_table(config, table)?;
    let report = run_session(&mut session, &mut source)?;

    println!(
        "Processed {} ticks ({} silent), {} symbols applied, state: {}",
        report.ticks,
        report.silent_ticks,
        report.applied,
        report.state.as_str()
    );

    if verbose {
        for event in session.symbol_log() {
            println!(
                "  {:>8.3}s  {:>8.1}Hz  {}",
                event.at.as_secs_f64(),
                event.frequency,
                event.symbol
            );
        }
    }

    std::fs::write(output_path, session.html())?;
    println!(
        "Wrote {} to {}",
        format_bytes(session.html().len()),
        output_path.display()
    );
    Ok(())
}

fn tones_command(
    output_path: &PathBuf,
    frequencies: &[f32],
    tone_duration: f32,
    gap: f32,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = EncoderConfig {
        tone_duration,
        gap_duration: gap,
        ..EncoderConfig::default()
    };
    let encoder = HtmlEncoder::new(config)?;
    let samples = encoder.encode_tones(frequencies);

    audio::write_mono(output_path, &samples, SAMPLE_RATE as u32)?;
    println!(
        "Wrote {} tones ({} samples) to {}",
        frequencies.len(),
        samples.len(),
        output_path.display()
    );
    Ok(())
}

fn frequencies_command(ultrasonic: bool, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let encoder = HtmlEncoder::new(EncoderConfig::default().with_ultrasonic(ultrasonic))?;

    if json {
        let response = server::FrequencyResponse::from_encoder(&encoder);
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let shift = encoder.config().frequency_shift();
    for (symbol, frequency) in encoder.frequency_map() {
        println!("{:<12} {:>8.0} Hz", symbol.name(), frequency + shift);
    }
    Ok(())
}

fn serve_command(
    host: &str,
    port: u16,
    ultrasonic: bool,
    root: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let encoder = HtmlEncoder::new(EncoderConfig::default().with_ultrasonic(ultrasonic))?;
    let state = server::AppState::new(encoder, root);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::serve(state, addr))
}
