use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use thumbwork::config::{self, DEFAULT_CONFIG_FILE};
use thumbwork::output::{self, JobLabel};
use thumbwork::{
    ImageSource, JobOutcome, Processor, ResizeOptions, RotateOptions, ThumbnailOptions,
    ValidationError, imaging, oneshot,
};
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

/// Inputs and destination shared by every job command.
#[derive(Args, Clone)]
struct InputArgs {
    /// Image files to process; `-` reads one image from stdin (at most once)
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Directory for the encoded results
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,
}

/// Target box flags shared by resize and thumbnail.
#[derive(Args, Clone)]
struct GeometryArgs {
    /// Target width in pixels (0 = derive from height)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    width: i64,

    /// Target height in pixels (0 = derive from width)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    height: i64,

    /// Encoder quality 1-100 (0 = codec default)
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    quality: i64,

    /// Cover the box and center-crop instead of fitting inside it
    #[arg(long)]
    autocrop: bool,
}

#[derive(Parser)]
#[command(name = "thumbwork")]
#[command(about = "Resize, thumbnail and rotate images on a worker pool")]
#[command(long_about = "\
Resize, thumbnail and rotate images on a worker pool

Every input becomes one job. Jobs run in parallel; once all of them have
finished, each prints one line in input order and its encoded result is
written to --out-dir as <name>.<command>.<ext>. Inputs that share a file
name get their position appended (<name>-002.<command>.<ext>).

Geometry:
  --width 300                 fit: height follows the aspect ratio
  --width 300 --height 200    stretch to exactly 300x200
  --width 300 --autocrop      cover a 300x300 box, then center-crop

Run 'thumbwork gen-config' to generate a documented thumbwork.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file = defaults)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Worker threads (overrides workers.max_threads)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Print one JSON object per job instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scale images to a target box, optionally converting the format
    Resize {
        #[command(flatten)]
        io: InputArgs,
        #[command(flatten)]
        geometry: GeometryArgs,
        /// Output format (jpg, png, webp, avif, ...); default keeps the input format
        #[arg(long)]
        format: Option<String>,
    },
    /// Fast scale for previews; keeps the input format
    Thumbnail {
        #[command(flatten)]
        io: InputArgs,
        #[command(flatten)]
        geometry: GeometryArgs,
    },
    /// Rotate images clockwise
    Rotate {
        #[command(flatten)]
        io: InputArgs,
        /// Angle in degrees; negative turns counter-clockwise
        #[arg(long, allow_negative_numbers = true)]
        degrees: f64,
    },
    /// List the formats this build can read and write
    Formats,
    /// Print a stock thumbwork.toml with all options documented
    GenConfig,
}

impl Command {
    fn inputs(&self) -> Option<&InputArgs> {
        match self {
            Command::Resize { io, .. } | Command::Thumbnail { io, .. } | Command::Rotate { io, .. } => {
                Some(io)
            }
            Command::Formats | Command::GenConfig => None,
        }
    }
}

/// Stdin can only be drained once, so `-` may appear at most once.
fn check_inputs(cli: &Cli) -> Result<(), clap::Error> {
    let Some(io) = cli.command.inputs() else {
        return Ok(());
    };
    if io.inputs.iter().filter(|input| *input == "-").count() > 1 {
        return Err(Cli::command().error(
            clap::error::ErrorKind::ArgumentConflict,
            "stdin (-) can be given only once",
        ));
    }
    Ok(())
}

fn init_tracing(verbosity: u8) -> Result<(), Box<dyn std::error::Error>> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env().add_directive(format!("thumbwork={level}").parse()?);
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// One job as the CLI tracks it.
struct Pending {
    source: String,
    stem: String,
    receiver: crossbeam_channel::Receiver<JobOutcome>,
}

struct Tally {
    done: usize,
    failed: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if let Err(err) = check_inputs(&cli) {
        err.exit();
    }
    init_tracing(cli.verbose)?;

    let (io, mode) = match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(());
        }
        Command::Formats => {
            output::print_formats(imaging::init());
            return Ok(());
        }
        Command::Resize {
            io,
            geometry,
            format,
        } => (io, Mode::Resize(geometry, format)),
        Command::Thumbnail { io, geometry } => (io, Mode::Thumbnail(geometry)),
        Command::Rotate { io, degrees } => (io, Mode::Rotate(degrees)),
    };

    let mut config = config::load_config(&cli.config)?;
    if let Some(threads) = cli.threads {
        config.workers.max_threads = Some(threads);
    }

    let tally = run_jobs(&config, &io, &mode, cli.json)?;
    output::print_summary(tally.done, tally.failed, cli.json);
    if tally.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

enum Mode {
    Resize(GeometryArgs, Option<String>),
    Thumbnail(GeometryArgs),
    Rotate(f64),
}

impl Mode {
    fn transform(&self) -> imaging::TransformMode {
        match self {
            Mode::Resize(..) => imaging::TransformMode::Resize,
            Mode::Thumbnail(_) => imaging::TransformMode::Thumbnail,
            Mode::Rotate(_) => imaging::TransformMode::Rotate,
        }
    }

    fn submit(
        &self,
        processor: &mut Processor,
        source: ImageSource,
        sink: impl FnOnce(JobOutcome) + Send + 'static,
    ) -> Result<(), ValidationError> {
        match self {
            Mode::Resize(g, format) => processor.resize(
                ResizeOptions {
                    input: Some(source),
                    width: g.width,
                    height: g.height,
                    quality: g.quality,
                    format: format.clone(),
                    autocrop: g.autocrop,
                },
                sink,
            ),
            Mode::Thumbnail(g) => processor.thumbnail(
                ThumbnailOptions {
                    input: Some(source),
                    width: g.width,
                    height: g.height,
                    quality: g.quality,
                    autocrop: g.autocrop,
                },
                sink,
            ),
            Mode::Rotate(degrees) => processor.rotate(
                RotateOptions {
                    input: Some(source),
                    degrees: *degrees,
                },
                sink,
            ),
        }
        .map(|_| ())
    }
}

fn run_jobs(
    config: &config::ProcessorConfig,
    io: &InputArgs,
    mode: &Mode,
    json: bool,
) -> Result<Tally, Box<dyn std::error::Error>> {
    let mut processor = Processor::new(config)?;
    let mut tally = Tally { done: 0, failed: 0 };
    let mut pending: Vec<Option<Pending>> = Vec::with_capacity(io.inputs.len());

    let stems = output_stems(&io.inputs);
    for (i, (input, stem)) in io.inputs.iter().zip(stems).enumerate() {
        let index = i + 1;
        let source = if input == "-" {
            let mut bytes = Vec::new();
            std::io::stdin().read_to_end(&mut bytes)?;
            ImageSource::Bytes(bytes)
        } else {
            ImageSource::Path(PathBuf::from(input))
        };

        let (sink, receiver) = oneshot();
        match mode.submit(&mut processor, source, sink) {
            Ok(()) => pending.push(Some(Pending {
                source: input.clone(),
                stem,
                receiver,
            })),
            Err(err) => {
                let label = JobLabel {
                    index,
                    source: input,
                    mode: mode.transform(),
                };
                output::print_rejected(&label, &err, json);
                tally.failed += 1;
                pending.push(None);
            }
        }
    }

    processor.wait();

    std::fs::create_dir_all(&io.out_dir)?;
    for (i, job) in pending.into_iter().enumerate() {
        let Some(job) = job else { continue };
        let label = JobLabel {
            index: i + 1,
            source: &job.source,
            mode: mode.transform(),
        };
        match job.receiver.try_recv() {
            Ok(Ok(result)) => {
                let dest = destination(&io.out_dir, &job.stem, mode.transform(), &result.bytes);
                std::fs::write(&dest, &result.bytes)?;
                output::print_success(&label, &result.info, result.bytes.len(), &dest, json);
                tally.done += 1;
            }
            Ok(Err(err)) => {
                output::print_failure(&label, &err, json);
                tally.failed += 1;
            }
            Err(_) => {
                tracing::error!(job = label.index, "no completion received");
                tally.failed += 1;
            }
        }
    }
    Ok(tally)
}

/// Output file stem for every input, in order.
///
/// `-` becomes `stdin-NNN` and a path without a file name `input-NNN`, where
/// NNN is the 1-based position. A stem already taken by an earlier input gets
/// `-NNN` appended, so `a/x.jpg b/x.jpg` writes `x` and `x-002`.
fn output_stems(inputs: &[String]) -> Vec<String> {
    let mut taken = HashSet::new();
    inputs
        .iter()
        .enumerate()
        .map(|(i, input)| {
            let index = i + 1;
            let stem = if input == "-" {
                format!("stdin-{index:03}")
            } else {
                Path::new(input)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| format!("input-{index:03}"))
            };
            let stem = if taken.contains(&stem) {
                format!("{stem}-{index:03}")
            } else {
                stem
            };
            taken.insert(stem.clone());
            stem
        })
        .collect()
}

/// `<out_dir>/<stem>.<mode>.<ext>`, with the extension taken from the encoded bytes.
fn destination(out_dir: &Path, stem: &str, mode: imaging::TransformMode, bytes: &[u8]) -> PathBuf {
    let ext = image::guess_format(bytes)
        .ok()
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or("bin");
    out_dir.join(format!("{stem}.{mode}.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    // =========================================================================
    // Output naming
    // =========================================================================

    #[test]
    fn distinct_files_keep_their_stems() {
        let stems = output_stems(&inputs(&["dawn.jpg", "dusk.png", "-"]));
        assert_eq!(stems, ["dawn", "dusk", "stdin-003"]);
    }

    #[test]
    fn repeated_stems_get_their_position() {
        let stems = output_stems(&inputs(&["a/x.jpg", "b/x.jpg", "c/x.png", "y.jpg"]));
        assert_eq!(stems, ["x", "x-002", "x-003", "y"]);
    }

    #[test]
    fn suffixed_stem_does_not_collide_with_a_later_literal_name() {
        let stems = output_stems(&inputs(&["a/x.jpg", "b/x.jpg", "x-002.jpg"]));
        assert_eq!(stems, ["x", "x-002", "x-002-003"]);
    }

    #[test]
    fn destination_names_by_stem_mode_and_encoded_format() {
        let png = {
            let mut buf = std::io::Cursor::new(Vec::new());
            image::RgbImage::new(2, 2)
                .write_to(&mut buf, image::ImageFormat::Png)
                .unwrap();
            buf.into_inner()
        };
        let dest = destination(Path::new("out"), "x-002", imaging::TransformMode::Resize, &png);
        assert_eq!(dest, Path::new("out").join("x-002.resize.png"));
    }

    // =========================================================================
    // Argument parsing
    // =========================================================================

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn repeated_stdin_is_rejected() {
        let cli = parse(&["thumbwork", "resize", "--width", "10", "-", "a.jpg", "-"]);
        let err = check_inputs(&cli).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn single_stdin_and_repeated_paths_are_accepted() {
        let cli = parse(&["thumbwork", "rotate", "--degrees", "90", "-", "x.jpg", "x.jpg"]);
        assert!(check_inputs(&cli).is_ok());
        assert!(check_inputs(&parse(&["thumbwork", "formats"])).is_ok());
    }
}
