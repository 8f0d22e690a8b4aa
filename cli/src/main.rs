use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use studybox_core::{DecodeSession, DecoderConfig, Emission, StudyboxError};
use thiserror::Error;

#[derive(Parser)]
#[command(name = "studybox")]
#[command(about = "Decode Studybox cassette recordings into .studybox containers")]
struct Cli {
    /// 16-bit stereo WAV recordings (default: every *.wav in the current directory)
    #[arg(value_name = "INPUT.WAV")]
    inputs: Vec<PathBuf>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Wav {
        path: PathBuf,
        source: hound::Error,
    },

    #[error("{path}: expected 16-bit stereo PCM, found {channels} channel(s) at {bits} bits")]
    UnsupportedFormat {
        path: PathBuf,
        channels: u16,
        bits: u16,
    },

    #[error("{path}: {source}")]
    Decode {
        path: PathBuf,
        source: StudyboxError,
    },
}

/// How a single recording ended up
enum FileOutcome {
    Container { pages: usize, output: PathBuf },
    Diagnostics { failed: usize, pages: usize, output: PathBuf },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let inputs = if cli.inputs.is_empty() {
        match wav_files_in(Path::new(".")) {
            Ok(found) => found,
            Err(e) => {
                log::error!("Cannot list current directory: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        cli.inputs
    };

    if inputs.is_empty() {
        println!("No WAV files to process");
        return ExitCode::SUCCESS;
    }

    let mut all_ok = true;
    for input in &inputs {
        match process_file(input) {
            Ok(FileOutcome::Container { pages, output }) => {
                println!("{}: {} page(s) -> {}", input.display(), pages, output.display());
            }
            Ok(FileOutcome::Diagnostics { failed, pages, output }) => {
                println!(
                    "{}: {} of {} page(s) failed, diagnostics in {}",
                    input.display(),
                    failed,
                    pages,
                    output.display()
                );
                all_ok = false;
            }
            Err(e) => {
                log::error!("{}", e);
                all_ok = false;
            }
        }
    }

    if all_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// `*.wav` files directly inside `dir`, sorted by name
fn wav_files_in(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_wav = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
        if is_wav && path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

fn check_format(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    let reader = hound::WavReader::new(bytes).map_err(|source| CliError::Wav {
        path: path.to_path_buf(),
        source,
    })?;
    let spec = reader.spec();
    println!(
        "Read WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    if spec.channels != 2
        || spec.bits_per_sample != 16
        || spec.sample_format != hound::SampleFormat::Int
    {
        return Err(CliError::UnsupportedFormat {
            path: path.to_path_buf(),
            channels: spec.channels,
            bits: spec.bits_per_sample,
        });
    }
    Ok(())
}

/// Output directory for a recording: `<dir>/<stem>/` next to the input
fn output_dir(input: &Path) -> PathBuf {
    input.with_extension("")
}

fn write(path: &Path, contents: &[u8]) -> Result<(), CliError> {
    fs::write(path, contents).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Remove an output left over from an earlier run with a different outcome
fn remove_stale(path: &Path) -> Result<(), CliError> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(CliError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
        _ => Ok(()),
    }
}

fn process_file(input: &Path) -> Result<FileOutcome, CliError> {
    log::info!("Processing: {}", input.display());

    let bytes = fs::read(input).map_err(|source| CliError::Io {
        path: input.to_path_buf(),
        source,
    })?;
    check_format(input, &bytes)?;

    let decode_error = |source: StudyboxError| CliError::Decode {
        path: input.to_path_buf(),
        source,
    };

    let session =
        DecodeSession::from_wav(&bytes, DecoderConfig::default()).map_err(decode_error)?;
    let report = session.run();
    println!(
        "Decoded {} page(s), {} filtered retr{}",
        report.pages.len(),
        report.retries,
        if report.retries == 1 { "y" } else { "ies" }
    );

    let dir = output_dir(input);
    fs::create_dir_all(&dir).map_err(|source| CliError::Io {
        path: dir.clone(),
        source,
    })?;

    for page in &report.pages {
        write(&dir.join(page.dump_name()), &page.payload)?;
    }

    let stem = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());

    let container_path = dir.join(format!("{}.studybox", stem));
    let errors_path = dir.join(format!("{}.errors.txt", stem));
    let summary_path = dir.join(format!("{}.pages.txt", stem));

    match Emission::build(&report, &bytes).map_err(decode_error)? {
        Emission::Container(container) => {
            remove_stale(&errors_path)?;
            remove_stale(&summary_path)?;
            write(&container_path, &container)?;
            Ok(FileOutcome::Container {
                pages: report.pages.len(),
                output: container_path,
            })
        }
        Emission::Diagnostics {
            error_log,
            page_summary,
        } => {
            remove_stale(&container_path)?;
            write(&errors_path, error_log.as_bytes())?;
            write(&summary_path, page_summary.as_bytes())?;
            Ok(FileOutcome::Diagnostics {
                failed: report.failed_pages(),
                pages: report.pages.len(),
                output: summary_path,
            })
        }
    }
}
