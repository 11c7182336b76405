use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use sas7bdat::logger::{log_error, set_log_file};
use sas7bdat::sinks::csv::CsvSink;
use sas7bdat::sinks::{RowSink, SinkContext};
use sas7bdat::SasFile;

/// Converts a SAS7BDAT dataset to delimited text.
#[derive(Parser, Debug)]
#[command(name = "sas2csv", author, version, about)]
struct Args {
    /// Path to the input .sas7bdat file.
    input: PathBuf,

    /// Output path, or `-` for standard output.
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Field delimiter (a single character).
    #[arg(short, long, default_value = ",")]
    delimiter: char,

    /// Suppress the header row of column names.
    #[arg(long)]
    no_headers: bool,

    /// Rows between progress log lines; 0 disables progress reporting.
    #[arg(long, default_value_t = 100_000)]
    step_size: usize,

    /// Append warnings/errors to this file as well as stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print schema information to stderr before converting.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(path) = &args.log_file {
        if let Err(e) = set_log_file(path) {
            eprintln!("warning: could not open log file {}: {e}", path.display());
        }
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> sas7bdat::Result<()> {
    let mut file = SasFile::open(&args.input)?;

    if args.verbose {
        let meta = file.metadata();
        eprintln!(
            "dataset {:?}: {} rows, {} columns, compression={:?}",
            meta.params.dataset_name,
            meta.row_count,
            meta.column_count(),
            meta.compression
        );
    }

    let delimiter = u8::try_from(u32::from(args.delimiter)).unwrap_or(b',');

    if args.output == "-" {
        let stdout = io::stdout();
        let sink = CsvSink::new(BufWriter::new(stdout.lock()))
            .with_delimiter(delimiter)
            .with_headers(!args.no_headers)
            .with_step_size(args.step_size);
        convert(&mut file, sink)
    } else {
        let out = File::create(&args.output).map_err(|source| sas7bdat::Error::Io {
            path: PathBuf::from(&args.output),
            source,
        })?;
        let sink = CsvSink::new(BufWriter::new(out))
            .with_delimiter(delimiter)
            .with_headers(!args.no_headers)
            .with_step_size(args.step_size);
        convert(&mut file, sink)
    }
}

fn convert<W: Write>(
    file: &mut SasFile<impl std::io::Read + std::io::Seek>,
    mut sink: CsvSink<W>,
) -> sas7bdat::Result<()> {
    let metadata = file.metadata().clone();
    sink.begin(SinkContext { metadata: &metadata })?;
    for row in file.rows()? {
        let row = row?;
        sink.write_row(&row)?;
    }
    sink.finish()
}
