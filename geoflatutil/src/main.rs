use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geoflat::{process_table, DriverManager, ExportOptions, TableOptions, TableSource};
use geozero::geojson::GeoJsonWriter;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_log::log::info;

#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Log verbosity.
    ///
    /// Use `-v` for "info", `-vv` for "debug", `-vvv` for "trace".
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    log_verbose_count: u8,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert between shapefile, dBase and GeoJSON, picked by file extension.
    Convert {
        input: PathBuf,
        output: PathBuf,

        /// Encoding of the input attributes, overriding the file's own
        #[clap(long)]
        input_encoding: Option<String>,

        /// Encoding of the written attributes
        #[clap(long)]
        encoding: Option<String>,

        /// Replace existing output files
        #[clap(long)]
        overwrite: bool,

        /// Spatial reference id of the output
        #[clap(long)]
        srid: Option<i32>,

        /// Decimals kept in GeoJSON coordinates
        #[clap(long, default_value_t = 9)]
        max_decimal_digits: u8,
    },
    /// Print the schema and the first rows of a file.
    Info {
        input: PathBuf,

        /// Number of rows to print
        #[clap(short = 'n', long, default_value_t = 5)]
        rows: u64,
    },
    /// Write a file as a GeoJSON feature collection to stdout.
    Cat { input: PathBuf },
}

fn setup_logging(verbose: u8) -> Result<()> {
    use tracing_subscriber::{util::SubscriberInitExt, EnvFilter, FmtSubscriber};

    tracing_log::LogTracer::init().context("tracing log init")?;

    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_new(filter).context("set up log env filter")?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    subscriber.try_init().context("init logging subscriber")?;

    Ok(())
}

fn open(manager: &DriverManager, path: &Path, encoding: Option<String>) -> Result<Box<dyn TableSource>> {
    let options = TableOptions {
        encoding,
        ..Default::default()
    };
    manager
        .open_table(path, options)
        .with_context(|| format!("open {}", path.display()))
}

fn info(manager: &DriverManager, path: &Path, rows: u64) -> Result<()> {
    let mut table = open(manager, path, None)?;
    let ext = geoflat::extension(path).unwrap_or_default();
    let mut out = std::io::stdout().lock();
    writeln!(out, "format: {}", manager.format_description(&ext))?;
    writeln!(out, "rows: {}", table.row_count())?;
    writeln!(out, "srid: {}", table.srid())?;
    writeln!(out, "columns:")?;
    for column in table.columns() {
        writeln!(out, "  {} {:?}", column.name, column.column_type)?;
    }
    let origin = table.key_origin();
    for key in origin..origin + rows.min(table.row_count()) {
        let row = table.get_row(key)?;
        let values: Vec<String> = row.values.iter().map(|v| v.to_string()).collect();
        writeln!(out, "{key}: {}", values.join(" | "))?;
    }
    table.close()?;
    Ok(())
}

fn cat(manager: &DriverManager, path: &Path) -> Result<()> {
    let mut table = open(manager, path, None)?;
    let name = path.file_stem().map(|s| s.to_string_lossy().into_owned());
    let mut out = BufWriter::new(std::io::stdout().lock());
    let mut writer = GeoJsonWriter::new(&mut out);
    process_table(table.as_mut(), name.as_deref(), &mut writer)?;
    out.flush()?;
    table.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.log_verbose_count)?;
    let manager = DriverManager::new();

    match args.cmd {
        Command::Convert {
            input,
            output,
            input_encoding,
            encoding,
            overwrite,
            srid,
            max_decimal_digits,
        } => {
            let mut table = open(&manager, &input, input_encoding)?;
            let options = ExportOptions {
                encoding,
                delete_existing: overwrite,
                max_decimal_digits,
                srid,
            };
            let written = manager
                .export_table(table.as_mut(), &output, &options)
                .with_context(|| format!("export to {}", output.display()))?;
            table.close()?;
            for path in written {
                info!("wrote {}", path.display());
            }
        }
        Command::Info { input, rows } => info(&manager, &input, rows)?,
        Command::Cat { input } => cat(&manager, &input)?,
    }

    Ok(())
}
