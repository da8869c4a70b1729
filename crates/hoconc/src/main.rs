use std::io::Read;

use clap::{Parser, ValueEnum};

#[derive(Parser)]
#[command(author, version, about = "Parse, resolve and render a HOCON document")]
struct Args {
    /// Input file to read, or stdin if omitted
    #[arg(short = 'i', long)]
    input: Option<String>,

    /// Output file to write, or stdout if omitted
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Indent width used by non-compact output
    #[arg(short = 'n', long, default_value_t = 2)]
    indent: usize,

    /// Render without insignificant whitespace
    #[arg(short = 'c', long)]
    compact: bool,

    /// Skip substitution resolution and dump the raw parse tree
    #[arg(long)]
    no_resolve: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(ValueEnum, Clone, Copy)]
enum OutputFormat {
    Json,
    Hocon,
    Yaml,
    Properties,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutputFormat::Json => "json",
            OutputFormat::Hocon => "hocon",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Properties => "properties",
        };
        write!(f, "{}", s)
    }
}

impl From<OutputFormat> for hocon::Format {
    fn from(value: OutputFormat) -> Self {
        match value {
            OutputFormat::Json => hocon::Format::Json,
            OutputFormat::Hocon => hocon::Format::Hocon,
            OutputFormat::Yaml => hocon::Format::Yaml,
            OutputFormat::Properties => hocon::Format::Properties,
        }
    }
}

trait OrError<T> {
    fn or_error(self, context: &str) -> T;
}

impl<T, E: std::fmt::Display> OrError<T> for Result<T, E> {
    fn or_error(self, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => exit_with_error(&format!("{}: {}", context, err)),
        }
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("hoconc: {}", message);
    std::process::exit(1);
}

fn read_stdin() -> std::io::Result<String> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt().with_max_level(level).init();
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let text = match &args.input {
        Some(path) if path != "-" => std::fs::read_to_string(path).or_error("could not read input"),
        _ => read_stdin().or_error("could not read stdin"),
    };

    let opts = hocon::ParseOptions {
        resolve: !args.no_resolve,
        ..hocon::ParseOptions::default()
    };

    let tree = hocon::parse_string(&text, &opts).or_error("could not parse input");

    let render_opts = hocon::RenderOptions { indent: args.indent, compact: args.compact };
    let rendered = hocon::render(&tree, args.format.into(), &render_opts);

    match &args.output {
        Some(path) => std::fs::write(path, rendered).or_error("could not write output"),
        None => println!("{}", rendered),
    }
}
