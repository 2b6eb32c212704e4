use anyhow::{anyhow, bail, Context, Result};
use squish::util::{TrackedRead, TrackedWrite};
use squish::{Algorithm, Compression, Middleware};
use std::env;
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::{self, Read, Write};
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn short_opt<I: Iterator<Item = OsString>>(
    opt: u8,
    arg: &OsStr,
    argv: &mut I,
) -> Option<OsString> {
    let bytes = arg.as_encoded_bytes();
    if bytes.len() < 2 || bytes[0] != b'-' || bytes[1] != opt {
        return None;
    }

    if bytes.len() == 2 {
        return argv.next();
    }

    // SAFETY: splits right after the ASCII "-x".
    Some(unsafe { OsStr::from_encoded_bytes_unchecked(&bytes[2..]) }.to_owned())
}

fn open_input(path: Option<OsString>) -> Result<Box<dyn Read>> {
    match path {
        Some(p) if p != "-" => {
            let f = File::open(&p).with_context(|| format!("opening {}", p.to_string_lossy()))?;
            Ok(Box::new(f))
        }
        _ => Ok(Box::new(io::stdin())),
    }
}

fn open_output(path: Option<OsString>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) if p != "-" => {
            let f =
                File::create(&p).with_context(|| format!("creating {}", p.to_string_lossy()))?;
            Ok(Box::new(f))
        }
        _ => Ok(Box::new(io::stdout())),
    }
}

/// Reads just enough of `input` to guess its format, then puts those bytes
/// back in front of the rest.
fn sniff(mut input: Box<dyn Read>) -> Result<(Algorithm, Box<dyn Read>)> {
    let mut head = Vec::with_capacity(3);
    input
        .by_ref()
        .take(3)
        .read_to_end(&mut head)
        .context("reading stream header")?;

    let algorithm = Algorithm::detect(&head)
        .ok_or_else(|| anyhow!("Unrecognized compression format, pass '-c'"))?;
    Ok((algorithm, Box::new(io::Cursor::new(head).chain(input))))
}

fn cmd_compress(input: Box<dyn Read>, output: Box<dyn Write>, comp: Compression) -> Result<()> {
    let mut input = TrackedRead::new(input);
    let mut w = comp.writer(TrackedWrite::new(output))?;
    io::copy(&mut input, &mut w).context("compressing input")?;

    let mut output = w.finish()?;
    output.flush()?;

    info!(
        algorithm = %comp.algorithm(),
        level = comp.level().get(),
        raw = input.read_count(),
        compressed = output.written(),
        "compressed"
    );
    Ok(())
}

fn cmd_decompress(
    input: Box<dyn Read>,
    output: Box<dyn Write>,
    algorithm: Option<Algorithm>,
) -> Result<()> {
    let (algorithm, input) = match algorithm {
        Some(algorithm) => (algorithm, input),
        None => sniff(input)?,
    };

    let mut r = Compression::new(algorithm).reader(TrackedRead::new(input))?;
    let mut output = TrackedWrite::new(output);
    io::copy(&mut r, &mut output).context("decompressing input")?;
    output.flush()?;

    let input = r.finish();
    info!(
        algorithm = %algorithm,
        compressed = input.read_count(),
        raw = output.written(),
        "decompressed"
    );
    Ok(())
}

fn usage(argv0: &str) {
    println!("Usage:");
    println!("  {} [options] compress", argv0);
    println!("  {} [options] decompress", argv0);
    println!("  {} -d [options]", argv0);
    println!("Options:");
    println!("  -d: Decompress, same as the 'decompress' subcommand");
    println!("  -i<path>: Input file (default: stdin)");
    println!("  -o<path>: Output file (default: stdout)");
    println!("  -c<format>: Compression format, gzip or zlib (default: gzip,");
    println!("              or detected from the input when decompressing)");
    println!("  -l<level>: Compression level, 1-9 (default: 6)");
    println!("Set RUST_LOG=info for a size summary on stderr.");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Compress,
    Decompress,
    Help,
    Usage,
}

#[derive(Debug)]
struct Options {
    command: Command,
    ipath: Option<OsString>,
    opath: Option<OsString>,
    algorithm: Option<Algorithm>,
    level: Option<i64>,
}

fn parse_args<I: Iterator<Item = OsString>>(mut argv: I) -> Result<Options> {
    let mut opts = Options {
        command: Command::Usage,
        ipath: None,
        opath: None,
        algorithm: None,
        level: None,
    };
    let mut decompress = false;
    let mut args = Vec::<OsString>::new();

    while let Some(arg) = argv.next() {
        if !arg.as_encoded_bytes().starts_with(b"-") || arg == "-" {
            args.push(arg);
            continue;
        }

        if arg == "-h" || arg == "--help" {
            opts.command = Command::Help;
            return Ok(opts);
        } else if arg == "-d" {
            decompress = true;
        } else if let Some(val) = short_opt(b'i', &arg, &mut argv) {
            opts.ipath = Some(val);
        } else if let Some(val) = short_opt(b'o', &arg, &mut argv) {
            opts.opath = Some(val);
        } else if let Some(val) = short_opt(b'c', &arg, &mut argv) {
            opts.algorithm = Some(val.to_string_lossy().parse()?);
        } else if let Some(val) = short_opt(b'l', &arg, &mut argv) {
            let val = val.to_string_lossy();
            opts.level = Some(
                val.parse()
                    .with_context(|| format!("Invalid level: {}", val))?,
            );
        } else {
            bail!("Invalid option: {}", arg.to_string_lossy());
        }
    }

    opts.command = match (args.len(), args.first().and_then(|a| a.to_str())) {
        (0, _) if decompress => Command::Decompress,
        (1, Some("compress")) if decompress => bail!("'-d' conflicts with 'compress'"),
        (1, Some("compress")) => Command::Compress,
        (1, Some("decompress")) => Command::Decompress,
        (1, _) => bail!("Unknown subcommand: {}", args[0].to_string_lossy()),
        _ => Command::Usage,
    };

    Ok(opts)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut argv = env::args_os();
    let argv0 = argv
        .next()
        .map(|a| a.to_string_lossy().to_string())
        .unwrap_or_else(|| "squish".to_owned());
    let opts = parse_args(argv)?;

    match opts.command {
        Command::Help => {
            usage(&argv0);
            Ok(())
        }
        Command::Usage => {
            usage(&argv0);
            process::exit(1);
        }
        Command::Compress => {
            let mut comp = Compression::new(opts.algorithm.unwrap_or(Algorithm::Gzip));
            if let Some(level) = opts.level {
                comp = comp.with_level(level);
            }
            cmd_compress(open_input(opts.ipath)?, open_output(opts.opath)?, comp)
        }
        Command::Decompress => cmd_decompress(
            open_input(opts.ipath)?,
            open_output(opts.opath)?,
            opts.algorithm,
        ),
    }
}
