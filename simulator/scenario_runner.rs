// Scenario Runner - Load and execute placement scenario YAML files
//
// Usage:
//   cargo run --bin scenario_runner simulator/scenarios/growing_network.yaml
//   cargo run --bin scenario_runner simulator/scenarios/  (runs all .yaml files in directory)
//   cargo run --bin scenario_runner simulator/scenarios/growing_network.yaml --seed 0x1234...

mod placement;

use placement::{PlacementRunner, ScenarioFile, SimulationError};
use simple_logger::SimpleLogger;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Parsed command line
#[derive(Debug, PartialEq)]
struct Cli {
    path: PathBuf,
    seed: Option<[u8; 32]>,
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("scenario_runner");

    let cli = match parse_args(args.get(1..).unwrap_or_default()) {
        Ok(cli) => cli,
        Err(message) => {
            eprintln!("{}\n", message);
            print_usage(program);
            std::process::exit(2);
        }
    };

    let files = match scenario_files(&cli.path) {
        Ok(files) if !files.is_empty() => files,
        Ok(_) => {
            eprintln!("No .yaml or .yml scenarios in {}", cli.path.display());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Cannot read {}: {}", cli.path.display(), e);
            std::process::exit(1);
        }
    };

    let mut failed = 0;
    for (i, file) in files.iter().enumerate() {
        if files.len() > 1 {
            println!("\n[{}/{}] {}", i + 1, files.len(), file.display());
        }
        println!("Loading scenario from: {}", file.display());
        match try_run_scenario_file(file, cli.seed) {
            Ok(()) => println!("\n✓ Scenario complete!\n"),
            Err(e) => {
                eprintln!("{}: {}", file.display(), e);
                failed += 1;
            }
        }
    }

    if files.len() > 1 {
        println!("{} of {} scenarios completed", files.len() - failed, files.len());
    }
    if failed > 0 {
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <scenario.yaml | directory> [--seed SEED_HEX]", program);
    eprintln!("  {} simulator/scenarios/growing_network.yaml", program);
    eprintln!("  {} simulator/scenarios --seed 0x2a2a...", program);
}

fn parse_args(args: &[String]) -> Result<Cli, String> {
    let mut path = None;
    let mut seed = None;

    let mut rest = args.iter();
    while let Some(arg) = rest.next() {
        if arg == "--seed" {
            let hex = rest.next().ok_or("--seed needs a hex value")?;
            seed = Some(parse_seed_hex(hex)?);
        } else if path.is_none() {
            path = Some(PathBuf::from(arg));
        } else {
            return Err(format!("unexpected argument '{}'", arg));
        }
    }

    let path = path.ok_or("missing scenario path")?;
    Ok(Cli { path, seed })
}

/// The file itself, or the sorted `.yaml`/`.yml` files of a directory
fn scenario_files(path: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !path.is_dir() {
        fs::metadata(path)?;
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = fs::read_dir(path)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|file| {
            matches!(
                file.extension().and_then(|ext| ext.to_str()),
                Some("yaml") | Some("yml")
            )
        })
        .collect();
    files.sort();
    Ok(files)
}

fn try_run_scenario_file(path: &Path, seed: Option<[u8; 32]>) -> Result<(), SimulationError> {
    let scenario = ScenarioFile::load(path)?;

    // Only the first scenario of a directory run gets to install the logger
    let level = scenario.config.output.level_filter()?;
    let _ = SimpleLogger::new().with_level(level).init();

    // Print scenario header
    println!("\n╔════════════════════════════════════════════════════════╗");
    match scenario.meta.name {
        Some(ref name) => println!("║  {}{}║", name, " ".repeat(54_usize.saturating_sub(name.len()))),
        None => println!(
            "║  Scenario: {}",
            path.file_stem().and_then(|s| s.to_str()).unwrap_or("unnamed")
        ),
    }
    println!("╚════════════════════════════════════════════════════════╝\n");

    if let Some(ref desc) = scenario.meta.description {
        println!("{}\n", desc);
    }

    if let Some(ref hypothesis) = scenario.meta.hypothesis {
        println!("Hypothesis:");
        println!("  {}\n", hypothesis);
    }

    let mut config = scenario.config;
    config.seed = seed;

    println!("Configuration:");
    println!("  Rounds: {}", config.rounds);
    println!("  Start: {} every {}", config.network.start, config.network.frequency);
    println!("  Policy: {}", config.network.policy);
    println!("  Initial members: {}", config.initial_state.num_members);
    println!("  Scheduled events: {}", config.events.events.len());
    println!("\nStarting simulation...\n");

    let result = PlacementRunner::new(config)?.run()?;
    result.print_summary();
    Ok(())
}

/// Up to 32 bytes of hex (optional `0x`); missing trailing bytes stay zero
fn parse_seed_hex(hex: &str) -> Result<[u8; 32], String> {
    let digits = hex.strip_prefix("0x").unwrap_or(hex);
    let mut seed = [0u8; 32];

    for (byte, chunk) in seed.iter_mut().zip(digits.as_bytes().chunks(2)) {
        *byte = std::str::from_utf8(chunk)
            .ok()
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
            .ok_or_else(|| format!("invalid hex seed '{}'", hex))?;
    }

    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let cli = parse_args(&args(&["scenarios/a.yaml"])).unwrap();
        assert_eq!(cli.path, PathBuf::from("scenarios/a.yaml"));
        assert_eq!(cli.seed, None);

        let cli = parse_args(&args(&["--seed", "0x0102", "scenarios"])).unwrap();
        assert_eq!(cli.path, PathBuf::from("scenarios"));
        let seed = cli.seed.unwrap();
        assert_eq!(&seed[..3], &[1, 2, 0]);

        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["a.yaml", "--seed"])).is_err());
        assert!(parse_args(&args(&["a.yaml", "b.yaml"])).is_err());
    }

    #[test]
    fn test_parse_seed_hex() {
        assert_eq!(parse_seed_hex("ff").unwrap()[0], 255);
        assert_eq!(parse_seed_hex(&"2a".repeat(40)).unwrap(), [42u8; 32]);
        assert!(parse_seed_hex("0xzz").is_err());
    }

    #[test]
    fn test_scenario_files_in_directory() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("simulator/scenarios");
        let files = scenario_files(&dir).unwrap();
        assert!(files.len() >= 2);
        assert!(files.windows(2).all(|pair| pair[0] <= pair[1]));

        for file in &files {
            let scenario = ScenarioFile::load(file).unwrap();
            assert!(scenario.config.rounds > 0);
        }
        assert!(scenario_files(&dir.join("missing.yaml")).is_err());
    }
}
