use azip::cache::BlockCache;
use azip::config::InterpreterConfig;
use azip::display_headless::HeadlessDisplay;
use azip::display_terminal::TerminalDisplay;
use azip::display_trait::Host;
use azip::error::ZError;
use azip::memory::{AddressSpace, MemoryImage};
use azip::storage::FileStorage;
use azip::vm::Vm;
use log::{debug, info};
use std::env;
use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;

/// Cache size used by --cache when the configuration does not give one
const DEFAULT_CACHE_SLOTS: usize = 32;

struct Options {
    story: String,
    config: Option<String>,
    cache: bool,
    headless: bool,
}

fn usage(program: &str) {
    println!("azip - Z-machine interpreter for Infocom and Inform stories");
    println!();
    println!("Usage: {} <story_file> [--config azip.toml] [--cache] [--headless]", program);
    println!();
    println!("  --config <file>  read interpreter settings from a TOML file");
    println!("  --cache          page the story through a block cache instead of");
    println!("                   loading it whole (uses a scratch copy of the story)");
    println!("  --headless       read commands from stdin up front and print the");
    println!("                   transcript at exit");
}

fn parse_args(args: &[String]) -> Result<Option<Options>, String> {
    let mut story = None;
    let mut config = None;
    let mut cache = false;
    let mut headless = false;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => match iter.next() {
                Some(path) => config = Some(path.clone()),
                None => return Err("--config needs a file name".to_string()),
            },
            "--cache" => cache = true,
            "--headless" => headless = true,
            "-h" | "--help" => return Ok(None),
            other if other.starts_with("--") => return Err(format!("Unknown option {}", other)),
            other => story = Some(other.to_string()),
        }
    }

    Ok(story.map(|story| Options {
        story,
        config,
        cache,
        headless,
    }))
}

/// Load the whole story, reporting the common failures in plain words
fn read_story(path: &str) -> Vec<u8> {
    match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            match e.kind() {
                std::io::ErrorKind::NotFound => {
                    eprintln!("Error: Story file not found: {}", path);
                    eprintln!();
                    eprintln!("Please check the file path and that the file is readable.");
                }
                std::io::ErrorKind::PermissionDenied => {
                    eprintln!("Error: Permission denied reading story file: {}", path);
                }
                _ => eprintln!("Error: Cannot read story file '{}': {}", path, e),
            }
            std::process::exit(1);
        }
    }
}

fn open_memory(options: &Options, config: &InterpreterConfig) -> Result<Box<dyn AddressSpace>, ZError> {
    if options.cache || config.cache_slots > 0 {
        let slots = match config.cache_slots {
            0 => DEFAULT_CACHE_SLOTS,
            slots => slots,
        };
        let mut scratch = env::temp_dir();
        scratch.push(format!("azip-{}.dat", std::process::id()));
        let storage = FileStorage::working_copy(&options.story, &scratch)?;
        info!("Using a {} block cache ({:?} eviction)", slots, config.eviction);
        let cache = BlockCache::new(storage, slots, config.eviction, config.random_seed)?;
        Ok(Box::new(cache))
    } else {
        Ok(Box::new(MemoryImage::new(read_story(&options.story))))
    }
}

fn run<H: Host>(mem: Box<dyn AddressSpace>, host: H, config: InterpreterConfig) -> Result<(u16, H), ZError> {
    let mut vm = Vm::new(mem, host, config)?;
    vm.initialize_screen()?;
    vm.restart()?;
    let result = vm.interpret();
    vm.close()?;
    let status = result?;
    debug!("Story finished with status {}", status);
    Ok((status, vm.host))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let options = match parse_args(&args) {
        Ok(Some(options)) => options,
        Ok(None) => {
            usage(&args[0]);
            return Ok(());
        }
        Err(message) => {
            eprintln!("Error: {}", message);
            usage(&args[0]);
            std::process::exit(2);
        }
    };
    let config = match &options.config {
        Some(path) => InterpreterConfig::load(PathBuf::from(path))?,
        None => InterpreterConfig::default(),
    };
    debug!("Configuration: {:?}", config);

    let mem = open_memory(&options, &config)?;
    let result = if options.headless {
        let mut host = HeadlessDisplay::new();
        for line in io::stdin().lock().lines() {
            host.push_line(&line?);
        }
        run(mem, host, config).map(|(status, host)| {
            print!("{}", host.get_output());
            status
        })
    } else {
        let width = config.screen_cols as u16;
        run(mem, TerminalDisplay::new(width), config).map(|(status, _)| status)
    };

    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            eprintln!("\nFatal error: {}", e);
            std::process::exit(1);
        }
    }
}
