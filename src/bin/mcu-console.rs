use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use mcu_util::logging::{self, perf};
use mcu_util::{AllocatorConfig, CommandTable, Error, Heap};

const PROMPT: &str = "mcu:~$ ";

fn usage() -> String {
    "usage: mcu-console [--config <pools.toml>]".to_string()
}

fn parse_args() -> Result<Option<PathBuf>, String> {
    let mut args = std::env::args().skip(1);
    let mut config = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().ok_or_else(usage)?;
                config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => return Err(usage()),
            other => return Err(format!("unknown argument '{}'\n{}", other, usage())),
        }
    }

    Ok(config)
}

fn run() -> Result<(), String> {
    let config = match parse_args()? {
        Some(path) => AllocatorConfig::load(&path).map_err(|e| e.to_string())?,
        None => AllocatorConfig::default(),
    };

    let heap = Heap::from_config(&config).map_err(|e| e.to_string())?;
    let table = CommandTable::with_builtins(&heap).map_err(|e| e.to_string())?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        print!("{}", PROMPT);
        stdout.flush().map_err(|e| e.to_string())?;

        line.clear();
        let read = stdin.lock().read_line(&mut line).map_err(|e| e.to_string())?;
        if read == 0 {
            println!();
            return Ok(());
        }

        let command = line.trim();
        let mut output = String::new();
        let result = {
            let _timer = perf::track("console_command");
            table.execute(command, &heap, &mut output)
        };

        print!("{}", output);
        match result {
            Ok(()) => {}
            Err(e @ Error::UnknownCommand { .. }) => println!("{}", e),
            Err(e) => println!("{} ({})", e, e.errno()),
        }
    }
}

fn main() {
    logging::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
