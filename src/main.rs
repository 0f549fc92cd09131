use std::fs;
use std::path::PathBuf;

use clap::Parser;

use crate::console::StdConsole;
use crate::processor::Processor;

mod console;
mod exec;
mod memory;
mod processor;

#[derive(Parser, Debug)]
#[command(version, about = "Run a word-machine program from its text image")]
struct Args {
    /// Trace every executed instruction.
    #[arg(short, long)]
    verbose: bool,

    /// Dump registers and flags after the program halts.
    #[arg(short, long)]
    show_state: bool,

    /// Program text to load and run.
    path: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let Some(path) = args.path else {
        println!("no program given, nothing to do (try --help)");
        return Ok(());
    };

    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) => {
            println!("cannot read {}: {err}", path.display());
            return Ok(());
        }
    };

    let program = wordvm_loader::parse_program(&text)?;

    let mut cpu = Processor::new(StdConsole);
    cpu.set_verbose(args.verbose);
    cpu.load(&program);
    let stats = cpu.run(program.entry)?;

    if args.verbose {
        println!("executed {} instructions", stats.instructions);
    }
    if args.show_state {
        cpu.print_state();
    }

    Ok(())
}
