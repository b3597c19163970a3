use std::io::Read;

use geometer_core::prelude::*;

struct Args
{
    verbose: bool,
    progress: bool,
    input: Option<String>,
}

fn parse_args() -> Result<Args, String>
{
    let mut args = Args {
        verbose: false,
        progress: false,
        input: None,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "-v" | "--verbose" => args.verbose = true,
            "--progress" => args.progress = true,
            "-h" | "--help" => {
                println!(
                    "usage: geometer [-v|--verbose] [--progress] [PROBLEM_FILE]\n\n\
                     Reads a problem (`points = givens ? goal`) from the file or stdin,\n\
                     saturates the deduction closure, and reports the goal's verdict."
                );
                std::process::exit(0);
            }
            flag if flag.starts_with('-') => return Err(format!("unknown flag {flag}")),
            path => args.input = Some(path.to_owned()),
        }
    }
    Ok(args)
}

fn read_input(path: Option<&str>) -> std::io::Result<String>
{
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>>
{
    pretty_env_logger::init();
    let args = parse_args()?;
    let text = read_input(args.input.as_deref())?;
    let problem: Problem = text.trim().parse()?;

    let mut engine = Engine::new(problem.points.clone());
    for given in &problem.givens {
        let pred = engine.resolve_parsed(given)?;
        engine.force_pred(&pred)?;
        log::debug!("forced {}", engine.pred_text(&pred));
    }

    engine.deduction_closure(args.verbose, args.progress);
    if args.progress {
        eprintln!();
    }

    match &problem.goal {
        Some(goal) => {
            let pred = engine.resolve_parsed(goal)?;
            println!("{}: {}", engine.pred_text(&pred), engine.check_pred(&pred));
        }
        None => println!("closure complete over {} points", engine.live_points().len()),
    }
    Ok(())
}
