use std::io::{self, Write};
use std::{env, fs, process};

use rawlang::{make_global_env, run, Context};

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut ctx = Context::new(make_global_env());

    match args.len() {
        1 => repl(&mut ctx),
        2 => {
            let source = match fs::read_to_string(&args[1]) {
                Ok(source) => source,
                Err(err) => {
                    eprintln!("Could not read '{}': {err}", args[1]);
                    process::exit(1);
                }
            };
            if let Err(err) = run(&source, &mut ctx) {
                eprintln!("{err}");
                process::exit(1);
            }
        }
        _ => {
            eprintln!("Usage: rawlang [script]");
            process::exit(64);
        }
    }
}

/// Line-at-a-time loop over one persistent context, so definitions carry
/// over between entries. Errors are printed and the loop continues.
fn repl(ctx: &mut Context) {
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            return;
        }

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Err(err) = run(line, ctx) {
            eprintln!("{err}");
        }
    }
}
