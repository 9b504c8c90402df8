use clap::Parser;
use dirs::home_dir;
use log::{debug, info};
use nu_ansi_term::{Color, Style};
use reedline::{DefaultHinter, FileBackedHistory, Reedline, Signal};
use specenv::{
    cli::{Args, Commands},
    error::Result,
    interpreter::Interpreter,
    repl::{REPLPrompt, REPLValidator, SyntaxHighlighter},
    stdlib::create_standard_registry,
};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

fn standard_interpreter() -> Result<Interpreter> {
    Ok(Interpreter::with_factories(create_standard_registry()?))
}

fn run_file(file: PathBuf) -> Result<()> {
    let mut interpreter = standard_interpreter()?;
    interpreter.eval_file(&file)?;
    interpreter.print_env(&mut io::stdout().lock())
}

fn check_file(file: PathBuf) -> Result<()> {
    let mut interpreter = standard_interpreter()?;
    interpreter.eval_file(&file)?;
    println!("{}: ok", file.display());
    Ok(())
}

fn run_repl() -> Result<()> {
    let mut line_editor = Reedline::create()
        .with_hinter(Box::new(
            DefaultHinter::default().with_style(Style::new().italic().fg(Color::LightGray)),
        ))
        .with_highlighter(Box::new(SyntaxHighlighter))
        .with_validator(Box::new(REPLValidator));

    // Add file-backed history if possible
    if let Some(history) = home_dir()
        .map(|home| home.join(".specenv_history"))
        .and_then(|path| FileBackedHistory::with_file(20, path).ok())
        .map(Box::new)
    {
        line_editor = line_editor.with_history(history);
    } else {
        eprintln!("NOTE: Failed to load history. Persistence is now disabled.")
    }

    let prompt = REPLPrompt;
    let mut interpreter = standard_interpreter()?;

    loop {
        match line_editor.read_line(&prompt)? {
            Signal::Success(buffer) => match buffer.trim() {
                ":env" => interpreter.print_env(&mut io::stdout().lock())?,
                ":factories" => interpreter.print_factories(&mut io::stdout().lock())?,
                source => {
                    interpreter
                        .eval_str(source)
                        .inspect_err(|err| {
                            eprintln!("{}", err);
                        })
                        .ok();
                }
            },
            Signal::CtrlD | Signal::CtrlC => {
                break Ok(());
            }
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level()))
        .init();

    let result = match args.command {
        Commands::Run { file } => {
            info!("FILE MODE");
            debug!("file: {:?}", file);
            run_file(file)
        }
        Commands::Check { file } => {
            info!("CHECK MODE");
            debug!("file: {:?}", file);
            check_file(file)
        }
        Commands::Repl => {
            info!("REPL MODE");
            run_repl()
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
