use clap::{crate_version, App, Arg};
use std::fs;
use std::io::{self, Write};
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use treelox::config::{Config, FieldPolicy};
use treelox::interpreter::Interpreter;
use treelox::{Report, Status};

// https://rust-cli.github.io/book/in-depth/exit-code.html
const EX_USAGE: i32 = 64;
const EX_DATAERR: i32 = 65;
const EX_NOINPUT: i32 = 66;
const EX_SOFTWARE: i32 = 70;

fn main() {
    init_tracing();
    let matches = App::new("treelox")
        .version(crate_version!())
        .about("Tree-walking interpreter for a small class-based scripting language")
        .arg(
            Arg::with_name("script")
                .help("Script to run; starts a prompt when omitted")
                .index(1),
        )
        .arg(
            Arg::with_name("field-policy")
                .long("field-policy")
                .takes_value(true)
                .possible_values(&["create", "update-only"])
                .default_value("create")
                .help("Whether assigning an unknown property creates it"),
        )
        .arg(
            Arg::with_name("no-warnings")
                .long("no-warnings")
                .help("Don't report unused local variables"),
        )
        .get_matches();

    let field_policy = match matches
        .value_of("field-policy")
        .unwrap_or("create")
        .parse::<FieldPolicy>()
    {
        Ok(policy) => policy,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(EX_USAGE);
        }
    };
    let config = Config {
        field_policy,
        report_warnings: !matches.is_present("no-warnings"),
    };
    debug!(?config, "starting");
    match matches.value_of("script") {
        Some(script) => run_file(script, config),
        None => run_prompt(config),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_file(file: &str, config: Config) {
    let contents = match fs::read_to_string(file) {
        Ok(contents) => contents,
        Err(err) => {
            eprintln!("Cannot read {}: {}", file, err);
            process::exit(EX_NOINPUT);
        }
    };
    let mut interpreter = Interpreter::with_config(config);
    let report = treelox::run(&contents, &mut interpreter);
    print_diagnostics(&report, &contents);
    match report.status {
        Status::Ok => (),
        Status::StaticError => process::exit(EX_DATAERR),
        Status::RuntimeError => process::exit(EX_SOFTWARE),
    }
}

// One interpreter for the whole session so definitions carry over between lines.
fn run_prompt(config: Config) {
    let mut interpreter = Interpreter::with_config(config);
    let stdin = io::stdin();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            return;
        }
        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => return,
            Ok(_) => {
                let report = treelox::run(&line, &mut interpreter);
                print_diagnostics(&report, &line);
            }
            Err(err) => {
                eprintln!("{}", err);
                return;
            }
        }
    }
}

fn print_diagnostics(report: &Report, source: &str) {
    for diagnostic in &report.diagnostics {
        eprintln!("{}", diagnostic.render(source));
    }
}
