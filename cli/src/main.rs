use clap::{Arg, ArgAction, ArgMatches, Command};
use stagehand_core::ast::generate_ast_from_source;
use stagehand_core::{CompileOptions, Source, compile_source_to_namespace};
use std::fs;

mod output;

fn main() {
    let cli = Command::new("Stagehand CLI")
        .version("0.1.0")
        .about("Lowers workflow documents into a platform-neutral applet IR");

    let cli = setup_cli(cli);
    let matches = cli.get_matches();
    dispatch_commands(&matches);
}

/// Sets up the CLI with subcommands and arguments.
fn setup_cli(cli: Command) -> Command {
    cli.subcommand(
        Command::new("build")
            .about("Lower the specified workflow document to IR")
            .arg(
                Arg::new("file")
                    .help("The workflow document to lower")
                    .required(true)
                    .index(1),
            )
            .arg(
                Arg::new("output")
                    .help("Write the namespace JSON to this file instead of stdout")
                    .short('o')
                    .long("output")
                    .value_parser(clap::value_parser!(String))
                    .value_name("FILE"),
            )
            .arg(
                Arg::new("folder")
                    .help("Destination folder applets compile into")
                    .long("folder")
                    .value_parser(clap::value_parser!(String))
                    .value_name("FOLDER"),
            )
            .arg(
                Arg::new("reorg")
                    .help("Append the output-reorganization applet")
                    .long("reorg")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("dump")
                    .help("Specify the dump stage")
                    .short('d')
                    .long("dump")
                    .value_parser(clap::value_parser!(String))
                    .value_name("STAGE"),
            ),
    )
    .subcommand(
        Command::new("inspect")
            .about("Show the applets and stages a document lowers into")
            .arg(
                Arg::new("file")
                    .help("The workflow document to inspect")
                    .required(true)
                    .index(1),
            ),
    )
}

/// Dispatches the command based on the parsed arguments.
fn dispatch_commands(matches: &ArgMatches) {
    match matches.subcommand() {
        Some(("build", sub_m)) => {
            let file = sub_m.get_one::<String>("file").expect("required argument");
            let source = match Source::new(std::path::PathBuf::from(file)) {
                Ok(source) => source,
                Err(e) => {
                    output::print_diagnostic(e.as_ref());
                    std::process::exit(1);
                }
            };

            if let Some(dump_stage) = sub_m.get_one::<String>("dump") {
                match dump_stage.as_str() {
                    "ast" => match generate_ast_from_source(&source) {
                        Ok(ast) => println!("{:#?}", ast),
                        Err(e) => {
                            output::print_diagnostic(e.as_ref());
                            std::process::exit(1);
                        }
                    },
                    other => {
                        eprintln!("Unknown dump stage: {}", other);
                        std::process::exit(2);
                    }
                }
                return;
            }

            let options = CompileOptions {
                destination: sub_m
                    .get_one::<String>("folder")
                    .cloned()
                    .unwrap_or_else(|| "/".to_string()),
                reorg: sub_m.get_flag("reorg"),
            };
            let namespace = match compile_source_to_namespace(&source, options) {
                Ok(namespace) => namespace,
                Err(e) => {
                    output::print_diagnostic(e.as_ref());
                    std::process::exit(1);
                }
            };

            let rendered = serde_json::to_string_pretty(&namespace)
                .expect("namespace serialization cannot fail");
            match sub_m.get_one::<String>("output") {
                Some(path) => {
                    if let Err(e) = fs::write(path, rendered) {
                        eprintln!("Failed to write {}: {}", path, e);
                        std::process::exit(1);
                    }
                }
                None => println!("{}", rendered),
            }
        }
        Some(("inspect", sub_m)) => {
            let file = sub_m.get_one::<String>("file").expect("required argument");
            let source = match Source::new(std::path::PathBuf::from(file)) {
                Ok(source) => source,
                Err(e) => {
                    output::print_diagnostic(e.as_ref());
                    std::process::exit(1);
                }
            };
            match compile_source_to_namespace(&source, CompileOptions::default()) {
                Ok(namespace) => output::print_namespace_tables(&namespace),
                Err(e) => {
                    output::print_diagnostic(e.as_ref());
                    std::process::exit(1);
                }
            }
        }
        _ => {
            println!("No valid subcommand was used. Use --help for more information.");
        }
    }
}
