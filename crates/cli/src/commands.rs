//! Clap command tree.

use clap::{Arg, ArgAction, Command};

/// Build the top-level `veclayer` command.
pub fn build_cli() -> Command {
    Command::new("veclayer")
        .about("Inspect and maintain veclayer collections")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .global(true)
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("backend")
                .long("backend")
                .short('b')
                .value_name("NAME")
                .global(true)
                .help("Backend to use, overriding VECTOR_DB and the config file"),
        )
        .arg(
            Arg::new("prefix")
                .long("prefix")
                .value_name("PREFIX")
                .global(true)
                .help("Collection prefix"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Print JSON instead of text"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Log to stderr (-v info, -vv debug, -vvv trace)"),
        )
        .subcommand(Command::new("backends").about("List registered backends"))
        .subcommand(Command::new("list").about("List collections under the prefix"))
        .subcommand(
            Command::new("has")
                .about("Check whether a collection exists")
                .arg(collection_arg()),
        )
        .subcommand(
            Command::new("get")
                .about("Print every item in a collection")
                .arg(collection_arg()),
        )
        .subcommand(
            Command::new("query")
                .about("Print items whose metadata matches every --where")
                .arg(collection_arg())
                .arg(where_arg().required(true))
                .arg(limit_arg()),
        )
        .subcommand(
            Command::new("search")
                .about("Nearest-neighbour search")
                .arg(collection_arg())
                .arg(
                    Arg::new("vector")
                        .long("vector")
                        .value_name("JSON")
                        .action(ArgAction::Append)
                        .required(true)
                        .help("Query vector as a JSON array; repeat for a batch"),
                )
                .arg(limit_arg()),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete items by id or by metadata")
                .arg(collection_arg())
                .arg(
                    Arg::new("id")
                        .long("id")
                        .value_name("ID")
                        .action(ArgAction::Append)
                        .conflicts_with("where")
                        .help("Item id; repeat for several"),
                )
                .arg(where_arg()),
        )
        .subcommand(
            Command::new("drop")
                .about("Drop a collection")
                .arg(collection_arg()),
        )
        .subcommand(
            Command::new("reset")
                .about("Drop every collection under the prefix")
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .action(ArgAction::SetTrue)
                        .help("Confirm the reset"),
                ),
        )
}

fn collection_arg() -> Arg {
    Arg::new("collection")
        .required(true)
        .value_name("COLLECTION")
        .help("Logical collection name")
}

fn where_arg() -> Arg {
    Arg::new("where")
        .long("where")
        .short('w')
        .value_name("KEY=VALUE")
        .action(ArgAction::Append)
        .help("Metadata equality; VALUE is a JSON literal or a bare string")
}

fn limit_arg() -> Arg {
    Arg::new("limit")
        .long("limit")
        .short('n')
        .value_name("N")
        .help("Maximum results (0 or absent means unlimited)")
}
