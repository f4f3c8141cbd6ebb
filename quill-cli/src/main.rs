use clap::App;
use std::io::{self, prelude::*};
use std::str::FromStr;
use std::sync::Arc;

use clap::ArgMatches;
use quill::clients::{create_client, BlogClient, ClientType};
use quill::credentials::CredentialsAccessor;

mod blogs;
mod detect;
mod posts;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut app = App::new("Quill CLI")
        .bin_name("qll")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Command-line tools for talking to weblog publishing APIs.")
        .subcommand(detect::command())
        .subcommand(blogs::command())
        .subcommand(posts::command());
    let matches = app.clone().get_matches();

    match matches.subcommand() {
        ("detect", Some(args)) => detect::run(args).await,
        ("blogs", Some(args)) => blogs::run(args).await,
        ("posts", Some(args)) => posts::run(args).await,
        _ => app.print_help().expect("Couldn't print help"),
    };
}

pub fn ask_for(something: &str) -> String {
    print!("{}: ", something);
    io::stdout().flush().expect("Couldn't flush STDOUT");
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .expect("Unable to read line");
    input.retain(|c| c != '\n');
    input
}

pub fn credentials_from(args: &ArgMatches<'_>) -> CredentialsAccessor {
    let username = args
        .value_of("username")
        .map(String::from)
        .unwrap_or_else(|| ask_for("Username"));
    let password = args
        .value_of("password")
        .map(String::from)
        .unwrap_or_else(|| ask_for("Password"));
    CredentialsAccessor::new(username, password)
}

pub fn client_from(args: &ArgMatches<'_>) -> Arc<dyn BlogClient> {
    let client_type = ClientType::from_str(args.value_of("type").unwrap_or("atom"))
        .expect("Unknown client type");
    let endpoint = args.value_of("endpoint").unwrap_or("");
    create_client(client_type, endpoint, credentials_from(args))
        .expect("Couldn't construct the client")
}
