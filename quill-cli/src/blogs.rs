use clap::{App, Arg, ArgMatches, SubCommand};
use serde_json::json;

pub fn account_args<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    app.arg(
        Arg::with_name("type")
            .short("t")
            .long("type")
            .takes_value(true)
            .help("Client type: atom, blogger, livejournal or google"),
    )
    .arg(
        Arg::with_name("endpoint")
            .short("e")
            .long("endpoint")
            .takes_value(true)
            .help("The post API endpoint URL"),
    )
    .arg(
        Arg::with_name("username")
            .short("u")
            .long("username")
            .takes_value(true)
            .help("Account username"),
    )
    .arg(
        Arg::with_name("password")
            .short("p")
            .long("password")
            .takes_value(true)
            .help("Account password"),
    )
}

pub fn command<'a, 'b>() -> App<'a, 'b> {
    account_args(SubCommand::with_name("blogs").about("List the blogs the account can post to"))
}

pub async fn run<'a>(args: &ArgMatches<'a>) {
    let client = super::client_from(args);
    let blogs = client
        .get_users_blogs()
        .await
        .expect("Couldn't list the account's blogs");
    let out: Vec<_> = blogs
        .iter()
        .map(|b| {
            json!({
                "id": b.id,
                "name": b.name,
                "homepageUrl": b.homepage_url,
            })
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&out).expect("Couldn't serialize the result")
    );
}
