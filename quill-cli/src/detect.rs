use clap::{App, Arg, ArgMatches, SubCommand};
use serde_json::json;

use quill::detection::BlogServiceDetector;
use quill::providers::ProviderCatalog;

pub fn command<'a, 'b>() -> App<'a, 'b> {
    SubCommand::with_name("detect")
        .about("Detect which publishing API a homepage offers")
        .arg(
            Arg::with_name("url")
                .takes_value(true)
                .required(true)
                .help("The homepage URL of the weblog"),
        )
        .arg(
            Arg::with_name("username")
                .short("u")
                .long("username")
                .takes_value(true)
                .help("Account username, used to narrow multi-blog services"),
        )
        .arg(
            Arg::with_name("password")
                .short("p")
                .long("password")
                .takes_value(true)
                .help("Account password"),
        )
}

pub async fn run<'a>(args: &ArgMatches<'a>) {
    let url = args.value_of("url").expect("url is required");
    let credentials = super::credentials_from(args);
    let detector = BlogServiceDetector::new(ProviderCatalog::builtin(), credentials, url)
        .expect("Couldn't build the detector");
    let (service, report) = detector.detect().await;

    match service {
        Some(service) => {
            let out = json!({
                "providerId": service.provider_id,
                "clientType": service.client_type,
                "postApiUrl": service.post_api_url,
                "blogId": service.blog_id,
                "blogName": service.blog_name,
                "homepageUrl": service.homepage_url,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&out).expect("Couldn't serialize the result")
            );
        }
        None => println!("No publishing API detected."),
    }
    for error in &report.errors {
        eprintln!("warning: {} {}", error.message_id, error.params.join(" "));
    }
    if report.authentication_error {
        eprintln!("warning: the service rejected these credentials");
    }
}
