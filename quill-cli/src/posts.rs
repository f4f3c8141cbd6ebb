use clap::{App, Arg, ArgMatches, SubCommand};
use serde_json::json;

use quill::posts::BlogPost;

use crate::blogs::account_args;

fn blog_id_arg<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    app.arg(
        Arg::with_name("blog-id")
            .short("b")
            .long("blog-id")
            .takes_value(true)
            .help("The blog to operate on"),
    )
}

pub fn command<'a, 'b>() -> App<'a, 'b> {
    SubCommand::with_name("posts")
        .about("Manage posts")
        .subcommand(blog_id_arg(account_args(
            SubCommand::with_name("recent")
                .about("List recent posts")
                .arg(
                    Arg::with_name("max")
                        .short("m")
                        .long("max")
                        .takes_value(true)
                        .help("How many posts to fetch"),
                ),
        )))
        .subcommand(blog_id_arg(account_args(
            SubCommand::with_name("categories").about("List the blog's categories"),
        )))
        .subcommand(blog_id_arg(account_args(
            SubCommand::with_name("new")
                .about("Publish a new post")
                .arg(
                    Arg::with_name("title")
                        .short("T")
                        .long("title")
                        .takes_value(true)
                        .help("The post title"),
                )
                .arg(
                    Arg::with_name("content")
                        .short("c")
                        .long("content")
                        .takes_value(true)
                        .help("The post body, as HTML"),
                )
                .arg(
                    Arg::with_name("draft")
                        .short("d")
                        .long("draft")
                        .help("Save as a draft instead of publishing"),
                ),
        )))
        .subcommand(blog_id_arg(account_args(
            SubCommand::with_name("delete")
                .about("Delete a post")
                .arg(
                    Arg::with_name("post-id")
                        .long("post-id")
                        .takes_value(true)
                        .required(true)
                        .help("The post to delete"),
                ),
        )))
}

pub async fn run<'a>(args: &ArgMatches<'a>) {
    match args.subcommand() {
        ("recent", Some(x)) => recent(x).await,
        ("categories", Some(x)) => categories(x).await,
        ("new", Some(x)) => new(x).await,
        ("delete", Some(x)) => delete(x).await,
        _ => println!("Unknown subcommand"),
    }
}

fn blog_id<'a>(args: &ArgMatches<'a>) -> String {
    args.value_of("blog-id")
        .map(String::from)
        .unwrap_or_else(|| super::ask_for("Blog id"))
}

async fn recent<'a>(args: &ArgMatches<'a>) {
    let client = super::client_from(args);
    let max = args
        .value_of("max")
        .map(|m| m.parse().expect("--max must be a number"))
        .unwrap_or(10);
    let posts = client
        .get_recent_posts(&blog_id(args), max, true, None)
        .await
        .expect("Couldn't fetch recent posts");
    let out: Vec<_> = posts
        .iter()
        .map(|p| {
            json!({
                "id": p.id,
                "title": p.title,
                "datePublished": p.date_published,
                "permalink": p.permalink,
                "categories": p.categories.iter().map(|c| &c.label).collect::<Vec<_>>(),
            })
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&out).expect("Couldn't serialize the result")
    );
}

async fn categories<'a>(args: &ArgMatches<'a>) {
    let client = super::client_from(args);
    let categories = client
        .get_categories(&blog_id(args))
        .await
        .expect("Couldn't fetch categories");
    for category in categories {
        println!("{}", category.label);
    }
}

async fn new<'a>(args: &ArgMatches<'a>) {
    let client = super::client_from(args);
    let mut post = BlogPost::default();
    post.title = args
        .value_of("title")
        .map(String::from)
        .unwrap_or_else(|| super::ask_for("Title"));
    post.contents = args
        .value_of("content")
        .map(String::from)
        .unwrap_or_else(|| super::ask_for("Content"));
    let publish = !args.is_present("draft");
    let result = client
        .new_post(&blog_id(args), &post, None, publish)
        .await
        .expect("Couldn't publish the post");
    println!("Published post {}", result.post_id);
}

async fn delete<'a>(args: &ArgMatches<'a>) {
    let client = super::client_from(args);
    let post_id = args.value_of("post-id").expect("post-id is required");
    client
        .delete_post(&blog_id(args), post_id, true)
        .await
        .expect("Couldn't delete the post");
    println!("Deleted post {}", post_id);
}
