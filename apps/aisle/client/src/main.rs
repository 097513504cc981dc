use aisle_client::{
    BrowseError, Browser, Cli, ClientConfig, NavigationClient, PageEntries, Selection, View,
    ROOT_TITLE,
};
use anyhow::Result;
use clap::Parser;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
commands:
  ls            show the current page
  open <n>      open entry n of the current page
  top <name>    jump to a top-level category (\"Catalog\" for the root)
  back          go to the previous location
  next | prev   change page
  retry         reconnect if needed and reload the current location
  help          show this text
  quit          exit";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::try_from(cli)?;
    let mut browser = Browser::new(NavigationClient::new(config));

    let started = browser.start().await;
    report(&browser, started);

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        print_prompt(&browser);
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        let (command, argument) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            "" => {}
            "ls" => show(&browser),
            "open" => match argument.parse::<usize>() {
                Ok(index) => match browser.select(index).await {
                    Ok(Selection::Opened) => show(&browser),
                    Ok(Selection::Product(item)) => {
                        println!("{}  {}", item.name, item.price);
                        if !item.description.is_empty() {
                            println!("  {}", item.description);
                        }
                        println!("  link: {}", item.location);
                    }
                    Err(err) => explain(err),
                },
                Err(_) => println!("usage: open <n>"),
            },
            "top" if argument.is_empty() => {
                let names: Vec<&str> = browser.menu().iter().map(|n| n.name.as_str()).collect();
                println!("{ROOT_TITLE} | {}", names.join(" | "));
            }
            "top" => {
                let result = browser.open_top_level(argument).await;
                report(&browser, result);
            }
            "back" => {
                let result = browser.back().await;
                report(&browser, result);
            }
            "next" => {
                if browser.next_page() {
                    show(&browser);
                } else {
                    println!("already on the last page");
                }
            }
            "prev" => {
                if browser.previous_page() {
                    show(&browser);
                } else {
                    println!("already on the first page");
                }
            }
            "retry" => {
                let result = browser.retry().await;
                report(&browser, result);
            }
            "help" => println!("{HELP}"),
            "quit" | "exit" => break,
            other => println!("unknown command {other:?}; try `help`"),
        }
    }

    Ok(())
}

fn print_prompt(browser: &Browser) {
    use std::io::Write;

    let title = browser.view().map_or(ROOT_TITLE, |view| view.title.as_str());
    print!("{title}> ");
    let _ = std::io::stdout().flush();
}

fn report(browser: &Browser, result: Result<(), BrowseError>) {
    match result {
        Ok(()) => show(browser),
        Err(err) => explain(err),
    }
}

fn explain(err: BrowseError) {
    match err {
        BrowseError::Client(_) => {
            println!("Sorry... something went wrong. Type `retry` to try again.");
        }
        other => println!("{other}"),
    }
}

fn show(browser: &Browser) {
    match browser.view() {
        Some(view) => render(view),
        None => println!("nothing loaded yet; try `retry`"),
    }
}

fn render(view: &View) {
    println!("== {} ==", view.title);
    match view.entries() {
        PageEntries::Categories(nodes) => {
            for (index, node) in nodes.iter().enumerate() {
                println!("{:>2}. {}", index + 1, node.name);
            }
        }
        PageEntries::Products(items) => {
            for (index, item) in items.iter().enumerate() {
                let was = match &item.old_price {
                    Some(old) if item.is_discounted() => format!(" (was {old})"),
                    _ => String::new(),
                };
                println!("{:>2}. {}  {}{was}", index + 1, item.name, item.price);
            }
        }
    }
    if view.listing.is_empty() {
        println!("(empty)");
    }
    if view.page_count() > 1 {
        let arrows = view.arrows();
        println!(
            "{}page {}/{}{}",
            if arrows.left { "< " } else { "  " },
            view.page(),
            view.page_count(),
            if arrows.right { " >" } else { "" },
        );
    }
}
