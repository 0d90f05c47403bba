use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;

use citechat::controller::{ConversationController, SubmitOutcome};
use citechat::geometry::{FixedLayout, Rect, Viewport};
use citechat::input::InputBox;
use citechat::models::MessageId;
use citechat::popup::{Visibility, LINK_CLASS};
use citechat::render::{ChatView, ClickOutcome};
use citechat::transport::HttpTransport;

#[derive(Parser, Debug)]
#[command(name = "chat")]
#[command(about = "Terminal chat client with numbered source popups")]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server: String,
    #[arg(long, default_value_t = 1280.0)]
    width: f32,
    #[arg(long, default_value_t = 800.0)]
    height: f32,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    let local = LocalSet::new();
    local.block_on(&runtime, run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let transport = HttpTransport::new(cli.server.clone());
    let view = Rc::new(RefCell::new(ChatView::default()));
    let controller = ConversationController::new(Rc::clone(&view), transport.clone(), transport);
    let layout = FixedLayout::new(
        Viewport {
            width: cli.width,
            height: cli.height,
        },
        Rect::new(cli.width / 2.0, cli.height / 2.0, 12.0, 16.0),
    );

    println!("Connected to {}. Commands: :source N, :hide, :quit", cli.server);

    let mut input = InputBox::new();
    let mut last_answer: Option<MessageId> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end();
        if line == ":quit" {
            break;
        }
        if line == ":hide" {
            let container = view.borrow().container();
            view.borrow_mut().dispatch_click(container, &layout);
            continue;
        }
        if let Some(number) = line.strip_prefix(":source") {
            match (last_answer, number.trim().parse::<usize>()) {
                (Some(message), Ok(position)) => {
                    show_source(&view, &layout, message, position);
                }
                _ => println!("usage: :source N (after an answer)"),
            }
            continue;
        }

        input.set_value(line);
        match controller.submit_input(&mut input).await {
            SubmitOutcome::Rejected => {}
            SubmitOutcome::Answered { message, .. } => {
                print_message(&view.borrow(), message);
                last_answer = Some(message);
            }
            SubmitOutcome::Failed { message } => print_message(&view.borrow(), message),
        }
    }

    Ok(())
}

fn print_message(view: &ChatView, message: MessageId) {
    let Some(text) = view.message_text(message) else {
        return;
    };
    println!("bot> {text}");
    let citations = view.citations(message);
    if !citations.is_empty() {
        let labels: Vec<String> = citations
            .iter()
            .enumerate()
            .map(|(position, (_, key))| format!("{}=[{}]", position + 1, key.citation))
            .collect();
        println!("     sources: {}", labels.join(" "));
    }
}

/// Clicks the `position`-th citation of `message` and prints the popup if it
/// opened.
fn show_source(
    view: &Rc<RefCell<ChatView>>,
    layout: &FixedLayout,
    message: MessageId,
    position: usize,
) {
    let mut view = view.borrow_mut();
    let citations = view.citations(message);
    let found = position.checked_sub(1).and_then(|i| citations.get(i));
    let Some(&(anchor, _)) = found else {
        println!("no citation {position}");
        return;
    };

    match view.dispatch_click(anchor, layout) {
        ClickOutcome::Toggled {
            key,
            visibility: Visibility::Shown,
        } => {
            let Some(entry) = view.popups().entry(key) else {
                return;
            };
            let doc = view.document();
            let position = doc
                .style(entry.element)
                .and_then(|style| style.left.zip(style.top))
                .unwrap_or_default();
            println!(
                "--- source [{}] at ({:.0}, {:.0})",
                key.citation, position.0, position.1
            );
            match entry.content_slot {
                Some(slot) => println!("{}", doc.text_content(slot)),
                None => println!("(source unavailable)"),
            }
            for link in doc.find_by_class_in(entry.element, LINK_CLASS) {
                if let Some(href) = doc.attr(link, "href") {
                    println!("{href}");
                }
            }
        }
        ClickOutcome::Toggled { .. } => println!("(source hidden)"),
        _ => {}
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
