use std::error::Error;
use std::time::Duration;

use log::{ debug, info };
use tokio::io::{ self, AsyncBufReadExt, AsyncWriteExt, BufReader };

use super::boundary::{ Recovery, RecoveryBoundary };
use super::session::ChatSession;
use super::state::{ Conversation, ViewEffect };
use super::transport::HttpTransport;
use crate::cli::ChatArgs;
use crate::models::chat::{ ChatMessage, Role };

const PROMPT: &str = "> ";
const HELP: &str = "Commands: /open /close /retry /home /quit. Anything else is sent to Merica.";

/// A line typed at the terminal.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Open,
    Close,
    Retry,
    Home,
    Quit,
    Help,
    Message(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "/open" => Input::Open,
        "/close" => Input::Close,
        "/retry" => Input::Retry,
        "/home" => Input::Home,
        "/quit" | "/exit" => Input::Quit,
        "/help" => Input::Help,
        other => Input::Message(other),
    }
}

fn format_message(message: &ChatMessage) -> String {
    let label = match message.role {
        Role::User => "You",
        Role::Assistant => "Merica",
    };
    let marker = if message.is_error { " [!]" } else { "" };
    format!("[{}] {}{}: {}", message.timestamp.format("%H:%M"), label, marker, message.content)
}

/// Lines for messages appended since `rendered` messages had been shown.
fn render_new(conv: &Conversation, rendered: u64) -> String {
    let fresh = conv.total_appended().saturating_sub(rendered);
    let fresh = usize::try_from(fresh).unwrap_or(usize::MAX).min(conv.messages().len());
    let skip = conv.messages().len() - fresh;
    conv.messages()
        .iter()
        .skip(skip)
        .map(format_message)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Terminal front-end for a running proxy.
struct Terminal {
    session: ChatSession<HttpTransport>,
    boundary: RecoveryBoundary,
    rendered: u64,
}

impl Terminal {
    fn new(session: ChatSession<HttpTransport>) -> Self {
        Self { session, boundary: RecoveryBoundary::new(), rendered: 0 }
    }

    /// Renders the pending part of the transcript through the recovery boundary.
    fn draw(&mut self) -> String {
        let session = &self.session;
        let rendered = &mut self.rendered;
        let mut wants_prompt = false;
        let output = self.boundary.render(|| {
            session
                .with(|conv| {
                    let text = render_new(conv, *rendered);
                    *rendered = conv.total_appended();
                    wants_prompt = conv
                        .drain_effects()
                        .contains(&ViewEffect::FocusInput);
                    if !conv.is_open() {
                        return format!("{}\n(chat closed, /open to continue)", text);
                    }
                    text
                })
                .unwrap_or_default()
        });
        if wants_prompt {
            debug!("Focus requested for input");
        }
        output
    }

    fn go_home(&mut self) {
        if self.boundary.go_home() == Recovery::Home {
            self.session.teardown();
            self.session = ChatSession::with_transport(self.session.transport().clone());
            self.rendered = 0;
            self.session.open();
        }
    }
}

async fn write_out(out: &mut io::Stdout, text: &str) -> io::Result<()> {
    if !text.trim().is_empty() {
        out.write_all(text.trim_start_matches('\n').as_bytes()).await?;
        out.write_all(b"\n").await?;
    }
    out.write_all(PROMPT.as_bytes()).await?;
    out.flush().await
}

pub async fn run(args: ChatArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let transport = HttpTransport::new(args.endpoint.clone(), Duration::from_secs(args.timeout_secs))?;
    info!("Chatting with proxy at {}", transport.endpoint());

    let mut terminal = Terminal::new(ChatSession::new(transport));
    terminal.session.open();

    let mut stdout = io::stdout();
    let mut lines = BufReader::new(io::stdin()).lines();

    write_out(&mut stdout, HELP).await?;
    let first = terminal.draw();
    write_out(&mut stdout, &first).await?;

    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Quit => {
                break;
            }
            Input::Help => {
                write_out(&mut stdout, HELP).await?;
                continue;
            }
            Input::Open => terminal.session.open(),
            Input::Close => terminal.session.close(),
            Input::Retry => terminal.boundary.retry(),
            Input::Home => terminal.go_home(),
            Input::Message(text) => {
                if !terminal.session.submit(text).await {
                    debug!("Submit ignored");
                }
            }
        }
        let frame = terminal.draw();
        write_out(&mut stdout, &frame).await?;
    }

    terminal.session.teardown();
    info!("Chat ended");
    Ok(())
}
