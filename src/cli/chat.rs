//! Interactive chat loop on stdin and stdout

use std::error::Error;
use std::io::{self, Write};
use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::core::error::ChatError;
use crate::core::message::ContentBlock;
use crate::core::session::ChatSession;
use crate::utils::media::read_image;

use super::settings::apply_session_set;

/// One line of user input, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Message(String),
    Image(String),
    Images,
    DiscardImages,
    Clear,
    Retry,
    Params,
    Set(String, String),
    Log(Option<String>),
    Help,
    Quit,
    Empty,
}

const HELP_LINES: &[(&str, &str)] = &[
    ("/image <path>", "Attach an image (png, jpeg, gif, webp) to the next message"),
    ("/images", "List images attached to the next message"),
    ("/images clear", "Drop the attached images"),
    ("/clear", "Start a new conversation and drop attached images"),
    ("/retry", "Re-send the last message if it got no reply"),
    ("/params", "Show the generation parameters"),
    ("/set <key> <value>", "Change model, system-prompt, max-tokens, temperature, top-p or top-k"),
    ("/log [file]", "Enable logging to a file, or pause/resume it"),
    ("/help", "Show this list"),
    ("/quit", "Leave (Ctrl+C also works; during a reply it cancels)"),
];

/// Unknown slash commands are sent as ordinary messages.
pub fn parse_input(input: &str) -> ReplCommand {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return ReplCommand::Message(input.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let args = parts.next().unwrap_or_default().trim();

    match name.to_ascii_lowercase().as_str() {
        "image" => ReplCommand::Image(args.to_string()),
        "images" if args.eq_ignore_ascii_case("clear") => ReplCommand::DiscardImages,
        "images" => ReplCommand::Images,
        "clear" => ReplCommand::Clear,
        "retry" => ReplCommand::Retry,
        "params" => ReplCommand::Params,
        "set" if args.is_empty() => ReplCommand::Params,
        "set" => {
            let mut parts = args.splitn(2, char::is_whitespace);
            let key = parts.next().unwrap_or_default().to_string();
            let value = parts.next().unwrap_or_default().trim().to_string();
            ReplCommand::Set(key, value)
        }
        "log" if args.is_empty() => ReplCommand::Log(None),
        "log" => ReplCommand::Log(Some(args.to_string())),
        "help" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        _ => ReplCommand::Message(input.to_string()),
    }
}

fn print_prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn render_fragment(fragment: &str) {
    print!("{fragment}");
    let _ = io::stdout().flush();
}

fn print_help() {
    println!("Commands:");
    for (usage, description) in HELP_LINES {
        println!("  {usage:<20} {description}");
    }
}

fn print_params(session: &ChatSession) {
    let params = session.params();
    println!("model:        {}", params.model_id);
    println!("max_tokens:   {}", params.max_tokens);
    println!("temperature:  {}", params.temperature);
    println!("top_p:        {}", params.top_p);
    println!("top_k:        {}", params.top_k);
    println!("system:       {}", params.system_message);
    println!("turns:        {}", session.conversation().len());
    println!("log:          {}", session.logging().get_status_string());
}

fn stage_image(session: &mut ChatSession, path: &str) {
    if path.is_empty() {
        eprintln!("⚠️  Usage: /image <path>");
        return;
    }
    let staged = read_image(Path::new(path)).and_then(|(media_type, bytes)| {
        let size = bytes.len();
        session.stage_image(media_type, bytes)?;
        Ok((media_type, size))
    });
    match staged {
        Ok((media_type, size)) => println!("📎 Attached {path} ({media_type}, {size} bytes)"),
        Err(err) => eprintln!("❌ {err}"),
    }
}

fn list_images(session: &ChatSession) {
    let staged = session.conversation().staged_images();
    if staged.is_empty() {
        println!("No images attached.");
        return;
    }
    for (index, block) in staged.iter().enumerate() {
        if let ContentBlock::Image { media_type, bytes } = block {
            println!("  {}. {media_type}, {} bytes", index + 1, bytes.len());
        }
    }
}

fn set_param(session: &mut ChatSession, key: &str, value: &str) {
    if value.is_empty() {
        eprintln!("⚠️  Usage: /set <key> <value>");
        return;
    }
    match apply_session_set(session, key, value) {
        Ok(message) => println!("⚙️  {message}"),
        Err(err) => eprintln!("❌ {err}"),
    }
}

fn toggle_log(session: &mut ChatSession, file: Option<String>) {
    let logging = session.logging_mut();
    let result = match file {
        Some(file) => logging.set_log_file(file),
        None => logging.toggle_logging(),
    };
    match result {
        Ok(message) => println!("📝 {message}"),
        Err(err) => eprintln!("❌ Log error: {err}"),
    }
}

/// Sends `text` (or re-sends the pending turn when `None`) and prints the
/// reply as it streams. Ctrl+C drops the request, which cancels the stream.
async fn stream_reply(session: &mut ChatSession, text: Option<String>) {
    let outcome = {
        let request = async {
            match &text {
                Some(text) => session.submit(text, render_fragment).await,
                None => session.retry(render_fragment).await,
            }
        };
        tokio::select! {
            result = request => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        }
    };

    match outcome {
        Some(Ok(outcome)) => {
            println!();
            if outcome.metadata.stop_reason.as_deref() == Some("max_tokens") {
                eprintln!("⚠️  Reply stopped at the max_tokens limit.");
            }
        }
        Some(Err(ChatError::UnansweredTurn)) => {
            eprintln!("⚠️  The last message has no reply yet. Use /retry to re-send it or /clear to start over.");
        }
        Some(Err(err)) => {
            println!();
            eprintln!("❌ Error: {err}");
            if err.is_remote() && session.conversation().awaiting_reply() {
                eprintln!("💡 Use /retry to re-send, or /clear to start over.");
            }
        }
        None => {
            println!();
            eprintln!("⏹️  Reply cancelled. Use /retry to ask again or /clear to start over.");
        }
    }
}

pub async fn run_chat(mut session: ChatSession) -> Result<(), Box<dyn Error>> {
    println!(
        "💬 Chatting with {} (type /help for commands)",
        session.params().model_id
    );
    debug!(
        transport = session.transport_name(),
        params = %session.params().summary(),
        "chat started"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt();
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match parse_input(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => print_help(),
            ReplCommand::Params => print_params(&session),
            ReplCommand::Clear => {
                session.clear();
                println!("🧹 Conversation cleared.");
            }
            ReplCommand::Images => list_images(&session),
            ReplCommand::DiscardImages => {
                let count = session.discard_images();
                println!("🗑️  Dropped {count} attached image(s).");
            }
            ReplCommand::Image(path) => stage_image(&mut session, &path),
            ReplCommand::Set(key, value) => set_param(&mut session, &key, &value),
            ReplCommand::Log(file) => toggle_log(&mut session, file),
            ReplCommand::Retry => stream_reply(&mut session, None).await,
            ReplCommand::Message(text) => stream_reply(&mut session, Some(text)).await,
        }
    }

    Ok(())
}
