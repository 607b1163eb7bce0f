//! Non-interactive "say" command

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::cli::{build_session, Args};
use crate::core::config::Config;
use crate::utils::media::read_image;

pub async fn run_say(
    args: &Args,
    config: &Config,
    images: Vec<PathBuf>,
    prompt: Vec<String>,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: bedrock-chat say [--image PATH]... <prompt>");
        std::process::exit(1);
    }

    // Read attachments before connecting so a bad path fails fast.
    let mut attachments = Vec::with_capacity(images.len());
    for path in &images {
        match read_image(path) {
            Ok(image) => attachments.push(image),
            Err(err) => {
                eprintln!("❌ {err}");
                std::process::exit(1);
            }
        }
    }

    let mut session = match build_session(args, config).await {
        Ok(session) => session,
        Err(err) => {
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    };
    for (media_type, bytes) in attachments {
        if let Err(err) = session.stage_image(media_type, bytes) {
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    }

    let result = session
        .submit(&prompt, |fragment| {
            print!("{fragment}");
            let _ = io::stdout().flush();
        })
        .await;

    match result {
        Ok(_) => {
            println!();
            Ok(())
        }
        Err(err) => {
            eprintln!("\n\n❌ Error: {err}");
            std::process::exit(1);
        }
    }
}
