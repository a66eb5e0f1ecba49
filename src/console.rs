use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use deckcoach_backend::domain::{CustomerProfile, Message, Role, Sentiment, Slide};
use deckcoach_backend::runtime::{CoachEvent, CoachRuntime, CoachingSession};

const HELP: &str = "Commands: /next, /prev, /jump <n>, /points, /save, /reset, /help, /quit. Anything else is your answer.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Next,
    Previous,
    /// 1-based slide position as typed by the seller.
    Jump(usize),
    Points,
    Save,
    Reset,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(Command::Say(line.to_string()));
    }

    let mut parts = line.split_whitespace();
    let command = match parts.next()? {
        "/next" | "/n" => Command::Next,
        "/prev" | "/p" => Command::Previous,
        "/jump" | "/j" => {
            let position = parts.next()?.parse::<usize>().ok()?;
            if position == 0 {
                return None;
            }
            Command::Jump(position)
        }
        "/points" => Command::Points,
        "/save" => Command::Save,
        "/reset" => Command::Reset,
        "/help" | "/?" => Command::Help,
        "/quit" | "/q" | "/exit" => Command::Quit,
        _ => return None,
    };
    Some(command)
}

pub fn render_message(message: &Message) -> String {
    match message.role {
        Role::Seller => format!("You: {}", message.content),
        Role::Coach => {
            let tone = match message.sentiment {
                Some(Sentiment::Challenging) => "!",
                Some(Sentiment::Supportive) => "+",
                Some(Sentiment::Neutral) | None => "-",
            };
            format!("Coach [{}]: {}", tone, message.content)
        }
    }
}

/// Print events from the backend until every sender is gone.
pub fn print_events(rx: flume::Receiver<CoachEvent>) {
    for event in rx.iter() {
        match event {
            CoachEvent::Thinking => println!("(coach is thinking...)"),
            CoachEvent::MessageAppended(message) if message.role == Role::Coach => {
                println!("\n{}\n", render_message(&message));
            }
            CoachEvent::MessageAppended(_) => {}
            CoachEvent::SlideChanged { index, slide_id } => {
                tracing::debug!("Now on position {} (slide id {})", index + 1, slide_id);
            }
        }
    }
}

fn print_slide_header(session: &CoachingSession) {
    let tracker = session.tracker();
    let slide = session.current_slide();
    println!(
        "== Slide {}/{}: {} ==",
        tracker.current_index() + 1,
        tracker.slide_count(),
        slide.title
    );
}

fn print_talking_points(session: &CoachingSession) {
    match session.current_talking_points() {
        Some(points) => {
            println!("Talking points for {}:", points.slide_title);
            println!("  1. {}", points.key_message1);
            if !points.key_message2.trim().is_empty() {
                println!("  2. {}", points.key_message2);
            }
        }
        None => println!("Talking points for this slide are not available yet."),
    }
}

pub async fn run(
    runtime: &CoachRuntime,
    profile: Option<CustomerProfile>,
    catalog: &[Slide],
) -> Result<()> {
    let mut session = match profile {
        Some(profile) => runtime.start_session(profile, catalog).await?,
        None => {
            let session = runtime
                .resume_session(catalog)
                .await?
                .context("No saved session; pass a customer profile TOML")?;
            println!("Resuming your last session.");
            session
        }
    };

    println!("Flow: {}", session.flow().reasoning);
    println!("{}", HELP);
    print_slide_header(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let Some(command) = parse_command(&line) else {
            if !line.trim().is_empty() {
                println!("{}", HELP);
            }
            continue;
        };

        match command {
            Command::Say(text) => {
                session.submit(&text).await;
            }
            Command::Next => {
                if session.next_slide() {
                    print_slide_header(&session);
                } else {
                    println!("That's the last slide.");
                }
            }
            Command::Previous => {
                if session.previous_slide() {
                    print_slide_header(&session);
                } else {
                    println!("You're on the first slide.");
                }
            }
            Command::Jump(position) => {
                if session.jump_to(position - 1) {
                    print_slide_header(&session);
                }
            }
            Command::Points => print_talking_points(&session),
            Command::Save => match session.save() {
                Ok(()) => println!("Session saved."),
                Err(e) => tracing::error!("Failed to save session: {:#}", e),
            },
            Command::Reset => {
                session.reset_saved_state()?;
                println!("Saved session and cached slide text cleared.");
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => break,
        }
    }

    session.save()?;
    tracing::info!("Session saved with {} messages", session.messages().len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn parses_commands_and_free_text() {
        assert_eq!(parse_command("  "), None);
        assert_eq!(
            parse_command(" We cut costs 30% "),
            Some(Command::Say("We cut costs 30%".to_string()))
        );
        assert_eq!(parse_command("/next"), Some(Command::Next));
        assert_eq!(parse_command("/jump 3"), Some(Command::Jump(3)));
        assert_eq!(parse_command("/jump 0"), None);
        assert_eq!(parse_command("/jump x"), None);
        assert_eq!(parse_command("/unknown"), None);
        assert_eq!(parse_command("/q"), Some(Command::Quit));
    }

    #[test]
    fn renders_coach_tone_marker() {
        let message = Message {
            id: "1".to_string(),
            role: Role::Coach,
            content: "Try again.".to_string(),
            timestamp: Utc::now(),
            sentiment: Some(Sentiment::Challenging),
        };
        assert_eq!(render_message(&message), "Coach [!]: Try again.");
    }
}
