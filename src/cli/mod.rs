pub mod commands;

use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tokio::time::Duration;

use crate::auth::{password_strength, validate_registration, AuthService, LocalStore, User};
use crate::cli::commands::{Commands, ProfileAction};
use crate::config::{AppConfig, SessionConfig};
use crate::db::SessionRecord;
use crate::emotion::LatestFrame;
use crate::history::{all_emotions, DateRange, HistoryFilter};
use crate::llm::ProviderFactory;
use crate::profile::ProfileEditor;
use crate::resources::EMERGENCY_RESOURCES;
use crate::responder::LlmResponder;
use crate::session::{ReplyOutcome, SessionDeps, SessionLoop};
use crate::speech::ChannelTranscriber;
use crate::store::build_store;

pub async fn run_cli(command: Commands, config_path: String) -> anyhow::Result<()> {
    let config = AppConfig::load(&config_path).context("Failed to load config")?;

    match command {
        Commands::Serve => bail!("serve is handled by the server entry point"),
        Commands::Chat => run_repl(config).await,
        Commands::Login { email, password } => {
            let auth = auth_service(&config).await?;
            let user = auth.login(&email, &password).await?;
            println!("Signed in as {} <{}>", user.name, user.email);
            Ok(())
        }
        Commands::Register {
            name,
            email,
            password,
            confirm_password,
        } => {
            validate_registration(&password, &confirm_password)?;
            println!("Password strength: {}/4", password_strength(&password));
            let auth = auth_service(&config).await?;
            let user = auth.register(&name, &email, &password).await?;
            println!("Registered and signed in as {} <{}>", user.name, user.email);
            Ok(())
        }
        Commands::Logout => {
            let auth = auth_service(&config).await?;
            auth.logout()?;
            println!("Signed out.");
            Ok(())
        }
        Commands::Whoami => {
            let auth = auth_service(&config).await?;
            match auth.current_user() {
                Some(user) => println!("{} <{}> (id {})", user.name, user.email, user.id),
                None => println!("Not signed in."),
            }
            Ok(())
        }
        Commands::History {
            emotion,
            range,
            show,
            export,
        } => {
            let (_, user) = signed_in(&config).await?;
            let store = build_store(&config)?;
            match show {
                Some(id) => {
                    let record = store
                        .get(id)
                        .await?
                        .filter(|r| r.user_id == user.id)
                        .ok_or_else(|| anyhow!("Session {} not found.", id))?;
                    match export {
                        Some(path) => export_transcript(&record, &path),
                        None => {
                            print_transcript(&record);
                            Ok(())
                        }
                    }
                }
                None => {
                    let records = store.list_for_user(&user.id).await?;
                    print_history(&records, emotion, range);
                    Ok(())
                }
            }
        }
        Commands::Profile { action } => {
            let (auth, user) = signed_in(&config).await?;
            let mut editor = ProfileEditor::load(auth.store(), &user)?;
            if let ProfileAction::Set { field, value } = action {
                editor.begin_edit();
                editor.set_field(&field, &value)?;
                editor.submit(auth.store())?;
            }
            println!("{}", serde_json::to_string_pretty(editor.current())?);
            Ok(())
        }
        Commands::Resources => {
            print_resources();
            Ok(())
        }
    }
}

async fn auth_service(config: &AppConfig) -> anyhow::Result<AuthService> {
    let store = LocalStore::open(&config.auth.identity_path)
        .with_context(|| format!("Failed to open identity store {}", config.auth.identity_path))?;
    let auth = AuthService::new(Arc::new(store), Duration::from_millis(config.auth.delay_ms));
    auth.restore().await;
    Ok(auth)
}

async fn signed_in(config: &AppConfig) -> anyhow::Result<(AuthService, User)> {
    let auth = auth_service(config).await?;
    let user = auth
        .current_user()
        .ok_or_else(|| anyhow!("Not signed in. Run `solace login` first."))?;
    Ok((auth, user))
}

fn print_resources() {
    println!("If you are in crisis, please reach out:");
    for resource in EMERGENCY_RESOURCES {
        println!("  {:<40} {:<22} {}", resource.name, resource.contact, resource.availability);
    }
}

fn print_history(records: &[SessionRecord], emotions: Vec<String>, range: DateRange) {
    let filter = HistoryFilter { emotions, range };
    let kept = filter.apply(records, Utc::now());
    if kept.is_empty() {
        println!("No sessions found.");
        return;
    }

    println!("{:<38} | {:<20} | {:<8} | {}", "ID", "Started", "Minutes", "Emotions");
    println!("{:-<38}-+-{:-<20}-+-{:-<8}-+-{:-<20}", "", "", "", "");
    for r in kept {
        let minutes = r
            .duration_minutes()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<38} | {:<20} | {:<8} | {}",
            r.id.to_string(),
            r.start_time.format("%Y-%m-%d %H:%M"),
            minutes,
            r.emotions.join(", ")
        );
    }
    println!("\nEmotions across all sessions: {}", all_emotions(records).join(", "));
}

fn print_transcript(record: &SessionRecord) {
    println!("Session: {}", record.id);
    println!("Started: {}", record.start_time);
    if let Some(end) = record.end_time {
        println!("Ended: {}", end);
    }
    if !record.emotions.is_empty() {
        println!("Emotions: {}", record.emotions.join(", "));
    }
    println!("---");
    for line in &record.transcript {
        println!("{}", line);
    }
}

fn export_transcript(record: &SessionRecord, path: &str) -> anyhow::Result<()> {
    let mut file = std::fs::File::create(path).with_context(|| format!("Failed to create {}", path))?;
    writeln!(file, "Session: {}", record.id)?;
    writeln!(file, "Started: {}", record.start_time)?;
    if let Some(end) = record.end_time {
        writeln!(file, "Ended: {}", end)?;
    }
    writeln!(file, "---")?;
    for line in &record.transcript {
        writeln!(file, "{}", line)?;
    }
    println!("Session exported successfully to: {}", path);
    Ok(())
}

fn read_line(prompt: &str) -> anyhow::Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    if io::stdin().lock().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

/// What the terminal shows for a reply. Failures were already logged by
/// the session and show nothing.
fn reply_line(outcome: &ReplyOutcome) -> Option<String> {
    match outcome {
        ReplyOutcome::Applied(reply) => Some(format!("Solace> {}", reply.text)),
        ReplyOutcome::Failed | ReplyOutcome::Stale => None,
    }
}

async fn run_repl(config: AppConfig) -> anyhow::Result<()> {
    let (_, user) = signed_in(&config).await?;
    let store = build_store(&config)?;
    let llm = ProviderFactory::create_default(&config.llm)
        .ok_or_else(|| anyhow!("Unknown LLM provider '{}'", config.llm.provider))?;

    // No camera or microphone in a terminal
    let session_config = SessionConfig {
        camera_enabled: false,
        mic_enabled: false,
        ..config.session.clone()
    };
    let deps = SessionDeps {
        responder: Arc::new(LlmResponder::new(llm, &session_config)),
        store,
        detector: None,
        frames: Arc::new(LatestFrame::new()),
        transcriber: Arc::new(ChannelTranscriber::new()),
    };
    let session = SessionLoop::new(deps, session_config);
    let id = session.start(&user.id);

    println!("--- Solace Therapy Session ---");
    println!("Session: {}", id);
    println!("Type /help for crisis resources, /end to finish.");
    println!("------------------------------");
    for message in session.transcript() {
        println!("\nSolace> {}", message.text);
    }

    loop {
        let Some(text) = read_line("\nYou> ")? else {
            break;
        };
        match text.as_str() {
            "" => continue,
            "/help" => print_resources(),
            "/end" | "/exit" | "/quit" => {
                let answer = read_line("Are you sure you want to end this therapy session? [y/N] ")?;
                if matches!(answer.as_deref(), Some("y") | Some("Y") | Some("yes")) {
                    break;
                }
            }
            _ => {
                let Some(pending) = session.send(&text) else {
                    continue;
                };
                if let Some(line) = reply_line(&pending.outcome().await) {
                    println!("\n{}", line);
                }
            }
        }
    }

    match session.end(true).await {
        Some(record) => println!("Session saved ({} messages).", record.transcript.len()),
        None => println!("Session ended."),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Message, Sender};

    #[test]
    fn only_applied_replies_are_printed() {
        let reply = Message::new(Sender::Assistant, "Take a slow breath.");
        assert_eq!(
            reply_line(&ReplyOutcome::Applied(reply)).as_deref(),
            Some("Solace> Take a slow breath.")
        );
        assert_eq!(reply_line(&ReplyOutcome::Failed), None);
        assert_eq!(reply_line(&ReplyOutcome::Stale), None);
    }
}
