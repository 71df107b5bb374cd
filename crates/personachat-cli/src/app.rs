use anyhow::{bail, Result};
use chrono::Local;
use personachat_core::{
    preprocess_response, ChatClient, ConfigStore, ConversationTurn, DirectoryCache, HistoryStore,
    ModelSettings, OpenAiCompatClient, PersonaError, SessionRestorer, SessionSnapshot,
    SettingsCache,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::commands::{classify_input, is_affirmative, parse_choice, with_timestamp, InputAction};

/// Completion requests allowed in flight at once.
pub const MAX_IN_FLIGHT: usize = 4;
/// Non-system turns kept after a failed completion.
pub const KEEP_AFTER_FAILURE: usize = 4;
/// How long exit waits for outstanding completions.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ChatOptions {
    pub settings_file: Option<PathBuf>,
    pub preset: String,
    pub temperature: f32,
}

/// Result of one completion task, delivered back to the chat loop.
type Completion = std::result::Result<String, PersonaError>;

/// Forward stdin lines over a channel so prompts can be awaited alongside replies.
pub fn spawn_input_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send(line.trim_end_matches(['\r', '\n']).to_string()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

async fn prompt_line(
    input: &mut mpsc::UnboundedReceiver<String>,
    prompt: &str,
) -> Option<String> {
    print!("{prompt}");
    let _ = std::io::stdout().flush();
    input.recv().await
}

async fn ask_yes_no(input: &mut mpsc::UnboundedReceiver<String>, prompt: &str) -> bool {
    prompt_line(input, prompt)
        .await
        .is_some_and(|answer| is_affirmative(&answer))
}

pub async fn run_chat(config: &ConfigStore, options: ChatOptions) -> Result<()> {
    config.check_readiness()?;
    tracing::info!("Model settings directory: {}", config.model_settings_dir().display());

    let mut input = spawn_input_reader();
    let directory_cache = DirectoryCache::new();
    let settings_cache = SettingsCache::new();

    let settings = select_settings(
        config,
        &directory_cache,
        &settings_cache,
        options.settings_file.as_deref(),
        &mut input,
    )
    .await?;
    println!("{}", settings.introduce());

    let system_prompt = match config.read_system_prompt() {
        Ok(text) => Some(text),
        Err(e) => {
            eprintln!("System prompt unavailable ({e}); continuing without a persona.");
            None
        }
    };

    config.ensure_config_dir()?;
    let store = HistoryStore::for_config(config)?;
    let mut session =
        resume_or_start(&store, &options.preset, system_prompt.as_deref(), &mut input).await;

    let client: Arc<dyn ChatClient> = Arc::new(
        OpenAiCompatClient::from_settings(&settings).with_temperature(options.temperature),
    );

    let outcome = chat_loop(&mut session, client, &store, &mut input).await;

    store.shutdown()?;
    if store.failed_writes() > 0 {
        eprintln!(
            "Warning: conversation history may be incomplete ({} failed write(s)).",
            store.failed_writes()
        );
    }
    outcome
}

async fn select_settings(
    config: &ConfigStore,
    directory_cache: &DirectoryCache,
    settings_cache: &SettingsCache,
    explicit: Option<&Path>,
    input: &mut mpsc::UnboundedReceiver<String>,
) -> Result<Arc<ModelSettings>> {
    if let Some(path) = explicit {
        return Ok(settings_cache.get_settings(path)?);
    }

    loop {
        let files = directory_cache.list_readable_files(config.model_settings_dir())?;
        if files.is_empty() {
            bail!(
                "No readable settings files in {}",
                config.model_settings_dir().display()
            );
        }

        println!("Available settings files:");
        for (i, file) in files.iter().enumerate() {
            println!("{}. {}", i + 1, file.display());
        }

        let Some(answer) = prompt_line(input, "Enter the number of the file to use: ").await else {
            bail!("Input closed before a settings file was chosen");
        };
        if answer.trim().eq_ignore_ascii_case("q") {
            bail!("Settings selection cancelled");
        }
        let Some(idx) = parse_choice(&answer, files.len()) else {
            println!("Invalid choice, please enter a number between 1 and {}.", files.len());
            continue;
        };

        println!("Selected: {}", files[idx].display());
        match settings_cache.get_settings(&files[idx]) {
            Ok(settings) => return Ok(settings),
            Err(e) if e.is_settings_rejection() => {
                eprintln!("Cannot use {}: {}", files[idx].display(), e);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn resume_or_start(
    store: &HistoryStore,
    preset: &str,
    system_prompt: Option<&str>,
    input: &mut mpsc::UnboundedReceiver<String>,
) -> SessionSnapshot {
    let restorer = SessionRestorer::new(store);
    if let Some(candidate) = restorer.candidate() {
        println!(
            "Found a previous conversation (preset: {}, {} turns).",
            candidate.preset_name,
            candidate.len()
        );
        if ask_yes_no(input, "Resume it? (y/n): ").await {
            println!("Conversation restored. Type 'exit' to finish.");
            return restorer.restore(candidate, system_prompt);
        }
    }
    match system_prompt {
        Some(prompt) => SessionSnapshot::new(preset, prompt),
        None => SessionSnapshot::from_parts(preset, Vec::new()),
    }
}

/// Run the conversation until an exit word or end of input.
///
/// The loop is the only owner of `session`: completions run on spawned tasks
/// and hand their replies back over a channel, so appending a reply and
/// saving never race.
pub async fn chat_loop(
    session: &mut SessionSnapshot,
    client: Arc<dyn ChatClient>,
    store: &HistoryStore,
    input: &mut mpsc::UnboundedReceiver<String>,
) -> Result<()> {
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Completion>();
    let permits = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
    let mut tasks = JoinSet::new();

    print_prompt();
    loop {
        tokio::select! {
            line = input.recv() => {
                let Some(line) = line else {
                    tracing::debug!("Input closed, leaving without saving");
                    break;
                };
                match classify_input(&line) {
                    InputAction::Empty => {}
                    InputAction::Exit => {
                        finish_pending(&mut tasks, &mut reply_rx, session).await;
                        if ask_yes_no(input, "Save this conversation? (y/n): ").await {
                            match store.save_snapshot(session) {
                                Ok(()) => println!(
                                    "Conversation saved to {}",
                                    store.history_file().display()
                                ),
                                Err(e) => {
                                    eprintln!("Conversation could not be queued for saving: {e}")
                                }
                            }
                        }
                        println!("Conversation ended.");
                        return Ok(());
                    }
                    InputAction::Message(text) => {
                        session.push(ConversationTurn::user(with_timestamp(&text, Local::now())));
                        let turns = session.history.clone();
                        let client = Arc::clone(&client);
                        let permits = Arc::clone(&permits);
                        let reply_tx = reply_tx.clone();
                        tasks.spawn(async move {
                            let Ok(_permit) = permits.acquire_owned().await else {
                                return;
                            };
                            let _ = reply_tx.send(client.complete(&turns).await);
                        });
                    }
                }
                print_prompt();
            }
            Some(reply) = reply_rx.recv() => {
                apply_completion(session, reply);
                print_prompt();
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    tracing::warn!("Completion task failed: {}", e);
                }
            }
        }
    }

    tasks.abort_all();
    Ok(())
}

fn apply_completion(session: &mut SessionSnapshot, reply: Completion) {
    match reply {
        Ok(raw) => {
            let text = preprocess_response(&raw);
            println!("\n{}: {}", session.preset_name, text);
            session.push(ConversationTurn::assistant(text));
        }
        Err(e) => {
            eprintln!("\nError: {e}");
            session.keep_recent(KEEP_AFTER_FAILURE);
        }
    }
}

/// Wait (bounded) for in-flight completions and fold their replies into the
/// transcript. Anything still running after the timeout is abandoned.
async fn finish_pending(
    tasks: &mut JoinSet<()>,
    reply_rx: &mut mpsc::UnboundedReceiver<Completion>,
    session: &mut SessionSnapshot,
) {
    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        tracing::warn!("Abandoning {} unfinished completion(s)", tasks.len());
        tasks.abort_all();
    }

    while let Ok(reply) = reply_rx.try_recv() {
        apply_completion(session, reply);
    }
}

fn print_prompt() {
    print!("\nYou: ");
    let _ = std::io::stdout().flush();
}

/// `new-settings` subcommand: write a settings file into the settings directory.
pub fn create_settings(
    config: &ConfigStore,
    settings: &ModelSettings,
    overwrite: bool,
) -> Result<PathBuf> {
    let path = settings.write_new(config.model_settings_dir(), overwrite)?;
    Ok(path)
}
