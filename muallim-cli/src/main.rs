mod app;
mod command;
mod event;
mod render;
mod theme;
mod transcript;
mod ui;
mod util;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use crossterm::cursor::SetCursorStyle;
use crossterm::event::{Event as TermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use muallim_core::{
    HttpTutorClient, ReviewRequest, ReviewService, StagedFile, SubmissionController, messages,
    segment,
};
use ratatui::DefaultTerminal;
use tokio::sync::mpsc;
use uuid::Uuid;

use app::{App, DisplayBlock, RatingState};
use event::AppEvent;
use transcript::Transcript;

#[derive(Parser)]
struct Args {
    /// Base URL of the tutoring backend
    #[arg(long, env = "MUALLIM_API_URL", default_value = "http://localhost:8000")]
    base_url: String,

    /// Learner identifier attached to submitted reviews
    #[arg(long, env = "MUALLIM_USER_ID")]
    user_id: Option<String>,

    /// Image file to attach to the first question
    #[arg(long)]
    image: Option<PathBuf>,

    /// Disable mouse scroll support (re-enables terminal text selection)
    #[arg(long)]
    no_mouse: bool,

    /// Run headlessly: send the question, print the answer to stdout, exit
    #[arg(short = 'p', long = "print")]
    print_question: Option<String>,

    /// Print review statistics and exit
    #[arg(long)]
    stats: bool,
}

fn cleanup_terminal() {
    // Pop kitty keyboard protocol, restore background color and cursor style
    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::event::PopKeyboardEnhancementFlags
    );
    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::style::Print("\x1b]111\x1b\\"),
        SetCursorStyle::DefaultUserShape
    );
    ratatui::restore();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up file-based tracing (logs go to ~/.muallim/muallim.log)
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        let log_dir = PathBuf::from(&home).join(".muallim");
        std::fs::create_dir_all(&log_dir).ok();
        let log_file = std::fs::File::create(log_dir.join("muallim.log"))?;

        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::try_from_env("MUALLIM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(log_file)
            .with_ansi(false)
            .init();
    }

    let args = Args::parse();
    let client = Arc::new(HttpTutorClient::new(args.base_url.clone()));

    // ── Headless modes: skip the TUI, print to stdout ──
    if args.stats {
        return run_stats(client).await;
    }
    if let Some(question) = args.print_question.clone() {
        return run_print(client, question, args.image.clone()).await;
    }

    let session_id = Uuid::new_v4();
    let transcript = Transcript::open(session_id, client.base_url());

    // Install panic hook that restores the terminal
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        cleanup_terminal();
        default_hook(info);
    }));

    // Initialize terminal
    let terminal = ratatui::init();

    // Set terminal background to match FORM so padding areas blend seamlessly (OSC 11)
    // Set cursor to bar (pipe) style for cleaner text editing feel
    crossterm::execute!(
        std::io::stdout(),
        crossterm::style::Print("\x1b]11;rgb:0e/0d/0b\x1b\\"),
        SetCursorStyle::SteadyBar
    )?;

    // Enable kitty keyboard protocol so Shift+Enter is distinguishable from Enter
    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::event::PushKeyboardEnhancementFlags(
            crossterm::event::KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
        )
    );

    // Enable mouse capture by default (scroll wheel works always)
    if !args.no_mouse {
        crossterm::execute!(std::io::stdout(), crossterm::event::EnableMouseCapture)?;
    }

    let result = run_app(terminal, client, transcript, session_id, &args).await;

    // Disable mouse capture
    if !args.no_mouse {
        let _ = crossterm::execute!(std::io::stdout(), crossterm::event::DisableMouseCapture);
    }

    // Pop kitty keyboard protocol
    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::event::PopKeyboardEnhancementFlags
    );

    cleanup_terminal();

    result
}

/// Fetch and print review statistics without the TUI.
async fn run_stats(client: Arc<HttpTutorClient>) -> anyhow::Result<()> {
    match client.review_stats().await {
        Ok(stats) => {
            println!("{}", util::format_stats(&stats));
            Ok(())
        }
        Err(err) => {
            eprintln!("{}", err.stats_message());
            std::process::exit(1);
        }
    }
}

/// Run one question headlessly and print the answer to stdout. Usage
/// errors (empty question, rejected image) exit 2, request failures 1.
async fn run_print(
    client: Arc<HttpTutorClient>,
    question: String,
    image: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut controller = SubmissionController::new(client);

    if let Some(path) = image {
        controller.stage_image(StagedFile::from_path(&path)).await;
        if let Some(error) = controller.pending().validation_error {
            eprintln!("{}", error.user_message());
            std::process::exit(2);
        }
    }

    controller.set_text(question);
    let prepared = match controller.begin_submit() {
        Some(p) => p,
        None => {
            eprintln!("error: empty question");
            std::process::exit(2);
        }
    };

    match controller.finish_submit(prepared).await {
        Ok(()) => {
            if let Some(entry) = controller.last_assistant() {
                println!("{}", entry.content);
            }
            Ok(())
        }
        Err(_) => {
            if let Some(entry) = controller.last_assistant() {
                eprintln!("{}", entry.content);
            }
            std::process::exit(1);
        }
    }
}

/// Build the help text shown by /help.
fn help_text() -> String {
    let mut lines = vec!["Commands:".to_string()];
    for (cmd, desc) in command::COMMANDS {
        lines.push(format!("  {:<18}{}", cmd, desc));
    }
    lines.extend([
        String::new(),
        "Keys:".to_string(),
        "  Enter              Send question".to_string(),
        "  Shift+Enter        Insert newline".to_string(),
        "  Ctrl+U / Ctrl+D    Scroll half-page up / down".to_string(),
        "  PgUp / PgDn        Scroll page up / down".to_string(),
        "  Up / Down          Input history".to_string(),
        "  Ctrl+C             Quit".to_string(),
    ]);
    lines.join("\n")
}

async fn run_app(
    mut terminal: DefaultTerminal,
    client: Arc<HttpTutorClient>,
    mut transcript: Transcript,
    session_id: Uuid,
    args: &Args,
) -> anyhow::Result<()> {
    let mut app = App::new(
        session_id,
        args.user_id.clone(),
        util::format_host(client.base_url()),
    );

    let mut controller = SubmissionController::new(client.clone());
    if let Some(path) = &args.image {
        controller.stage_image(StagedFile::from_path(path)).await;
        app.sync_pending(controller.pending());
    }

    // The controller leaves for a spawned task on every turn and comes
    // back with the TurnDone event.
    let mut controller: Option<Box<SubmissionController>> = Some(Box::new(controller));

    // Unified event channel
    let (app_tx, mut app_rx) = mpsc::unbounded_channel::<AppEvent>();

    // Stop flag for the event reader thread
    let stop = Arc::new(AtomicBool::new(false));

    // Spawn terminal event reader using poll() with timeout so it can stop
    let term_tx = app_tx.clone();
    let stop_reader = Arc::clone(&stop);
    tokio::task::spawn_blocking(move || {
        while !stop_reader.load(Ordering::Relaxed) {
            // Poll with 50ms timeout so we can check the stop flag
            if crossterm::event::poll(std::time::Duration::from_millis(50)).unwrap_or(false) {
                match crossterm::event::read() {
                    Ok(ev) => {
                        if term_tx.send(AppEvent::Terminal(ev)).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        }
    });

    // Tick timer for spinner animation
    let tick_tx = app_tx.clone();
    let stop_tick = Arc::clone(&stop);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(100));
        loop {
            interval.tick().await;
            if stop_tick.load(Ordering::Relaxed) {
                break;
            }
            if tick_tx.send(AppEvent::Tick).is_err() {
                break;
            }
        }
    });

    // SIGTERM handler for graceful shutdown
    let sigterm_tx = app_tx.clone();
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut sig) = signal(SignalKind::terminate()) {
            sig.recv().await;
            let _ = sigterm_tx.send(AppEvent::Quit);
        }
    });

    loop {
        // Draw only when dirty
        if app.dirty {
            // Pre-compute height cache before immutable borrow in draw
            let size = terminal.size()?;
            let vh = ui::history_viewport_height(&app, size.width, size.height);
            let vw = size.width as usize;
            app.ensure_height_cache_pub(vw, vh);
            // Clamp scroll_offset (especially for scroll_to_bottom's usize::MAX)
            let max_scroll = app.total_content_height().saturating_sub(vh);
            app.scroll_offset = if app.follow_output {
                max_scroll
            } else {
                app.scroll_offset.min(max_scroll)
            };

            terminal.draw(|frame| ui::draw(frame, &app))?;
            app.dirty = false;
        }

        // Wait for next event
        let event = match app_rx.recv().await {
            Some(e) => e,
            None => break,
        };

        match event {
            AppEvent::Terminal(TermEvent::Key(key)) => {
                // With kitty keyboard protocol, ignore Release/Repeat events
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                app.dirty = true;

                // The rating dialog owns the keyboard while open
                if app.rating.is_some() {
                    handle_rating_key(key, &mut app, &client, &app_tx);
                    continue;
                }

                // CTRL+C: quit
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                    break;
                }

                // ── Always-on scroll keys ──
                {
                    let size = terminal.size()?;
                    let vh = ui::history_viewport_height(&app, size.width, size.height);
                    let max_scroll = app.total_content_height().saturating_sub(vh);
                    let half_page = vh / 2;

                    // Ctrl+U / Ctrl+D: half-page scroll
                    if key.modifiers.contains(KeyModifiers::CONTROL)
                        && key.code == KeyCode::Char('u')
                    {
                        app.scroll_up(half_page);
                        continue;
                    }
                    if key.modifiers.contains(KeyModifiers::CONTROL)
                        && key.code == KeyCode::Char('d')
                    {
                        app.scroll_down(half_page, max_scroll);
                        continue;
                    }

                    // PgUp / PgDn
                    if key.code == KeyCode::PageUp {
                        app.scroll_up(vh);
                        continue;
                    }
                    if key.code == KeyCode::PageDown {
                        app.scroll_down(vh, max_scroll);
                        continue;
                    }
                }

                match key.code {
                    // Tab: complete selected suggestion
                    KeyCode::Tab if !app.suggestions.is_empty() => {
                        app.apply_suggestion();
                        app.update_suggestions();
                    }
                    // Up/Down: navigate suggestions when popup is visible
                    KeyCode::Up if !app.suggestions.is_empty() => {
                        app.suggestion_up();
                    }
                    KeyCode::Down if !app.suggestions.is_empty() => {
                        app.suggestion_down();
                    }
                    KeyCode::Enter => {
                        // Shift+Enter or Alt+Enter → insert newline
                        if key.modifiers.contains(KeyModifiers::SHIFT)
                            || key.modifiers.contains(KeyModifiers::ALT)
                        {
                            app.insert_char('\n');
                            app.update_suggestions();
                            continue;
                        }

                        // One request at a time. The draft stays in the
                        // input until the running turn settles.
                        if app.running || controller.is_none() {
                            continue;
                        }

                        // A blank draft is refused before it is consumed.
                        if !app.has_submittable_input() {
                            continue;
                        }

                        let input = app.take_input();
                        app.update_suggestions();

                        // Try slash command
                        if let Some(cmd) = command::parse(&input) {
                            match cmd {
                                command::Command::Exit => break,
                                command::Command::Attach(path) => {
                                    if let Some(ctl) = controller.as_mut() {
                                        let path = expand_tilde(&path);
                                        ctl.stage_image(StagedFile::from_path(&path)).await;
                                        app.sync_pending(ctl.pending());
                                    }
                                }
                                command::Command::Detach => {
                                    if let Some(ctl) = controller.as_mut() {
                                        ctl.clear_image();
                                        app.sync_pending(ctl.pending());
                                    }
                                }
                                command::Command::Rate(stars) => {
                                    open_rating_dialog(&mut app, controller.as_deref(), stars);
                                }
                                command::Command::Stats => {
                                    if !app.stats_pending {
                                        app.stats_pending = true;
                                        let stats_client = Arc::clone(&client);
                                        let stats_tx = app_tx.clone();
                                        tokio::spawn(async move {
                                            let result = stats_client.review_stats().await;
                                            let _ = stats_tx.send(AppEvent::StatsDone(result));
                                        });
                                    }
                                }
                                command::Command::Clear => {
                                    if let Some(ctl) = controller.as_mut() {
                                        ctl.reset();
                                        app.sync_pending(ctl.pending());
                                    }
                                    app.clear_history();
                                }
                                command::Command::Help => {
                                    app.push_notice(help_text());
                                }
                            }
                            continue;
                        }

                        // Handle "quit"/"exit" without slash prefix
                        if input == "quit" || input == "exit" {
                            break;
                        }

                        submit_question(input, &mut app, &mut controller, &mut transcript, &app_tx);
                    }
                    KeyCode::Backspace => {
                        app.backspace();
                        app.update_suggestions();
                    }
                    KeyCode::Delete => {
                        app.delete_char();
                        app.update_suggestions();
                    }
                    KeyCode::Left => app.move_cursor_left(),
                    KeyCode::Right => app.move_cursor_right(),
                    KeyCode::Home => app.move_cursor_home(),
                    KeyCode::End => app.move_cursor_end(),
                    KeyCode::Up => app.history_up(),
                    KeyCode::Down => app.history_down(),
                    KeyCode::Esc => {
                        app.suggestions.clear();
                    }
                    KeyCode::Char(c) => {
                        app.insert_char(c);
                        app.update_suggestions();
                    }
                    _ => {}
                }
            }
            AppEvent::Terminal(TermEvent::Mouse(mouse)) => {
                app.dirty = true;
                use crossterm::event::MouseEventKind;
                match mouse.kind {
                    MouseEventKind::ScrollUp => app.scroll_up(3),
                    MouseEventKind::ScrollDown => {
                        let size = terminal.size()?;
                        let vh = ui::history_viewport_height(&app, size.width, size.height);
                        let max_scroll = app.total_content_height().saturating_sub(vh);
                        app.scroll_down(3, max_scroll);
                    }
                    _ => {}
                }
            }
            AppEvent::Terminal(_) => {
                // Resize events, etc.
                app.dirty = true;
            }
            AppEvent::TurnDone {
                controller: done,
                outcome,
            } => {
                app.dirty = true;
                app.running = false;
                if let Err(err) = &outcome {
                    tracing::debug!(error = %err, "turn settled with failure copy");
                }
                if let Some(entry) = done.last_assistant() {
                    transcript.log_entry(entry);
                    app.push_block(DisplayBlock::AssistantBubble {
                        fragments: segment(&entry.content),
                    });
                }
                app.sync_pending(done.pending());
                controller = Some(done);
            }
            AppEvent::ReviewDone { entry_id, result } => {
                app.dirty = true;
                match result {
                    Ok(()) => {
                        if let Some(state) = app.rating.take() {
                            transcript.log_review(
                                entry_id,
                                state.rating,
                                !state.feedback.trim().is_empty(),
                            );
                        }
                        app.reviewed.insert(entry_id);
                        app.push_notice(messages::REVIEW_THANKS);
                    }
                    Err(err) => {
                        if let Some(state) = app.rating.as_mut() {
                            state.submitting = false;
                            state.error = Some(err.submit_message());
                        }
                    }
                }
            }
            AppEvent::StatsDone(result) => {
                app.dirty = true;
                app.stats_pending = false;
                match result {
                    Ok(stats) => app.push_notice(util::format_stats(&stats)),
                    Err(err) => app.push_error(err.stats_message()),
                }
            }
            AppEvent::Tick => {
                if app.running {
                    app.tick += 1;
                    app.dirty = true;
                }
            }
            AppEvent::Quit => break,
        }
    }

    // Signal reader thread and tick timer to stop
    stop.store(true, Ordering::Relaxed);

    Ok(())
}

/// Kick off a turn: run the synchronous phase on the controller, mirror
/// the appended user entry into the display, then send the controller
/// off to finish the request.
fn submit_question(
    text: String,
    app: &mut App,
    controller: &mut Option<Box<SubmissionController>>,
    transcript: &mut Transcript,
    app_tx: &mpsc::UnboundedSender<AppEvent>,
) {
    let Some(mut ctl) = controller.take() else {
        return;
    };

    ctl.set_text(text);
    let image_label = app.attachment_label.clone();
    let prepared = match ctl.begin_submit() {
        Some(p) => p,
        None => {
            *controller = Some(ctl);
            return;
        }
    };

    if let Some(entry) = ctl.entries().last() {
        transcript.log_entry(entry);
        app.push_block(DisplayBlock::UserBubble {
            text: entry.content.clone(),
            image_label,
        });
    }
    app.sync_pending(ctl.pending());
    app.running = true;

    let tx = app_tx.clone();
    tokio::spawn(async move {
        let outcome = ctl.finish_submit(prepared).await;
        let _ = tx.send(AppEvent::TurnDone {
            controller: ctl,
            outcome,
        });
    });
}

/// Open the rating dialog for the latest answer, unless it was already
/// reviewed.
fn open_rating_dialog(app: &mut App, controller: Option<&SubmissionController>, stars: Option<u8>) {
    let Some(ctl) = controller else {
        return;
    };
    let Some(entry) = ctl.last_assistant() else {
        app.push_notice("Nothing to rate yet.");
        return;
    };
    if app.reviewed.contains(&entry.id) {
        app.push_notice("This answer is already rated.");
        return;
    }
    let question = ctl
        .question_before(entry.id)
        .map(|q| q.content.clone())
        .unwrap_or_default();
    app.rating = Some(RatingState {
        entry_id: entry.id,
        question,
        answer: entry.content.clone(),
        model_used: entry.model_used.clone(),
        context_used: entry.context_used,
        rating: stars.unwrap_or(0),
        feedback: String::new(),
        editing_feedback: false,
        submitting: false,
        error: None,
    });
    app.dirty = true;
}

/// Key handling while the rating dialog is open.
fn handle_rating_key(
    key: KeyEvent,
    app: &mut App,
    client: &Arc<HttpTutorClient>,
    app_tx: &mpsc::UnboundedSender<AppEvent>,
) {
    if key.code == KeyCode::Esc {
        if app.rating.as_ref().is_some_and(|state| !state.submitting) {
            app.rating = None;
        }
        return;
    }

    let session_id = app.session_id;
    let user_id = app.user_id.clone();
    let Some(state) = app.rating.as_mut() else {
        return;
    };
    if state.submitting {
        return;
    }

    match key.code {
        KeyCode::Tab => {
            state.editing_feedback = !state.editing_feedback;
        }
        KeyCode::Enter => {
            if state.rating == 0 {
                state.error = Some(messages::REVIEW_CHOOSE_RATING.to_string());
                return;
            }
            state.error = None;
            state.submitting = true;

            let review = ReviewRequest {
                session_id: session_id.to_string(),
                question: state.question.clone(),
                answer: state.answer.clone(),
                rating: state.rating,
                feedback: if state.feedback.trim().is_empty() {
                    None
                } else {
                    Some(state.feedback.clone())
                },
                model_used: state.model_used.clone(),
                context_used: state.context_used,
                user_id,
            };
            let entry_id = state.entry_id;
            let review_client = Arc::clone(client);
            let tx = app_tx.clone();
            tokio::spawn(async move {
                let result = review_client.submit_review(&review).await;
                let _ = tx.send(AppEvent::ReviewDone { entry_id, result });
            });
        }
        KeyCode::Left if !state.editing_feedback => {
            state.rating = state.rating.saturating_sub(1).max(1);
            state.error = None;
        }
        KeyCode::Right if !state.editing_feedback => {
            state.rating = (state.rating + 1).min(5);
            state.error = None;
        }
        KeyCode::Char(c @ '1'..='5') if !state.editing_feedback => {
            state.rating = c as u8 - b'0';
            state.error = None;
        }
        KeyCode::Char(c) if state.editing_feedback => {
            state.feedback.push(c);
        }
        KeyCode::Backspace if state.editing_feedback => {
            state.feedback.pop();
        }
        _ => {}
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(path)
}
