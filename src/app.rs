use std::cell::Cell;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use crossterm::{
    cursor::{Hide, Show},
    event::{
        self, DisableBracketedPaste, DisableFocusChange, EnableBracketedPaste, EnableFocusChange,
        Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tempfile::NamedTempFile;
use tracing::{error, info, warn};
use zeroize::Zeroize;

use crate::error::LockError;
use crate::gate::{LockGate, Notice, ProtectedActivity};
use crate::models::{Note, NoteBook};
use crate::storage::{
    ensure_dir, load_config, load_inbox, load_notes, save_config, save_notes,
    seed_notes_if_empty, unix_now, validate_data_dir, Config, CredentialStore, Settings,
    DEFAULT_INACTIVITY_SECS,
};
use crate::ui::{
    copy_note_to_clipboard, draw_inbox, draw_lock, draw_notes, prompt_pin_setup,
    read_clipboard_text, validate_pin_setup, InboxViewState, LockViewState, NoteViewState,
};

type Term = Terminal<CrosstermBackend<io::Stdout>>;

const STATUS_MESSAGE_SECS: u64 = 2;
const SHAKE_MILLIS: u64 = 420;
const INBOX_POLL_SECS: u64 = 5;
const EVENT_POLL_MILLIS: u64 = 100;
const LOCK_HINT: &str = "Type PIN | Enter unlock | Ctrl+V paste | Esc clear | Ctrl+C quit";
const INBOX_NAV_HINT: &str = "↑/↓ move | l lock now | p set PIN | r remove PIN | Esc quit";
const NOTES_NAV_HINT: &str =
    "↑/↓ move | / search | → edit | n add | d delete | c copy | Esc close";

pub fn run() -> Result<()> {
    let bin_name = executable_name();
    let mut args = std::env::args().skip(1);
    let mut set_pin = false;
    let mut remove_pin = false;
    let mut inactivity_override: Option<u64> = None;
    let mut data_dir: Option<String> = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("{bin_name} v{}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                print_usage(&bin_name);
                return Ok(());
            }
            "--set-pin" => set_pin = true,
            "--remove-pin" => remove_pin = true,
            "--data-dir" => {
                let raw = args
                    .next()
                    .ok_or_else(|| anyhow!("--data-dir requires a path"))?;
                data_dir = Some(raw);
            }
            "--inactivity" => {
                let raw = args
                    .next()
                    .ok_or_else(|| anyhow!("--inactivity requires a number of seconds"))?;
                let secs = raw
                    .parse::<u64>()
                    .map_err(|e| anyhow!("Invalid --inactivity value '{raw}': {e}"))?;
                if secs == 0 {
                    return Err(anyhow!("--inactivity must be at least 1 second"));
                }
                inactivity_override = Some(secs);
            }
            other => {
                print_usage(&bin_name);
                return Err(anyhow!("Unknown argument: {other}"));
            }
        }
    }

    if let Some(dir) = data_dir {
        return set_data_dir(&dir, inactivity_override);
    }

    let mut settings = Settings::load()?;
    if let Some(secs) = inactivity_override {
        settings.inactivity_secs = secs;
    }
    ensure_dir(&settings.data_dir)?;
    crate::logging::init(&settings.log_path())?;

    let store = CredentialStore::open(settings.credentials_path());

    if set_pin {
        return cli_set_pin(&store);
    }
    if remove_pin {
        return cli_remove_pin(&store);
    }

    run_tui(&settings, store)
}

/// Persists a new data directory (and optionally the inactivity window).
fn set_data_dir(raw: &str, inactivity: Option<u64>) -> Result<()> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    let dir = validate_data_dir(Path::new(raw), &home)?;
    ensure_dir(&dir)?;
    let inactivity_secs = match (inactivity, load_config()?) {
        (Some(secs), _) => secs,
        (None, Some(cfg)) => cfg.inactivity_secs,
        (None, None) => DEFAULT_INACTIVITY_SECS,
    };
    let data_dir = dir
        .to_str()
        .ok_or_else(|| anyhow!("Data directory path is not valid UTF-8"))?
        .to_string();
    save_config(&Config {
        data_dir,
        inactivity_secs,
    })?;
    println!("Data directory set to {}", dir.display());
    Ok(())
}

/// Changing an existing PIN from the shell requires the current one.
fn require_current_pin(store: &CredentialStore) -> Result<()> {
    if !store.has_real()? {
        return Ok(());
    }
    let mut current = rpassword::prompt_password("Current PIN: ")?;
    let ok = store.verify_real(current.trim())?;
    current.zeroize();
    if ok {
        Ok(())
    } else {
        Err(LockError::VerificationMismatch.into())
    }
}

fn cli_set_pin(store: &CredentialStore) -> Result<()> {
    require_current_pin(store)?;
    let (pin, dummy) = prompt_pin_setup()?;
    store.set_credentials(&pin, dummy.as_deref().map(String::as_str))?;
    if dummy.is_some() {
        println!("PIN and dummy PIN saved.");
    } else {
        println!("PIN saved. Dummy PIN removed (if any).");
    }
    Ok(())
}

fn cli_remove_pin(store: &CredentialStore) -> Result<()> {
    if !store.has_real()? {
        println!("No PIN set.");
        return Ok(());
    }
    require_current_pin(store)?;
    print!("Remove the PIN (and any dummy PIN)? This will disable locking. (y/N): ");
    io::stdout().flush()?;
    let mut ans = String::new();
    io::stdin().read_line(&mut ans)?;
    if !matches!(ans.trim().to_lowercase().as_str(), "y" | "yes") {
        println!("Cancelled.");
        return Ok(());
    }
    store.clear_all()?;
    println!("PIN removed.");
    Ok(())
}

/// The protected workspace: a local inbox file re-read on a timer while
/// the lock allows it.
struct Inbox {
    path: PathBuf,
    lines: Vec<String>,
    polling: bool,
    last_poll: Option<Instant>,
    last_refresh: Option<u64>,
}

impl Inbox {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            lines: Vec::new(),
            polling: false,
            last_poll: None,
            last_refresh: None,
        }
    }

    fn poll(&mut self, now: Instant) {
        if !self.polling {
            return;
        }
        let due = match self.last_poll {
            Some(at) => now.duration_since(at) >= Duration::from_secs(INBOX_POLL_SECS),
            None => true,
        };
        if !due {
            return;
        }
        self.last_poll = Some(now);
        match load_inbox(&self.path) {
            Ok(lines) => {
                self.wipe();
                self.lines = lines;
                self.last_refresh = Some(unix_now());
            }
            Err(e) => warn!(error = %e, "inbox refresh failed"),
        }
    }

    fn wipe(&mut self) {
        for line in &mut self.lines {
            line.zeroize();
        }
        self.lines.clear();
    }
}

impl ProtectedActivity for Inbox {
    fn pause_activity(&mut self) {
        self.polling = false;
        self.last_poll = None;
        self.wipe();
    }

    fn resume_activity(&mut self) {
        self.polling = true;
        self.last_poll = None;
    }
}

#[derive(Default, Zeroize)]
struct PinSetupForm {
    active: bool,
    step: usize,
    fields: [String; 4],
}

impl PinSetupForm {
    fn open() -> Self {
        Self {
            active: true,
            ..Self::default()
        }
    }

    fn reset(&mut self) {
        self.zeroize();
    }
}

fn build_setup_overlay(form: &PinSetupForm) -> Option<Vec<String>> {
    if !form.active {
        return None;
    }
    let labels = ["PIN", "Confirm PIN", "Dummy PIN (optional)", "Confirm dummy PIN"];
    let mut lines = Vec::new();
    lines.push("Set PIN".to_string());
    lines.push("".to_string());
    for (idx, label) in labels.iter().enumerate() {
        let marker = if idx == form.step { ">" } else { " " };
        let masked = "*".repeat(form.fields[idx].chars().count());
        lines.push(format!("{marker} {label}: {masked}"));
    }
    lines.push("Enter next/save; ↑/↓ move fields; Esc cancels".to_string());
    Some(lines)
}

#[derive(Default)]
struct AddNotePrompt {
    active: bool,
    title: String,
}

fn build_note_overlay(prompt: &AddNotePrompt) -> Option<Vec<String>> {
    if !prompt.active {
        return None;
    }
    Some(vec![
        "New note title".to_string(),
        "".to_string(),
        format!("> {}", prompt.title),
        "".to_string(),
        "Enter to edit in $EDITOR".to_string(),
    ])
}

/// The decoy: an ordinary notes book.
struct NotesMode {
    path: PathBuf,
    book: NoteBook,
    visible: Vec<usize>,
    note_idx: usize,
    search: String,
    searching: bool,
    add_prompt: AddNotePrompt,
    delete_idx: Option<usize>,
}

impl NotesMode {
    fn open(path: &Path) -> Result<Self> {
        let mut book = load_notes(path)?;
        if seed_notes_if_empty(&mut book) {
            save_notes(path, &book)?;
        }
        book.sort_newest_first();
        let visible = book.search("");
        Ok(Self {
            path: path.to_path_buf(),
            book,
            visible,
            note_idx: 0,
            search: String::new(),
            searching: false,
            add_prompt: AddNotePrompt::default(),
            delete_idx: None,
        })
    }

    fn refilter(&mut self) {
        self.visible = self.book.search(&self.search);
        self.note_idx = self.note_idx.min(self.visible.len().saturating_sub(1));
    }

    fn selected(&self) -> Option<usize> {
        self.visible.get(self.note_idx).copied()
    }

    fn persist(&mut self) -> Result<()> {
        self.book.sort_newest_first();
        save_notes(&self.path, &self.book)?;
        self.refilter();
        Ok(())
    }

    fn delete(&mut self, idx: usize) -> Result<bool> {
        if self.book.remove(idx, unix_now()).is_none() {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }
}

struct StatusLine {
    text: String,
    hint: &'static str,
    until: Option<Instant>,
}

impl StatusLine {
    fn new(hint: &'static str) -> Self {
        Self {
            text: hint.to_string(),
            hint,
            until: None,
        }
    }

    fn set(&mut self, text: impl Into<String>, now: Instant) {
        self.text = text.into();
        self.until = Some(now + Duration::from_secs(STATUS_MESSAGE_SECS));
    }

    fn expire(&mut self, now: Instant) {
        if let Some(until) = self.until {
            if now >= until {
                self.text = self.hint.to_string();
                self.until = None;
            }
        }
    }

    fn reset(&mut self) {
        self.text = self.hint.to_string();
        self.until = None;
    }
}

struct Screen {
    lock_status: StatusLine,
    inbox_status: StatusLine,
    notes_status: StatusLine,
    shake_until: Option<Instant>,
    anim_frame: usize,
    inbox_idx: usize,
    setup_form: PinSetupForm,
    remove_overlay: bool,
    quit_overlay: bool,
    notes: Option<NotesMode>,
}

fn run_tui(settings: &Settings, store: CredentialStore) -> Result<()> {
    let now = Instant::now();
    let mut gate = LockGate::open(
        store,
        Inbox::new(settings.inbox_path()),
        Duration::from_secs(settings.inactivity_secs),
        now,
    );
    let decoy_requested = Rc::new(Cell::new(false));
    {
        let flag = Rc::clone(&decoy_requested);
        gate.register_decoy(move || flag.set(true));
    }
    info!(
        inactivity_secs = settings.inactivity_secs,
        pin_configured = gate.has_pin(),
        "session started"
    );

    install_panic_hook();
    let mut terminal = setup_terminal()?;
    let mut screen = Screen {
        lock_status: StatusLine::new(LOCK_HINT),
        inbox_status: StatusLine::new(INBOX_NAV_HINT),
        notes_status: StatusLine::new(NOTES_NAV_HINT),
        shake_until: None,
        anim_frame: 0,
        inbox_idx: 0,
        setup_form: PinSetupForm::default(),
        remove_overlay: false,
        quit_overlay: false,
        notes: None,
    };

    let result = (|| -> Result<()> {
        loop {
            let now = Instant::now();
            gate.tick(now);
            gate.protected_mut().poll(now);
            screen.anim_frame = screen.anim_frame.wrapping_add(1);

            if decoy_requested.replace(false) {
                screen.notes = Some(NotesMode::open(&settings.notes_path())?);
                screen.notes_status.reset();
            }
            if !gate.decoy_active() {
                screen.notes = None;
            }
            if gate.overlay_visible() {
                screen.setup_form.reset();
                screen.remove_overlay = false;
                screen.quit_overlay = false;
            }
            match gate.take_notice() {
                Some(Notice::Incorrect) => {
                    screen.lock_status.set(Notice::Incorrect.message(), now);
                    screen.shake_until = Some(now + Duration::from_millis(SHAKE_MILLIS));
                }
                Some(Notice::EnterFullPin) => {
                    screen.lock_status.set(Notice::EnterFullPin.message(), now);
                }
                Some(Notice::SetupRequired) => {
                    screen.setup_form = PinSetupForm::open();
                    screen.inbox_status.set(Notice::SetupRequired.message(), now);
                }
                None => {}
            }
            screen.lock_status.expire(now);
            screen.inbox_status.expire(now);
            screen.notes_status.expire(now);

            draw_screen(&mut terminal, &gate, &screen, now)?;

            if !event::poll(Duration::from_millis(EVENT_POLL_MILLIS))? {
                continue;
            }
            let now = Instant::now();
            match event::read()? {
                Event::FocusLost => gate.hidden(now),
                Event::FocusGained => gate.visible(now),
                Event::Paste(mut text) => {
                    gate.activity(now);
                    if gate.overlay_visible() {
                        gate.paste(&text, now);
                    }
                    text.zeroize();
                }
                Event::Mouse(_) => gate.activity(now),
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    gate.activity(now);
                    if is_ctrl(&key, 'c') {
                        break;
                    }
                    if gate.overlay_visible() {
                        handle_lock_key(key, &mut gate, now);
                    } else if let Some(notes) = screen.notes.as_mut() {
                        handle_notes_key(
                            key,
                            notes,
                            &mut screen.notes_status,
                            &mut gate,
                            &mut terminal,
                            now,
                        )?;
                    } else if handle_inbox_key(key, &mut screen, &mut gate, now)? {
                        break;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    })();

    teardown_terminal(&mut terminal);
    screen.setup_form.reset();
    if let Err(e) = &result {
        error!(error = %e, "session ended with error");
    } else {
        info!("session ended");
    }
    result
}

fn draw_screen(
    terminal: &mut Term,
    gate: &LockGate<Inbox>,
    screen: &Screen,
    now: Instant,
) -> Result<()> {
    terminal.draw(|f| {
        if gate.overlay_visible() {
            let view = LockViewState {
                boxes: gate.box_count(),
                filled: gate.display(),
                status: screen.lock_status.text.clone(),
                shaking: matches!(screen.shake_until, Some(until) if now < until),
                anim_frame: screen.anim_frame,
            };
            draw_lock(f, &view);
        } else if let Some(notes) = &screen.notes {
            let view = NoteViewState {
                notes: &notes.book.notes,
                visible: &notes.visible,
                note_idx: notes.note_idx,
                search: &notes.search,
                searching: notes.searching,
                delete_overlay: notes.delete_idx.map(|_| "Delete note?".to_string()),
                add_overlay: build_note_overlay(&notes.add_prompt),
                status: screen.notes_status.text.clone(),
            };
            draw_notes(f, &view);
        } else {
            let inbox = gate.protected();
            let (overlay, overlay_title) = if screen.setup_form.active {
                (
                    build_setup_overlay(&screen.setup_form),
                    Some("PIN setup".to_string()),
                )
            } else if screen.remove_overlay {
                (
                    Some(vec![
                        "Remove the PIN (and any dummy PIN)?".to_string(),
                        "This will disable locking.".to_string(),
                        "".to_string(),
                        "[y] Yes   [n] No".to_string(),
                    ]),
                    Some("Remove PIN".to_string()),
                )
            } else {
                (None, None)
            };
            let quit_prompt = if screen.quit_overlay {
                Some(vec![
                    "Quit?".to_string(),
                    "".to_string(),
                    "[y] Yes   [n] No".to_string(),
                ])
            } else {
                None
            };
            let view = InboxViewState {
                lines: &inbox.lines,
                selected: screen.inbox_idx,
                polling: inbox.polling,
                last_refresh: inbox.last_refresh,
                status: screen.inbox_status.text.clone(),
                overlay,
                overlay_title,
                quit_overlay: quit_prompt,
            };
            draw_inbox(f, &view);
        }
    })?;
    Ok(())
}

fn is_ctrl(key: &KeyEvent, c: char) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char(k) if k.eq_ignore_ascii_case(&c))
}

fn handle_lock_key(key: KeyEvent, gate: &mut LockGate<Inbox>, now: Instant) {
    if is_ctrl(&key, 'v') {
        match read_clipboard_text() {
            Ok(mut text) => {
                gate.paste(&text, now);
                text.zeroize();
            }
            Err(e) => warn!(error = %e, "clipboard paste failed"),
        }
        return;
    }
    match key.code {
        KeyCode::Char(c) => {
            let mut buf = [0u8; 4];
            gate.type_digits(c.encode_utf8(&mut buf), now);
        }
        KeyCode::Backspace => gate.backspace(),
        KeyCode::Enter => gate.submit(now),
        KeyCode::Esc => gate.cancel(),
        _ => {}
    }
}

/// Returns `true` when the user confirmed quitting.
fn handle_inbox_key(
    key: KeyEvent,
    screen: &mut Screen,
    gate: &mut LockGate<Inbox>,
    now: Instant,
) -> Result<bool> {
    if screen.quit_overlay {
        match key.code {
            KeyCode::Char('y') => return Ok(true),
            KeyCode::Char('n') | KeyCode::Esc => screen.quit_overlay = false,
            _ => {}
        }
        return Ok(false);
    }

    if screen.remove_overlay {
        match key.code {
            KeyCode::Char('y') => {
                screen.remove_overlay = false;
                match gate.remove_credentials(now) {
                    Ok(()) => screen.inbox_status.set("PIN removed.", now),
                    Err(e) => screen.inbox_status.set(e.to_string(), now),
                }
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                screen.remove_overlay = false;
                screen.inbox_status.set("Remove cancelled", now);
            }
            _ => {}
        }
        return Ok(false);
    }

    if screen.setup_form.active {
        handle_setup_key(key.code, screen, gate, now);
        return Ok(false);
    }

    let count = gate.protected().lines.len();
    match key.code {
        KeyCode::Esc => screen.quit_overlay = true,
        KeyCode::Up => screen.inbox_idx = screen.inbox_idx.saturating_sub(1),
        KeyCode::Down => {
            screen.inbox_idx = (screen.inbox_idx + 1).min(count.saturating_sub(1));
        }
        KeyCode::Char('l') => gate.lock_now(now),
        KeyCode::Char('p') => {
            screen.setup_form = PinSetupForm::open();
            screen.inbox_status.set("Set a 4–8 digit PIN", now);
        }
        KeyCode::Char('r') => {
            if gate.has_pin() {
                screen.remove_overlay = true;
            } else {
                screen.inbox_status.set("No PIN set.", now);
            }
        }
        _ => {}
    }
    Ok(false)
}

fn handle_setup_key(key: KeyCode, screen: &mut Screen, gate: &mut LockGate<Inbox>, now: Instant) {
    let form = &mut screen.setup_form;
    match key {
        KeyCode::Esc => {
            form.reset();
            screen.inbox_status.set("PIN setup cancelled", now);
        }
        KeyCode::Up | KeyCode::BackTab => form.step = form.step.saturating_sub(1),
        KeyCode::Down | KeyCode::Tab => form.step = (form.step + 1).min(3),
        KeyCode::Backspace => {
            form.fields[form.step].pop();
        }
        KeyCode::Char(c) => form.fields[form.step].push(c),
        KeyCode::Enter if form.step < 3 => form.step += 1,
        KeyCode::Enter => {
            let [pin, confirm, dummy, dummy_confirm] = &form.fields;
            let (pin, confirm) = (pin.trim(), confirm.trim());
            let (dummy, dummy_confirm) = (dummy.trim(), dummy_confirm.trim());
            if let Err(e) = validate_pin_setup(pin, confirm, dummy, dummy_confirm) {
                screen.inbox_status.set(e.to_string(), now);
                return;
            }
            let dummy = if dummy.is_empty() { None } else { Some(dummy) };
            let saved = gate.save_credentials(pin, dummy, now);
            let message = match (&saved, dummy.is_some()) {
                (Ok(()), true) => "PIN and dummy PIN saved.".to_string(),
                (Ok(()), false) => "PIN saved. Dummy PIN removed (if any).".to_string(),
                (Err(e), _) => e.to_string(),
            };
            if saved.is_ok() {
                form.reset();
            }
            screen.inbox_status.set(message, now);
        }
        _ => {}
    }
}

fn handle_notes_key(
    key: KeyEvent,
    notes: &mut NotesMode,
    status: &mut StatusLine,
    gate: &mut LockGate<Inbox>,
    terminal: &mut Term,
    now: Instant,
) -> Result<()> {
    if notes.delete_idx.is_some() {
        match key.code {
            KeyCode::Char('y') => {
                if let Some(idx) = notes.delete_idx.take() {
                    if notes.delete(idx)? {
                        status.set("Note deleted", now);
                    }
                }
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                notes.delete_idx = None;
                status.set("Delete cancelled", now);
            }
            _ => {}
        }
        return Ok(());
    }

    if notes.add_prompt.active {
        match key.code {
            KeyCode::Esc => {
                notes.add_prompt = AddNotePrompt::default();
                status.set("Add note cancelled", now);
            }
            KeyCode::Backspace => {
                notes.add_prompt.title.pop();
            }
            KeyCode::Enter => {
                let title = notes.add_prompt.title.trim().to_string();
                if title.is_empty() {
                    status.set("Title required", now);
                } else {
                    let note = Note {
                        id: crate::models::new_uuid(),
                        title,
                        content: String::new(),
                        updated_at: unix_now(),
                    };
                    match edit_note_with_editor(note, terminal)? {
                        Some(updated) => {
                            notes.book.notes.push(updated);
                            notes.search.clear();
                            notes.persist()?;
                            notes.note_idx = 0;
                            status.set("Note added", now);
                        }
                        None => status.set("Editor cancelled", now),
                    }
                    notes.add_prompt = AddNotePrompt::default();
                }
            }
            KeyCode::Char(c) => notes.add_prompt.title.push(c),
            _ => {}
        }
        return Ok(());
    }

    if notes.searching {
        match key.code {
            KeyCode::Enter | KeyCode::Esc => notes.searching = false,
            KeyCode::Backspace => {
                notes.search.pop();
                notes.refilter();
            }
            KeyCode::Char(c) => {
                notes.search.push(c);
                notes.refilter();
            }
            _ => {}
        }
        return Ok(());
    }

    match key.code {
        KeyCode::Esc => gate.exit_decoy(now),
        KeyCode::Up => notes.note_idx = notes.note_idx.saturating_sub(1),
        KeyCode::Down => {
            notes.note_idx = (notes.note_idx + 1).min(notes.visible.len().saturating_sub(1));
        }
        KeyCode::Char('/') => notes.searching = true,
        KeyCode::Char('n') => {
            notes.add_prompt = AddNotePrompt {
                active: true,
                title: String::new(),
            };
            status.set("Type note title, Enter to edit", now);
        }
        KeyCode::Right => {
            if let Some(idx) = notes.selected() {
                let existing = notes.book.notes[idx].clone();
                if let Some(updated) = edit_note_with_editor(existing, terminal)? {
                    notes.book.notes[idx] = updated;
                    notes.persist()?;
                    notes.note_idx = 0;
                    status.set("Note updated", now);
                }
            }
        }
        KeyCode::Char('d') => {
            if let Some(idx) = notes.selected() {
                notes.delete_idx = Some(idx);
                status.set("Confirm delete with y/n", now);
            }
        }
        KeyCode::Enter | KeyCode::Char('c') => {
            if let Some(note) = notes.selected().and_then(|i| notes.book.notes.get(i)) {
                match copy_note_to_clipboard(note) {
                    Ok(_) => status.set(format!("Copied note '{}'", note.title), now),
                    Err(e) => status.set(format!("Clipboard error: {e}"), now),
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn edit_note_with_editor(note: Note, terminal: &mut Term) -> Result<Option<Note>> {
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen, Show).ok();

    let mut file = NamedTempFile::new()?;
    file.write_all(note.content.as_bytes())?;
    file.flush()?;

    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = Command::new(editor)
        .arg(file.path())
        .status()
        .map_err(|e| anyhow!("Failed to launch editor: {e}"));

    execute!(terminal.backend_mut(), EnterAlternateScreen, Hide).ok();
    enable_raw_mode().ok();
    terminal.clear()?;

    if !status?.success() {
        return Ok(None);
    }

    let new_content = fs::read_to_string(file.path())?;
    Ok(Some(Note {
        id: note.id,
        title: note.title,
        content: new_content,
        updated_at: unix_now(),
    }))
}

fn setup_terminal() -> Result<Term> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableFocusChange,
        EnableBracketedPaste,
        Hide
    )?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn teardown_terminal(terminal: &mut Term) {
    disable_raw_mode().ok();
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        DisableFocusChange,
        LeaveAlternateScreen,
        Show
    )
    .ok();
    terminal.show_cursor().ok();
}

fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(
            io::stdout(),
            DisableBracketedPaste,
            DisableFocusChange,
            LeaveAlternateScreen,
            Show
        );
        original_hook(panic_info);
    }));
}

fn print_usage(bin_name: &str) {
    eprintln!("Usage: {bin_name} [OPTIONS]");
    eprintln!("      --set-pin           Set or change the PIN and optional dummy PIN");
    eprintln!("      --remove-pin        Remove the PIN lock");
    eprintln!("      --inactivity <SECS> Auto-lock after SECS seconds without input");
    eprintln!("      --data-dir <PATH>   Save PATH (inside $HOME) as the data directory");
    eprintln!("  -h, --help              Show this help");
    eprintln!("  -V, --version           Show version and exit");
}

fn executable_name() -> String {
    let fallback = "pinveil".to_string();
    let arg0 = match std::env::args().next() {
        Some(v) => v,
        None => return fallback,
    };
    let path = Path::new(&arg0);
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_overlay_masks_fields() {
        let mut form = PinSetupForm::open();
        form.fields[0] = "1234".to_string();
        form.step = 0;
        let lines = build_setup_overlay(&form).unwrap();
        assert!(lines.iter().any(|l| l == "> PIN: ****"));
        assert!(!lines.iter().any(|l| l.contains("1234")));
        form.reset();
        assert!(build_setup_overlay(&form).is_none());
        assert!(form.fields.iter().all(String::is_empty));
    }

    #[test]
    fn inbox_pause_wipes_and_stops_polling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inbox.txt");
        fs::write(&path, "first\nsecond\n").unwrap();
        let mut inbox = Inbox::new(path);
        let now = Instant::now();
        inbox.poll(now);
        assert!(inbox.lines.is_empty());

        inbox.resume_activity();
        inbox.poll(now);
        assert_eq!(inbox.lines.len(), 2);

        inbox.pause_activity();
        assert!(inbox.lines.is_empty());
        inbox.poll(now + Duration::from_secs(60));
        assert!(inbox.lines.is_empty());
    }

    #[test]
    fn inbox_polls_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inbox.txt");
        fs::write(&path, "one\n").unwrap();
        let mut inbox = Inbox::new(path.clone());
        inbox.resume_activity();
        let now = Instant::now();
        inbox.poll(now);
        fs::write(&path, "one\ntwo\n").unwrap();
        inbox.poll(now + Duration::from_secs(1));
        assert_eq!(inbox.lines.len(), 1);
        inbox.poll(now + Duration::from_secs(INBOX_POLL_SECS));
        assert_eq!(inbox.lines.len(), 2);
    }

    #[test]
    fn status_line_reverts_to_hint() {
        let now = Instant::now();
        let mut status = StatusLine::new(LOCK_HINT);
        status.set("Incorrect PIN", now);
        status.expire(now + Duration::from_secs(1));
        assert_eq!(status.text, "Incorrect PIN");
        status.expire(now + Duration::from_secs(STATUS_MESSAGE_SECS));
        assert_eq!(status.text, LOCK_HINT);
    }

    #[test]
    fn deleting_every_note_keeps_a_blank_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        let mut notes = NotesMode::open(&path).unwrap();
        assert!(notes.delete(0).unwrap());
        assert_eq!(notes.book.notes.len(), 1);
        assert_eq!(notes.book.notes[0].title, "Untitled");
        assert_eq!(notes.visible, vec![0]);

        let reloaded = load_notes(&path).unwrap();
        assert_eq!(reloaded.notes[0].title, "Untitled");
        assert!(!notes.delete(3).unwrap());
    }

    #[test]
    fn notes_mode_seeds_decoy_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        let notes = NotesMode::open(&path).unwrap();
        assert_eq!(notes.book.notes.len(), 1);
        assert_eq!(notes.visible, vec![0]);
        assert!(path.exists());
    }
}
