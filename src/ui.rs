use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use arboard::Clipboard;
use crossterm::terminal::disable_raw_mode;
use ratatui::{
    prelude::*,
    style::Style,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use rpassword::prompt_password;
use zeroize::Zeroizing;

use crate::crypto::is_valid_pin;
use crate::models::Note;

const CLIPBOARD_LIFETIME_SECS: u64 = 20;
const COLOR_SAND: Color = Color::Rgb(0xEB, 0xDB, 0xB2);
const COLOR_OLIVE: Color = Color::Rgb(0x98, 0x97, 0x1A);
const COLOR_MOSS: Color = Color::Rgb(0x67, 0x67, 0x1C);
const COLOR_ALERT: Color = Color::Rgb(0xCC, 0x24, 0x1D);

#[derive(Clone, Copy)]
struct OverlayTheme {
    border: Color,
    title: Color,
    text: Color,
    bg: Color,
}

fn themed_overlay(title: &str) -> OverlayTheme {
    match title {
        "PIN setup" => OverlayTheme {
            border: COLOR_MOSS,
            title: Color::Rgb(0xD8, 0xCB, 0xA6),
            text: COLOR_SAND,
            bg: Color::Rgb(0x16, 0x19, 0x0D),
        },
        "Add note" => OverlayTheme {
            border: Color::Rgb(0x86, 0x86, 0x35),
            title: COLOR_SAND,
            text: Color::Rgb(0xE3, 0xD5, 0xAE),
            bg: Color::Rgb(0x1A, 0x1D, 0x12),
        },
        "Confirm delete" | "Remove PIN" => OverlayTheme {
            border: Color::Rgb(0xB3, 0x88, 0x45),
            title: Color::Rgb(0xF0, 0xD8, 0xA8),
            text: COLOR_SAND,
            bg: Color::Rgb(0x2A, 0x1C, 0x11),
        },
        "Confirm quit" => OverlayTheme {
            border: Color::Rgb(0xA7, 0xA2, 0x36),
            title: Color::Rgb(0xE6, 0xD8, 0xB2),
            text: COLOR_SAND,
            bg: Color::Rgb(0x25, 0x24, 0x13),
        },
        _ => OverlayTheme {
            border: COLOR_MOSS,
            title: COLOR_SAND,
            text: COLOR_SAND,
            bg: Color::Rgb(0x1E, 0x20, 0x12),
        },
    }
}

fn centered_overlay_area(frame_size: Rect, lines: &[String]) -> Rect {
    let maxw = lines.iter().map(|s| s.chars().count()).max().unwrap_or(0) as u16 + 4;
    let maxh = lines.len() as u16 + 2;
    Rect::new(
        (frame_size.width.saturating_sub(maxw)) / 2,
        (frame_size.height.saturating_sub(maxh)) / 2,
        maxw.min(frame_size.width),
        maxh.min(frame_size.height),
    )
}

fn render_overlay(f: &mut Frame<'_>, lines: &[String], title: &str) {
    let area = centered_overlay_area(f.size(), lines);
    let theme = themed_overlay(title);
    let paragraph = Paragraph::new(
        lines
            .iter()
            .map(|l| Line::from(l.as_str()))
            .collect::<Vec<Line>>(),
    )
    .style(Style::default().fg(theme.text).bg(theme.bg))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(
                title,
                Style::default()
                    .fg(theme.title)
                    .add_modifier(Modifier::BOLD),
            ))
            .border_style(
                Style::default()
                    .fg(theme.border)
                    .add_modifier(Modifier::BOLD),
            )
            .style(Style::default().bg(theme.bg)),
    );
    f.render_widget(Clear, area);
    f.render_widget(paragraph, area);
}

const PADLOCK_FRAMES: [&[&str]; 3] = [
    &[
        "    ┌───┐    ",
        "    │   │    ",
        "  ┌─┴───┴─┐  ",
        "  │   ●   │  ",
        "  │   ┃   │  ",
        "  └───────┘  ",
    ],
    &[
        "    ┌───┐    ",
        "    │   │    ",
        "  ┌─┴───┴─┐  ",
        "  │   ◉   │  ",
        "  │   ┃   │  ",
        "  └───────┘  ",
    ],
    &[
        "    ┌───┐    ",
        "    │   │    ",
        "  ┌─┴───┴─┐  ",
        "  │   ○   │  ",
        "  │   ┃   │  ",
        "  └───────┘  ",
    ],
];

const PIN_BOX_WIDTH: u16 = 5;
const PIN_BOX_GAP: u16 = 1;

pub struct LockViewState<'a> {
    pub boxes: usize,
    pub filled: &'a str,
    pub status: String,
    pub shaking: bool,
    pub anim_frame: usize,
}

pub struct InboxViewState<'a> {
    pub lines: &'a [String],
    pub selected: usize,
    pub polling: bool,
    pub last_refresh: Option<u64>,
    pub status: String,
    pub overlay: Option<Vec<String>>,
    pub overlay_title: Option<String>,
    pub quit_overlay: Option<Vec<String>>,
}

pub struct NoteViewState<'a> {
    pub notes: &'a [Note],
    pub visible: &'a [usize],
    pub note_idx: usize,
    pub search: &'a str,
    pub searching: bool,
    pub delete_overlay: Option<String>,
    pub add_overlay: Option<Vec<String>>,
    pub status: String,
}

/// Horizontal offset for the PIN boxes; alternates while shaking.
fn shake_offset(state: &LockViewState) -> i16 {
    if !state.shaking {
        return 0;
    }
    match state.anim_frame % 4 {
        0 => -2,
        1 => 2,
        2 => -1,
        _ => 1,
    }
}

pub fn draw_lock(f: &mut Frame<'_>, state: &LockViewState) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),  // top padding
            Constraint::Length(7),  // padlock
            Constraint::Length(1),  // label
            Constraint::Length(3),  // pin boxes
            Constraint::Min(0),     // spacer
            Constraint::Length(3),  // footer
        ])
        .split(f.size());

    let frame = PADLOCK_FRAMES[(state.anim_frame / 4) % PADLOCK_FRAMES.len()];
    let padlock: Vec<Line> = frame
        .iter()
        .map(|l| Line::from(Span::styled(*l, Style::default().fg(COLOR_SAND))))
        .collect();
    f.render_widget(
        Paragraph::new(padlock).alignment(Alignment::Center),
        layout[1],
    );

    let label = Paragraph::new("Enter PIN")
        .alignment(Alignment::Center)
        .style(Style::default().fg(COLOR_SAND).add_modifier(Modifier::BOLD));
    f.render_widget(label, layout[2]);

    let row = layout[3];
    let count = state.boxes as u16;
    let total = count * PIN_BOX_WIDTH + count.saturating_sub(1) * PIN_BOX_GAP;
    let base_x = row.x + row.width.saturating_sub(total) / 2;
    let base_x = (base_x as i16 + shake_offset(state)).max(row.x as i16) as u16;
    let border = if state.shaking { COLOR_ALERT } else { COLOR_OLIVE };
    let filled: Vec<char> = state.filled.chars().collect();
    for i in 0..count {
        let x = base_x + i * (PIN_BOX_WIDTH + PIN_BOX_GAP);
        if x + PIN_BOX_WIDTH > row.x + row.width {
            break;
        }
        let area = Rect::new(x, row.y, PIN_BOX_WIDTH, row.height);
        let glyph = if (i as usize) < filled.len() { "•" } else { " " };
        let cell = Paragraph::new(Span::styled(
            glyph,
            Style::default().fg(COLOR_SAND).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border)),
        );
        f.render_widget(cell, area);
    }

    let footer = Paragraph::new(state.status.clone()).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, layout[5]);
}

pub fn draw_inbox(f: &mut Frame<'_>, state: &InboxViewState) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)])
        .split(f.size());

    let items: Vec<ListItem> = if state.lines.is_empty() {
        vec![ListItem::new("Inbox is empty")]
    } else {
        state.lines.iter().map(|l| ListItem::new(l.clone())).collect()
    };
    let mut list_state = ListState::default();
    if !state.lines.is_empty() {
        list_state.select(Some(state.selected.min(state.lines.len() - 1)));
    }
    let title = match (state.polling, state.last_refresh) {
        (true, Some(ts)) => format!("Inbox (live, refreshed {ts})"),
        (true, None) => "Inbox (live)".to_string(),
        (false, _) => "Inbox (paused)".to_string(),
    };
    let list = List::new(items)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_symbol("▶ ")
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .bg(Color::Rgb(40, 40, 40))
                .add_modifier(Modifier::BOLD),
        );
    f.render_stateful_widget(list, layout[0], &mut list_state);

    let footer = Paragraph::new(state.status.clone()).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, layout[1]);

    if let Some(lines) = &state.overlay {
        let title = state.overlay_title.as_deref().unwrap_or("Overlay");
        render_overlay(f, lines, title);
    }

    if let Some(lines) = &state.quit_overlay {
        render_overlay(f, lines, "Confirm quit");
    }
}

pub fn draw_notes(f: &mut Frame<'_>, state: &NoteViewState) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)])
        .split(f.size());

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(layout[0]);

    let sidebar = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(body[0]);

    let search_style = if state.searching {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let search = Paragraph::new(format!("/ {}", state.search))
        .style(search_style)
        .block(Block::default().title("Search").borders(Borders::ALL));
    f.render_widget(search, sidebar[0]);

    let items: Vec<ListItem> = if state.visible.is_empty() {
        vec![ListItem::new("No notes")]
    } else {
        state
            .visible
            .iter()
            .filter_map(|&i| state.notes.get(i))
            .map(|n| ListItem::new(n.title.clone()))
            .collect()
    };
    let mut list_state = ListState::default();
    if !state.visible.is_empty() {
        list_state.select(Some(state.note_idx.min(state.visible.len() - 1)));
    }
    let list = List::new(items)
        .block(Block::default().title("Notes").borders(Borders::ALL))
        .highlight_symbol("▶ ")
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .bg(Color::Rgb(40, 40, 40))
                .add_modifier(Modifier::BOLD),
        );
    f.render_stateful_widget(list, sidebar[1], &mut list_state);

    let detail_block = Block::default().title("Content").borders(Borders::ALL);
    let selected = state
        .visible
        .get(state.note_idx.min(state.visible.len().saturating_sub(1)))
        .and_then(|&i| state.notes.get(i));
    let detail_text = if let Some(note) = selected {
        format!("Title: {}\n\n{}", note.title, note.content)
    } else {
        "No note selected.".to_string()
    };
    let detail = Paragraph::new(detail_text).wrap(Wrap { trim: true }).block(detail_block);
    f.render_widget(detail, body[1]);

    let footer = Paragraph::new(state.status.clone()).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, layout[1]);

    if let Some(lines) = &state.add_overlay {
        render_overlay(f, lines, "Add note");
    }

    if let Some(msg) = &state.delete_overlay {
        let text = vec![msg.clone(), "".to_string(), "[y] Yes   [n] No".to_string()];
        render_overlay(f, &text, "Confirm delete");
    }
}

/// Validates the setup form the way the lock screen expects it: 4–8 digits,
/// matching confirmations, and a dummy that differs from the main PIN.
pub fn validate_pin_setup(pin: &str, confirm: &str, dummy: &str, dummy_confirm: &str) -> Result<()> {
    if !is_valid_pin(pin) {
        return Err(anyhow!("PIN must be 4–8 digits."));
    }
    if pin != confirm {
        return Err(anyhow!("PINs do not match."));
    }
    if !dummy.is_empty() || !dummy_confirm.is_empty() {
        if !is_valid_pin(dummy) {
            return Err(anyhow!("Dummy PIN must be 4–8 digits."));
        }
        if dummy != dummy_confirm {
            return Err(anyhow!("Dummy PINs do not match."));
        }
        if dummy == pin {
            return Err(anyhow!("Dummy PIN should be different from the main PIN."));
        }
    }
    Ok(())
}

/// Hidden-input PIN setup on a plain terminal. Returns the main PIN and the
/// optional dummy PIN; every typed value is wiped when dropped.
pub fn prompt_pin_setup() -> Result<(Zeroizing<String>, Option<Zeroizing<String>>)> {
    disable_raw_mode().ok();
    loop {
        let pin = hidden_prompt("New PIN (4–8 digits): ")?;
        let confirm = hidden_prompt("Confirm PIN: ")?;
        let dummy = hidden_prompt("Dummy PIN (optional, Enter to skip): ")?;
        let dummy_confirm = if dummy.is_empty() {
            Zeroizing::new(String::new())
        } else {
            hidden_prompt("Confirm dummy PIN: ")?
        };
        match validate_pin_setup(&pin, &confirm, &dummy, &dummy_confirm) {
            Ok(()) => {
                let dummy = if dummy.is_empty() { None } else { Some(dummy) };
                return Ok((pin, dummy));
            }
            Err(e) => println!("{e}"),
        }
    }
}

fn hidden_prompt(label: &str) -> Result<Zeroizing<String>> {
    let raw = Zeroizing::new(prompt_password(label)?);
    Ok(Zeroizing::new(raw.trim().to_string()))
}

pub fn read_clipboard_text() -> Result<String> {
    let mut clipboard = Clipboard::new().map_err(|e| anyhow!("Clipboard unavailable: {e}"))?;
    clipboard
        .get_text()
        .map_err(|e| anyhow!("Failed to read clipboard: {e}"))
}

pub fn copy_note_to_clipboard(note: &Note) -> Result<()> {
    let mut clipboard = Clipboard::new().map_err(|e| anyhow!("Clipboard unavailable: {e}"))?;
    clipboard
        .set_text(note.content.clone())
        .map_err(|e| anyhow!("Failed to set clipboard: {e}"))?;
    let mut clip = clipboard;
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(CLIPBOARD_LIFETIME_SECS));
        let _ = clip.set_text(String::new());
    });
    Ok(())
}
