use std::cell::Cell;
use std::io::{self, Stdout};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::wrap;
use unicode_width::UnicodeWidthChar;

use crate::controller::{Controller, Limit, LoadOutcome};
use crate::data::Page;
use crate::gallery::{Entry, SortKey};
use crate::reddit::{Category, ListingError};

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const CARD_WIDTH: u16 = 34;
const CARD_HEIGHT: u16 = 8;
const FORM_HEIGHT: u16 = 3;

/// Sorter choices in selector order; `None` turns sorting off.
const SORT_CHOICES: [Option<SortKey>; 4] = [
    Some(SortKey::Score),
    Some(SortKey::Downs),
    Some(SortKey::Created),
    None,
];

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Subreddit,
    Category,
    Limit,
    Sort,
    Gallery,
}

impl Field {
    fn title(self) -> &'static str {
        match self {
            Field::Subreddit => "Subreddit",
            Field::Category => "Category",
            Field::Limit => "Limit",
            Field::Sort => "Sort by",
            Field::Gallery => "Posts",
        }
    }

    fn next(self) -> Self {
        match self {
            Field::Subreddit => Field::Category,
            Field::Category => Field::Limit,
            Field::Limit => Field::Sort,
            Field::Sort => Field::Gallery,
            Field::Gallery => Field::Subreddit,
        }
    }

    fn previous(self) -> Self {
        match self {
            Field::Subreddit => Field::Gallery,
            Field::Category => Field::Subreddit,
            Field::Limit => Field::Category,
            Field::Sort => Field::Limit,
            Field::Gallery => Field::Sort,
        }
    }
}

enum AsyncResponse {
    Listing {
        request_id: u64,
        result: Result<Page, ListingError>,
    },
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        if self.last_tick.elapsed() >= Duration::from_millis(100) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = Instant::now();
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

fn cycle<T: Copy + PartialEq>(choices: &[T], current: T, delta: i32) -> T {
    let len = choices.len() as i32;
    let index = choices.iter().position(|c| *c == current).unwrap_or(0) as i32;
    choices[(index + delta).rem_euclid(len) as usize]
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage(100 - percent_x - (100 - percent_x) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage(100 - percent_y - (100 - percent_y) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}

fn grid_columns(width: u16) -> usize {
    usize::from((width / CARD_WIDTH).max(1))
}

fn truncate_to_width(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width.saturating_sub(1) {
            out.push('…');
            return out;
        }
        used += w;
        out.push(ch);
    }
    out
}

pub fn format_age(created_utc: f64, now: DateTime<Utc>) -> String {
    if created_utc <= 0.0 {
        return "?".into();
    }
    let Some(created) = DateTime::<Utc>::from_timestamp(created_utc.trunc() as i64, 0) else {
        return "?".into();
    };
    let age = now.signed_duration_since(created);
    if age.num_days() > 0 {
        format!("{}d", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{}h", age.num_hours())
    } else {
        format!("{}m", age.num_minutes().max(0))
    }
}

fn sort_label(sort: Option<SortKey>) -> &'static str {
    sort.map(|key| key.label()).unwrap_or("None")
}

pub struct Options {
    pub controller: Controller,
    pub status_message: String,
}

pub struct Model {
    controller: Controller,
    focus: Field,
    subreddit_edited: bool,
    selected: usize,
    row_offset: Cell<usize>,
    columns: Cell<usize>,
    status_message: String,
    spinner: Spinner,
    needs_redraw: bool,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        let mut model = Self {
            controller: opts.controller,
            focus: Field::Gallery,
            subreddit_edited: false,
            selected: 0,
            row_offset: Cell::new(0),
            columns: Cell::new(1),
            status_message: opts.status_message,
            spinner: Spinner::new(),
            needs_redraw: true,
            response_tx,
            response_rx,
        };
        model.start_load();
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if self.handle_key(key) {
                            break;
                        }
                        self.mark_dirty();
                    }
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.controller.is_loading() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn start_load(&mut self) {
        let Some(request) = self.controller.begin_load() else {
            self.status_message = "Enter a subreddit to load posts.".to_string();
            return;
        };
        if self.controller.presenter().is_empty() {
            self.selected = 0;
            self.row_offset.set(0);
        }
        self.status_message = format!(
            "Loading r/{} ({})…",
            request.community,
            request.category.label()
        );
        self.spinner.reset();

        let tx = self.response_tx.clone();
        let service = self.controller.service();
        thread::spawn(move || {
            let result = request.execute(service.as_ref());
            let _ = tx.send(AsyncResponse::Listing {
                request_id: request.request_id,
                result,
            });
        });
    }

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        changed
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Listing { request_id, result } => {
                let Some(outcome) = self.controller.finish_load(request_id, result) else {
                    return;
                };
                let total = self.controller.presenter().len();
                self.status_message = match outcome {
                    LoadOutcome::Rendered(count) => {
                        format!("Loaded {count} posts ({total} shown). Press r for more.")
                    }
                    LoadOutcome::Empty => format!("No suitable posts ({total} shown)."),
                    LoadOutcome::Errored => "Loading failed.".to_string(),
                };
                self.selected = self.selected.min(total.saturating_sub(1));
            }
        }
    }

    /// Returns `true` when the app should quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }
        if self.controller.notice().is_some() {
            self.controller.dismiss_notice();
            return false;
        }

        match key.code {
            KeyCode::Tab => {
                self.set_focus(self.focus.next());
                return false;
            }
            KeyCode::BackTab => {
                self.set_focus(self.focus.previous());
                return false;
            }
            _ => {}
        }

        match self.focus {
            Field::Subreddit => self.handle_subreddit_key(key.code),
            Field::Category => {
                if let Some(delta) = selector_delta(key.code) {
                    let category =
                        cycle(&Category::ALL, self.controller.form().category, delta);
                    self.controller.set_category(category);
                }
                self.handle_common_key(key.code)
            }
            Field::Limit => {
                if let Some(delta) = selector_delta(key.code) {
                    let limit = cycle(&Limit::ALL, self.controller.form().limit, delta);
                    self.controller.set_limit(limit);
                }
                self.handle_common_key(key.code)
            }
            Field::Sort => {
                if let Some(delta) = selector_delta(key.code) {
                    match cycle(&SORT_CHOICES, self.controller.sort_key(), delta) {
                        Some(sort) => self.controller.apply_sort(Some(sort)),
                        None => self.controller.clear_sort(),
                    }
                    self.status_message =
                        format!("Sorted by {}.", sort_label(self.controller.sort_key()));
                }
                self.handle_common_key(key.code)
            }
            Field::Gallery => self.handle_gallery_key(key.code),
        }
    }

    fn set_focus(&mut self, field: Field) {
        if self.focus == Field::Subreddit && field != Field::Subreddit {
            self.commit_subreddit();
        }
        self.focus = field;
    }

    fn commit_subreddit(&mut self) {
        if self.subreddit_edited {
            self.subreddit_edited = false;
            self.controller.on_subreddit_change();
        }
    }

    fn handle_subreddit_key(&mut self, code: KeyCode) -> bool {
        let mut text = self.controller.form().subreddit.clone();
        match code {
            KeyCode::Char(ch) => text.push(ch),
            KeyCode::Backspace => {
                text.pop();
            }
            KeyCode::Enter => {
                self.commit_subreddit();
                self.start_load();
                return false;
            }
            KeyCode::Esc => {
                self.set_focus(Field::Gallery);
                return false;
            }
            _ => return false,
        }
        self.subreddit_edited = true;
        self.controller.on_subreddit_input(text);
        false
    }

    fn handle_common_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Enter | KeyCode::F(5) => self.start_load(),
            KeyCode::Esc => self.set_focus(Field::Gallery),
            KeyCode::Char('q') => return true,
            _ => {}
        }
        false
    }

    fn handle_gallery_key(&mut self, code: KeyCode) -> bool {
        let total = self.controller.presenter().len();
        let columns = self.columns.get().max(1);
        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('r') | KeyCode::F(5) => self.start_load(),
            KeyCode::Char('/') | KeyCode::Char('s') => self.set_focus(Field::Subreddit),
            KeyCode::Left | KeyCode::Char('h') => self.move_selection(-1, total),
            KeyCode::Right | KeyCode::Char('l') => self.move_selection(1, total),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-(columns as i64), total),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(columns as i64, total),
            KeyCode::Enter => self.open_selected(|entry| entry.thread_url.clone(), "thread"),
            KeyCode::Char('o') => self.open_selected(
                |entry| Some(entry.link.clone()).filter(|url| !url.is_empty()),
                "link",
            ),
            _ => {}
        }
        false
    }

    fn move_selection(&mut self, delta: i64, total: usize) {
        if total == 0 {
            return;
        }
        let next = (self.selected as i64 + delta).clamp(0, total as i64 - 1);
        self.selected = next as usize;
    }

    fn selected_entry(&self) -> Option<&Entry> {
        self.controller
            .presenter()
            .visual_order()
            .get(self.selected)
            .copied()
    }

    fn open_selected<F>(&mut self, pick: F, label: &str)
    where
        F: Fn(&Entry) -> Option<String>,
    {
        let Some(url) = self.selected_entry().and_then(pick) else {
            self.status_message = format!("Selected post has no {label}.");
            return;
        };
        match webbrowser::open(&url) {
            Ok(_) => {
                self.status_message = format!("Opened {label} in your browser.");
            }
            Err(err) => {
                tracing::warn!(error = %err, %url, "failed to open browser");
                self.status_message = format!("Failed to open {label}: {err} (URL: {url})");
            }
        }
    }

    fn draw(&self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(FORM_HEIGHT),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.controller.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
        } else {
            self.status_message.clone()
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        self.draw_form(frame, layout[1]);
        self.draw_gallery(frame, layout[2]);

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center);
        frame.render_widget(footer, layout[3]);

        if self.controller.notice().is_some() {
            self.draw_notice(frame, layout[2]);
        }
    }

    fn field_block(&self, field: Field) -> Block<'static> {
        let focused = self.focus == field;
        let border_style = if focused {
            Style::default().fg(COLOR_BORDER_FOCUSED)
        } else {
            Style::default().fg(COLOR_BORDER_IDLE)
        };
        let title_style = if focused {
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_SECONDARY)
        };
        Block::default()
            .title(Span::styled(field.title(), title_style))
            .borders(Borders::ALL)
            .border_style(border_style)
            .style(Style::default().bg(COLOR_PANEL_BG))
    }

    fn draw_form(&self, frame: &mut Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(34),
                Constraint::Percentage(20),
                Constraint::Percentage(12),
                Constraint::Percentage(18),
                Constraint::Percentage(16),
            ])
            .split(area);
        let form = self.controller.form();

        let mut subreddit = format!("r/{}", form.subreddit);
        if self.focus == Field::Subreddit {
            subreddit.push('▏');
        }
        let selector = |value: &str, field: Field| {
            if self.focus == field {
                format!("◀ {value} ▶")
            } else {
                value.to_string()
            }
        };
        let values = [
            (Field::Subreddit, subreddit),
            (Field::Category, selector(form.category.label(), Field::Category)),
            (Field::Limit, selector(&form.limit.value().to_string(), Field::Limit)),
            (
                Field::Sort,
                selector(sort_label(self.controller.sort_key()), Field::Sort),
            ),
        ];
        for ((field, value), chunk) in values.into_iter().zip(chunks.iter()) {
            let widget = Paragraph::new(value)
                .style(Style::default().fg(COLOR_TEXT_PRIMARY))
                .block(self.field_block(field));
            frame.render_widget(widget, *chunk);
        }

        let (label, color) = if self.controller.can_load() {
            ("[ Load ]", COLOR_SUCCESS)
        } else {
            ("[ Load ] disabled", COLOR_TEXT_SECONDARY)
        };
        let button = Paragraph::new(label)
            .alignment(Alignment::Center)
            .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(COLOR_BORDER_IDLE))
                    .style(Style::default().bg(COLOR_PANEL_BG)),
            );
        frame.render_widget(button, chunks[4]);
    }

    fn draw_gallery(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.field_block(Field::Gallery).padding(Padding::horizontal(1));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let entries = self.controller.presenter().visual_order();
        if entries.is_empty() {
            let hint = if self.controller.is_loading() {
                "Loading posts…"
            } else {
                "Nothing loaded yet. Press r to load posts."
            };
            frame.render_widget(
                Paragraph::new(hint).style(Style::default().fg(COLOR_TEXT_SECONDARY)),
                inner,
            );
            return;
        }

        let columns = grid_columns(inner.width);
        let visible_rows = usize::from((inner.height / CARD_HEIGHT).max(1));
        self.columns.set(columns);

        let selected_row = self.selected / columns;
        let mut offset = self.row_offset.get();
        if selected_row < offset {
            offset = selected_row;
        } else if selected_row >= offset + visible_rows {
            offset = selected_row + 1 - visible_rows;
        }
        self.row_offset.set(offset);

        let card_width = inner.width / columns as u16;
        let now = Utc::now();
        for (index, entry) in entries.iter().enumerate().skip(offset * columns) {
            let row = index / columns - offset;
            if row >= visible_rows {
                break;
            }
            let column = index % columns;
            let rect = Rect {
                x: inner.x + column as u16 * card_width,
                y: inner.y + row as u16 * CARD_HEIGHT,
                width: card_width,
                height: CARD_HEIGHT.min(inner.height.saturating_sub(row as u16 * CARD_HEIGHT)),
            };
            self.draw_card(frame, rect, entry, index == self.selected, now);
        }
    }

    fn draw_card(
        &self,
        frame: &mut Frame<'_>,
        area: Rect,
        entry: &Entry,
        selected: bool,
        now: DateTime<Utc>,
    ) {
        let (border, background) = if selected && self.focus == Field::Gallery {
            (COLOR_BORDER_FOCUSED, COLOR_PANEL_SELECTED_BG)
        } else {
            (COLOR_BORDER_IDLE, COLOR_PANEL_BG)
        };
        let header = format!(
            "▲ {}  ▼ {}  {}",
            entry.score,
            entry.downs,
            format_age(entry.created_utc, now)
        );
        let block = Block::default()
            .title(Span::styled(header, Style::default().fg(COLOR_ACCENT)))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(background));
        let inner_width = usize::from(area.width.saturating_sub(2)).max(1);

        let title_style = if entry.thread_url.is_some() {
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(COLOR_TEXT_PRIMARY)
        };
        let title_rows = usize::from(CARD_HEIGHT.saturating_sub(4));
        let mut lines: Vec<Line<'static>> = wrap(&entry.title, inner_width)
            .into_iter()
            .take(title_rows)
            .map(|line| Line::from(Span::styled(line.into_owned(), title_style)))
            .collect();
        lines.push(Line::from(Span::styled(
            format!("🖼 {}", truncate_to_width(&entry.thumbnail, inner_width.saturating_sub(2))),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )));

        frame.render_widget(
            Paragraph::new(Text::from(lines)).block(block),
            area,
        );
    }

    fn draw_notice(&self, frame: &mut Frame<'_>, area: Rect) {
        let Some(notice) = self.controller.notice() else {
            return;
        };
        let popup_area = centered_rect(60, 40, area);
        frame.render_widget(Clear, popup_area);
        let body = Text::from(vec![
            Line::from(notice.body.clone()),
            Line::from(""),
            Line::from(Span::styled(
                "Press any key to close.",
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )),
        ]);
        let popup = Paragraph::new(body)
            .style(Style::default().fg(COLOR_TEXT_PRIMARY))
            .block(
                Block::default()
                    .title(Span::styled(
                        notice.title.clone(),
                        Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(COLOR_ERROR))
                    .style(Style::default().bg(COLOR_PANEL_BG))
                    .padding(Padding::uniform(1)),
            )
            .wrap(Wrap { trim: false });
        frame.render_widget(popup, popup_area);
    }

    fn footer_text(&self) -> String {
        match self.focus {
            Field::Subreddit => "type a subreddit · Enter load · Tab next field · Esc posts",
            Field::Category | Field::Limit | Field::Sort => {
                "←/→ change · Enter load · Tab next field · Esc posts · q quit"
            }
            Field::Gallery => {
                "h/j/k/l move · Enter thread · o link · r load more · s subreddit · Tab fields · q quit"
            }
        }
        .to_string()
    }
}

fn selector_delta(code: KeyCode) -> Option<i32> {
    match code {
        KeyCode::Left | KeyCode::Char('h') => Some(-1),
        KeyCode::Right | KeyCode::Char('l') => Some(1),
        _ => None,
    }
}
