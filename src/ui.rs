//! Layout and drawing: board, sidebar, start prompt, pause and game-over overlays.
//! Reads a committed `GameState`; never mutates it.

use crate::game::{BOARD_SIZE, Cell, GameOverCause, GameState, POWER_UP_DURATION, Phase, TickOutcome};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use std::time::Instant;
use tachyonfx::{Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx};

/// Each board cell is two terminal columns wide so it looks roughly square.
const CELL_WIDTH: u16 = 2;
const CELL_HEIGHT: u16 = 1;

const SIDEBAR_WIDTH: u16 = 28;

/// Board fade when the snake dies (TachyonFX).
const GAME_OVER_FADE_MS: u32 = 600;

/// Border flash after eating food or collecting a power-up.
const PICKUP_FLASH_MS: u32 = 250;

/// TachyonFX state carried between frames.
#[derive(Default)]
pub struct Effects {
    game_over: Option<Effect>,
    flash: Option<Effect>,
    /// Colour of a flash requested by the last tick, started on the next draw.
    pending_flash: Option<Color>,
    /// Last time we processed effects (for delta).
    process_time: Option<Instant>,
}

impl Effects {
    /// React to what the last movement tick did.
    pub fn on_outcome(&mut self, outcome: TickOutcome, theme: &Theme) {
        match outcome {
            TickOutcome::AteFood { .. } => self.pending_flash = Some(theme.food),
            TickOutcome::CollectedPowerUp(kind) => {
                self.pending_flash = Some(theme.power_up_color(kind));
            }
            TickOutcome::Crashed(_) => self.flash = None,
            TickOutcome::Idle | TickOutcome::Moved => {}
        }
    }

    #[cfg(test)]
    pub fn is_flashing(&self) -> bool {
        self.pending_flash.is_some() || self.flash.as_ref().is_some_and(|e| !e.done())
    }
}

/// Board size in terminal cells including the border.
fn board_outer_size() -> (u16, u16) {
    let n = BOARD_SIZE as u16;
    (n * CELL_WIDTH + 2, n * CELL_HEIGHT + 2)
}

/// Board and sidebar rects, centred in `area`.
pub fn game_layout(area: Rect) -> (Rect, Rect) {
    let (bw, bh) = board_outer_size();
    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(bw + SIDEBAR_WIDTH),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Fill(1), Constraint::Length(bh), Constraint::Fill(1)])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(bw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);
    (inner[0], inner[1])
}

/// Draw the current frame, then run pending effects: the pickup flash while a
/// game is live, the fade once it is over (created on first use, cleared once
/// a new game is live).
pub fn draw(
    frame: &mut Frame,
    state: &GameState,
    theme: &Theme,
    area: Rect,
    effects: &mut Effects,
    now: Instant,
) {
    let (board_area, sidebar_area) = game_layout(area);
    draw_board(frame, state, theme, board_area);
    draw_sidebar(frame, state, theme, sidebar_area, now);

    let delta = effects
        .process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let tfx_delta = TfxDuration::from_millis(delta.as_millis().min(u32::MAX as u128) as u32);
    effects.process_time = Some(now);

    if !state.is_game_over() {
        effects.game_over = None;
        apply_pickup_flash(frame, board_area, effects, tfx_delta);
    }
    match state.phase() {
        Phase::NotStarted => draw_start_prompt(frame, state, theme, board_area),
        Phase::Running => {}
        Phase::Paused => draw_pause_overlay(frame, theme, board_area),
        Phase::GameOver => {
            apply_game_over_effect(frame, theme, board_area, effects, tfx_delta);
            draw_game_over(frame, state, theme, board_area);
        }
    }
}

fn apply_pickup_flash(frame: &mut Frame, board_area: Rect, effects: &mut Effects, delta: TfxDuration) {
    if let Some(colour) = effects.pending_flash.take() {
        let effect = fx::fade_from_fg(colour, (PICKUP_FLASH_MS, Interpolation::QuadOut))
            .with_area(board_area);
        effects.flash = Some(effect);
    }
    if let Some(effect) = &mut effects.flash {
        frame.render_effect(effect, board_area, delta);
        if effect.done() {
            effects.flash = None;
        }
    }
}

fn apply_game_over_effect(
    frame: &mut Frame,
    theme: &Theme,
    board_area: Rect,
    effects: &mut Effects,
    delta: TfxDuration,
) {
    effects.flash = None;
    effects.pending_flash = None;
    let effect = effects.game_over.get_or_insert_with(|| {
        fx::fade_to(theme.inactive_fg, theme.bg, (GAME_OVER_FADE_MS, Interpolation::Linear))
            .with_area(board_area)
    });
    frame.render_effect(effect, board_area, delta);
}

fn draw_board(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    let title = format!(" Snake  {} ", state.difficulty().label());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, Style::default().fg(theme.title)));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let buf = frame.buffer_mut();
    let mut put = |cell: Cell, symbol: &str, style: Style| {
        let rx = inner.x + cell.x as u16 * CELL_WIDTH;
        let ry = inner.y + cell.y as u16 * CELL_HEIGHT;
        if rx + CELL_WIDTH <= inner.x + inner.width && ry < inner.y + inner.height {
            buf.set_string(rx, ry, symbol, style);
        }
    };

    for y in 0..BOARD_SIZE {
        for x in 0..BOARD_SIZE {
            let bg = if (x + y) % 2 == 0 { theme.bg } else { theme.bg_alt };
            put(Cell::new(x, y), "  ", Style::default().bg(bg));
        }
    }

    let food = state.food();
    put(food, "● ", Style::default().fg(theme.food).bg(cell_bg(theme, food)));

    for power_up in state.power_ups() {
        let style = Style::default()
            .fg(theme.power_up_color(power_up.kind))
            .bg(cell_bg(theme, power_up.cell))
            .bold();
        put(power_up.cell, power_up.kind.glyph(), style);
    }

    // Body first so the head always wins. Tinted by the most recent effect.
    let body = snake_tint(state, theme).unwrap_or(theme.snake_body);
    for &segment in state.snake().iter().skip(1) {
        put(segment, "  ", Style::default().bg(body));
    }
    put(state.head(), "  ", Style::default().bg(theme.snake_head));
}

/// Colour of the active power-up that expires last, if any.
fn snake_tint(state: &GameState, theme: &Theme) -> Option<Color> {
    state
        .active_power_ups()
        .iter()
        .max_by_key(|(_, until)| *until)
        .map(|(kind, _)| theme.power_up_color(kind))
}

fn cell_bg(theme: &Theme, cell: Cell) -> Color {
    if (cell.x + cell.y) % 2 == 0 { theme.bg } else { theme.bg_alt }
}

fn draw_sidebar(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect, now: Instant) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // Stats
            Constraint::Length(9), // Power-ups: title + up to three label/gauge pairs
            Constraint::Fill(1),   // Keys
        ])
        .split(area);

    // --- Stats ---
    let stats_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let stats_inner = stats_block.inner(chunks[0]);
    stats_block.render(chunks[0], frame.buffer_mut());
    let stats_lines = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(format!("{:04}", state.score()), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Best:  ", title_style),
            Span::styled(format!("{:04}", state.high_score()), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Level: ", title_style),
            Span::styled(state.difficulty().label(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Speed: ", title_style),
            Span::styled(speed_label(state), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Length: ", title_style),
            Span::styled(state.snake().len().to_string(), fg_style),
        ]),
    ];
    Paragraph::new(Text::from(stats_lines)).render(stats_inner, frame.buffer_mut());

    // --- Active power-ups ---
    let pu_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let pu_inner = pu_block.inner(chunks[1]);
    pu_block.render(chunks[1], frame.buffer_mut());
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1); 7])
        .split(pu_inner);
    Paragraph::new(Line::from(Span::styled("Power-ups", title_style)))
        .render(rows[0], frame.buffer_mut());
    let active = state.active_power_ups();
    if active.is_empty() {
        Paragraph::new(Line::from(Span::styled("none", Style::default().fg(theme.inactive_fg))))
            .render(rows[1], frame.buffer_mut());
    }
    for (i, (kind, _)) in active.iter().enumerate() {
        let remaining = active.remaining(kind, now).unwrap_or_default();
        let secs = remaining.as_millis().div_ceil(1000);
        let colour = theme.power_up_color(kind);
        Paragraph::new(Line::from(vec![
            Span::styled(kind.glyph(), Style::default().fg(colour)),
            Span::styled(format!("{} {}s", kind.label(), secs), fg_style),
        ]))
        .render(rows[1 + i * 2], frame.buffer_mut());
        let ratio = (remaining.as_secs_f64() / POWER_UP_DURATION.as_secs_f64()).clamp(0.0, 1.0);
        Gauge::default()
            .ratio(ratio)
            .label("")
            .gauge_style(Style::default().fg(colour))
            .render(rows[2 + i * 2], frame.buffer_mut());
    }

    // --- Keys ---
    let keys_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let keys_inner = keys_block.inner(chunks[2]);
    keys_block.render(chunks[2], frame.buffer_mut());
    let key_line = |bindings: &[(&'static str, &'static str)]| {
        let spans: Vec<Span> = bindings
            .iter()
            .flat_map(|(key, what)| {
                [
                    Span::styled(format!("{key:<6}"), title_style),
                    Span::styled(format!("{what:<7}"), fg_style),
                ]
            })
            .collect();
        Line::from(spans)
    };
    let theme_label = if theme.dark { "Light" } else { "Dark" };
    Paragraph::new(Text::from(vec![
        key_line(&[("←↑↓→", "Turn"), ("Enter", "Start")]),
        key_line(&[("P/Spc", "Pause"), ("D", "Level")]),
        key_line(&[("T", theme_label), ("R", "Restart")]),
        key_line(&[("Q/Esc", "Quit")]),
    ]))
    .render(keys_inner, frame.buffer_mut());
}

/// Effective movement period, marked when slow motion stretches it.
fn speed_label(state: &GameState) -> String {
    let effective = state.effective_tick_period().as_millis();
    if state.effective_tick_period() == state.tick_period() {
        format!("{effective} ms")
    } else {
        format!("{effective} ms (slow)")
    }
}

fn popup_rect(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn draw_start_prompt(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    let popup = popup_rect(area, 34, 7);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(" Snake ", Style::default().fg(theme.bg).bg(theme.snake_head).bold())),
        Line::from(""),
        Line::from(Span::styled(
            " Arrow key or Enter to start ",
            Style::default().fg(theme.main_fg),
        )),
        Line::from(Span::styled(
            format!(" D — difficulty: {} ", state.difficulty().label()),
            Style::default().fg(theme.main_fg),
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .style(Style::default().bg(theme.bg))
        .render(popup, frame.buffer_mut());
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup = popup_rect(area, 28, 5);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(Span::styled(
            " P — Resume    Q — Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .style(Style::default().bg(theme.bg))
        .render(popup, frame.buffer_mut());
}

fn draw_game_over(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    let popup = popup_rect(area, 30, 11);
    let mut lines: Vec<Line> = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Game Over ",
            Style::default().fg(Color::White).bg(Color::Red),
        )),
        Line::from(Span::styled(
            cause_label(state.game_over_cause()),
            Style::default().fg(theme.inactive_fg),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(" Score: {:04} ", state.score()),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(Span::styled(
            format!(" Best:  {:04} ", state.high_score()),
            Style::default().fg(theme.main_fg),
        )),
    ];
    if is_new_high_score(state) {
        lines.push(Line::from(Span::styled(
            " New high score! ",
            Style::default().fg(Color::Yellow).bold(),
        )));
    } else {
        lines.push(Line::from(""));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " R — Restart    Q — Quit ",
        Style::default().fg(theme.main_fg),
    )));
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
                .title(Span::styled(" Snaketui ", Style::default().fg(theme.title))),
        )
        .style(Style::default().bg(theme.bg))
        .render(popup, frame.buffer_mut());
}

fn cause_label(cause: Option<GameOverCause>) -> &'static str {
    match cause {
        Some(GameOverCause::Wall) => " Hit the wall ",
        Some(GameOverCause::SelfHit) => " Ran into yourself ",
        None => "",
    }
}

fn is_new_high_score(state: &GameState) -> bool {
    state.score() > 0 && state.score() == state.high_score()
}
