use color_eyre::eyre::Result;
use cookie_crash::{
    Outcome,
    SessionSnapshot,
    SessionState,
    session::CreditStatus,
    units::{
        format_amount,
        format_multiplier,
    },
};
use crossterm::{
    event::{
        Event,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        EnterAlternateScreen,
        LeaveAlternateScreen,
        disable_raw_mode,
        enable_raw_mode,
    },
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::{
    Stdout,
    stdout,
};

const VISIBLE_ERRORS: usize = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UserEvent {
    Quit,
    Start,
    Stop,
    ClaimAirdrop,
    Abandon,
    Refresh,
    Redraw,
}

pub struct UiState {
    terminal: Option<Terminal<CrosstermBackend<Stdout>>>,
    wager: u64,
    wager_step: u64,
}

impl UiState {
    /// The wager steps by the minimum wager and never drops below it.
    pub fn new(wager: u64, min_wager: u64) -> Self {
        Self {
            terminal: None,
            wager: wager.max(min_wager),
            wager_step: min_wager,
        }
    }

    pub fn wager(&self) -> u64 {
        self.wager
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(stdout(), EnterAlternateScreen)?;
    state.terminal = Some(Terminal::new(CrosstermBackend::new(stdout()))?);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(stdout(), LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &SessionSnapshot) -> Result<()> {
    let wager = state.wager;
    if let Some(terminal) = state.terminal.as_mut() {
        terminal.draw(|f| render(f, wager, snap))?;
    }
    Ok(())
}

/// Maps a terminal event to a user action. Wager edits are applied here.
pub fn interpret_event(state: &mut UiState, event: &Event) -> Option<UserEvent> {
    let Event::Key(KeyEvent {
        code,
        modifiers,
        kind: KeyEventKind::Press,
        ..
    }) = event
    else {
        return None;
    };
    if modifiers.contains(KeyModifiers::CONTROL) && *code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    let event = match code {
        KeyCode::Char('q') | KeyCode::Esc => UserEvent::Quit,
        KeyCode::Char('s') | KeyCode::Enter => UserEvent::Start,
        KeyCode::Char(' ') => UserEvent::Stop,
        KeyCode::Char('a') => UserEvent::ClaimAirdrop,
        KeyCode::Char('x') => UserEvent::Abandon,
        KeyCode::Char('r') => UserEvent::Refresh,
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => {
            state.wager = state.wager.saturating_add(state.wager_step);
            UserEvent::Redraw
        }
        KeyCode::Char('-') | KeyCode::Down => {
            state.wager = state
                .wager
                .saturating_sub(state.wager_step)
                .max(state.wager_step);
            UserEvent::Redraw
        }
        _ => return None,
    };
    Some(event)
}

fn render(f: &mut Frame, wager: u64, snap: &SessionSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(VISIBLE_ERRORS as u16 + 2),
            Constraint::Length(3),
        ])
        .split(f.area());

    draw_top(f, chunks[0], wager, snap);
    draw_round(f, chunks[1], snap);
    draw_errors(f, chunks[2], snap);
    draw_help(f, chunks[3], snap);
}

fn draw_top(f: &mut Frame, area: Rect, wager: u64, snap: &SessionSnapshot) {
    let account = snap
        .account
        .as_ref()
        .map_or_else(|| "not connected".to_string(), |a| a.short_address());
    let balance = snap
        .balance
        .map_or_else(|| "...".to_string(), format_amount);
    let top = Paragraph::new(format!(
        "Account: {account} | Balance: {balance} | Next wager: {}",
        format_amount(wager)
    ))
    .block(Block::default().borders(Borders::ALL).title("Cookie Crash"));
    f.render_widget(top, area);
}

fn draw_round(f: &mut Frame, area: Rect, snap: &SessionSnapshot) {
    let (headline, color) = match &snap.state {
        SessionState::Idle => ("Place a wager".to_string(), Color::Reset),
        SessionState::Committing { overdue: false } => {
            ("Waiting for the ledger...".to_string(), Color::Yellow)
        }
        SessionState::Committing { overdue: true } => (
            "Ledger is slow: keep waiting or press x to abandon".to_string(),
            Color::Yellow,
        ),
        SessionState::Active => (format_multiplier(snap.multiplier), Color::Green),
        SessionState::Settling {
            outcome: Outcome::CashedOut { multiplier, payout },
            credit,
        } => (
            format!(
                "Cashed out at {} for {} ({})",
                format_multiplier(*multiplier),
                format_amount(*payout),
                credit_label(credit)
            ),
            Color::Cyan,
        ),
        SessionState::Settling {
            outcome: Outcome::Crashed { multiplier },
            ..
        } => (
            format!("BOOM at {}", format_multiplier(*multiplier)),
            Color::Red,
        ),
        SessionState::Settling { .. } => (String::new(), Color::Reset),
    };
    let stake = snap
        .wager
        .map_or_else(|| "-".to_string(), format_amount);
    let lines = vec![
        Line::from(Span::styled(headline, Style::default().fg(color).bold())),
        Line::from(format!("Stake: {stake}")),
        Line::from(snap.status.clone()),
    ];
    let round = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Round"));
    f.render_widget(round, area);
}

fn credit_label(credit: &CreditStatus) -> String {
    match credit {
        CreditStatus::NotOwed => "nothing owed".to_string(),
        CreditStatus::Pending => "payout pending".to_string(),
        CreditStatus::Confirmed => "paid".to_string(),
        CreditStatus::Failed(reason) => format!("payout failed: {reason}"),
    }
}

fn draw_errors(f: &mut Frame, area: Rect, snap: &SessionSnapshot) {
    let items: Vec<ListItem> = snap
        .errors
        .iter()
        .rev()
        .take(VISIBLE_ERRORS)
        .map(|e| ListItem::new(e.as_str()))
        .collect();
    let errors = List::new(items)
        .style(Style::default().fg(Color::Red))
        .block(Block::default().borders(Borders::ALL).title("Errors"));
    f.render_widget(errors, area);
}

fn draw_help(f: &mut Frame, area: Rect, snap: &SessionSnapshot) {
    let claim = if snap.claim_pending {
        "claiming..."
    } else {
        "a airdrop"
    };
    let help = Paragraph::new(format!(
        "s/Enter start | space cash out | +/- wager | {claim} | r refresh | x abandon | q quit"
    ))
    .block(Block::default().borders(Borders::ALL).title("Keys"));
    f.render_widget(help, area);
}
