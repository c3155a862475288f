use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use delivery_report::{Metrics, OrderTable, ReportConfig};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Stores,
    Trend,
    Sources,
}

impl Page {
    pub const ALL: [Page; 4] = [Page::Overview, Page::Stores, Page::Trend, Page::Sources];

    pub fn next(&self) -> Self {
        match self {
            Page::Overview => Page::Stores,
            Page::Stores => Page::Trend,
            Page::Trend => Page::Sources,
            Page::Sources => Page::Overview,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Overview => Page::Sources,
            Page::Stores => Page::Overview,
            Page::Trend => Page::Stores,
            Page::Sources => Page::Trend,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Overview => "Overview",
            Page::Stores => "Stores",
            Page::Trend => "Daily Trend",
            Page::Sources => "Sources",
        }
    }
}

pub struct App {
    pub metrics: Metrics,
    pub tables: Vec<Arc<OrderTable>>,
    pub config: ReportConfig,
    pub current_page: Page,
    pub store_state: TableState,
}

impl App {
    pub fn new(metrics: Metrics, tables: Vec<Arc<OrderTable>>, config: ReportConfig) -> Self {
        let mut store_state = TableState::default();
        if !metrics.store_performance.is_empty() {
            store_state.select(Some(0));
        }

        Self {
            metrics,
            tables,
            config,
            current_page: Page::Overview,
            store_state,
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn next(&mut self) {
        let len = self.metrics.store_performance.len();
        if len == 0 {
            return;
        }
        let i = match self.store_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.store_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.metrics.store_performance.len();
        if len == 0 {
            return;
        }
        let i = match self.store_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.store_state.select(Some(i));
    }

    /// Daily completed orders summed across channels, labelled MM/DD
    pub fn daily_totals(&self) -> Vec<(String, u64)> {
        let trend = &self.metrics.daily_trend;
        trend
            .dates
            .iter()
            .enumerate()
            .map(|(i, date)| {
                let total: usize = trend.series.iter().map(|s| s.counts[i]).sum();
                (date.format("%m/%d").to_string(), total as u64)
            })
            .collect()
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Overview => render_overview(f, chunks[1], app),
        Page::Stores => render_stores(f, chunks[1], app),
        Page::Trend => render_trend(f, chunks[1], app),
        Page::Sources => render_sources(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2]);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![Span::styled(
        format!("{} ", app.config.brand_name),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    )];

    for (i, page) in Page::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(page.title().to_string(), style));
    }

    if let Some(span) = app.metrics.date_span {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("{} → {}", span.start, span.end),
            Style::default().fg(Color::Cyan),
        ));
    }

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));
    f.render_widget(header, area);
}

fn render_overview(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(0)])
        .split(area);

    let m = &app.metrics;
    let symbol = &app.config.currency_symbol;
    let rate_color = if m.cancel_rate > app.config.cancel_alert_threshold {
        Color::Red
    } else {
        Color::Green
    };

    let peak = match &m.peak_day {
        Some(p) => format!("{} ({} orders, {}{:.0})", p.date.format("%m/%d"), p.orders, symbol, p.revenue),
        None => "N/A".to_string(),
    };
    let top = match &m.top_store {
        Some(t) => format!("{} ({:.1}%)", app.config.display_store(&t.store), t.share),
        None => "None".to_string(),
    };

    let lines = vec![
        Line::from(vec![
            Span::raw("Completed orders: "),
            Span::styled(m.total_orders.to_string(), Style::default().fg(Color::Yellow)),
            Span::raw(format!("   (daily avg {:.1})", m.avg_daily_orders)),
        ]),
        Line::from(vec![
            Span::raw("GMV: "),
            Span::styled(format!("{}{:.2}", symbol, m.total_gmv), Style::default().fg(Color::Green)),
            Span::raw(format!("   avg ticket {}{:.2}", symbol, m.avg_ticket)),
        ]),
        Line::from(vec![Span::raw("Peak day: "), Span::raw(peak)]),
        Line::from(vec![
            Span::raw("Cancellation rate: "),
            Span::styled(format!("{:.1}%", m.cancel_rate), Style::default().fg(rate_color)),
            Span::raw(format!("   ({} of {})", m.cancelled_orders, m.distinct_orders)),
        ]),
        Line::from(vec![Span::raw("Top store: "), Span::raw(top)]),
    ];

    let kpis = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Key Metrics "),
    );
    f.render_widget(kpis, chunks[0]);

    let header = Row::new(
        ["Channel", "Orders", "Revenue", "Share"]
            .iter()
            .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))),
    )
    .style(Style::default().bg(Color::DarkGray));

    let rows = m.channel_shares.iter().map(|s| {
        Row::new(vec![
            Cell::from(s.channel.name()),
            Cell::from(s.orders.to_string()),
            Cell::from(format!("{}{:.2}", symbol, s.revenue)),
            Cell::from(format!("{:.1}%", s.revenue_share)),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(14),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(" Channels "));
    f.render_widget(table, chunks[1]);
}

fn render_stores(f: &mut Frame, area: Rect, app: &mut App) {
    let symbol = app.config.currency_symbol.clone();

    let header = Row::new(
        ["Store", "Orders", "Revenue"]
            .iter()
            .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))),
    )
    .style(Style::default().bg(Color::DarkGray));

    // Highest revenue first for reading
    let rows: Vec<Row> = app
        .metrics
        .store_performance
        .iter()
        .rev()
        .map(|s| {
            Row::new(vec![
                Cell::from(truncate(app.config.display_store(&s.store), 40)),
                Cell::from(s.orders.to_string()),
                Cell::from(format!("{}{:.2}", symbol, s.revenue)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [Constraint::Length(42), Constraint::Length(10), Constraint::Length(14)],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(" Store Performance "))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.store_state);
}

fn render_trend(f: &mut Frame, area: Rect, app: &App) {
    let totals = app.daily_totals();
    let data: Vec<(&str, u64)> = totals.iter().map(|(d, n)| (d.as_str(), *n)).collect();

    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(" Completed Orders per Day "))
        .data(data.as_slice())
        .bar_width(5)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));

    f.render_widget(chart, area);
}

fn render_sources(f: &mut Frame, area: Rect, app: &App) {
    let mut lines = Vec::new();

    if app.tables.is_empty() {
        lines.push(Line::from("No exports loaded"));
    }

    for table in &app.tables {
        let name = Span::styled(
            table.channel.name().to_string(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        );

        if let Some(rejection) = &table.rejection {
            lines.push(Line::from(vec![
                name,
                Span::styled(format!(": rejected ({})", rejection.kind.label()), Style::default().fg(Color::Red)),
            ]));
            lines.push(Line::from(Span::styled(
                format!("    {}", rejection.message),
                Style::default().fg(Color::DarkGray),
            )));
            continue;
        }

        lines.push(Line::from(vec![
            name,
            Span::raw(format!(": {} orders, {} rows dropped", table.len(), table.skipped.len())),
        ]));
        for issue in table.skipped.iter().take(5) {
            lines.push(Line::from(Span::styled(
                format!("    line {}: {}", issue.line_number, issue.message),
                Style::default().fg(Color::Red),
            )));
        }
    }

    let paragraph = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Sources "));
    f.render_widget(paragraph, area);
}

fn render_status_bar(f: &mut Frame, area: Rect) {
    let spans = vec![
        Span::styled(" Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Page | "),
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Nav | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
