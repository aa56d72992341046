//! Terminal dashboard for deskdash.
//!
//! This module is the presentation sink for both tick tasks. It renders:
//!
//! - Status bar with the clock and sample count
//! - Percent gauges for CPU / RAM / GPU / VRAM
//! - Download/upload charts with a dynamically rescaled axis
//! - One gauge row per tracked volume, with a distinct error style for
//!   unreadable volumes
//!
//! Snapshots arrive over broadcast channels and are drained without
//! blocking on every frame. Sink-side problems never propagate back into
//! the tick tasks; closing the UI simply drops the receivers, which the
//! tasks detect on their next push.
//!
//! # Controls
//!
//! - `q` or `Esc`: Quit
//! - `Ctrl+C`: Quit

use std::io;
use std::time::Duration;

use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::Span,
    widgets::{Axis, Block, BorderType, Borders, Chart, Dataset, Gauge, GraphType, Paragraph},
    Frame, Terminal,
};
use tokio::sync::broadcast::{
    error::{RecvError, TryRecvError},
    Receiver,
};

use crate::app::App;
use crate::disk::DiskSnapshot;
use crate::history::{HistoryBuffer, SeriesKey, CAPACITY};
use crate::sampler::MetricSnapshot;

/// Usage level at which a stat gauge turns yellow.
const STAT_HIGH: f64 = 70.0;
/// Usage level at which a disk gauge turns yellow.
const DISK_HIGH: f64 = 75.0;
/// Usage level at which any gauge turns red.
const CRITICAL: f64 = 90.0;

/// Run the TUI event loop.
///
/// Takes ownership of the app state and the snapshot receivers, running
/// until the user quits. Dropping the receivers on return is what tells
/// the tick tasks to stop.
pub fn run(
    mut app: App,
    mut rx_metrics: Receiver<MetricSnapshot>,
    mut rx_disks: Receiver<Vec<DiskSnapshot>>,
) -> io::Result<()> {
    enable_raw_mode()?;
    if let Err(e) = io::stdout().execute(EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(e);
    }

    let result = run_tui_loop(&mut app, &mut rx_metrics, &mut rx_disks);

    // Always clean up terminal state
    let _ = disable_raw_mode();
    let _ = io::stdout().execute(LeaveAlternateScreen);

    result
}

/// Inner TUI loop - separated to ensure cleanup happens on any exit path.
fn run_tui_loop(
    app: &mut App,
    rx_metrics: &mut Receiver<MetricSnapshot>,
    rx_disks: &mut Receiver<Vec<DiskSnapshot>>,
) -> io::Result<()> {
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    loop {
        // Check for input
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            return Ok(());
                        }
                        _ => {}
                    }
                }
            }
        }

        drain_snapshots(app, rx_metrics, rx_disks);

        terminal.draw(|f| draw_ui(f, app))?;
    }
}

/// Apply everything currently queued on the channels, without blocking.
fn drain_snapshots(
    app: &mut App,
    rx_metrics: &mut Receiver<MetricSnapshot>,
    rx_disks: &mut Receiver<Vec<DiskSnapshot>>,
) {
    loop {
        match rx_metrics.try_recv() {
            Ok(snapshot) => app.apply_metrics(snapshot),
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::debug!("display lagged, skipped {skipped} metric snapshots");
            }
            Err(_) => break,
        }
    }
    loop {
        match rx_disks.try_recv() {
            Ok(snapshots) => app.apply_disks(snapshots),
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::debug!("display lagged, skipped {skipped} disk polls");
            }
            Err(_) => break,
        }
    }
}

/// Main UI drawing function.
fn draw_ui(f: &mut Frame, app: &App) {
    let size = f.area();

    let disk_rows = app.disks.len().max(1) as u16;
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),             // Status bar
            Constraint::Length(6),             // Percent gauges (2x2)
            Constraint::Min(10),               // Network charts
            Constraint::Length(3 * disk_rows), // Disk gauges
        ])
        .split(size);

    draw_status_bar(f, app, main_chunks[0]);
    draw_percent_gauges(f, app, main_chunks[1]);
    draw_net_charts(f, app, main_chunks[2]);
    draw_disk_gauges(f, &app.disks, main_chunks[3]);
}

/// Draw the top status bar with the clock.
fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let now = Local::now();
    let status_text = format!(
        " {} | {} | Samples: {} | [q]uit",
        now.format("%H:%M:%S"),
        now.format("%A, %B %e %Y"),
        app.samples_seen,
    );

    let status = Paragraph::new(status_text)
        .style(Style::default().fg(Color::White).bg(Color::DarkGray))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title("deskdash"),
        );

    f.render_widget(status, area);
}

/// Draw the 2x2 grid of percent gauges.
fn draw_percent_gauges(f: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(3)])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)])
        .split(rows[0]);
    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)])
        .split(rows[1]);

    let metrics = app.metrics.as_ref();
    draw_percent_gauge(f, top[0], "CPU", metrics.and_then(|m| m.cpu_percent));
    draw_percent_gauge(f, top[1], "RAM", metrics.and_then(|m| m.ram_percent));
    draw_percent_gauge(f, bottom[0], "GPU", metrics.and_then(|m| m.gpu_percent));
    draw_percent_gauge(f, bottom[1], "VRAM", metrics.and_then(|m| m.vram_percent));
}

/// Draw a single labelled percent gauge; absent values show "N/A".
fn draw_percent_gauge(f: &mut Frame, area: Rect, title: &str, value: Option<f64>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(title);

    match value {
        Some(percent) => {
            let gauge = Gauge::default()
                .block(block)
                .gauge_style(Style::default().fg(usage_color(percent, STAT_HIGH)))
                .ratio((percent / 100.0).clamp(0.0, 1.0))
                .label(format!("{percent:.1}%"));
            f.render_widget(gauge, area);
        }
        None => {
            let gauge = Gauge::default()
                .block(block)
                .gauge_style(Style::default().fg(Color::DarkGray))
                .ratio(0.0)
                .label("N/A");
            f.render_widget(gauge, area);
        }
    }
}

/// Draw the download and upload charts side by side.
fn draw_net_charts(f: &mut Frame, app: &App, area: Rect) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)])
        .split(area);

    let latest = app.metrics.as_ref();
    draw_throughput_chart(
        f,
        cols[0],
        &app.history,
        SeriesKey::Download,
        "Download",
        latest.map(|m| m.download_mbps),
        Color::Cyan,
    );
    draw_throughput_chart(
        f,
        cols[1],
        &app.history,
        SeriesKey::Upload,
        "Upload",
        latest.map(|m| m.upload_mbps),
        Color::Magenta,
    );
}

/// Draw one throughput chart with the dynamic axis maximum.
///
/// Gap samples split the line into separate segments so an outage renders
/// as a discontinuity, never as a drop to zero.
fn draw_throughput_chart(
    f: &mut Frame,
    area: Rect,
    history: &HistoryBuffer,
    key: SeriesKey,
    name: &str,
    latest: Option<f64>,
    color: Color,
) {
    let samples = history.samples(key);
    let runs = contiguous_runs(&samples);
    let axis_max = history.axis_max(key);

    let datasets: Vec<Dataset> = runs
        .iter()
        .map(|run| {
            Dataset::default()
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(color))
                .data(run)
        })
        .collect();

    let title = match latest {
        Some(v) => format!("{name} {v:.2} Mbps"),
        None => format!("{name} (Mbps)"),
    };

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title(Span::styled(title, Style::default().fg(Color::White))),
        )
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, (CAPACITY - 1) as f64]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .labels(vec![
                    Span::raw("0"),
                    Span::raw(format!("{:.0}", axis_max / 2.0)),
                    Span::raw(format!("{axis_max:.0}")),
                ])
                .bounds([0.0, axis_max]),
        );

    f.render_widget(chart, area);
}

/// Draw one gauge row per tracked volume.
fn draw_disk_gauges(f: &mut Frame, disks: &[DiskSnapshot], area: Rect) {
    if disks.is_empty() {
        let placeholder = Paragraph::new("Waiting for disk poll...").block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title("Volumes"),
        );
        f.render_widget(placeholder, area);
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Length(3); disks.len()])
        .split(area);

    for (snapshot, row) in disks.iter().zip(rows.iter()) {
        draw_disk_row(f, *row, snapshot);
    }
}

/// One volume row: a usage gauge, or a red error panel for an unreadable
/// volume - never stale numbers.
fn draw_disk_row(f: &mut Frame, area: Rect, snapshot: &DiskSnapshot) {
    match snapshot {
        DiskSnapshot::Usage(usage) => {
            let gauge = Gauge::default()
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_type(BorderType::Rounded)
                        .title(usage.path.clone()),
                )
                .gauge_style(Style::default().fg(usage_color(usage.used_percent, DISK_HIGH)))
                .ratio((usage.used_percent / 100.0).clamp(0.0, 1.0))
                .label(format!(
                    "{:.1}% used | {:.1} GB free / {:.1} GB",
                    usage.used_percent, usage.free_gb, usage.total_gb
                ));
            f.render_widget(gauge, area);
        }
        DiskSnapshot::Error(error) => {
            let panel = Paragraph::new(format!("Error: {}", error.message))
                .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_type(BorderType::Rounded)
                        .title(error.path.clone())
                        .border_style(Style::default().fg(Color::Red)),
                );
            f.render_widget(panel, area);
        }
    }
}

/// Gauge color for a usage percent: red past the critical level, yellow
/// past the high level, green otherwise.
fn usage_color(percent: f64, high: f64) -> Color {
    if percent > CRITICAL {
        Color::Red
    } else if percent > high {
        Color::Yellow
    } else {
        Color::Green
    }
}

/// Split a padded sample series into runs of consecutive present values,
/// keyed by sample index, for gap-aware chart rendering.
fn contiguous_runs(samples: &[Option<f64>]) -> Vec<Vec<(f64, f64)>> {
    let mut runs = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    for (i, sample) in samples.iter().enumerate() {
        match sample {
            Some(value) => current.push((i as f64, *value)),
            None => {
                if !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Run in headless mode (no TUI, one line per snapshot).
pub async fn run_headless(
    mut app: App,
    mut rx_metrics: Receiver<MetricSnapshot>,
    mut rx_disks: Receiver<Vec<DiskSnapshot>>,
) -> io::Result<()> {
    println!("deskdash - host telemetry dashboard (headless)");
    println!("Press Ctrl+C to stop.\n");

    loop {
        tokio::select! {
            result = rx_metrics.recv() => match result {
                Ok(snapshot) => {
                    print_metric_line(&snapshot);
                    app.apply_metrics(snapshot);
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            result = rx_disks.recv() => match result {
                Ok(snapshots) => {
                    print_disk_lines(&snapshots);
                    app.apply_disks(snapshots);
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("\nStopped.");
    Ok(())
}

fn print_metric_line(snapshot: &MetricSnapshot) {
    println!(
        "[{}] CPU: {} | RAM: {} | GPU: {} | VRAM: {} | Down: {:.2} Mbps | Up: {:.2} Mbps",
        Local::now().format("%H:%M:%S"),
        fmt_percent(snapshot.cpu_percent),
        fmt_percent(snapshot.ram_percent),
        fmt_percent(snapshot.gpu_percent),
        fmt_percent(snapshot.vram_percent),
        snapshot.download_mbps,
        snapshot.upload_mbps,
    );
}

fn print_disk_lines(snapshots: &[DiskSnapshot]) {
    let timestamp = Local::now().format("%H:%M:%S");
    for snapshot in snapshots {
        match snapshot {
            DiskSnapshot::Usage(usage) => println!(
                "[{timestamp}] volume {}: {:.1}% used | {:.1} GB free / {:.1} GB",
                usage.path, usage.used_percent, usage.free_gb, usage.total_gb
            ),
            DiskSnapshot::Error(error) => {
                println!("[{timestamp}] volume {}: {}", error.path, error.message);
            }
        }
    }
}

fn fmt_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:5.1}%"),
        None => "  N/A".to_string(),
    }
}
