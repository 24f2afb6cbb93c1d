use crate::App;
use crate::state::StateMirror;
use crate::utils::format_gigabytes;
use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Cell, Row, Table},
};

/// A preformatted row of the process table.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRow {
    pub name: String,
    pub digest: String,
    pub size: String,
    pub gpu_percent: u16,
    pub expires: String,
}

/// Title and rows of the process table.
pub fn build_process_rows(state: &StateMirror) -> (String, Vec<ProcessRow>) {
    let processes = state.processes();
    let title = if processes.is_empty() {
        "No Model Running".to_string()
    } else {
        format!(
            "{} model(s) running, using {} RAM",
            processes.len(),
            format_gigabytes(state.total_process_size(), 1)
        )
    };

    let rows = processes
        .iter()
        .map(|process| ProcessRow {
            name: process.name.clone(),
            digest: process.digest.clone(),
            size: format_gigabytes(process.size, 1),
            gpu_percent: process.gpu_percent(),
            expires: process.expires_at.clone(),
        })
        .collect();
    (title, rows)
}

/// Fully on GPU is green, mostly on CPU is red.
pub fn gpu_badge_color(percent: u16) -> Color {
    match percent {
        p if p >= 100 => Color::Green,
        p if p < 80 => Color::Red,
        _ => Color::Yellow,
    }
}

impl App {
    pub(crate) fn draw_processes_table(&mut self, frame: &mut Frame, area: Rect) {
        let dashboard = &self.state.dashboard;

        let rows: Vec<Row> = dashboard
            .process_rows
            .iter()
            .map(|row| {
                let badge = Span::styled(
                    format!(" {}% GPU ", row.gpu_percent),
                    Style::default()
                        .fg(Color::Black)
                        .bg(gpu_badge_color(row.gpu_percent)),
                );
                Row::new(vec![
                    Cell::from(row.name.clone()),
                    Cell::from(row.size.clone()),
                    Cell::from(badge),
                    Cell::from(row.expires.clone()),
                ])
            })
            .collect();

        let widths = [
            Constraint::Min(20),
            Constraint::Length(9),
            Constraint::Length(11),
            Constraint::Min(20),
        ];

        let table = Table::new(rows, widths)
            .header(
                Row::new(vec!["Name", "Size", "Processor", "Until"])
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .block(
                Block::bordered()
                    .title(dashboard.process_title.clone())
                    .title_style(Style::default().add_modifier(Modifier::BOLD)),
            );

        frame.render_widget(table, area);
    }
}
