use crate::App;
use crate::state::StateMirror;
use crate::utils::{format_age, format_gigabytes};
use chrono::{DateTime, Utc};
use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style, Stylize},
    widgets::{Block, Cell, Row, Table},
};

/// A preformatted row of the model table.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRow {
    pub name: String,
    /// Kept to join against running processes at draw time.
    pub digest: String,
    pub size: String,
    pub family: String,
    pub params: String,
    pub quantization: String,
    /// Age of the last pull.
    pub installed: String,
}

impl ModelRow {
    /// Whether the row text contains `needle`, ignoring case.
    ///
    /// Matches against every shown cell, so `q4` or `llama` filter as well as a name does.
    pub fn matches(&self, needle: &str) -> bool {
        let text = [
            &self.name,
            &self.size,
            &self.family,
            &self.params,
            &self.quantization,
            &self.installed,
        ]
        .map(|cell| cell.as_str())
        .concat();
        text.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// Title and rows of the model table, in server order.
pub fn build_model_rows(state: &StateMirror, now: DateTime<Utc>) -> (String, Vec<ModelRow>) {
    let models = state.models();
    let title = if models.is_empty() {
        "No model available on Ollama".to_string()
    } else {
        format!(
            "{} model(s) available using {} on disk",
            models.len(),
            format_gigabytes(state.total_model_size(), 1)
        )
    };

    let rows = models
        .iter()
        .map(|model| ModelRow {
            name: model.name.clone(),
            digest: model.digest.clone(),
            size: format_gigabytes(model.size, 1),
            family: model.details.family.clone(),
            params: model.details.parameter_size.clone(),
            quantization: model.details.quantization_level.clone(),
            installed: format_age(&model.modified_at, now),
        })
        .collect();
    (title, rows)
}

impl App {
    pub(crate) fn draw_models_table(&mut self, frame: &mut Frame, area: Rect, filtering: bool) {
        // highlighting follows processes, which refresh more often than models
        let running = self.orchestrator.state().highlight_set();
        let dashboard = &mut self.state.dashboard;

        let filter = dashboard.filter.value();
        let title = if filtering || !filter.is_empty() {
            format!("{} | Filter: {}", dashboard.model_title, filter)
        } else {
            dashboard.model_title.clone()
        };

        let rows: Vec<Row> = dashboard
            .visible_models()
            .into_iter()
            .map(|row| {
                let (marker, style) = if running.contains(&row.digest) {
                    (Cell::from("●"), Style::default().fg(Color::Green))
                } else {
                    (Cell::from(" "), Style::default())
                };
                Row::new(vec![
                    marker,
                    Cell::from(row.name.clone()).bold(),
                    Cell::from(row.size.clone()),
                    Cell::from(row.family.clone()),
                    Cell::from(row.params.clone()),
                    Cell::from(row.quantization.clone()),
                    Cell::from(row.installed.clone()),
                ])
                .style(style)
            })
            .collect();

        let widths = [
            Constraint::Length(2),
            Constraint::Min(20),
            Constraint::Length(9),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(10),
        ];

        let table = Table::new(rows, widths)
            .header(
                Row::new(vec!["", "Name", "Size", "Family", "Params", "Quant", "Installed"])
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .block(
                Block::bordered()
                    .title(title)
                    .title_style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .row_highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("> ");

        frame.render_stateful_widget(table, area, &mut dashboard.model_table);
    }
}
