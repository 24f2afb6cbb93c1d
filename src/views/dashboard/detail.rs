use crate::App;
use crate::common::{ModelDetail, ModelSummary};
use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph, Wrap},
};

/// Centered rectangle taking the given share of `area`.
pub(super) fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    area
}

/// Context length in thousands of tokens, e.g. `131k`.
pub fn format_context_length(tokens: u64) -> String {
    format!("{}k", (tokens as f64 / 1000.0).round() as u64)
}

/// Body of the detail popup; `detail` is missing until the prefetch caught up.
pub fn build_detail_lines(
    summary: Option<&ModelSummary>,
    detail: Option<&ModelDetail>,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(summary) = summary {
        lines.push(entry("Family", summary.details.family.clone()));
        lines.push(entry("Parameters", summary.details.parameter_size.clone()));
        lines.push(entry("Quantization", summary.details.quantization_level.clone()));
        lines.push(entry("Digest", summary.digest.clone()));
    }

    let Some(detail) = detail else {
        lines.push(Line::from(""));
        lines.push(Line::from("Loading model details...").dark_gray());
        return lines;
    };

    if let Some(architecture) = &detail.architecture {
        lines.push(entry("Architecture", architecture.clone()));
    }
    if let Some(context) = detail.context_length {
        lines.push(entry("Context", format_context_length(context)));
    }
    if !detail.languages.is_empty() {
        lines.push(entry("Languages", detail.languages.join(", ")));
    }
    if let Some(license) = &detail.license {
        // licenses are long texts, their first line names them
        let name = license.lines().next().unwrap_or_default().trim().to_string();
        lines.push(entry("License", name));
    }
    if let Some(system) = &detail.system_prompt {
        lines.push(Line::from(""));
        lines.push(Line::from("System prompt").bold());
        lines.extend(system.lines().map(|l| Line::from(l.to_string())));
    }
    if let Some(parameters) = &detail.parameters {
        lines.push(Line::from(""));
        lines.push(Line::from("Parameters").bold());
        lines.extend(parameters.lines().map(|l| Line::from(l.to_string())));
    }
    lines
}

fn entry(label: &'static str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::from(format!("{:<14}", label)).bold().cyan(),
        Span::from(value),
    ])
}

impl App {
    pub(crate) fn draw_model_detail(&mut self, frame: &mut Frame, area: Rect, name: &str) {
        let state = self.orchestrator.state();
        let lines = build_detail_lines(state.model(name), state.model_detail(name));

        let area = popup_area(area, 70, 70);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .block(
                    Block::bordered()
                        .title(format!(" {} ", name))
                        .title_bottom(Line::from(" Esc: Close ").centered())
                        .border_style(Style::default().fg(Color::Cyan)),
                ),
            area,
        );
    }
}
