use super::{Command, DashboardView};
use super::detail::popup_area;
use crate::common::GenerateResponse;
use crate::{App, AppView};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::Line,
    widgets::{Block, Clear, Paragraph, Wrap},
};
use tui_input::backend::crossterm::EventHandler;

/// Prompt and last answer of the test generation popup.
#[derive(Debug, Default)]
pub struct GenerateState {
    pub input: tui_input::Input,
    pub result: Option<GenerateResponse>,
}

impl GenerateState {
    /// Prepare the popup with a fresh prompt.
    pub fn open(&mut self, prompt: &str) {
        self.input = tui_input::Input::new(prompt.to_string());
        self.result = None;
    }
}

impl App {
    pub(crate) fn draw_generate(&mut self, frame: &mut Frame, area: Rect, name: &str) {
        let area = popup_area(area, 70, 60);
        frame.render_widget(Clear, area);
        let block = Block::bordered()
            .title(format!(" Test {} ", name))
            .title_bottom(Line::from(" Enter: Generate | Esc: Close ").centered())
            .border_style(Style::default().fg(Color::Cyan));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [input_area, answer_area] =
            Layout::vertical([Constraint::Length(3), Constraint::Min(1)]).areas(inner);

        let generate = &self.state.dashboard.generate;
        // keep 2 for borders and 1 for cursor
        let width = input_area.width.max(3) - 3;
        let scroll = generate.input.visual_scroll(width as usize);
        frame.render_widget(
            Paragraph::new(generate.input.value())
                .scroll((0, scroll as u16))
                .block(Block::bordered().title("Prompt")),
            input_area,
        );
        let x = generate.input.visual_cursor().max(scroll) - scroll + 1;
        frame.set_cursor_position((input_area.x + x as u16, input_area.y + 1));

        let answer = match &generate.result {
            Some(result) => Paragraph::new(result.response.trim().to_string()),
            None => Paragraph::new("Press Enter to send the prompt.").dark_gray(),
        };
        frame.render_widget(
            answer
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title("Answer")),
            answer_area,
        );
    }

    pub(crate) fn handle_generate_input(&mut self, key: KeyEvent, model: &str) {
        match key.code {
            KeyCode::Esc => {
                self.view = AppView::Dashboard(DashboardView::Browsing);
            }
            KeyCode::Enter => {
                let prompt = self.state.dashboard.generate.input.value().trim().to_string();
                if prompt.is_empty() {
                    return;
                }
                self.state.dashboard.pending = Some(Command::Generate {
                    model: model.to_string(),
                    prompt,
                });
                self.view =
                    AppView::Dashboard(DashboardView::Busy(format!("Generating with {}", model)));
            }
            _ => {
                let event = crossterm::event::Event::Key(key);
                self.state.dashboard.generate.input.handle_event(&event);
            }
        }
    }
}
