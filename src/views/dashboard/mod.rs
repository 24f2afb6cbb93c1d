mod device;
pub use device::*;

mod software;
pub use software::*;

mod models;
pub use models::*;

mod processes;
pub use processes::*;

mod detail;

mod generate;
pub use generate::*;

use crate::common::GenerateResponse;
use crate::login::LoginView;
use crate::state::{Liveness, StateMirror};
use crate::sync::{CycleKind, NoticeLevel, StaleViews};
use crate::app::watch;
use crate::{App, AppView};
use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, TableState, Wrap},
};
use tui_input::backend::crossterm::EventHandler;

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardView {
    Browsing,
    /// Typing a filter for the model table.
    Filter,
    /// Detail popup for a model.
    Detail(String),
    /// Test generation popup for a model.
    Generate(String),
    /// A command is running; the label says which.
    Busy(String),
}

/// Work requested by a key press, run on the next tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Refresh,
    Load(String),
    Unload(String),
    Generate { model: String, prompt: String },
    Logout,
}

/// Dashboard content built from the state mirror.
///
/// Each part is rebuilt only when its view is reported stale, so unchanged
/// data is not reformatted on every frame.
#[derive(Debug, Default)]
pub struct DashboardState {
    pub software_lines: Vec<Line<'static>>,
    pub device_lines: Vec<Line<'static>>,
    pub model_title: String,
    pub model_rows: Vec<ModelRow>,
    pub process_title: String,
    pub process_rows: Vec<ProcessRow>,
    /// Model table filter; rows whose text does not contain it are hidden.
    pub filter: tui_input::Input,
    /// Selection among the visible rows of the model table.
    pub model_table: TableState,
    pub generate: GenerateState,
    /// Command waiting for the next tick.
    pub pending: Option<Command>,
}

impl DashboardState {
    /// Rebuild the stale parts of the dashboard.
    pub fn refresh(&mut self, stale: StaleViews, state: &StateMirror, now: DateTime<Utc>) {
        if stale.software {
            self.software_lines = build_software_lines(state);
        }
        if stale.device {
            self.device_lines = build_device_lines(state);
        }
        if stale.models {
            let (title, rows) = build_model_rows(state, now);
            self.model_title = title;
            self.model_rows = rows;
            self.clamp_selection();
        }
        if stale.processes {
            let (title, rows) = build_process_rows(state);
            self.process_title = title;
            self.process_rows = rows;
        }
    }

    /// Model rows left after filtering, in server order.
    pub fn visible_models(&self) -> Vec<&ModelRow> {
        let needle = self.filter.value();
        self.model_rows
            .iter()
            .filter(|row| row.matches(needle))
            .collect()
    }

    fn clamp_selection(&mut self) {
        let visible = self.visible_models().len();
        let selected = match (self.model_table.selected(), visible) {
            (_, 0) => None,
            (Some(i), len) => Some(i.min(len - 1)),
            (None, _) => Some(0),
        };
        self.model_table.select(selected);
    }

    /// Apply a key to the filter input and keep the selection on a visible row.
    pub fn edit_filter(&mut self, key: KeyEvent) {
        self.filter.handle_event(&crossterm::event::Event::Key(key));
        self.clamp_selection();
    }

    pub fn clear_filter(&mut self) {
        self.filter.reset();
        self.clamp_selection();
    }

    /// Name of the selected model, if any.
    pub fn selected_model(&self) -> Option<&str> {
        let selected = self.model_table.selected()?;
        self.visible_models()
            .get(selected)
            .map(|row| row.name.as_str())
    }
}

impl App {
    pub(crate) fn draw_dashboard(&mut self, frame: &mut Frame, view: &DashboardView) {
        let area = frame.area();

        let vertical = Layout::vertical([
            Constraint::Length(3),      // Header
            Constraint::Length(10),     // Device & software
            Constraint::Percentage(55), // Models
            Constraint::Min(5),         // Processes
            Constraint::Length(1),      // Status
        ]);
        let [header_area, info_area, models_area, processes_area, status_area] =
            vertical.areas(area);
        let [device_area, software_area] =
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
                .areas(info_area);

        self.draw_header(frame, header_area);

        frame.render_widget(
            Paragraph::new(self.state.dashboard.device_lines.clone())
                .block(Block::bordered().title("Device"))
                .wrap(Wrap { trim: true }),
            device_area,
        );
        frame.render_widget(
            Paragraph::new(self.state.dashboard.software_lines.clone())
                .block(Block::bordered().title("Software & Network"))
                .wrap(Wrap { trim: true }),
            software_area,
        );

        self.draw_models_table(frame, models_area, matches!(view, DashboardView::Filter));
        self.draw_processes_table(frame, processes_area);
        self.draw_status(frame, status_area, view);

        match view {
            DashboardView::Detail(name) => self.draw_model_detail(frame, area, name),
            DashboardView::Generate(name) => self.draw_generate(frame, area, name),
            DashboardView::Browsing | DashboardView::Filter | DashboardView::Busy(_) => {}
        }
    }

    fn draw_header(&mut self, frame: &mut Frame, area: Rect) {
        let state = self.orchestrator.state();
        let hostname = state
            .device()
            .map(|d| d.hostname.as_str())
            .unwrap_or("unknown host");
        let user = match state.ping() {
            Some(ping) if !ping.user.is_anonymous() => {
                format!("{} ({})", ping.user.user_name, ping.user.user_type)
            }
            _ => "not logged in".to_string(),
        };

        let liveness = state.liveness();
        let heart = match liveness {
            Liveness::Up => Span::from("♥ ").green(),
            Liveness::UpstreamDown => Span::from("♡ ").yellow(),
            Liveness::ProxyDown => Span::from("♡ ").red(),
            Liveness::Unknown => Span::from("♡ ").dark_gray(),
        };

        let line = Line::from(vec![
            heart,
            Span::from(liveness.describe()),
            Span::from("  |  "),
            Span::from(format!("Infollama Proxy - {}", hostname)).bold().cyan(),
            Span::from("  |  "),
            Span::from(format!("Welcome {}", user)),
        ]);
        frame.render_widget(
            Paragraph::new(line)
                .centered()
                .block(Block::default().borders(Borders::BOTTOM)),
            area,
        );
    }

    fn draw_status(&mut self, frame: &mut Frame, area: Rect, view: &DashboardView) {
        let line = match (view, &self.notice) {
            (DashboardView::Busy(label), _) => Line::from(format!("{}...", label)).yellow(),
            (DashboardView::Filter, _) => {
                Line::from("Type to filter models | Enter: Keep filter | Esc: Clear filter")
                    .style(Style::default().fg(Color::DarkGray))
            }
            (_, Some(notice)) if notice.created_at.elapsed() < crate::constants::NOTICE_TTL => {
                let color = match notice.level {
                    NoticeLevel::Info => Color::Cyan,
                    NoticeLevel::Success => Color::Green,
                    NoticeLevel::Warning => Color::Yellow,
                    NoticeLevel::Error => Color::Red,
                };
                Line::from(notice.message.as_str()).fg(color)
            }
            _ => Line::from(
                "↑↓: Select | /: Filter | Enter: Details | l: Load | u: Unload | g: Generate | r: Refresh | o: Logout | q: Quit",
            )
            .style(Style::default().fg(Color::DarkGray)),
        };
        frame.render_widget(Paragraph::new(line).centered(), area);
    }

    pub(crate) fn handle_dashboard_input(&mut self, key: KeyEvent, view: &DashboardView) {
        if let (KeyModifiers::CONTROL, KeyCode::Char('c')) = (key.modifiers, key.code) {
            self.quit();
            return;
        }

        match view {
            DashboardView::Browsing => self.handle_browsing_input(key),
            DashboardView::Filter => match key.code {
                KeyCode::Esc => {
                    self.state.dashboard.clear_filter();
                    self.view = AppView::Dashboard(DashboardView::Browsing);
                }
                KeyCode::Enter => self.view = AppView::Dashboard(DashboardView::Browsing),
                _ => self.state.dashboard.edit_filter(key),
            },
            DashboardView::Detail(_) => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                    self.view = AppView::Dashboard(DashboardView::Browsing);
                }
            }
            DashboardView::Generate(model) => self.handle_generate_input(key, model),
            // only quitting while a command runs
            DashboardView::Busy(_) => {}
        }
    }

    fn handle_browsing_input(&mut self, key: KeyEvent) {
        let dashboard = &mut self.state.dashboard;
        let selected = dashboard.selected_model().map(str::to_string);
        let (command, label) = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.quit();
                return;
            }
            KeyCode::Up => {
                dashboard.model_table.select_previous();
                dashboard.clamp_selection();
                return;
            }
            KeyCode::Down => {
                dashboard.model_table.select_next();
                dashboard.clamp_selection();
                return;
            }
            KeyCode::Enter => {
                if let Some(model) = selected {
                    self.view = AppView::Dashboard(DashboardView::Detail(model));
                }
                return;
            }
            KeyCode::Char('/') => {
                self.view = AppView::Dashboard(DashboardView::Filter);
                return;
            }
            KeyCode::Char('g') => {
                if let Some(model) = selected {
                    dashboard.generate.open(&self.config.test_prompt);
                    self.view = AppView::Dashboard(DashboardView::Generate(model));
                }
                return;
            }
            KeyCode::Char('r') => (Command::Refresh, "Refreshing".to_string()),
            KeyCode::Char('o') => (Command::Logout, "Logging out".to_string()),
            KeyCode::Char('l') => match selected {
                Some(model) => (Command::Load(model.clone()), format!("Loading {}", model)),
                None => return,
            },
            KeyCode::Char('u') => match selected {
                Some(model) => (
                    Command::Unload(model.clone()),
                    format!("Unloading {}", model),
                ),
                None => return,
            },
            _ => return,
        };

        dashboard.pending = Some(command);
        self.view = AppView::Dashboard(DashboardView::Busy(label));
    }

    /// Handle async operations for the dashboard (called during tick).
    pub(crate) async fn tick_dashboard(&mut self, _view: &DashboardView) {
        if self.prefetch_pending {
            self.prefetch_pending = false;
            let work = self.orchestrator.prefetch_details();
            let watched = watch(work, &mut self.event_stream, &mut self.heartbeat).await;
            if self.finish(watched).is_none() {
                return;
            }
        }

        let Some(command) = self.state.dashboard.pending.take() else {
            return;
        };

        let mut next = DashboardView::Browsing;
        match command {
            Command::Refresh => {
                let work = self.orchestrator.refresh_cycle(CycleKind::Manual);
                let watched = watch(work, &mut self.event_stream, &mut self.heartbeat).await;
                let Some(report) = self.finish(watched) else {
                    return;
                };
                self.apply_report(report);
            }
            Command::Load(model) => {
                let work = self.orchestrator.load_model(
                    &model,
                    self.config.num_ctx,
                    self.config.num_gpu,
                    &self.config.keep_alive,
                );
                let watched = watch(work, &mut self.event_stream, &mut self.heartbeat).await;
                let Some(notice) = self.finish(watched) else {
                    return;
                };
                self.set_notice(notice);
            }
            Command::Unload(model) => {
                let work = self.orchestrator.unload_model(&model);
                let watched = watch(work, &mut self.event_stream, &mut self.heartbeat).await;
                let Some(notice) = self.finish(watched) else {
                    return;
                };
                self.set_notice(notice);
            }
            Command::Generate { model, prompt } => {
                let work = self.orchestrator.generate(&model, &prompt);
                let watched = watch(work, &mut self.event_stream, &mut self.heartbeat).await;
                match self.finish(watched) {
                    Some(Ok(response)) => self.show_generation(response),
                    Some(Err(notice)) => self.set_notice(notice),
                    None => return,
                }
                // keep the popup open to show the answer
                next = DashboardView::Generate(model);
            }
            Command::Logout => {
                if let Err(err) = self.orchestrator.logout() {
                    tracing::error!("Logout failed: {}", err);
                }
                self.state.dashboard = Default::default();
                self.notice = None;
                self.view = AppView::Login(LoginView::Input);
                return;
            }
        }
        self.view = AppView::Dashboard(next);
    }

    fn show_generation(&mut self, response: GenerateResponse) {
        self.set_notice(crate::sync::Notice::success(format!(
            "{} tokens at {:.1} tokens/s",
            response.eval_count,
            response.tokens_per_second()
        )));
        self.state.dashboard.generate.result = Some(response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEvent;

    fn row(name: &str, family: &str) -> ModelRow {
        ModelRow {
            name: name.to_string(),
            digest: format!("sha256:{}", name),
            size: "4 GB".to_string(),
            family: family.to_string(),
            params: "8.0B".to_string(),
            quantization: "Q4_0".to_string(),
            installed: "2 weeks".to_string(),
        }
    }

    fn type_filter(dashboard: &mut DashboardState, text: &str) {
        for c in text.chars() {
            dashboard.edit_filter(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
    }

    #[test]
    fn test_filter_narrows_the_selection() {
        let mut dashboard = DashboardState {
            model_rows: vec![
                row("llama3:8b", "llama"),
                row("mistral:7b", "llama"),
                row("Gemma2:9b", "gemma2"),
            ],
            ..Default::default()
        };
        dashboard.model_table.select(Some(1));
        assert_eq!(dashboard.selected_model(), Some("mistral:7b"));

        // case is ignored and the selection is pulled back onto a visible row
        type_filter(&mut dashboard, "GEMMA");
        let visible: Vec<_> = dashboard.visible_models().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(visible, vec!["Gemma2:9b"]);
        assert_eq!(dashboard.selected_model(), Some("Gemma2:9b"));

        dashboard.clear_filter();
        assert_eq!(dashboard.visible_models().len(), 3);
        assert_eq!(dashboard.selected_model(), Some("llama3:8b"));
    }

    #[test]
    fn test_filter_without_match_selects_nothing() {
        let mut dashboard = DashboardState {
            model_rows: vec![row("llama3:8b", "llama")],
            ..Default::default()
        };
        dashboard.model_table.select(Some(0));

        type_filter(&mut dashboard, "phi");
        assert!(dashboard.visible_models().is_empty());
        assert_eq!(dashboard.selected_model(), None);
    }
}
