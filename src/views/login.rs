use crate::session::{OPEN_ACCESS_TOKEN, validate_token};
use crate::sync::{BootstrapError, Notice};
use crate::app::watch;
use crate::{App, AppView, dashboard::DashboardView};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::{Color, Style, Stylize},
    text::Line,
    widgets::{Block, Paragraph},
};
use tui_input::backend::crossterm::EventHandler;

#[derive(Debug, Clone, PartialEq)]
pub enum LoginView {
    /// Checking whether a stored token (or open access) lets us in directly.
    Probing,
    /// Waiting for the user to type a token.
    Input,
    /// Trying the pending token against the proxy.
    Connecting,
}

#[derive(Debug, Default)]
pub struct LoginState {
    /// Token input, masked on screen.
    pub input: tui_input::Input,
    /// Last validation or authentication error.
    pub error: Option<String>,
    /// Token to try on the next tick.
    pub pending: Option<String>,
}

impl App {
    pub(crate) fn draw_login(&mut self, frame: &mut Frame, view: &LoginView) {
        let area = frame.area();

        let banner: Vec<_> = crate::constants::LOGIN_BANNER
            .map(|line| Line::from(line).centered())
            .into_iter()
            .collect();

        let vertical = Layout::vertical([
            Constraint::Length(banner.len() as u16 + 1), // Banner
            Constraint::Length(3),                       // Input
            Constraint::Length(2),                       // Status
            Constraint::Min(0),
            Constraint::Length(1), // Footer
        ]);
        let [banner_area, input_area, status_area, _, footer_area] = vertical.areas(area);
        let [_, input_area, _] = Layout::horizontal([
            Constraint::Fill(1),
            Constraint::Length(60),
            Constraint::Fill(1),
        ])
        .areas(input_area);

        frame.render_widget(Paragraph::new(banner).cyan(), banner_area);

        // keep 2 for borders and 1 for cursor
        let width = input_area.width.max(3) - 3;
        let scroll = self.state.login.input.visual_scroll(width as usize);
        let masked = "*".repeat(self.state.login.input.value().chars().count());
        let input = Paragraph::new(masked)
            .scroll((0, scroll as u16))
            .block(Block::bordered().title(format!("Token for {}", self.config.api_url())));
        frame.render_widget(input, input_area);

        let status = match view {
            LoginView::Probing => Line::from("Contacting the proxy...").gray(),
            LoginView::Connecting => Line::from("Checking token...").gray(),
            LoginView::Input => match &self.state.login.error {
                Some(err) => Line::from(err.as_str()).red(),
                None => Line::from(""),
            },
        };
        frame.render_widget(Paragraph::new(status).centered(), status_area);

        if matches!(view, LoginView::Input) {
            let x = self.state.login.input.visual_cursor().max(scroll) - scroll + 1;
            frame.set_cursor_position((input_area.x + x as u16, input_area.y + 1));
        }

        frame.render_widget(
            Paragraph::new("Enter: Log in  |  Esc: Quit")
                .style(Style::default().fg(Color::DarkGray))
                .centered(),
            footer_area,
        );
    }

    pub(crate) fn handle_login_input(&mut self, key: KeyEvent, view: &LoginView) {
        match (key.modifiers, key.code) {
            (_, KeyCode::Esc) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => self.quit(),
            (_, KeyCode::Enter) if matches!(view, LoginView::Input) => {
                let candidate = self.state.login.input.value().trim().to_string();
                // refused here, before anything goes over the network
                if let Err(err) = validate_token(&candidate) {
                    self.state.login.error = Some(err.to_string());
                    return;
                }
                self.state.login.error = None;
                self.state.login.pending = Some(candidate);
                self.view = AppView::Login(LoginView::Connecting);
            }
            _ if matches!(view, LoginView::Input) => {
                self.state
                    .login
                    .input
                    .handle_event(&crossterm::event::Event::Key(key));
            }
            _ => {}
        }
    }

    /// Handle async operations for login (called during tick).
    pub(crate) async fn tick_login(&mut self, view: &LoginView) {
        match view {
            LoginView::Probing => self.probe_proxy().await,
            LoginView::Connecting => {
                if let Some(candidate) = self.state.login.pending.take() {
                    self.login(&candidate).await;
                }
            }
            LoginView::Input => {}
        }
    }

    /// Log in right away with a stored token, or when the proxy is open to anyone.
    async fn probe_proxy(&mut self) {
        let work = self.orchestrator.probe();
        let watched = watch(work, &mut self.event_stream, &mut self.heartbeat).await;
        let Some(result) = self.finish(watched) else {
            return;
        };
        let next = match result {
            Ok(ping) if !ping.user.is_anonymous() => {
                let stored = self.orchestrator.session().token().map(str::to_string);
                stored.or_else(|| {
                    (ping.config.anonymous_access || ping.user.is_open())
                        .then(|| OPEN_ACCESS_TOKEN.to_string())
                })
            }
            Ok(_) => None,
            Err(err) => {
                tracing::warn!("Startup ping failed: {}", err);
                self.state.login.error = Some("Proxy seems to be down.".to_string());
                None
            }
        };

        match next {
            Some(candidate) => {
                self.state.login.pending = Some(candidate);
                self.view = AppView::Login(LoginView::Connecting);
            }
            None => self.view = AppView::Login(LoginView::Input),
        }
    }

    async fn login(&mut self, candidate: &str) {
        let work = self.orchestrator.bootstrap(candidate);
        let watched = watch(work, &mut self.event_stream, &mut self.heartbeat).await;
        let Some(result) = self.finish(watched) else {
            return;
        };
        match result {
            Ok(report) => {
                let open = self
                    .orchestrator
                    .state()
                    .ping()
                    .is_some_and(|p| p.user.is_open());
                self.set_notice(match report.failures.first() {
                    Some(err) => {
                        tracing::warn!("{} initial fetches failed", report.failures.len());
                        Notice::warning(format!("Logged in, but some data is missing: {}", err))
                    }
                    None if open => Notice::info("Proxy access is open, no token needed."),
                    None => Notice::success("Token accepted."),
                });

                self.state.login.input.reset();
                self.state.login.error = None;
                self.state.dashboard = Default::default();
                self.refresh_views(report.stale);
                self.prefetch_pending = true;
                self.heartbeat.start();
                self.view = AppView::Dashboard(DashboardView::Browsing);
            }
            Err(err) => {
                if !matches!(err, BootstrapError::Token(_)) {
                    tracing::warn!("Login failed: {}", err);
                }
                self.state.login.error = Some(err.to_string());
                self.view = AppView::Login(LoginView::Input);
            }
        }
    }
}
