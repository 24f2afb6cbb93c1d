use crate::common::ApiClient;
use crate::config::Config;
use crate::dashboard::{DashboardState, DashboardView};
use crate::login::{LoginState, LoginView};
use crate::session::SessionStore;
use crate::sync::{CycleKind, CycleReport, Heartbeat, Notice, Orchestrator, StaleViews};
use color_eyre::eyre::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use futures::{Stream, StreamExt};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum AppView {
    Login(LoginView),
    Dashboard(DashboardView),
}

#[derive(Debug, Default)]
pub struct AppState {
    pub login: LoginState,
    pub dashboard: DashboardState,
}

/// 60 FPS = 1000ms / 60 = 16.67ms per frame
const FPS_RATE: std::time::Duration = std::time::Duration::from_millis(1000 / 60);

#[derive(Debug)]
pub struct App {
    /// Active application view.
    pub view: AppView,
    /// Per-view state, kept across view switches.
    pub state: AppState,
    /// Is the application running?
    pub is_running: bool,
    /// Event stream.
    pub event_stream: EventStream,
    /// Configuration.
    pub config: Config,
    /// Session, gateway and state mirror.
    pub orchestrator: Orchestrator<ApiClient>,
    /// Background refresh timer, armed after login.
    pub heartbeat: Heartbeat,
    /// Last status bar notice.
    pub notice: Option<Notice>,
    /// Whether model details should be fetched after the next draw.
    pub prefetch_pending: bool,
}

/// Why the main loop woke up.
enum Wake {
    Frame,
    Heartbeat,
    Settle,
    Input(Option<std::io::Result<Event>>),
}

impl App {
    /// Construct a new instance of [`App`].
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: Config) -> Self {
        let session = SessionStore::open(Config::data_dir());
        let gateway = ApiClient::new(config.api_url());
        Self {
            view: AppView::Login(LoginView::Probing),
            state: AppState::default(),
            is_running: false,
            event_stream: EventStream::new(),
            orchestrator: Orchestrator::new(gateway, session, config.token_ttl_days),
            heartbeat: Heartbeat::new(config.heartbeat_period()),
            notice: None,
            prefetch_pending: false,
            config,
        }
    }

    /// Run the application's main loop.
    pub async fn run(mut self, mut terminal: ratatui::DefaultTerminal) -> Result<()> {
        self.is_running = true;

        // create a ticker for animation updates
        let mut interval = tokio::time::interval(FPS_RATE);

        while self.is_running {
            // draw first (to disguise async stuff in ticks)
            terminal.draw(|frame| self.draw(frame))?;

            // process ticks
            match self.view.clone() {
                AppView::Login(view) => self.tick_login(&view).await,
                AppView::Dashboard(view) => self.tick_dashboard(&view).await,
            }

            let settle_due = self.orchestrator.settle_due();
            let wake = tokio::select! {
                _ = interval.tick() => Wake::Frame,
                _ = self.heartbeat.tick() => Wake::Heartbeat,
                _ = sleep_until_due(settle_due) => Wake::Settle,
                event = self.event_stream.next() => Wake::Input(event),
            };

            match wake {
                // will trigger a redraw for animation by looping
                Wake::Frame => continue,
                Wake::Heartbeat => self.on_heartbeat().await,
                Wake::Settle => {
                    let work = self.orchestrator.settle_processes();
                    let watched = watch(work, &mut self.event_stream, &mut self.heartbeat).await;
                    if let Some(stale) = self.finish(watched) {
                        self.refresh_views(stale);
                    }
                }
                Wake::Input(event) => self.handle_crossterm_event(event)?,
            }
        }
        Ok(())
    }

    /// Renders the user interface.
    fn draw(&mut self, frame: &mut ratatui::Frame) {
        match self.view.clone() {
            AppView::Login(view) => self.draw_login(frame, &view),
            AppView::Dashboard(view) => self.draw_dashboard(frame, &view),
        }
    }

    /// Updates the state of [`App`] from a crossterm event.
    fn handle_crossterm_event(&mut self, event: Option<std::io::Result<Event>>) -> Result<()> {
        match event {
            Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                match &self.view.clone() {
                    AppView::Login(view) => self.handle_login_input(key, view),
                    AppView::Dashboard(view) => self.handle_dashboard_input(key, view),
                }
            }
            Some(Err(err)) => return Err(err.into()),
            // the event stream ends with the terminal
            None => self.quit(),
            _ => {}
        }
        Ok(())
    }

    async fn on_heartbeat(&mut self) {
        // the timer outlives a logout, but there is nothing to refresh without a session
        if !self.orchestrator.session().is_valid() {
            return;
        }
        let work = self.orchestrator.refresh_cycle(CycleKind::Heartbeat);
        let watched = watch(work, &mut self.event_stream, &mut self.heartbeat).await;
        if let Some(report) = self.finish(watched) {
            self.apply_report(report);
        }
    }

    /// Unwrap the outcome of watched work, quitting if the user asked to.
    pub(crate) fn finish<T>(&mut self, watched: Watched<T>) -> Option<T> {
        match watched {
            Watched::Done(output) => Some(output),
            Watched::Quit => {
                self.quit();
                None
            }
        }
    }

    /// Reflect a refresh cycle on screen.
    pub(crate) fn apply_report(&mut self, report: CycleReport) {
        if report.proxy_unreachable {
            self.set_notice(Notice::error("An error occurred. Proxy seems to be down."));
        }
        if report.stale.models {
            self.prefetch_pending = true;
        }
        self.refresh_views(report.stale);
    }

    /// Rebuild the cached content of stale views.
    pub(crate) fn refresh_views(&mut self, stale: StaleViews) {
        self.state
            .dashboard
            .refresh(stale, self.orchestrator.state(), chrono::Utc::now());
    }

    pub(crate) fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    /// Set running to false to quit the application.
    pub fn quit(&mut self) {
        self.is_running = false;
    }
}

/// Outcome of remote work run while the terminal is still watched.
pub(crate) enum Watched<T> {
    Done(T),
    /// The user quit; the work was dropped unfinished.
    Quit,
}

/// Drive `work` to completion while still reacting to quit keys.
///
/// The work holds the heartbeat slot, so ticks firing meanwhile are skipped.
/// Other keys are ignored until the work is done.
pub(crate) async fn watch<F, S>(work: F, events: &mut S, heartbeat: &mut Heartbeat) -> Watched<F::Output>
where
    F: Future,
    S: Stream<Item = std::io::Result<Event>> + Unpin,
{
    let claimed = heartbeat.begin_cycle();
    tokio::pin!(work);

    let outcome = loop {
        tokio::select! {
            output = &mut work => break Watched::Done(output),
            _ = heartbeat.tick() => {
                // refused while the slot is held, which counts the skip
                heartbeat.begin_cycle();
            }
            event = events.next() => {
                if is_quit(event.as_ref()) {
                    break Watched::Quit;
                }
            }
        }
    };

    if claimed {
        heartbeat.end_cycle();
    }
    outcome
}

fn is_quit(event: Option<&std::io::Result<Event>>) -> bool {
    match event {
        // the event stream ends with the terminal
        None => true,
        Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => matches!(
            (key.modifiers, key.code),
            (KeyModifiers::CONTROL, KeyCode::Char('c')) | (_, KeyCode::Char('q'))
        ),
        _ => false,
    }
}

async fn sleep_until_due(due: Option<Instant>) {
    match due {
        Some(due) => tokio::time::sleep_until(due).await,
        None => std::future::pending().await,
    }
}
