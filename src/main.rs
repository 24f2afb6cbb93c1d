use infollama_tui::App;
use infollama_tui::config::Config;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    // run without logs rather than not at all
    if let Err(err) = infollama_tui::logging::init(&Config::data_dir()) {
        eprintln!("Logging disabled: {}", err);
    }

    let app = App::new()?;
    let terminal = ratatui::init();
    let result = app.run(terminal).await;
    ratatui::restore();
    result
}
