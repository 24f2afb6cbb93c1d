use infollama_tui::App;
use infollama_tui::config::Config;

// needs a proxy listening on the configured host and port
// cargo test --package infollama-tui --test test_screens -- test_dashboard_screen --exact --nocapture --ignored
#[tokio::test]
#[ignore = "run manually"]
async fn test_dashboard_screen() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let terminal = ratatui::init();

    let config = Config {
        heartbeat_secs: 2,
        ..Default::default()
    };
    let app = App::with_config(config);

    let result = app.run(terminal).await;
    ratatui::restore();
    result
}
