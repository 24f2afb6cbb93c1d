use crate::state::StateMirror;
use ratatui::{
    style::Stylize,
    text::{Line, Span},
};

/// Lines of the software and network panel.
pub fn build_software_lines(state: &StateMirror) -> Vec<Line<'static>> {
    let Some(ping) = state.ping() else {
        return vec![Line::from("Proxy information not available yet").dark_gray()];
    };

    let access = if ping.user.is_admin() {
        "all the APIs of Ollama"
    } else {
        "view models, view device and chat completion API"
    };
    let lan = match ping.config.lan_url() {
        Some(url) => Span::from(url).green(),
        None => Span::from("not possible (change host to 0.0.0.0)").yellow(),
    };
    let ollama_version = state.ollama_version().unwrap_or("unknown").to_string();

    vec![
        field("User access", Span::from(access)),
        field(
            "Proxy",
            Span::from(format!(
                "v{} on {}:{}",
                ping.proxy_version, ping.config.host, ping.config.port
            )),
        ),
        field("Ollama", Span::from(format!("v{}", ollama_version))),
        field("CORS policy", Span::from(ping.config.cors_policy.clone())),
        field("Log level", Span::from(ping.config.log_level.clone())),
        field("LAN access", lan),
        field(
            "Anonymous",
            if ping.config.anonymous_access {
                Span::from("allowed").yellow()
            } else {
                Span::from("token required")
            },
        ),
    ]
}

fn field(label: &'static str, value: Span<'static>) -> Line<'static> {
    Line::from(vec![Span::from(format!("{}: ", label)).bold(), value])
}
