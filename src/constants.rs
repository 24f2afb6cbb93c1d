/// An Infollama ASCII art banner for the login screen.
pub const LOGIN_BANNER: [&str; 8] = [
    " ___        __       _ _                       ",
    "|_ _|_ __  / _| ___ | | | __ _ _ __ ___   __ _ ",
    " | || '_ \\| |_ / _ \\| | |/ _` | '_ ` _ \\ / _` |",
    " | || | | |  _| (_) | | | (_| | | | | | | (_| |",
    "|___|_| |_|_|  \\___/|_|_|\\__,_|_| |_| |_|\\__,_|",
    "",
    "proxy dashboard",
    crate::constants::VERSION,
];

/// Status bar notices disappear after this long.
pub const NOTICE_TTL: std::time::Duration = std::time::Duration::from_secs(5);

/// Version from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
