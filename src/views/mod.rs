/// Model, process, device and proxy overview.
pub mod dashboard;
/// Token login screen.
pub mod login;
