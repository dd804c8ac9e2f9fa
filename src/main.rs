mod api;
mod app;
mod application;
mod domain;
mod ui;
mod utils;

use iced::{window, Size};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,archive_installer_fetch=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> iced::Result {
    init_logging();

    iced::application(app::ArchiveApp::default, app::update, app::view)
        .title("Internet Archive Installer Fetch")
        .window(window::Settings {
            size: Size::new(900.0, 720.0),
            ..Default::default()
        })
        .run()
}
