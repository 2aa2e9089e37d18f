mod app;
mod color;
mod state;
mod ui;

use app::DashboardApp;
use dsa_dashboard::Config;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let config = match Config::load_default() {
        Ok(Some(config)) => {
            log::info!("Using {}", dsa_dashboard::config::DEFAULT_CONFIG_FILE);
            config
        }
        Ok(None) => Config::default(),
        Err(e) => {
            log::error!("{e:#}; falling back to defaults");
            Config::default()
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 820.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "DSA Performance Dashboard",
        options,
        Box::new(|_cc| Ok(Box::new(DashboardApp::new(config)))),
    )
}
