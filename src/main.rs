use dotenv::dotenv;
use eframe::egui;
use eframe::egui::Visuals;
use log::info;
use std::error::Error;

use projectome::config::Config;
use projectome::models::{AppState, Tab};
use projectome::store::TableStore;
use projectome::ui;

pub struct DashboardApp {
    state: AppState,
}

impl DashboardApp {
    fn new(config: Config) -> Self {
        let store = TableStore::spawn(config.data_dir.clone(), config.infer_schema_length);
        Self {
            state: AppState::new(config, store),
        }
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(Visuals::light());

        if ui::poll_background(&mut self.state) {
            ctx.request_repaint();
        }
        if let Some(interval) = ui::repaint_interval(&self.state) {
            ctx.request_repaint_after(interval);
        }

        egui::TopBottomPanel::top("tab_panel").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.heading("Zebrafish dHb-IPN Projectome");
            ui::tab_bar(ui, &mut self.state);
            ui.add_space(4.0);
        });

        egui::TopBottomPanel::bottom("status_panel").show(ctx, |ui| {
            ui::status_bar(ui, &self.state);
        });

        egui::CentralPanel::default().show(ctx, |ui| match self.state.selected_tab {
            Tab::ClusterLookup => ui::cluster_lookup_tab(ui, &mut self.state),
            Tab::DomainClusters => ui::domain_clusters_tab(ui, &mut self.state),
            Tab::GeneLookup => ui::gene_lookup_tab(ctx, ui, &mut self.state),
            Tab::DomainGenes => ui::domain_genes_tab(ui, &mut self.state),
            Tab::ClusterTable => ui::cluster_table_tab(ui, &mut self.state),
            Tab::GeneTable => ui::gene_table_tab(ui, &mut self.state),
            Tab::Umap => ui::umap_tab(ui, &mut self.state),
            Tab::Downloads => ui::downloads_tab(ui, &mut self.state),
        });
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = Config::from_env();
    info!("starting with data directory {}", config.data_dir.display());

    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Projectome",
        options,
        Box::new(|_cc| Ok(Box::new(DashboardApp::new(config)))),
    )?;

    Ok(())
}
