use std::path::Path;
use std::time::{Duration, Instant};

use eframe::egui;
use eframe::egui::text::LayoutJob;
use eframe::egui::{Align2, Color32, FontId, Key, Modifiers, RichText, Sense, TextFormat, Ui, Vec2};
use egui_extras::{Column, TableBuilder};
use egui_plot::{Legend, Plot, Points};
use log::{info, warn};
use poll_promise::Promise;
use rfd::FileDialog;

use crate::autocomplete::{Autocomplete, Direction, DropdownView, highlight_span};
use crate::data::{TableSource, load_gene_expression, write_gene_summary_csv};
use crate::domain::{DOMAINS, DomainId, Rgb, domain_code, domain_info, expression_color};
use crate::error::DashboardError;
use crate::models::{AppState, DomainShare, ExpressionResponse, GeneSummary, Tab, UmapColorMode};
use crate::query::{
    Distribution, clusters_in_numeric_order, cluster_report, filter_by_domain, gene_report, paginate,
    substring_filter, top_by_domain,
};
use crate::scatter::{self, ExpressionRange, ScatterSeries};
use crate::store::{LoadStatus, Table};

fn color(rgb: Rgb) -> Color32 {
    Color32::from_rgb(rgb.0, rgb.1, rgb.2)
}

/// Moves finished background work into the state. Returns true if anything changed.
pub fn poll_background(state: &mut AppState) -> bool {
    let arrived = state.store.poll();
    for source in &arrived {
        match source {
            TableSource::GeneSummary => refresh_filtered_genes(state),
            TableSource::Coordinates => state.umap_dirty = true,
            _ => {}
        }
    }

    let mut changed = !arrived.is_empty();
    for promise in std::mem::take(&mut state.expression_requests) {
        match promise.try_take() {
            // every response is applied as it lands, so the last one to arrive wins
            Ok(response) => {
                apply_expression(state, response);
                changed = true;
            }
            Err(promise) => state.expression_requests.push(promise),
        }
    }
    changed
}

fn apply_expression(state: &mut AppState, response: ExpressionResponse) {
    match response.result {
        Ok(rows) => {
            info!("expression for {} ready ({} cells)", response.gene, rows.len());
            state.expression = Some((response.gene, rows));
            state.umap_message = None;
        }
        Err(err) => {
            state.expression = None;
            state.umap_message = Some(format!("Gene expression data not found for \"{}\" ({})", response.gene, err));
        }
    }
    state.umap_dirty = true;
}

pub fn is_busy(state: &AppState) -> bool {
    state.store.is_loading() || !state.expression_requests.is_empty()
}

fn request_gene_expression(state: &mut AppState, gene: &str) {
    let gene = gene.trim().to_string();
    if gene.is_empty() {
        return;
    }
    let data_dir = state.config.data_dir.clone();
    let schema = state.config.infer_schema_length;
    state.umap_message = Some("Loading gene expression...".to_string());
    state.expression_requests.push(Promise::spawn_thread("gene_expression_request", move || {
        let result = load_gene_expression(&data_dir, &gene, schema).map_err(|e| e.to_string());
        ExpressionResponse { gene, result }
    }));
}

pub fn refresh_filtered_genes(state: &mut AppState) {
    let indexed: Vec<(usize, &GeneSummary)> = state.store.gene_summary.rows().iter().enumerate().collect();
    state.filtered_genes = substring_filter(&indexed, &state.gene_filter, |(_, row)| row.gene.as_str())
        .into_iter()
        .map(|(index, _)| *index)
        .collect();
    state.gene_page = 1;
}

fn view_gene_on_umap(state: &mut AppState, gene: &str) {
    state.umap_mode = UmapColorMode::Gene;
    state.umap_gene = gene.to_string();
    state.umap_autocomplete.dismiss();
    state.selected_tab = Tab::Umap;
    request_gene_expression(state, gene);
}

fn view_cluster_on_umap(state: &mut AppState) {
    state.umap_mode = UmapColorMode::Cluster;
    state.umap_dirty = true;
    state.selected_tab = Tab::Umap;
}

fn rebuild_umap(state: &mut AppState) {
    let points = state.store.coordinates.rows();
    let (series, range) = match state.umap_mode {
        UmapColorMode::Cluster => (scatter::by_cluster(points), None),
        UmapColorMode::Domain => (scatter::by_domain(points), None),
        UmapColorMode::Gene => match &state.expression {
            Some((_, expression)) => {
                let (series, range) = scatter::by_expression(points, expression);
                (series, Some(range))
            }
            None => (Vec::new(), None),
        },
    };
    state.umap_series = series;
    state.umap_range = range;
    state.umap_dirty = false;
}

pub fn tab_bar(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal_wrapped(|ui| {
        for tab in Tab::ALL {
            if ui.selectable_label(state.selected_tab == tab, tab.label()).clicked() {
                state.selected_tab = tab;
            }
        }
    });
}

/// Placeholder shown while a table is loading or after it failed to load.
/// Returns true when the table is ready to use.
fn table_ready<T>(ui: &mut Ui, table: &Table<T>, what: &str) -> bool {
    match table.status() {
        LoadStatus::Loaded => true,
        LoadStatus::Loading => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(format!("Loading {}...", what));
            });
            false
        }
        LoadStatus::Unavailable(reason) => {
            ui.colored_label(Color32::GRAY, format!("{} not available.", what))
                .on_hover_text(reason);
            false
        }
    }
}

fn domain_combo(ui: &mut Ui, id_salt: &str, selected: &mut Option<DomainId>) {
    let text = selected
        .and_then(domain_info)
        .map(|info| format!("{} ({})", info.full_name, info.code))
        .unwrap_or_else(|| "Select an IPN domain".to_string());
    egui::ComboBox::from_id_salt(id_salt)
        .selected_text(text)
        .width(280.0)
        .show_ui(ui, |ui| {
            for info in &DOMAINS {
                ui.selectable_value(selected, Some(info.id), format!("{} ({})", info.full_name, info.code));
            }
        });
}

/// Stacked horizontal bar of the slices that are big enough to draw.
fn distribution_bar<T: DomainShare>(ui: &mut Ui, distribution: &Distribution<'_, T>) {
    let slices = distribution.displayable();
    if slices.is_empty() {
        return;
    }
    let width = ui.available_width().min(640.0);
    let (rect, _) = ui.allocate_exact_size(Vec2::new(width, 28.0), Sense::hover());
    let (labels, _) = ui.allocate_exact_size(Vec2::new(width, 16.0), Sense::hover());
    let painter = ui.painter();
    let mut x = rect.left();
    for (i, slice) in slices.iter().enumerate() {
        let Some(info) = domain_info(slice.domain()) else { continue };
        let share = (slice.percent() / 100.0).clamp(0.0, 1.0) as f32;
        let segment = egui::Rect::from_min_size(egui::pos2(x, rect.top()), Vec2::new(width * share, rect.height()));
        painter.rect_filled(segment, 0.0, color(info.color));
        painter.text(segment.center(), Align2::CENTER_CENTER, info.code, FontId::proportional(12.0), Color32::WHITE);
        painter.text(
            egui::pos2(segment.center().x, labels.center().y),
            Align2::CENTER_CENTER,
            format!("{:.1}%", slice.percent()),
            FontId::proportional(11.0),
            Color32::GRAY,
        );
        ui.interact(segment, ui.id().with(("segment", i)), Sense::hover())
            .on_hover_text(format!("{}: {:.1}%", info.code, slice.percent()));
        x = segment.right();
    }
}

/// Horizontal colour bar for the expression scale with min/max labels.
fn expression_legend(ui: &mut Ui, range: ExpressionRange) {
    const STEPS: usize = 64;
    ui.horizontal(|ui| {
        ui.label("Expression");
        ui.label(format!("{:.2}", range.min));
        let (rect, _) = ui.allocate_exact_size(Vec2::new(200.0, 14.0), Sense::hover());
        let painter = ui.painter_at(rect);
        let step = rect.width() / STEPS as f32;
        for i in 0..STEPS {
            let t = (i as f64 + 0.5) / STEPS as f64;
            let value = range.min + (range.max - range.min) * t;
            let cell = egui::Rect::from_min_size(
                egui::pos2(rect.left() + step * i as f32, rect.top()),
                Vec2::new(step + 0.5, rect.height()),
            );
            painter.rect_filled(cell, 0.0, color(expression_color(value, range.min, range.max)));
        }
        ui.label(format!("{:.2}", range.max));
    });
}

fn match_job(ui: &Ui, candidate: &str, input: &str) -> LayoutJob {
    let font = egui::TextStyle::Button.resolve(ui.style());
    let normal = TextFormat::simple(font.clone(), ui.visuals().text_color());
    let strong = TextFormat::simple(font, ui.visuals().strong_text_color());
    let mut job = LayoutJob::default();
    match highlight_span(candidate, input) {
        Some(span) => {
            job.append(&candidate[..span.start], 0.0, normal.clone());
            job.append(&candidate[span.clone()], 0.0, strong);
            job.append(&candidate[span.end..], 0.0, normal);
        }
        None => job.append(candidate, 0.0, normal),
    }
    job
}

pub enum InputAction {
    /// A suggestion was picked from the dropdown.
    Selected(String),
    /// Enter was pressed with nothing highlighted.
    Submitted(String),
}

/// Text field with a suggestion dropdown. Both gene inputs go through here.
fn autocomplete_input(
    ui: &mut Ui,
    id_salt: &str,
    text: &mut String,
    autocomplete: &mut Autocomplete,
    candidates: &[String],
    hint: &str,
) -> (egui::Response, Option<InputAction>) {
    let id = ui.make_persistent_id(id_salt);
    let mut action = None;

    if ui.memory(|m| m.has_focus(id)) {
        if ui.input_mut(|i| i.consume_key(Modifiers::NONE, Key::ArrowDown)) {
            autocomplete.navigate(Direction::Down);
        }
        if ui.input_mut(|i| i.consume_key(Modifiers::NONE, Key::ArrowUp)) {
            autocomplete.navigate(Direction::Up);
        }
        if ui.input_mut(|i| i.consume_key(Modifiers::NONE, Key::Escape)) {
            autocomplete.dismiss();
        }
        if ui.input_mut(|i| i.consume_key(Modifiers::NONE, Key::Enter)) {
            action = match autocomplete.accept() {
                Some(chosen) => {
                    *text = chosen.clone();
                    Some(InputAction::Selected(chosen))
                }
                None if !text.trim().is_empty() => {
                    autocomplete.dismiss();
                    Some(InputAction::Submitted(text.trim().to_string()))
                }
                None => None,
            };
        }
    }

    let response = ui.add(egui::TextEdit::singleline(text).id(id).hint_text(hint).desired_width(240.0));
    if response.changed() {
        autocomplete.on_input(text, candidates);
    } else if response.gained_focus() {
        autocomplete.on_focus(text, candidates);
    }

    let mut clicked = None;
    let popup = match autocomplete.view() {
        DropdownView::Closed => None,
        DropdownView::NoMatches => Some(
            egui::Frame::popup(ui.style())
                .show(ui, |ui| {
                    ui.label(RichText::new("No matching genes found").italics().color(Color32::GRAY));
                })
                .response,
        ),
        DropdownView::Results { matches, highlighted } => Some(
            egui::Frame::popup(ui.style())
                .show(ui, |ui| {
                    ui.set_width(240.0);
                    for (i, name) in matches.iter().enumerate() {
                        let item = ui.selectable_label(highlighted == Some(i), match_job(ui, name, text));
                        if highlighted == Some(i) {
                            item.scroll_to_me(None);
                        }
                        if item.clicked() {
                            clicked = Some(i);
                        }
                    }
                })
                .response,
        ),
    };

    if let Some(index) = clicked {
        if let Some(chosen) = autocomplete.select(index) {
            *text = chosen.clone();
            action = Some(InputAction::Selected(chosen));
        }
    } else if let Some(popup) = popup {
        let outside = ui.input(|i| {
            i.pointer.any_pressed()
                && i.pointer
                    .interact_pos()
                    .is_some_and(|pos| !popup.rect.contains(pos) && !response.rect.contains(pos))
        });
        if outside {
            autocomplete.dismiss();
        }
    }

    (response, action)
}

pub fn cluster_lookup_tab(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Cluster Lookup");
    if !table_ready(ui, &state.store.cluster_summary, "Cluster data") {
        return;
    }

    let mut selected = state.selected_cluster.clone();
    egui::ComboBox::from_id_salt("cluster_select")
        .selected_text(selected.clone().unwrap_or_else(|| "Select a cluster".to_string()))
        .width(280.0)
        .show_ui(ui, |ui| {
            for row in clusters_in_numeric_order(state.store.cluster_summary.rows()) {
                ui.selectable_value(
                    &mut selected,
                    Some(row.cluster_id.clone()),
                    format!("{} ({} cells)", row.cluster_id, row.total_cells),
                );
            }
        });
    state.selected_cluster = selected;

    let Some(cluster_id) = state.selected_cluster.clone() else {
        return;
    };
    ui.separator();

    let mut view_on_umap = false;
    match cluster_report(&state.store, &cluster_id) {
        Ok(report) => {
            ui.heading(&report.summary.cluster_id);
            major_target(ui, report.summary.dominant_domain);
            let code = domain_code(report.summary.dominant_domain);
            ui.label(format!("Percentage: {:.1}% project to {}", report.summary.percent, code));
            ui.label(format!("Total cells: {}", report.summary.total_cells));
            if !report.distribution.displayable().is_empty() {
                ui.add_space(6.0);
                ui.strong("Full Distribution:");
                distribution_bar(ui, &report.distribution);
            }
            ui.add_space(6.0);
            view_on_umap = ui.button("View on UMAP").clicked();
        }
        Err(err) => not_found(ui, &err),
    }
    if view_on_umap {
        view_cluster_on_umap(state);
    }
}

fn major_target(ui: &mut Ui, domain: DomainId) {
    match domain_info(domain) {
        Some(info) => ui.label(format!("major target: {} ({})", info.full_name, info.code)),
        None => ui.label(format!("major target: {}", domain_code(domain))),
    };
}

fn not_found(ui: &mut Ui, err: &DashboardError) {
    ui.heading("Not found");
    ui.label(err.to_string());
}

pub fn domain_clusters_tab(ui: &mut Ui, state: &mut AppState) {
    ui.heading("IPN Domain → Clusters");
    domain_combo(ui, "cluster_domain_select", &mut state.cluster_domain);
    let Some(domain) = state.cluster_domain else {
        return;
    };
    if !table_ready(ui, &state.store.cluster_summary, "Cluster data") {
        return;
    }
    ui.separator();
    if let Some(info) = domain_info(domain) {
        ui.heading(format!("{} ({})", info.full_name, info.code));
    }

    let matches = filter_by_domain(state.store.cluster_summary.rows(), domain);
    if matches.is_empty() {
        ui.label("No clusters have this as their major target.");
        return;
    }
    ui.strong(format!("Clusters ({}):", matches.len()));

    let mut clicked = None;
    egui::ScrollArea::vertical().show(ui, |ui| {
        for row in &matches {
            let text = format!("{}   {:.1}% - {} cells", row.cluster_id, row.percent, row.total_cells);
            if ui.selectable_label(false, text).clicked() {
                clicked = Some(row.cluster_id.clone());
            }
        }
    });
    if let Some(cluster_id) = clicked {
        state.selected_cluster = Some(cluster_id);
        view_cluster_on_umap(state);
    }
}

pub fn gene_lookup_tab(ctx: &egui::Context, ui: &mut Ui, state: &mut AppState) {
    ui.heading("Gene Lookup");

    let (response, action) = autocomplete_input(
        ui,
        "gene_search_input",
        &mut state.gene_query,
        &mut state.gene_autocomplete,
        state.store.gene_names.rows(),
        "Gene name, e.g. Pitx2",
    );
    match action {
        Some(InputAction::Selected(gene)) | Some(InputAction::Submitted(gene)) => {
            state.gene_result_key = Some(gene);
            state.gene_query_edited = None;
        }
        None if response.changed() => state.gene_query_edited = Some(Instant::now()),
        None => {}
    }

    if let Some(edited) = state.gene_query_edited {
        let waited = edited.elapsed();
        if waited >= state.config.gene_search_debounce {
            state.gene_query_edited = None;
            if state.gene_query.trim().chars().count() >= 2 {
                state.gene_result_key = Some(state.gene_query.trim().to_string());
            }
        } else {
            ctx.request_repaint_after(state.config.gene_search_debounce - waited);
        }
    }

    let Some(gene) = state.gene_result_key.clone() else {
        return;
    };
    ui.separator();
    if !table_ready(ui, &state.store.gene_summary, "Gene data") {
        return;
    }

    let mut view_on_umap = None;
    match gene_report(&state.store, &gene) {
        Ok(report) => {
            ui.heading(&report.summary.gene);
            major_target(ui, report.summary.dominant_domain);
            ui.label(format!("Percentage: {:.1}% of expressing cells", report.summary.percent));
            ui.label(format!("Expressing cells: {}", report.summary.total_expressing));
            if !report.distribution.displayable().is_empty() {
                ui.add_space(6.0);
                ui.strong("IPN Distribution:");
                distribution_bar(ui, &report.distribution);
            }
            ui.add_space(6.0);
            if ui.button("View on UMAP").clicked() {
                view_on_umap = Some(report.summary.gene.clone());
            }
        }
        Err(_) => {
            ui.heading("Gene not found");
            ui.label(format!("No data for \"{}\".", gene));
        }
    }
    if let Some(gene) = view_on_umap {
        view_gene_on_umap(state, &gene);
    }
}

pub fn domain_genes_tab(ui: &mut Ui, state: &mut AppState) {
    ui.heading("IPN Domain → Genes");
    domain_combo(ui, "gene_domain_select", &mut state.gene_domain);
    let Some(domain) = state.gene_domain else {
        return;
    };
    if !table_ready(ui, &state.store.gene_summary, "Gene data") {
        return;
    }
    ui.separator();
    if let Some(info) = domain_info(domain) {
        ui.heading(format!("{} ({})", info.full_name, info.code));
    }

    let top = top_by_domain(state.store.gene_summary.rows(), domain, state.config.top_genes_limit);
    if top.rows.is_empty() {
        ui.label("No genes have this as their major target.");
        return;
    }
    ui.strong(format!("Top genes ({} of {}):", top.rows.len(), top.total));

    let mut clicked = None;
    egui::ScrollArea::vertical().show(ui, |ui| {
        for row in &top.rows {
            let text = format!("{}   {:.1}% - {} cells", row.gene, row.percent, row.total_expressing);
            if ui.selectable_label(false, text).clicked() {
                clicked = Some(row.gene.clone());
            }
        }
    });
    if let Some(gene) = clicked {
        view_gene_on_umap(state, &gene);
    }
}

pub fn cluster_table_tab(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Cluster Table");
    if !table_ready(ui, &state.store.cluster_summary, "Cluster data") {
        return;
    }
    let rows = clusters_in_numeric_order(state.store.cluster_summary.rows());
    let mut clicked = None;

    TableBuilder::new(ui)
        .striped(true)
        .sense(Sense::click())
        .column(Column::auto().at_least(120.0))
        .columns(Column::auto().at_least(90.0), 3)
        .header(20.0, |mut header| {
            for title in ["Cluster", "Major target", "Percent", "Total cells"] {
                header.col(|ui| {
                    ui.strong(title);
                });
            }
        })
        .body(|body| {
            body.rows(18.0, rows.len(), |mut row| {
                let cluster = rows[row.index()];
                row.col(|ui| {
                    ui.label(&cluster.cluster_id);
                });
                row.col(|ui| {
                    ui.label(domain_code(cluster.dominant_domain));
                });
                row.col(|ui| {
                    ui.label(format!("{:.1}%", cluster.percent));
                });
                row.col(|ui| {
                    ui.label(cluster.total_cells.to_string());
                });
                if row.response().clicked() {
                    clicked = Some(cluster.cluster_id.clone());
                }
            });
        });

    if let Some(cluster_id) = clicked {
        state.selected_cluster = Some(cluster_id);
        state.selected_tab = Tab::ClusterLookup;
    }
}

pub fn gene_table_tab(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Gene Table");
    if !table_ready(ui, &state.store.gene_summary, "Gene data") {
        return;
    }

    ui.horizontal(|ui| {
        ui.label("Filter:");
        let edit = ui.add(
            egui::TextEdit::singleline(&mut state.gene_filter)
                .id_salt("gene_table_filter")
                .hint_text("substring of gene name"),
        );
        if edit.changed() {
            refresh_filtered_genes(state);
        }
        if ui.button("Export filtered…").clicked() {
            export_filtered_genes(state);
        }
    });

    let all = state.store.gene_summary.rows();
    let page = paginate(&state.filtered_genes, state.config.genes_per_page, state.gene_page);
    let (page_number, page_count) = (page.page_number, page.page_count);
    let mut clicked = None;

    ui.push_id("gene_table", |ui| {
        let height = ui.available_height() - 40.0;
        TableBuilder::new(ui)
            .striped(true)
            .sense(Sense::click())
            .max_scroll_height(height)
            .column(Column::auto().at_least(120.0))
            .columns(Column::auto().at_least(90.0), 3)
            .header(20.0, |mut header| {
                for title in ["Gene", "Major target", "Percent", "Expressing cells"] {
                    header.col(|ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|body| {
                body.rows(18.0, page.rows.len(), |mut row| {
                    let gene = &all[page.rows[row.index()]];
                    row.col(|ui| {
                        ui.label(&gene.gene);
                    });
                    row.col(|ui| {
                        ui.label(domain_code(gene.dominant_domain));
                    });
                    row.col(|ui| {
                        ui.label(format!("{:.1}%", gene.percent));
                    });
                    row.col(|ui| {
                        ui.label(gene.total_expressing.to_string());
                    });
                    if row.response().clicked() {
                        clicked = Some(gene.gene.clone());
                    }
                });
            });
    });

    ui.horizontal(|ui| {
        if ui.add_enabled(page_number > 1, egui::Button::new("◀ Prev")).clicked() {
            state.gene_page = page_number - 1;
        }
        ui.label(format!("Page {} of {}", page_number, page_count));
        if ui.add_enabled(page_number < page_count, egui::Button::new("Next ▶")).clicked() {
            state.gene_page = page_number + 1;
        }
    });

    if let Some(gene) = clicked {
        view_gene_on_umap(state, &gene);
    }
}

fn export_filtered_genes(state: &mut AppState) {
    let Some(path) = FileDialog::new()
        .add_filter("CSV", &["csv"])
        .set_file_name("genes_filtered.csv")
        .save_file()
    else {
        return;
    };
    let all = state.store.gene_summary.rows();
    let rows: Vec<_> = state.filtered_genes.iter().map(|&i| &all[i]).collect();
    state.status_message = Some(match write_gene_summary_csv(&rows, &path) {
        Ok(()) => format!("Saved {} genes to {}", rows.len(), path.display()),
        Err(e) => {
            warn!("{}", e);
            e.to_string()
        }
    });
}

pub fn umap_tab(ui: &mut Ui, state: &mut AppState) {
    ui.heading("UMAP");
    if !table_ready(ui, &state.store.coordinates, "UMAP data") {
        return;
    }

    ui.horizontal(|ui| {
        ui.label("Color by:");
        let before = state.umap_mode;
        egui::ComboBox::from_id_salt("umap_color_select")
            .selected_text(match state.umap_mode {
                UmapColorMode::Cluster => "Cluster",
                UmapColorMode::Domain => "IPN domain",
                UmapColorMode::Gene => "Gene expression",
            })
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut state.umap_mode, UmapColorMode::Cluster, "Cluster");
                ui.selectable_value(&mut state.umap_mode, UmapColorMode::Domain, "IPN domain");
                ui.selectable_value(&mut state.umap_mode, UmapColorMode::Gene, "Gene expression");
            });
        if before != state.umap_mode {
            state.umap_dirty = true;
        }

        if ui.button("Export plot data…").clicked() {
            export_umap_series(state);
        }
    });

    if state.umap_mode == UmapColorMode::Gene {
        ui.horizontal(|ui| {
            ui.label("Gene:");
            let (_, action) = autocomplete_input(
                ui,
                "umap_gene_input",
                &mut state.umap_gene,
                &mut state.umap_autocomplete,
                state.store.gene_names.rows(),
                "Type a gene and press Enter",
            );
            if let Some(InputAction::Selected(gene) | InputAction::Submitted(gene)) = action {
                request_gene_expression(state, &gene);
            }
        });
        if let Some(message) = &state.umap_message {
            ui.colored_label(Color32::GRAY, message);
        }
    }

    if state.umap_dirty {
        rebuild_umap(state);
    }
    if state.umap_series.is_empty() {
        if state.umap_mode == UmapColorMode::Gene && state.umap_message.is_none() {
            ui.label("Choose a gene to color cells by expression.");
        }
        return;
    }

    let title = match (&state.umap_mode, &state.expression) {
        (UmapColorMode::Gene, Some((gene, _))) => format!("Gene Expression: {}", gene),
        _ => String::new(),
    };
    if !title.is_empty() {
        ui.strong(title);
    }
    if let Some(range) = state.umap_range {
        expression_legend(ui, range);
    }

    let series: &[ScatterSeries] = &state.umap_series;
    Plot::new("umap_plot")
        .legend(Legend::default())
        .data_aspect(1.0)
        .x_axis_label("UMAP_1")
        .y_axis_label("UMAP_2")
        .label_formatter(|_name, value| {
            scatter::nearest_label(series, value.x, value.y)
                .map(str::to_string)
                .unwrap_or_default()
        })
        .show(ui, |plot_ui| {
            for s in series {
                let name = if s.in_legend { s.name.clone() } else { String::new() };
                plot_ui.points(
                    Points::new(s.points.clone())
                        .name(name)
                        .color(color(s.color))
                        .radius(2.0),
                );
            }
        });
}

fn export_umap_series(state: &mut AppState) {
    let Some(path) = FileDialog::new()
        .add_filter("JSON", &["json"])
        .set_file_name("umap_plot.json")
        .save_file()
    else {
        return;
    };
    state.status_message = Some(match scatter::export_series_json(&state.umap_series, &path) {
        Ok(()) => format!("Saved plot data to {}", path.display()),
        Err(e) => {
            warn!("{}", e);
            e.to_string()
        }
    });
}

pub fn downloads_tab(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Downloads");
    ui.label("Save a copy of the raw data files.");
    ui.add_space(6.0);

    for source in TableSource::ALL {
        ui.horizontal(|ui| {
            let available = !matches!(state.store.status(source), LoadStatus::Unavailable(_));
            if ui.add_enabled(available, egui::Button::new(source.file_name())).clicked() {
                state.status_message = Some(save_copy(&source.path_in(&state.config.data_dir), source.file_name()));
            }
            if !available {
                ui.colored_label(Color32::GRAY, "not available");
            }
        });
    }
}

fn save_copy(from: &Path, file_name: &str) -> String {
    let Some(to) = FileDialog::new().set_file_name(file_name).save_file() else {
        return "Download cancelled".to_string();
    };
    match std::fs::copy(from, &to) {
        Ok(bytes) => {
            info!("copied {} ({} bytes) to {}", from.display(), bytes, to.display());
            format!("Saved {}", to.display())
        }
        Err(e) => {
            let err = DashboardError::unavailable(from, e);
            warn!("{}", err);
            err.to_string()
        }
    }
}

pub fn status_bar(ui: &mut Ui, state: &AppState) {
    ui.horizontal(|ui| {
        for source in TableSource::ALL {
            let (mark, tint) = match state.store.status(source) {
                LoadStatus::Loading => ("…", Color32::GRAY),
                LoadStatus::Loaded => ("✔", Color32::from_rgb(0x6E, 0xB8, 0x59)),
                LoadStatus::Unavailable(_) => ("✖", Color32::from_rgb(0xC1, 0x51, 0x4A)),
            };
            ui.colored_label(tint, format!("{} {}", mark, source.file_name()));
        }
        if let Some(message) = &state.status_message {
            ui.separator();
            ui.label(message);
        }
    });
}

pub fn repaint_interval(state: &AppState) -> Option<Duration> {
    is_busy(state).then(|| Duration::from_millis(100))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{Coordinate, GeneExpression};
    use crate::store::{LoadedTable, TableStore};

    fn state_with_genes(names: &[&str]) -> AppState {
        let mut store = TableStore::default();
        store.apply(LoadedTable::GeneSummary(Table::loaded(
            names
                .iter()
                .map(|name| GeneSummary {
                    gene: name.to_string(),
                    dominant_domain: 1,
                    percent: 10.0,
                    total_expressing: 3,
                })
                .collect(),
        )));
        AppState::new(Config::default(), store)
    }

    #[test]
    fn filtered_genes_index_into_summary_table() {
        let mut state = state_with_genes(&["Shha", "Pitx2", "SHH2"]);
        state.gene_page = 4;
        state.gene_filter = "shh".to_string();
        refresh_filtered_genes(&mut state);
        assert_eq!(state.filtered_genes, vec![0, 2]);
        assert_eq!(state.gene_page, 1);

        state.gene_filter.clear();
        refresh_filtered_genes(&mut state);
        assert_eq!(state.filtered_genes, vec![0, 1, 2]);
    }

    #[test]
    fn expression_responses_apply_in_arrival_order() {
        let mut state = state_with_genes(&[]);
        state.expression_requests.push(Promise::from_ready(ExpressionResponse {
            gene: "Pitx2".into(),
            result: Ok(Vec::new()),
        }));
        state.expression_requests.push(Promise::from_ready(ExpressionResponse {
            gene: "Otx2".into(),
            result: Ok(Vec::new()),
        }));
        assert!(poll_background(&mut state));
        assert_eq!(state.expression.as_ref().map(|(g, _)| g.as_str()), Some("Otx2"));
        assert!(state.expression_requests.is_empty());
    }

    #[test]
    fn gene_mode_keeps_the_colour_scale() {
        let mut state = state_with_genes(&["Shha"]);
        let cells: Vec<Coordinate> = ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, id)| Coordinate {
                observation_id: id.to_string(),
                x: i as f64,
                y: 0.0,
                cluster_id: "Cluster 1".into(),
                domain: 1,
            })
            .collect();
        state.store.apply(LoadedTable::Coordinates(Table::loaded(cells)));
        let expression = vec![
            GeneExpression { observation_id: "a".into(), expression: 3.0 },
            GeneExpression { observation_id: "b".into(), expression: 1.5 },
        ];
        let (_, expected) = scatter::by_expression(state.store.coordinates.rows(), &expression);
        state.expression = Some(("Shha".into(), expression));

        state.umap_mode = UmapColorMode::Gene;
        rebuild_umap(&mut state);
        assert_eq!(state.umap_range, Some(expected));
        assert_eq!(state.umap_range, Some(ExpressionRange { min: 0.0, max: 3.0 }));

        state.umap_mode = UmapColorMode::Domain;
        rebuild_umap(&mut state);
        assert_eq!(state.umap_range, None);
    }

    #[test]
    fn failed_expression_shows_message() {
        let mut state = state_with_genes(&[]);
        state.expression_requests.push(Promise::from_ready(ExpressionResponse {
            gene: "Nope".into(),
            result: Err("missing".into()),
        }));
        poll_background(&mut state);
        assert!(state.expression.is_none());
        assert!(state.umap_message.as_deref().unwrap().contains("Nope"));
        assert!(state.umap_dirty);
    }
}
