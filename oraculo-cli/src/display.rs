use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use oraculo_db::models::{rank_label, DataSet, HitRecord, HitStatus, History, RectificationRecord, Settings};
use oraculo_engine::analysis::Analysis;
use oraculo_engine::cycle::{AdvancedPredictions, Candidate, Prediction};
use oraculo_engine::reconcile::Reconciliation;
use oraculo_engine::voice::Voice;

use crate::import::ImportResult;

/// Speech output rendered as a terminal line.
pub struct ConsoleVoice;

impl Voice for ConsoleVoice {
    fn speak(&mut self, text: &str) {
        println!("🔊 {text}");
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn format_timestamp(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn status_color(status: HitStatus) -> Color {
    match status {
        HitStatus::Exact => Color::Green,
        HitStatus::Near => Color::Yellow,
    }
}

pub fn display_module_errors(errors: &[String]) {
    for err in errors {
        println!("⚠ {err}");
    }
}

pub fn display_result(result: &DataSet, locked: bool) {
    let state = if locked { "Onda Estável" } else { "Aguardando" };
    println!("\n── MATRIZ MANIFESTADA ({state}) ──");
    let mut table = new_table(vec!["Prêmio", "Tipo", "Valor"]);
    for (i, row) in result.rows().iter().enumerate() {
        let label = rank_label(i as u8 + 1);
        let value = if i < 3 {
            Cell::new(row.to_string()).fg(Color::Yellow)
        } else {
            Cell::new(row.to_string())
        };
        table.add_row(vec![Cell::new(label), Cell::new(row.slot_type().to_string()), value]);
    }
    println!("{table}");
}

pub fn display_candidates(candidates: &[Candidate]) {
    println!("\n── Candidatos ──");
    let mut table = new_table(vec!["#", "Sequência", "Confiança"]);
    for (i, c) in candidates.iter().enumerate() {
        let seq: String = c.sequence.iter().map(|d| d.to_string()).collect();
        table.add_row(vec![
            &format!("{}", i + 1),
            &seq,
            &format!("{:.2}%", c.confidence),
        ]);
    }
    println!("{table}");
}

pub fn display_advanced(advanced: &AdvancedPredictions) {
    println!("\n── Previsões avançadas ──");
    let mut table = new_table(vec!["Grupo", "Valor", "Confiança"]);
    let groups: [(&str, &[Prediction]); 4] = [
        ("Centenas", &advanced.hundreds),
        ("Dezenas", &advanced.tens),
        ("Dezenas Elite", &advanced.elite_tens),
        ("Super Dezenas", &advanced.super_tens),
    ];
    for (name, predictions) in groups {
        for p in predictions {
            table.add_row(vec![name.to_string(), p.value.clone(), format!("{:.2}%", p.confidence)]);
        }
    }
    println!("{table}");
}

pub fn display_analysis(analysis: &Analysis) {
    println!("\n📊 Frequências\n");
    let mut table = new_table(vec!["Dígito", "Global", "Col 1", "Col 2", "Col 3", "Col 4", "1º Prêmio"]);
    for (digit, count) in analysis.global.ranked() {
        let mut row = vec![digit.to_string(), count.to_string()];
        row.extend(analysis.positional.iter().map(|t| t.count(digit).to_string()));
        row.push(analysis.first_rank.count(digit).to_string());
        table.add_row(row);
    }
    println!("{table}");

    let rows = analysis.row_sums.len();
    let mean = if rows > 0 {
        analysis.row_sums.iter().sum::<u32>() as f64 / rows as f64
    } else {
        0.0
    };
    println!("  Linhas analisadas : {rows}");
    println!("  Soma média        : {mean:.2}");
    println!("  Pares / Ímpares   : {} / {}", analysis.evens, analysis.odds);
}

pub fn display_history(history: &History, last: usize) {
    if history.is_empty() {
        println!("Histórico vazio.");
        return;
    }
    let mut header = vec!["#".to_string()];
    header.extend((1..=7u8).map(rank_label));
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);

    for (i, set) in history.sets().iter().take(last).enumerate() {
        let mut row = vec![i.to_string()];
        row.extend(set.rows().iter().map(|r| r.to_string()));
        table.add_row(row);
    }
    println!("{table}");
    println!("{} de {} conjuntos", last.min(history.len()), history.len());
}

pub fn display_hits(hits: &[HitRecord]) {
    if hits.is_empty() {
        println!("Nenhum acerto registrado.");
        return;
    }
    let mut table = new_table(vec!["#", "Data", "Valor", "Tipo", "Prêmio", "Status"]);
    for (i, h) in hits.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i),
            Cell::new(format_timestamp(h.timestamp)),
            Cell::new(&h.value),
            Cell::new(h.slot.to_string()),
            Cell::new(rank_label(h.position)),
            Cell::new(h.status.to_string()).fg(status_color(h.status)),
        ]);
    }
    println!("{table}");
}

pub fn display_rectifications(rects: &[RectificationRecord]) {
    if rects.is_empty() {
        println!("Nenhuma retificação registrada.");
        return;
    }
    let mut table = new_table(vec!["#", "Data", "Gerado", "Real", "Tipo", "Prêmio"]);
    for (i, r) in rects.iter().enumerate() {
        table.add_row(vec![
            i.to_string(),
            format_timestamp(r.timestamp),
            r.generated.clone(),
            r.actual.clone(),
            r.slot.to_string(),
            r.rank_label.clone(),
        ]);
    }
    println!("{table}");
}

pub fn display_reconciliation(rec: &Reconciliation) {
    println!("\n── Sincronia ──");
    if rec.hits.is_empty() {
        println!("Nenhum acerto neste lote.");
    } else {
        display_hits(&rec.hits);
    }
    println!("{} retificações registradas.", rec.rectifications.len());
}

pub fn display_settings(settings: &Settings) {
    println!("Entropia : {:.0}%", settings.entropy.value() * 100.0);
    println!("Voz      : {}", if settings.voice_enabled { "ativada" } else { "desativada" });
}

pub fn display_import_summary(result: &ImportResult) {
    println!("Importação concluída :");
    println!("  Linhas lidas   : {}", result.total_records);
    println!("  Importadas     : {}", result.imported);
    if result.errors > 0 {
        println!("  Erros          : {}", result.errors);
    }
}
