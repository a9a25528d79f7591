mod display;
mod import;
mod interactive;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use oraculo_db::db::{count_keys, db_path, migrate, open_db};
use oraculo_db::models::{now_millis, HitStatus, DATASET_LEN};
use oraculo_db::rusqlite::{Connection, TransactionBehavior};
use oraculo_engine::collapse::RngSource;
use oraculo_engine::config::{load_config, EngineConfig};
use oraculo_engine::state::AppState;
use oraculo_engine::voice::{self, announce, verdict_phrase};
use rand::rngs::StdRng;

use crate::display::ConsoleVoice;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogTarget {
    History,
    Hits,
    Rects,
}

#[derive(Parser)]
#[command(name = "oraculo", about = "Oráculo de milhares e centenas")]
struct Cli {
    /// Caminho da base (padrão : ./data/oraculo.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Arquivo JSON com os pesos do motor
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Gerar a matriz prevista
    Generate {
        /// Seed para reprodutibilidade
        #[arg(long)]
        seed: Option<u64>,

        /// Duração da animação de carregamento (ms)
        #[arg(long, default_value = "4500")]
        delay_ms: u64,
    },

    /// Enviar o resultado real (até 7 valores, "-" para vazio)
    Submit {
        values: Vec<String>,
    },

    /// Editar o módulo ONDA-REAL sem conciliar
    Live {
        values: Vec<String>,
    },

    /// Limpar o módulo ONDA-REAL
    ClearLive,

    /// Mostrar a última matriz, candidatos e previsões avançadas
    Show,

    /// Mostrar as frequências da última análise
    Stats,

    /// Listar o histórico de entradas
    History {
        /// Número de conjuntos a mostrar
        #[arg(short, long, default_value = "10")]
        last: usize,
    },

    /// Listar os acertos
    Hits,

    /// Listar as retificações
    Rects,

    /// Registrar um acerto manualmente
    MarkHit {
        #[arg(long)]
        value: String,
        /// Prêmio (1-7)
        #[arg(long)]
        position: u8,
        /// Quase acerto em vez de acerto exato
        #[arg(long)]
        near: bool,
    },

    /// Registrar uma retificação manualmente
    Rectify {
        #[arg(long)]
        generated: String,
        #[arg(long)]
        actual: String,
        /// Prêmio (1-7)
        #[arg(long)]
        position: u8,
    },

    /// Apagar uma entrada pelo índice
    Delete {
        target: LogTarget,
        index: usize,
    },

    /// Apagar todas as entradas
    Clear {
        target: LogTarget,
    },

    /// Ajustar a entropia (0-1)
    Entropy {
        value: f64,
    },

    /// Ativar/desativar a voz
    Voice,

    /// Importar o histórico de um arquivo CSV (7 valores por linha, ';')
    Import {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Mostrar o caminho da base de dados
    DbPath,

    /// Modo interativo (REPL)
    Interactive,
}

pub(crate) struct Session {
    pub conn: Connection,
    pub config: EngineConfig,
    pub state: AppState,
    pub voice: ConsoleVoice,
}

impl Session {
    /// Reloads the state, applies `f` and saves it inside one write
    /// transaction, so concurrent invocations never overwrite each other.
    pub fn mutate<T>(&mut self, f: impl FnOnce(&mut AppState) -> Result<T>) -> Result<T> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Falha ao iniciar a transação")?;
        let mut state = AppState::load(&*tx)?;
        let out = f(&mut state)?;
        state.save(&*tx)?;
        tx.commit().context("Falha ao gravar a transação")?;
        self.state = state;
        Ok(out)
    }

    pub fn reload(&mut self) -> Result<()> {
        self.state = AppState::load(&self.conn)?;
        Ok(())
    }

    /// Persists the generation lock. `false` when a result is already pending.
    pub fn reserve_generation(&mut self) -> Result<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Falha ao iniciar a transação")?;
        let reserved = AppState::reserve_generation(&*tx)?;
        tx.commit().context("Falha ao gravar a transação")?;
        if reserved {
            self.state.locked = true;
        }
        Ok(reserved)
    }

    pub fn speak(&mut self, text: &str) {
        announce(&mut self.voice, &self.state.settings, text);
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let path = cli.db.clone().unwrap_or_else(db_path);

    if let Command::DbPath = cli.command {
        return cmd_db_path(&path);
    }

    let conn = open_db(&path)?;
    migrate(&conn)?;
    let config = match &cli.config {
        Some(p) => load_config(p)?,
        None => EngineConfig::default(),
    };
    let state = AppState::load(&conn)?;
    let mut session = Session {
        conn,
        config,
        state,
        voice: ConsoleVoice,
    };

    match cli.command {
        Command::Generate { seed, delay_ms } => cmd_generate(&mut session, seed, delay_ms),
        Command::Submit { values } => cmd_submit(&mut session, &values),
        Command::Live { values } => cmd_live(&mut session, &values),
        Command::ClearLive => cmd_clear_live(&mut session),
        Command::Show => cmd_show(&session),
        Command::Stats => cmd_stats(&session),
        Command::History { last } => {
            display::display_history(&session.state.history, last);
            Ok(())
        }
        Command::Hits => {
            display::display_hits(&session.state.hits);
            Ok(())
        }
        Command::Rects => {
            display::display_rectifications(&session.state.rectifications);
            Ok(())
        }
        Command::MarkHit { value, position, near } => cmd_mark_hit(&mut session, &value, position, near),
        Command::Rectify { generated, actual, position } => cmd_rectify(&mut session, &generated, &actual, position),
        Command::Delete { target, index } => cmd_delete(&mut session, target, index),
        Command::Clear { target } => cmd_clear(&mut session, target),
        Command::Entropy { value } => cmd_entropy(&mut session, value),
        Command::Voice => cmd_voice(&mut session),
        Command::Import { file } => cmd_import(&mut session, &file),
        Command::DbPath => Ok(()),
        Command::Interactive => interactive::run_interactive(&mut session),
    }
}

/// Maps "-" to an empty slot.
pub(crate) fn parse_values(values: &[String]) -> Result<Vec<String>> {
    if values.len() > DATASET_LEN {
        bail!("Esperado no máximo {} valores. Recebido : {}", DATASET_LEN, values.len());
    }
    Ok(values
        .iter()
        .map(|v| if v == "-" { String::new() } else { v.trim().to_string() })
        .collect())
}

fn loading(delay_ms: u64) -> Result<()> {
    if delay_ms == 0 {
        return Ok(());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.yellow} {msg}")?);
    pb.set_message("ANALISANDO MATRIZ...");
    pb.enable_steady_tick(Duration::from_millis(120));
    std::thread::sleep(Duration::from_millis(delay_ms));
    pb.finish_and_clear();
    Ok(())
}

pub(crate) fn cmd_generate(session: &mut Session, seed: Option<u64>, delay_ms: u64) -> Result<()> {
    if !session.reserve_generation()? {
        println!("MATRIZ PREVISTA. Envie o resultado real (oraculo submit) antes de gerar outra.");
        return Ok(());
    }

    session.speak(voice::CYCLE_START);
    loading(delay_ms)?;

    let config = session.config.clone();
    let mut source = RngSource::<StdRng>::seeded(seed);
    let report = match session.mutate(|state| state.complete_generation(&config, &mut source)) {
        Ok(report) => report,
        Err(e) => {
            session.mutate(|state| {
                state.locked = false;
                Ok(())
            })?;
            return Err(e);
        }
    };

    display::display_module_errors(&report.module_errors);
    display::display_result(&report.outcome.result, true);
    display::display_candidates(&report.outcome.candidates);
    display::display_advanced(&report.outcome.advanced);

    session.speak(voice::CYCLE_DONE);
    Ok(())
}

pub(crate) fn cmd_submit(session: &mut Session, values: &[String]) -> Result<()> {
    let values = parse_values(values)?;
    let report = session.mutate(|state| Ok(state.submit_actuals(values, now_millis())))?;

    match &report.reconciliation {
        Some(rec) => {
            display::display_reconciliation(rec);
            let phrase = verdict_phrase(rec.verdict());
            session.speak(phrase);
        }
        None => println!("Nenhuma matriz gerada para comparar."),
    }
    if !report.history_appended {
        println!("⚠ Conjunto incompleto : não gravado no histórico.");
    }
    info!("{} conjuntos no histórico", session.state.history.len());
    Ok(())
}

fn cmd_live(session: &mut Session, values: &[String]) -> Result<()> {
    let values = parse_values(values)?;
    session.mutate(|state| {
        state.set_live_module(values);
        Ok(())
    })?;
    println!("Módulo ONDA-REAL atualizado.");
    Ok(())
}

fn cmd_clear_live(session: &mut Session) -> Result<()> {
    session.mutate(|state| {
        state.clear_live_module();
        Ok(())
    })?;
    session.speak(voice::MEMORY_CLEARED);
    Ok(())
}

pub(crate) fn cmd_show(session: &Session) -> Result<()> {
    let state = &session.state;
    let Some(result) = &state.last_result else {
        println!("Nenhuma matriz gerada. Lance : oraculo generate");
        return Ok(());
    };
    display::display_result(result, state.locked);
    if let Some(candidates) = &state.last_candidates {
        display::display_candidates(candidates);
    }
    if let Some(advanced) = &state.last_advanced {
        display::display_advanced(advanced);
    }
    println!();
    display::display_settings(&state.settings);
    Ok(())
}

pub(crate) fn cmd_stats(session: &Session) -> Result<()> {
    match &session.state.last_analysis {
        Some(analysis) => display::display_analysis(analysis),
        None => println!("Nenhuma análise disponível. Lance : oraculo generate"),
    }
    Ok(())
}

fn cmd_mark_hit(session: &mut Session, value: &str, position: u8, near: bool) -> Result<()> {
    let status = if near { HitStatus::Near } else { HitStatus::Exact };
    session.mutate(|state| state.mark_hit(value, position, status, now_millis()))?;
    println!("Acerto registrado : {} ({})", value, status);
    Ok(())
}

fn cmd_rectify(session: &mut Session, generated: &str, actual: &str, position: u8) -> Result<()> {
    session.mutate(|state| state.rectify(generated, actual, position, now_millis()))?;
    println!("Retificação registrada : {} → {}", generated, actual);
    Ok(())
}

fn cmd_delete(session: &mut Session, target: LogTarget, index: usize) -> Result<()> {
    session.mutate(|state| match target {
        LogTarget::History => state.delete_history(index),
        LogTarget::Hits => state.delete_hit(index),
        LogTarget::Rects => state.delete_rectification(index),
    })?;
    println!("Entrada {} apagada.", index);
    Ok(())
}

fn cmd_clear(session: &mut Session, target: LogTarget) -> Result<()> {
    session.mutate(|state| {
        match target {
            LogTarget::History => state.clear_history(),
            LogTarget::Hits => state.clear_hits(),
            LogTarget::Rects => state.clear_rectifications(),
        }
        Ok(())
    })?;
    println!("Registros apagados.");
    Ok(())
}

pub(crate) fn cmd_entropy(session: &mut Session, value: f64) -> Result<()> {
    session.mutate(|state| state.set_entropy(value))?;
    display::display_settings(&session.state.settings);
    Ok(())
}

pub(crate) fn cmd_voice(session: &mut Session) -> Result<()> {
    session.mutate(|state| Ok(state.toggle_voice()))?;
    display::display_settings(&session.state.settings);
    Ok(())
}

fn cmd_import(session: &mut Session, file: &Path) -> Result<()> {
    let result = session.mutate(|state| import::import_csv(&mut state.history, file))?;
    display::display_import_summary(&result);
    Ok(())
}

fn cmd_db_path(path: &Path) -> Result<()> {
    println!("{}", path.display());
    if path.exists() {
        let conn = open_db(path)?;
        migrate(&conn)?;
        println!("{} chaves gravadas", count_keys(&conn)?);
    }
    Ok(())
}
