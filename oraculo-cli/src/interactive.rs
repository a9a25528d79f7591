use std::io::{self, Write};

use anyhow::{Context, Result};

use crate::display;
use crate::Session;

#[derive(Debug, PartialEq)]
enum InteractiveCommand {
    Generate,
    Submit,
    Show,
    Stats,
    History,
    Hits,
    Rects,
    Entropy,
    Voice,
    Quit,
}

fn parse_command(input: &str) -> Option<InteractiveCommand> {
    match input.trim().to_lowercase().as_str() {
        "1" | "gerar" | "generate" | "gen" => Some(InteractiveCommand::Generate),
        "2" | "enviar" | "submit" => Some(InteractiveCommand::Submit),
        "3" | "mostrar" | "show" => Some(InteractiveCommand::Show),
        "4" | "estatisticas" | "estatísticas" | "stats" => Some(InteractiveCommand::Stats),
        "5" | "historico" | "histórico" | "history" | "hist" => Some(InteractiveCommand::History),
        "6" | "acertos" | "hits" => Some(InteractiveCommand::Hits),
        "7" | "retificacoes" | "retificações" | "rects" => Some(InteractiveCommand::Rects),
        "8" | "entropia" | "entropy" => Some(InteractiveCommand::Entropy),
        "9" | "voz" | "voice" => Some(InteractiveCommand::Voice),
        "0" | "sair" | "quit" | "q" | "exit" => Some(InteractiveCommand::Quit),
        _ => None,
    }
}

fn display_menu() {
    println!();
    println!("── Modo interativo ──");
    println!("  1. gerar         Gerar a matriz prevista");
    println!("  2. enviar        Enviar o resultado real");
    println!("  3. mostrar       Última matriz");
    println!("  4. estatisticas  Frequências");
    println!("  5. historico     Histórico de entradas");
    println!("  6. acertos       Registro de acertos");
    println!("  7. retificacoes  Registro de retificações");
    println!("  8. entropia      Ajustar a entropia");
    println!("  9. voz           Ativar/desativar a voz");
    println!("  0. sair          Sair");
    println!();
}

fn prompt(msg: &str) -> Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut input = String::new();
    let read = io::stdin()
        .read_line(&mut input)
        .context("Erro de leitura")?;
    if read == 0 {
        anyhow::bail!("Fim da entrada");
    }
    Ok(input.trim().to_string())
}

fn prompt_with_default(msg: &str, default: &str) -> Result<String> {
    let input = prompt(&format!("{} [{}] : ", msg, default))?;
    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input)
    }
}

fn cmd_generate_interactive(session: &mut Session) -> Result<()> {
    let seed_str = prompt_with_default("Seed (vazio = aleatório)", "")?;
    let seed: Option<u64> = if seed_str.is_empty() {
        None
    } else {
        Some(seed_str.parse().context("Seed inválida")?)
    };
    super::cmd_generate(session, seed, 4500)
}

fn cmd_submit_interactive(session: &mut Session) -> Result<()> {
    let input = prompt("Resultado real (7 valores separados por espaços, \"-\" para vazio) : ")?;
    let values: Vec<String> = input.split_whitespace().map(str::to_string).collect();
    super::cmd_submit(session, &values)
}

fn cmd_history_interactive(session: &Session) -> Result<()> {
    let n_str = prompt_with_default("Número de conjuntos", "10")?;
    let n: usize = n_str.parse().context("Número inválido")?;
    display::display_history(&session.state.history, n);
    Ok(())
}

fn cmd_entropy_interactive(session: &mut Session) -> Result<()> {
    let current = format!("{:.0}", session.state.settings.entropy.value() * 100.0);
    let pct_str = prompt_with_default("Entropia (0-100%)", &current)?;
    let pct: f64 = pct_str.parse().context("Valor inválido")?;
    super::cmd_entropy(session, pct / 100.0)
}

pub fn run_interactive(session: &mut Session) -> Result<()> {
    println!("Bem-vindo ao modo interativo do Oráculo !");

    loop {
        display_menu();
        let input = match prompt("> ") {
            Ok(s) => s,
            Err(_) => break,
        };

        if input.is_empty() {
            continue;
        }

        if let Err(e) = session.reload() {
            println!("Erro: {e:#}");
            continue;
        }

        let result = match parse_command(&input) {
            Some(InteractiveCommand::Quit) => {
                println!("Até logo !");
                break;
            }
            Some(InteractiveCommand::Generate) => cmd_generate_interactive(session),
            Some(InteractiveCommand::Submit) => cmd_submit_interactive(session),
            Some(InteractiveCommand::Show) => super::cmd_show(session),
            Some(InteractiveCommand::Stats) => super::cmd_stats(session),
            Some(InteractiveCommand::History) => cmd_history_interactive(session),
            Some(InteractiveCommand::Hits) => {
                display::display_hits(&session.state.hits);
                Ok(())
            }
            Some(InteractiveCommand::Rects) => {
                display::display_rectifications(&session.state.rectifications);
                Ok(())
            }
            Some(InteractiveCommand::Entropy) => cmd_entropy_interactive(session),
            Some(InteractiveCommand::Voice) => super::cmd_voice(session),
            None => {
                println!("Comando desconhecido : '{}'. Digite um número (0-9) ou um nome de comando.", input);
                Ok(())
            }
        };
        if let Err(e) = result {
            println!("Erro: {e:#}");
        }
    }

    Ok(())
}
