//! Interface de terminal do `nfe-sefaz`: spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner de progresso e `console` para
//! estilização com cores. O [`OuvinteConsole`] acompanha no terminal as
//! tarefas executadas pelo [`Sefaz`](nfe_sefaz::Sefaz).

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use nfe_sefaz::task::{Desfecho, Resposta, Tarefa};
use nfe_sefaz::{Ouvinte, SefazError};
use serde::Serialize;

/// Indicador visual de progresso de uma requisição à SEFAZ.
///
/// Exibe um spinner animado enquanto a requisição está em curso e mensagens
/// coloridas para desfechos finais (verde), rejeições (vermelho) e
/// respostas ainda pendentes (amarelo).
pub struct Progresso {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl Progresso {
    pub fn start(descricao: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(descricao.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner e exibe a resposta interpretada.
    pub fn concluir(&self, resposta: &Resposta) {
        self.pb.finish_and_clear();
        let desfecho = resposta.desfecho();
        let (estilo, marca) = match desfecho {
            d if d.is_final() => (&self.green, "✓"),
            Desfecho::Recebido | Desfecho::Processado | Desfecho::Paralisado => (&self.yellow, "…"),
            _ => (&self.red, "✗"),
        };
        println!("  {} {}", estilo.apply_to(marca), resumo(resposta));
    }

    pub fn falhar(&self, erro: &SefazError) {
        self.pb.finish_and_clear();
        println!("  {} {erro}", self.red.apply_to("✗"));
    }
}

/// Linha de texto com o desfecho, o código e os identificadores da resposta.
pub fn resumo(resposta: &Resposta) -> String {
    let retorno = resposta.retorno();
    let mut linha = format!(
        "{} [{}] {}",
        resposta.desfecho(),
        retorno.status(),
        retorno.motivo()
    );
    match resposta {
        Resposta::Protocolo(protocolo) => {
            if let Some(numero) = &protocolo.numero {
                linha.push_str(&format!(" (protocolo {numero})"));
            }
        }
        Resposta::Recibo(recibo) => {
            linha.push_str(&format!(" (recibo {})", recibo.numero));
            if let Some(tempo) = recibo.tempo_medio {
                linha.push_str(&format!(", tempo médio {tempo}s"));
            }
        }
        Resposta::Evento(evento) => {
            if let Some(numero) = &evento.informacao.numero {
                linha.push_str(&format!(" (protocolo do evento {numero})"));
            }
        }
        Resposta::Inutilizacao(inutilizacao) => {
            if let Some(numero) = &inutilizacao.numero {
                linha.push_str(&format!(" (protocolo {numero})"));
            }
        }
        Resposta::Situacao(_) | Resposta::Autorizacao(_) => {}
    }
    linha
}

/// Imprime qualquer valor serializável em JSON indentado.
pub fn imprimir_json(valor: &impl Serialize) {
    println!("{}", serde_json::to_string_pretty(valor).unwrap_or_default());
}

/// Ouvinte que mostra no terminal o resultado de cada tarefa.
///
/// Os callbacks de nota ficam com o comportamento padrão de log.
pub struct OuvinteConsole {
    progresso: Progresso,
    json: bool,
}

impl OuvinteConsole {
    pub fn new(descricao: &str, json: bool) -> Self {
        Self {
            progresso: Progresso::start(descricao),
            json,
        }
    }
}

impl Ouvinte for OuvinteConsole {
    fn on_tarefa_executada(&mut self, _tarefa: &Tarefa, resposta: &Resposta) {
        if self.json {
            self.progresso.pb.finish_and_clear();
            imprimir_json(resposta);
        } else {
            self.progresso.concluir(resposta);
        }
    }

    fn on_tarefa_erro(&mut self, tarefa: &Tarefa, erro: &SefazError) {
        tracing::debug!(tarefa = %tarefa.id, %erro, "tarefa com erro");
        self.progresso.falhar(erro);
    }
}
