mod cli;
mod ui;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Command};
use nfe_sefaz::assinador::SemAssinatura;
use nfe_sefaz::banco::BancoEstatico;
use nfe_sefaz::task::{Acao, Agente, Inutilizacao, Recibo, Servicos, Situacao, Tarefa};
use nfe_sefaz::transporte::HttpTransporte;
use nfe_sefaz::{Configuracao, Gerador, Modelo, Nota, Sefaz, SefazError};
use tracing_subscriber::EnvFilter;

/// A linha de comando só consulta; nunca gera notas.
struct SemGerador;

impl Gerador for SemGerador {
    fn gerar(&self, nota: &Nota) -> Result<String, SefazError> {
        Err(SefazError::Tarefa(format!(
            "geração do XML da nota \"{}\" indisponível pela linha de comando",
            nota.id
        )))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let nivel = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(nivel)))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Configuracao::load_from(path)
            .with_context(|| format!("falha ao ler {}", path.display()))?,
        None => Configuracao::load()?,
    };
    if let Some(ambiente) = cli.ambiente {
        config.ambiente = ambiente.into();
    }

    match cli.command {
        Command::Consulta { chave } => {
            let codigo = chave
                .get(20..22)
                .with_context(|| format!("chave de acesso \"{chave}\" incompleta"))?;
            let mut situacao = Situacao::new(&chave, Modelo::from_codigo(codigo)?);
            situacao.retorno.status.ambiente = config.ambiente;
            let tarefa = Tarefa::new(Acao::Consultar).com_agente(Agente::Situacao(situacao));
            consultar(config, tarefa, &format!("Consultando a nota {chave}"), cli.json).await?;
        }
        Command::Recibo { numero, modelo } => {
            let mut recibo = Recibo::new(&numero, modelo.into());
            recibo.retorno.status.ambiente = config.ambiente;
            let tarefa = Tarefa::new(Acao::Consultar).com_agente(Agente::Recibo(recibo));
            consultar(config, tarefa, &format!("Consultando o recibo {numero}"), cli.json).await?;
        }
        Command::IdInutilizacao {
            uf,
            ano,
            cnpj,
            modelo,
            serie,
            inicio,
            fim,
        } => {
            let mut inutilizacao = Inutilizacao {
                ano,
                cnpj,
                modelo: modelo.into(),
                serie,
                inicio,
                fim,
                ..Default::default()
            };
            inutilizacao.retorno.status.set_uf(&uf)?;
            let id = inutilizacao.get_id()?;
            let digito = inutilizacao.digito()?;
            if cli.json {
                ui::imprimir_json(&serde_json::json!({ "id": id, "digito": digito }));
            } else {
                println!("{id} (dígito {digito})");
            }
        }
        Command::Servicos => {
            let entradas: Vec<_> = config
                .servicos
                .iter()
                .filter(|e| e.ambiente == config.ambiente)
                .collect();
            if cli.json {
                ui::imprimir_json(&entradas);
            } else if entradas.is_empty() {
                println!("Nenhum serviço configurado para {}", config.ambiente);
            } else {
                for e in entradas {
                    println!(
                        "{:<12} {:<2} {:<5} {:<13} {}",
                        e.emissao.to_string(),
                        e.uf,
                        e.modelo.to_string(),
                        e.servico.to_string(),
                        e.url
                    );
                }
            }
        }
    }

    Ok(())
}

async fn consultar(config: Configuracao, tarefa: Tarefa, descricao: &str, json: bool) -> Result<()> {
    let transporte = HttpTransporte::new(&config)?;
    let banco = BancoEstatico::new(config.servicos.clone());
    let servicos = Servicos::new(config, transporte, Box::new(banco), Box::new(SemAssinatura));
    let mut sefaz = Sefaz::new(
        servicos,
        Box::new(SemGerador),
        Box::new(ui::OuvinteConsole::new(descricao, json)),
    );
    if sefaz.consulta(vec![tarefa]).await == 0 {
        bail!("consulta não concluída");
    }
    Ok(())
}
