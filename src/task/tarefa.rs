//! Unidade de trabalho adiada: consultar, inutilizar ou cancelar.
//!
//! O agente pode vir pronto de quem criou a tarefa ou ser montado a partir
//! da nota. Com nota presente, os campos de identificação do agente são
//! sempre copiados dela; sem nota, o agente é executado como está.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::envio::Servicos;
use super::evento::EventoRequest;
use super::inutilizacao::Inutilizacao;
use super::recibo::Recibo;
use super::resposta::Resposta;
use super::situacao::Situacao;
use crate::error::SefazError;
use crate::nota::{Modelo, Nota};
use crate::transporte::Transporte;
use crate::util;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Acao {
    Consultar,
    Inutilizar,
    Cancelar,
}

impl std::fmt::Display for Acao {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Acao::Consultar => write!(f, "consultar"),
            Acao::Inutilizar => write!(f, "inutilizar"),
            Acao::Cancelar => write!(f, "cancelar"),
        }
    }
}

/// Pedido que executa a ação da tarefa.
///
/// A marca da variante fica em `agente`, pois o evento já tem seu `tipo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "agente", rename_all = "lowercase")]
pub enum Agente {
    Inutilizacao(Inutilizacao),
    Evento(EventoRequest),
    Situacao(Situacao),
    Recibo(Recibo),
}

impl Agente {
    fn nome(&self) -> &'static str {
        match self {
            Agente::Inutilizacao(_) => "inutilizacao",
            Agente::Evento(_) => "evento",
            Agente::Situacao(_) => "situacao",
            Agente::Recibo(_) => "recibo",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tarefa {
    pub id: String,
    pub acao: Acao,
    pub nota: Option<Nota>,
    /// XML para arquivo: a nota assinada antes da execução, o documento do
    /// cancelamento ou da inutilização depois dela.
    pub documento: Option<String>,
    pub agente: Option<Agente>,
    pub resposta: Option<Resposta>,
}

impl Tarefa {
    pub fn new(acao: Acao) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            acao,
            nota: None,
            documento: None,
            agente: None,
            resposta: None,
        }
    }

    pub fn com_nota(mut self, nota: Nota) -> Self {
        self.nota = Some(nota);
        self
    }

    pub fn com_agente(mut self, agente: Agente) -> Self {
        self.agente = Some(agente);
        self
    }

    pub fn com_documento(mut self, documento: impl Into<String>) -> Self {
        self.documento = Some(documento.into());
        self
    }

    /// Executa a ação e guarda a resposta interpretada.
    pub async fn executa(&mut self, sv: &Servicos<impl Transporte>) -> Result<&Resposta, SefazError> {
        if self.id.trim().is_empty() {
            return Err(SefazError::Tarefa("tarefa sem identificador".into()));
        }
        debug!(tarefa = %self.id, acao = %self.acao, "executando tarefa");
        let resposta = match self.acao {
            Acao::Consultar => self.consulta(sv).await?,
            Acao::Inutilizar => self.inutiliza(sv).await?,
            Acao::Cancelar => self.cancela(sv).await?,
        };
        Ok(self.resposta.insert(resposta))
    }

    fn sem_nota(&self) -> SefazError {
        SefazError::Tarefa(format!(
            "a tarefa \"{}\" de {} não possui nota nem agente",
            self.id, self.acao
        ))
    }

    fn agente_invalido(&self, agente: &Agente) -> SefazError {
        SefazError::Tarefa(format!(
            "o agente \"{}\" não serve para a tarefa \"{}\" de {}",
            agente.nome(),
            self.id,
            self.acao
        ))
    }

    async fn consulta(&mut self, sv: &Servicos<impl Transporte>) -> Result<Resposta, SefazError> {
        let (agente, resultado) = match self.agente.take() {
            None => {
                let Some(nota) = &self.nota else {
                    return Err(self.sem_nota());
                };
                let situacao = Situacao::new(&nota.id, nota.modelo);
                let resultado = situacao.envia(sv, self.nota.as_mut()).await;
                (Agente::Situacao(situacao), resultado)
            }
            Some(Agente::Situacao(situacao)) => {
                let resultado = situacao.envia(sv, self.nota.as_mut()).await;
                (Agente::Situacao(situacao), resultado)
            }
            Some(Agente::Recibo(recibo)) => {
                let resultado = recibo.consulta(sv, self.nota.as_mut()).await;
                (Agente::Recibo(recibo), resultado)
            }
            Some(outro) => {
                let err = self.agente_invalido(&outro);
                self.agente = Some(outro);
                return Err(err);
            }
        };
        self.agente = Some(agente);
        let resposta = resultado?;
        if let Resposta::Evento(evento) = &resposta
            && evento.documento.is_some()
        {
            self.documento = evento.documento.clone();
        }
        Ok(resposta)
    }

    async fn inutiliza(&mut self, sv: &Servicos<impl Transporte>) -> Result<Resposta, SefazError> {
        let mut inutilizacao = match self.agente.take() {
            None if self.nota.is_none() => return Err(self.sem_nota()),
            None => Inutilizacao::default(),
            Some(Agente::Inutilizacao(inutilizacao)) => inutilizacao,
            Some(outro) => {
                let err = self.agente_invalido(&outro);
                self.agente = Some(outro);
                return Err(err);
            }
        };
        if let Some(nota) = &self.nota {
            inutilizacao.retorno.status.ambiente = nota.ambiente;
            inutilizacao.retorno.status.set_uf(&nota.uf)?;
            inutilizacao.ano = u16::try_from(util::agora().year()).unwrap_or_default();
            inutilizacao.cnpj = nota.cnpj.clone();
            inutilizacao.modelo = nota.modelo;
            inutilizacao.serie = nota.serie;
            inutilizacao.inicio = nota.numero;
            inutilizacao.fim = nota.numero;
            if let Some(justificativa) = &nota.justificativa {
                inutilizacao.justificativa = justificativa.clone();
            }
        }

        let resultado = inutilizacao.envia(sv).await;
        self.agente = Some(Agente::Inutilizacao(inutilizacao));
        let (registrada, documento) = resultado?;
        self.documento = Some(documento);
        Ok(Resposta::Inutilizacao(registrada))
    }

    async fn cancela(&mut self, sv: &Servicos<impl Transporte>) -> Result<Resposta, SefazError> {
        if let Some(nota) = &self.nota
            && nota.protocolo.is_none()
            && nota.modelo != Modelo::Cfe
        {
            return Err(SefazError::Tarefa(format!(
                "a nota \"{}\" não possui protocolo de autorização para ser cancelada",
                nota.id
            )));
        }
        let mut evento = match self.agente.take() {
            None => {
                let Some(nota) = &self.nota else {
                    return Err(self.sem_nota());
                };
                EventoRequest::cancelamento(nota)
            }
            Some(Agente::Evento(evento)) => evento,
            Some(outro) => {
                let err = self.agente_invalido(&outro);
                self.agente = Some(outro);
                return Err(err);
            }
        };
        if let Some(nota) = &self.nota {
            evento.copiar_nota(nota);
        }

        let resultado = evento.envia(sv).await;
        self.agente = Some(Agente::Evento(evento));
        let resultado = resultado?;
        if resultado.documento.is_some() {
            self.documento = resultado.documento.clone();
        }
        Ok(Resposta::Evento(resultado))
    }
}
