//! Classificação das respostas pelo código `cStat`.
//!
//! As listas de [`codigos`] são disjuntas: para qualquer código no máximo um
//! dos predicados `is_*` de [`Retorno`] é verdadeiro. Um código fora de todas
//! as listas resulta em [`Desfecho::Rejeitado`].

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::status::Status;
use crate::error::SefazError;
use crate::util;
use crate::xml::Elemento;

pub mod codigos {
    pub const AUTORIZADO: &[&str] = &["100", "150"];
    pub const CANCELADO: &[&str] = &["101", "151"];
    pub const PROCESSADO: &[&str] = &["104"];
    pub const RECEBIDO: &[&str] = &["103", "105"];
    pub const DENEGADA: &[&str] = &["110", "301", "302", "303"];
    pub const INEXISTENTE: &[&str] = &["217"];
    pub const PARALISADO: &[&str] = &["108", "109"];
    /// Evento de cancelamento registrado.
    pub const EVENTO_CANCELADO: &[&str] = &["135", "155"];
    /// Lote de eventos processado.
    pub const EVENTO_PROCESSADO: &[&str] = &["128"];
    pub const INUTILIZADO: &[&str] = &["102", "563"];
}

/// Categoria de uma resposta, na ordem em que o despacho as avalia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Desfecho {
    Autorizado,
    Denegado,
    Cancelado,
    /// Lote recebido, resultado ainda pendente.
    Recebido,
    /// Lote processado; o resultado está no protocolo aninhado.
    Processado,
    Inexistente,
    Paralisado,
    Inutilizado,
    Rejeitado,
}

impl Desfecho {
    /// Desfechos que encerram a vida do documento na SEFAZ.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Desfecho::Autorizado | Desfecho::Denegado | Desfecho::Cancelado | Desfecho::Inutilizado
        )
    }
}

impl fmt::Display for Desfecho {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nome = match self {
            Desfecho::Autorizado => "AUTORIZADO",
            Desfecho::Denegado => "DENEGADO",
            Desfecho::Cancelado => "CANCELADO",
            Desfecho::Recebido => "RECEBIDO",
            Desfecho::Processado => "PROCESSADO",
            Desfecho::Inexistente => "INEXISTENTE",
            Desfecho::Paralisado => "PARALISADO",
            Desfecho::Inutilizado => "INUTILIZADO",
            Desfecho::Rejeitado => "REJEITADO",
        };
        write!(f, "{nome}")
    }
}

/// [`Status`] acrescido da data de recebimento.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retorno {
    #[serde(flatten)]
    pub status: Status,
    pub data_recebimento: Option<DateTime<FixedOffset>>,
}

impl From<Status> for Retorno {
    fn from(status: Status) -> Self {
        Self {
            status,
            data_recebimento: None,
        }
    }
}

impl Retorno {
    pub fn status(&self) -> &str {
        self.status.status()
    }

    pub fn motivo(&self) -> &str {
        self.status.motivo()
    }

    fn em(&self, lista: &[&str]) -> bool {
        lista.contains(&self.status())
    }

    pub fn is_autorizado(&self) -> bool {
        self.em(codigos::AUTORIZADO)
    }

    pub fn is_cancelado(&self) -> bool {
        self.em(codigos::CANCELADO)
    }

    pub fn is_processado(&self) -> bool {
        self.em(codigos::PROCESSADO)
    }

    pub fn is_recebido(&self) -> bool {
        self.em(codigos::RECEBIDO)
    }

    pub fn is_denegada(&self) -> bool {
        self.em(codigos::DENEGADA)
    }

    pub fn is_inexistente(&self) -> bool {
        self.em(codigos::INEXISTENTE)
    }

    pub fn is_paralisado(&self) -> bool {
        self.em(codigos::PARALISADO)
    }

    pub fn desfecho(&self) -> Desfecho {
        if self.is_denegada() {
            Desfecho::Denegado
        } else if self.is_cancelado() {
            Desfecho::Cancelado
        } else if self.is_autorizado() {
            Desfecho::Autorizado
        } else if self.is_recebido() {
            Desfecho::Recebido
        } else if self.is_processado() {
            Desfecho::Processado
        } else if self.is_paralisado() {
            Desfecho::Paralisado
        } else if self.is_inexistente() {
            Desfecho::Inexistente
        } else {
            Desfecho::Rejeitado
        }
    }

    /// Erro de rejeição com o código e o motivo desta resposta.
    pub fn rejeicao(&self) -> SefazError {
        SefazError::Rejeicao {
            status: self.status().to_string(),
            motivo: self.motivo().to_string(),
        }
    }

    pub fn load_node(&mut self, elemento: &Elemento) -> Result<(), SefazError> {
        self.status.load_node(elemento)?;
        self.data_recebimento = elemento.valor("dhRecbto").map(util::parse_data).transpose()?;
        Ok(())
    }

    pub fn get_node(&self, nome: &str) -> Elemento {
        self.status
            .get_node(nome)
            .folha_opcional("dhRecbto", self.data_recebimento.as_ref().map(util::formatar_data))
    }
}
