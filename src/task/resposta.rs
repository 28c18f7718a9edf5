use serde::{Deserialize, Serialize};

use super::evento::EventoResult;
use super::inutilizacao::Inutilizacao;
use super::protocolo::Protocolo;
use super::recibo::Recibo;
use super::retorno::{Desfecho, Retorno};
use super::situacao::Situacao;

/// Resposta interpretada de qualquer serviço, uma variante por tipo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tipo", rename_all = "lowercase")]
pub enum Resposta {
    Protocolo(Protocolo),
    Recibo(Recibo),
    Situacao(Situacao),
    Evento(EventoResult),
    Inutilizacao(Inutilizacao),
    /// Resposta da autorização sem protocolo nem recibo.
    Autorizacao(Retorno),
}

impl Resposta {
    /// Cabeçalho que decide o desfecho; para eventos, o do registro.
    pub fn retorno(&self) -> &Retorno {
        match self {
            Resposta::Protocolo(protocolo) => &protocolo.retorno,
            Resposta::Recibo(recibo) => &recibo.retorno,
            Resposta::Situacao(situacao) => &situacao.retorno,
            Resposta::Evento(evento) => &evento.informacao.retorno,
            Resposta::Inutilizacao(inutilizacao) => &inutilizacao.retorno,
            Resposta::Autorizacao(retorno) => retorno,
        }
    }

    pub fn desfecho(&self) -> Desfecho {
        match self {
            Resposta::Evento(evento) if evento.is_cancelado() => Desfecho::Cancelado,
            Resposta::Evento(_) => Desfecho::Rejeitado,
            Resposta::Inutilizacao(inutilizacao) if inutilizacao.is_inutilizado() => {
                Desfecho::Inutilizado
            }
            Resposta::Situacao(situacao) if situacao.is_cancelado() => Desfecho::Cancelado,
            outra => outra.retorno().desfecho(),
        }
    }
}
