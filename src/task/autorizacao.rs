use serde::{Deserialize, Serialize};
use tracing::warn;

use super::envio::{Envio, Servico, Servicos};
use super::protocolo::Protocolo;
use super::recibo::Recibo;
use super::resposta::Resposta;
use super::retorno::Retorno;
use crate::error::SefazError;
use crate::nota::{Nota, VERSAO};
use crate::transporte::Transporte;
use crate::xml::{self, NS_NFE};

/// Envio de uma nota assinada em um lote `enviNFe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Autorizacao {
    /// Identificador do lote (`idLote`).
    pub lote: u64,
    /// Pede processamento síncrono (`indSinc`).
    pub sincrono: bool,
}

impl Default for Autorizacao {
    fn default() -> Self {
        Self {
            lote: 1,
            sincrono: true,
        }
    }
}

impl Autorizacao {
    pub fn get_node(&self, assinado: &str) -> String {
        let conteudo = format!(
            "<idLote>{}</idLote><indSinc>{}</indSinc>{}",
            self.lote,
            u8::from(self.sincrono),
            xml::sem_declaracao(assinado)
        );
        xml::envolver("enviNFe", &[("xmlns", NS_NFE), ("versao", VERSAO)], &conteudo)
    }

    /// Envia a nota já assinada e validada.
    ///
    /// Lote processado devolve o [`Protocolo`] (anexado à nota quando
    /// autorizada), lote recebido devolve o [`Recibo`] para consulta
    /// posterior e serviço paralisado ativa o modo offline e falha como erro
    /// de rede. Qualquer outro código volta como [`Resposta::Autorizacao`].
    pub async fn envia(
        &self,
        sv: &Servicos<impl Transporte>,
        nota: &mut Nota,
        assinado: &str,
    ) -> Result<Resposta, SefazError> {
        let resposta = Envio::new(
            Servico::Autorizacao,
            nota.ambiente,
            nota.modelo,
            self.get_node(assinado),
        )
        .com_emissao(nota.emissao)
        .envia(sv)
        .await?;

        let mut retorno = Retorno::default();
        retorno.load_node(&resposta)?;
        if retorno.is_processado() {
            let protocolo = Protocolo::load_node(&resposta)?;
            if protocolo.retorno.is_autorizado() {
                nota.protocolo = Some(protocolo.clone());
            }
            return Ok(Resposta::Protocolo(protocolo));
        }
        if retorno.is_recebido() {
            return Ok(Resposta::Recibo(Recibo::load_node(&resposta, nota.modelo)?));
        }
        if retorno.is_paralisado() {
            sv.configuracao.set_offline(chrono::Utc::now().timestamp());
            warn!(status = retorno.status(), motivo = retorno.motivo(), "serviço de autorização paralisado");
            return Err(SefazError::Rede(format!(
                "serviço paralisado [{}]: {}",
                retorno.status(),
                retorno.motivo()
            )));
        }
        Ok(Resposta::Autorizacao(retorno))
    }
}
