use serde::{Deserialize, Serialize};

use super::envio::{Envio, Servico, Servicos};
use super::evento::{EventoInfo, EventoResult};
use super::protocolo::Protocolo;
use super::resposta::Resposta;
use super::retorno::{Retorno, codigos};
use crate::error::SefazError;
use crate::nota::{Emissao, Modelo, Nota, VERSAO};
use crate::transporte::Transporte;
use crate::xml::{Elemento, NS_NFE};

/// Consulta da situação atual de uma nota pela chave de acesso.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Situacao {
    #[serde(flatten)]
    pub retorno: Retorno,
    pub chave: String,
    pub modelo: Modelo,
}

impl Situacao {
    pub const ESQUEMA: &'static str = "consSitNFe_v4.00.xsd";

    pub fn new(chave: impl Into<String>, modelo: Modelo) -> Self {
        Self {
            chave: chave.into(),
            modelo,
            ..Default::default()
        }
    }

    /// Nota cancelada, seja pelo código da nota ou pelo do evento.
    pub fn is_cancelado(&self) -> bool {
        self.retorno.is_cancelado() || codigos::EVENTO_CANCELADO.contains(&self.retorno.status())
    }

    pub fn get_node(&self) -> Elemento {
        Elemento::novo("consSitNFe")
            .atributo("xmlns", NS_NFE)
            .atributo("versao", VERSAO)
            .folha("tpAmb", self.retorno.status.ambiente.codigo())
            .folha("xServ", "CONSULTAR")
            .folha("chNFe", &self.chave)
    }

    /// Consulta a situação e interpreta a resposta.
    ///
    /// Nota autorizada ou denegada resulta em [`Resposta::Protocolo`]
    /// (anexado a `nota`), nota cancelada em [`Resposta::Evento`] e qualquer
    /// outro código na própria consulta, com o status preenchido.
    pub async fn envia(
        &self,
        sv: &Servicos<impl Transporte>,
        mut nota: Option<&mut Nota>,
    ) -> Result<Resposta, SefazError> {
        let mut pedido = self.clone();
        let mut emissao = Emissao::Normal;
        if let Some(nota) = nota.as_deref() {
            pedido.chave = nota.id.clone();
            pedido.retorno.status.ambiente = nota.ambiente;
            pedido.modelo = nota.modelo;
            emissao = nota.emissao;
        }
        if pedido.chave.len() != 44 || !pedido.chave.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SefazError::Formato(format!(
                "chave de acesso \"{}\" inválida",
                pedido.chave
            )));
        }

        let xml = pedido.get_node().to_xml();
        sv.validar(&xml, Self::ESQUEMA)?;
        let resposta = Envio::new(
            Servico::Protocolo,
            pedido.retorno.status.ambiente,
            pedido.modelo,
            xml,
        )
        .com_emissao(emissao)
        .envia(sv)
        .await?;

        pedido.retorno.load_node(&resposta)?;
        if pedido.retorno.is_autorizado() || pedido.retorno.is_denegada() {
            let protocolo = Protocolo::load_node(&resposta)?;
            if let Some(nota) = nota.as_deref_mut() {
                nota.protocolo = Some(protocolo.clone());
            }
            return Ok(Resposta::Protocolo(protocolo));
        }
        if pedido.is_cancelado() {
            return Ok(Resposta::Evento(pedido.cancelamento(&resposta)?));
        }
        Ok(Resposta::Situacao(pedido))
    }

    // A mesma resposta é lida duas vezes: a raiz como lote e o `retEvento`
    // aninhado como detalhe do cancelamento.
    fn cancelamento(&self, resposta: &Elemento) -> Result<EventoResult, SefazError> {
        let informacao = match resposta.buscar("retEvento").and_then(|r| r.buscar("infEvento")) {
            Some(info) => EventoInfo::load_node(info)?,
            None => EventoInfo {
                retorno: self.retorno.clone(),
                chave: self.chave.clone(),
                ..Default::default()
            },
        };
        Ok(EventoResult {
            lote: self.retorno.clone(),
            informacao,
            documento: resposta.buscar("procEventoNFe").map(Elemento::to_xml),
        })
    }
}
