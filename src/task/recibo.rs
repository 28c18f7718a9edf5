use serde::{Deserialize, Serialize};
use tracing::debug;

use super::envio::{Envio, Servico, Servicos};
use super::protocolo::Protocolo;
use super::resposta::Resposta;
use super::retorno::Retorno;
use crate::error::SefazError;
use crate::nota::{Emissao, Modelo, Nota, VERSAO};
use crate::transporte::Transporte;
use crate::xml::{Elemento, NS_NFE};

/// Lote recebido pela SEFAZ cujo resultado deve ser consultado depois.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recibo {
    #[serde(flatten)]
    pub retorno: Retorno,
    /// Número do recibo (`nRec`).
    pub numero: String,
    /// Tempo médio de processamento em segundos (`tMed`).
    pub tempo_medio: Option<u32>,
    pub codigo: Option<String>,
    pub mensagem: Option<String>,
    pub modelo: Modelo,
}

impl Recibo {
    pub const TAG_INFO: &'static str = "infRec";
    pub const ESQUEMA: &'static str = "consReciNFe_v4.00.xsd";

    pub fn new(numero: impl Into<String>, modelo: Modelo) -> Self {
        Self {
            numero: numero.into(),
            modelo,
            ..Default::default()
        }
    }

    /// Lê um `retEnviNFe` (com `infRec`) ou um `retConsReciNFe`.
    pub fn load_node(elemento: &Elemento, modelo: Modelo) -> Result<Self, SefazError> {
        let mut retorno = Retorno::default();
        retorno.load_node(elemento)?;
        let tempo_medio = elemento
            .valor("tMed")
            .map(|t| {
                t.trim()
                    .parse::<u32>()
                    .map_err(|_| SefazError::Formato(format!("tMed \"{t}\" inválido")))
            })
            .transpose()?;
        Ok(Self {
            retorno,
            numero: elemento.exigir("nRec", "Recibo")?.to_string(),
            tempo_medio,
            codigo: elemento.valor("cMsg").map(str::to_string),
            mensagem: elemento.valor("xMsg").map(str::to_string),
            modelo,
        })
    }

    /// Pedido `consReciNFe`.
    pub fn get_node(&self) -> Elemento {
        Elemento::novo("consReciNFe")
            .atributo("xmlns", NS_NFE)
            .atributo("versao", VERSAO)
            .folha("tpAmb", self.retorno.status.ambiente.codigo())
            .folha("nRec", &self.numero)
    }

    /// Consulta o resultado do lote.
    ///
    /// Quando o lote já foi processado devolve o [`Protocolo`] da nota, que é
    /// anexado a `nota` se autorizado. Caso contrário devolve o próprio recibo
    /// atualizado, ainda pendente.
    pub async fn consulta(
        &self,
        sv: &Servicos<impl Transporte>,
        mut nota: Option<&mut Nota>,
    ) -> Result<Resposta, SefazError> {
        let mut pedido = self.clone();
        let mut emissao = Emissao::Normal;
        if let Some(nota) = nota.as_deref() {
            pedido.retorno.status.ambiente = nota.ambiente;
            pedido.modelo = nota.modelo;
            emissao = nota.emissao;
        }

        let xml = pedido.get_node().to_xml();
        sv.validar(&xml, Self::ESQUEMA)?;
        let resposta = Envio::new(
            Servico::Retorno,
            pedido.retorno.status.ambiente,
            pedido.modelo,
            xml,
        )
        .com_emissao(emissao)
        .envia(sv)
        .await?;

        let mut retorno = Retorno::default();
        retorno.load_node(&resposta)?;
        if retorno.is_processado() {
            let protocolo = Protocolo::load_node(&resposta)?;
            if protocolo.retorno.is_autorizado()
                && let Some(nota) = nota.as_deref_mut()
            {
                nota.protocolo = Some(protocolo.clone());
            }
            return Ok(Resposta::Protocolo(protocolo));
        }

        debug!(recibo = %pedido.numero, status = retorno.status(), "lote ainda em processamento");
        pedido.retorno = retorno;
        if let Some(tempo) = resposta.valor("tMed").and_then(|t| t.trim().parse().ok()) {
            pedido.tempo_medio = Some(tempo);
        }
        pedido.codigo = resposta.valor("cMsg").map(str::to_string);
        pedido.mensagem = resposta.valor("xMsg").map(str::to_string);
        Ok(Resposta::Recibo(pedido))
    }
}
