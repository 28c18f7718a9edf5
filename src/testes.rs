//! Dublês dos colaboradores usados pelos testes do crate.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::assinador::Assinador;
use crate::banco::{BancoEstatico, EntradaServico};
use crate::config::Configuracao;
use crate::error::SefazError;
use crate::nota::{Emissao, Gerador, Modelo, Nota};
use crate::sefaz::Ouvinte;
use crate::task::{Ambiente, Inutilizacao, Recibo, Resposta, Retorno, Servico, Servicos, Tarefa};
use crate::transporte::{Transporte, TransporteError};
use crate::xml::{Elemento, NS_NFE};

pub const CHAVE: &str = "41170608380787000176650010000000811000000815";

#[derive(Debug, Clone)]
pub struct Requisicao {
    pub url: String,
    pub corpo: String,
    pub sat: bool,
}

/// Transporte que devolve respostas enfileiradas e grava o que recebeu.
#[derive(Default)]
pub struct FilaTransporte {
    respostas: Mutex<VecDeque<Result<String, TransporteError>>>,
    enviados: Mutex<Vec<Requisicao>>,
}

impl FilaTransporte {
    pub fn vazia() -> Self {
        Self::default()
    }

    pub fn com<'a>(respostas: impl IntoIterator<Item = &'a str>) -> Self {
        let fila = Self::default();
        for resposta in respostas {
            fila.empilhar(resposta);
        }
        fila
    }

    pub fn falhas(erros: impl IntoIterator<Item = TransporteError>) -> Self {
        let fila = Self::default();
        fila.respostas.lock().unwrap().extend(erros.into_iter().map(Err));
        fila
    }

    pub fn nao_enviado() -> TransporteError {
        TransporteError::NaoEnviado("conexão recusada".into())
    }

    pub fn incompleto() -> TransporteError {
        TransporteError::Incompleto("tempo esgotado".into())
    }

    pub fn empilhar(&self, resposta: &str) {
        self.respostas.lock().unwrap().push_back(Ok(resposta.to_string()));
    }

    pub fn enviados(&self) -> Vec<Requisicao> {
        self.enviados.lock().unwrap().clone()
    }
}

impl Transporte for FilaTransporte {
    async fn post(&self, url: &str, corpo: &str, sat: bool) -> Result<Elemento, TransporteError> {
        self.enviados.lock().unwrap().push(Requisicao {
            url: url.to_string(),
            corpo: corpo.to_string(),
            sat,
        });
        let proxima = self
            .respostas
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransporteError::NaoEnviado("fila vazia".into())));
        let xml = proxima?;
        Elemento::parse(&xml).map_err(|e| TransporteError::Incompleto(e.to_string()))
    }
}

/// Assinador que devolve o XML com uma `Signature` vazia e valida tudo,
/// exceto quando recebe erros de esquema para relatar.
#[derive(Default)]
pub struct AssinadorFalso {
    pub erros: Vec<String>,
}

impl Assinador for AssinadorFalso {
    fn assinar(&self, xml: &str, tag: &str) -> Result<String, SefazError> {
        let fechamento = format!("</{tag}>");
        let pos = xml
            .find(&fechamento)
            .ok_or_else(|| SefazError::Assinatura(format!("tag \"{tag}\" ausente")))?;
        let fim = pos + fechamento.len();
        Ok(format!("{}<Signature/>{}", &xml[..fim], &xml[fim..]))
    }

    fn validar(&self, _xml: &str, _esquema: &str) -> Result<(), SefazError> {
        if self.erros.is_empty() {
            Ok(())
        } else {
            Err(SefazError::Validacao(self.erros.clone()))
        }
    }

    fn certificado_valido(&self) -> bool {
        true
    }
}

fn tabela() -> Vec<EntradaServico> {
    let mut entradas = Vec::new();
    for modelo in [Modelo::Nfe, Modelo::Nfce] {
        for (emissao, host) in [(Emissao::Normal, "homologacao.sefaz"), (Emissao::Contingencia, "svc.sefaz")] {
            for servico in [
                Servico::Autorizacao,
                Servico::Retorno,
                Servico::Protocolo,
                Servico::Status,
                Servico::Evento,
                Servico::Inutilizacao,
            ] {
                entradas.push(EntradaServico {
                    emissao,
                    uf: "PR".into(),
                    modelo,
                    ambiente: Ambiente::Homologacao,
                    servico,
                    url: format!("https://{host}/{modelo}/{}", servico.nome()),
                    versao: "4.00".into(),
                });
            }
        }
    }
    entradas
}

pub fn configuracao() -> Configuracao {
    Configuracao {
        uf: "PR".into(),
        cnpj: "08380787000176".into(),
        sat_url: Some("http://sat.local".into()),
        servicos: tabela(),
        ..Default::default()
    }
}

pub fn servicos(transporte: FilaTransporte) -> Servicos<FilaTransporte> {
    let config = configuracao();
    let banco = BancoEstatico::new(config.servicos.clone());
    Servicos::new(config, transporte, Box::new(banco), Box::new(AssinadorFalso::default()))
}

pub fn nota(numero: u32) -> Nota {
    Nota {
        id: CHAVE.into(),
        modelo: Modelo::Nfce,
        ambiente: Ambiente::Homologacao,
        serie: 1,
        numero,
        cnpj: "08380787000176".into(),
        uf: "PR".into(),
        ..Default::default()
    }
}

/// Gera um XML mínimo com a chave, a emissão e o número da nota.
pub struct GeradorFixo;

impl Gerador for GeradorFixo {
    fn gerar(&self, nota: &Nota) -> Result<String, SefazError> {
        let tag = nota.modelo.tag_assinada();
        Ok(format!(
            "<NFe xmlns=\"{NS_NFE}\"><{tag} Id=\"NFe{}\" versao=\"4.00\"><ide><nNF>{}</nNF>\
             <tpEmis>{}</tpEmis></ide></{tag}></NFe>",
            nota.id,
            nota.numero,
            nota.emissao.codigo()
        ))
    }
}

/// Resposta de uma consulta ou autorização com um `protNFe` aninhado.
pub fn resposta_protocolo(raiz: &str, lote: &str, protocolo: &str, motivo: &str) -> String {
    format!(
        "<{raiz} versao=\"4.00\"><tpAmb>2</tpAmb><verAplic>PR-v4_4_9</verAplic><cStat>{lote}</cStat>\
         <xMotivo>Lote processado</xMotivo><cUF>41</cUF><dhRecbto>2017-06-30T14:02:11-03:00</dhRecbto>\
         <protNFe versao=\"4.00\"><infProt><tpAmb>2</tpAmb><verAplic>PR-v4_4_9</verAplic>\
         <chNFe>{CHAVE}</chNFe><dhRecbto>2017-06-30T14:02:11-03:00</dhRecbto>\
         <nProt>141170000000001</nProt><digVal>bm9uZQ==</digVal><cStat>{protocolo}</cStat>\
         <xMotivo>{motivo}</xMotivo></infProt></protNFe></{raiz}>"
    )
}

pub fn resposta_simples(raiz: &str, codigo: &str, motivo: &str) -> String {
    format!(
        "<{raiz} versao=\"4.00\"><tpAmb>2</tpAmb><verAplic>PR-v4_4_9</verAplic><cStat>{codigo}</cStat>\
         <xMotivo>{motivo}</xMotivo><cUF>41</cUF></{raiz}>"
    )
}

/// Ouvinte que grava o nome de cada callback recebido.
#[derive(Default)]
pub struct Gravador {
    pub eventos: Arc<Mutex<Vec<String>>>,
    /// Nota devolvida pelo callback de contingência.
    pub substituta: Option<Nota>,
}

impl Gravador {
    pub fn novo() -> (Self, Arc<Mutex<Vec<String>>>) {
        let gravador = Self::default();
        let eventos = Arc::clone(&gravador.eventos);
        (gravador, eventos)
    }

    fn gravar(&self, evento: impl Into<String>) {
        self.eventos.lock().unwrap().push(evento.into());
    }
}

impl Ouvinte for Gravador {
    fn on_nota_gerada(&mut self, _nota: &Nota, _xml: &str) {
        self.gravar("gerada");
    }

    fn on_nota_assinada(&mut self, _nota: &Nota, _xml: &str) {
        self.gravar("assinada");
    }

    fn on_nota_validada(&mut self, _nota: &Nota, _xml: &str) {
        self.gravar("validada");
    }

    fn on_nota_enviada(&mut self, _nota: &Nota, _xml: &str) {
        self.gravar("enviada");
    }

    fn on_nota_autorizada(&mut self, _nota: &Nota, _xml: &str) {
        self.gravar("autorizada");
    }

    fn on_nota_denegada(&mut self, _nota: &Nota, _xml: &str) {
        self.gravar("denegada");
    }

    fn on_nota_cancelada(&mut self, _nota: &Nota, _xml: &str) {
        self.gravar("cancelada");
    }

    fn on_nota_rejeitada(&mut self, _nota: &Nota, retorno: &Retorno) {
        self.gravar(format!("rejeitada:{}", retorno.status()));
    }

    fn on_nota_processando(&mut self, _nota: &Nota, recibo: &Recibo) {
        self.gravar(format!("processando:{}", recibo.numero));
    }

    fn on_nota_pendente(&mut self, _nota: &Nota, _xml: &str, _erro: &SefazError) {
        self.gravar("pendente");
    }

    fn on_nota_contingencia(&mut self, nota: &Nota, offline: bool, _erro: &SefazError) -> Option<Nota> {
        self.gravar(format!("contingencia:{}:{offline}", nota.emissao));
        self.substituta.take()
    }

    fn on_nota_completo(&mut self, _nota: &Nota, _xml: &str) {
        self.gravar("completo");
    }

    fn on_nota_erro(&mut self, _nota: &Nota, erro: &SefazError) {
        self.gravar(format!("erro:{erro}"));
    }

    fn on_inutilizado(&mut self, inutilizacao: &Inutilizacao, _xml: &str) {
        self.gravar(format!("inutilizado:{}", inutilizacao.retorno.status()));
    }

    fn on_tarefa_executada(&mut self, _tarefa: &Tarefa, resposta: &Resposta) {
        self.gravar(format!("executada:{}", resposta.desfecho()));
    }

    fn on_tarefa_erro(&mut self, _tarefa: &Tarefa, erro: &SefazError) {
        self.gravar(format!("tarefa_erro:{erro}"));
    }
}
