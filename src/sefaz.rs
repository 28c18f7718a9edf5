//! Orquestração dos lotes de autorização, consulta e tarefas.
//!
//! [`Sefaz`] recebe os colaboradores por construção e processa cada item de
//! um lote em sequência. Toda falha de um item termina em exatamente um
//! callback do [`Ouvinte`] e nunca interrompe os itens seguintes.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::banco::Persistencia;
use crate::error::SefazError;
use crate::nota::{Emissao, Gerador, Modelo, Nota};
use crate::task::{
    Acao, Agente, Autorizacao, Desfecho, Inutilizacao, Recibo, Resposta, Retorno, Servicos, Tarefa,
};
use crate::transporte::Transporte;
use crate::util;

/// Callbacks do ciclo de vida das notas e tarefas.
///
/// Toda implementação padrão apenas registra o evento no log.
pub trait Ouvinte {
    fn on_nota_gerada(&mut self, nota: &Nota, _xml: &str) {
        debug!(nota = nota.numero, "nota gerada");
    }

    fn on_nota_assinada(&mut self, nota: &Nota, _xml: &str) {
        debug!(nota = nota.numero, "nota assinada");
    }

    fn on_nota_validada(&mut self, nota: &Nota, _xml: &str) {
        debug!(nota = nota.numero, "nota validada");
    }

    fn on_nota_enviada(&mut self, nota: &Nota, _xml: &str) {
        debug!(nota = nota.numero, emissao = %nota.emissao, "enviando nota");
    }

    /// Recebe o `nfeProc` da nota autorizada.
    fn on_nota_autorizada(&mut self, nota: &Nota, _xml: &str) {
        info!(nota = nota.numero, chave = %nota.id, "nota autorizada");
    }

    fn on_nota_denegada(&mut self, nota: &Nota, _xml: &str) {
        warn!(nota = nota.numero, chave = %nota.id, "uso da nota denegado");
    }

    fn on_nota_cancelada(&mut self, nota: &Nota, _xml: &str) {
        info!(nota = nota.numero, chave = %nota.id, "nota cancelada");
    }

    fn on_nota_rejeitada(&mut self, nota: &Nota, retorno: &Retorno) {
        warn!(nota = nota.numero, status = retorno.status(), motivo = retorno.motivo(), "nota rejeitada");
    }

    /// Lote recebido; o resultado sai da consulta do recibo.
    fn on_nota_processando(&mut self, nota: &Nota, recibo: &Recibo) {
        info!(nota = nota.numero, recibo = %recibo.numero, "nota em processamento");
    }

    /// O envio não completou e a situação da nota é desconhecida.
    fn on_nota_pendente(&mut self, nota: &Nota, _xml: &str, erro: &SefazError) {
        warn!(nota = nota.numero, %erro, "nota pendente de consulta");
    }

    /// A nota passou para contingência. Devolver uma nota a substitui e a
    /// reenvia; devolver `None` encerra a nota como emitida em contingência.
    fn on_nota_contingencia(&mut self, nota: &Nota, offline: bool, erro: &SefazError) -> Option<Nota> {
        warn!(nota = nota.numero, offline, %erro, "nota em contingência");
        None
    }

    /// Documento de contingência pronto, assinado e validado, sem envio.
    fn on_nota_completo(&mut self, nota: &Nota, _xml: &str) {
        info!(nota = nota.numero, "nota emitida em contingência");
    }

    fn on_nota_erro(&mut self, nota: &Nota, erro: &SefazError) {
        error!(nota = nota.numero, %erro, "falha ao processar nota");
    }

    fn on_inutilizado(&mut self, inutilizacao: &Inutilizacao, _xml: &str) {
        info!(
            serie = inutilizacao.serie,
            inicio = inutilizacao.inicio,
            fim = inutilizacao.fim,
            "numeração inutilizada"
        );
    }

    fn on_tarefa_executada(&mut self, tarefa: &Tarefa, resposta: &Resposta) {
        info!(tarefa = %tarefa.id, acao = %tarefa.acao, desfecho = %resposta.desfecho(), "tarefa executada");
    }

    fn on_tarefa_erro(&mut self, tarefa: &Tarefa, erro: &SefazError) {
        error!(tarefa = %tarefa.id, acao = %tarefa.acao, %erro, "falha ao executar tarefa");
    }
}

/// Ouvinte que só registra os eventos no log.
#[derive(Debug, Clone, Copy, Default)]
pub struct OuvinteLog;

impl Ouvinte for OuvinteLog {}

/// Contagem de um ciclo de [`Sefaz::processa`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Processamento {
    pub abertas: usize,
    pub enviadas: usize,
    pub pendentes: usize,
    pub consultadas: usize,
    pub tarefas: usize,
    pub executadas: usize,
}

pub struct Sefaz<T> {
    servicos: Servicos<T>,
    gerador: Box<dyn Gerador>,
    ouvinte: Box<dyn Ouvinte>,
}

impl<T: Transporte> Sefaz<T> {
    pub fn new(servicos: Servicos<T>, gerador: Box<dyn Gerador>, ouvinte: Box<dyn Ouvinte>) -> Self {
        Self {
            servicos,
            gerador,
            ouvinte,
        }
    }

    pub fn servicos(&self) -> &Servicos<T> {
        &self.servicos
    }

    /// Gera, assina, valida e envia cada nota. Devolve quantas chegaram a
    /// um desfecho sem erro.
    pub async fn autoriza(&mut self, notas: Vec<Nota>) -> usize {
        let mut concluidas = 0;
        for mut nota in notas {
            match self.autoriza_nota(&mut nota).await {
                Ok(()) => concluidas += 1,
                Err(erro) => self.ouvinte.on_nota_erro(&nota, &erro),
            }
        }
        concluidas
    }

    async fn autoriza_nota(&mut self, nota: &mut Nota) -> Result<(), SefazError> {
        let mut envia = true;
        loop {
            let xml = self.gerador.gerar(nota)?;
            self.ouvinte.on_nota_gerada(nota, &xml);
            let assinado = self
                .servicos
                .assinador
                .assinar(&xml, nota.modelo.tag_assinada())?;
            self.ouvinte.on_nota_assinada(nota, &assinado);
            self.servicos.validar(&assinado, &nota.modelo.esquema())?;
            self.ouvinte.on_nota_validada(nota, &assinado);
            if !envia {
                self.ouvinte.on_nota_completo(nota, &assinado);
                return Ok(());
            }

            self.ouvinte.on_nota_enviada(nota, &assinado);
            let erro = match Autorizacao::default().envia(&self.servicos, nota, &assinado).await {
                Ok(resposta) => return self.despacha(nota, Some(&assinado), &resposta),
                Err(erro) => erro,
            };
            if erro.is_incompleta() {
                self.ouvinte.on_nota_pendente(nota, &assinado, &erro);
                return Ok(());
            }
            if nota.emissao == Emissao::Contingencia || nota.modelo == Modelo::Cfe {
                return Err(erro);
            }

            warn!(nota = nota.numero, %erro, "falha no envio, passando para contingência");
            nota.emissao = Emissao::Contingencia;
            nota.data_contingencia = Some(util::agora());
            nota.justificativa = Some(justificativa(&erro));
            let offline = self.servicos.configuracao.is_offline();
            match self.ouvinte.on_nota_contingencia(nota, offline, &erro) {
                Some(nova) => {
                    *nota = nova;
                    nota.emissao = Emissao::Contingencia;
                }
                None => envia = false,
            }
        }
    }

    /// Leva a resposta ao callback do desfecho. Qualquer desfecho fora de
    /// autorizado, denegado, cancelado e recebido é rejeição.
    fn despacha(
        &mut self,
        nota: &mut Nota,
        assinado: Option<&str>,
        resposta: &Resposta,
    ) -> Result<(), SefazError> {
        match (resposta.desfecho(), resposta) {
            (Desfecho::Autorizado | Desfecho::Denegado, Resposta::Protocolo(protocolo)) => {
                nota.protocolo = Some(protocolo.clone());
                let xml = match assinado {
                    Some(assinado) => nota.add_protocolo(assinado)?,
                    None => protocolo.get_node().to_xml(),
                };
                if protocolo.retorno.is_autorizado() {
                    self.ouvinte.on_nota_autorizada(nota, &xml);
                } else {
                    self.ouvinte.on_nota_denegada(nota, &xml);
                }
                Ok(())
            }
            (Desfecho::Cancelado, Resposta::Evento(evento)) => {
                let xml = evento.documento.as_deref().or(assinado).unwrap_or_default();
                self.ouvinte.on_nota_cancelada(nota, xml);
                Ok(())
            }
            (Desfecho::Recebido, Resposta::Recibo(recibo)) => {
                self.ouvinte.on_nota_processando(nota, recibo);
                Ok(())
            }
            (_, outra) => {
                let retorno = outra.retorno();
                self.ouvinte.on_nota_rejeitada(nota, retorno);
                Err(retorno.rejeicao())
            }
        }
    }

    /// Consulta a situação das notas pendentes e leva as que têm nota ao
    /// mesmo despacho da autorização.
    pub async fn consulta(&mut self, pendentes: Vec<Tarefa>) -> usize {
        let mut concluidas = 0;
        for mut tarefa in pendentes {
            match self.consulta_tarefa(&mut tarefa).await {
                Ok(()) => concluidas += 1,
                Err(erro) => self.ouvinte.on_tarefa_erro(&tarefa, &erro),
            }
        }
        concluidas
    }

    async fn consulta_tarefa(&mut self, tarefa: &mut Tarefa) -> Result<(), SefazError> {
        let assinado = tarefa.documento.clone();
        let resposta = tarefa.executa(&self.servicos).await?.clone();
        self.ouvinte.on_tarefa_executada(tarefa, &resposta);
        let Some(nota) = tarefa.nota.as_mut() else {
            return Ok(());
        };
        if let Resposta::Evento(evento) = &resposta {
            return self.despacha(nota, evento.documento.as_deref(), &resposta);
        }
        self.despacha(nota, assinado.as_deref(), &resposta)
    }

    /// Executa as tarefas de inutilização, cancelamento e consulta.
    pub async fn executa(&mut self, tarefas: Vec<Tarefa>) -> usize {
        let mut concluidas = 0;
        for mut tarefa in tarefas {
            match self.executa_tarefa(&mut tarefa).await {
                Ok(()) => concluidas += 1,
                Err(erro) => self.ouvinte.on_tarefa_erro(&tarefa, &erro),
            }
        }
        concluidas
    }

    async fn executa_tarefa(&mut self, tarefa: &mut Tarefa) -> Result<(), SefazError> {
        let resposta = tarefa.executa(&self.servicos).await?.clone();
        let documento = tarefa.documento.as_deref().unwrap_or_default();
        match &resposta {
            Resposta::Inutilizacao(inutilizacao) => self.ouvinte.on_inutilizado(inutilizacao, documento),
            Resposta::Evento(evento) if evento.is_cancelado() => {
                if let Some(nota) = &tarefa.nota {
                    self.ouvinte.on_nota_cancelada(nota, documento);
                }
            }
            _ => {}
        }
        self.ouvinte.on_tarefa_executada(tarefa, &resposta);
        Ok(())
    }

    /// Inutiliza uma faixa completando CNPJ, UF e ambiente pela configuração.
    pub async fn inutiliza(&mut self, mut inutilizacao: Inutilizacao) -> Result<Inutilizacao, SefazError> {
        let config = &self.servicos.configuracao;
        if inutilizacao.cnpj.is_empty() {
            inutilizacao.cnpj = config.cnpj.clone();
        }
        if inutilizacao.retorno.status.uf.is_none() {
            inutilizacao.retorno.status.set_uf(&config.uf)?;
        }
        inutilizacao.retorno.status.ambiente = config.ambiente;

        let mut tarefa = Tarefa::new(Acao::Inutilizar).com_agente(Agente::Inutilizacao(inutilizacao));
        if let Err(erro) = self.executa_tarefa(&mut tarefa).await {
            self.ouvinte.on_tarefa_erro(&tarefa, &erro);
            return Err(erro);
        }
        match tarefa.resposta {
            Some(Resposta::Inutilizacao(registrada)) => Ok(registrada),
            _ => Err(SefazError::Tarefa(format!(
                "a tarefa \"{}\" não devolveu inutilização",
                tarefa.id
            ))),
        }
    }

    /// Um ciclo completo: notas abertas, notas pendentes e tarefas.
    pub async fn processa(&mut self, persistencia: &dyn Persistencia) -> Result<Processamento, SefazError> {
        let abertas = persistencia.notas_abertas()?;
        let mut resumo = Processamento {
            abertas: abertas.len(),
            ..Default::default()
        };
        resumo.enviadas = self.autoriza(abertas).await;

        let pendentes = persistencia.notas_pendentes()?;
        resumo.pendentes = pendentes.len();
        resumo.consultadas = self.consulta(pendentes).await;

        let tarefas = persistencia.notas_tarefas()?;
        resumo.tarefas = tarefas.len();
        resumo.executadas = self.executa(tarefas).await;

        info!(?resumo, "processamento concluído");
        Ok(resumo)
    }
}

/// Motivo da contingência (`xJust`): entre 15 e 256 caracteres.
fn justificativa(erro: &SefazError) -> String {
    let texto = format!("Falha de comunicação com a SEFAZ: {erro}");
    texto.chars().take(256).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::banco::{BancoEstatico, EntradaServico};
    use crate::task::{Ambiente, Servico};
    use crate::testes::{
        self, CHAVE, FilaTransporte, GeradorFixo, Gravador, resposta_protocolo, resposta_simples,
    };

    fn sefaz(transporte: FilaTransporte, gravador: Gravador) -> Sefaz<FilaTransporte> {
        Sefaz::new(testes::servicos(transporte), Box::new(GeradorFixo), Box::new(gravador))
    }

    fn eventos(gravados: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        gravados.lock().unwrap().clone()
    }

    const RECEBIDO: &str = "<retEnviNFe versao=\"4.00\"><tpAmb>2</tpAmb><cStat>103</cStat>\
        <xMotivo>Lote recebido com sucesso</xMotivo><cUF>41</cUF>\
        <infRec><nRec>411000000000001</nRec><tMed>1</tMed></infRec></retEnviNFe>";

    #[tokio::test]
    async fn received_batch_then_receipt_query_authorizes() {
        let (gravador, gravados) = Gravador::novo();
        let mut sefaz = sefaz(FilaTransporte::com([RECEBIDO]), gravador);

        assert_eq!(sefaz.autoriza(vec![testes::nota(81)]).await, 1);
        assert_eq!(
            eventos(&gravados),
            ["gerada", "assinada", "validada", "enviada", "processando:411000000000001"]
        );

        sefaz.servicos().transporte.empilhar(&resposta_protocolo(
            "retConsReciNFe",
            "104",
            "100",
            "Autorizado o uso da NF-e",
        ));
        let mut nota = testes::nota(81);
        let resposta = Recibo::new("411000000000001", Modelo::Nfce)
            .consulta(sefaz.servicos(), Some(&mut nota))
            .await
            .unwrap();
        assert!(matches!(resposta, Resposta::Protocolo(_)));
        assert_eq!(nota.protocolo.unwrap().chave, CHAVE);
    }

    #[tokio::test]
    async fn processed_batch_authorizes_and_builds_nfe_proc() {
        let (gravador, gravados) = Gravador::novo();
        let xml = resposta_protocolo("retEnviNFe", "104", "100", "Autorizado o uso da NF-e");
        let mut sefaz = sefaz(FilaTransporte::com([xml.as_str()]), gravador);

        assert_eq!(sefaz.autoriza(vec![testes::nota(81)]).await, 1);
        assert_eq!(eventos(&gravados).last().unwrap(), "autorizada");
        let corpo = &sefaz.servicos().transporte.enviados()[0].corpo;
        assert!(corpo.contains("<enviNFe"));
        assert!(corpo.contains("<tpEmis>1</tpEmis>"));
    }

    #[tokio::test]
    async fn denied_note_gets_denied_callback() {
        let (gravador, gravados) = Gravador::novo();
        let xml = resposta_protocolo("retEnviNFe", "104", "302", "Uso Denegado: Irregularidade fiscal do destinatario");
        let mut sefaz = sefaz(FilaTransporte::com([xml.as_str()]), gravador);

        assert_eq!(sefaz.autoriza(vec![testes::nota(81)]).await, 1);
        let eventos = eventos(&gravados);
        assert_eq!(eventos.last().unwrap(), "denegada");
        assert!(!eventos.iter().any(|e| e == "autorizada" || e.starts_with("rejeitada")));
    }

    #[tokio::test]
    async fn rejection_calls_rejected_then_error() {
        let (gravador, gravados) = Gravador::novo();
        let xml = resposta_simples("retEnviNFe", "225", "Rejeicao: Falha no Schema XML");
        let mut sefaz = sefaz(FilaTransporte::com([xml.as_str()]), gravador);

        assert_eq!(sefaz.autoriza(vec![testes::nota(81)]).await, 0);
        let eventos = eventos(&gravados);
        assert_eq!(eventos[eventos.len() - 2], "rejeitada:225");
        assert!(eventos.last().unwrap().starts_with("erro:rejeição [225]"));
    }

    #[tokio::test]
    async fn unknown_code_is_rejected() {
        let (gravador, gravados) = Gravador::novo();
        let xml = resposta_protocolo("retEnviNFe", "104", "999", "Codigo desconhecido");
        let mut sefaz = sefaz(FilaTransporte::com([xml.as_str()]), gravador);

        assert_eq!(sefaz.autoriza(vec![testes::nota(81)]).await, 0);
        assert!(eventos(&gravados).contains(&"rejeitada:999".to_string()));
    }

    #[tokio::test]
    async fn network_failure_switches_to_contingency() {
        let (gravador, gravados) = Gravador::novo();
        let mut sefaz = sefaz(FilaTransporte::falhas([FilaTransporte::nao_enviado()]), gravador);

        assert_eq!(sefaz.autoriza(vec![testes::nota(81)]).await, 1);
        assert_eq!(
            eventos(&gravados),
            [
                "gerada",
                "assinada",
                "validada",
                "enviada",
                "contingencia:contingencia:true",
                "gerada",
                "assinada",
                "validada",
                "completo",
            ]
        );
        assert_eq!(sefaz.servicos().transporte.enviados().len(), 1);
    }

    #[tokio::test]
    async fn incomplete_request_is_pending_without_contingency() {
        let (gravador, gravados) = Gravador::novo();
        let mut sefaz = sefaz(FilaTransporte::falhas([FilaTransporte::incompleto()]), gravador);

        assert_eq!(sefaz.autoriza(vec![testes::nota(81)]).await, 1);
        let eventos = eventos(&gravados);
        assert_eq!(eventos.last().unwrap(), "pendente");
        assert!(!eventos.iter().any(|e| e.starts_with("contingencia")));
    }

    #[tokio::test]
    async fn cfe_never_goes_to_contingency() {
        let (gravador, gravados) = Gravador::novo();
        let mut sefaz = sefaz(FilaTransporte::falhas([FilaTransporte::nao_enviado()]), gravador);
        let mut nota = testes::nota(81);
        nota.modelo = Modelo::Cfe;

        assert_eq!(sefaz.autoriza(vec![nota]).await, 0);
        let eventos = eventos(&gravados);
        assert!(eventos.last().unwrap().starts_with("erro:"));
        assert!(!eventos.iter().any(|e| e.starts_with("contingencia")));
        assert!(sefaz.servicos().transporte.enviados()[0].sat);
    }

    #[tokio::test]
    async fn paralysed_service_goes_offline_and_to_contingency() {
        let (gravador, gravados) = Gravador::novo();
        let xml = resposta_simples("retEnviNFe", "108", "Servico Paralisado Momentaneamente");
        let mut sefaz = sefaz(FilaTransporte::com([xml.as_str()]), gravador);

        assert_eq!(sefaz.autoriza(vec![testes::nota(81), testes::nota(82)]).await, 2);
        assert!(sefaz.servicos().configuracao.is_offline());
        let eventos = eventos(&gravados);
        assert_eq!(eventos.iter().filter(|e| *e == "completo").count(), 2);
        // a segunda nota nem chega a ser enviada
        assert_eq!(sefaz.servicos().transporte.enviados().len(), 1);
    }

    #[tokio::test]
    async fn replacement_note_is_resubmitted() {
        let (mut gravador, gravados) = Gravador::novo();
        let mut substituta = testes::nota(81);
        substituta.modelo = Modelo::Nfe;
        substituta.emissao = Emissao::Contingencia;
        gravador.substituta = Some(substituta);

        let xml = resposta_protocolo("retEnviNFe", "104", "100", "Autorizado o uso da NF-e");
        let mut sv = testes::servicos(FilaTransporte::com([xml.as_str()]));
        sv.banco = Box::new(BancoEstatico::new(vec![EntradaServico {
            emissao: Emissao::Contingencia,
            uf: "PR".into(),
            modelo: Modelo::Nfe,
            ambiente: Ambiente::Homologacao,
            servico: Servico::Autorizacao,
            url: "https://svc.sefaz/nfe/autorizacao".into(),
            versao: "4.00".into(),
        }]));
        let mut sefaz = Sefaz::new(sv, Box::new(GeradorFixo), Box::new(gravador));
        let mut nota = testes::nota(81);
        nota.modelo = Modelo::Nfe;

        assert_eq!(sefaz.autoriza(vec![nota]).await, 1);
        let eventos = eventos(&gravados);
        assert!(eventos.contains(&"contingencia:contingencia:false".to_string()));
        assert_eq!(eventos.last().unwrap(), "autorizada");

        let enviados = sefaz.servicos().transporte.enviados();
        assert_eq!(enviados.len(), 1);
        assert_eq!(enviados[0].url, "https://svc.sefaz/nfe/autorizacao");
        assert!(enviados[0].corpo.contains("<tpEmis>9</tpEmis>"));
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let (gravador, gravados) = Gravador::novo();
        let rejeitada = resposta_simples("retEnviNFe", "539", "Duplicidade de NF-e");
        let autorizada = resposta_protocolo("retEnviNFe", "104", "100", "Autorizado o uso da NF-e");
        let mut sefaz = sefaz(
            FilaTransporte::com([rejeitada.as_str(), autorizada.as_str()]),
            gravador,
        );

        assert_eq!(sefaz.autoriza(vec![testes::nota(81), testes::nota(82)]).await, 1);
        let eventos = eventos(&gravados);
        assert!(eventos.iter().any(|e| e.starts_with("erro:")));
        assert_eq!(eventos.last().unwrap(), "autorizada");
    }

    #[tokio::test]
    async fn schema_errors_reach_error_callback() {
        let (gravador, gravados) = Gravador::novo();
        let mut sv = testes::servicos(FilaTransporte::vazia());
        sv.assinador = Box::new(testes::AssinadorFalso {
            erros: vec!["cUF inesperado".into(), "falta xJust".into()],
        });
        let mut sefaz = Sefaz::new(sv, Box::new(GeradorFixo), Box::new(gravador));

        assert_eq!(sefaz.autoriza(vec![testes::nota(81)]).await, 0);
        assert_eq!(
            eventos(&gravados).last().unwrap(),
            "erro:XML inválido: cUF inesperado; falta xJust"
        );
        assert!(sefaz.servicos().transporte.enviados().is_empty());
    }

    #[tokio::test]
    async fn consulta_routes_pending_notes() {
        let (gravador, gravados) = Gravador::novo();
        let autorizada = resposta_protocolo("retConsSitNFe", "100", "100", "Autorizado o uso da NF-e");
        let inexistente = resposta_simples("retConsSitNFe", "217", "NF-e nao consta na base de dados da SEFAZ");
        let mut sefaz = sefaz(
            FilaTransporte::com([autorizada.as_str(), inexistente.as_str()]),
            gravador,
        );
        let pendentes = vec![
            Tarefa::new(Acao::Consultar)
                .com_nota(testes::nota(81))
                .com_documento("<NFe><infNFe/><Signature/></NFe>"),
            Tarefa::new(Acao::Consultar).com_nota(testes::nota(82)),
        ];

        assert_eq!(sefaz.consulta(pendentes).await, 1);
        let eventos = eventos(&gravados);
        assert!(eventos.contains(&"executada:AUTORIZADO".to_string()));
        assert!(eventos.contains(&"autorizada".to_string()));
        assert!(eventos.contains(&"rejeitada:217".to_string()));
        assert!(eventos.last().unwrap().starts_with("tarefa_erro:"));
    }

    #[tokio::test]
    async fn consulta_of_denied_note_calls_denied() {
        let (gravador, gravados) = Gravador::novo();
        let denegada = resposta_protocolo("retConsSitNFe", "110", "110", "Uso Denegado");
        let mut sefaz = sefaz(FilaTransporte::com([denegada.as_str()]), gravador);
        let pendentes = vec![
            Tarefa::new(Acao::Consultar)
                .com_nota(testes::nota(81))
                .com_documento("<NFe><infNFe/><Signature/></NFe>"),
        ];

        assert_eq!(sefaz.consulta(pendentes).await, 1);
        assert_eq!(eventos(&gravados), ["executada:DENEGADO", "denegada"]);
    }

    #[tokio::test]
    async fn consulta_of_cancelled_note_calls_cancelled() {
        let (gravador, gravados) = Gravador::novo();
        let cancelada = format!(
            "<retConsSitNFe versao=\"4.00\"><tpAmb>2</tpAmb><verAplic>PR-v4_4_9</verAplic>\
             <cStat>101</cStat><xMotivo>Cancelamento de NF-e homologado</xMotivo><cUF>41</cUF>\
             <chNFe>{CHAVE}</chNFe><procEventoNFe versao=\"1.00\"><evento versao=\"1.00\">\
             <infEvento Id=\"ID110111{CHAVE}01\"><cOrgao>41</cOrgao><chNFe>{CHAVE}</chNFe>\
             <tpEvento>110111</tpEvento></infEvento></evento><retEvento versao=\"1.00\"><infEvento>\
             <tpAmb>2</tpAmb><cOrgao>41</cOrgao><cStat>135</cStat>\
             <xMotivo>Evento registrado e vinculado a NF-e</xMotivo><chNFe>{CHAVE}</chNFe>\
             <tpEvento>110111</tpEvento><nSeqEvento>1</nSeqEvento><nProt>141170000000002</nProt>\
             </infEvento></retEvento></procEventoNFe></retConsSitNFe>"
        );
        let mut sefaz = sefaz(FilaTransporte::com([cancelada.as_str()]), gravador);
        let pendentes = vec![Tarefa::new(Acao::Consultar).com_nota(testes::nota(81))];

        assert_eq!(sefaz.consulta(pendentes).await, 1);
        assert_eq!(eventos(&gravados), ["executada:CANCELADO", "cancelada"]);
    }

    #[tokio::test]
    async fn executa_reports_void_and_task_errors() {
        let (gravador, gravados) = Gravador::novo();
        let xml = "<retInutNFe versao=\"4.00\"><infInut><tpAmb>2</tpAmb><cStat>102</cStat>\
                   <xMotivo>Inutilizacao de numero homologado</xMotivo><cUF>41</cUF>\
                   <nProt>141170000000003</nProt></infInut></retInutNFe>";
        let mut sefaz = sefaz(FilaTransporte::com([xml]), gravador);
        let mut nota = testes::nota(90);
        nota.justificativa = Some("Numeração pulada pelo sistema".into());
        let tarefas = vec![
            Tarefa::new(Acao::Inutilizar),
            Tarefa::new(Acao::Inutilizar).com_nota(nota),
        ];

        assert_eq!(sefaz.executa(tarefas).await, 1);
        let eventos = eventos(&gravados);
        assert!(eventos[0].starts_with("tarefa_erro:"));
        assert_eq!(eventos[1], "inutilizado:102");
        assert_eq!(eventos[2], "executada:INUTILIZADO");
    }

    #[tokio::test]
    async fn inutiliza_fills_from_configuration() {
        let (gravador, _) = Gravador::novo();
        let xml = "<retInutNFe versao=\"4.00\"><infInut><tpAmb>2</tpAmb><cStat>102</cStat>\
                   <xMotivo>Inutilizacao de numero homologado</xMotivo>\
                   <nProt>141170000000003</nProt></infInut></retInutNFe>";
        let mut sefaz = sefaz(FilaTransporte::com([xml]), gravador);

        let registrada = sefaz
            .inutiliza(Inutilizacao {
                ano: 2017,
                modelo: Modelo::Nfce,
                serie: 1,
                inicio: 81,
                fim: 81,
                justificativa: "Numeração pulada pelo sistema".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(registrada.cnpj, "08380787000176");
        assert_eq!(registrada.retorno.status.uf, Some(41));
        assert_eq!(registrada.numero.as_deref(), Some("141170000000003"));
        let corpo = &sefaz.servicos().transporte.enviados()[0].corpo;
        assert!(corpo.contains("Id=\"ID41170838078700017665001000000081000000081\""));
    }

    struct Memoria {
        abertas: Vec<Nota>,
    }

    impl Persistencia for Memoria {
        fn notas_abertas(&self) -> Result<Vec<Nota>, SefazError> {
            Ok(self.abertas.clone())
        }

        fn notas_pendentes(&self) -> Result<Vec<Tarefa>, SefazError> {
            Ok(vec![Tarefa::new(Acao::Consultar).com_nota(testes::nota(70))])
        }

        fn notas_tarefas(&self) -> Result<Vec<Tarefa>, SefazError> {
            Ok(vec![Tarefa::new(Acao::Cancelar)])
        }
    }

    #[tokio::test]
    async fn processa_runs_every_stage() {
        let (gravador, _) = Gravador::novo();
        let autorizada = resposta_protocolo("retEnviNFe", "104", "100", "Autorizado o uso da NF-e");
        let consultada = resposta_protocolo("retConsSitNFe", "100", "100", "Autorizado o uso da NF-e");
        let mut sefaz = sefaz(
            FilaTransporte::com([autorizada.as_str(), consultada.as_str()]),
            gravador,
        );
        let memoria = Memoria {
            abertas: vec![testes::nota(81)],
        };

        let resumo = sefaz.processa(&memoria).await.unwrap();
        assert_eq!(
            resumo,
            Processamento {
                abertas: 1,
                enviadas: 1,
                pendentes: 1,
                consultadas: 1,
                tarefas: 1,
                executadas: 0,
            }
        );
    }

    #[test]
    fn contingency_reason_is_bounded() {
        let curta = justificativa(&SefazError::Rede("x".into()));
        assert!(curta.chars().count() >= 15);
        let longa = justificativa(&SefazError::Rede("x".repeat(500)));
        assert_eq!(longa.chars().count(), 256);
    }
}
