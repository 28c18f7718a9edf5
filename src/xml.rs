//! Árvore XML mínima usada para montar requisições e ler respostas.
//!
//! [`Elemento`] guarda o nome qualificado, os atributos, o texto e os filhos.
//! As buscas comparam apenas o nome local (sem prefixo), de modo que
//! `soap:Body` e `Body` são equivalentes. Fragmentos assinados nunca passam
//! pela árvore: são recortados byte a byte com [`extrair`] para não invalidar
//! a assinatura.

use std::collections::VecDeque;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

use crate::error::SefazError;

/// Namespace dos leiautes da NFe.
pub const NS_NFE: &str = "http://www.portalfiscal.inf.br/nfe";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Elemento {
    pub nome: String,
    pub atributos: Vec<(String, String)>,
    pub texto: String,
    pub filhos: Vec<Elemento>,
}

impl Elemento {
    pub fn novo(nome: impl Into<String>) -> Self {
        Self {
            nome: nome.into(),
            ..Default::default()
        }
    }

    pub fn atributo(mut self, chave: impl Into<String>, valor: impl Into<String>) -> Self {
        self.atributos.push((chave.into(), valor.into()));
        self
    }

    pub fn com_texto(mut self, texto: impl Into<String>) -> Self {
        self.texto = texto.into();
        self
    }

    pub fn filho(mut self, filho: Elemento) -> Self {
        self.filhos.push(filho);
        self
    }

    /// Acrescenta um filho contendo apenas texto.
    pub fn folha(self, nome: &str, valor: impl ToString) -> Self {
        self.filho(Elemento::novo(nome).com_texto(valor.to_string()))
    }

    /// Como [`folha`](Self::folha), mas omite o filho quando o valor é `None`.
    pub fn folha_opcional<V: ToString>(self, nome: &str, valor: Option<V>) -> Self {
        match valor {
            Some(valor) => self.folha(nome, valor),
            None => self,
        }
    }

    /// Nome sem prefixo de namespace.
    pub fn local(&self) -> &str {
        match self.nome.split_once(':') {
            Some((_, local)) => local,
            None => &self.nome,
        }
    }

    pub fn attr(&self, chave: &str) -> Option<&str> {
        self.atributos
            .iter()
            .find(|(k, _)| k == chave)
            .map(|(_, v)| v.as_str())
    }

    /// Busca em largura pelo primeiro elemento com o nome local dado,
    /// começando pelo próprio elemento.
    pub fn buscar(&self, nome: &str) -> Option<&Elemento> {
        let mut fila = VecDeque::from([self]);
        while let Some(atual) = fila.pop_front() {
            if atual.local() == nome {
                return Some(atual);
            }
            fila.extend(atual.filhos.iter());
        }
        None
    }

    /// Texto do primeiro elemento com o nome dado.
    pub fn valor(&self, nome: &str) -> Option<&str> {
        self.buscar(nome).map(|el| el.texto.as_str())
    }

    /// Como [`valor`](Self::valor), mas falha quando a tag não existe.
    pub fn exigir(&self, nome: &str, campo: &str) -> Result<&str, SefazError> {
        self.valor(nome)
            .ok_or_else(|| SefazError::tag_ausente(nome, campo))
    }

    /// Primeiro filho direto que é um elemento.
    pub fn primeiro_filho(&self) -> Option<&Elemento> {
        self.filhos.first()
    }

    pub fn parse(xml: &str) -> Result<Elemento, SefazError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut pilha: Vec<Elemento> = Vec::new();
        let mut raiz: Option<Elemento> = None;

        loop {
            match reader.read_event()? {
                Event::Start(tag) => pilha.push(abrir(&tag)?),
                Event::Empty(tag) => {
                    let elemento = abrir(&tag)?;
                    anexar(&mut pilha, &mut raiz, elemento)?;
                }
                Event::End(_) => {
                    let elemento = pilha
                        .pop()
                        .ok_or_else(|| SefazError::Xml("fechamento sem abertura".into()))?;
                    anexar(&mut pilha, &mut raiz, elemento)?;
                }
                Event::Text(texto) => {
                    if let Some(atual) = pilha.last_mut() {
                        atual.texto.push_str(&texto.unescape()?);
                    }
                }
                Event::CData(dados) => {
                    if let Some(atual) = pilha.last_mut() {
                        atual.texto.push_str(&String::from_utf8_lossy(&dados.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !pilha.is_empty() {
            return Err(SefazError::Xml("documento truncado".into()));
        }
        raiz.ok_or_else(|| SefazError::Xml("documento vazio".into()))
    }

    pub fn to_xml(&self) -> String {
        let mut saida = String::new();
        self.escrever(&mut saida);
        saida
    }

    fn escrever(&self, saida: &mut String) {
        saida.push('<');
        saida.push_str(&self.nome);
        for (chave, valor) in &self.atributos {
            saida.push(' ');
            saida.push_str(chave);
            saida.push_str("=\"");
            saida.push_str(&escape(valor.as_str()));
            saida.push('"');
        }
        if self.texto.is_empty() && self.filhos.is_empty() {
            saida.push_str("/>");
            return;
        }
        saida.push('>');
        saida.push_str(&escape(self.texto.as_str()));
        for filho in &self.filhos {
            filho.escrever(saida);
        }
        saida.push_str("</");
        saida.push_str(&self.nome);
        saida.push('>');
    }
}

fn abrir(tag: &BytesStart<'_>) -> Result<Elemento, SefazError> {
    let mut elemento = Elemento::novo(String::from_utf8_lossy(tag.name().as_ref()).into_owned());
    for attr in tag.attributes() {
        let attr = attr.map_err(|e| SefazError::Xml(e.to_string()))?;
        let chave = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let valor = attr.unescape_value()?.into_owned();
        elemento.atributos.push((chave, valor));
    }
    Ok(elemento)
}

fn anexar(
    pilha: &mut [Elemento],
    raiz: &mut Option<Elemento>,
    elemento: Elemento,
) -> Result<(), SefazError> {
    if let Some(pai) = pilha.last_mut() {
        pai.filhos.push(elemento);
        return Ok(());
    }
    if raiz.is_some() {
        return Err(SefazError::Xml("mais de um elemento raiz".into()));
    }
    *raiz = Some(elemento);
    Ok(())
}

/// Recorta o primeiro elemento `tag` (sem prefixo) exatamente como está no texto.
pub fn extrair<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let abertura = format!("<{tag}");
    let fechamento = format!("</{tag}>");
    let mut busca = 0;
    while let Some(pos) = xml[busca..].find(&abertura) {
        let inicio = busca + pos;
        let depois = &xml[inicio + abertura.len()..];
        match depois.chars().next() {
            Some(' ' | '>' | '\t' | '\r' | '\n') => {
                let fim = xml[inicio..].find(&fechamento)? + inicio + fechamento.len();
                return Some(&xml[inicio..fim]);
            }
            _ => busca = inicio + abertura.len(),
        }
    }
    None
}

/// Remove a declaração `<?xml ...?>` inicial, se houver.
pub fn sem_declaracao(xml: &str) -> &str {
    let xml = xml.trim_start();
    if xml.starts_with("<?xml")
        && let Some(fim) = xml.find("?>")
    {
        return xml[fim + 2..].trim_start();
    }
    xml
}

/// Envolve um conteúdo já serializado em um elemento.
pub fn envolver(nome: &str, atributos: &[(&str, &str)], conteudo: &str) -> String {
    let mut saida = format!("<{nome}");
    for (chave, valor) in atributos {
        saida.push_str(&format!(" {chave}=\"{}\"", escape(*valor)));
    }
    saida.push('>');
    saida.push_str(conteudo);
    saida.push_str(&format!("</{nome}>"));
    saida
}
