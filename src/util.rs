//! Funções auxiliares: dígito verificador, códigos IBGE de UF e datas.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

use crate::error::SefazError;

/// Códigos IBGE das unidades federativas.
const ESTADOS: &[(&str, u8)] = &[
    ("RO", 11),
    ("AC", 12),
    ("AM", 13),
    ("RR", 14),
    ("PA", 15),
    ("AP", 16),
    ("TO", 17),
    ("MA", 21),
    ("PI", 22),
    ("CE", 23),
    ("RN", 24),
    ("PB", 25),
    ("PE", 26),
    ("AL", 27),
    ("SE", 28),
    ("BA", 29),
    ("MG", 31),
    ("ES", 32),
    ("RJ", 33),
    ("SP", 35),
    ("PR", 41),
    ("SC", 42),
    ("RS", 43),
    ("MS", 50),
    ("MT", 51),
    ("GO", 52),
    ("DF", 53),
    ("AN", 91),
];

/// Converte a sigla da UF (ou o próprio código numérico) no código IBGE.
pub fn codigo_uf(uf: &str) -> Result<u8, SefazError> {
    let uf = uf.trim();
    if let Ok(codigo) = uf.parse::<u8>() {
        return Ok(codigo);
    }
    ESTADOS
        .iter()
        .find(|(sigla, _)| sigla.eq_ignore_ascii_case(uf))
        .map(|&(_, codigo)| codigo)
        .ok_or_else(|| SefazError::Formato(format!("UF \"{uf}\" desconhecida")))
}

/// Sigla da UF a partir do código IBGE.
pub fn sigla_uf(codigo: u8) -> Option<&'static str> {
    ESTADOS
        .iter()
        .find(|&&(_, c)| c == codigo)
        .map(|&(sigla, _)| sigla)
}

/// Dígito verificador módulo 11 com pesos de 2 a 9 da direita para a
/// esquerda. Restos que resultam em 10 ou 11 viram 0.
pub fn get_dac(numero: &str) -> u32 {
    let mut soma = 0u32;
    let mut peso = 2u32;
    for digito in numero.chars().rev().filter_map(|c| c.to_digit(10)) {
        soma += digito * peso;
        peso = if peso == 9 { 2 } else { peso + 1 };
    }
    let dv = 11 - soma % 11;
    if dv >= 10 { 0 } else { dv }
}

/// Confere o último dígito de `numero` contra [`get_dac`] do restante.
pub fn is_dac_valido(numero: &str) -> bool {
    let Some(ultimo) = numero.chars().last().and_then(|c| c.to_digit(10)) else {
        return false;
    };
    let corpo = &numero[..numero.len() - 1];
    !corpo.is_empty() && get_dac(corpo) == ultimo
}

/// Fuso usado quando a SEFAZ devolve data sem deslocamento (Brasília).
fn fuso_padrao() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).unwrap_or(Utc.fix())
}

/// Lê datas no formato `AAAA-MM-DDThh:mm:ss[TZD]`.
pub fn parse_data(valor: &str) -> Result<DateTime<FixedOffset>, SefazError> {
    let valor = valor.trim();
    if let Ok(data) = DateTime::parse_from_rfc3339(valor) {
        return Ok(data);
    }
    let local = NaiveDateTime::parse_from_str(valor, "%Y-%m-%dT%H:%M:%S")
        .map_err(|_| SefazError::Formato(format!("data \"{valor}\" inválida")))?;
    fuso_padrao()
        .from_local_datetime(&local)
        .single()
        .ok_or_else(|| SefazError::Formato(format!("data \"{valor}\" ambígua")))
}

/// Formata no padrão dos leiautes: `2017-03-05T10:20:30-03:00`.
pub fn formatar_data(data: &DateTime<FixedOffset>) -> String {
    data.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Data e hora atuais no fuso de Brasília.
pub fn agora() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&fuso_padrao())
}
