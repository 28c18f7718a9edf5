//! Assinatura digital, validação por esquema e validade do certificado.
//!
//! A mecânica de XML-DSig e a validação XSD pertencem a quem implementa
//! [`Assinador`]. A validação deve reunir todas as violações encontradas em
//! [`SefazError::Validacao`], não apenas a primeira.

use crate::error::SefazError;

pub trait Assinador {
    /// Assina o elemento `tag` de `xml` e devolve o documento assinado.
    fn assinar(&self, xml: &str, tag: &str) -> Result<String, SefazError>;

    /// Valida `xml` contra o arquivo de esquema `esquema`.
    fn validar(&self, xml: &str, esquema: &str) -> Result<(), SefazError>;

    fn certificado_valido(&self) -> bool;
}

/// Assinador para fluxos sem assinatura (consultas de situação e de recibo).
///
/// Recusa qualquer pedido de assinatura e não valida esquemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemAssinatura;

impl Assinador for SemAssinatura {
    fn assinar(&self, _xml: &str, tag: &str) -> Result<String, SefazError> {
        Err(SefazError::Assinatura(format!(
            "nenhum certificado configurado para assinar \"{tag}\""
        )))
    }

    fn validar(&self, _xml: &str, _esquema: &str) -> Result<(), SefazError> {
        Ok(())
    }

    fn certificado_valido(&self) -> bool {
        true
    }
}
