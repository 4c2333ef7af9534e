//! # Erros do Núcleo de Extração
//!
//! Cada estágio do pipeline tem seu próprio tipo de erro. A política geral é
//! conter a falha no menor escopo possível:
//!
//! - [`CompileError`]: um padrão inválido é descartado; o resto da tabela compila.
//! - [`ExtractionError`]: nunca chega ao chamador; vira o valor de *fallback*
//!   (o segmento inteiro) e é apenas registrado em log.
//! - [`RecognizeError`]: falha do reconhecedor de entidades; é a única que
//!   derruba a análise de um documento.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::pattern::AttributeKind;

/// Padrão estruturalmente inválido, identificado pela tabela e pelo índice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct CompileError {
    pub kind: AttributeKind,
    /// Índice do padrão na tabela original; `None` quando a falha é do regex auxiliar da tabela
    pub index: Option<usize>,
    pub reason: CompileErrorReason,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "padrão {}#{} inválido: {}", self.kind, index, self.reason),
            None => write!(f, "tabela {} inválida: {}", self.kind, self.reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorReason {
    #[error("padrão vazio")]
    EmptyPattern,
    #[error("predicado {0} sem modo de casamento (TEXT ou LOWER)")]
    MissingMode(usize),
    #[error("predicado {0} define TEXT e LOWER ao mesmo tempo")]
    AmbiguousMode(usize),
    #[error("predicado {0}: REGEX só é suportado sobre TEXT")]
    UnsupportedRegexOnLower(usize),
    #[error("predicado {0}: operador {1:?} não suportado (apenas \"?\")")]
    UnsupportedOperator(usize, String),
    #[error("predicado {0}: conjunto IN vazio")]
    EmptySet(usize),
    #[error("predicado {0}: LENGTH com min > max")]
    InvalidLength(usize),
    #[error("predicado {0}: regex inválido: {1}")]
    InvalidRegex(usize, String),
    #[error("regex auxiliar de valor inválido: {0}")]
    InvalidValueRegex(String),
}

/// Falha ao isolar o valor de um candidato. Sempre tratada como *fallback*.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("nenhum predicado de valor no padrão")]
    NoValuePredicates,
    #[error("segmento com {segment} tokens, esperados ao menos {expected}")]
    SegmentTooShort { segment: usize, expected: usize },
    #[error("alinhamento de predicados inconsistente com o segmento")]
    MisalignedMatch,
    #[error("tabela sem regex auxiliar para token fundido")]
    MissingValueRegex,
    #[error("regex auxiliar não encontrou valor no token")]
    FusedValueNotFound,
}

/// Falha do reconhecedor de entidades (modelo NER externo ou léxico embutido).
#[derive(Debug, Error)]
pub enum RecognizeError {
    #[error("texto vazio")]
    EmptyText,
    #[error("falha no modelo de reconhecimento: {0}")]
    Model(String),
}

/// Falha ao carregar uma tabela de padrões de arquivo.
#[derive(Debug, Error)]
pub enum PatternLoadError {
    #[error("falha ao ler {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON de padrões inválido: {0}")]
    Json(#[from] serde_json::Error),
}

/// Falha de persistência das estatísticas.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("falha de E/S em {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("falha ao serializar estatísticas: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("lock das estatísticas envenenado")]
    Poisoned,
}

/// Configuração inválida vinda do ambiente.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("valor inválido para {key}: {value:?}")]
    InvalidValue { key: String, value: String },
    #[error(transparent)]
    Patterns(#[from] PatternLoadError),
    #[error("{path} contém padrões de {found}, esperado {expected}")]
    WrongTableKind {
        path: PathBuf,
        expected: AttributeKind,
        found: AttributeKind,
    },
}
