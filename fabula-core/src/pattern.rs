//! # Tabelas de Padrões — Números de Série e Calibres
//!
//! Os padrões são **dados**, não código: cada padrão é uma sequência ordenada de
//! predicados de token, endereçada por um índice estável na sua tabela. O
//! compilador, o matcher e o extrator são estágios separados que operam sobre
//! a mesma tabela.
//!
//! ## Formato
//!
//! O formato serializado é o dialeto de padrões de token usado pelo serviço
//! (o mesmo dos matchers de token clássicos):
//!
//! ```json
//! [{"LOWER": {"IN": ["калібр", "кал"]}},
//!  {"TEXT": {"IN": [".", ":", "-"]}, "OP": "?"},
//!  {"TEXT": {"REGEX": "\\d{1,2}(?:[.,]\\d{1,3})?"}, "ROLE": "value"},
//!  {"LOWER": {"IN": ["мм", "mm"]}, "OP": "?", "ROLE": "unit"}]
//! ```
//!
//! - `TEXT` compara o texto cru; `LOWER` compara a forma minúscula.
//! - O valor pode ser uma string exata, `{"IN": [...]}` ou `{"REGEX": "..."}`
//!   (casamento completo, apenas sob `TEXT`).
//! - `"OP": "?"` torna o predicado opcional (zero ou um token).
//! - `LENGTH` limita o comprimento do token em caracteres. O motor de regex não
//!   tem *lookahead*, então "2–20 caracteres com ao menos um dígito" vira um
//!   regex mais um limite.
//! - `ROLE` é a dica de extração: `marker` (padrão), `value`, `unit` ou `fused`.
//!   O compilador a remove; só o extrator de valores a consulta.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PatternLoadError;

// --- Famílias de regex -------------------------------------------------------

/// Número de série inteiro num único token.
pub const SERIAL_TOKEN_REGEX: &str =
    r"[A-Za-zА-Яа-яЇїІіЄєҐґ0-9](?:[A-Za-zА-Яа-яЇїІіЄєҐґ0-9./-]{0,23}[A-Za-zА-Яа-яЇїІіЄєҐґ0-9])?|[A-Za-zА-Яа-яЇїІіЄєҐґ0-9]{2,25}";
/// Prefixo alfabético de 2 a 7 letras (ex: "АБ" em "АБ 123456").
pub const SERIAL_PREFIX_REGEX: &str = r"[A-Za-zА-Яа-яЇїІіЄєҐґ]{2,7}";
/// Prefixo de uma única letra.
pub const SERIAL_SINGLE_LETTER_PREFIX_REGEX: &str = r"[A-Za-zА-Яа-яЇїІіЄєҐґ]";
/// Sufixo alfanumérico com separadores e ao menos um dígito (2–20 caracteres via `LENGTH`).
pub const SERIAL_SUFFIX_REGEX: &str =
    r"[A-Za-zА-Яа-яЇїІіЄєҐґ0-9./-]*[0-9][A-Za-zА-Яа-яЇїІіЄєҐґ0-9./-]*";
pub const SERIAL_SUFFIX_LENGTH: LengthBound = LengthBound { min: Some(2), max: Some(20) };

/// Parte numérica do calibre: decimal de 1–2 dígitos, decimal iniciado por ponto
/// ou um dos calibres de espingarda.
pub const NUMERIC_CALIBER_PART_REGEX: &str =
    r"(?:\d{1,2}(?:[.,]\d{1,3})?|\.\d{2,3}|(?:4|8|10|12|16|20|24|28|32|36))";
/// Segunda parte de calibres "NxM" (ex: "39", "54R").
pub const SECOND_NUM_PART_REGEX: &str = r"\d{2,3}[A-Za-zА-Яа-я]?";

pub const SERIAL_SYMBOL_MARKERS: &[&str] = &["№", "#"];
pub const SERIAL_WORD_MARKERS: &[&str] = &["номер", "ном", "н", "маркування"];
/// Marcadores abreviados que também aparecem com ponto obrigatório ("н. 123").
const SERIAL_DOTTED_MARKERS: &[&str] = &["ном", "н"];

pub const CALIBER_MARKERS: &[&str] = &["калібр", "кал", "кл"];
pub const CALIBER_ABBR_MARKER: &str = "к";
pub const CALIBER_SUFFIX_MARKER: &str = "калібру";
pub const CALIBER_SEPARATORS: &[&str] = &["x", "х", "×"];
pub const CALIBER_UNITS: &[&str] = &["мм", "mm"];

/// `к7.62мм`, `К-9мм`
pub fn k_num_mm_single_token_regex() -> String {
    format!(r"[кК][.-]?{NUMERIC_CALIBER_PART_REGEX}(?:мм|mm)?")
}

/// `к7.62х39мм`
pub fn k_numxnum_mm_single_token_regex() -> String {
    format!(r"[кК][.-]?{NUMERIC_CALIBER_PART_REGEX}[xхXХ×]{SECOND_NUM_PART_REGEX}(?:мм|mm)?")
}

/// `7.62калібру`
pub fn num_kalibru_single_token_regex() -> String {
    format!(r"{NUMERIC_CALIBER_PART_REGEX}[Кк][Аа][Лл][Іі][Бб][Рр][Уу]")
}

/// `7.62х39калібру`
pub fn numxnum_kalibru_single_token_regex() -> String {
    format!(r"{NUMERIC_CALIBER_PART_REGEX}[xхXХ×]{SECOND_NUM_PART_REGEX}[Кк][Аа][Лл][Іі][Бб][Рр][Уу]")
}

/// Regex auxiliar que isola o núcleo numérico de um calibre fundido.
///
/// A letra da segunda parte é restrita ao latim para não engolir o "к" de
/// "калібру".
pub fn caliber_value_regex() -> String {
    format!(r"{NUMERIC_CALIBER_PART_REGEX}(?:[xхXХ×]\d{{2,3}}(?:мм|mm|[A-Za-z](?:мм|mm)?)?)?(?:мм|mm)?")
}

// --- Modelo de dados ---------------------------------------------------------

/// Tipo de atributo extraído; cada tipo tem a sua tabela.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    SerialNumber,
    Caliber,
}

impl AttributeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::SerialNumber => "serial_number",
            AttributeKind::Caliber => "caliber",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identificador estável de um padrão: a tabela e o índice dentro dela.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatternId {
    pub kind: AttributeKind,
    pub index: usize,
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.index)
    }
}

/// Papel do predicado na extração do valor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueRole {
    /// Contexto (marcador, pontuação); não entra no valor.
    #[default]
    Marker,
    /// Contribui para o valor emitido.
    Value,
    /// Qualificador após o valor (ex: "мм"); não entra no valor.
    Unit,
    /// Valor e marcador fundidos num token; o valor sai do regex auxiliar.
    Fused,
}

impl ValueRole {
    fn is_marker(&self) -> bool {
        *self == ValueRole::Marker
    }
}

/// Forma do valor de `TEXT` / `LOWER`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueSpec {
    Exact(String),
    In {
        #[serde(rename = "IN")]
        values: Vec<String>,
    },
    Regex {
        #[serde(rename = "REGEX")]
        pattern: String,
    },
}

/// Limite de comprimento do token, em caracteres (inclusivo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LengthBound {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
}

/// Descritor cru de um predicado de token, como escrito na tabela.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredicateDef {
    #[serde(rename = "TEXT", default, skip_serializing_if = "Option::is_none")]
    pub text: Option<ValueSpec>,
    #[serde(rename = "LOWER", default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<ValueSpec>,
    #[serde(rename = "OP", default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(rename = "LENGTH", default, skip_serializing_if = "Option::is_none")]
    pub length: Option<LengthBound>,
    #[serde(rename = "ROLE", default, skip_serializing_if = "ValueRole::is_marker")]
    pub role: ValueRole,
}

impl PredicateDef {
    pub fn text(value: &str) -> Self {
        Self { text: Some(ValueSpec::Exact(value.to_string())), ..Self::default() }
    }

    pub fn text_in(values: &[&str]) -> Self {
        Self { text: Some(ValueSpec::In { values: to_strings(values) }), ..Self::default() }
    }

    pub fn lower(value: &str) -> Self {
        Self { lower: Some(ValueSpec::Exact(value.to_string())), ..Self::default() }
    }

    pub fn lower_in(values: &[&str]) -> Self {
        Self { lower: Some(ValueSpec::In { values: to_strings(values) }), ..Self::default() }
    }

    pub fn regex(pattern: &str) -> Self {
        Self { text: Some(ValueSpec::Regex { pattern: pattern.to_string() }), ..Self::default() }
    }

    /// Marca como opcional (`"OP": "?"`).
    pub fn optional(mut self) -> Self {
        self.op = Some("?".to_string());
        self
    }

    pub fn with_role(mut self, role: ValueRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_length(mut self, bound: LengthBound) -> Self {
        self.length = Some(bound);
        self
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Sequência ordenada de predicados.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternDef {
    pub predicates: Vec<PredicateDef>,
}

impl PatternDef {
    pub fn new(predicates: Vec<PredicateDef>) -> Self {
        Self { predicates }
    }

    /// Padrão de um único token fundido (valor + marcador).
    pub fn is_fused(&self) -> bool {
        self.predicates.len() == 1 && self.predicates[0].role == ValueRole::Fused
    }
}

/// Tabela de padrões de um tipo de atributo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternTable {
    pub kind: AttributeKind,
    pub patterns: Vec<PatternDef>,
    /// Regex auxiliar aplicado a tokens fundidos (busca, não casamento completo).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_regex: Option<String>,
}

impl PatternTable {
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Padrão de origem de um id. `None` se o id for de outra tabela.
    pub fn get(&self, id: PatternId) -> Option<&PatternDef> {
        if id.kind != self.kind {
            return None;
        }
        self.patterns.get(id.index)
    }

    pub fn from_json_str(json: &str) -> Result<Self, PatternLoadError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PatternLoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PatternLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }
}

// --- Tabelas embutidas -------------------------------------------------------

fn serial_single() -> PredicateDef {
    PredicateDef::regex(SERIAL_TOKEN_REGEX).with_role(ValueRole::Value)
}

fn serial_prefix() -> PredicateDef {
    PredicateDef::regex(SERIAL_PREFIX_REGEX).with_role(ValueRole::Value)
}

fn serial_single_letter_prefix() -> PredicateDef {
    PredicateDef::regex(SERIAL_SINGLE_LETTER_PREFIX_REGEX).with_role(ValueRole::Value)
}

fn serial_suffix() -> PredicateDef {
    PredicateDef::regex(SERIAL_SUFFIX_REGEX)
        .with_length(SERIAL_SUFFIX_LENGTH)
        .with_role(ValueRole::Value)
}

/// As três formas de número: token único, prefixo+sufixo, letra+sufixo.
fn serial_bodies() -> Vec<Vec<PredicateDef>> {
    vec![
        vec![serial_single()],
        vec![serial_prefix(), serial_suffix()],
        vec![serial_single_letter_prefix(), serial_suffix()],
    ]
}

fn sequence(head: &[PredicateDef], body: &[PredicateDef]) -> PatternDef {
    PatternDef::new(head.iter().chain(body).cloned().collect())
}

/// Padrões de número de série: marcador (`№`, `#`, "номер", ...) seguido do número.
pub fn serial_number_table() -> PatternTable {
    let mut patterns = Vec::new();

    for marker in SERIAL_SYMBOL_MARKERS {
        let marker = PredicateDef::text(marker);
        let colon = PredicateDef::text(":").optional();
        for body in serial_bodies() {
            patterns.push(sequence(&[marker.clone(), colon.clone()], &body));
            patterns.push(sequence(&[marker.clone()], &body));
        }
    }

    for word in SERIAL_WORD_MARKERS {
        let marker = PredicateDef::lower(word);
        let separator = PredicateDef::text_in(&[":", "."]).optional();
        for body in serial_bodies() {
            patterns.push(sequence(&[marker.clone(), separator.clone()], &body));
            patterns.push(sequence(&[marker.clone()], &body));
        }
        if SERIAL_DOTTED_MARKERS.contains(word) {
            for body in serial_bodies() {
                patterns.push(sequence(&[marker.clone(), PredicateDef::text(".")], &body));
            }
        }
    }

    PatternTable { kind: AttributeKind::SerialNumber, patterns, value_regex: None }
}

/// Padrões de calibre: marcador antes do valor, valor antes de "калібру" e
/// as formas fundidas num único token.
pub fn caliber_table() -> PatternTable {
    let marker = PredicateDef::lower_in(CALIBER_MARKERS);
    let abbr_marker = PredicateDef::lower(CALIBER_ABBR_MARKER);
    let suffix_marker = PredicateDef::lower(CALIBER_SUFFIX_MARKER);
    let separator = PredicateDef::text_in(&[".", ":", "-"]).optional();
    let num = PredicateDef::regex(NUMERIC_CALIBER_PART_REGEX).with_role(ValueRole::Value);
    let x_sep = PredicateDef::lower_in(CALIBER_SEPARATORS).with_role(ValueRole::Value);
    let num2 = PredicateDef::regex(SECOND_NUM_PART_REGEX).with_role(ValueRole::Value);
    let unit = PredicateDef::lower_in(CALIBER_UNITS).optional().with_role(ValueRole::Unit);
    let fused = |pattern: String| PatternDef::new(vec![PredicateDef::regex(&pattern).with_role(ValueRole::Fused)]);

    let patterns = vec![
        // "калібр 7.62 мм", "кал. 7.62х39"
        PatternDef::new(vec![marker.clone(), separator.clone(), num.clone(), unit.clone()]),
        PatternDef::new(vec![
            marker,
            separator.clone(),
            num.clone(),
            x_sep.clone(),
            num2.clone(),
            unit.clone(),
        ]),
        // "к. 9 мм"
        PatternDef::new(vec![abbr_marker.clone(), separator.clone(), num.clone(), unit.clone()]),
        PatternDef::new(vec![abbr_marker, separator, num.clone(), x_sep.clone(), num2.clone(), unit]),
        fused(k_num_mm_single_token_regex()),
        fused(k_numxnum_mm_single_token_regex()),
        // "7.62 калібру"
        PatternDef::new(vec![num.clone(), suffix_marker.clone()]),
        PatternDef::new(vec![num, x_sep, num2, suffix_marker]),
        fused(num_kalibru_single_token_regex()),
        fused(numxnum_kalibru_single_token_regex()),
    ];

    PatternTable { kind: AttributeKind::Caliber, patterns, value_regex: Some(caliber_value_regex()) }
}
