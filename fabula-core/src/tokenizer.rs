//! # Tokenizador de Referência
//!
//! Divide o texto bruto de uma fabula em tokens, preservando a posição original
//! de cada um. Não pretende ser um tokenizador completo: o modelo NER externo
//! traz o seu próprio. Este existe para o reconhecedor léxico embutido e para os
//! testes, e segue as mesmas convenções que os padrões esperam.
//!
//! ## Regras
//!
//! - Espaços separam tokens e nunca fazem parte deles.
//! - Símbolos e pontuação (`№`, `#`, `:`, `×`, ...) viram tokens de um caractere.
//! - `-` e `/` ficam dentro da palavra quando seguidos de letra ou dígito (`АБ-1234`).
//! - `.` e `,` entre dígitos ficam no token (`7.62`, `7,62`); `.` seguido de
//!   dígito inicia um token (`.30`).
//! - `x`/`х` entre um prefixo puramente numérico e um dígito é separado
//!   (`7.62х39` → `7.62`, `х`, `39`). Com prefixo alfabético o token continua
//!   fundido (`к7.62х39мм`).
//!
//! ```rust
//! use fabula_core::tokenizer::tokenize;
//!
//! let tokens = tokenize("калібр 7.62х39");
//! let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
//! assert_eq!(texts, vec!["калібр", "7.62", "х", "39"]);
//! ```

use serde::{Deserialize, Serialize};

/// Um token extraído do texto original.
///
/// `start`/`end` são offsets em **caracteres** (o que os consumidores da API
/// recebem); `byte_start`/`byte_end` descrevem o mesmo intervalo em bytes UTF-8
/// e servem apenas para recortar o texto.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    /// Texto cru do token (ex: "Калібр", "7.62", "№").
    pub text: String,
    /// Forma minúscula, usada pelos predicados `LOWER`.
    pub lower: String,
    /// Caractere inicial (inclusivo).
    pub start: usize,
    /// Caractere final (exclusivo).
    pub end: usize,
    pub byte_start: usize,
    pub byte_end: usize,
    /// Índice sequencial do token no documento.
    pub index: usize,
}

impl Token {
    /// Cria um token; `index` é atribuído pelo tokenizador.
    pub fn new(text: &str, start: usize, byte_start: usize) -> Self {
        Self {
            text: text.to_string(),
            lower: text.to_lowercase(),
            start,
            end: start + text.chars().count(),
            byte_start,
            byte_end: byte_start + text.len(),
            index: 0,
        }
    }
}

/// Separadores de calibre que podem aparecer colados aos números.
const NUMERIC_INFIXES: &[char] = &['x', 'х', 'X', 'Х'];

/// Tokeniza um texto.
pub fn tokenize(text: &str) -> Vec<Token> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut tokens = Vec::new();
    let mut current = Pending::default();

    for (char_pos, &(byte_pos, ch)) in chars.iter().enumerate() {
        let next = chars.get(char_pos + 1).map(|(_, c)| *c);
        let next_is_digit = next.map(|c| c.is_ascii_digit()).unwrap_or(false);
        let next_is_alnum = next.map(char::is_alphanumeric).unwrap_or(false);

        if NUMERIC_INFIXES.contains(&ch) && current.is_numeric() && next_is_digit {
            current.flush(&mut tokens);
            push_single(&mut tokens, ch, char_pos, byte_pos);
        } else if ch.is_alphanumeric() {
            current.push(ch, char_pos, byte_pos);
        } else if (ch == '-' || ch == '/') && !current.is_empty() && next_is_alnum {
            current.push(ch, char_pos, byte_pos);
        } else if (ch == '.' || ch == ',') && current.ends_with_digit() && next_is_digit {
            current.push(ch, char_pos, byte_pos);
        } else if ch == '.' && current.is_empty() && next_is_digit {
            current.push(ch, char_pos, byte_pos);
        } else if ch.is_whitespace() {
            current.flush(&mut tokens);
        } else {
            current.flush(&mut tokens);
            push_single(&mut tokens, ch, char_pos, byte_pos);
        }
    }
    current.flush(&mut tokens);

    for (i, token) in tokens.iter_mut().enumerate() {
        token.index = i;
    }
    tokens
}

/// Token em construção
#[derive(Default)]
struct Pending {
    text: String,
    start: usize,
    byte_start: usize,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn push(&mut self, ch: char, char_pos: usize, byte_pos: usize) {
        if self.text.is_empty() {
            self.start = char_pos;
            self.byte_start = byte_pos;
        }
        self.text.push(ch);
    }

    fn ends_with_digit(&self) -> bool {
        self.text.chars().last().map(|c| c.is_ascii_digit()).unwrap_or(false)
    }

    /// Só dígitos e separadores decimais, com pelo menos um dígito
    fn is_numeric(&self) -> bool {
        self.ends_with_digit() && self.text.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
    }

    fn flush(&mut self, tokens: &mut Vec<Token>) {
        if !self.text.is_empty() {
            tokens.push(Token::new(&self.text, self.start, self.byte_start));
            self.text.clear();
        }
    }
}

fn push_single(tokens: &mut Vec<Token>, ch: char, char_pos: usize, byte_pos: usize) {
    let mut buf = [0u8; 4];
    tokens.push(Token::new(ch.encode_utf8(&mut buf), char_pos, byte_pos));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(text: &str) -> Vec<String> {
        tokenize(text).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_tokenize_basic() {
        assert_eq!(texts("Вилучено пістолет ПМ."), vec!["Вилучено", "пістолет", "ПМ", "."]);
    }

    #[test]
    fn test_marker_symbols_split() {
        assert_eq!(texts("№123456"), vec!["№", "123456"]);
        assert_eq!(texts("#АБ-1234:"), vec!["#", "АБ-1234", ":"]);
    }

    #[test]
    fn test_decimal_numbers_stay_together() {
        assert_eq!(texts("калібр 7.62 мм"), vec!["калібр", "7.62", "мм"]);
        assert_eq!(texts("кал. 5,45"), vec!["кал", ".", "5,45"]);
        assert_eq!(texts("кал .30"), vec!["кал", ".30"]);
    }

    #[test]
    fn test_numeric_infix_split() {
        assert_eq!(texts("7.62x39"), vec!["7.62", "x", "39"]);
        assert_eq!(texts("к7.62х39мм"), vec!["к7.62х39мм"]);
    }

    #[test]
    fn test_uppercase_numeric_infix_split() {
        assert_eq!(texts("7.62X39"), vec!["7.62", "X", "39"]);
        assert_eq!(texts("калібр 7.62Х39"), vec!["калібр", "7.62", "Х", "39"]);
        assert_eq!(texts("АК-74 ХХ"), vec!["АК-74", "ХХ"]);
    }

    #[test]
    fn test_char_offsets_for_cyrillic() {
        let tokens = tokenize("ном 12");
        assert_eq!(tokens[0].start, 0);
        assert_eq!(tokens[0].end, 3);
        assert_eq!(tokens[0].byte_end, 6);
        assert_eq!(tokens[1].start, 4);
        assert_eq!(tokens[1].byte_start, 7);
        assert_eq!(tokens[1].index, 1);
    }

    #[test]
    fn test_lowercase_form() {
        let tokens = tokenize("НОМЕР");
        assert_eq!(tokens[0].lower, "номер");
    }

    #[test]
    fn test_empty() {
        assert!(tokenize("   ").is_empty());
    }
}
