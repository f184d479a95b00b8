//! Netlist tokenizer.
//!
//! Statements are line-oriented. Whitespace separates tokens; `:`, `,`
//! and `-` are always self-contained tokens; everything else (names,
//! `part.pin` references, value literals like `10k_Ohm`) forms a word.
//! `//` comments run to the end of the line, `/* */` comments may span
//! lines.

/// Token kinds of the netlist language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A name, pin reference or value literal.
    Word(String),
    Colon,
    Comma,
    Dash,
}

impl Token {
    /// The word's text, if this is a word.
    pub fn word(&self) -> Option<&str> {
        match self {
            Token::Word(w) => Some(w),
            _ => None,
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Word(w) => f.write_str(w),
            Token::Colon => f.write_str(":"),
            Token::Comma => f.write_str(","),
            Token::Dash => f.write_str("-"),
        }
    }
}

/// One netlist line worth of tokens, with its 1-based line number.
#[derive(Debug, Clone)]
pub struct Line {
    pub number: usize,
    pub tokens: Vec<Token>,
}

/// Tokenizer carrying block-comment state across lines.
#[derive(Debug, Default)]
pub struct Lexer {
    in_block_comment: bool,
}

impl Lexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenize a full netlist; empty lines are dropped.
    pub fn tokenize(input: &str) -> Vec<Line> {
        let mut lexer = Lexer::new();
        input
            .lines()
            .enumerate()
            .filter_map(|(idx, line)| {
                let tokens = lexer.tokenize_line(line);
                if tokens.is_empty() {
                    None
                } else {
                    Some(Line {
                        number: idx + 1,
                        tokens,
                    })
                }
            })
            .collect()
    }

    fn tokenize_line(&mut self, line: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut word = String::new();
        let mut chars = line.chars().peekable();

        let flush = |word: &mut String, tokens: &mut Vec<Token>| {
            if !word.is_empty() {
                tokens.push(Token::Word(std::mem::take(word)));
            }
        };

        while let Some(ch) = chars.next() {
            if self.in_block_comment {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    self.in_block_comment = false;
                }
                continue;
            }
            match ch {
                '/' if chars.peek() == Some(&'/') => {
                    flush(&mut word, &mut tokens);
                    break;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    flush(&mut word, &mut tokens);
                    self.in_block_comment = true;
                }
                ':' => {
                    flush(&mut word, &mut tokens);
                    tokens.push(Token::Colon);
                }
                ',' => {
                    flush(&mut word, &mut tokens);
                    tokens.push(Token::Comma);
                }
                '-' => {
                    flush(&mut word, &mut tokens);
                    tokens.push(Token::Dash);
                }
                c if c.is_whitespace() => flush(&mut word, &mut tokens),
                c => word.push(c),
            }
        }
        flush(&mut word, &mut tokens);
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(line: &Line) -> Vec<String> {
        line.tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_declaration_line() {
        let lines = Lexer::tokenize("resistor R1 : 10k_Ohm");
        assert_eq!(lines.len(), 1);
        assert_eq!(words(&lines[0]), ["resistor", "R1", ":", "10k_Ohm"]);
    }

    #[test]
    fn test_punctuation_is_self_contained() {
        let lines = Lexer::tokenize("V1-R1.0");
        assert_eq!(words(&lines[0]), ["V1", "-", "R1.0"]);

        let lines = Lexer::tokenize("ac_voltage_source V1:60_Hz,5_V");
        assert_eq!(
            words(&lines[0]),
            ["ac_voltage_source", "V1", ":", "60_Hz", ",", "5_V"]
        );
    }

    #[test]
    fn test_line_numbers_skip_blanks() {
        let lines = Lexer::tokenize("resistor R1 : 1_Ohm\n\n\nR1 - GND");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].number, 1);
        assert_eq!(lines[1].number, 4);
    }

    #[test]
    fn test_line_comment() {
        let lines = Lexer::tokenize("R1 - GND // tie it down\n// whole line");
        assert_eq!(lines.len(), 1);
        assert_eq!(words(&lines[0]), ["R1", "-", "GND"]);
    }

    #[test]
    fn test_block_comment_spans_lines() {
        let lines = Lexer::tokenize("R1 /* inline */ - GND\n/* spans\nlines */ R2 - GND");
        assert_eq!(lines.len(), 2);
        assert_eq!(words(&lines[0]), ["R1", "-", "GND"]);
        assert_eq!(lines[1].number, 3);
        assert_eq!(words(&lines[1]), ["R2", "-", "GND"]);
    }
}
