//! Declaration-header parsing.
//!
//! Grammar (case-insensitive, one declaration per line):
//!
//! ```text
//! Decl     = DeclType ident [";"] ["#" comment]
//! DeclType = "digital_input" | "digital_output"
//!          | "analogue_input" | "analogue_output"
//! ```
//!
//! Blank lines and `#` comments may appear between declarations. The header
//! ends at the first line that is none of those; everything from there on is
//! body text. Header-region lines are neutralised to `//` comments in the
//! compiled body so evaluator diagnostics keep their source line numbers.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

fn decl_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^(digital_input|digital_output|analogue_input|analogue_output)\s+([A-Za-z_][A-Za-z0-9_]*)\s*;?\s*(#.*)?$",
        )
        .expect("declaration pattern is valid")
    })
}

/// The four declarable variable kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    DigitalInput,
    DigitalOutput,
    AnalogueInput,
    AnalogueOutput,
}

impl DeclKind {
    fn from_keyword(word: &str) -> Option<Self> {
        Some(match word.to_ascii_lowercase().as_str() {
            "digital_input" => Self::DigitalInput,
            "digital_output" => Self::DigitalOutput,
            "analogue_input" => Self::AnalogueInput,
            "analogue_output" => Self::AnalogueOutput,
            _ => return None,
        })
    }

    pub fn is_input(self) -> bool {
        matches!(self, Self::DigitalInput | Self::AnalogueInput)
    }

    pub fn is_output(self) -> bool {
        !self.is_input()
    }

    pub fn is_digital(self) -> bool {
        matches!(self, Self::DigitalInput | Self::DigitalOutput)
    }
}

/// One parsed declaration, serialisable for the validation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    #[serde(rename = "type")]
    pub kind: DeclKind,
    pub name: String,
}

/// Header declarations plus the compiled body text.
#[derive(Debug, Clone)]
pub struct ParsedScript {
    pub declarations: Vec<Declaration>,
    /// Body with header-region lines turned into `//` comments; line
    /// numbers match the source.
    pub body: String,
}

impl ParsedScript {
    /// True when the body holds no executable statements.
    pub fn body_is_empty(&self) -> bool {
        self.body
            .lines()
            .all(|l| l.trim().is_empty() || l.trim().starts_with("//"))
    }
}

/// Split a script into declarations and body.
pub fn parse_header(code: &str) -> ParsedScript {
    let mut declarations = Vec::new();
    let mut body_lines = Vec::new();
    let mut in_header = true;

    for line in code.lines() {
        let stripped = line.trim();

        if in_header {
            if stripped.is_empty() {
                body_lines.push(String::new());
                continue;
            }
            if stripped.starts_with('#') {
                body_lines.push(format!("// {stripped}"));
                continue;
            }
            let decl = decl_pattern()
                .captures(stripped)
                .and_then(|caps| {
                    DeclKind::from_keyword(&caps[1])
                        .map(|kind| Declaration { kind, name: caps[2].to_string() })
                });
            if let Some(decl) = decl {
                declarations.push(decl);
                body_lines.push(format!("// {stripped}"));
                continue;
            }
            in_header = false;
        }
        body_lines.push(line.to_string());
    }

    ParsedScript { declarations, body: body_lines.join("\n") }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_declarations_case_insensitively() {
        let parsed = parse_header(
            "digital_input run\nANALOGUE_INPUT temp;\nAnalogue_Output valve ; # actuator\n",
        );
        assert_eq!(
            parsed.declarations,
            vec![
                Declaration { kind: DeclKind::DigitalInput, name: "run".to_string() },
                Declaration { kind: DeclKind::AnalogueInput, name: "temp".to_string() },
                Declaration { kind: DeclKind::AnalogueOutput, name: "valve".to_string() },
            ]
        );
        assert!(parsed.body_is_empty());
    }

    #[test]
    fn header_tolerates_blanks_and_comments() {
        let parsed = parse_header("# setpoints\n\nanalogue_input x\n\nx + 1;\n");
        assert_eq!(parsed.declarations.len(), 1);
        assert!(!parsed.body_is_empty());
    }

    #[test]
    fn header_ends_at_first_body_line() {
        let parsed = parse_header("analogue_input x\ny = x;\nanalogue_output y\n");
        // The trailing declaration-shaped line is body text, not a decl.
        assert_eq!(parsed.declarations.len(), 1);
        let lines: Vec<&str> = parsed.body.lines().collect();
        assert_eq!(lines[1], "y = x;");
        assert_eq!(lines[2], "analogue_output y");
    }

    #[test]
    fn body_keeps_source_line_numbers() {
        let parsed = parse_header("analogue_input x\nanalogue_output y\ny = x * 2 + 1;\n");
        let lines: Vec<&str> = parsed.body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("//"));
        assert!(lines[1].starts_with("//"));
        assert_eq!(lines[2], "y = x * 2 + 1;");
    }

    #[test]
    fn identifier_must_lead_with_letter_or_underscore() {
        let parsed = parse_header("digital_input 9lives\n");
        assert!(parsed.declarations.is_empty());
        // The malformed line ended the header and stays in the body.
        assert!(parsed.body.contains("9lives"));
    }
}
