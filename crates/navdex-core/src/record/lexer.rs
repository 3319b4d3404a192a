//! Field splitting for record lines.
//!
//! ## Grammar
//!
//! ```text
//! <line>     := <field> ("," <field>)*
//! <field>    := <quoted> | <bare>
//! <quoted>   := '"' (<char> | '""')* '"'
//! <bare>     := [^,]*
//! ```
//!
//! Inside a quoted field commas are literal and `""` is a literal quote. An
//! opening quote commits the field to the quoted form, so an unterminated
//! quote is a syntax error rather than a bare field.

use winnow::combinator::{alt, cut_err, opt, preceded, separated};
use winnow::prelude::*;
use winnow::token::take_till;
use winnow::ModalResult;

use super::RecordError;

/// Split one record line into its raw fields.
pub fn split_fields(line: &str) -> Result<Vec<String>, RecordError> {
    parse_fields.parse(line).map_err(|e| RecordError::Syntax {
        column: e.offset() + 1,
    })
}

// ============================================================================
// Parser implementation using winnow
// ============================================================================

fn parse_fields(input: &mut &str) -> ModalResult<Vec<String>> {
    separated(1.., parse_field, ',').parse_next(input)
}

fn parse_field(input: &mut &str) -> ModalResult<String> {
    alt((preceded('"', cut_err(parse_quoted_body)), parse_bare)).parse_next(input)
}

/// Body of a quoted field, after the opening quote.
fn parse_quoted_body(input: &mut &str) -> ModalResult<String> {
    let mut out = String::new();
    loop {
        let chunk: &str = take_till(0.., '"').parse_next(input)?;
        out.push_str(chunk);
        '"'.parse_next(input)?;
        if opt('"').parse_next(input)?.is_some() {
            out.push('"');
        } else {
            return Ok(out);
        }
    }
}

fn parse_bare(input: &mut &str) -> ModalResult<String> {
    take_till(0.., ',')
        .map(|s: &str| s.to_string())
        .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_bare_fields() {
        assert_eq!(
            split_fields("function,id,12,qualname,foo::bar").unwrap(),
            vec!["function", "id", "12", "qualname", "foo::bar"]
        );
    }

    #[test]
    fn quoted_fields_keep_commas() {
        assert_eq!(
            split_fields("variable,value,\"1, 2\",name,x").unwrap(),
            vec!["variable", "value", "1, 2", "name", "x"]
        );
    }

    #[test]
    fn doubled_quotes_are_literal() {
        assert_eq!(
            split_fields(r#"variable,value,"say ""hi""""#).unwrap(),
            vec!["variable", "value", r#"say "hi""#]
        );
    }

    #[test]
    fn empty_fields_are_preserved() {
        assert_eq!(
            split_fields("fn_call,declid,,refid,3").unwrap(),
            vec!["fn_call", "declid", "", "refid", "3"]
        );
        assert_eq!(split_fields("end_external_crates").unwrap(), vec!["end_external_crates"]);
    }

    #[test]
    fn unterminated_quote_is_a_syntax_error() {
        let err = split_fields("struct,qualname,\"foo::Bar").unwrap_err();
        assert!(matches!(err, RecordError::Syntax { .. }));
    }

    #[test]
    fn text_after_closing_quote_is_a_syntax_error() {
        let err = split_fields("struct,qualname,\"foo\"x,id,1").unwrap_err();
        assert!(matches!(err, RecordError::Syntax { .. }));
    }
}
