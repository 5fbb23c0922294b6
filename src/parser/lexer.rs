// Lexical helpers for the aggregation query DSL

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, digit1, multispace0},
    combinator::{map, map_res, recognize},
    multi::many0_count,
    sequence::{delimited, pair},
    IResult,
};

/// Wrap a parser so it skips surrounding whitespace
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Identifier: letter or underscore, then letters, digits, underscores
pub fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0_count(alt((alphanumeric1, tag("_")))),
        )),
        |s: &str| s.to_string(),
    )(input)
}

/// Unsigned integer literal
pub fn number_literal(input: &str) -> IResult<&str, usize> {
    map_res(digit1, |s: &str| s.parse::<usize>())(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("first_name, x"), Ok((", x", "first_name".to_string())));
        assert_eq!(identifier("_x1)"), Ok((")", "_x1".to_string())));
        assert!(identifier("1abc").is_err());
    }

    #[test]
    fn test_number_literal() {
        assert_eq!(number_literal("10)"), Ok((")", 10)));
        assert!(number_literal("ten").is_err());
    }

    #[test]
    fn test_ws() {
        let mut parser = ws(identifier);
        assert_eq!(parser("  race  |"), Ok(("|", "race".to_string())));
    }
}
