// Pipeline parser for the aggregation query DSL
//
// Format: count(col, ...) | order(term [asc|desc], ...) | limit(n)

use super::ast::{AggregationSpec, Column, Direction, OrderKey, OrderTerm};
use super::lexer::{identifier, number_literal, ws};
use anyhow::{anyhow, Result};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::char,
    combinator::{map, map_opt, opt},
    multi::{many0, separated_list1},
    sequence::preceded,
    IResult,
};

#[derive(Debug)]
enum QueryComponent {
    Order(Vec<OrderTerm>),
    Limit(usize),
}

fn parse_column(input: &str) -> IResult<&str, Column> {
    map_opt(identifier, |name| Column::from_name(&name))(input)
}

fn parse_order_key(input: &str) -> IResult<&str, OrderKey> {
    map_opt(identifier, |name| {
        if name == "count" {
            Some(OrderKey::Count)
        } else {
            Column::from_name(&name).map(OrderKey::Column)
        }
    })(input)
}

fn parse_direction(input: &str) -> IResult<&str, Direction> {
    map_opt(identifier, |word| match word.as_str() {
        "asc" => Some(Direction::Asc),
        "desc" => Some(Direction::Desc),
        _ => None,
    })(input)
}

fn parse_order_term(input: &str) -> IResult<&str, OrderTerm> {
    let (input, key) = ws(parse_order_key)(input)?;
    let (input, direction) = opt(ws(parse_direction))(input)?;
    Ok((
        input,
        OrderTerm {
            key,
            direction: direction.unwrap_or_default(),
        },
    ))
}

/// Parse the grouping command
/// Format: count(race) or count(race, clan, gender)
pub fn parse_count(input: &str) -> IResult<&str, Vec<Column>> {
    let (input, _) = ws(tag("count"))(input)?;
    let (input, _) = ws(char('('))(input)?;
    let (input, columns) = separated_list1(ws(char(',')), ws(parse_column))(input)?;
    let (input, _) = ws(char(')'))(input)?;
    Ok((input, columns))
}

/// Parse an ordering command
/// Format: order(race, clan, gender desc) or order(count desc)
pub fn parse_order(input: &str) -> IResult<&str, Vec<OrderTerm>> {
    let (input, _) = ws(tag("order"))(input)?;
    let (input, _) = ws(char('('))(input)?;
    let (input, terms) = separated_list1(ws(char(',')), parse_order_term)(input)?;
    let (input, _) = ws(char(')'))(input)?;
    Ok((input, terms))
}

/// Parse a row limit
/// Format: limit(10)
pub fn parse_limit(input: &str) -> IResult<&str, usize> {
    let (input, _) = ws(tag("limit"))(input)?;
    let (input, _) = ws(char('('))(input)?;
    let (input, n) = ws(number_literal)(input)?;
    let (input, _) = ws(char(')'))(input)?;
    Ok((input, n))
}

fn parse_component(input: &str) -> IResult<&str, QueryComponent> {
    alt((
        map(parse_order, QueryComponent::Order),
        map(parse_limit, QueryComponent::Limit),
    ))(input)
}

/// Parse a complete aggregation query. Later `order`/`limit` commands
/// override earlier ones.
pub fn parse_aggregation_spec(input: &str) -> IResult<&str, AggregationSpec> {
    let (input, group_by) = parse_count(input)?;
    let (input, components) = many0(preceded(ws(char('|')), parse_component))(input)?;

    let mut spec = AggregationSpec::new(group_by);
    for comp in components {
        match comp {
            QueryComponent::Order(terms) => spec.order_by = terms,
            QueryComponent::Limit(n) => spec.limit = Some(n),
        }
    }

    Ok((input, spec))
}

/// Parse and validate a query, rejecting trailing input.
pub fn parse_aggregation(input: &str) -> Result<AggregationSpec> {
    let (remaining, spec) = parse_aggregation_spec(input)
        .map_err(|e| anyhow!("Parse error in query '{}': {:?}", input, e))?;

    if !remaining.trim().is_empty() {
        return Err(anyhow!("Unparsed input in query: '{}'", remaining.trim()));
    }

    spec.validate()
        .map_err(|msg| anyhow!("Invalid query '{}': {}", input, msg))?;
    Ok(spec)
}
