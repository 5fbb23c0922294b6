// Abstract Syntax Tree for the aggregation query DSL

use std::fmt;

/// A groupable character attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    FirstName,
    LastName,
    Race,
    Clan,
    Gender,
    /// Reached through the character title table
    Title,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::FirstName,
        Column::LastName,
        Column::Race,
        Column::Clan,
        Column::Gender,
        Column::Title,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::FirstName => "first_name",
            Column::LastName => "last_name",
            Column::Race => "race",
            Column::Clan => "clan",
            Column::Gender => "gender",
            Column::Title => "title",
        }
    }

    pub fn from_name(name: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// What an order term sorts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKey {
    Column(Column),
    Count,
}

/// A single `ORDER BY` term. The direction binds to this term only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerm {
    pub key: OrderKey,
    pub direction: Direction,
}

impl OrderTerm {
    pub fn asc(key: OrderKey) -> Self {
        Self { key, direction: Direction::Asc }
    }

    pub fn desc(key: OrderKey) -> Self {
        Self { key, direction: Direction::Desc }
    }
}

/// Complete count-by-group query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationSpec {
    /// Grouping columns; the first is the outer category
    pub group_by: Vec<Column>,
    pub order_by: Vec<OrderTerm>,
    pub limit: Option<usize>,
}

impl AggregationSpec {
    pub fn new(group_by: Vec<Column>) -> Self {
        Self {
            group_by,
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn ordered(mut self, terms: Vec<OrderTerm>) -> Self {
        self.order_by = terms;
        self
    }

    pub fn limited(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Header row for tabular output: grouping columns, then `count`
    pub fn headers(&self) -> Vec<String> {
        self.group_by
            .iter()
            .map(|c| c.name().to_string())
            .chain(std::iter::once("count".to_string()))
            .collect()
    }

    pub fn uses_title(&self) -> bool {
        self.group_by.contains(&Column::Title)
    }

    /// Position of an ordered column within the grouping key
    pub fn key_position(&self, column: Column) -> Option<usize> {
        self.group_by.iter().position(|c| *c == column)
    }

    /// Checks a query is answerable: something to group by, no repeated
    /// group columns, and every ordered column grouped.
    pub fn validate(&self) -> Result<(), String> {
        if self.group_by.is_empty() {
            return Err("count() needs at least one column".to_string());
        }
        for (i, col) in self.group_by.iter().enumerate() {
            if self.group_by[..i].contains(col) {
                return Err(format!("column '{}' is grouped twice", col));
            }
        }
        for term in &self.order_by {
            if let OrderKey::Column(col) = term.key {
                if self.key_position(col).is_none() {
                    return Err(format!("cannot order by '{}': it is not grouped", col));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for AggregationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cols: Vec<&str> = self.group_by.iter().map(|c| c.name()).collect();
        write!(f, "count({})", cols.join(", "))?;

        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|t| {
                    let key = match t.key {
                        OrderKey::Column(c) => c.name(),
                        OrderKey::Count => "count",
                    };
                    match t.direction {
                        Direction::Asc => key.to_string(),
                        Direction::Desc => format!("{} desc", key),
                    }
                })
                .collect();
            write!(f, " | order({})", terms.join(", "))?;
        }

        if let Some(limit) = self.limit {
            write!(f, " | limit({})", limit)?;
        }
        Ok(())
    }
}
