use thiserror::Error;

use crate::row::Row;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Insert(Row),
    Select,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrepareError {
    #[error("Syntax error. Could not parse statement.")]
    SyntaxError,

    #[error("ID must be positive.")]
    NegativeId,

    #[error("String is too long.")]
    StringTooLong,

    #[error("Unrecognized command: {0}")]
    Unrecognized(String),
}

impl Statement {
    /// Parses one line of input into a statement.
    pub fn prepare(input: &str) -> Result<Statement, PrepareError> {
        let mut tokens = input.split_whitespace();

        match tokens.next() {
            Some("insert") => Self::prepare_insert(tokens),
            Some("select") if tokens.next().is_none() => Ok(Statement::Select),
            Some("select") => Err(PrepareError::SyntaxError),
            _ => Err(PrepareError::Unrecognized(input.to_string())),
        }
    }

    fn prepare_insert<'a>(
        mut args: impl Iterator<Item = &'a str>,
    ) -> Result<Statement, PrepareError> {
        let (Some(id), Some(username), Some(email), None) =
            (args.next(), args.next(), args.next(), args.next())
        else {
            return Err(PrepareError::SyntaxError);
        };

        let id: i32 = id.parse().map_err(|_| PrepareError::SyntaxError)?;
        if id < 1 {
            return Err(PrepareError::NegativeId);
        }

        Row::new(id, username, email)
            .map(Statement::Insert)
            .ok_or(PrepareError::StringTooLong)
    }
}
