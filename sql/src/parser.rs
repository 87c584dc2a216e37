//! A small recursive-descent parser over the token vector produced by
//! [`crate::token::tokenize`] (§4.5). Each statement keyword gets its own
//! `parse_*` method; expression parsing is limited to the `WHERE`/`ON`
//! predicate grammar the dialect actually needs (no general arithmetic).

use common::{ColumnType, Value};

use crate::ast::*;
use crate::error::ParseError;
use crate::token::{tokenize, Token};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Parses one SQL statement (a single `;`-terminated command).
pub fn parse_statement(input: &str) -> Result<Statement, ParseError> {
    let tokens = tokenize(input);
    let mut parser = Parser { tokens, pos: 0 };
    let statement = parser.statement()?;
    Ok(statement)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat_semicolon(&mut self) {
        if matches!(self.peek(), Some(Token::Semicolon)) {
            self.pos += 1;
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Some(Token::Ident(s)) => Ok(s),
            Some(other) => Err(ParseError::UnexpectedToken {
                found: other.describe(),
                expected: "identifier".into(),
            }),
            None => Err(ParseError::UnexpectedEof),
        }
    }

    /// Matches a case-insensitive keyword identifier without consuming it
    /// on failure.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if let Some(Token::Ident(s)) = self.peek() {
            if s.eq_ignore_ascii_case(keyword) {
                self.pos += 1;
                return true;
            }
        }
        false
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            let found = self
                .peek()
                .map(Token::describe)
                .unwrap_or_else(|| "end of statement".into());
            Err(ParseError::UnexpectedToken {
                found,
                expected: keyword.to_string(),
            })
        }
    }

    fn expect_token(&mut self, expected: &Token) -> Result<(), ParseError> {
        match self.peek() {
            Some(t) if t == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(other) => Err(ParseError::UnexpectedToken {
                found: other.describe(),
                expected: expected.describe(),
            }),
            None => Err(ParseError::UnexpectedEof),
        }
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        let keyword = match self.peek() {
            Some(Token::Ident(s)) => s.to_ascii_uppercase(),
            _ => return Err(ParseError::UnexpectedEof),
        };

        let statement = match keyword.as_str() {
            "CREATE" => {
                self.pos += 1;
                if self.eat_keyword("DATABASE") {
                    Statement::CreateDatabase(self.expect_ident()?)
                } else if self.eat_keyword("TABLE") {
                    Statement::CreateTable(self.create_table()?)
                } else {
                    return Err(ParseError::UnknownStatement(keyword));
                }
            }
            "DROP" => {
                self.pos += 1;
                if self.eat_keyword("DATABASE") {
                    Statement::DropDatabase(self.expect_ident()?)
                } else if self.eat_keyword("TABLE") {
                    Statement::DropTable(self.expect_ident()?)
                } else {
                    return Err(ParseError::UnknownStatement(keyword));
                }
            }
            "USE" => {
                self.pos += 1;
                Statement::UseDatabase(self.expect_ident()?)
            }
            "INSERT" => {
                self.pos += 1;
                Statement::Insert(self.insert()?)
            }
            "SELECT" => {
                self.pos += 1;
                Statement::Select(self.select()?)
            }
            "UPDATE" => {
                self.pos += 1;
                Statement::Update(self.update()?)
            }
            "DELETE" => {
                self.pos += 1;
                Statement::Delete(self.delete()?)
            }
            "SHOW" => {
                self.pos += 1;
                if self.eat_keyword("DATABASES") {
                    Statement::ShowDatabases
                } else if self.eat_keyword("TABLES") {
                    Statement::ShowTables
                } else {
                    return Err(ParseError::UnknownStatement(keyword));
                }
            }
            _ => return Err(ParseError::UnknownStatement(keyword)),
        };

        self.eat_semicolon();
        Ok(statement)
    }

    // --- CREATE TABLE -----------------------------------------------------

    fn create_table(&mut self) -> Result<CreateTableStatement, ParseError> {
        let if_not_exists = if self.eat_keyword("IF") {
            self.expect_keyword("NOT")?;
            self.expect_keyword("EXISTS")?;
            true
        } else {
            false
        };
        let table = self.expect_ident()?;
        self.expect_token(&Token::LParen)?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.column_def()?);
            if matches!(self.peek(), Some(Token::Comma)) {
                self.pos += 1;
                continue;
            }
            break;
        }
        self.expect_token(&Token::RParen)?;
        Ok(CreateTableStatement {
            table,
            columns,
            if_not_exists,
        })
    }

    fn column_def(&mut self) -> Result<ColumnDef, ParseError> {
        let name = self.expect_ident()?;
        let type_name = self.expect_ident()?;
        let column_type: ColumnType = type_name.parse().map_err(|_| ParseError::InvalidLiteral(type_name.clone()))?;

        let mut nullable = true;
        let mut primary_key = false;
        let mut auto_increment = false;
        loop {
            if self.eat_keyword("PRIMARY") {
                self.expect_keyword("KEY")?;
                primary_key = true;
                nullable = false;
            } else if self.eat_keyword("AUTOINCREMENT") || self.eat_keyword("AUTO_INCREMENT") {
                auto_increment = true;
            } else if self.eat_keyword("NOT") {
                self.expect_keyword("NULL")?;
                nullable = false;
            } else if self.eat_keyword("NULL") {
                nullable = true;
            } else {
                break;
            }
        }

        Ok(ColumnDef {
            name,
            column_type,
            nullable,
            primary_key,
            auto_increment,
        })
    }

    // --- INSERT -------------------------------------------------------

    fn insert(&mut self) -> Result<InsertStatement, ParseError> {
        self.expect_keyword("INTO")?;
        let table = self.expect_ident()?;

        let columns = if matches!(self.peek(), Some(Token::LParen)) {
            self.pos += 1;
            let mut names = Vec::new();
            loop {
                names.push(self.expect_ident()?);
                if matches!(self.peek(), Some(Token::Comma)) {
                    self.pos += 1;
                    continue;
                }
                break;
            }
            self.expect_token(&Token::RParen)?;
            Some(names)
        } else {
            None
        };

        self.expect_keyword("VALUES")?;
        let mut rows = Vec::new();
        loop {
            self.expect_token(&Token::LParen)?;
            let mut values = Vec::new();
            loop {
                values.push(self.literal()?);
                if matches!(self.peek(), Some(Token::Comma)) {
                    self.pos += 1;
                    continue;
                }
                break;
            }
            self.expect_token(&Token::RParen)?;
            rows.push(values);
            if matches!(self.peek(), Some(Token::Comma)) {
                self.pos += 1;
                continue;
            }
            break;
        }

        Ok(InsertStatement { table, columns, rows })
    }

    // --- SELECT -------------------------------------------------------

    fn select(&mut self) -> Result<SelectStatement, ParseError> {
        let projection = self.projection()?;
        self.expect_keyword("FROM")?;
        let from = self.table_ref()?;

        let mut joins = Vec::new();
        loop {
            let kind = if self.eat_keyword("INNER") {
                self.expect_keyword("JOIN")?;
                JoinKind::Inner
            } else if self.eat_keyword("LEFT") {
                let _ = self.eat_keyword("OUTER");
                self.expect_keyword("JOIN")?;
                JoinKind::Left
            } else if self.eat_keyword("JOIN") {
                JoinKind::Inner
            } else {
                break;
            };
            let table = self.table_ref()?;
            self.expect_keyword("ON")?;
            let on = self.predicate()?;
            joins.push(JoinClause { kind, table, on });
        }

        let where_clause = if self.eat_keyword("WHERE") {
            Some(self.predicate()?)
        } else {
            None
        };

        let order_by = if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            let column = self.column_ref()?;
            let descending = if self.eat_keyword("DESC") {
                true
            } else {
                let _ = self.eat_keyword("ASC");
                false
            };
            Some(OrderBy { column, descending })
        } else {
            None
        };

        let limit = if self.eat_keyword("LIMIT") {
            Some(self.number_token()?)
        } else {
            None
        };

        Ok(SelectStatement {
            projection,
            from,
            joins,
            where_clause,
            order_by,
            limit,
        })
    }

    fn projection(&mut self) -> Result<Projection, ParseError> {
        if matches!(self.peek(), Some(Token::Star)) {
            self.pos += 1;
            return Ok(Projection::All);
        }
        if let Some(Token::Ident(name)) = self.peek() {
            if name.eq_ignore_ascii_case("COUNT") {
                self.pos += 1;
                // Bare `COUNT` and `COUNT(*)` are synonymous (§4.7).
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.pos += 1;
                    self.expect_token(&Token::Star)?;
                    self.expect_token(&Token::RParen)?;
                }
                return Ok(Projection::Count);
            }
        }
        let mut columns = Vec::new();
        loop {
            columns.push(self.select_column()?);
            if matches!(self.peek(), Some(Token::Comma)) {
                self.pos += 1;
                continue;
            }
            break;
        }
        Ok(Projection::Columns(columns))
    }

    fn select_column(&mut self) -> Result<SelectColumn, ParseError> {
        if let Some(Token::Ident(name)) = self.peek() {
            if name.eq_ignore_ascii_case("LEN") {
                self.pos += 1;
                self.expect_token(&Token::LParen)?;
                let column = self.column_ref()?;
                self.expect_token(&Token::RParen)?;
                return Ok(SelectColumn::Len(column));
            }
        }
        Ok(SelectColumn::Column(self.column_ref()?))
    }

    fn table_ref(&mut self) -> Result<TableRef, ParseError> {
        let name = self.expect_ident()?;
        let alias = if self.eat_keyword("AS") {
            Some(self.expect_ident()?)
        } else if let Some(Token::Ident(s)) = self.peek() {
            if !is_reserved(s) {
                let alias = s.clone();
                self.pos += 1;
                Some(alias)
            } else {
                None
            }
        } else {
            None
        };
        Ok(TableRef { name, alias })
    }

    fn column_ref(&mut self) -> Result<ColumnRef, ParseError> {
        let first = self.expect_ident()?;
        if matches!(self.peek(), Some(Token::Dot)) {
            self.pos += 1;
            let name = self.expect_ident()?;
            Ok(ColumnRef::qualified(first, name))
        } else {
            Ok(ColumnRef::unqualified(first))
        }
    }

    // --- UPDATE / DELETE ------------------------------------------------

    fn update(&mut self) -> Result<UpdateStatement, ParseError> {
        let table = self.expect_ident()?;
        self.expect_keyword("SET")?;
        let mut assignments = Vec::new();
        loop {
            let name = self.expect_ident()?;
            self.expect_token(&Token::Eq)?;
            let value = self.literal()?;
            assignments.push((name, value));
            if matches!(self.peek(), Some(Token::Comma)) {
                self.pos += 1;
                continue;
            }
            break;
        }
        let where_clause = if self.eat_keyword("WHERE") {
            Some(self.predicate()?)
        } else {
            None
        };
        Ok(UpdateStatement {
            table,
            assignments,
            where_clause,
        })
    }

    fn delete(&mut self) -> Result<DeleteStatement, ParseError> {
        self.expect_keyword("FROM")?;
        let table = self.expect_ident()?;
        let where_clause = if self.eat_keyword("WHERE") {
            Some(self.predicate()?)
        } else {
            None
        };
        Ok(DeleteStatement { table, where_clause })
    }

    // --- predicates -----------------------------------------------------

    fn predicate(&mut self) -> Result<Predicate, ParseError> {
        self.or_predicate()
    }

    fn or_predicate(&mut self) -> Result<Predicate, ParseError> {
        let mut left = self.and_predicate()?;
        while self.eat_keyword("OR") {
            let right = self.and_predicate()?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_predicate(&mut self) -> Result<Predicate, ParseError> {
        let mut left = self.unary_predicate()?;
        while self.eat_keyword("AND") {
            let right = self.unary_predicate()?;
            left = Predicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary_predicate(&mut self) -> Result<Predicate, ParseError> {
        if self.eat_keyword("NOT") {
            return Ok(Predicate::Not(Box::new(self.unary_predicate()?)));
        }
        if matches!(self.peek(), Some(Token::LParen)) {
            self.pos += 1;
            let inner = self.predicate()?;
            self.expect_token(&Token::RParen)?;
            return Ok(inner);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Predicate, ParseError> {
        let left = self.operand()?;

        if self.eat_keyword("IS") {
            let negate = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(if negate {
                Predicate::IsNotNull(left)
            } else {
                Predicate::IsNull(left)
            });
        }

        let op = match self.peek() {
            Some(Token::Eq) => CmpOp::Eq,
            Some(Token::NotEq) => CmpOp::NotEq,
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::LtEq) => CmpOp::LtEq,
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::GtEq) => CmpOp::GtEq,
            Some(other) => {
                return Err(ParseError::UnexpectedToken {
                    found: other.describe(),
                    expected: "comparison operator".into(),
                })
            }
            None => return Err(ParseError::UnexpectedEof),
        };
        self.pos += 1;
        let right = self.operand()?;
        Ok(Predicate::Compare { left, op, right })
    }

    fn operand(&mut self) -> Result<Operand, ParseError> {
        match self.peek() {
            Some(Token::String(_)) | Some(Token::Number(_)) => Ok(Operand::Literal(self.literal()?)),
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("NULL") => {
                self.pos += 1;
                Ok(Operand::Literal(Value::Null))
            }
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("LEN") => {
                self.pos += 1;
                self.expect_token(&Token::LParen)?;
                let column = self.column_ref()?;
                self.expect_token(&Token::RParen)?;
                Ok(Operand::Len(column))
            }
            Some(Token::Ident(_)) => Ok(Operand::Column(self.column_ref()?)),
            Some(other) => Err(ParseError::UnexpectedToken {
                found: other.describe(),
                expected: "column or literal".into(),
            }),
            None => Err(ParseError::UnexpectedEof),
        }
    }

    fn literal(&mut self) -> Result<Value, ParseError> {
        match self.advance() {
            Some(Token::Number(s)) => Ok(parse_number_literal(&s)),
            Some(Token::String(s)) => Ok(match common::parse_datetime_literal(&s) {
                Some(ticks) => Value::DateTime(ticks),
                None => Value::Text(s),
            }),
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("NULL") => Ok(Value::Null),
            Some(other) => Err(ParseError::UnexpectedToken {
                found: other.describe(),
                expected: "literal".into(),
            }),
            None => Err(ParseError::UnexpectedEof),
        }
    }

    fn number_token(&mut self) -> Result<u64, ParseError> {
        match self.advance() {
            Some(Token::Number(s)) => s.parse().map_err(|_| ParseError::InvalidLiteral(s)),
            Some(other) => Err(ParseError::UnexpectedToken {
                found: other.describe(),
                expected: "number".into(),
            }),
            None => Err(ParseError::UnexpectedEof),
        }
    }
}

fn is_reserved(ident: &str) -> bool {
    matches!(
        ident.to_ascii_uppercase().as_str(),
        "WHERE" | "INNER" | "LEFT" | "JOIN" | "ON" | "ORDER" | "LIMIT" | "GROUP"
    )
}

fn parse_number_literal(s: &str) -> Value {
    if s.contains('.') {
        return Value::Real(s.parse().unwrap_or(0.0));
    }
    match s.parse::<i32>() {
        Ok(v) => Value::Integer(v),
        Err(_) => Value::Long(s.parse().unwrap_or(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_table_with_constraints() {
        let stmt = parse_statement(
            "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)",
        )
        .unwrap();
        match stmt {
            Statement::CreateTable(create) => {
                assert_eq!(create.table, "users");
                assert_eq!(create.columns.len(), 2);
                assert!(create.columns[0].primary_key);
                assert!(create.columns[0].auto_increment);
                assert!(!create.columns[1].nullable);
            }
            other => panic!("expected CreateTable, got {other:?}"),
        }
    }

    #[test]
    fn parses_insert_with_explicit_columns() {
        let stmt = parse_statement("INSERT INTO users (id, name) VALUES (1, 'Ada')").unwrap();
        match stmt {
            Statement::Insert(insert) => {
                assert_eq!(insert.table, "users");
                assert_eq!(insert.columns, Some(vec!["id".to_string(), "name".to_string()]));
                assert_eq!(insert.rows.len(), 1);
            }
            other => panic!("expected Insert, got {other:?}"),
        }
    }

    #[test]
    fn parses_select_with_join_and_predicate() {
        let stmt = parse_statement(
            "SELECT u.name, o.total FROM users u INNER JOIN orders o ON u.id = o.user_id WHERE o.total > 100 ORDER BY o.total DESC LIMIT 5",
        )
        .unwrap();
        match stmt {
            Statement::Select(select) => {
                assert_eq!(select.joins.len(), 1);
                assert_eq!(select.joins[0].kind, JoinKind::Inner);
                assert!(select.where_clause.is_some());
                assert_eq!(select.limit, Some(5));
                assert!(select.order_by.unwrap().descending);
            }
            other => panic!("expected Select, got {other:?}"),
        }
    }

    #[test]
    fn parses_update_and_delete() {
        let update = parse_statement("UPDATE users SET name = 'Bea' WHERE id = 1").unwrap();
        assert!(matches!(update, Statement::Update(_)));
        let delete = parse_statement("DELETE FROM users WHERE id = 1").unwrap();
        assert!(matches!(delete, Statement::Delete(_)));
    }

    #[test]
    fn count_star_is_a_distinct_projection() {
        let stmt = parse_statement("SELECT COUNT(*) FROM users").unwrap();
        match stmt {
            Statement::Select(select) => assert!(matches!(select.projection, Projection::Count)),
            other => panic!("expected Select, got {other:?}"),
        }
    }

    #[test]
    fn bare_count_is_equivalent_to_count_star() {
        let stmt = parse_statement("SELECT COUNT FROM users WHERE id = 1").unwrap();
        match stmt {
            Statement::Select(select) => assert!(matches!(select.projection, Projection::Count)),
            other => panic!("expected Select, got {other:?}"),
        }
    }

    #[test]
    fn create_table_if_not_exists_is_recognized() {
        let stmt = parse_statement("CREATE TABLE IF NOT EXISTS users (id INTEGER)").unwrap();
        match stmt {
            Statement::CreateTable(create) => assert!(create.if_not_exists),
            other => panic!("expected CreateTable, got {other:?}"),
        }
    }

    #[test]
    fn len_is_usable_as_a_projected_column_and_a_predicate_operand() {
        let stmt = parse_statement("SELECT LEN(name) FROM users WHERE LEN(name) > 3").unwrap();
        match stmt {
            Statement::Select(select) => {
                assert!(matches!(
                    select.projection,
                    Projection::Columns(ref cols) if matches!(cols[0], SelectColumn::Len(_))
                ));
                match select.where_clause {
                    Some(Predicate::Compare { left: Operand::Len(_), .. }) => {}
                    other => panic!("expected LEN(...) comparison, got {other:?}"),
                }
            }
            other => panic!("expected Select, got {other:?}"),
        }
    }
}
