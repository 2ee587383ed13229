//! The `Script` node: an ordered list of sub-statements treated as one
//! logical unit at the context level (§3.4).

use super::Ast;

#[derive(Debug, Clone)]
pub struct Script {
    statements: Vec<Ast>,
}

impl Script {
    pub(crate) fn new(statements: Vec<Ast>) -> Self {
        Self { statements }
    }

    pub fn statements(&self) -> &[Ast] {
        &self.statements
    }

    pub fn statements_mut(&mut self) -> &mut [Ast] {
        &mut self.statements
    }

    pub fn into_statements(self) -> Vec<Ast> {
        self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}
