//! Recording connection used by the integration tests.

#![allow(dead_code)]

pub mod library;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sqlentity::{Connection, ConnectionFactory, Result, Row, Value};

#[derive(Debug, Default)]
pub struct MockState {
    /// Every statement with its parameters, in execution order.
    pub statements: Vec<(String, Vec<Value>)>,
    /// `commit`, `rollback`, `close` and auto-commit changes.
    pub events: Vec<String>,
    pub results: HashMap<String, Vec<Row>>,
    pub affected: u64,
    pub opened: usize,
}

/// Shared handle to a scripted database; also a connection factory.
#[derive(Debug, Clone)]
pub struct MockDb {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockDb {
    fn default() -> Self {
        let db = Self {
            state: Arc::new(Mutex::new(MockState::default())),
        };
        db.state().affected = 1;
        db
    }
}

impl MockDb {
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer `sql` with `rows`.
    pub fn on(&self, sql: &str, rows: Vec<Row>) {
        self.state().results.insert(sql.to_string(), rows);
    }

    pub fn affect(&self, n: u64) {
        self.state().affected = n;
    }

    pub fn sql(&self) -> Vec<String> {
        self.state().statements.iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn params_of(&self, index: usize) -> Vec<Value> {
        self.state().statements[index].1.clone()
    }

    pub fn count(&self, sql: &str) -> usize {
        self.state().statements.iter().filter(|(s, _)| s == sql).count()
    }

    pub fn events(&self) -> Vec<String> {
        self.state().events.clone()
    }

    pub fn opened(&self) -> usize {
        self.state().opened
    }

    pub fn connection(&self) -> MockConnection {
        MockConnection {
            state: Arc::clone(&self.state),
        }
    }
}

impl ConnectionFactory for MockDb {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        self.state().opened += 1;
        Ok(Box::new(self.connection()))
    }
}

pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connection for MockConnection {
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut state = self.state();
        state.statements.push((sql.to_string(), params.to_vec()));
        Ok(state.results.get(sql).cloned().unwrap_or_default())
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let mut state = self.state();
        state.statements.push((sql.to_string(), params.to_vec()));
        Ok(state.affected)
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        self.state().events.push(format!("autocommit={}", enabled));
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.state().events.push("commit".to_string());
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.state().events.push("rollback".to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.state().events.push("close".to_string());
        Ok(())
    }
}

pub fn row(columns: &[&str], values: Vec<Value>) -> Row {
    Row::new(columns.iter().map(|c| (*c).to_string()).collect(), values)
}
