//! Shared fixtures for integration tests: a scripted driver that records
//! every call, and the User / UsersGroups / Group types.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use elif_entity::{
    Driver, DriverError, DriverRegistry, DriverResult, EntityId, EntityType, Query, QueryResult,
    Record, RelationDescriptor, Row,
};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tokio::sync::Semaphore;

/// One driver invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FindOne(String, Query),
    Find(String, Query),
    /// Entity type and the row as handed to the driver
    Save(String, Row),
    Delete(String, Row),
}

impl Call {
    pub fn entity_type(&self) -> &str {
        match self {
            Call::FindOne(t, _) | Call::Find(t, _) | Call::Save(t, _) | Call::Delete(t, _) => t,
        }
    }
}

/// What a scripted `save` does
#[derive(Debug, Clone)]
pub enum SaveAction {
    /// Assign this identifier
    Assign(&'static str),
    /// Leave the record as it is
    Keep,
    Fail(&'static str),
}

/// Driver answering from scripted queues
#[derive(Default)]
pub struct RecordingDriver {
    calls: Mutex<Vec<Call>>,
    find_one: Mutex<VecDeque<DriverResult<QueryResult>>>,
    find: Mutex<VecDeque<DriverResult<QueryResult>>>,
    save: Mutex<VecDeque<SaveAction>>,
    delete_failure: Mutex<Option<&'static str>>,
    find_gate: Mutex<Option<Arc<Semaphore>>>,
    generated: Mutex<usize>,
}

impl RecordingDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_find_one(&self, value: JsonValue) {
        self.find_one.lock().push_back(Ok(QueryResult::from_json(value)));
    }

    pub fn push_find_one_empty(&self) {
        self.find_one.lock().push_back(Ok(QueryResult::empty()));
    }

    pub fn push_find_one_error(&self, message: &str) {
        self.find_one
            .lock()
            .push_back(Err(DriverError::backend("Group", message)));
    }

    pub fn push_find(&self, value: JsonValue) {
        self.find.lock().push_back(Ok(QueryResult::from_json(value)));
    }

    pub fn push_find_error(&self, message: &str) {
        self.find
            .lock()
            .push_back(Err(DriverError::backend("UsersGroups", message)));
    }

    pub fn push_save(&self, action: SaveAction) {
        self.save.lock().push_back(action);
    }

    pub fn fail_deletes(&self, message: &'static str) {
        *self.delete_failure.lock() = Some(message);
    }

    /// Make `find` wait until permits are added to the returned semaphore
    pub fn gate_find(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.find_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| pred(call)).count()
    }

    pub fn saves(&self) -> Vec<(String, Row)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Save(t, row) => Some((t.clone(), row.clone())),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    fn name(&self) -> &str {
        "recording"
    }

    async fn find_one(&self, entity_type: &EntityType, query: &Query) -> DriverResult<QueryResult> {
        self.record(Call::FindOne(entity_type.name().to_string(), query.clone()));
        let next = self.find_one.lock().pop_front();
        next.unwrap_or_else(|| Ok(QueryResult::empty()))
    }

    async fn find(&self, entity_type: &EntityType, query: &Query) -> DriverResult<QueryResult> {
        self.record(Call::Find(entity_type.name().to_string(), query.clone()));

        let gate = self.find_gate.lock().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let next = self.find.lock().pop_front();
        next.unwrap_or_else(|| Ok(QueryResult::list(Vec::new())))
    }

    async fn save(&self, record: &mut Record) -> DriverResult<QueryResult> {
        self.record(Call::Save(record.entity_type().name().to_string(), record.to_row()));

        let action = self.save.lock().pop_front();
        match action {
            Some(SaveAction::Assign(id)) => record.set_id(EntityId::from(id)),
            Some(SaveAction::Keep) => {}
            Some(SaveAction::Fail(message)) => {
                return Err(DriverError::backend(record.entity_type().name(), message))
            }
            None => {
                if record.id().is_none() {
                    let mut generated = self.generated.lock();
                    *generated += 1;
                    record.set_id(EntityId::new(format!("gen-{}", *generated)));
                }
            }
        }
        Ok(QueryResult::empty())
    }

    async fn delete(&self, record: &Record) -> DriverResult<QueryResult> {
        self.record(Call::Delete(record.entity_type().name().to_string(), record.to_row()));

        let failure = *self.delete_failure.lock();
        match failure {
            Some(message) => Err(DriverError::backend(record.entity_type().name(), message)),
            None => Ok(QueryResult::empty()),
        }
    }
}

pub fn users_groups() -> EntityType {
    EntityType::new("UsersGroups")
}

pub fn group() -> EntityType {
    EntityType::new("Group")
}

pub fn groups_relation() -> RelationDescriptor {
    RelationDescriptor::new("groups", users_groups(), group())
        .owner_field("user")
        .target_field("group")
}

pub fn user() -> EntityType {
    EntityType::new("User").with_relation(groups_relation())
}

pub fn registry(driver: &Arc<RecordingDriver>) -> Arc<DriverRegistry> {
    Arc::new(DriverRegistry::with_default(driver.clone()))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn ids(handles: &[elif_entity::EntityRef]) -> Vec<String> {
    handles
        .iter()
        .map(|h| h.id().map(|id| id.to_string()).unwrap_or_default())
        .collect()
}
