//! Store wrapper that fails chosen calls, shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;

use auditfilter_core::model::UserKey;
use auditfilter_core::store::{FilterStore, SqliteStore, StoreError, StoreOp, StoredFilter};

/// How an injected fault surfaces.
#[derive(Debug, Clone)]
pub enum FaultKind {
    /// The call errors before reaching the store.
    Transport(&'static str),
    /// A function call answers this string instead of `"OK"`. Read calls
    /// treat it as a transport error.
    Rejected(&'static str),
}

#[derive(Debug, Clone)]
struct Fault {
    op: StoreOp,
    arg: Option<String>,
    nth: Option<usize>,
    kind: FaultKind,
}

/// [`SqliteStore`] behind a fault plan. Every call made through the
/// [`FilterStore`] impl is logged; calls on [`FaultyStore::inner`] are not.
pub struct FaultyStore {
    inner: SqliteStore,
    faults: RefCell<Vec<Fault>>,
    calls: RefCell<Vec<(StoreOp, String)>>,
}

impl Default for FaultyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().expect("open in-memory store"),
            faults: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Direct access for seeding and inspection, bypassing faults.
    pub const fn inner(&self) -> &SqliteStore {
        &self.inner
    }

    /// Fail every call of `op`.
    pub fn fail(&self, op: StoreOp, kind: FaultKind) -> &Self {
        self.push(Fault { op, arg: None, nth: None, kind })
    }

    /// Fail only the `nth` (1-based) call of `op`.
    pub fn fail_nth(&self, op: StoreOp, nth: usize, kind: FaultKind) -> &Self {
        self.push(Fault { op, arg: None, nth: Some(nth), kind })
    }

    /// Fail calls of `op` whose first argument is `arg`.
    pub fn fail_arg(&self, op: StoreOp, arg: &str, kind: FaultKind) -> &Self {
        self.push(Fault {
            op,
            arg: Some(arg.to_string()),
            nth: None,
            kind,
        })
    }

    /// Operations called so far, in order.
    pub fn calls(&self) -> Vec<StoreOp> {
        self.calls.borrow().iter().map(|(op, _)| *op).collect()
    }

    pub fn call_count(&self, op: StoreOp) -> usize {
        self.calls.borrow().iter().filter(|(called, _)| *called == op).count()
    }

    fn push(&self, fault: Fault) -> &Self {
        self.faults.borrow_mut().push(fault);
        self
    }

    /// Log the call and report the fault it trips, if any.
    fn trip(&self, op: StoreOp, arg: &str) -> Option<FaultKind> {
        let nth = {
            let mut calls = self.calls.borrow_mut();
            calls.push((op, arg.to_string()));
            calls.iter().filter(|(called, _)| *called == op).count()
        };
        self.faults
            .borrow()
            .iter()
            .find(|fault| {
                fault.op == op
                    && fault.arg.as_deref().is_none_or(|want| want == arg)
                    && fault.nth.is_none_or(|want| want == nth)
            })
            .map(|fault| fault.kind.clone())
    }

    fn function(&self, op: StoreOp, arg: &str) -> Result<Option<String>, StoreError> {
        match self.trip(op, arg) {
            None => Ok(None),
            Some(FaultKind::Transport(message)) => Err(StoreError::Transport(message.to_string())),
            Some(FaultKind::Rejected(message)) => Ok(Some(message.to_string())),
        }
    }

    fn read(&self, op: StoreOp, arg: &str) -> Result<(), StoreError> {
        match self.trip(op, arg) {
            None => Ok(()),
            Some(FaultKind::Transport(message) | FaultKind::Rejected(message)) => {
                Err(StoreError::Transport(message.to_string()))
            }
        }
    }
}

impl FilterStore for FaultyStore {
    fn set_filter(&self, name: &str, definition: &str) -> Result<String, StoreError> {
        match self.function(StoreOp::SetFilter, name)? {
            Some(rejected) => Ok(rejected),
            None => self.inner.set_filter(name, definition),
        }
    }

    fn remove_filter(&self, name: &str) -> Result<String, StoreError> {
        match self.function(StoreOp::RemoveFilter, name)? {
            Some(rejected) => Ok(rejected),
            None => self.inner.remove_filter(name),
        }
    }

    fn get_filter(&self, name: &str) -> Result<Option<StoredFilter>, StoreError> {
        self.read(StoreOp::GetFilter, name)?;
        self.inner.get_filter(name)
    }

    fn count_filters(&self, name: &str) -> Result<u64, StoreError> {
        self.read(StoreOp::CountFilters, name)?;
        self.inner.count_filters(name)
    }

    fn list_assignments(&self, filter_name: &str) -> Result<Vec<UserKey>, StoreError> {
        self.read(StoreOp::ListAssignments, filter_name)?;
        self.inner.list_assignments(filter_name)
    }

    fn set_user(&self, user_spec: &str, filter_name: &str) -> Result<String, StoreError> {
        match self.function(StoreOp::SetUser, user_spec)? {
            Some(rejected) => Ok(rejected),
            None => self.inner.set_user(user_spec, filter_name),
        }
    }

    fn remove_user(&self, user_spec: &str) -> Result<String, StoreError> {
        match self.function(StoreOp::RemoveUser, user_spec)? {
            Some(rejected) => Ok(rejected),
            None => self.inner.remove_user(user_spec),
        }
    }

    fn get_user(&self, username: &str, userhost: &str) -> Result<Option<String>, StoreError> {
        self.read(StoreOp::GetUser, username)?;
        self.inner.get_user(username, userhost)
    }

    fn count_users(&self, username: &str, userhost: &str) -> Result<u64, StoreError> {
        self.read(StoreOp::CountUsers, username)?;
        self.inner.count_users(username, userhost)
    }
}

/// Seed a filter and its bindings directly, bypassing the fault plan.
pub fn seed(store: &FaultyStore, name: &str, text: &str, users: &[&str]) {
    assert_eq!(store.inner().set_filter(name, text).expect("seed filter"), "OK");
    for spec in users {
        assert_eq!(store.inner().set_user(spec, name).expect("seed binding"), "OK");
    }
}
