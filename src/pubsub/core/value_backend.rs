// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the value backends - the binding between a variable node and its storage.
//!
//! The `External` variant is what makes zero-copy realtime operation possible: the value
//! lives in a cell the application holds a handle to, and either side may swap the whole
//! `DataValue` atomically. The stack loads the pointer once per cycle so it never observes
//! a half-updated value, and the application is told about subscriber writes through its
//! `user_write` callback.

use std::{collections::HashMap, fmt, sync::Arc};

use arc_swap::ArcSwap;

use crate::types::{data_value::DataValue, node_id::NodeId, status_code::StatusCode};

/// Callback invoked after a subscriber write through an external backend.
pub type DataWriteCallback = Arc<dyn Fn(&NodeId, &DataValue) + Send + Sync>;
/// Callback invoked before a publisher read through an external backend.
pub type ReadNotificationCallback = Arc<dyn Fn(&NodeId) + Send + Sync>;

/// A cell holding a `DataValue` that the application may swap at any time. Publishers use
/// this as the static value source of a data set field; the same type backs the external
/// value backend on the subscriber side.
#[derive(Clone)]
pub struct StaticValueSource {
    cell: Arc<ArcSwap<DataValue>>,
}

impl fmt::Debug for StaticValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StaticValueSource({:?})", self.cell.load())
    }
}

impl From<DataValue> for StaticValueSource {
    fn from(value: DataValue) -> Self {
        StaticValueSource::new(value)
    }
}

impl StaticValueSource {
    pub fn new(value: DataValue) -> Self {
        Self {
            cell: Arc::new(ArcSwap::from_pointee(value)),
        }
    }

    /// Swaps the whole value in one atomic operation.
    pub fn set(&self, value: DataValue) {
        self.cell.store(Arc::new(value));
    }

    /// Loads the current value. The loaded `Arc` stays valid even if the application swaps
    /// the cell mid-cycle.
    pub fn get(&self) -> Arc<DataValue> {
        self.cell.load_full()
    }
}

/// Storage binding of a variable node.
pub enum ValueBackend {
    /// The backend owns the value; reads and writes copy.
    Internal(DataValue),
    /// The value lives in caller-provided storage the stack accesses directly.
    External {
        value: StaticValueSource,
        user_write: Option<DataWriteCallback>,
        notification_read: Option<ReadNotificationCallback>,
    },
}

impl fmt::Debug for ValueBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueBackend::Internal(v) => write!(f, "Internal({:?})", v),
            ValueBackend::External { value, .. } => write!(f, "External({:?})", value),
        }
    }
}

/// The minimal stand-in for an address space - a registry of value backends keyed by node
/// id. The host server registers a backend for every node the data plane publishes from or
/// subscribes into.
#[derive(Debug, Default)]
pub struct ValueBackendRegistry {
    backends: HashMap<NodeId, ValueBackend>,
}

impl ValueBackendRegistry {
    /// Registers (or replaces) the backend of a node.
    pub fn register(&mut self, node_id: NodeId, backend: ValueBackend) {
        self.backends.insert(node_id, backend);
    }

    pub fn unregister(&mut self, node_id: &NodeId) {
        self.backends.remove(node_id);
    }

    pub fn get(&self, node_id: &NodeId) -> Option<&ValueBackend> {
        self.backends.get(node_id)
    }

    /// True when the node has an external backend, which realtime subscribing requires.
    pub fn is_external(&self, node_id: &NodeId) -> bool {
        matches!(self.backends.get(node_id), Some(ValueBackend::External { .. }))
    }

    /// Reads the current value of a node, invoking the read notification of an external
    /// backend first.
    pub fn read_value(&self, node_id: &NodeId) -> Result<DataValue, StatusCode> {
        match self.backends.get(node_id) {
            Some(ValueBackend::Internal(value)) => Ok(value.clone()),
            Some(ValueBackend::External {
                value,
                notification_read,
                ..
            }) => {
                if let Some(notification_read) = notification_read {
                    notification_read(node_id);
                }
                Ok(value.get().as_ref().clone())
            }
            None => Err(StatusCode::BadNodeIdUnknown),
        }
    }

    /// Writes a value to a node, invoking the user write callback of an external backend
    /// after the swap.
    pub fn write_value(&mut self, node_id: &NodeId, value: DataValue) -> Result<(), StatusCode> {
        match self.backends.get_mut(node_id) {
            Some(ValueBackend::Internal(stored)) => {
                *stored = value;
                Ok(())
            }
            Some(ValueBackend::External {
                value: cell,
                user_write,
                ..
            }) => {
                cell.set(value.clone());
                if let Some(user_write) = user_write {
                    user_write(node_id, &value);
                }
                Ok(())
            }
            None => Err(StatusCode::BadNodeIdUnknown),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn static_source_swaps_whole_values() {
        let source = StaticValueSource::new(DataValue::value_only(1u32));
        let held = source.get();
        source.set(DataValue::value_only(2u32));
        // The previously loaded value is unaffected by the swap
        assert_eq!(held.value, Some(crate::types::Variant::UInt32(1)));
        assert_eq!(source.get().value, Some(crate::types::Variant::UInt32(2)));
    }

    #[test]
    fn external_write_invokes_callback() {
        let writes = Arc::new(AtomicUsize::new(0));
        let counter = writes.clone();
        let node = NodeId::new(1, 50002u32);
        let mut registry = ValueBackendRegistry::default();
        registry.register(
            node.clone(),
            ValueBackend::External {
                value: StaticValueSource::new(DataValue::null()),
                user_write: Some(Arc::new(move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })),
                notification_read: None,
            },
        );
        registry
            .write_value(&node, DataValue::value_only(1000u32))
            .unwrap();
        assert_eq!(writes.load(Ordering::SeqCst), 1);
        let read_back = registry.read_value(&node).unwrap();
        assert_eq!(read_back.value, Some(crate::types::Variant::UInt32(1000)));
    }

    #[test]
    fn unknown_node_is_an_error() {
        let mut registry = ValueBackendRegistry::default();
        let node = NodeId::new(1, 1u32);
        assert_eq!(
            registry.read_value(&node).unwrap_err(),
            StatusCode::BadNodeIdUnknown
        );
        assert_eq!(
            registry.write_value(&node, DataValue::null()).unwrap_err(),
            StatusCode::BadNodeIdUnknown
        );
    }
}
