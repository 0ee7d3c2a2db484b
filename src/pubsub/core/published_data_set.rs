// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the published data set - a named ordered sequence of data set fields defining
//! the schema and sampling sources of outbound messages.

use crate::types::{node_id::NodeId, string::UAString};

use super::{value_backend::StaticValueSource, PubSubId, ATTRIBUTE_ID_VALUE};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PublishedDataSetConfig {
    pub name: UAString,
}

/// Configuration of one published scalar or array. The value is sampled either from a
/// variable node through the value backend registry, or from a static value source the
/// caller owns and may swap at any time. Realtime fixed layout groups require the latter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSetFieldConfig {
    pub field_name_alias: UAString,
    pub attribute_id: u32,
    /// The sampled node. Unused (null) when a static value source is set.
    pub published_variable: NodeId,
    /// Caller owned value cell, read through once per publish cycle.
    #[serde(skip)]
    pub static_value: Option<StaticValueSource>,
}

impl Default for DataSetFieldConfig {
    fn default() -> Self {
        Self {
            field_name_alias: UAString::null(),
            attribute_id: ATTRIBUTE_ID_VALUE,
            published_variable: NodeId::null(),
            static_value: None,
        }
    }
}

impl DataSetFieldConfig {
    /// True when the field samples caller owned memory rather than a node.
    pub fn has_static_source(&self) -> bool {
        self.static_value.is_some()
    }
}

/// One field of a published data set.
#[derive(Debug)]
pub struct DataSetField {
    pub id: PubSubId,
    pub config: DataSetFieldConfig,
}

/// A named ordered sequence of data set fields. Field order is registration order and is
/// the order fields appear in every message built from this set.
#[derive(Debug)]
pub struct PublishedDataSet {
    pub id: PubSubId,
    config: PublishedDataSetConfig,
    fields: Vec<DataSetField>,
}

impl PublishedDataSet {
    pub fn new(id: PubSubId, config: &PublishedDataSetConfig) -> Self {
        Self {
            id,
            config: config.clone(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &UAString {
        &self.config.name
    }

    pub fn fields(&self) -> &[DataSetField] {
        &self.fields
    }

    pub fn add_field(&mut self, id: PubSubId, config: &DataSetFieldConfig) {
        self.fields.push(DataSetField {
            id,
            config: config.clone(),
        });
    }

    /// Removes a field by id, returning true when it existed.
    pub fn remove_field(&mut self, id: PubSubId) -> bool {
        let len = self.fields.len();
        self.fields.retain(|f| f.id != id);
        self.fields.len() != len
    }
}
