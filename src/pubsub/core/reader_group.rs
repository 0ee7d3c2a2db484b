// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the reader group - a set of data set readers sharing a realtime level.

use crate::types::{status_code::StatusCode, string::UAString};

use super::{data_set_reader::DataSetReader, PubSubId, PubSubRtLevel};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReaderGroupConfig {
    pub name: UAString,
    pub rt_level: PubSubRtLevel,
}

#[derive(Debug)]
pub struct ReaderGroup {
    pub id: PubSubId,
    pub config: ReaderGroupConfig,
    readers: Vec<DataSetReader>,
    frozen: bool,
}

impl ReaderGroup {
    pub fn new(id: PubSubId, config: &ReaderGroupConfig) -> Self {
        Self {
            id,
            config: config.clone(),
            readers: Vec::new(),
            frozen: false,
        }
    }

    pub fn readers(&self) -> &[DataSetReader] {
        &self.readers
    }

    pub fn readers_mut(&mut self) -> &mut [DataSetReader] {
        &mut self.readers
    }

    pub fn add_reader(&mut self, reader: DataSetReader) {
        self.readers.push(reader);
    }

    pub fn remove_reader(&mut self, id: PubSubId) -> bool {
        let len = self.readers.len();
        self.readers.retain(|r| r.id != id);
        self.readers.len() != len
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn check_unlocked(&self) -> Result<(), StatusCode> {
        if self.frozen {
            error!(
                "Reader group {} is frozen, its configuration cannot change",
                self.id
            );
            Err(StatusCode::BadConfigurationError)
        } else {
            Ok(())
        }
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Clears the frozen flag and drops the readers' buffered layouts. Idempotent.
    pub fn unfreeze(&mut self) {
        self.frozen = false;
        for reader in self.readers.iter_mut() {
            reader.clear_offset_buffer();
        }
    }
}
