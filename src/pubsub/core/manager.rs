// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the PubSub manager - the in-memory registry of every PubSub entity, the
//! enforcement of their relationships, and the freeze engine that turns a group into its
//! fixed realtime layout.
//!
//! The manager is single threaded by design; every publish tick, receive dispatch and
//! configuration change is serialized by the host's main loop. A multi-threaded host puts
//! the whole manager behind one coarse lock and the data plane still behaves as if single
//! threaded.

use std::time::Duration;

use crate::core::handle::Handle;
use crate::pubsub::publisher::{self, BuildMode};
use crate::pubsub::uadp::{
    DataSetFieldEncoding, OffsetBuffer, UadpDataSetMessageContentMask,
    UadpNetworkMessageContentMask,
};
use crate::types::{
    encoding::{DecodingOptions, EncodingResult},
    node_id::NodeId,
    status_code::StatusCode,
    variant::VariantTypeId,
};

use super::{
    connection::{PubSubConnection, PubSubConnectionConfig},
    data_set_reader::{DataSetReader, DataSetReaderConfig},
    data_set_writer::{DataSetWriter, DataSetWriterConfig},
    published_data_set::{DataSetFieldConfig, PublishedDataSet, PublishedDataSetConfig},
    reader_group::{ReaderGroup, ReaderGroupConfig},
    value_backend::{ValueBackend, ValueBackendRegistry},
    writer_group::{WriterGroup, WriterGroupConfig},
    PubSubId, PubSubRtLevel,
};

/// Network message mask bits a fixed layout cannot do without - they carry the match key.
const RT_REQUIRED_MASK: u32 = UadpNetworkMessageContentMask::PUBLISHER_ID.bits()
    | UadpNetworkMessageContentMask::GROUP_HEADER.bits()
    | UadpNetworkMessageContentMask::WRITER_GROUP_ID.bits()
    | UadpNetworkMessageContentMask::PAYLOAD_HEADER.bits();

/// Network message mask bits that change value every cycle and therefore have no place in
/// a frozen layout.
const RT_FORBIDDEN_MASK: u32 = UadpNetworkMessageContentMask::TIMESTAMP.bits()
    | UadpNetworkMessageContentMask::PICO_SECONDS.bits()
    | UadpNetworkMessageContentMask::PROMOTED_FIELDS.bits();

/// Same for the DataSetMessage header.
const RT_FORBIDDEN_DSM_MASK: u32 = UadpDataSetMessageContentMask::TIMESTAMP.bits()
    | UadpDataSetMessageContentMask::PICO_SECONDS.bits()
    | UadpDataSetMessageContentMask::STATUS.bits();

pub struct PubSubManager {
    connections: Vec<PubSubConnection>,
    data_sets: Vec<PublishedDataSet>,
    backends: ValueBackendRegistry,
    handles: Handle,
    decoding_options: DecodingOptions,
}

impl Default for PubSubManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSubManager {
    pub fn new() -> Self {
        Self {
            connections: Vec::new(),
            data_sets: Vec::new(),
            backends: ValueBackendRegistry::default(),
            handles: Handle::new(1),
            decoding_options: DecodingOptions::default(),
        }
    }

    fn next_id(&mut self) -> PubSubId {
        PubSubId(self.handles.next())
    }

    // ---- Value backends, the stand-in for the address space

    pub fn register_value_backend(&mut self, node_id: NodeId, backend: ValueBackend) {
        self.backends.register(node_id, backend);
    }

    pub fn backends(&self) -> &ValueBackendRegistry {
        &self.backends
    }

    pub fn backends_mut(&mut self) -> &mut ValueBackendRegistry {
        &mut self.backends
    }

    // ---- Connections

    /// Creates a connection from a copy of the supplied config and opens its channel.
    pub fn add_connection(
        &mut self,
        config: &PubSubConnectionConfig,
    ) -> Result<PubSubId, StatusCode> {
        let id = self.next_id();
        let connection = PubSubConnection::new(id, config)?;
        info!("Added connection {} on {}", id, config.address);
        self.connections.push(connection);
        Ok(id)
    }

    /// Removes a connection, closing its channel. Its groups go with it, so none of them
    /// may be frozen.
    pub fn remove_connection(&mut self, id: PubSubId) -> Result<(), StatusCode> {
        let connection = self
            .connections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        if connection.writer_groups().iter().any(|g| g.is_frozen())
            || connection.reader_groups().iter().any(|g| g.is_frozen())
        {
            error!("Connection {} still owns frozen groups", id);
            return Err(StatusCode::BadConfigurationError);
        }
        connection.close()?;
        self.connections.retain(|c| c.id != id);
        Ok(())
    }

    pub fn find_connection(&self, id: PubSubId) -> Option<&PubSubConnection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn find_connection_mut(&mut self, id: PubSubId) -> Option<&mut PubSubConnection> {
        self.connections.iter_mut().find(|c| c.id == id)
    }

    // ---- Published data sets and their fields

    pub fn add_published_data_set(
        &mut self,
        config: &PublishedDataSetConfig,
    ) -> Result<PubSubId, StatusCode> {
        let id = self.next_id();
        self.data_sets.push(PublishedDataSet::new(id, config));
        Ok(id)
    }

    /// Removes a data set. Fails while any writer references it.
    pub fn remove_published_data_set(&mut self, id: PubSubId) -> Result<(), StatusCode> {
        if !self.data_sets.iter().any(|d| d.id == id) {
            return Err(StatusCode::BadNodeIdUnknown);
        }
        let referenced = self
            .connections
            .iter()
            .flat_map(|c| c.writer_groups())
            .flat_map(|g| g.writers())
            .any(|w| w.data_set == id);
        if referenced {
            error!("Data set {} is still referenced by a writer", id);
            return Err(StatusCode::BadInvalidState);
        }
        self.data_sets.retain(|d| d.id != id);
        Ok(())
    }

    pub fn find_published_data_set(&self, id: PubSubId) -> Option<&PublishedDataSet> {
        self.data_sets.iter().find(|d| d.id == id)
    }

    /// Adds a field to a data set. Fails with the configuration lock error while any
    /// frozen writer group publishes from this data set.
    pub fn add_data_set_field(
        &mut self,
        data_set_id: PubSubId,
        config: &DataSetFieldConfig,
    ) -> Result<PubSubId, StatusCode> {
        self.check_data_set_unlocked(data_set_id)?;
        let id = self.next_id();
        let data_set = self
            .data_sets
            .iter_mut()
            .find(|d| d.id == data_set_id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        data_set.add_field(id, config);
        Ok(id)
    }

    pub fn remove_data_set_field(
        &mut self,
        data_set_id: PubSubId,
        field_id: PubSubId,
    ) -> Result<(), StatusCode> {
        self.check_data_set_unlocked(data_set_id)?;
        let data_set = self
            .data_sets
            .iter_mut()
            .find(|d| d.id == data_set_id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        if data_set.remove_field(field_id) {
            Ok(())
        } else {
            Err(StatusCode::BadNodeIdUnknown)
        }
    }

    /// The configuration lock - a data set is locked while any frozen group references it.
    fn check_data_set_unlocked(&self, data_set_id: PubSubId) -> Result<(), StatusCode> {
        let locked = self
            .connections
            .iter()
            .flat_map(|c| c.writer_groups())
            .filter(|g| g.is_frozen())
            .flat_map(|g| g.writers())
            .any(|w| w.data_set == data_set_id);
        if locked {
            error!(
                "Data set {} is referenced by a frozen group, its configuration cannot change",
                data_set_id
            );
            Err(StatusCode::BadConfigurationError)
        } else {
            Ok(())
        }
    }

    // ---- Writer groups and writers

    pub fn add_writer_group(
        &mut self,
        connection_id: PubSubId,
        config: &WriterGroupConfig,
    ) -> Result<PubSubId, StatusCode> {
        UadpNetworkMessageContentMask::validate(
            config.message_settings.network_message_content_mask,
        )?;
        let id = self.next_id();
        let connection = self
            .connections
            .iter_mut()
            .find(|c| c.id == connection_id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        connection.writer_groups_mut().push(WriterGroup::new(id, config));
        Ok(id)
    }

    /// Removes a writer group. Fails while frozen or while any of its writers is enabled.
    pub fn remove_writer_group(&mut self, id: PubSubId) -> Result<(), StatusCode> {
        let connection = self
            .connections
            .iter_mut()
            .find(|c| c.has_writer_group(id))
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        let group = connection
            .find_writer_group_mut(id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        group.check_unlocked()?;
        if group.writers().iter().any(|w| w.enabled) {
            error!("Writer group {} still has enabled writers", id);
            return Err(StatusCode::BadInvalidState);
        }
        connection.writer_groups_mut().retain(|g| g.id != id);
        Ok(())
    }

    pub fn find_writer_group(&self, id: PubSubId) -> Option<&WriterGroup> {
        self.connections
            .iter()
            .flat_map(|c| c.writer_groups())
            .find(|g| g.id == id)
    }

    fn find_writer_group_mut(&mut self, id: PubSubId) -> Option<&mut WriterGroup> {
        self.connections
            .iter_mut()
            .find_map(|c| c.find_writer_group_mut(id))
    }

    /// Marks a writer group operational so its publish tick sends.
    pub fn set_writer_group_operational(&mut self, id: PubSubId) -> Result<(), StatusCode> {
        let group = self
            .find_writer_group_mut(id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        group.config.enabled = true;
        Ok(())
    }

    pub fn set_writer_group_disabled(&mut self, id: PubSubId) -> Result<(), StatusCode> {
        let group = self
            .find_writer_group_mut(id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        group.config.enabled = false;
        Ok(())
    }

    /// Adds a writer binding a published data set into a group. Under a fixed size group
    /// every field of the data set must already have a static value source - a node bound
    /// field cannot be patched through a frozen buffer.
    pub fn add_data_set_writer(
        &mut self,
        group_id: PubSubId,
        data_set_id: PubSubId,
        config: &DataSetWriterConfig,
    ) -> Result<PubSubId, StatusCode> {
        let data_set = self
            .data_sets
            .iter()
            .find(|d| d.id == data_set_id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        let rt_ready = data_set.fields().iter().all(|f| f.config.has_static_source());
        let id = PubSubId(self.handles.next());
        let group = self
            .connections
            .iter_mut()
            .find_map(|c| c.find_writer_group_mut(group_id))
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        group.check_unlocked()?;
        if group.config.rt_level == PubSubRtLevel::FixedSize && !rt_ready {
            error!(
                "Data set {} has node bound fields, a fixed size group needs static value sources",
                data_set_id
            );
            return Err(StatusCode::BadConfigurationError);
        }
        group.add_writer(DataSetWriter::new(id, config, data_set_id));
        Ok(id)
    }

    pub fn remove_data_set_writer(&mut self, id: PubSubId) -> Result<(), StatusCode> {
        for connection in self.connections.iter_mut() {
            for group in connection.writer_groups_mut().iter_mut() {
                if group.writers().iter().any(|w| w.id == id) {
                    group.check_unlocked()?;
                    group.remove_writer(id);
                    return Ok(());
                }
            }
        }
        Err(StatusCode::BadNodeIdUnknown)
    }

    pub fn set_data_set_writer_enabled(
        &mut self,
        id: PubSubId,
        enabled: bool,
    ) -> Result<(), StatusCode> {
        for connection in self.connections.iter_mut() {
            for group in connection.writer_groups_mut().iter_mut() {
                if let Some(writer) = group.writers_mut().iter_mut().find(|w| w.id == id) {
                    writer.enabled = enabled;
                    return Ok(());
                }
            }
        }
        Err(StatusCode::BadNodeIdUnknown)
    }

    // ---- Reader groups and readers

    pub fn add_reader_group(
        &mut self,
        connection_id: PubSubId,
        config: &ReaderGroupConfig,
    ) -> Result<PubSubId, StatusCode> {
        let id = self.next_id();
        let connection = self
            .connections
            .iter_mut()
            .find(|c| c.id == connection_id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        connection.reader_groups_mut().push(ReaderGroup::new(id, config));
        Ok(id)
    }

    pub fn remove_reader_group(&mut self, id: PubSubId) -> Result<(), StatusCode> {
        let connection = self
            .connections
            .iter_mut()
            .find(|c| c.has_reader_group(id))
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        let group = connection
            .find_reader_group_mut(id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        group.check_unlocked()?;
        connection.reader_groups_mut().retain(|g| g.id != id);
        Ok(())
    }

    pub fn add_data_set_reader(
        &mut self,
        group_id: PubSubId,
        config: &DataSetReaderConfig,
    ) -> Result<PubSubId, StatusCode> {
        let id = PubSubId(self.handles.next());
        let group = self
            .connections
            .iter_mut()
            .find_map(|c| c.find_reader_group_mut(group_id))
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        group.check_unlocked()?;
        group.add_reader(DataSetReader::new(id, config));
        Ok(id)
    }

    pub fn remove_data_set_reader(&mut self, id: PubSubId) -> Result<(), StatusCode> {
        for connection in self.connections.iter_mut() {
            for group in connection.reader_groups_mut().iter_mut() {
                if group.readers().iter().any(|r| r.id == id) {
                    group.check_unlocked()?;
                    group.remove_reader(id);
                    return Ok(());
                }
            }
        }
        Err(StatusCode::BadNodeIdUnknown)
    }

    pub fn find_reader_group(&self, id: PubSubId) -> Option<&ReaderGroup> {
        self.connections
            .iter()
            .flat_map(|c| c.reader_groups())
            .find(|g| g.id == id)
    }

    pub fn find_data_set_writer(&self, id: PubSubId) -> Option<&DataSetWriter> {
        self.connections
            .iter()
            .flat_map(|c| c.writer_groups())
            .flat_map(|g| g.writers())
            .find(|w| w.id == id)
    }

    pub fn find_data_set_reader(&self, id: PubSubId) -> Option<&DataSetReader> {
        self.connections
            .iter()
            .flat_map(|c| c.reader_groups())
            .flat_map(|g| g.readers())
            .find(|r| r.id == id)
    }

    // ---- The freeze engine

    /// Locks a writer group's configuration. Under the fixed size realtime level this
    /// validates every precondition, synthesizes the canonical message and attaches the
    /// offset buffer; a group that fails validation is left unfrozen and unchanged.
    pub fn freeze_writer_group_configuration(
        &mut self,
        group_id: PubSubId,
    ) -> Result<(), StatusCode> {
        let data_sets = &self.data_sets;
        let backends = &self.backends;
        let connection = self
            .connections
            .iter_mut()
            .find(|c| c.has_writer_group(group_id))
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        let publisher_id = connection.config.publisher_id;
        let group = connection
            .find_writer_group_mut(group_id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        if group.is_frozen() {
            return Ok(());
        }
        if group.config.rt_level != PubSubRtLevel::FixedSize {
            group.freeze(None);
            return Ok(());
        }

        Self::validate_rt_network_mask(group.config.message_settings.network_message_content_mask)?;
        for writer in group.writers() {
            if writer.config.field_encoding != DataSetFieldEncoding::RawData {
                error!(
                    "Writer {} uses variant field encoding, fixed layouts need raw data",
                    writer.id
                );
                return Err(StatusCode::BadNotSupported);
            }
            let dsm_mask = UadpDataSetMessageContentMask::validate(
                writer.config.message_settings.data_set_message_content_mask,
            )?;
            if dsm_mask.bits() & RT_FORBIDDEN_DSM_MASK != 0 {
                error!(
                    "Writer {} has per-cycle header fields in its mask, not supported under a fixed layout",
                    writer.id
                );
                return Err(StatusCode::BadNotSupported);
            }
            let data_set = data_sets
                .iter()
                .find(|d| d.id == writer.data_set)
                .ok_or(StatusCode::BadConfigurationError)?;
            for field in data_set.fields() {
                let source = field.config.static_value.as_ref().ok_or_else(|| {
                    error!(
                        "Field {} has no static value source, required for a fixed layout",
                        field.id
                    );
                    StatusCode::BadConfigurationError
                })?;
                let value = source.get();
                let type_id = value
                    .value
                    .as_ref()
                    .map(|v| v.type_id())
                    .ok_or_else(|| {
                        error!("Field {} holds no value to derive a layout from", field.id);
                        StatusCode::BadConfigurationError
                    })?;
                Self::validate_rt_field_type(type_id)?;
            }
        }

        let template =
            publisher::build_network_message(group, publisher_id, data_sets, backends, BuildMode::FreezeTemplate)?;
        let field_types = Self::template_field_types(group, data_sets)?;
        let offset_buffer = OffsetBuffer::new(&template, &field_types)?;
        group.freeze(Some(offset_buffer));
        Ok(())
    }

    /// Releases a writer group's frozen state. Idempotent - unfreezing an unfrozen group
    /// succeeds and does nothing.
    pub fn unfreeze_writer_group_configuration(
        &mut self,
        group_id: PubSubId,
    ) -> Result<(), StatusCode> {
        let group = self
            .find_writer_group_mut(group_id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        group.unfreeze();
        Ok(())
    }

    /// Locks a reader group's configuration. Under the fixed size realtime level the group
    /// may hold at most one reader, every metadata field must have a fixed wire size and
    /// every target variable must sit on an external value backend.
    pub fn freeze_reader_group_configuration(
        &mut self,
        group_id: PubSubId,
    ) -> Result<(), StatusCode> {
        let backends = &self.backends;
        let group = self
            .connections
            .iter_mut()
            .find_map(|c| c.find_reader_group_mut(group_id))
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        if group.is_frozen() {
            return Ok(());
        }
        if group.config.rt_level != PubSubRtLevel::FixedSize {
            group.freeze();
            return Ok(());
        }

        if group.readers().len() > 1 {
            error!(
                "Reader group {} has {} readers, fixed layouts support exactly one",
                group_id,
                group.readers().len()
            );
            return Err(StatusCode::BadNotImplemented);
        }
        for reader in group.readers() {
            Self::validate_rt_network_mask(
                reader.config.message_settings.network_message_content_mask,
            )?;
            let dsm_mask = UadpDataSetMessageContentMask::validate(
                reader.config.message_settings.data_set_message_content_mask,
            )?;
            if dsm_mask.bits() & RT_FORBIDDEN_DSM_MASK != 0 {
                error!(
                    "Reader {} expects per-cycle header fields, not supported under a fixed layout",
                    reader.id
                );
                return Err(StatusCode::BadNotSupported);
            }
            let meta = &reader.config.data_set_meta_data;
            for field in &meta.fields {
                if field.value_rank != -1 {
                    error!(
                        "Reader {} metadata field \"{}\" is not scalar",
                        reader.id, field.name
                    );
                    return Err(StatusCode::BadNotSupported);
                }
                let type_id = field.built_in_type()?;
                Self::validate_rt_field_type(type_id)?;
            }
            if reader.config.target_variables.len() != meta.fields.len() {
                error!(
                    "Reader {} has {} target variables for {} fields",
                    reader.id,
                    reader.config.target_variables.len(),
                    meta.fields.len()
                );
                return Err(StatusCode::BadConfigurationError);
            }
            for target in &reader.config.target_variables {
                if !backends.is_external(&target.target_node_id) {
                    error!(
                        "Target variable {} has no external value backend",
                        target.target_node_id
                    );
                    return Err(StatusCode::BadConfigurationError);
                }
            }
        }

        // Validation is complete; now build each reader's buffered layout
        let mut offset_buffers = Vec::with_capacity(group.readers().len());
        for reader in group.readers() {
            let template = reader.template_network_message()?;
            let field_types = reader.field_types()?;
            offset_buffers.push(OffsetBuffer::new(&template, &[field_types])?);
        }
        for (reader, offset_buffer) in group.readers_mut().iter_mut().zip(offset_buffers) {
            reader.set_offset_buffer(offset_buffer);
        }
        group.freeze();
        Ok(())
    }

    /// Releases a reader group's frozen state. Idempotent.
    pub fn unfreeze_reader_group_configuration(
        &mut self,
        group_id: PubSubId,
    ) -> Result<(), StatusCode> {
        let group = self
            .connections
            .iter_mut()
            .find_map(|c| c.find_reader_group_mut(group_id))
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        group.unfreeze();
        Ok(())
    }

    fn validate_rt_network_mask(raw: u32) -> Result<(), StatusCode> {
        let mask = UadpNetworkMessageContentMask::validate(raw)?;
        if mask.bits() & RT_REQUIRED_MASK != RT_REQUIRED_MASK {
            error!("A fixed layout needs publisher id, group header, writer group id and payload header in the content mask");
            return Err(StatusCode::BadConfigurationError);
        }
        if mask.bits() & RT_FORBIDDEN_MASK != 0 {
            error!("The content mask selects per-cycle header fields, not supported under a fixed layout");
            return Err(StatusCode::BadNotSupported);
        }
        Ok(())
    }

    /// The realtime type whitelist. DateTime is fixed size on the wire but its value is
    /// clock driven, so it is rejected alongside the variable length types.
    fn validate_rt_field_type(type_id: VariantTypeId) -> Result<(), StatusCode> {
        if type_id == VariantTypeId::DateTime || type_id.fixed_wire_size().is_none() {
            error!("Type {:?} is not supported in a fixed layout", type_id);
            Err(StatusCode::BadNotSupported)
        } else {
            Ok(())
        }
    }

    /// The per-message field type lists of a group's frozen template.
    fn template_field_types(
        group: &WriterGroup,
        data_sets: &[PublishedDataSet],
    ) -> EncodingResult<Vec<Vec<VariantTypeId>>> {
        group
            .writers()
            .iter()
            .map(|writer| {
                let data_set = data_sets
                    .iter()
                    .find(|d| d.id == writer.data_set)
                    .ok_or(StatusCode::BadConfigurationError)?;
                data_set
                    .fields()
                    .iter()
                    .map(|field| {
                        let source = field
                            .config
                            .static_value
                            .as_ref()
                            .ok_or(StatusCode::BadConfigurationError)?;
                        let value = source.get();
                        value
                            .value
                            .as_ref()
                            .map(|v| v.type_id())
                            .ok_or(StatusCode::BadConfigurationError)
                    })
                    .collect()
            })
            .collect()
    }

    // ---- The data plane entry points

    /// One publish tick of a writer group, called by the host scheduler every publishing
    /// interval.
    pub fn publish_writer_group(&mut self, group_id: PubSubId) -> Result<(), StatusCode> {
        let data_sets = &self.data_sets;
        let backends = &self.backends;
        let connection = self
            .connections
            .iter_mut()
            .find(|c| c.has_writer_group(group_id))
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        connection.publish_writer_group(group_id, data_sets, backends)
    }

    /// Pulls buffers from a connection's channel and dispatches them to its readers.
    /// Returns how many buffers arrived; zero after an uneventful timeout.
    pub fn receive(
        &mut self,
        connection_id: PubSubId,
        timeout: Duration,
    ) -> Result<usize, StatusCode> {
        let backends = &mut self.backends;
        let decoding_options = self.decoding_options.clone();
        let connection = self
            .connections
            .iter_mut()
            .find(|c| c.id == connection_id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        connection.receive(timeout, backends, &decoding_options)
    }

    /// Dispatches a buffer the host obtained itself to a connection's readers.
    pub fn process_network_message(
        &mut self,
        connection_id: PubSubId,
        data: &[u8],
    ) -> EncodingResult<()> {
        let backends = &mut self.backends;
        let decoding_options = self.decoding_options.clone();
        let connection = self
            .connections
            .iter_mut()
            .find(|c| c.id == connection_id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        crate::pubsub::subscriber::process_network_message(
            connection.reader_groups_mut(),
            data,
            backends,
            &decoding_options,
        )
    }

    /// Drives a connection's protocol state once, required for channels like MQTT that
    /// only make progress when ticked.
    pub fn yield_connection(
        &mut self,
        connection_id: PubSubId,
        timeout: Duration,
    ) -> Result<(), StatusCode> {
        let connection = self
            .connections
            .iter_mut()
            .find(|c| c.id == connection_id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        connection.channel_mut().yield_once(timeout)
    }
}

#[cfg(feature = "threadsafe")]
pub type PubSubManagerRef = std::sync::Arc<parking_lot::Mutex<PubSubManager>>;

#[cfg(feature = "threadsafe")]
impl PubSubManager {
    /// Wraps the manager in the coarse lock a multi-threaded host serializes on.
    pub fn into_shared(self) -> PubSubManagerRef {
        std::sync::Arc::new(parking_lot::Mutex::new(self))
    }
}
