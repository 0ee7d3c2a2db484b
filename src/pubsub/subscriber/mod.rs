// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The receive pipeline - decode the NetworkMessage, find the reader each DataSetMessage
//! belongs to, then either take the realtime fast path through the reader's buffered
//! layout or fully decode and write the target variables.

use crate::pubsub::core::{ReaderGroup, ValueBackendRegistry};
use crate::pubsub::uadp::UadpNetworkMessage;
use crate::types::encoding::*;

/// Dispatches one received buffer to the reader groups of its connection.
///
/// A message that matches nobody is dropped without error - on a multicast group or a
/// shared broker topic that is the normal case, not a fault. A message that matches a
/// reader but cannot be decoded is logged, counted against that reader and dropped; a
/// protocol stack must not let one malformed packet take down the dispatch loop.
pub fn process_network_message(
    reader_groups: &mut [ReaderGroup],
    data: &[u8],
    backends: &mut ValueBackendRegistry,
    decoding_options: &DecodingOptions,
) -> EncodingResult<()> {
    let nm = UadpNetworkMessage::decode(data, decoding_options)?;

    // Without these there is nothing to match a reader against
    let publisher_id = match nm.publisher_id {
        Some(publisher_id) => publisher_id,
        None => {
            debug!("NetworkMessage has no publisher id, nothing will match it");
            return Ok(());
        }
    };
    let writer_group_id = match nm.group_header.as_ref().and_then(|g| g.writer_group_id) {
        Some(writer_group_id) => writer_group_id,
        None => {
            debug!("NetworkMessage has no writer group id, nothing will match it");
            return Ok(());
        }
    };
    let writer_ids = match nm.dataset_payload_header {
        Some(ref writer_ids) => writer_ids,
        None => {
            debug!("NetworkMessage has no payload header, nothing will match it");
            return Ok(());
        }
    };

    for (i, dsm) in nm.payload.iter().enumerate() {
        let data_set_writer_id = writer_ids[i];
        // First matching reader wins, in group then reader registration order
        'matched: for reader_group in reader_groups.iter_mut() {
            for reader in reader_group.readers_mut() {
                if !reader.matches(&publisher_id, writer_group_id, data_set_writer_id) {
                    continue;
                }
                let result = if reader.offset_buffer().is_some() {
                    // The buffered layout covers the whole packet
                    reader.update_buffered(data, backends, decoding_options)
                } else {
                    reader.process_data_set_message(dsm, backends, decoding_options)
                };
                if let Err(err) = result {
                    warn!("Reader {} dropped a message, error {}", reader.id, err);
                    reader.note_dropped();
                }
                break 'matched;
            }
        }
    }
    Ok(())
}
