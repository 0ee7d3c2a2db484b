mod codec;
mod rt;
mod subscriber;

use crate::pubsub::uadp::*;
use crate::types::*;

/// The message shape used throughout these tests - publisher id 2234, writer group 100,
/// one raw keyframe from writer 62541 holding a single UInt32.
pub fn raw_uint32_message(value: u32, sequence_numbers: bool) -> UadpNetworkMessage {
    let header = DataSetMessageHeader {
        sequence_number: if sequence_numbers { Some(0) } else { None },
        ..DataSetMessageHeader::default()
    };
    let dsm = DataSetMessage::key_frame_raw(header, &[Variant::UInt32(value)]).unwrap();
    UadpNetworkMessage {
        publisher_id: Some(PublisherId::UInt16(2234)),
        group_header: Some(UadpGroupHeader {
            writer_group_id: Some(100),
            sequence_number: if sequence_numbers { Some(0) } else { None },
            ..UadpGroupHeader::default()
        }),
        dataset_payload_header: Some(vec![62541]),
        payload: vec![dsm],
        ..UadpNetworkMessage::default()
    }
}
